/// Schedule trigger rules
///
/// Parsed form of a `scheduleTrigger` node's parameters. All rules match at
/// whole-minute granularity against a naive wall-clock time; the caller picks
/// local time or UTC.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};
use serde_json::Value;
use std::str::FromStr;

const DEFAULT_TIME: &str = "09:00";

#[derive(Debug, Clone)]
pub enum ScheduleRule {
    Daily {
        hour: u32,
        minute: u32,
    },
    Weekly {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
    /// Months without `day` never fire
    Monthly {
        day: u32,
        hour: u32,
        minute: u32,
    },
    /// Day-of-week numbers follow the `cron` crate (1 = Sunday); names are safer
    Cron {
        /// Normalized to include the seconds field
        expression: String,
        schedule: Box<cron::Schedule>,
    },
}

impl PartialEq for ScheduleRule {
    fn eq(&self, other: &Self) -> bool {
        use ScheduleRule::*;
        match (self, other) {
            (Daily { hour: h1, minute: m1 }, Daily { hour: h2, minute: m2 }) => (h1, m1) == (h2, m2),
            (
                Weekly { weekday: w1, hour: h1, minute: m1 },
                Weekly { weekday: w2, hour: h2, minute: m2 },
            ) => (w1, h1, m1) == (w2, h2, m2),
            (Monthly { day: d1, hour: h1, minute: m1 }, Monthly { day: d2, hour: h2, minute: m2 }) => {
                (d1, h1, m1) == (d2, h2, m2)
            }
            (Cron { expression: a, .. }, Cron { expression: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl ScheduleRule {
    /// Build a rule from node parameters (`rule`, `time`, `weekday`, `dayOfMonth`, `expression`)
    pub fn from_parameters(parameters: &Value) -> Result<Self> {
        let rule = parameters.get("rule").and_then(Value::as_str).unwrap_or("daily");

        match rule {
            "cron" => {
                let expression = parameters
                    .get("expression")
                    .and_then(Value::as_str)
                    .filter(|e| !e.trim().is_empty())
                    .ok_or_else(|| anyhow!("cron rule needs an 'expression'"))?;
                parse_cron(expression)
            }
            "daily" | "weekly" | "monthly" => {
                let time = parameters.get("time").and_then(Value::as_str).unwrap_or(DEFAULT_TIME);
                let (hour, minute) = parse_time(time)?;

                Ok(match rule {
                    "daily" => ScheduleRule::Daily { hour, minute },
                    "weekly" => ScheduleRule::Weekly {
                        weekday: parse_weekday(parameters.get("weekday"))?,
                        hour,
                        minute,
                    },
                    _ => ScheduleRule::Monthly {
                        day: parse_day_of_month(parameters.get("dayOfMonth"))?,
                        hour,
                        minute,
                    },
                })
            }
            other => bail!("unknown schedule rule '{}'", other),
        }
    }

    /// True when `now` falls inside a minute the rule fires in
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        let same_time = |hour: u32, minute: u32| now.hour() == hour && now.minute() == minute;

        match self {
            ScheduleRule::Daily { hour, minute } => same_time(*hour, *minute),
            ScheduleRule::Weekly { weekday, hour, minute } => now.weekday() == *weekday && same_time(*hour, *minute),
            ScheduleRule::Monthly { day, hour, minute } => now.day() == *day && same_time(*hour, *minute),
            ScheduleRule::Cron { schedule, .. } => {
                let minute_start = Utc.from_utc_datetime(&truncate_to_minute(now));
                let window_end = minute_start + Duration::minutes(1);
                schedule
                    .after(&(minute_start - Duration::seconds(1)))
                    .next()
                    .is_some_and(|next: DateTime<Utc>| next < window_end)
            }
        }
    }
}

/// Start of the minute containing `now`
pub fn truncate_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// 5-field expressions get a leading seconds field
fn parse_cron(expression: &str) -> Result<ScheduleRule> {
    let fields = expression.split_whitespace().count();
    let normalized = match fields {
        5 => format!("0 {}", expression.trim()),
        6 | 7 => expression.trim().to_string(),
        n => bail!("cron expression '{}' has {} fields; expected 5, 6 or 7", expression, n),
    };

    let schedule = cron::Schedule::from_str(&normalized)
        .map_err(|e| anyhow!("invalid cron expression '{}': {}", expression, e))?;
    Ok(ScheduleRule::Cron {
        expression: normalized,
        schedule: Box::new(schedule),
    })
}

fn parse_time(time: &str) -> Result<(u32, u32)> {
    let (hour, minute) = time
        .trim()
        .split_once(':')
        .ok_or_else(|| anyhow!("time '{}' is not HH:MM", time))?;
    let hour: u32 = hour.parse().with_context(|| format!("invalid hour in '{}'", time))?;
    let minute: u32 = minute.parse().with_context(|| format!("invalid minute in '{}'", time))?;
    if hour > 23 || minute > 59 {
        bail!("time '{}' is out of range", time);
    }
    Ok((hour, minute))
}

/// Weekday by name or number (0 = Sunday)
fn parse_weekday(value: Option<&Value>) -> Result<Weekday> {
    const BY_NUMBER: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    let from_number = |n: u64| {
        BY_NUMBER
            .get(n as usize)
            .copied()
            .ok_or_else(|| anyhow!("weekday {} is out of range 0-6", n))
    };

    match value {
        None | Some(Value::Null) => Ok(Weekday::Mon),
        Some(Value::Number(n)) => from_number(n.as_u64().ok_or_else(|| anyhow!("invalid weekday {}", n))?),
        Some(Value::String(s)) => match s.trim().parse::<u64>() {
            Ok(n) => from_number(n),
            Err(_) => Weekday::from_str(s.trim()).map_err(|_| anyhow!("unknown weekday '{}'", s)),
        },
        Some(other) => bail!("invalid weekday {}", other),
    }
}

fn parse_day_of_month(value: Option<&Value>) -> Result<u32> {
    let day = match value {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| anyhow!("invalid dayOfMonth {}", n))?,
        Some(Value::String(s)) => s.trim().parse().with_context(|| format!("invalid dayOfMonth '{}'", s))?,
        Some(other) => bail!("invalid dayOfMonth {}", other),
    };
    if !(1..=31).contains(&day) {
        bail!("dayOfMonth {} is out of range 1-31", day);
    }
    Ok(day as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn daily_matches_whole_minute() {
        let rule = ScheduleRule::from_parameters(&json!({ "rule": "daily", "time": "09:00" })).unwrap();
        assert!(rule.matches(at(2024, 3, 4, 9, 0, 0)));
        assert!(rule.matches(at(2024, 3, 4, 9, 0, 59)));
        assert!(!rule.matches(at(2024, 3, 4, 9, 1, 0)));
        assert!(!rule.matches(at(2024, 3, 4, 21, 0, 0)));
    }

    #[test]
    fn defaults_to_daily_at_nine() {
        let rule = ScheduleRule::from_parameters(&json!({})).unwrap();
        assert_eq!(rule, ScheduleRule::Daily { hour: 9, minute: 0 });
    }

    #[test]
    fn weekly_accepts_names_and_numbers() {
        // 2024-03-04 is a Monday
        let by_name = ScheduleRule::from_parameters(&json!({ "rule": "weekly", "weekday": "monday", "time": "08:30" })).unwrap();
        let by_number = ScheduleRule::from_parameters(&json!({ "rule": "weekly", "weekday": 1, "time": "08:30" })).unwrap();
        assert_eq!(by_name, by_number);
        assert!(by_name.matches(at(2024, 3, 4, 8, 30, 10)));
        assert!(!by_name.matches(at(2024, 3, 5, 8, 30, 10)));

        let sunday = ScheduleRule::from_parameters(&json!({ "rule": "weekly", "weekday": "0" })).unwrap();
        assert!(sunday.matches(at(2024, 3, 3, 9, 0, 0)));
    }

    #[test]
    fn monthly_matches_day() {
        let rule = ScheduleRule::from_parameters(&json!({ "rule": "monthly", "dayOfMonth": 15, "time": "00:05" })).unwrap();
        assert!(rule.matches(at(2024, 6, 15, 0, 5, 0)));
        assert!(!rule.matches(at(2024, 6, 16, 0, 5, 0)));
    }

    #[test]
    fn cron_five_and_six_fields() {
        let five = ScheduleRule::from_parameters(&json!({ "rule": "cron", "expression": "*/15 9 * * *" })).unwrap();
        assert!(five.matches(at(2024, 3, 4, 9, 45, 30)));
        assert!(!five.matches(at(2024, 3, 4, 9, 46, 0)));

        let six = ScheduleRule::from_parameters(&json!({ "rule": "cron", "expression": "30 0 12 * * *" })).unwrap();
        assert!(six.matches(at(2024, 3, 4, 12, 0, 0)));
        assert!(!six.matches(at(2024, 3, 4, 12, 1, 0)));
    }

    #[test]
    fn rejects_malformed_parameters() {
        for params in [
            json!({ "rule": "hourly" }),
            json!({ "rule": "daily", "time": "25:00" }),
            json!({ "rule": "daily", "time": "nine" }),
            json!({ "rule": "weekly", "weekday": 9 }),
            json!({ "rule": "weekly", "weekday": "someday" }),
            json!({ "rule": "monthly", "dayOfMonth": 0 }),
            json!({ "rule": "cron" }),
            json!({ "rule": "cron", "expression": "* *" }),
            json!({ "rule": "cron", "expression": "61 * * * *" }),
        ] {
            assert!(ScheduleRule::from_parameters(&params).is_err(), "{} should fail", params);
        }
    }
}
