//! Date and time functions. All dates are UTC.

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc, Weekday};

use super::{Args, Env};
use crate::calc::error::{CalcError, CalcResult};
use crate::calc::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl Unit {
    fn parse(function: &str, s: &str) -> CalcResult<Self> {
        let unit = match s.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" | "s" => Unit::Seconds,
            "minute" | "minutes" | "m" => Unit::Minutes,
            "hour" | "hours" | "h" => Unit::Hours,
            "day" | "days" | "d" => Unit::Days,
            "week" | "weeks" | "w" => Unit::Weeks,
            "month" | "months" => Unit::Months,
            "year" | "years" | "y" => Unit::Years,
            other => {
                return Err(CalcError::evaluation(
                    function,
                    format!("unknown date unit '{}'", other),
                ))
            }
        };
        Ok(unit)
    }
}

fn unit_arg(args: &Args<'_>, i: usize) -> CalcResult<Unit> {
    Unit::parse(args.function, &args.text_or(i, "days"))
}

pub fn now(_: &Args<'_>, env: &Env) -> CalcResult<Value> {
    Ok(Value::Date(env.now))
}

/// Midnight of the current day.
pub fn today(_: &Args<'_>, env: &Env) -> CalcResult<Value> {
    let midnight = env
        .now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(env.now);
    Ok(Value::Date(midnight))
}

/// Whole calendar months from `start` to `end`, truncated toward zero.
fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let mut months = (end.year() as i64 - start.year() as i64) * 12
        + (end.month() as i64 - start.month() as i64);
    let end_rest = (end.day(), end.time());
    let start_rest = (start.day(), start.time());
    if months > 0 && end_rest < start_rest {
        months -= 1;
    } else if months < 0 && end_rest > start_rest {
        months += 1;
    }
    months
}

/// `DATEDIFF(start, end, unit)`: `end - start` in whole units (default days).
pub fn date_diff(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let (Some(start), Some(end)) = (args.date(0)?, args.date(1)?) else {
        return Ok(Value::Null);
    };
    let delta = end - start;
    let n = match unit_arg(args, 2)? {
        Unit::Seconds => delta.num_seconds(),
        Unit::Minutes => delta.num_minutes(),
        Unit::Hours => delta.num_hours(),
        Unit::Days => delta.num_days(),
        Unit::Weeks => delta.num_weeks(),
        Unit::Months => months_between(start, end),
        Unit::Years => months_between(start, end) / 12,
    };
    Ok(Value::Number(n as f64))
}

/// `DATEADD(date, amount, unit)`; amount may be negative.
pub fn date_add(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    let Some(date) = args.date(0)? else {
        return Ok(Value::Null);
    };
    let Some(amount) = args.number(1)? else {
        return Ok(Value::Null);
    };
    let unit = unit_arg(args, 2)?;
    let overflow = || CalcError::evaluation(args.function, "date out of range");

    let shifted = match unit {
        Unit::Months | Unit::Years => {
            if amount.fract() != 0.0 {
                return Err(CalcError::evaluation(
                    args.function,
                    "months and years must be whole numbers",
                ));
            }
            let months = if unit == Unit::Years {
                amount * 12.0
            } else {
                amount
            };
            let magnitude = Months::new(months.abs().min(u32::MAX as f64) as u32);
            if months >= 0.0 {
                date.checked_add_months(magnitude)
            } else {
                date.checked_sub_months(magnitude)
            }
        }
        other => {
            let seconds_per = match other {
                Unit::Seconds => 1.0,
                Unit::Minutes => 60.0,
                Unit::Hours => 3_600.0,
                Unit::Weeks => 604_800.0,
                _ => 86_400.0,
            };
            let millis = amount * seconds_per * 1000.0;
            if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
                return Err(overflow());
            }
            Duration::try_milliseconds(millis.round() as i64)
                .and_then(|d| date.checked_add_signed(d))
        }
    };
    shifted.map(Value::Date).ok_or_else(overflow)
}

fn component(args: &Args<'_>, f: impl FnOnce(DateTime<Utc>) -> u32) -> CalcResult<Value> {
    Ok(args
        .date(0)?
        .map_or(Value::Null, |d| Value::Number(f(d) as f64)))
}

pub fn year(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(args
        .date(0)?
        .map_or(Value::Null, |d| Value::Number(d.year() as f64)))
}

pub fn month(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    component(args, |d| d.month())
}

pub fn day(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    component(args, |d| d.day())
}

pub fn hour(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    component(args, |d| d.hour())
}

pub fn minute(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    component(args, |d| d.minute())
}

pub fn second(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    component(args, |d| d.second())
}

/// 0 = Sunday through 6 = Saturday.
pub fn weekday(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    component(args, |d| d.weekday().num_days_from_sunday())
}

pub fn is_weekend(args: &Args<'_>, _: &Env) -> CalcResult<Value> {
    Ok(args.date(0)?.map_or(Value::Null, |d| {
        Value::Bool(matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn env() -> Env {
        Env {
            now: Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 10).unwrap(),
        }
    }

    fn call(f: super::super::NativeFn, name: &'static str, values: &[Value]) -> CalcResult<Value> {
        f(&Args::new(name, values), &env())
    }

    fn d(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_today_is_midnight() {
        assert_eq!(
            call(today, "TODAY", &[]),
            Ok(Value::Date(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_date_diff_units() {
        let start = d("2024-01-01");
        let end = d("2024-03-15T12:00:00Z");
        assert_eq!(call(date_diff, "DATEDIFF", &[start.clone(), end.clone()]), Ok(Value::Number(74.0)));
        assert_eq!(
            call(date_diff, "DATEDIFF", &[start.clone(), end.clone(), d("months")]),
            Ok(Value::Number(2.0))
        );
        assert_eq!(
            call(date_diff, "DATEDIFF", &[end, start, d("weeks")]),
            Ok(Value::Number(-10.0))
        );
    }

    #[test]
    fn test_date_diff_partial_month_truncates() {
        assert_eq!(
            call(date_diff, "DATEDIFF", &[d("2024-01-31"), d("2024-02-29"), d("months")]),
            Ok(Value::Number(0.0))
        );
        assert_eq!(
            call(date_diff, "DATEDIFF", &[d("2020-06-01"), d("2024-05-31"), d("years")]),
            Ok(Value::Number(3.0))
        );
    }

    #[test]
    fn test_date_add_months_clamps_day() {
        assert_eq!(
            call(date_add, "DATEADD", &[d("2024-01-31"), Value::Number(1.0), d("months")]),
            Ok(Value::Date(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()))
        );
        assert_eq!(
            call(date_add, "DATEADD", &[d("2024-01-10"), Value::Number(-10.0)]),
            Ok(Value::Date(Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_unparseable_date_fails() {
        let err = call(year, "YEAR", &[d("next tuesday")]).unwrap_err();
        assert_eq!(err.kind(), "evaluation_error");
        assert_eq!(call(year, "YEAR", &[Value::Null]), Ok(Value::Null));
    }

    #[test]
    fn test_components_and_weekday() {
        let now = Value::Date(env().now);
        assert_eq!(call(hour, "HOUR", &[now.clone()]), Ok(Value::Number(13.0)));
        assert_eq!(call(minute, "MINUTE", &[now.clone()]), Ok(Value::Number(45.0)));
        // 2024-03-15 was a Friday.
        assert_eq!(call(weekday, "WEEKDAY", &[now.clone()]), Ok(Value::Number(5.0)));
        assert_eq!(call(is_weekend, "ISWEEKEND", &[now]), Ok(Value::Bool(false)));
        assert_eq!(call(is_weekend, "ISWEEKEND", &[d("2024-03-17")]), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_unknown_unit() {
        assert!(call(date_diff, "DATEDIFF", &[d("2024-01-01"), d("2024-01-02"), d("fortnights")]).is_err());
    }
}
