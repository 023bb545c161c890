//! Aggregate math over a column of submission values.
//!
//! Missing and non-numeric values are excluded from the sample, never
//! coerced to zero.

use crate::calc::error::{CalcError, CalcResult};
use crate::calc::value::Value;

/// Which aggregate to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
    Median,
    Stdev,
}

impl Aggregate {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Aggregate::Count),
            "SUM" => Some(Aggregate::Sum),
            "AVG" => Some(Aggregate::Avg),
            "MEDIAN" => Some(Aggregate::Median),
            "STDEV" => Some(Aggregate::Stdev),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Avg => "AVG",
            Aggregate::Median => "MEDIAN",
            Aggregate::Stdev => "STDEV",
        }
    }

    /// Compute over a column. COUNT counts non-blank values; the rest use
    /// the numeric subset.
    pub fn compute(&self, column: &[Value]) -> CalcResult<Value> {
        if *self == Aggregate::Count {
            let n = column.iter().filter(|v| !v.is_blank()).count();
            return Ok(Value::Number(n as f64));
        }
        let sample: Vec<f64> = column
            .iter()
            .filter(|v| !matches!(v, Value::Bool(_)))
            .filter_map(Value::as_number)
            .collect();
        let result = match self {
            Aggregate::Sum => Some(sample.iter().sum()),
            Aggregate::Avg => mean(&sample),
            Aggregate::Median => median(sample),
            Aggregate::Stdev => sample_stdev(&sample),
            Aggregate::Count => None,
        };
        match result {
            Some(n) if !n.is_finite() => Err(CalcError::evaluation(
                self.name(),
                "result is not a finite number",
            )),
            Some(n) => Ok(Value::Number(n)),
            None => Ok(Value::Null),
        }
    }
}

fn mean(sample: &[f64]) -> Option<f64> {
    if sample.is_empty() {
        None
    } else {
        Some(sample.iter().sum::<f64>() / sample.len() as f64)
    }
}

fn median(mut sample: Vec<f64>) -> Option<f64> {
    if sample.is_empty() {
        return None;
    }
    sample.sort_by(f64::total_cmp);
    let mid = sample.len() / 2;
    if sample.len() % 2 == 0 {
        Some((sample[mid - 1] + sample[mid]) / 2.0)
    } else {
        Some(sample[mid])
    }
}

/// Sample standard deviation (n - 1); undefined below two values.
fn sample_stdev(sample: &[f64]) -> Option<f64> {
    if sample.len() < 2 {
        return None;
    }
    let m = mean(sample)?;
    let variance =
        sample.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (sample.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column() -> Vec<Value> {
        vec![
            Value::Number(2.0),
            Value::from("4"),
            Value::Null,
            Value::from("n/a"),
            Value::Number(4.0),
            Value::Number(4.0),
            Value::Number(5.0),
            Value::Number(5.0),
            Value::Number(7.0),
            Value::Number(9.0),
        ]
    }

    #[test]
    fn test_non_numeric_excluded_not_zeroed() {
        assert_eq!(Aggregate::Avg.compute(&column()), Ok(Value::Number(5.0)));
        assert_eq!(Aggregate::Sum.compute(&column()), Ok(Value::Number(40.0)));
    }

    #[test]
    fn test_count_skips_blank() {
        assert_eq!(Aggregate::Count.compute(&column()), Ok(Value::Number(9.0)));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(Aggregate::Median.compute(&column()), Ok(Value::Number(4.5)));
        let odd = [Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)];
        assert_eq!(Aggregate::Median.compute(&odd), Ok(Value::Number(2.0)));
    }

    #[test]
    fn test_stdev_sample() {
        let Ok(Value::Number(sd)) = Aggregate::Stdev.compute(&column()) else {
            panic!("expected number");
        };
        assert!((sd - 2.138089935).abs() < 1e-6);
        assert_eq!(Aggregate::Stdev.compute(&[Value::Number(1.0)]), Ok(Value::Null));
    }

    #[test]
    fn test_empty_column() {
        assert_eq!(Aggregate::Sum.compute(&[]), Ok(Value::Number(0.0)));
        assert_eq!(Aggregate::Avg.compute(&[]), Ok(Value::Null));
        assert_eq!(Aggregate::Count.compute(&[]), Ok(Value::Number(0.0)));
    }
}
