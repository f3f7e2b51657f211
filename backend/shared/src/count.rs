use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Largest number of pops a single claim may carry.
pub const MAX_BATCH: u64 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid count (must be 1-{MAX_BATCH})")]
pub struct InvalidCount;

/// A positive number of pops to add to a counter, at most [`MAX_BATCH`].
///
/// Increments only ever take a `PopCount`, so a zero or negative delta
/// cannot reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PopCount(u64);

impl PopCount {
    pub const ONE: PopCount = PopCount(1);

    pub fn new(count: u64) -> Result<Self, InvalidCount> {
        if count == 0 || count > MAX_BATCH {
            return Err(InvalidCount);
        }

        Ok(Self(count))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Any JSON number with no fractional part counts, so `7` and `7.0` are the
/// same claim. Strings, `null` and fractions are rejected.
impl TryFrom<&Value> for PopCount {
    type Error = InvalidCount;

    fn try_from(count: &Value) -> Result<Self, Self::Error> {
        if let Some(count) = count.as_u64() {
            return Self::new(count);
        }

        match count.as_f64() {
            Some(count) if count.fract() == 0.0 && (1.0..=MAX_BATCH as f64).contains(&count) => {
                Self::new(count as u64)
            }
            _ => Err(InvalidCount),
        }
    }
}

impl fmt::Display for PopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{InvalidCount, MAX_BATCH, PopCount};

    #[test]
    fn test_bounds() {
        assert_eq!(PopCount::new(0), Err(InvalidCount));
        assert_eq!(PopCount::new(1).unwrap(), PopCount::ONE);
        assert_eq!(PopCount::new(MAX_BATCH).unwrap().get(), MAX_BATCH);
        assert_eq!(PopCount::new(MAX_BATCH + 1), Err(InvalidCount));
    }

    #[test]
    fn test_from_json_number() {
        assert_eq!(PopCount::try_from(&json!(7)).unwrap().get(), 7);
        assert_eq!(PopCount::try_from(&json!(7.0)).unwrap().get(), 7);
        assert_eq!(PopCount::try_from(&json!(1e6)).unwrap().get(), MAX_BATCH);
    }

    #[test]
    fn test_from_json_rejects() {
        for count in [json!(-5), json!(-5.0), json!(0.0), json!(2.5), json!(1e7), json!("7"), json!(null), json!([7])] {
            assert_eq!(PopCount::try_from(&count), Err(InvalidCount), "count {count}");
        }
    }
}
