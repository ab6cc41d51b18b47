//! Urban land fractions per density class.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SurfDataError, SurfDataResult};

const SUM_TOLERANCE: f64 = 1e-6;

/// What to do when the fractions do not add up to 100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PctUrbanPolicy {
    /// Log a warning and write the values as given
    #[default]
    Warn,
    /// Reject the fractions
    Strict,
    /// Write the values as given
    Ignore,
}

impl FromStr for PctUrbanPolicy {
    type Err = SurfDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "strict" => Ok(Self::Strict),
            "ignore" => Ok(Self::Ignore),
            other => Err(SurfDataError::InvalidConfig(format!(
                "unknown PCT_URBAN policy '{}' (expected warn, strict or ignore)",
                other
            ))),
        }
    }
}

impl fmt::Display for PctUrbanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Warn => "warn",
            Self::Strict => "strict",
            Self::Ignore => "ignore",
        };
        f.write_str(s)
    }
}

/// `PCT_URBAN` for the tall building district, high density and medium
/// density classes, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UrbanFractions(pub [f64; 3]);

impl Default for UrbanFractions {
    /// Entirely medium density.
    fn default() -> Self {
        Self([0.0, 0.0, 100.0])
    }
}

impl UrbanFractions {
    pub fn new(values: [f64; 3]) -> SurfDataResult<Self> {
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SurfDataError::PctUrban(format!(
                "fractions must be finite and non-negative, got {}",
                v
            )));
        }
        Ok(Self(values))
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Apply the sum policy.
    pub fn check(&self, policy: PctUrbanPolicy) -> SurfDataResult<()> {
        let sum = self.sum();
        if (sum - 100.0).abs() <= SUM_TOLERANCE {
            return Ok(());
        }
        match policy {
            PctUrbanPolicy::Strict => Err(SurfDataError::PctUrban(format!(
                "{} sums to {}, expected 100",
                self, sum
            ))),
            PctUrbanPolicy::Warn => {
                warn!(fractions = %self, sum, "PCT_URBAN does not sum to 100");
                Ok(())
            }
            PctUrbanPolicy::Ignore => Ok(()),
        }
    }
}

impl FromStr for UrbanFractions {
    type Err = SurfDataError;

    /// Parse `"tbd,hd,md"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .map_err(|_| SurfDataError::PctUrban(format!("'{}' is not a number", p.trim())))
            })
            .collect::<SurfDataResult<Vec<_>>>()?;

        match parts.as_slice() {
            [a, b, c] => Self::new([*a, *b, *c]),
            _ => Err(SurfDataError::PctUrban(format!(
                "expected three comma-separated values, got {}",
                parts.len()
            ))),
        }
    }
}

impl fmt::Display for UrbanFractions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0[0], self.0[1], self.0[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let f: UrbanFractions = "10, 20.5,69.5".parse().unwrap();
        assert_eq!(f.0, [10.0, 20.5, 69.5]);
        assert_eq!(f.sum(), 100.0);

        assert!("10,20".parse::<UrbanFractions>().is_err());
        assert!("10,x,20".parse::<UrbanFractions>().is_err());
        assert!("-5,5,100".parse::<UrbanFractions>().is_err());
    }

    #[test]
    fn test_policy() {
        let off = UrbanFractions::new([10.0, 10.0, 10.0]).unwrap();
        assert!(off.check(PctUrbanPolicy::Warn).is_ok());
        assert!(off.check(PctUrbanPolicy::Ignore).is_ok());
        assert!(matches!(
            off.check(PctUrbanPolicy::Strict),
            Err(SurfDataError::PctUrban(_))
        ));
        assert!(UrbanFractions::default().check(PctUrbanPolicy::Strict).is_ok());
    }

    #[test]
    fn test_policy_keywords() {
        assert_eq!("STRICT".parse::<PctUrbanPolicy>().unwrap(), PctUrbanPolicy::Strict);
        assert!("lenient".parse::<PctUrbanPolicy>().is_err());
        assert_eq!(PctUrbanPolicy::default().to_string(), "warn");
    }
}
