//! Severity / occurrence / detection ratings and action priority

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;

/// A 1–10 rating (severity, occurrence or detection)
///
/// Out-of-range values fail deserialization, so a `Rating` inside the core is
/// always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Create a rating, rejecting values outside 1..=10
    pub fn new(value: i64) -> Result<Self, Error> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(Error::MalformedInput(format!(
                "rating {} outside {}..={}",
                value,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// AIAG-VDA action priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionPriority {
    #[serde(rename = "H")]
    High,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Low,
}

impl ActionPriority {
    /// Look up the PFMEA action priority for a severity/occurrence/detection triple
    pub fn from_sod(severity: Rating, occurrence: Rating, detection: Rating) -> Self {
        use ActionPriority::{High as H, Low as L, Medium as M};

        // Detection bands, left to right: 7-10, 5-6, 2-4, 1
        let band = match detection.get() {
            7..=10 => 0,
            5..=6 => 1,
            2..=4 => 2,
            _ => 3,
        };

        let row: [ActionPriority; 4] = match severity.get() {
            9..=10 => match occurrence.get() {
                6..=10 => [H, H, H, H],
                4..=5 => [H, H, H, M],
                2..=3 => [H, M, L, L],
                _ => [L, L, L, L],
            },
            7..=8 => match occurrence.get() {
                8..=10 => [H, H, H, H],
                6..=7 => [H, H, H, M],
                4..=5 => [H, M, M, M],
                2..=3 => [M, M, L, L],
                _ => [L, L, L, L],
            },
            4..=6 => match occurrence.get() {
                8..=10 => [H, H, M, M],
                6..=7 => [M, M, M, L],
                4..=5 => [M, L, L, L],
                _ => [L, L, L, L],
            },
            2..=3 => match occurrence.get() {
                8..=10 => [M, M, L, L],
                _ => [L, L, L, L],
            },
            _ => [L, L, L, L],
        };

        row[band]
    }

    /// Compute AP only when all three ratings are present
    pub fn from_optional(
        severity: Option<Rating>,
        occurrence: Option<Rating>,
        detection: Option<Rating>,
    ) -> Option<Self> {
        Some(Self::from_sod(severity?, occurrence?, detection?))
    }

    pub fn code(self) -> &'static str {
        match self {
            ActionPriority::High => "H",
            ActionPriority::Medium => "M",
            ActionPriority::Low => "L",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "H" => Some(ActionPriority::High),
            "M" => Some(ActionPriority::Medium),
            "L" => Some(ActionPriority::Low),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(v: i64) -> Rating {
        Rating::new(v).unwrap()
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(11).is_err());
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(10).unwrap().get(), 10);
    }

    #[test]
    fn test_rating_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Rating>("9").is_ok());
        assert!(serde_json::from_str::<Rating>("0").is_err());
        assert!(serde_json::from_str::<Rating>("42").is_err());
    }

    #[test]
    fn test_action_priority_table_corners() {
        assert_eq!(ActionPriority::from_sod(r(10), r(10), r(10)), ActionPriority::High);
        assert_eq!(ActionPriority::from_sod(r(1), r(10), r(10)), ActionPriority::Low);
        assert_eq!(ActionPriority::from_sod(r(9), r(1), r(10)), ActionPriority::Low);
        assert_eq!(ActionPriority::from_sod(r(9), r(4), r(1)), ActionPriority::Medium);
        assert_eq!(ActionPriority::from_sod(r(7), r(2), r(8)), ActionPriority::Medium);
        assert_eq!(ActionPriority::from_sod(r(5), r(8), r(1)), ActionPriority::Medium);
        assert_eq!(ActionPriority::from_sod(r(3), r(9), r(9)), ActionPriority::Medium);
    }

    #[test]
    fn test_from_optional_requires_all_three() {
        assert_eq!(ActionPriority::from_optional(Some(r(9)), None, Some(r(5))), None);
        assert_eq!(
            ActionPriority::from_optional(Some(r(9)), Some(r(7)), Some(r(5))),
            Some(ActionPriority::High)
        );
    }
}
