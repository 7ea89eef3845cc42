use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RiskError, RiskResult};

/// Feature order shared by the scaler, the forest and every feature vector.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "attendance",
    "gpa",
    "participation",
    "stress",
    "family_income",
];

pub const FEATURE_COUNT: usize = 5;

/// One student's signals as received by a prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentObservation {
    pub attendance: f64,
    pub gpa: f64,
    pub participation: f64,
    pub stress: f64,
    pub family_income: f64,
}

impl StudentObservation {
    /// Build an observation, rejecting values outside the documented ranges.
    pub fn new(
        attendance: f64,
        gpa: f64,
        participation: f64,
        stress: f64,
        family_income: f64,
    ) -> RiskResult<Self> {
        let observation = Self {
            attendance,
            gpa,
            participation,
            stress,
            family_income,
        };
        observation.validate()?;
        Ok(observation)
    }

    pub fn validate(&self) -> RiskResult<()> {
        check_range("attendance", self.attendance, 0.0, 100.0, "0..=100")?;
        check_range("gpa", self.gpa, 0.0, 10.0, "0..=10")?;
        check_range("participation", self.participation, 1.0, 10.0, "1..=10")?;
        check_range("stress", self.stress, 1.0, 10.0, "1..=10")?;
        if !(self.family_income.is_finite() && self.family_income > 0.0) {
            return Err(RiskError::Validation {
                field: "family_income",
                value: self.family_income.to_string(),
                expected: "a positive amount",
            });
        }
        Ok(())
    }

    /// Feature vector in `FEATURE_NAMES` order.
    pub fn features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.attendance,
            self.gpa,
            self.participation,
            self.stress,
            self.family_income,
        ]
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    expected: &'static str,
) -> RiskResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RiskError::Validation {
            field,
            value: value.to_string(),
            expected,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn index(self) -> usize {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synthetic feature vector with its formula-derived label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: [f64; FEATURE_COUNT],
    pub label: RiskLevel,
}

/// Classifier output for one observation.
///
/// `risk_score` is the classifier's confidence in `risk_level` (0-100). It is
/// not the continuous score used to label synthetic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub risk_score: u8,
}

/// A stored assessment, one row of the append-only record log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub id: Uuid,
    pub name: String,
    pub observation: StudentObservation,
    pub risk_level: RiskLevel,
    pub risk_score: u8,
    pub recommendations: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierSummary {
    pub risk_level: RiskLevel,
    pub count: usize,
    pub avg_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_domain_bounds() {
        assert!(StudentObservation::new(0.0, 0.0, 1.0, 1.0, 10_000.0).is_ok());
        assert!(StudentObservation::new(100.0, 10.0, 10.0, 10.0, 1.0).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = StudentObservation::new(101.0, 5.0, 5.0, 5.0, 40_000.0).unwrap_err();
        assert!(matches!(err, RiskError::Validation { field: "attendance", .. }));

        let err = StudentObservation::new(80.0, 5.0, 0.5, 5.0, 40_000.0).unwrap_err();
        assert!(matches!(err, RiskError::Validation { field: "participation", .. }));

        let err = StudentObservation::new(80.0, 5.0, 5.0, 5.0, 0.0).unwrap_err();
        assert!(matches!(err, RiskError::Validation { field: "family_income", .. }));
    }

    #[test]
    fn rejects_nan() {
        let err = StudentObservation::new(80.0, f64::NAN, 5.0, 5.0, 40_000.0).unwrap_err();
        assert!(matches!(err, RiskError::Validation { field: "gpa", .. }));
    }

    #[test]
    fn features_follow_declared_order() {
        let observation = StudentObservation::new(90.0, 8.5, 8.0, 3.0, 60_000.0).unwrap();
        assert_eq!(observation.features(), [90.0, 8.5, 8.0, 3.0, 60_000.0]);
    }

    #[test]
    fn risk_levels_map_to_fixed_ordinals() {
        assert_eq!(RiskLevel::from_index(0), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::from_index(2), Some(RiskLevel::High));
        assert_eq!(RiskLevel::from_index(3), None);
        assert_eq!(RiskLevel::parse("Medium"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::High.to_string(), "High");
    }
}
