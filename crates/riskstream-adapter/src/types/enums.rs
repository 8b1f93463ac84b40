/*
[INPUT]:  Backend enum strings
[OUTPUT]: Strongly-typed enums with serde support
[POS]:    Data layer - shared enums for report payloads
[UPDATE]: When backend enum values change
*/

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

/// Monte Carlo risk bucket derived from liquidation probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum McRiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl McRiskLevel {
    /// Classify a liquidation probability in `[0, 1]`
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.50 {
            McRiskLevel::Critical
        } else if probability >= 0.25 {
            McRiskLevel::High
        } else if probability >= 0.10 {
            McRiskLevel::Medium
        } else {
            McRiskLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_thresholds() {
        assert_eq!(McRiskLevel::from_probability(0.0), McRiskLevel::Low);
        assert_eq!(McRiskLevel::from_probability(0.0999), McRiskLevel::Low);
        assert_eq!(McRiskLevel::from_probability(0.10), McRiskLevel::Medium);
        assert_eq!(McRiskLevel::from_probability(0.25), McRiskLevel::High);
        assert_eq!(McRiskLevel::from_probability(0.50), McRiskLevel::Critical);
        assert_eq!(McRiskLevel::from_probability(1.0), McRiskLevel::Critical);
        assert!(McRiskLevel::Critical > McRiskLevel::Low);
    }

    #[test]
    fn enums_use_backend_spelling() {
        assert_eq!(serde_json::to_string(&PositionSide::Short).unwrap(), "\"SHORT\"");
        assert_eq!(
            serde_json::from_str::<McRiskLevel>("\"CRITICAL\"").unwrap(),
            McRiskLevel::Critical
        );
    }
}
