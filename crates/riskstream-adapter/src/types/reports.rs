/*
[INPUT]:  JSON payloads published on /topic/risk/{SYMBOL} and /topic/mc/{SYMBOL}
[OUTPUT]: Typed cascade and Monte Carlo risk reports
[POS]:    Data layer - backend payload definitions (deserialization only, no risk model)
[UPDATE]: When the backend adds or renames report fields
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{McRiskLevel, PositionSide};

/// Cascade risk report for one registered position
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CascadeRiskReport {
    pub symbol: String,
    pub current_price: Option<Decimal>,
    pub user_liquidation_price: Option<Decimal>,
    pub position_side: Option<PositionSide>,

    pub distance: Option<Decimal>,
    pub distance_percent: f64,
    /// "UP" or "DOWN": which way price must travel to reach the liquidation price
    pub direction: Option<String>,
    pub price_range_low: Option<Decimal>,
    pub price_range_high: Option<Decimal>,

    pub depth_between: Option<Decimal>,
    pub notional_between: Option<Decimal>,
    pub level_count: u32,
    pub depth_ratio: f64,

    pub risk_level: Option<String>,
    pub cascade_reach_probability: Option<f64>,
    pub calibrated_reach_probability: Option<f64>,
    pub density_score: Option<f64>,
    pub density_level: Option<String>,
    pub clusters_in_path: Option<u32>,
    pub oi_pressure_score: Option<f64>,
    pub liq_intensity_score: Option<f64>,
    pub imbalance_score: Option<f64>,
    pub market_pressure_total: Option<f64>,

    /// Epoch milliseconds
    pub timestamp: i64,
}

impl CascadeRiskReport {
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Monte Carlo liquidation probability report
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonteCarloReport {
    pub symbol: String,
    pub current_price: f64,
    pub liquidation_price: f64,
    pub position_side: Option<PositionSide>,
    pub sigma: f64,
    pub path_count: u32,
    pub horizons: Vec<HorizonResult>,
    pub risk_level: Option<McRiskLevel>,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub calc_duration_micros: i64,
}

impl MonteCarloReport {
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Horizon with the highest liquidation probability
    pub fn worst_horizon(&self) -> Option<&HorizonResult> {
        self.horizons.iter().max_by(|a, b| {
            a.liquidation_probability
                .total_cmp(&b.liquidation_probability)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HorizonResult {
    pub minutes: u32,
    pub liquidation_probability: f64,
    pub price_percentile5: f64,
    pub price_percentile25: f64,
    pub price_median: f64,
    pub price_percentile75: f64,
    pub price_percentile95: f64,
}
