/*
[INPUT]:  Backend report schema and topic naming
[OUTPUT]: Report types and destination helpers
[POS]:    Data layer - module root for payload types
[UPDATE]: When adding new report types or topics
*/

pub mod enums;
pub mod reports;

pub use enums::*;
pub use reports::*;

const RISK_TOPIC_PREFIX: &str = "/topic/risk/";
const MONTE_CARLO_TOPIC_PREFIX: &str = "/topic/mc/";

/// Destination carrying [`CascadeRiskReport`]s for `symbol`
pub fn risk_topic(symbol: &str) -> String {
    format!("{RISK_TOPIC_PREFIX}{}", symbol.to_uppercase())
}

/// Destination carrying [`MonteCarloReport`]s for `symbol`
pub fn monte_carlo_topic(symbol: &str) -> String {
    format!("{MONTE_CARLO_TOPIC_PREFIX}{}", symbol.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_upper_case_the_symbol() {
        assert_eq!(risk_topic("btcusdt"), "/topic/risk/BTCUSDT");
        assert_eq!(monte_carlo_topic("EthUsdt"), "/topic/mc/ETHUSDT");
    }
}
