/*
[INPUT]:  Public API exports for riskstream-monitor crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod monitor;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use monitor::{HeatmapSummary, MonitorStats, ReportKind, RiskMonitor, summarize_heatmap};
