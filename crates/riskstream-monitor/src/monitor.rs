/*
[INPUT]:  MonitorConfig, Transport, CancellationToken
[OUTPUT]: Logged connection events, risk reports and heatmap summaries; final MonitorStats
[POS]:    Application layer - wires StompClient subscriptions to report handling
[UPDATE]: When adding report types or changing shutdown order
*/

use anyhow::{Context, Result};
use riskstream_adapter::{
    CascadeRiskReport, ConnectionEvent, HeatmapOptions, MonteCarloReport, StompClient,
    StompMessage, Subscription, Transport, WsTransport, generate_heatmap, monte_carlo_topic,
    risk_topic,
};
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Cascade,
    MonteCarlo,
}

/// Counters published while the monitor runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub connects: u64,
    pub disconnects: u64,
    pub cascade_reports: u64,
    pub monte_carlo_reports: u64,
    pub heatmaps: u64,
    pub undecodable: u64,
}

/// Peak liquidation densities around one price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatmapSummary {
    pub current_price: f64,
    pub peak_long_price: Option<f64>,
    pub peak_long_density: f64,
    pub peak_short_price: Option<f64>,
    pub peak_short_density: f64,
}

/// Build the heatmap for `current_price` and keep only the peaks.
///
/// Returns `None` for non-positive or non-finite prices.
pub fn summarize_heatmap(current_price: f64, options: &HeatmapOptions) -> Option<HeatmapSummary> {
    if !current_price.is_finite() || current_price <= 0.0 {
        return None;
    }

    let heatmap = generate_heatmap(current_price, options);
    let peak_long = heatmap.peak_long().map(|(_, bucket)| *bucket);
    let peak_short = heatmap.peak_short().map(|(_, bucket)| *bucket);

    Some(HeatmapSummary {
        current_price,
        peak_long_price: peak_long.map(|bucket| bucket.price),
        peak_long_density: peak_long.map_or(0.0, |bucket| bucket.long_vol),
        peak_short_price: peak_short.map(|bucket| bucket.price),
        peak_short_density: peak_short.map_or(0.0, |bucket| bucket.short_vol),
    })
}

pub struct RiskMonitor<T: Transport = WsTransport> {
    config: MonitorConfig,
    client: StompClient<T>,
    shutdown: CancellationToken,
    stats_tx: watch::Sender<MonitorStats>,
}

impl RiskMonitor<WsTransport> {
    pub fn new(config: MonitorConfig) -> Self {
        Self::with_transport(config, WsTransport::new())
    }
}

impl<T: Transport> RiskMonitor<T> {
    pub fn with_transport(config: MonitorConfig, transport: T) -> Self {
        let client = StompClient::with_transport(config.client_config(), transport);
        let (stats_tx, _) = watch::channel(MonitorStats::default());
        Self {
            config,
            client,
            shutdown: CancellationToken::new(),
            stats_tx,
        }
    }

    /// Token that stops `run` when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<MonitorStats> {
        self.stats_tx.subscribe()
    }

    /// Connect, subscribe every configured symbol, and process reports until shutdown.
    pub async fn run(mut self) -> Result<MonitorStats> {
        let mut events = self
            .client
            .take_events()
            .context("connection events already taken")?;

        self.client
            .connect(&self.config.url)
            .with_context(|| format!("connect to {}", self.config.url))?;
        info!(url = %self.config.url, symbols = ?self.config.symbols, "risk monitor connecting");

        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let mut forwarders = Vec::with_capacity(self.config.symbols.len() * 2);
        for symbol in &self.config.symbols {
            let topics = [
                (ReportKind::Cascade, risk_topic(symbol)),
                (ReportKind::MonteCarlo, monte_carlo_topic(symbol)),
            ];
            for (kind, destination) in topics {
                let subscription = match self.client.subscribe(&destination) {
                    Ok(subscription) => subscription,
                    Err(err) => {
                        forwarders.iter().for_each(|handle: &JoinHandle<()>| handle.abort());
                        return Err(err).with_context(|| format!("subscribe {destination}"));
                    }
                };
                debug!(destination = %destination, id = subscription.id(), "subscribed");
                forwarders.push(tokio::spawn(forward_reports(kind, subscription, report_tx.clone())));
            }
        }
        drop(report_tx);

        let mut stats = MonitorStats::default();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("risk monitor shutdown requested");
                    break;
                }
                Some(event) = events.recv() => {
                    self.handle_event(event, &mut stats);
                }
                Some((kind, message)) = report_rx.recv() => {
                    self.handle_report(kind, &message, &mut stats);
                }
                else => break,
            }
            self.stats_tx.send_replace(stats);
        }

        if let Err(err) = self.client.disconnect() {
            warn!(error = %err, "disconnect failed");
        }
        self.client.shutdown();
        for handle in forwarders {
            let _ = handle.await;
        }

        info!(
            connects = stats.connects,
            disconnects = stats.disconnects,
            cascade_reports = stats.cascade_reports,
            monte_carlo_reports = stats.monte_carlo_reports,
            "risk monitor stopped"
        );
        Ok(stats)
    }

    fn handle_event(&self, event: ConnectionEvent, stats: &mut MonitorStats) {
        match event {
            ConnectionEvent::Connected => {
                stats.connects += 1;
                info!(url = %self.config.url, "risk stream connected");
            }
            ConnectionEvent::Disconnected => {
                stats.disconnects += 1;
                warn!(url = %self.config.url, "risk stream disconnected; reconnecting");
            }
        }
    }

    fn handle_report(&self, kind: ReportKind, message: &StompMessage, stats: &mut MonitorStats) {
        match kind {
            ReportKind::Cascade => match message.decode::<CascadeRiskReport>() {
                Ok(report) => {
                    stats.cascade_reports += 1;
                    if self.log_cascade_report(&report) {
                        stats.heatmaps += 1;
                    }
                }
                Err(err) => {
                    stats.undecodable += 1;
                    warn!(subscription = %message.subscription, error = %err, "invalid cascade risk report");
                }
            },
            ReportKind::MonteCarlo => match message.decode::<MonteCarloReport>() {
                Ok(report) => {
                    stats.monte_carlo_reports += 1;
                    log_monte_carlo_report(&report);
                }
                Err(err) => {
                    stats.undecodable += 1;
                    warn!(subscription = %message.subscription, error = %err, "invalid monte carlo report");
                }
            },
        }
    }

    /// Returns true when a heatmap summary was produced
    fn log_cascade_report(&self, report: &CascadeRiskReport) -> bool {
        info!(
            symbol = %report.symbol,
            risk_level = report.risk_level.as_deref().unwrap_or("-"),
            current_price = ?report.current_price,
            liquidation_price = ?report.user_liquidation_price,
            distance_percent = report.distance_percent,
            reach_probability = ?report.cascade_reach_probability,
            "cascade risk report"
        );

        let Some(price) = report.current_price.and_then(|price| price.to_f64()) else {
            return false;
        };
        let Some(summary) = summarize_heatmap(price, &self.config.heatmap) else {
            return false;
        };

        info!(
            symbol = %report.symbol,
            current_price = summary.current_price,
            peak_long_price = ?summary.peak_long_price,
            peak_long_density = summary.peak_long_density,
            peak_short_price = ?summary.peak_short_price,
            peak_short_density = summary.peak_short_density,
            "liquidation heatmap"
        );
        true
    }
}

fn log_monte_carlo_report(report: &MonteCarloReport) {
    let worst = report.worst_horizon();
    info!(
        symbol = %report.symbol,
        risk_level = ?report.risk_level,
        paths = report.path_count,
        worst_horizon_minutes = worst.map(|horizon| horizon.minutes),
        worst_probability = worst.map(|horizon| horizon.liquidation_probability),
        "monte carlo report"
    );
}

async fn forward_reports(
    kind: ReportKind,
    mut subscription: Subscription,
    reports: mpsc::UnboundedSender<(ReportKind, StompMessage)>,
) {
    while let Some(message) = subscription.recv().await {
        if reports.send((kind, message)).is_err() {
            break;
        }
    }
    debug!(destination = subscription.destination(), "subscription ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_peaks_sit_around_the_price() {
        let summary = summarize_heatmap(50_000.0, &HeatmapOptions::default()).expect("summary");

        let long = summary.peak_long_price.expect("long peak");
        let short = summary.peak_short_price.expect("short peak");
        assert!(long < 50_000.0);
        assert!(short > 50_000.0);
        assert!(summary.peak_long_density > 0.0);
        assert_eq!(summary.peak_long_density.max(summary.peak_short_density), 1.0);
    }

    #[test]
    fn summary_skips_unusable_prices() {
        let options = HeatmapOptions::default();
        assert!(summarize_heatmap(0.0, &options).is_none());
        assert!(summarize_heatmap(-1.0, &options).is_none());
        assert!(summarize_heatmap(f64::NAN, &options).is_none());
    }
}
