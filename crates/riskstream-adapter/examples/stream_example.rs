/*
[INPUT]:  STOMP WebSocket URL and symbol from the command line
[OUTPUT]: Cascade risk reports printed as they arrive
[POS]:    Examples - STOMP stream handling
[UPDATE]: When StompClient API changes
*/

use riskstream_adapter::*;
use tokio::time::{timeout, Duration};

/// Example: follow the cascade risk topic for one symbol
///
/// Usage: cargo run --example stream_example -- ws://localhost:8080/ws BTCUSDT
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "ws://localhost:8080/ws".to_string());
    let symbol = args.next().unwrap_or_else(|| "BTCUSDT".to_string());

    println!("=== Risk Stream Example ===\n");

    let mut client = StompClient::new(StompClientConfig::default());
    let mut events = client.take_events().ok_or(RiskStreamError::ClientClosed)?;
    let mut reports = client.subscribe(&risk_topic(&symbol))?;
    client.connect(&url)?;
    println!("✓ Connecting to {url}, subscribed to {}", reports.destination());

    for _ in 0..10 {
        tokio::select! {
            Some(event) = events.recv() => println!("connection: {event:?}"),
            message = timeout(Duration::from_secs(30), reports.recv()) => match message {
                Ok(Some(message)) => match message.decode::<CascadeRiskReport>() {
                    Ok(report) => println!(
                        "{} price={:?} liq={:?} risk={}",
                        report.symbol,
                        report.current_price,
                        report.user_liquidation_price,
                        report.risk_level.as_deref().unwrap_or("-"),
                    ),
                    Err(err) => println!("undecodable report: {err}"),
                },
                Ok(None) => break,
                Err(_) => println!("no report within 30s"),
            },
        }
    }

    client.disconnect()?;
    println!("\n✓ Stream example complete");
    Ok(())
}
