/*
[INPUT]:  Current price from the command line
[OUTPUT]: Text rendering of the estimated liquidation heatmap
[POS]:    Examples - heatmap generation
[UPDATE]: When heatmap API changes
*/

use riskstream_adapter::*;

fn main() {
    let price: f64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(50_000.0);

    let heatmap = generate_heatmap(price, &HeatmapOptions::default());
    println!("=== Liquidation Heatmap @ {price} ===\n");

    for bucket in heatmap.buckets.iter().rev() {
        let long = "#".repeat((bucket.long_vol * 40.0).round() as usize);
        let short = "*".repeat((bucket.short_vol * 40.0).round() as usize);
        println!("{:>12.2} | {long}{short}", bucket.price);
    }

    if let Some((index, bucket)) = heatmap.peak_long() {
        println!("\npeak long  #{index} at {:.2}", bucket.price);
    }
    if let Some((index, bucket)) = heatmap.peak_short() {
        println!("peak short #{index} at {:.2}", bucket.price);
    }
}
