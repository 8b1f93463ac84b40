/*
[INPUT]:  Current price and bucket/range options
[OUTPUT]: Normalized long/short liquidation density per price bucket
[POS]:    Analytics layer - leverage-weighted liquidation heatmap (pure, no I/O)
[UPDATE]: When changing the leverage table, smoothing kernel, or normalization
*/

use serde::{Deserialize, Serialize};

const DEFAULT_PRICE_BUCKET_COUNT: usize = 60;
const DEFAULT_PRICE_RANGE_PERCENT: f64 = 10.0;

/// Spread width is `bucket_count / (leverage * SPREAD_ATTENUATION)`
const SPREAD_ATTENUATION: f64 = 0.8;
const GAUSSIAN_COEFFICIENT: f64 = -3.0;
const MIN_NORMALIZER: f64 = 0.001;
/// Fraction of a bucket absorbed when flooring, so exact boundaries survive float noise.
/// A price equal to `max_price` therefore maps past the last bucket: the 10x short
/// liquidation price sits exactly on the upper edge of the default grid and is dropped.
const INDEX_EPSILON: f64 = 1e-9;

/// Assumed share of open interest opened at a given leverage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageTier {
    pub leverage: f64,
    pub weight: f64,
}

/// Market-wide leverage distribution. Weights sum to 1.0.
pub const LEVERAGE_TIERS: [LeverageTier; 8] = [
    LeverageTier { leverage: 100.0, weight: 0.05 },
    LeverageTier { leverage: 50.0, weight: 0.15 },
    LeverageTier { leverage: 25.0, weight: 0.25 },
    LeverageTier { leverage: 20.0, weight: 0.15 },
    LeverageTier { leverage: 10.0, weight: 0.20 },
    LeverageTier { leverage: 5.0, weight: 0.12 },
    LeverageTier { leverage: 3.0, weight: 0.05 },
    LeverageTier { leverage: 2.0, weight: 0.03 },
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapOptions {
    #[serde(default = "default_price_bucket_count")]
    pub price_bucket_count: usize,
    #[serde(default = "default_price_range_percent")]
    pub price_range_percent: f64,
}

impl HeatmapOptions {
    /// Zero or non-finite settings fall back to the defaults
    fn resolved(&self) -> (usize, f64) {
        let bucket_count = if self.price_bucket_count == 0 {
            DEFAULT_PRICE_BUCKET_COUNT
        } else {
            self.price_bucket_count
        };
        let range_percent = if self.price_range_percent == 0.0 || !self.price_range_percent.is_finite() {
            DEFAULT_PRICE_RANGE_PERCENT
        } else {
            self.price_range_percent
        };
        (bucket_count, range_percent)
    }
}

impl Default for HeatmapOptions {
    fn default() -> Self {
        Self {
            price_bucket_count: DEFAULT_PRICE_BUCKET_COUNT,
            price_range_percent: DEFAULT_PRICE_RANGE_PERCENT,
        }
    }
}

fn default_price_bucket_count() -> usize {
    DEFAULT_PRICE_BUCKET_COUNT
}

fn default_price_range_percent() -> f64 {
    DEFAULT_PRICE_RANGE_PERCENT
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    /// Bucket midpoint
    pub price: f64,
    pub long_vol: f64,
    pub short_vol: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapResult {
    /// Index 0 is the lowest price
    pub buckets: Vec<Bucket>,
    pub min_price: f64,
    pub max_price: f64,
    pub current_price: f64,
}

impl HeatmapResult {
    pub fn step(&self) -> f64 {
        if self.buckets.is_empty() {
            return 0.0;
        }
        (self.max_price - self.min_price) / self.buckets.len() as f64
    }

    /// Bucket holding `price`, or `None` outside `[min_price, max_price)`
    pub fn bucket_index(&self, price: f64) -> Option<usize> {
        price_to_bucket_index(price, self.min_price, self.step(), self.buckets.len())
    }

    /// `(index, bucket)` with the highest long liquidation density
    pub fn peak_long(&self) -> Option<(usize, &Bucket)> {
        self.peak_by(|bucket| bucket.long_vol)
    }

    /// `(index, bucket)` with the highest short liquidation density
    pub fn peak_short(&self) -> Option<(usize, &Bucket)> {
        self.peak_by(|bucket| bucket.short_vol)
    }

    fn peak_by(&self, field: impl Fn(&Bucket) -> f64) -> Option<(usize, &Bucket)> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| field(bucket) > 0.0)
            .fold(None, |best: Option<(usize, &Bucket)>, (index, bucket)| match best {
                Some((_, current)) if field(current) >= field(bucket) => best,
                _ => Some((index, bucket)),
            })
    }
}

/// Estimate liquidation density around `current_price` from the fixed leverage table.
///
/// `current_price` must be positive; the engine does not validate it.
pub fn generate(current_price: f64, options: &HeatmapOptions) -> HeatmapResult {
    generate_with_tiers(current_price, options, &LEVERAGE_TIERS)
}

/// Same as [`generate`] with a caller-supplied leverage distribution
pub fn generate_with_tiers(
    current_price: f64,
    options: &HeatmapOptions,
    tiers: &[LeverageTier],
) -> HeatmapResult {
    let (bucket_count, range_percent) = options.resolved();

    let min_price = current_price * (1.0 - range_percent / 100.0);
    let max_price = current_price * (1.0 + range_percent / 100.0);
    let step = (max_price - min_price) / bucket_count as f64;

    let mut buckets: Vec<Bucket> = (0..bucket_count)
        .map(|i| Bucket {
            price: min_price + step * (i as f64 + 0.5),
            long_vol: 0.0,
            short_vol: 0.0,
        })
        .collect();

    for tier in tiers {
        let long_liq_price = current_price * (1.0 - 1.0 / tier.leverage);
        if let Some(center) = price_to_bucket_index(long_liq_price, min_price, step, bucket_count) {
            spread_volume(&mut buckets, center, tier, |bucket| &mut bucket.long_vol);
        }

        let short_liq_price = current_price * (1.0 + 1.0 / tier.leverage);
        if let Some(center) = price_to_bucket_index(short_liq_price, min_price, step, bucket_count) {
            spread_volume(&mut buckets, center, tier, |bucket| &mut bucket.short_vol);
        }
    }

    let max_vol = buckets
        .iter()
        .map(|bucket| bucket.long_vol.max(bucket.short_vol))
        .fold(MIN_NORMALIZER, f64::max);
    for bucket in &mut buckets {
        bucket.long_vol /= max_vol;
        bucket.short_vol /= max_vol;
    }

    HeatmapResult {
        buckets,
        min_price,
        max_price,
        current_price,
    }
}

/// Out-of-range prices are rejected, never clamped to an edge bucket
fn price_to_bucket_index(price: f64, min_price: f64, step: f64, bucket_count: usize) -> Option<usize> {
    let index = ((price - min_price) / step + INDEX_EPSILON).floor();
    if index >= 0.0 && index < bucket_count as f64 {
        Some(index as usize)
    } else {
        None
    }
}

fn spread_volume(
    buckets: &mut [Bucket],
    center: usize,
    tier: &LeverageTier,
    field: impl Fn(&mut Bucket) -> &mut f64,
) {
    let bucket_count = buckets.len();
    let spread = ((bucket_count as f64 / (tier.leverage * SPREAD_ATTENUATION)).floor() as i64).max(1);

    for offset in -spread..=spread {
        let index = center as i64 + offset;
        if index < 0 || index >= bucket_count as i64 {
            continue;
        }

        let distance = offset as f64 / spread as f64;
        let kernel = (GAUSSIAN_COEFFICIENT * distance * distance).exp();
        *field(&mut buckets[index as usize]) += tier.weight * kernel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    fn all_values(result: &HeatmapResult) -> impl Iterator<Item = f64> + '_ {
        result
            .buckets
            .iter()
            .flat_map(|bucket| [bucket.long_vol, bucket.short_vol])
    }

    #[test]
    fn leverage_weights_sum_to_one() {
        let total: f64 = LEVERAGE_TIERS.iter().map(|tier| tier.weight).sum();
        assert!(approx(total, 1.0));
    }

    #[test]
    fn default_range_around_50k() {
        let result = generate(50_000.0, &HeatmapOptions::default());

        assert_eq!(result.buckets.len(), 60);
        assert!(approx(result.min_price, 45_000.0));
        assert!(approx(result.max_price, 55_000.0));
        assert!((result.step() - 166.6667).abs() < 1e-3);
        assert_eq!(result.current_price, 50_000.0);
        assert!(approx(result.buckets[0].price, 45_000.0 + result.step() / 2.0));
    }

    #[test]
    fn normalized_peak_is_exactly_one() {
        let result = generate(50_000.0, &HeatmapOptions::default());

        let max = all_values(&result).fold(0.0, f64::max);
        assert_eq!(max, 1.0);
        assert!(all_values(&result).all(|v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn hundred_x_long_lands_in_bucket_27() {
        let result = generate(50_000.0, &HeatmapOptions::default());
        assert_eq!(result.bucket_index(49_500.0), Some(27));

        // Bucket 27 only receives the 100x tier; the global peak is the 25x center (bucket 18)
        // plus the tail of the 20x kernel three buckets away.
        let peak = 0.25 + 0.15 * (-3.0f64).exp();
        assert!(approx(result.buckets[27].long_vol, 0.05 / peak));
        assert!(approx(result.buckets[26].long_vol, 0.05 * (-3.0f64).exp() / peak));
        assert!(approx(result.buckets[18].long_vol, 1.0));
    }

    #[test]
    fn long_and_short_sides_are_mirrored() {
        let result = generate(50_000.0, &HeatmapOptions::default());
        assert!(approx(result.buckets[27].long_vol, result.buckets[33].short_vol));
        assert!(approx(result.buckets[18].long_vol, result.buckets[42].short_vol));

        let (long_idx, _) = result.peak_long().unwrap();
        let (short_idx, _) = result.peak_short().unwrap();
        assert_eq!(long_idx, 18);
        assert_eq!(short_idx, 42);
    }

    #[test]
    fn out_of_range_tier_contributes_nothing() {
        let options = HeatmapOptions {
            price_bucket_count: 60,
            price_range_percent: 1.0,
        };
        let full = generate(50_000.0, &options);
        let without_2x: Vec<LeverageTier> = LEVERAGE_TIERS
            .iter()
            .copied()
            .filter(|tier| tier.leverage != 2.0)
            .collect();
        let reduced = generate_with_tiers(50_000.0, &options, &without_2x);

        assert_eq!(full.bucket_index(25_000.0), None);
        assert_eq!(full, reduced);
    }

    #[test]
    fn narrow_range_only_keeps_highest_leverage_long() {
        let options = HeatmapOptions {
            price_bucket_count: 60,
            price_range_percent: 1.0,
        };
        let result = generate(50_000.0, &options);

        assert!(approx(result.buckets[0].long_vol, 1.0));
        assert!(approx(result.buckets[1].long_vol, (-3.0f64).exp()));
        assert!(result.buckets[2..].iter().all(|b| b.long_vol == 0.0));
        assert!(result.buckets.iter().all(|b| b.short_vol == 0.0));
    }

    #[test]
    fn no_tier_in_range_yields_all_zero() {
        let options = HeatmapOptions {
            price_bucket_count: 40,
            price_range_percent: 0.5,
        };
        let result = generate(50_000.0, &options);

        assert_eq!(result.buckets.len(), 40);
        assert!(all_values(&result).all(|v| v == 0.0));
        assert!(result.peak_long().is_none());
        assert!(result.peak_short().is_none());
    }

    #[test]
    fn ten_x_short_on_upper_edge_is_out_of_range() {
        let result = generate(50_000.0, &HeatmapOptions::default());
        assert_eq!(result.bucket_index(55_000.0), None);
        assert_eq!(result.bucket_index(result.max_price), None);

        // Nearest in-range short center is 20x at bucket 45 with a spread of 3.
        assert!(result.buckets[49..].iter().all(|b| b.short_vol == 0.0));
        assert!(result.buckets[48].short_vol > 0.0);
    }

    #[test]
    fn bucket_index_rejects_out_of_range_prices() {
        let result = generate(100.0, &HeatmapOptions::default());
        assert_eq!(result.bucket_index(89.0), None);
        assert_eq!(result.bucket_index(110.0), None);
        assert_eq!(result.bucket_index(90.0), Some(0));
        assert_eq!(result.bucket_index(f64::NAN), None);
    }

    #[test]
    fn zero_options_fall_back_to_defaults() {
        let options = HeatmapOptions {
            price_bucket_count: 0,
            price_range_percent: 0.0,
        };
        assert_eq!(generate(50_000.0, &options), generate(50_000.0, &HeatmapOptions::default()));
    }

    #[test]
    fn generate_is_deterministic() {
        let options = HeatmapOptions {
            price_bucket_count: 120,
            price_range_percent: 25.0,
        };
        assert_eq!(generate(3_150.25, &options), generate(3_150.25, &options));
    }
}
