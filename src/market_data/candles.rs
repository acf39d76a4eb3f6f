use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timeframes
// ---------------------------------------------------------------------------

/// Candle timeframes the aggregator maintains for every tracked mint.
///
/// The set is fixed: every market-cap sample updates all four series, so a
/// client switching chart resolution never waits for history to rebuild.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
    ];

    /// Bucket width in milliseconds.
    pub fn interval_ms(self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M5 => 300_000,
            Timeframe::M15 => 900_000,
            Timeframe::H1 => 3_600_000,
        }
    }

    /// The wire label, matching the serde rename ("1m", "5m", "15m", "1h").
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
        }
    }

    /// Parse a wire label back into a timeframe.
    pub fn parse(s: &str) -> Option<Timeframe> {
        Timeframe::ALL.into_iter().find(|tf| tf.label() == s)
    }

    /// Start of the bucket containing `ts_ms`, aligned by floor division.
    /// Deterministic: the same timestamp always lands in the same bucket.
    pub fn bucket_start(self, ts_ms: i64) -> i64 {
        (ts_ms / self.interval_ms()) * self.interval_ms()
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// A single OHLC candle built from market-cap samples.
///
/// Serialised with single-letter keys (`t`/`o`/`h`/`l`/`c`) for the charting
/// frontend. `t` is the bucket start in unix milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "t")]
    pub bucket_start: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
}

// ---------------------------------------------------------------------------
// CandleAggregator -- incremental OHLC series per (mint, timeframe)
// ---------------------------------------------------------------------------

/// Builds OHLC candles incrementally from irregular market-cap samples.
///
/// There is no tick data here: samples arrive whenever a trade event passes
/// the fetch throttle, so candles are built sample-by-sample. Within a bucket
/// the open never changes; high/low widen and close follows the latest sample.
/// When a sample crosses into a new bucket, the new candle opens at the prior
/// candle's close so consecutive candles always chain without gaps, even when
/// the mint was quiet for several buckets.
///
/// Not internally synchronised -- [`super::MarketHistory`] wraps it together
/// with the point store behind one lock.
pub struct CandleAggregator {
    series: HashMap<String, HashMap<Timeframe, VecDeque<Candle>>>,
    max_candles: usize,
}

impl CandleAggregator {
    /// Create an aggregator retaining at most `max_candles` per
    /// (mint, timeframe) pair.
    pub fn new(max_candles: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_candles,
        }
    }

    /// Fold one market-cap sample into all timeframe series for `mint`.
    pub fn update(&mut self, mint: &str, value: f64, ts_ms: i64) {
        let series = self.series.entry(mint.to_string()).or_default();

        for tf in Timeframe::ALL {
            let bucket = tf.bucket_start(ts_ms);
            let ring = series.entry(tf).or_default();

            let start_new = ring.back().map_or(true, |last| last.bucket_start != bucket);

            if start_new {
                // Continuity rule: open at the prior close (or at the sample
                // itself for the very first candle).
                let open = ring.back().map_or(value, |prev| prev.close);
                ring.push_back(Candle {
                    bucket_start: bucket,
                    open,
                    high: open.max(value),
                    low: open.min(value),
                    close: value,
                });
                while ring.len() > self.max_candles {
                    ring.pop_front();
                }
            } else if let Some(last) = ring.back_mut() {
                last.high = last.high.max(value);
                last.low = last.low.min(value);
                last.close = value;
            }
        }
    }

    /// The most recent (possibly still-open) candle for each timeframe that
    /// has at least one. Timeframes with no candles are omitted.
    pub fn current(&self, mint: &str) -> BTreeMap<Timeframe, Candle> {
        let mut out = BTreeMap::new();
        if let Some(series) = self.series.get(mint) {
            for tf in Timeframe::ALL {
                if let Some(candle) = series.get(&tf).and_then(|ring| ring.back()) {
                    out.insert(tf, candle.clone());
                }
            }
        }
        out
    }

    /// Full retained candle sequence for one (mint, timeframe), oldest first.
    pub fn history(&self, mint: &str, tf: Timeframe) -> Vec<Candle> {
        self.series
            .get(mint)
            .and_then(|series| series.get(&tf))
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every series for `mint`.
    pub fn remove(&mut self, mint: &str) {
        self.series.remove(mint);
    }

    /// Number of mints with at least one candle series.
    pub fn mint_count(&self) -> usize {
        self.series.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
