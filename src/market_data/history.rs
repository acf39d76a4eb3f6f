use std::collections::{BTreeMap, HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market_data::candles::{Candle, CandleAggregator, Timeframe};

// ---------------------------------------------------------------------------
// Price points
// ---------------------------------------------------------------------------

/// One market-cap observation. `t` is unix milliseconds, `mc` the USD market
/// cap. Short keys match what the charting frontend consumes directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub t: i64,
    pub mc: f64,
}

/// Append-only ring of market-cap points per mint, capped at `max_points`.
///
/// Reads never mutate; there is no read-through trimming. Non-positive and
/// NaN values are silently ignored so a bad upstream response can never
/// poison a chart with a zero spike.
pub struct PriceHistory {
    series: HashMap<String, VecDeque<PricePoint>>,
    max_points: usize,
}

impl PriceHistory {
    pub fn new(max_points: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_points,
        }
    }

    /// Append a point, evicting the oldest when the ring is full.
    pub fn append(&mut self, mint: &str, point: PricePoint) {
        if !(point.mc > 0.0) {
            return;
        }
        let ring = self
            .series
            .entry(mint.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.max_points));
        ring.push_back(point);
        while ring.len() > self.max_points {
            ring.pop_front();
        }
    }

    /// Full retained sequence, oldest first. Empty for unknown mints.
    pub fn get(&self, mint: &str) -> Vec<PricePoint> {
        self.series
            .get(mint)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, mint: &str) -> bool {
        self.series.contains_key(mint)
    }

    pub fn remove(&mut self, mint: &str) {
        self.series.remove(mint);
    }

    pub fn mint_count(&self) -> usize {
        self.series.len()
    }
}

// ---------------------------------------------------------------------------
// MarketHistory -- points + candles behind one lock, FIFO-bounded
// ---------------------------------------------------------------------------

struct HistoryInner {
    points: PriceHistory,
    candles: CandleAggregator,
    /// Mints in first-tracked order. Front is the next eviction victim.
    order: VecDeque<String>,
    max_tracked: usize,
}

/// Combined retention store for everything the service remembers per mint:
/// the raw point series and the per-timeframe candle series.
///
/// Both live behind a single `RwLock` so one `record` call is atomic: a
/// reader never observes a point without its candle update, and the global
/// mint cap is enforced in the same critical section. Eviction is FIFO by
/// first-tracked order -- deliberately not LRU, so a long-lived mint cannot
/// pin its slot forever by staying active while fresher mints churn out.
pub struct MarketHistory {
    inner: RwLock<HistoryInner>,
}

impl MarketHistory {
    pub fn new(max_points: usize, max_candles: usize, max_tracked: usize) -> Self {
        Self {
            inner: RwLock::new(HistoryInner {
                points: PriceHistory::new(max_points),
                candles: CandleAggregator::new(max_candles),
                order: VecDeque::new(),
                max_tracked,
            }),
        }
    }

    /// Record one market-cap sample for `mint` at `ts_ms`: append the point,
    /// fold the value into every timeframe's candle, then evict the oldest
    /// tracked mints if the global cap is exceeded.
    ///
    /// Non-positive and NaN values are dropped before the mint is tracked at
    /// all, so a mint whose only samples are invalid never occupies a slot.
    pub fn record(&self, mint: &str, market_cap: f64, ts_ms: i64) {
        if !(market_cap > 0.0) {
            return;
        }

        let mut inner = self.inner.write();

        if !inner.points.contains(mint) {
            inner.order.push_back(mint.to_string());
        }

        inner.points.append(mint, PricePoint { t: ts_ms, mc: market_cap });
        inner.candles.update(mint, market_cap, ts_ms);

        while inner.order.len() > inner.max_tracked {
            if let Some(evicted) = inner.order.pop_front() {
                inner.points.remove(&evicted);
                inner.candles.remove(&evicted);
                debug!(mint = %evicted, "evicted oldest tracked mint");
            }
        }
    }

    /// Retained point sequence for `mint`, oldest first.
    pub fn price_history(&self, mint: &str) -> Vec<PricePoint> {
        self.inner.read().points.get(mint)
    }

    /// Retained candle sequence for one (mint, timeframe), oldest first.
    pub fn candle_history(&self, mint: &str, tf: Timeframe) -> Vec<Candle> {
        self.inner.read().candles.history(mint, tf)
    }

    /// Latest candle per timeframe, for the broadcast payload.
    pub fn current_candles(&self, mint: &str) -> BTreeMap<Timeframe, Candle> {
        self.inner.read().candles.current(mint)
    }

    /// Number of mints currently holding history.
    pub fn tracked_count(&self) -> usize {
        self.inner.read().order.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "F9TgEJLLRUKDRF16HgjUCdJfJ5BK6ucyiW8uJxVPpump";

    fn point(t: i64, mc: f64) -> PricePoint {
        PricePoint { t, mc }
    }

    #[test]
    fn append_caps_at_max_points() {
        let mut history = PriceHistory::new(3);
        for i in 0..5 {
            history.append(MINT, point(i, 100.0 + i as f64));
        }

        let points = history.get(MINT);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].t, 2);
        assert_eq!(points[2].mc, 104.0);
    }

    #[test]
    fn non_positive_values_are_ignored() {
        let mut history = PriceHistory::new(10);
        history.append(MINT, point(1, 0.0));
        history.append(MINT, point(2, -5.0));
        history.append(MINT, point(3, f64::NAN));
        assert!(history.get(MINT).is_empty());

        history.append(MINT, point(4, 1.0));
        assert_eq!(history.get(MINT).len(), 1);
    }

    #[test]
    fn get_unknown_mint_is_empty() {
        let history = PriceHistory::new(10);
        assert!(history.get("unknown").is_empty());
        assert!(!history.contains("unknown"));
    }

    #[test]
    fn reads_do_not_mutate() {
        let mut history = PriceHistory::new(10);
        history.append(MINT, point(1, 100.0));

        let first = history.get(MINT);
        let second = history.get(MINT);
        assert_eq!(first.len(), second.len());
        assert_eq!(history.mint_count(), 1);
    }

    #[test]
    fn record_feeds_both_points_and_candles() {
        let market = MarketHistory::new(500, 500, 200);
        market.record(MINT, 1_000.0, 61_000);

        let points = market.price_history(MINT);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].t, 61_000);
        assert_eq!(points[0].mc, 1_000.0);

        let candles = market.current_candles(MINT);
        assert_eq!(candles.len(), 4);
        assert_eq!(candles[&Timeframe::M1].bucket_start, 60_000);
        assert_eq!(candles[&Timeframe::M1].open, 1_000.0);
    }

    #[test]
    fn invalid_values_never_track_the_mint() {
        let market = MarketHistory::new(500, 500, 200);
        market.record(MINT, 0.0, 1_000);
        market.record(MINT, f64::NAN, 2_000);

        assert_eq!(market.tracked_count(), 0);
        assert!(market.price_history(MINT).is_empty());
        assert!(market.current_candles(MINT).is_empty());
    }

    #[test]
    fn fifo_eviction_drops_earliest_tracked_mint() {
        let market = MarketHistory::new(500, 500, 2);
        market.record("mintA", 100.0, 1_000);
        market.record("mintB", 200.0, 2_000);
        market.record("mintC", 300.0, 3_000);

        assert_eq!(market.tracked_count(), 2);
        assert!(market.price_history("mintA").is_empty());
        assert!(market.current_candles("mintA").is_empty());
        assert_eq!(market.price_history("mintB").len(), 1);
        assert_eq!(market.price_history("mintC").len(), 1);
    }

    #[test]
    fn eviction_is_fifo_not_lru() {
        let market = MarketHistory::new(500, 500, 2);
        market.record("mintA", 100.0, 1_000);
        market.record("mintB", 200.0, 2_000);
        // mintA stays hot; under LRU it would survive. FIFO still evicts it.
        market.record("mintA", 110.0, 3_000);
        market.record("mintA", 120.0, 4_000);
        market.record("mintC", 300.0, 5_000);

        assert!(market.price_history("mintA").is_empty());
        assert_eq!(market.price_history("mintB").len(), 1);
        assert_eq!(market.price_history("mintC").len(), 1);
        assert_eq!(market.tracked_count(), 2);
    }

    #[test]
    fn re_recorded_mint_after_eviction_counts_as_new() {
        let market = MarketHistory::new(500, 500, 2);
        market.record("mintA", 100.0, 1_000);
        market.record("mintB", 200.0, 2_000);
        market.record("mintC", 300.0, 3_000); // evicts A

        market.record("mintA", 150.0, 4_000); // evicts B, A re-enters fresh
        assert_eq!(market.price_history("mintA").len(), 1);
        assert!(market.price_history("mintB").is_empty());
        assert_eq!(market.tracked_count(), 2);
    }
}
