use std::collections::HashMap;

/// Per-mint rate limiter for market-data fetches.
///
/// Trade events for a hot mint can arrive many times per second; fetching
/// market data on every one would hammer the upstream HTTP API. The throttle
/// admits at most one fetch per mint per window and drops the rest.
///
/// `allow` is a single check-and-record: callers that get `true` own the
/// window, so two concurrent events for the same mint can never both pass.
pub struct FetchThrottle {
    last_fetch: HashMap<String, i64>,
    window_ms: i64,
}

impl FetchThrottle {
    pub fn new(window_ms: i64) -> Self {
        Self {
            last_fetch: HashMap::new(),
            window_ms,
        }
    }

    /// Returns `true` and records `now_ms` if the mint has no prior fetch or
    /// its window has elapsed. A denied call leaves the recorded timestamp
    /// untouched, so the window is measured from the last *granted* fetch.
    pub fn allow(&mut self, mint: &str, now_ms: i64) -> bool {
        match self.last_fetch.get(mint) {
            Some(&last) if now_ms - last < self.window_ms => false,
            _ => {
                self.last_fetch.insert(mint.to_string(), now_ms);
                true
            }
        }
    }

    /// Drop the record for a mint. Called when the last subscriber leaves so
    /// the ledger does not grow with mints nobody watches; the next event for
    /// the mint (if it is ever re-subscribed) fetches immediately.
    pub fn forget(&mut self, mint: &str) {
        self.last_fetch.remove(mint);
    }

    /// Number of mints with a recorded fetch.
    pub fn len(&self) -> usize {
        self.last_fetch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fetch.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "So11111111111111111111111111111111111111112";

    #[test]
    fn first_call_is_allowed() {
        let mut throttle = FetchThrottle::new(5_000);
        assert!(throttle.allow(MINT, 1_000));
    }

    #[test]
    fn calls_inside_window_are_denied() {
        let mut throttle = FetchThrottle::new(5_000);
        assert!(throttle.allow(MINT, 1_000));
        assert!(!throttle.allow(MINT, 1_001));
        assert!(!throttle.allow(MINT, 5_999));
    }

    #[test]
    fn call_at_exact_window_boundary_is_allowed() {
        let mut throttle = FetchThrottle::new(5_000);
        assert!(throttle.allow(MINT, 1_000));
        assert!(throttle.allow(MINT, 6_000));
    }

    #[test]
    fn denied_call_does_not_extend_window() {
        let mut throttle = FetchThrottle::new(5_000);
        assert!(throttle.allow(MINT, 1_000));
        // Denied at 5_999; if this updated the record, 6_000 would also be
        // denied. The window is anchored to the granted fetch at 1_000.
        assert!(!throttle.allow(MINT, 5_999));
        assert!(throttle.allow(MINT, 6_000));
    }

    #[test]
    fn mints_are_throttled_independently() {
        let mut throttle = FetchThrottle::new(5_000);
        assert!(throttle.allow("mintA", 1_000));
        assert!(throttle.allow("mintB", 1_000));
        assert!(!throttle.allow("mintA", 2_000));
        assert!(!throttle.allow("mintB", 2_000));
    }

    #[test]
    fn forget_resets_the_window() {
        let mut throttle = FetchThrottle::new(5_000);
        assert!(throttle.allow(MINT, 1_000));
        assert!(!throttle.allow(MINT, 1_500));
        throttle.forget(MINT);
        assert!(throttle.allow(MINT, 1_500));
    }

    #[test]
    fn forget_unknown_mint_is_a_no_op() {
        let mut throttle = FetchThrottle::new(5_000);
        throttle.forget("never-seen");
        assert!(throttle.is_empty());
    }
}
