use anyhow::Result;
use futures_util::future::BoxFuture;

/// Market data for one mint as returned by an enrichment fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSnapshot {
    /// USD market cap.
    pub market_cap: f64,
    /// 24 h traded volume in USD (SOL-denominated when no rate is known).
    pub volume_24h: f64,
    /// Holder count.
    pub holders: u64,
    /// Whether the token has completed its bonding curve.
    pub graduated: bool,
}

/// Enrichment boundary (typically backed by REST).
///
/// `Ok(None)` is a miss -- the source knows nothing about the mint right now
/// and the caller has nothing to report this cycle. `Err` is a transport
/// fault; callers log it and move on, never crash.
pub trait MarketDataSource: Send + Sync {
    fn fetch<'a>(&'a self, mint: &'a str) -> BoxFuture<'a, Result<Option<MarketSnapshot>>>;
}
