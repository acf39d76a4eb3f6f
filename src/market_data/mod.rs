pub mod candles;
pub mod history;
pub mod source;
pub mod throttle;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use candles::{Candle, CandleAggregator, Timeframe};
pub use history::{MarketHistory, PriceHistory, PricePoint};
pub use source::{MarketDataSource, MarketSnapshot};
pub use throttle::FetchThrottle;
