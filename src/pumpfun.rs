// =============================================================================
// pump.fun REST Client — market-data enrichment for tracked mints
// =============================================================================
//
// Trade events from the upstream feed only tell us *that* a mint traded, not
// what it is worth now. This client answers that by querying two public
// pump.fun endpoints in parallel:
//
//   frontend-api-v3  /coins/{mint}           -> USD market cap, graduation
//   advanced-api-v2  /coins/metadata/{mint}  -> 24h volume (SOL), holders
//
// Either endpoint may be down or know nothing about the mint; whatever data
// does arrive is composed into a best-effort snapshot. Only when both come
// back empty is the fetch a miss.
// =============================================================================

use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::market_data::{MarketDataSource, MarketSnapshot};

const COIN_API_BASE: &str = "https://frontend-api-v3.pump.fun";
const METADATA_API_BASE: &str = "https://advanced-api-v2.pump.fun";

/// HTTP client for the public pump.fun APIs.
#[derive(Clone)]
pub struct PumpFunClient {
    client: reqwest::Client,
    coin_api_base: String,
    metadata_api_base: String,
}

impl PumpFunClient {
    /// Create a client with a default HTTP client.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build reqwest client for PumpFunClient"),
            coin_api_base: COIN_API_BASE.to_string(),
            metadata_api_base: METADATA_API_BASE.to_string(),
        }
    }

    /// Fetch and compose market data for one mint.
    ///
    /// Both endpoints are queried concurrently; a failure on one side only
    /// costs that side's fields. `Ok(None)` means neither endpoint had
    /// anything -- the caller treats it as a miss, not an error.
    #[instrument(skip(self), name = "pumpfun::fetch_market_data")]
    pub async fn fetch_market_data(&self, mint: &str) -> Result<Option<MarketSnapshot>> {
        let coin_url = format!("{}/coins/{}", self.coin_api_base, mint);
        let metadata_url = format!("{}/coins/metadata/{}", self.metadata_api_base, mint);

        let (coin, metadata) = tokio::join!(
            self.fetch_json(&coin_url),
            self.fetch_json(&metadata_url),
        );

        let coin = match coin {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(mint = %mint, error = %e, "coin endpoint unavailable");
                None
            }
        };
        let metadata = match metadata {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(mint = %mint, error = %e, "metadata endpoint unavailable");
                None
            }
        };

        Ok(compose_snapshot(coin, metadata))
    }

    /// GET `url` and parse the body as JSON. Non-2xx is an error.
    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }

        resp.json::<Value>()
            .await
            .with_context(|| format!("GET {url} returned invalid JSON"))
    }
}

impl Default for PumpFunClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataSource for PumpFunClient {
    fn fetch<'a>(&'a self, mint: &'a str) -> BoxFuture<'a, Result<Option<MarketSnapshot>>> {
        Box::pin(self.fetch_market_data(mint))
    }
}

// -----------------------------------------------------------------------------
// Response composition
// -----------------------------------------------------------------------------

/// Merge the two endpoint bodies into one snapshot.
///
/// The v3 coin body is authoritative for USD market cap and graduation. Its
/// SOL-denominated `market_cap` alongside the USD one yields the SOL/USD rate
/// used to convert the metadata endpoint's SOL volume; without a rate the
/// volume is passed through in SOL. The metadata `marketcap` only fills in
/// when v3 gave no usable cap.
fn compose_snapshot(coin: Option<Value>, metadata: Option<Value>) -> Option<MarketSnapshot> {
    if coin.is_none() && metadata.is_none() {
        return None;
    }

    let mut market_cap = 0.0;
    let mut graduated = false;
    let mut sol_price_usd = 0.0;

    if let Some(coin) = &coin {
        market_cap = value_as_f64(&coin["usd_market_cap"]).unwrap_or(0.0);
        graduated = coin["complete"].as_bool().unwrap_or(false);

        let market_cap_sol = value_as_f64(&coin["market_cap"]).unwrap_or(0.0);
        if market_cap_sol > 0.0 {
            sol_price_usd = market_cap / market_cap_sol;
        }
    }

    let mut volume_24h = 0.0;
    let mut holders = 0u64;

    if let Some(metadata) = &metadata {
        let volume_sol = value_as_f64(&metadata["volume"]).unwrap_or(0.0);
        volume_24h = if sol_price_usd > 0.0 {
            volume_sol * sol_price_usd
        } else {
            volume_sol
        };

        // num_holders_v2 is the newer field; zero means "not populated yet",
        // same as the old one being absent.
        holders = value_as_u64(&metadata["num_holders_v2"])
            .filter(|&h| h > 0)
            .or_else(|| value_as_u64(&metadata["num_holders"]))
            .unwrap_or(0);

        if !(market_cap > 0.0) {
            market_cap = value_as_f64(&metadata["marketcap"]).unwrap_or(0.0);
        }
    }

    Some(MarketSnapshot {
        market_cap,
        volume_24h,
        holders,
        graduated,
    })
}

/// pump.fun serves numeric fields inconsistently as JSON numbers or strings
/// depending on the endpoint and field.
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse::<u64>().ok(),
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coin_body() -> Value {
        json!({
            "mint": "F9TgEJLLRUKDRF16HgjUCdJfJ5BK6ucyiW8uJxVPpump",
            "name": "Test Coin",
            "symbol": "TEST",
            "usd_market_cap": 60_000.0,
            "market_cap": 400.0,
            "complete": false,
            "total_supply": 1_000_000_000u64,
        })
    }

    fn metadata_body() -> Value {
        json!({
            "volume": 2.0,
            "num_holders_v2": 37,
            "num_holders": 35,
            "marketcap": 59_000.0,
            "trades": 120,
        })
    }

    #[test]
    fn composes_both_endpoints() {
        let snap = compose_snapshot(Some(coin_body()), Some(metadata_body())).unwrap();
        assert_eq!(snap.market_cap, 60_000.0);
        assert!(!snap.graduated);
        // 60_000 USD / 400 SOL = 150 USD per SOL; 2 SOL volume -> 300 USD.
        assert_eq!(snap.volume_24h, 300.0);
        assert_eq!(snap.holders, 37);
    }

    #[test]
    fn coin_endpoint_alone_still_yields_a_snapshot() {
        let snap = compose_snapshot(Some(coin_body()), None).unwrap();
        assert_eq!(snap.market_cap, 60_000.0);
        assert_eq!(snap.volume_24h, 0.0);
        assert_eq!(snap.holders, 0);
    }

    #[test]
    fn metadata_alone_keeps_volume_in_sol_and_uses_fallback_cap() {
        let snap = compose_snapshot(None, Some(metadata_body())).unwrap();
        // No SOL/USD rate available, so volume stays SOL-denominated.
        assert_eq!(snap.volume_24h, 2.0);
        assert_eq!(snap.market_cap, 59_000.0);
        assert_eq!(snap.holders, 37);
        assert!(!snap.graduated);
    }

    #[test]
    fn both_endpoints_empty_is_a_miss() {
        assert_eq!(compose_snapshot(None, None), None);
    }

    #[test]
    fn zero_new_holder_field_falls_back_to_old_one() {
        let metadata = json!({ "num_holders_v2": 0, "num_holders": 12 });
        let snap = compose_snapshot(None, Some(metadata)).unwrap();
        assert_eq!(snap.holders, 12);
    }

    #[test]
    fn graduated_flag_passes_through() {
        let mut coin = coin_body();
        coin["complete"] = json!(true);
        let snap = compose_snapshot(Some(coin), None).unwrap();
        assert!(snap.graduated);
    }

    #[test]
    fn string_encoded_numbers_parse() {
        let coin = json!({
            "usd_market_cap": "12500.5",
            "market_cap": "100",
            "complete": false,
        });
        let snap = compose_snapshot(Some(coin), None).unwrap();
        assert_eq!(snap.market_cap, 12_500.5);
    }

    #[test]
    fn value_helpers_reject_non_numeric_types() {
        assert_eq!(value_as_f64(&json!(true)), None);
        assert_eq!(value_as_f64(&json!("abc")), None);
        assert_eq!(value_as_f64(&json!(null)), None);
        assert_eq!(value_as_f64(&json!(1.5)), Some(1.5));
        assert_eq!(value_as_f64(&json!("1.5")), Some(1.5));

        assert_eq!(value_as_u64(&json!(42)), Some(42));
        assert_eq!(value_as_u64(&json!(42.9)), Some(42));
        assert_eq!(value_as_u64(&json!("42")), Some(42));
        assert_eq!(value_as_u64(&json!(null)), None);
    }
}
