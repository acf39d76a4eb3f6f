// =============================================================================
// Wire protocol types shared between the broker and the WebSocket API
// =============================================================================
//
// The JSON shapes here are consumed by browser clients, so field names follow
// the frontend's camelCase convention rather than Rust's snake_case.
// =============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::market_data::{Candle, Timeframe};

/// Message sent by a downstream client over the WebSocket.
///
/// Only `subscribe` exists today; unknown `type` values fail to deserialise
/// and are dropped by the connection handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Subscribe the connection to trade updates for one or more mints.
    /// Entries are raw JSON values because clients occasionally send nulls or
    /// numbers in the array; non-string entries are skipped during validation.
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(default)]
        mints: Vec<serde_json::Value>,
    },
}

/// Message pushed to downstream clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Fresh market data for a single mint, sent after each enrichment cycle.
    #[serde(rename = "coinUpdate", rename_all = "camelCase")]
    CoinUpdate {
        mint: String,
        market_cap: f64,
        volume_24h: f64,
        holders: u64,
        graduated: bool,
        /// Current (possibly still-open) candle per timeframe. Timeframes with
        /// no candle yet are omitted.
        candles: BTreeMap<Timeframe, Candle>,
    },
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_parses() {
        let json = r#"{"type":"subscribe","mints":["So11111111111111111111111111111111111111112"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let ClientMessage::Subscribe { mints } = msg;
        assert_eq!(mints.len(), 1);
        assert_eq!(
            mints[0].as_str(),
            Some("So11111111111111111111111111111111111111112")
        );
    }

    #[test]
    fn subscribe_message_tolerates_missing_mints() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"subscribe"}"#).unwrap();
        let ClientMessage::Subscribe { mints } = msg;
        assert!(mints.is_empty());
    }

    #[test]
    fn subscribe_message_keeps_non_string_entries_raw() {
        let json = r#"{"type":"subscribe","mints":[42,null,"abc"]}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        let ClientMessage::Subscribe { mints } = msg;
        assert_eq!(mints.len(), 3);
        assert!(mints[0].as_str().is_none());
        assert_eq!(mints[2].as_str(), Some("abc"));
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"launch","mints":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn coin_update_serialises_with_camel_case_keys() {
        let mut candles = BTreeMap::new();
        candles.insert(
            Timeframe::M1,
            Candle {
                bucket_start: 60_000,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
            },
        );

        let msg = ServerMessage::CoinUpdate {
            mint: "mint111111111111111111111111111111".to_string(),
            market_cap: 12_345.0,
            volume_24h: 678.9,
            holders: 42,
            graduated: true,
            candles,
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"coinUpdate""#));
        assert!(json.contains(r#""marketCap":12345.0"#));
        assert!(json.contains(r#""volume24h":678.9"#));
        assert!(json.contains(r#""holders":42"#));
        assert!(json.contains(r#""graduated":true"#));
        assert!(json.contains(r#""1m":{"t":60000,"o":1.0,"h":2.0,"l":0.5,"c":1.5}"#));
    }

    #[test]
    fn coin_update_omits_empty_timeframes() {
        let msg = ServerMessage::CoinUpdate {
            mint: "mint111111111111111111111111111111".to_string(),
            market_cap: 0.0,
            volume_24h: 0.0,
            holders: 0,
            graduated: false,
            candles: BTreeMap::new(),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""candles":{}"#));
    }
}
