//! JSON frames exchanged with ibkr-bridge

use serde::{Deserialize, Serialize};

use crate::shared::types::{BarData, Tick};

/// Messages sent to ibkr-bridge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        client_id: i32,
        readonly: bool,
    },
    HistoricalBars {
        req_id: u64,
        symbol: String,
        exchange: String,
        currency: String,
        /// UTC end time, "yyyymmdd-HH:MM:SS"
        end_date_time: String,
        duration: String,
        bar_size: String,
        what_to_show: String,
        use_rth: bool,
        timezone: String,
    },
    SubscribeTicks {
        symbol: String,
        exchange: String,
        currency: String,
    },
    Goodbye,
}

/// Messages from ibkr-bridge
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeMessage {
    #[serde(rename = "welcome")]
    Welcome {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "status")]
    Status {
        #[serde(default)]
        connected: Option<bool>,
    },
    #[serde(rename = "historical_bars")]
    HistoricalBars { req_id: u64, bars: Vec<BarData> },
    #[serde(rename = "tick")]
    Tick {
        symbol: String,
        ts: i64,
        #[serde(default)]
        px: Option<f64>,
        #[serde(default)]
        sz: f64,
        #[serde(default)]
        bid: Option<f64>,
        #[serde(default)]
        ask: Option<f64>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        req_id: Option<u64>,
        #[serde(default)]
        code: Option<i32>,
        message: String,
    },
}

impl BridgeMessage {
    /// Convert a tick frame into a [`Tick`]; other frames yield None
    pub fn into_tick(self) -> Option<Tick> {
        match self {
            BridgeMessage::Tick { symbol, ts, px, sz, .. } => Some(Tick {
                symbol: symbol.to_uppercase(),
                ts,
                last: px.filter(|p| *p > 0.0),
                size: if sz > 0.0 { sz } else { 1.0 },
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_serialises_with_type_tag() {
        let json = serde_json::to_value(ClientMessage::Hello { client_id: 1, readonly: true }).unwrap();
        assert_eq!(json["type"], "hello");
        assert_eq!(json["client_id"], 1);
        assert_eq!(json["readonly"], true);

        let json = serde_json::to_value(ClientMessage::Goodbye).unwrap();
        assert_eq!(json["type"], "goodbye");
    }

    #[test]
    fn test_historical_bars_request_fields() {
        let json = serde_json::to_value(ClientMessage::HistoricalBars {
            req_id: 3,
            symbol: "NVDA".to_string(),
            exchange: "NASDAQ".to_string(),
            currency: "USD".to_string(),
            end_date_time: "20240603-15:00:00".to_string(),
            duration: "10800 S".to_string(),
            bar_size: "1 min".to_string(),
            what_to_show: "TRADES".to_string(),
            use_rth: true,
            timezone: "US/Eastern".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "historical_bars");
        assert_eq!(json["req_id"], 3);
        assert_eq!(json["duration"], "10800 S");
        assert_eq!(json["use_rth"], true);
    }

    #[test]
    fn test_parse_inbound_frames() {
        let msg: BridgeMessage = serde_json::from_str(
            r#"{"type":"historical_bars","req_id":9,"bars":[{"ts":1717421400000,"open":1,"high":2,"low":0.5,"close":1.5,"volume":10}]}"#,
        )
        .unwrap();
        match msg {
            BridgeMessage::HistoricalBars { req_id, bars } => {
                assert_eq!(req_id, 9);
                assert_eq!(bars.len(), 1);
                assert_eq!(bars[0].close, 1.5);
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg: BridgeMessage =
            serde_json::from_str(r#"{"type":"error","req_id":4,"code":162,"message":"no data"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Error { req_id: Some(4), code: Some(162), .. }));

        let msg: BridgeMessage = serde_json::from_str(r#"{"type":"welcome"}"#).unwrap();
        assert!(matches!(msg, BridgeMessage::Welcome { message: None }));
    }

    #[test]
    fn test_tick_conversion() {
        let msg: BridgeMessage =
            serde_json::from_str(r#"{"type":"tick","symbol":"nvda","ts":1,"px":120.5}"#).unwrap();
        let tick = msg.into_tick().unwrap();
        assert_eq!(tick.symbol, "NVDA");
        assert_eq!(tick.last, Some(120.5));
        assert_eq!(tick.size, 1.0);

        // Quote-only update carries no last price
        let msg: BridgeMessage =
            serde_json::from_str(r#"{"type":"tick","symbol":"TSM","ts":1,"bid":180.0,"ask":180.1}"#).unwrap();
        assert_eq!(msg.into_tick().unwrap().last, None);
    }
}
