//! Trade submission payloads.
//!
//! The writer renders a [`TradePayload`] to JSON before framing it. Field
//! order in the struct is the canonical key order on the wire; `serde_json`
//! emits struct fields in declaration order, so the same trade always
//! produces the same payload bytes regardless of which process wrote it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

/// Payload of a `TRADE_CREATED` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradePayload {
    pub trade_id: String,
    pub account_id: String,
    pub symbol: String,
    pub quantity: u32,
    pub price: f64,
    pub side: Side,
    pub timestamp_ns: u64,
}
