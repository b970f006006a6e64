//! Per-event semantic validation.

use tracing::{info, warn};

use crate::frame::{Event, EventType};

/// Counters accumulated while validating the event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidatorStats {
    pub events_processed: u64,
    pub trades_validated: u64,
    pub validation_errors: u64,
}

/// Validates decoded events and keeps running counters. Owned by the
/// consumer thread; validation failures are counted and logged, never fatal.
#[derive(Debug, Default)]
pub struct TradeValidator {
    stats: ValidatorStats,
}

impl TradeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, event: &Event) {
        self.stats.events_processed += 1;
        match EventType::from_u8(event.event_type) {
            Some(EventType::TradeCreated) => self.validate_trade_created(event),
            // Reserved and unknown types are counted but not inspected.
            Some(_) | None => {}
        }
    }

    fn validate_trade_created(&mut self, event: &Event) {
        if event.payload.is_empty() {
            self.stats.validation_errors += 1;
            warn!(
                sequence = event.sequence_num,
                "trade event with empty payload"
            );
            return;
        }

        let payload = String::from_utf8_lossy(&event.payload);
        let has_trade_id = payload.contains("\"trade_id\"");
        let has_symbol = payload.contains("\"symbol\"");
        let has_quantity = payload.contains("\"quantity\"");

        if !has_trade_id || !has_symbol || !has_quantity {
            self.stats.validation_errors += 1;
            warn!(
                sequence = event.sequence_num,
                has_trade_id,
                has_symbol,
                has_quantity,
                "trade event missing required fields"
            );
            return;
        }

        self.stats.trades_validated += 1;
        if self.stats.trades_validated % 1_000 == 0 {
            info!(trades = self.stats.trades_validated, "validated trades");
        }
    }

    pub fn stats(&self) -> ValidatorStats {
        self.stats
    }

    pub fn summary(&self) -> String {
        format!(
            "validation summary: events_processed={} trades_validated={} validation_errors={}",
            self.stats.events_processed, self.stats.trades_validated, self.stats.validation_errors
        )
    }
}
