use crate::models::{InstrumentKey, Position, Signal, Timeframe};
use std::collections::HashMap;

/// Per-tick scratch record filled by FSM handlers and read by the state decision
///
/// Rebuilt from zero at the start of every evaluation.
#[derive(Debug, Clone, Default)]
pub struct EventCompose {
    pub key: InstrumentKey,
    /// Snapshot of the cached position for `key`
    pub position: Option<Position>,
    pub balance: f64,
    pub rights: f64,
    /// Indicator signal per timeframe
    pub signals: HashMap<Timeframe, Signal>,
}

impl EventCompose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every derived field and seed the record with the tick's identity
    pub fn reset(&mut self, key: &InstrumentKey) {
        self.key.clone_from(key);
        self.position = None;
        self.balance = 0.0;
        self.rights = 0.0;
        self.signals.clear();
    }

    /// Signal for `timeframe`, Hold when no handler produced one
    pub fn signal(&self, timeframe: Timeframe) -> Signal {
        self.signals.get(&timeframe).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_derived_fields() {
        let mut compose = EventCompose::new();
        compose.balance = 4.0;
        compose.signals.insert(Timeframe::Min5, Signal::Buy);
        compose.position = Some(Position::new(InstrumentKey::new("okex", "a", "b")));

        let key = InstrumentKey::new("okex", "ltc_usd", "this_week");
        compose.reset(&key);

        assert_eq!(compose.key, key);
        assert_eq!(compose.balance, 0.0);
        assert!(compose.position.is_none());
        assert_eq!(compose.signal(Timeframe::Min5), Signal::Hold);
    }
}
