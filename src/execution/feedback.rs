use crate::protocol::MessageType;
use std::collections::HashMap;

/// Inspections an unconfirmed request survives before it is abandoned
pub const DEFAULT_MAX_CHECKS: u32 = 3;

/// One outstanding mutating request
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEntry {
    pub strategy: String,
    pub req_serial: u32,
    pub msg_type: MessageType,
    pub data: String,
    pub check_count: u32,
}

/// Pending requests keyed by request serial
#[derive(Debug, Clone, Default)]
pub struct Feedback {
    entries: HashMap<u32, FeedbackEntry>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a request; returns false if the serial is already tracked
    pub fn add(
        &mut self,
        strategy: &str,
        req_serial: u32,
        msg_type: MessageType,
        data: impl Into<String>,
    ) -> bool {
        if self.entries.contains_key(&req_serial) {
            return false;
        }
        self.entries.insert(
            req_serial,
            FeedbackEntry {
                strategy: strategy.to_string(),
                req_serial,
                msg_type,
                data: data.into(),
                check_count: 0,
            },
        );
        true
    }

    /// Drop the entry confirmed by `req_serial`; unknown serials are ignored
    pub fn remove(&mut self, req_serial: u32) -> Option<FeedbackEntry> {
        self.entries.remove(&req_serial)
    }

    /// Pending entries of a strategy, in no particular order
    pub fn find_by_strategy(&self, strategy: &str) -> Vec<&FeedbackEntry> {
        self.entries
            .values()
            .filter(|e| e.strategy == strategy)
            .collect()
    }

    /// Count one more inspection for every entry of `strategy`
    ///
    /// Entries reaching `max_checks` are abandoned; the remaining ones are returned.
    pub fn inspect(&mut self, strategy: &str, max_checks: u32) -> Vec<FeedbackEntry> {
        let mut pending = Vec::new();

        self.entries.retain(|serial, entry| {
            if entry.strategy != strategy {
                return true;
            }
            entry.check_count += 1;
            if entry.check_count >= max_checks {
                tracing::warn!(
                    strategy = %entry.strategy,
                    req_serial = serial,
                    msg_type = ?entry.msg_type,
                    "Abandoning unconfirmed request after {} checks",
                    entry.check_count
                );
                return false;
            }
            pending.push(entry.clone());
            true
        });

        pending
    }

    pub fn contains(&self, req_serial: u32) -> bool {
        self.entries.contains_key(&req_serial)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dedups_by_serial() {
        let mut feedback = Feedback::new();
        assert!(feedback.add("mavg", 7, MessageType::ReqSetOrder, ""));
        assert!(!feedback.add("mavg", 7, MessageType::ReqSetOrder, "again"));

        let entries = feedback.find_by_strategy("mavg");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data, "");
    }

    #[test]
    fn test_remove_then_find_is_empty() {
        let mut feedback = Feedback::new();
        feedback.add("mavg", 7, MessageType::ReqSetOrder, "");
        feedback.add("mavg", 7, MessageType::ReqSetOrder, "");

        assert!(feedback.remove(7).is_some());
        assert!(feedback.remove(7).is_none());
        assert!(feedback.find_by_strategy("mavg").is_empty());
    }

    #[test]
    fn test_find_by_strategy_filters() {
        let mut feedback = Feedback::new();
        feedback.add("a", 1, MessageType::ReqSetOrder, "");
        feedback.add("b", 2, MessageType::ReqCancelOrders, "");
        feedback.add("a", 3, MessageType::ReqCancelOrders, "");

        let mut serials: Vec<u32> = feedback
            .find_by_strategy("a")
            .iter()
            .map(|e| e.req_serial)
            .collect();
        serials.sort();
        assert_eq!(serials, vec![1, 3]);
    }

    #[test]
    fn test_inspect_abandons_after_bound() {
        let mut feedback = Feedback::new();
        feedback.add("mavg", 1, MessageType::ReqSetOrder, "");
        feedback.add("other", 2, MessageType::ReqSetOrder, "");

        assert_eq!(feedback.inspect("mavg", DEFAULT_MAX_CHECKS).len(), 1);
        assert_eq!(feedback.inspect("mavg", DEFAULT_MAX_CHECKS).len(), 1);
        assert!(feedback.inspect("mavg", DEFAULT_MAX_CHECKS).is_empty());

        assert!(!feedback.contains(1));
        assert!(feedback.contains(2));
        assert_eq!(feedback.find_by_strategy("other")[0].check_count, 0);
    }
}
