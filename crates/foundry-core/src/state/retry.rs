//! Defer-once bookkeeping.
//!
//! A signal whose precondition is unmet is deferred exactly once. The
//! second unmet attempt drops it. Counters are keyed by signal and reset
//! when the signal is handled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferDecision {
    /// Queued for one more attempt.
    Deferred,
    /// Already retried once; given up.
    Dropped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryLedger {
    #[serde(default)]
    attempts: BTreeMap<Signal, u8>,
    #[serde(default)]
    deferred: Vec<Signal>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals waiting for re-delivery, oldest first.
    pub fn pending(&self) -> &[Signal] {
        &self.deferred
    }

    pub fn is_pending(&self, signal: Signal) -> bool {
        self.deferred.contains(&signal)
    }

    pub fn attempts(&self, signal: Signal) -> u8 {
        self.attempts.get(&signal).copied().unwrap_or(0)
    }

    /// Record an unmet precondition for `signal`.
    pub fn defer_or_drop(&mut self, signal: Signal) -> DeferDecision {
        if self.attempts(signal) >= 1 {
            self.clear(signal);
            return DeferDecision::Dropped;
        }
        self.attempts.insert(signal, 1);
        if !self.is_pending(signal) {
            self.deferred.push(signal);
        }
        DeferDecision::Deferred
    }

    /// Take `signal` off the queue because it is being delivered now. The
    /// attempt counter is kept so an unmet precondition drops it.
    pub fn take_pending(&mut self, signal: Signal) -> bool {
        let before = self.deferred.len();
        self.deferred.retain(|s| *s != signal);
        before != self.deferred.len()
    }

    /// Forget everything about `signal`.
    pub fn clear(&mut self, signal: Signal) {
        self.attempts.remove(&signal);
        self.deferred.retain(|s| *s != signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_unmet_defers_second_drops() {
        let mut ledger = RetryLedger::new();

        assert_eq!(ledger.defer_or_drop(Signal::Start), DeferDecision::Deferred);
        assert_eq!(ledger.pending(), &[Signal::Start]);
        assert_eq!(ledger.attempts(Signal::Start), 1);

        assert_eq!(ledger.defer_or_drop(Signal::Start), DeferDecision::Dropped);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.attempts(Signal::Start), 0);
    }

    #[test]
    fn duplicate_deferrals_are_coalesced() {
        let mut ledger = RetryLedger::new();
        ledger.defer_or_drop(Signal::ConfigChanged);
        ledger.take_pending(Signal::ConfigChanged);
        assert!(ledger.pending().is_empty());

        // Still counts as the retry.
        assert_eq!(
            ledger.defer_or_drop(Signal::ConfigChanged),
            DeferDecision::Dropped
        );
    }

    #[test]
    fn counters_are_per_signal() {
        let mut ledger = RetryLedger::new();
        ledger.defer_or_drop(Signal::Start);
        assert_eq!(
            ledger.defer_or_drop(Signal::ProxyConnected),
            DeferDecision::Deferred
        );
        assert_eq!(ledger.pending(), &[Signal::Start, Signal::ProxyConnected]);
    }

    #[test]
    fn clear_resets_after_success() {
        let mut ledger = RetryLedger::new();
        ledger.defer_or_drop(Signal::Start);
        ledger.clear(Signal::Start);
        assert_eq!(ledger, RetryLedger::new());
        assert_eq!(ledger.defer_or_drop(Signal::Start), DeferDecision::Deferred);
    }
}
