//! Credit-based flow control between an event source and its consumer.
//!
//! The consumer grants credits; the source may deliver at most as many
//! events as it has been granted. The ledger tracks both sides so either
//! end can check the contract:
//!
//! `consumed <= received <= requested`

use serde::Serialize;

/// Violations of the credit contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowControlError {
    /// The source delivered an event it held no credit for.
    #[error("source delivered event {received} with only {requested} credits granted")]
    CreditExceeded {
        /// Events received including the offending one.
        received: u64,
        /// Credits granted so far.
        requested: u64,
    },

    /// More events consumed than were received.
    #[error("consumed {consumed} events but only {received} were received")]
    Overconsumed {
        /// Events consumed including the offending one.
        consumed: u64,
        /// Events received so far.
        received: u64,
    },
}

/// Running totals of one credit-controlled stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreditLedger {
    requested: u64,
    received: u64,
    consumed: u64,
}

impl CreditLedger {
    /// A ledger with nothing granted.
    pub const fn new() -> Self {
        Self {
            requested: 0,
            received: 0,
            consumed: 0,
        }
    }

    /// Total credits granted.
    pub const fn requested(&self) -> u64 {
        self.requested
    }

    /// Total events delivered.
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// Total events released downstream.
    pub const fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Grant `n` more credits.
    pub const fn grant(&mut self, n: u64) {
        self.requested = self.requested.saturating_add(n);
    }

    /// Record one delivered event.
    pub fn record_received(&mut self) -> Result<(), FlowControlError> {
        let received = self.received.saturating_add(1);
        if received > self.requested {
            return Err(FlowControlError::CreditExceeded {
                received,
                requested: self.requested,
            });
        }
        self.received = received;
        Ok(())
    }

    /// Record `n` events released downstream.
    pub fn record_consumed(&mut self, n: u64) -> Result<(), FlowControlError> {
        let consumed = self.consumed.saturating_add(n);
        if consumed > self.received {
            return Err(FlowControlError::Overconsumed {
                consumed,
                received: self.received,
            });
        }
        self.consumed = consumed;
        Ok(())
    }

    /// Credits granted but not yet used by the source.
    pub const fn outstanding(&self) -> u64 {
        self.requested.saturating_sub(self.received)
    }

    /// Credits granted beyond what has been consumed. Never negative.
    pub const fn balance(&self) -> u64 {
        self.requested.saturating_sub(self.consumed)
    }

    /// Events received but not yet consumed.
    pub const fn buffered(&self) -> u64 {
        self.received.saturating_sub(self.consumed)
    }
}
