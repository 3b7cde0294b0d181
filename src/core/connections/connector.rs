use std::collections::VecDeque;

use crate::core::values::Value;

/// A value waiting to cross one binding of a connector
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Index of the binding in the connection manager
    pub binding: usize,
    pub value: Value,
}

/// Pending-message queue of one connector plus its re-entrancy guard.
///
/// Values are delivered strictly in arrival order. While a delivery is in
/// flight, further transmissions only queue; the delivering loop picks them
/// up once the current value has landed.
#[derive(Debug, Default)]
pub struct ConnectorQueue {
    pending: VecDeque<Delivery>,
    delivering: bool,
}

impl ConnectorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, delivery: Delivery) {
        self.pending.push_back(delivery);
    }

    /// Claim the connector for a delivery loop.
    ///
    /// Returns `false` when a loop is already running; the caller must then
    /// leave its value queued.
    pub fn begin(&mut self) -> bool {
        if self.delivering {
            return false;
        }
        self.delivering = true;
        true
    }

    pub fn next(&mut self) -> Option<Delivery> {
        self.pending.pop_front()
    }

    /// Release the connector after the loop has drained it
    pub fn finish(&mut self) {
        self.delivering = false;
    }

    /// Drop everything still waiting (used when a run is halted)
    pub fn abort(&mut self) {
        self.pending.clear();
        self.delivering = false;
    }

    pub fn is_delivering(&self) -> bool {
        self.delivering
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
