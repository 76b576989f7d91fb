//! Ordered event queue
//!
//! Events are keyed by `(time, sequence)`; the sequence number is assigned
//! at insertion, so events scheduled earlier for the same instant pop first.

use std::collections::BTreeMap;

use crate::core::types::Time;
use crate::sim::events::SimEvent;

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: BTreeMap<(Time, u64), SimEvent>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, time: Time, event: SimEvent) {
        self.events.insert((time, self.next_seq), event);
        self.next_seq += 1;
    }

    pub fn peek(&self) -> Option<(Time, &SimEvent)> {
        self.events
            .first_key_value()
            .map(|(&(time, _), event)| (time, event))
    }

    pub fn pop(&mut self) -> Option<(Time, SimEvent)> {
        self.events
            .pop_first()
            .map(|((time, _), event)| (time, event))
    }

    /// Drop every queued event matching `pred`, returning how many were dropped
    pub fn void_where(&mut self, mut pred: impl FnMut(Time, &SimEvent) -> bool) -> usize {
        let before = self.events.len();
        self.events.retain(|&(time, _), event| !pred(time, event));
        before - self.events.len()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
