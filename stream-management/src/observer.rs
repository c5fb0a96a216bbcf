//! Observability hooks for a buffer scope.
//!
//! A [`StreamObserver`] is notified at the interesting points of a scope's lifecycle. This crate
//!  has an implementation for structured logging ([`TracingObserver`]) and one for metrics
//!  ([`CountingObserver`]); applications can plug in their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
#[cfg(test)] use mockall::automock;
use tracing::{debug, info, trace};
use uuid::Uuid;
use crate::safe_converter::SafeCast;
use crate::sequence::SequenceValue;

/// Callbacks are invoked synchronously, and they must not block.
#[cfg_attr(test, automock)]
pub trait StreamObserver: Send + Sync + 'static {
    fn on_enqueued(&self, _scope_id: Uuid, _sequence: SequenceValue, _buffered: usize) {}

    fn on_ack_requested(&self, _scope_id: Uuid, _next_sequence: SequenceValue) {}

    fn on_ack_processed(&self, _scope_id: Uuid, _acknowledged: SequenceValue, _removed: usize, _buffered: usize) {}

    fn on_resumed(&self, _scope_id: Uuid, _replayed: usize) {}

    fn on_closed(&self, _scope_id: Uuid, _discarded: usize) {}
}

pub struct NoopObserver;
impl StreamObserver for NoopObserver {}

/// Emits a structured `tracing` event per callback
pub struct TracingObserver;

impl StreamObserver for TracingObserver {
    fn on_enqueued(&self, scope_id: Uuid, sequence: SequenceValue, buffered: usize) {
        trace!(%scope_id, %sequence, buffered, "stanza enqueued");
    }

    fn on_ack_requested(&self, scope_id: Uuid, next_sequence: SequenceValue) {
        debug!(%scope_id, %next_sequence, "ack requested");
    }

    fn on_ack_processed(&self, scope_id: Uuid, acknowledged: SequenceValue, removed: usize, buffered: usize) {
        debug!(%scope_id, %acknowledged, removed, buffered, "ack processed");
    }

    fn on_resumed(&self, scope_id: Uuid, replayed: usize) {
        info!(%scope_id, replayed, "stream resumed");
    }

    fn on_closed(&self, scope_id: Uuid, discarded: usize) {
        info!(%scope_id, discarded, "buffer scope closed");
    }
}

/// Counts events, e.g. for exporting them as metrics. One instance can be shared by several scopes.
#[derive(Default)]
pub struct CountingObserver {
    enqueued: AtomicU64,
    ack_requests: AtomicU64,
    acknowledged: AtomicU64,
    replayed: AtomicU64,
    resumptions: AtomicU64,
    discarded: AtomicU64,
}

impl CountingObserver {
    pub fn new() -> Arc<CountingObserver> {
        Default::default()
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn ack_requests(&self) -> u64 {
        self.ack_requests.load(Ordering::Relaxed)
    }

    /// total number of stanzas removed from buffers by acknowledgements
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged.load(Ordering::Relaxed)
    }

    pub fn replayed(&self) -> u64 {
        self.replayed.load(Ordering::Relaxed)
    }

    pub fn resumptions(&self) -> u64 {
        self.resumptions.load(Ordering::Relaxed)
    }

    /// unacknowledged stanzas dropped by closing a scope
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl StreamObserver for CountingObserver {
    fn on_enqueued(&self, _scope_id: Uuid, _sequence: SequenceValue, _buffered: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    fn on_ack_requested(&self, _scope_id: Uuid, _next_sequence: SequenceValue) {
        self.ack_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn on_ack_processed(&self, _scope_id: Uuid, _acknowledged: SequenceValue, removed: usize, _buffered: usize) {
        self.acknowledged.fetch_add(removed.safe_cast(), Ordering::Relaxed);
    }

    fn on_resumed(&self, _scope_id: Uuid, replayed: usize) {
        self.resumptions.fetch_add(1, Ordering::Relaxed);
        self.replayed.fetch_add(replayed.safe_cast(), Ordering::Relaxed);
    }

    fn on_closed(&self, _scope_id: Uuid, discarded: usize) {
        self.discarded.fetch_add(discarded.safe_cast(), Ordering::Relaxed);
    }
}

/// Forwards every callback to several observers, e.g. to log and count at the same time
pub struct CompositeObserver {
    observers: Vec<Arc<dyn StreamObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn StreamObserver>>) -> CompositeObserver {
        CompositeObserver { observers }
    }
}

impl StreamObserver for CompositeObserver {
    fn on_enqueued(&self, scope_id: Uuid, sequence: SequenceValue, buffered: usize) {
        self.observers.iter().for_each(|o| o.on_enqueued(scope_id, sequence, buffered));
    }

    fn on_ack_requested(&self, scope_id: Uuid, next_sequence: SequenceValue) {
        self.observers.iter().for_each(|o| o.on_ack_requested(scope_id, next_sequence));
    }

    fn on_ack_processed(&self, scope_id: Uuid, acknowledged: SequenceValue, removed: usize, buffered: usize) {
        self.observers.iter().for_each(|o| o.on_ack_processed(scope_id, acknowledged, removed, buffered));
    }

    fn on_resumed(&self, scope_id: Uuid, replayed: usize) {
        self.observers.iter().for_each(|o| o.on_resumed(scope_id, replayed));
    }

    fn on_closed(&self, scope_id: Uuid, discarded: usize) {
        self.observers.iter().for_each(|o| o.on_closed(scope_id, discarded));
    }
}
