use std::collections::VecDeque;
use bytes::Bytes;
use tracing::trace;
use crate::buffer_entry::BufferEntry;
use crate::config::StreamManagementConfig;
use crate::error::StreamManagementError;
use crate::safe_converter::{PrecheckedCast, SafeCast};
use crate::sequence::{AckResolution, SequenceSpace, SequenceValue};

/// Result of registering a stanza in the [`OutboundBuffer`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Pushed {
    pub sequence: SequenceValue,
    /// the cadence counter reached the ack request threshold
    pub ack_request_due: bool,
}

/// Result of applying a cumulative acknowledgement to the [`OutboundBuffer`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AckOutcome {
    /// duplicate or outdated acknowledgement, nothing changed
    Stale,
    Pruned { removed: usize },
}

/// The bookkeeping part of a buffer scope, without any I/O or synchronization.
///
/// The buffer holds exactly the entries at positions `acknowledged ..< next`, in that order.
///  Positions are the scope's unbounded counters, sequence values exchanged with the peer are
///  derived from them (see [`SequenceSpace`]).
pub struct OutboundBuffer {
    space: SequenceSpace,
    ack_request_threshold: u32,

    /// position of the next stanza to be sent
    next: u64,
    /// position before which all stanzas are acknowledged
    acknowledged: u64,
    /// stanzas sent since the last ack request
    cadence_counter: u32,
    unacknowledged: VecDeque<BufferEntry>,
}

impl OutboundBuffer {
    pub fn new(config: &StreamManagementConfig) -> OutboundBuffer {
        OutboundBuffer {
            space: SequenceSpace::new(config.sequence_wrap),
            ack_request_threshold: config.ack_request_threshold,
            next: 0,
            acknowledged: 0,
            cadence_counter: 0,
            unacknowledged: VecDeque::new(),
        }
    }

    pub fn push(&mut self, stanza: Bytes) -> Pushed {
        let sequence = self.space.to_sequence(self.next);
        self.unacknowledged.push_back(BufferEntry::new(sequence, stanza));
        self.next += 1;
        self.cadence_counter = self.cadence_counter.saturating_add(1);

        self.debug_check_invariant();

        Pushed {
            sequence,
            ack_request_due: self.cadence_counter >= self.ack_request_threshold,
        }
    }

    fn debug_check_invariant(&self) {
        let len: u64 = self.unacknowledged.len().safe_cast();
        debug_assert_eq!(len, self.next - self.acknowledged);
    }

    pub fn on_ack_request_sent(&mut self) {
        self.cadence_counter = 0;
    }

    /// Removes all entries that the peer's cumulative acknowledgement `ack` covers. A protocol
    ///  violation leaves the buffer unchanged.
    pub fn apply_ack(&mut self, ack: SequenceValue) -> Result<AckOutcome, StreamManagementError> {
        match self.space.resolve_ack(ack, self.acknowledged, self.next) {
            AckResolution::Stale => {
                trace!("ignoring stale ack {} - highest acknowledged is {}", ack, self.highest_acknowledged());
                Ok(AckOutcome::Stale)
            }
            AckResolution::Violation => {
                Err(StreamManagementError::ProtocolViolation {
                    acknowledged: ack,
                    next_sequence: self.next_sequence(),
                })
            }
            AckResolution::Advance(new_acknowledged) => {
                let removed: usize = (new_acknowledged - self.acknowledged).prechecked_cast();
                self.unacknowledged.drain(..removed);
                self.acknowledged = new_acknowledged;

                self.debug_check_invariant();
                Ok(AckOutcome::Pruned { removed })
            }
        }
    }

    /// Returns the first unacknowledged entry at or after `position`, together with its position.
    ///  This allows iterating over the buffer while acknowledgements prune it in between.
    pub fn unacknowledged_from(&self, position: u64) -> Option<(u64, &BufferEntry)> {
        let position = position.max(self.acknowledged);
        if position >= self.next {
            return None;
        }

        let index: usize = (position - self.acknowledged).prechecked_cast();
        self.unacknowledged.get(index)
            .map(|entry| (position, entry))
    }

    pub fn entries(&self) -> impl Iterator<Item = &BufferEntry> {
        self.unacknowledged.iter()
    }

    /// Removes and returns all entries without them being acknowledged
    pub fn discard_all(&mut self) -> Vec<BufferEntry> {
        self.acknowledged = self.next;
        self.unacknowledged.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.unacknowledged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unacknowledged.is_empty()
    }

    pub fn next_sequence(&self) -> SequenceValue {
        self.space.to_sequence(self.next)
    }

    pub fn highest_acknowledged(&self) -> SequenceValue {
        self.space.to_sequence(self.acknowledged)
    }

    pub fn cadence_counter(&self) -> u32 {
        self.cadence_counter
    }
}
