//! Error types for buffer scope operations.

use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::sequence::SequenceValue;

/// The transport call that failed in a [`StreamManagementError::TransportUnavailable`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TransportOperation {
    /// sending a freshly enqueued stanza
    Transmit,
    /// sending an ack request
    AckRequest,
    /// resending a buffered stanza during resumption
    Replay,
}

impl Display for TransportOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportOperation::Transmit => write!(f, "transmit"),
            TransportOperation::AckRequest => write!(f, "ack request"),
            TransportOperation::Replay => write!(f, "replay"),
        }
    }
}

/// Errors that can occur in a buffer scope.
#[derive(Debug, Error)]
pub enum StreamManagementError {
    /// The transport rejected a call, or there is no transport attached because the connection is
    ///  interrupted. This is recoverable: ack requests are retried on the next enqueue, and a
    ///  failed resumption must be retried before there is new traffic.
    ///
    /// `buffered` is the sequence value of a stanza that was buffered by the failing call. It
    ///  remains unacknowledged and will be resent on resumption.
    #[error("transport unavailable during {operation}")]
    TransportUnavailable {
        operation: TransportOperation,
        buffered: Option<SequenceValue>,
        #[source]
        source: anyhow::Error,
    },

    /// The peer acknowledged stanzas that were never sent. The connection can not be trusted
    ///  any more and should be terminated.
    #[error("peer acknowledged {acknowledged}, but the next sequence value to be sent is {next_sequence}")]
    ProtocolViolation {
        acknowledged: SequenceValue,
        next_sequence: SequenceValue,
    },

    /// The buffer scope was closed permanently.
    #[error("buffer scope is closed")]
    ScopeClosed,
}

impl StreamManagementError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamManagementError::TransportUnavailable { .. })
    }
}

/// Result type for buffer scope operations.
pub type Result<T> = std::result::Result<T, StreamManagementError>;
