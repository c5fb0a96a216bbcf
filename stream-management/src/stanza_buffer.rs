use std::sync::Arc;
use anyhow::anyhow;
use bytes::Bytes;
use tokio::sync::{Mutex, MutexGuard, Notify, RwLock};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;
use crate::buffer_entry::BufferEntry;
use crate::config::StreamManagementConfig;
use crate::error::{Result, StreamManagementError, TransportOperation};
use crate::observer::StreamObserver;
use crate::outbound_buffer::{AckOutcome, OutboundBuffer};
use crate::sequence::SequenceValue;
use crate::transport::StanzaTransport;

struct ScopeState {
    buffer: OutboundBuffer,
    suspended: bool,
    closed: bool,
}

/// A consistent copy of a scope's counters, for diagnostics
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BufferSnapshot {
    pub size: usize,
    pub next_sequence: SequenceValue,
    pub highest_acknowledged: SequenceValue,
    pub cadence_counter: u32,
    pub suspended: bool,
    pub closed: bool,
}

type SendSlot<'a> = MutexGuard<'a, Option<Arc<dyn StanzaTransport>>>;

/// The buffer scope of a single connection: It keeps every stanza that was sent but is not yet
///  acknowledged by the peer, requests acks periodically, and resends unacknowledged stanzas
///  when an interrupted connection is resumed.
///
/// There are two locks:
/// * `send_order` is held for everything that puts stanzas on the wire (sending, ack requests,
///   resumption). It determines the order in which the peer sees stanzas, and it is held across
///   transport calls.
/// * `state` guards the bookkeeping. It is never held across a transport call, so processing an
///   incoming ack never waits for outgoing I/O.
///
/// If both are needed, `send_order` is acquired first.
pub struct StanzaBuffer {
    scope_id: Uuid,
    config: Arc<StreamManagementConfig>,
    state: RwLock<ScopeState>,
    /// `None` while the connection is interrupted
    send_order: Mutex<Option<Arc<dyn StanzaTransport>>>,
    capacity_freed: Notify,
    observer: Arc<dyn StreamObserver>,
}

impl StanzaBuffer {
    pub fn new(
        config: Arc<StreamManagementConfig>,
        transport: Arc<dyn StanzaTransport>,
        observer: Arc<dyn StreamObserver>,
    ) -> anyhow::Result<StanzaBuffer> {
        config.validate()?;

        let scope_id = Uuid::new_v4();
        debug!("creating buffer scope {} with ack request threshold {}", scope_id, config.ack_request_threshold);

        let state = ScopeState {
            buffer: OutboundBuffer::new(&config),
            suspended: false,
            closed: false,
        };

        Ok(StanzaBuffer {
            scope_id,
            config,
            state: RwLock::new(state),
            send_order: Mutex::new(Some(transport)),
            capacity_freed: Notify::new(),
            observer,
        })
    }

    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Registers a stanza in the buffer and sends it, returning the sequence value it was
    ///  assigned.
    ///
    /// The stanza is buffered even if sending it fails: A `TransportUnavailable` error carries the
    ///  stanza's sequence value, and the stanza is resent on resumption.
    pub async fn enqueue_and_send(&self, stanza: Bytes) -> Result<SequenceValue> {
        let send_slot = self.acquire_send_slot().await?;

        let (pushed, buffered) = {
            let mut state = self.state.write().await;
            if state.closed {
                return Err(StreamManagementError::ScopeClosed);
            }
            let pushed = state.buffer.push(stanza.clone());
            (pushed, state.buffer.len())
        };

        trace!("scope {}: registered stanza {}, {} unacknowledged", self.scope_id, pushed.sequence, buffered);
        self.observer.on_enqueued(self.scope_id, pushed.sequence, buffered);

        let Some(transport) = send_slot.as_ref() else {
            debug!("scope {} is suspended - stanza {} is buffered for resumption", self.scope_id, pushed.sequence);
            return Err(StreamManagementError::TransportUnavailable {
                operation: TransportOperation::Transmit,
                buffered: Some(pushed.sequence),
                source: anyhow!("connection is interrupted"),
            });
        };

        if let Err(e) = transport.transmit(stanza).await {
            warn!("scope {}: error sending stanza {}, keeping it for resumption: {}", self.scope_id, pushed.sequence, e);
            return Err(StreamManagementError::TransportUnavailable {
                operation: TransportOperation::Transmit,
                buffered: Some(pushed.sequence),
                source: e,
            });
        }

        if pushed.ack_request_due {
            if let Err(e) = self.send_ack_request(transport.as_ref()).await {
                warn!("scope {}: error sending ack request, retrying with the next stanza: {}", self.scope_id, e);
                return Err(StreamManagementError::TransportUnavailable {
                    operation: TransportOperation::AckRequest,
                    buffered: Some(pushed.sequence),
                    source: e,
                });
            }
        }

        Ok(pushed.sequence)
    }

    /// Sends an ack request independently of the cadence, e.g. before an idle period
    pub async fn request_ack(&self) -> Result<()> {
        let send_slot = self.send_order.lock().await;
        if self.state.read().await.closed {
            return Err(StreamManagementError::ScopeClosed);
        }

        let Some(transport) = send_slot.as_ref() else {
            return Err(StreamManagementError::TransportUnavailable {
                operation: TransportOperation::AckRequest,
                buffered: None,
                source: anyhow!("connection is interrupted"),
            });
        };

        self.send_ack_request(transport.as_ref()).await
            .map_err(|e| StreamManagementError::TransportUnavailable {
                operation: TransportOperation::AckRequest,
                buffered: None,
                source: e,
            })
    }

    /// NB: the caller must hold the send slot
    async fn send_ack_request(&self, transport: &dyn StanzaTransport) -> anyhow::Result<()> {
        transport.send_ack_request().await?;

        let next_sequence = {
            let mut state = self.state.write().await;
            state.buffer.on_ack_request_sent();
            state.buffer.next_sequence()
        };

        debug!("scope {}: requested ack, next sequence value is {}", self.scope_id, next_sequence);
        self.observer.on_ack_requested(self.scope_id, next_sequence);
        Ok(())
    }

    /// Waits for room in the buffer if the number of unacknowledged stanzas is limited, either
    ///  explicitly or by a wrapping sequence space
    async fn acquire_send_slot(&self) -> Result<SendSlot<'_>> {
        loop {
            // registered before checking, so a notification between check and wait is not lost
            let capacity_freed = self.capacity_freed.notified();

            let send_slot = self.send_order.lock().await;
            {
                let state = self.state.read().await;
                if state.closed {
                    return Err(StreamManagementError::ScopeClosed);
                }
                match self.config.effective_max_unacked() {
                    Some(max_unacked) if state.buffer.len() >= max_unacked => {
                        debug!("scope {}: {} unacknowledged stanzas - waiting for acks", self.scope_id, state.buffer.len());
                    }
                    _ => return Ok(send_slot),
                }
            }
            drop(send_slot);

            capacity_freed.await;
        }
    }

    /// Applies the peer's cumulative acknowledgement, i.e. the number of stanzas the peer
    ///  handled, removing all stanzas with a lower sequence value from the buffer.
    ///
    /// Duplicate or outdated acks are ignored. An ack for stanzas that were never sent is a
    ///  `ProtocolViolation` and leaves the buffer unchanged.
    pub async fn process_ack(&self, ack: SequenceValue) -> Result<()> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(StreamManagementError::ScopeClosed);
        }

        let outcome = state.buffer.apply_ack(ack);
        match outcome {
            Ok(AckOutcome::Stale) => Ok(()),
            Ok(AckOutcome::Pruned { removed }) => {
                let buffered = state.buffer.len();
                drop(state);

                trace!("scope {}: peer acknowledged {}, removed {} stanzas, {} remaining", self.scope_id, ack, removed, buffered);
                self.observer.on_ack_processed(self.scope_id, ack, removed, buffered);
                self.capacity_freed.notify_waiters();
                Ok(())
            }
            Err(e) => {
                warn!("scope {}: {} - the connection can not be trusted", self.scope_id, e);
                Err(e)
            }
        }
    }

    /// The connection was interrupted, but it may be resumed: Keep all state, but stop sending
    ///  until [`StanzaBuffer::resume`]. Stanzas enqueued in the meantime are buffered.
    pub async fn suspend(&self) -> Result<()> {
        let mut send_slot = self.send_order.lock().await;
        let mut state = self.state.write().await;
        if state.closed {
            return Err(StreamManagementError::ScopeClosed);
        }

        *send_slot = None;
        state.suspended = true;
        info!("scope {}: connection interrupted, keeping {} unacknowledged stanzas", self.scope_id, state.buffer.len());
        Ok(())
    }

    /// Continues the session on a new transport: all unacknowledged stanzas are resent, in order
    ///  and with their original sequence values, before any stanza that is enqueued later.
    ///
    /// The stanzas stay in the buffer until the peer acknowledges them. If resending fails, the
    ///  scope remains suspended and resumption must be retried.
    pub async fn resume(&self, transport: Arc<dyn StanzaTransport>) -> Result<()> {
        let mut send_slot = self.send_order.lock().await;
        {
            let mut state = self.state.write().await;
            if state.closed {
                return Err(StreamManagementError::ScopeClosed);
            }
            *send_slot = None;
            state.suspended = true;
        }

        // acks may prune the buffer while we are sending, so entries are looked up one at a time
        let mut position = 0;
        let mut replayed = 0;
        loop {
            let next = {
                let state = self.state.read().await;
                if state.closed {
                    return Err(StreamManagementError::ScopeClosed);
                }
                state.buffer.unacknowledged_from(position)
                    .map(|(p, entry)| (p, entry.clone()))
            };
            let Some((entry_position, entry)) = next else {
                break;
            };

            trace!("scope {}: resending stanza {}", self.scope_id, entry.sequence());
            if let Err(e) = transport.transmit(entry.stanza().clone()).await {
                warn!("scope {}: error resending stanza {} - resumption must be retried: {}", self.scope_id, entry.sequence(), e);
                return Err(StreamManagementError::TransportUnavailable {
                    operation: TransportOperation::Replay,
                    buffered: Some(entry.sequence()),
                    source: e,
                });
            }

            position = entry_position + 1;
            replayed += 1;
        }

        {
            let mut state = self.state.write().await;
            if state.closed {
                return Err(StreamManagementError::ScopeClosed);
            }
            state.suspended = false;
        }
        *send_slot = Some(transport);

        info!("scope {}: resumed, resent {} stanzas", self.scope_id, replayed);
        self.observer.on_resumed(self.scope_id, replayed);
        Ok(())
    }

    /// Resumption where the peer reports how many stanzas it handled before the interruption:
    ///  those are removed before the rest is resent
    pub async fn resume_with_ack(&self, ack: SequenceValue, transport: Arc<dyn StanzaTransport>) -> Result<()> {
        self.process_ack(ack).await?;
        self.resume(transport).await
    }

    /// The connection is closed permanently. All buffered stanzas are discarded and returned, so
    ///  the application can e.g. report them as undelivered. Later calls fail with `ScopeClosed`.
    pub async fn close(&self) -> Vec<BufferEntry> {
        let discarded = {
            let mut state = self.state.write().await;
            if state.closed {
                return Vec::new();
            }
            state.closed = true;
            state.buffer.discard_all()
        };

        self.capacity_freed.notify_waiters();
        *self.send_order.lock().await = None;

        if discarded.is_empty() {
            info!("scope {} closed", self.scope_id);
        }
        else {
            warn!("scope {} closed with {} unacknowledged stanzas", self.scope_id, discarded.len());
        }
        self.observer.on_closed(self.scope_id, discarded.len());
        discarded
    }

    pub async fn size(&self) -> usize {
        self.state.read().await.buffer.len()
    }

    pub async fn highest_acknowledged(&self) -> SequenceValue {
        self.state.read().await.buffer.highest_acknowledged()
    }

    pub async fn next_sequence(&self) -> SequenceValue {
        self.state.read().await.buffer.next_sequence()
    }

    pub async fn cadence_counter(&self) -> u32 {
        self.state.read().await.buffer.cadence_counter()
    }

    pub async fn is_suspended(&self) -> bool {
        self.state.read().await.suspended
    }

    pub async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }

    pub async fn snapshot(&self) -> BufferSnapshot {
        let state = self.state.read().await;
        BufferSnapshot {
            size: state.buffer.len(),
            next_sequence: state.buffer.next_sequence(),
            highest_acknowledged: state.buffer.highest_acknowledged(),
            cadence_counter: state.buffer.cadence_counter(),
            suspended: state.suspended,
            closed: state.closed,
        }
    }

    /// a copy of the buffered entries, in sequence order
    pub async fn unacknowledged(&self) -> Vec<BufferEntry> {
        self.state.read().await.buffer.entries()
            .cloned()
            .collect()
    }
}
