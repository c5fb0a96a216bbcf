//! Wiring of a buffer scope into a connection's receive side: acks parsed from the wire and
//!  connection lifecycle events are fed into the scope by a single task per connection.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use crate::error::Result;
use crate::sequence::SequenceValue;
use crate::stanza_buffer::StanzaBuffer;
use crate::transport::StanzaTransport;

pub enum ConnectionEvent {
    /// the peer's cumulative count of handled stanzas
    Ack(SequenceValue),
    /// the connection dropped, but the session may be resumed
    Interrupted,
    /// the session continues on a new connection. `peer_ack` is the peer's count of handled
    ///  stanzas if it was part of the resumption handshake
    Resumed {
        transport: Arc<dyn StanzaTransport>,
        peer_ack: Option<SequenceValue>,
    },
    /// the session ended, it will not be resumed
    ClosedPermanently,
}

impl Debug for ConnectionEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionEvent::Ack(ack) => write!(f, "Ack({})", ack),
            ConnectionEvent::Interrupted => write!(f, "Interrupted"),
            ConnectionEvent::Resumed { peer_ack, .. } => write!(f, "Resumed {{ peer_ack: {:?} }}", peer_ack),
            ConnectionEvent::ClosedPermanently => write!(f, "ClosedPermanently"),
        }
    }
}

/// Processes a connection's events until the connection is closed permanently or the sender side
///  of the channel is dropped.
///
/// A failed resumption is logged, and the loop waits for the next `Resumed` event. Protocol
///  violations end the loop with an error, the caller is expected to terminate the session.
pub async fn run_event_loop(buffer: Arc<StanzaBuffer>, mut events: mpsc::Receiver<ConnectionEvent>) -> Result<()> {
    info!("starting event loop for scope {}", buffer.scope_id());

    while let Some(event) = events.recv().await {
        debug!("scope {}: {:?}", buffer.scope_id(), event);

        match event {
            ConnectionEvent::Ack(ack) => {
                buffer.process_ack(ack).await?;
            }
            ConnectionEvent::Interrupted => {
                buffer.suspend().await?;
            }
            ConnectionEvent::Resumed { transport, peer_ack } => {
                let result = match peer_ack {
                    Some(ack) => buffer.resume_with_ack(ack, transport).await,
                    None => buffer.resume(transport).await,
                };
                match result {
                    Err(e) if e.is_recoverable() => {
                        warn!("scope {}: resumption failed, waiting for the next connection: {}", buffer.scope_id(), e);
                    }
                    other => other?,
                }
            }
            ConnectionEvent::ClosedPermanently => {
                buffer.close().await;
                return Ok(());
            }
        }
    }

    debug!("scope {}: event channel closed", buffer.scope_id());
    Ok(())
}

/// Spawns [`run_event_loop`] as a task, returning the sender for events
pub fn spawn_event_loop(buffer: Arc<StanzaBuffer>, channel_capacity: usize) -> (mpsc::Sender<ConnectionEvent>, JoinHandle<Result<()>>) {
    let (send, recv) = mpsc::channel(channel_capacity);
    let handle = tokio::spawn(run_event_loop(buffer, recv));
    (send, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::config::StreamManagementConfig;
    use crate::error::StreamManagementError;
    use crate::observer::NoopObserver;
    use crate::test_util::{stanza, Sent, TrackingTransport};

    fn new_buffer(transport: Arc<TrackingTransport>) -> Arc<StanzaBuffer> {
        Arc::new(StanzaBuffer::new(Arc::new(StreamManagementConfig::default()), transport, Arc::new(NoopObserver)).unwrap())
    }

    #[tokio::test]
    async fn test_ack_and_close() {
        let buffer = new_buffer(TrackingTransport::new("a"));
        for i in 0..3 {
            buffer.enqueue_and_send(Bytes::from(format!("<message id='{}'/>", i))).await.unwrap();
        }

        let (send, handle) = spawn_event_loop(buffer.clone(), 8);
        send.send(ConnectionEvent::Ack(SequenceValue::from_raw(2))).await.unwrap();
        send.send(ConnectionEvent::ClosedPermanently).await.unwrap();

        handle.await.unwrap().unwrap();
        assert!(buffer.is_closed().await);
    }

    #[tokio::test]
    async fn test_interrupt_and_resume() {
        let old_transport = TrackingTransport::new("old");
        let buffer = new_buffer(old_transport.clone());
        for i in 0..4 {
            buffer.enqueue_and_send(Bytes::from(format!("<message id='{}'/>", i))).await.unwrap();
        }

        let (send, handle) = spawn_event_loop(buffer.clone(), 8);
        send.send(ConnectionEvent::Interrupted).await.unwrap();

        let broken = TrackingTransport::new("broken");
        broken.set_available(false);
        send.send(ConnectionEvent::Resumed { transport: broken, peer_ack: None }).await.unwrap();

        let new_transport = TrackingTransport::new("new");
        send.send(ConnectionEvent::Resumed { transport: new_transport.clone(), peer_ack: Some(SequenceValue::from_raw(2)) }).await.unwrap();
        drop(send);

        handle.await.unwrap().unwrap();
        assert_eq!(new_transport.sent().await, vec![
            Sent::Stanza("new", stanza("<message id='2'/>")),
            Sent::Stanza("new", stanza("<message id='3'/>")),
        ]);
        assert!(!buffer.is_suspended().await);
        assert_eq!(buffer.size().await, 2);
    }

    #[tokio::test]
    async fn test_protocol_violation_ends_loop() {
        let buffer = new_buffer(TrackingTransport::new("a"));
        buffer.enqueue_and_send(stanza("<presence/>")).await.unwrap();

        let (send, handle) = spawn_event_loop(buffer.clone(), 8);
        send.send(ConnectionEvent::Ack(SequenceValue::from_raw(5))).await.unwrap();

        assert!(matches!(handle.await.unwrap(), Err(StreamManagementError::ProtocolViolation { .. })));
        assert_eq!(buffer.size().await, 1);
        assert!(send.is_closed());
    }
}
