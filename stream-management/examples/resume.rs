use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use stream_management::config::StreamManagementConfig;
use stream_management::connection::{spawn_event_loop, ConnectionEvent};
use stream_management::observer::TracingObserver;
use stream_management::transport::StanzaTransport;
use stream_management::{SequenceValue, StanzaBuffer};
use tracing::{info, Level};

struct LoggingTransport {
    name: &'static str,
}

#[async_trait]
impl StanzaTransport for LoggingTransport {
    async fn transmit(&self, stanza: Bytes) -> anyhow::Result<()> {
        info!("{}: -> {}", self.name, String::from_utf8_lossy(&stanza));
        Ok(())
    }

    async fn send_ack_request(&self) -> anyhow::Result<()> {
        info!("{}: -> <r/>", self.name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .init();

    let buffer = Arc::new(StanzaBuffer::new(
        Arc::new(StreamManagementConfig::xep0198()),
        Arc::new(LoggingTransport { name: "first connection" }),
        Arc::new(TracingObserver),
    )?);
    let (events, event_loop) = spawn_event_loop(buffer.clone(), 16);

    for i in 0..7 {
        buffer.enqueue_and_send(Bytes::from(format!("<message id='{}'><body>hello</body></message>", i))).await?;
    }

    // the peer confirms the first five, then the connection drops
    buffer.process_ack(SequenceValue::from_raw(5)).await?;
    buffer.suspend().await?;

    // sent while offline: buffered, goes out after the resent stanzas
    if let Err(e) = buffer.enqueue_and_send(Bytes::from_static(b"<message id='7'><body>still there?</body></message>")).await {
        info!("while interrupted: {}", e);
    }

    events.send(ConnectionEvent::Resumed {
        transport: Arc::new(LoggingTransport { name: "second connection" }),
        peer_ack: Some(SequenceValue::from_raw(6)),
    }).await?;
    events.send(ConnectionEvent::ClosedPermanently).await?;

    event_loop.await??;
    Ok(())
}
