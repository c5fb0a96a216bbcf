use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)] use mockall::automock;

/// This is the abstraction of the connection that stanzas are sent on, introduced to keep socket,
///  TLS and XML encoding out of the buffer and to facilitate mocking the I/O part away for testing.
///
/// Both calls are expected to return in bounded time: Implementations should hand data to a
///  send queue or socket buffer rather than wait for the peer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StanzaTransport: Send + Sync + 'static {
    /// send a single (encoded) stanza on the wire
    async fn transmit(&self, stanza: Bytes) -> anyhow::Result<()>;

    /// send an ack request control message, asking the peer for its cumulative count of handled
    ///  stanzas
    async fn send_ack_request(&self) -> anyhow::Result<()>;
}
