use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{RwLock, Semaphore};
use crate::transport::StanzaTransport;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Stanza(&'static str, Bytes),
    AckRequest(&'static str),
}

/// A transport that records everything sent on it. Several transports can share a tracker to
///  verify ordering across a reconnect.
pub struct TrackingTransport {
    name: &'static str,
    tracker: Arc<RwLock<Vec<Sent>>>,
    available: AtomicBool,
    ack_requests_available: AtomicBool,
    /// if present, every stanza transmission waits for a permit
    gate: Option<Semaphore>,
}

impl TrackingTransport {
    pub fn new(name: &'static str) -> Arc<TrackingTransport> {
        Self::with_tracker(name, Default::default())
    }

    pub fn with_tracker(name: &'static str, tracker: Arc<RwLock<Vec<Sent>>>) -> Arc<TrackingTransport> {
        Arc::new(TrackingTransport {
            name,
            tracker,
            available: AtomicBool::new(true),
            ack_requests_available: AtomicBool::new(true),
            gate: None,
        })
    }

    /// A transport that holds back stanzas until [`TrackingTransport::open_gate`] lets them through
    pub fn gated(name: &'static str) -> Arc<TrackingTransport> {
        Arc::new(TrackingTransport {
            name,
            tracker: Default::default(),
            available: AtomicBool::new(true),
            ack_requests_available: AtomicBool::new(true),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub fn open_gate(&self, num_stanzas: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(num_stanzas);
        }
    }

    pub fn tracker(&self) -> Arc<RwLock<Vec<Sent>>> {
        self.tracker.clone()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_ack_requests_available(&self, available: bool) {
        self.ack_requests_available.store(available, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.tracker.read().await.clone()
    }

    pub async fn clear(&self) {
        self.tracker.write().await.clear();
    }
}

pub fn stanza(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}

#[async_trait]
impl StanzaTransport for TrackingTransport {
    async fn transmit(&self, stanza: Bytes) -> anyhow::Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            bail!("{} is not connected", self.name);
        }
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        self.tracker.write().await.push(Sent::Stanza(self.name, stanza));
        Ok(())
    }

    async fn send_ack_request(&self) -> anyhow::Result<()> {
        if !self.available.load(Ordering::SeqCst) || !self.ack_requests_available.load(Ordering::SeqCst) {
            bail!("{} is not connected", self.name);
        }
        self.tracker.write().await.push(Sent::AckRequest(self.name));
        Ok(())
    }
}
