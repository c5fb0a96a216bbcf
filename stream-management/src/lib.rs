//! This crate is the reliable delivery layer underneath a streaming chat / presence protocol
//!  client (stream management in the style of XMPP's XEP-0198). It keeps track of every stanza
//!  that was sent but not yet confirmed by the peer, so that nothing is lost or duplicated when
//!  a connection drops and the session is resumed on a new connection.
//!
//! ## Design goals
//!
//! * One buffer scope ([`stanza_buffer::StanzaBuffer`]) per logical connection, owned by that
//!   connection's send and receive pipelines. There is no process-wide state, and unrelated
//!   connections never contend for the same lock or share a sequence space
//! * Every stanza gets a sequence value, starting at 0 for a new scope and increasing by 1 per
//!   stanza. The stanza is kept in the buffer until the peer acknowledges it
//! * The peer's acknowledgements are *cumulative*: an ack `h` confirms all stanzas with a
//!   sequence value below `h`
//! * Acks are requested periodically, every `ack_request_threshold` stanzas
//! * After an interruption, all unacknowledged stanzas are resent in their original order
//!   before any new stanza goes out
//! * Transport failures are returned to the caller as typed errors, they are never just logged
//! * The wire format of stanzas, acks and ack requests, and the negotiation of stream management
//!   are out of scope: the transport is an abstraction ([`transport::StanzaTransport`]), and acks
//!   arrive as parsed integers
//!
//! ## Sequence values
//!
//! Internally, a scope counts stanzas with an unbounded `u64`. The sequence values exchanged
//!  with the peer are derived from that, either as is ([`sequence::SequenceWrap::Unbounded`]) or
//!  modulo some `n` ([`sequence::SequenceWrap::Modulo`], XEP-0198 uses `2^32`).
//!
//! With wrap-around, an incoming ack is interpreted relative to the highest ack accepted so far:
//!
//! ```ascii
//!  highest accepted ack        next sequence value
//!          |                          |
//!  --------+--------------------------+-----------------+------------------> (mod n)
//!          |<---- unacknowledged ---->|<-- violation -->|<---- stale ---->
//!                                     |      (up to n/2 from the highest ack)
//! ```
//!
//! A stale (duplicate or overtaken) ack is ignored. An ack for stanzas that were never sent is a
//!  protocol violation: the buffer is left unchanged, and the caller should terminate the session.
//!
//! ## Concurrency
//!
//! Stanzas are typically sent by application tasks while acks arrive on the connection's
//!  receive task. The buffer scope serializes everything that goes on the wire with one lock,
//!  and keeps its bookkeeping behind a second lock that is never held across I/O. That way,
//!  * the peer sees stanzas in sequence order, also across a resumption
//!  * incoming acks are never blocked by a slow send operation
//!  * diagnostics (`size()` etc.) read a consistent state
//!
//! ## Backpressure
//!
//! If the peer stops acknowledging, the buffer grows. `max_unacked` puts an upper bound on that:
//!  sending waits until acks free up room (or the scope is closed). With wrapping sequence
//!  values, the buffer never holds more than half the sequence space, whatever `max_unacked` is.
//!
//! ## Lifecycle
//!
//! ```ascii
//!   new() ---> connected <---------------+
//!                 |                      |
//!             suspend()              resume()
//!                 |                      |
//!                 +----> suspended ------+
//!                             |
//!   close() from any state ---+---> closed (all operations fail with ScopeClosed)
//! ```
//!
//! [`connection::run_event_loop`] drives these transitions from a channel of connection events.

pub mod buffer_entry;
pub mod config;
pub mod connection;
pub mod error;
pub mod observer;
pub mod outbound_buffer;
pub mod safe_converter;
pub mod sequence;
pub mod stanza_buffer;
pub mod transport;

#[cfg(test)] mod test_util;

pub use error::{Result, StreamManagementError};
pub use sequence::SequenceValue;
pub use stanza_buffer::StanzaBuffer;
