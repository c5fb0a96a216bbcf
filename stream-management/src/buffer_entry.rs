use bytes::Bytes;
use crate::sequence::SequenceValue;

/// A stanza that was handed to the transport, paired with the sequence value it was sent with.
///
/// The stanza is opaque to the buffer: it is stored as the encoded bytes that went on the wire,
///  and it is resent unchanged on resumption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferEntry {
    sequence: SequenceValue,
    stanza: Bytes,
}

impl BufferEntry {
    pub fn new(sequence: SequenceValue, stanza: Bytes) -> BufferEntry {
        BufferEntry { sequence, stanza }
    }

    pub fn sequence(&self) -> SequenceValue {
        self.sequence
    }

    pub fn stanza(&self) -> &Bytes {
        &self.stanza
    }
}
