use anyhow::bail;
use crate::safe_converter::SafeCast;
use crate::sequence::SequenceWrap;

pub struct StreamManagementConfig {
    /// The number of stanzas sent between two ack requests.
    ///
    /// Requesting an ack for every stanza doubles the number of units on the wire, while requesting
    ///  acks rarely lets the buffer grow, and with it the number of stanzas that are resent after
    ///  an interrupted connection is resumed.
    pub ack_request_threshold: u32,

    pub sequence_wrap: SequenceWrap,

    /// This is the maximum number of unacknowledged stanzas kept in the buffer. Enqueueing a stanza
    ///  while the buffer is full waits until the peer acknowledges some of them.
    ///
    /// `None` means no limit, so a stalled peer causes the buffer to grow without bounds. With
    ///  [`SequenceWrap::Modulo`], the buffer is always limited to half the sequence space, see
    ///  [`StreamManagementConfig::effective_max_unacked`].
    pub max_unacked: Option<usize>,
}

impl Default for StreamManagementConfig {
    fn default() -> Self {
        StreamManagementConfig {
            ack_request_threshold: 5,
            sequence_wrap: SequenceWrap::Unbounded,
            max_unacked: None,
        }
    }
}

impl StreamManagementConfig {
    /// XEP-0198 counts handled stanzas in an unsigned 32 bit integer that wraps around
    pub fn xep0198() -> StreamManagementConfig {
        StreamManagementConfig {
            sequence_wrap: SequenceWrap::Modulo(1 << 32),
            max_unacked: Some(1 << 16),
            ..StreamManagementConfig::default()
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ack_request_threshold == 0 {
            bail!("ack request threshold must be at least 1");
        }

        if let Some(max_unacked) = self.max_unacked {
            if max_unacked == 0 {
                bail!("max_unacked must be at least 1");
            }
        }

        if let SequenceWrap::Modulo(n) = self.sequence_wrap {
            if n < 2 {
                bail!("sequence values must wrap modulo 2 or more, was {}", n);
            }
            if let Some(max_unacked) = self.max_unacked {
                let max_unacked: u64 = max_unacked.safe_cast();
                if max_unacked > n / 2 {
                    bail!("max_unacked must not exceed half the sequence space ({}) to keep acknowledgements unambiguous, was {}", n / 2, max_unacked);
                }
            }
        }

        Ok(())
    }

    /// The limit that is actually enforced: wrapping sequence values are interpreted relative to
    ///  the highest acknowledgement, which is unambiguous only for up to `n / 2` unacknowledged
    ///  stanzas
    pub fn effective_max_unacked(&self) -> Option<usize> {
        match self.sequence_wrap {
            SequenceWrap::Unbounded => self.max_unacked,
            SequenceWrap::Modulo(n) => {
                let half_space = usize::try_from(n / 2).unwrap_or(usize::MAX);
                Some(self.max_unacked.map_or(half_space, |m| m.min(half_space)))
            }
        }
    }
}
