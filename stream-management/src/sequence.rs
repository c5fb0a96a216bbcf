use std::fmt::{Display, Formatter};

/// A sequence value as it is exchanged with the peer, i.e. after applying the scope's
///  [`SequenceWrap`] policy.
///
/// Internally, a buffer scope counts with an unbounded `u64` ('position'), and sequence values
///  are derived from that. With [`SequenceWrap::Unbounded`], position and sequence value are
///  identical.
///
/// Sequence values are not ordered: with wrap-around, whether one sequence value comes before
///  another depends on the scope's position, see [`SequenceSpace::resolve_ack`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct SequenceValue(u64);

impl Display for SequenceValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceValue {
    pub const ZERO: SequenceValue = SequenceValue(0);

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }
}

/// Wrap-around policy for sequence values.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum SequenceWrap {
    /// Sequence values are plain `u64` counters. A scope would need to send 2^64 stanzas to
    ///  exhaust them, which is treated as unreachable.
    #[default]
    Unbounded,
    /// Sequence values wrap modulo `n`, e.g. `Modulo(1 << 32)` for XEP-0198 style `h` values.
    ///
    /// NB: Acknowledgements are interpreted relative to the highest accepted acknowledgement,
    ///  so no more than `n / 2` stanzas may be unacknowledged at any time
    Modulo(u64),
}

/// What an incoming cumulative acknowledgement means for the buffer, see
///  [`SequenceSpace::resolve_ack`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AckResolution {
    /// duplicate, or overtaken by a later acknowledgement
    Stale,
    /// the acknowledgement moves the lower bound to this (absolute) position
    Advance(u64),
    /// the peer acknowledged stanzas that were never sent
    Violation,
}

/// Maps a scope's absolute positions to sequence values, and interprets the peer's sequence
///  values relative to those positions, according to the configured [`SequenceWrap`]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SequenceSpace {
    wrap: SequenceWrap,
}

impl SequenceSpace {
    pub fn new(wrap: SequenceWrap) -> SequenceSpace {
        SequenceSpace { wrap }
    }

    pub fn to_sequence(&self, position: u64) -> SequenceValue {
        match self.wrap {
            SequenceWrap::Unbounded => SequenceValue(position),
            SequenceWrap::Modulo(n) => SequenceValue(position % n),
        }
    }

    /// Interprets a cumulative acknowledgement `ack` relative to the currently acknowledged
    ///  position `acknowledged` and the position of the next stanza to be sent, `next`.
    pub fn resolve_ack(&self, ack: SequenceValue, acknowledged: u64, next: u64) -> AckResolution {
        debug_assert!(acknowledged <= next);

        match self.wrap {
            SequenceWrap::Unbounded => {
                if ack.0 <= acknowledged {
                    AckResolution::Stale
                }
                else if ack.0 > next {
                    AckResolution::Violation
                }
                else {
                    AckResolution::Advance(ack.0)
                }
            }
            SequenceWrap::Modulo(n) => {
                if ack.0 >= n {
                    return AckResolution::Violation;
                }

                // forward distance in wrap-around space
                let base = acknowledged % n;
                let distance = if ack.0 >= base { ack.0 - base } else { n - (base - ack.0) };
                if distance == 0 || distance > n / 2 {
                    AckResolution::Stale
                }
                else if distance > next - acknowledged {
                    AckResolution::Violation
                }
                else {
                    AckResolution::Advance(acknowledged + distance)
                }
            }
        }
    }
}
