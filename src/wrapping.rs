//! 32-bit wrapping sequence numbers.
//!
//! On the wire a sequence number is a `u32` relative to the connection's
//! Initial Sequence Number (ISN) and wraps modulo 2^32.  Internally the
//! sender and receiver work with *absolute* 64-bit indices, where index 0 is
//! the SYN.  [`Wrap32::wrap`] maps absolute → relative; [`Wrap32::unwrap`]
//! maps back, using a checkpoint (the most recent known absolute value) to
//! pick among the infinitely many absolute values that share the same low
//! 32 bits.
//!
//! ```text
//!   absolute:  0 ........ 2^32-1 | 2^32 ........ 2^33-1 | ...
//!   relative:  isn ... isn-1     | isn ... isn-1        | ...
//! ```

use std::fmt;
use std::ops::Add;

const SPAN: u64 = 1 << 32;
const HALF_SPAN: u64 = 1 << 31;

/// A sequence number as it appears in a segment header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Wrap32(u32);

impl Wrap32 {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw on-wire value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Convert absolute index `n` into a sequence number relative to `isn`.
    pub fn wrap(n: u64, isn: Wrap32) -> Wrap32 {
        Wrap32(isn.0.wrapping_add(n as u32))
    }

    /// Convert back to the absolute index closest to `checkpoint`.
    ///
    /// When two candidates are equally close the lower one wins.  Results are
    /// always within `0..=u64::MAX`.
    pub fn unwrap(self, isn: Wrap32, checkpoint: u64) -> u64 {
        let offset = u64::from(self.0.wrapping_sub(isn.0));
        let candidate = (checkpoint & !(SPAN - 1)) | offset;

        if candidate > checkpoint {
            if candidate - checkpoint >= HALF_SPAN && candidate >= SPAN {
                return candidate - SPAN;
            }
        } else if checkpoint - candidate > HALF_SPAN {
            if let Some(up) = candidate.checked_add(SPAN) {
                return up;
            }
        }
        candidate
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, rhs: u32) -> Wrap32 {
        Wrap32(self.0.wrapping_add(rhs))
    }
}

impl fmt::Display for Wrap32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_adds_isn_modulo_2_32() {
        assert_eq!(Wrap32::wrap(3 * SPAN, Wrap32::new(0)), Wrap32::new(0));
        assert_eq!(Wrap32::wrap(3 * SPAN + 17, Wrap32::new(15)), Wrap32::new(32));
        assert_eq!(Wrap32::wrap(7 * SPAN - 2, Wrap32::new(15)), Wrap32::new(13));
    }

    #[test]
    fn unwrap_first_epoch() {
        assert_eq!(Wrap32::new(1).unwrap(Wrap32::new(0), 0), 1);
        assert_eq!(Wrap32::new(u32::MAX).unwrap(Wrap32::new(0), 0), u64::from(u32::MAX));
    }

    #[test]
    fn unwrap_picks_closest_to_checkpoint() {
        // Just past a wrap: checkpoint in epoch 1, value in low range.
        assert_eq!(Wrap32::new(1).unwrap(Wrap32::new(0), SPAN - 1), SPAN + 1);
        // Checkpoint just after a wrap, value near u32::MAX -> previous epoch.
        assert_eq!(
            Wrap32::new(u32::MAX - 1).unwrap(Wrap32::new(0), 3 * SPAN),
            3 * SPAN - 2
        );
        // Non-zero ISN.
        assert_eq!(Wrap32::new(16).unwrap(Wrap32::new(16), 10 * SPAN), 10 * SPAN);
        assert_eq!(Wrap32::new(15).unwrap(Wrap32::new(16), 0), u64::from(u32::MAX));
    }

    #[test]
    fn unwrap_never_underflows_or_overflows() {
        assert_eq!(Wrap32::new(u32::MAX).unwrap(Wrap32::new(0), 0), u64::from(u32::MAX));
        let top = u64::MAX;
        assert_eq!(Wrap32::new(0).unwrap(Wrap32::new(0), top), top - u64::from(u32::MAX));
    }

    #[test]
    fn round_trip_law() {
        let isns = [0u32, 1, 0x8000_0000, u32::MAX, 0xdead_beef];
        let points = [0u64, 1, HALF_SPAN, SPAN - 1, SPAN, SPAN + 7, 5 * SPAN + HALF_SPAN, u64::MAX / 3];
        for &isn in &isns {
            for &a in &points {
                let isn = Wrap32::new(isn);
                assert_eq!(Wrap32::wrap(a, isn).unwrap(isn, a), a, "isn={isn} a={a}");
            }
        }
    }

    #[test]
    fn add_wraps() {
        assert_eq!(Wrap32::new(u32::MAX) + 2, Wrap32::new(1));
    }
}
