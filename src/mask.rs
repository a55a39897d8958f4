//! A small readiness/interest bitset, mirroring queen-io's `Ready`.

use std::{fmt, ops};

/// A set of interest or readiness bits.
///
/// Only `READABLE` and `WRITABLE` are ever passed to
/// [`Selector::register`](crate::Selector::register); `ERROR` and `HUP` are
/// only ever produced by the kernel on read-back and consumed internally.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Mask(u32);

impl Mask {
    pub const READABLE: Mask = Mask(0b0001);
    pub const WRITABLE: Mask = Mask(0b0010);
    pub const ERROR: Mask = Mask(0b0100);
    pub const HUP: Mask = Mask(0b1000);

    pub const fn empty() -> Mask {
        Mask(0)
    }

    pub fn is_empty(&self) -> bool {
        *self == Mask::empty()
    }

    pub fn is_readable(&self) -> bool {
        self.contains(Mask::READABLE)
    }

    pub fn is_writable(&self) -> bool {
        self.contains(Mask::WRITABLE)
    }

    pub fn is_hup(&self) -> bool {
        self.contains(Mask::HUP)
    }

    /// True if `self` is made up only of `READABLE`, `WRITABLE`, or their
    /// union — i.e. it is a valid interest mask to hand to the kernel.
    pub fn is_valid_interest(&self) -> bool {
        !self.is_empty() && (*self & !(Mask::READABLE | Mask::WRITABLE)).is_empty()
    }

    pub fn contains(&self, other: Mask) -> bool {
        (*self & other) == other
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl ops::BitOr for Mask {
    type Output = Mask;

    fn bitor(self, other: Mask) -> Mask {
        Mask(self.0 | other.0)
    }
}

impl ops::BitOrAssign for Mask {
    fn bitor_assign(&mut self, other: Mask) {
        self.0 |= other.0;
    }
}

impl ops::BitAnd for Mask {
    type Output = Mask;

    fn bitand(self, other: Mask) -> Mask {
        Mask(self.0 & other.0)
    }
}

impl ops::Not for Mask {
    type Output = Mask;

    fn not(self) -> Mask {
        Mask(!self.0)
    }
}

impl fmt::Debug for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        write!(f, "Mask {{")?;
        for (flag, name) in [
            (Mask::READABLE, "Readable"),
            (Mask::WRITABLE, "Writable"),
            (Mask::ERROR, "Error"),
            (Mask::HUP, "Hup"),
        ] {
            if self.contains(flag) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_writable_union_is_valid() {
        let mask = Mask::READABLE | Mask::WRITABLE;
        assert!(mask.is_valid_interest());
        assert!(mask.is_readable());
        assert!(mask.is_writable());
    }

    #[test]
    fn error_alone_is_not_a_valid_interest() {
        assert!(!Mask::ERROR.is_valid_interest());
        assert!(!Mask::empty().is_valid_interest());
    }
}
