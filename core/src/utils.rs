//! Word-level helpers shared across the interpreter layers.

use core::cmp::Ordering;
use core::ops::{Div, Rem};
use primitive_types::U256;

pub const U256_ZERO: U256 = U256([0, 0, 0, 0]);
pub const U256_ONE: U256 = U256([1, 0, 0, 0]);
pub const U256_VALUE_32: U256 = U256([32, 0, 0, 0]);
pub const U64_MAX: U256 = U256([u64::MAX, 0, 0, 0]);
#[allow(clippy::cast_possible_truncation)]
pub const USIZE_MAX: U256 = U256([usize::MAX as u64, 0, 0, 0]);

const SIGN_BIT_MASK: U256 = U256([u64::MAX, u64::MAX, u64::MAX, 0x7fff_ffff_ffff_ffff]);

/// Sign of an [`I256`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sign {
    Plus,
    Minus,
    Zero,
}

/// Two's-complement view of a 256-bit word, stored as sign + magnitude.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct I256(pub Sign, pub U256);

impl I256 {
    #[must_use]
    pub const fn zero() -> Self {
        Self(Sign::Zero, U256_ZERO)
    }

    /// The most negative value, `-2^255`.
    #[must_use]
    pub const fn min_value() -> Self {
        Self(Sign::Minus, U256([0, 0, 0, 0x8000_0000_0000_0000]))
    }

    fn is_minus_one(&self) -> bool {
        self.0 == Sign::Minus && self.1 == U256_ONE
    }
}

impl From<U256> for I256 {
    fn from(value: U256) -> Self {
        if value == U256_ZERO {
            Self::zero()
        } else if value & SIGN_BIT_MASK == value {
            Self(Sign::Plus, value)
        } else {
            Self(Sign::Minus, twos_complement(value))
        }
    }
}

impl From<I256> for U256 {
    fn from(value: I256) -> Self {
        match value.0 {
            Sign::Plus | Sign::Zero => value.1,
            Sign::Minus => twos_complement(value.1),
        }
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> Ordering {
        const fn rank(sign: Sign) -> u8 {
            match sign {
                Sign::Minus => 0,
                Sign::Zero => 1,
                Sign::Plus => 2,
            }
        }

        match rank(self.0).cmp(&rank(other.0)) {
            Ordering::Equal => match self.0 {
                Sign::Plus => self.1.cmp(&other.1),
                Sign::Minus => other.1.cmp(&self.1),
                Sign::Zero => Ordering::Equal,
            },
            ordering => ordering,
        }
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Div for I256 {
    type Output = Self;

    fn div(self, other: Self) -> Self {
        if other.1 == U256_ZERO {
            return Self::zero();
        }
        if self == Self::min_value() && other.is_minus_one() {
            // -2^255 / -1 overflows back to -2^255.
            return Self::min_value();
        }

        let magnitude = self.1 / other.1;
        if magnitude == U256_ZERO {
            return Self::zero();
        }
        let sign = if self.0 == other.0 {
            Sign::Plus
        } else {
            Sign::Minus
        };
        Self(sign, magnitude)
    }
}

impl Rem for I256 {
    type Output = Self;

    fn rem(self, other: Self) -> Self {
        if other.1 == U256_ZERO {
            return Self::zero();
        }
        let magnitude = self.1 % other.1;
        if magnitude == U256_ZERO {
            return Self::zero();
        }
        // Remainder takes the sign of the dividend.
        Self(self.0, magnitude)
    }
}

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256_ONE).0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i(v: i64) -> U256 {
        #[allow(clippy::cast_sign_loss)]
        if v >= 0 {
            U256::from(v as u64)
        } else {
            twos_complement(U256::from((-v) as u64))
        }
    }

    #[test]
    fn signed_division() {
        let div = |a: U256, b: U256| -> U256 { (I256::from(a) / I256::from(b)).into() };
        assert_eq!(div(i(7), i(-2)), i(-3));
        assert_eq!(div(i(-7), i(-2)), i(3));
        assert_eq!(div(i(-7), i(2)), i(-3));
        assert_eq!(div(i(7), i(0)), i(0));
        // -2^255 / -1 wraps to itself.
        let min: U256 = I256::min_value().into();
        assert_eq!(div(min, i(-1)), min);
    }

    #[test]
    fn signed_remainder() {
        let rem = |a: U256, b: U256| -> U256 { (I256::from(a) % I256::from(b)).into() };
        assert_eq!(rem(i(7), i(-2)), i(1));
        assert_eq!(rem(i(-7), i(2)), i(-1));
        assert_eq!(rem(i(-7), i(0)), i(0));
    }

    #[test]
    fn signed_ordering() {
        assert!(I256::from(i(-2)) < I256::from(i(-1)));
        assert!(I256::from(i(-1)) < I256::from(i(0)));
        assert!(I256::from(i(0)) < I256::from(i(1)));
        assert!(I256::from(i(1)) < I256::from(i(2)));
    }
}
