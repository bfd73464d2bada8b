use crate::utils::{I256, U256_ONE, U256_VALUE_32, U256_ZERO};
use core::convert::TryInto;
use core::ops::Rem;
use primitive_types::{U256, U512};

#[inline]
pub fn div(op1: U256, op2: U256) -> U256 {
    if op2 == U256_ZERO {
        U256_ZERO
    } else {
        op1 / op2
    }
}

#[inline]
pub fn sdiv(op1: U256, op2: U256) -> U256 {
    let op1: I256 = op1.into();
    let op2: I256 = op2.into();
    (op1 / op2).into()
}

#[inline]
pub fn rem(op1: U256, op2: U256) -> U256 {
    if op2 == U256_ZERO {
        U256_ZERO
    } else {
        op1.rem(op2)
    }
}

#[inline]
pub fn srem(op1: U256, op2: U256) -> U256 {
    if op2 == U256_ZERO {
        U256_ZERO
    } else {
        let op1: I256 = op1.into();
        let op2: I256 = op2.into();
        (op1 % op2).into()
    }
}

#[inline]
pub fn addmod(op1: U256, op2: U256, op3: U256) -> U256 {
    let op1: U512 = op1.into();
    let op2: U512 = op2.into();
    let op3: U512 = op3.into();

    if op3 == U512::zero() {
        U256_ZERO
    } else {
        let v = (op1 + op2) % op3;
        v.try_into()
            .expect("modulus fits 256 bits, so does the result")
    }
}

#[inline]
pub fn mulmod(op1: U256, op2: U256, op3: U256) -> U256 {
    let op1: U512 = op1.into();
    let op2: U512 = op2.into();
    let op3: U512 = op3.into();

    if op3 == U512::zero() {
        U256_ZERO
    } else {
        let v = (op1 * op2) % op3;
        v.try_into()
            .expect("modulus fits 256 bits, so does the result")
    }
}

/// Square-and-multiply, wrapping modulo 2^256.
#[inline]
pub fn exp(op1: U256, op2: U256) -> U256 {
    let mut base = op1;
    let mut power = op2;
    let mut result = U256_ONE;

    while power != U256_ZERO {
        if power & U256_ONE != U256_ZERO {
            result = result.overflowing_mul(base).0;
        }
        power >>= 1;
        base = base.overflowing_mul(base).0;
    }

    result
}

/// SIGNEXTEND: extend the sign bit of the low `8*(op1+1)` bits of `op2`
/// across the whole word. `op1 >= 32` leaves `op2` unchanged.
#[inline]
pub fn signextend(op1: U256, op2: U256) -> U256 {
    if op1 < U256_VALUE_32 {
        let bit_index = (8 * op1.low_u32() + 7) as usize;
        let bit = op2.bit(bit_index);
        let mask = (U256_ONE << bit_index) - U256_ONE;
        if bit {
            op2 | !mask
        } else {
            op2 & mask
        }
    } else {
        op2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_edge_cases() {
        assert_eq!(exp(U256::from(10), U256_ZERO), U256_ONE);
        assert_eq!(exp(U256_ZERO, U256_ZERO), U256_ONE);
        assert_eq!(exp(U256::from(2), U256::from(256)), U256_ZERO);
        assert_eq!(exp(U256::from(3), U256::from(4)), U256::from(81));
    }

    #[test]
    fn modular_ops_with_zero_modulus() {
        assert_eq!(addmod(U256::from(5), U256::from(6), U256_ZERO), U256_ZERO);
        assert_eq!(mulmod(U256::from(5), U256::from(6), U256_ZERO), U256_ZERO);
    }

    #[test]
    fn addmod_does_not_wrap_early() {
        // (MAX + MAX) % MAX == 0; the sum must not wrap at 256 bits.
        assert_eq!(addmod(U256::MAX, U256::MAX, U256::MAX), U256_ZERO);
        assert_eq!(
            addmod(U256::MAX, U256::from(3), U256::MAX),
            U256::from(3)
        );
    }

    #[test]
    fn signextend_matches_definition() {
        // Extend byte 0 of 0xff: all ones.
        assert_eq!(signextend(U256_ZERO, U256::from(0xff)), U256::MAX);
        // Extend byte 0 of 0x7f: unchanged.
        assert_eq!(signextend(U256_ZERO, U256::from(0x7f)), U256::from(0x7f));
        // Index >= 32: unchanged.
        assert_eq!(signextend(U256::from(32), U256::MAX), U256::MAX);
    }
}
