use crate::utils::{I256, Sign, U256_ONE, U256_VALUE_32, U256_ZERO};
use primitive_types::U256;

#[inline]
pub fn slt(op1: U256, op2: U256) -> U256 {
    let op1: I256 = op1.into();
    let op2: I256 = op2.into();
    if op1 < op2 {
        U256_ONE
    } else {
        U256_ZERO
    }
}

#[inline]
pub fn sgt(op1: U256, op2: U256) -> U256 {
    let op1: I256 = op1.into();
    let op2: I256 = op2.into();
    if op1 > op2 {
        U256_ONE
    } else {
        U256_ZERO
    }
}

#[inline]
pub fn iszero(op1: U256) -> U256 {
    if op1 == U256_ZERO {
        U256_ONE
    } else {
        U256_ZERO
    }
}

#[inline]
pub fn not(op1: U256) -> U256 {
    !op1
}

/// BYTE: the `op1`-th byte of `op2`, counting from the most significant.
#[inline]
pub fn byte(op1: U256, op2: U256) -> U256 {
    if op1 >= U256_VALUE_32 {
        U256_ZERO
    } else {
        U256::from(op2.byte(31 - op1.as_usize()))
    }
}

#[inline]
pub fn shl(shift: U256, value: U256) -> U256 {
    if value == U256_ZERO || shift >= U256::from(256) {
        U256_ZERO
    } else {
        value << shift.as_usize()
    }
}

#[inline]
pub fn shr(shift: U256, value: U256) -> U256 {
    if value == U256_ZERO || shift >= U256::from(256) {
        U256_ZERO
    } else {
        value >> shift.as_usize()
    }
}

/// SAR: arithmetic right shift, filling with the sign bit.
#[inline]
pub fn sar(shift: U256, value: U256) -> U256 {
    let signed: I256 = value.into();
    if value == U256_ZERO {
        return U256_ZERO;
    }
    if shift >= U256::from(256) {
        return match signed.0 {
            Sign::Minus => U256::MAX,
            Sign::Plus | Sign::Zero => U256_ZERO,
        };
    }

    let shift = shift.as_usize();
    match signed.0 {
        Sign::Plus | Sign::Zero => value >> shift,
        Sign::Minus => {
            if shift == 0 {
                value
            } else {
                (value >> shift) | (U256::MAX << (256 - shift))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_indexing() {
        let x = U256::from_big_endian(&{
            let mut b = [0u8; 32];
            b[0] = 0xaa;
            b[31] = 0xbb;
            b
        });
        assert_eq!(byte(U256_ZERO, x), U256::from(0xaa));
        assert_eq!(byte(U256::from(31), x), U256::from(0xbb));
        assert_eq!(byte(U256::from(32), x), U256_ZERO);
    }

    #[test]
    fn sar_sign_fill() {
        // -8 >> 1 == -4
        let minus_eight = (!U256::from(8)).overflowing_add(U256_ONE).0;
        let minus_four = (!U256::from(4)).overflowing_add(U256_ONE).0;
        assert_eq!(sar(U256_ONE, minus_eight), minus_four);
        // Positive values shift in zeros.
        assert_eq!(sar(U256_ONE, U256::from(8)), U256::from(4));
        // Oversized shifts saturate.
        assert_eq!(sar(U256::from(300), minus_eight), U256::MAX);
        assert_eq!(sar(U256::from(300), U256::from(8)), U256_ZERO);
    }

    #[test]
    fn shl_shr_oversized() {
        assert_eq!(shl(U256::from(256), U256_ONE), U256_ZERO);
        assert_eq!(shr(U256::from(256), U256::MAX), U256_ZERO);
        assert_eq!(shl(U256::from(4), U256_ONE), U256::from(16));
        assert_eq!(shr(U256::from(4), U256::from(16)), U256_ONE);
    }
}
