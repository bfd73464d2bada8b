use super::{make_address, out_of_gas_check, Berlin, Byzantium, HardFork, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use core::marker::PhantomData;
use num::BigUint;
use primitive_types::{H160, U256};

/// The `0x05` modular-exponentiation precompile (EIP-198, repriced by
/// EIP-2565 in Berlin).
pub struct ModExp<HF: HardFork>(PhantomData<HF>);

impl<HF: HardFork> ModExp<HF> {
    pub const ADDRESS: H160 = make_address(5);

    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

fn read_u256(input: &[u8], pos: usize) -> U256 {
    let mut buf = [0u8; 32];
    let have = input.len().saturating_sub(pos).min(32);
    buf[..have].copy_from_slice(&input[pos..pos + have]);
    U256::from_big_endian(&buf)
}

fn read_lengths(input: &[u8]) -> Result<(usize, usize, usize), ExitError> {
    let base_len = read_u256(input, 0);
    let exp_len = read_u256(input, 32);
    let mod_len = read_u256(input, 64);

    let too_large = U256::from(u32::MAX);
    if base_len > too_large || exp_len > too_large || mod_len > too_large {
        return Err(ExitError::OutOfGas);
    }
    Ok((base_len.as_usize(), exp_len.as_usize(), mod_len.as_usize()))
}

fn read_padded(input: &[u8], pos: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if pos < input.len() {
        let have = (input.len() - pos).min(len);
        out[..have].copy_from_slice(&input[pos..pos + have]);
    }
    out
}

/// Bit length minus one of the exponent head, per EIP-198: for long
/// exponents only the first 32 bytes contribute bits, the rest contribute
/// 8 gas-relevant bits per byte.
fn adjusted_exp_len(exp_len: usize, exp_head: U256) -> u64 {
    let bits = if exp_head == U256::zero() {
        0
    } else {
        exp_head.bits() as u64 - 1
    };
    if exp_len <= 32 {
        bits
    } else {
        8 * (exp_len as u64 - 32) + bits
    }
}

fn exp_head(input: &[u8], base_len: usize, exp_len: usize) -> U256 {
    let pos = 96 + base_len;
    let head = read_padded(input, pos, exp_len.min(32));
    let mut buf = [0u8; 32];
    buf[32 - head.len()..].copy_from_slice(&head);
    U256::from_big_endian(&buf)
}

fn run_inner(input: &[u8]) -> Result<Vec<u8>, ExitError> {
    let (base_len, exp_len, mod_len) = read_lengths(input)?;

    if mod_len == 0 {
        return Ok(Vec::new());
    }

    let base = BigUint::from_bytes_be(&read_padded(input, 96, base_len));
    let exponent = BigUint::from_bytes_be(&read_padded(input, 96 + base_len, exp_len));
    let modulus = BigUint::from_bytes_be(&read_padded(input, 96 + base_len + exp_len, mod_len));

    let result = if modulus == BigUint::default() {
        BigUint::default()
    } else {
        base.modpow(&exponent, &modulus)
    };

    // Left-pad the result to the modulus length.
    let bytes = result.to_bytes_be();
    let mut output = vec![0u8; mod_len];
    let offset = mod_len - bytes.len().min(mod_len);
    output[offset..].copy_from_slice(&bytes[bytes.len() - (mod_len - offset)..]);
    Ok(output)
}

impl ModExp<Byzantium> {
    // EIP-198 multiplication complexity.
    fn mult_complexity(x: u64) -> u64 {
        if x <= 64 {
            x * x
        } else if x <= 1024 {
            x * x / 4 + 96 * x - 3072
        } else {
            let x = u128::from(x);
            u64::try_from(x * x / 16 + 480 * x - 199_680).unwrap_or(u64::MAX)
        }
    }
}

impl Precompile for ModExp<Byzantium> {
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        let (base_len, exp_len, mod_len) = read_lengths(input)?;
        let max_len = base_len.max(mod_len) as u64;
        let iterations = adjusted_exp_len(exp_len, exp_head(input, base_len, exp_len)).max(1);

        let complexity = Self::mult_complexity(max_len);
        complexity
            .checked_mul(iterations)
            .map(|gas| gas / 20)
            .ok_or(ExitError::OutOfGas)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        let cost = Self::required_gas(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        out_of_gas_check(cost, target_gas)?;

        let output = run_inner(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

impl Precompile for ModExp<Berlin> {
    // EIP-2565: words-of-the-larger-operand squared, floor 200.
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        let (base_len, exp_len, mod_len) = read_lengths(input)?;
        let max_len = base_len.max(mod_len) as u64;
        let words = max_len.div_ceil(8);
        let complexity = words.checked_mul(words).ok_or(ExitError::OutOfGas)?;
        let iterations = adjusted_exp_len(exp_len, exp_head(input, base_len, exp_len)).max(1);

        let gas = complexity
            .checked_mul(iterations)
            .map(|gas| gas / 3)
            .ok_or(ExitError::OutOfGas)?;
        Ok(gas.max(200))
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        let cost = Self::required_gas(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        out_of_gas_check(cost, target_gas)?;

        let output = run_inner(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_context() -> Context {
        Context {
            address: H160::default(),
            caller: H160::default(),
            apparent_value: U256::zero(),
        }
    }

    // 3 ^ 0xff..ff mod 2^256-2^32-977 == 1 (Fermat), the classic EIP-198
    // test vector.
    #[test]
    fn eip_198_vector() {
        let input = hex::decode(
            "0000000000000000000000000000000000000000000000000000000000000001\
             0000000000000000000000000000000000000000000000000000000000000020\
             0000000000000000000000000000000000000000000000000000000000000020\
             03\
             fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2e\
             fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f",
        )
        .unwrap();

        let expected =
            hex::decode("0000000000000000000000000000000000000000000000000000000000000001")
                .unwrap();

        let res = ModExp::<Byzantium>::new()
            .run(&input, Some(20_000_000), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }

    #[test]
    fn zero_modulus_yields_zeros() {
        let input = hex::decode(
            "0000000000000000000000000000000000000000000000000000000000000001\
             0000000000000000000000000000000000000000000000000000000000000001\
             0000000000000000000000000000000000000000000000000000000000000001\
             0303",
        )
        .unwrap();

        let res = ModExp::<Berlin>::new()
            .run(&input, Some(20_000), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, vec![0]);
    }

    #[test]
    fn berlin_floor_price() {
        let gas = ModExp::<Berlin>::required_gas(&[0u8; 96]).unwrap();
        assert_eq!(gas, 200);
    }
}
