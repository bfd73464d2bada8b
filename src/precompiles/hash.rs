use super::{make_address, out_of_gas_check, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use primitive_types::H160;

const SHA256_BASE: u64 = 60;
const SHA256_PER_WORD: u64 = 12;
const RIPEMD160_BASE: u64 = 600;
const RIPEMD160_PER_WORD: u64 = 120;

/// The `0x02` SHA-256 precompile.
pub struct Sha256;

impl Sha256 {
    pub const ADDRESS: H160 = make_address(2);
}

impl Precompile for Sha256 {
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        let words = (input.len() as u64).div_ceil(32);
        Ok(SHA256_BASE + words * SHA256_PER_WORD)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        use sha2::Digest;

        let cost = Self::required_gas(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        out_of_gas_check(cost, target_gas)?;

        let output = sha2::Sha256::digest(input).to_vec();
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

/// The `0x03` RIPEMD-160 precompile.
pub struct Ripemd160;

impl Ripemd160 {
    pub const ADDRESS: H160 = make_address(3);
}

impl Precompile for Ripemd160 {
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        let words = (input.len() as u64).div_ceil(32);
        Ok(RIPEMD160_BASE + words * RIPEMD160_PER_WORD)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        use ripemd::Digest;

        let cost = Self::required_gas(input)
            .map_err(|exit_status| PrecompileFailure::Error { exit_status })?;
        out_of_gas_check(cost, target_gas)?;

        let hash = ripemd::Ripemd160::digest(input);
        // 20 bytes, left-padded to the 32-byte EVM word.
        let mut output = vec![0u8; 32];
        output[12..].copy_from_slice(&hash);
        Ok(PrecompileOutput::without_logs(cost, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    fn new_context() -> Context {
        Context {
            address: H160::default(),
            caller: H160::default(),
            apparent_value: U256::zero(),
        }
    }

    #[test]
    fn sha256_of_empty() {
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        let res = Sha256
            .run(b"", Some(60), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }

    #[test]
    fn ripemd160_of_empty() {
        let expected =
            hex::decode("0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31")
                .unwrap();
        let res = Ripemd160
            .run(b"", Some(600), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }
}
