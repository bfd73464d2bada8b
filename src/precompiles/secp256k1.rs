use super::{make_address, out_of_gas_check, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use primitive_types::{H160, H256};
use sha3::{Digest, Keccak256};
use std::borrow::Cow;

const ECRECOVER_BASE: u64 = 3_000;
const INPUT_LEN: usize = 128;

/// Recover the signing address from a 65-byte `(r, s, v)` signature over
/// `hash`, with `v` already normalized to a recovery bit.
///
/// # Errors
/// `ExitError::Other` when the signature does not recover.
pub fn ecrecover(hash: H256, signature: &[u8; 65]) -> Result<H160, ExitError> {
    let message = libsecp256k1::Message::parse_slice(hash.as_bytes())
        .map_err(|_| ExitError::Other(Cow::from("invalid message")))?;
    let rs = libsecp256k1::Signature::parse_standard_slice(&signature[0..64])
        .map_err(|_| ExitError::Other(Cow::from("invalid signature")))?;
    let v = signature[64];
    let bit = match v {
        0..=26 => v,
        _ => v - 27,
    };

    if let Ok(recovery_id) = libsecp256k1::RecoveryId::parse(bit) {
        if let Ok(public_key) = libsecp256k1::recover(&message, &rs, &recovery_id) {
            // The address is the keccak of the raw 64-byte key; the first
            // serialized byte is the 0x04 uncompressed tag.
            let hash = Keccak256::digest(&public_key.serialize()[1..]);
            return Ok(H160::from_slice(&hash[12..]));
        }
    }

    Err(ExitError::Other(Cow::from("failed to recover")))
}

/// The `0x01` ecrecover precompile.
pub struct ECRecover;

impl ECRecover {
    pub const ADDRESS: H160 = make_address(1);
}

impl Precompile for ECRecover {
    fn required_gas(_input: &[u8]) -> Result<u64, ExitError> {
        Ok(ECRECOVER_BASE)
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

        let mut input = input.to_vec();
        input.resize(INPUT_LEN, 0);

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&input[0..32]);

        let mut v = [0u8; 32];
        v.copy_from_slice(&input[32..64]);

        let mut signature = [0u8; 65];
        signature[0..32].copy_from_slice(&input[64..96]);
        signature[32..64].copy_from_slice(&input[96..128]);

        // v must be 27 or 28 as a 32-byte big-endian word; anything else
        // yields an empty (but successful) result.
        let v_bit = match v[31] {
            27 | 28 if v[..31] == [0; 31] => v[31] - 27,
            _ => {
                return Ok(PrecompileOutput::without_logs(cost, Vec::new()));
            }
        };
        signature[64] = v_bit;

        let output = ecrecover(H256::from_slice(&hash), &signature)
            .map(|address| {
                let mut output = [0u8; 32];
                output[12..32].copy_from_slice(address.as_bytes());
                output.to_vec()
            })
            .unwrap_or_default();

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
            apparent_value: primitive_types::U256::zero(),
        }
    }

    #[test]
    fn recovers_known_address() {
        let input = hex::decode("47173285a8d7341e5e972fc677286384f802f8ef42a5ec5f03bbfa254cb01fad000000000000000000000000000000000000000000000000000000000000001b650acf9d3f5f0a2c799776a1254355d5f4061762a237396a99a0e0e3fc2bcd6729514a0dacb2e623ac4abd157cb18163ff942280db4d5caad66ddf941ba12e03").unwrap();
        let expected =
            hex::decode("000000000000000000000000c08b5542d177ac6686946920409741463a15dddb")
                .unwrap();

        let res = ECRecover
            .run(&input, Some(3_000), &new_context(), false)
            .unwrap()
            .output;
        assert_eq!(res, expected);
    }

    #[test]
    fn out_of_gas() {
        let res = ECRecover.run(&[0u8; 128], Some(2_999), &new_context(), false);
        assert!(matches!(
            res,
            Err(PrecompileFailure::Error {
                exit_status: ExitError::OutOfGas
            })
        ));
    }

    #[test]
    fn bad_v_returns_empty() {
        let input = hex::decode("47173285a8d7341e5e972fc677286384f802f8ef42a5ec5f03bbfa254cb01fad000000000000000000000000000000000000000000000000000000000000001a650acf9d3f5f0a2c799776a1254355d5f4061762a237396a99a0e0e3fc2bcd6729514a0dacb2e623ac4abd157cb18163ff942280db4d5caad66ddf941ba12e03").unwrap();
        let res = ECRecover
            .run(&input, Some(3_000), &new_context(), false)
            .unwrap()
            .output;
        assert!(res.is_empty());
    }
}
