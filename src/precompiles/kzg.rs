use super::{make_address, out_of_gas_check, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use primitive_types::H160;
use std::borrow::Cow;

const POINT_EVALUATION_GAS: u64 = 50_000;
const INPUT_LEN: usize = 192;
const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// `FIELD_ELEMENTS_PER_BLOB` and `BLS_MODULUS`, the fixed 64-byte success
/// return of the precompile.
const RETURN_VALUE: [u8; 64] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0x00, //
    0x73, 0xed, 0xa7, 0x53, 0x29, 0x9d, 0x7d, 0x48, 0x33, 0x39, 0xd8, 0x08, 0x09, 0xa1, 0xd8,
    0x05, //
    0x53, 0xbd, 0xa4, 0x02, 0xff, 0xfe, 0x5b, 0xfe, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00,
    0x01,
];

fn kzg_to_versioned_hash(commitment: &[u8]) -> [u8; 32] {
    use sha2::Digest;

    let mut hash: [u8; 32] = sha2::Sha256::digest(commitment).into();
    hash[0] = VERSIONED_HASH_VERSION_KZG;
    hash
}

fn failure(message: &'static str) -> PrecompileFailure {
    PrecompileFailure::Error {
        exit_status: ExitError::Other(Cow::from(message)),
    }
}

/// The `0x0a` KZG point-evaluation precompile (EIP-4844): verify that the
/// blob behind `versioned_hash` evaluates to `y` at `z`.
pub struct PointEvaluation;

impl PointEvaluation {
    pub const ADDRESS: H160 = make_address(0x0a);
}

impl Precompile for PointEvaluation {
    fn required_gas(_input: &[u8]) -> Result<u64, ExitError> {
        Ok(POINT_EVALUATION_GAS)
    }

    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure> {
        out_of_gas_check(POINT_EVALUATION_GAS, target_gas)?;

        if input.len() != INPUT_LEN {
            return Err(failure("kzg: invalid input length"));
        }

        let versioned_hash = &input[0..32];
        let z = &input[32..64];
        let y = &input[64..96];
        let commitment = &input[96..144];
        let proof = &input[144..192];

        if kzg_to_versioned_hash(commitment) != versioned_hash {
            return Err(failure("kzg: versioned hash mismatch"));
        }

        let commitment =
            c_kzg::Bytes48::from_bytes(commitment).map_err(|_| failure("kzg: bad commitment"))?;
        let z = c_kzg::Bytes32::from_bytes(z).map_err(|_| failure("kzg: bad z"))?;
        let y = c_kzg::Bytes32::from_bytes(y).map_err(|_| failure("kzg: bad y"))?;
        let proof = c_kzg::Bytes48::from_bytes(proof).map_err(|_| failure("kzg: bad proof"))?;

        let settings = c_kzg::ethereum_kzg_settings(0);
        let valid = settings
            .verify_kzg_proof(&commitment, &z, &y, &proof)
            .unwrap_or(false);
        if !valid {
            return Err(failure("kzg: proof verification failed"));
        }

        Ok(PrecompileOutput::without_logs(
            POINT_EVALUATION_GAS,
            RETURN_VALUE.to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    #[test]
    fn rejects_wrong_length_and_wrong_hash() {
        let context = Context {
            address: H160::default(),
            caller: H160::default(),
            apparent_value: U256::zero(),
        };
        assert!(PointEvaluation
            .run(&[0u8; 191], Some(50_000), &context, false)
            .is_err());
        // Correct length, but the versioned hash does not match the
        // commitment.
        assert!(PointEvaluation
            .run(&[0u8; 192], Some(50_000), &context, false)
            .is_err());
    }

    #[test]
    fn return_value_constants() {
        // 4096 field elements per blob.
        assert_eq!(U256::from_big_endian(&RETURN_VALUE[..32]), U256::from(4096));
    }
}
