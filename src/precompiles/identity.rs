use super::{make_address, out_of_gas_check, Precompile};
use crate::executor::stack::{PrecompileFailure, PrecompileOutput};
use crate::{Context, ExitError};
use primitive_types::H160;

const IDENTITY_BASE: u64 = 15;
const IDENTITY_PER_WORD: u64 = 3;

/// The `0x04` identity precompile.
pub struct Identity;

impl Identity {
    pub const ADDRESS: H160 = make_address(4);
}

impl Precompile for Identity {
    fn required_gas(input: &[u8]) -> Result<u64, ExitError> {
        let words = (input.len() as u64).div_ceil(32);
        Ok(IDENTITY_BASE + words * IDENTITY_PER_WORD)
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

        Ok(PrecompileOutput::without_logs(cost, input.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::U256;

    #[test]
    fn copies_input() {
        let context = Context {
            address: H160::default(),
            caller: H160::default(),
            apparent_value: U256::zero(),
        };
        let data = [1u8, 2, 3, 4];
        let res = Identity
            .run(&data, Some(18), &context, false)
            .unwrap()
            .output;
        assert_eq!(res, data.to_vec());
    }
}
