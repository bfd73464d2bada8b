use crate::backend::Log;
use crate::{Context, ExitError, ExitFatal, ExitRevert, ExitSucceed};
use primitive_types::H160;

/// Successful precompile result. The executor records `cost` against the
/// frame's gasometer and replays `logs` into the journal.
#[derive(Debug)]
pub struct PrecompileOutput {
    pub exit_status: ExitSucceed,
    pub cost: u64,
    pub output: Vec<u8>,
    pub logs: Vec<Log>,
}

impl PrecompileOutput {
    #[must_use]
    pub fn without_logs(cost: u64, output: Vec<u8>) -> Self {
        Self {
            exit_status: ExitSucceed::Returned,
            cost,
            output,
            logs: Vec::new(),
        }
    }
}

/// Failed precompile result.
#[derive(Clone, Debug)]
pub enum PrecompileFailure {
    /// Consumes all forwarded gas; the parent sees success=0.
    Error { exit_status: ExitError },
    /// Returns remaining gas and data, like REVERT.
    Revert {
        exit_status: ExitRevert,
        output: Vec<u8>,
        cost: u64,
    },
    /// Poisons the whole execution.
    Fatal { exit_status: ExitFatal },
}

/// A per-fork set of precompiled contracts.
pub trait PrecompileSet {
    /// Run the precompile at `address`, or `None` if there is none.
    fn execute(
        &self,
        address: H160,
        input: &[u8],
        gas_limit: Option<u64>,
        context: &Context,
        is_static: bool,
    ) -> Option<Result<PrecompileOutput, PrecompileFailure>>;

    /// Whether `address` hosts a precompile in this set.
    fn is_precompile(&self, address: H160) -> bool;
}

impl PrecompileSet for () {
    fn execute(
        &self,
        _address: H160,
        _input: &[u8],
        _gas_limit: Option<u64>,
        _context: &Context,
        _is_static: bool,
    ) -> Option<Result<PrecompileOutput, PrecompileFailure>> {
        None
    }

    fn is_precompile(&self, _address: H160) -> bool {
        false
    }
}
