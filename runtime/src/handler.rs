use crate::{Capture, Context, CreateScheme, ExitError, ExitReason};
use primitive_types::{H160, H256, U256};

/// A balance movement between two accounts.
#[derive(Clone, Debug)]
pub struct Transfer {
    pub source: H160,
    pub target: H160,
    pub value: U256,
}

/// The seam between opcode evaluation and the world: state reads, state
/// writes, block data, and sub-frame creation. Implemented by the stack
/// executor.
pub trait Handler {
    /// Opaque token carrying a pending CREATE sub-frame up to the executor
    /// loop.
    type CreateInterrupt;
    /// Opaque token carrying a pending CALL sub-frame up to the executor
    /// loop.
    type CallInterrupt;

    fn balance(&self, address: H160) -> U256;
    fn code_size(&self, address: H160) -> U256;
    fn code_hash(&self, address: H160) -> H256;
    fn code(&self, address: H160) -> Vec<u8>;
    fn storage(&self, address: H160, index: H256) -> H256;
    /// Storage as it was at the start of the transaction.
    fn original_storage(&self, address: H160, index: H256) -> H256;
    /// Whether the account exists at all (pre-Spurious-Dragon semantics) or
    /// exists and is non-empty (after).
    fn exists(&self, address: H160) -> bool;
    fn is_empty_storage(&self, address: H160) -> bool;
    /// Whether the account is queued for deletion in this transaction.
    fn deleted(&self, address: H160) -> bool;

    /// Warm/cold status of an address or slot; recording warms it.
    ///
    /// # Errors
    /// Gas accounting for the lookup itself can fail.
    fn is_cold(&mut self, address: H160, index: Option<H256>) -> Result<bool, ExitError>;

    fn gas_left(&self) -> U256;
    fn gas_price(&self) -> U256;
    fn origin(&self) -> H160;
    fn block_hash(&self, number: U256) -> H256;
    fn block_number(&self) -> U256;
    fn block_coinbase(&self) -> H160;
    fn block_timestamp(&self) -> U256;
    fn block_difficulty(&self) -> U256;
    /// `prev_randao` once the chain runs under proof of stake.
    fn block_randomness(&self) -> Option<H256>;
    fn block_gas_limit(&self) -> U256;
    fn block_base_fee_per_gas(&self) -> U256;
    fn blob_base_fee(&self) -> Option<u128>;
    fn get_blob_hash(&self, index: usize) -> Option<U256>;
    fn chain_id(&self) -> U256;

    /// # Errors
    /// Frame-local failures as `ExitError`.
    fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), ExitError>;

    /// # Errors
    /// Frame-local failures as `ExitError`.
    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), ExitError>;

    /// SELFDESTRUCT `address`, sending its balance to `target`.
    ///
    /// # Errors
    /// Frame-local failures as `ExitError`.
    fn mark_delete(&mut self, address: H160, target: H160) -> Result<(), ExitError>;

    /// EIP-1153 transient store.
    ///
    /// # Errors
    /// Frame-local failures as `ExitError`.
    fn tstore(&mut self, address: H160, index: H256, value: U256) -> Result<(), ExitError>;

    /// EIP-1153 transient load.
    ///
    /// # Errors
    /// Frame-local failures as `ExitError`.
    fn tload(&mut self, address: H160, index: H256) -> Result<U256, ExitError>;

    /// Begin a CREATE/CREATE2 sub-frame.
    fn create(
        &mut self,
        caller: H160,
        scheme: CreateScheme,
        value: U256,
        init_code: Vec<u8>,
        target_gas: Option<u64>,
    ) -> Capture<(ExitReason, Option<H160>, Vec<u8>), Self::CreateInterrupt>;

    /// Begin a CALL-family sub-frame.
    #[allow(clippy::too_many_arguments)]
    fn call(
        &mut self,
        code_address: H160,
        transfer: Option<Transfer>,
        input: Vec<u8>,
        target_gas: Option<u64>,
        is_static: bool,
        context: Context,
    ) -> Capture<(ExitReason, Vec<u8>), Self::CallInterrupt>;
}
