/// Per-fork VM descriptor: every gas constant and feature switch the
/// interpreter, gasometer and executor consult at run time.
///
/// One constructor per fork, each starting from the previous fork's values.
/// Descriptors are plain data; a chain holds one per activation and threads
/// a reference everywhere.
#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Debug)]
pub struct Config {
    /// Gas paid for EXTCODESIZE/EXTCODECOPY base.
    pub gas_ext_code: u64,
    /// Gas paid for EXTCODEHASH.
    pub gas_ext_code_hash: u64,
    /// Gas paid for BALANCE.
    pub gas_balance: u64,
    /// Gas paid for SLOAD.
    pub gas_sload: u64,
    /// Gas paid for a cold SLOAD on top of the warm cost (EIP-2929).
    pub gas_sload_cold: u64,
    /// Gas paid for an SSTORE from zero to non-zero.
    pub gas_sstore_set: u64,
    /// Gas paid for any other SSTORE.
    pub gas_sstore_reset: u64,
    /// Refund for clearing a storage slot.
    pub refund_sstore_clears: i64,
    /// Cap divisor of the refund counter (EIP-3529 changed 2 to 5).
    pub max_refund_quotient: u64,
    /// Gas paid for SELFDESTRUCT.
    pub gas_suicide: u64,
    /// Surcharge when SELFDESTRUCT funds a fresh account.
    pub gas_suicide_new_account: u64,
    /// Gas paid for the CALL family base.
    pub gas_call: u64,
    /// Gas paid per byte of EXP exponent.
    pub gas_expbyte: u64,
    /// Intrinsic gas of a create transaction.
    pub gas_transaction_create: u64,
    /// Intrinsic gas of a message-call transaction.
    pub gas_transaction_call: u64,
    /// Intrinsic gas per zero data byte.
    pub gas_transaction_zero_data: u64,
    /// Intrinsic gas per non-zero data byte.
    pub gas_transaction_non_zero_data: u64,
    /// Intrinsic gas per access-list address (EIP-2930).
    pub gas_access_list_address: u64,
    /// Intrinsic gas per access-list storage key (EIP-2930).
    pub gas_access_list_storage_key: u64,
    /// Surcharge for touching a cold account (EIP-2929).
    pub gas_account_access_cold: u64,
    /// Gas paid for a warm storage/account read (EIP-2929).
    pub gas_storage_read_warm: u64,
    /// Net SSTORE gas metering (EIP-1283/EIP-2200).
    pub sstore_gas_metering: bool,
    /// Reject SSTORE below the 2300-gas stipend sentry (EIP-2200).
    pub sstore_revert_under_stipend: bool,
    /// Warm/cold access accounting is active (EIP-2929).
    pub increase_state_access_gas: bool,
    /// Reduced clears refund and quotient (EIP-3529).
    pub decrease_clears_refund: bool,
    /// Reject deployed code starting with 0xEF (EIP-3541).
    pub disallow_executable_format: bool,
    /// Coinbase starts warm (EIP-3651).
    pub warm_coinbase_address: bool,
    /// Error when CALL asks for more gas than remains (pre-EIP-150).
    pub err_on_call_with_more_gas: bool,
    /// Cap forwarded gas at 63/64 of the remainder (EIP-150).
    pub call_l64_after_gas: bool,
    /// Empty accounts count as existing (pre-EIP-161).
    pub empty_considered_exists: bool,
    /// Contract creation bumps the fresh account's nonce (EIP-161).
    pub create_increase_nonce: bool,
    /// Word-stack depth limit.
    pub stack_limit: usize,
    /// Memory byte limit.
    pub memory_limit: usize,
    /// Call depth limit.
    pub call_stack_limit: usize,
    /// Deployed-code size cap (EIP-170).
    pub create_contract_limit: Option<usize>,
    /// Init-code size cap (EIP-3860).
    pub max_initcode_size: Option<usize>,
    /// Stipend granted to value-bearing calls.
    pub call_stipend: u64,
    pub has_delegate_call: bool,
    pub has_static_call: bool,
    pub has_create2: bool,
    pub has_revert: bool,
    pub has_return_data: bool,
    pub has_bitwise_shifting: bool,
    pub has_chain_id: bool,
    pub has_self_balance: bool,
    pub has_ext_code_hash: bool,
    /// BASEFEE opcode (EIP-3198).
    pub has_base_fee: bool,
    /// PUSH0 opcode (EIP-3855).
    pub has_push0: bool,
    /// BLOBBASEFEE opcode (EIP-7516).
    pub has_blob_base_fee: bool,
    /// BLOBHASH and blob transactions (EIP-4844).
    pub has_shard_blob_transactions: bool,
    /// TLOAD/TSTORE (EIP-1153).
    pub has_transient_storage: bool,
    /// MCOPY (EIP-5656).
    pub has_mcopy: bool,
    /// SELFDESTRUCT only inside the creating transaction (EIP-6780).
    pub has_restricted_selfdestruct: bool,
    /// Gas-estimation mode: charge the 63/64 retention up front so the
    /// reported total is callable.
    pub estimate: bool,
}

impl Config {
    /// Frontier rules.
    #[must_use]
    pub const fn frontier() -> Self {
        Self {
            gas_ext_code: 20,
            gas_ext_code_hash: 20,
            gas_balance: 20,
            gas_sload: 50,
            gas_sload_cold: 0,
            gas_sstore_set: 20000,
            gas_sstore_reset: 5000,
            refund_sstore_clears: 15000,
            max_refund_quotient: 2,
            gas_suicide: 0,
            gas_suicide_new_account: 0,
            gas_call: 40,
            gas_expbyte: 10,
            gas_transaction_create: 21000,
            gas_transaction_call: 21000,
            gas_transaction_zero_data: 4,
            gas_transaction_non_zero_data: 68,
            gas_access_list_address: 0,
            gas_access_list_storage_key: 0,
            gas_account_access_cold: 0,
            gas_storage_read_warm: 0,
            sstore_gas_metering: false,
            sstore_revert_under_stipend: false,
            increase_state_access_gas: false,
            decrease_clears_refund: false,
            disallow_executable_format: false,
            warm_coinbase_address: false,
            err_on_call_with_more_gas: true,
            call_l64_after_gas: false,
            empty_considered_exists: true,
            create_increase_nonce: false,
            stack_limit: 1024,
            memory_limit: usize::MAX,
            call_stack_limit: 1024,
            create_contract_limit: None,
            max_initcode_size: None,
            call_stipend: 2300,
            has_delegate_call: false,
            has_static_call: false,
            has_create2: false,
            has_revert: false,
            has_return_data: false,
            has_bitwise_shifting: false,
            has_chain_id: false,
            has_self_balance: false,
            has_ext_code_hash: false,
            has_base_fee: false,
            has_push0: false,
            has_blob_base_fee: false,
            has_shard_blob_transactions: false,
            has_transient_storage: false,
            has_mcopy: false,
            has_restricted_selfdestruct: false,
            estimate: false,
        }
    }

    /// Homestead: DELEGATECALL, priced create transactions.
    #[must_use]
    pub const fn homestead() -> Self {
        let mut config = Self::frontier();
        config.gas_transaction_create = 53000;
        config.has_delegate_call = true;
        config
    }

    /// Tangerine Whistle (EIP-150): repriced IO opcodes, 63/64 forwarding.
    #[must_use]
    pub const fn tangerine_whistle() -> Self {
        let mut config = Self::homestead();
        config.gas_ext_code = 700;
        config.gas_ext_code_hash = 700;
        config.gas_balance = 400;
        config.gas_sload = 200;
        config.gas_call = 700;
        config.gas_suicide = 5000;
        config.gas_suicide_new_account = 25000;
        config.err_on_call_with_more_gas = false;
        config.call_l64_after_gas = true;
        config
    }

    /// Spurious Dragon (EIP-158/160/161/170): empty-account sweeps, EXP
    /// repricing, code-size cap.
    #[must_use]
    pub const fn spurious_dragon() -> Self {
        let mut config = Self::tangerine_whistle();
        config.gas_expbyte = 50;
        config.empty_considered_exists = false;
        config.create_increase_nonce = true;
        config.create_contract_limit = Some(0x6000);
        config
    }

    /// Byzantium: REVERT, RETURNDATA, STATICCALL.
    #[must_use]
    pub const fn byzantium() -> Self {
        let mut config = Self::spurious_dragon();
        config.has_revert = true;
        config.has_return_data = true;
        config.has_static_call = true;
        config
    }

    /// Constantinople: shifts, CREATE2, EXTCODEHASH, EIP-1283 net metering.
    #[must_use]
    pub const fn constantinople() -> Self {
        let mut config = Self::byzantium();
        config.has_bitwise_shifting = true;
        config.has_create2 = true;
        config.has_ext_code_hash = true;
        config.gas_ext_code_hash = 400;
        config.sstore_gas_metering = true;
        config
    }

    /// Petersburg: Constantinople with EIP-1283 backed out.
    #[must_use]
    pub const fn petersburg() -> Self {
        let mut config = Self::constantinople();
        config.sstore_gas_metering = false;
        config
    }

    /// Istanbul: EIP-1884 repricing, EIP-2200 metering, CHAINID,
    /// SELFBALANCE, 16-gas calldata.
    #[must_use]
    pub const fn istanbul() -> Self {
        let mut config = Self::petersburg();
        config.gas_sload = 800;
        config.gas_balance = 700;
        config.gas_ext_code_hash = 700;
        config.gas_transaction_non_zero_data = 16;
        config.sstore_gas_metering = true;
        config.sstore_revert_under_stipend = true;
        config.has_chain_id = true;
        config.has_self_balance = true;
        config
    }

    /// Berlin (EIP-2929/2930): warm/cold accounting and access lists.
    #[must_use]
    pub const fn berlin() -> Self {
        let mut config = Self::istanbul();
        config.gas_storage_read_warm = 100;
        config.gas_sload = 100;
        config.gas_sload_cold = 2100;
        config.gas_account_access_cold = 2600;
        config.gas_access_list_address = 2400;
        config.gas_access_list_storage_key = 1900;
        // Base costs move into the warm/cold scheme.
        config.gas_ext_code = 0;
        config.gas_ext_code_hash = 0;
        config.gas_balance = 0;
        config.gas_call = 0;
        config.gas_sstore_reset = 5000 - 2100;
        config.increase_state_access_gas = true;
        config
    }

    /// London (EIP-1559/3529/3541): base fee, reduced refunds, 0xEF ban.
    #[must_use]
    pub const fn london() -> Self {
        let mut config = Self::berlin();
        config.decrease_clears_refund = true;
        // EIP-3529: clears refund becomes sstore_reset + access list key cost.
        config.refund_sstore_clears = (5000 - 2100 + 1900) as i64;
        config.max_refund_quotient = 5;
        config.has_base_fee = true;
        config.disallow_executable_format = true;
        config
    }

    /// Paris ("the merge"): no VM-visible changes beyond PREVRANDAO, which
    /// is supplied through the block environment.
    #[must_use]
    pub const fn merge() -> Self {
        Self::london()
    }

    /// Shanghai: PUSH0, warm coinbase, init-code cap.
    #[must_use]
    pub const fn shanghai() -> Self {
        let mut config = Self::merge();
        config.has_push0 = true;
        config.warm_coinbase_address = true;
        // 2 * 24576, per EIP-3860.
        config.max_initcode_size = Some(0xC000);
        config
    }

    /// Cancun: transient storage, MCOPY, blob data, EIP-6780.
    #[must_use]
    pub const fn cancun() -> Self {
        let mut config = Self::shanghai();
        config.has_blob_base_fee = true;
        config.has_shard_blob_transactions = true;
        config.has_transient_storage = true;
        config.has_mcopy = true;
        config.has_restricted_selfdestruct = true;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_ladder_is_monotonic_where_expected() {
        assert_eq!(Config::frontier().gas_transaction_create, 21000);
        assert_eq!(Config::homestead().gas_transaction_create, 53000);
        assert!(!Config::constantinople().sstore_revert_under_stipend);
        assert!(!Config::petersburg().sstore_gas_metering);
        assert!(Config::istanbul().sstore_gas_metering);
        assert_eq!(Config::london().max_refund_quotient, 5);
        assert_eq!(Config::london().refund_sstore_clears, 4800);
        assert_eq!(Config::berlin().max_refund_quotient, 2);
        assert!(Config::cancun().has_push0);
    }
}
