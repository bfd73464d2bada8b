use crate::{TransactionError, TypedTransaction, VmSpec};
use hearth::backend::{ApplyBackend, Backend, Log};
use hearth::executor::stack::{MemoryStackState, StackExecutor, StackSubstateMetadata};
use hearth::gasometer::{self, Gasometer};
use hearth::precompiles::StandardPrecompiles;
use hearth::ExitReason;
use primitive_types::{H160, U256};

/// Gas consumed per blob (EIP-4844).
pub const GAS_PER_BLOB: u64 = 1 << 17;

const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// Validated, stateless facts about a transaction, computed before any
/// state is touched. The caller uses `sender` and `effective_gas_price`
/// to set up the execution environment.
#[derive(Clone, Debug)]
pub struct TxEnv {
    pub sender: H160,
    pub effective_gas_price: U256,
    pub gas_limit: u64,
    pub blob_gas_used: u64,
    /// Blob fee actually charged (at the blob gas price, fully burned).
    pub blob_fee: U256,
    /// Worst-case cost the sender's balance must cover.
    pub max_cost: U256,
}

/// Stateless admission checks: signature, chain id, type activation, fee
/// caps, blob shape.
///
/// # Errors
/// The corresponding [`TransactionError`].
pub fn prepare_transaction(
    spec: &VmSpec,
    tx: &TypedTransaction,
    chain_id: u64,
    base_fee: U256,
    blob_gas_price: Option<u128>,
) -> Result<TxEnv, TransactionError> {
    if tx.tx_type() > spec.max_tx_type {
        return Err(TransactionError::TypeNotSupported);
    }
    if let Some(tx_chain_id) = tx.chain_id() {
        if tx_chain_id != chain_id {
            return Err(TransactionError::InvalidChainId);
        }
    }
    if spec.reject_high_s && !tx.has_low_s() {
        return Err(TransactionError::InvalidSignature);
    }
    let sender = tx.sender()?;

    let gas_limit = u64::try_from(tx.gas_limit()).map_err(|_| TransactionError::GasLimitTooHigh)?;

    if spec.config.has_base_fee {
        if let Some(priority) = tx.max_priority_fee_per_gas() {
            if priority > tx.max_fee_per_gas() {
                return Err(TransactionError::PriorityFeeExceedsMaxFee);
            }
        }
        if tx.max_fee_per_gas() < base_fee {
            return Err(TransactionError::FeeCapBelowBaseFee);
        }
    }
    let effective_gas_price = tx.effective_gas_price(base_fee);

    let (blob_gas_used, blob_fee, blob_max_fee) = if let TypedTransaction::Blob(_) = tx {
        let hashes = tx.blob_versioned_hashes();
        if hashes.is_empty() {
            return Err(TransactionError::InvalidBlobTransaction("no blobs"));
        }
        if hashes
            .iter()
            .any(|hash| hash[0] != VERSIONED_HASH_VERSION_KZG)
        {
            return Err(TransactionError::InvalidBlobTransaction(
                "unknown versioned hash",
            ));
        }

        let price = U256::from(blob_gas_price.unwrap_or(1));
        let fee_cap = tx
            .max_fee_per_blob_gas()
            .expect("blob transactions carry a blob fee cap");
        if fee_cap < price {
            return Err(TransactionError::BlobFeeCapTooLow);
        }

        let blob_gas = GAS_PER_BLOB * hashes.len() as u64;
        (
            blob_gas,
            price * U256::from(blob_gas),
            fee_cap * U256::from(blob_gas),
        )
    } else {
        (0, U256::zero(), U256::zero())
    };

    let max_cost = tx
        .max_fee_per_gas()
        .checked_mul(U256::from(gas_limit))
        .and_then(|fee| fee.checked_add(tx.value()))
        .and_then(|cost| cost.checked_add(blob_max_fee))
        .ok_or(TransactionError::InsufficientBalance)?;

    Ok(TxEnv {
        sender,
        effective_gas_price,
        gas_limit,
        blob_gas_used,
        blob_fee,
        max_cost,
    })
}

/// Result of executing one transaction against open state.
#[derive(Debug)]
pub struct AppliedTransaction {
    pub sender: H160,
    pub gas_used: u64,
    pub exit_reason: ExitReason,
    pub output: Vec<u8>,
    pub logs: Vec<Log>,
    pub blob_gas_used: u64,
}

/// Execute one transaction and apply its outcome to `backend`.
///
/// The backend's vicinity must already reflect this transaction (origin,
/// gas price, blob hashes); `env` comes from [`prepare_transaction`].
/// Fees are debited up front at the full gas limit, the refund-capped
/// remainder returns to the sender, the coinbase keeps the priority part,
/// and the base fee plus the blob fee are burned.
///
/// # Errors
/// The stateful admission checks (nonce, balance, EOA rule, block gas).
pub fn apply_transaction<B: Backend + ApplyBackend>(
    backend: &mut B,
    spec: &VmSpec,
    precompiles: &StandardPrecompiles,
    tx: &TypedTransaction,
    env: &TxEnv,
    block_gas_limit: u64,
    cumulative_gas_used: u64,
) -> Result<AppliedTransaction, TransactionError> {
    if cumulative_gas_used
        .checked_add(env.gas_limit)
        .map_or(true, |total| total > block_gas_limit)
    {
        return Err(TransactionError::BlockGasLimitExceeded);
    }

    let basic = backend.basic(env.sender);
    if basic.nonce != tx.nonce() {
        return Err(TransactionError::NonceMismatch {
            expected: basic.nonce,
            got: tx.nonce(),
        });
    }
    // EIP-3607: contracts cannot originate transactions.
    if !backend.code(env.sender).is_empty() {
        return Err(TransactionError::SenderNotEoa);
    }
    if basic.balance < env.max_cost {
        return Err(TransactionError::InsufficientBalance);
    }

    let config = &spec.config;

    // Intrinsic-gas admission: a gas limit below the intrinsic cost makes
    // the transaction (and so the block) invalid, rather than an all-gas
    // execution failure. The executor charges the real cost again.
    let mut intrinsic_probe = Gasometer::new(env.gas_limit, config);
    let intrinsic_cost = if tx.is_create() {
        gasometer::create_transaction_cost(tx.data(), &tx.access_list())
    } else {
        gasometer::call_transaction_cost(tx.data(), &tx.access_list())
    };
    intrinsic_probe
        .record_transaction(intrinsic_cost)
        .map_err(|_| TransactionError::IntrinsicGasTooLow)?;

    let metadata = StackSubstateMetadata::new(env.gas_limit, config);
    let state = MemoryStackState::new(metadata, &*backend);
    let mut executor = StackExecutor::new_with_precompiles(state, config, precompiles);

    let upfront = U256::from(env.gas_limit) * env.effective_gas_price + env.blob_fee;
    executor
        .state_mut()
        .withdraw(env.sender, upfront)
        .map_err(|_| TransactionError::InsufficientBalance)?;

    let (exit_reason, output) = match tx.to() {
        Some(to) => executor.transact_call(
            env.sender,
            to,
            tx.value(),
            tx.data().to_vec(),
            env.gas_limit,
            tx.access_list(),
        ),
        None => executor.transact_create(
            env.sender,
            tx.value(),
            tx.data().to_vec(),
            env.gas_limit,
            tx.access_list(),
        ),
    };

    let gas_used = executor.used_gas();
    let coinbase = executor.state().block_coinbase();
    let base_fee = executor.state().block_base_fee_per_gas();

    let unused = U256::from(env.gas_limit - gas_used) * env.effective_gas_price;
    executor.state_mut().deposit(env.sender, unused);

    let priority_per_gas = env.effective_gas_price.saturating_sub(base_fee);
    executor
        .state_mut()
        .deposit(coinbase, priority_per_gas * U256::from(gas_used));

    let (applies, logs) = executor.into_state().deconstruct();
    backend.apply(applies, logs.iter().cloned(), !config.empty_considered_exists);

    log::debug!(
        target: "chain",
        "applied tx from {:?}: {:?}, gas {}",
        env.sender,
        exit_reason,
        gas_used
    );

    Ok(AppliedTransaction {
        sender: env.sender,
        gas_used,
        exit_reason,
        output,
        logs,
        blob_gas_used: env.blob_gas_used,
    })
}
