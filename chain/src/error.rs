use hearth_state::StateError;
use primitive_types::{H256, U256};

/// Rejections of a single transaction. During block application any of
/// these invalidates the whole block; during pool admission they only drop
/// the transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransactionError {
    /// The signature does not recover to a sender.
    InvalidSignature,
    /// The signed chain id does not match this chain.
    InvalidChainId,
    /// The transaction type is not active in this fork.
    TypeNotSupported,
    NonceMismatch {
        expected: U256,
        got: U256,
    },
    /// Balance does not cover the maximum fee plus value.
    InsufficientBalance,
    /// The sender has code (EIP-3607).
    SenderNotEoa,
    /// Gas limit below the intrinsic cost.
    IntrinsicGasTooLow,
    /// Gas limit does not fit into the remaining block gas.
    BlockGasLimitExceeded,
    /// Gas limit does not fit 64 bits.
    GasLimitTooHigh,
    /// `max_fee_per_gas` (or the legacy gas price) is below the base fee.
    FeeCapBelowBaseFee,
    /// `max_priority_fee_per_gas` exceeds `max_fee_per_gas`.
    PriorityFeeExceedsMaxFee,
    /// `max_fee_per_blob_gas` is below the blob gas price.
    BlobFeeCapTooLow,
    /// Malformed blob transaction.
    InvalidBlobTransaction(&'static str),
}

impl core::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::InvalidChainId => write!(f, "wrong chain id"),
            Self::TypeNotSupported => write!(f, "transaction type not active"),
            Self::NonceMismatch { expected, got } => {
                write!(f, "nonce mismatch: expected {expected}, got {got}")
            }
            Self::InsufficientBalance => write!(f, "insufficient balance for fee"),
            Self::SenderNotEoa => write!(f, "sender is a contract"),
            Self::IntrinsicGasTooLow => write!(f, "gas limit below intrinsic cost"),
            Self::BlockGasLimitExceeded => write!(f, "block gas limit exceeded"),
            Self::GasLimitTooHigh => write!(f, "gas limit does not fit 64 bits"),
            Self::FeeCapBelowBaseFee => write!(f, "fee cap below base fee"),
            Self::PriorityFeeExceedsMaxFee => write!(f, "priority fee above fee cap"),
            Self::BlobFeeCapTooLow => write!(f, "blob fee cap below blob gas price"),
            Self::InvalidBlobTransaction(reason) => {
                write!(f, "invalid blob transaction: {reason}")
            }
        }
    }
}

impl std::error::Error for TransactionError {}

/// Rejections of a whole block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockError {
    UnknownParent(H256),
    InvalidNumber {
        expected: u64,
        got: u64,
    },
    TimestampNotAfterParent,
    ExtraDataTooLong,
    InvalidDifficulty {
        expected: U256,
        got: U256,
    },
    /// Gas limit out of the ±1/1024 band or below the 5000 floor.
    InvalidGasLimit,
    GasUsedAboveLimit,
    InvalidBaseFee {
        expected: Option<U256>,
        got: Option<U256>,
    },
    InvalidBlobGas,
    InvalidWithdrawals,
    InvalidSeal,
    InvalidOmmers(&'static str),
    /// A transaction that makes the block invalid.
    Transaction {
        index: usize,
        error: TransactionError,
    },
    StateRootMismatch {
        expected: H256,
        got: H256,
    },
    ReceiptsRootMismatch {
        expected: H256,
        got: H256,
    },
    TransactionsRootMismatch {
        expected: H256,
        got: H256,
    },
    BloomMismatch,
    GasUsedMismatch {
        expected: u64,
        got: u64,
    },
}

impl core::fmt::Display for BlockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownParent(hash) => write!(f, "unknown parent {hash:?}"),
            Self::InvalidNumber { expected, got } => {
                write!(f, "block number {got}, expected {expected}")
            }
            Self::TimestampNotAfterParent => write!(f, "timestamp not after parent"),
            Self::ExtraDataTooLong => write!(f, "extra data above 32 bytes"),
            Self::InvalidDifficulty { expected, got } => {
                write!(f, "difficulty {got}, expected {expected}")
            }
            Self::InvalidGasLimit => write!(f, "gas limit out of bounds"),
            Self::GasUsedAboveLimit => write!(f, "gas used above gas limit"),
            Self::InvalidBaseFee { expected, got } => {
                write!(f, "base fee {got:?}, expected {expected:?}")
            }
            Self::InvalidBlobGas => write!(f, "blob gas fields invalid"),
            Self::InvalidWithdrawals => write!(f, "withdrawals root presence mismatch"),
            Self::InvalidSeal => write!(f, "seal check failed"),
            Self::InvalidOmmers(reason) => write!(f, "invalid ommers: {reason}"),
            Self::Transaction { index, error } => {
                write!(f, "transaction {index}: {error}")
            }
            Self::StateRootMismatch { expected, got } => {
                write!(f, "state root {got:?}, expected {expected:?}")
            }
            Self::ReceiptsRootMismatch { expected, got } => {
                write!(f, "receipts root {got:?}, expected {expected:?}")
            }
            Self::TransactionsRootMismatch { expected, got } => {
                write!(f, "transactions root {got:?}, expected {expected:?}")
            }
            Self::BloomMismatch => write!(f, "logs bloom mismatch"),
            Self::GasUsedMismatch { expected, got } => {
                write!(f, "gas used {got}, expected {expected}")
            }
        }
    }
}

impl std::error::Error for BlockError {}

/// Top-level failure of a chain operation: either a consensus rejection or
/// an infrastructure problem (missing trie node, store failure).
#[derive(Clone, Debug)]
pub enum Error {
    Block(BlockError),
    State(StateError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Block(e) => write!(f, "invalid block: {e}"),
            Self::State(e) => write!(f, "state failure: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<BlockError> for Error {
    fn from(e: BlockError) -> Self {
        Self::Block(e)
    }
}

impl From<StateError> for Error {
    fn from(e: StateError) -> Self {
        Self::State(e)
    }
}
