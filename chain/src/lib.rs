//! Chain layer of the hearth execution core: typed transactions, headers
//! and receipts, the per-fork VM descriptors and their schedule, the
//! transaction executor, block application, and the canonical header chain.

#![forbid(unsafe_code)]

mod block;
mod bloom;
mod chain;
mod difficulty;
mod error;
mod executor;
mod fork;
mod genesis;
mod header;
mod receipt;
mod seal;
mod transaction;

pub use block::{
    apply_block, calc_blob_gas_price, calc_excess_blob_gas, Block, BlockOutcome,
    MAX_BLOB_GAS_PER_BLOCK,
};
pub use bloom::{logs_bloom, Bloom};
pub use chain::{Chain, OpenBlock};
pub use difficulty::calculate_difficulty;
pub use error::{BlockError, Error, TransactionError};
pub use executor::{
    apply_transaction, prepare_transaction, AppliedTransaction, TxEnv, GAS_PER_BLOB,
};
pub use fork::{DifficultyRule, ForkActivation, ForkSchedule, PrecompileFork, SealRule, VmSpec};
pub use genesis::{GenesisAccount, GenesisConfig};
pub use header::{BlockNonce, Header, EMPTY_OMMERS_HASH};
pub use receipt::{Receipt, TransactionOutcome};
pub use seal::ethash;
pub use transaction::{
    AccessTuple, Eip1559Transaction, Eip2930Transaction, Eip4844Transaction, LegacyTransaction,
    SignedEip1559Transaction, SignedEip2930Transaction, SignedEip4844Transaction,
    SignedLegacyTransaction, TypedTransaction,
};
