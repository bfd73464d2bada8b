//! Read and apply seams between the executor and a state store.

mod memory;

pub use memory::{MemoryAccount, MemoryBackend};

use primitive_types::{H160, H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// Nonce and balance of an account.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Basic {
    pub balance: U256,
    pub nonce: U256,
}

/// An emitted log entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Log {
    pub address: H160,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

impl Encodable for Log {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.address);
        s.append_list(&self.topics);
        s.append(&self.data);
    }
}

impl Decodable for Log {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        Ok(Self {
            address: rlp.val_at(0)?,
            topics: rlp.list_at(1)?,
            data: rlp.val_at(2)?,
        })
    }
}

/// One account-level change produced by a finished transaction.
#[derive(Clone, Debug)]
pub enum Apply<I> {
    /// Create or update an account.
    Modify {
        address: H160,
        basic: Basic,
        code: Option<Vec<u8>>,
        storage: I,
        /// Clear the whole storage before applying `storage`.
        reset_storage: bool,
    },
    /// Remove the account entirely.
    Delete { address: H160 },
}

/// Block-level environment a transaction executes inside.
#[derive(Clone, Debug)]
pub struct Vicinity {
    /// Effective gas price of the running transaction.
    pub gas_price: U256,
    /// Transaction origin.
    pub origin: H160,
    pub chain_id: U256,
    /// Hashes of up to the last 256 canonical blocks, oldest first; the
    /// last entry is the parent of the executing block.
    pub block_hashes: Vec<H256>,
    pub block_number: U256,
    pub block_coinbase: H160,
    pub block_timestamp: U256,
    pub block_difficulty: U256,
    pub block_randomness: Option<H256>,
    pub block_gas_limit: U256,
    /// EIP-1559 base fee; zero before London.
    pub block_base_fee_per_gas: U256,
    /// EIP-4844 blob gas price derived from the parent's excess blob gas.
    pub blob_gas_price: Option<u128>,
    /// Versioned hashes of the running transaction's blobs.
    pub blob_hashes: Vec<H256>,
}

impl Vicinity {
    /// BLOCKHASH semantics over the sliding window: zero outside
    /// `[current - 256, current)`.
    #[must_use]
    pub fn block_hash(&self, number: U256) -> H256 {
        if number >= self.block_number
            || self.block_number - number > U256::from(self.block_hashes.len())
        {
            H256::default()
        } else {
            let offset = (self.block_number - number).as_usize();
            self.block_hashes[self.block_hashes.len() - offset]
        }
    }
}

/// Read view over accounts, storage and block data.
pub trait Backend {
    fn gas_price(&self) -> U256;
    fn origin(&self) -> H160;
    fn block_hash(&self, number: U256) -> H256;
    fn block_number(&self) -> U256;
    fn block_coinbase(&self) -> H160;
    fn block_timestamp(&self) -> U256;
    fn block_difficulty(&self) -> U256;
    fn block_randomness(&self) -> Option<H256>;
    fn block_gas_limit(&self) -> U256;
    fn block_base_fee_per_gas(&self) -> U256;
    fn blob_gas_price(&self) -> Option<u128>;
    fn get_blob_hash(&self, index: usize) -> Option<U256>;
    fn chain_id(&self) -> U256;

    fn exists(&self, address: H160) -> bool;
    fn basic(&self, address: H160) -> Basic;
    fn code(&self, address: H160) -> Vec<u8>;
    fn storage(&self, address: H160, index: H256) -> H256;
    /// Storage value at the start of the transaction, `None` when the
    /// backend cannot distinguish it from the current value.
    fn original_storage(&self, address: H160, index: H256) -> Option<H256>;
}

/// Atomic application of executor change-sets.
pub trait ApplyBackend {
    /// Apply the given change-set. With `delete_empty`, accounts that end
    /// up empty are removed (EIP-161 sweep).
    fn apply<A, I, L>(&mut self, values: A, logs: L, delete_empty: bool)
    where
        A: IntoIterator<Item = Apply<I>>,
        I: IntoIterator<Item = (H256, H256)>,
        L: IntoIterator<Item = Log>;
}
