//! State layer of the hearth execution core: a key-value store contract,
//! the hexary Merkle-Patricia trie, and the trie-backed account database
//! the executor runs against.

#![forbid(unsafe_code)]

mod account;
mod db;
mod kv;
mod trie;

pub use account::{Account, EMPTY_ROOT, KECCAK_EMPTY};
pub use db::{StateDb, TrieBackend};
pub use kv::{BatchOp, KeyValueStore, KvError, MemoryKv, WriteBatch};
pub use trie::{ordered_trie_root, NodeDatabase, Trie};

use primitive_types::H256;

/// Errors of the state layer. `MissingNode` is an infrastructure signal
/// (state sync), distinct from a key simply being absent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StateError {
    /// A trie node referenced by hash is not in the store.
    MissingNode(H256),
    /// A stored value failed to decode.
    Corrupted(String),
    /// The underlying store failed.
    Kv(String),
}

impl core::fmt::Display for StateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingNode(hash) => write!(f, "missing trie node {hash:?}"),
            Self::Corrupted(message) => write!(f, "corrupted state: {message}"),
            Self::Kv(message) => write!(f, "key-value store: {message}"),
        }
    }
}

impl std::error::Error for StateError {}

impl From<KvError> for StateError {
    fn from(e: KvError) -> Self {
        Self::Kv(e.to_string())
    }
}
