use crate::{
    Account, KeyValueStore, NodeDatabase, StateError, Trie, WriteBatch, EMPTY_ROOT, KECCAK_EMPTY,
};
use hearth::backend::{Apply, ApplyBackend, Backend, Basic, Log, Vicinity};
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};
use std::cell::RefCell;
use std::sync::Arc;

const NODE_PREFIX: u8 = b'n';
const CODE_PREFIX: u8 = b'c';

fn prefixed(prefix: u8, hash: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(prefix);
    key.extend_from_slice(hash.as_bytes());
    key
}

fn keccak(bytes: &[u8]) -> H256 {
    H256::from_slice(Keccak256::digest(bytes).as_slice())
}

/// The authenticated account database: an account trie whose leaves carry
/// per-account storage tries, over an abstract key-value store.
pub struct StateDb<K> {
    kv: Arc<K>,
    root: H256,
}

impl<K> Clone for StateDb<K> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            root: self.root,
        }
    }
}

impl<K: KeyValueStore> NodeDatabase for StateDb<K> {
    fn node(&self, hash: H256) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.kv.get(&prefixed(NODE_PREFIX, &hash))?)
    }
}

impl<K: KeyValueStore> StateDb<K> {
    /// Open the state at `root`. The root itself is only resolved lazily.
    pub fn new(kv: Arc<K>, root: H256) -> Self {
        Self { kv, root }
    }

    #[must_use]
    pub const fn root(&self) -> H256 {
        self.root
    }

    #[must_use]
    pub fn kv(&self) -> &Arc<K> {
        &self.kv
    }

    /// Look up an account record.
    ///
    /// # Errors
    /// `MissingNode` / `Corrupted` / `Kv`.
    pub fn account(&self, address: H160) -> Result<Option<Account>, StateError> {
        let trie = Trie::new(self, self.root)?;
        let Some(bytes) = trie.get(keccak(address.as_bytes()).as_bytes())? else {
            return Ok(None);
        };
        rlp::decode(&bytes)
            .map(Some)
            .map_err(|e| StateError::Corrupted(format!("bad account rlp: {e}")))
    }

    /// Look up one storage slot; absent slots are zero.
    ///
    /// # Errors
    /// `MissingNode` / `Corrupted` / `Kv`.
    pub fn storage(&self, address: H160, key: H256) -> Result<H256, StateError> {
        let Some(account) = self.account(address)? else {
            return Ok(H256::zero());
        };
        if account.storage_root == EMPTY_ROOT {
            return Ok(H256::zero());
        }

        let trie = Trie::new(self, account.storage_root)?;
        let Some(bytes) = trie.get(keccak(key.as_bytes()).as_bytes())? else {
            return Ok(H256::zero());
        };
        let value: U256 = rlp::decode(&bytes)
            .map_err(|e| StateError::Corrupted(format!("bad storage rlp: {e}")))?;
        Ok(H256(value.to_big_endian()))
    }

    /// Fetch code by its hash.
    ///
    /// # Errors
    /// `Corrupted` when the hash is referenced but the blob is gone.
    pub fn code(&self, code_hash: H256) -> Result<Vec<u8>, StateError> {
        if code_hash == KECCAK_EMPTY || code_hash == H256::zero() {
            return Ok(Vec::new());
        }
        self.kv
            .get(&prefixed(CODE_PREFIX, &code_hash))?
            .ok_or_else(|| StateError::Corrupted(format!("code {code_hash:?} not found")))
    }

    /// Code of an account, empty when absent.
    ///
    /// # Errors
    /// `MissingNode` / `Corrupted` / `Kv`.
    pub fn code_of(&self, address: H160) -> Result<Vec<u8>, StateError> {
        match self.account(address)? {
            Some(account) => self.code(account.code_hash),
            None => Ok(Vec::new()),
        }
    }

    /// Apply an executor change-set, persist the new nodes in one batch,
    /// and advance to the new root. All-or-nothing.
    ///
    /// # Errors
    /// `MissingNode` / `Corrupted` / `Kv`; on error the root is unchanged.
    pub fn commit<A, I>(&mut self, values: A, delete_empty: bool) -> Result<H256, StateError>
    where
        A: IntoIterator<Item = Apply<I>>,
        I: IntoIterator<Item = (H256, H256)>,
    {
        let mut batch = WriteBatch::new();
        let mut new_nodes: Vec<(H256, Vec<u8>)> = Vec::new();
        let mut account_trie = Trie::new(self, self.root)?;

        for apply in values {
            match apply {
                Apply::Modify {
                    address,
                    basic,
                    code,
                    storage,
                    reset_storage,
                } => {
                    let mut account = self.account(address)?.unwrap_or_default();

                    let storage_root = if reset_storage {
                        EMPTY_ROOT
                    } else {
                        account.storage_root
                    };
                    let mut storage_trie = Trie::new(self, storage_root)?;
                    let mut touched_storage = false;
                    for (key, value) in storage {
                        touched_storage = true;
                        let hashed = keccak(key.as_bytes());
                        if value == H256::zero() {
                            storage_trie.remove(hashed.as_bytes())?;
                        } else {
                            storage_trie.insert(
                                hashed.as_bytes(),
                                rlp::encode(&U256::from_big_endian(value.as_bytes())).to_vec(),
                            )?;
                        }
                    }
                    account.storage_root = if touched_storage || reset_storage {
                        storage_trie.commit(&mut new_nodes)
                    } else {
                        storage_root
                    };

                    if let Some(code) = code {
                        let code_hash = keccak(&code);
                        batch.put(prefixed(CODE_PREFIX, &code_hash), code);
                        account.code_hash = code_hash;
                    }

                    account.balance = basic.balance;
                    account.nonce = basic.nonce;

                    let hashed_address = keccak(address.as_bytes());
                    if delete_empty && account.is_empty() && account.storage_root == EMPTY_ROOT {
                        account_trie.remove(hashed_address.as_bytes())?;
                    } else {
                        account_trie
                            .insert(hashed_address.as_bytes(), rlp::encode(&account).to_vec())?;
                    }
                }
                Apply::Delete { address } => {
                    account_trie.remove(keccak(address.as_bytes()).as_bytes())?;
                }
            }
        }

        let new_root = account_trie.commit(&mut new_nodes);
        log::trace!(
            target: "state",
            "commit: {} new nodes, root {:?} -> {new_root:?}",
            new_nodes.len(),
            self.root
        );
        for (hash, bytes) in new_nodes {
            batch.put(prefixed(NODE_PREFIX, &hash), bytes);
        }
        self.kv.write(batch)?;
        self.root = new_root;
        Ok(new_root)
    }
}

/// [`Backend`] over a [`StateDb`] snapshot plus a block [`Vicinity`].
///
/// The `Backend` read methods are infallible by contract; an infrastructure
/// failure (a missing trie node mid-read) is parked in `error` and must be
/// checked by the caller after execution, before trusting any result.
pub struct TrieBackend<K> {
    state: StateDb<K>,
    vicinity: Vicinity,
    logs: Vec<Log>,
    error: RefCell<Option<StateError>>,
}

impl<K: KeyValueStore> TrieBackend<K> {
    pub fn new(state: StateDb<K>, vicinity: Vicinity) -> Self {
        Self {
            state,
            vicinity,
            logs: Vec::new(),
            error: RefCell::new(None),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &StateDb<K> {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> StateDb<K> {
        self.state
    }

    #[must_use]
    pub const fn vicinity(&self) -> &Vicinity {
        &self.vicinity
    }

    /// Per-transaction fields (gas price, origin, blob hashes) change
    /// between transactions of one block.
    pub fn vicinity_mut(&mut self) -> &mut Vicinity {
        &mut self.vicinity
    }

    #[must_use]
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Take the first infrastructure error hit during execution, if any.
    pub fn take_error(&self) -> Option<StateError> {
        self.error.borrow_mut().take()
    }

    fn record<T: Default>(&self, result: Result<T, StateError>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                let mut slot = self.error.borrow_mut();
                if slot.is_none() {
                    *slot = Some(e);
                }
                T::default()
            }
        }
    }
}

impl<K: KeyValueStore> Backend for TrieBackend<K> {
    fn gas_price(&self) -> U256 {
        self.vicinity.gas_price
    }

    fn origin(&self) -> H160 {
        self.vicinity.origin
    }

    fn block_hash(&self, number: U256) -> H256 {
        self.vicinity.block_hash(number)
    }

    fn block_number(&self) -> U256 {
        self.vicinity.block_number
    }

    fn block_coinbase(&self) -> H160 {
        self.vicinity.block_coinbase
    }

    fn block_timestamp(&self) -> U256 {
        self.vicinity.block_timestamp
    }

    fn block_difficulty(&self) -> U256 {
        self.vicinity.block_difficulty
    }

    fn block_randomness(&self) -> Option<H256> {
        self.vicinity.block_randomness
    }

    fn block_gas_limit(&self) -> U256 {
        self.vicinity.block_gas_limit
    }

    fn block_base_fee_per_gas(&self) -> U256 {
        self.vicinity.block_base_fee_per_gas
    }

    fn blob_gas_price(&self) -> Option<u128> {
        self.vicinity.blob_gas_price
    }

    fn get_blob_hash(&self, index: usize) -> Option<U256> {
        self.vicinity
            .blob_hashes
            .get(index)
            .map(|hash| U256::from_big_endian(&hash[..]))
    }

    fn chain_id(&self) -> U256 {
        self.vicinity.chain_id
    }

    fn exists(&self, address: H160) -> bool {
        self.record(self.state.account(address).map(|account| account.is_some()))
    }

    fn basic(&self, address: H160) -> Basic {
        self.record(self.state.account(address).map(|account| {
            account
                .map(|account| Basic {
                    balance: account.balance,
                    nonce: account.nonce,
                })
                .unwrap_or_default()
        }))
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.record(self.state.code_of(address))
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        self.record(self.state.storage(address, index))
    }

    fn original_storage(&self, address: H160, index: H256) -> Option<H256> {
        Some(self.storage(address, index))
    }
}

impl<K: KeyValueStore> ApplyBackend for TrieBackend<K> {
    fn apply<A, I, L>(&mut self, values: A, logs: L, delete_empty: bool)
    where
        A: IntoIterator<Item = Apply<I>>,
        I: IntoIterator<Item = (H256, H256)>,
        L: IntoIterator<Item = Log>,
    {
        if let Err(e) = self.state.commit(values, delete_empty) {
            let mut slot = self.error.borrow_mut();
            if slot.is_none() {
                *slot = Some(e);
            }
        }
        self.logs.extend(logs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryKv;
    use std::collections::BTreeMap;

    fn addr(n: u8) -> H160 {
        H160::repeat_byte(n)
    }

    fn modify(
        address: H160,
        balance: u64,
        nonce: u64,
        code: Option<Vec<u8>>,
        storage: Vec<(H256, H256)>,
    ) -> Apply<BTreeMap<H256, H256>> {
        Apply::Modify {
            address,
            basic: Basic {
                balance: U256::from(balance),
                nonce: U256::from(nonce),
            },
            code,
            storage: storage.into_iter().collect(),
            reset_storage: false,
        }
    }

    #[test]
    fn commit_and_read_back() {
        let kv = Arc::new(MemoryKv::new());
        let mut state = StateDb::new(kv, EMPTY_ROOT);

        let slot = H256::from_low_u64_be(1);
        let value = H256::from_low_u64_be(42);
        let root = state
            .commit(
                vec![
                    modify(addr(1), 100, 1, Some(vec![0x60, 0x00]), vec![(slot, value)]),
                    modify(addr(2), 7, 0, None, vec![]),
                ],
                true,
            )
            .unwrap();
        assert_ne!(root, EMPTY_ROOT);

        let account = state.account(addr(1)).unwrap().unwrap();
        assert_eq!(account.balance, U256::from(100));
        assert_eq!(account.nonce, U256::from(1));
        assert_eq!(state.code_of(addr(1)).unwrap(), vec![0x60, 0x00]);
        assert_eq!(state.storage(addr(1), slot).unwrap(), value);
        assert_eq!(
            state.storage(addr(1), H256::from_low_u64_be(2)).unwrap(),
            H256::zero()
        );
        assert_eq!(
            state.account(addr(2)).unwrap().unwrap().balance,
            U256::from(7)
        );
    }

    #[test]
    fn state_root_is_deterministic_across_orderings() {
        let build = |order: Vec<u8>| {
            let kv = Arc::new(MemoryKv::new());
            let mut state = StateDb::new(kv, EMPTY_ROOT);
            for n in order {
                state
                    .commit(vec![modify(addr(n), u64::from(n) * 10, 0, None, vec![])], true)
                    .unwrap();
            }
            state.root()
        };

        assert_eq!(build(vec![1, 2, 3]), build(vec![3, 1, 2]));
    }

    #[test]
    fn delete_empty_sweeps_account() {
        let kv = Arc::new(MemoryKv::new());
        let mut state = StateDb::new(kv, EMPTY_ROOT);
        state
            .commit(vec![modify(addr(1), 0, 0, None, vec![])], true)
            .unwrap();
        assert!(state.account(addr(1)).unwrap().is_none());
        assert_eq!(state.root(), EMPTY_ROOT);
    }

    #[test]
    fn deletion_restores_prior_root(){
        let kv = Arc::new(MemoryKv::new());
        let mut state = StateDb::new(kv, EMPTY_ROOT);
        let before = state
            .commit(vec![modify(addr(1), 5, 0, None, vec![])], true)
            .unwrap();
        state
            .commit(vec![modify(addr(2), 9, 0, None, vec![])], true)
            .unwrap();
        let after = state
            .commit::<_, BTreeMap<H256, H256>>(vec![Apply::Delete { address: addr(2) }], true)
            .unwrap();
        assert_eq!(before, after);
    }
}
