use super::{Apply, Backend, ApplyBackend, Basic, Log, Vicinity};
use primitive_types::{H160, H256, U256};
use std::collections::BTreeMap;

/// In-memory account record.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MemoryAccount {
    pub nonce: U256,
    pub balance: U256,
    pub storage: BTreeMap<H256, H256>,
    pub code: Vec<u8>,
}

/// In-memory backend, used by tests and by read-only execution
/// (`eth_call`-style simulation and gas estimation).
#[derive(Clone, Debug)]
pub struct MemoryBackend<'vicinity> {
    vicinity: &'vicinity Vicinity,
    state: BTreeMap<H160, MemoryAccount>,
    logs: Vec<Log>,
}

impl<'vicinity> MemoryBackend<'vicinity> {
    #[must_use]
    pub const fn new(vicinity: &'vicinity Vicinity, state: BTreeMap<H160, MemoryAccount>) -> Self {
        Self {
            vicinity,
            state,
            logs: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> &BTreeMap<H160, MemoryAccount> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BTreeMap<H160, MemoryAccount> {
        &mut self.state
    }

    #[must_use]
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }
}

impl<'vicinity> Backend for MemoryBackend<'vicinity> {
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
        self.state.contains_key(&address)
    }

    fn basic(&self, address: H160) -> Basic {
        self.state
            .get(&address)
            .map(|account| Basic {
                balance: account.balance,
                nonce: account.nonce,
            })
            .unwrap_or_default()
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.state
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        self.state
            .get(&address)
            .and_then(|account| account.storage.get(&index).copied())
            .unwrap_or_default()
    }

    fn original_storage(&self, address: H160, index: H256) -> Option<H256> {
        Some(self.storage(address, index))
    }
}

impl<'vicinity> ApplyBackend for MemoryBackend<'vicinity> {
    fn apply<A, I, L>(&mut self, values: A, logs: L, delete_empty: bool)
    where
        A: IntoIterator<Item = Apply<I>>,
        I: IntoIterator<Item = (H256, H256)>,
        L: IntoIterator<Item = Log>,
    {
        for apply in values {
            match apply {
                Apply::Modify {
                    address,
                    basic,
                    code,
                    storage,
                    reset_storage,
                } => {
                    let is_empty = {
                        let account = self.state.entry(address).or_default();
                        account.balance = basic.balance;
                        account.nonce = basic.nonce;
                        if let Some(code) = code {
                            account.code = code;
                        }

                        if reset_storage {
                            account.storage = BTreeMap::new();
                        }
                        for (index, value) in storage {
                            if value == H256::default() {
                                account.storage.remove(&index);
                            } else {
                                account.storage.insert(index, value);
                            }
                        }

                        account.balance == U256::zero()
                            && account.nonce == U256::zero()
                            && account.code.is_empty()
                    };

                    if is_empty && delete_empty {
                        self.state.remove(&address);
                    }
                }
                Apply::Delete { address } => {
                    self.state.remove(&address);
                }
            }
        }

        for log in logs {
            self.logs.push(log);
        }
    }
}
