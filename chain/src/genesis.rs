use crate::{BlockNonce, Bloom, Header, EMPTY_OMMERS_HASH};
use hearth::backend::{Apply, Basic};
use hearth_state::{KeyValueStore, StateDb, StateError, EMPTY_ROOT};
use primitive_types::{H160, H256, U256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One pre-funded (or pre-deployed) account in the genesis allocation.
#[derive(Clone, Debug, Default)]
pub struct GenesisAccount {
    pub balance: U256,
    pub nonce: U256,
    pub code: Vec<u8>,
    pub storage: BTreeMap<H256, H256>,
}

/// Chain bootstrap parameters: the block-0 header fields plus the state
/// allocation.
#[derive(Clone, Debug)]
pub struct GenesisConfig {
    pub coinbase: H160,
    pub difficulty: U256,
    pub gas_limit: u64,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    pub mix_hash: H256,
    pub nonce: BlockNonce,
    /// Present when the chain starts at London rules or later.
    pub base_fee_per_gas: Option<U256>,
    /// Present when the chain starts at Shanghai rules or later.
    pub withdrawals_root: Option<H256>,
    /// Present when the chain starts at Cancun rules or later.
    pub blob_fields: bool,
    pub alloc: BTreeMap<H160, GenesisAccount>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            coinbase: H160::zero(),
            difficulty: U256::from(131_072),
            gas_limit: 8_000_000,
            timestamp: 0,
            extra_data: Vec::new(),
            mix_hash: H256::zero(),
            nonce: BlockNonce::default(),
            base_fee_per_gas: None,
            withdrawals_root: None,
            blob_fields: false,
            alloc: BTreeMap::new(),
        }
    }
}

impl GenesisConfig {
    /// Commit the allocation and derive the genesis header.
    ///
    /// # Errors
    /// State-layer failures.
    pub fn commit<K: KeyValueStore>(
        &self,
        kv: Arc<K>,
    ) -> Result<(StateDb<K>, Header), StateError> {
        let mut state = StateDb::new(kv, EMPTY_ROOT);

        let applies: Vec<Apply<BTreeMap<H256, H256>>> = self
            .alloc
            .iter()
            .map(|(address, account)| Apply::Modify {
                address: *address,
                basic: Basic {
                    balance: account.balance,
                    nonce: account.nonce,
                },
                code: if account.code.is_empty() {
                    None
                } else {
                    Some(account.code.clone())
                },
                storage: account.storage.clone(),
                reset_storage: false,
            })
            .collect();
        let state_root = state.commit(applies, false)?;

        let header = Header {
            parent_hash: H256::zero(),
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: self.coinbase,
            state_root,
            transactions_root: EMPTY_ROOT,
            receipts_root: EMPTY_ROOT,
            logs_bloom: Bloom::default(),
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            gas_used: 0,
            timestamp: self.timestamp,
            extra_data: self.extra_data.clone(),
            mix_hash: self.mix_hash,
            nonce: self.nonce,
            base_fee_per_gas: self.base_fee_per_gas,
            withdrawals_root: self.withdrawals_root,
            blob_gas_used: self.blob_fields.then_some(0),
            excess_blob_gas: self.blob_fields.then_some(0),
            parent_beacon_block_root: self.blob_fields.then_some(H256::zero()),
        };

        Ok((state, header))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_state::MemoryKv;

    #[test]
    fn funded_account_lands_in_state() {
        let kv = Arc::new(MemoryKv::new());
        let mut config = GenesisConfig::default();
        config.alloc.insert(
            H160::repeat_byte(1),
            GenesisAccount {
                balance: U256::from(1000),
                ..GenesisAccount::default()
            },
        );

        let (state, header) = config.commit(kv).unwrap();
        assert_eq!(header.number, 0);
        assert_ne!(header.state_root, EMPTY_ROOT);
        assert_eq!(
            state
                .account(H160::repeat_byte(1))
                .unwrap()
                .unwrap()
                .balance,
            U256::from(1000)
        );
    }
}
