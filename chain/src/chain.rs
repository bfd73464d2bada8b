use crate::block::{pay_rewards, validate_header};
use crate::{
    apply_block, calc_blob_gas_price, calc_excess_blob_gas, calculate_difficulty,
    executor::{apply_transaction, prepare_transaction},
    Block, BlockError, BlockNonce, BlockOutcome, Bloom, Error, ForkSchedule, GenesisConfig,
    Header, Receipt, SealRule, TransactionOutcome, TypedTransaction, EMPTY_OMMERS_HASH,
};
use hearth::backend::Vicinity;
use hearth::executor::stack::{MemoryStackState, StackExecutor, StackSubstateMetadata};
use hearth::ExitReason;
use hearth_state::{
    ordered_trie_root, KeyValueStore, StateDb, StateError, TrieBackend, WriteBatch,
};
use primitive_types::{H160, H256, U256};
use rlp::{Decodable, Rlp};

use std::sync::Arc;

const KEY_HEAD: &[u8] = b"chain:head";

fn header_key(hash: &H256) -> Vec<u8> {
    [b"chain:h" as &[u8], hash.as_bytes()].concat()
}

fn body_key(hash: &H256) -> Vec<u8> {
    [b"chain:b" as &[u8], hash.as_bytes()].concat()
}

fn receipts_key(hash: &H256) -> Vec<u8> {
    [b"chain:r" as &[u8], hash.as_bytes()].concat()
}

fn td_key(hash: &H256) -> Vec<u8> {
    [b"chain:t" as &[u8], hash.as_bytes()].concat()
}

fn canonical_key(number: u64) -> Vec<u8> {
    [b"chain:n" as &[u8], &number.to_be_bytes()].concat()
}

fn decode<T: Decodable>(bytes: &[u8], what: &str) -> Result<T, Error> {
    rlp::decode(bytes).map_err(|e| StateError::Corrupted(format!("bad {what} rlp: {e}")).into())
}

/// A block under construction: transactions already applied against the
/// parent state, header roots filled in, seal left to the caller. Holding
/// one does not lock the chain; a re-org underneath simply leaves the open
/// block on a stale parent and its sealed block will fail to become head.
#[derive(Debug)]
pub struct OpenBlock {
    pub block: Block,
    pub receipts: Vec<Receipt>,
}

impl OpenBlock {
    /// Attach the proof-of-work seal.
    #[must_use]
    pub fn seal(mut self, mix_hash: H256, nonce: BlockNonce) -> Block {
        self.block.header.mix_hash = mix_hash;
        self.block.header.nonce = nonce;
        self.block
    }
}

/// The canonical chain: header/body/receipt stores over the key-value
/// store, total-difficulty tracking, re-orgs, and the ancestor-hash oracle.
///
/// Imports take `&mut self`: concurrent imports on one chain value are
/// serialized by construction. Independent branches can be imported from
/// clones sharing the same store, each owning its own batches.
pub struct Chain<K: KeyValueStore> {
    kv: Arc<K>,
    schedule: ForkSchedule,
    chain_id: u64,
    head: Header,
}

impl<K: KeyValueStore> Chain<K> {
    /// Open an existing chain from the store, or bootstrap it from the
    /// genesis configuration.
    ///
    /// # Errors
    /// Store or state failures.
    pub fn new(
        kv: Arc<K>,
        schedule: ForkSchedule,
        chain_id: u64,
        genesis: &GenesisConfig,
    ) -> Result<Self, Error> {
        if let Some(head_hash) = kv.get(KEY_HEAD).map_err(StateError::from)? {
            let head_hash = H256::from_slice(&head_hash);
            let head_bytes = kv
                .get(&header_key(&head_hash))
                .map_err(StateError::from)?
                .ok_or_else(|| StateError::Corrupted("head header missing".into()))?;
            let head = decode(&head_bytes, "header")?;
            return Ok(Self {
                kv,
                schedule,
                chain_id,
                head,
            });
        }

        let (_state, header) = genesis.commit(Arc::clone(&kv))?;
        let hash = header.hash();

        let mut batch = WriteBatch::new();
        batch.put(header_key(&hash), rlp::encode(&header).to_vec());
        batch.put(td_key(&hash), rlp::encode(&header.difficulty).to_vec());
        batch.put(canonical_key(0), hash.as_bytes().to_vec());
        batch.put(KEY_HEAD.to_vec(), hash.as_bytes().to_vec());
        kv.write(batch).map_err(StateError::from)?;

        Ok(Self {
            kv,
            schedule,
            chain_id,
            head: header,
        })
    }

    #[must_use]
    pub const fn head(&self) -> &Header {
        &self.head
    }

    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    #[must_use]
    pub const fn schedule(&self) -> &ForkSchedule {
        &self.schedule
    }

    /// State at the current head.
    #[must_use]
    pub fn head_state(&self) -> StateDb<K> {
        StateDb::new(Arc::clone(&self.kv), self.head.state_root)
    }

    /// # Errors
    /// Store failures.
    pub fn header_by_hash(&self, hash: H256) -> Result<Option<Header>, Error> {
        match self.kv.get(&header_key(&hash)).map_err(StateError::from)? {
            Some(bytes) => Ok(Some(decode(&bytes, "header")?)),
            None => Ok(None),
        }
    }

    /// # Errors
    /// Store failures.
    pub fn canonical_hash(&self, number: u64) -> Result<Option<H256>, Error> {
        Ok(self
            .kv
            .get(&canonical_key(number))
            .map_err(StateError::from)?
            .map(|bytes| H256::from_slice(&bytes)))
    }

    /// The BLOCKHASH oracle: the canonical hash of `number`, or zero when
    /// it is the head, in the future, or more than 256 blocks back.
    ///
    /// # Errors
    /// Store failures.
    pub fn get_ancestor_hash(&self, number: u64) -> Result<H256, Error> {
        if number > self.head.number || self.head.number - number > 256 {
            return Ok(H256::zero());
        }
        Ok(self.canonical_hash(number)?.unwrap_or_default())
    }

    fn total_difficulty(&self, hash: &H256) -> Result<U256, Error> {
        let bytes = self
            .kv
            .get(&td_key(hash))
            .map_err(StateError::from)?
            .ok_or_else(|| StateError::Corrupted(format!("missing total difficulty {hash:?}")))?;
        decode(&bytes, "total difficulty")
    }

    /// Receipts of an imported block.
    ///
    /// # Errors
    /// Store failures.
    pub fn receipts_by_hash(&self, hash: H256) -> Result<Option<Vec<Receipt>>, Error> {
        let Some(bytes) = self
            .kv
            .get(&receipts_key(&hash))
            .map_err(StateError::from)?
        else {
            return Ok(None);
        };
        let rlp = Rlp::new(&bytes);
        let mut receipts = Vec::new();
        for item in rlp.iter() {
            let data = item
                .data()
                .map_err(|e| StateError::Corrupted(format!("bad receipts rlp: {e}")))?;
            receipts.push(
                Receipt::decode(data)
                    .map_err(|e| StateError::Corrupted(format!("bad receipt rlp: {e}")))?,
            );
        }
        Ok(Some(receipts))
    }

    /// Up to 256 ancestor hashes ending at `parent` (inclusive), oldest
    /// first, following parent links so side branches work too.
    fn ancestor_hashes(&self, parent: &Header) -> Result<Vec<H256>, Error> {
        let mut hashes = vec![parent.hash()];
        let mut cursor = parent.clone();
        while hashes.len() < 256 && cursor.number > 0 {
            hashes.push(cursor.parent_hash);
            match self.header_by_hash(cursor.parent_hash)? {
                Some(previous) => cursor = previous,
                None => break,
            }
        }
        hashes.reverse();
        Ok(hashes)
    }

    /// Validate and apply a block, persist it, and move the head if the
    /// new branch is heavier (or, once difficulty is zero, longer). All
    /// index writes land in one atomic batch; state nodes are
    /// content-addressed and only become reachable through that batch.
    ///
    /// # Errors
    /// `Error::Block` on consensus rejection (no visible mutation),
    /// `Error::State` on infrastructure failure.
    pub fn import_block(&mut self, block: Block) -> Result<BlockOutcome, Error> {
        let hash = block.header.hash();
        let parent = self
            .header_by_hash(block.header.parent_hash)?
            .ok_or(BlockError::UnknownParent(block.header.parent_hash))?;
        let parent_td = self.total_difficulty(&block.header.parent_hash)?;

        let state = StateDb::new(Arc::clone(&self.kv), parent.state_root);
        let ancestors = self.ancestor_hashes(&parent)?;
        let (_state, outcome) = apply_block(
            state,
            &self.schedule,
            self.chain_id,
            &block,
            &parent,
            ancestors,
        )?;

        let td = parent_td + block.header.difficulty;

        let mut batch = WriteBatch::new();
        batch.put(header_key(&hash), rlp::encode(&block.header).to_vec());
        batch.put(body_key(&hash), rlp::encode(&block).to_vec());
        batch.put(td_key(&hash), rlp::encode(&td).to_vec());
        {
            let mut s = rlp::RlpStream::new_list(outcome.receipts.len());
            for (receipt, tx) in outcome.receipts.iter().zip(block.transactions.iter()) {
                s.append(&receipt.encode(tx.tx_type()));
            }
            batch.put(receipts_key(&hash), s.out().to_vec());
        }

        let head_td = self.total_difficulty(&self.head.hash())?;
        let becomes_head =
            td > head_td || (td == head_td && block.header.number > self.head.number);
        if becomes_head {
            self.reindex_canonical(&mut batch, &block.header)?;
            batch.put(KEY_HEAD.to_vec(), hash.as_bytes().to_vec());
        }

        self.kv.write(batch).map_err(StateError::from)?;
        if becomes_head {
            log::debug!(
                target: "chain",
                "new head #{} {:?} (td {})",
                block.header.number,
                hash,
                td
            );
            self.head = block.header;
        }
        Ok(outcome)
    }

    /// Rewrite the canonical number index for a head switch: walk the new
    /// branch back to the common ancestor and drop stale entries above the
    /// new head.
    fn reindex_canonical(&self, batch: &mut WriteBatch, new_head: &Header) -> Result<(), Error> {
        let mut stale = new_head.number + 1;
        while stale <= self.head.number {
            batch.delete(canonical_key(stale));
            stale += 1;
        }

        batch.put(
            canonical_key(new_head.number),
            new_head.hash().as_bytes().to_vec(),
        );
        let mut cursor = new_head.clone();
        while cursor.number > 0 {
            let parent_hash = cursor.parent_hash;
            let parent_number = cursor.number - 1;
            if self.canonical_hash(parent_number)? == Some(parent_hash) {
                break;
            }
            batch.put(canonical_key(parent_number), parent_hash.as_bytes().to_vec());
            cursor = self
                .header_by_hash(parent_hash)?
                .ok_or(BlockError::UnknownParent(parent_hash))?;
        }
        Ok(())
    }

    fn simulation_backend(&self, origin: H160, gas_price: U256) -> Result<TrieBackend<K>, Error> {
        let head = &self.head;
        let spec = self.schedule.spec_at(head.number, head.timestamp);
        let ancestors = self.ancestor_hashes(head)?;

        let vicinity = Vicinity {
            gas_price,
            origin,
            chain_id: U256::from(self.chain_id),
            block_hashes: ancestors,
            block_number: U256::from(head.number + 1),
            block_coinbase: head.beneficiary,
            block_timestamp: U256::from(head.timestamp + 1),
            block_difficulty: head.difficulty,
            block_randomness: if spec.seal == SealRule::None {
                Some(head.mix_hash)
            } else {
                None
            },
            block_gas_limit: U256::from(head.gas_limit),
            block_base_fee_per_gas: head.base_fee_per_gas.unwrap_or_default(),
            blob_gas_price: if spec.has_blob_gas {
                Some(calc_blob_gas_price(calc_excess_blob_gas(head)))
            } else {
                None
            },
            blob_hashes: Vec::new(),
        };

        Ok(TrieBackend::new(self.head_state(), vicinity))
    }

    /// Execute a message against the head state without committing
    /// anything: the `eth_call` primitive.
    ///
    /// # Errors
    /// Infrastructure failures only; execution failures come back in the
    /// `ExitReason`.
    pub fn call(
        &self,
        from: H160,
        to: Option<H160>,
        value: U256,
        data: Vec<u8>,
        gas_limit: u64,
    ) -> Result<(ExitReason, Vec<u8>, u64), Error> {
        self.execute_simulation(from, to, value, data, gas_limit, false)
    }

    /// Like [`Chain::call`], but charges the 63/64 retention up front so
    /// the reported gas is directly usable as a transaction gas limit.
    ///
    /// # Errors
    /// Infrastructure failures only.
    pub fn estimate_gas(
        &self,
        from: H160,
        to: Option<H160>,
        value: U256,
        data: Vec<u8>,
        gas_limit: u64,
    ) -> Result<u64, Error> {
        self.execute_simulation(from, to, value, data, gas_limit, true)
            .map(|(_, _, gas_used)| gas_used)
    }

    fn execute_simulation(
        &self,
        from: H160,
        to: Option<H160>,
        value: U256,
        data: Vec<u8>,
        gas_limit: u64,
        estimate: bool,
    ) -> Result<(ExitReason, Vec<u8>, u64), Error> {
        let head = &self.head;
        let spec = self.schedule.spec_at(head.number, head.timestamp);
        let mut config = spec.config.clone();
        config.estimate = estimate;

        let backend = self.simulation_backend(from, U256::zero())?;
        let precompiles = spec.precompiles.build();

        let metadata = StackSubstateMetadata::new(gas_limit, &config);
        let state = MemoryStackState::new(metadata, &backend);
        let mut executor = StackExecutor::new_with_precompiles(state, &config, &precompiles);

        let (reason, output) = match to {
            Some(to) => executor.transact_call(from, to, value, data, gas_limit, Vec::new()),
            None => executor.transact_create(from, value, data, gas_limit, Vec::new()),
        };
        let gas_used = executor.used_gas();
        drop(executor);

        if let Some(infra) = backend.take_error() {
            return Err(infra.into());
        }
        Ok((reason, output, gas_used))
    }

    /// Assemble a block on top of the current head: apply the transactions
    /// in order, pay rewards, and fill every header field except the seal.
    ///
    /// # Errors
    /// `Error::Block` when a transaction cannot be included, `Error::State`
    /// on infrastructure failure.
    pub fn build_block(
        &self,
        coinbase: H160,
        gas_limit: u64,
        timestamp: u64,
        extra_data: Vec<u8>,
        transactions: Vec<TypedTransaction>,
    ) -> Result<OpenBlock, Error> {
        let parent = self.head.clone();
        let number = parent.number + 1;
        let spec = self.schedule.spec_at(number, timestamp);

        let base_fee = crate::block::expected_base_fee(spec, &parent);
        let difficulty = calculate_difficulty(spec, &parent, timestamp);
        let blob_gas_price = if spec.has_blob_gas {
            Some(calc_blob_gas_price(calc_excess_blob_gas(&parent)))
        } else {
            None
        };

        let vicinity = Vicinity {
            gas_price: U256::zero(),
            origin: H160::zero(),
            chain_id: U256::from(self.chain_id),
            block_hashes: self.ancestor_hashes(&parent)?,
            block_number: U256::from(number),
            block_coinbase: coinbase,
            block_timestamp: U256::from(timestamp),
            block_difficulty: difficulty,
            block_randomness: if spec.seal == SealRule::None {
                Some(H256::zero())
            } else {
                None
            },
            block_gas_limit: U256::from(gas_limit),
            block_base_fee_per_gas: base_fee.unwrap_or_default(),
            blob_gas_price,
            blob_hashes: Vec::new(),
        };

        let state = StateDb::new(Arc::clone(&self.kv), parent.state_root);
        let mut backend = TrieBackend::new(state, vicinity);
        let precompiles = spec.precompiles.build();

        let mut header = Header {
            parent_hash: parent.hash(),
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: coinbase,
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            logs_bloom: Bloom::default(),
            difficulty,
            number,
            gas_limit,
            gas_used: 0,
            timestamp,
            extra_data,
            mix_hash: H256::zero(),
            nonce: BlockNonce::default(),
            base_fee_per_gas: base_fee,
            withdrawals_root: spec.has_withdrawals.then(|| hearth_state::EMPTY_ROOT),
            blob_gas_used: spec.has_blob_gas.then_some(0),
            excess_blob_gas: spec.has_blob_gas.then(|| calc_excess_blob_gas(&parent)),
            parent_beacon_block_root: spec.has_blob_gas.then(H256::zero),
        };

        let mut receipts = Vec::with_capacity(transactions.len());
        let mut cumulative_gas_used = 0u64;
        let mut total_blob_gas = 0u64;
        let mut logs_bloom = Bloom::default();

        for (index, tx) in transactions.iter().enumerate() {
            let tx_error = |error| BlockError::Transaction { index, error };

            let env = prepare_transaction(
                spec,
                tx,
                self.chain_id,
                base_fee.unwrap_or_default(),
                blob_gas_price,
            )
            .map_err(tx_error)?;

            {
                let vicinity = backend.vicinity_mut();
                vicinity.gas_price = env.effective_gas_price;
                vicinity.origin = env.sender;
                vicinity.blob_hashes = tx.blob_versioned_hashes().to_vec();
            }

            let applied = apply_transaction(
                &mut backend,
                spec,
                &precompiles,
                tx,
                &env,
                gas_limit,
                cumulative_gas_used,
            )
            .map_err(tx_error)?;

            if let Some(infra) = backend.take_error() {
                return Err(infra.into());
            }

            cumulative_gas_used += applied.gas_used;
            total_blob_gas += applied.blob_gas_used;

            let outcome = if spec.receipts_carry_state_root {
                TransactionOutcome::StateRoot(backend.state().root())
            } else {
                TransactionOutcome::StatusCode(u8::from(applied.exit_reason.is_succeed()))
            };
            let receipt = Receipt::new(outcome, cumulative_gas_used, applied.logs);
            logs_bloom.accrue_bloom(&receipt.logs_bloom);
            receipts.push(receipt);
        }

        pay_rewards(&mut backend, spec, &header, &[]);
        if let Some(infra) = backend.take_error() {
            return Err(infra.into());
        }

        header.gas_used = cumulative_gas_used;
        header.logs_bloom = logs_bloom;
        header.transactions_root =
            ordered_trie_root(transactions.iter().map(TypedTransaction::encode));
        header.receipts_root = ordered_trie_root(
            receipts
                .iter()
                .zip(transactions.iter())
                .map(|(receipt, tx)| receipt.encode(tx.tx_type())),
        );
        header.state_root = backend.state().root();
        if spec.has_blob_gas {
            header.blob_gas_used = Some(total_blob_gas);
        }

        // Everything except the seal must already be self-consistent.
        validate_header(spec, &header, &parent, false).map_err(Error::Block)?;

        Ok(OpenBlock {
            block: Block {
                header,
                transactions,
                ommers: Vec::new(),
            },
            receipts,
        })
    }
}
