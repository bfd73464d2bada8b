use crate::executor::{apply_transaction, prepare_transaction, GAS_PER_BLOB};
use crate::seal::ethash;
use crate::transaction::SignedLegacyTransaction;
use crate::{
    calculate_difficulty, BlockError, Bloom, Error, ForkSchedule, Header, Receipt, SealRule,
    TransactionOutcome, TypedTransaction, VmSpec, EMPTY_OMMERS_HASH,
};
use hearth::backend::{Apply, ApplyBackend, Backend, Basic, Log, Vicinity};
use hearth_state::{ordered_trie_root, KeyValueStore, StateDb, TrieBackend};
use primitive_types::{H256, U256};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;

const GAS_LIMIT_MINIMUM: u64 = 5000;
const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;
const BASE_FEE_MAX_CHANGE_DENOMINATOR: u64 = 8;
const INITIAL_BASE_FEE: u64 = 1_000_000_000;
const MAX_OMMER_DEPTH: u64 = 6;

/// EIP-4844 per-block blob budget and pricing.
pub const MAX_BLOB_GAS_PER_BLOCK: u64 = 786_432;
const TARGET_BLOB_GAS_PER_BLOCK: u64 = 393_216;
const MIN_BLOB_GASPRICE: u128 = 1;
const BLOB_GASPRICE_UPDATE_FRACTION: u128 = 3_338_477;

/// A full block: header, transactions, ommer headers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<TypedTransaction>,
    pub ommers: Vec<Header>,
}

impl Block {
    #[must_use]
    pub fn ommers_hash(&self) -> H256 {
        let mut s = RlpStream::new();
        s.append_list(&self.ommers);
        H256::from_slice(Keccak256::digest(s.out()).as_slice())
    }
}

impl Encodable for Block {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.header);
        s.begin_list(self.transactions.len());
        for tx in &self.transactions {
            match tx {
                // Legacy transactions are structural list items; typed ones
                // are opaque byte strings (EIP-2718).
                TypedTransaction::Legacy(signed) => {
                    s.append(signed);
                }
                typed => {
                    s.append(&typed.encode());
                }
            }
        }
        s.append_list(&self.ommers);
    }
}

impl Decodable for Block {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let header = rlp.val_at(0)?;

        let mut transactions = Vec::new();
        for item in rlp.at(1)?.iter() {
            if item.is_list() {
                transactions.push(TypedTransaction::Legacy(SignedLegacyTransaction::decode(
                    &item,
                )?));
            } else {
                transactions.push(TypedTransaction::decode(item.data()?)?);
            }
        }

        Ok(Self {
            header,
            transactions,
            ommers: rlp.list_at(2)?,
        })
    }
}

/// Everything block application produced, to be persisted by the chain.
#[derive(Debug)]
pub struct BlockOutcome {
    pub receipts: Vec<Receipt>,
    pub state_root: H256,
    pub gas_used: u64,
    pub logs_bloom: Bloom,
}

/// Excess blob gas rolled forward from the parent (EIP-4844).
#[must_use]
pub fn calc_excess_blob_gas(parent: &Header) -> u64 {
    let parent_excess = parent.excess_blob_gas.unwrap_or(0);
    let parent_used = parent.blob_gas_used.unwrap_or(0);
    (parent_excess + parent_used).saturating_sub(TARGET_BLOB_GAS_PER_BLOCK)
}

/// Blob gas price via the Taylor-approximated exponential of EIP-4844.
#[must_use]
pub fn calc_blob_gas_price(excess_blob_gas: u64) -> u128 {
    fake_exponential(
        MIN_BLOB_GASPRICE,
        u128::from(excess_blob_gas),
        BLOB_GASPRICE_UPDATE_FRACTION,
    )
}

fn fake_exponential(factor: u128, numerator: u128, denominator: u128) -> u128 {
    let mut i: u128 = 1;
    let mut output: u128 = 0;
    let mut accum = factor * denominator;
    while accum > 0 {
        output += accum;
        accum = accum * numerator / (denominator * i);
        i += 1;
    }
    output / denominator
}

pub(crate) fn expected_base_fee(spec: &VmSpec, parent: &Header) -> Option<U256> {
    if !spec.config.has_base_fee {
        return None;
    }

    let Some(parent_base_fee) = parent.base_fee_per_gas else {
        // First block of the fee-market fork.
        return Some(U256::from(INITIAL_BASE_FEE));
    };

    let target = parent.gas_limit / spec.elasticity_multiplier;
    let denominator = U256::from(BASE_FEE_MAX_CHANGE_DENOMINATOR);
    Some(if parent.gas_used == target {
        parent_base_fee
    } else if parent.gas_used > target {
        let delta = parent_base_fee * U256::from(parent.gas_used - target)
            / U256::from(target)
            / denominator;
        parent_base_fee + delta.max(U256::one())
    } else {
        let delta = parent_base_fee * U256::from(target - parent.gas_used)
            / U256::from(target)
            / denominator;
        parent_base_fee - delta
    })
}

fn check_gas_limit(gas_limit: u64, parent_gas_limit: u64) -> bool {
    let bound = parent_gas_limit / GAS_LIMIT_BOUND_DIVISOR;
    gas_limit >= GAS_LIMIT_MINIMUM
        && gas_limit < parent_gas_limit + bound
        && gas_limit > parent_gas_limit.saturating_sub(bound)
}

fn check_seal(spec: &VmSpec, header: &Header) -> Result<(), BlockError> {
    match spec.seal {
        SealRule::Ethash => {
            if ethash::verify(header) {
                Ok(())
            } else {
                Err(BlockError::InvalidSeal)
            }
        }
        SealRule::None => {
            if header.difficulty.is_zero()
                && header.nonce.is_zero()
                && header.ommers_hash == EMPTY_OMMERS_HASH
            {
                Ok(())
            } else {
                Err(BlockError::InvalidSeal)
            }
        }
    }
}

/// Validate a header against its parent under the given rule set. The seal
/// check is separate so block building can validate its own unsealed
/// headers.
pub(crate) fn validate_header(
    spec: &VmSpec,
    header: &Header,
    parent: &Header,
    check_pow: bool,
) -> Result<(), BlockError> {
    if header.number != parent.number + 1 {
        return Err(BlockError::InvalidNumber {
            expected: parent.number + 1,
            got: header.number,
        });
    }
    if header.parent_hash != parent.hash() {
        return Err(BlockError::UnknownParent(header.parent_hash));
    }
    if header.timestamp <= parent.timestamp {
        return Err(BlockError::TimestampNotAfterParent);
    }
    if header.extra_data.len() > 32 {
        return Err(BlockError::ExtraDataTooLong);
    }
    if header.gas_used > header.gas_limit {
        return Err(BlockError::GasUsedAboveLimit);
    }
    if !check_gas_limit(header.gas_limit, parent.gas_limit) {
        return Err(BlockError::InvalidGasLimit);
    }

    let expected_difficulty = calculate_difficulty(spec, parent, header.timestamp);
    if header.difficulty != expected_difficulty {
        return Err(BlockError::InvalidDifficulty {
            expected: expected_difficulty,
            got: header.difficulty,
        });
    }

    let expected = expected_base_fee(spec, parent);
    if header.base_fee_per_gas != expected {
        return Err(BlockError::InvalidBaseFee {
            expected,
            got: header.base_fee_per_gas,
        });
    }

    if spec.has_withdrawals != header.withdrawals_root.is_some() {
        return Err(BlockError::InvalidWithdrawals);
    }
    if spec.has_blob_gas {
        let expected_excess = calc_excess_blob_gas(parent);
        if header.excess_blob_gas != Some(expected_excess) {
            return Err(BlockError::InvalidBlobGas);
        }
        match header.blob_gas_used {
            Some(used) if used <= MAX_BLOB_GAS_PER_BLOCK && used % GAS_PER_BLOB == 0 => {}
            _ => return Err(BlockError::InvalidBlobGas),
        }
        if header.parent_beacon_block_root.is_none() {
            return Err(BlockError::InvalidBlobGas);
        }
    } else if header.blob_gas_used.is_some()
        || header.excess_blob_gas.is_some()
        || header.parent_beacon_block_root.is_some()
    {
        return Err(BlockError::InvalidBlobGas);
    }

    if check_pow {
        check_seal(spec, header)?;
    }

    Ok(())
}

fn validate_ommers(spec: &VmSpec, block: &Block) -> Result<(), BlockError> {
    if block.header.ommers_hash != block.ommers_hash() {
        return Err(BlockError::InvalidOmmers("ommers hash mismatch"));
    }
    if block.ommers.is_empty() {
        return Ok(());
    }
    if spec.seal == SealRule::None {
        return Err(BlockError::InvalidOmmers("ommers after the merge"));
    }
    if block.ommers.len() > 2 {
        return Err(BlockError::InvalidOmmers("more than two ommers"));
    }

    let mut seen = Vec::new();
    for ommer in &block.ommers {
        let depth = block.header.number.saturating_sub(ommer.number);
        if depth == 0 || depth > MAX_OMMER_DEPTH {
            return Err(BlockError::InvalidOmmers("ommer outside depth window"));
        }
        let hash = ommer.hash();
        if seen.contains(&hash) {
            return Err(BlockError::InvalidOmmers("duplicate ommer"));
        }
        if !ethash::verify(ommer) {
            return Err(BlockError::InvalidOmmers("ommer seal invalid"));
        }
        seen.push(hash);
    }
    Ok(())
}

pub(crate) fn pay_rewards<K: KeyValueStore>(
    backend: &mut TrieBackend<K>,
    spec: &VmSpec,
    header: &Header,
    ommers: &[Header],
) {
    if spec.block_reward.is_zero() {
        return;
    }

    let miner_reward = spec.block_reward
        + spec.block_reward * U256::from(ommers.len() as u64) / U256::from(32);

    let mut payouts: Vec<(primitive_types::H160, U256)> = vec![(header.beneficiary, miner_reward)];
    for ommer in ommers {
        let depth = header.number - ommer.number;
        let ommer_reward = spec.block_reward * U256::from(8 - depth) / U256::from(8);
        payouts.push((ommer.beneficiary, ommer_reward));
    }

    let applies: Vec<Apply<BTreeMap<H256, H256>>> = payouts
        .into_iter()
        .map(|(address, reward)| {
            let mut basic = backend.basic(address);
            basic.balance += reward;
            Apply::Modify {
                address,
                basic,
                code: None,
                storage: BTreeMap::new(),
                reset_storage: false,
            }
        })
        .collect();

    backend.apply(applies, Vec::<Log>::new(), false);
}

/// Apply a block to the post-state of its parent. Returns the advanced
/// state and the receipts; on any error the input state is untouched
/// (state writes are content-addressed and only the returned root makes
/// them reachable).
///
/// `ancestor_hashes` feeds BLOCKHASH: up to 256 canonical hashes ending
/// with the parent's.
///
/// # Errors
/// `Error::Block` on consensus rejection, `Error::State` on infrastructure
/// failure.
pub fn apply_block<K: KeyValueStore>(
    state: StateDb<K>,
    schedule: &ForkSchedule,
    chain_id: u64,
    block: &Block,
    parent: &Header,
    ancestor_hashes: Vec<H256>,
) -> Result<(StateDb<K>, BlockOutcome), Error> {
    let header = &block.header;
    let spec = schedule.spec_at(header.number, header.timestamp);

    validate_header(spec, header, parent, true)?;
    validate_ommers(spec, block)?;

    let blob_gas_price = if spec.has_blob_gas {
        Some(calc_blob_gas_price(calc_excess_blob_gas(parent)))
    } else {
        None
    };

    let vicinity = Vicinity {
        gas_price: U256::zero(),
        origin: primitive_types::H160::zero(),
        chain_id: U256::from(chain_id),
        block_hashes: ancestor_hashes,
        block_number: U256::from(header.number),
        block_coinbase: header.beneficiary,
        block_timestamp: U256::from(header.timestamp),
        block_difficulty: header.difficulty,
        block_randomness: if spec.seal == SealRule::None {
            Some(header.mix_hash)
        } else {
            None
        },
        block_gas_limit: U256::from(header.gas_limit),
        block_base_fee_per_gas: header.base_fee_per_gas.unwrap_or_default(),
        blob_gas_price,
        blob_hashes: Vec::new(),
    };

    let mut backend = TrieBackend::new(state, vicinity);
    let precompiles = spec.precompiles.build();

    let mut receipts = Vec::with_capacity(block.transactions.len());
    let mut cumulative_gas_used = 0u64;
    let mut total_blob_gas = 0u64;
    let mut logs_bloom = Bloom::default();

    for (index, tx) in block.transactions.iter().enumerate() {
        let tx_error = |error| BlockError::Transaction { index, error };

        let env = prepare_transaction(
            spec,
            tx,
            chain_id,
            header.base_fee_per_gas.unwrap_or_default(),
            blob_gas_price,
        )
        .map_err(tx_error)?;

        total_blob_gas += env.blob_gas_used;
        if total_blob_gas > MAX_BLOB_GAS_PER_BLOCK {
            return Err(BlockError::InvalidBlobGas.into());
        }

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
            header.gas_limit,
            cumulative_gas_used,
        )
        .map_err(tx_error)?;

        if let Some(infra) = backend.take_error() {
            return Err(infra.into());
        }

        cumulative_gas_used += applied.gas_used;

        let outcome = if spec.receipts_carry_state_root {
            TransactionOutcome::StateRoot(backend.state().root())
        } else {
            TransactionOutcome::StatusCode(u8::from(applied.exit_reason.is_succeed()))
        };
        let receipt = Receipt::new(outcome, cumulative_gas_used, applied.logs);
        logs_bloom.accrue_bloom(&receipt.logs_bloom);
        receipts.push(receipt);
    }

    pay_rewards(&mut backend, spec, header, &block.ommers);
    if let Some(infra) = backend.take_error() {
        return Err(infra.into());
    }

    if cumulative_gas_used != header.gas_used {
        return Err(BlockError::GasUsedMismatch {
            expected: header.gas_used,
            got: cumulative_gas_used,
        }
        .into());
    }
    if spec.has_blob_gas && header.blob_gas_used != Some(total_blob_gas) {
        return Err(BlockError::InvalidBlobGas.into());
    }

    let transactions_root =
        ordered_trie_root(block.transactions.iter().map(TypedTransaction::encode));
    if transactions_root != header.transactions_root {
        return Err(BlockError::TransactionsRootMismatch {
            expected: header.transactions_root,
            got: transactions_root,
        }
        .into());
    }

    let receipts_root = ordered_trie_root(
        receipts
            .iter()
            .zip(block.transactions.iter())
            .map(|(receipt, tx)| receipt.encode(tx.tx_type())),
    );
    if receipts_root != header.receipts_root {
        return Err(BlockError::ReceiptsRootMismatch {
            expected: header.receipts_root,
            got: receipts_root,
        }
        .into());
    }

    if logs_bloom != header.logs_bloom {
        return Err(BlockError::BloomMismatch.into());
    }

    let state_root = backend.state().root();
    if state_root != header.state_root {
        return Err(BlockError::StateRootMismatch {
            expected: header.state_root,
            got: state_root,
        }
        .into());
    }

    let outcome = BlockOutcome {
        receipts,
        state_root,
        gas_used: cumulative_gas_used,
        logs_bloom,
    };
    Ok((backend.into_state(), outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_gas_price_curve() {
        assert_eq!(calc_blob_gas_price(0), 1);
        // Below one update fraction the price still rounds to 1.
        assert_eq!(calc_blob_gas_price(1_000_000), 1);
        // Far out on the curve the price grows.
        assert!(calc_blob_gas_price(60_000_000) > 1);
    }

    #[test]
    fn excess_blob_gas_rolls_forward() {
        let mut parent = crate::Header {
            parent_hash: H256::zero(),
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: primitive_types::H160::zero(),
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            logs_bloom: Bloom::default(),
            difficulty: U256::zero(),
            number: 0,
            gas_limit: 30_000_000,
            gas_used: 0,
            timestamp: 0,
            extra_data: Vec::new(),
            mix_hash: H256::zero(),
            nonce: crate::BlockNonce::default(),
            base_fee_per_gas: Some(U256::from(7)),
            withdrawals_root: Some(H256::zero()),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(0),
            parent_beacon_block_root: Some(H256::zero()),
        };
        assert_eq!(calc_excess_blob_gas(&parent), 0);

        parent.blob_gas_used = Some(MAX_BLOB_GAS_PER_BLOCK);
        assert_eq!(
            calc_excess_blob_gas(&parent),
            MAX_BLOB_GAS_PER_BLOCK - TARGET_BLOB_GAS_PER_BLOCK
        );
    }

    #[test]
    fn gas_limit_band() {
        assert!(check_gas_limit(8_000_000, 8_000_000));
        assert!(check_gas_limit(8_000_000 + 7812, 8_000_000));
        assert!(!check_gas_limit(8_000_000 + 7813, 8_000_000));
        assert!(!check_gas_limit(4_999, 5_000_000));
    }

    #[test]
    fn base_fee_moves_with_usage() {
        let spec = VmSpec::london();
        let mut parent = crate::Header {
            parent_hash: H256::zero(),
            ommers_hash: EMPTY_OMMERS_HASH,
            beneficiary: primitive_types::H160::zero(),
            state_root: H256::zero(),
            transactions_root: H256::zero(),
            receipts_root: H256::zero(),
            logs_bloom: Bloom::default(),
            difficulty: U256::zero(),
            number: 100,
            gas_limit: 30_000_000,
            gas_used: 15_000_000,
            timestamp: 0,
            extra_data: Vec::new(),
            mix_hash: H256::zero(),
            nonce: crate::BlockNonce::default(),
            base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            withdrawals_root: None,
            blob_gas_used: None,
            excess_blob_gas: None,
            parent_beacon_block_root: None,
        };

        // Exactly at target: unchanged.
        assert_eq!(
            expected_base_fee(&spec, &parent),
            Some(U256::from(1_000_000_000u64))
        );

        // Full blocks push the fee up by 1/8.
        parent.gas_used = 30_000_000;
        assert_eq!(
            expected_base_fee(&spec, &parent),
            Some(U256::from(1_125_000_000u64))
        );

        // Empty blocks pull it down by 1/8.
        parent.gas_used = 0;
        assert_eq!(
            expected_base_fee(&spec, &parent),
            Some(U256::from(875_000_000u64))
        );
    }
}
