//! End-to-end chain tests: build blocks on an in-memory store, import
//! them, and check balances, receipts and re-orgs.

use hearth_chain::{
    AccessTuple, BlockError, Chain, Eip1559Transaction, Error, ForkSchedule, GenesisAccount,
    GenesisConfig, LegacyTransaction, SealRule, SignedEip1559Transaction,
    SignedLegacyTransaction, TransactionError, TypedTransaction, VmSpec,
};
use hearth_state::MemoryKv;
use primitive_types::{H160, H256, U256};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;
use std::sync::Arc;

const CHAIN_ID: u64 = 1337;
const GWEI: u64 = 1_000_000_000;
const ETHER: u128 = 1_000_000_000_000_000_000;

struct TestAccount {
    secret: libsecp256k1::SecretKey,
    address: H160,
}

fn account(seed: u8) -> TestAccount {
    let mut secret_bytes = [0u8; 32];
    secret_bytes[31] = seed;
    secret_bytes[0] = 0x01;
    let secret = libsecp256k1::SecretKey::parse(&secret_bytes).unwrap();
    let public = libsecp256k1::PublicKey::from_secret_key(&secret);
    let hash = Keccak256::digest(&public.serialize()[1..]);
    TestAccount {
        secret,
        address: H160::from_slice(&hash[12..]),
    }
}

fn sign_digest(hash: H256, secret: &libsecp256k1::SecretKey) -> (u8, U256, U256) {
    let message = libsecp256k1::Message::parse_slice(hash.as_bytes()).unwrap();
    let (signature, recovery_id) = libsecp256k1::sign(&message, secret);
    (
        recovery_id.serialize(),
        U256::from_big_endian(&signature.r.b32()),
        U256::from_big_endian(&signature.s.b32()),
    )
}

fn sign_legacy(
    transaction: LegacyTransaction,
    chain_id: Option<u64>,
    account: &TestAccount,
) -> TypedTransaction {
    let mut stream = RlpStream::new();
    transaction.rlp_append_unsigned(&mut stream, chain_id);
    let hash = H256::from_slice(Keccak256::digest(stream.as_raw()).as_slice());
    let (parity, r, s) = sign_digest(hash, &account.secret);
    let v = match chain_id {
        None => 27 + u64::from(parity),
        Some(id) => 35 + 2 * id + u64::from(parity),
    };
    TypedTransaction::Legacy(SignedLegacyTransaction {
        transaction,
        v,
        r,
        s,
    })
}

fn sign_eip1559(transaction: Eip1559Transaction, account: &TestAccount) -> TypedTransaction {
    // The signing payload: 0x02 || rlp([chain_id, nonce, priority, fee,
    // gas, to, value, data, access_list]).
    let mut stream = RlpStream::new();
    stream.append(&2u8);
    stream.begin_list(9);
    stream.append(&transaction.chain_id);
    stream.append(&transaction.nonce);
    stream.append(&transaction.max_priority_fee_per_gas);
    stream.append(&transaction.max_fee_per_gas);
    stream.append(&transaction.gas_limit);
    match transaction.to.as_ref() {
        None => stream.append(&""),
        Some(address) => stream.append(address),
    };
    stream.append(&transaction.value);
    stream.append(&transaction.data);
    stream.append_list::<AccessTuple, _>(&transaction.access_list);

    let hash = H256::from_slice(Keccak256::digest(stream.as_raw()).as_slice());
    let (parity, r, s) = sign_digest(hash, &account.secret);
    TypedTransaction::DynamicFee(SignedEip1559Transaction {
        transaction,
        odd_y_parity: parity,
        r,
        s,
    })
}

/// A single-fork schedule running under beacon-style consensus (zero
/// difficulty, no proof of work), so test blocks need no nonce search.
fn beacon_style(mut spec: VmSpec) -> VmSpec {
    spec.seal = SealRule::None;
    spec.difficulty = hearth_chain::DifficultyRule::Zero;
    spec
}

fn genesis_with(
    alloc: Vec<(H160, GenesisAccount)>,
    base_fee: Option<U256>,
) -> GenesisConfig {
    GenesisConfig {
        difficulty: U256::zero(),
        base_fee_per_gas: base_fee,
        alloc: alloc.into_iter().collect(),
        ..GenesisConfig::default()
    }
}

fn funded(balance: u128) -> GenesisAccount {
    GenesisAccount {
        balance: U256::from(balance),
        ..GenesisAccount::default()
    }
}

fn contract(code: Vec<u8>) -> GenesisAccount {
    GenesisAccount {
        code,
        nonce: U256::one(),
        ..GenesisAccount::default()
    }
}

fn new_chain(
    spec: VmSpec,
    genesis: &GenesisConfig,
) -> (Chain<MemoryKv>, Arc<MemoryKv>) {
    let kv = Arc::new(MemoryKv::new());
    let spec = beacon_style(spec);
    let chain = Chain::new(
        Arc::clone(&kv),
        ForkSchedule::single(spec),
        CHAIN_ID,
        genesis,
    )
    .unwrap();
    (chain, kv)
}

fn balance_of(chain: &Chain<MemoryKv>, address: H160) -> U256 {
    chain
        .head_state()
        .account(address)
        .unwrap()
        .map(|account| account.balance)
        .unwrap_or_default()
}

fn storage_of(chain: &Chain<MemoryKv>, address: H160, slot: u64) -> H256 {
    chain
        .head_state()
        .storage(address, H256::from_low_u64_be(slot))
        .unwrap()
}

fn import_built(
    chain: &mut Chain<MemoryKv>,
    coinbase: H160,
    transactions: Vec<TypedTransaction>,
) -> hearth_chain::BlockOutcome {
    let open = chain
        .build_block(
            coinbase,
            chain.head().gas_limit,
            chain.head().timestamp + 12,
            Vec::new(),
            transactions,
        )
        .unwrap();
    chain.import_block(open.block).unwrap()
}

#[test]
fn empty_block_pays_the_miner() {
    let coinbase = H160::repeat_byte(0xcb);
    let genesis = genesis_with(vec![], None);
    let (mut chain, _kv) = new_chain(VmSpec::byzantium(), &genesis);

    import_built(&mut chain, coinbase, vec![]);

    assert_eq!(chain.head().number, 1);
    // Byzantium's static reward.
    assert_eq!(balance_of(&chain, coinbase), U256::from(3u128 * ETHER));
}

#[test]
fn simple_value_transfer() {
    let sender = account(1);
    let receiver = H160::repeat_byte(0xbb);
    let genesis = genesis_with(vec![(sender.address, funded(10_000 * ETHER))], None);
    let (mut chain, _kv) = new_chain(VmSpec::byzantium(), &genesis);

    let tx = sign_legacy(
        LegacyTransaction {
            nonce: U256::zero(),
            gas_price: U256::zero(),
            gas_limit: U256::from(100_000),
            to: Some(receiver),
            value: U256::one(),
            data: Vec::new(),
        },
        Some(CHAIN_ID),
        &sender,
    );
    let outcome = import_built(&mut chain, H160::repeat_byte(0xcb), vec![tx]);

    assert_eq!(outcome.receipts.len(), 1);
    assert!(outcome.receipts[0].succeeded());
    assert_eq!(outcome.receipts[0].cumulative_gas_used, 21_000);
    assert_eq!(outcome.gas_used, 21_000);

    assert_eq!(balance_of(&chain, receiver), U256::one());
    assert_eq!(
        balance_of(&chain, sender.address),
        U256::from(10_000 * ETHER) - U256::one()
    );
    // The sender's nonce moved even though no fee was charged.
    assert_eq!(
        chain
            .head_state()
            .account(sender.address)
            .unwrap()
            .unwrap()
            .nonce,
        U256::one()
    );
}

#[test]
fn eip1559_fee_split_between_burn_and_coinbase() {
    let sender = account(2);
    let receiver = H160::repeat_byte(0xbb);
    let coinbase = H160::repeat_byte(0xcb);
    let mut spec = VmSpec::london();
    spec.block_reward = U256::zero();
    let genesis = genesis_with(
        vec![(sender.address, funded(10 * ETHER))],
        Some(U256::from(GWEI)),
    );
    let (mut chain, _kv) = new_chain(spec, &genesis);

    // An empty parent block pulls the base fee down by 1/8.
    let expected_base_fee = U256::from(GWEI) - U256::from(GWEI) / 8;

    let tx = sign_eip1559(
        Eip1559Transaction {
            chain_id: CHAIN_ID,
            nonce: U256::zero(),
            max_priority_fee_per_gas: U256::from(GWEI),
            max_fee_per_gas: U256::from(3 * GWEI),
            gas_limit: U256::from(21_000),
            to: Some(receiver),
            value: U256::one(),
            data: Vec::new(),
            access_list: Vec::new(),
        },
        &sender,
    );
    let outcome = import_built(&mut chain, coinbase, vec![tx]);

    assert_eq!(chain.head().base_fee_per_gas, Some(expected_base_fee));
    assert_eq!(outcome.gas_used, 21_000);

    // Coinbase keeps exactly the priority fee.
    assert_eq!(
        balance_of(&chain, coinbase),
        U256::from(GWEI) * U256::from(21_000)
    );
    // The sender paid effective price (base + priority) plus the value;
    // the base-fee part is burned, visible as the difference between what
    // the sender paid and what the coinbase received.
    let effective = expected_base_fee + U256::from(GWEI);
    assert_eq!(
        balance_of(&chain, sender.address),
        U256::from(10 * ETHER) - effective * U256::from(21_000) - U256::one()
    );
}

// A deployer that CREATE2s an empty contract with salt 0 and returns the
// created address (zero on failure).
const CREATE2_DEPLOYER: &[u8] = &[
    0x60, 0x00, // PUSH1 0 (salt)
    0x60, 0x00, // PUSH1 0 (length)
    0x60, 0x00, // PUSH1 0 (offset)
    0x60, 0x00, // PUSH1 0 (value)
    0xf5, // CREATE2
    0x60, 0x00, 0x52, // MSTORE at 0
    0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN 32 bytes
];

#[test]
fn create2_collision_consumes_gas_but_changes_nothing() {
    let sender = account(3);
    let deployer = H160::repeat_byte(0xdd);
    let genesis = genesis_with(
        vec![
            (sender.address, funded(10 * ETHER)),
            (deployer, contract(CREATE2_DEPLOYER.to_vec())),
        ],
        None,
    );
    let (mut chain, _kv) = new_chain(VmSpec::petersburg(), &genesis);

    // Before anything is deployed the call reports the target address.
    let (_, first_output, _) = chain
        .call(sender.address, Some(deployer), U256::zero(), vec![], 1_000_000)
        .unwrap();
    let created = H160::from_slice(&first_output[12..]);
    assert_ne!(created, H160::zero());

    let call_deployer = |nonce: u64, account: &TestAccount| {
        sign_legacy(
            LegacyTransaction {
                nonce: U256::from(nonce),
                gas_price: U256::zero(),
                gas_limit: U256::from(1_000_000),
                to: Some(deployer),
                value: U256::zero(),
                data: Vec::new(),
            },
            Some(CHAIN_ID),
            account,
        )
    };

    let outcome = import_built(
        &mut chain,
        H160::repeat_byte(0xcb),
        vec![call_deployer(0, &sender)],
    );
    assert!(outcome.receipts[0].succeeded());

    // The created account now exists with a bumped nonce.
    let created_account = chain.head_state().account(created).unwrap().unwrap();
    assert_eq!(created_account.nonce, U256::one());

    // Re-running the deployer hits the collision: the outer call still
    // succeeds, CREATE2 just pushes zero.
    let (_, second_output, _) = chain
        .call(sender.address, Some(deployer), U256::zero(), vec![], 1_000_000)
        .unwrap();
    assert_eq!(second_output, vec![0u8; 32]);

    let outcome = import_built(
        &mut chain,
        H160::repeat_byte(0xcb),
        vec![call_deployer(1, &sender)],
    );
    assert!(outcome.receipts[0].succeeded());
    // Still nonce 1: the failed create left no trace beyond gas.
    let created_account = chain.head_state().account(created).unwrap().unwrap();
    assert_eq!(created_account.nonce, U256::one());
}

// SSTORE(0, 1); STOP
const STORE_ONE: &[u8] = &[0x60, 0x01, 0x60, 0x00, 0x55, 0x00];

fn staticcall_caller(target: H160) -> Vec<u8> {
    // STATICCALL(0xffff gas, target, no input, no output), store the
    // success flag at slot 0.
    let mut code = vec![
        0x60, 0x00, // out len
        0x60, 0x00, // out offset
        0x60, 0x00, // in len
        0x60, 0x00, // in offset
        0x73, // PUSH20 target
    ];
    code.extend_from_slice(target.as_bytes());
    code.extend_from_slice(&[
        0x61, 0xff, 0xff, // PUSH2 gas
        0xfa, // STATICCALL
        0x60, 0x00, 0x55, // SSTORE flag
        0x00, // STOP
    ]);
    code
}

#[test]
fn staticcall_blocks_state_writes_in_callee() {
    let sender = account(4);
    let writer = H160::repeat_byte(0xee);
    let caller = H160::repeat_byte(0xdc);
    let genesis = genesis_with(
        vec![
            (sender.address, funded(10 * ETHER)),
            (writer, contract(STORE_ONE.to_vec())),
            (caller, contract(staticcall_caller(writer))),
        ],
        None,
    );
    let (mut chain, _kv) = new_chain(VmSpec::byzantium(), &genesis);

    let tx = sign_legacy(
        LegacyTransaction {
            nonce: U256::zero(),
            gas_price: U256::zero(),
            gas_limit: U256::from(1_000_000),
            to: Some(caller),
            value: U256::zero(),
            data: Vec::new(),
        },
        Some(CHAIN_ID),
        &sender,
    );
    let outcome = import_built(&mut chain, H160::repeat_byte(0xcb), vec![tx]);

    // The outer transaction succeeds; the static callee failed.
    assert!(outcome.receipts[0].succeeded());
    // success flag is 0...
    assert_eq!(storage_of(&chain, caller, 0), H256::zero());
    // ...and the callee wrote nothing.
    assert_eq!(storage_of(&chain, writer, 0), H256::zero());
}

// SLOAD(0) twice.
const DOUBLE_SLOAD: &[u8] = &[0x60, 0x00, 0x54, 0x50, 0x60, 0x00, 0x54, 0x50, 0x00];

#[test]
fn warm_sload_is_cheap_on_second_read() {
    let sender = account(5);
    let target = H160::repeat_byte(0xea);
    let genesis = genesis_with(
        vec![
            (sender.address, funded(10 * ETHER)),
            (target, contract(DOUBLE_SLOAD.to_vec())),
        ],
        None,
    );
    let (mut chain, _kv) = new_chain(VmSpec::berlin(), &genesis);

    let tx = sign_legacy(
        LegacyTransaction {
            nonce: U256::zero(),
            gas_price: U256::zero(),
            gas_limit: U256::from(100_000),
            to: Some(target),
            value: U256::zero(),
            data: Vec::new(),
        },
        Some(CHAIN_ID),
        &sender,
    );
    let outcome = import_built(&mut chain, H160::repeat_byte(0xcb), vec![tx]);

    // 21000 intrinsic, then PUSH+SLOAD(cold)+POP and PUSH+SLOAD(warm)+POP:
    // 3 + 2100 + 2 + 3 + 100 + 2.
    assert_eq!(outcome.gas_used, 21_000 + 2108 + 102);
}

// SSTORE(0, 1) then REVERT(0, 0).
const STORE_THEN_REVERT: &[u8] = &[
    0x60, 0x01, 0x60, 0x00, 0x55, // SSTORE(0, 1)
    0x60, 0x00, 0x60, 0x00, 0xfd, // REVERT(0, 0)
];

#[test]
fn reverted_frame_leaves_no_state_logs_or_refunds() {
    let sender = account(6);
    let target = H160::repeat_byte(0xec);
    let genesis = genesis_with(
        vec![
            (sender.address, funded(10 * ETHER)),
            (target, contract(STORE_THEN_REVERT.to_vec())),
        ],
        None,
    );
    let (mut chain, _kv) = new_chain(VmSpec::byzantium(), &genesis);

    let tx = sign_legacy(
        LegacyTransaction {
            nonce: U256::zero(),
            gas_price: U256::zero(),
            gas_limit: U256::from(1_000_000),
            to: Some(target),
            value: U256::zero(),
            data: Vec::new(),
        },
        Some(CHAIN_ID),
        &sender,
    );
    let outcome = import_built(&mut chain, H160::repeat_byte(0xcb), vec![tx]);

    assert!(!outcome.receipts[0].succeeded());
    assert!(outcome.receipts[0].logs.is_empty());
    assert_eq!(storage_of(&chain, target, 0), H256::zero());
    // REVERT returns unused gas: four pushes + one fresh SSTORE.
    assert_eq!(outcome.gas_used, 21_000 + 4 * 3 + 20_000);
    // The nonce still advanced.
    assert_eq!(
        chain
            .head_state()
            .account(sender.address)
            .unwrap()
            .unwrap()
            .nonce,
        U256::one()
    );
}

#[test]
fn wrong_nonce_invalidates_the_block() {
    let sender = account(7);
    let genesis = genesis_with(vec![(sender.address, funded(ETHER))], None);
    let (mut chain, _kv) = new_chain(VmSpec::byzantium(), &genesis);

    let tx = sign_legacy(
        LegacyTransaction {
            nonce: U256::from(5),
            gas_price: U256::zero(),
            gas_limit: U256::from(21_000),
            to: Some(H160::repeat_byte(1)),
            value: U256::zero(),
            data: Vec::new(),
        },
        Some(CHAIN_ID),
        &sender,
    );

    let result = chain.build_block(
        H160::repeat_byte(0xcb),
        chain.head().gas_limit,
        chain.head().timestamp + 12,
        Vec::new(),
        vec![tx],
    );
    match result {
        Err(Error::Block(BlockError::Transaction {
            index: 0,
            error: TransactionError::NonceMismatch { .. },
        })) => {}
        other => panic!("expected nonce mismatch, got {other:?}"),
    }
}

#[test]
fn longer_branch_wins_the_reorg() {
    let coinbase_a = H160::repeat_byte(0xaa);
    let coinbase_b = H160::repeat_byte(0xbc);
    let mut spec = VmSpec::byzantium();
    spec.block_reward = U256::zero();
    let genesis = genesis_with(vec![], None);
    let (mut chain, _kv) = new_chain(spec, &genesis);

    // Branch A: one block.
    let block_1a = chain
        .build_block(
            coinbase_a,
            chain.head().gas_limit,
            chain.head().timestamp + 12,
            b"a".to_vec(),
            vec![],
        )
        .unwrap()
        .block;
    let hash_1a = block_1a.header.hash();
    chain.import_block(block_1a).unwrap();
    assert_eq!(chain.head().hash(), hash_1a);

    // Branch B: two blocks on top of genesis. Build against the current
    // head is not possible for a side branch, so craft 1b from 1a's shape
    // with a different coinbase by re-building before advancing.
    let genesis_header = chain.header_by_hash(chain.head().parent_hash).unwrap().unwrap();
    let mut side = chain
        .build_block(
            coinbase_b,
            genesis_header.gas_limit,
            genesis_header.timestamp + 13,
            b"b".to_vec(),
            vec![],
        )
        .unwrap()
        .block;
    side.header.parent_hash = genesis_header.hash();
    side.header.number = 1;
    // Re-derive state-dependent fields by rebuilding: the side block is
    // empty, so only the parent linkage differs; state root matches the
    // genesis-built block.
    let hash_1b = side.header.hash();
    assert_ne!(hash_1a, hash_1b);
    chain.import_block(side.clone()).unwrap();
    // Same height: the incumbent keeps the head.
    assert_eq!(chain.head().hash(), hash_1a);
    assert_eq!(chain.canonical_hash(1).unwrap(), Some(hash_1a));

    // A second block on branch B outruns branch A.
    let block_2b = {
        let parent = chain.header_by_hash(hash_1b).unwrap().unwrap();
        let mut child = side;
        child.header.parent_hash = hash_1b;
        child.header.number = 2;
        child.header.timestamp = parent.timestamp + 12;
        child.header.extra_data = b"b2".to_vec();
        child
    };
    let hash_2b = block_2b.header.hash();
    chain.import_block(block_2b).unwrap();

    assert_eq!(chain.head().hash(), hash_2b);
    assert_eq!(chain.head().number, 2);
    // The canonical index now follows branch B.
    assert_eq!(chain.canonical_hash(1).unwrap(), Some(hash_1b));
    assert_eq!(chain.canonical_hash(2).unwrap(), Some(hash_2b));
    assert_eq!(chain.get_ancestor_hash(1).unwrap(), hash_1b);
}
