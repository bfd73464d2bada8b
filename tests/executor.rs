//! Executor integration tests over the in-memory backend.

use hearth::backend::{ApplyBackend, Backend, MemoryAccount, MemoryBackend, Vicinity};
use hearth::executor::stack::{MemoryStackState, StackExecutor, StackSubstateMetadata};
use hearth::precompiles::StandardPrecompiles;
use hearth::{Config, ExitError, ExitReason, ExitSucceed};
use primitive_types::{H160, H256, U256};
use std::collections::BTreeMap;

fn vicinity() -> Vicinity {
    Vicinity {
        gas_price: U256::zero(),
        origin: H160::repeat_byte(1),
        chain_id: U256::one(),
        block_hashes: Vec::new(),
        block_number: U256::one(),
        block_coinbase: H160::repeat_byte(0xcb),
        block_timestamp: U256::from(1_600_000_000u64),
        block_difficulty: U256::from(131_072u64),
        block_randomness: None,
        block_gas_limit: U256::from(30_000_000u64),
        block_base_fee_per_gas: U256::zero(),
        blob_gas_price: None,
        blob_hashes: Vec::new(),
    }
}

fn account(balance: u64, code: &[u8]) -> MemoryAccount {
    MemoryAccount {
        balance: U256::from(balance),
        nonce: if code.is_empty() {
            U256::zero()
        } else {
            U256::one()
        },
        code: code.to_vec(),
        storage: BTreeMap::new(),
    }
}

fn run_call(
    config: &Config,
    backend: &mut MemoryBackend<'_>,
    caller: H160,
    target: H160,
    value: U256,
    data: Vec<u8>,
    gas_limit: u64,
) -> (ExitReason, Vec<u8>, u64) {
    let precompiles = StandardPrecompiles::istanbul();
    let metadata = StackSubstateMetadata::new(gas_limit, config);
    let state = MemoryStackState::new(metadata, &*backend);
    let mut executor = StackExecutor::new_with_precompiles(state, config, &precompiles);

    let (reason, output) =
        executor.transact_call(caller, target, value, data, gas_limit, Vec::new());
    let gas_used = executor.used_gas();

    let (applies, logs) = executor.into_state().deconstruct();
    backend.apply(applies, logs, !config.empty_considered_exists);
    (reason, output, gas_used)
}

#[test]
fn plain_transfer_moves_value_and_bumps_nonce() {
    let config = Config::istanbul();
    let vicinity = vicinity();
    let caller = H160::repeat_byte(1);
    let target = H160::repeat_byte(2);

    let mut state = BTreeMap::new();
    state.insert(caller, account(1_000_000, &[]));
    let mut backend = MemoryBackend::new(&vicinity, state);

    let (reason, _, gas_used) = run_call(
        &config,
        &mut backend,
        caller,
        target,
        U256::from(12_345),
        Vec::new(),
        100_000,
    );

    assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
    assert_eq!(gas_used, 21_000);
    assert_eq!(backend.basic(target).balance, U256::from(12_345));
    assert_eq!(
        backend.basic(caller).balance,
        U256::from(1_000_000 - 12_345)
    );
    assert_eq!(backend.basic(caller).nonce, U256::one());
}

#[test]
fn create_deploys_runtime_code() {
    let config = Config::istanbul();
    let vicinity = vicinity();
    let caller = H160::repeat_byte(1);

    let mut state = BTreeMap::new();
    state.insert(caller, account(1_000_000, &[]));
    let mut backend = MemoryBackend::new(&vicinity, state);

    // Init code returning the two-byte runtime `0xdead`:
    // PUSH2 0xdead, PUSH1 0, MSTORE, PUSH1 2, PUSH1 30, RETURN
    let init_code = vec![
        0x61, 0xde, 0xad, 0x60, 0x00, 0x52, 0x60, 0x02, 0x60, 0x1e, 0xf3,
    ];

    let precompiles = StandardPrecompiles::istanbul();
    let metadata = StackSubstateMetadata::new(200_000, &config);
    let state = MemoryStackState::new(metadata, &backend);
    let mut executor = StackExecutor::new_with_precompiles(state, &config, &precompiles);

    let expected = executor.create_address(hearth::CreateScheme::Legacy { caller });
    let (reason, _) =
        executor.transact_create(caller, U256::zero(), init_code, 200_000, Vec::new());
    assert!(reason.is_succeed());

    let (applies, logs) = executor.into_state().deconstruct();
    backend.apply(applies, logs, true);

    assert_eq!(backend.code(expected), vec![0xde, 0xad]);
    // EIP-161: the created account starts at nonce 1.
    assert_eq!(backend.basic(expected).nonce, U256::one());
    // The creator spent one nonce on the create itself.
    assert_eq!(backend.basic(caller).nonce, U256::one());
}

#[test]
fn callee_revert_rolls_back_but_caller_survives() {
    let config = Config::istanbul();
    let vicinity = vicinity();
    let caller = H160::repeat_byte(1);
    let callee = H160::repeat_byte(2);

    // SSTORE(0, 1) then REVERT(0, 0).
    let revert_code = vec![0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xfd];

    let mut state = BTreeMap::new();
    state.insert(caller, account(1_000_000, &[]));
    state.insert(callee, account(0, &revert_code));
    let mut backend = MemoryBackend::new(&vicinity, state);

    let (reason, _, gas_used) = run_call(
        &config,
        &mut backend,
        caller,
        callee,
        U256::zero(),
        Vec::new(),
        1_000_000,
    );

    assert!(reason.is_revert());
    assert_eq!(backend.storage(callee, H256::from_low_u64_be(0)), H256::zero());
    // Unused gas was refunded: far less than the full limit burned.
    assert!(gas_used < 50_000);
}

#[test]
fn out_of_gas_consumes_the_frame_budget() {
    let config = Config::istanbul();
    let vicinity = vicinity();
    let caller = H160::repeat_byte(1);
    let callee = H160::repeat_byte(2);

    // An infinite loop: JUMPDEST; PUSH1 0; JUMP.
    let spin = vec![0x5b, 0x60, 0x00, 0x56];

    let mut state = BTreeMap::new();
    state.insert(caller, account(1_000_000, &[]));
    state.insert(callee, account(0, &spin));
    let mut backend = MemoryBackend::new(&vicinity, state);

    let (reason, _, gas_used) = run_call(
        &config,
        &mut backend,
        caller,
        callee,
        U256::zero(),
        Vec::new(),
        50_000,
    );

    assert_eq!(reason, ExitReason::Error(ExitError::OutOfGas));
    assert_eq!(gas_used, 50_000);
}

#[test]
fn precompile_call_charges_its_gas() {
    let config = Config::istanbul();
    let vicinity = vicinity();
    let caller = H160::repeat_byte(1);
    let sha256 = H160::from_low_u64_be(2);

    let mut state = BTreeMap::new();
    state.insert(caller, account(1_000_000, &[]));
    let mut backend = MemoryBackend::new(&vicinity, state);

    let (reason, output, gas_used) = run_call(
        &config,
        &mut backend,
        caller,
        sha256,
        U256::zero(),
        b"hello".to_vec(),
        100_000,
    );

    assert!(reason.is_succeed());
    assert_eq!(
        hex::encode(&output),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
    // 21000 intrinsic + 5 non-zero calldata bytes at 16 + sha256 (60 + 12).
    assert_eq!(gas_used, 21_000 + 5 * 16 + 72);
}
