use crate::backend::Backend;
use crate::executor::stack::precompile::{PrecompileFailure, PrecompileSet};
use crate::executor::stack::tagged_runtime::{RuntimeKind, TaggedRuntime};
use crate::gasometer::{self, Gasometer, StorageTarget};
use crate::utils::U64_MAX;
use crate::{
    Capture, Config, Context, CreateScheme, ExitError, ExitFatal, ExitReason, Handler,
    InterpreterHandler, Machine, MaybeBorrowed, Opcode, Resolve, Runtime, Transfer,
};
use core::cmp::min;
use primitive_types::{H160, H256, U256};
use sha3::{Digest, Keccak256};
use std::collections::BTreeSet;
use std::rc::Rc;

const DEFAULT_CALL_STACK_CAPACITY: usize = 4;

/// How a frame left the substate stack.
pub enum StackExitKind {
    Succeeded,
    Reverted,
    Failed,
}

/// Warm addresses and storage slots of the running transaction (EIP-2929).
#[derive(Default, Clone, Debug)]
pub struct Accessed {
    pub accessed_addresses: BTreeSet<H160>,
    pub accessed_storage: BTreeSet<(H160, H256)>,
}

impl Accessed {
    pub fn access_address(&mut self, address: H160) {
        self.accessed_addresses.insert(address);
    }

    pub fn access_addresses<I>(&mut self, addresses: I)
    where
        I: Iterator<Item = H160>,
    {
        self.accessed_addresses.extend(addresses);
    }

    pub fn access_storages<I>(&mut self, storages: I)
    where
        I: Iterator<Item = (H160, H256)>,
    {
        for storage in storages {
            self.accessed_storage.insert(storage);
        }
    }
}

/// Per-frame metadata carried by each journal layer: the gasometer, the
/// static flag, the call depth and the warm sets.
#[derive(Clone, Debug)]
pub struct StackSubstateMetadata<'config> {
    gasometer: Gasometer<'config>,
    is_static: bool,
    depth: Option<usize>,
    accessed: Option<Accessed>,
}

impl<'config> StackSubstateMetadata<'config> {
    #[must_use]
    pub fn new(gas_limit: u64, config: &'config Config) -> Self {
        let accessed = if config.increase_state_access_gas {
            Some(Accessed::default())
        } else {
            None
        };
        Self {
            gasometer: Gasometer::new(gas_limit, config),
            is_static: false,
            depth: None,
            accessed,
        }
    }

    /// Merge a committed child: return its unspent gas, carry its refunds
    /// up, and keep its warmed targets warm.
    ///
    /// # Errors
    /// Gas bookkeeping.
    pub fn swallow_commit(&mut self, other: Self) -> Result<(), ExitError> {
        self.gasometer.record_stipend(other.gasometer.gas())?;
        self.gasometer
            .record_refund(other.gasometer.refunded_gas())?;

        if let (Some(mut other_accessed), Some(self_accessed)) =
            (other.accessed, self.accessed.as_mut())
        {
            self_accessed
                .accessed_addresses
                .append(&mut other_accessed.accessed_addresses);
            self_accessed
                .accessed_storage
                .append(&mut other_accessed.accessed_storage);
        }

        Ok(())
    }

    /// Merge a reverted child: only its unspent gas comes back.
    ///
    /// # Errors
    /// Gas bookkeeping.
    pub fn swallow_revert(&mut self, other: &Self) -> Result<(), ExitError> {
        self.gasometer.record_stipend(other.gasometer.gas())
    }

    /// Merge a failed child: nothing comes back.
    pub const fn swallow_discard(&self, _other: &Self) {}

    #[must_use]
    pub fn spit_child(&self, gas_limit: u64, is_static: bool) -> Self {
        Self {
            gasometer: Gasometer::new(gas_limit, self.gasometer.config()),
            is_static: is_static || self.is_static,
            depth: self.depth.map_or(Some(0), |n| Some(n + 1)),
            accessed: self.accessed.as_ref().map(|_| Accessed::default()),
        }
    }

    #[must_use]
    pub const fn gasometer(&self) -> &Gasometer<'config> {
        &self.gasometer
    }

    pub fn gasometer_mut(&mut self) -> &mut Gasometer<'config> {
        &mut self.gasometer
    }

    #[must_use]
    pub const fn is_static(&self) -> bool {
        self.is_static
    }

    #[must_use]
    pub const fn depth(&self) -> Option<usize> {
        self.depth
    }

    pub fn access_address(&mut self, address: H160) {
        if let Some(accessed) = &mut self.accessed {
            accessed.access_address(address);
        }
    }

    pub fn access_addresses<I>(&mut self, addresses: I)
    where
        I: Iterator<Item = H160>,
    {
        if let Some(accessed) = &mut self.accessed {
            accessed.access_addresses(addresses);
        }
    }

    pub fn access_storage(&mut self, address: H160, key: H256) {
        if let Some(accessed) = &mut self.accessed {
            accessed.accessed_storage.insert((address, key));
        }
    }

    pub fn access_storages<I>(&mut self, storages: I)
    where
        I: Iterator<Item = (H160, H256)>,
    {
        if let Some(accessed) = &mut self.accessed {
            accessed.access_storages(storages);
        }
    }

    #[must_use]
    pub const fn accessed(&self) -> &Option<Accessed> {
        &self.accessed
    }
}

/// The journal interface the executor drives. Implemented by
/// [`MemoryStackState`](crate::executor::stack::MemoryStackState).
pub trait StackState<'config>: Backend {
    fn metadata(&self) -> &StackSubstateMetadata<'config>;
    fn metadata_mut(&mut self) -> &mut StackSubstateMetadata<'config>;

    /// Open a checkpoint for an entered frame.
    fn enter(&mut self, gas_limit: u64, is_static: bool);
    /// # Errors
    /// Gas bookkeeping while merging.
    fn exit_commit(&mut self) -> Result<(), ExitError>;
    /// # Errors
    /// Gas bookkeeping while merging.
    fn exit_revert(&mut self) -> Result<(), ExitError>;
    /// # Errors
    /// Gas bookkeeping while merging.
    fn exit_discard(&mut self) -> Result<(), ExitError>;

    fn is_empty(&self, address: H160) -> bool;
    fn deleted(&self, address: H160) -> bool;
    fn is_created(&self, address: H160) -> bool;
    fn is_cold(&self, address: H160) -> bool;
    fn is_storage_cold(&self, address: H160, key: H256) -> bool;

    /// # Errors
    /// `MaxNonce` at the EIP-2681 limit.
    fn inc_nonce(&mut self, address: H160) -> Result<(), ExitError>;
    fn set_storage(&mut self, address: H160, key: H256, value: H256);
    fn reset_storage(&mut self, address: H160);
    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>);
    fn set_deleted(&mut self, address: H160);
    fn set_created(&mut self, address: H160);
    fn set_code(&mut self, address: H160, code: Vec<u8>);
    /// # Errors
    /// `OutOfFund`.
    fn transfer(&mut self, transfer: Transfer) -> Result<(), ExitError>;
    fn reset_balance(&mut self, address: H160);
    fn touch(&mut self, address: H160);

    /// # Errors
    /// Frame-local failures.
    fn tstore(&mut self, address: H160, index: H256, value: U256) -> Result<(), ExitError>;
    /// # Errors
    /// Frame-local failures.
    fn tload(&mut self, address: H160, index: H256) -> Result<U256, ExitError>;

    fn code_size(&self, address: H160) -> U256 {
        U256::from(self.code(address).len())
    }

    fn code_hash(&self, address: H160) -> H256 {
        H256::from_slice(Keccak256::digest(self.code(address)).as_slice())
    }
}

/// Stack-based executor over a journaled state and a precompile set.
pub struct StackExecutor<'config, 'precompiles, S, P> {
    config: &'config Config,
    state: S,
    precompile_set: &'precompiles P,
}

impl<'config, 'precompiles, S: StackState<'config>, P: PrecompileSet>
    StackExecutor<'config, 'precompiles, S, P>
{
    pub const fn config(&self) -> &'config Config {
        self.config
    }

    pub const fn precompiles(&self) -> &'precompiles P {
        self.precompile_set
    }

    /// Create a new executor with the given precompile set.
    pub const fn new_with_precompiles(
        state: S,
        config: &'config Config,
        precompile_set: &'precompiles P,
    ) -> Self {
        Self {
            config,
            state,
            precompile_set,
        }
    }

    pub const fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn into_state(self) -> S {
        self.state
    }

    /// Open a child checkpoint.
    pub fn enter_substate(&mut self, gas_limit: u64, is_static: bool) {
        self.state.enter(gas_limit, is_static);
    }

    /// Close the innermost checkpoint.
    ///
    /// # Errors
    /// Gas bookkeeping while merging.
    pub fn exit_substate(&mut self, kind: &StackExitKind) -> Result<(), ExitError> {
        match kind {
            StackExitKind::Succeeded => self.state.exit_commit(),
            StackExitKind::Reverted => self.state.exit_revert(),
            StackExitKind::Failed => self.state.exit_discard(),
        }
    }

    /// Execute a runtime until completion, running any sub-frames it opens
    /// on an explicit call stack.
    pub fn execute(&mut self, runtime: &mut Runtime) -> ExitReason {
        let mut call_stack = Vec::with_capacity(DEFAULT_CALL_STACK_CAPACITY);
        call_stack.push(TaggedRuntime {
            kind: RuntimeKind::Execute,
            inner: MaybeBorrowed::Borrowed(runtime),
        });
        let (reason, _, _) = self.execute_with_call_stack(&mut call_stack);
        reason
    }

    /// Drive the explicit call stack until the root frame finishes. Child
    /// frames are pushed when a runtime traps and popped as they exit, so
    /// frame depth never turns into Rust stack depth.
    fn execute_with_call_stack(
        &mut self,
        call_stack: &mut Vec<TaggedRuntime<'_>>,
    ) -> (ExitReason, Option<H160>, Vec<u8>) {
        // A trap resolution borrows the currently-running frame, so the new
        // child cannot be pushed while that borrow lives; it is carried one
        // loop iteration instead.
        let mut interrupt_runtime = None;
        loop {
            if let Some(rt) = interrupt_runtime.take() {
                call_stack.push(rt);
            }
            let Some(runtime) = call_stack.last_mut() else {
                return (
                    ExitReason::Fatal(ExitFatal::UnhandledInterrupt),
                    None,
                    Vec::new(),
                );
            };
            let reason = {
                match runtime.inner.run(self) {
                    Capture::Exit(reason) => reason,
                    Capture::Trap(Resolve::Call(rt)) => {
                        interrupt_runtime = Some(rt.0);
                        continue;
                    }
                    Capture::Trap(Resolve::Create(rt)) => {
                        interrupt_runtime = Some(rt.0);
                        continue;
                    }
                }
            };
            let runtime_kind = runtime.kind;
            let (reason, maybe_address, return_data) = match runtime_kind {
                RuntimeKind::Create(created_address) => self.cleanup_for_create(
                    created_address,
                    reason,
                    runtime.inner.machine().return_value(),
                ),
                RuntimeKind::Call(code_address) => {
                    let return_data = self.cleanup_for_call(
                        code_address,
                        &reason,
                        runtime.inner.machine().return_value(),
                    );
                    (reason, None, return_data)
                }
                RuntimeKind::Execute => (reason, None, runtime.inner.machine().return_value()),
            };
            call_stack.pop();

            let Some(runtime) = call_stack.last_mut() else {
                return (reason, maybe_address, return_data);
            };
            let feed_result = match runtime_kind {
                RuntimeKind::Create(_) => {
                    runtime
                        .inner
                        .finish_create(reason, maybe_address, return_data)
                }
                RuntimeKind::Call(_) | RuntimeKind::Execute => {
                    runtime.inner.finish_call(reason, return_data)
                }
            };
            if let Err(e) = feed_result {
                return (e, None, Vec::new());
            }
        }
    }

    /// Remaining gas of the innermost frame.
    pub fn gas(&self) -> u64 {
        self.state.metadata().gasometer().gas()
    }

    /// Gas used so far, with the refund cap already applied.
    pub fn used_gas(&self) -> u64 {
        let gasometer = self.state.metadata().gasometer();
        let refunded = u64::try_from(gasometer.refunded_gas()).unwrap_or_default();
        gasometer.total_used_gas()
            - min(
                gasometer.total_used_gas() / self.config.max_refund_quotient,
                refunded,
            )
    }

    /// Fee owed given the effective gas price.
    pub fn fee(&self, price: U256) -> U256 {
        U256::from(self.used_gas()).saturating_mul(price)
    }

    pub fn nonce(&self, address: H160) -> U256 {
        self.state.basic(address).nonce
    }

    /// Whether CREATE at `address` collides with existing state.
    pub fn is_create_collision(&self, address: H160) -> bool {
        self.state.code_size(address) != U256::zero() || self.nonce(address) > U256::zero()
    }

    /// Derive the target address of a create scheme.
    pub fn create_address(&self, scheme: CreateScheme) -> H160 {
        match scheme {
            CreateScheme::Create2 {
                caller,
                code_hash,
                salt,
            } => {
                let mut hasher = Keccak256::new();
                hasher.update([0xff]);
                hasher.update(&caller[..]);
                hasher.update(&salt[..]);
                hasher.update(&code_hash[..]);
                H256::from_slice(hasher.finalize().as_slice()).into()
            }
            CreateScheme::Legacy { caller } => {
                let nonce = self.nonce(caller);
                let mut stream = rlp::RlpStream::new_list(2);
                stream.append(&caller);
                stream.append(&nonce);
                H256::from_slice(Keccak256::digest(stream.out()).as_slice()).into()
            }
            CreateScheme::Fixed(address) => address,
        }
    }

    /// Warm the access-list entries of the running transaction.
    pub fn initialize_with_access_list(&mut self, access_list: Vec<(H160, Vec<H256>)>) {
        let addresses = access_list.iter().map(|(address, _)| *address);
        self.state.metadata_mut().access_addresses(addresses);

        let storage_keys = access_list
            .into_iter()
            .flat_map(|(address, keys)| keys.into_iter().map(move |key| (address, key)));
        self.state.metadata_mut().access_storages(storage_keys);
    }

    fn initialize_addresses(
        &mut self,
        caller: H160,
        address: H160,
        access_list: Vec<(H160, Vec<H256>)>,
    ) {
        if self.config.increase_state_access_gas {
            if self.config.warm_coinbase_address {
                let coinbase = self.state.block_coinbase();
                self.state
                    .metadata_mut()
                    .access_addresses([caller, address, coinbase].iter().copied());
            } else {
                self.state
                    .metadata_mut()
                    .access_addresses([caller, address].iter().copied());
            }

            self.initialize_with_access_list(access_list);
        }
    }

    fn record_create_transaction_cost(
        &mut self,
        init_code: &[u8],
        access_list: &[(H160, Vec<H256>)],
    ) -> Result<(), ExitError> {
        let transaction_cost = gasometer::create_transaction_cost(init_code, access_list);
        self.state
            .metadata_mut()
            .gasometer_mut()
            .record_transaction(transaction_cost)
    }

    fn maybe_record_init_code_cost(&mut self, init_code: &[u8]) -> Result<(), ExitError> {
        if let Some(limit) = self.config.max_initcode_size {
            if init_code.len() > limit {
                self.state.metadata_mut().gasometer_mut().fail();
                return Err(ExitError::InitCodeLimit);
            }
            return self
                .state
                .metadata_mut()
                .gasometer_mut()
                .record_cost(gasometer::init_code_cost(init_code));
        }
        Ok(())
    }

    /// Execute a create transaction.
    pub fn transact_create(
        &mut self,
        caller: H160,
        value: U256,
        init_code: Vec<u8>,
        gas_limit: u64,
        access_list: Vec<(H160, Vec<H256>)>,
    ) -> (ExitReason, Vec<u8>) {
        if self.nonce(caller) >= U64_MAX {
            return (ExitError::MaxNonce.into(), Vec::new());
        }

        let address = self.create_address(CreateScheme::Legacy { caller });

        if let Some(limit) = self.config.max_initcode_size {
            if init_code.len() > limit {
                self.state.metadata_mut().gasometer_mut().fail();
                return (ExitError::InitCodeLimit.into(), Vec::new());
            }
        }

        if let Err(e) = self.record_create_transaction_cost(&init_code, &access_list) {
            return (e.into(), Vec::new());
        }

        self.initialize_addresses(caller, address, access_list);

        match self.create_inner(
            caller,
            CreateScheme::Legacy { caller },
            value,
            init_code,
            Some(gas_limit),
            false,
        ) {
            Capture::Exit((reason, _, data)) => (reason, data),
            Capture::Trap(rt) => {
                let mut call_stack = Vec::with_capacity(DEFAULT_CALL_STACK_CAPACITY);
                call_stack.push(rt.0);
                let (reason, _, data) = self.execute_with_call_stack(&mut call_stack);
                (reason, data)
            }
        }
    }

    /// Execute a CREATE2-style create transaction (used by tests and by
    /// deployment tooling; there is no consensus transaction shape for it).
    pub fn transact_create2(
        &mut self,
        caller: H160,
        value: U256,
        init_code: Vec<u8>,
        salt: H256,
        gas_limit: u64,
        access_list: Vec<(H160, Vec<H256>)>,
    ) -> (ExitReason, Vec<u8>) {
        if let Some(limit) = self.config.max_initcode_size {
            if init_code.len() > limit {
                self.state.metadata_mut().gasometer_mut().fail();
                return (ExitError::InitCodeLimit.into(), Vec::new());
            }
        }

        let code_hash = H256::from_slice(Keccak256::digest(&init_code).as_slice());
        let scheme = CreateScheme::Create2 {
            caller,
            code_hash,
            salt,
        };
        let address = self.create_address(scheme);

        if let Err(e) = self.record_create_transaction_cost(&init_code, &access_list) {
            return (e.into(), Vec::new());
        }

        self.initialize_addresses(caller, address, access_list);

        match self.create_inner(caller, scheme, value, init_code, Some(gas_limit), false) {
            Capture::Exit((reason, _, data)) => (reason, data),
            Capture::Trap(rt) => {
                let mut call_stack = Vec::with_capacity(DEFAULT_CALL_STACK_CAPACITY);
                call_stack.push(rt.0);
                let (reason, _, data) = self.execute_with_call_stack(&mut call_stack);
                (reason, data)
            }
        }
    }

    /// Execute a message-call transaction.
    pub fn transact_call(
        &mut self,
        caller: H160,
        address: H160,
        value: U256,
        data: Vec<u8>,
        gas_limit: u64,
        access_list: Vec<(H160, Vec<H256>)>,
    ) -> (ExitReason, Vec<u8>) {
        if self.nonce(caller) >= U64_MAX {
            return (ExitError::MaxNonce.into(), Vec::new());
        }

        let transaction_cost = gasometer::call_transaction_cost(&data, &access_list);
        if let Err(e) = self
            .state
            .metadata_mut()
            .gasometer_mut()
            .record_transaction(transaction_cost)
        {
            return (e.into(), Vec::new());
        }

        self.initialize_addresses(caller, address, access_list);

        if let Err(e) = self.state.inc_nonce(caller) {
            return (e.into(), Vec::new());
        }

        let context = Context {
            caller,
            address,
            apparent_value: value,
        };

        match self.call_inner(
            address,
            Some(Transfer {
                source: caller,
                target: address,
                value,
            }),
            data,
            Some(gas_limit),
            false,
            false,
            false,
            context,
        ) {
            Capture::Exit((reason, data)) => (reason, data),
            Capture::Trap(rt) => {
                let mut call_stack = Vec::with_capacity(DEFAULT_CALL_STACK_CAPACITY);
                call_stack.push(rt.0);
                let (reason, _, data) = self.execute_with_call_stack(&mut call_stack);
                (reason, data)
            }
        }
    }

    fn create_inner(
        &mut self,
        caller: H160,
        scheme: CreateScheme,
        value: U256,
        init_code: Vec<u8>,
        target_gas: Option<u64>,
        take_l64: bool,
    ) -> Capture<(ExitReason, Option<H160>, Vec<u8>), StackExecutorCreateInterrupt<'static>> {
        const fn l64(gas: u64) -> u64 {
            gas - gas / 64
        }

        macro_rules! try_or_fail {
            ( $e:expr ) => {
                match $e {
                    Ok(v) => v,
                    Err(e) => return Capture::Exit((e.into(), None, Vec::new())),
                }
            };
        }

        if self.nonce(caller) >= U64_MAX {
            return Capture::Exit((ExitError::MaxNonce.into(), None, Vec::new()));
        }

        let address = self.create_address(scheme);

        self.state
            .metadata_mut()
            .access_addresses([caller, address].iter().copied());

        log::debug!(target: "evm", "create of {address:?} from {caller:?}, scheme {scheme:?}");

        if let Some(depth) = self.state.metadata().depth() {
            // Depth is bumped in enter_substate, so check one early; a
            // CREATE at the limit must fail before the transfer happens.
            if depth + 1 > self.config.call_stack_limit {
                return Capture::Exit((ExitError::CallTooDeep.into(), None, Vec::new()));
            }
        }

        if self.balance(caller) < value {
            return Capture::Exit((ExitError::OutOfFund.into(), None, Vec::new()));
        }

        let after_gas = if take_l64 && self.config.call_l64_after_gas {
            if self.config.estimate {
                let initial_after_gas = self.state.metadata().gasometer().gas();
                let diff = initial_after_gas - l64(initial_after_gas);
                try_or_fail!(self
                    .state
                    .metadata_mut()
                    .gasometer_mut()
                    .record_cost(diff));
                self.state.metadata().gasometer().gas()
            } else {
                l64(self.state.metadata().gasometer().gas())
            }
        } else {
            self.state.metadata().gasometer().gas()
        };

        let target_gas = target_gas.unwrap_or(after_gas);
        let gas_limit = min(after_gas, target_gas);
        try_or_fail!(self
            .state
            .metadata_mut()
            .gasometer_mut()
            .record_cost(gas_limit));

        if let Err(e) = self.state.inc_nonce(caller) {
            return Capture::Exit((e.into(), None, Vec::new()));
        }

        self.enter_substate(gas_limit, false);

        if self.is_create_collision(address) {
            let _ = self.exit_substate(&StackExitKind::Failed);
            return Capture::Exit((ExitError::CreateCollision.into(), None, Vec::new()));
        }

        let context = Context {
            address,
            caller,
            apparent_value: value,
        };
        let transfer = Transfer {
            source: caller,
            target: address,
            value,
        };
        if let Err(e) = self.state.transfer(transfer) {
            let _ = self.exit_substate(&StackExitKind::Reverted);
            return Capture::Exit((ExitReason::Error(e), None, Vec::new()));
        }

        // EIP-6780 needs to know the account was created in this
        // transaction to allow its SELFDESTRUCT.
        self.state.set_created(address);

        if self.config.create_increase_nonce {
            if let Err(e) = self.state.inc_nonce(address) {
                return Capture::Exit((e.into(), None, Vec::new()));
            }
        }

        let runtime = Runtime::new(
            Rc::new(init_code),
            Rc::new(Vec::new()),
            context,
            self.config.stack_limit,
            self.config.memory_limit,
        );

        Capture::Trap(StackExecutorCreateInterrupt(TaggedRuntime {
            kind: RuntimeKind::Create(address),
            inner: MaybeBorrowed::Owned(runtime),
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn call_inner(
        &mut self,
        code_address: H160,
        transfer: Option<Transfer>,
        input: Vec<u8>,
        target_gas: Option<u64>,
        is_static: bool,
        take_l64: bool,
        take_stipend: bool,
        context: Context,
    ) -> Capture<(ExitReason, Vec<u8>), StackExecutorCallInterrupt<'static>> {
        const fn l64(gas: u64) -> u64 {
            gas - gas / 64
        }

        macro_rules! try_or_fail {
            ( $e:expr ) => {
                match $e {
                    Ok(v) => v,
                    Err(e) => return Capture::Exit((e.into(), Vec::new())),
                }
            };
        }

        log::debug!(target: "evm", "call to {code_address:?}, is_static {is_static}");

        let after_gas = if take_l64 && self.config.call_l64_after_gas {
            if self.config.estimate {
                let initial_after_gas = self.state.metadata().gasometer().gas();
                let diff = initial_after_gas - l64(initial_after_gas);
                try_or_fail!(self
                    .state
                    .metadata_mut()
                    .gasometer_mut()
                    .record_cost(diff));
                self.state.metadata().gasometer().gas()
            } else {
                l64(self.state.metadata().gasometer().gas())
            }
        } else {
            self.state.metadata().gasometer().gas()
        };

        let target_gas = target_gas.unwrap_or(after_gas);
        let mut gas_limit = min(target_gas, after_gas);

        try_or_fail!(self
            .state
            .metadata_mut()
            .gasometer_mut()
            .record_cost(gas_limit));

        if let Some(transfer) = transfer.as_ref() {
            if take_stipend && transfer.value != U256::zero() {
                gas_limit = gas_limit.saturating_add(self.config.call_stipend);
            }
        }

        let code = self.code(code_address);

        self.enter_substate(gas_limit, is_static);
        self.state.touch(context.address);

        if let Some(depth) = self.state.metadata().depth() {
            if depth > self.config.call_stack_limit {
                let _ = self.exit_substate(&StackExitKind::Reverted);
                return Capture::Exit((ExitError::CallTooDeep.into(), Vec::new()));
            }
        }

        if let Some(transfer) = transfer {
            if let Err(e) = self.state.transfer(transfer) {
                let _ = self.exit_substate(&StackExitKind::Reverted);
                return Capture::Exit((ExitReason::Error(e), Vec::new()));
            }
        }

        // The substate now reflects the static flag of both this call and
        // its ancestors.
        let precompile_is_static = self.state.metadata().is_static();
        if let Some(result) = self.precompile_set.execute(
            code_address,
            &input,
            Some(gas_limit),
            &context,
            precompile_is_static,
        ) {
            return match result {
                Ok(output) => {
                    if let Err(e) = self
                        .state
                        .metadata_mut()
                        .gasometer_mut()
                        .record_cost(output.cost)
                    {
                        let _ = self.exit_substate(&StackExitKind::Failed);
                        return Capture::Exit((ExitReason::Error(e), Vec::new()));
                    }
                    for log in output.logs {
                        self.state.log(log.address, log.topics, log.data);
                    }
                    let _ = self.exit_substate(&StackExitKind::Succeeded);
                    Capture::Exit((ExitReason::Succeed(output.exit_status), output.output))
                }
                Err(PrecompileFailure::Error { exit_status }) => {
                    let _ = self.exit_substate(&StackExitKind::Failed);
                    Capture::Exit((ExitReason::Error(exit_status), Vec::new()))
                }
                Err(PrecompileFailure::Revert {
                    exit_status,
                    output,
                    cost,
                }) => {
                    let _ = self
                        .state
                        .metadata_mut()
                        .gasometer_mut()
                        .record_cost(cost);
                    let _ = self.exit_substate(&StackExitKind::Reverted);
                    Capture::Exit((ExitReason::Revert(exit_status), output))
                }
                Err(PrecompileFailure::Fatal { exit_status }) => {
                    self.state.metadata_mut().gasometer_mut().fail();
                    let _ = self.exit_substate(&StackExitKind::Failed);
                    Capture::Exit((ExitReason::Fatal(exit_status), Vec::new()))
                }
            };
        }

        let runtime = Runtime::new(
            Rc::new(code),
            Rc::new(input),
            context,
            self.config.stack_limit,
            self.config.memory_limit,
        );

        Capture::Trap(StackExecutorCallInterrupt(TaggedRuntime {
            kind: RuntimeKind::Call(code_address),
            inner: MaybeBorrowed::Owned(runtime),
        }))
    }

    fn cleanup_for_create(
        &mut self,
        created_address: H160,
        reason: ExitReason,
        return_data: Vec<u8>,
    ) -> (ExitReason, Option<H160>, Vec<u8>) {
        fn check_first_byte(config: &Config, code: &[u8]) -> Result<(), ExitError> {
            if config.disallow_executable_format
                && code.first() == Some(&Opcode::EOFMAGIC.as_u8())
            {
                return Err(ExitError::CreateContractStartsWithEf);
            }
            Ok(())
        }

        log::debug!(target: "evm", "create at {created_address:?} exited: {reason:?}");

        match reason {
            ExitReason::Succeed(s) => {
                let out = return_data;

                if let Err(e) = check_first_byte(self.config, &out) {
                    self.state.metadata_mut().gasometer_mut().fail();
                    let _ = self.exit_substate(&StackExitKind::Failed);
                    return (e.into(), None, Vec::new());
                }

                if let Some(limit) = self.config.create_contract_limit {
                    if out.len() > limit {
                        self.state.metadata_mut().gasometer_mut().fail();
                        let _ = self.exit_substate(&StackExitKind::Failed);
                        return (ExitError::CreateContractLimit.into(), None, Vec::new());
                    }
                }

                match self
                    .state
                    .metadata_mut()
                    .gasometer_mut()
                    .record_deposit(out.len())
                {
                    Ok(()) => {
                        let exit_result = self.exit_substate(&StackExitKind::Succeeded);
                        self.state.set_code(created_address, out);
                        if let Err(e) = exit_result {
                            return (e.into(), None, Vec::new());
                        }
                        (ExitReason::Succeed(s), Some(created_address), Vec::new())
                    }
                    Err(e) => {
                        let _ = self.exit_substate(&StackExitKind::Failed);
                        (ExitReason::Error(e), None, Vec::new())
                    }
                }
            }
            ExitReason::Error(e) => {
                self.state.metadata_mut().gasometer_mut().fail();
                let _ = self.exit_substate(&StackExitKind::Failed);
                (ExitReason::Error(e), None, Vec::new())
            }
            ExitReason::Revert(e) => {
                let _ = self.exit_substate(&StackExitKind::Reverted);
                (ExitReason::Revert(e), None, return_data)
            }
            ExitReason::Fatal(e) => {
                self.state.metadata_mut().gasometer_mut().fail();
                let _ = self.exit_substate(&StackExitKind::Failed);
                (ExitReason::Fatal(e), None, Vec::new())
            }
        }
    }

    fn cleanup_for_call(
        &mut self,
        code_address: H160,
        reason: &ExitReason,
        return_data: Vec<u8>,
    ) -> Vec<u8> {
        log::debug!(target: "evm", "call at {code_address:?} exited: {reason:?}");
        match reason {
            ExitReason::Succeed(_) => {
                let _ = self.exit_substate(&StackExitKind::Succeeded);
                return_data
            }
            ExitReason::Error(_) => {
                let _ = self.exit_substate(&StackExitKind::Failed);
                Vec::new()
            }
            ExitReason::Revert(_) => {
                let _ = self.exit_substate(&StackExitKind::Reverted);
                return_data
            }
            ExitReason::Fatal(_) => {
                self.state.metadata_mut().gasometer_mut().fail();
                let _ = self.exit_substate(&StackExitKind::Failed);
                Vec::new()
            }
        }
    }
}

impl<'config, 'precompiles, S: StackState<'config>, P: PrecompileSet> InterpreterHandler
    for StackExecutor<'config, 'precompiles, S, P>
{
    #[inline]
    fn before_bytecode(
        &mut self,
        opcode: Opcode,
        _pc: usize,
        machine: &Machine,
        address: &H160,
    ) -> Result<(), ExitError> {
        if let Some(cost) = gasometer::static_opcode_cost(opcode) {
            self.state
                .metadata_mut()
                .gasometer_mut()
                .record_cost(cost)?;
        } else {
            let is_static = self.state.metadata().is_static();
            let (gas_cost, target, memory_cost) = gasometer::dynamic_opcode_cost(
                *address,
                opcode,
                machine.stack(),
                is_static,
                self.config,
                self,
            )?;

            self.state
                .metadata_mut()
                .gasometer_mut()
                .record_dynamic_cost(gas_cost, memory_cost)?;
            match target {
                StorageTarget::Address(address) => {
                    self.state.metadata_mut().access_address(address);
                }
                StorageTarget::Slot(address, key) => {
                    self.state.metadata_mut().access_storage(address, key);
                }
                StorageTarget::None => (),
            }
        }
        Ok(())
    }
}

pub struct StackExecutorCallInterrupt<'borrow>(TaggedRuntime<'borrow>);

pub struct StackExecutorCreateInterrupt<'borrow>(TaggedRuntime<'borrow>);

impl<'config, 'precompiles, S: StackState<'config>, P: PrecompileSet> Handler
    for StackExecutor<'config, 'precompiles, S, P>
{
    type CreateInterrupt = StackExecutorCreateInterrupt<'static>;
    type CallInterrupt = StackExecutorCallInterrupt<'static>;

    fn balance(&self, address: H160) -> U256 {
        self.state.basic(address).balance
    }

    fn code_size(&self, address: H160) -> U256 {
        self.state.code_size(address)
    }

    fn code_hash(&self, address: H160) -> H256 {
        if !self.exists(address) {
            return H256::default();
        }
        self.state.code_hash(address)
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.state.code(address)
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        self.state.storage(address, index)
    }

    fn original_storage(&self, address: H160, index: H256) -> H256 {
        self.state
            .original_storage(address, index)
            .unwrap_or_default()
    }

    fn is_empty_storage(&self, address: H160) -> bool {
        self.state.is_empty(address)
    }

    fn exists(&self, address: H160) -> bool {
        if self.config.empty_considered_exists {
            self.state.exists(address)
        } else {
            self.state.exists(address) && !self.state.is_empty(address)
        }
    }

    fn deleted(&self, address: H160) -> bool {
        self.state.deleted(address)
    }

    fn is_cold(&mut self, address: H160, maybe_index: Option<H256>) -> Result<bool, ExitError> {
        Ok(match maybe_index {
            None => !self.precompile_set.is_precompile(address) && self.state.is_cold(address),
            Some(index) => self.state.is_storage_cold(address, index),
        })
    }

    fn gas_left(&self) -> U256 {
        U256::from(self.state.metadata().gasometer().gas())
    }

    fn gas_price(&self) -> U256 {
        self.state.gas_price()
    }

    fn origin(&self) -> H160 {
        self.state.origin()
    }

    fn block_hash(&self, number: U256) -> H256 {
        self.state.block_hash(number)
    }

    fn block_number(&self) -> U256 {
        self.state.block_number()
    }

    fn block_coinbase(&self) -> H160 {
        self.state.block_coinbase()
    }

    fn block_timestamp(&self) -> U256 {
        self.state.block_timestamp()
    }

    fn block_difficulty(&self) -> U256 {
        self.state.block_difficulty()
    }

    fn block_randomness(&self) -> Option<H256> {
        self.state.block_randomness()
    }

    fn block_gas_limit(&self) -> U256 {
        self.state.block_gas_limit()
    }

    fn block_base_fee_per_gas(&self) -> U256 {
        self.state.block_base_fee_per_gas()
    }

    fn blob_base_fee(&self) -> Option<u128> {
        if self.config.has_blob_base_fee {
            self.state.blob_gas_price()
        } else {
            None
        }
    }

    fn get_blob_hash(&self, index: usize) -> Option<U256> {
        if self.config.has_shard_blob_transactions {
            self.state.get_blob_hash(index)
        } else {
            None
        }
    }

    fn chain_id(&self) -> U256 {
        self.state.chain_id()
    }

    fn set_storage(&mut self, address: H160, index: H256, value: H256) -> Result<(), ExitError> {
        self.state.set_storage(address, index, value);
        Ok(())
    }

    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) -> Result<(), ExitError> {
        self.state.log(address, topics, data);
        Ok(())
    }

    fn mark_delete(&mut self, address: H160, target: H160) -> Result<(), ExitError> {
        if self.config.has_restricted_selfdestruct
            && !self.state.is_created(address)
            && address == target
        {
            // EIP-6780: a pre-existing contract destructing to itself keeps
            // its balance and survives.
            return Ok(());
        }

        let balance = self.balance(address);

        self.state.transfer(Transfer {
            source: address,
            target,
            value: balance,
        })?;
        self.state.reset_balance(address);

        if !self.config.has_restricted_selfdestruct || self.state.is_created(address) {
            self.state.set_deleted(address);
        }

        Ok(())
    }

    fn tstore(&mut self, address: H160, index: H256, value: U256) -> Result<(), ExitError> {
        if self.config.has_transient_storage {
            self.state.tstore(address, index, value)
        } else {
            Err(ExitError::InvalidInstruction(Opcode::TSTORE))
        }
    }

    fn tload(&mut self, address: H160, index: H256) -> Result<U256, ExitError> {
        if self.config.has_transient_storage {
            self.state.tload(address, index)
        } else {
            Err(ExitError::InvalidInstruction(Opcode::TLOAD))
        }
    }

    fn create(
        &mut self,
        caller: H160,
        scheme: CreateScheme,
        value: U256,
        init_code: Vec<u8>,
        target_gas: Option<u64>,
    ) -> Capture<(ExitReason, Option<H160>, Vec<u8>), Self::CreateInterrupt> {
        if let Err(e) = self.maybe_record_init_code_cost(&init_code) {
            return Capture::Exit((e.into(), None, Vec::new()));
        }
        self.create_inner(caller, scheme, value, init_code, target_gas, true)
    }

    fn call(
        &mut self,
        code_address: H160,
        transfer: Option<Transfer>,
        input: Vec<u8>,
        target_gas: Option<u64>,
        is_static: bool,
        context: Context,
    ) -> Capture<(ExitReason, Vec<u8>), Self::CallInterrupt> {
        self.call_inner(
            code_address,
            transfer,
            input,
            target_gas,
            is_static,
            true,
            true,
            context,
        )
    }
}
