use crate::backend::{Apply, ApplyBackend, Backend, Basic, Log};
use crate::executor::stack::executor::{StackState, StackSubstateMetadata};
use crate::{ExitError, Transfer};
use core::mem;
use primitive_types::{H160, H256, U256};
use std::collections::{BTreeMap, BTreeSet};

/// Journal entry for one account inside a substate.
#[derive(Clone, Debug)]
pub struct MemoryStackAccount {
    pub basic: Basic,
    pub code: Option<Vec<u8>>,
    pub reset: bool,
}

/// One journal layer. `enter` pushes a fresh layer whose parent is the
/// previous one; `exit_commit` folds a layer into its parent and
/// `exit_revert`/`exit_discard` drop it, which is exactly the
/// checkpoint/commit/revert contract of the state journal.
pub struct MemoryStackSubstate<'config> {
    metadata: StackSubstateMetadata<'config>,
    parent: Option<Box<MemoryStackSubstate<'config>>>,
    logs: Vec<Log>,
    accounts: BTreeMap<H160, MemoryStackAccount>,
    storages: BTreeMap<(H160, H256), H256>,
    tstorages: BTreeMap<(H160, H256), U256>,
    deletes: BTreeSet<H160>,
    creates: BTreeSet<H160>,
}

impl<'config> MemoryStackSubstate<'config> {
    #[must_use]
    pub const fn new(metadata: StackSubstateMetadata<'config>) -> Self {
        Self {
            metadata,
            parent: None,
            logs: Vec::new(),
            accounts: BTreeMap::new(),
            storages: BTreeMap::new(),
            tstorages: BTreeMap::new(),
            deletes: BTreeSet::new(),
            creates: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn metadata(&self) -> &StackSubstateMetadata<'config> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut StackSubstateMetadata<'config> {
        &mut self.metadata
    }

    #[must_use]
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Turn the root substate into the change-set to apply to a backend.
    ///
    /// # Panics
    /// If called on a non-root substate.
    #[must_use]
    pub fn deconstruct(
        self,
    ) -> (
        Vec<Apply<BTreeMap<H256, H256>>>,
        Vec<Log>,
    ) {
        assert!(
            self.parent.is_none(),
            "deconstruct is only valid on the root substate"
        );

        let mut applies = Vec::<Apply<BTreeMap<H256, H256>>>::new();

        let mut addresses = BTreeSet::new();
        for address in self.accounts.keys() {
            addresses.insert(*address);
        }
        for (address, _) in self.storages.keys() {
            addresses.insert(*address);
        }

        for address in addresses {
            if self.deletes.contains(&address) {
                continue;
            }

            let mut storage = BTreeMap::new();
            for ((storage_address, key), value) in &self.storages {
                if *storage_address == address {
                    storage.insert(*key, *value);
                }
            }

            let account = self.accounts.get(&address);
            let (basic, code, reset) = match account {
                Some(account) => (
                    account.basic.clone(),
                    account.code.clone(),
                    account.reset,
                ),
                None => (Basic::default(), None, false),
            };

            applies.push(Apply::Modify {
                address,
                basic,
                code,
                storage,
                reset_storage: reset,
            });
        }

        for address in self.deletes {
            applies.push(Apply::Delete { address });
        }

        (applies, self.logs)
    }

    /// Push a new journal layer for an entered frame.
    pub fn enter(&mut self, gas_limit: u64, is_static: bool) {
        let mut entering = Self::new(self.metadata.spit_child(gas_limit, is_static));
        mem::swap(&mut entering, self);
        self.parent = Some(Box::new(entering));
    }

    /// Fold the current layer into its parent.
    ///
    /// # Errors
    /// Gas bookkeeping while merging.
    ///
    /// # Panics
    /// If called on the root substate.
    pub fn exit_commit(&mut self) -> Result<(), ExitError> {
        let mut exited = *self.parent.take().expect("cannot exit the root substate");
        mem::swap(&mut exited, self);

        self.metadata.swallow_commit(exited.metadata)?;
        self.logs.append(&mut exited.logs);
        self.deletes.append(&mut exited.deletes);
        self.creates.append(&mut exited.creates);
        self.accounts.append(&mut exited.accounts);
        self.storages.append(&mut exited.storages);
        self.tstorages.append(&mut exited.tstorages);

        Ok(())
    }

    /// Drop the current layer, returning remaining child gas to the parent.
    ///
    /// # Errors
    /// Gas bookkeeping while merging.
    ///
    /// # Panics
    /// If called on the root substate.
    pub fn exit_revert(&mut self) -> Result<(), ExitError> {
        let mut exited = *self.parent.take().expect("cannot exit the root substate");
        mem::swap(&mut exited, self);

        self.metadata.swallow_revert(&exited.metadata)?;
        Ok(())
    }

    /// Drop the current layer without returning anything.
    ///
    /// # Errors
    /// Gas bookkeeping while merging.
    ///
    /// # Panics
    /// If called on the root substate.
    pub fn exit_discard(&mut self) -> Result<(), ExitError> {
        let mut exited = *self.parent.take().expect("cannot exit the root substate");
        mem::swap(&mut exited, self);

        self.metadata.swallow_discard(&exited.metadata);
        Ok(())
    }

    #[must_use]
    pub fn known_account(&self, address: H160) -> Option<&MemoryStackAccount> {
        if let Some(account) = self.accounts.get(&address) {
            Some(account)
        } else if let Some(parent) = self.parent.as_ref() {
            parent.known_account(address)
        } else {
            None
        }
    }

    #[must_use]
    pub fn known_basic(&self, address: H160) -> Option<Basic> {
        self.known_account(address).map(|acc| acc.basic.clone())
    }

    #[must_use]
    pub fn known_code(&self, address: H160) -> Option<Vec<u8>> {
        self.known_account(address).and_then(|acc| acc.code.clone())
    }

    #[must_use]
    pub fn known_empty(&self, address: H160) -> Option<bool> {
        if let Some(account) = self.known_account(address) {
            if account.basic.balance != U256::zero() || account.basic.nonce != U256::zero() {
                return Some(false);
            }
            if let Some(code) = &account.code {
                return Some(code.is_empty());
            }
        }
        None
    }

    #[must_use]
    pub fn known_storage(&self, address: H160, key: H256) -> Option<H256> {
        if let Some(value) = self.storages.get(&(address, key)) {
            return Some(*value);
        }
        if let Some(account) = self.accounts.get(&address) {
            if account.reset {
                return Some(H256::default());
            }
        }
        if let Some(parent) = self.parent.as_ref() {
            return parent.known_storage(address, key);
        }
        None
    }

    /// Storage at transaction start; `Some(zero)` after a storage reset.
    #[must_use]
    pub fn known_original_storage(&self, address: H160) -> Option<H256> {
        if let Some(account) = self.accounts.get(&address) {
            if account.reset {
                return Some(H256::default());
            }
        }
        if let Some(parent) = self.parent.as_ref() {
            return parent.known_original_storage(address);
        }
        None
    }

    #[must_use]
    pub fn deleted(&self, address: H160) -> bool {
        if self.deletes.contains(&address) {
            return true;
        }
        if let Some(parent) = self.parent.as_ref() {
            return parent.deleted(address);
        }
        false
    }

    #[must_use]
    pub fn created(&self, address: H160) -> bool {
        if self.creates.contains(&address) {
            return true;
        }
        if let Some(parent) = self.parent.as_ref() {
            return parent.created(address);
        }
        false
    }

    fn recursive_is_cold<F: Fn(&crate::executor::stack::Accessed) -> bool>(
        &self,
        f: &F,
    ) -> bool {
        let local_is_accessed = self
            .metadata
            .accessed()
            .as_ref()
            .map(|accessed| f(accessed))
            .unwrap_or(false);
        if local_is_accessed {
            false
        } else {
            self.parent
                .as_ref()
                .map_or(true, |parent| parent.recursive_is_cold(f))
        }
    }

    #[must_use]
    pub fn is_cold(&self, address: H160) -> bool {
        self.recursive_is_cold(&|accessed| accessed.accessed_addresses.contains(&address))
    }

    #[must_use]
    pub fn is_storage_cold(&self, address: H160, key: H256) -> bool {
        self.recursive_is_cold(&|accessed| accessed.accessed_storage.contains(&(address, key)))
    }

    fn account_mut<B: Backend>(&mut self, address: H160, backend: &B) -> &mut MemoryStackAccount {
        if !self.accounts.contains_key(&address) {
            let account = self.known_account(address).cloned().unwrap_or_else(|| {
                MemoryStackAccount {
                    basic: backend.basic(address),
                    code: None,
                    reset: false,
                }
            });
            self.accounts.insert(address, account);
        }

        self.accounts
            .get_mut(&address)
            .expect("entry was just ensured")
    }

    /// # Errors
    /// `MaxNonce` at the EIP-2681 limit.
    pub fn inc_nonce<B: Backend>(&mut self, address: H160, backend: &B) -> Result<(), ExitError> {
        let nonce = &mut self.account_mut(address, backend).basic.nonce;
        if *nonce >= U256::from(u64::MAX) {
            return Err(ExitError::MaxNonce);
        }
        *nonce += U256::one();
        Ok(())
    }

    pub fn set_storage(&mut self, address: H160, key: H256, value: H256) {
        self.storages.insert((address, key), value);
    }

    pub fn reset_storage<B: Backend>(&mut self, address: H160, backend: &B) {
        let mut removing = Vec::new();
        for (address2, key) in self.storages.keys() {
            if *address2 == address {
                removing.push(*key);
            }
        }
        for key in removing {
            self.storages.remove(&(address, key));
        }

        self.account_mut(address, backend).reset = true;
    }

    pub fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) {
        self.logs.push(Log {
            address,
            topics,
            data,
        });
    }

    pub fn set_deleted(&mut self, address: H160) {
        self.deletes.insert(address);
    }

    pub fn set_created(&mut self, address: H160) {
        self.creates.insert(address);
    }

    pub fn set_code<B: Backend>(&mut self, address: H160, code: Vec<u8>, backend: &B) {
        self.account_mut(address, backend).code = Some(code);
    }

    /// # Errors
    /// `OutOfFund` when the source balance does not cover the transfer.
    pub fn transfer<B: Backend>(
        &mut self,
        transfer: &Transfer,
        backend: &B,
    ) -> Result<(), ExitError> {
        {
            let source = self.account_mut(transfer.source, backend);
            if source.basic.balance < transfer.value {
                return Err(ExitError::OutOfFund);
            }
            source.basic.balance -= transfer.value;
        }
        {
            let target = self.account_mut(transfer.target, backend);
            target.basic.balance += transfer.value;
        }
        Ok(())
    }

    /// # Errors
    /// `OutOfFund` when the balance does not cover the withdrawal.
    pub fn withdraw<B: Backend>(
        &mut self,
        address: H160,
        value: U256,
        backend: &B,
    ) -> Result<(), ExitError> {
        let account = self.account_mut(address, backend);
        if account.basic.balance < value {
            return Err(ExitError::OutOfFund);
        }
        account.basic.balance -= value;
        Ok(())
    }

    pub fn deposit<B: Backend>(&mut self, address: H160, value: U256, backend: &B) {
        self.account_mut(address, backend).basic.balance += value;
    }

    pub fn reset_balance<B: Backend>(&mut self, address: H160, backend: &B) {
        self.account_mut(address, backend).basic.balance = U256::zero();
    }

    pub fn touch<B: Backend>(&mut self, address: H160, backend: &B) {
        let _ = self.account_mut(address, backend);
    }

    pub fn set_tstorage(&mut self, address: H160, key: H256, value: U256) {
        self.tstorages.insert((address, key), value);
    }

    #[must_use]
    pub fn known_tstorage(&self, address: H160, key: H256) -> Option<U256> {
        if let Some(value) = self.tstorages.get(&(address, key)) {
            return Some(*value);
        }
        if let Some(parent) = self.parent.as_ref() {
            return parent.known_tstorage(address, key);
        }
        None
    }
}

/// A journal stacked over a read-only [`Backend`]: the standard
/// [`StackState`] implementation.
pub struct MemoryStackState<'backend, 'config, B> {
    backend: &'backend B,
    substate: MemoryStackSubstate<'config>,
}

impl<'backend, 'config, B: Backend> MemoryStackState<'backend, 'config, B> {
    #[must_use]
    pub const fn new(metadata: StackSubstateMetadata<'config>, backend: &'backend B) -> Self {
        Self {
            backend,
            substate: MemoryStackSubstate::new(metadata),
        }
    }

    #[must_use]
    pub const fn backend(&self) -> &'backend B {
        self.backend
    }

    #[must_use]
    pub const fn substate(&self) -> &MemoryStackSubstate<'config> {
        &self.substate
    }

    /// Split into the change-set and logs to feed an [`ApplyBackend`].
    #[must_use]
    pub fn deconstruct(
        self,
    ) -> (
        Vec<Apply<BTreeMap<H256, H256>>>,
        Vec<Log>,
    ) {
        self.substate.deconstruct()
    }

    /// Apply the accumulated changes to a mutable clone of the backend.
    pub fn apply_to<A: ApplyBackend>(self, backend: &mut A, delete_empty: bool) {
        let (applies, logs) = self.deconstruct();
        backend.apply(applies, logs, delete_empty);
    }

    /// # Errors
    /// `OutOfFund` when the balance does not cover the withdrawal.
    pub fn withdraw(&mut self, address: H160, value: U256) -> Result<(), ExitError> {
        self.substate.withdraw(address, value, self.backend)
    }

    pub fn deposit(&mut self, address: H160, value: U256) {
        self.substate.deposit(address, value, self.backend);
    }
}

impl<'backend, 'config, B: Backend> Backend for MemoryStackState<'backend, 'config, B> {
    fn gas_price(&self) -> U256 {
        self.backend.gas_price()
    }

    fn origin(&self) -> H160 {
        self.backend.origin()
    }

    fn block_hash(&self, number: U256) -> H256 {
        self.backend.block_hash(number)
    }

    fn block_number(&self) -> U256 {
        self.backend.block_number()
    }

    fn block_coinbase(&self) -> H160 {
        self.backend.block_coinbase()
    }

    fn block_timestamp(&self) -> U256 {
        self.backend.block_timestamp()
    }

    fn block_difficulty(&self) -> U256 {
        self.backend.block_difficulty()
    }

    fn block_randomness(&self) -> Option<H256> {
        self.backend.block_randomness()
    }

    fn block_gas_limit(&self) -> U256 {
        self.backend.block_gas_limit()
    }

    fn block_base_fee_per_gas(&self) -> U256 {
        self.backend.block_base_fee_per_gas()
    }

    fn blob_gas_price(&self) -> Option<u128> {
        self.backend.blob_gas_price()
    }

    fn get_blob_hash(&self, index: usize) -> Option<U256> {
        self.backend.get_blob_hash(index)
    }

    fn chain_id(&self) -> U256 {
        self.backend.chain_id()
    }

    fn exists(&self, address: H160) -> bool {
        self.substate.known_account(address).is_some() || self.backend.exists(address)
    }

    fn basic(&self, address: H160) -> Basic {
        self.substate
            .known_basic(address)
            .unwrap_or_else(|| self.backend.basic(address))
    }

    fn code(&self, address: H160) -> Vec<u8> {
        self.substate
            .known_code(address)
            .unwrap_or_else(|| self.backend.code(address))
    }

    fn storage(&self, address: H160, index: H256) -> H256 {
        self.substate
            .known_storage(address, index)
            .unwrap_or_else(|| self.backend.storage(address, index))
    }

    fn original_storage(&self, address: H160, index: H256) -> Option<H256> {
        if let Some(value) = self.substate.known_original_storage(address) {
            return Some(value);
        }
        self.backend.original_storage(address, index)
    }
}

impl<'backend, 'config, B: Backend> StackState<'config>
    for MemoryStackState<'backend, 'config, B>
{
    fn metadata(&self) -> &StackSubstateMetadata<'config> {
        self.substate.metadata()
    }

    fn metadata_mut(&mut self) -> &mut StackSubstateMetadata<'config> {
        self.substate.metadata_mut()
    }

    fn enter(&mut self, gas_limit: u64, is_static: bool) {
        self.substate.enter(gas_limit, is_static);
    }

    fn exit_commit(&mut self) -> Result<(), ExitError> {
        self.substate.exit_commit()
    }

    fn exit_revert(&mut self) -> Result<(), ExitError> {
        self.substate.exit_revert()
    }

    fn exit_discard(&mut self) -> Result<(), ExitError> {
        self.substate.exit_discard()
    }

    fn is_empty(&self, address: H160) -> bool {
        if let Some(known_empty) = self.substate.known_empty(address) {
            return known_empty;
        }

        self.backend.basic(address).balance == U256::zero()
            && self.backend.basic(address).nonce == U256::zero()
            && self.backend.code(address).is_empty()
    }

    fn deleted(&self, address: H160) -> bool {
        self.substate.deleted(address)
    }

    fn is_created(&self, address: H160) -> bool {
        self.substate.created(address)
    }

    fn is_cold(&self, address: H160) -> bool {
        self.substate.is_cold(address)
    }

    fn is_storage_cold(&self, address: H160, key: H256) -> bool {
        self.substate.is_storage_cold(address, key)
    }

    fn inc_nonce(&mut self, address: H160) -> Result<(), ExitError> {
        self.substate.inc_nonce(address, self.backend)
    }

    fn set_storage(&mut self, address: H160, key: H256, value: H256) {
        self.substate.set_storage(address, key, value);
    }

    fn reset_storage(&mut self, address: H160) {
        self.substate.reset_storage(address, self.backend);
    }

    fn log(&mut self, address: H160, topics: Vec<H256>, data: Vec<u8>) {
        self.substate.log(address, topics, data);
    }

    fn set_deleted(&mut self, address: H160) {
        self.substate.set_deleted(address);
    }

    fn set_created(&mut self, address: H160) {
        self.substate.set_created(address);
    }

    fn set_code(&mut self, address: H160, code: Vec<u8>) {
        self.substate.set_code(address, code, self.backend);
    }

    fn transfer(&mut self, transfer: Transfer) -> Result<(), ExitError> {
        self.substate.transfer(&transfer, self.backend)
    }

    fn reset_balance(&mut self, address: H160) {
        self.substate.reset_balance(address, self.backend);
    }

    fn touch(&mut self, address: H160) {
        self.substate.touch(address, self.backend);
    }

    fn tstore(&mut self, address: H160, index: H256, value: U256) -> Result<(), ExitError> {
        self.substate.set_tstorage(address, index, value);
        Ok(())
    }

    fn tload(&mut self, address: H160, index: H256) -> Result<U256, ExitError> {
        Ok(self
            .substate
            .known_tstorage(address, index)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryAccount, MemoryBackend, Vicinity};
    use crate::Config;
    use std::collections::BTreeMap;

    fn vicinity() -> Vicinity {
        Vicinity {
            gas_price: U256::zero(),
            origin: H160::zero(),
            chain_id: U256::one(),
            block_hashes: Vec::new(),
            block_number: U256::one(),
            block_coinbase: H160::zero(),
            block_timestamp: U256::from(1_600_000_000u64),
            block_difficulty: U256::zero(),
            block_randomness: None,
            block_gas_limit: U256::from(10_000_000u64),
            block_base_fee_per_gas: U256::zero(),
            blob_gas_price: None,
            blob_hashes: Vec::new(),
        }
    }

    fn funded_backend(vicinity: &Vicinity) -> MemoryBackend<'_> {
        let mut state = BTreeMap::new();
        state.insert(
            H160::repeat_byte(1),
            MemoryAccount {
                balance: U256::from(1000),
                ..MemoryAccount::default()
            },
        );
        MemoryBackend::new(vicinity, state)
    }

    #[test]
    fn reverted_checkpoint_discards_everything() {
        let config = Config::istanbul();
        let vicinity = vicinity();
        let backend = funded_backend(&vicinity);
        let metadata = StackSubstateMetadata::new(1_000_000, &config);
        let mut state = MemoryStackState::new(metadata, &backend);

        let address = H160::repeat_byte(1);
        let slot = H256::from_low_u64_be(1);

        state.enter(500_000, false);
        state.set_storage(address, slot, H256::from_low_u64_be(42));
        state.log(address, vec![H256::zero()], vec![1]);
        state.inc_nonce(address).unwrap();
        state.set_deleted(H160::repeat_byte(2));
        assert_eq!(
            state.storage(address, slot),
            H256::from_low_u64_be(42)
        );

        state.exit_revert().unwrap();

        // Nothing from the reverted layer is observable.
        assert_eq!(state.storage(address, slot), H256::zero());
        assert_eq!(state.basic(address).nonce, U256::zero());
        assert!(!state.deleted(H160::repeat_byte(2)));
        let (applies, logs) = state.deconstruct();
        assert!(applies.is_empty());
        assert!(logs.is_empty());
    }

    #[test]
    fn committed_checkpoint_merges_into_parent() {
        let config = Config::istanbul();
        let vicinity = vicinity();
        let backend = funded_backend(&vicinity);
        let metadata = StackSubstateMetadata::new(1_000_000, &config);
        let mut state = MemoryStackState::new(metadata, &backend);

        let address = H160::repeat_byte(1);
        let slot = H256::from_low_u64_be(1);

        state.enter(500_000, false);
        state.set_storage(address, slot, H256::from_low_u64_be(42));
        state.log(address, vec![], vec![]);
        state.exit_commit().unwrap();

        assert_eq!(
            state.storage(address, slot),
            H256::from_low_u64_be(42)
        );
        let (applies, logs) = state.deconstruct();
        assert_eq!(applies.len(), 1);
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn nested_revert_inside_commit() {
        let config = Config::istanbul();
        let vicinity = vicinity();
        let backend = funded_backend(&vicinity);
        let metadata = StackSubstateMetadata::new(1_000_000, &config);
        let mut state = MemoryStackState::new(metadata, &backend);

        let address = H160::repeat_byte(1);

        state.enter(500_000, false);
        state.set_storage(address, H256::from_low_u64_be(1), H256::from_low_u64_be(1));

        state.enter(200_000, false);
        state.set_storage(address, H256::from_low_u64_be(2), H256::from_low_u64_be(2));
        state.exit_revert().unwrap();

        state.exit_commit().unwrap();

        assert_eq!(
            state.storage(address, H256::from_low_u64_be(1)),
            H256::from_low_u64_be(1)
        );
        assert_eq!(
            state.storage(address, H256::from_low_u64_be(2)),
            H256::zero()
        );
    }

    #[test]
    fn transfer_checks_funds() {
        let config = Config::istanbul();
        let vicinity = vicinity();
        let backend = funded_backend(&vicinity);
        let metadata = StackSubstateMetadata::new(1_000_000, &config);
        let mut state = MemoryStackState::new(metadata, &backend);

        let rich = H160::repeat_byte(1);
        let poor = H160::repeat_byte(2);

        state
            .transfer(Transfer {
                source: rich,
                target: poor,
                value: U256::from(400),
            })
            .unwrap();
        assert_eq!(state.basic(rich).balance, U256::from(600));
        assert_eq!(state.basic(poor).balance, U256::from(400));

        let result = state.transfer(Transfer {
            source: rich,
            target: poor,
            value: U256::from(601),
        });
        assert_eq!(result, Err(ExitError::OutOfFund));
    }

    #[test]
    fn transient_storage_is_layered() {
        let config = Config::cancun();
        let vicinity = vicinity();
        let backend = funded_backend(&vicinity);
        let metadata = StackSubstateMetadata::new(1_000_000, &config);
        let mut state = MemoryStackState::new(metadata, &backend);

        let address = H160::repeat_byte(1);
        let slot = H256::from_low_u64_be(7);

        state.tstore(address, slot, U256::from(5)).unwrap();
        state.enter(100_000, false);
        assert_eq!(state.tload(address, slot).unwrap(), U256::from(5));
        state.tstore(address, slot, U256::from(9)).unwrap();
        state.exit_revert().unwrap();

        // The reverted frame's transient write is gone too.
        assert_eq!(state.tload(address, slot).unwrap(), U256::from(5));
    }
}
