//! Gas accounting layer of the hearth EVM.
//!
//! A [`Gasometer`] lives inside each call frame's metadata. Fork-invariant
//! opcodes are charged from a dense static table; everything else goes
//! through [`dynamic_opcode_cost`], which also reports the warm/cold target
//! so the executor can update its access sets.

#![forbid(unsafe_code)]

mod costs;
mod utils;

pub use crate::costs::{init_code_cost, memory_gas};

use hearth_core::{ExitError, Opcode, Stack};
use hearth_runtime::{Config, Handler};
use primitive_types::{H160, H256, U256};

/// Gas state of one frame.
#[derive(Clone, Debug)]
pub struct Gasometer<'config> {
    gas_limit: u64,
    config: &'config Config,
    inner: Result<Inner, ExitError>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Inner {
    memory_gas: u64,
    used_gas: u64,
    refunded_gas: i64,
}

impl<'config> Gasometer<'config> {
    /// Create a gasometer with the given frame gas limit.
    #[must_use]
    pub const fn new(gas_limit: u64, config: &'config Config) -> Self {
        Self {
            gas_limit,
            config,
            inner: Ok(Inner {
                memory_gas: 0,
                used_gas: 0,
                refunded_gas: 0,
            }),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &'config Config {
        self.config
    }

    #[must_use]
    pub const fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Remaining gas of the frame; zero once the frame has failed.
    #[must_use]
    pub fn gas(&self) -> u64 {
        match &self.inner {
            Ok(inner) => self.gas_limit - inner.used_gas - inner.memory_gas,
            Err(_) => 0,
        }
    }

    /// Gas spent so far, memory extension included.
    #[must_use]
    pub fn total_used_gas(&self) -> u64 {
        match &self.inner {
            Ok(inner) => inner.used_gas + inner.memory_gas,
            Err(_) => self.gas_limit,
        }
    }

    /// Accumulated refund counter. Signed: EIP-2200 dirty-slot accounting
    /// can drive it below zero transiently.
    #[must_use]
    pub fn refunded_gas(&self) -> i64 {
        match &self.inner {
            Ok(inner) => inner.refunded_gas,
            Err(_) => 0,
        }
    }

    /// Poison the gasometer, consuming all remaining gas.
    pub fn fail(&mut self) {
        log::trace!(target: "gasometer", "frame failed with {} gas left", self.gas());
        self.inner = Err(ExitError::OutOfGas);
    }

    /// Charge a flat amount.
    ///
    /// # Errors
    /// `OutOfGas`, which also consumes everything left.
    pub fn record_cost(&mut self, cost: u64) -> Result<(), ExitError> {
        let inner = self.inner.as_mut().map_err(|e| e.clone())?;

        let all_gas_cost = inner
            .used_gas
            .checked_add(inner.memory_gas)
            .and_then(|total| total.checked_add(cost));
        match all_gas_cost {
            Some(total) if total <= self.gas_limit => {
                inner.used_gas += cost;
                Ok(())
            }
            _ => {
                self.inner = Err(ExitError::OutOfGas);
                Err(ExitError::OutOfGas)
            }
        }
    }

    /// Return unspent gas from a finished child frame.
    ///
    /// # Errors
    /// Propagates a poisoned gasometer.
    pub fn record_stipend(&mut self, stipend: u64) -> Result<(), ExitError> {
        let inner = self.inner.as_mut().map_err(|e| e.clone())?;
        inner.used_gas -= stipend;
        Ok(())
    }

    /// Accumulate a (possibly negative) refund.
    ///
    /// # Errors
    /// Propagates a poisoned gasometer.
    pub fn record_refund(&mut self, refund: i64) -> Result<(), ExitError> {
        let inner = self.inner.as_mut().map_err(|e| e.clone())?;
        inner.refunded_gas += refund;
        Ok(())
    }

    /// Charge the 200/byte code deposit of a successful CREATE.
    ///
    /// # Errors
    /// `OutOfGas`.
    pub fn record_deposit(&mut self, code_len: usize) -> Result<(), ExitError> {
        let cost = (code_len as u64)
            .checked_mul(costs::G_CODEDEPOSIT)
            .ok_or(ExitError::OutOfGas)?;
        self.record_cost(cost)
    }

    /// Charge a dynamic opcode cost together with its memory extension.
    ///
    /// # Errors
    /// `OutOfGas` and the per-opcode gating errors (for example
    /// `InvalidInstruction` for fork-gated opcodes).
    pub fn record_dynamic_cost(
        &mut self,
        cost: GasCost,
        memory: Option<MemoryCost>,
    ) -> Result<(), ExitError> {
        let snapshot = match &self.inner {
            Ok(inner) => *inner,
            Err(e) => return Err(e.clone()),
        };

        match self.compute_dynamic(snapshot, &cost, memory) {
            Ok(new_inner) => {
                self.inner = Ok(new_inner);
                Ok(())
            }
            Err(e) => {
                self.inner = Err(e.clone());
                Err(e)
            }
        }
    }

    fn compute_dynamic(
        &self,
        mut inner: Inner,
        cost: &GasCost,
        memory: Option<MemoryCost>,
    ) -> Result<Inner, ExitError> {
        let memory_gas = match memory {
            Some(memory) => core::cmp::max(inner.memory_gas, memory_gas_cost(memory)?),
            None => inner.memory_gas,
        };

        let gas_cost = costs::gas_cost(self.config, cost)?;
        let gas_refund = costs::gas_refund(self.config, cost);

        let all_gas_cost = inner
            .used_gas
            .checked_add(memory_gas)
            .and_then(|total| total.checked_add(gas_cost))
            .ok_or(ExitError::OutOfGas)?;
        if self.gas_limit < all_gas_cost {
            return Err(ExitError::OutOfGas);
        }
        let after_gas = self.gas_limit - all_gas_cost;
        costs::extra_check(self.config, cost, after_gas, self.gas())?;

        inner.used_gas += gas_cost;
        inner.memory_gas = memory_gas;
        inner.refunded_gas += gas_refund;
        Ok(inner)
    }

    /// Charge the intrinsic cost of a transaction.
    ///
    /// # Errors
    /// `OutOfGas` when the gas limit does not cover it.
    pub fn record_transaction(&mut self, cost: TransactionCost) -> Result<(), ExitError> {
        let gas_cost = match cost {
            TransactionCost::Call {
                zero_data_len,
                non_zero_data_len,
                access_list_address_len,
                access_list_storage_len,
            } => {
                self.config.gas_transaction_call
                    + zero_data_len as u64 * self.config.gas_transaction_zero_data
                    + non_zero_data_len as u64 * self.config.gas_transaction_non_zero_data
                    + access_list_address_len as u64 * self.config.gas_access_list_address
                    + access_list_storage_len as u64 * self.config.gas_access_list_storage_key
            }
            TransactionCost::Create {
                zero_data_len,
                non_zero_data_len,
                access_list_address_len,
                access_list_storage_len,
                initcode_cost,
            } => {
                let mut gas = self.config.gas_transaction_create
                    + zero_data_len as u64 * self.config.gas_transaction_zero_data
                    + non_zero_data_len as u64 * self.config.gas_transaction_non_zero_data
                    + access_list_address_len as u64 * self.config.gas_access_list_address
                    + access_list_storage_len as u64 * self.config.gas_access_list_storage_key;
                if self.config.max_initcode_size.is_some() {
                    gas += initcode_cost;
                }
                gas
            }
        };

        self.record_cost(gas_cost)
    }
}

/// Memory region an opcode touches, for extension charging.
#[derive(Clone, Copy, Debug)]
pub struct MemoryCost {
    pub offset: U256,
    pub len: U256,
}

impl MemoryCost {
    /// The region covering both operands.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        if self.len == U256::zero() {
            return other;
        }
        if other.len == U256::zero() {
            return self;
        }

        let self_end = self.offset.saturating_add(self.len);
        let other_end = other.offset.saturating_add(other.len);
        if self_end >= other_end {
            self
        } else {
            other
        }
    }
}

/// Gas needed to cover `memory`, in full. The gasometer keeps the maximum
/// over the frame's lifetime, so only growth is ever charged.
///
/// # Errors
/// `OutOfGas` when the region cannot be priced in 64 bits.
fn memory_gas_cost(memory: MemoryCost) -> Result<u64, ExitError> {
    if memory.len == U256::zero() {
        return Ok(0);
    }

    let end = memory
        .offset
        .checked_add(memory.len)
        .ok_or(ExitError::OutOfGas)?;
    if end > U256::from(u64::MAX) {
        return Err(ExitError::OutOfGas);
    }

    memory_gas(end.as_u64().div_ceil(32))
}

/// The warm/cold target of an opcode, reported so the executor can warm it
/// after charging.
#[derive(Clone, Copy, Debug)]
pub enum StorageTarget {
    None,
    Address(H160),
    Slot(H160, H256),
}

/// Dynamic cost classification of one opcode.
#[derive(Clone, Debug)]
pub enum GasCost {
    /// Free, but still carries a memory cost (RETURN, REVERT).
    Zero,
    /// Fork-gated opcode priced at the base tier.
    Base,
    /// Fork-gated opcode priced at the very-low tier.
    VeryLow,
    /// SELFBALANCE (EIP-1884 low tier).
    SelfBalance,
    /// TLOAD (EIP-1153).
    TLoad,
    /// TSTORE (EIP-1153).
    TStore,
    /// Undefined instruction for the active fork.
    Invalid(Opcode),

    Sha3 {
        len: U256,
    },
    VeryLowCopy {
        len: U256,
    },
    Exp {
        power: U256,
    },
    Balance {
        target_is_cold: bool,
    },
    ExtCodeSize {
        target_is_cold: bool,
    },
    ExtCodeHash {
        target_is_cold: bool,
    },
    ExtCodeCopy {
        target_is_cold: bool,
        len: U256,
    },
    SLoad {
        target_is_cold: bool,
    },
    SStore {
        original: H256,
        current: H256,
        new: H256,
        target_is_cold: bool,
    },
    Log {
        n: u8,
        len: U256,
    },
    Create,
    Create2 {
        len: U256,
    },
    Call {
        value: U256,
        gas: U256,
        target_is_cold: bool,
        target_exists: bool,
    },
    CallCode {
        value: U256,
        gas: U256,
        target_is_cold: bool,
        target_exists: bool,
    },
    DelegateCall {
        gas: U256,
        target_is_cold: bool,
    },
    StaticCall {
        gas: U256,
        target_is_cold: bool,
    },
    Suicide {
        value: U256,
        target_is_cold: bool,
        target_exists: bool,
        already_removed: bool,
    },
}

/// Static cost of fork-invariant opcodes; `None` sends the opcode through
/// [`dynamic_opcode_cost`].
#[must_use]
pub fn static_opcode_cost(opcode: Opcode) -> Option<u64> {
    match opcode {
        Opcode::STOP => Some(costs::G_ZERO),
        Opcode::ADDRESS
        | Opcode::ORIGIN
        | Opcode::CALLER
        | Opcode::CALLVALUE
        | Opcode::CALLDATASIZE
        | Opcode::CODESIZE
        | Opcode::GASPRICE
        | Opcode::COINBASE
        | Opcode::TIMESTAMP
        | Opcode::NUMBER
        | Opcode::DIFFICULTY
        | Opcode::GASLIMIT
        | Opcode::POP
        | Opcode::PC
        | Opcode::MSIZE
        | Opcode::GAS => Some(costs::G_BASE),
        Opcode::ADD
        | Opcode::SUB
        | Opcode::LT
        | Opcode::GT
        | Opcode::SLT
        | Opcode::SGT
        | Opcode::EQ
        | Opcode::ISZERO
        | Opcode::AND
        | Opcode::OR
        | Opcode::XOR
        | Opcode::NOT
        | Opcode::BYTE
        | Opcode::CALLDATALOAD => Some(costs::G_VERYLOW),
        Opcode::MUL
        | Opcode::DIV
        | Opcode::SDIV
        | Opcode::MOD
        | Opcode::SMOD
        | Opcode::SIGNEXTEND => Some(costs::G_LOW),
        Opcode::ADDMOD | Opcode::MULMOD | Opcode::JUMP => Some(costs::G_MID),
        Opcode::JUMPI => Some(costs::G_HIGH),
        Opcode::JUMPDEST => Some(costs::G_JUMPDEST),
        Opcode::BLOCKHASH => Some(costs::G_BLOCKHASH),
        _ => {
            if opcode.is_push().is_some()
                || (opcode >= Opcode::DUP1 && opcode <= Opcode::DUP16)
                || (opcode >= Opcode::SWAP1 && opcode <= Opcode::SWAP16)
            {
                Some(costs::G_VERYLOW)
            } else {
                None
            }
        }
    }
}

fn peek_address(stack: &Stack, no_from_top: usize) -> Result<H160, ExitError> {
    Ok(H160::from(H256(stack.peek(no_from_top)?.to_big_endian())))
}

/// Classify a dynamic opcode: its [`GasCost`], the storage target to warm,
/// and the memory region it extends.
///
/// # Errors
/// Stack underflow while peeking operands, `WriteProtection` for mutating
/// opcodes in a static context, or failures of the warm/cold lookup.
#[allow(clippy::too_many_lines)]
pub fn dynamic_opcode_cost<H: Handler>(
    address: H160,
    opcode: Opcode,
    stack: &Stack,
    is_static: bool,
    config: &Config,
    handler: &mut H,
) -> Result<(GasCost, StorageTarget, Option<MemoryCost>), ExitError> {
    let mut storage_target = StorageTarget::None;

    let gas_cost = match opcode {
        Opcode::RETURN | Opcode::STOP => GasCost::Zero,
        Opcode::REVERT if config.has_revert => GasCost::Zero,

        Opcode::RETURNDATASIZE if config.has_return_data => GasCost::Base,
        Opcode::CHAINID if config.has_chain_id => GasCost::Base,
        Opcode::BASEFEE if config.has_base_fee => GasCost::Base,
        Opcode::BLOBBASEFEE if config.has_blob_base_fee => GasCost::Base,
        Opcode::PUSH0 if config.has_push0 => GasCost::Base,

        Opcode::SHL | Opcode::SHR | Opcode::SAR if config.has_bitwise_shifting => {
            GasCost::VeryLow
        }
        Opcode::BLOBHASH if config.has_shard_blob_transactions => GasCost::VeryLow,
        Opcode::MLOAD | Opcode::MSTORE | Opcode::MSTORE8 => GasCost::VeryLow,

        Opcode::SELFBALANCE if config.has_self_balance => GasCost::SelfBalance,
        Opcode::TLOAD if config.has_transient_storage => GasCost::TLoad,

        Opcode::SHA3 => GasCost::Sha3 {
            len: stack.peek(1)?,
        },

        Opcode::BALANCE => {
            let target = peek_address(stack, 0)?;
            storage_target = StorageTarget::Address(target);
            GasCost::Balance {
                target_is_cold: handler.is_cold(target, None)?,
            }
        }
        Opcode::EXTCODESIZE => {
            let target = peek_address(stack, 0)?;
            storage_target = StorageTarget::Address(target);
            GasCost::ExtCodeSize {
                target_is_cold: handler.is_cold(target, None)?,
            }
        }
        Opcode::EXTCODEHASH if config.has_ext_code_hash => {
            let target = peek_address(stack, 0)?;
            storage_target = StorageTarget::Address(target);
            GasCost::ExtCodeHash {
                target_is_cold: handler.is_cold(target, None)?,
            }
        }
        Opcode::EXTCODECOPY => {
            let target = peek_address(stack, 0)?;
            storage_target = StorageTarget::Address(target);
            GasCost::ExtCodeCopy {
                target_is_cold: handler.is_cold(target, None)?,
                len: stack.peek(3)?,
            }
        }

        Opcode::RETURNDATACOPY if config.has_return_data => GasCost::VeryLowCopy {
            len: stack.peek(2)?,
        },
        Opcode::CALLDATACOPY | Opcode::CODECOPY => GasCost::VeryLowCopy {
            len: stack.peek(2)?,
        },
        Opcode::MCOPY if config.has_mcopy => GasCost::VeryLowCopy {
            len: stack.peek(2)?,
        },

        Opcode::EXP => GasCost::Exp {
            power: stack.peek(1)?,
        },

        Opcode::SLOAD => {
            let index = H256(stack.peek(0)?.to_big_endian());
            storage_target = StorageTarget::Slot(address, index);
            GasCost::SLoad {
                target_is_cold: handler.is_cold(address, Some(index))?,
            }
        }
        Opcode::SSTORE if !is_static => {
            let index = H256(stack.peek(0)?.to_big_endian());
            let new = H256(stack.peek(1)?.to_big_endian());
            storage_target = StorageTarget::Slot(address, index);
            GasCost::SStore {
                original: handler.original_storage(address, index),
                current: handler.storage(address, index),
                new,
                target_is_cold: handler.is_cold(address, Some(index))?,
            }
        }
        Opcode::TSTORE if config.has_transient_storage && !is_static => GasCost::TStore,

        Opcode::LOG0 | Opcode::LOG1 | Opcode::LOG2 | Opcode::LOG3 | Opcode::LOG4
            if !is_static =>
        {
            GasCost::Log {
                n: opcode.as_u8() - Opcode::LOG0.as_u8(),
                len: stack.peek(1)?,
            }
        }

        Opcode::CREATE if !is_static => GasCost::Create,
        Opcode::CREATE2 if config.has_create2 && !is_static => GasCost::Create2 {
            len: stack.peek(2)?,
        },

        Opcode::SELFDESTRUCT if !is_static => {
            let target = peek_address(stack, 0)?;
            storage_target = StorageTarget::Address(target);
            GasCost::Suicide {
                value: handler.balance(address),
                target_is_cold: handler.is_cold(target, None)?,
                target_exists: handler.exists(target),
                already_removed: handler.deleted(address),
            }
        }

        Opcode::CALL => {
            let value = stack.peek(2)?;
            if is_static && value != U256::zero() {
                return Err(ExitError::WriteProtection);
            }
            let target = peek_address(stack, 1)?;
            storage_target = StorageTarget::Address(target);
            GasCost::Call {
                value,
                gas: stack.peek(0)?,
                target_is_cold: handler.is_cold(target, None)?,
                target_exists: handler.exists(target),
            }
        }
        Opcode::CALLCODE => {
            let target = peek_address(stack, 1)?;
            storage_target = StorageTarget::Address(target);
            GasCost::CallCode {
                value: stack.peek(2)?,
                gas: stack.peek(0)?,
                target_is_cold: handler.is_cold(target, None)?,
                target_exists: handler.exists(target),
            }
        }
        Opcode::DELEGATECALL if config.has_delegate_call => {
            let target = peek_address(stack, 1)?;
            storage_target = StorageTarget::Address(target);
            GasCost::DelegateCall {
                gas: stack.peek(0)?,
                target_is_cold: handler.is_cold(target, None)?,
            }
        }
        Opcode::STATICCALL if config.has_static_call => {
            let target = peek_address(stack, 1)?;
            storage_target = StorageTarget::Address(target);
            GasCost::StaticCall {
                gas: stack.peek(0)?,
                target_is_cold: handler.is_cold(target, None)?,
            }
        }

        // Mutating opcodes reached with is_static set.
        Opcode::SSTORE
        | Opcode::LOG0
        | Opcode::LOG1
        | Opcode::LOG2
        | Opcode::LOG3
        | Opcode::LOG4
        | Opcode::CREATE
        | Opcode::SELFDESTRUCT => return Err(ExitError::WriteProtection),
        Opcode::CREATE2 if config.has_create2 => return Err(ExitError::WriteProtection),
        Opcode::TSTORE if config.has_transient_storage => {
            return Err(ExitError::WriteProtection)
        }

        _ => GasCost::Invalid(opcode),
    };

    let memory_cost = match opcode {
        Opcode::SHA3
        | Opcode::RETURN
        | Opcode::REVERT
        | Opcode::LOG0
        | Opcode::LOG1
        | Opcode::LOG2
        | Opcode::LOG3
        | Opcode::LOG4 => Some(MemoryCost {
            offset: stack.peek(0)?,
            len: stack.peek(1)?,
        }),

        Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::RETURNDATACOPY => Some(MemoryCost {
            offset: stack.peek(0)?,
            len: stack.peek(2)?,
        }),

        Opcode::EXTCODECOPY => Some(MemoryCost {
            offset: stack.peek(1)?,
            len: stack.peek(3)?,
        }),

        Opcode::MCOPY => Some(MemoryCost {
            offset: core::cmp::max(stack.peek(0)?, stack.peek(1)?),
            len: stack.peek(2)?,
        }),

        Opcode::MLOAD | Opcode::MSTORE => Some(MemoryCost {
            offset: stack.peek(0)?,
            len: U256::from(32),
        }),

        Opcode::MSTORE8 => Some(MemoryCost {
            offset: stack.peek(0)?,
            len: U256::from(1),
        }),

        Opcode::CREATE | Opcode::CREATE2 => Some(MemoryCost {
            offset: stack.peek(1)?,
            len: stack.peek(2)?,
        }),

        Opcode::CALL | Opcode::CALLCODE => Some(
            MemoryCost {
                offset: stack.peek(3)?,
                len: stack.peek(4)?,
            }
            .join(MemoryCost {
                offset: stack.peek(5)?,
                len: stack.peek(6)?,
            }),
        ),

        Opcode::DELEGATECALL | Opcode::STATICCALL => Some(
            MemoryCost {
                offset: stack.peek(2)?,
                len: stack.peek(3)?,
            }
            .join(MemoryCost {
                offset: stack.peek(4)?,
                len: stack.peek(5)?,
            }),
        ),

        _ => None,
    };

    Ok((gas_cost, storage_target, memory_cost))
}

/// Intrinsic cost of a message-call transaction.
#[must_use]
pub fn call_transaction_cost(data: &[u8], access_list: &[(H160, Vec<H256>)]) -> TransactionCost {
    let (zero_data_len, non_zero_data_len) = data_lens(data);
    let (access_list_address_len, access_list_storage_len) = access_list_lens(access_list);

    TransactionCost::Call {
        zero_data_len,
        non_zero_data_len,
        access_list_address_len,
        access_list_storage_len,
    }
}

/// Intrinsic cost of a create transaction.
#[must_use]
pub fn create_transaction_cost(data: &[u8], access_list: &[(H160, Vec<H256>)]) -> TransactionCost {
    let (zero_data_len, non_zero_data_len) = data_lens(data);
    let (access_list_address_len, access_list_storage_len) = access_list_lens(access_list);

    TransactionCost::Create {
        zero_data_len,
        non_zero_data_len,
        access_list_address_len,
        access_list_storage_len,
        initcode_cost: init_code_cost(data),
    }
}

fn data_lens(data: &[u8]) -> (usize, usize) {
    let zero = data.iter().filter(|byte| **byte == 0).count();
    (zero, data.len() - zero)
}

fn access_list_lens(access_list: &[(H160, Vec<H256>)]) -> (usize, usize) {
    let addresses = access_list.len();
    let slots = access_list.iter().map(|(_, keys)| keys.len()).sum();
    (addresses, slots)
}

/// Intrinsic gas classification of a transaction.
#[derive(Clone, Copy, Debug)]
pub enum TransactionCost {
    Call {
        zero_data_len: usize,
        non_zero_data_len: usize,
        access_list_address_len: usize,
        access_list_storage_len: usize,
    },
    Create {
        zero_data_len: usize,
        non_zero_data_len: usize,
        access_list_address_len: usize,
        access_list_storage_len: usize,
        initcode_cost: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_runtime::Config;

    #[test]
    fn flat_costs_cap_at_limit() {
        let config = Config::frontier();
        let mut gasometer = Gasometer::new(100, &config);
        gasometer.record_cost(40).unwrap();
        assert_eq!(gasometer.gas(), 60);
        assert_eq!(gasometer.record_cost(61), Err(ExitError::OutOfGas));
        // Failure consumes everything.
        assert_eq!(gasometer.gas(), 0);
        assert_eq!(gasometer.total_used_gas(), 100);
    }

    #[test]
    fn memory_growth_is_charged_on_high_water_mark() {
        let config = Config::frontier();
        let mut gasometer = Gasometer::new(10_000, &config);
        // One word: 3 gas.
        gasometer
            .record_dynamic_cost(
                GasCost::Zero,
                Some(MemoryCost {
                    offset: U256::zero(),
                    len: U256::from(32),
                }),
            )
            .unwrap();
        assert_eq!(gasometer.total_used_gas(), 3);
        // Same region again: nothing new.
        gasometer
            .record_dynamic_cost(
                GasCost::Zero,
                Some(MemoryCost {
                    offset: U256::zero(),
                    len: U256::from(32),
                }),
            )
            .unwrap();
        assert_eq!(gasometer.total_used_gas(), 3);
    }

    #[test]
    fn intrinsic_gas_per_fork() {
        let frontier = Config::frontier();
        let istanbul = Config::istanbul();
        let data = [0u8, 1, 0, 2];

        let mut gasometer = Gasometer::new(100_000, &frontier);
        gasometer
            .record_transaction(call_transaction_cost(&data, &[]))
            .unwrap();
        assert_eq!(gasometer.total_used_gas(), 21000 + 2 * 4 + 2 * 68);

        let mut gasometer = Gasometer::new(100_000, &istanbul);
        gasometer
            .record_transaction(call_transaction_cost(&data, &[]))
            .unwrap();
        assert_eq!(gasometer.total_used_gas(), 21000 + 2 * 4 + 2 * 16);
    }

    #[test]
    fn access_list_pricing() {
        let berlin = Config::berlin();
        let access_list = vec![
            (H160::zero(), vec![H256::zero(), H256::zero()]),
            (H160::repeat_byte(1), vec![]),
        ];
        let mut gasometer = Gasometer::new(100_000, &berlin);
        gasometer
            .record_transaction(call_transaction_cost(&[], &access_list))
            .unwrap();
        assert_eq!(gasometer.total_used_gas(), 21000 + 2 * 2400 + 2 * 1900);
    }
}
