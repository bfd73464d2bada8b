//! Pricing functions behind the gasometer.

use crate::utils::log2floor;
use crate::GasCost;
use hearth_core::ExitError;
use hearth_runtime::Config;
use primitive_types::{H256, U256};

pub const G_ZERO: u64 = 0;
pub const G_BASE: u64 = 2;
pub const G_VERYLOW: u64 = 3;
pub const G_LOW: u64 = 5;
pub const G_MID: u64 = 8;
pub const G_HIGH: u64 = 10;
pub const G_JUMPDEST: u64 = 1;
pub const G_BLOCKHASH: u64 = 20;
pub const G_CODEDEPOSIT: u64 = 200;

const G_EXP: u64 = 10;
const G_SHA3: u64 = 30;
const G_SHA3WORD: u64 = 6;
const G_COPY: u64 = 3;
const G_LOG: u64 = 375;
const G_LOGTOPIC: u64 = 375;
const G_LOGDATA: u64 = 8;
const G_CREATE: u64 = 32000;
const G_CALLVALUE: u64 = 9000;
const G_NEWACCOUNT: u64 = 25000;
const G_TRANSIENT: u64 = 100;
const G_INITCODE_WORD: u64 = 2;
const G_SUICIDE_REFUND: i64 = 24000;

/// Memory extension cost for `words` 32-byte words: `3w + w²/512`.
///
/// # Errors
/// `OutOfGas` on 64-bit overflow.
pub fn memory_gas(words: u64) -> Result<u64, ExitError> {
    let linear = words.checked_mul(3).ok_or(ExitError::OutOfGas)?;
    let quadratic = words
        .checked_mul(words)
        .map(|squared| squared / 512)
        .ok_or(ExitError::OutOfGas)?;
    linear.checked_add(quadratic).ok_or(ExitError::OutOfGas)
}

/// EIP-3860 init-code charge: 2 gas per word.
#[must_use]
pub fn init_code_cost(init_code: &[u8]) -> u64 {
    G_INITCODE_WORD * (init_code.len() as u64).div_ceil(32)
}

fn word_count(len: U256) -> Result<u64, ExitError> {
    if len > U256::from(u64::MAX) {
        return Err(ExitError::OutOfGas);
    }
    Ok(len.as_u64().div_ceil(32))
}

fn sha3_cost(len: U256) -> Result<u64, ExitError> {
    let words = word_count(len)?;
    G_SHA3
        .checked_add(words.checked_mul(G_SHA3WORD).ok_or(ExitError::OutOfGas)?)
        .ok_or(ExitError::OutOfGas)
}

fn sha3_word_cost(len: U256) -> Result<u64, ExitError> {
    word_count(len)?
        .checked_mul(G_SHA3WORD)
        .ok_or(ExitError::OutOfGas)
}

fn copy_cost(len: U256) -> Result<u64, ExitError> {
    let words = word_count(len)?;
    G_VERYLOW
        .checked_add(words.checked_mul(G_COPY).ok_or(ExitError::OutOfGas)?)
        .ok_or(ExitError::OutOfGas)
}

fn log_cost(n: u8, len: U256) -> Result<u64, ExitError> {
    if len > U256::from(u64::MAX) {
        return Err(ExitError::OutOfGas);
    }
    G_LOG
        .checked_add(u64::from(n) * G_LOGTOPIC)
        .and_then(|cost| cost.checked_add(len.as_u64().checked_mul(G_LOGDATA)?))
        .ok_or(ExitError::OutOfGas)
}

fn exp_cost(config: &Config, power: U256) -> Result<u64, ExitError> {
    if power == U256::zero() {
        return Ok(G_EXP);
    }
    let bytes = log2floor(power) / 8 + 1;
    G_EXP
        .checked_add(
            config
                .gas_expbyte
                .checked_mul(bytes)
                .ok_or(ExitError::OutOfGas)?,
        )
        .ok_or(ExitError::OutOfGas)
}

/// Cost of touching an account, warm/cold aware after Berlin.
fn address_access_cost(config: &Config, is_cold: bool, legacy: u64) -> u64 {
    if config.increase_state_access_gas {
        if is_cold {
            config.gas_account_access_cold
        } else {
            config.gas_storage_read_warm
        }
    } else {
        legacy
    }
}

fn sload_cost(config: &Config, is_cold: bool) -> u64 {
    if config.increase_state_access_gas {
        if is_cold {
            config.gas_sload_cold
        } else {
            config.gas_storage_read_warm
        }
    } else {
        config.gas_sload
    }
}

/// SSTORE pricing across the fork ladder. With net metering (EIP-1283 and
/// EIP-2200) the original/current/new triple picks the tier; before that
/// only current/new matter. The cold surcharge applies on top after Berlin.
fn sstore_cost(
    config: &Config,
    original: H256,
    current: H256,
    new: H256,
    is_cold: bool,
) -> u64 {
    let warm = if config.sstore_gas_metering {
        if current == new {
            config.gas_sload
        } else if current == original {
            if original.is_zero() {
                config.gas_sstore_set
            } else {
                config.gas_sstore_reset
            }
        } else {
            config.gas_sload
        }
    } else if current.is_zero() && !new.is_zero() {
        config.gas_sstore_set
    } else {
        config.gas_sstore_reset
    };

    let cold_surcharge = if config.increase_state_access_gas && is_cold {
        config.gas_sload_cold
    } else {
        0
    };

    warm + cold_surcharge
}

#[allow(clippy::cast_possible_wrap)]
fn sstore_refund(config: &Config, original: H256, current: H256, new: H256) -> i64 {
    if config.sstore_gas_metering {
        if current == new {
            return 0;
        }
        if current == original {
            if !original.is_zero() && new.is_zero() {
                return config.refund_sstore_clears;
            }
            return 0;
        }

        // Dirty slot: net out earlier refunds and charges.
        let mut refund = 0i64;
        if !original.is_zero() {
            if current.is_zero() {
                refund -= config.refund_sstore_clears;
            }
            if new.is_zero() {
                refund += config.refund_sstore_clears;
            }
        }
        if original == new {
            if original.is_zero() {
                refund += (config.gas_sstore_set - config.gas_sload) as i64;
            } else {
                refund += (config.gas_sstore_reset - config.gas_sload) as i64;
            }
        }
        refund
    } else if !current.is_zero() && new.is_zero() {
        config.refund_sstore_clears
    } else {
        0
    }
}

/// CALL-family extra charge: account access, value transfer, new account.
fn call_cost(
    config: &Config,
    value: U256,
    is_cold: bool,
    is_call_or_callcode: bool,
    is_call_or_staticcall: bool,
    new_account: bool,
) -> u64 {
    let transfers_value = value != U256::zero();
    let access = address_access_cost(config, is_cold, config.gas_call);

    let transfer = if is_call_or_callcode && transfers_value {
        G_CALLVALUE
    } else {
        0
    };

    let new = if is_call_or_staticcall {
        if config.empty_considered_exists {
            if new_account {
                G_NEWACCOUNT
            } else {
                0
            }
        } else if transfers_value && new_account {
            // EIP-161: only a funding call can bring an account to life.
            G_NEWACCOUNT
        } else {
            0
        }
    } else {
        0
    };

    access + transfer + new
}

fn suicide_cost(config: &Config, value: U256, is_cold: bool, target_exists: bool) -> u64 {
    let transfers_value = value != U256::zero();
    let new_account = if config.empty_considered_exists {
        !target_exists
    } else {
        transfers_value && !target_exists
    };

    let base = config.gas_suicide + if new_account {
        config.gas_suicide_new_account
    } else {
        0
    };

    // EIP-2929: a cold beneficiary costs a full account access on top.
    if config.increase_state_access_gas && is_cold {
        base + config.gas_account_access_cold
    } else {
        base
    }
}

/// Gas charged for a classified opcode.
///
/// # Errors
/// `InvalidInstruction` for fork-gated opcodes, `OutOfGas` on overflow.
pub fn gas_cost(config: &Config, cost: &GasCost) -> Result<u64, ExitError> {
    Ok(match cost {
        GasCost::Zero => G_ZERO,
        GasCost::Base => G_BASE,
        GasCost::VeryLow => G_VERYLOW,
        GasCost::SelfBalance => G_LOW,
        GasCost::TLoad | GasCost::TStore => G_TRANSIENT,
        GasCost::Invalid(opcode) => return Err(ExitError::InvalidInstruction(*opcode)),

        GasCost::Sha3 { len } => sha3_cost(*len)?,
        GasCost::VeryLowCopy { len } => copy_cost(*len)?,
        GasCost::Exp { power } => exp_cost(config, *power)?,

        GasCost::Balance { target_is_cold } => {
            address_access_cost(config, *target_is_cold, config.gas_balance)
        }
        GasCost::ExtCodeSize { target_is_cold } => {
            address_access_cost(config, *target_is_cold, config.gas_ext_code)
        }
        GasCost::ExtCodeHash { target_is_cold } => {
            address_access_cost(config, *target_is_cold, config.gas_ext_code_hash)
        }
        GasCost::ExtCodeCopy {
            target_is_cold,
            len,
        } => {
            let words = word_count(*len)?;
            address_access_cost(config, *target_is_cold, config.gas_ext_code)
                .checked_add(words.checked_mul(G_COPY).ok_or(ExitError::OutOfGas)?)
                .ok_or(ExitError::OutOfGas)?
        }

        GasCost::SLoad { target_is_cold } => sload_cost(config, *target_is_cold),
        GasCost::SStore {
            original,
            current,
            new,
            target_is_cold,
        } => sstore_cost(config, *original, *current, *new, *target_is_cold),

        GasCost::Log { n, len } => log_cost(*n, *len)?,
        GasCost::Create => G_CREATE,
        GasCost::Create2 { len } => G_CREATE
            .checked_add(sha3_word_cost(*len)?)
            .ok_or(ExitError::OutOfGas)?,

        GasCost::Call {
            value,
            target_is_cold,
            target_exists,
            ..
        } => call_cost(config, *value, *target_is_cold, true, true, !target_exists),
        GasCost::CallCode {
            value,
            target_is_cold,
            ..
        } => call_cost(config, *value, *target_is_cold, true, false, false),
        GasCost::DelegateCall { target_is_cold, .. } => call_cost(
            config,
            U256::zero(),
            *target_is_cold,
            false,
            false,
            false,
        ),
        GasCost::StaticCall { target_is_cold, .. } => call_cost(
            config,
            U256::zero(),
            *target_is_cold,
            false,
            true,
            false,
        ),

        GasCost::Suicide {
            value,
            target_is_cold,
            target_exists,
            ..
        } => suicide_cost(config, *value, *target_is_cold, *target_exists),
    })
}

/// Refund produced by a classified opcode.
#[must_use]
pub fn gas_refund(config: &Config, cost: &GasCost) -> i64 {
    match cost {
        GasCost::SStore {
            original,
            current,
            new,
            ..
        } => sstore_refund(config, *original, *current, *new),
        GasCost::Suicide {
            already_removed: false,
            ..
        } if !config.decrease_clears_refund => G_SUICIDE_REFUND,
        _ => 0,
    }
}

/// Checks that look at the gas state rather than producing a charge.
///
/// # Errors
/// `OutOfGas` for the pre-EIP-150 oversized CALL argument and for the
/// EIP-2200 stipend sentry.
pub fn extra_check(
    config: &Config,
    cost: &GasCost,
    after_gas: u64,
    pre_gas: u64,
) -> Result<(), ExitError> {
    match cost {
        GasCost::Call { gas, .. }
        | GasCost::CallCode { gas, .. }
        | GasCost::DelegateCall { gas, .. }
        | GasCost::StaticCall { gas, .. } => {
            if config.err_on_call_with_more_gas && U256::from(after_gas) < *gas {
                Err(ExitError::OutOfGas)
            } else {
                Ok(())
            }
        }
        GasCost::SStore { .. } if config.sstore_revert_under_stipend => {
            if pre_gas <= config.call_stipend {
                Err(ExitError::OutOfGas)
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(v: u8) -> H256 {
        H256::from_low_u64_be(u64::from(v))
    }

    #[test]
    fn memory_gas_is_quadratic() {
        assert_eq!(memory_gas(0).unwrap(), 0);
        assert_eq!(memory_gas(1).unwrap(), 3);
        assert_eq!(memory_gas(32).unwrap(), 32 * 3 + 2);
        assert!(memory_gas(u64::MAX).is_err());
    }

    #[test]
    fn legacy_sstore_pricing() {
        let config = Config::frontier();
        assert_eq!(
            sstore_cost(&config, slot(0), slot(0), slot(1), false),
            20000
        );
        assert_eq!(sstore_cost(&config, slot(0), slot(1), slot(0), false), 5000);
        assert_eq!(
            sstore_refund(&config, slot(0), slot(1), slot(0)),
            15000
        );
        assert_eq!(sstore_refund(&config, slot(0), slot(0), slot(1)), 0);
    }

    #[test]
    fn istanbul_net_metering() {
        let config = Config::istanbul();
        // No-op writes cost one SLOAD.
        assert_eq!(sstore_cost(&config, slot(1), slot(1), slot(1), false), 800);
        // Fresh write to a clean zero slot.
        assert_eq!(
            sstore_cost(&config, slot(0), slot(0), slot(2), false),
            20000
        );
        // Dirty write.
        assert_eq!(sstore_cost(&config, slot(1), slot(2), slot(3), false), 800);
        // Restoring the original value refunds the difference.
        assert_eq!(
            sstore_refund(&config, slot(1), slot(2), slot(1)),
            5000 - 800
        );
    }

    #[test]
    fn berlin_cold_surcharges() {
        let config = Config::berlin();
        assert_eq!(sload_cost(&config, true), 2100);
        assert_eq!(sload_cost(&config, false), 100);
        assert_eq!(
            sstore_cost(&config, slot(0), slot(0), slot(2), true),
            20000 + 2100
        );
        // Warm no-op is one warm read.
        assert_eq!(sstore_cost(&config, slot(1), slot(1), slot(1), false), 100);
    }

    #[test]
    fn london_clears_refund() {
        let config = Config::london();
        assert_eq!(sstore_refund(&config, slot(1), slot(1), slot(0)), 4800);
    }

    #[test]
    fn call_cost_new_account_rules() {
        let frontier = Config::frontier();
        // Pre-Spurious: touching a missing account always surcharges.
        assert_eq!(
            call_cost(&frontier, U256::zero(), false, true, true, true),
            40 + 25000
        );

        let spurious = Config::spurious_dragon();
        // Post-Spurious: only value-bearing calls do.
        assert_eq!(
            call_cost(&spurious, U256::zero(), false, true, true, true),
            700
        );
        assert_eq!(
            call_cost(&spurious, U256::from(1), false, true, true, true),
            700 + 9000 + 25000
        );
    }
}
