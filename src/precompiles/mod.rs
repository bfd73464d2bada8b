//! The standard precompiled contracts, per fork.

mod blake2;
mod bn128;
mod hash;
mod identity;
mod kzg;
mod modexp;
pub mod secp256k1;

pub use blake2::Blake2F;
pub use bn128::{Bn128Add, Bn128Mul, Bn128Pair};
pub use hash::{Ripemd160, Sha256};
pub use identity::Identity;
pub use kzg::PointEvaluation;
pub use modexp::ModExp;
pub use secp256k1::ECRecover;

use crate::executor::stack::{PrecompileFailure, PrecompileOutput, PrecompileSet};
use crate::{Context, ExitError};
use primitive_types::H160;
use std::collections::BTreeMap;

/// A precompiled contract: a gas function and native logic.
pub trait Precompile {
    /// Gas required for `input`.
    ///
    /// # Errors
    /// `ExitError` when the cost cannot be computed (overflow).
    fn required_gas(input: &[u8]) -> Result<u64, ExitError>
    where
        Self: Sized;

    /// Run the precompile.
    ///
    /// # Errors
    /// `PrecompileFailure`; an `Error` consumes all forwarded gas.
    fn run(
        &self,
        input: &[u8],
        target_gas: Option<u64>,
        context: &Context,
        is_static: bool,
    ) -> Result<PrecompileOutput, PrecompileFailure>;
}

/// Hard-fork marker for precompiles whose pricing changed across forks.
pub trait HardFork {}

/// EIP-198/EIP-196/EIP-197 pricing.
pub struct Byzantium;
/// EIP-1108 pricing.
pub struct Istanbul;
/// EIP-2565 pricing.
pub struct Berlin;

impl HardFork for Byzantium {}
impl HardFork for Istanbul {}
impl HardFork for Berlin {}

pub(crate) const fn make_address(last: u8) -> H160 {
    H160(make_address_bytes(last))
}

const fn make_address_bytes(last: u8) -> [u8; 20] {
    let mut bytes = [0u8; 20];
    bytes[19] = last;
    bytes
}

pub(crate) fn out_of_gas_check(cost: u64, target_gas: Option<u64>) -> Result<(), PrecompileFailure> {
    if let Some(target_gas) = target_gas {
        if cost > target_gas {
            return Err(PrecompileFailure::Error {
                exit_status: ExitError::OutOfGas,
            });
        }
    }
    Ok(())
}

/// The canonical precompile set of each fork.
pub struct StandardPrecompiles {
    contracts: BTreeMap<H160, Box<dyn Precompile>>,
}

impl StandardPrecompiles {
    /// Frontier and Homestead: ecrecover, sha256, ripemd160, identity.
    #[must_use]
    pub fn frontier() -> Self {
        let mut contracts: BTreeMap<H160, Box<dyn Precompile>> = BTreeMap::new();
        contracts.insert(ECRecover::ADDRESS, Box::new(ECRecover));
        contracts.insert(Sha256::ADDRESS, Box::new(Sha256));
        contracts.insert(Ripemd160::ADDRESS, Box::new(Ripemd160));
        contracts.insert(Identity::ADDRESS, Box::new(Identity));
        Self { contracts }
    }

    /// Byzantium adds modexp and the alt-bn128 trio.
    #[must_use]
    pub fn byzantium() -> Self {
        let mut set = Self::frontier();
        set.contracts
            .insert(ModExp::<Byzantium>::ADDRESS, Box::new(ModExp::<Byzantium>::new()));
        set.contracts
            .insert(Bn128Add::<Byzantium>::ADDRESS, Box::new(Bn128Add::<Byzantium>::new()));
        set.contracts
            .insert(Bn128Mul::<Byzantium>::ADDRESS, Box::new(Bn128Mul::<Byzantium>::new()));
        set.contracts
            .insert(Bn128Pair::<Byzantium>::ADDRESS, Box::new(Bn128Pair::<Byzantium>::new()));
        set
    }

    /// Istanbul reprices alt-bn128 and adds blake2f.
    #[must_use]
    pub fn istanbul() -> Self {
        let mut set = Self::byzantium();
        set.contracts
            .insert(Bn128Add::<Istanbul>::ADDRESS, Box::new(Bn128Add::<Istanbul>::new()));
        set.contracts
            .insert(Bn128Mul::<Istanbul>::ADDRESS, Box::new(Bn128Mul::<Istanbul>::new()));
        set.contracts
            .insert(Bn128Pair::<Istanbul>::ADDRESS, Box::new(Bn128Pair::<Istanbul>::new()));
        set.contracts.insert(Blake2F::ADDRESS, Box::new(Blake2F));
        set
    }

    /// Berlin reprices modexp.
    #[must_use]
    pub fn berlin() -> Self {
        let mut set = Self::istanbul();
        set.contracts
            .insert(ModExp::<Berlin>::ADDRESS, Box::new(ModExp::<Berlin>::new()));
        set
    }

    /// Cancun adds the KZG point-evaluation precompile.
    #[must_use]
    pub fn cancun() -> Self {
        let mut set = Self::berlin();
        set.contracts
            .insert(PointEvaluation::ADDRESS, Box::new(PointEvaluation));
        set
    }
}

impl PrecompileSet for StandardPrecompiles {
    fn execute(
        &self,
        address: H160,
        input: &[u8],
        gas_limit: Option<u64>,
        context: &Context,
        is_static: bool,
    ) -> Option<Result<PrecompileOutput, PrecompileFailure>> {
        self.contracts
            .get(&address)
            .map(|precompile| precompile.run(input, gas_limit, context, is_static))
    }

    fn is_precompile(&self, address: H160) -> bool {
        self.contracts.contains_key(&address)
    }
}
