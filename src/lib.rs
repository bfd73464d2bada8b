//! hearth: an Ethereum Virtual Machine and execution-layer core.
//!
//! This crate ties the interpreter layers together: the [`backend`] traits
//! over which state is read and applied, the journaled stack [`executor`]
//! that runs call frames, and the standard [`precompiles`].

#![forbid(unsafe_code)]

pub use hearth_core::*;
pub use hearth_gasometer as gasometer;
pub use hearth_runtime::*;

pub mod backend;
pub mod executor;
pub mod precompiles;

mod maybe_borrowed;

pub use crate::maybe_borrowed::MaybeBorrowed;
