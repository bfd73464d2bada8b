//! A journaled, stack-based call-frame executor.

mod executor;
mod memory;
mod precompile;
mod tagged_runtime;

pub use executor::{
    Accessed, StackExecutor, StackExecutorCallInterrupt, StackExecutorCreateInterrupt,
    StackExitKind, StackState, StackSubstateMetadata,
};
pub use memory::{MemoryStackAccount, MemoryStackState, MemoryStackSubstate};
pub use precompile::{PrecompileFailure, PrecompileOutput, PrecompileSet};
pub use tagged_runtime::{RuntimeKind, TaggedRuntime};
