use crate::Opcode;
use std::borrow::Cow;

/// Either an exit out of the current frame, or a trap the caller must
/// resolve before stepping again.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Capture<E, T> {
    /// The frame exited with the given reason.
    Exit(E),
    /// The frame needs something from the environment.
    Trap(T),
}

/// Opcodes the core machine defers to the runtime layer.
pub type Trap = Opcode;

/// How a frame finished.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitReason {
    /// Terminated normally; journal entries commit.
    Succeed(ExitSucceed),
    /// Terminated with a VM error; all remaining frame gas is consumed.
    Error(ExitError),
    /// Terminated by REVERT; remaining gas and return data flow back.
    Revert(ExitRevert),
    /// The interpreter itself is in an unusable state.
    Fatal(ExitFatal),
}

impl ExitReason {
    #[must_use]
    pub const fn is_succeed(&self) -> bool {
        matches!(self, Self::Succeed(_))
    }

    #[must_use]
    pub const fn is_revert(&self) -> bool {
        matches!(self, Self::Revert(_))
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

/// Successful halts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitSucceed {
    /// STOP, or running past the end of code.
    Stopped,
    /// RETURN.
    Returned,
    /// SELFDESTRUCT.
    Suicided,
}

impl From<ExitSucceed> for ExitReason {
    fn from(s: ExitSucceed) -> Self {
        Self::Succeed(s)
    }
}

/// REVERT halts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitRevert {
    /// The REVERT opcode.
    Reverted,
}

impl From<ExitRevert> for ExitReason {
    fn from(r: ExitRevert) -> Self {
        Self::Revert(r)
    }
}

/// Frame-local failures. Each consumes the remaining gas of its frame; the
/// parent frame observes success=0 and continues.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitError {
    /// Pop on an empty (enough) stack.
    StackUnderflow,
    /// Push past the 1024-item stack limit.
    StackOverflow,
    /// JUMP/JUMPI to a position that is not a JUMPDEST.
    InvalidJump,
    /// A memory or code range does not fit the address space.
    InvalidRange,
    /// Undefined instruction for the active fork, or the designated 0xfe.
    InvalidInstruction(Opcode),
    /// Call depth would exceed 1024.
    CallTooDeep,
    /// CREATE/CREATE2 target already has code, nonce or storage.
    CreateCollision,
    /// Deployed code would exceed the 24576-byte cap.
    CreateContractLimit,
    /// Init code exceeds the EIP-3860 cap.
    InitCodeLimit,
    /// Deployed code would start with 0xEF (EIP-3541).
    CreateContractStartsWithEf,
    /// RETURNDATACOPY past the end of the return buffer.
    OutOfOffset,
    /// Value transfer with insufficient balance.
    OutOfFund,
    /// The gasometer went dry.
    OutOfGas,
    /// State mutation inside a STATICCALL context.
    WriteProtection,
    /// Nonce would overflow (EIP-2681).
    MaxNonce,
    /// An offset or length does not fit `usize`.
    UsizeOverflow,
    /// Anything else, mostly precompile failures.
    Other(Cow<'static, str>),
}

impl From<ExitError> for ExitReason {
    fn from(e: ExitError) -> Self {
        Self::Error(e)
    }
}

/// Interpreter-breaking conditions; these poison the whole execution rather
/// than just the current frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExitFatal {
    /// The environment cannot satisfy the request.
    NotSupported,
    /// A trap reached the outermost loop unresolved.
    UnhandledInterrupt,
    /// A frame error escalated by the caller.
    CallErrorAsFatal(ExitError),
    /// Anything else.
    Other(Cow<'static, str>),
}

impl From<ExitFatal> for ExitReason {
    fn from(f: ExitFatal) -> Self {
        Self::Fatal(f)
    }
}
