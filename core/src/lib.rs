//! Core layer of the hearth EVM: the bare interpreter machine.
//!
//! A [`Machine`] executes pure bytecode against a stack and a memory. Any
//! opcode that needs the outside world (state, block data, sub-calls) is
//! surfaced as a [`Trap`] and resolved by the runtime layer.

#![forbid(unsafe_code)]

mod error;
mod eval;
mod jumpmap;
mod memory;
mod opcode;
mod stack;
pub mod utils;

pub use error::{Capture, ExitError, ExitFatal, ExitReason, ExitRevert, ExitSucceed, Trap};
pub use jumpmap::JumpMap;
pub use memory::Memory;
pub use opcode::Opcode;
pub use stack::Stack;

use crate::eval::Control;
use crate::utils::{U256_ZERO, USIZE_MAX};
use core::ops::Range;
use primitive_types::{H160, U256};
use std::rc::Rc;

/// Hook invoked before every opcode, used by the executor to charge gas and
/// track warm targets.
pub trait InterpreterHandler {
    /// Charge for `opcode` about to execute at `pc`. An error halts the
    /// frame with the given exit error.
    fn before_bytecode(
        &mut self,
        opcode: Opcode,
        pc: usize,
        machine: &Machine,
        address: &H160,
    ) -> Result<(), ExitError>;
}

/// One interpreter instance: code, data, program counter, stack and memory.
pub struct Machine {
    /// Call data.
    data: Rc<Vec<u8>>,
    /// Code under execution.
    code: Rc<Vec<u8>>,
    /// Program counter, or the exit reason once halted.
    position: Result<usize, ExitReason>,
    /// Memory range holding the return value after RETURN/REVERT.
    return_range: Range<U256>,
    /// Valid jump destinations.
    jumpmap: JumpMap,
    /// Byte-addressable memory.
    memory: Memory,
    /// Word stack.
    stack: Stack,
}

impl Machine {
    /// Create a new machine over the given code and call data.
    #[must_use]
    pub fn new(
        code: Rc<Vec<u8>>,
        data: Rc<Vec<u8>>,
        stack_limit: usize,
        memory_limit: usize,
    ) -> Self {
        let jumpmap = JumpMap::new(&code[..]);

        Self {
            data,
            code,
            position: Ok(0),
            return_range: U256_ZERO..U256_ZERO,
            jumpmap,
            memory: Memory::new(memory_limit),
            stack: Stack::new(stack_limit),
        }
    }

    #[must_use]
    pub const fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Program counter, or the exit reason once the machine has halted.
    pub const fn position(&self) -> &Result<usize, ExitReason> {
        &self.position
    }

    /// Halt the machine explicitly. Further steps return the reason.
    pub fn exit(&mut self, reason: ExitReason) {
        self.position = Err(reason);
    }

    /// Copy out the region designated by the last RETURN or REVERT.
    #[must_use]
    pub fn return_value(&self) -> Vec<u8> {
        if self.return_range.start > USIZE_MAX {
            vec![0; (self.return_range.end - self.return_range.start).as_usize()]
        } else if self.return_range.end > USIZE_MAX {
            let mut ret = self.memory.get(
                self.return_range.start.as_usize(),
                usize::MAX - self.return_range.start.as_usize(),
            );
            let wanted = (self.return_range.end - self.return_range.start).as_usize();
            if ret.len() < wanted {
                ret.resize(wanted, 0);
            }
            ret
        } else {
            self.memory.get(
                self.return_range.start.as_usize(),
                (self.return_range.end - self.return_range.start).as_usize(),
            )
        }
    }

    /// Execute one opcode.
    ///
    /// Running past the end of code halts with `Stopped`. Opcodes the core
    /// cannot evaluate by itself are returned as `Capture::Trap`, with the
    /// program counter already advanced past them.
    ///
    /// # Errors
    /// `Capture::Exit` on any halt, `Capture::Trap` on environment opcodes.
    #[inline]
    pub fn step<H: InterpreterHandler>(
        &mut self,
        handler: &mut H,
        address: &H160,
    ) -> Result<(), Capture<ExitReason, Trap>> {
        let position = *self
            .position
            .as_ref()
            .map_err(|reason| Capture::Exit(reason.clone()))?;

        let Some(opcode) = self.code.get(position).map(|byte| Opcode(*byte)) else {
            let reason: ExitReason = ExitSucceed::Stopped.into();
            self.position = Err(reason.clone());
            return Err(Capture::Exit(reason));
        };

        if let Err(e) = handler.before_bytecode(opcode, position, self, address) {
            let reason = ExitReason::Error(e);
            self.position = Err(reason.clone());
            return Err(Capture::Exit(reason));
        }

        match eval::eval(self, opcode, position) {
            Control::Continue(advance) => {
                self.position = Ok(position + advance);
                Ok(())
            }
            Control::Jump(dest) => {
                self.position = Ok(dest);
                Ok(())
            }
            Control::Exit(reason) => {
                self.position = Err(reason.clone());
                Err(Capture::Exit(reason))
            }
            Control::Trap(opcode) => {
                // The runtime layer resumes after the trapping opcode.
                self.position = Ok(position + 1);
                Err(Capture::Trap(opcode))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    impl InterpreterHandler for NoopHandler {
        fn before_bytecode(
            &mut self,
            _opcode: Opcode,
            _pc: usize,
            _machine: &Machine,
            _address: &H160,
        ) -> Result<(), ExitError> {
            Ok(())
        }
    }

    fn run_to_exit(code: Vec<u8>, data: Vec<u8>) -> (ExitReason, Machine) {
        let mut machine = Machine::new(Rc::new(code), Rc::new(data), 1024, usize::MAX);
        let address = H160::zero();
        loop {
            match machine.step(&mut NoopHandler, &address) {
                Ok(()) => continue,
                Err(Capture::Exit(reason)) => return (reason, machine),
                Err(Capture::Trap(opcode)) => panic!("unexpected trap: {opcode:?}"),
            }
        }
    }

    #[test]
    fn add_and_return() {
        // PUSH1 3, PUSH1 4, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
        let code = vec![
            0x60, 0x03, 0x60, 0x04, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ];
        let (reason, machine) = run_to_exit(code, Vec::new());
        assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Returned));
        assert_eq!(machine.return_value(), {
            let mut out = vec![0u8; 32];
            out[31] = 7;
            out
        });
    }

    #[test]
    fn implicit_stop_past_code_end() {
        let (reason, _) = run_to_exit(vec![0x60, 0x01], Vec::new());
        assert_eq!(reason, ExitReason::Succeed(ExitSucceed::Stopped));
    }

    #[test]
    fn jump_to_non_jumpdest_fails() {
        // PUSH1 4, JUMP, STOP, ADD (no JUMPDEST at 4)
        let (reason, _) = run_to_exit(vec![0x60, 0x04, 0x56, 0x00, 0x01], Vec::new());
        assert_eq!(reason, ExitReason::Error(ExitError::InvalidJump));
    }

    #[test]
    fn jump_over_push_payload_is_invalid() {
        // PUSH2 0x5b00, PUSH1 1, JUMP: offset 1 holds a 0x5b byte, but it
        // is PUSH payload, not a JUMPDEST.
        let (reason, _) = run_to_exit(vec![0x61, 0x5b, 0x00, 0x60, 0x01, 0x56], Vec::new());
        assert_eq!(reason, ExitReason::Error(ExitError::InvalidJump));
    }

    #[test]
    fn stack_underflow_reported() {
        let (reason, _) = run_to_exit(vec![0x01], Vec::new());
        assert_eq!(reason, ExitReason::Error(ExitError::StackUnderflow));
    }
}
