//! Runtime layer of the hearth EVM.
//!
//! Wraps the core [`Machine`] with an execution [`Context`] and a return-data
//! buffer, and evaluates the opcodes that touch the environment through the
//! [`Handler`] seam. Fork behavior is captured by the [`Config`] descriptor.

#![forbid(unsafe_code)]

mod config;
mod context;
mod eval;
mod handler;
mod interrupt;

pub use hearth_core::*;

pub use crate::config::Config;
pub use crate::context::{CallScheme, Context, CreateScheme};
pub use crate::handler::{Handler, Transfer};
pub use crate::interrupt::Resolve;

use primitive_types::H160;
use std::rc::Rc;

/// One call frame: a machine plus its context and return-data plumbing.
pub struct Runtime {
    machine: Machine,
    return_data_buffer: Vec<u8>,
    return_data_len: usize,
    return_data_offset: usize,
    context: Context,
}

impl Runtime {
    /// Create a new frame over the given code and input.
    #[must_use]
    pub fn new(
        code: Rc<Vec<u8>>,
        data: Rc<Vec<u8>>,
        context: Context,
        stack_limit: usize,
        memory_limit: usize,
    ) -> Self {
        Self {
            machine: Machine::new(code, data, stack_limit, memory_limit),
            return_data_buffer: Vec::new(),
            return_data_len: 0,
            return_data_offset: 0,
            context,
        }
    }

    #[must_use]
    pub const fn machine(&self) -> &Machine {
        &self.machine
    }

    #[must_use]
    pub const fn context(&self) -> &Context {
        &self.context
    }

    /// Step the frame until it exits or needs a sub-frame.
    pub fn run<H: Handler + InterpreterHandler>(
        &mut self,
        handler: &mut H,
    ) -> Capture<ExitReason, Resolve<H>> {
        loop {
            match self.machine.step(handler, &self.context.address) {
                Ok(()) => (),
                Err(Capture::Exit(reason)) => return Capture::Exit(reason),
                Err(Capture::Trap(opcode)) => match eval::eval(self, opcode, handler) {
                    eval::Control::Continue => (),
                    eval::Control::CallInterrupt(interrupt) => {
                        return Capture::Trap(Resolve::Call(interrupt));
                    }
                    eval::Control::CreateInterrupt(interrupt) => {
                        return Capture::Trap(Resolve::Create(interrupt));
                    }
                    eval::Control::Exit(exit) => {
                        self.machine.exit(exit.clone());
                        return Capture::Exit(exit);
                    }
                },
            }
        }
    }

    /// Feed the result of a finished child CREATE frame back into this one.
    ///
    /// # Errors
    /// A fatal child exit is propagated.
    pub fn finish_create(
        &mut self,
        reason: ExitReason,
        address: Option<H160>,
        return_data: Vec<u8>,
    ) -> Result<(), ExitReason> {
        eval::finish_create(self, reason, address, return_data)
    }

    /// Feed the result of a finished child CALL frame back into this one.
    ///
    /// # Errors
    /// A fatal child exit is propagated.
    pub fn finish_call(
        &mut self,
        reason: ExitReason,
        return_data: Vec<u8>,
    ) -> Result<(), ExitReason> {
        eval::finish_call(
            self,
            self.return_data_len,
            self.return_data_offset,
            reason,
            return_data,
        )
    }
}
