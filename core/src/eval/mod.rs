#[macro_use]
mod macros;
mod arithmetic;
mod bitwise;
mod misc;

use crate::{ExitError, ExitReason, ExitSucceed, Machine, Opcode};
use core::ops::{BitAnd, BitOr, BitXor};

/// Outcome of evaluating one opcode.
pub enum Control {
    /// Advance the program counter by the given amount.
    Continue(usize),
    /// Halt with the given reason.
    Exit(ExitReason),
    /// Set the program counter.
    Jump(usize),
    /// Defer to the runtime layer.
    Trap(Opcode),
}

type OpEval = fn(state: &mut Machine, opcode: Opcode, position: usize) -> Control;

/// Evaluate one opcode through the dense dispatch table.
#[inline]
pub fn eval(state: &mut Machine, opcode: Opcode, position: usize) -> Control {
    TABLE[opcode.as_usize()](state, opcode, position)
}

fn eval_trap(_state: &mut Machine, opcode: Opcode, _position: usize) -> Control {
    Control::Trap(opcode)
}

fn eval_stop(_state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    Control::Exit(ExitSucceed::Stopped.into())
}

fn eval_invalid(_state: &mut Machine, opcode: Opcode, _position: usize) -> Control {
    Control::Exit(ExitError::InvalidInstruction(opcode).into())
}

fn eval_add(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_tuple!(state, overflowing_add)
}

fn eval_mul(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_tuple!(state, overflowing_mul)
}

fn eval_sub(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_tuple!(state, overflowing_sub)
}

fn eval_div(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, arithmetic::div)
}

fn eval_sdiv(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, arithmetic::sdiv)
}

fn eval_mod(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, arithmetic::rem)
}

fn eval_smod(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, arithmetic::srem)
}

fn eval_addmod(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op3_fn!(state, arithmetic::addmod)
}

fn eval_mulmod(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op3_fn!(state, arithmetic::mulmod)
}

fn eval_exp(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, arithmetic::exp)
}

fn eval_signextend(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, arithmetic::signextend)
}

fn eval_lt(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_bool!(state, lt)
}

fn eval_gt(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_bool!(state, gt)
}

fn eval_slt(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, bitwise::slt)
}

fn eval_sgt(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, bitwise::sgt)
}

fn eval_eq(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_bool!(state, eq)
}

fn eval_iszero(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op1_fn!(state, bitwise::iszero)
}

fn eval_and(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2!(state, bitand)
}

fn eval_or(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2!(state, bitor)
}

fn eval_xor(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2!(state, bitxor)
}

fn eval_not(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op1_fn!(state, bitwise::not)
}

fn eval_byte(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, bitwise::byte)
}

fn eval_shl(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, bitwise::shl)
}

fn eval_shr(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, bitwise::shr)
}

fn eval_sar(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    op2_fn!(state, bitwise::sar)
}

fn eval_calldataload(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::calldataload(state)
}

fn eval_calldatasize(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::calldatasize(state)
}

fn eval_calldatacopy(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::calldatacopy(state)
}

fn eval_codesize(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::codesize(state)
}

fn eval_codecopy(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::codecopy(state)
}

fn eval_pop(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::pop(state)
}

fn eval_mload(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::mload(state)
}

fn eval_mstore(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::mstore(state)
}

fn eval_mstore8(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::mstore8(state)
}

fn eval_jump(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::jump(state)
}

fn eval_jumpi(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::jumpi(state)
}

fn eval_pc(state: &mut Machine, _opcode: Opcode, position: usize) -> Control {
    misc::pc(state, position)
}

fn eval_msize(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::msize(state)
}

fn eval_jumpdest(_state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    Control::Continue(1)
}

fn eval_push0(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::push0(state)
}

fn eval_push(state: &mut Machine, opcode: Opcode, position: usize) -> Control {
    misc::push(
        state,
        usize::from(opcode.as_u8() - Opcode::PUSH1.as_u8() + 1),
        position,
    )
}

fn eval_dup(state: &mut Machine, opcode: Opcode, _position: usize) -> Control {
    misc::dup(state, usize::from(opcode.as_u8() - Opcode::DUP1.as_u8() + 1))
}

fn eval_swap(state: &mut Machine, opcode: Opcode, _position: usize) -> Control {
    misc::swap(
        state,
        usize::from(opcode.as_u8() - Opcode::SWAP1.as_u8() + 1),
    )
}

fn eval_return(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::ret(state)
}

fn eval_revert(state: &mut Machine, _opcode: Opcode, _position: usize) -> Control {
    misc::revert(state)
}

static TABLE: [OpEval; 256] = {
    let mut table: [OpEval; 256] = [eval_trap as OpEval; 256];

    table[Opcode::STOP.as_usize()] = eval_stop;
    table[Opcode::ADD.as_usize()] = eval_add;
    table[Opcode::MUL.as_usize()] = eval_mul;
    table[Opcode::SUB.as_usize()] = eval_sub;
    table[Opcode::DIV.as_usize()] = eval_div;
    table[Opcode::SDIV.as_usize()] = eval_sdiv;
    table[Opcode::MOD.as_usize()] = eval_mod;
    table[Opcode::SMOD.as_usize()] = eval_smod;
    table[Opcode::ADDMOD.as_usize()] = eval_addmod;
    table[Opcode::MULMOD.as_usize()] = eval_mulmod;
    table[Opcode::EXP.as_usize()] = eval_exp;
    table[Opcode::SIGNEXTEND.as_usize()] = eval_signextend;

    table[Opcode::LT.as_usize()] = eval_lt;
    table[Opcode::GT.as_usize()] = eval_gt;
    table[Opcode::SLT.as_usize()] = eval_slt;
    table[Opcode::SGT.as_usize()] = eval_sgt;
    table[Opcode::EQ.as_usize()] = eval_eq;
    table[Opcode::ISZERO.as_usize()] = eval_iszero;
    table[Opcode::AND.as_usize()] = eval_and;
    table[Opcode::OR.as_usize()] = eval_or;
    table[Opcode::XOR.as_usize()] = eval_xor;
    table[Opcode::NOT.as_usize()] = eval_not;
    table[Opcode::BYTE.as_usize()] = eval_byte;
    table[Opcode::SHL.as_usize()] = eval_shl;
    table[Opcode::SHR.as_usize()] = eval_shr;
    table[Opcode::SAR.as_usize()] = eval_sar;

    table[Opcode::CALLDATALOAD.as_usize()] = eval_calldataload;
    table[Opcode::CALLDATASIZE.as_usize()] = eval_calldatasize;
    table[Opcode::CALLDATACOPY.as_usize()] = eval_calldatacopy;
    table[Opcode::CODESIZE.as_usize()] = eval_codesize;
    table[Opcode::CODECOPY.as_usize()] = eval_codecopy;

    table[Opcode::POP.as_usize()] = eval_pop;
    table[Opcode::MLOAD.as_usize()] = eval_mload;
    table[Opcode::MSTORE.as_usize()] = eval_mstore;
    table[Opcode::MSTORE8.as_usize()] = eval_mstore8;
    table[Opcode::JUMP.as_usize()] = eval_jump;
    table[Opcode::JUMPI.as_usize()] = eval_jumpi;
    table[Opcode::PC.as_usize()] = eval_pc;
    table[Opcode::MSIZE.as_usize()] = eval_msize;
    table[Opcode::JUMPDEST.as_usize()] = eval_jumpdest;
    table[Opcode::PUSH0.as_usize()] = eval_push0;

    let mut i = Opcode::PUSH1.as_usize();
    while i <= Opcode::PUSH32.as_usize() {
        table[i] = eval_push;
        i += 1;
    }
    let mut i = Opcode::DUP1.as_usize();
    while i <= Opcode::DUP16.as_usize() {
        table[i] = eval_dup;
        i += 1;
    }
    let mut i = Opcode::SWAP1.as_usize();
    while i <= Opcode::SWAP16.as_usize() {
        table[i] = eval_swap;
        i += 1;
    }

    table[Opcode::RETURN.as_usize()] = eval_return;
    table[Opcode::REVERT.as_usize()] = eval_revert;
    table[Opcode::INVALID.as_usize()] = eval_invalid;

    table
};
