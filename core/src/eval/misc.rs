use super::Control;
use crate::utils::{U256_ZERO, USIZE_MAX};
use crate::{ExitError, ExitRevert, ExitSucceed, Machine};
use core::cmp::min;
use primitive_types::{H256, U256};

#[inline]
pub fn codesize(state: &mut Machine) -> Control {
    let size = U256::from(state.code.len());
    push!(state, size);
    Control::Continue(1)
}

#[inline]
pub fn codecopy(state: &mut Machine) -> Control {
    pop!(state, memory_offset, code_offset, len);

    // Zero-length copies complete regardless of the other operands, which
    // may not even fit usize.
    if len == U256_ZERO {
        return Control::Continue(1);
    }
    let len = as_usize_or_fail!(len);
    let memory_offset = as_usize_or_fail!(memory_offset);

    try_or_fail!(state.memory.resize_offset(memory_offset, len));
    match state
        .memory
        .copy_data(memory_offset, code_offset, len, &state.code)
    {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn calldataload(state: &mut Machine) -> Control {
    pop!(state, index);

    let mut load = [0u8; 32];
    if index <= USIZE_MAX {
        let index = index.as_usize();
        if index < state.data.len() {
            let count = min(32, state.data.len() - index);
            load[..count].copy_from_slice(&state.data[index..index + count]);
        }
    }

    push_word!(state, H256::from(load));
    Control::Continue(1)
}

#[inline]
pub fn calldatasize(state: &mut Machine) -> Control {
    let len = U256::from(state.data.len());
    push!(state, len);
    Control::Continue(1)
}

#[inline]
pub fn calldatacopy(state: &mut Machine) -> Control {
    pop!(state, memory_offset, data_offset, len);

    if len == U256_ZERO {
        return Control::Continue(1);
    }
    let len = as_usize_or_fail!(len);
    let memory_offset = as_usize_or_fail!(memory_offset);

    try_or_fail!(state.memory.resize_offset(memory_offset, len));
    match state
        .memory
        .copy_data(memory_offset, data_offset, len, &state.data)
    {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn pop(state: &mut Machine) -> Control {
    pop!(state, _discarded);
    Control::Continue(1)
}

#[inline]
pub fn mload(state: &mut Machine) -> Control {
    pop!(state, index);
    let index = as_usize_or_fail!(index);
    try_or_fail!(state.memory.resize_offset(index, 32));
    let value = state.memory.get_word(index);
    push_word!(state, value);
    Control::Continue(1)
}

#[inline]
pub fn mstore(state: &mut Machine) -> Control {
    pop!(state, index);
    let index = as_usize_or_fail!(index);
    pop_word!(state, value);
    try_or_fail!(state.memory.resize_offset(index, 32));
    match state.memory.set(index, &value[..], 32) {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn mstore8(state: &mut Machine) -> Control {
    pop!(state, index, value);
    let index = as_usize_or_fail!(index);
    try_or_fail!(state.memory.resize_offset(index, 1));
    let byte = (value.low_u32() & 0xff) as u8;
    match state.memory.set(index, &[byte], 1) {
        Ok(()) => Control::Continue(1),
        Err(e) => Control::Exit(e.into()),
    }
}

#[inline]
pub fn jump(state: &mut Machine) -> Control {
    pop!(state, dest);
    let dest = as_usize_or_fail!(dest, ExitError::InvalidJump);

    if state.jumpmap.is_valid(dest) {
        Control::Jump(dest)
    } else {
        Control::Exit(ExitError::InvalidJump.into())
    }
}

#[inline]
pub fn jumpi(state: &mut Machine) -> Control {
    pop!(state, dest, condition);

    if condition == U256_ZERO {
        Control::Continue(1)
    } else {
        let dest = as_usize_or_fail!(dest, ExitError::InvalidJump);
        if state.jumpmap.is_valid(dest) {
            Control::Jump(dest)
        } else {
            Control::Exit(ExitError::InvalidJump.into())
        }
    }
}

#[inline]
pub fn pc(state: &mut Machine, position: usize) -> Control {
    push!(state, U256::from(position));
    Control::Continue(1)
}

#[inline]
pub fn msize(state: &mut Machine) -> Control {
    push!(state, U256::from(state.memory.effective_len()));
    Control::Continue(1)
}

#[inline]
pub fn push(state: &mut Machine, n: usize, position: usize) -> Control {
    let end = min(position + 1 + n, state.code.len());
    let slice = &state.code[(position + 1)..end];
    let mut val = [0u8; 32];
    val[(32 - n)..(32 - n + slice.len())].copy_from_slice(slice);

    push!(state, U256::from_big_endian(&val));
    Control::Continue(1 + n)
}

#[inline]
pub fn push0(state: &mut Machine) -> Control {
    push!(state, U256_ZERO);
    Control::Continue(1)
}

#[inline]
pub fn dup(state: &mut Machine, n: usize) -> Control {
    let value = match state.stack.peek(n - 1) {
        Ok(value) => value,
        Err(e) => return Control::Exit(e.into()),
    };
    push!(state, value);
    Control::Continue(1)
}

#[inline]
pub fn swap(state: &mut Machine, n: usize) -> Control {
    let val1 = match state.stack.peek(0) {
        Ok(value) => value,
        Err(e) => return Control::Exit(e.into()),
    };
    let val2 = match state.stack.peek(n) {
        Ok(value) => value,
        Err(e) => return Control::Exit(e.into()),
    };
    try_or_fail!(state.stack.set(0, val2));
    try_or_fail!(state.stack.set(n, val1));
    Control::Continue(1)
}

#[inline]
pub fn ret(state: &mut Machine) -> Control {
    pop!(state, start, len);
    if len > U256_ZERO {
        let start_usize = as_usize_or_fail!(start);
        let len_usize = as_usize_or_fail!(len);
        try_or_fail!(state.memory.resize_offset(start_usize, len_usize));
    }
    state.return_range = start..(start + len);
    Control::Exit(ExitSucceed::Returned.into())
}

#[inline]
pub fn revert(state: &mut Machine) -> Control {
    pop!(state, start, len);
    if len > U256_ZERO {
        let start_usize = as_usize_or_fail!(start);
        let len_usize = as_usize_or_fail!(len);
        try_or_fail!(state.memory.resize_offset(start_usize, len_usize));
    }
    state.return_range = start..(start + len);
    Control::Exit(ExitRevert::Reverted.into())
}
