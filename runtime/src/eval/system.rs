use super::Control;
use crate::utils::{U64_MAX, U256_ZERO};
use crate::{
    CallScheme, Capture, Context, CreateScheme, ExitError, ExitSucceed, Handler, Runtime, Transfer,
};
use primitive_types::{H256, U256};
use sha3::{Digest, Keccak256};

pub fn sha3<H: Handler>(runtime: &mut Runtime) -> Control<H> {
    pop_u256!(runtime, from, len);

    let data = if len == U256_ZERO {
        Vec::new()
    } else {
        let from = as_usize_or_fail!(from);
        let len = as_usize_or_fail!(len);
        try_or_fail!(runtime.machine.memory_mut().resize_offset(from, len));
        runtime.machine.memory().get(from, len)
    };

    let hash = Keccak256::digest(data.as_slice());
    push_h256!(runtime, H256::from_slice(hash.as_slice()));
    Control::Continue
}

pub fn address<H: Handler>(runtime: &mut Runtime) -> Control<H> {
    let address: H256 = runtime.context.address.into();
    push_h256!(runtime, address);
    Control::Continue
}

pub fn balance<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, address);
    push_u256!(runtime, handler.balance(address.into()));
    Control::Continue
}

pub fn selfbalance<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.balance(runtime.context.address));
    Control::Continue
}

pub fn origin<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    let origin: H256 = handler.origin().into();
    push_h256!(runtime, origin);
    Control::Continue
}

pub fn caller<H: Handler>(runtime: &mut Runtime) -> Control<H> {
    let caller: H256 = runtime.context.caller.into();
    push_h256!(runtime, caller);
    Control::Continue
}

pub fn callvalue<H: Handler>(runtime: &mut Runtime) -> Control<H> {
    push_u256!(runtime, runtime.context.apparent_value);
    Control::Continue
}

pub fn gasprice<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.gas_price());
    Control::Continue
}

pub fn extcodesize<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, address);
    push_u256!(runtime, handler.code_size(address.into()));
    Control::Continue
}

pub fn extcodehash<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, address);
    push_h256!(runtime, handler.code_hash(address.into()));
    Control::Continue
}

pub fn extcodecopy<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, address);
    pop_u256!(runtime, memory_offset, code_offset, len);

    if len == U256_ZERO {
        return Control::Continue;
    }
    let len = as_usize_or_fail!(len);
    let memory_offset = as_usize_or_fail!(memory_offset);

    try_or_fail!(runtime
        .machine
        .memory_mut()
        .resize_offset(memory_offset, len));

    let code = handler.code(address.into());
    match runtime
        .machine
        .memory_mut()
        .copy_data(memory_offset, code_offset, len, &code)
    {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn returndatasize<H: Handler>(runtime: &mut Runtime) -> Control<H> {
    let size = U256::from(runtime.return_data_buffer.len());
    push_u256!(runtime, size);
    Control::Continue
}

pub fn returndatacopy<H: Handler>(runtime: &mut Runtime) -> Control<H> {
    pop_u256!(runtime, memory_offset, data_offset, len);

    // Reads past the end of the return buffer are a hard error, unlike
    // CALLDATACOPY which zero-fills.
    let end = match data_offset.checked_add(len) {
        Some(end) => end,
        None => return Control::Exit(ExitError::OutOfOffset.into()),
    };
    if end > U256::from(runtime.return_data_buffer.len()) {
        return Control::Exit(ExitError::OutOfOffset.into());
    }

    if len == U256_ZERO {
        return Control::Continue;
    }
    let memory_offset = as_usize_or_fail!(memory_offset);
    let len = as_usize_or_fail!(len);

    try_or_fail!(runtime
        .machine
        .memory_mut()
        .resize_offset(memory_offset, len));

    let buffer = runtime.return_data_buffer.clone();
    match runtime
        .machine
        .memory_mut()
        .copy_data(memory_offset, data_offset, len, &buffer)
    {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn blockhash<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_u256!(runtime, number);
    push_h256!(runtime, handler.block_hash(number));
    Control::Continue
}

pub fn coinbase<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    let coinbase: H256 = handler.block_coinbase().into();
    push_h256!(runtime, coinbase);
    Control::Continue
}

pub fn timestamp<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_timestamp());
    Control::Continue
}

pub fn number<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_number());
    Control::Continue
}

pub fn prevrandao<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    if let Some(randomness) = handler.block_randomness() {
        push_h256!(runtime, randomness);
    } else {
        push_u256!(runtime, handler.block_difficulty());
    }
    Control::Continue
}

pub fn gaslimit<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_gas_limit());
    Control::Continue
}

pub fn sload<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, index);
    let value = handler.storage(runtime.context.address, index);
    push_h256!(runtime, value);
    Control::Continue
}

pub fn sstore<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, index, value);

    match handler.set_storage(runtime.context.address, index, value) {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn gas<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.gas_left());
    Control::Continue
}

pub fn log<H: Handler>(runtime: &mut Runtime, n: u8, handler: &mut H) -> Control<H> {
    pop_u256!(runtime, offset, len);

    let data = if len == U256_ZERO {
        Vec::new()
    } else {
        let offset = as_usize_or_fail!(offset);
        let len = as_usize_or_fail!(len);
        try_or_fail!(runtime.machine.memory_mut().resize_offset(offset, len));
        runtime.machine.memory().get(offset, len)
    };

    let mut topics = Vec::with_capacity(usize::from(n));
    for _ in 0..n {
        pop_h256!(runtime, topic);
        topics.push(topic);
    }

    match handler.log(runtime.context.address, topics, data) {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn selfdestruct<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, target);

    match handler.mark_delete(runtime.context.address, target.into()) {
        Ok(()) => Control::Exit(ExitSucceed::Suicided.into()),
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn create<H: Handler>(runtime: &mut Runtime, is_create2: bool, handler: &mut H) -> Control<H> {
    runtime.return_data_buffer = Vec::new();

    pop_u256!(runtime, value, code_offset, len);

    let code = if len == U256_ZERO {
        Vec::new()
    } else {
        let code_offset = as_usize_or_fail!(code_offset);
        let len = as_usize_or_fail!(len);
        try_or_fail!(runtime.machine.memory_mut().resize_offset(code_offset, len));
        runtime.machine.memory().get(code_offset, len)
    };

    let scheme = if is_create2 {
        pop_h256!(runtime, salt);
        let code_hash = H256::from_slice(Keccak256::digest(&code).as_slice());
        CreateScheme::Create2 {
            caller: runtime.context.address,
            salt,
            code_hash,
        }
    } else {
        CreateScheme::Legacy {
            caller: runtime.context.address,
        }
    };

    match handler.create(runtime.context.address, scheme, value, code, None) {
        Capture::Exit((reason, address, return_data)) => {
            match super::finish_create(runtime, reason, address, return_data) {
                Ok(()) => Control::Continue,
                Err(e) => Control::Exit(e),
            }
        }
        Capture::Trap(interrupt) => Control::CreateInterrupt(interrupt),
    }
}

pub fn call<H: Handler>(runtime: &mut Runtime, scheme: CallScheme, handler: &mut H) -> Control<H> {
    runtime.return_data_buffer = Vec::new();

    pop_u256!(runtime, gas);
    pop_h256!(runtime, to);
    let gas = if gas > U64_MAX {
        None
    } else {
        Some(gas.as_u64())
    };

    let value = match scheme {
        CallScheme::Call | CallScheme::CallCode => {
            pop_u256!(runtime, value);
            value
        }
        CallScheme::DelegateCall | CallScheme::StaticCall => U256_ZERO,
    };

    pop_u256!(runtime, in_offset, in_len, out_offset, out_len);

    let input = if in_len == U256_ZERO {
        Vec::new()
    } else {
        let in_offset = as_usize_or_fail!(in_offset);
        let in_len = as_usize_or_fail!(in_len);
        try_or_fail!(runtime.machine.memory_mut().resize_offset(in_offset, in_len));
        runtime.machine.memory().get(in_offset, in_len)
    };

    if out_len == U256_ZERO {
        runtime.return_data_len = 0;
        runtime.return_data_offset = 0;
    } else {
        let out_offset = as_usize_or_fail!(out_offset);
        let out_len = as_usize_or_fail!(out_len);
        try_or_fail!(runtime
            .machine
            .memory_mut()
            .resize_offset(out_offset, out_len));
        runtime.return_data_len = out_len;
        runtime.return_data_offset = out_offset;
    }

    let context = match scheme {
        CallScheme::Call | CallScheme::StaticCall => Context {
            address: to.into(),
            caller: runtime.context.address,
            apparent_value: value,
        },
        CallScheme::CallCode => Context {
            address: runtime.context.address,
            caller: runtime.context.address,
            apparent_value: value,
        },
        CallScheme::DelegateCall => Context {
            address: runtime.context.address,
            caller: runtime.context.caller,
            apparent_value: runtime.context.apparent_value,
        },
    };

    let transfer = match scheme {
        CallScheme::Call => Some(Transfer {
            source: runtime.context.address,
            target: to.into(),
            value,
        }),
        CallScheme::CallCode => Some(Transfer {
            source: runtime.context.address,
            target: runtime.context.address,
            value,
        }),
        CallScheme::DelegateCall | CallScheme::StaticCall => None,
    };

    match handler.call(
        to.into(),
        transfer,
        input,
        gas,
        scheme == CallScheme::StaticCall,
        context,
    ) {
        Capture::Exit((reason, return_data)) => {
            let (out_len, out_offset) = (runtime.return_data_len, runtime.return_data_offset);
            match super::finish_call(runtime, out_len, out_offset, reason, return_data) {
                Ok(()) => Control::Continue,
                Err(e) => Control::Exit(e),
            }
        }
        Capture::Trap(interrupt) => Control::CallInterrupt(interrupt),
    }
}

pub fn chainid<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.chain_id());
    Control::Continue
}

pub fn base_fee<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    push_u256!(runtime, handler.block_base_fee_per_gas());
    Control::Continue
}

pub fn blob_base_fee<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    let fee = handler.blob_base_fee().unwrap_or_default();
    push_u256!(runtime, U256::from(fee));
    Control::Continue
}

pub fn blob_hash<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_u256!(runtime, index);
    let value = if index > crate::utils::USIZE_MAX {
        U256_ZERO
    } else {
        handler
            .get_blob_hash(index.as_usize())
            .unwrap_or(U256_ZERO)
    };
    push_u256!(runtime, value);
    Control::Continue
}

pub fn tload<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, index);
    match handler.tload(runtime.context.address, index) {
        Ok(value) => {
            push_u256!(runtime, value);
            Control::Continue
        }
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn tstore<H: Handler>(runtime: &mut Runtime, handler: &mut H) -> Control<H> {
    pop_h256!(runtime, index);
    pop_u256!(runtime, value);
    match handler.tstore(runtime.context.address, index, value) {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}

pub fn mcopy<H: Handler>(runtime: &mut Runtime, _handler: &mut H) -> Control<H> {
    pop_u256!(runtime, dst_offset, src_offset, len);

    if len == U256_ZERO {
        return Control::Continue;
    }
    let dst_offset = as_usize_or_fail!(dst_offset);
    let src_offset = as_usize_or_fail!(src_offset);
    let len = as_usize_or_fail!(len);

    try_or_fail!(runtime
        .machine
        .memory_mut()
        .resize_offset(core::cmp::max(dst_offset, src_offset), len));

    match runtime
        .machine
        .memory_mut()
        .copy_within(src_offset, dst_offset, len)
    {
        Ok(()) => Control::Continue,
        Err(e) => Control::Exit(e.into()),
    }
}
