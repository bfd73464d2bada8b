use primitive_types::{H160, H256, U256};

/// Execution context of a frame.
#[derive(Clone, Debug)]
pub struct Context {
    /// The account whose storage and balance the frame operates on.
    pub address: H160,
    /// The caller as seen by CALLER.
    pub caller: H160,
    /// The value as seen by CALLVALUE. DELEGATECALL keeps the parent's.
    pub apparent_value: U256,
}

/// How a new contract address is derived.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CreateScheme {
    /// CREATE: `keccak(rlp([sender, nonce]))[12..]`.
    Legacy { caller: H160 },
    /// CREATE2: `keccak(0xff ++ sender ++ salt ++ keccak(init_code))[12..]`.
    Create2 {
        caller: H160,
        code_hash: H256,
        salt: H256,
    },
    /// A predetermined address (used by state bootstrapping).
    Fixed(H160),
}

/// Variant of the CALL-family opcode in flight.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallScheme {
    Call,
    CallCode,
    DelegateCall,
    StaticCall,
}
