use crate::MaybeBorrowed;
use hearth_runtime::Runtime;
use primitive_types::H160;

/// Why a frame sits on the call stack: the root execution, a CALL, or a
/// CREATE (with its target address).
#[derive(Clone, Copy, Debug)]
pub enum RuntimeKind {
    Create(H160),
    Call(H160),
    Execute,
}

/// A frame on the executor's explicit call stack.
pub struct TaggedRuntime<'borrow> {
    pub kind: RuntimeKind,
    pub inner: MaybeBorrowed<'borrow, Runtime>,
}
