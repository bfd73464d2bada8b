use crate::Handler;

/// A pending sub-frame surfaced by [`Runtime::run`](crate::Runtime::run).
/// The executor pushes the carried frame onto its call stack and resumes the
/// parent once it finishes.
pub enum Resolve<H: Handler> {
    Call(H::CallInterrupt),
    Create(H::CreateInterrupt),
}
