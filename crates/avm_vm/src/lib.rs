//! AVM interpreter.
//!
//! Builds a deterministic machine from a program and a static value,
//! executes bounded assertions over it, and exposes the canonical
//! machine hash and component-wise equality used for trace
//! verification. Strictly single-threaded: a machine is exclusively
//! owned, and `Blocked` is an observable status, never a suspension.

pub mod context;
pub mod exec;
pub mod machine;
pub mod stack;

pub use context::AssertionContext;
pub use exec::ExecError;
pub use machine::{equal, run_instruction, Machine, MachineConfig, MachineError, MachineStatus};
pub use stack::ValueStack;
