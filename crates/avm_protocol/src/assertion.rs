//! The authenticated record of one bounded execution.

use ethereum_types::H256;
use serde::Serialize;

use avm_value::Value;

use crate::message::Message;

/// Result of one `execute_assertion` run: the machine hash after the
/// final step, how many steps ran, and everything the program emitted.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub after_hash: H256,
    pub num_steps: u64,
    pub out_msgs: Vec<Message>,
    pub logs: Vec<Value>,
    /// Per-step records; empty unless tracing was configured.
    pub trace: Vec<TraceStep>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceStep {
    pub step: u64,
    pub insn: i64,
    pub op: String,
    pub stack_depth: usize,
}
