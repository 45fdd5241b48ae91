//! Per-run assertion context.
//!
//! Owned by a single `execute_assertion` call: counts steps, collects
//! logs and outgoing messages in program order, and exposes the run's
//! time bounds to `GETTIME`. Finalizing consumes the context and
//! produces the `Assertion` record.

use ethereum_types::H256;

use avm_protocol::{Assertion, Message, TimeBounds, TraceStep};
use avm_value::Value;

#[derive(Debug)]
pub struct AssertionContext {
    time_bounds: TimeBounds,
    num_steps: u64,
    out_msgs: Vec<Message>,
    logs: Vec<Value>,
    trace: Vec<TraceStep>,
    trace_enabled: bool,
}

impl AssertionContext {
    pub fn new(time_bounds: TimeBounds) -> AssertionContext {
        AssertionContext::with_trace(time_bounds, false)
    }

    pub fn with_trace(time_bounds: TimeBounds, trace_enabled: bool) -> AssertionContext {
        AssertionContext {
            time_bounds,
            num_steps: 0,
            out_msgs: Vec::new(),
            logs: Vec::new(),
            trace: Vec::new(),
            trace_enabled,
        }
    }

    pub fn num_steps(&self) -> u64 {
        self.num_steps
    }

    pub fn time_bounds_value(&self) -> Value {
        self.time_bounds.as_value()
    }

    pub(crate) fn notify_step(&mut self) {
        self.num_steps += 1;
    }

    pub(crate) fn logged(&mut self, v: Value) {
        self.logs.push(v);
    }

    pub(crate) fn sent(&mut self, msg: Message) {
        self.out_msgs.push(msg);
    }

    pub(crate) fn record(&mut self, insn: i64, op: String, stack_depth: usize) {
        if self.trace_enabled {
            self.trace.push(TraceStep {
                step: self.num_steps + 1,
                insn,
                op,
                stack_depth,
            });
        }
    }

    pub(crate) fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    pub fn finalize(self, after_hash: H256) -> Assertion {
        Assertion {
            after_hash,
            num_steps: self.num_steps,
            out_msgs: self.out_msgs,
            logs: self.logs,
            trace: self.trace,
        }
    }
}
