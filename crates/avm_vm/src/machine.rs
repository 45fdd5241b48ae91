//! The machine: state, stepping, assertions, equality.
//!
//! A machine owns its full observable state and is never shared:
//! callers wanting parallel execution construct independent machines.
//! The machine hash covers the seven observable components in a fixed
//! order; the balance tracker is derived from inbox delivery history
//! and stays outside the hash.

use std::sync::Arc;

use ethereum_types::H256;
use sha3::{Digest, Keccak256};

use avm_protocol::{Assertion, BalanceTracker, Inbox, Message, TimeBounds};
use avm_value::{link_program, CodePoint, Operation, Value};

use crate::context::AssertionContext;
use crate::exec::{execute, ExecError, StepOutcome};
use crate::stack::ValueStack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineStatus {
    /// Runnable.
    Extensive,
    /// Waiting for the inbox to change.
    Blocked,
    /// Terminal.
    Halted,
    /// Instruction failure with no handler installed; terminal.
    Errored,
}

#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Emit `tracing` warnings for non-fatal oddities.
    pub warn: bool,
    /// Collect per-step trace records into returned assertions.
    pub trace: bool,
    /// Advisory data-stack depth watermark; only ever warns.
    pub max_call_stack: usize,
}

impl Default for MachineConfig {
    fn default() -> MachineConfig {
        MachineConfig {
            warn: false,
            trace: false,
            max_call_stack: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("program is empty")]
    EmptyProgram,
}

#[derive(Debug, Clone)]
pub struct Machine {
    pub(crate) code: Arc<Vec<CodePoint>>,
    pub(crate) pc: CodePoint,
    pub(crate) stack: ValueStack,
    pub(crate) aux_stack: ValueStack,
    pub(crate) register: Value,
    pub(crate) static_val: Value,
    pub(crate) err_handler: CodePoint,
    pub(crate) status: MachineStatus,
    pub(crate) inbox: Inbox,
    pub(crate) balance: BalanceTracker,
    pub(crate) config: MachineConfig,
    depth_warned: bool,
}

impl Machine {
    pub fn new(
        program: &[Operation],
        static_val: Value,
        config: MachineConfig,
    ) -> Result<Machine, MachineError> {
        if program.is_empty() {
            return Err(MachineError::EmptyProgram);
        }
        let code = link_program(program);
        let pc = code[0].clone();
        Ok(Machine {
            code: Arc::new(code),
            pc,
            stack: ValueStack::new(),
            aux_stack: ValueStack::new(),
            register: Value::none(),
            static_val,
            err_handler: CodePoint::error(),
            status: MachineStatus::Extensive,
            inbox: Inbox::new(),
            balance: BalanceTracker::new(),
            config,
            depth_warned: false,
        })
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    pub fn pc(&self) -> &CodePoint {
        &self.pc
    }

    /// The operation the machine would execute next.
    pub fn get_operation(&self) -> Operation {
        self.pc.op.as_ref().clone()
    }

    /// The canonical code point at `index`, if the program has one.
    pub fn code_point(&self, index: usize) -> Option<&CodePoint> {
        self.code.get(index)
    }

    pub fn stack(&mut self) -> &mut ValueStack {
        &mut self.stack
    }

    pub fn aux_stack(&mut self) -> &mut ValueStack {
        &mut self.aux_stack
    }

    pub fn balance_tracker(&self) -> &BalanceTracker {
        &self.balance
    }

    /// Repoint the machine. In-range positions resolve to the canonical
    /// code point; sentinels and out-of-program points are taken as
    /// given.
    pub fn set_pc(&mut self, cp: &CodePoint) {
        self.pc = self
            .resolve_code_point(cp)
            .unwrap_or_else(|_| cp.clone());
    }

    /// The machine hash: keccak-256 over the component hashes of
    /// `(pc, data stack, aux stack, register, static, err handler,
    /// inbox)`.
    pub fn hash(&self) -> H256 {
        let mut h = Keccak256::new();
        h.update(self.pc.hash().as_bytes());
        h.update(self.stack.hash().as_bytes());
        h.update(self.aux_stack.hash().as_bytes());
        h.update(self.register.hash().as_bytes());
        h.update(self.static_val.hash().as_bytes());
        h.update(self.err_handler.hash().as_bytes());
        h.update(self.inbox.hash().as_bytes());
        H256::from_slice(&h.finalize())
    }

    /// Stage a message for the next delivery.
    pub fn send_onchain_message(&mut self, msg: Message) {
        self.inbox.send_message(msg);
    }

    /// Deliver every staged message: extend the observable inbox queue,
    /// credit the balance tracker, and unblock the machine if the queue
    /// changed.
    pub fn deliver_onchain_messages(&mut self) {
        let before = self.inbox.hash();
        for msg in self.inbox.deliver_messages() {
            if let Err(err) = self.balance.credit(msg.token, msg.currency) {
                if self.config.warn {
                    tracing::warn!(error = %err, "dropping balance credit");
                }
            }
        }
        if self.status == MachineStatus::Blocked && self.inbox.hash() != before {
            self.status = MachineStatus::Extensive;
        }
    }

    /// Run until halt, error, block, or the step budget is spent.
    pub fn execute_assertion(&mut self, max_steps: u64, time_bounds: TimeBounds) -> Assertion {
        self.deliver_onchain_messages();
        let mut ctx = AssertionContext::with_trace(time_bounds, self.config.trace);
        while self.status == MachineStatus::Extensive && ctx.num_steps() < max_steps {
            self.step(&mut ctx);
        }
        tracing::debug!(steps = ctx.num_steps(), status = ?self.status, "assertion finished");
        ctx.finalize(self.hash())
    }

    /// One state transition. Does nothing unless the machine is
    /// runnable.
    pub fn step(&mut self, ctx: &mut AssertionContext) {
        if self.status != MachineStatus::Extensive {
            return;
        }
        if self.pc.is_halt() {
            self.status = MachineStatus::Halted;
            return;
        }
        if self.pc.is_error() {
            ctx.notify_step();
            self.error_transfer(&ExecError::Raised);
            return;
        }
        let op = self.get_operation();
        if ctx.trace_enabled() {
            ctx.record(self.pc.insn_num, op.to_string(), self.stack.count());
        }
        let _ = self.run_operation(&op, ctx);
    }

    /// Execute one operation against the current state, applying the
    /// pc-advance, blocking, and error-transfer rules.
    pub(crate) fn run_operation(
        &mut self,
        op: &Operation,
        ctx: &mut AssertionContext,
    ) -> Result<(), ExecError> {
        let checkpoint = self.stack.checkpoint();
        match execute(self, op, ctx) {
            Ok(StepOutcome::Advance) => {
                ctx.notify_step();
                self.advance_pc();
                self.depth_check();
                Ok(())
            }
            Ok(StepOutcome::Jump(target)) => {
                ctx.notify_step();
                self.pc = target;
                Ok(())
            }
            Ok(StepOutcome::Halt) => {
                ctx.notify_step();
                self.status = MachineStatus::Halted;
                Ok(())
            }
            Ok(StepOutcome::Blocked) => {
                // The instruction reruns after the next delivery, so the
                // blocked attempt leaves no trace: stack restored, pc
                // unchanged, no step counted.
                self.stack.restore(checkpoint);
                self.status = MachineStatus::Blocked;
                Ok(())
            }
            Err(err) => {
                if err.restores_stack() {
                    self.stack.restore(checkpoint);
                }
                ctx.notify_step();
                self.error_transfer(&err);
                Err(err)
            }
        }
    }

    pub(crate) fn resolve_code_point(&self, cp: &CodePoint) -> Result<CodePoint, ExecError> {
        if cp.is_halt() {
            return Ok(CodePoint::halt());
        }
        if cp.is_error() {
            return Ok(CodePoint::error());
        }
        usize::try_from(cp.insn_num)
            .ok()
            .and_then(|i| self.code.get(i).cloned())
            .ok_or(ExecError::BadJumpDestination(cp.insn_num))
    }

    fn advance_pc(&mut self) {
        if self.pc.insn_num < 0 {
            self.pc = CodePoint::halt();
            return;
        }
        let next = self.pc.insn_num + 1;
        self.pc = match usize::try_from(next).ok().and_then(|i| self.code.get(i)) {
            Some(cp) => cp.clone(),
            None => CodePoint::halt(),
        };
    }

    fn error_transfer(&mut self, err: &ExecError) {
        if self.config.warn {
            tracing::warn!(insn = self.pc.insn_num, error = %err, "instruction failure");
        }
        if self.err_handler.is_error() {
            self.status = MachineStatus::Errored;
        } else {
            self.pc = self.err_handler.clone();
        }
    }

    fn depth_check(&mut self) {
        if self.config.warn && !self.depth_warned {
            let depth = self.stack.count();
            if depth > self.config.max_call_stack {
                self.depth_warned = true;
                tracing::warn!(
                    depth,
                    limit = self.config.max_call_stack,
                    "data stack depth above advisory limit"
                );
            }
        }
    }
}

/// Single-step façade for tests: run one operation against the machine
/// under a throwaway context and return the new pc.
pub fn run_instruction(m: &mut Machine, op: &Operation) -> Result<CodePoint, ExecError> {
    let mut ctx = AssertionContext::new(TimeBounds::new(0, 0));
    m.run_operation(op, &mut ctx)?;
    Ok(m.pc.clone())
}

/// Component-wise equivalence. Two equal machines have equal hashes;
/// the reason string names the first differing component.
pub fn equal(x: &Machine, y: &Machine) -> (bool, String) {
    let pairs = [
        ("pc", x.pc.hash(), y.pc.hash()),
        ("data stack", x.stack.hash(), y.stack.hash()),
        ("aux stack", x.aux_stack.hash(), y.aux_stack.hash()),
        ("register", x.register.hash(), y.register.hash()),
        ("static", x.static_val.hash(), y.static_val.hash()),
        ("error handler", x.err_handler.hash(), y.err_handler.hash()),
        ("inbox", x.inbox.hash(), y.inbox.hash()),
    ];
    for (name, a, b) in pairs {
        if a != b {
            return (false, format!("{name} differs"));
        }
    }
    (true, String::new())
}
