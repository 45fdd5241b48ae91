//! Opcode execution.
//!
//! One step = one operation: an immediate pushes its value first, then
//! the basic form runs. Every failure here is an instruction failure —
//! program-observable, routed through the machine's error-handler
//! transfer. Host failures never pass through this module.
//!
//! Failure leaves already-popped operands consumed, with three
//! deliberate exceptions handled by the caller via stack checkpoints:
//! divisor-zero arithmetic, insufficient-balance `SEND`, and a blocking
//! `INBOX` all restore the pre-instruction stack.

use ethereum_types::U256;

use avm_protocol::Message;
use avm_value::{num, CodePoint, Opcode, Operation, Tuple, Value};

use crate::context::AssertionContext;
use crate::machine::Machine;
use crate::stack::ValueStack;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ExecError {
    #[error("stack underflow in {0:?}")]
    StackUnderflow(Opcode),
    #[error("type mismatch in {0:?}")]
    TypeMismatch(Opcode),
    #[error("division by zero in {0:?}")]
    DivideByZero(Opcode),
    #[error("tuple index out of range in {0:?}")]
    TupleIndexOutOfRange(Opcode),
    #[error("jump destination {0} outside the program")]
    BadJumpDestination(i64),
    #[error("insufficient balance for send")]
    InsufficientBalance,
    #[error("breakpoint")]
    Breakpoint,
    #[error("explicit error instruction")]
    Raised,
}

impl ExecError {
    /// Failures that must leave the stack exactly as it was before the
    /// instruction started.
    pub(crate) fn restores_stack(&self) -> bool {
        matches!(
            self,
            ExecError::DivideByZero(_) | ExecError::InsufficientBalance
        )
    }
}

/// What the machine should do after a successful instruction.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    Advance,
    Jump(CodePoint),
    Halt,
    /// `INBOX` saw an unchanged queue; retry after the next delivery.
    Blocked,
}

pub(crate) fn execute(
    m: &mut Machine,
    op: &Operation,
    ctx: &mut AssertionContext,
) -> Result<StepOutcome, ExecError> {
    if let Operation::Immediate(_, imm) = op {
        m.stack.push(imm.clone());
    }
    let oc = op.opcode();
    use Opcode::*;
    match oc {
        Add | Mul | Sub => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            let r = match oc {
                Add => a.overflowing_add(b).0,
                Mul => a.overflowing_mul(b).0,
                _ => a.overflowing_sub(b).0,
            };
            m.stack.push(Value::Int(r));
        }
        Div | Mod => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            if b.is_zero() {
                return Err(ExecError::DivideByZero(oc));
            }
            m.stack
                .push(Value::Int(if oc == Div { a / b } else { a % b }));
        }
        Sdiv | Smod => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            if b.is_zero() {
                return Err(ExecError::DivideByZero(oc));
            }
            m.stack.push(Value::Int(if oc == Sdiv {
                num::sdiv(a, b)
            } else {
                num::smod(a, b)
            }));
        }
        AddMod | MulMod => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            let n = pop_int(&mut m.stack, oc)?;
            if n.is_zero() {
                return Err(ExecError::DivideByZero(oc));
            }
            m.stack.push(Value::Int(if oc == AddMod {
                num::add_mod(a, b, n)
            } else {
                num::mul_mod(a, b, n)
            }));
        }
        Exp => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            m.stack.push(Value::Int(a.overflowing_pow(b).0));
        }
        SignExtend => {
            let x = pop_int(&mut m.stack, oc)?;
            let k = pop_int(&mut m.stack, oc)?;
            m.stack.push(Value::Int(num::sign_extend(x, k)));
        }
        Lt | Gt | Slt | Sgt => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            let r = match oc {
                Lt => a < b,
                Gt => a > b,
                Slt => num::slt(a, b),
                _ => num::sgt(a, b),
            };
            push_bool(&mut m.stack, r);
        }
        Eq => {
            let a = pop_any(&mut m.stack, oc)?;
            let b = pop_any(&mut m.stack, oc)?;
            push_bool(&mut m.stack, a == b);
        }
        IsZero => {
            let a = pop_int(&mut m.stack, oc)?;
            push_bool(&mut m.stack, a.is_zero());
        }
        And | Or | Xor => {
            let a = pop_int(&mut m.stack, oc)?;
            let b = pop_int(&mut m.stack, oc)?;
            let r = match oc {
                And => a & b,
                Or => a | b,
                _ => a ^ b,
            };
            m.stack.push(Value::Int(r));
        }
        Not => {
            let a = pop_int(&mut m.stack, oc)?;
            m.stack.push(Value::Int(!a));
        }
        Byte => {
            let x = pop_int(&mut m.stack, oc)?;
            let n = pop_int(&mut m.stack, oc)?;
            m.stack.push(Value::Int(num::byte_of(x, n)));
        }
        Sha3 => {
            let x = pop_int(&mut m.stack, oc)?;
            let mut buf = [0u8; 32];
            x.to_big_endian(&mut buf);
            let digest = avm_value::keccak(&buf);
            m.stack
                .push(Value::Int(U256::from_big_endian(digest.as_bytes())));
        }
        Pop => {
            pop_any(&mut m.stack, oc)?;
        }
        SPush => {
            let v = m.static_val.clone();
            m.stack.push(v);
        }
        RPush => {
            let v = m.register.clone();
            m.stack.push(v);
        }
        RSet => {
            m.register = pop_any(&mut m.stack, oc)?;
        }
        Jump => {
            let target = pop_codepoint(&mut m.stack, oc)?;
            return Ok(StepOutcome::Jump(m.resolve_code_point(&target)?));
        }
        CJump => {
            let target = pop_codepoint(&mut m.stack, oc)?;
            let cond = pop_int(&mut m.stack, oc)?;
            if !cond.is_zero() {
                return Ok(StepOutcome::Jump(m.resolve_code_point(&target)?));
            }
        }
        StackEmpty => {
            let empty = m.stack.is_empty();
            push_bool(&mut m.stack, empty);
        }
        PcPush => {
            let pc = m.pc.clone();
            m.stack.push(Value::CodePoint(pc));
        }
        AuxPush => {
            let v = pop_any(&mut m.stack, oc)?;
            m.aux_stack.push(v);
        }
        AuxPop => {
            let v = pop_any(&mut m.aux_stack, oc)?;
            m.stack.push(v);
        }
        AuxStackEmpty => {
            let empty = m.aux_stack.is_empty();
            push_bool(&mut m.stack, empty);
        }
        Nop => {}
        ErrPush => {
            let handler = m.err_handler.clone();
            m.stack.push(Value::CodePoint(handler));
        }
        ErrSet => {
            let handler = pop_codepoint(&mut m.stack, oc)?;
            m.err_handler = m.resolve_code_point(&handler)?;
        }
        Dup0 | Dup1 | Dup2 => {
            let depth = (oc as u8 - Dup0 as u8) as usize;
            let v = m
                .stack
                .nth(depth)
                .cloned()
                .ok_or(ExecError::StackUnderflow(oc))?;
            m.stack.push(v);
        }
        Swap1 => {
            let a = pop_any(&mut m.stack, oc)?;
            let b = pop_any(&mut m.stack, oc)?;
            m.stack.push(a);
            m.stack.push(b);
        }
        Swap2 => {
            let a = pop_any(&mut m.stack, oc)?;
            let b = pop_any(&mut m.stack, oc)?;
            let c = pop_any(&mut m.stack, oc)?;
            m.stack.push(a);
            m.stack.push(b);
            m.stack.push(c);
        }
        TGet => {
            let index = pop_int(&mut m.stack, oc)?;
            let t = pop_tuple(&mut m.stack, oc)?;
            let v = tuple_index(&t, index, oc)?.clone();
            m.stack.push(v);
        }
        TSet => {
            let index = pop_int(&mut m.stack, oc)?;
            let t = pop_tuple(&mut m.stack, oc)?;
            let v = pop_any(&mut m.stack, oc)?;
            if index >= U256::from(t.len()) {
                return Err(ExecError::TupleIndexOutOfRange(oc));
            }
            let updated = t
                .set(index.low_u64() as usize, v)
                .map_err(|_| ExecError::TupleIndexOutOfRange(oc))?;
            m.stack.push(Value::Tuple(updated));
        }
        TLen => {
            let t = pop_tuple(&mut m.stack, oc)?;
            m.stack.push(Value::int(t.len() as u64));
        }
        Type => {
            let v = pop_any(&mut m.stack, oc)?;
            // A pruned value reveals nothing beyond its digest.
            if matches!(v, Value::HashOnly(_)) {
                return Err(ExecError::TypeMismatch(oc));
            }
            m.stack.push(Value::int(v.type_code() as u64));
        }
        Breakpoint => return Err(ExecError::Breakpoint),
        Log => {
            let v = pop_any(&mut m.stack, oc)?;
            ctx.logged(v);
        }
        Send => {
            let v = pop_any(&mut m.stack, oc)?;
            let msg = Message::from_stack_tuple(&v).ok_or(ExecError::TypeMismatch(oc))?;
            if m.balance.debit(msg.token, msg.currency).is_err() {
                return Err(ExecError::InsufficientBalance);
            }
            ctx.sent(msg);
        }
        NbSend => {
            let v = pop_any(&mut m.stack, oc)?;
            let msg = Message::from_stack_tuple(&v).ok_or(ExecError::TypeMismatch(oc))?;
            let ok = m.balance.debit(msg.token, msg.currency).is_ok();
            if ok {
                ctx.sent(msg);
            }
            push_bool(&mut m.stack, ok);
        }
        GetTime => {
            m.stack.push(ctx.time_bounds_value());
        }
        Inbox => {
            let cur = pop_any(&mut m.stack, oc)?;
            if cur.hash() == m.inbox.hash() {
                return Ok(StepOutcome::Blocked);
            }
            m.stack.push(m.inbox.receive());
        }
        Error => return Err(ExecError::Raised),
        Halt => return Ok(StepOutcome::Halt),
    }
    Ok(StepOutcome::Advance)
}

fn tuple_index<'a>(t: &'a Tuple, index: U256, oc: Opcode) -> Result<&'a Value, ExecError> {
    if index >= U256::from(t.len()) {
        return Err(ExecError::TupleIndexOutOfRange(oc));
    }
    t.get(index.low_u64() as usize)
        .ok_or(ExecError::TupleIndexOutOfRange(oc))
}

fn push_bool(stack: &mut ValueStack, b: bool) {
    stack.push(Value::Int(if b { U256::one() } else { U256::zero() }));
}

fn pop_any(stack: &mut ValueStack, oc: Opcode) -> Result<Value, ExecError> {
    stack.pop().ok_or(ExecError::StackUnderflow(oc))
}

fn pop_int(stack: &mut ValueStack, oc: Opcode) -> Result<U256, ExecError> {
    match pop_any(stack, oc)? {
        Value::Int(n) => Ok(n),
        _ => Err(ExecError::TypeMismatch(oc)),
    }
}

fn pop_tuple(stack: &mut ValueStack, oc: Opcode) -> Result<Tuple, ExecError> {
    match pop_any(stack, oc)? {
        Value::Tuple(t) => Ok(t),
        _ => Err(ExecError::TypeMismatch(oc)),
    }
}

fn pop_codepoint(stack: &mut ValueStack, oc: Opcode) -> Result<CodePoint, ExecError> {
    match pop_any(stack, oc)? {
        Value::CodePoint(cp) => Ok(cp),
        _ => Err(ExecError::TypeMismatch(oc)),
    }
}
