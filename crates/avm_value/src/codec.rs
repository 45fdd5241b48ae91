//! Big-endian wire codec for values and operations.
//!
//! ```text
//! Value     := tag(u8) body
//!   0 → Int:       32 bytes BE
//!   1 → CodePoint: insn_num(i64 BE) Operation next_hash(32)
//!   2 → HashOnly:  32 bytes
//!   3 → Tuple:     size(u8 ≤ 8) Value*
//! Operation := imm_flag(u8 ∈ {0,1}) opcode(u8) [Value if flag == 1]
//! ```
//!
//! Decoding reads from the front of a shared slice so streams of
//! values concatenate without framing.

use ethereum_types::{H256, U256};

use crate::opcode::Opcode;
use crate::operation::{Operation, OPERATION_BASIC, OPERATION_IMMEDIATE};
use crate::value::{
    CodePoint, Tuple, Value, MAX_TUPLE_SIZE, TYPE_CODE_CODE_POINT, TYPE_CODE_HASH_ONLY,
    TYPE_CODE_INT, TYPE_CODE_TUPLE,
};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated input")]
    Truncated,
    #[error("unknown value tag {0:#04x}")]
    UnknownTag(u8),
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("immediate flag must be 0 or 1, got {0}")]
    BadImmediateFlag(u8),
    #[error("tuple size {0} exceeds {MAX_TUPLE_SIZE}")]
    OversizedTuple(u8),
}

pub fn marshal_value(v: &Value, out: &mut Vec<u8>) {
    out.push(v.type_code());
    match v {
        Value::Int(n) => {
            let mut buf = [0u8; 32];
            n.to_big_endian(&mut buf);
            out.extend_from_slice(&buf);
        }
        Value::Tuple(t) => {
            out.push(t.len() as u8);
            for item in t.iter() {
                marshal_value(item, out);
            }
        }
        Value::CodePoint(cp) => {
            out.extend_from_slice(&cp.insn_num.to_be_bytes());
            marshal_operation(cp.op.as_ref(), out);
            out.extend_from_slice(cp.next_hash.as_bytes());
        }
        Value::HashOnly(h) => out.extend_from_slice(h.as_bytes()),
    }
}

pub fn marshal_operation(op: &Operation, out: &mut Vec<u8>) {
    out.push(op.type_code());
    out.push(op.opcode() as u8);
    if let Operation::Immediate(_, imm) = op {
        marshal_value(imm, out);
    }
}

pub fn unmarshal_value(input: &mut &[u8]) -> Result<Value, CodecError> {
    match take_byte(input)? {
        TYPE_CODE_INT => Ok(Value::Int(U256::from_big_endian(take(input, 32)?))),
        TYPE_CODE_CODE_POINT => {
            let insn_num = i64::from_be_bytes(take(input, 8)?.try_into().unwrap());
            let op = unmarshal_operation(input)?;
            let next_hash = H256::from_slice(take(input, 32)?);
            Ok(Value::CodePoint(CodePoint::new(insn_num, op, next_hash)))
        }
        TYPE_CODE_HASH_ONLY => Ok(Value::HashOnly(H256::from_slice(take(input, 32)?))),
        TYPE_CODE_TUPLE => {
            let size = take_byte(input)?;
            if size as usize > MAX_TUPLE_SIZE {
                return Err(CodecError::OversizedTuple(size));
            }
            let mut items = Vec::with_capacity(size as usize);
            for _ in 0..size {
                items.push(unmarshal_value(input)?);
            }
            let tuple = Tuple::from_vec(items).expect("size checked above");
            Ok(Value::Tuple(tuple))
        }
        tag => Err(CodecError::UnknownTag(tag)),
    }
}

pub fn unmarshal_operation(input: &mut &[u8]) -> Result<Operation, CodecError> {
    let flag = take_byte(input)?;
    let op_byte = take_byte(input)?;
    let op = Opcode::try_from(op_byte).map_err(|_| CodecError::UnknownOpcode(op_byte))?;
    match flag {
        OPERATION_BASIC => Ok(Operation::Basic(op)),
        OPERATION_IMMEDIATE => Ok(Operation::Immediate(op, unmarshal_value(input)?)),
        other => Err(CodecError::BadImmediateFlag(other)),
    }
}

fn take_byte(input: &mut &[u8]) -> Result<u8, CodecError> {
    Ok(take(input, 1)?[0])
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if input.len() < n {
        return Err(CodecError::Truncated);
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &Value) -> Value {
        let mut buf = Vec::new();
        marshal_value(v, &mut buf);
        let mut input = buf.as_slice();
        let back = unmarshal_value(&mut input).expect("decodes");
        assert!(input.is_empty(), "trailing bytes after decode");
        back
    }

    #[test]
    fn int_roundtrip() {
        for v in [U256::zero(), U256::one(), U256::MAX] {
            assert_eq!(roundtrip(&Value::Int(v)), Value::Int(v));
        }
    }

    #[test]
    fn nested_tuple_roundtrip() {
        let v = Value::tuple2(
            Value::int(1u64),
            Value::tuple2(Value::none(), Value::int(2u64)),
        );
        let back = roundtrip(&v);
        assert_eq!(back, v);
        assert_eq!(back.hash(), v.hash());
    }

    #[test]
    fn code_point_roundtrip() {
        let cp = CodePoint::new(
            7,
            Operation::Immediate(Opcode::Add, Value::int(4u64)),
            H256::repeat_byte(3),
        );
        let v = Value::CodePoint(cp.clone());
        let back = roundtrip(&v);
        match back {
            Value::CodePoint(got) => {
                assert_eq!(got.insn_num, 7);
                assert_eq!(*got.op, *cp.op);
                assert_eq!(got.next_hash, cp.next_hash);
                assert_eq!(got.hash(), cp.hash());
            }
            other => panic!("expected code point, got {other}"),
        }
    }

    #[test]
    fn hash_only_is_a_bare_digest() {
        let h = H256::repeat_byte(0xaa);
        let mut buf = Vec::new();
        marshal_value(&Value::HashOnly(h), &mut buf);
        assert_eq!(buf.len(), 33);
        assert_eq!(buf[0], TYPE_CODE_HASH_ONLY);
        assert_eq!(roundtrip(&Value::HashOnly(h)), Value::HashOnly(h));
    }

    #[test]
    fn values_concatenate_without_framing() {
        let mut buf = Vec::new();
        marshal_value(&Value::int(1u64), &mut buf);
        marshal_value(&Value::none(), &mut buf);
        let mut input = buf.as_slice();
        assert_eq!(unmarshal_value(&mut input).unwrap(), Value::int(1u64));
        assert_eq!(unmarshal_value(&mut input).unwrap(), Value::none());
        assert!(input.is_empty());
    }

    #[test]
    fn rejects_bad_inputs() {
        assert_eq!(
            unmarshal_value(&mut &[][..]).unwrap_err(),
            CodecError::Truncated
        );
        assert_eq!(
            unmarshal_value(&mut &[0u8, 1, 2][..]).unwrap_err(),
            CodecError::Truncated
        );
        assert_eq!(
            unmarshal_value(&mut &[9u8][..]).unwrap_err(),
            CodecError::UnknownTag(9)
        );
        assert_eq!(
            unmarshal_value(&mut &[3u8, 9][..]).unwrap_err(),
            CodecError::OversizedTuple(9)
        );
        assert_eq!(
            unmarshal_operation(&mut &[0u8, 0xff][..]).unwrap_err(),
            CodecError::UnknownOpcode(0xff)
        );
        assert_eq!(
            unmarshal_operation(&mut &[2u8, 0x01][..]).unwrap_err(),
            CodecError::BadImmediateFlag(2)
        );
    }
}
