//! Tagged machine values and their canonical keccak-256 digests.
//!
//! Every observable piece of machine state is a `Value`, and every
//! `Value` has one canonical digest; state equivalence is digest
//! equivalence. Tuples memoize their digest behind a shared pointer so
//! re-hashing deep structures (the stacks are nested tuples) stays
//! cheap; the memo is invisible to hashing and equality.

use std::fmt;
use std::sync::{Arc, OnceLock};

use ethereum_types::{H256, U256};
use sha3::{Digest, Keccak256};

use crate::operation::Operation;
use crate::opcode::Opcode;

/// Tuples carry at most this many values.
pub const MAX_TUPLE_SIZE: usize = 8;

pub const TYPE_CODE_INT: u8 = 0;
pub const TYPE_CODE_CODE_POINT: u8 = 1;
pub const TYPE_CODE_HASH_ONLY: u8 = 2;
pub const TYPE_CODE_TUPLE: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("tuple size {0} exceeds {MAX_TUPLE_SIZE}")]
    TupleTooBig(usize),
    #[error("tuple index {index} out of range for size {size}")]
    IndexOutOfRange { index: usize, size: usize },
}

/// keccak-256 over one byte slice.
pub fn keccak(data: &[u8]) -> H256 {
    let mut h = Keccak256::new();
    h.update(data);
    H256::from_slice(&h.finalize())
}

// ── Value ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Value {
    Int(U256),
    Tuple(Tuple),
    CodePoint(CodePoint),
    HashOnly(H256),
}

impl Value {
    pub fn none() -> Value {
        Value::Tuple(Tuple::empty())
    }

    pub fn int(v: impl Into<U256>) -> Value {
        Value::Int(v.into())
    }

    pub fn tuple2(a: Value, b: Value) -> Value {
        Value::Tuple(Tuple::from_vec(vec![a, b]).expect("two fits in a tuple"))
    }

    pub fn type_code(&self) -> u8 {
        match self {
            Value::Int(_) => TYPE_CODE_INT,
            Value::CodePoint(_) => TYPE_CODE_CODE_POINT,
            Value::HashOnly(_) => TYPE_CODE_HASH_ONLY,
            Value::Tuple(_) => TYPE_CODE_TUPLE,
        }
    }

    pub fn hash(&self) -> H256 {
        match self {
            Value::Int(n) => {
                let mut buf = [0u8; 32];
                n.to_big_endian(&mut buf);
                keccak(&buf)
            }
            Value::Tuple(t) => t.hash(),
            Value::CodePoint(cp) => cp.hash(),
            Value::HashOnly(h) => *h,
        }
    }

    /// Number of primitive nodes: leaves count one, a tuple counts
    /// itself plus its children.
    pub fn size(&self) -> u64 {
        match self {
            Value::Tuple(t) => 1 + t.iter().map(Value::size).sum::<u64>(),
            _ => 1,
        }
    }
}

// HashOnly compares only by digest; CodePoints compare by instruction
// number; everything else compares structurally. Cross-type comparison
// is false except against HashOnly.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::HashOnly(h), v) | (v, Value::HashOnly(h)) => *h == v.hash(),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::CodePoint(a), Value::CodePoint(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Tuple(t) => write!(f, "{t}"),
            Value::CodePoint(cp) => write!(f, "{cp}"),
            Value::HashOnly(h) => write!(f, "HashOnly({h:#x})"),
        }
    }
}

// ── Tuple ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Tuple(Arc<TupleInner>);

#[derive(Debug)]
struct TupleInner {
    items: Vec<Value>,
    hash: OnceLock<H256>,
}

impl Tuple {
    pub fn empty() -> Tuple {
        Tuple::from_vec(Vec::new()).expect("empty tuple")
    }

    pub fn from_vec(items: Vec<Value>) -> Result<Tuple, ValueError> {
        if items.len() > MAX_TUPLE_SIZE {
            return Err(ValueError::TupleTooBig(items.len()));
        }
        Ok(Tuple(Arc::new(TupleInner {
            items,
            hash: OnceLock::new(),
        })))
    }

    pub fn len(&self) -> usize {
        self.0.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.items.get(index)
    }

    /// A copy of the tuple with element `index` replaced.
    pub fn set(&self, index: usize, v: Value) -> Result<Tuple, ValueError> {
        if index >= self.len() {
            return Err(ValueError::IndexOutOfRange {
                index,
                size: self.len(),
            });
        }
        let mut items = self.0.items.clone();
        items[index] = v;
        Tuple::from_vec(items)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.items.iter()
    }

    pub fn hash(&self) -> H256 {
        *self.0.hash.get_or_init(|| {
            let mut h = Keccak256::new();
            h.update([TYPE_CODE_TUPLE + self.len() as u8]);
            for item in &self.0.items {
                h.update(item.hash().as_bytes());
            }
            H256::from_slice(&h.finalize())
        })
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Tuple) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuple(")?;
        for (i, item) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, ")")
    }
}

// ── CodePoint ───────────────────────────────────────────────────────────

const HALT_INSN_NUM: i64 = -1;
const ERROR_INSN_NUM: i64 = -2;

/// A position in the program: its index, its operation, and the digest
/// of the following code point (zero past the end). The halt and error
/// sentinels sit at the negative indices -1 and -2.
#[derive(Debug, Clone)]
pub struct CodePoint {
    pub insn_num: i64,
    pub op: Arc<Operation>,
    pub next_hash: H256,
}

impl CodePoint {
    pub fn new(insn_num: i64, op: Operation, next_hash: H256) -> CodePoint {
        CodePoint {
            insn_num,
            op: Arc::new(op),
            next_hash,
        }
    }

    pub fn halt() -> CodePoint {
        CodePoint::new(HALT_INSN_NUM, Operation::Basic(Opcode::Nop), H256::zero())
    }

    pub fn error() -> CodePoint {
        CodePoint::new(ERROR_INSN_NUM, Operation::Basic(Opcode::Nop), H256::zero())
    }

    pub fn is_halt(&self) -> bool {
        self.insn_num == HALT_INSN_NUM
    }

    pub fn is_error(&self) -> bool {
        self.insn_num == ERROR_INSN_NUM
    }

    pub fn hash(&self) -> H256 {
        static HALT_HASH: OnceLock<H256> = OnceLock::new();
        static ERROR_HASH: OnceLock<H256> = OnceLock::new();
        if self.is_halt() {
            return *HALT_HASH.get_or_init(|| keccak(b"HaltCodePoint"));
        }
        if self.is_error() {
            return *ERROR_HASH.get_or_init(|| keccak(b"ErrorCodePoint"));
        }
        let mut h = Keccak256::new();
        h.update([TYPE_CODE_CODE_POINT, self.op.opcode() as u8]);
        if let Operation::Immediate(_, imm) = self.op.as_ref() {
            h.update(imm.hash().as_bytes());
        }
        h.update(self.next_hash.as_bytes());
        H256::from_slice(&h.finalize())
    }
}

// Equality checks the instruction number only: a code point names a
// program position, and positions resolve against the machine's code.
impl PartialEq for CodePoint {
    fn eq(&self, other: &CodePoint) -> bool {
        self.insn_num == other.insn_num
    }
}

impl fmt::Display for CodePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodePoint({}, {})", self.insn_num, self.op)
    }
}

/// Lift a program into its code points, chaining `next_hash` right to
/// left. The final instruction chains to the zero digest and
/// `insn_num` equals the index.
pub fn link_program(ops: &[Operation]) -> Vec<CodePoint> {
    let mut points: Vec<CodePoint> = Vec::with_capacity(ops.len());
    let mut next_hash = H256::zero();
    for (i, op) in ops.iter().enumerate().rev() {
        let cp = CodePoint::new(i as i64, op.clone(), next_hash);
        next_hash = cp.hash();
        points.push(cp);
    }
    points.reverse();
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: u64) -> Value {
        Value::int(v)
    }

    #[test]
    fn int_hash_is_keccak_of_be_bytes() {
        // keccak256 of the 32-byte big-endian encoding of 1.
        let expected = U256::from_dec_str(
            "80084422859880547211683076133703299733277748156566366325829078699459944778998",
        )
        .unwrap();
        let mut buf = [0u8; 32];
        expected.to_big_endian(&mut buf);
        assert_eq!(int(1).hash(), H256(buf));
    }

    #[test]
    fn tuple_hash_domain_separates_arity() {
        let empty = Tuple::empty();
        let one = Tuple::from_vec(vec![int(0)]).unwrap();
        assert_ne!(empty.hash(), one.hash());
        assert_eq!(empty.hash(), keccak(&[TYPE_CODE_TUPLE]));
    }

    #[test]
    fn tuple_rejects_nine_values() {
        let items = (0..9).map(int).collect::<Vec<_>>();
        assert!(matches!(
            Tuple::from_vec(items),
            Err(ValueError::TupleTooBig(9))
        ));
    }

    #[test]
    fn tuple_set_is_copy_on_write() {
        let t = Tuple::from_vec(vec![int(1), int(2)]).unwrap();
        let u = t.set(1, int(3)).unwrap();
        assert_eq!(t.get(1), Some(&int(2)));
        assert_eq!(u.get(1), Some(&int(3)));
        assert!(t.set(2, int(0)).is_err());
    }

    #[test]
    fn hash_only_equals_anything_with_the_same_digest() {
        let v = Value::tuple2(int(1), int(2));
        let pruned = Value::HashOnly(v.hash());
        assert_eq!(pruned, v);
        assert_eq!(v, pruned);
        assert_ne!(pruned, int(1));
        assert_eq!(pruned.hash(), v.hash());
    }

    #[test]
    fn code_points_compare_by_instruction_number() {
        let a = CodePoint::new(3, Operation::Basic(Opcode::Add), H256::zero());
        let b = CodePoint::new(3, Operation::Basic(Opcode::Halt), H256::repeat_byte(7));
        let c = CodePoint::new(4, Operation::Basic(Opcode::Add), H256::zero());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn sentinel_hashes_are_fixed_and_distinct() {
        assert_eq!(CodePoint::halt().hash(), CodePoint::halt().hash());
        assert_ne!(CodePoint::halt().hash(), CodePoint::error().hash());
        // Sentinels ignore their carried operation.
        let forged = CodePoint::new(-1, Operation::Basic(Opcode::Add), H256::repeat_byte(9));
        assert_eq!(forged.hash(), CodePoint::halt().hash());
    }

    #[test]
    fn linking_chains_hashes_right_to_left() {
        let ops = vec![
            Operation::Immediate(Opcode::Nop, int(2)),
            Operation::Basic(Opcode::Log),
            Operation::Basic(Opcode::Halt),
        ];
        let points = link_program(&ops);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].insn_num, 0);
        assert_eq!(points[2].next_hash, H256::zero());
        assert_eq!(points[1].next_hash, points[2].hash());
        assert_eq!(points[0].next_hash, points[1].hash());
    }

    #[test]
    fn immediate_value_feeds_code_point_hash() {
        let a = CodePoint::new(0, Operation::Immediate(Opcode::Nop, int(1)), H256::zero());
        let b = CodePoint::new(0, Operation::Immediate(Opcode::Nop, int(2)), H256::zero());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn size_counts_primitive_nodes() {
        assert_eq!(int(1).size(), 1);
        let nested = Value::tuple2(int(1), Value::tuple2(int(2), int(3)));
        assert_eq!(nested.size(), 5);
    }
}
