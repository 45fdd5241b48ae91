//! AVM value model.
//!
//! The leaf crate of the machine: tagged values (`Int`, `Tuple`,
//! `CodePoint`, `HashOnly`), the operation and opcode tables, canonical
//! keccak-256 hashing, the big-endian wire codec, 256-bit signed
//! arithmetic helpers, and a disassembler. Everything above (protocol
//! types, the interpreter) builds on these definitions.

pub mod codec;
pub mod disasm;
pub mod num;
pub mod opcode;
pub mod operation;
pub mod value;

pub use codec::{marshal_operation, marshal_value, unmarshal_operation, unmarshal_value, CodecError};
pub use disasm::disassemble;
pub use opcode::Opcode;
pub use operation::Operation;
pub use value::{keccak, link_program, CodePoint, Tuple, Value, ValueError, MAX_TUPLE_SIZE};
