//! Disassembler — human-readable listing of an instruction stream.

use crate::operation::Operation;
use crate::value::Value;

/// Render a program as one line per instruction: index, opcode byte,
/// mnemonic, and a short immediate preview.
pub fn disassemble(ops: &[Operation]) -> String {
    let mut out = String::new();
    for (i, op) in ops.iter().enumerate() {
        let line = match op {
            Operation::Basic(oc) => format!("{:04}  {:02x}  {:?}", i, *oc as u8, oc),
            Operation::Immediate(oc, imm) => {
                format!("{:04}  {:02x}  {:?} {}", i, *oc as u8, oc, preview(imm))
            }
        };
        out.push_str(&line);
        out.push('\n');
    }
    if out.is_empty() {
        out.push_str("(empty program)\n");
    }
    out
}

fn preview(v: &Value) -> String {
    let full = v.to_string();
    if full.len() <= 48 {
        full
    } else {
        let digest = hex::encode(&v.hash().as_bytes()[..8]);
        format!("<{} nodes, {}…>", v.size(), digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::Opcode;

    #[test]
    fn disasm_empty() {
        assert_eq!(disassemble(&[]), "(empty program)\n");
    }

    #[test]
    fn disasm_basic_and_immediate() {
        let ops = vec![
            Operation::Immediate(Opcode::Nop, Value::int(2u64)),
            Operation::Immediate(Opcode::Add, Value::int(4u64)),
            Operation::Basic(Opcode::Log),
            Operation::Basic(Opcode::Halt),
        ];
        let out = disassemble(&ops);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "0000  3b  Nop 2");
        assert_eq!(lines[1], "0001  01  Add 4");
        assert_eq!(lines[2], "0002  61  Log");
        assert_eq!(lines[3], "0003  75  Halt");
    }

    #[test]
    fn disasm_truncates_large_immediates() {
        let mut v = Value::none();
        for i in 0..20u64 {
            v = Value::tuple2(Value::int(i), v);
        }
        let ops = vec![Operation::Immediate(Opcode::Nop, v)];
        let out = disassemble(&ops);
        assert!(out.contains("nodes"), "expected truncated preview: {out}");
    }
}
