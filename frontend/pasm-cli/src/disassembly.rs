//! The final, whole-memory disassembly pass printed after a run halts --
//! distinct from the per-instruction [`pasm_vm::Disassembly`] the dispatcher
//! emits while running.

use std::fmt;

use pasm_common::sign_extend;
use pasm_vm::Opcode;

/// One decoded memory slot, formatted the way the final whole-memory pass
/// prints it: a data cell (opcode `0x00`) shows its sign-extended value,
/// anything else shows its mnemonic and raw operand.
struct DisassembledInstruction<'a> {
    mnemonic: &'a str,
    operand: u32,
    signed_operand: Option<i32>,
}

impl fmt::Display for DisassembledInstruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.mnemonic;
        match self.signed_operand {
            Some(value) => write!(f, "Instruction: {name:<7} Operand: {value} (Signed)"),
            None => write!(f, "Instruction: {name:<7} Operand: {} (Unsigned)", self.operand),
        }
    }
}

/// Renders every instruction slot in `ram` as one line, stopping early (with
/// a diagnostic) if the final slot doesn't have room for a full instruction.
#[must_use]
pub fn disassemble_all(ram: &[u8], operand_size: u8) -> Vec<String> {
    let instruction_size = usize::from(operand_size) + 1;
    let mut lines = Vec::new();
    let mut offset = 0_usize;

    while offset < ram.len() {
        if offset + instruction_size > ram.len() {
            lines.push(format!("Incomplete instruction at offset {offset}. Skipping."));
            break;
        }

        let opcode = ram[offset];
        let mut operand_bytes = [0_u8; 4];
        operand_bytes[..usize::from(operand_size)]
            .copy_from_slice(&ram[offset + 1..offset + 1 + usize::from(operand_size)]);
        let operand = u32::from_le_bytes(operand_bytes);

        let mnemonic = Opcode::from_byte(opcode).map_or("UNKNOWN", Opcode::mnemonic);
        let instruction = DisassembledInstruction {
            mnemonic,
            operand,
            signed_operand: (opcode == 0).then(|| sign_extend(operand, operand_size)),
        };
        lines.push(instruction.to_string());

        offset += instruction_size;
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassembles_known_and_data_cells() {
        let ram = vec![10, 5, 0, 0xFB, 99, 0];
        let lines = disassemble_all(&ram, 1);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Instruction: LDA_IMM"));
        assert!(lines[1].contains("-5"), "{}", lines[1]);
        assert!(lines[2].starts_with("Instruction: STP"));
    }

    #[test]
    fn unknown_opcode_is_reported() {
        let ram = vec![0x37, 0];
        let lines = disassemble_all(&ram, 1);
        assert!(lines[0].starts_with("Instruction: UNKNOWN"));
    }

    #[test]
    fn incomplete_trailing_instruction_is_reported() {
        let ram = vec![10];
        let lines = disassemble_all(&ram, 1);
        assert!(lines[0].starts_with("Incomplete instruction"));
    }
}
