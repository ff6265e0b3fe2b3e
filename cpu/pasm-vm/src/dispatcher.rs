//! Fetch/decode/execute loop over a flat RAM image and a [`Cache`].

use pasm_common::sign_extend;

use crate::cache::Cache;
use crate::errors::VmError;
use crate::eventqueue::{CacheEvent, EventQueue};
use crate::opcode::Opcode;
use crate::registers::Registers;

/// The three human-readable lines the visualization surface shows for the
/// instruction just retired: the primary mnemonic line, and up to two
/// follow-on lines for single- and double-indirection addressing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disassembly {
    pub instruction: String,
    pub coinstruction: String,
    pub cocoinstruction: String,
}

pub struct Machine {
    ram: Vec<u8>,
    cache: Cache,
    registers: Registers,
    running: bool,
    operand_size: u8,
}

impl Machine {
    #[must_use]
    pub fn new(ram: Vec<u8>, cache: Cache, operand_size: u8) -> Self {
        Self { ram, cache, registers: Registers::new(), running: true, operand_size }
    }

    #[must_use]
    pub fn instruction_size(&self) -> u8 {
        self.operand_size + 1
    }

    #[must_use]
    pub fn registers(&self) -> Registers {
        self.registers
    }

    /// True while the machine has neither executed `STP` nor run the program
    /// counter off the end of RAM -- the dual halt condition the fetch loop
    /// relies on to know when to stop calling [`Self::step`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running && (self.registers.program_counter as usize) < self.ram.len()
    }

    #[must_use]
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    #[must_use]
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Writes back every dirty cache entry into RAM, matching the
    /// end-of-run flush the original loop performs before disassembling.
    pub fn flush_cache(&mut self) {
        self.cache.flush_all(&mut self.ram, self.instruction_size());
    }

    fn publish_eviction(&self, events: &mut EventQueue, evicted: Option<crate::cache::CacheEntry>) {
        if let Some(entry) = evicted {
            events.enqueue(CacheEvent::writeback(entry));
        }
    }

    /// Reads through the cache, publishing an `Update` event on a cache fill
    /// and a `Writeback` event if filling required evicting a dirty entry.
    fn cache_read(&mut self, address: u32, events: &mut EventQueue) -> Result<u32, VmError> {
        let (value, evicted) = self.cache.populate_or_read(address, &mut self.ram, self.operand_size)?;
        self.publish_eviction(events, evicted);
        events.enqueue(CacheEvent::Update { slot_index: self.cache.index(address), operand: value });
        Ok(value)
    }

    fn cache_store(&mut self, address: u32, value: u32, events: &mut EventQueue) {
        let evicted = self.cache.insert(address, value, true);
        self.publish_eviction(events, evicted);
        events.enqueue(CacheEvent::Update { slot_index: self.cache.index(address), operand: value });
    }

    fn jump_to(&mut self, instruction_index: u32) {
        self.registers.instruction_counter = instruction_index;
        self.registers.program_counter = u64::from(instruction_index) * u64::from(self.instruction_size());
    }

    /// Executes exactly one instruction, advancing `program_counter` and
    /// `instruction_counter`, and returns the disassembly of what ran.
    ///
    /// # Errors
    ///
    /// Returns [`VmError`] if the opcode byte is not a recognized [`Opcode`],
    /// the trailing operand runs past the end of RAM, or a `DIV_DIR`
    /// instruction divides by zero.
    pub fn step(&mut self, events: &mut EventQueue) -> Result<Disassembly, VmError> {
        let pc = self.registers.program_counter as usize;
        let opcode_byte = self.ram[pc];
        self.registers.instruction_counter += 1;
        let retired = self.registers.instruction_counter - 1;

        let operand_end = pc + 1 + usize::from(self.operand_size);
        if operand_end > self.ram.len() {
            return Err(VmError::UnexpectedEof { instruction_counter: retired });
        }

        let mut operand_bytes = [0_u8; 4];
        operand_bytes[..usize::from(self.operand_size)]
            .copy_from_slice(&self.ram[pc + 1..operand_end]);
        let operand = u32::from_le_bytes(operand_bytes);
        self.registers.program_counter = operand_end as u64;

        let opcode = Opcode::from_byte(opcode_byte)
            .ok_or(VmError::UnknownOpcode { opcode: opcode_byte, instruction_counter: retired })?;

        let mut disasm = Disassembly::default();

        match opcode {
            Opcode::LdaImm => {
                self.registers.accumulator = sign_extend(operand, self.operand_size);
                disasm.instruction = format!("[{retired}] LDA_IMM #{}", self.registers.accumulator);
            }
            Opcode::LdaDir => {
                let raw = self.cache_read(operand, events)?;
                self.registers.accumulator = sign_extend(raw, self.operand_size);
                disasm.instruction =
                    format!("[{retired}] LDA_DIR {operand} ({})", self.registers.accumulator);
            }
            Opcode::LdaInd => {
                let indirect_address = self.cache_read(operand, events)?;
                disasm.coinstruction = format!("[{retired}] LDA_IND {operand} ({indirect_address})");
                let raw = self.cache_read(indirect_address, events)?;
                self.registers.accumulator = sign_extend(raw, self.operand_size);
                disasm.instruction = format!("[{retired}] LDA_IND {operand}");
                disasm.cocoinstruction = format!("({})", self.registers.accumulator);
            }
            Opcode::StaDir => {
                let value = self.registers.accumulator as u32;
                self.cache_store(operand, value, events);
                disasm.instruction = format!("[{retired}] STA_DIR {operand}");
            }
            Opcode::StaInd => {
                let target_address = self.cache_read(operand, events)?;
                disasm.coinstruction = format!("[{retired}] STA_IND {operand} ({target_address})");
                let value = self.registers.accumulator as u32;
                self.cache_store(target_address, value, events);
                disasm.instruction = format!("[{retired}] STA_IND {operand}");
            }
            Opcode::AddDir => {
                let raw = self.cache_read(operand, events)?;
                let value = sign_extend(raw, self.operand_size);
                self.registers.accumulator += value;
                disasm.instruction = format!("[{retired}] ADD_DIR {operand} ({value})");
            }
            Opcode::SubDir => {
                let raw = self.cache_read(operand, events)?;
                let value = sign_extend(raw, self.operand_size);
                self.registers.accumulator -= value;
                disasm.instruction = format!("[{retired}] SUB_DIR {operand} ({value})");
            }
            Opcode::MulDir => {
                let raw = self.cache_read(operand, events)?;
                let value = sign_extend(raw, self.operand_size);
                self.registers.accumulator *= value;
                disasm.instruction = format!("[{retired}] MUL_DIR {operand} ({value})");
            }
            Opcode::DivDir => {
                let raw = self.cache_read(operand, events)?;
                let value = sign_extend(raw, self.operand_size);
                if value == 0 {
                    return Err(VmError::DivideByZero { instruction_counter: retired });
                }
                self.registers.accumulator /= value;
                disasm.instruction = format!("[{retired}] DIV_DIR {operand} ({value})");
            }
            Opcode::JmpDir => {
                self.jump_to(operand);
                disasm.instruction = format!("[{retired}] JMP_DIR {operand}");
            }
            Opcode::JmpInd => {
                let target = self.cache_read(operand, events)?;
                disasm.coinstruction = format!("[{retired}] JMP_IND {operand} ({target})");
                self.jump_to(target);
                disasm.instruction = format!("[{retired}] JMP_IND {operand}");
            }
            Opcode::JnzDir => {
                if self.registers.accumulator != 0 {
                    self.jump_to(operand);
                }
                disasm.instruction = format!("[{retired}] JNZ_DIR {operand}");
            }
            Opcode::JnzInd => {
                let target = self.cache_read(operand, events)?;
                disasm.coinstruction = format!("[{retired}] JNZ_IND {operand} ({target})");
                if self.registers.accumulator != 0 {
                    self.jump_to(target);
                }
                disasm.instruction = format!("[{retired}] JNZ_IND {operand}");
            }
            Opcode::JzeDir => {
                if self.registers.accumulator == 0 {
                    self.jump_to(operand);
                }
                disasm.instruction = format!("[{retired}] JZE_DIR {operand}");
            }
            Opcode::JzeInd => {
                let target = self.cache_read(operand, events)?;
                disasm.coinstruction = format!("[{retired}] JZE_IND {operand} ({target})");
                if self.registers.accumulator == 0 {
                    self.jump_to(target);
                }
                disasm.instruction = format!("[{retired}] JZE_IND {operand}");
            }
            Opcode::JleDir => {
                if self.registers.accumulator <= 0 {
                    self.jump_to(operand);
                }
                disasm.instruction = format!("[{retired}] JLE_DIR {operand}");
            }
            Opcode::JleInd => {
                let target = self.cache_read(operand, events)?;
                disasm.coinstruction = format!("[{retired}] JLE_IND {operand} ({target})");
                if self.registers.accumulator <= 0 {
                    self.jump_to(target);
                }
                disasm.instruction = format!("[{retired}] JLE_IND {operand}");
            }
            Opcode::Stp => {
                self.running = false;
                disasm.instruction = format!("[{retired}] STP");
            }
        }

        log::trace!("{}", disasm.instruction);

        Ok(disasm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(ram: Vec<u8>, operand_size: u8) -> Machine {
        let cache = Cache::new(4).unwrap();
        Machine::new(ram, cache, operand_size)
    }

    #[test]
    fn lda_imm_sign_extends_into_accumulator() {
        // LDA_IMM #0xFB (operand_size 1 -> sign-extends to -5), then STP.
        let mut m = machine(vec![10, 0xFB, 99, 0], 1);
        let mut q = EventQueue::new(8);
        m.step(&mut q).unwrap();
        assert_eq!(m.registers().accumulator, -5);
        m.step(&mut q).unwrap();
        assert!(!m.is_running());
    }

    #[test]
    fn sta_dir_then_lda_dir_round_trips_through_cache() {
        // cell 0: data (opcode 0, operand unused) ; cell 1: LDA_IMM 7 ; cell 2: STA_DIR 0 ; cell 3: LDA_DIR 0 ; cell 4: STP
        let mut ram = vec![0_u8; 5 * 2];
        ram[2] = 10;
        ram[3] = 7; // LDA_IMM #7
        ram[4] = 20;
        ram[5] = 0; // STA_DIR 0
        ram[6] = 11;
        ram[7] = 0; // LDA_DIR 0
        ram[8] = 99;
        let mut m = machine(ram, 1);
        m.registers.program_counter = 2;
        m.registers.instruction_counter = 1;
        let mut q = EventQueue::new(8);
        m.step(&mut q).unwrap(); // LDA_IMM 7
        assert_eq!(m.registers().accumulator, 7);
        m.step(&mut q).unwrap(); // STA_DIR 0
        m.step(&mut q).unwrap(); // LDA_DIR 0
        assert_eq!(m.registers().accumulator, 7);
    }

    #[test]
    fn div_dir_by_zero_is_fatal() {
        let mut ram = vec![0_u8; 2 * 2];
        ram[2] = 60;
        ram[3] = 0; // DIV_DIR 0, and cell 0 holds data value 0
        let mut m = machine(ram, 1);
        m.registers.program_counter = 2;
        let mut q = EventQueue::new(8);
        let err = m.step(&mut q).unwrap_err();
        assert!(matches!(err, VmError::DivideByZero { .. }));
    }

    #[test]
    fn unknown_opcode_is_fatal() {
        let ram = vec![0x37, 0];
        let mut m = machine(ram, 1);
        let mut q = EventQueue::new(8);
        let err = m.step(&mut q).unwrap_err();
        assert!(matches!(err, VmError::UnknownOpcode { opcode: 0x37, .. }));
    }

    #[test]
    fn running_off_the_end_of_ram_without_stp_halts_cleanly() {
        // LDA_IMM #1 with no trailing STP: after this one instruction, the
        // program counter sits exactly at ram.len(), not past it.
        let ram = vec![10, 1];
        let mut m = machine(ram, 1);
        let mut q = EventQueue::new(8);
        assert!(m.is_running());
        m.step(&mut q).unwrap();
        assert!(!m.is_running(), "program counter ran off the end of ram without an STP");
    }

    #[test]
    fn jnz_dir_jumps_only_when_accumulator_nonzero() {
        let mut ram = vec![0_u8; 3 * 2];
        ram[0] = 10;
        ram[1] = 1; // LDA_IMM #1
        ram[2] = 80;
        ram[3] = 2; // JNZ_DIR 2
        ram[4] = 99;
        let mut m = machine(ram, 1);
        let mut q = EventQueue::new(8);
        m.step(&mut q).unwrap();
        m.step(&mut q).unwrap();
        assert_eq!(m.registers().instruction_counter, 2);
        assert_eq!(m.registers().program_counter, 4);
    }

    #[test]
    fn truncated_trailing_operand_is_fatal() {
        let ram = vec![10_u8]; // LDA_IMM with no operand byte at all
        let mut m = machine(ram, 1);
        let mut q = EventQueue::new(8);
        let err = m.step(&mut q).unwrap_err();
        assert!(matches!(err, VmError::UnexpectedEof { .. }));
    }
}
