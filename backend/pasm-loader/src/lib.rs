//! Loads a `.p` program image: header validation, RAM allocation, and
//! per-record decoding with cache priming for data cells.

pub mod errors;
pub mod header;
pub mod reader;

use std::io::Read;

pub use errors::LoaderError;
pub use header::Header;
use pasm_common::sign_extend;
use pasm_vm::Cache;

/// The decoded program, ready to hand to a [`pasm_vm::Machine`].
#[derive(Debug)]
pub struct LoadedProgram {
    pub ram: Vec<u8>,
    pub operand_size: u8,
    pub memory_size: u32,
}

/// Loads a program from `reader` into `cache`, applying the bridge's
/// memory/operand size overrides (`None` keeps the header's own values).
///
/// # Errors
///
/// Returns [`LoaderError`] on a bad magic number, an out-of-range header or
/// override value, an oversized program body, or a truncated trailing
/// record.
pub fn load<R: Read>(
    reader: &mut R,
    cache: &mut Cache,
    overwrite_memory_size: Option<u32>,
    overwrite_operand_size: Option<u8>,
) -> Result<LoadedProgram, LoaderError> {
    let file_header = Header::read_from(reader)?;

    let operand_size = match overwrite_operand_size {
        Some(requested) => {
            if !(header::MIN_OPERAND_SIZE..=header::MAX_OPERAND_SIZE).contains(&requested) {
                return Err(LoaderError::OverwriteOperandSizeOutOfRange { requested });
            }
            requested
        }
        None => file_header.operand_size,
    };
    let memory_size = match overwrite_memory_size {
        Some(requested) => {
            if !(header::MIN_MEMORY_SIZE..=header::MAX_MEMORY_SIZE).contains(&requested) {
                return Err(LoaderError::OverwriteMemorySizeOutOfRange { requested });
            }
            requested
        }
        None => file_header.memory_size,
    };
    let instruction_size = operand_size + 1;

    log::info!(
        "validated header: operand_size={operand_size}B, memory_size={memory_size} slots"
    );

    let body = reader::read_body_adaptive(reader)?;
    let body_size = body.len() as u64;

    let max_program_bytes = header::MAX_PROGRAM_SIZE * u64::from(instruction_size);
    if body_size > max_program_bytes {
        return Err(LoaderError::ProgramTooLarge { body_size });
    }

    // memory_size is the last valid instruction index, not a count.
    let declared_slots = u64::from(memory_size) + 1;
    let declared_bytes = declared_slots * u64::from(instruction_size);
    if body_size > declared_bytes {
        return Err(LoaderError::ExceedsMemorySize { body_size, memory_bytes: declared_bytes });
    }

    let ram_len = body_size.max(declared_bytes) as usize;
    let mut ram = vec![0_u8; ram_len];

    let mut instruction_counter: u32 = 0;
    let mut offset = 0_usize;
    while offset < body.len() {
        let opcode = body[offset];
        let operand_start = offset + 1;
        let operand_end = operand_start + usize::from(operand_size);
        if operand_end > body.len() {
            return Err(LoaderError::TruncatedRecord {
                instruction_counter,
                expected: operand_size,
            });
        }

        let mut operand_bytes = [0_u8; 4];
        operand_bytes[..usize::from(operand_size)]
            .copy_from_slice(&body[operand_start..operand_end]);
        let operand = u32::from_le_bytes(operand_bytes);

        if opcode == 0 {
            let signed = sign_extend(operand, operand_size);
            let value = signed as u32;
            if value != 0 || !cache.will_overwrite(instruction_counter) {
                cache.insert(instruction_counter, value, false);
            }
        }

        let ram_index = instruction_counter as usize * usize::from(instruction_size);
        ram[ram_index] = opcode;
        ram[ram_index + 1..ram_index + 1 + usize::from(operand_size)]
            .copy_from_slice(&operand_bytes[..usize::from(operand_size)]);

        instruction_counter += 1;
        offset = operand_end;
    }

    log::info!("program loaded into RAM ({ram_len} bytes)");

    Ok(LoadedProgram { ram, operand_size, memory_size })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(operand_size: u8, memory_size: u32) -> Vec<u8> {
        let mut bytes = Vec::from(*b"EMUL");
        bytes.push(operand_size);
        bytes.extend_from_slice(&memory_size.to_le_bytes());
        bytes
    }

    #[test]
    fn loads_simple_program_and_primes_cache() {
        let mut bytes = header_bytes(1, 2); // operand_size 1, 3 slots total
        bytes.extend_from_slice(&[10, 5]); // LDA_IMM #5
        bytes.extend_from_slice(&[99, 0]); // STP
        bytes.extend_from_slice(&[0, 7]); // data cell, value 7

        let mut cache = Cache::new(2).unwrap();
        let program = load(&mut &bytes[..], &mut cache, None, None).unwrap();

        assert_eq!(program.operand_size, 1);
        assert_eq!(program.memory_size, 2);
        assert_eq!(program.ram, vec![10, 5, 99, 0, 0, 7]);
        assert_eq!(cache.lookup(2), Some(7));
    }

    #[test]
    fn zero_value_data_cell_is_not_primed() {
        let mut bytes = header_bytes(1, 0);
        bytes.extend_from_slice(&[0, 0]); // data cell, value 0 -- matches the empty sentinel

        let mut cache = Cache::new(2).unwrap();
        load(&mut &bytes[..], &mut cache, None, None).unwrap();
        assert_eq!(cache.lookup(0), None);
    }

    #[test]
    fn zero_value_data_cell_does_not_clobber_a_primed_collision() {
        // cache_bits=1 -> 2 slots, so instruction indices 2 and 4 both hash to slot 0.
        let mut bytes = header_bytes(1, 4); // 5 slots total
        bytes.extend_from_slice(&[99, 0]); // 0: STP (unused, just padding)
        bytes.extend_from_slice(&[99, 0]); // 1: STP (unused, just padding)
        bytes.extend_from_slice(&[0, 5]); // 2: data cell, value 5 -- primes slot 0
        bytes.extend_from_slice(&[99, 0]); // 3: STP (unused, just padding)
        bytes.extend_from_slice(&[0, 0]); // 4: data cell, value 0 -- collides with index 2

        let mut cache = Cache::new(1).unwrap();
        load(&mut &bytes[..], &mut cache, None, None).unwrap();
        assert_eq!(cache.lookup(2), Some(5), "zero-valued collision must not evict the primed value");
    }

    #[test]
    fn truncated_trailing_record_is_an_error() {
        let mut bytes = header_bytes(2, 0);
        bytes.push(10); // opcode with no operand bytes at all

        let mut cache = Cache::new(2).unwrap();
        let err = load(&mut &bytes[..], &mut cache, None, None).unwrap_err();
        assert!(matches!(err, LoaderError::TruncatedRecord { instruction_counter: 0, .. }));
    }

    #[test]
    fn overwrite_operand_size_out_of_range_is_rejected() {
        let bytes = header_bytes(1, 0);
        let mut cache = Cache::new(2).unwrap();
        let err = load(&mut &bytes[..], &mut cache, None, Some(9)).unwrap_err();
        assert!(matches!(err, LoaderError::OverwriteOperandSizeOutOfRange { requested: 9 }));
    }

    #[test]
    fn body_exceeding_declared_memory_size_is_rejected() {
        let mut bytes = header_bytes(1, 0); // declares exactly 2 slots (memory_size=0 -> 2 bytes)
        bytes.extend_from_slice(&[10, 1, 10, 2]); // two records, 4 bytes total

        let mut cache = Cache::new(2).unwrap();
        let err = load(&mut &bytes[..], &mut cache, None, None).unwrap_err();
        assert!(matches!(err, LoaderError::ExceedsMemorySize { .. }));
    }
}
