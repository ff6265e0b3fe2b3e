use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("I/O error reading program file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid magic number, expected 'EMUL'")]
    BadMagic,
    #[error("operand size {0} out of range [{min}, {max}]", min = crate::header::MIN_OPERAND_SIZE, max = crate::header::MAX_OPERAND_SIZE)]
    OperandSizeOutOfRange(u8),
    #[error("memory size {0} out of range [{min}, {max}]", min = crate::header::MIN_MEMORY_SIZE, max = crate::header::MAX_MEMORY_SIZE)]
    MemorySizeOutOfRange(u32),
    #[error("program body size {body_size}B exceeds maximum program size of {max}B", max = crate::header::MAX_PROGRAM_SIZE)]
    ProgramTooLarge { body_size: u64 },
    #[error("program body size {body_size}B exceeds specified memory size of {memory_bytes}B")]
    ExceedsMemorySize { body_size: u64, memory_bytes: u64 },
    #[error("truncated trailing record at instruction {instruction_counter}: expected an operand of {expected} byte(s)")]
    TruncatedRecord { instruction_counter: u32, expected: u8 },
    #[error(
        "requested memory size {requested} is not in range [{min}, {max}]",
        min = crate::header::MIN_MEMORY_SIZE,
        max = crate::header::MAX_MEMORY_SIZE
    )]
    OverwriteMemorySizeOutOfRange { requested: u32 },
    #[error(
        "requested operand size {requested} is not in range [{min}, {max}]",
        min = crate::header::MIN_OPERAND_SIZE,
        max = crate::header::MAX_OPERAND_SIZE
    )]
    OverwriteOperandSizeOutOfRange { requested: u8 },
}
