use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("cache bits {0} out of range [{min}, {max}]", min = crate::cache::MIN_CACHE_BITS, max = crate::cache::MAX_CACHE_BITS)]
    InvalidCacheBits(u8),
    #[error("tried to load non-data address {address} through the cache (opcode at that slot is not 0x00)")]
    NonDataLoad { address: u32 },
    #[error("unknown opcode {opcode} at instruction {instruction_counter}")]
    UnknownOpcode { opcode: u8, instruction_counter: u32 },
    #[error("reached end of file decoding operand for instruction {instruction_counter}")]
    UnexpectedEof { instruction_counter: u32 },
    #[error("division by zero at instruction {instruction_counter}")]
    DivideByZero { instruction_counter: u32 },
}
