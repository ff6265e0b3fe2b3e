pub mod cache;
pub mod dispatcher;
pub mod errors;
pub mod eventqueue;
pub mod opcode;
pub mod registers;

pub use cache::{Cache, CacheEntry};
pub use dispatcher::{Disassembly, Machine};
pub use errors::VmError;
pub use eventqueue::{CacheEvent, EventQueue};
pub use opcode::Opcode;
pub use registers::Registers;
