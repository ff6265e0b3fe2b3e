/// The machine's visible architectural state: a single accumulator, the
/// program counter (byte offset into RAM), and a running instruction count
/// used for diagnostics and fatal error messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub accumulator: i32,
    pub program_counter: u64,
    pub instruction_counter: u32,
}

impl Registers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zeroed() {
        let regs = Registers::new();
        assert_eq!(regs.accumulator, 0);
        assert_eq!(regs.program_counter, 0);
        assert_eq!(regs.instruction_counter, 0);
    }
}
