use crate::typedef::*;
use semver::Version;

/// Start of the text segment
pub const TEXT_BASE: Address = 0x0040_0000;
/// Upper bound of the text segment for pointer formatting
pub const TEXT_END: Address = 0x1000_0000;
/// Start of the static data segment
pub const DATA_BASE: Address = 0x1000_0000;
/// Upper bound of the data segment for pointer formatting
pub const DATA_END: Address = 0x7000_0000;
/// Number of bytes backing the data segment
pub const DATA_LEN: u32 = 0x1_0000;
/// The initial stack pointer; the stack grows down from here
pub const STACK_TOP: Address = 0x7FFF_F000;
/// Size of the stack in bytes
pub const STACK_LEN: u32 = 4096;

/// Width of every instruction in bytes
pub const INSTRUCTION_WIDTH: u32 = 4;

/// The hard ceiling on executed instructions per run
pub const INSTRUCTION_LIMIT: usize = 100 * 1000;

/// Message appended to the console after a clean exit
pub const SUCCESS_MESSAGE: &str = "Executed successfully.";

/// ABI register names, indexed by register number
pub const REGISTER_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "fp/s0", "s1", "a0", "a1", "a2", "a3",
    "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3",
    "t4", "t5", "t6",
];

lazy_static! {
    /// The current version of the rvdb crate
    pub static ref VERSION: Version = env!("CARGO_PKG_VERSION")
        .parse()
        .unwrap_or_else(|_| Version::new(0, 0, 0));
}
