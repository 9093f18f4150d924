use crate::instruction::Register;
use crate::vm::Cpu;
use std::fmt::Write;

/// What the engine does after an environment call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysCall {
    /// Continue with the next instruction
    Continue,
    /// The program asked to terminate
    Exit,
    /// The call number is not supported; the `ecall` is treated as an unhandled instruction
    Unsupported,
}

#[allow(unused_variables)]
/// An interface to answer `ecall`s issued by the program
///
/// # Example
///
/// A system that only knows how to exit and to print a single character:
///
/// ```
/// use rvdb::{Cpu, Register, SysCall, System};
///
/// #[derive(Clone, Default)]
/// pub struct TinySystem;
///
/// impl System for TinySystem {
///     const ID: &'static str = "__TINY__";
///
///     fn system_call(&mut self, cpu: &mut Cpu, signal: u32) -> SysCall {
///         match signal {
///             10 => SysCall::Exit,
///             11 => {
///                 let c = cpu.reg(Register::A0) as u8 as char;
///                 cpu.output.push(c);
///                 SysCall::Continue
///             }
///             _ => SysCall::Unsupported,
///         }
///     }
/// }
/// ```
pub trait System: Clone {
    /// A unique ID to identify the System
    const ID: &'static str;

    /// Prepare the state of the CPU right after a program was loaded
    fn prepare(&mut self, cpu: &mut Cpu) {}

    /// React to an `ecall`, where `signal` is the value of `a7`
    fn system_call(&mut self, cpu: &mut Cpu, signal: u32) -> SysCall;
}

/// The console environment: printing numbers, strings and characters, and exiting
#[derive(Clone, Debug, Default)]
pub struct ConsoleSystem;

/// Print `a0` as a signed decimal integer
pub const PRINT_INT: u32 = 1;
/// Print the NUL terminated string at `a0`
pub const PRINT_STRING: u32 = 4;
/// Exit the program
pub const EXIT: u32 = 10;
/// Print the low byte of `a0` as a character
pub const PRINT_CHAR: u32 = 11;
/// Print `a0` as hexadecimal
pub const PRINT_HEX: u32 = 34;
/// Exit the program, Linux numbering
pub const EXIT_LINUX: u32 = 93;

/// Longest string `PRINT_STRING` will print
const MAX_STRING_LEN: usize = 4096;

impl System for ConsoleSystem {
    const ID: &'static str = "__CONSOLE__";

    fn system_call(&mut self, cpu: &mut Cpu, signal: u32) -> SysCall {
        let a0 = cpu.reg(Register::A0);

        match signal {
            PRINT_INT => {
                let _ = write!(cpu.output, "{}", a0 as i32);
            }
            PRINT_STRING => {
                let bytes = (0..MAX_STRING_LEN as u32)
                    .map(|i| cpu.mem.read_u8(a0.wrapping_add(i)))
                    .take_while(|b| b.map_or(false, |b| b != 0))
                    .filter_map(|b| b)
                    .collect::<Vec<u8>>();

                cpu.output.push_str(&String::from_utf8_lossy(&bytes));
            }
            PRINT_CHAR => cpu.output.push(a0 as u8 as char),
            PRINT_HEX => {
                let _ = write!(cpu.output, "0x{:08x}", a0);
            }
            EXIT | EXIT_LINUX => return SysCall::Exit,
            _ => return SysCall::Unsupported,
        }

        SysCall::Continue
    }
}
