//! The contract between the debug session and an instruction stepping engine.
//!
//! An engine assembles source text, executes exactly one instruction per [`Engine::step`] and
//! exposes its state through read-only accessors. It has no notion of breakpoints, reverse
//! execution or sessions; all of that lives in the controller. Engines are `Clone` so the
//! adapter can keep a post-build snapshot to rewind to.

use crate::typedef::*;
use std::fmt;

/// The runtime error classes an engine reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// The program counter left the assembled code
    PcOutOfRange = 1,
    /// A load from an unmapped address
    BadLoad = 2,
    /// A store to an unmapped or read-only address
    BadStore = 3,
    /// The word at the program counter is not a supported instruction
    UnhandledInstruction = 4,
    /// A register was read before anything was written to it
    UninitializedRegister = 5,
    /// A callee-saved register differs between function entry and return
    CalleeSavedMismatch = 6,
    /// `sp` differs between function entry and return
    StackPointerMismatch = 7,
    /// `ra` differs between function entry and return
    ReturnAddressMismatch = 8,
    /// A return without a matching call
    ReturnWithoutCall = 9,
    /// A stack word read before the current function wrote it
    UninitializedStackRead = 10,
}

impl FaultKind {
    /// The numeric code of the fault kind
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Whether the fault comes from the calling-convention sanitizer
    pub fn is_sanitizer(self) -> bool {
        self.code() >= FaultKind::UninitializedRegister.code()
    }
}

/// A runtime error together with its (up to two) parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fault {
    /// What went wrong
    pub kind: FaultKind,
    /// Kind specific parameters, e.g. the faulting address or the register number
    pub params: [Word; 2],
}

impl Fault {
    /// A fault with no parameters
    pub fn new(kind: FaultKind) -> Fault {
        Fault {
            kind,
            params: [0, 0],
        }
    }

    /// A fault with one parameter
    pub fn with(kind: FaultKind, first: Word) -> Fault {
        Fault {
            kind,
            params: [first, 0],
        }
    }

    /// A fault with two parameters
    pub fn with_both(kind: FaultKind, first: Word, second: Word) -> Fault {
        Fault {
            kind,
            params: [first, second],
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fault {} ({:?}) {:#x} {:#x}",
            self.kind.code(),
            self.kind,
            self.params[0],
            self.params[1]
        )
    }
}

/// One record of the engine's shadow call stack
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawFrame {
    /// The entry address of the called function
    pub pc: Address,
    /// The stack pointer at the time of the call
    pub sp: Word,
    /// `a0`..`a7` at the time of the call
    pub args: [Word; 8],
}

/// The memory range written by the last executed instruction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemWrite {
    /// First byte written
    pub addr: Address,
    /// Number of bytes written, zero if nothing was written
    pub len: u32,
}

impl MemWrite {
    /// Whether the given address lies inside the written range
    pub fn contains(&self, addr: Address) -> bool {
        addr >= self.addr && u64::from(addr) < u64::from(self.addr) + u64::from(self.len)
    }
}

/// Which register last wrote a stack word
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    /// The word has not been written in the current function
    Unwritten,
    /// The word was written from the given register number
    Register(u8),
}

/// An instruction stepping engine
pub trait Engine: Clone {
    /// Assembles `source` and leaves the engine ready at the program's entry address.
    /// Every execution flag is reset.
    fn build(&mut self, source: &str) -> ::std::result::Result<(), AsmError>;

    /// Executes exactly one instruction. Does nothing once the program exited or faulted.
    fn step(&mut self);

    /// Whether the program terminated cleanly
    fn exited(&self) -> bool;

    /// The runtime error raised by the last step, if any
    fn fault(&self) -> Option<Fault>;

    /// The program counter. On a fault it points at the faulting instruction.
    fn pc(&self) -> Address;

    /// The integer registers, `x0` included
    fn regs(&self) -> &[Word; 32];

    /// Reads 1, 2 or 4 bytes. `None` for unmapped addresses.
    fn load(&self, addr: Address, width: u32) -> Option<Word>;

    /// Disassembles the word at the given address
    fn disassemble(&self, addr: Address) -> String;

    /// The label naming an address, if there is one
    fn label_at(&self, addr: Address) -> Option<String>;

    /// The source line of every instruction word, in address order
    fn line_table(&self) -> &[u32];

    /// The shadow call stack, outermost call first
    fn shadow_stack(&self) -> &[RawFrame];

    /// Takes the console output produced since the last call
    fn take_output(&mut self) -> String;

    /// The memory range written by the last instruction
    fn last_mem_write(&self) -> MemWrite;

    /// The register written by the last instruction, 0 if none
    fn last_reg_written(&self) -> u8;

    /// Optional write tracking for stack words
    fn stack_provenance(&self, _addr: Address) -> Option<Provenance> {
        None
    }

    /// The sizes of the assembled text and data segments in bytes
    fn image_size(&self) -> (u64, u64) {
        (0, 0)
    }
}
