use crate::engine::MemWrite;
use crate::testsuite::TestResult;
use crate::typedef::*;
use std::fmt;

/// A call recorded on the shadow stack, resolved to a name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowEntry {
    /// The label of the called function, or its address in hex
    pub name: String,
    /// `a0`..`a7` at the time of the call
    pub args: [Word; 8],
    /// The stack pointer at the time of the call
    pub sp: Word,
}

impl fmt::Display for ShadowEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} args=", self.name)?;

        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "0x{:x}", arg)?;
        }

        write!(f, " sp=0x{:08x}", self.sp)
    }
}

/// What the session is doing right now
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Status {
    /// Nothing is running; the last build (if any) succeeded
    Idle,
    /// A run to completion is in progress
    Running {
        pc: Address,
        regs: [Word; 32],
        console_text: String,
    },
    /// Paused inside a debug session
    Debug {
        pc: Address,
        regs: [Word; 32],
        shadow_stack: Vec<ShadowEntry>,
        console_text: String,
        mem_written: MemWrite,
    },
    /// A run ended with a runtime error
    Error {
        pc: Address,
        regs: [Word; 32],
        shadow_stack: Vec<ShadowEntry>,
        console_text: String,
    },
    /// A run ended cleanly
    Stopped {
        pc: Address,
        regs: [Word; 32],
        console_text: String,
    },
    /// The last build failed
    AsmError {
        line: usize,
        message: String,
        console_text: String,
    },
    /// The test harness finished
    TestSuite { table: Vec<TestResult> },
}

impl Status {
    /// Turns an assembler diagnostic into a status
    pub fn asm_error(err: AsmError) -> Status {
        Status::AsmError {
            console_text: err.to_string(),
            line: err.line,
            message: err.message,
        }
    }

    /// The console text shown for this status
    pub fn console_text(&self) -> &str {
        match self {
            Status::Idle | Status::TestSuite { .. } => "",
            Status::Running { console_text, .. }
            | Status::Debug { console_text, .. }
            | Status::Error { console_text, .. }
            | Status::Stopped { console_text, .. }
            | Status::AsmError { console_text, .. } => console_text,
        }
    }

    /// The program counter, if the status has one
    pub fn pc(&self) -> Option<Address> {
        match *self {
            Status::Running { pc, .. }
            | Status::Debug { pc, .. }
            | Status::Error { pc, .. }
            | Status::Stopped { pc, .. } => Some(pc),
            _ => None,
        }
    }

    /// The register file, if the status has one
    pub fn regs(&self) -> Option<&[Word; 32]> {
        match self {
            Status::Running { regs, .. }
            | Status::Debug { regs, .. }
            | Status::Error { regs, .. }
            | Status::Stopped { regs, .. } => Some(regs),
            _ => None,
        }
    }

    /// The named shadow stack of a paused or failed run
    pub fn shadow_stack(&self) -> Option<&[ShadowEntry]> {
        match self {
            Status::Debug { shadow_stack, .. } | Status::Error { shadow_stack, .. } => {
                Some(shadow_stack)
            }
            _ => None,
        }
    }

    /// Whether this is a paused debug session
    pub fn is_debug(&self) -> bool {
        match self {
            Status::Debug { .. } => true,
            _ => false,
        }
    }

    /// A short lowercase name, e.g. for logging
    pub fn name(&self) -> &'static str {
        match self {
            Status::Idle => "idle",
            Status::Running { .. } => "running",
            Status::Debug { .. } => "debug",
            Status::Error { .. } => "error",
            Status::Stopped { .. } => "stopped",
            Status::AsmError { .. } => "asmerr",
            Status::TestSuite { .. } => "testsuite",
        }
    }
}

/// The observable state of a session. `version` grows with every transition.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeState {
    /// Bumped on every transition
    pub version: u64,
    /// The current status
    pub status: Status,
}

impl Default for RuntimeState {
    fn default() -> Self {
        RuntimeState {
            version: 0,
            status: Status::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_text_per_status() {
        let err = AsmError::new(3, "invalid register");
        let status = Status::asm_error(err);

        assert_eq!(status.console_text(), "Error on line 3: invalid register");
        assert_eq!(Status::Idle.console_text(), "");
        assert_eq!(Status::TestSuite { table: vec![] }.console_text(), "");
        assert_eq!(status.pc(), None);
        assert_eq!(status.name(), "asmerr");
    }

    #[test]
    fn shadow_entry_display() {
        let entry = ShadowEntry {
            name: "fact".into(),
            args: [5, 0, 0, 0, 0, 0, 0, 0x10],
            sp: 0x7fff_eff0,
        };

        assert_eq!(
            entry.to_string(),
            "fact args=0x5,0x0,0x0,0x0,0x0,0x0,0x0,0x10 sp=0x7fffeff0"
        );
    }
}
