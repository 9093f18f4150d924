use crate::backtrace::convert_number;
use crate::consts::*;
use crate::engine::{Engine, Fault, FaultKind};
use crate::typedef::*;
use std::fmt::Write;
use tracing::{debug, trace};

/// Wraps an engine with the bookkeeping the session needs: the console text, the error flag,
/// the executed instruction counter and the snapshot taken right after a successful build.
#[derive(Clone, Debug)]
pub struct Adapter<E: Engine> {
    engine: E,
    snapshot: Option<E>,
    console: String,
    has_error: bool,
    executed: usize,
    limit: usize,
}

impl<E: Engine + Default> Default for Adapter<E> {
    fn default() -> Self {
        Adapter::new(E::default())
    }
}

impl<E: Engine> Adapter<E> {
    /// Wraps the given engine
    pub fn new(engine: E) -> Adapter<E> {
        Adapter {
            engine,
            snapshot: None,
            console: String::new(),
            has_error: false,
            executed: 0,
            limit: INSTRUCTION_LIMIT,
        }
    }

    /// Changes the instruction ceiling of a single run
    pub fn set_instruction_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    /// The instruction ceiling of a single run
    pub fn instruction_limit(&self) -> usize {
        self.limit
    }

    /// Assembles `source` and takes the post-build snapshot
    pub fn build(&mut self, source: &str) -> ::std::result::Result<(), AsmError> {
        self.console.clear();
        self.has_error = false;
        self.executed = 0;
        self.snapshot = None;

        self.engine.build(source)?;
        self.snapshot = Some(self.engine.clone());

        debug!(bytes = source.len(), "program assembled");

        Ok(())
    }

    /// Executes one instruction and records its console output and any runtime error
    pub fn run_one_instruction(&mut self) {
        self.engine.step();
        self.console.push_str(&self.engine.take_output());
        self.executed += 1;

        if self.executed > self.limit {
            let _ = writeln!(self.console, "ERROR: instruction limit {} reached", self.limit);
            self.has_error = true;
        } else if let Some(fault) = self.engine.fault() {
            let message = self.fault_message(fault);
            trace!(%fault, "runtime error");
            self.console.push_str(&message);
            self.has_error = true;
        }
    }

    /// Renders a runtime error the way it appears on the console
    pub fn fault_message(&self, fault: Fault) -> String {
        let pc = format!("PC=0x{:x}", self.engine.pc());
        let [first, second] = fault.params;
        let reg_name = |index: Word| REGISTER_NAMES.get(index as usize).cloned().unwrap_or("??");
        let current = |index: Word| {
            let value = self.engine.regs().get(index as usize).cloned().unwrap_or(0);
            convert_number(value, false)
        };

        match fault.kind {
            FaultKind::PcOutOfRange => {
                let hint = if self.engine.shadow_stack().is_empty() {
                    "The program may be missing an exit syscall"
                } else {
                    "This may be caused by a bad jump address or a missing return instruction"
                };

                format!(
                    "ERROR: Program counter moved outside valid code ({})\nHint: {}\n",
                    pc, hint
                )
            }
            FaultKind::BadLoad => format!(
                "ERROR: cannot load from address 0x{} at {}\n",
                convert_number(first, false),
                pc
            ),
            FaultKind::BadStore => format!(
                "ERROR: cannot store to address 0x{} at {}\n",
                convert_number(first, false),
                pc
            ),
            FaultKind::UnhandledInstruction => format!("ERROR: unhandled instruction at {}\n", pc),
            FaultKind::UninitializedRegister => format!(
                "CallSan: {}\nAttempted to read from uninitialized register {}. \
                 Check the calling convention!\n",
                pc,
                reg_name(first)
            ),
            FaultKind::CalleeSavedMismatch => format!(
                "CallSan: {}\nCallee-saved register {} has different value at the beginning \
                 and end of the function.\nPrev: {}\nCurr: {}\nCheck the calling convention!\n",
                pc,
                reg_name(first),
                convert_number(second, false),
                current(first)
            ),
            FaultKind::StackPointerMismatch | FaultKind::ReturnAddressMismatch => {
                let reg = if fault.kind == FaultKind::StackPointerMismatch {
                    2
                } else {
                    1
                };

                format!(
                    "CallSan: {}\nRegister {} has different value at the beginning and end of \
                     the function.\nPrev: {}\nCurr: {}\nCheck the calling convention!\n",
                    pc,
                    reg_name(reg),
                    convert_number(second, false),
                    current(reg)
                )
            }
            FaultKind::ReturnWithoutCall => {
                format!("CallSan: {}\nReturn without matching call!\n", pc)
            }
            FaultKind::UninitializedStackRead => format!(
                "CallSan: {}\nAttempted to read from stack address 0x{}, which hasn't been \
                 written to in the current function.\n",
                pc,
                convert_number(first, false)
            ),
        }
    }

    /// Restores the post-build snapshot and forgets everything that happened since
    pub fn reset_to_snapshot(&mut self) {
        if let Some(ref snapshot) = self.snapshot {
            self.engine = snapshot.clone();
        }

        self.console.clear();
        self.has_error = false;
        self.executed = 0;
    }

    /// Replays the first `n` instructions from the snapshot, stopping early if the run ends
    pub fn execute_n(&mut self, n: usize) {
        self.reset_to_snapshot();

        for _ in 0..n {
            self.run_one_instruction();

            if self.has_error || self.engine.exited() {
                break;
            }
        }
    }

    /// Goes back one instruction by replaying all but the last one. Returns `false` if nothing
    /// was executed since the build.
    pub fn reverse_step(&mut self) -> bool {
        if self.executed == 0 {
            return false;
        }

        let replay = self.executed - 1;
        trace!(replay, "replaying from snapshot");
        self.execute_n(replay);

        true
    }

    /// Appends the success notice after a clean exit
    pub fn append_success(&mut self) {
        if !self.console.is_empty() && !self.console.ends_with('\n') {
            self.console.push('\n');
        }

        self.console.push_str(SUCCESS_MESSAGE);
    }

    /// Reads 1, 2 or 4 bytes of engine memory
    pub fn load(&self, addr: Address, width: u32) -> Option<Word> {
        self.engine.load(addr, width)
    }

    /// Disassembles the instruction at `addr`
    pub fn disassemble(&self, addr: Address) -> String {
        self.engine.disassemble(addr)
    }

    /// The label at `pc`, or its hexadecimal address
    pub fn label_for(&self, pc: Address) -> String {
        self.engine
            .label_at(pc)
            .unwrap_or_else(|| format!("0x{:x}", pc))
    }

    /// The source line of the instruction at `pc`
    pub fn line_at(&self, pc: Address) -> Option<u32> {
        if pc < TEXT_BASE || pc % INSTRUCTION_WIDTH != 0 {
            return None;
        }

        self.engine
            .line_table()
            .get(((pc - TEXT_BASE) / INSTRUCTION_WIDTH) as usize)
            .cloned()
    }

    /// The wrapped engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Everything the program printed, plus runtime error messages
    pub fn console(&self) -> &str {
        &self.console
    }

    /// Whether the current run ended with a runtime error
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    /// Whether the program terminated cleanly
    pub fn exited(&self) -> bool {
        !self.has_error && self.engine.exited()
    }

    /// Whether the run is over, one way or another
    pub fn finished(&self) -> bool {
        self.has_error || self.engine.exited()
    }

    /// Number of instructions executed since the build
    pub fn executed(&self) -> usize {
        self.executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Vm;

    mod helper {
        use super::*;

        pub fn adapter(source: &str) -> Adapter<Vm> {
            let mut adapter = Adapter::default();
            adapter.build(source).unwrap();
            adapter
        }

        pub fn run(adapter: &mut Adapter<Vm>) {
            while !adapter.finished() {
                adapter.run_one_instruction();
            }
        }
    }

    const HELLO: &str = "_start:\n\
                         la a0, msg\n\
                         li a7, 4\n\
                         ecall\n\
                         li a7, 10\n\
                         ecall\n\
                         .data\n\
                         msg: .asciz \"hi\"\n";

    #[test]
    fn console_collects_output() {
        let mut adapter = helper::adapter(HELLO);
        helper::run(&mut adapter);

        assert!(adapter.exited());
        assert_eq!(adapter.console(), "hi");
        assert_eq!(adapter.executed(), 6);

        adapter.append_success();
        assert_eq!(adapter.console(), "hi\nExecuted successfully.");
    }

    #[test]
    fn build_errors_are_reported() {
        let mut adapter: Adapter<Vm> = Adapter::default();
        let err = adapter.build("nop\nfrobnicate a0\n").unwrap_err();

        assert_eq!(err.line, 2);
        assert_eq!(err.to_string(), format!("Error on line 2: {}", err.message));
    }

    #[test]
    fn instruction_limit() {
        let mut adapter = helper::adapter("loop:\nj loop\n");
        adapter.set_instruction_limit(50);
        helper::run(&mut adapter);

        assert!(adapter.has_error());
        assert_eq!(adapter.executed(), 51);
        assert_eq!(adapter.console(), "ERROR: instruction limit 50 reached\n");
    }

    #[test]
    fn fault_messages() {
        let mut adapter = helper::adapter("li t0, 0\nlw t1, 0(t0)\n");
        helper::run(&mut adapter);
        assert_eq!(
            adapter.console(),
            "ERROR: cannot load from address 0x00000000 at PC=0x400004\n"
        );

        let mut adapter = helper::adapter("nop\n");
        helper::run(&mut adapter);
        assert_eq!(
            adapter.console(),
            "ERROR: Program counter moved outside valid code (PC=0x400004)\n\
             Hint: The program may be missing an exit syscall\n"
        );

        let mut adapter = helper::adapter("call f\nf:\nli s1, 5\nret\n");
        helper::run(&mut adapter);
        assert_eq!(
            adapter.console(),
            "CallSan: PC=0x400008\nCallee-saved register s1 has different value at the \
             beginning and end of the function.\nPrev: 00000000\nCurr: 00000005\n\
             Check the calling convention!\n"
        );
    }

    #[test]
    fn reverse_step_replays() {
        let mut adapter = helper::adapter("li a0, 1\nli a0, 2\nli a0, 3\n");

        adapter.run_one_instruction();
        adapter.run_one_instruction();
        assert_eq!(adapter.engine().regs()[10], 2);

        assert!(adapter.reverse_step());
        assert_eq!(adapter.executed(), 1);
        assert_eq!(adapter.engine().regs()[10], 1);
        assert_eq!(adapter.engine().pc(), TEXT_BASE + 4);

        assert!(adapter.reverse_step());
        assert_eq!(adapter.engine().pc(), TEXT_BASE);
        assert!(!adapter.reverse_step());
    }

    #[test]
    fn labels_and_lines() {
        let adapter = helper::adapter(HELLO);

        assert_eq!(adapter.label_for(TEXT_BASE), "_start");
        assert_eq!(adapter.label_for(TEXT_BASE + 8), "0x400008");
        assert_eq!(adapter.line_at(TEXT_BASE + 8), Some(3));
        assert_eq!(adapter.line_at(0), None);
    }
}
