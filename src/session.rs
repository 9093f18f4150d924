use crate::adapter::Adapter;
use crate::backtrace::{self, Frame};
use crate::breakpoints::Breakpoints;
use crate::engine::{Engine, MemWrite};
use crate::instruction::Register;
use crate::state::{RuntimeState, ShadowEntry, Status};
use crate::testsuite::{TestData, TestResult};
use crate::vm::Vm;
use tracing::{debug, info};

/// A debug session: the engine adapter, the state machine and all breakpoint state.
///
/// Every command is a plain method. Commands issued from a state that does not support them
/// do nothing and report `false`.
#[derive(Clone, Debug)]
pub struct Session<E: Engine = Vm> {
    pub(crate) adapter: Adapter<E>,
    pub(crate) state: RuntimeState,
    pub(crate) latest_asm: Option<String>,
    pub(crate) breakpoints: Breakpoints,
    pub(crate) test_data: Option<TestData>,
    pub(crate) test_results: Vec<TestResult>,
    pub(crate) test_index: Option<usize>,
}

impl<E: Engine + Default> Default for Session<E> {
    fn default() -> Self {
        Session::new(E::default())
    }
}

impl<E: Engine> Session<E> {
    /// Creates an idle session around the given engine
    pub fn new(engine: E) -> Session<E> {
        Session {
            adapter: Adapter::new(engine),
            state: RuntimeState::default(),
            latest_asm: None,
            breakpoints: Breakpoints::default(),
            test_data: None,
            test_results: Vec::new(),
            test_index: None,
        }
    }

    /// Sets the instruction ceiling of a single run
    pub fn with_instruction_limit(mut self, limit: usize) -> Session<E> {
        self.adapter.set_instruction_limit(limit);
        self
    }

    /// The current state
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// The current status
    pub fn status(&self) -> &Status {
        &self.state.status
    }

    /// The version of the current state
    pub fn version(&self) -> u64 {
        self.state.version
    }

    /// The console text of the current state
    pub fn console_text(&self) -> &str {
        self.state.status.console_text()
    }

    /// The engine adapter
    pub fn adapter(&self) -> &Adapter<E> {
        &self.adapter
    }

    /// The engine
    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    /// The breakpoints
    pub fn breakpoints(&self) -> &Breakpoints {
        &self.breakpoints
    }

    /// The breakpoints, for toggling lines
    pub fn breakpoints_mut(&mut self) -> &mut Breakpoints {
        &mut self.breakpoints
    }

    /// The source line the paused or failed run stopped at
    pub fn current_line(&self) -> Option<u32> {
        match self.state.status {
            Status::Debug { pc, .. } | Status::Error { pc, .. } => self.adapter.line_at(pc),
            _ => None,
        }
    }

    /// The reconstructed call stack of a paused or failed run, newest frame first
    pub fn backtrace(&self) -> Vec<Frame> {
        let (shadow_stack, regs, mem_written) = match &self.state.status {
            Status::Debug {
                shadow_stack,
                regs,
                mem_written,
                ..
            } => (shadow_stack, regs, *mem_written),
            Status::Error {
                shadow_stack, regs, ..
            } => (shadow_stack, regs, MemWrite::default()),
            _ => return Vec::new(),
        };

        backtrace::reconstruct(
            self.adapter.engine(),
            shadow_stack,
            regs[Register::SP.index()],
            mem_written,
        )
    }

    pub(crate) fn set_status(&mut self, status: Status) {
        debug!(
            from = self.state.status.name(),
            to = status.name(),
            version = self.state.version + 1,
            "state transition"
        );

        self.state = RuntimeState {
            version: self.state.version + 1,
            status,
        };
    }

    pub(crate) fn shadow_stack(&self) -> Vec<ShadowEntry> {
        self.adapter
            .engine()
            .shadow_stack()
            .iter()
            .map(|frame| ShadowEntry {
                name: self.adapter.label_for(frame.pc),
                args: frame.args,
                sp: frame.sp,
            })
            .collect()
    }

    /// Assembles `source` on behalf of the user text `text`
    fn build_source(&mut self, text: &str, source: &str) -> bool {
        let result = self.adapter.build(source);
        let unchanged = self.latest_asm.as_ref().map_or(false, |latest| latest == text);
        self.latest_asm = Some(text.to_owned());

        match result {
            Err(err) => {
                debug!(line = err.line, message = %err.message, "build failed");
                self.set_status(Status::asm_error(err));
                false
            }
            Ok(()) => {
                let keep = match self.state.status {
                    Status::Stopped { .. } => unchanged,
                    _ => false,
                };

                if !keep {
                    self.set_status(Status::Idle);
                }

                true
            }
        }
    }

    pub(crate) fn build(&mut self, text: &str) -> bool {
        self.build_source(text, text)
    }

    /// Builds the user text followed by a test case's prefix and input
    pub(crate) fn build_with_suffix(&mut self, text: &str, suffix: &str) -> bool {
        let source = format!("{}\n{}", text, suffix);
        self.build_source(text, &source)
    }

    /// Runs the loaded program until it exits or fails
    pub(crate) fn run_to_end(&mut self) {
        while !self.adapter.finished() {
            self.adapter.run_one_instruction();
        }
    }

    /// Mirrors the adapter into the state: `Error`, `Stopped` or `Debug`
    pub(crate) fn update_state(&mut self) {
        let engine = self.adapter.engine();
        let pc = engine.pc();
        let regs = *engine.regs();
        let console_text = self.adapter.console().to_owned();

        let status = if self.adapter.has_error() {
            Status::Error {
                pc,
                regs,
                shadow_stack: self.shadow_stack(),
                console_text,
            }
        } else if self.adapter.exited() {
            Status::Stopped {
                pc,
                regs,
                console_text,
            }
        } else {
            Status::Debug {
                pc,
                regs,
                shadow_stack: self.shadow_stack(),
                console_text,
                mem_written: engine.last_mem_write(),
            }
        };

        self.set_status(status);
    }

    /// The build/lint command. Only acts from `Idle`, `Stopped` or `AsmError`, and does
    /// nothing when `text` is what was built last.
    pub fn build_asm(&mut self, text: &str) -> bool {
        match self.state.status {
            Status::Idle | Status::Stopped { .. } | Status::AsmError { .. } => {}
            _ => return false,
        }

        if self.latest_asm.as_ref().map_or(false, |latest| latest == text) {
            return true;
        }

        let suffix = self.test_data.as_ref().and_then(|data| data.suffix(0));
        match suffix {
            Some(suffix) => self.build_with_suffix(text, &suffix),
            None => self.build(text),
        };

        true
    }

    /// Builds `text` and runs it to completion
    pub fn run_normal(&mut self, text: &str) {
        if !self.build(text) {
            return;
        }

        let engine = self.adapter.engine();
        let running = Status::Running {
            pc: engine.pc(),
            regs: *engine.regs(),
            console_text: String::new(),
        };
        self.set_status(running);

        self.run_to_end();
        if self.adapter.exited() {
            self.adapter.append_success();
        }

        info!(
            executed = self.adapter.executed(),
            error = self.adapter.has_error(),
            "run finished"
        );

        self.update_state();
    }

    /// Builds `text` and pauses at the entry point without executing anything
    pub fn start_step(&mut self, text: &str) {
        if !self.build(text) {
            return;
        }

        self.breakpoints.disarm();
        self.enter_debug();
    }

    pub(crate) fn enter_debug(&mut self) {
        let engine = self.adapter.engine();
        let status = Status::Debug {
            pc: engine.pc(),
            regs: *engine.regs(),
            shadow_stack: Vec::new(),
            console_text: String::new(),
            mem_written: MemWrite::default(),
        };

        self.set_status(status);
    }

    /// Leaves whatever is going on and returns to `Idle`
    pub fn quit_debug(&mut self) {
        self.set_status(Status::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;

    const PRINT_SEVEN: &str = "_start:\n\
                               li a0, 7\n\
                               li a7, 1\n\
                               ecall\n\
                               li a7, 10\n\
                               ecall\n";

    #[test]
    fn run_normal_stops() {
        let mut session: Session = Session::default();
        session.run_normal(PRINT_SEVEN);

        match session.status() {
            Status::Stopped { console_text, .. } => {
                assert_eq!(console_text, "7\nExecuted successfully.")
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn run_normal_reports_asm_errors() {
        let mut session: Session = Session::default();
        session.run_normal("li a0\n");

        match session.status() {
            Status::AsmError { line, .. } => assert_eq!(*line, 1),
            other => panic!("unexpected status {:?}", other),
        }
        assert!(session.console_text().starts_with("Error on line 1: "));
    }

    #[test]
    fn versions_increase() {
        let mut session: Session = Session::default();
        let mut last = session.version();

        session.build_asm(PRINT_SEVEN);
        assert!(session.version() > last);
        last = session.version();

        session.run_normal(PRINT_SEVEN);
        assert!(session.version() > last);
        last = session.version();

        session.start_step(PRINT_SEVEN);
        assert!(session.version() > last);
        last = session.version();

        session.quit_debug();
        assert!(session.version() > last);
    }

    #[test]
    fn build_asm_is_guarded() {
        let mut session: Session = Session::default();
        session.start_step(PRINT_SEVEN);
        let version = session.version();

        assert!(!session.build_asm("nop\n"));
        assert_eq!(session.version(), version);
        assert!(session.status().is_debug());
    }

    #[test]
    fn unchanged_rebuild_keeps_stopped() {
        let mut session: Session = Session::default();
        session.run_normal(PRINT_SEVEN);
        let before = session.state().clone();

        assert!(session.build_asm(PRINT_SEVEN));
        assert_eq!(session.state(), &before);

        assert!(session.build_asm("nop\n"));
        assert_eq!(session.status(), &Status::Idle);
    }

    #[test]
    fn start_step_pauses_at_entry() {
        let mut session: Session = Session::default();
        session.start_step("nop\n_start:\nli a0, 1\n");

        match session.status() {
            Status::Debug {
                pc,
                regs,
                shadow_stack,
                console_text,
                ..
            } => {
                assert_eq!(*pc, TEXT_BASE + 4);
                assert_eq!(regs[Register::SP.index()], STACK_TOP);
                assert!(shadow_stack.is_empty());
                assert!(console_text.is_empty());
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(session.adapter().executed(), 0);
        assert_eq!(session.current_line(), Some(3));
    }
}
