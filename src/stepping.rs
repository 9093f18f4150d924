use crate::engine::Engine;
use crate::instruction::{Instruction, Register};
use crate::session::Session;
use crate::state::Status;
use tracing::trace;

impl<E: Engine> Session<E> {
    fn resolve_breakpoints(&mut self) {
        self.breakpoints.resolve(self.adapter.engine().line_table());
    }

    fn sp(&self) -> u32 {
        self.adapter.engine().regs()[Register::SP.index()]
    }

    /// Appends the success notice if the run just ended cleanly and refreshes the state
    fn finish_step(&mut self) {
        if self.adapter.exited() {
            self.adapter.append_success();
        }

        self.update_state();
    }

    /// Executes exactly one instruction
    pub fn single_step(&mut self) -> bool {
        if !self.state.status.is_debug() {
            return false;
        }

        self.resolve_breakpoints();
        self.adapter.run_one_instruction();
        self.finish_step();

        true
    }

    /// Runs until a breakpoint, the armed temporary breakpoint, the end of the program or an
    /// error. The stop condition is checked after each instruction, so continuing from a
    /// breakpoint always makes progress.
    pub fn continue_step(&mut self) -> bool {
        if !self.state.status.is_debug() {
            return false;
        }

        self.resolve_breakpoints();

        loop {
            self.adapter.run_one_instruction();

            let pc = self.adapter.engine().pc();
            let sp = self.sp();

            if self.breakpoints.hit_temporary(pc, sp) {
                trace!(pc, sp, "temporary breakpoint hit");
                break;
            }

            if self.breakpoints.contains(pc) {
                trace!(pc, "breakpoint hit");
                break;
            }

            if self.adapter.finished() {
                break;
            }
        }

        self.finish_step();

        true
    }

    /// Steps over calls: a `jal`/`jalr` linking through `ra` runs until control is back right
    /// after it with the same stack pointer. Any other instruction is single stepped.
    pub fn next_step(&mut self) -> bool {
        if !self.state.status.is_debug() {
            return false;
        }

        let pc = self.adapter.engine().pc();
        let is_call = self
            .adapter
            .load(pc, 4)
            .and_then(Instruction::decode)
            .map_or(false, |instruction| instruction.is_call());

        if is_call {
            let sp = self.sp();
            trace!(pc, sp, "stepping over call");
            self.breakpoints.arm(pc.wrapping_add(4), sp);
            self.continue_step()
        } else {
            self.single_step()
        }
    }

    /// Goes back one instruction by replaying the run from the post-build snapshot. The
    /// memory-write highlight of the undone instruction stays visible.
    pub fn reverse_step(&mut self) -> bool {
        match self.state.status {
            Status::Debug { .. } | Status::Error { .. } => {}
            _ => return false,
        }

        if self.adapter.executed() == 0 {
            return false;
        }

        let mem_written = self.adapter.engine().last_mem_write();
        self.adapter.reverse_step();

        let engine = self.adapter.engine();
        let status = Status::Debug {
            pc: engine.pc(),
            regs: *engine.regs(),
            shadow_stack: self.shadow_stack(),
            console_text: self.adapter.console().to_owned(),
            mem_written,
        };
        self.set_status(status);

        true
    }
}

#[cfg(test)]
mod tests {
    use crate::consts::*;
    use crate::engine::Engine;
    use crate::session::Session;
    use crate::state::Status;

    const CALLS: &str = "_start:\n\
                         li a0, 4\n\
                         call double\n\
                         li a7, 1\n\
                         ecall\n\
                         li a7, 10\n\
                         ecall\n\
                         double:\n\
                         add a0, a0, a0\n\
                         ret\n";

    mod helper {
        use super::*;

        pub fn debug(source: &str) -> Session {
            let mut session: Session = Session::default();
            session.start_step(source);
            assert!(session.status().is_debug());
            session
        }

        pub fn pc(session: &Session) -> u32 {
            session.status().pc().unwrap()
        }
    }

    #[test]
    fn single_step_enters_calls() {
        let mut session = helper::debug(CALLS);

        assert!(session.single_step());
        assert!(session.single_step());
        assert_eq!(helper::pc(&session), TEXT_BASE + 24);
        assert_eq!(session.status().shadow_stack().unwrap().len(), 1);
        assert_eq!(session.status().shadow_stack().unwrap()[0].name, "double");
    }

    #[test]
    fn next_step_skips_calls() {
        let mut session = helper::debug(CALLS);

        assert!(session.next_step());
        assert!(session.next_step());
        assert_eq!(helper::pc(&session), TEXT_BASE + 8);
        assert_eq!(session.status().regs().unwrap()[10], 8);
        assert!(session.status().shadow_stack().unwrap().is_empty());
        assert_eq!(session.breakpoints().temporary(), None);
    }

    #[test]
    fn continue_to_breakpoint_and_end() {
        let mut session = helper::debug(CALLS);
        session.breakpoints_mut().toggle(9);

        assert!(session.continue_step());
        assert_eq!(helper::pc(&session), TEXT_BASE + 24);

        assert!(session.continue_step());
        match session.status() {
            Status::Stopped { console_text, .. } => {
                assert_eq!(console_text, "8\nExecuted successfully.")
            }
            other => panic!("unexpected status {:?}", other),
        }

        assert!(!session.continue_step());
        assert!(!session.single_step());
    }

    #[test]
    fn reverse_step_keeps_the_write_highlight() {
        let mut session = helper::debug(
            "_start:\n\
             addi sp, sp, -4\n\
             li t0, 9\n\
             sw t0, 0(sp)\n\
             nop\n",
        );

        for _ in 0..3 {
            session.single_step();
        }
        assert_eq!(session.engine().load(STACK_TOP - 4, 4), Some(9));

        assert!(session.reverse_step());
        match session.status() {
            Status::Debug {
                pc, mem_written, ..
            } => {
                assert_eq!(*pc, TEXT_BASE + 8);
                assert_eq!(mem_written.addr, STACK_TOP - 4);
                assert_eq!(mem_written.len, 4);
            }
            other => panic!("unexpected status {:?}", other),
        }
        assert_eq!(session.engine().load(STACK_TOP - 4, 4), Some(0));
    }

    #[test]
    fn reverse_step_out_of_an_error() {
        let mut session = helper::debug("li t0, 0\nlw t1, 0(t0)\n");

        session.single_step();
        session.single_step();
        assert!(session.console_text().contains("cannot load from address"));

        assert!(session.reverse_step());
        assert!(session.status().is_debug());
        assert_eq!(helper::pc(&session), TEXT_BASE + 4);
        assert_eq!(session.console_text(), "");

        assert!(session.reverse_step());
        assert!(!session.reverse_step());
    }
}
