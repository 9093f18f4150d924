use crate::backtrace::convert_number;
use crate::consts::*;
use crate::engine::Engine;
use crate::session::Session;
use crate::state::Status;
use crate::typedef::*;
use crate::vm::Vm;
use bytesize::ByteSize;
use colored::*;
use failure::ResultExt;
use rustyline::Editor;
use std::fs;
use std::path::PathBuf;

const HELP: &[(&str, &str)] = &[
    ("help", "prints this message"),
    ("build", "assembles the source file"),
    ("run", "runs the program to completion"),
    ("debug", "starts a debug session at the entry point"),
    ("step", "executes one instruction"),
    ("next", "executes one instruction, stepping over calls"),
    ("continue", "runs until a breakpoint or the end of the program"),
    ("reverse", "goes back one instruction"),
    ("quit", "leaves the debug session"),
    ("break N", "toggles a breakpoint on line N"),
    ("breakpoints", "lists all breakpoints"),
    ("regs", "prints the registers"),
    ("backtrace", "prints the call stack"),
    ("stack", "prints the call stack with the stack words of every frame"),
    ("mem ADDR [N]", "prints N words of memory starting at ADDR"),
    ("console", "prints the console"),
    ("test", "runs the test suite"),
    ("debugtest N", "starts a debug session for test case N"),
    ("exit", "exits the debugger"),
];

/// An interactive debugger for a single assembly file.
///
/// The file is re-read from disk for every command that builds, so edits made in another
/// window are picked up right away.
pub struct Debugger<E: Engine = Vm> {
    session: Session<E>,
    source: PathBuf,
    editor: Editor<()>,
    shown: String,
}

fn parse_address(text: &str) -> Result<Address> {
    let parsed = if text.starts_with("0x") || text.starts_with("0X") {
        Address::from_str_radix(&text[2..], 16)
    } else {
        text.parse()
    };

    Ok(parsed.map_err(|_| SessionError::InvalidAddress {
        text: text.to_owned(),
    })?)
}

impl<E: Engine> Debugger<E> {
    /// Creates a debugger for the given session and source file
    pub fn new(session: Session<E>, source: PathBuf) -> Debugger<E> {
        Debugger {
            session,
            source,
            editor: Editor::<()>::new(),
            shown: String::new(),
        }
    }

    /// The underlying session
    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    fn read_source(&self) -> Result<String> {
        let text = fs::read_to_string(&self.source)
            .with_context(|_| format!("unable to read {}", self.source.display()))?;

        Ok(text)
    }

    /// Runs the read-eval-print loop until `exit` or end of input
    pub fn run(&mut self) -> Result<()> {
        println!("{}", format!("rvdb v{}", *VERSION).bold());
        println!("Type \"help\" to show the list of commands");
        println!();

        loop {
            let prompt = self.prompt();
            let input = match self.editor.readline(&prompt) {
                Ok(line) => line,
                Err(_) => break,
            };

            self.editor.add_history_entry(input.trim());

            match self.execute(input.trim()) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => eprintln!("{}", e.to_string().red()),
            }
        }

        Ok(())
    }

    fn prompt(&self) -> String {
        match self.session.status() {
            Status::Debug { pc, .. } | Status::Error { pc, .. } => format!(
                "[{}] {} > ",
                format!("{:08x}", pc).red(),
                self.session.adapter().disassemble(*pc).green()
            ),
            status => format!("({}) > ", status.name()),
        }
    }

    /// Executes a single command. Returns `false` when the debugger should exit.
    pub fn execute(&mut self, input: &str) -> Result<bool> {
        let mut words = input.split_whitespace();
        let command = match words.next() {
            Some(command) => command,
            None => return Ok(true),
        };
        let args = words.collect::<Vec<_>>();

        match command {
            "help" | "h" => {
                println!("Commands");
                println!();
                for (name, description) in HELP {
                    println!("{:<14}- {}", name, description);
                }
            }
            "build" | "b" => {
                let text = self.read_source()?;
                if !self.session.build_asm(&text) {
                    println!("cannot build while a program is being debugged");
                }
                self.report();
            }
            "run" | "r" => {
                let text = self.read_source()?;
                self.shown.clear();
                self.session.run_normal(&text);
                self.report();
            }
            "debug" | "d" => {
                let text = self.read_source()?;
                self.shown.clear();
                self.session.start_step(&text);
                self.report();
            }
            "step" | "s" => self.stepped(|session| session.single_step()),
            "next" | "n" => self.stepped(|session| session.next_step()),
            "continue" | "c" => self.stepped(|session| session.continue_step()),
            "reverse" | "rs" => self.stepped(|session| session.reverse_step()),
            "quit" | "q" => {
                self.session.quit_debug();
                self.shown.clear();
            }
            "break" | "bp" => {
                let arg = args.get(0).cloned().unwrap_or("");
                let line = arg.parse::<u32>().map_err(|_| SessionError::InvalidLine {
                    text: arg.to_owned(),
                })?;

                if self.session.breakpoints_mut().toggle(line) {
                    println!("Breakpoint set on line {}", line);
                } else {
                    println!("Breakpoint removed from line {}", line);
                }
            }
            "breakpoints" => {
                for line in self.session.breakpoints().lines() {
                    println!("line {}", line);
                }
            }
            "regs" => self.print_registers(),
            "backtrace" | "bt" => {
                if let Some(shadow_stack) = self.session.status().shadow_stack() {
                    for (i, entry) in shadow_stack.iter().rev().enumerate() {
                        println!("#{} {}", i, entry);
                    }
                }
            }
            "stack" => {
                for frame in self.session.backtrace() {
                    println!("{}", frame.name.cyan());

                    for slot in frame.slots {
                        let line = format!("  {:08x}  {}", slot.addr, slot.text);
                        if slot.is_animated {
                            println!("{}", line.yellow());
                        } else {
                            println!("{}", line);
                        }
                    }
                }
            }
            "mem" | "x" => {
                let addr = parse_address(args.get(0).cloned().unwrap_or(""))?;
                let count = args.get(1).and_then(|n| n.parse().ok()).unwrap_or(4u32);

                for i in 0..count {
                    let addr = addr.wrapping_add(i * 4);
                    let value = self
                        .session
                        .engine()
                        .load(addr, 4)
                        .map_or_else(|| "--------".to_owned(), |v| convert_number(v, false));
                    println!("{}: {}", format!("{:08x}", addr).red(), value);
                }
            }
            "console" => println!("{}", self.session.console_text()),
            "test" | "t" => {
                let text = self.read_source()?;
                if !self.session.run_test_suite(&text) {
                    println!("no test suite is loaded");
                }
                self.report();
            }
            "debugtest" | "dt" => {
                let arg = args.get(0).cloned().unwrap_or("");
                let index = arg.parse::<usize>().map_err(|_| SessionError::InvalidIndex {
                    text: arg.to_owned(),
                })?;

                let text = self.read_source()?;
                self.shown.clear();
                self.session.start_step_test_case(index, &text)?;
                self.report();
            }
            "exit" | "e" => return Ok(false),
            other => eprintln!(
                "unknown command {:?}. Type \"help\" to show the list of commands",
                other
            ),
        }

        Ok(true)
    }

    fn stepped<F: FnOnce(&mut Session<E>) -> bool>(&mut self, f: F) {
        if f(&mut self.session) {
            self.report();
        } else {
            println!("not possible from {}", self.session.status().name());
        }
    }

    fn print_console(&mut self) {
        let console = self.session.console_text().to_owned();

        let fresh = if console.starts_with(&self.shown) {
            &console[self.shown.len()..]
        } else {
            &console[..]
        };

        if !fresh.is_empty() {
            print!("{}", fresh);
            if !fresh.ends_with('\n') {
                println!();
            }
        }

        self.shown = console;
    }

    fn report(&mut self) {
        match self.session.status().clone() {
            Status::Idle => {
                let (text, data) = self.session.engine().image_size();
                println!(
                    "{}",
                    format!("Text: {}, data: {}", ByteSize(text), ByteSize(data)).cyan()
                );
            }
            Status::AsmError { console_text, .. } => println!("{}", console_text.red()),
            Status::Stopped { .. } => self.print_console(),
            Status::Running { .. } => {}
            Status::Error { pc, .. } => {
                self.print_console();
                if let Some(line) = self.session.current_line() {
                    println!("{}", format!("stopped on line {}", line).red());
                } else {
                    println!("{}", format!("stopped at {:08x}", pc).red());
                }
            }
            Status::Debug { pc, .. } => {
                self.print_console();
                let line = self
                    .session
                    .current_line()
                    .map_or_else(|| "?".to_owned(), |line| line.to_string());
                println!(
                    "line {}: {}",
                    line,
                    self.session.adapter().disassemble(pc).green()
                );
            }
            Status::TestSuite { table } => {
                for (i, result) in table.iter().enumerate() {
                    let verdict = if result.passed() {
                        "PASS".green()
                    } else {
                        "FAIL".red()
                    };

                    println!(
                        "#{} {} input={:?} expected={:?} got={:?}{}",
                        i,
                        verdict,
                        result.input.trim(),
                        result.output.trim(),
                        result.user_output,
                        if result.run_err { " (runtime error)" } else { "" }
                    );
                }
            }
        }
    }

    fn print_registers(&self) {
        let regs = match self.session.status().regs() {
            Some(regs) => *regs,
            None => *self.session.engine().regs(),
        };
        let last = self.session.engine().last_reg_written() as usize;

        for (i, (name, value)) in REGISTER_NAMES.iter().zip(regs.iter()).enumerate() {
            let cell = format!("{:>6} {:<12}", name, convert_number(*value, true));

            if i == last && i != 0 {
                print!("{}", cell.yellow());
            } else {
                print!("{}", cell);
            }

            if i % 4 == 3 {
                println!();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x400000").unwrap(), TEXT_BASE);
        assert_eq!(parse_address("16").unwrap(), 16);
        assert!(parse_address("zz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn commands_drive_the_session() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), "li a0, 1\nli a7, 10\necall\n").unwrap();

        let mut debugger: Debugger = Debugger::new(Session::default(), file.path().to_owned());

        assert!(debugger.execute("debug").unwrap());
        assert!(debugger.session().status().is_debug());
        assert!(debugger.execute("break 3").unwrap());
        assert!(debugger.execute("continue").unwrap());
        assert_eq!(debugger.session().status().pc(), Some(TEXT_BASE + 8));
        assert!(debugger.execute("mem zz").is_err());

        let err = debugger.execute("debugtest one").unwrap_err();
        assert_eq!(err.to_string(), "invalid test case index \"one\"");
        assert!(debugger.execute("exit").map(|go_on| !go_on).unwrap());
    }
}
