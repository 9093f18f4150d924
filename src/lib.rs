#![deny(missing_docs)]

//! A stepping, reversible debugger for RISC-V assembly programs
//!
//! # Introduction
//! `rvdb` drives an instruction stepping [Engine][engine] and turns single steps into the
//! usual debugger commands: run to completion, step into, step over, continue to a
//! breakpoint and reverse step. The [Session][session] owns the state machine, the
//! breakpoints and the test harness, which runs a program against a table of inputs and
//! expected outputs.
//!
//! The crate ships a reference engine, [Vm][vm], an RV32IM interpreter with a small
//! assembler and a calling-convention sanitizer. Environment calls are answered by an
//! implementation of the [System][system] trait.
//!
//! ```
//! use rvdb::{Session, Status};
//!
//! let mut session: Session = Session::default();
//! session.run_normal("li a0, 42\nli a7, 1\necall\nli a7, 10\necall\n");
//!
//! assert_eq!(session.console_text(), "42\nExecuted successfully.");
//! match session.status() {
//!     Status::Stopped { .. } => {}
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```
//!
//! [engine]: trait.Engine.html
//! [session]: struct.Session.html
//! [vm]: struct.Vm.html
//! [system]: trait.System.html

#[macro_use]
extern crate failure;
#[macro_use]
extern crate lazy_static;

mod adapter;
mod assembler;
pub mod backtrace;
mod breakpoints;
mod consts;
mod debugger;
mod engine;
mod instruction;
mod program;
mod session;
mod state;
mod stepping;
mod system;
mod testsuite;
pub mod typedef;
mod vm;

pub use crate::adapter::*;
pub use crate::breakpoints::*;
pub use crate::consts::*;
pub use crate::debugger::*;
pub use crate::engine::*;
pub use crate::instruction::*;
pub use crate::program::*;
pub use crate::session::*;
pub use crate::state::*;
pub use crate::system::*;
pub use crate::testsuite::*;
pub use crate::vm::*;
