extern crate rand;
extern crate rvdb;

use rand::{thread_rng, Rng};
use rvdb::{Engine, Register, Session, Status, STACK_TOP, TEXT_BASE};

const FACTORIAL: &str = "_start:
  li a0, 5
  call fact
  li a7, 1
  ecall
  li a7, 10
  ecall
fact:
  addi sp, sp, -8
  sw ra, 4(sp)
  sw a0, 0(sp)
  li t0, 1
  ble a0, t0, base
  addi a0, a0, -1
  call fact
  lw t1, 0(sp)
  mul a0, a0, t1
  j done
base:
  li a0, 1
done:
  lw ra, 4(sp)
  addi sp, sp, 8
  ret
";

/// Address of the recursive `call fact`
const RECURSIVE_CALL: u32 = TEXT_BASE + 48;

#[derive(Debug, PartialEq)]
struct Snapshot {
    pc: u32,
    regs: [u32; 32],
    stack: Vec<Option<u32>>,
    console: String,
    depth: usize,
}

fn snapshot(session: &Session) -> Snapshot {
    let engine = session.engine();

    Snapshot {
        pc: engine.pc(),
        regs: *engine.regs(),
        stack: (1..=32).map(|i| engine.load(STACK_TOP - i * 4, 4)).collect(),
        console: session.console_text().to_owned(),
        depth: session.status().shadow_stack().map_or(0, |s| s.len()),
    }
}

fn debug(source: &str) -> Session {
    let mut session: Session = Session::default();
    session.start_step(source);
    session
}

fn sp(session: &Session) -> u32 {
    session.engine().regs()[Register::SP.index()]
}

#[test]
fn factorial_runs_to_completion() {
    let mut session: Session = Session::default();
    session.run_normal(FACTORIAL);

    match session.status() {
        Status::Stopped { console_text, .. } => {
            assert_eq!(console_text, "120\nExecuted successfully.")
        }
        other => panic!("unexpected status {:?}", other),
    }
}

#[test]
fn run_normal_always_resolves() {
    let programs = [
        FACTORIAL,
        "nop\n",
        "loop:\nj loop\n",
        "ret\n",
        "li a7, 99\necall\n",
    ];

    for program in programs.iter() {
        let mut session: Session = Session::default().with_instruction_limit(1000);
        session.run_normal(program);

        match session.status() {
            Status::Stopped { .. } | Status::Error { .. } => {}
            other => panic!("{:?} ended in {:?}", program, other),
        }
    }
}

#[test]
fn load_from_null() {
    let mut session: Session = Session::default();
    session.run_normal("_start:\n  li t0, 0\n  lw t1, 0(t0)\n  li a7, 10\n  ecall\n");

    match session.status() {
        Status::Error {
            pc, console_text, ..
        } => {
            assert_eq!(*pc, TEXT_BASE + 4);
            assert!(console_text.contains("cannot load from address 0x00000000"));
        }
        other => panic!("unexpected status {:?}", other),
    }
}

#[test]
fn step_over_from_the_top() {
    let mut session = debug(FACTORIAL);

    session.next_step();
    session.next_step();

    assert_eq!(session.status().pc(), Some(TEXT_BASE + 8));
    assert_eq!(session.status().regs().unwrap()[10], 120);
    assert!(session.status().shadow_stack().unwrap().is_empty());
}

#[test]
fn step_over_a_recursive_call() {
    let mut session = debug(FACTORIAL);

    while session.status().pc() != Some(RECURSIVE_CALL) {
        assert!(session.single_step());
    }
    let call_sp = sp(&session);
    let depth = session.status().shadow_stack().unwrap().len();

    let mut stepped = session.clone();
    loop {
        assert!(stepped.single_step());
        if stepped.status().pc() == Some(RECURSIVE_CALL + 4) && sp(&stepped) == call_sp {
            break;
        }
    }

    assert!(session.next_step());

    assert_eq!(session.status().pc(), Some(RECURSIVE_CALL + 4));
    assert_eq!(sp(&session), call_sp);
    assert_eq!(session.status().shadow_stack().unwrap().len(), depth);
    assert_eq!(snapshot(&session), snapshot(&stepped));
    assert_eq!(session.status().regs().unwrap()[10], 24);
}

#[test]
fn step_over_matches_single_stepping() {
    let mut session = debug(FACTORIAL);
    assert!(session.single_step());

    let mut stepped = session.clone();
    while stepped.status().pc() != Some(TEXT_BASE + 8) {
        assert!(stepped.single_step());
    }

    assert!(session.next_step());

    assert_eq!(snapshot(&session), snapshot(&stepped));
    assert_eq!(session.status().shadow_stack().unwrap().len(), 0);
}

#[test]
fn step_over_an_indirect_call() {
    let mut session = debug(
        "_start:
  la t0, identity
  li a0, 3
  jalr ra, 0(t0)
  li a7, 1
  ecall
  li a7, 10
  ecall
identity:
  ret
",
    );

    while session.current_line() != Some(4) {
        assert!(session.single_step());
    }
    let call = session.status().pc().unwrap();
    let call_sp = sp(&session);

    assert!(session.next_step());

    assert_eq!(session.status().pc(), Some(call + 4));
    assert_eq!(session.current_line(), Some(5));
    assert_eq!(sp(&session), call_sp);
    assert!(session.status().shadow_stack().unwrap().is_empty());
    assert_eq!(session.status().regs().unwrap()[10], 3);
}

#[test]
fn breakpoints_stop_every_time() {
    let mut session = debug(FACTORIAL);
    // `li a0, 1` in the base case and `mul` after every return
    session.breakpoints_mut().toggle(20);
    session.breakpoints_mut().toggle(17);

    assert!(session.continue_step());
    assert_eq!(session.current_line(), Some(20));
    assert_eq!(session.status().shadow_stack().unwrap().len(), 5);

    for depth in (1..5).rev() {
        assert!(session.continue_step());
        assert_eq!(session.current_line(), Some(17));
        assert_eq!(session.status().shadow_stack().unwrap().len(), depth);
    }

    assert!(session.continue_step());
    assert!(session.console_text().ends_with("Executed successfully."));
}

#[test]
fn reverse_steps_replay_exactly() {
    let mut rng = thread_rng();

    for _ in 0..10 {
        let mut session = debug(FACTORIAL);
        let forward = rng.gen_range(1, 41);
        let extra = rng.gen_range(1, 21);

        for _ in 0..forward {
            assert!(session.single_step());
        }
        let expected = snapshot(&session);

        for _ in 0..extra {
            assert!(session.single_step());
        }
        for _ in 0..extra {
            assert!(session.reverse_step());
        }

        assert_eq!(snapshot(&session), expected);
        assert_eq!(session.adapter().executed(), forward);
    }
}

#[test]
fn new_sessions_start_clean() {
    let mut session = debug(FACTORIAL);
    session.breakpoints_mut().toggle(20);
    session.continue_step();
    assert_eq!(session.status().shadow_stack().unwrap().len(), 5);

    session.start_step(FACTORIAL);

    assert!(session.status().shadow_stack().unwrap().is_empty());
    assert_eq!(session.console_text(), "");
    assert_eq!(session.status().pc(), Some(TEXT_BASE));
    assert_eq!(session.breakpoints().temporary(), None);
}

#[test]
fn backtrace_shows_the_recursion() {
    let mut session = debug(FACTORIAL);
    session.breakpoints_mut().toggle(20);
    session.continue_step();

    let frames = session.backtrace();
    assert_eq!(frames.len(), 5);
    assert!(frames.iter().all(|frame| frame.name == "fact"));

    // every frame owns the two words it pushed
    for frame in &frames[1..] {
        assert_eq!(frame.slots.len(), 2);
        assert!(frame.slots[0].text.ends_with("(ra)"));
        assert!(frame.slots[1].text.ends_with("(a0)"));
    }

    assert_eq!(frames[0].slots.len(), 2);
    assert_eq!(frames[0].slots[0].text, "0x00400034 (ra)");
    assert_eq!(frames[0].slots[1].text, "1 (a0)");
}

#[test]
fn commands_from_the_wrong_state() {
    let mut session: Session = Session::default();

    assert!(!session.single_step());
    assert!(!session.next_step());
    assert!(!session.continue_step());
    assert!(!session.reverse_step());
    assert_eq!(session.status(), &Status::Idle);
    assert_eq!(session.version(), 0);
}
