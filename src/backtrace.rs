//! Turns the shadow stack into frames with their stack contents.

use crate::consts::*;
use crate::engine::{Engine, MemWrite, Provenance};
use crate::state::ShadowEntry;
use crate::typedef::*;

/// Formats a word for display. With `decimal` set, values that look like pointers into the
/// text, data or stack segment print as `0x%08x` and everything else in unsigned decimal.
/// Without it, the value is printed as eight hex digits.
pub fn convert_number(x: Word, decimal: bool) -> String {
    if !decimal {
        return format!("{:08x}", x);
    }

    let is_pointer = (x >= TEXT_BASE && x <= TEXT_END)
        || (x >= STACK_TOP - STACK_LEN && x <= STACK_TOP)
        || (x >= DATA_BASE && x <= DATA_END);

    if is_pointer {
        format!("0x{:08x}", x)
    } else {
        x.to_string()
    }
}

/// One word of a function's stack frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackSlot {
    /// Address of the word
    pub addr: Address,
    /// The word, `None` if the address is not mapped
    pub value: Option<Word>,
    /// The display text
    pub text: String,
    /// Which register wrote the word, if the engine tracks it
    pub provenance: Option<Provenance>,
    /// Whether the last instruction wrote this word
    pub is_animated: bool,
}

/// A function on the call stack together with the stack words it owns
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Name of the function
    pub name: String,
    /// Owned stack words, highest address first
    pub slots: Vec<StackSlot>,
}

fn slot<E: Engine>(engine: &E, addr: Address, mem_written: MemWrite) -> StackSlot {
    let value = engine.load(addr, 4);
    let provenance = engine.stack_provenance(addr);

    let mut text = value.map_or_else(|| "-".to_owned(), |v| convert_number(v, true));
    match provenance {
        Some(Provenance::Unwritten) => text = "??".to_owned(),
        Some(Provenance::Register(reg)) if reg != 0 => {
            text.push_str(&format!(" ({})", REGISTER_NAMES[(reg & 31) as usize]));
        }
        _ => {}
    }

    StackSlot {
        addr,
        value,
        text,
        provenance,
        is_animated: mem_written.contains(addr),
    }
}

/// Reconstructs the call stack, newest frame first.
///
/// Every frame owns the words from its recorded `sp` down to the next frame's `sp`, and the
/// innermost frame owns the words down to `live_sp`.
pub fn reconstruct<E: Engine>(
    engine: &E,
    shadow_stack: &[ShadowEntry],
    live_sp: Word,
    mem_written: MemWrite,
) -> Vec<Frame> {
    let mut frames = shadow_stack
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let end = shadow_stack.get(i + 1).map_or(live_sp, |next| next.sp);
            let count = (entry.sp.saturating_sub(end) / 4).min(STACK_LEN / 4);

            let slots = (1..=count)
                .map(|j| slot(engine, entry.sp - j * 4, mem_written))
                .collect();

            Frame {
                name: entry.name.clone(),
                slots,
            }
        })
        .collect::<Vec<_>>();

    frames.reverse();
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Register;
    use crate::vm::Vm;

    mod helper {
        use super::*;

        pub fn run(source: &str, steps: usize) -> Vm {
            let mut vm = Vm::default();
            vm.build(source).unwrap();
            for _ in 0..steps {
                vm.step();
            }
            vm
        }

        pub fn entries(vm: &Vm) -> Vec<ShadowEntry> {
            vm.shadow_stack()
                .iter()
                .map(|frame| ShadowEntry {
                    name: vm.label_at(frame.pc).unwrap_or_default(),
                    args: frame.args,
                    sp: frame.sp,
                })
                .collect()
        }
    }

    #[test]
    fn number_formatting() {
        assert_eq!(convert_number(42, true), "42");
        assert_eq!(convert_number(0xffff_ffff, true), "4294967295");
        assert_eq!(convert_number(TEXT_BASE, true), "0x00400000");
        assert_eq!(convert_number(STACK_TOP - 8, true), "0x7fffeff8");
        assert_eq!(convert_number(DATA_BASE + 4, true), "0x10000004");
        assert_eq!(convert_number(42, false), "0000002a");
    }

    #[test]
    fn frames_own_their_stack_words() {
        let source = "_start:\n\
                      li a0, 2\n\
                      call outer\n\
                      li a7, 10\n\
                      ecall\n\
                      outer:\n\
                      addi sp, sp, -8\n\
                      sw ra, 4(sp)\n\
                      call inner\n\
                      lw ra, 4(sp)\n\
                      addi sp, sp, 8\n\
                      ret\n\
                      inner:\n\
                      addi sp, sp, -4\n\
                      li t0, 7\n\
                      sw t0, 0(sp)\n\
                      addi sp, sp, 4\n\
                      ret\n";

        // up to and including the store in inner
        let vm = helper::run(source, 8);
        let entries = helper::entries(&vm);
        let frames = reconstruct(
            &vm,
            &entries,
            vm.regs()[Register::SP.index()],
            vm.last_mem_write(),
        );

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].name, "inner");
        assert_eq!(frames[1].name, "outer");

        let inner = &frames[0].slots;
        assert_eq!(inner.len(), 1);
        assert_eq!(inner[0].addr, STACK_TOP - 12);
        assert_eq!(inner[0].text, "7 (t0)");
        assert!(inner[0].is_animated);

        let outer = &frames[1].slots;
        assert_eq!(outer.len(), 2);
        assert_eq!(outer[0].addr, STACK_TOP - 4);
        assert_eq!(outer[0].text, "0x00400008 (ra)");
        assert_eq!(outer[1].text, "??");
        assert!(!outer[0].is_animated);
    }

    #[test]
    fn empty_shadow_stack() {
        let vm = helper::run("nop\n", 1);

        assert!(reconstruct(&vm, &[], STACK_TOP, MemWrite::default()).is_empty());
    }
}
