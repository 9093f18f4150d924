use crate::consts::*;
use crate::typedef::*;
use std::collections::{BTreeSet, HashSet};

/// The one-shot breakpoint used to step over a call. It only matches when the stack pointer
/// is back to its value at the call site, so recursive calls of the same function pass by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemporaryBreakpoint {
    /// Where to stop
    pub addr: Address,
    /// The stack pointer the caller had
    pub sp: Word,
}

/// User breakpoints, kept as source lines and resolved to addresses on demand
#[derive(Clone, Debug, Default)]
pub struct Breakpoints {
    lines: BTreeSet<u32>,
    addresses: HashSet<Address>,
    temporary: Option<TemporaryBreakpoint>,
}

impl Breakpoints {
    /// Adds or removes a breakpoint on a 1-indexed source line. Returns whether it is set now.
    pub fn toggle(&mut self, line: u32) -> bool {
        if self.lines.remove(&line) {
            false
        } else {
            self.lines.insert(line);
            true
        }
    }

    /// Replaces all line breakpoints
    pub fn set_lines<I: IntoIterator<Item = u32>>(&mut self, lines: I) {
        self.lines = lines.into_iter().collect();
    }

    /// Removes every line breakpoint
    pub fn clear(&mut self) {
        self.lines.clear();
        self.addresses.clear();
    }

    /// The breakpoint lines in ascending order
    pub fn lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.lines.iter().cloned()
    }

    /// Maps every breakpoint line to all instruction addresses generated from that line
    pub fn resolve(&mut self, line_table: &[u32]) {
        let lines = &self.lines;

        self.addresses = line_table
            .iter()
            .enumerate()
            .filter(|(_, line)| lines.contains(line))
            .map(|(i, _)| TEXT_BASE + (i as u32) * INSTRUCTION_WIDTH)
            .collect();
    }

    /// Whether a resolved breakpoint sits at `pc`
    pub fn contains(&self, pc: Address) -> bool {
        self.addresses.contains(&pc)
    }

    /// Arms the temporary breakpoint, replacing any previous one
    pub fn arm(&mut self, addr: Address, sp: Word) {
        self.temporary = Some(TemporaryBreakpoint { addr, sp });
    }

    /// Clears the temporary breakpoint
    pub fn disarm(&mut self) {
        self.temporary = None;
    }

    /// The armed temporary breakpoint
    pub fn temporary(&self) -> Option<TemporaryBreakpoint> {
        self.temporary
    }

    /// Consumes the temporary breakpoint if both `pc` and `sp` match it
    pub fn hit_temporary(&mut self, pc: Address, sp: Word) -> bool {
        if self.temporary == Some(TemporaryBreakpoint { addr: pc, sp }) {
            self.temporary = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling() {
        let mut breakpoints = Breakpoints::default();

        assert!(breakpoints.toggle(4));
        assert!(breakpoints.toggle(2));
        assert!(!breakpoints.toggle(4));
        assert_eq!(breakpoints.lines().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn lines_resolve_to_every_word() {
        let mut breakpoints = Breakpoints::default();
        breakpoints.set_lines(vec![2, 7]);
        breakpoints.resolve(&[1, 2, 2, 3]);

        assert!(!breakpoints.contains(TEXT_BASE));
        assert!(breakpoints.contains(TEXT_BASE + 4));
        assert!(breakpoints.contains(TEXT_BASE + 8));
        assert!(!breakpoints.contains(TEXT_BASE + 12));

        breakpoints.set_lines(vec![3]);
        breakpoints.resolve(&[1, 2, 2, 3]);
        assert!(!breakpoints.contains(TEXT_BASE + 4));
        assert!(breakpoints.contains(TEXT_BASE + 12));
    }

    #[test]
    fn temporary_needs_matching_sp() {
        let mut breakpoints = Breakpoints::default();
        breakpoints.arm(TEXT_BASE + 8, STACK_TOP);

        assert!(!breakpoints.hit_temporary(TEXT_BASE + 8, STACK_TOP - 16));
        assert!(!breakpoints.hit_temporary(TEXT_BASE + 4, STACK_TOP));
        assert!(breakpoints.hit_temporary(TEXT_BASE + 8, STACK_TOP));
        assert_eq!(breakpoints.temporary(), None);
        assert!(!breakpoints.hit_temporary(TEXT_BASE + 8, STACK_TOP));
    }
}
