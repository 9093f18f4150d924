use crate::assembler;
use crate::consts::*;
use crate::typedef::*;
use std::collections::BTreeMap;

/// An assembled program image
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// The instruction words, starting at `TEXT_BASE`
    pub text: Vec<Word>,
    /// The initialized static data, starting at `DATA_BASE`
    pub data: Vec<u8>,
    /// The 1-indexed source line of every instruction word
    pub lines: Vec<u32>,
    /// All labels and the addresses they point to
    pub labels: BTreeMap<String, Address>,
    /// The address execution starts at
    pub entry_point: Address,
}

impl Program {
    /// Assembles the given source text
    pub fn from_source(source: &str) -> ::std::result::Result<Program, AsmError> {
        assembler::assemble(source)
    }

    /// One past the last instruction address
    pub fn text_end(&self) -> Address {
        TEXT_BASE + (self.text.len() as u32) * INSTRUCTION_WIDTH
    }

    /// Whether `pc` points at an instruction of this program
    pub fn contains_pc(&self, pc: Address) -> bool {
        pc >= TEXT_BASE && pc < self.text_end() && pc % INSTRUCTION_WIDTH == 0
    }

    /// Returns the instruction word at the given address
    pub fn word_at(&self, pc: Address) -> Option<Word> {
        if !self.contains_pc(pc) {
            return None;
        }

        self.text
            .get(((pc - TEXT_BASE) / INSTRUCTION_WIDTH) as usize)
            .cloned()
    }

    /// Returns the source line of the instruction at the given address
    pub fn line_at(&self, pc: Address) -> Option<u32> {
        if !self.contains_pc(pc) {
            return None;
        }

        self.lines
            .get(((pc - TEXT_BASE) / INSTRUCTION_WIDTH) as usize)
            .cloned()
    }

    /// Returns the first label (in alphabetical order) naming the given address
    pub fn label_at(&self, addr: Address) -> Option<&str> {
        self.labels
            .iter()
            .find(|(_, &label_addr)| label_addr == addr)
            .map(|(name, _)| name.as_str())
    }
}
