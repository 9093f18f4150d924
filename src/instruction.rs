#![allow(missing_docs)]

use crate::consts::REGISTER_NAMES;
use crate::typedef::*;
use serde::{Deserialize, Serialize};
use std::fmt;

const OPCODE_LUI: u32 = 0x37;
const OPCODE_AUIPC: u32 = 0x17;
const OPCODE_JAL: u32 = 0x6f;
const OPCODE_JALR: u32 = 0x67;
const OPCODE_BRANCH: u32 = 0x63;
const OPCODE_LOAD: u32 = 0x03;
const OPCODE_STORE: u32 = 0x23;
const OPCODE_OP_IMM: u32 = 0x13;
const OPCODE_OP: u32 = 0x33;
const OPCODE_SYSTEM: u32 = 0x73;

const ECALL: u32 = 0x0000_0073;
const EBREAK: u32 = 0x0010_0073;

/// An integer register `x0`..`x31`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Register(u8);

impl Register {
    pub const ZERO: Register = Register(0);
    pub const RA: Register = Register(1);
    pub const SP: Register = Register(2);
    pub const GP: Register = Register(3);
    pub const TP: Register = Register(4);
    pub const A0: Register = Register(10);
    pub const A7: Register = Register(17);

    /// Returns the register with the given number, if there is one
    pub fn new(index: u8) -> Option<Register> {
        if index < 32 {
            Some(Register(index))
        } else {
            None
        }
    }

    fn from_field(bits: u32) -> Register {
        Register((bits & 0x1f) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        REGISTER_NAMES[self.index()]
    }

    /// Parses both `xN` and ABI names
    pub fn parse(text: &str) -> Option<Register> {
        let text = text.trim();

        if let Some(number) = text.strip_prefix('x') {
            if let Ok(index) = number.parse::<u8>() {
                return Register::new(index);
            }
        }

        match text {
            "fp" | "s0" => return Some(Register(8)),
            _ => {}
        }

        REGISTER_NAMES
            .iter()
            .position(|name| *name == text)
            .map(|index| Register(index as u8))
    }

    /// Temporaries the callee may clobber
    pub fn temporaries() -> impl Iterator<Item = Register> {
        [5u8, 6, 7, 28, 29, 30, 31].iter().map(|&i| Register(i))
    }

    /// Registers a callee has to preserve, apart from `sp` and `ra`
    pub fn callee_saved() -> impl Iterator<Item = Register> {
        [8u8, 9, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27]
            .iter()
            .map(|&i| Register(i))
    }

    /// The argument registers `a0`..`a7`
    pub fn arguments() -> impl Iterator<Item = Register> {
        (10u8..18).map(Register)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            8 => write!(f, "s0"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
}

impl AluOp {
    fn funct(self) -> (u32, u32) {
        match self {
            AluOp::Add => (0, 0x00),
            AluOp::Sub => (0, 0x20),
            AluOp::Sll => (1, 0x00),
            AluOp::Slt => (2, 0x00),
            AluOp::Sltu => (3, 0x00),
            AluOp::Xor => (4, 0x00),
            AluOp::Srl => (5, 0x00),
            AluOp::Sra => (5, 0x20),
            AluOp::Or => (6, 0x00),
            AluOp::And => (7, 0x00),
            AluOp::Mul => (0, 0x01),
            AluOp::Mulh => (1, 0x01),
            AluOp::Mulhsu => (2, 0x01),
            AluOp::Mulhu => (3, 0x01),
            AluOp::Div => (4, 0x01),
            AluOp::Divu => (5, 0x01),
            AluOp::Rem => (6, 0x01),
            AluOp::Remu => (7, 0x01),
        }
    }

    fn from_funct(funct3: u32, funct7: u32) -> Option<AluOp> {
        let op = match (funct3, funct7) {
            (0, 0x00) => AluOp::Add,
            (0, 0x20) => AluOp::Sub,
            (1, 0x00) => AluOp::Sll,
            (2, 0x00) => AluOp::Slt,
            (3, 0x00) => AluOp::Sltu,
            (4, 0x00) => AluOp::Xor,
            (5, 0x00) => AluOp::Srl,
            (5, 0x20) => AluOp::Sra,
            (6, 0x00) => AluOp::Or,
            (7, 0x00) => AluOp::And,
            (0, 0x01) => AluOp::Mul,
            (1, 0x01) => AluOp::Mulh,
            (2, 0x01) => AluOp::Mulhsu,
            (3, 0x01) => AluOp::Mulhu,
            (4, 0x01) => AluOp::Div,
            (5, 0x01) => AluOp::Divu,
            (6, 0x01) => AluOp::Rem,
            (7, 0x01) => AluOp::Remu,
            _ => return None,
        };

        Some(op)
    }

    /// Whether the operation has an immediate form (`addi`, `slli`, ...)
    pub fn has_immediate_form(self) -> bool {
        match self {
            AluOp::Sub | AluOp::Mul | AluOp::Mulh | AluOp::Mulhsu | AluOp::Mulhu => false,
            AluOp::Div | AluOp::Divu | AluOp::Rem | AluOp::Remu => false,
            _ => true,
        }
    }

    fn is_shift(self) -> bool {
        match self {
            AluOp::Sll | AluOp::Srl | AluOp::Sra => true,
            _ => false,
        }
    }

    /// Applies the operation to two operands
    pub fn apply(self, a: Word, b: Word) -> Word {
        let (sa, sb) = (a as i32, b as i32);

        match self {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Sub => a.wrapping_sub(b),
            AluOp::Sll => a << (b & 0x1f),
            AluOp::Slt => (sa < sb) as Word,
            AluOp::Sltu => (a < b) as Word,
            AluOp::Xor => a ^ b,
            AluOp::Srl => a >> (b & 0x1f),
            AluOp::Sra => (sa >> (b & 0x1f)) as Word,
            AluOp::Or => a | b,
            AluOp::And => a & b,
            AluOp::Mul => a.wrapping_mul(b),
            AluOp::Mulh => ((i64::from(sa) * i64::from(sb)) >> 32) as Word,
            AluOp::Mulhsu => ((i64::from(sa) * i64::from(b)) >> 32) as Word,
            AluOp::Mulhu => ((u64::from(a) * u64::from(b)) >> 32) as Word,
            AluOp::Div => match sb {
                0 => Word::max_value(),
                -1 => sa.wrapping_neg() as Word,
                _ => (sa / sb) as Word,
            },
            AluOp::Divu => a.checked_div(b).unwrap_or(Word::max_value()),
            AluOp::Rem => match sb {
                0 => a,
                -1 => 0,
                _ => (sa % sb) as Word,
            },
            AluOp::Remu => a.checked_rem(b).unwrap_or(a),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Sub => "sub",
            AluOp::Sll => "sll",
            AluOp::Slt => "slt",
            AluOp::Sltu => "sltu",
            AluOp::Xor => "xor",
            AluOp::Srl => "srl",
            AluOp::Sra => "sra",
            AluOp::Or => "or",
            AluOp::And => "and",
            AluOp::Mul => "mul",
            AluOp::Mulh => "mulh",
            AluOp::Mulhsu => "mulhsu",
            AluOp::Mulhu => "mulhu",
            AluOp::Div => "div",
            AluOp::Divu => "divu",
            AluOp::Rem => "rem",
            AluOp::Remu => "remu",
        }
    }

    pub fn from_mnemonic(text: &str) -> Option<AluOp> {
        let all = [
            AluOp::Add,
            AluOp::Sub,
            AluOp::Sll,
            AluOp::Slt,
            AluOp::Sltu,
            AluOp::Xor,
            AluOp::Srl,
            AluOp::Sra,
            AluOp::Or,
            AluOp::And,
            AluOp::Mul,
            AluOp::Mulh,
            AluOp::Mulhsu,
            AluOp::Mulhu,
            AluOp::Div,
            AluOp::Divu,
            AluOp::Rem,
            AluOp::Remu,
        ];

        all.iter().cloned().find(|op| op.mnemonic() == text)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchOp {
    Eq,
    Ne,
    Lt,
    Ge,
    Ltu,
    Geu,
}

impl BranchOp {
    fn funct3(self) -> u32 {
        match self {
            BranchOp::Eq => 0,
            BranchOp::Ne => 1,
            BranchOp::Lt => 4,
            BranchOp::Ge => 5,
            BranchOp::Ltu => 6,
            BranchOp::Geu => 7,
        }
    }

    fn from_funct3(funct3: u32) -> Option<BranchOp> {
        match funct3 {
            0 => Some(BranchOp::Eq),
            1 => Some(BranchOp::Ne),
            4 => Some(BranchOp::Lt),
            5 => Some(BranchOp::Ge),
            6 => Some(BranchOp::Ltu),
            7 => Some(BranchOp::Geu),
            _ => None,
        }
    }

    pub fn taken(self, a: Word, b: Word) -> bool {
        match self {
            BranchOp::Eq => a == b,
            BranchOp::Ne => a != b,
            BranchOp::Lt => (a as i32) < (b as i32),
            BranchOp::Ge => (a as i32) >= (b as i32),
            BranchOp::Ltu => a < b,
            BranchOp::Geu => a >= b,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            BranchOp::Eq => "beq",
            BranchOp::Ne => "bne",
            BranchOp::Lt => "blt",
            BranchOp::Ge => "bge",
            BranchOp::Ltu => "bltu",
            BranchOp::Geu => "bgeu",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOp {
    Byte,
    Half,
    Word,
    ByteUnsigned,
    HalfUnsigned,
}

impl LoadOp {
    fn funct3(self) -> u32 {
        match self {
            LoadOp::Byte => 0,
            LoadOp::Half => 1,
            LoadOp::Word => 2,
            LoadOp::ByteUnsigned => 4,
            LoadOp::HalfUnsigned => 5,
        }
    }

    fn from_funct3(funct3: u32) -> Option<LoadOp> {
        match funct3 {
            0 => Some(LoadOp::Byte),
            1 => Some(LoadOp::Half),
            2 => Some(LoadOp::Word),
            4 => Some(LoadOp::ByteUnsigned),
            5 => Some(LoadOp::HalfUnsigned),
            _ => None,
        }
    }

    /// Access width in bytes
    pub fn width(self) -> u32 {
        match self {
            LoadOp::Byte | LoadOp::ByteUnsigned => 1,
            LoadOp::Half | LoadOp::HalfUnsigned => 2,
            LoadOp::Word => 4,
        }
    }

    /// Sign or zero extends a raw loaded value
    pub fn extend(self, raw: Word) -> Word {
        match self {
            LoadOp::Byte => raw as u8 as i8 as i32 as Word,
            LoadOp::Half => raw as u16 as i16 as i32 as Word,
            LoadOp::Word => raw,
            LoadOp::ByteUnsigned => raw & 0xff,
            LoadOp::HalfUnsigned => raw & 0xffff,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            LoadOp::Byte => "lb",
            LoadOp::Half => "lh",
            LoadOp::Word => "lw",
            LoadOp::ByteUnsigned => "lbu",
            LoadOp::HalfUnsigned => "lhu",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Byte,
    Half,
    Word,
}

impl StoreOp {
    fn funct3(self) -> u32 {
        match self {
            StoreOp::Byte => 0,
            StoreOp::Half => 1,
            StoreOp::Word => 2,
        }
    }

    fn from_funct3(funct3: u32) -> Option<StoreOp> {
        match funct3 {
            0 => Some(StoreOp::Byte),
            1 => Some(StoreOp::Half),
            2 => Some(StoreOp::Word),
            _ => None,
        }
    }

    pub fn width(self) -> u32 {
        match self {
            StoreOp::Byte => 1,
            StoreOp::Half => 2,
            StoreOp::Word => 4,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            StoreOp::Byte => "sb",
            StoreOp::Half => "sh",
            StoreOp::Word => "sw",
        }
    }
}

/// A decoded RV32IM instruction
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `imm` holds the final value with the low 12 bits cleared
    Lui { rd: Register, imm: Word },
    Auipc { rd: Register, imm: Word },
    Jal { rd: Register, offset: i32 },
    Jalr { rd: Register, rs1: Register, offset: i32 },
    Branch { op: BranchOp, rs1: Register, rs2: Register, offset: i32 },
    Load { op: LoadOp, rd: Register, rs1: Register, offset: i32 },
    Store { op: StoreOp, rs1: Register, rs2: Register, offset: i32 },
    OpImm { op: AluOp, rd: Register, rs1: Register, imm: i32 },
    Op { op: AluOp, rd: Register, rs1: Register, rs2: Register },
    Ecall,
    Ebreak,
}

/// Sign extends the low `bits` bits of `value`
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

impl Instruction {
    /// Decodes a raw instruction word, returning `None` for anything outside RV32IM
    pub fn decode(word: Word) -> Option<Instruction> {
        let opcode = word & 0x7f;
        let rd = Register::from_field(word >> 7);
        let funct3 = (word >> 12) & 0x7;
        let rs1 = Register::from_field(word >> 15);
        let rs2 = Register::from_field(word >> 20);
        let funct7 = word >> 25;
        let imm_i = (word as i32) >> 20;

        let instruction = match opcode {
            OPCODE_LUI => Instruction::Lui {
                rd,
                imm: word & 0xffff_f000,
            },
            OPCODE_AUIPC => Instruction::Auipc {
                rd,
                imm: word & 0xffff_f000,
            },
            OPCODE_JAL => {
                let raw = ((word >> 31) & 1) << 20
                    | ((word >> 12) & 0xff) << 12
                    | ((word >> 20) & 1) << 11
                    | ((word >> 21) & 0x3ff) << 1;

                Instruction::Jal {
                    rd,
                    offset: sign_extend(raw, 21),
                }
            }
            OPCODE_JALR if funct3 == 0 => Instruction::Jalr {
                rd,
                rs1,
                offset: imm_i,
            },
            OPCODE_BRANCH => {
                let raw = ((word >> 31) & 1) << 12
                    | ((word >> 7) & 1) << 11
                    | ((word >> 25) & 0x3f) << 5
                    | ((word >> 8) & 0xf) << 1;

                Instruction::Branch {
                    op: BranchOp::from_funct3(funct3)?,
                    rs1,
                    rs2,
                    offset: sign_extend(raw, 13),
                }
            }
            OPCODE_LOAD => Instruction::Load {
                op: LoadOp::from_funct3(funct3)?,
                rd,
                rs1,
                offset: imm_i,
            },
            OPCODE_STORE => {
                let raw = (funct7 << 5) | ((word >> 7) & 0x1f);

                Instruction::Store {
                    op: StoreOp::from_funct3(funct3)?,
                    rs1,
                    rs2,
                    offset: sign_extend(raw, 12),
                }
            }
            OPCODE_OP_IMM => {
                let (op, imm) = match funct3 {
                    1 if funct7 == 0 => (AluOp::Sll, ((word >> 20) & 0x1f) as i32),
                    5 if funct7 == 0 => (AluOp::Srl, ((word >> 20) & 0x1f) as i32),
                    5 if funct7 == 0x20 => (AluOp::Sra, ((word >> 20) & 0x1f) as i32),
                    1 | 5 => return None,
                    _ => (AluOp::from_funct(funct3, 0)?, imm_i),
                };

                Instruction::OpImm { op, rd, rs1, imm }
            }
            OPCODE_OP => Instruction::Op {
                op: AluOp::from_funct(funct3, funct7)?,
                rd,
                rs1,
                rs2,
            },
            OPCODE_SYSTEM if word == ECALL => Instruction::Ecall,
            OPCODE_SYSTEM if word == EBREAK => Instruction::Ebreak,
            _ => return None,
        };

        Some(instruction)
    }

    /// Encodes the instruction into its 32 bit representation
    pub fn encode(&self) -> Word {
        let reg = |r: Register, shift: u32| (r.0 as u32) << shift;

        match *self {
            Instruction::Lui { rd, imm } => (imm & 0xffff_f000) | reg(rd, 7) | OPCODE_LUI,
            Instruction::Auipc { rd, imm } => (imm & 0xffff_f000) | reg(rd, 7) | OPCODE_AUIPC,
            Instruction::Jal { rd, offset } => {
                let imm = offset as u32;

                ((imm >> 20) & 1) << 31
                    | ((imm >> 1) & 0x3ff) << 21
                    | ((imm >> 11) & 1) << 20
                    | ((imm >> 12) & 0xff) << 12
                    | reg(rd, 7)
                    | OPCODE_JAL
            }
            Instruction::Jalr { rd, rs1, offset } => {
                ((offset as u32) & 0xfff) << 20 | reg(rs1, 15) | reg(rd, 7) | OPCODE_JALR
            }
            Instruction::Branch {
                op,
                rs1,
                rs2,
                offset,
            } => {
                let imm = offset as u32;

                ((imm >> 12) & 1) << 31
                    | ((imm >> 5) & 0x3f) << 25
                    | reg(rs2, 20)
                    | reg(rs1, 15)
                    | op.funct3() << 12
                    | ((imm >> 1) & 0xf) << 8
                    | ((imm >> 11) & 1) << 7
                    | OPCODE_BRANCH
            }
            Instruction::Load {
                op,
                rd,
                rs1,
                offset,
            } => {
                ((offset as u32) & 0xfff) << 20
                    | reg(rs1, 15)
                    | op.funct3() << 12
                    | reg(rd, 7)
                    | OPCODE_LOAD
            }
            Instruction::Store {
                op,
                rs1,
                rs2,
                offset,
            } => {
                let imm = offset as u32;

                ((imm >> 5) & 0x7f) << 25
                    | reg(rs2, 20)
                    | reg(rs1, 15)
                    | op.funct3() << 12
                    | (imm & 0x1f) << 7
                    | OPCODE_STORE
            }
            Instruction::OpImm { op, rd, rs1, imm } => {
                let (funct3, funct7) = op.funct();
                let imm = if op.is_shift() {
                    funct7 << 5 | (imm as u32 & 0x1f)
                } else {
                    imm as u32 & 0xfff
                };

                imm << 20 | reg(rs1, 15) | funct3 << 12 | reg(rd, 7) | OPCODE_OP_IMM
            }
            Instruction::Op { op, rd, rs1, rs2 } => {
                let (funct3, funct7) = op.funct();

                funct7 << 25
                    | reg(rs2, 20)
                    | reg(rs1, 15)
                    | funct3 << 12
                    | reg(rd, 7)
                    | OPCODE_OP
            }
            Instruction::Ecall => ECALL,
            Instruction::Ebreak => EBREAK,
        }
    }

    /// A jump-and-link whose link register is `ra`, i.e. a call by the calling convention.
    ///
    /// Detection is purely syntactic: a hand written `jalr ra, ...` that is not meant as a
    /// call is still reported as one.
    pub fn is_call(&self) -> bool {
        match *self {
            Instruction::Jal { rd, .. } | Instruction::Jalr { rd, .. } => rd == Register::RA,
            _ => false,
        }
    }

    /// `jalr zero, 0(ra)`
    pub fn is_return(&self) -> bool {
        match *self {
            Instruction::Jalr { rd, rs1, offset } => {
                rd == Register::ZERO && rs1 == Register::RA && offset == 0
            }
            _ => false,
        }
    }

    /// The source registers the instruction reads
    pub fn sources(&self) -> (Option<Register>, Option<Register>) {
        match *self {
            Instruction::Lui { .. } | Instruction::Auipc { .. } | Instruction::Jal { .. } => {
                (None, None)
            }
            Instruction::Jalr { rs1, .. }
            | Instruction::Load { rs1, .. }
            | Instruction::OpImm { rs1, .. } => (Some(rs1), None),
            Instruction::Branch { rs1, rs2, .. }
            | Instruction::Store { rs1, rs2, .. }
            | Instruction::Op { rs1, rs2, .. } => (Some(rs1), Some(rs2)),
            Instruction::Ecall | Instruction::Ebreak => (None, None),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Lui { rd, imm } => write!(f, "lui {}, 0x{:x}", rd, imm >> 12),
            Instruction::Auipc { rd, imm } => write!(f, "auipc {}, 0x{:x}", rd, imm >> 12),
            Instruction::Jal { rd, offset } => write!(f, "jal {}, {}", rd, offset),
            Instruction::Jalr { rd, rs1, offset } => {
                write!(f, "jalr {}, {}({})", rd, offset, rs1)
            }
            Instruction::Branch {
                op,
                rs1,
                rs2,
                offset,
            } => write!(f, "{} {}, {}, {}", op.mnemonic(), rs1, rs2, offset),
            Instruction::Load {
                op,
                rd,
                rs1,
                offset,
            } => write!(f, "{} {}, {}({})", op.mnemonic(), rd, offset, rs1),
            Instruction::Store {
                op,
                rs1,
                rs2,
                offset,
            } => write!(f, "{} {}, {}({})", op.mnemonic(), rs2, offset, rs1),
            Instruction::OpImm {
                op: AluOp::Sltu,
                rd,
                rs1,
                imm,
            } => write!(f, "sltiu {}, {}, {}", rd, rs1, imm),
            Instruction::OpImm { op, rd, rs1, imm } => {
                write!(f, "{}i {}, {}, {}", op.mnemonic(), rd, rs1, imm)
            }
            Instruction::Op { op, rd, rs1, rs2 } => {
                write!(f, "{} {}, {}, {}", op.mnemonic(), rd, rs1, rs2)
            }
            Instruction::Ecall => write!(f, "ecall"),
            Instruction::Ebreak => write!(f, "ebreak"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(name: &str) -> Register {
        Register::parse(name).unwrap()
    }

    #[test]
    fn register_names() {
        assert_eq!(reg("sp"), Register::SP);
        assert_eq!(reg("x1"), Register::RA);
        assert_eq!(reg("fp"), reg("s0"));
        assert_eq!(reg("a7"), Register::A7);
        assert!(Register::parse("x32").is_none());
        assert!(Register::parse("q3").is_none());
    }

    #[test]
    fn decode_known_words() {
        // addi a0, zero, 0
        assert_eq!(
            Instruction::decode(0x0000_0513),
            Some(Instruction::OpImm {
                op: AluOp::Add,
                rd: Register::A0,
                rs1: Register::ZERO,
                imm: 0,
            })
        );
        // ret
        assert!(Instruction::decode(0x0000_8067).unwrap().is_return());
        assert_eq!(Instruction::decode(0x0000_0073), Some(Instruction::Ecall));
        assert_eq!(Instruction::decode(0), None);
        assert_eq!(Instruction::decode(0xffff_ffff), None);
    }

    #[test]
    fn immediates_survive_encoding() {
        let samples = vec![
            Instruction::Jal {
                rd: Register::RA,
                offset: -2048,
            },
            Instruction::Jal {
                rd: Register::ZERO,
                offset: 0x7fffe,
            },
            Instruction::Branch {
                op: BranchOp::Lt,
                rs1: reg("t0"),
                rs2: reg("a1"),
                offset: -4094,
            },
            Instruction::Store {
                op: StoreOp::Word,
                rs1: Register::SP,
                rs2: Register::RA,
                offset: -12,
            },
            Instruction::OpImm {
                op: AluOp::Sra,
                rd: reg("t1"),
                rs1: reg("t1"),
                imm: 31,
            },
            Instruction::Op {
                op: AluOp::Remu,
                rd: reg("a0"),
                rs1: reg("a1"),
                rs2: reg("a2"),
            },
        ];

        for instruction in samples {
            assert_eq!(Instruction::decode(instruction.encode()), Some(instruction));
        }
    }

    #[test]
    fn call_detection_looks_at_the_link_register() {
        let call = Instruction::Jal {
            rd: Register::RA,
            offset: 64,
        };
        let indirect = Instruction::Jalr {
            rd: Register::RA,
            rs1: reg("t0"),
            offset: 0,
        };
        let jump = Instruction::Jal {
            rd: Register::ZERO,
            offset: 64,
        };

        assert!(call.is_call());
        assert!(indirect.is_call());
        assert!(!jump.is_call());
        assert!(!Instruction::Ecall.is_call());
    }

    #[test]
    fn division_edge_cases() {
        assert_eq!(AluOp::Div.apply(7, 0), 0xffff_ffff);
        assert_eq!(AluOp::Rem.apply(7, 0), 7);
        assert_eq!(AluOp::Div.apply(0x8000_0000, (-1i32) as u32), 0x8000_0000);
        assert_eq!(AluOp::Div.apply((-9i32) as u32, 2), (-4i32) as u32);
        assert_eq!(AluOp::Mulh.apply((-1i32) as u32, (-1i32) as u32), 0);
    }

    #[test]
    fn disassembly() {
        let word = Instruction::Load {
            op: LoadOp::Word,
            rd: reg("t1"),
            rs1: reg("t0"),
            offset: 8,
        }
        .encode();

        assert_eq!(Instruction::decode(word).unwrap().to_string(), "lw t1, 8(t0)");
    }
}
