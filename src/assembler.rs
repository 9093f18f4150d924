//! A two pass assembler for RV32IM sources.
//!
//! The first pass splits the source into statements, assigns addresses to labels and lays out
//! the data segment. The second pass encodes the instructions once every label is known.

use crate::consts::*;
use crate::instruction::{AluOp, BranchOp, Instruction, LoadOp, Register, StoreOp};
use crate::program::Program;
use crate::typedef::*;
use std::collections::BTreeMap;

type AsmResult<T> = ::std::result::Result<T, AsmError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Text,
    Data,
}

struct PendingInstruction {
    line: usize,
    addr: Address,
    mnemonic: String,
    operands: Vec<String>,
}

struct WordFixup {
    line: usize,
    offset: usize,
    label: String,
}

/// Assembles `source` into a program image
pub fn assemble(source: &str) -> AsmResult<Program> {
    let mut labels = BTreeMap::new();
    let mut pending = Vec::new();
    let mut fixups = Vec::new();
    let mut data = Vec::new();
    let mut section = Section::Text;
    let mut text_addr = TEXT_BASE;

    for (index, raw_line) in source.lines().enumerate() {
        let line = index + 1;
        let mut rest = strip_comment(raw_line).trim();

        while let Some((label, after)) = split_label(rest) {
            let addr = match section {
                Section::Text => text_addr,
                Section::Data => DATA_BASE + data.len() as u32,
            };

            if labels.insert(label.to_owned(), addr).is_some() {
                return Err(AsmError::new(line, format!("duplicate label \"{}\"", label)));
            }

            rest = after.trim();
        }

        if rest.is_empty() {
            continue;
        }

        let (head, tail) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };
        let head = head.to_lowercase();

        if head.starts_with('.') {
            directive(&head, tail, line, &mut section, &mut data, &mut fixups)?;
            continue;
        }

        if section != Section::Text {
            return Err(AsmError::new(
                line,
                format!("instruction \"{}\" outside of the .text section", head),
            ));
        }

        let operands = split_operands(tail);
        let size = instruction_size(&head, &operands, line)?;

        pending.push(PendingInstruction {
            line,
            addr: text_addr,
            mnemonic: head,
            operands,
        });

        text_addr += size * INSTRUCTION_WIDTH;
    }

    for fixup in fixups {
        let addr = *labels
            .get(&fixup.label)
            .ok_or_else(|| undefined_label(fixup.line, &fixup.label))?;

        data[fixup.offset..fixup.offset + 4].copy_from_slice(&addr.to_le_bytes());
    }

    let mut text = Vec::new();
    let mut lines = Vec::new();

    for instruction in &pending {
        let encoder = Encoder {
            labels: &labels,
            line: instruction.line,
            pc: instruction.addr,
        };

        for encoded in encoder.encode(&instruction.mnemonic, &instruction.operands)? {
            text.push(encoded.encode());
            lines.push(instruction.line as u32);
        }
    }

    let entry_point = match labels.get("_start") {
        Some(&addr) if addr >= TEXT_BASE && addr < TEXT_END => addr,
        _ => TEXT_BASE,
    };

    Ok(Program {
        text,
        data,
        lines,
        labels,
        entry_point,
    })
}

fn undefined_label(line: usize, label: &str) -> AsmError {
    AsmError::new(line, format!("undefined label \"{}\"", label))
}

/// Removes a `#` comment, leaving string and character literals intact
fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    let mut escaped = false;

    for (pos, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '#') => return &line[..pos],
            _ => {}
        }
    }

    line
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' || c == '$' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

fn split_label(text: &str) -> Option<(&str, &str)> {
    let pos = text.find(':')?;
    let label = text[..pos].trim();

    if is_identifier(label) {
        Some((label, &text[pos + 1..]))
    } else {
        None
    }
}

fn split_operands(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut operands = Vec::new();
    let mut current = String::new();
    let mut quote = None;

    for c in text.chars() {
        match (quote, c) {
            (None, ',') => {
                operands.push(current.trim().to_owned());
                current.clear();
                continue;
            }
            (None, '"') | (None, '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }

        current.push(c);
    }

    operands.push(current.trim().to_owned());
    operands
}

/// Parses decimal, hexadecimal, binary and character literals
pub(crate) fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();

    if text.len() >= 3 && text.starts_with('\'') && text.ends_with('\'') {
        let chars = parse_string_body(&text[1..text.len() - 1])?;
        return match chars.as_slice() {
            [c] => Some(i64::from(*c)),
            _ => None,
        };
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits
        .strip_prefix("0b")
        .or_else(|| digits.strip_prefix("0B"))
    {
        i64::from_str_radix(bin, 2).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { -value } else { value })
}

fn parse_string_body(body: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let escaped = match chars.next()? {
            'n' => b'\n',
            't' => b'\t',
            'r' => b'\r',
            '0' => 0,
            '\\' => b'\\',
            '"' => b'"',
            '\'' => b'\'',
            _ => return None,
        };

        bytes.push(escaped);
    }

    Some(bytes)
}

fn parse_string_literal(text: &str, line: usize) -> AsmResult<Vec<u8>> {
    let text = text.trim();

    if text.len() < 2 || !text.starts_with('"') || !text.ends_with('"') {
        return Err(AsmError::new(line, "expected a string literal"));
    }

    parse_string_body(&text[1..text.len() - 1])
        .ok_or_else(|| AsmError::new(line, "invalid escape sequence in string"))
}

fn integer_in_range(text: &str, min: i64, max: i64, line: usize) -> AsmResult<i64> {
    let value = parse_integer(text)
        .ok_or_else(|| AsmError::new(line, format!("invalid immediate \"{}\"", text)))?;

    if value < min || value > max {
        return Err(AsmError::new(
            line,
            format!("immediate {} out of range [{}, {}]", value, min, max),
        ));
    }

    Ok(value)
}

fn directive(
    name: &str,
    args: &str,
    line: usize,
    section: &mut Section,
    data: &mut Vec<u8>,
    fixups: &mut Vec<WordFixup>,
) -> AsmResult<()> {
    match name {
        ".text" => *section = Section::Text,
        ".data" => *section = Section::Data,
        ".section" => match args.trim() {
            ".text" => *section = Section::Text,
            ".data" | ".rodata" | ".bss" => *section = Section::Data,
            other => {
                return Err(AsmError::new(
                    line,
                    format!("unknown section \"{}\"", other),
                ))
            }
        },
        ".globl" | ".global" | ".type" | ".size" => {}
        ".align" | ".p2align" if *section == Section::Text => {}
        _ if *section != Section::Data => {
            return Err(AsmError::new(
                line,
                format!("directive \"{}\" outside of the .data section", name),
            ))
        }
        ".byte" => {
            for arg in split_operands(args) {
                data.push(integer_in_range(&arg, -128, 255, line)? as u8);
            }
        }
        ".half" | ".short" => {
            for arg in split_operands(args) {
                let value = integer_in_range(&arg, -32768, 65535, line)? as u16;
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        ".word" => {
            for arg in split_operands(args) {
                if is_identifier(&arg) {
                    fixups.push(WordFixup {
                        line,
                        offset: data.len(),
                        label: arg,
                    });
                    data.extend_from_slice(&[0; 4]);
                } else {
                    let value =
                        integer_in_range(&arg, i64::from(i32::min_value()), 0xffff_ffff, line)?;
                    data.extend_from_slice(&(value as u32).to_le_bytes());
                }
            }
        }
        ".ascii" | ".asciz" | ".string" => {
            for arg in split_operands(args) {
                data.extend(parse_string_literal(&arg, line)?);

                if name != ".ascii" {
                    data.push(0);
                }
            }
        }
        ".space" | ".zero" => {
            let count = integer_in_range(args, 0, i64::from(DATA_LEN), line)?;
            data.resize(data.len() + count as usize, 0);
        }
        ".align" | ".p2align" => {
            let power = integer_in_range(args, 0, 12, line)?;
            let alignment = 1usize << power;
            let padded = (data.len() + alignment - 1) / alignment * alignment;
            data.resize(padded, 0);
        }
        other => {
            return Err(AsmError::new(
                line,
                format!("unknown directive \"{}\"", other),
            ))
        }
    }

    if data.len() > DATA_LEN as usize {
        return Err(AsmError::new(line, "data section too large"));
    }

    Ok(())
}

fn fits_i12(value: i64) -> bool {
    value >= -2048 && value <= 2047
}

const KNOWN_MNEMONICS: &[&str] = &[
    "lui", "auipc", "jal", "jalr", "beq", "bne", "blt", "bge", "bltu", "bgeu", "beqz", "bnez",
    "blez", "bgez", "bltz", "bgtz", "bgt", "ble", "bgtu", "bleu", "lb", "lh", "lw", "lbu",
    "lhu", "sb", "sh", "sw", "addi", "slti", "sltiu", "xori", "ori", "andi", "slli", "srli",
    "srai", "ecall", "ebreak", "nop", "mv", "not", "neg", "seqz", "snez", "j", "jr", "ret",
    "call", "tail", "la",
];

/// The number of instruction words a statement expands to
fn instruction_size(mnemonic: &str, operands: &[String], line: usize) -> AsmResult<u32> {
    match mnemonic {
        "la" => Ok(2),
        "li" => {
            let imm = operands
                .get(1)
                .ok_or_else(|| AsmError::new(line, "expected 2 operands, found 1"))?;
            let value = integer_in_range(imm, i64::from(i32::min_value()), 0xffff_ffff, line)?;

            Ok(if fits_i12(i64::from(value as i32)) { 1 } else { 2 })
        }
        _ if KNOWN_MNEMONICS.contains(&mnemonic) || AluOp::from_mnemonic(mnemonic).is_some() => {
            Ok(1)
        }
        _ => Err(AsmError::new(
            line,
            format!("unknown instruction \"{}\"", mnemonic),
        )),
    }
}

struct Encoder<'a> {
    labels: &'a BTreeMap<String, Address>,
    line: usize,
    pc: Address,
}

impl<'a> Encoder<'a> {
    fn error<S: Into<String>>(&self, message: S) -> AsmError {
        AsmError::new(self.line, message)
    }

    fn expect(&self, operands: &[String], count: usize) -> AsmResult<()> {
        if operands.len() == count {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected {} operands, found {}",
                count,
                operands.len()
            )))
        }
    }

    fn reg(&self, text: &str) -> AsmResult<Register> {
        Register::parse(text).ok_or_else(|| self.error(format!("invalid register \"{}\"", text)))
    }

    fn imm(&self, text: &str, min: i64, max: i64) -> AsmResult<i32> {
        integer_in_range(text, min, max, self.line).map(|v| v as i32)
    }

    fn imm12(&self, text: &str) -> AsmResult<i32> {
        self.imm(text, -2048, 2047)
    }

    fn label(&self, text: &str) -> AsmResult<Address> {
        self.labels
            .get(text.trim())
            .cloned()
            .ok_or_else(|| undefined_label(self.line, text.trim()))
    }

    /// A pc relative offset to a label or a literal offset
    fn target(&self, text: &str, bits: u32) -> AsmResult<i32> {
        let limit = 1i64 << (bits - 1);

        let offset = if is_identifier(text.trim()) {
            i64::from(self.label(text)?) - i64::from(self.pc)
        } else {
            i64::from(self.imm(text, -limit, limit - 1)?)
        };

        if offset < -limit || offset >= limit {
            return Err(self.error(format!("jump target \"{}\" out of range", text.trim())));
        }

        if offset % 2 != 0 {
            return Err(self.error("jump target is not aligned"));
        }

        Ok(offset as i32)
    }

    /// Parses `imm(reg)` and `(reg)`
    fn memory(&self, text: &str) -> AsmResult<(i32, Register)> {
        let text = text.trim();
        let open = text
            .find('(')
            .ok_or_else(|| self.error(format!("expected a memory operand, found \"{}\"", text)))?;

        if !text.ends_with(')') {
            return Err(self.error(format!("unbalanced parenthesis in \"{}\"", text)));
        }

        let reg = self.reg(&text[open + 1..text.len() - 1])?;
        let offset = match text[..open].trim() {
            "" => 0,
            imm => self.imm12(imm)?,
        };

        Ok((offset, reg))
    }

    fn branch(&self, op: BranchOp, rs1: &str, rs2: &str, target: &str) -> AsmResult<Instruction> {
        Ok(Instruction::Branch {
            op,
            rs1: self.reg(rs1)?,
            rs2: self.reg(rs2)?,
            offset: self.target(target, 13)?,
        })
    }

    fn branch_zero(&self, op: BranchOp, operands: &[String], swap: bool) -> AsmResult<Instruction> {
        self.expect(operands, 2)?;

        if swap {
            self.branch(op, "zero", &operands[0], &operands[1])
        } else {
            self.branch(op, &operands[0], "zero", &operands[1])
        }
    }

    fn branch_swapped(&self, op: BranchOp, operands: &[String]) -> AsmResult<Instruction> {
        self.expect(operands, 3)?;
        self.branch(op, &operands[1], &operands[0], &operands[2])
    }

    fn upper(&self, text: &str) -> AsmResult<Word> {
        let value = self.imm(text, -0x80000, 0xfffff)?;
        Ok((value as u32) << 12)
    }

    /// Splits a 32 bit constant into a `lui`/`addi` pair
    fn load_constant(&self, rd: Register, value: u32) -> Vec<Instruction> {
        let low = crate::instruction::sign_extend(value & 0xfff, 12);
        let high = value.wrapping_sub(low as u32) & 0xffff_f000;

        vec![
            Instruction::Lui { rd, imm: high },
            Instruction::OpImm {
                op: AluOp::Add,
                rd,
                rs1: rd,
                imm: low,
            },
        ]
    }

    fn encode(&self, mnemonic: &str, ops: &[String]) -> AsmResult<Vec<Instruction>> {
        let single = |i: Instruction| -> AsmResult<Vec<Instruction>> { Ok(vec![i]) };

        if let Some(op) = AluOp::from_mnemonic(mnemonic) {
            self.expect(ops, 3)?;
            return single(Instruction::Op {
                op,
                rd: self.reg(&ops[0])?,
                rs1: self.reg(&ops[1])?,
                rs2: self.reg(&ops[2])?,
            });
        }

        match mnemonic {
            "addi" | "slti" | "sltiu" | "xori" | "ori" | "andi" => {
                self.expect(ops, 3)?;
                let op = match mnemonic {
                    "addi" => AluOp::Add,
                    "slti" => AluOp::Slt,
                    "sltiu" => AluOp::Sltu,
                    "xori" => AluOp::Xor,
                    "ori" => AluOp::Or,
                    _ => AluOp::And,
                };

                single(Instruction::OpImm {
                    op,
                    rd: self.reg(&ops[0])?,
                    rs1: self.reg(&ops[1])?,
                    imm: self.imm12(&ops[2])?,
                })
            }
            "slli" | "srli" | "srai" => {
                self.expect(ops, 3)?;
                let op = match mnemonic {
                    "slli" => AluOp::Sll,
                    "srli" => AluOp::Srl,
                    _ => AluOp::Sra,
                };

                single(Instruction::OpImm {
                    op,
                    rd: self.reg(&ops[0])?,
                    rs1: self.reg(&ops[1])?,
                    imm: self.imm(&ops[2], 0, 31)?,
                })
            }
            "lb" | "lh" | "lw" | "lbu" | "lhu" => {
                self.expect(ops, 2)?;
                let op = match mnemonic {
                    "lb" => LoadOp::Byte,
                    "lh" => LoadOp::Half,
                    "lw" => LoadOp::Word,
                    "lbu" => LoadOp::ByteUnsigned,
                    _ => LoadOp::HalfUnsigned,
                };
                let (offset, rs1) = self.memory(&ops[1])?;

                single(Instruction::Load {
                    op,
                    rd: self.reg(&ops[0])?,
                    rs1,
                    offset,
                })
            }
            "sb" | "sh" | "sw" => {
                self.expect(ops, 2)?;
                let op = match mnemonic {
                    "sb" => StoreOp::Byte,
                    "sh" => StoreOp::Half,
                    _ => StoreOp::Word,
                };
                let (offset, rs1) = self.memory(&ops[1])?;

                single(Instruction::Store {
                    op,
                    rs1,
                    rs2: self.reg(&ops[0])?,
                    offset,
                })
            }
            "beq" | "bne" | "blt" | "bge" | "bltu" | "bgeu" => {
                self.expect(ops, 3)?;
                let op = match mnemonic {
                    "beq" => BranchOp::Eq,
                    "bne" => BranchOp::Ne,
                    "blt" => BranchOp::Lt,
                    "bge" => BranchOp::Ge,
                    "bltu" => BranchOp::Ltu,
                    _ => BranchOp::Geu,
                };

                single(self.branch(op, &ops[0], &ops[1], &ops[2])?)
            }
            "beqz" => single(self.branch_zero(BranchOp::Eq, ops, false)?),
            "bnez" => single(self.branch_zero(BranchOp::Ne, ops, false)?),
            "bltz" => single(self.branch_zero(BranchOp::Lt, ops, false)?),
            "bgez" => single(self.branch_zero(BranchOp::Ge, ops, false)?),
            "blez" => single(self.branch_zero(BranchOp::Ge, ops, true)?),
            "bgtz" => single(self.branch_zero(BranchOp::Lt, ops, true)?),
            "bgt" => single(self.branch_swapped(BranchOp::Lt, ops)?),
            "ble" => single(self.branch_swapped(BranchOp::Ge, ops)?),
            "bgtu" => single(self.branch_swapped(BranchOp::Ltu, ops)?),
            "bleu" => single(self.branch_swapped(BranchOp::Geu, ops)?),
            "jal" => match ops.len() {
                1 => single(Instruction::Jal {
                    rd: Register::RA,
                    offset: self.target(&ops[0], 21)?,
                }),
                _ => {
                    self.expect(ops, 2)?;
                    single(Instruction::Jal {
                        rd: self.reg(&ops[0])?,
                        offset: self.target(&ops[1], 21)?,
                    })
                }
            },
            "jalr" => match ops.len() {
                1 => single(Instruction::Jalr {
                    rd: Register::RA,
                    rs1: self.reg(&ops[0])?,
                    offset: 0,
                }),
                2 if ops[1].contains('(') => {
                    let (offset, rs1) = self.memory(&ops[1])?;
                    single(Instruction::Jalr {
                        rd: self.reg(&ops[0])?,
                        rs1,
                        offset,
                    })
                }
                2 => single(Instruction::Jalr {
                    rd: self.reg(&ops[0])?,
                    rs1: self.reg(&ops[1])?,
                    offset: 0,
                }),
                _ => {
                    self.expect(ops, 3)?;
                    single(Instruction::Jalr {
                        rd: self.reg(&ops[0])?,
                        rs1: self.reg(&ops[1])?,
                        offset: self.imm12(&ops[2])?,
                    })
                }
            },
            "j" | "tail" => {
                self.expect(ops, 1)?;
                single(Instruction::Jal {
                    rd: Register::ZERO,
                    offset: self.target(&ops[0], 21)?,
                })
            }
            "call" => {
                self.expect(ops, 1)?;
                single(Instruction::Jal {
                    rd: Register::RA,
                    offset: self.target(&ops[0], 21)?,
                })
            }
            "jr" => {
                self.expect(ops, 1)?;
                single(Instruction::Jalr {
                    rd: Register::ZERO,
                    rs1: self.reg(&ops[0])?,
                    offset: 0,
                })
            }
            "ret" => {
                self.expect(ops, 0)?;
                single(Instruction::Jalr {
                    rd: Register::ZERO,
                    rs1: Register::RA,
                    offset: 0,
                })
            }
            "lui" | "auipc" => {
                self.expect(ops, 2)?;
                let rd = self.reg(&ops[0])?;
                let imm = self.upper(&ops[1])?;

                single(if mnemonic == "lui" {
                    Instruction::Lui { rd, imm }
                } else {
                    Instruction::Auipc { rd, imm }
                })
            }
            "li" => {
                self.expect(ops, 2)?;
                let rd = self.reg(&ops[0])?;
                let value = self.imm(&ops[1], i64::from(i32::min_value()), 0xffff_ffff)?;

                if fits_i12(i64::from(value)) {
                    single(Instruction::OpImm {
                        op: AluOp::Add,
                        rd,
                        rs1: Register::ZERO,
                        imm: value,
                    })
                } else {
                    Ok(self.load_constant(rd, value as u32))
                }
            }
            "la" => {
                self.expect(ops, 2)?;
                let rd = self.reg(&ops[0])?;
                let addr = self.label(&ops[1])?;

                Ok(self.load_constant(rd, addr))
            }
            "mv" | "not" | "neg" | "seqz" | "snez" => {
                self.expect(ops, 2)?;
                let rd = self.reg(&ops[0])?;
                let rs = self.reg(&ops[1])?;

                single(match mnemonic {
                    "mv" => Instruction::OpImm {
                        op: AluOp::Add,
                        rd,
                        rs1: rs,
                        imm: 0,
                    },
                    "not" => Instruction::OpImm {
                        op: AluOp::Xor,
                        rd,
                        rs1: rs,
                        imm: -1,
                    },
                    "seqz" => Instruction::OpImm {
                        op: AluOp::Sltu,
                        rd,
                        rs1: rs,
                        imm: 1,
                    },
                    "snez" => Instruction::Op {
                        op: AluOp::Sltu,
                        rd,
                        rs1: Register::ZERO,
                        rs2: rs,
                    },
                    _ => Instruction::Op {
                        op: AluOp::Sub,
                        rd,
                        rs1: Register::ZERO,
                        rs2: rs,
                    },
                })
            }
            "nop" => {
                self.expect(ops, 0)?;
                single(Instruction::OpImm {
                    op: AluOp::Add,
                    rd: Register::ZERO,
                    rs1: Register::ZERO,
                    imm: 0,
                })
            }
            "ecall" => {
                self.expect(ops, 0)?;
                single(Instruction::Ecall)
            }
            "ebreak" => {
                self.expect(ops, 0)?;
                single(Instruction::Ebreak)
            }
            other => Err(self.error(format!("unknown instruction \"{}\"", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_line_table() {
        let program = assemble(
            "# leading comment\n\
             _start:\n\
             \tli a0, 5      # small\n\
             \tli a1, 0x12345\n\
             loop: addi a0, a0, -1\n\
             \tbnez a0, loop\n",
        )
        .unwrap();

        assert_eq!(program.entry_point, TEXT_BASE);
        assert_eq!(program.labels["loop"], TEXT_BASE + 12);
        assert_eq!(program.lines, vec![3, 4, 4, 5, 6]);

        let branch = Instruction::decode(program.text[4]).unwrap();
        assert_eq!(
            branch,
            Instruction::Branch {
                op: BranchOp::Ne,
                rs1: Register::A0,
                rs2: Register::ZERO,
                offset: -4,
            }
        );
    }

    #[test]
    fn large_constants_are_split() {
        let encoder = Encoder {
            labels: &BTreeMap::new(),
            line: 1,
            pc: TEXT_BASE,
        };

        for &value in &[0x12345u32, 0x7FFF_F800, 0xFFFF_F800, 0x1000_0ffc] {
            let pair = encoder.load_constant(Register::A0, value);
            let (high, low) = match (pair[0], pair[1]) {
                (Instruction::Lui { imm, .. }, Instruction::OpImm { imm: low, .. }) => (imm, low),
                other => panic!("unexpected expansion {:?}", other),
            };

            assert_eq!(high.wrapping_add(low as u32), value);
        }
    }

    #[test]
    fn start_label_sets_the_entry_point() {
        let program = assemble("square:\n mul a0, a0, a0\n ret\n_start:\n call square\n").unwrap();

        assert_eq!(program.entry_point, TEXT_BASE + 8);
        assert_eq!(program.label_at(TEXT_BASE), Some("square"));
    }

    #[test]
    fn data_directives() {
        let program = assemble(
            ".data\n\
             msg: .asciz \"hi: #1\\n\"\n\
             .align 2\n\
             ptr: .word msg, -1\n\
             .text\n\
             la t0, ptr\n",
        )
        .unwrap();

        assert_eq!(&program.data[..7], b"hi: #1\n");
        assert_eq!(program.data[7], 0);
        assert_eq!(program.labels["ptr"], DATA_BASE + 8);
        assert_eq!(&program.data[8..12], &DATA_BASE.to_le_bytes());
        assert_eq!(&program.data[12..16], &[0xff; 4]);
        assert_eq!(program.text.len(), 2);
    }

    #[test]
    fn errors_carry_the_source_line() {
        let err = assemble("nop\n\n  frobnicate a0\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.message, "unknown instruction \"frobnicate\"");

        let err = assemble("j nowhere\n").unwrap_err();
        assert_eq!(err, AsmError::new(1, "undefined label \"nowhere\""));

        let err = assemble("addi a0, a0, 4096\n").unwrap_err();
        assert_eq!(err.line, 1);

        let err = assemble("add a0, a1\n").unwrap_err();
        assert_eq!(err.message, "expected 3 operands, found 2");

        let err = assemble("x:\nx:\n").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn character_literals() {
        assert_eq!(parse_integer("'a'"), Some(97));
        assert_eq!(parse_integer("'\\n'"), Some(10));
        assert_eq!(parse_integer("-0x10"), Some(-16));
        assert_eq!(parse_integer("0b101"), Some(5));
        assert_eq!(parse_integer("five"), None);
    }
}
