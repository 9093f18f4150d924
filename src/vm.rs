use crate::consts::*;
use crate::engine::{Engine, Fault, FaultKind, MemWrite, Provenance, RawFrame};
use crate::instruction::{Instruction, Register};
use crate::program::Program;
use crate::system::{ConsoleSystem, SysCall, System};
use crate::typedef::*;
use byteorder::{ByteOrder, LittleEndian};
use std::mem;

type Endianess = LittleEndian;

/// The lowest stack address
pub const STACK_BASE: Address = STACK_TOP - STACK_LEN;

/// Provenance tag of a stack word nobody wrote in the current function
const UNWRITTEN: u8 = 0xff;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Segment {
    Text,
    Data,
    Stack,
}

/// The memory of the simulated machine: text, static data and the stack
#[derive(Clone, Debug, Default)]
pub struct Memory {
    text: Vec<u8>,
    data: Vec<u8>,
    stack: Vec<u8>,
}

impl Memory {
    fn load(program: &Program) -> Memory {
        let mut text = vec![0; program.text.len() * 4];
        for (i, word) in program.text.iter().enumerate() {
            <Endianess as ByteOrder>::write_u32(&mut text[i * 4..], *word);
        }

        let mut data = program.data.clone();
        data.resize(DATA_LEN as usize, 0);

        Memory {
            text,
            data,
            stack: vec![0; STACK_LEN as usize],
        }
    }

    fn locate(&self, addr: Address, width: u32) -> Option<(Segment, usize)> {
        let end = u64::from(addr) + u64::from(width);
        let within = |base: Address, len: usize| {
            addr >= base && end <= u64::from(base) + len as u64
        };

        if within(TEXT_BASE, self.text.len()) {
            Some((Segment::Text, (addr - TEXT_BASE) as usize))
        } else if within(DATA_BASE, self.data.len()) {
            Some((Segment::Data, (addr - DATA_BASE) as usize))
        } else if within(STACK_BASE, self.stack.len()) {
            Some((Segment::Stack, (addr - STACK_BASE) as usize))
        } else {
            None
        }
    }

    fn segment(&self, segment: Segment) -> &[u8] {
        match segment {
            Segment::Text => &self.text,
            Segment::Data => &self.data,
            Segment::Stack => &self.stack,
        }
    }

    /// Reads 1, 2 or 4 bytes from the given address
    pub fn read(&self, addr: Address, width: u32) -> Option<Word> {
        let (segment, offset) = self.locate(addr, width)?;
        let bytes = &self.segment(segment)[offset..];

        match width {
            1 => Some(Word::from(bytes[0])),
            2 => Some(Word::from(<Endianess as ByteOrder>::read_u16(bytes))),
            4 => Some(<Endianess as ByteOrder>::read_u32(bytes)),
            _ => None,
        }
    }

    /// Returns the u8 at the given address
    pub fn read_u8(&self, addr: Address) -> Option<u8> {
        self.read(addr, 1).map(|value| value as u8)
    }

    /// Writes 1, 2 or 4 bytes to the given address. The text segment is read-only.
    pub fn write(&mut self, addr: Address, width: u32, value: Word) -> bool {
        let (segment, offset) = match self.locate(addr, width) {
            Some((Segment::Text, _)) | None => return false,
            Some(located) => located,
        };

        let bytes = match segment {
            Segment::Data => &mut self.data[offset..],
            _ => &mut self.stack[offset..],
        };

        match width {
            1 => bytes[0] = value as u8,
            2 => <Endianess as ByteOrder>::write_u16(bytes, value as u16),
            4 => <Endianess as ByteOrder>::write_u32(bytes, value),
            _ => return false,
        }

        true
    }
}

/// The architectural state visible to a [`System`]
#[derive(Clone, Debug, Default)]
pub struct Cpu {
    /// The program counter
    pub pc: Address,
    /// The memory of the machine
    pub mem: Memory,
    /// Console output produced since the engine last handed it out
    pub output: String,
    regs: [Word; 32],
    /// One bit per register that holds a defined value
    initialized: u32,
}

impl Cpu {
    /// Returns the value of a register
    pub fn reg(&self, reg: Register) -> Word {
        self.regs[reg.index()]
    }

    /// Writes a register; writes to `zero` are dropped
    pub fn set_reg(&mut self, reg: Register, value: Word) {
        if reg != Register::ZERO {
            self.regs[reg.index()] = value;
            self.initialized |= 1 << reg.index();
        }
    }

    fn is_initialized(&self, reg: Register) -> bool {
        reg == Register::ZERO || self.initialized & (1 << reg.index()) != 0
    }

    fn invalidate_temporaries(&mut self) {
        for reg in Register::temporaries() {
            self.initialized &= !(1 << reg.index());
        }
    }
}

/// Callee-saved state recorded when a call is made
#[derive(Clone, Debug)]
struct SavedRegisters {
    return_address: Address,
    callee_saved: Vec<(Register, Word)>,
}

/// The reference RV32IM engine
#[derive(Clone, Debug)]
pub struct Vm<S: System = ConsoleSystem> {
    cpu: Cpu,
    system: S,
    program: Program,
    frames: Vec<RawFrame>,
    saved: Vec<SavedRegisters>,
    stack_written_by: Vec<u8>,
    exited: bool,
    fault: Option<Fault>,
    mem_written: MemWrite,
    reg_written: u8,
}

impl<S: System + Default> Default for Vm<S> {
    fn default() -> Self {
        Vm::new(S::default())
    }
}

impl<S: System> Vm<S> {
    /// Creates an engine that answers environment calls with the given system
    pub fn new(system: S) -> Vm<S> {
        Vm {
            cpu: Cpu::default(),
            system,
            program: Program::default(),
            frames: Vec::new(),
            saved: Vec::new(),
            stack_written_by: vec![UNWRITTEN; (STACK_LEN / 4) as usize],
            exited: false,
            fault: None,
            mem_written: MemWrite::default(),
            reg_written: 0,
        }
    }

    /// The loaded program
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The architectural state
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Resets the machine to the start of the given program
    pub fn load_program(&mut self, program: Program) {
        let mut cpu = Cpu {
            pc: program.entry_point,
            mem: Memory::load(&program),
            ..Cpu::default()
        };

        cpu.initialized = !0;
        for reg in Register::temporaries().chain(Register::arguments()) {
            cpu.initialized &= !(1 << reg.index());
        }
        cpu.set_reg(Register::SP, STACK_TOP);
        cpu.set_reg(Register::GP, DATA_BASE);

        self.cpu = cpu;
        self.program = program;
        self.frames.clear();
        self.saved.clear();
        self.stack_written_by = vec![UNWRITTEN; (STACK_LEN / 4) as usize];
        self.exited = false;
        self.fault = None;
        self.mem_written = MemWrite::default();
        self.reg_written = 0;

        self.system.prepare(&mut self.cpu);
    }

    fn stack_word_index(addr: Address) -> Option<usize> {
        if addr >= STACK_BASE && addr < STACK_TOP {
            Some(((addr - STACK_BASE) / 4) as usize)
        } else {
            None
        }
    }

    fn stack_words(addr: Address, width: u32) -> impl Iterator<Item = usize> {
        let first = addr & !3;
        let last = addr.wrapping_add(width - 1) & !3;

        (0..=(last.wrapping_sub(first) / 4))
            .filter_map(move |i| Self::stack_word_index(first.wrapping_add(i * 4)))
    }

    fn write_reg(&mut self, reg: Register, value: Word) {
        self.cpu.set_reg(reg, value);

        if reg != Register::ZERO {
            self.reg_written = reg.index() as u8;
        }
    }

    fn read_reg(&self, reg: Register) -> ::std::result::Result<Word, Fault> {
        if !self.cpu.is_initialized(reg) {
            return Err(Fault::with(
                FaultKind::UninitializedRegister,
                reg.index() as Word,
            ));
        }

        Ok(self.cpu.reg(reg))
    }

    fn push_call(&mut self, target: Address, return_address: Address) {
        let mut args = [0; 8];
        for (slot, reg) in args.iter_mut().zip(Register::arguments()) {
            *slot = self.cpu.reg(reg);
        }

        self.frames.push(RawFrame {
            pc: target,
            sp: self.cpu.reg(Register::SP),
            args,
        });
        self.saved.push(SavedRegisters {
            return_address,
            callee_saved: Register::callee_saved()
                .map(|reg| (reg, self.cpu.reg(reg)))
                .collect(),
        });

        self.cpu.invalidate_temporaries();
    }

    /// Verifies the calling convention before a `ret` and pops the call
    fn pop_call(&mut self) -> ::std::result::Result<(), Fault> {
        let (frame, saved) = match (self.frames.last(), self.saved.last()) {
            (Some(frame), Some(saved)) => (*frame, saved),
            _ => return Err(Fault::new(FaultKind::ReturnWithoutCall)),
        };

        if self.cpu.reg(Register::RA) != saved.return_address {
            return Err(Fault::with_both(
                FaultKind::ReturnAddressMismatch,
                Register::RA.index() as Word,
                saved.return_address,
            ));
        }

        if self.cpu.reg(Register::SP) != frame.sp {
            return Err(Fault::with_both(
                FaultKind::StackPointerMismatch,
                Register::SP.index() as Word,
                frame.sp,
            ));
        }

        for &(reg, value) in &saved.callee_saved {
            if self.cpu.reg(reg) != value {
                return Err(Fault::with_both(
                    FaultKind::CalleeSavedMismatch,
                    reg.index() as Word,
                    value,
                ));
            }
        }

        self.frames.pop();
        self.saved.pop();

        // The callee's frame is dead once it returns
        let live_from = match Self::stack_word_index(frame.sp) {
            Some(index) => index,
            None if frame.sp >= STACK_TOP => self.stack_written_by.len(),
            None => 0,
        };
        for tag in &mut self.stack_written_by[..live_from] {
            *tag = UNWRITTEN;
        }

        self.cpu.invalidate_temporaries();

        Ok(())
    }

    /// Runs one execution cycle and returns the next program counter
    fn execute(
        &mut self,
        instruction: Instruction,
        pc: Address,
    ) -> ::std::result::Result<Address, Fault> {
        let next = pc.wrapping_add(INSTRUCTION_WIDTH);

        match instruction {
            Instruction::Lui { rd, imm } => self.write_reg(rd, imm),
            Instruction::Auipc { rd, imm } => self.write_reg(rd, pc.wrapping_add(imm)),
            Instruction::Jal { rd, offset } => {
                let target = pc.wrapping_add(offset as u32);
                self.write_reg(rd, next);

                if instruction.is_call() {
                    self.push_call(target, next);
                }

                return Ok(target);
            }
            Instruction::Jalr { rd, rs1, offset } => {
                let target = self.read_reg(rs1)?.wrapping_add(offset as u32) & !1;

                if instruction.is_return() {
                    self.pop_call()?;
                }

                self.write_reg(rd, next);

                if instruction.is_call() {
                    self.push_call(target, next);
                }

                return Ok(target);
            }
            Instruction::Branch {
                op,
                rs1,
                rs2,
                offset,
            } => {
                if op.taken(self.read_reg(rs1)?, self.read_reg(rs2)?) {
                    return Ok(pc.wrapping_add(offset as u32));
                }
            }
            Instruction::Load {
                op,
                rd,
                rs1,
                offset,
            } => {
                let addr = self.read_reg(rs1)?.wrapping_add(offset as u32);
                let raw = self
                    .cpu
                    .mem
                    .read(addr, op.width())
                    .ok_or_else(|| Fault::with(FaultKind::BadLoad, addr))?;

                let unwritten = Self::stack_words(addr, op.width())
                    .any(|i| self.stack_written_by[i] == UNWRITTEN);
                if unwritten {
                    return Err(Fault::with(FaultKind::UninitializedStackRead, addr));
                }

                self.write_reg(rd, op.extend(raw));
            }
            Instruction::Store {
                op,
                rs1,
                rs2,
                offset,
            } => {
                let addr = self.read_reg(rs1)?.wrapping_add(offset as u32);
                let value = self.read_reg(rs2)?;

                if !self.cpu.mem.write(addr, op.width(), value) {
                    return Err(Fault::with(FaultKind::BadStore, addr));
                }

                for i in Self::stack_words(addr, op.width()) {
                    self.stack_written_by[i] = rs2.index() as u8;
                }

                self.mem_written = MemWrite {
                    addr,
                    len: op.width(),
                };
            }
            Instruction::OpImm { op, rd, rs1, imm } => {
                let value = op.apply(self.read_reg(rs1)?, imm as u32);
                self.write_reg(rd, value);
            }
            Instruction::Op { op, rd, rs1, rs2 } => {
                let value = op.apply(self.read_reg(rs1)?, self.read_reg(rs2)?);
                self.write_reg(rd, value);
            }
            Instruction::Ecall => {
                let signal = self.read_reg(Register::A7)?;

                match self.system.system_call(&mut self.cpu, signal) {
                    SysCall::Continue => {}
                    SysCall::Exit => {
                        self.exited = true;
                        return Ok(pc);
                    }
                    SysCall::Unsupported => {
                        return Err(Fault::with(FaultKind::UnhandledInstruction, pc))
                    }
                }
            }
            Instruction::Ebreak => return Err(Fault::with(FaultKind::UnhandledInstruction, pc)),
        }

        Ok(next)
    }

    fn cycle(&mut self) -> ::std::result::Result<(), Fault> {
        let pc = self.cpu.pc;
        let word = self
            .program
            .word_at(pc)
            .ok_or_else(|| Fault::with(FaultKind::PcOutOfRange, pc))?;
        let instruction = Instruction::decode(word)
            .ok_or_else(|| Fault::with(FaultKind::UnhandledInstruction, pc))?;

        self.cpu.pc = self.execute(instruction, pc)?;

        Ok(())
    }
}

impl<S: System> Engine for Vm<S> {
    fn build(&mut self, source: &str) -> ::std::result::Result<(), AsmError> {
        let program = Program::from_source(source)?;
        self.load_program(program);

        Ok(())
    }

    fn step(&mut self) {
        if self.exited || self.fault.is_some() {
            return;
        }

        self.mem_written = MemWrite::default();
        self.reg_written = 0;

        if let Err(fault) = self.cycle() {
            self.fault = Some(fault);
        }
    }

    fn exited(&self) -> bool {
        self.exited
    }

    fn fault(&self) -> Option<Fault> {
        self.fault
    }

    fn pc(&self) -> Address {
        self.cpu.pc
    }

    fn regs(&self) -> &[Word; 32] {
        &self.cpu.regs
    }

    fn load(&self, addr: Address, width: u32) -> Option<Word> {
        self.cpu.mem.read(addr, width)
    }

    fn disassemble(&self, addr: Address) -> String {
        match self.cpu.mem.read(addr, 4) {
            Some(word) => match Instruction::decode(word) {
                Some(instruction) => instruction.to_string(),
                None => format!(".word 0x{:08x}", word),
            },
            None => "??".to_owned(),
        }
    }

    fn label_at(&self, addr: Address) -> Option<String> {
        self.program.label_at(addr).map(str::to_owned)
    }

    fn line_table(&self) -> &[u32] {
        &self.program.lines
    }

    fn shadow_stack(&self) -> &[RawFrame] {
        &self.frames
    }

    fn take_output(&mut self) -> String {
        mem::replace(&mut self.cpu.output, String::new())
    }

    fn last_mem_write(&self) -> MemWrite {
        self.mem_written
    }

    fn last_reg_written(&self) -> u8 {
        self.reg_written
    }

    fn stack_provenance(&self, addr: Address) -> Option<Provenance> {
        let tag = *self.stack_written_by.get(Self::stack_word_index(addr)?)?;

        Some(match tag {
            UNWRITTEN => Provenance::Unwritten,
            reg => Provenance::Register(reg),
        })
    }

    fn image_size(&self) -> (u64, u64) {
        (
            (self.program.text.len() * 4) as u64,
            self.program.data.len() as u64,
        )
    }
}
