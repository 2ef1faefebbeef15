//! HT46F47E "TPS" controller: 4-bit accumulator machine with 16-slot pages,
//! four digital inputs, four digital outputs, two switches and two analog
//! inputs.

use nibble_vm::{
    bit, Context, Engine, EngineConfig, EngineSnapshot, Fault, Flow, Instruction,
    InstructionSet, InstructionStore, Machine, OpKind, RegisterFile, Status,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const NIBBLE: i64 = 0xF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TpsReg {
    A,
    B,
    C,
    D,
    Ad1,
    Ad2,
    Pwm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TpsPin {
    Din1,
    Din2,
    Din3,
    Din4,
    Dout1,
    Dout2,
    Dout3,
    Dout4,
    S1,
    S2,
}

/// Input port, bit 0 first.
pub const DIN: [TpsPin; 4] = [TpsPin::Din1, TpsPin::Din2, TpsPin::Din3, TpsPin::Din4];
/// Output port, bit 0 first.
pub const DOUT: [TpsPin; 4] = [TpsPin::Dout1, TpsPin::Dout2, TpsPin::Dout3, TpsPin::Dout4];

/// Destinations of opcode 5 (`x = A`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dest {
    B,
    C,
    D,
    Dout,
    /// A single output line, index 0..=3.
    DoutBit(u8),
    Pwm,
}

/// Sources of opcode 6 (`A = x`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    B,
    C,
    D,
    Din,
    DinBit(u8),
    Ad1,
    Ad2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Inc,
    Dec,
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Not,
}

impl AluOp {
    /// Whether the result is wrapped to 4 bits. `& | ^` and `/` cannot leave
    /// the nibble range for nibble inputs.
    fn wraps(self) -> bool {
        matches!(
            self,
            AluOp::Inc | AluOp::Dec | AluOp::Add | AluOp::Sub | AluOp::Mul | AluOp::Not
        )
    }
}

/// Skip conditions of opcode C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    AGreaterB,
    ALessB,
    AEqualB,
    DinHigh(u8),
    DinLow(u8),
    S1Low,
    S2Low,
    S1High,
    S2High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpsOp {
    Out(u8),
    Wait(u8),
    JumpBack(u8),
    LoadA(u8),
    Store(Dest),
    Load(Source),
    Alu(AluOp),
    SetPage(u8),
    Jump(u8),
    LoopC(u8),
    LoopD(u8),
    Skip(Cond),
    Call(u8),
    Return,
}

/// Decode/execute table for the HT46F47E.
pub struct TpsIsa;

fn unrecognized(ins: &Instruction) -> Fault {
    Fault::UnrecognizedOpcode {
        address: ins.address,
        opcode: ins.opcode,
        operand: ins.operand,
    }
}

impl InstructionSet for TpsIsa {
    type Reg = TpsReg;
    type Pin = TpsPin;
    type Op = TpsOp;

    const REGISTERS: &'static [TpsReg] = &[
        TpsReg::A,
        TpsReg::B,
        TpsReg::C,
        TpsReg::D,
        TpsReg::Ad1,
        TpsReg::Ad2,
        TpsReg::Pwm,
    ];
    const PINS: &'static [TpsPin] = &[
        TpsPin::Din1,
        TpsPin::Din2,
        TpsPin::Din3,
        TpsPin::Din4,
        TpsPin::Dout1,
        TpsPin::Dout2,
        TpsPin::Dout3,
        TpsPin::Dout4,
        TpsPin::S1,
        TpsPin::S2,
    ];

    fn decode(ins: &Instruction) -> Result<TpsOp, Fault> {
        if ins.opcode == 0xE {
            return Ok(TpsOp::Return);
        }
        if matches!(ins.opcode, 0x0 | 0xF) {
            return Err(unrecognized(ins));
        }
        let n = ins.operand.ok_or(Fault::MalformedInstruction {
            address: ins.address,
            reason: "missing operand",
        })?;
        let op = match (ins.opcode, n) {
            (0x1, n) => TpsOp::Out(n),
            (0x2, n) => TpsOp::Wait(n),
            (0x3, n) => TpsOp::JumpBack(n),
            (0x4, n) => TpsOp::LoadA(n),
            (0x5, 1) => TpsOp::Store(Dest::B),
            (0x5, 2) => TpsOp::Store(Dest::C),
            (0x5, 3) => TpsOp::Store(Dest::D),
            (0x5, 4) => TpsOp::Store(Dest::Dout),
            (0x5, 5..=8) => TpsOp::Store(Dest::DoutBit(n - 5)),
            (0x5, 9) => TpsOp::Store(Dest::Pwm),
            (0x6, 1) => TpsOp::Load(Source::B),
            (0x6, 2) => TpsOp::Load(Source::C),
            (0x6, 3) => TpsOp::Load(Source::D),
            (0x6, 4) => TpsOp::Load(Source::Din),
            (0x6, 5..=8) => TpsOp::Load(Source::DinBit(n - 5)),
            (0x6, 9) => TpsOp::Load(Source::Ad1),
            (0x6, 10) => TpsOp::Load(Source::Ad2),
            (0x7, 1) => TpsOp::Alu(AluOp::Inc),
            (0x7, 2) => TpsOp::Alu(AluOp::Dec),
            (0x7, 3) => TpsOp::Alu(AluOp::Add),
            (0x7, 4) => TpsOp::Alu(AluOp::Sub),
            (0x7, 5) => TpsOp::Alu(AluOp::Mul),
            (0x7, 6) => TpsOp::Alu(AluOp::Div),
            (0x7, 7) => TpsOp::Alu(AluOp::And),
            (0x7, 8) => TpsOp::Alu(AluOp::Or),
            (0x7, 9) => TpsOp::Alu(AluOp::Xor),
            (0x7, 10) => TpsOp::Alu(AluOp::Not),
            (0x8, n) => TpsOp::SetPage(n),
            (0x9, n) => TpsOp::Jump(n),
            (0xA, n) => TpsOp::LoopC(n),
            (0xB, n) => TpsOp::LoopD(n),
            (0xC, 1) => TpsOp::Skip(Cond::AGreaterB),
            (0xC, 2) => TpsOp::Skip(Cond::ALessB),
            (0xC, 3) => TpsOp::Skip(Cond::AEqualB),
            (0xC, 4..=7) => TpsOp::Skip(Cond::DinHigh(n - 4)),
            (0xC, 8..=11) => TpsOp::Skip(Cond::DinLow(n - 8)),
            (0xC, 12) => TpsOp::Skip(Cond::S1Low),
            (0xC, 13) => TpsOp::Skip(Cond::S2Low),
            (0xC, 14) => TpsOp::Skip(Cond::S1High),
            (0xC, 15) => TpsOp::Skip(Cond::S2High),
            (0xD, n) => TpsOp::Call(n),
            _ => return Err(unrecognized(ins)),
        };
        Ok(op)
    }

    fn kind(op: &TpsOp) -> OpKind {
        match op {
            TpsOp::Out(_) | TpsOp::Wait(_) => OpKind::Output,
            TpsOp::JumpBack(_) | TpsOp::Jump(_) => OpKind::Jump,
            TpsOp::LoadA(_) => OpKind::ImmediateLoad,
            TpsOp::Store(_) | TpsOp::Load(_) => OpKind::RegisterTransfer,
            TpsOp::Alu(_) => OpKind::ArithmeticLogic,
            TpsOp::SetPage(_) => OpKind::SetPage,
            TpsOp::LoopC(_) | TpsOp::LoopD(_) => OpKind::LoopBranch,
            TpsOp::Skip(_) => OpKind::ConditionalSkip,
            TpsOp::Call(_) => OpKind::Call,
            TpsOp::Return => OpKind::Return,
        }
    }

    fn execute(op: &TpsOp, ctx: &mut Context<'_, TpsReg, TpsPin>) -> Result<Flow, Fault> {
        let regs = &mut *ctx.registers;
        let flow = match *op {
            TpsOp::Out(n) => {
                regs.drive_pins(&DOUT, n as i64);
                Flow::Next
            }
            // timing belongs to the driver
            TpsOp::Wait(_) => Flow::Next,
            TpsOp::JumpBack(n) => Flow::Goto(ctx.control.back_target(n as u32)?),
            TpsOp::LoadA(n) => {
                regs.set(TpsReg::A, n as i64);
                Flow::Next
            }
            TpsOp::Store(dest) => {
                store(regs, dest);
                Flow::Next
            }
            TpsOp::Load(source) => {
                let value = load(regs, source);
                regs.set(TpsReg::A, value);
                Flow::Next
            }
            TpsOp::Alu(alu) => {
                let value = alu_result(regs, alu, ctx.address)?;
                regs.set(TpsReg::A, value);
                Flow::Next
            }
            TpsOp::SetPage(n) => {
                ctx.control.set_page(n as u32);
                Flow::Next
            }
            TpsOp::Jump(n) => Flow::Goto(ctx.control.resolve_target(n as u32)),
            TpsOp::LoopC(n) => count_down(regs, TpsReg::C, ctx.control.resolve_target(n as u32)),
            TpsOp::LoopD(n) => count_down(regs, TpsReg::D, ctx.control.resolve_target(n as u32)),
            TpsOp::Skip(cond) => {
                if holds(regs, cond) {
                    Flow::Skip
                } else {
                    Flow::Next
                }
            }
            TpsOp::Call(n) => Flow::Call(ctx.control.resolve_target(n as u32)),
            TpsOp::Return => Flow::Return,
        };
        Ok(flow)
    }
}

fn store(regs: &mut RegisterFile<TpsReg, TpsPin>, dest: Dest) {
    let a = regs.get(TpsReg::A);
    match dest {
        Dest::B => regs.set(TpsReg::B, a),
        Dest::C => regs.set(TpsReg::C, a),
        Dest::D => regs.set(TpsReg::D, a),
        Dest::Dout => regs.drive_pins(&DOUT, a),
        Dest::DoutBit(k) => regs.set_pin(DOUT[k as usize], bit(a, 0)),
        Dest::Pwm => regs.set(TpsReg::Pwm, a),
    }
}

fn load(regs: &RegisterFile<TpsReg, TpsPin>, source: Source) -> i64 {
    match source {
        Source::B => regs.get(TpsReg::B),
        Source::C => regs.get(TpsReg::C),
        Source::D => regs.get(TpsReg::D),
        Source::Din => regs.read_pins(&DIN),
        Source::DinBit(k) => regs.pin(DIN[k as usize]) as i64,
        Source::Ad1 => regs.get(TpsReg::Ad1),
        Source::Ad2 => regs.get(TpsReg::Ad2),
    }
}

fn alu_result(
    regs: &RegisterFile<TpsReg, TpsPin>,
    alu: AluOp,
    address: u32,
) -> Result<i64, Fault> {
    let a = regs.get(TpsReg::A);
    let b = regs.get(TpsReg::B);
    let raw = match alu {
        AluOp::Inc => a + 1,
        AluOp::Dec => a - 1,
        AluOp::Add => a + b,
        AluOp::Sub => a - b,
        AluOp::Mul => a * b,
        AluOp::Div => a
            .checked_div(b)
            .ok_or(Fault::ArithmeticFault { address, op: "division" })?,
        AluOp::And => a & b,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Not => !a,
    };
    Ok(if alu.wraps() { raw & NIBBLE } else { raw })
}

/// Decrement a loop counter; branch while it is non-zero.
fn count_down(regs: &mut RegisterFile<TpsReg, TpsPin>, counter: TpsReg, target: u32) -> Flow {
    let value = (regs.get(counter) - 1) & NIBBLE;
    regs.set(counter, value);
    if value == 0 {
        Flow::Next
    } else {
        Flow::Goto(target)
    }
}

fn holds(regs: &RegisterFile<TpsReg, TpsPin>, cond: Cond) -> bool {
    let a = regs.get(TpsReg::A);
    let b = regs.get(TpsReg::B);
    match cond {
        Cond::AGreaterB => a > b,
        Cond::ALessB => a < b,
        Cond::AEqualB => a == b,
        Cond::DinHigh(k) => regs.pin(DIN[k as usize]),
        Cond::DinLow(k) => !regs.pin(DIN[k as usize]),
        Cond::S1Low => !regs.pin(TpsPin::S1),
        Cond::S2Low => !regs.pin(TpsPin::S2),
        Cond::S1High => regs.pin(TpsPin::S1),
        Cond::S2High => regs.pin(TpsPin::S2),
    }
}

/// A TPS board: the shared engine plus input helpers and a state dump.
pub struct Tps {
    engine: Engine<TpsIsa>,
}

impl Tps {
    pub fn new(store: InstructionStore, config: EngineConfig) -> Self {
        Self {
            engine: Engine::new(store, config),
        }
    }

    pub fn from_source(text: &str, config: EngineConfig) -> crate::source::Result<Self> {
        Ok(Self::new(crate::source::load_program(text)?, config))
    }

    pub fn engine(&self) -> &Engine<TpsIsa> {
        &self.engine
    }

    pub fn register(&self, reg: TpsReg) -> i64 {
        self.engine.registers().get(reg)
    }

    pub fn pin(&self, pin: TpsPin) -> bool {
        self.engine.registers().pin(pin)
    }

    pub fn pc(&self) -> u32 {
        self.engine.control().pc()
    }

    pub fn link(&self) -> u32 {
        self.engine.control().link()
    }

    pub fn set_input(&mut self, pin: TpsPin, level: bool) {
        self.engine.registers_mut().set_pin(pin, level);
    }

    /// Drive all four DIN lines from a nibble.
    pub fn set_din(&mut self, value: u8) {
        self.engine.registers_mut().drive_pins(&DIN, value as i64);
    }

    pub fn set_analog(&mut self, ad1: u8, ad2: u8) {
        let regs = self.engine.registers_mut();
        regs.set(TpsReg::Ad1, ad1 as i64 & NIBBLE);
        regs.set(TpsReg::Ad2, ad2 as i64 & NIBBLE);
    }

    pub fn dout(&self) -> i64 {
        self.engine.registers().read_pins(&DOUT)
    }
}

impl Machine for Tps {
    type Snapshot = EngineSnapshot<TpsReg, TpsPin>;

    fn step(&mut self) -> Status {
        self.engine.step()
    }

    fn status(&self) -> &Status {
        self.engine.status()
    }

    fn reset(&mut self) {
        self.engine.reset();
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.engine.snapshot()
    }
}

impl fmt::Display for Tps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let control = self.engine.control();
        writeln!(f, "PC:     {}", control.pc())?;
        writeln!(f, "Page:   {}", control.page())?;
        writeln!(f, "Link:   {}", control.link())?;
        for (reg, value) in self.engine.registers().registers() {
            writeln!(f, "{:<7} {value}", format!("{reg:?}:"))?;
        }
        for (pin, level) in self.engine.registers().pins() {
            writeln!(f, "{:<7} {}", format!("{pin:?}:"), u8::from(*level))?;
        }
        writeln!(f, "Steps:  {}", self.engine.steps())?;
        write!(f, "Status: {}", self.engine.status())
    }
}
