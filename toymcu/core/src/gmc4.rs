//! Gakken GMC-4: 4-bit trainer with 96 nibbles of program space, a 16-nibble
//! data window at `0x50`, one 7-segment digit, seven LEDs and a keypad.
//!
//! Instructions are variable length: immediates and the two jump address
//! nibbles follow the opcode in memory. Nearly every instruction sets FLAG;
//! `JUMP` is taken only while FLAG is 1.

use crate::config::ConfigError;
use crate::BuildError;
use nibble_vm::{
    bit, ControlUnit, Fault, HaltReason, Machine, OpKind, RegisterFile, Status,
    DEFAULT_PAGE_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

pub const MEMORY_SIZE: usize = 128;
/// Instructions are fetched from `0x00..PROGRAM_SIZE` only.
pub const PROGRAM_SIZE: u32 = 0x60;
pub const DATA_BASE: usize = 0x50;
/// Power-on value of every memory cell.
pub const ERASED: u8 = 0xF;
/// Peripheral events kept between drains; older ones are dropped.
pub const EVENT_CAPACITY: usize = 256;
const JUMP_MASK: u32 = 0x7F;
const NIBBLE: i64 = 0xF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gmc4Config {
    pub start_address: u32,
    /// Address of the first program nibble.
    pub load_address: u32,
}

impl Gmc4Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("start_address", self.start_address),
            ("load_address", self.load_address),
        ] {
            if value >= PROGRAM_SIZE {
                return Err(ConfigError::Invalid(format!(
                    "gmc4.{name} must be below {PROGRAM_SIZE:#04X}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gmc4Reg {
    A,
    B,
    Y,
    Z,
    AuxA,
    AuxB,
    AuxY,
    AuxZ,
    Flag,
    Display,
}

const MAIN: [Gmc4Reg; 4] = [Gmc4Reg::A, Gmc4Reg::B, Gmc4Reg::Y, Gmc4Reg::Z];
const AUX: [Gmc4Reg; 4] = [Gmc4Reg::AuxA, Gmc4Reg::AuxB, Gmc4Reg::AuxY, Gmc4Reg::AuxZ];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Led {
    Led0,
    Led1,
    Led2,
    Led3,
    Led4,
    Led5,
    Led6,
}

pub const LEDS: [Led; 7] = [
    Led::Led0,
    Led::Led1,
    Led::Led2,
    Led::Led3,
    Led::Led4,
    Led::Led5,
    Led::Led6,
];

const REGISTERS: [Gmc4Reg; 10] = [
    Gmc4Reg::A,
    Gmc4Reg::B,
    Gmc4Reg::Y,
    Gmc4Reg::Z,
    Gmc4Reg::AuxA,
    Gmc4Reg::AuxB,
    Gmc4Reg::AuxY,
    Gmc4Reg::AuxZ,
    Gmc4Reg::Flag,
    Gmc4Reg::Display,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sound {
    End,
    Error,
    Short,
    Long,
    Note(u8),
}

/// Side effects the host has to render or time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "device", rename_all = "snake_case")]
pub enum Peripheral {
    Sound { sound: Sound },
    /// Delay of `tenths` tenths of a second.
    Timer { tenths: u8 },
}

/// Subroutines reached through opcode `E`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    ClearDisplay,
    SetLed,
    ResetLed,
    Complement,
    SwapBanks,
    ShiftRight,
    EndSound,
    ErrorSound,
    ShortBeep,
    LongBeep,
    Note,
    Timer,
    LedPattern,
    DecimalSub,
    DecimalAdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gmc4Op {
    KeyToA,
    AToDisplay,
    SwapAbYz,
    SwapAy,
    AToMemory,
    MemoryToA,
    MemoryPlusA,
    MemoryMinusA,
    LoadA(u8),
    AddA(u8),
    LoadY(u8),
    AddY(u8),
    CompareA(u8),
    CompareY(u8),
    Call(Service),
    Jump { hi: u8, lo: u8 },
}

impl Gmc4Op {
    pub fn kind(&self) -> OpKind {
        match self {
            Gmc4Op::KeyToA | Gmc4Op::MemoryToA => OpKind::RegisterTransfer,
            Gmc4Op::AToDisplay => OpKind::Output,
            Gmc4Op::SwapAbYz | Gmc4Op::SwapAy | Gmc4Op::AToMemory => OpKind::RegisterTransfer,
            Gmc4Op::MemoryPlusA | Gmc4Op::MemoryMinusA | Gmc4Op::AddA(_) | Gmc4Op::AddY(_) => {
                OpKind::ArithmeticLogic
            }
            Gmc4Op::LoadA(_) | Gmc4Op::LoadY(_) => OpKind::ImmediateLoad,
            Gmc4Op::CompareA(_) | Gmc4Op::CompareY(_) => OpKind::ConditionalSkip,
            Gmc4Op::Call(_) => OpKind::Call,
            Gmc4Op::Jump { .. } => OpKind::Jump,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gmc4Snapshot {
    pub pc: u32,
    pub steps: u64,
    pub registers: BTreeMap<Gmc4Reg, i64>,
    pub leds: BTreeMap<Led, bool>,
    pub data: Vec<u8>,
    pub status: Status,
}

pub struct Gmc4 {
    memory: [u8; MEMORY_SIZE],
    program: Vec<u8>,
    load_address: usize,
    registers: RegisterFile<Gmc4Reg, Led>,
    control: ControlUnit,
    key: Option<u8>,
    events: VecDeque<Peripheral>,
    status: Status,
    steps: u64,
}

impl Gmc4 {
    /// Power on with `program` loaded at `config.load_address`. Nibbles
    /// beyond the program area are dropped.
    pub fn new(program: &[u8], config: Gmc4Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let load_address = config.load_address as usize;
        let mut machine = Self {
            memory: [ERASED; MEMORY_SIZE],
            program: program.iter().map(|n| n & 0xF).collect(),
            load_address,
            registers: RegisterFile::new(&REGISTERS, &LEDS),
            control: ControlUnit::new(config.start_address, DEFAULT_PAGE_SIZE),
            key: None,
            events: VecDeque::new(),
            status: Status::Running,
            steps: 0,
        };
        if load_address + program.len() > PROGRAM_SIZE as usize {
            tracing::warn!(
                nibbles = program.len(),
                "program longer than the program area, tail dropped"
            );
        }
        machine.power_on();
        tracing::info!(nibbles = machine.program.len(), "gmc4 program loaded");
        Ok(machine)
    }

    pub fn from_source(text: &str, config: Gmc4Config) -> Result<Self, BuildError> {
        let program = crate::source::parse_nibbles(text)?;
        Ok(Self::new(&program, config)?)
    }

    fn power_on(&mut self) {
        self.memory = [ERASED; MEMORY_SIZE];
        let area = &mut self.memory[self.load_address..PROGRAM_SIZE as usize];
        for (cell, &nibble) in area.iter_mut().zip(&self.program) {
            *cell = nibble;
        }
        self.registers.reset();
        self.registers.set(Gmc4Reg::Flag, 1);
        self.control.reset();
        self.key = None;
        self.events.clear();
        self.status = Status::Running;
        self.steps = 0;
    }

    /// Restart at the start address with FLAG set; memory and registers are
    /// kept.
    pub fn soft_reset(&mut self) {
        self.control.reset();
        self.registers.set(Gmc4Reg::Flag, 1);
        self.status = Status::Running;
    }

    /// Latch a key for the next `KA`.
    pub fn press_key(&mut self, key: u8) {
        self.key = Some(key & 0xF);
    }

    pub fn register(&self, reg: Gmc4Reg) -> i64 {
        self.registers.get(reg)
    }

    pub fn set_register(&mut self, reg: Gmc4Reg, value: u8) {
        let value = match reg {
            Gmc4Reg::Flag => value & 1,
            _ => value & 0xF,
        };
        self.registers.set(reg, value as i64);
    }

    pub fn flag(&self) -> bool {
        self.registers.get(Gmc4Reg::Flag) == 1
    }

    pub fn led(&self, led: Led) -> bool {
        self.registers.pin(led)
    }

    pub fn pc(&self) -> u32 {
        self.control.pc()
    }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] {
        &self.memory
    }

    /// Data cell `0x50 + offset`.
    pub fn data(&self, offset: u8) -> u8 {
        self.memory[DATA_BASE + (offset & 0xF) as usize]
    }

    pub fn set_data(&mut self, offset: u8, value: u8) {
        self.memory[DATA_BASE + (offset & 0xF) as usize] = value & 0xF;
    }

    /// Events since the last drain, oldest first.
    pub fn events(&self) -> &VecDeque<Peripheral> {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<Peripheral> {
        self.events.drain(..).collect()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn fetch(&mut self) -> Result<u8, Fault> {
        let pc = self.control.pc();
        if pc >= PROGRAM_SIZE {
            return Err(Fault::OutOfRange { address: pc });
        }
        self.control.advance(1);
        Ok(self.memory[pc as usize])
    }

    fn decode(&mut self, address: u32) -> Result<Gmc4Op, Fault> {
        let op = match self.fetch()? {
            0x0 => Gmc4Op::KeyToA,
            0x1 => Gmc4Op::AToDisplay,
            0x2 => Gmc4Op::SwapAbYz,
            0x3 => Gmc4Op::SwapAy,
            0x4 => Gmc4Op::AToMemory,
            0x5 => Gmc4Op::MemoryToA,
            0x6 => Gmc4Op::MemoryPlusA,
            0x7 => Gmc4Op::MemoryMinusA,
            0x8 => Gmc4Op::LoadA(self.fetch()?),
            0x9 => Gmc4Op::AddA(self.fetch()?),
            0xA => Gmc4Op::LoadY(self.fetch()?),
            0xB => Gmc4Op::AddY(self.fetch()?),
            0xC => Gmc4Op::CompareA(self.fetch()?),
            0xD => Gmc4Op::CompareY(self.fetch()?),
            0xE => {
                let code = self.fetch()?;
                Gmc4Op::Call(service(code).ok_or(Fault::UnrecognizedOpcode {
                    address,
                    opcode: 0xE,
                    operand: Some(code),
                })?)
            }
            _ => {
                let hi = self.fetch()?;
                let lo = self.fetch()?;
                Gmc4Op::Jump { hi, lo }
            }
        };
        Ok(op)
    }

    fn data_cell(&self) -> usize {
        DATA_BASE + (self.registers.get(Gmc4Reg::Y) & NIBBLE) as usize
    }

    fn set_flag(&mut self, on: bool) {
        self.registers.set(Gmc4Reg::Flag, on as i64);
    }

    /// `reg + n`, wrapped to 4 bits; FLAG is the carry.
    fn add_with_carry(&mut self, reg: Gmc4Reg, n: i64) {
        let sum = self.registers.get(reg) + n;
        self.set_flag(sum > NIBBLE);
        self.registers.set(reg, sum & NIBBLE);
    }

    fn swap(&mut self, a: Gmc4Reg, b: Gmc4Reg) {
        let (va, vb) = (self.registers.get(a), self.registers.get(b));
        self.registers.set(a, vb);
        self.registers.set(b, va);
    }

    fn execute(&mut self, op: Gmc4Op) {
        let a = self.registers.get(Gmc4Reg::A);
        let mut flag = true;
        match op {
            Gmc4Op::KeyToA => {
                if let Some(key) = self.key.take() {
                    self.registers.set(Gmc4Reg::A, key as i64);
                    flag = false;
                }
            }
            Gmc4Op::AToDisplay => self.registers.set(Gmc4Reg::Display, a),
            Gmc4Op::SwapAbYz => {
                self.swap(Gmc4Reg::A, Gmc4Reg::B);
                self.swap(Gmc4Reg::Y, Gmc4Reg::Z);
            }
            Gmc4Op::SwapAy => self.swap(Gmc4Reg::A, Gmc4Reg::Y),
            Gmc4Op::AToMemory => {
                let cell = self.data_cell();
                self.memory[cell] = (a & NIBBLE) as u8;
            }
            Gmc4Op::MemoryToA => {
                let value = self.memory[self.data_cell()];
                self.registers.set(Gmc4Reg::A, value as i64);
            }
            Gmc4Op::MemoryPlusA => {
                let sum = self.memory[self.data_cell()] as i64 + a;
                flag = sum > NIBBLE;
                self.registers.set(Gmc4Reg::A, sum & NIBBLE);
            }
            Gmc4Op::MemoryMinusA => {
                let diff = self.memory[self.data_cell()] as i64 - a;
                flag = diff < 0;
                self.registers.set(Gmc4Reg::A, diff & NIBBLE);
            }
            Gmc4Op::LoadA(n) => self.registers.set(Gmc4Reg::A, n as i64),
            Gmc4Op::AddA(n) => {
                self.add_with_carry(Gmc4Reg::A, n as i64);
                return;
            }
            Gmc4Op::LoadY(n) => self.registers.set(Gmc4Reg::Y, n as i64),
            Gmc4Op::AddY(n) => {
                self.add_with_carry(Gmc4Reg::Y, n as i64);
                return;
            }
            Gmc4Op::CompareA(n) => flag = a != n as i64,
            Gmc4Op::CompareY(n) => flag = self.registers.get(Gmc4Reg::Y) != n as i64,
            Gmc4Op::Call(svc) => flag = self.call(svc),
            Gmc4Op::Jump { hi, lo } => {
                if self.flag() {
                    self.control.set_page(hi as u32);
                    let target = self.control.resolve_target(lo as u32) & JUMP_MASK;
                    self.control.jump(target);
                }
            }
        }
        self.set_flag(flag);
    }

    /// Run a service routine and return the new FLAG.
    fn call(&mut self, svc: Service) -> bool {
        let a = self.registers.get(Gmc4Reg::A);
        let y = self.registers.get(Gmc4Reg::Y);
        match svc {
            Service::ClearDisplay => self.registers.set(Gmc4Reg::Display, 0),
            Service::SetLed | Service::ResetLed => {
                if let Some(&led) = LEDS.get(y as usize) {
                    self.registers.set_pin(led, svc == Service::SetLed);
                }
            }
            Service::Complement => self.registers.set(Gmc4Reg::A, !a & NIBBLE),
            Service::SwapBanks => {
                for (main, aux) in MAIN.into_iter().zip(AUX) {
                    self.swap(main, aux);
                }
            }
            Service::ShiftRight => {
                self.registers.set(Gmc4Reg::A, a >> 1);
                return !bit(a, 0);
            }
            Service::EndSound => self.emit(Peripheral::Sound { sound: Sound::End }),
            Service::ErrorSound => self.emit(Peripheral::Sound { sound: Sound::Error }),
            Service::ShortBeep => self.emit(Peripheral::Sound { sound: Sound::Short }),
            Service::LongBeep => self.emit(Peripheral::Sound { sound: Sound::Long }),
            Service::Note => self.emit(Peripheral::Sound {
                sound: Sound::Note(a as u8),
            }),
            Service::Timer => self.emit(Peripheral::Timer {
                tenths: a as u8 + 1,
            }),
            Service::LedPattern => {
                let upper = (self.memory[0x5F] & 0x7) as i64;
                let lower = (self.memory[0x5E] & 0xF) as i64;
                let pattern = (upper << 4) | lower;
                self.registers.drive_pins(&LEDS, pattern);
            }
            Service::DecimalSub | Service::DecimalAdd => {
                let cell = self.data_cell();
                let value = self.memory[cell] as i64;
                let result = if svc == Service::DecimalAdd {
                    value + a
                } else {
                    value - a
                };
                self.memory[cell] = (result & NIBBLE) as u8;
                self.registers.set(Gmc4Reg::Y, (y - 1) & NIBBLE);
            }
        }
        true
    }

    fn emit(&mut self, event: Peripheral) {
        tracing::debug!(?event, "peripheral");
        if self.events.len() == EVENT_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

fn service(code: u8) -> Option<Service> {
    let svc = match code {
        0x0 => Service::ClearDisplay,
        0x1 => Service::SetLed,
        0x2 => Service::ResetLed,
        0x4 => Service::Complement,
        0x5 => Service::SwapBanks,
        0x6 => Service::ShiftRight,
        0x7 => Service::EndSound,
        0x8 => Service::ErrorSound,
        0x9 => Service::ShortBeep,
        0xA => Service::LongBeep,
        0xB => Service::Note,
        0xC => Service::Timer,
        0xD => Service::LedPattern,
        0xE => Service::DecimalSub,
        0xF => Service::DecimalAdd,
        _ => return None,
    };
    Some(svc)
}

impl Machine for Gmc4 {
    type Snapshot = Gmc4Snapshot;

    fn step(&mut self) -> Status {
        if self.status.is_halted() {
            return self.status.clone();
        }
        let address = self.control.pc();
        let decoded = self.decode(address);
        self.steps += 1;
        match decoded {
            Ok(op) => {
                tracing::trace!(pc = address, kind = ?op.kind(), ?op, "execute");
                self.execute(op);
            }
            Err(fault) => {
                // leave pc on the instruction that failed
                self.control.jump(address);
                tracing::debug!(pc = address, ?fault, "machine halted");
                self.status = Status::Halted(HaltReason::Fault(fault));
            }
        }
        self.status.clone()
    }

    fn status(&self) -> &Status {
        &self.status
    }

    fn reset(&mut self) {
        self.power_on();
    }

    fn snapshot(&self) -> Gmc4Snapshot {
        Gmc4Snapshot {
            pc: self.control.pc(),
            steps: self.steps,
            registers: self.registers.registers().clone(),
            leds: self.registers.pins().clone(),
            data: self.memory[DATA_BASE..PROGRAM_SIZE as usize].to_vec(),
            status: self.status.clone(),
        }
    }
}

impl fmt::Display for Gmc4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = |reg| self.registers.get(reg);
        writeln!(
            f,
            "Main:    A={:X} B={:X} Y={:X} Z={:X}",
            r(Gmc4Reg::A),
            r(Gmc4Reg::B),
            r(Gmc4Reg::Y),
            r(Gmc4Reg::Z)
        )?;
        writeln!(
            f,
            "Aux:     A'={:X} B'={:X} Y'={:X} Z'={:X}",
            r(Gmc4Reg::AuxA),
            r(Gmc4Reg::AuxB),
            r(Gmc4Reg::AuxY),
            r(Gmc4Reg::AuxZ)
        )?;
        writeln!(f, "Flag:    {}  PC: {:#04X}", r(Gmc4Reg::Flag), self.pc())?;
        writeln!(f, "Display: {:X}", r(Gmc4Reg::Display))?;
        let leds: String = LEDS
            .iter()
            .map(|&led| if self.led(led) { '*' } else { '.' })
            .collect();
        writeln!(f, "LEDs:    {leds}")?;
        for base in [DATA_BASE, DATA_BASE + 8] {
            let cells: Vec<String> = self.memory[base..base + 8]
                .iter()
                .map(|n| format!("{n:X}"))
                .collect();
            writeln!(f, "[{base:02X}]:    {}", cells.join(" "))?;
        }
        write!(f, "Status:  {}", self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(program: &[u8]) -> Gmc4 {
        Gmc4::new(program, Gmc4Config::default()).unwrap()
    }

    fn steps(m: &mut Gmc4, n: usize) {
        for _ in 0..n {
            m.step();
        }
    }

    #[test]
    fn power_on_state() {
        let m = machine(&[0x8, 0x5]);
        assert_eq!(m.memory()[0], 0x8);
        assert_eq!(m.memory()[2], ERASED);
        assert_eq!(m.memory()[0x7F], ERASED);
        assert!(m.flag());
        assert_eq!(m.register(Gmc4Reg::A), 0);
    }

    #[test]
    fn immediate_load_and_display() {
        let mut m = machine(&[0x8, 0x5, 0x1]);
        m.step();
        assert_eq!(m.register(Gmc4Reg::A), 5);
        assert_eq!(m.pc(), 2);
        m.step();
        assert_eq!(m.register(Gmc4Reg::Display), 5);
        assert!(m.flag());
    }

    #[test]
    fn add_immediate_sets_carry() {
        // TIA 9, AIA 8 -> A = 1, carry; AIA 1 -> A = 2, no carry
        let mut m = machine(&[0x8, 0x9, 0x9, 0x8, 0x9, 0x1]);
        steps(&mut m, 2);
        assert_eq!(m.register(Gmc4Reg::A), 1);
        assert!(m.flag());
        m.step();
        assert_eq!(m.register(Gmc4Reg::A), 2);
        assert!(!m.flag());
    }

    #[test]
    fn jump_only_when_flag_set() {
        // TIA 3, CIA 3 (equal -> FLAG 0), JUMP 10 not taken, CIA 4 (FLAG 1), JUMP 10
        let mut program = vec![0x8, 0x3, 0xC, 0x3, 0xF, 0x1, 0x0, 0xC, 0x4, 0xF, 0x1, 0x0];
        program.resize(0x10, 0x1);
        let mut m = machine(&program);
        steps(&mut m, 2);
        assert!(!m.flag());
        m.step();
        assert_eq!(m.pc(), 7);
        assert!(m.flag());
        steps(&mut m, 2);
        assert_eq!(m.pc(), 0x10);
    }

    #[test]
    fn memory_ops_use_data_window() {
        // TIY 2, TIA 7, AM, TIA 9, M+ -> 16 -> A = 0 carry, M- 7 - 0
        let mut m = machine(&[0xA, 0x2, 0x8, 0x7, 0x4, 0x8, 0x9, 0x6, 0x7]);
        steps(&mut m, 3);
        assert_eq!(m.data(2), 7);
        steps(&mut m, 2);
        assert_eq!(m.register(Gmc4Reg::A), 0);
        assert!(m.flag());
        m.step();
        assert_eq!(m.register(Gmc4Reg::A), 7);
        assert!(!m.flag());
    }

    #[test]
    fn memory_minus_borrows() {
        let mut m = machine(&[0x8, 0x3, 0x7]);
        m.set_data(0, 1);
        steps(&mut m, 2);
        assert_eq!(m.register(Gmc4Reg::A), 0xE);
        assert!(m.flag());
    }

    #[test]
    fn key_is_consumed_once() {
        let mut m = machine(&[0x0, 0x0]);
        m.press_key(0xB);
        m.step();
        assert_eq!(m.register(Gmc4Reg::A), 0xB);
        assert!(!m.flag());
        m.step();
        assert!(m.flag());
    }

    #[test]
    fn leds_and_pattern() {
        // TIY 6, SETR, TIY 7, SETR (no LED 7)
        let mut m = machine(&[0xA, 0x6, 0xE, 0x1, 0xA, 0x7, 0xE, 0x1]);
        steps(&mut m, 4);
        assert!(m.led(Led::Led6));
        assert_eq!(LEDS.iter().filter(|&&l| m.led(l)).count(), 1);

        let mut m = machine(&[0xE, 0xD]);
        m.set_data(0xE, 0b0101);
        m.set_data(0xF, 0b0010);
        m.step();
        let lit: Vec<bool> = LEDS.iter().map(|&l| m.led(l)).collect();
        assert_eq!(lit, vec![true, false, true, false, false, true, false]);
    }

    #[test]
    fn shift_and_complement() {
        let mut m = machine(&[0x8, 0x5, 0xE, 0x6, 0xE, 0x4]);
        steps(&mut m, 2);
        assert_eq!(m.register(Gmc4Reg::A), 2);
        assert!(!m.flag());
        m.step();
        assert_eq!(m.register(Gmc4Reg::A), 0xD);
    }

    #[test]
    fn bank_swap() {
        let mut m = machine(&[0x8, 0x4, 0xE, 0x5]);
        steps(&mut m, 2);
        assert_eq!(m.register(Gmc4Reg::A), 0);
        assert_eq!(m.register(Gmc4Reg::AuxA), 4);
    }

    #[test]
    fn decimal_add_decrements_y() {
        let mut m = machine(&[0xA, 0x0, 0x8, 0x9, 0xE, 0xF]);
        m.set_data(0, 9);
        steps(&mut m, 3);
        assert_eq!(m.data(0), (9 + 9) & 0xF);
        assert_eq!(m.register(Gmc4Reg::Y), 0xF);
    }

    #[test]
    fn sound_and_timer_events() {
        let mut m = machine(&[0x8, 0x2, 0xE, 0xC, 0xE, 0x9, 0xE, 0xB]);
        steps(&mut m, 4);
        assert_eq!(
            m.drain_events(),
            vec![
                Peripheral::Timer { tenths: 3 },
                Peripheral::Sound {
                    sound: Sound::Short
                },
                Peripheral::Sound {
                    sound: Sound::Note(2)
                },
            ]
        );
        assert!(m.events().is_empty());
    }

    #[test]
    fn event_buffer_keeps_the_newest() {
        // TIA 0; loop: AIA 1, CAL TIMR, JUMP 02
        let mut m = machine(&[0x8, 0x0, 0x9, 0x1, 0xE, 0xC, 0xF, 0x0, 0x2]);
        let rounds = EVENT_CAPACITY + 10;
        steps(&mut m, 1 + 3 * rounds);
        assert_eq!(m.events().len(), EVENT_CAPACITY);
        // round k emits tenths = (k mod 16) + 1
        let newest = m.events().back().copied();
        let tenths = (rounds % 16 + 1) as u8;
        assert_eq!(newest, Some(Peripheral::Timer { tenths }));
        assert_eq!(m.drain_events().len(), EVENT_CAPACITY);
        assert!(m.events().is_empty());
    }

    #[test]
    fn loads_at_configured_address() {
        let config = Gmc4Config {
            start_address: 0x10,
            load_address: 0x10,
        };
        let mut m = Gmc4::new(&[0x8, 0x6, 0x1], config).unwrap();
        assert_eq!(m.memory()[0], ERASED);
        assert_eq!(m.memory()[0x10], 0x8);
        steps(&mut m, 2);
        assert_eq!(m.register(Gmc4Reg::Display), 6);

        // the tail past the program area is dropped
        let config = Gmc4Config {
            start_address: 0,
            load_address: 0x5E,
        };
        let m = Gmc4::new(&[0x1, 0x2, 0x3], config).unwrap();
        assert_eq!(m.memory()[0x5E..0x61], [0x1, 0x2, ERASED]);

        let config = Gmc4Config {
            start_address: 0,
            load_address: PROGRAM_SIZE,
        };
        assert!(Gmc4::new(&[], config).is_err());
    }

    #[test]
    fn compare_y_and_add_y_carry() {
        // TIY 4, CIY 4 (equal -> FLAG 0), CIY 5 (FLAG 1), AIY C (16 -> 0, carry), AIY 3
        let mut m = machine(&[0xA, 0x4, 0xD, 0x4, 0xD, 0x5, 0xB, 0xC, 0xB, 0x3]);
        steps(&mut m, 2);
        assert!(!m.flag());
        m.step();
        assert!(m.flag());
        m.step();
        assert_eq!(m.register(Gmc4Reg::Y), 0);
        assert!(m.flag());
        m.step();
        assert_eq!(m.register(Gmc4Reg::Y), 3);
        assert!(!m.flag());
    }

    #[test]
    fn swap_exchanges_both_pairs() {
        // TIA 1, TIY 2, XABYZ
        let mut m = machine(&[0x8, 0x1, 0xA, 0x2, 0x2]);
        m.set_register(Gmc4Reg::B, 7);
        m.set_register(Gmc4Reg::Z, 9);
        steps(&mut m, 3);
        assert_eq!(m.register(Gmc4Reg::A), 7);
        assert_eq!(m.register(Gmc4Reg::B), 1);
        assert_eq!(m.register(Gmc4Reg::Y), 9);
        assert_eq!(m.register(Gmc4Reg::Z), 2);
    }

    #[test]
    fn decimal_sub_decrements_y() {
        // TIY 3, TIA 5, DEM- on a cell holding 2
        let mut m = machine(&[0xA, 0x3, 0x8, 0x5, 0xE, 0xE]);
        m.set_data(3, 2);
        steps(&mut m, 3);
        // 2 - 5 wraps to 0xD
        assert_eq!(m.data(3), 0xD);
        assert_eq!(m.register(Gmc4Reg::Y), 2);
        assert!(m.flag());
    }

    #[test]
    fn unused_service_code_faults() {
        let mut m = machine(&[0xE, 0x3]);
        assert_eq!(
            m.step().fault(),
            Some(&Fault::UnrecognizedOpcode {
                address: 0,
                opcode: 0xE,
                operand: Some(3)
            })
        );
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn erased_memory_jumps_out_of_program_area() {
        // FFF jumps to 0x7F, which is outside the program area
        let mut m = machine(&[]);
        assert!(m.step().is_running());
        assert_eq!(m.pc(), 0x7F);
        assert_eq!(m.step().fault(), Some(&Fault::OutOfRange { address: 0x7F }));
    }

    #[test]
    fn operand_fetch_past_program_area_faults() {
        let config = Gmc4Config {
            start_address: 0x5F,
            ..Gmc4Config::default()
        };
        let mut program = vec![0x1; 0x5F];
        program.push(0x8);
        let mut m = Gmc4::new(&program, config).unwrap();
        assert_eq!(m.step().fault(), Some(&Fault::OutOfRange { address: 0x60 }));
        assert_eq!(m.pc(), 0x5F);
    }

    #[test]
    fn reset_reloads_program() {
        let mut m = machine(&[0x8, 0x5, 0x4]);
        steps(&mut m, 2);
        assert_eq!(m.data(0), 5);
        m.reset();
        assert_eq!(m.data(0), ERASED);
        assert_eq!(m.pc(), 0);
        assert_eq!(m.steps(), 0);

        steps(&mut m, 2);
        m.soft_reset();
        assert_eq!(m.data(0), 5);
        assert_eq!(m.pc(), 0);
    }

    #[test]
    fn rejects_start_outside_program_area() {
        let config = Gmc4Config {
            start_address: PROGRAM_SIZE,
            ..Gmc4Config::default()
        };
        assert!(Gmc4::new(&[], config).is_err());
    }
}
