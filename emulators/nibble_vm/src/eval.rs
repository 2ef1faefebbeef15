use crate::control::{ControlUnit, ReturnConvention, DEFAULT_PAGE_SIZE};
use crate::error::Fault;
use crate::instr::{Instruction, OpKind};
use crate::machine::{HaltReason, Machine, Status};
use crate::state::RegisterFile;
use crate::store::InstructionStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// How control continues after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Past the instruction and any slots it fetched.
    Next,
    /// Past the instruction and the one after it.
    Skip,
    /// Jump, call and return targets must hold an instruction; otherwise
    /// the step faults with `OutOfRange` and the pc stays put.
    Goto(u32),
    Call(u32),
    Return,
    Halt,
}

/// A machine's decode/execute table on top of the shared engine.
pub trait InstructionSet {
    type Reg: Copy + Ord + Debug + Serialize + 'static;
    type Pin: Copy + Ord + Debug + Serialize + 'static;
    type Op: Copy + Debug;

    const REGISTERS: &'static [Self::Reg];
    const PINS: &'static [Self::Pin];

    fn decode(ins: &Instruction) -> Result<Self::Op, Fault>;

    fn kind(op: &Self::Op) -> OpKind;

    fn execute(op: &Self::Op, ctx: &mut Context<'_, Self::Reg, Self::Pin>) -> Result<Flow, Fault>;
}

/// Mutable view handed to [`InstructionSet::execute`].
pub struct Context<'a, R: Ord, P: Ord> {
    pub address: u32,
    pub registers: &'a mut RegisterFile<R, P>,
    pub control: &'a mut ControlUnit,
    store: &'a InstructionStore,
    consumed: u32,
}

impl<'a, R: Ord, P: Ord> Context<'a, R, P> {
    /// Read the next slot of a multi-slot encoding.
    pub fn fetch_next(&mut self) -> Result<Instruction, Fault> {
        let ins = self.store.fetch(self.address + 1 + self.consumed)?;
        self.consumed += 1;
        Ok(ins)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub start_address: u32,
    pub page_size: u32,
    pub return_convention: ReturnConvention,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_address: 0,
            page_size: DEFAULT_PAGE_SIZE,
            return_convention: ReturnConvention::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot<R: Ord, P: Ord> {
    pub pc: u32,
    pub page: u32,
    pub link: u32,
    pub steps: u64,
    pub registers: BTreeMap<R, i64>,
    pub pins: BTreeMap<P, bool>,
    pub status: Status,
}

pub struct Engine<I: InstructionSet> {
    store: InstructionStore,
    registers: RegisterFile<I::Reg, I::Pin>,
    control: ControlUnit,
    config: EngineConfig,
    status: Status,
    steps: u64,
}

impl<I: InstructionSet> Engine<I> {
    pub fn new(store: InstructionStore, config: EngineConfig) -> Self {
        Self {
            store,
            registers: RegisterFile::new(I::REGISTERS, I::PINS),
            control: ControlUnit::new(config.start_address, config.page_size),
            config,
            status: Status::Running,
            steps: 0,
        }
    }

    pub fn store(&self) -> &InstructionStore {
        &self.store
    }

    pub fn registers(&self) -> &RegisterFile<I::Reg, I::Pin> {
        &self.registers
    }

    /// Direct access for the driver, e.g. to set input pins between steps.
    pub fn registers_mut(&mut self) -> &mut RegisterFile<I::Reg, I::Pin> {
        &mut self.registers
    }

    pub fn control(&self) -> &ControlUnit {
        &self.control
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn execute_at(&mut self, address: u32) -> Result<(Flow, u32), Fault> {
        let ins = self.store.fetch(address)?;
        let op = I::decode(&ins)?;
        tracing::trace!(
            pc = address,
            opcode = ins.opcode,
            operand = ?ins.operand,
            kind = ?I::kind(&op),
            ?op,
            "execute"
        );
        let mut ctx = Context {
            address,
            registers: &mut self.registers,
            control: &mut self.control,
            store: &self.store,
            consumed: 0,
        };
        let flow = I::execute(&op, &mut ctx)?;
        Ok((flow, ctx.consumed))
    }

    fn apply(&mut self, flow: Flow, consumed: u32) -> Result<(), Fault> {
        match flow {
            Flow::Next => self.control.advance(1 + consumed),
            Flow::Skip => self.control.advance(2 + consumed),
            Flow::Goto(target) => {
                self.check_target(target)?;
                self.control.jump(target);
            }
            Flow::Call(target) => {
                self.check_target(target)?;
                self.control.call(target);
            }
            Flow::Return => {
                let convention = self.config.return_convention;
                self.check_target(self.control.return_target(convention))?;
                self.control.ret(convention);
            }
            Flow::Halt => self.status = Status::Halted(HaltReason::Finished),
        }
        Ok(())
    }

    fn check_target(&self, target: u32) -> Result<(), Fault> {
        if self.store.contains(target) {
            Ok(())
        } else {
            Err(Fault::OutOfRange { address: target })
        }
    }

    fn halt(&mut self, reason: HaltReason) {
        tracing::debug!(pc = self.control.pc(), ?reason, "machine halted");
        self.status = Status::Halted(reason);
    }
}

impl<I: InstructionSet> Machine for Engine<I> {
    type Snapshot = EngineSnapshot<I::Reg, I::Pin>;

    fn step(&mut self) -> Status {
        if self.status.is_halted() {
            return self.status.clone();
        }
        let address = self.control.pc();
        let outcome = self
            .execute_at(address)
            .and_then(|(flow, consumed)| self.apply(flow, consumed));
        self.steps += 1;
        match outcome {
            Ok(()) if self.status.is_halted() => {
                tracing::debug!(pc = address, "program finished");
            }
            Ok(()) => {}
            Err(fault) => self.halt(HaltReason::Fault(fault)),
        }
        self.status.clone()
    }

    fn status(&self) -> &Status {
        &self.status
    }

    fn reset(&mut self) {
        self.registers.reset();
        self.control.reset();
        self.status = Status::Running;
        self.steps = 0;
    }

    fn snapshot(&self) -> Self::Snapshot {
        EngineSnapshot {
            pc: self.control.pc(),
            page: self.control.page(),
            link: self.control.link(),
            steps: self.steps,
            registers: self.registers.registers().clone(),
            pins: self.registers.pins().clone(),
            status: self.status.clone(),
        }
    }
}
