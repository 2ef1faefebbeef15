//! Fetch-decode-execute core shared by small nibble-coded machines.
//!
//! - [`store`]: address-indexed program built from text records
//! - [`state`]: register file, pins and the bit/pin conversion helpers
//! - [`control`]: program counter, page selector, single link register
//! - [`eval`]: the step engine, generic over an [`eval::InstructionSet`]
//! - [`driver`]: `run` with a step budget and a lazy snapshot trace

pub mod control;
pub mod driver;
pub mod error;
pub mod eval;
pub mod instr;
pub mod machine;
pub mod state;
pub mod store;

pub use control::{ControlUnit, ReturnConvention, DEFAULT_PAGE_SIZE};
pub use driver::{run, trace, RunOutcome, Trace};
pub use error::{Fault, LoadError, RecordField, Result};
pub use eval::{Context, Engine, EngineConfig, EngineSnapshot, Flow, InstructionSet};
pub use instr::{Instruction, OpKind, SourceRecord, ADDRESS_DIGITS};
pub use machine::{HaltReason, Machine, Status};
pub use state::{bit, mask, nibble_to_pins, pins_to_nibble, RegisterFile};
pub use store::InstructionStore;
