use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Fault>;

/// Conditions that stop a machine. They are recorded in
/// [`crate::machine::HaltReason::Fault`] and never unwind past `step()`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("address {address} is outside the loaded program")]
    OutOfRange { address: u32 },
    #[error("unrecognized opcode {opcode:X} (operand {operand:?}) at {address}")]
    UnrecognizedOpcode {
        address: u32,
        opcode: u8,
        operand: Option<u8>,
    },
    #[error("malformed instruction at {address}: {reason}")]
    MalformedInstruction { address: u32, reason: &'static str },
    #[error("arithmetic fault at {address}: {op} by zero")]
    ArithmeticFault { address: u32, op: &'static str },
    #[error("instruction at {address} would modify itself (target {target})")]
    SelfModification { address: u32, target: u32 },
    #[error("instruction pointer {address} is not aligned to {alignment}")]
    BadAlignment { address: u32, alignment: u32 },
}

/// Which field of a source record failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Address,
    Opcode,
    Operand,
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecordField::Address => "address",
            RecordField::Opcode => "opcode",
            RecordField::Operand => "operand",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("record {index}: malformed {field} token {token:?}")]
    MalformedRecord {
        index: usize,
        field: RecordField,
        token: String,
    },
}
