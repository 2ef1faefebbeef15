use serde::{Deserialize, Serialize};

/// Width of the decimal address token in program records.
pub const ADDRESS_DIGITS: usize = 3;

/// One decoded program slot. Multi-slot encodings are stored as consecutive
/// instructions and consumed by the opcode that needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    pub address: u32,
    pub opcode: u8,
    #[serde(default)]
    pub operand: Option<u8>,
}

impl Instruction {
    pub fn new(address: u32, opcode: u8, operand: u8) -> Self {
        Self {
            address,
            opcode: opcode & 0xF,
            operand: Some(operand & 0xF),
        }
    }

    /// A slot holding a bare nibble, as used by machines whose operands live
    /// in the following slots.
    pub fn nibble(address: u32, opcode: u8) -> Self {
        Self {
            address,
            opcode: opcode & 0xF,
            operand: None,
        }
    }
}

/// Raw text tokens for one program line, as produced by a loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub address: String,
    pub opcode: String,
    #[serde(default)]
    pub operand: Option<String>,
    #[serde(default)]
    pub comment: String,
}

impl SourceRecord {
    pub fn new(address: &str, opcode: &str, operand: Option<&str>, comment: &str) -> Self {
        Self {
            address: address.to_string(),
            opcode: opcode.to_string(),
            operand: operand.map(str::to_string),
            comment: comment.to_string(),
        }
    }
}

/// Operation families shared by every machine's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    ImmediateLoad,
    RegisterTransfer,
    ArithmeticLogic,
    ConditionalSkip,
    Jump,
    Call,
    Return,
    SetPage,
    LoopBranch,
    Output,
    Halt,
}

/// Parse a token of exactly `width` digits in `radix`.
pub(crate) fn parse_fixed(token: &str, width: usize, radix: u32) -> Option<u32> {
    if token.len() != width || !token.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(token, radix).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fixed_rejects_wrong_width_and_charset() {
        assert_eq!(parse_fixed("007", 3, 10), Some(7));
        assert_eq!(parse_fixed("07", 3, 10), None);
        assert_eq!(parse_fixed("0a7", 3, 10), None);
        assert_eq!(parse_fixed("F", 1, 16), Some(15));
        assert_eq!(parse_fixed("g", 1, 16), None);
        assert_eq!(parse_fixed("+1", 2, 10), None);
    }

    #[test]
    fn constructors_mask_to_nibbles() {
        let ins = Instruction::new(4, 0x1C, 0x25);
        assert_eq!(ins.opcode, 0xC);
        assert_eq!(ins.operand, Some(0x5));
        assert_eq!(Instruction::nibble(0, 0xA).operand, None);
    }
}
