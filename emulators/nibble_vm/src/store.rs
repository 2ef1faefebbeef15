use crate::error::{Fault, LoadError, RecordField};
use crate::instr::{parse_fixed, Instruction, SourceRecord, ADDRESS_DIGITS};

/// Address-indexed program, read-only once built.
#[derive(Debug, Clone, Default)]
pub struct InstructionStore {
    slots: Vec<Option<Slot>>,
    len: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    instruction: Instruction,
    comment: String,
}

impl InstructionStore {
    /// Validate and load text records. A later record at an already used
    /// address replaces the earlier one.
    pub fn load<I>(records: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let mut store = Self::default();
        for (index, record) in records.into_iter().enumerate() {
            let malformed = |field, token: &str| LoadError::MalformedRecord {
                index,
                field,
                token: token.to_string(),
            };
            let address = parse_fixed(&record.address, ADDRESS_DIGITS, 10)
                .ok_or_else(|| malformed(RecordField::Address, &record.address))?;
            let opcode = parse_fixed(&record.opcode, 1, 16)
                .ok_or_else(|| malformed(RecordField::Opcode, &record.opcode))?;
            let operand = match record.operand.as_deref() {
                Some(token) => Some(
                    parse_fixed(token, 1, 16)
                        .ok_or_else(|| malformed(RecordField::Operand, token))?
                        as u8,
                ),
                None => None,
            };
            let instruction = Instruction {
                address,
                opcode: opcode as u8,
                operand,
            };
            store.insert(instruction, record.comment.trim().to_string());
        }
        tracing::info!(instructions = store.len, "program loaded");
        Ok(store)
    }

    pub fn from_instructions<I>(instructions: I) -> Self
    where
        I: IntoIterator<Item = Instruction>,
    {
        let mut store = Self::default();
        for instruction in instructions {
            store.insert(instruction, String::new());
        }
        store
    }

    fn insert(&mut self, instruction: Instruction, comment: String) {
        let idx = instruction.address as usize;
        if self.slots.len() <= idx {
            self.slots.resize(idx + 1, None);
        }
        if self.slots[idx].is_some() {
            tracing::warn!(address = instruction.address, "duplicate address, last record wins");
        } else {
            self.len += 1;
        }
        self.slots[idx] = Some(Slot {
            instruction,
            comment,
        });
    }

    pub fn fetch(&self, address: u32) -> Result<Instruction, Fault> {
        self.slots
            .get(address as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.instruction)
            .ok_or(Fault::OutOfRange { address })
    }

    pub fn contains(&self, address: u32) -> bool {
        self.fetch(address).is_ok()
    }

    pub fn comment(&self, address: u32) -> Option<&str> {
        self.slots
            .get(address as usize)
            .and_then(|slot| slot.as_ref())
            .map(|slot| slot.comment.as_str())
            .filter(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_address(&self) -> Option<u32> {
        self.iter().last().map(|ins| ins.address)
    }

    pub fn iter(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref().map(|s| s.instruction))
    }
}
