//! Text loaders for program files.
//!
//! TPS programs are line records `AAA HH # comment`: a three digit decimal
//! address and a two nibble hex word (opcode, operand). GMC-4 and FlipJump
//! images are whitespace separated hex tokens. `#` starts a comment anywhere.

use nibble_vm::{InstructionStore, LoadError, SourceRecord};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("line {line}: expected `AAA HH`, got {content:?}")]
    Syntax { line: usize, content: String },
    #[error("line {line}: {token:?} is not a {width}-digit hex value")]
    BadToken {
        line: usize,
        token: String,
        width: usize,
    },
    #[error(transparent)]
    Load(#[from] LoadError),
}

pub type Result<T> = std::result::Result<T, SourceError>;

fn split_comment(line: &str) -> (&str, &str) {
    match line.split_once('#') {
        Some((code, comment)) => (code.trim(), comment.trim()),
        None => (line.trim(), ""),
    }
}

/// Split a TPS listing into raw records. Token widths are checked later by
/// [`InstructionStore::load`].
pub fn parse_records(text: &str) -> Result<Vec<SourceRecord>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let (code, comment) = split_comment(line);
        if code.is_empty() {
            continue;
        }
        let fields: Vec<&str> = code.split_whitespace().collect();
        let [address, word] = fields.as_slice() else {
            return Err(SourceError::Syntax {
                line: idx + 1,
                content: line.to_string(),
            });
        };
        // first char is the opcode, the rest the operand
        let split = word.chars().next().map_or(0, char::len_utf8);
        let (opcode, operand) = word.split_at(split);
        let operand = (!operand.is_empty()).then_some(operand);
        records.push(SourceRecord::new(address, opcode, operand, comment));
    }
    Ok(records)
}

pub fn load_program(text: &str) -> Result<InstructionStore> {
    let records = parse_records(text)?;
    Ok(InstructionStore::load(records)?)
}

fn parse_hex_tokens(text: &str, max_width: usize) -> Result<Vec<u8>> {
    let mut values = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let (code, _) = split_comment(line);
        for token in code.split_whitespace() {
            let value = (token.len() <= max_width && token.chars().all(|c| c.is_ascii_hexdigit()))
                .then(|| u8::from_str_radix(token, 16).ok())
                .flatten()
                .ok_or_else(|| SourceError::BadToken {
                    line: idx + 1,
                    token: token.to_string(),
                    width: max_width,
                })?;
            values.push(value);
        }
    }
    Ok(values)
}

/// One hex digit per token, e.g. a GMC-4 listing `8 5 1`.
pub fn parse_nibbles(text: &str) -> Result<Vec<u8>> {
    parse_hex_tokens(text, 1)
}

/// Up to two hex digits per token, e.g. a FlipJump image `10 00`.
pub fn parse_bytes(text: &str) -> Result<Vec<u8>> {
    parse_hex_tokens(text, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nibble_vm::{Instruction, RecordField};

    #[test]
    fn splits_words_and_comments() {
        let text = "\n# header\n000 45   # A = 5\n001 55\n";
        let records = parse_records(text).unwrap();
        assert_eq!(
            records,
            vec![
                SourceRecord::new("000", "4", Some("5"), "A = 5"),
                SourceRecord::new("001", "5", Some("5"), ""),
            ]
        );
    }

    #[test]
    fn wrong_field_count_reports_line() {
        let err = parse_records("000 45\n001\n").unwrap_err();
        assert_eq!(
            err,
            SourceError::Syntax {
                line: 2,
                content: "001".into()
            }
        );
        assert!(matches!(
            parse_records("000 45 67"),
            Err(SourceError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn width_errors_come_from_the_store() {
        let err = load_program("000 4G\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Load(LoadError::MalformedRecord {
                field: RecordField::Operand,
                ..
            })
        ));
        let err = load_program("00 45\n").unwrap_err();
        assert!(matches!(
            err,
            SourceError::Load(LoadError::MalformedRecord {
                field: RecordField::Address,
                ..
            })
        ));
    }

    #[test]
    fn loads_into_store() {
        let store = load_program("000 45 # load\n003 E0\n").unwrap();
        assert_eq!(store.fetch(0).unwrap(), Instruction::new(0, 4, 5));
        assert_eq!(store.fetch(3).unwrap(), Instruction::new(3, 0xE, 0));
        assert_eq!(store.comment(0), Some("load"));
        assert!(!store.contains(1));
    }

    #[test]
    fn hex_images() {
        assert_eq!(parse_nibbles("8 5 # TIA 5\n1").unwrap(), vec![8, 5, 1]);
        assert_eq!(parse_bytes("10 0 ff").unwrap(), vec![0x10, 0, 0xFF]);
        assert!(matches!(
            parse_nibbles("8 15"),
            Err(SourceError::BadToken { line: 1, width: 1, .. })
        ));
        assert!(matches!(
            parse_bytes("\nzz"),
            Err(SourceError::BadToken { line: 2, .. })
        ));
    }
}
