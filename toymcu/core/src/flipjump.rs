//! FlipJump: a one-instruction machine. Each instruction is two words
//! `f j`; it flips memory bit `f` and jumps to bit address `j`. A jump to
//! itself ends the program.

use crate::config::ConfigError;
use crate::BuildError;
use nibble_vm::{ControlUnit, Fault, HaltReason, Machine, Status, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum supported word width in bits.
pub const MAX_WORD_BITS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipJumpConfig {
    pub word_bits: u32,
    pub start_ip: u32,
}

impl Default for FlipJumpConfig {
    fn default() -> Self {
        Self {
            word_bits: 8,
            start_ip: 0,
        }
    }
}

impl FlipJumpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.word_bits == 0 || self.word_bits > MAX_WORD_BITS {
            return Err(ConfigError::Invalid(format!(
                "flipjump.word_bits must be in 1..={MAX_WORD_BITS}, got {}",
                self.word_bits
            )));
        }
        Ok(())
    }
}

fn locate(memory: &[u8], address: u32) -> Result<(usize, u8), Fault> {
    let byte = (address / 8) as usize;
    if byte >= memory.len() {
        return Err(Fault::OutOfRange { address });
    }
    Ok((byte, (address % 8) as u8))
}

/// Bit `address` of `memory`, bit 0 of byte 0 first.
pub fn get_bit(memory: &[u8], address: u32) -> Result<bool, Fault> {
    let (byte, bit) = locate(memory, address)?;
    Ok((memory[byte] >> bit) & 1 == 1)
}

pub fn set_bit(memory: &mut [u8], address: u32, level: bool) -> Result<(), Fault> {
    let (byte, bit) = locate(memory, address)?;
    if level {
        memory[byte] |= 1 << bit;
    } else {
        memory[byte] &= !(1 << bit);
    }
    Ok(())
}

pub fn flip_bit(memory: &mut [u8], address: u32) -> Result<(), Fault> {
    let (byte, bit) = locate(memory, address)?;
    memory[byte] ^= 1 << bit;
    Ok(())
}

/// Little-endian word of `width` bits starting at bit `start`.
pub fn read_bits(memory: &[u8], start: u32, width: u32) -> Result<u32, Fault> {
    (0..width).try_fold(0u32, |acc, i| {
        let address = start
            .checked_add(i)
            .ok_or(Fault::OutOfRange { address: start })?;
        Ok(acc | (get_bit(memory, address)? as u32) << i)
    })
}

pub fn write_bits(memory: &mut [u8], start: u32, width: u32, value: u32) -> Result<(), Fault> {
    for i in 0..width {
        let address = start
            .checked_add(i)
            .ok_or(Fault::OutOfRange { address: start })?;
        set_bit(memory, address, (value >> i) & 1 == 1)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlipJumpSnapshot {
    pub ip: u32,
    pub steps: u64,
    pub memory: Vec<u8>,
    pub status: Status,
}

pub struct FlipJump {
    memory: Vec<u8>,
    image: Vec<u8>,
    control: ControlUnit,
    word_bits: u32,
    status: Status,
    steps: u64,
}

impl FlipJump {
    pub fn new(image: Vec<u8>, config: FlipJumpConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(bytes = image.len(), word_bits = config.word_bits, "flipjump image loaded");
        Ok(Self {
            memory: image.clone(),
            image,
            control: ControlUnit::new(config.start_ip, DEFAULT_PAGE_SIZE),
            word_bits: config.word_bits,
            status: Status::Running,
            steps: 0,
        })
    }

    pub fn from_source(text: &str, config: FlipJumpConfig) -> Result<Self, BuildError> {
        let image = crate::source::parse_bytes(text)?;
        Ok(Self::new(image, config)?)
    }

    pub fn ip(&self) -> u32 {
        self.control.pc()
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Run one instruction; `Ok(true)` when the program jumped to itself.
    fn execute(&mut self) -> Result<bool, Fault> {
        let ip = self.control.pc();
        let w = self.word_bits;
        let f = read_bits(&self.memory, ip, w)?;
        let j = read_bits(&self.memory, ip.saturating_add(w), w)?;
        tracing::trace!(ip, f, j, "execute");
        if ip % w != 0 {
            return Err(Fault::BadAlignment {
                address: ip,
                alignment: w,
            });
        }
        if f >= ip && f < ip.saturating_add(2 * w) {
            return Err(Fault::SelfModification {
                address: ip,
                target: f,
            });
        }
        if j == ip {
            return Ok(true);
        }
        flip_bit(&mut self.memory, f)?;
        self.control.jump(j);
        Ok(false)
    }
}

impl Machine for FlipJump {
    type Snapshot = FlipJumpSnapshot;

    fn step(&mut self) -> Status {
        if self.status.is_halted() {
            return self.status.clone();
        }
        let outcome = self.execute();
        self.steps += 1;
        let reason = match outcome {
            Ok(false) => return self.status.clone(),
            Ok(true) => HaltReason::Finished,
            Err(fault) => HaltReason::Fault(fault),
        };
        tracing::debug!(ip = self.control.pc(), ?reason, "machine halted");
        self.status = Status::Halted(reason);
        self.status.clone()
    }

    fn status(&self) -> &Status {
        &self.status
    }

    fn reset(&mut self) {
        self.memory.clone_from(&self.image);
        self.control.reset();
        self.status = Status::Running;
        self.steps = 0;
    }

    fn snapshot(&self) -> FlipJumpSnapshot {
        FlipJumpSnapshot {
            ip: self.control.pc(),
            steps: self.steps,
            memory: self.memory.clone(),
            status: self.status.clone(),
        }
    }
}

impl fmt::Display for FlipJump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IP:     {} (word {})", self.ip(), self.ip() / self.word_bits)?;
        writeln!(f, "Steps:  {}", self.steps)?;
        for (row, chunk) in self.memory.chunks(8).enumerate() {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            writeln!(f, "[{:04X}]: {}", row * 8, bytes.join(" "))?;
        }
        write!(f, "Status: {}", self.status)
    }
}
