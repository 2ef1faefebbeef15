use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Bit mask covering the low `bits` bits.
pub fn mask(bits: u8) -> i64 {
    if bits >= 63 {
        i64::MAX
    } else {
        (1i64 << bits) - 1
    }
}

/// Bit `position` of `value`. Positions past bit 63 read the sign bit.
pub fn bit(value: i64, position: u8) -> bool {
    value
        .checked_shr(u32::from(position))
        .map_or(value < 0, |v| v & 1 == 1)
}

/// Split `value` into `width` lines, bit 0 first.
pub fn nibble_to_pins(value: i64, width: u8) -> Vec<bool> {
    (0..width).map(|i| bit(value, i)).collect()
}

/// Inverse of [`nibble_to_pins`]: the first line becomes bit 0. Lines past
/// the 64th are ignored.
pub fn pins_to_nibble(pins: &[bool]) -> i64 {
    pins.iter()
        .take(i64::BITS as usize)
        .enumerate()
        .fold(0, |acc, (i, &level)| acc | ((level as i64) << i))
}

/// Named integer registers and boolean pins of one machine instance.
///
/// Values are stored unmasked; any width limit belongs to the operation
/// that writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile<R: Ord, P: Ord> {
    regs: BTreeMap<R, i64>,
    pins: BTreeMap<P, bool>,
}

impl<R, P> RegisterFile<R, P>
where
    R: Copy + Ord + Debug,
    P: Copy + Ord + Debug,
{
    pub fn new(regs: &[R], pins: &[P]) -> Self {
        Self {
            regs: regs.iter().map(|&r| (r, 0)).collect(),
            pins: pins.iter().map(|&p| (p, false)).collect(),
        }
    }

    pub fn get(&self, reg: R) -> i64 {
        self.regs.get(&reg).copied().unwrap_or(0)
    }

    pub fn set(&mut self, reg: R, value: i64) {
        self.regs.insert(reg, value);
    }

    pub fn pin(&self, pin: P) -> bool {
        self.pins.get(&pin).copied().unwrap_or(false)
    }

    pub fn set_pin(&mut self, pin: P, level: bool) {
        self.pins.insert(pin, level);
    }

    /// Sample a pin group into an integer, `group[0]` being bit 0.
    pub fn read_pins(&self, group: &[P]) -> i64 {
        let levels: Vec<bool> = group.iter().map(|&p| self.pin(p)).collect();
        pins_to_nibble(&levels)
    }

    /// Drive a pin group from the low bits of `value`.
    pub fn drive_pins(&mut self, group: &[P], value: i64) {
        for (i, &pin) in group.iter().enumerate() {
            let position = u8::try_from(i).unwrap_or(u8::MAX);
            self.set_pin(pin, bit(value, position));
        }
    }

    pub fn registers(&self) -> &BTreeMap<R, i64> {
        &self.regs
    }

    pub fn pins(&self) -> &BTreeMap<P, bool> {
        &self.pins
    }

    pub fn reset(&mut self) {
        self.regs.values_mut().for_each(|v| *v = 0);
        self.pins.values_mut().for_each(|p| *p = false);
    }
}
