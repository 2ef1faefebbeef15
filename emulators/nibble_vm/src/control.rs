use crate::error::Fault;
use serde::{Deserialize, Serialize};

/// Low-address field width used by the 4-bit jump operands.
pub const DEFAULT_PAGE_SIZE: u32 = 16;

/// Where a return lands relative to the link register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnConvention {
    /// `pc = link`; the link already points past the call.
    #[default]
    Link,
    /// `pc = link + 1`.
    LinkPlusOne,
}

/// Program counter, page selector and the single-slot link register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlUnit {
    pc: u32,
    page: u32,
    link: u32,
    page_size: u32,
    #[serde(skip)]
    start: u32,
}

impl ControlUnit {
    pub fn new(start: u32, page_size: u32) -> Self {
        Self {
            pc: start,
            page: 0,
            link: 0,
            page_size,
            start,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn link(&self) -> u32 {
        self.link
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn resolve_target(&self, operand: u32) -> u32 {
        self.page * self.page_size + operand
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    pub fn advance(&mut self, width: u32) {
        self.pc = self.pc.wrapping_add(width);
    }

    pub fn jump(&mut self, target: u32) {
        self.pc = target;
    }

    /// Target of a relative backwards jump; landing before address 0 is a
    /// fault.
    pub fn back_target(&self, distance: u32) -> Result<u32, Fault> {
        self.pc
            .checked_sub(distance)
            .ok_or(Fault::OutOfRange { address: self.pc })
    }

    /// Store the return address and jump. A previous link is overwritten.
    pub fn call(&mut self, target: u32) {
        self.link = self.pc.wrapping_add(1);
        self.pc = target;
    }

    pub fn return_target(&self, convention: ReturnConvention) -> u32 {
        match convention {
            ReturnConvention::Link => self.link,
            ReturnConvention::LinkPlusOne => self.link.wrapping_add(1),
        }
    }

    pub fn ret(&mut self, convention: ReturnConvention) {
        self.pc = self.return_target(convention);
    }

    pub fn reset(&mut self) {
        self.pc = self.start;
        self.page = 0;
        self.link = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paged_targets() {
        let mut cu = ControlUnit::new(0, DEFAULT_PAGE_SIZE);
        assert_eq!(cu.resolve_target(5), 5);
        cu.set_page(2);
        assert_eq!(cu.resolve_target(5), 37);
    }

    #[test]
    fn call_overwrites_link() {
        let mut cu = ControlUnit::new(3, DEFAULT_PAGE_SIZE);
        cu.call(10);
        assert_eq!((cu.pc(), cu.link()), (10, 4));
        cu.call(20);
        assert_eq!((cu.pc(), cu.link()), (20, 11));
        cu.ret(ReturnConvention::Link);
        assert_eq!(cu.pc(), 11);
        cu.ret(ReturnConvention::LinkPlusOne);
        assert_eq!(cu.pc(), 12);
    }

    #[test]
    fn back_target_underflow_faults() {
        let cu = ControlUnit::new(2, DEFAULT_PAGE_SIZE);
        assert_eq!(cu.back_target(2), Ok(0));
        assert_eq!(cu.back_target(3), Err(Fault::OutOfRange { address: 2 }));
    }

    #[test]
    fn reset_returns_to_start() {
        let mut cu = ControlUnit::new(7, DEFAULT_PAGE_SIZE);
        cu.set_page(3);
        cu.call(40);
        cu.reset();
        assert_eq!((cu.pc(), cu.page(), cu.link()), (7, 0, 0));
    }
}
