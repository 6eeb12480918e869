use core::ops::Range;
use std::vec::Vec;
use packbytes::{FromBytes, ToBytes};
use log::*;

use crate::registers::{head, module_type};
use super::hardware::Direction;


/// maximum number of modules on the bus, head unit included
pub const MAX_MODULES: usize = 64;
/// address given to the first module of the right chain, then counting up
pub const FIRST_RIGHT_ADDRESS: u8 = 32;
/// address given to the first module of the left chain, then counting down
pub const FIRST_LEFT_ADDRESS: u8 = FIRST_RIGHT_ADDRESS - 1;


/// identity a module reports when configured
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, ToBytes)]
pub struct ModuleIdentity {
    pub serial: u32,
    pub module_type: u16,
    pub hw_revision: u16,
    pub sw_major: u16,
    pub sw_minor: u16,
    pub svn_revision: u32,
    /// bytes of inputs exchanged with the process image
    pub input_length: u16,
    /// bytes of outputs exchanged with the process image
    pub output_length: u16,
    pub feature_descriptor: u16,
}
impl ModuleIdentity {
    /// default identity of the head unit
    pub const fn head() -> Self {
        Self {
            serial: 0,
            module_type: module_type::CORE,
            hw_revision: 0,
            sw_major: 0,
            sw_minor: 0,
            svn_revision: 0,
            input_length: head::INPUT_LENGTH,
            output_length: head::OUTPUT_LENGTH,
            feature_descriptor: 0,
        }
    }
}

/// a module of the bus session, physically detected or synthesized from the configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectedModule {
    /// position in the chain
    pub address: u8,
    pub identity: ModuleIdentity,
    /// exchanged with during cyclic data exchange
    pub active: bool,
    /// physically found during discovery
    pub scanned: bool,
    /// offsets were taken from the configuration
    pub configured: bool,
    pub input_offset: u16,
    pub output_offset: u16,
    pub config_offset: u16,
    pub config_length: u16,
}
impl DetectedModule {
    /// module answering discovery at `address`
    pub fn scanned(address: u8, identity: ModuleIdentity) -> Self {
        Self {
            address,
            identity,
            active: true,
            scanned: true,
            .. Default::default()
        }
    }
    pub fn inputs(&self) -> Range<usize> {
        let start = usize::from(self.input_offset);
        start .. start + usize::from(self.identity.input_length)
    }
    pub fn outputs(&self) -> Range<usize> {
        let start = usize::from(self.output_offset);
        start .. start + usize::from(self.identity.output_length)
    }
}

/// a module as declared in the configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpectedModule {
    pub address: u8,
    /// identity the module must report, only type and lengths are checked
    pub identity: ModuleIdentity,
    pub input_offset: u16,
    pub output_offset: u16,
    pub config_offset: u16,
    pub config_length: u16,
}

/// default value of one variable in the process image
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DefaultEntry {
    /// address of the module owning the variable
    pub address: u8,
    /// byte offset in the process image
    pub offset: u16,
    /// bit in the byte at `offset`, may exceed 7 to reach following bytes
    pub bit_position: u8,
    /// one of 1, 8, 16, 32
    pub bit_length: u16,
    pub default: u32,
}

/// expected bus layout, as loaded from the configuration file
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Configuration {
    pub modules: Vec<ExpectedModule>,
    pub entries: Vec<DefaultEntry>,
}


/// modules of the current bus session, head unit first
#[derive(Clone, Debug)]
pub struct DeviceList {
    modules: heapless::Vec<DetectedModule, MAX_MODULES>,
    /// number of leading modules that were physically found
    scanned: usize,
    next_right: u8,
    next_left: u8,
}
impl DeviceList {
    /// list holding only the head unit
    pub fn new(head: ModuleIdentity) -> Self {
        let mut modules = heapless::Vec::new();
        let pushed = modules.push(DetectedModule::scanned(0, head)).is_ok();
        debug_assert!(pushed, "an empty list always has room for the head unit");
        Self {
            modules,
            scanned: 1,
            next_right: FIRST_RIGHT_ADDRESS,
            next_left: FIRST_LEFT_ADDRESS,
        }
    }
    /// address the next module on the given side will receive
    pub fn next_address(&self, direction: Direction) -> u8 {
        match direction {
            Direction::Right => self.next_right,
            Direction::Left => self.next_left,
        }
    }
    /**
        append a module found by discovery at the current address of its side, and move to the next address

        the address is consumed even when the list is full, since the module accepted it on the bus
    */
    pub fn push_scanned(&mut self, direction: Direction, identity: ModuleIdentity) -> Option<&DetectedModule> {
        let address = self.next_address(direction);
        match direction {
            Direction::Right => self.next_right = self.next_right.wrapping_add(1),
            Direction::Left => self.next_left = self.next_left.wrapping_sub(1),
        }
        // synthesized modules always come after the scanned ones
        self.modules.truncate(self.scanned);
        if self.modules.push(DetectedModule::scanned(address, identity)).is_err() {
            warn!("device list full, ignoring module at address {}", address);
            return None;
        }
        self.scanned += 1;
        self.modules.last()
    }
    /// append a module that only exists in the configuration
    pub fn push_synthesized(&mut self, module: DetectedModule) -> bool {
        if self.modules.push(module).is_err() {
            warn!("device list full, ignoring configured module at address {}", module.address);
            return false;
        }
        true
    }
    /// drop the modules synthesized by a previous reconciliation
    pub fn drop_synthesized(&mut self) {
        self.modules.truncate(self.scanned);
    }
    pub fn scanned_count(&self) -> usize {self.scanned}
    pub fn len(&self) -> usize {self.modules.len()}
    pub fn is_empty(&self) -> bool {self.modules.is_empty()}
    pub fn as_slice(&self) -> &[DetectedModule] {&self.modules}
    pub fn as_mut_slice(&mut self) -> &mut [DetectedModule] {&mut self.modules}

    /// first pair of active configured modules sharing process image bytes
    pub fn overlapping(&self) -> Option<(u8, u8)> {
        let mapped = || self.modules.iter().filter(|m| m.active && m.configured);
        for (i, a) in mapped().enumerate() {
            for b in mapped().skip(i+1) {
                if overlap(a.inputs(), b.inputs()) || overlap(a.outputs(), b.outputs())
                || overlap(a.inputs(), b.outputs()) || overlap(a.outputs(), b.inputs()) {
                    return Some((a.address, b.address));
                }
            }
        }
        None
    }
}

fn overlap(a: Range<usize>, b: Range<usize>) -> bool {
    !a.is_empty() && !b.is_empty() && a.start < b.end && b.start < a.end
}
