/*!
    firmware update of a module

    requests are issued through the blocking methods of [Bridge](super::Bridge) while it is stopped.
    Each of them selects a [FirmwareStep], the run loop executes its action once on its next tick, and
    hands the transport result back to the requester.
*/

use std::vec::Vec;
use log::*;

use super::hardware::{Transport, TransportError};


/// biggest chunk of flash data sent in one transport exchange
pub const MAX_FIRMWARE_CHUNK: usize = 250;
/// address answered by modules that never went through discovery
pub const LEGACY_ADDRESS: u8 = 2;


/// action of the firmware update mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FirmwareStep {
    EnterMode,
    SetSerial,
    EraseFlash,
    WriteFlash,
    ResetTarget,
}

/// parameters of the pending firmware request and result of the last one
#[derive(Clone, Debug)]
pub struct FirmwareSession {
    /// address of the target, as given to [FirmwareStep::EnterMode] then as used by the following steps
    pub address: u8,
    /// the chain was discovered before entering firmware mode
    pub scanned: bool,
    pub serial: u32,
    pub flash_offset: u32,
    pub data: Vec<u8>,
    pub result: Result<(), TransportError>,
}
impl FirmwareSession {
    pub const fn new() -> Self {
        Self {
            address: 0,
            scanned: false,
            serial: 0,
            flash_offset: 0,
            data: Vec::new(),
            result: Ok(()),
        }
    }

    /**
        execute the action of `step`

        `last_right` is the address of the last module discovered on the right side
    */
    pub fn execute<T: Transport + ?Sized>(&mut self, step: FirmwareStep, transport: &mut T, last_right: u8) {
        self.result = match step {
            FirmwareStep::EnterMode => {
                if !self.scanned {
                    self.address = LEGACY_ADDRESS;
                }
                let result = transport.enter_firmware_mode(self.address);
                info!("entering firmware mode at address {}: {:?}", self.address, result);
                // once in firmware mode the target only answers at a relative address
                self.address = if self.address == last_right {2} else {1};
                info!("using address {}", self.address);
                result
            },
            FirmwareStep::SetSerial => {
                let result = transport.set_serial(self.address, self.serial);
                info!("set serial number {}: {:?}", self.serial, result);
                result
            },
            FirmwareStep::EraseFlash => {
                let result = transport.erase_flash(self.address);
                info!("erase flash: {:?}", result);
                result
            },
            FirmwareStep::WriteFlash => {
                let data = core::mem::take(&mut self.data);
                write_chunked(transport, self.address, self.flash_offset, &data)
            },
            FirmwareStep::ResetTarget => {
                let result = transport.reset_firmware_target(self.address);
                info!("reset firmware target: {:?}", result);
                result
            },
        };
    }
}
impl Default for FirmwareSession {
    fn default() -> Self {Self::new()}
}

/// write `data` at `flash_offset` in chunks of at most [MAX_FIRMWARE_CHUNK] bytes, stopping at the first failure
pub fn write_chunked<T: Transport + ?Sized>(transport: &mut T, address: u8, flash_offset: u32, data: &[u8]) -> Result<(), TransportError> {
    let mut offset = flash_offset;
    for chunk in data.chunks(MAX_FIRMWARE_CHUNK) {
        let result = transport.write_flash(address, offset, chunk);
        info!("write flash at {:#010x}, {:#x} bytes: {:?}", offset, chunk.len(), result);
        result?;
        offset = offset.wrapping_add(chunk.len() as u32);
    }
    Ok(())
}
