use core::time::Duration;
use thiserror::Error;

use crate::{
    image::SharedImage,
    registers::{Leds, module_type},
    };
use super::devices::{DetectedModule, ModuleIdentity};


/// port of the head unit a chain is attached to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Left,
}
impl Direction {
    /// line pulled by the head unit to select the first module of the chain
    pub const fn control(self) -> Line {Line::Control(self)}
    /// line pulled by a module waiting for its configuration
    pub const fn sense(self) -> Line {Line::Sense(self)}
}

/// one of the four discovery lines, two per side
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Line {
    Control(Direction),
    Sense(Direction),
}
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Input,
    Output,
}

/// read/write access to the discovery lines
pub trait SignalLines {
    /// set the line direction, and its level if it is an output
    fn set_line(&mut self, line: Line, level: Level, mode: Mode);
    fn read_line(&mut self, line: Line) -> Level;
}

/// monotonic time source, also used for the few blocking waits of the bridge
pub trait Clock {
    /// time elapsed since an arbitrary fixed point
    fn now(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

/// power fault and front leds of the head unit
pub trait Indicators {
    fn set_power_fault(&mut self, fault: bool);
    fn set_leds(&mut self, leds: Leds);
}

/// head unit telemetry, `None` when the value could not be read
pub trait Sensors {
    /// cpu temperature in degree celsius
    fn cpu_temperature(&mut self) -> Option<i32>;
    /// cpu clock in MHz
    fn clock_frequency(&mut self) -> Option<u32>;
}

/// everything the bridge needs from the head unit itself
pub trait Platform: SignalLines + Clock + Indicators + Sensors + Send {}
impl<P: SignalLines + Clock + Indicators + Sensors + Send> Platform for P {}


/// failure reported by the transport, with its status code
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
#[error("transport failed with code {code}")]
pub struct TransportError {
    pub code: i32,
}
impl TransportError {
    pub const fn new(code: i32) -> Self {
        Self {code}
    }
}

/// family of io modules needing an initialization after discovery
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModuleFamily {
    DigitalIo,
    AnalogIo,
}
impl ModuleFamily {
    pub const fn of(module_type: u16) -> Option<Self> {
        match module_type {
            module_type::DIO_14 | module_type::DI_16 | module_type::DO_16 => Some(Self::DigitalIo),
            module_type::AIO => Some(Self::AnalogIo),
            _ => None,
        }
    }
}

/**
    byte level field bus transport and per module drivers

    every method is a bounded exchange, none is expected to block more than a bus timeout
*/
pub trait Transport: Send {
    /// configure the next module waiting on the given side with `address`, and return its identity
    fn write_next_config(&mut self, direction: Direction, address: u8) -> Result<ModuleIdentity, TransportError>;
    /// switch the bus from discovery to cyclic data exchange
    fn start_data_exchange(&mut self);
    /// initialize the module at `index` in the device list
    fn init_module(&mut self, family: ModuleFamily, index: usize, module: &DetectedModule) -> Result<(), TransportError>;
    /// exchange data of all active modules with the process image once
    fn run_cycle(&mut self, modules: &[DetectedModule], image: &SharedImage) -> Result<(), TransportError>;
    /// communication errors counted since data exchange started
    fn error_count(&self) -> u16;
    /// leave cyclic data exchange and go back to the discovery protocol
    fn goto_discovery_protocol(&mut self) -> Result<(), TransportError>;

    fn enter_firmware_mode(&mut self, address: u8) -> Result<(), TransportError>;
    fn set_serial(&mut self, address: u8, serial: u32) -> Result<(), TransportError>;
    fn erase_flash(&mut self, address: u8) -> Result<(), TransportError>;
    /// write one chunk, no bigger than [MAX_FIRMWARE_CHUNK](super::firmware::MAX_FIRMWARE_CHUNK)
    fn write_flash(&mut self, address: u8, offset: u32, data: &[u8]) -> Result<(), TransportError>;
    fn reset_firmware_target(&mut self, address: u8) -> Result<(), TransportError>;
}
