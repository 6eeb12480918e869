/*!
    define the standard locations in the process image

    the process image is a flat byte buffer, each module owns input, output and config ranges at offsets
    given by the configuration. The head unit owns a small record at its input offset, described by the
    registers of [head]. Multi-byte values are little endian.
*/

use core::marker::PhantomData;
use packbytes::{FromBytes, ByteArray};
use bilge::prelude::*;
use crate::pack_bilge;


/// integer used for addressing the process image
pub type Offset = u16;

/// total size of the process image
pub const IMAGE_LEN: usize = 4096;

/**
    a register is a typed pointer in the process image.

    it only holds the offset of the starting byte of the referenced value, hence can be created, copied or destroyed at no cost
*/
pub struct Register<T> {
    offset: Offset,
    ty: PhantomData<T>,
}
impl<T> Register<T> {
    /// create a register from its starting byte
    pub const fn new(offset: Offset) -> Self {
        Self{offset, ty: PhantomData}
    }
    /// starting byte in the image
    pub const fn offset(&self) -> Offset {self.offset}
    /// same register in a record starting at `base`, `None` if the address does not fit
    pub fn at(self, base: Offset) -> Option<Self> {
        Some(Self::new(base.checked_add(self.offset)?))
    }
}
impl<T: FromBytes> Register<T> {
    pub const fn size(&self) -> usize {T::Bytes::SIZE}
}
impl<T> Clone for Register<T> {
    fn clone(&self) -> Self {
        Self::new(self.offset)
    }
}
impl<T> Copy for Register<T> {}
impl<T> core::fmt::Debug for Register<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Register({:#x})", self.offset)
    }
}


/// registers of the head unit record, relative to the head unit input offset
pub mod head {
    use super::*;

    /// bridge status flags, set by the driver
    pub const STATUS: Register<Status> = Register::new(0);
    /// duration of the last io cycle in milliseconds, set by the transport
    pub const IO_CYCLE: Register<u8> = Register::new(1);
    /// communication errors counted by the transport
    pub const ERROR_COUNT: Register<u16> = Register::new(2);
    /// cpu temperature in degree celsius
    pub const CPU_TEMPERATURE: Register<u8> = Register::new(4);
    /// cpu clock in units of 10 MHz
    pub const CPU_FREQUENCY: Register<u8> = Register::new(5);
    /// front leds, set by the application
    pub const LED: Register<Leds> = Register::new(6);
    /// above this amount of errors, inputs are no longer trusted. 0 disables it
    pub const ERROR_LIMIT_SOFT: Register<u16> = Register::new(7);
    /// above this amount of errors, the bridge is stopped. 0 disables it
    pub const ERROR_LIMIT_HARD: Register<u16> = Register::new(9);

    /// bytes of the record that are inputs (set by the driver)
    pub const INPUT_LENGTH: u16 = 6;
    /// bytes of the record that are outputs (set by the application)
    pub const OUTPUT_LENGTH: u16 = 5;
}


/// bridge status byte, published in the head unit record
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct Status {
    /// cyclic data exchange is running
    pub running: bool,
    /// a module was detected that is not in the configuration
    pub extra_module: bool,
    /// a configured module was not detected
    pub missing_module: bool,
    /// a detected module does not match its configuration
    pub size_mismatch: bool,
    pub left_gateway: bool,
    pub right_gateway: bool,
    reserved: u2,
}
pack_bilge!(Status);

/// front leds of the head unit
#[bitsize(8)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Default)]
pub struct Leds {
    pub a1_green: bool,
    pub a1_red: bool,
    pub a2_green: bool,
    pub a2_red: bool,
    reserved: u4,
}
pack_bilge!(Leds);


/// module type codes reported in module identities
pub mod module_type {
    pub const CORE: u16 = 95;
    pub const DIO_14: u16 = 96;
    pub const DI_16: u16 = 97;
    pub const DO_16: u16 = 98;
    pub const AIO: u16 = 103;
    /// types from this value on are handled by user space software, not by a physical module
    pub const SOFTWARE_OFFSET: u16 = 0x6000;
    /// tag set on configured modules that are not physically present
    pub const NOT_CONNECTED: u16 = 0x8000;
    pub const NOT_CONNECTED_MASK: u16 = 0x7fff;

    /// true for module types that need no hardware to be present
    pub const fn is_software(module_type: u16) -> bool {
        module_type >= SOFTWARE_OFFSET
    }
}
