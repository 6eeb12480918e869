/*!
    process image: the flat memory shared by the driver, the modules and the applications

    every access is bounds checked, offsets computed from a configuration are never trusted to fit
*/

use core::ops::{Deref, Range};
use packbytes::{FromBytes, ToBytes, ByteArray};
use thiserror::Error;

use crate::{
    mutex::BusyMutex,
    registers::{Register, IMAGE_LEN},
    };


/// the live image is shared with applications and the transport, always lock it briefly
pub type SharedImage = BusyMutex<ProcessImage>;

/// an access would reach past the end of the image
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq)]
#[error("{size} bytes at {start} exceed process image of {len} bytes", len = IMAGE_LEN)]
pub struct OutOfBounds {
    pub start: usize,
    pub size: usize,
}

/// byte buffer of fixed size holding all module data
#[derive(Clone)]
pub struct ProcessImage {
    buffer: [u8; IMAGE_LEN],
}
impl ProcessImage {
    pub const fn new() -> Self {
        Self {buffer: [0; IMAGE_LEN]}
    }
    /// range of `size` bytes starting at `start`, if it fits in the image
    pub fn range(start: usize, size: usize) -> Result<Range<usize>, OutOfBounds> {
        match start.checked_add(size) {
            Some(end) if end <= IMAGE_LEN => Ok(start .. end),
            _ => Err(OutOfBounds {start, size}),
        }
    }

    /// get the current register's value
    pub fn get<T: FromBytes>(&self, register: Register<T>) -> Result<T, OutOfBounds> {
        let range = Self::range(usize::from(register.offset()), T::Bytes::SIZE)?;
        let mut dst = T::Bytes::zeroed();
        dst.as_mut().copy_from_slice(&self.buffer[range]);
        Ok(T::from_le_bytes(dst))
    }
    /// set the given register's value
    pub fn set<T: ToBytes>(&mut self, register: Register<T>, value: T) -> Result<(), OutOfBounds> {
        let src = value.to_le_bytes();
        let range = Self::range(usize::from(register.offset()), src.as_ref().len())?;
        self.buffer[range].copy_from_slice(src.as_ref());
        Ok(())
    }
    pub fn bytes(&self, start: usize, size: usize) -> Result<&[u8], OutOfBounds> {
        Ok(&self.buffer[Self::range(start, size)?])
    }
    pub fn bytes_mut(&mut self, start: usize, size: usize) -> Result<&mut [u8], OutOfBounds> {
        Ok(&mut self.buffer[Self::range(start, size)?])
    }
    /// replace the whole content by another image
    pub fn copy_from(&mut self, other: &ProcessImage) {
        self.buffer.copy_from_slice(&other.buffer);
    }
    pub fn clear(&mut self) {
        self.buffer.fill(0);
    }
}
impl Default for ProcessImage {
    fn default() -> Self {Self::new()}
}
impl Deref for ProcessImage {
    type Target = [u8; IMAGE_LEN];
    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}
impl core::fmt::Debug for ProcessImage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let used = self.buffer.iter().rposition(|&b| b != 0).map_or(0, |last| last+1);
        f.debug_struct("ProcessImage")
            .field("used", &&self.buffer[.. used])
            .finish()
    }
}
