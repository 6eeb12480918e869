use log::*;

use crate::image::ProcessImage;
use super::devices::DefaultEntry;


/**
    build the default process image from the configured default values

    the image is cleared first, then every entry is written in order.
    Single bits are set or cleared without touching their neighbours, 8, 16 and 32 bit values are
    written little endian. Entries reaching past the end of the image or with another bit length are skipped.
*/
pub fn apply_defaults(entries: &[DefaultEntry], image: &mut ProcessImage) {
    image.clear();

    for entry in entries {
        trace!("address {:2}  len {:3}  offset {:3}+{}  default {:#x}",
            entry.address, entry.bit_length, entry.offset, entry.bit_position, entry.default);

        let start = usize::from(entry.offset);
        let written = match entry.bit_length {
            1 => {
                let byte = start + usize::from(entry.bit_position / 8);
                let mask = 1u8 << (entry.bit_position % 8);
                image.bytes_mut(byte, 1).map(|value| {
                    if entry.default != 0  {value[0] |= mask}
                    else                   {value[0] &= !mask}
                })
            },
            8 => image.bytes_mut(start, 1)
                .map(|dst| dst[0] = entry.default as u8),
            16 => image.bytes_mut(start, 2)
                .map(|dst| dst.copy_from_slice(&(entry.default as u16).to_le_bytes())),
            32 => image.bytes_mut(start, 4)
                .map(|dst| dst.copy_from_slice(&entry.default.to_le_bytes())),
            other => {
                debug!("address {}: unsupported default of {} bits at offset {}", entry.address, other, entry.offset);
                continue
            },
        };
        if let Err(error) = written {
            debug!("address {}: default skipped, {}", entry.address, error);
        }
    }
}
