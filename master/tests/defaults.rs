use pibridge::{
    image::ProcessImage,
    registers::IMAGE_LEN,
    master::*,
    };


fn entry(offset: u16, bit_position: u8, bit_length: u16, default: u32) -> DefaultEntry {
    DefaultEntry {address: 32, offset, bit_position, bit_length, default}
}

#[test]
fn single_bits() {
    let mut image = ProcessImage::new();
    apply_defaults(&[
        entry(10, 3, 1, 1),
        entry(10, 9, 1, 7),
        entry(12, 0, 8, 0xff),
        entry(12, 2, 1, 0),
        ], &mut image);

    assert_eq!(image[10], 0b0000_1000);
    // bit positions past 7 reach the following bytes
    assert_eq!(image[11], 0b0000_0010);
    // clearing a bit leaves its neighbours
    assert_eq!(image[12], 0b1111_1011);
}

#[test]
fn words() {
    let mut image = ProcessImage::new();
    apply_defaults(&[
        entry(100, 0, 16, 0x1234),
        entry(200, 0, 32, 0xdead_beef),
        entry(300, 0, 8, 0x1ff),
        ], &mut image);

    assert_eq!(image.bytes(100, 2).unwrap(), [0x34, 0x12]);
    assert_eq!(image.bytes(200, 4).unwrap(), [0xef, 0xbe, 0xad, 0xde]);
    assert_eq!(image[300], 0xff);
}

#[test]
fn out_of_bounds() {
    let last = (IMAGE_LEN - 1) as u16;
    let mut image = ProcessImage::new();
    apply_defaults(&[
        entry(last, 0, 16, 0xffff),
        entry(last - 2, 0, 32, 0xffff_ffff),
        entry(last, 8, 1, 1),
        ], &mut image);
    assert!(image.iter().all(|&b| b == 0));

    apply_defaults(&[entry(last, 0, 8, 0x42)], &mut image);
    assert_eq!(image[IMAGE_LEN - 1], 0x42);
}

#[test]
fn unsupported_length() {
    let mut image = ProcessImage::new();
    apply_defaults(&[entry(10, 0, 12, 0xfff), entry(11, 0, 8, 1)], &mut image);
    assert_eq!(image[10], 0);
    assert_eq!(image[11], 1);
}

#[test]
fn cleared_first() {
    let mut image = ProcessImage::new();
    image.bytes_mut(0, 4).unwrap().fill(0xaa);
    apply_defaults(&[entry(2, 0, 8, 1)], &mut image);
    assert_eq!(image.bytes(0, 4).unwrap(), [0, 0, 1, 0]);
}

#[test]
fn later_entries_win() {
    let mut image = ProcessImage::new();
    apply_defaults(&[entry(20, 0, 16, 0xffff), entry(20, 0, 8, 0)], &mut image);
    assert_eq!(image.bytes(20, 2).unwrap(), [0x00, 0xff]);
}
