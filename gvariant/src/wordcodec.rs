//! Unaligned little-endian word codec and framing-offset size selection
//! (spec §4.3).
//!
//! # 2.3.6 Framing Offsets (quoted from the GVariant spec)
//!
//! A framing offset is an integer of some predetermined size. The size is
//! always a power of 2. The size is determined from the overall size of
//! the container byte sequence. It is chosen to be just large enough to
//! reference each of the byte boundaries in the container.
//!
//! As examples, a container of size 0 would have framing offsets of size 0
//! (since no bits are required to represent no choice). A container of
//! sizes 1 through 255 would have framing offsets of size 1. A container
//! of sizes 256 through 65535 would have framing offsets of size 2. A
//! container of size 65536 would have framing offsets of size 4.
//!
//! Framing offsets always appear at the end of containers and are
//! unaligned. They are always stored in little-endian byte order.

use std::convert::TryInto;

/// Byte width of a framing offset, as a power-of-two exponent: `k` such
/// that the width is `1 << k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WordSize(pub u8);

impl WordSize {
    pub const W1: WordSize = WordSize(0);
    pub const W2: WordSize = WordSize(1);
    pub const W4: WordSize = WordSize(2);
    pub const W8: WordSize = WordSize(3);

    pub fn bytes(self) -> usize {
        1usize << self.0
    }

    /// The smallest word size whose framing offsets can represent any
    /// byte position up to and including `container_len`.
    pub fn for_container_len(container_len: usize) -> WordSize {
        match container_len {
            0..=0xFF => WordSize::W1,
            0x100..=0xFFFF => WordSize::W2,
            0x1_0000..=0xFFFF_FFFF => WordSize::W4,
            _ => WordSize::W8,
        }
    }
}

/// Read `1 << k` little-endian bytes at the front of `data` into a
/// machine word. `data` must be at least `word.bytes()` long.
pub fn fetch(data: &[u8], word: WordSize) -> u64 {
    let n = word.bytes();
    match n {
        1 => data[0] as u64,
        2 => u16::from_le_bytes(data[..2].try_into().unwrap()) as u64,
        4 => u32::from_le_bytes(data[..4].try_into().unwrap()) as u64,
        8 => u64::from_le_bytes(data[..8].try_into().unwrap()),
        _ => unreachable!("WordSize is always one of 1/2/4/8 bytes"),
    }
}

/// Inverse of [`fetch`]: write `value` as `1 << k` little-endian bytes at
/// the front of `data`. `value` must fit in that many bytes.
pub fn store(data: &mut [u8], word: WordSize, value: u64) {
    let n = word.bytes();
    match n {
        1 => data[0] = value as u8,
        2 => data[..2].copy_from_slice(&(value as u16).to_le_bytes()),
        4 => data[..4].copy_from_slice(&(value as u32).to_le_bytes()),
        8 => data[..8].copy_from_slice(&value.to_le_bytes()),
        _ => unreachable!("WordSize is always one of 1/2/4/8 bytes"),
    }
}

/// Read the `n`th framing offset (0-indexed from the *start* of the
/// framing-offset table) out of a byte slice that is exactly the table.
pub fn read_offset_table_entry(table: &[u8], word: WordSize, n: usize) -> u64 {
    let start = n * word.bytes();
    fetch(&table[start..], word)
}

pub fn write_offset_table_entry(table: &mut [u8], word: WordSize, n: usize, value: u64) {
    let start = n * word.bytes();
    store(&mut table[start..], word, value);
}
