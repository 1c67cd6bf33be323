//! Group trailer checksums
//!
//! A group is trusted when its trailer equals the CRC-32 of everything before the
//! trailer (whole-block). A trailer that instead equals the CRC-32 of the group's
//! key field (narrow-field) marks the block as carrying only that field; the rest
//! must come from the engine's defaults. The region switch uses this to keep the
//! new region, and the factory reset to keep the DevEUI, across a reboot.

use core::ops::Range;

use crate::platform::Crc;

/// Size of the checksum trailer at the end of every group
pub const TRAILER_SIZE: usize = 4;

/// Location of a field inside a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    /// Byte offset from the start of the group
    pub offset: usize,
    /// Length in bytes
    pub len: usize,
}

impl Field {
    /// Field at `offset` spanning `len` bytes
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Byte range of the field
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }

    /// Field bytes of `block`
    pub fn get<'a>(&self, block: &'a [u8]) -> &'a [u8] {
        &block[self.range()]
    }

    /// Overwrite the field in `block`. `value` must be exactly `len` bytes.
    pub fn write(&self, block: &mut [u8], value: &[u8]) {
        block[self.range()].copy_from_slice(value);
    }

    /// Field read as a little-endian `u32`. The field must be four bytes wide.
    pub fn read_u32(&self, block: &[u8]) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.get(block));
        u32::from_le_bytes(bytes)
    }
}

/// Outcome of validating a group read from flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Validity {
    /// The whole group is valid
    Whole,
    /// Only the key field is valid
    Field,
    /// Nothing in the group can be trusted
    Invalid,
}

/// Trailer value of `block`
pub fn trailer(block: &[u8]) -> u32 {
    let mut bytes = [0u8; TRAILER_SIZE];
    bytes.copy_from_slice(&block[block.len() - TRAILER_SIZE..]);
    u32::from_le_bytes(bytes)
}

fn set_trailer(block: &mut [u8], crc: u32) {
    let at = block.len() - TRAILER_SIZE;
    block[at..].copy_from_slice(&crc.to_le_bytes());
}

/// `crc32(block[..len - 4]) == trailer`
pub fn whole_block_ok<C: Crc>(block: &[u8]) -> bool {
    C::crc32(&block[..block.len() - TRAILER_SIZE]) == trailer(block)
}

/// `crc32(field) == trailer`
pub fn narrow_field_ok<C: Crc>(block: &[u8], field: Field) -> bool {
    C::crc32(field.get(block)) == trailer(block)
}

/// Classify a group. Groups too short to hold a trailer are invalid.
pub fn validate<C: Crc>(block: &[u8], field: Option<Field>) -> Validity {
    if block.len() < TRAILER_SIZE {
        return Validity::Invalid;
    }
    if whole_block_ok::<C>(block) {
        return Validity::Whole;
    }
    match field {
        Some(field) if field.range().end <= block.len() - TRAILER_SIZE => {
            if narrow_field_ok::<C>(block, field) {
                Validity::Field
            } else {
                Validity::Invalid
            }
        }
        _ => Validity::Invalid,
    }
}

/// Recompute the whole-block trailer
pub fn seal<C: Crc>(block: &mut [u8]) {
    let crc = C::crc32(&block[..block.len() - TRAILER_SIZE]);
    set_trailer(block, crc);
}

/// Store a narrow-field trailer computed over `field` only
pub fn seal_field<C: Crc>(block: &mut [u8], field: Field) {
    let crc = C::crc32(field.get(block));
    set_trailer(block, crc);
}
