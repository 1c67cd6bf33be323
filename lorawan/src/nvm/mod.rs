//! Non-volatile MAC state
//!
//! The engine keeps its persistent state in seven independent groups. Each group
//! is a fixed-size raw block whose last four bytes are a little-endian CRC-32
//! trailer. This module contains:
//! - The group identifiers and their on-flash layout
//! - The dirty-flag bitmask used to track groups that need a write
//! - The whole-block/narrow-field checksum rules
//! - The persistence manager that restores and incrementally flushes groups

/// Checksum rules for group trailers
pub mod crc;

/// Restore and incremental flush
pub mod persistence;

pub use crc::{Field, Validity};
pub use persistence::{Flush, Persistence, Restored};

use core::ops::{BitOr, BitOrAssign};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Size of the `Crypto` group in bytes
pub const CRYPTO_SIZE: usize = 40;
/// Size of the `MacGroup1` group in bytes
pub const MAC_GROUP1_SIZE: usize = 56;
/// Size of the `MacGroup2` group in bytes
pub const MAC_GROUP2_SIZE: usize = 408;
/// Size of the `SecureElement` group in bytes
pub const SECURE_ELEMENT_SIZE: usize = 160;
/// Size of the `RegionGroup1` group in bytes
pub const REGION_GROUP1_SIZE: usize = 24;
/// Size of the `RegionGroup2` group in bytes
pub const REGION_GROUP2_SIZE: usize = 1136;
/// Size of the `ClassB` group in bytes
pub const CLASS_B_SIZE: usize = 32;

/// DevNonce inside the `Crypto` group
pub const DEV_NONCE_FIELD: Field = Field::new(4, 2);
/// DevEUI inside the `SecureElement` group
pub const DEV_EUI_FIELD: Field = Field::new(0, 8);
/// Region identifier inside `MacGroup2`
pub const REGION_FIELD: Field = Field::new(0, 4);

/// NVM state groups, in flush priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum NvmGroup {
    /// Security layer state (nonces, frame counters)
    Crypto = 0,
    /// Frequently changing MAC state
    MacGroup1 = 1,
    /// MAC parameters, including the region
    MacGroup2 = 2,
    /// Keys and EUIs
    SecureElement = 3,
    /// Frequently changing regional state
    RegionGroup1 = 4,
    /// Regional channel plan
    RegionGroup2 = 5,
    /// Class B beacon and ping slot state
    ClassB = 6,
}

impl NvmGroup {
    /// Dirty flag of this group
    pub const fn flag(self) -> GroupFlags {
        GroupFlags(1 << self as u8)
    }

    /// Size of the group including its trailer
    pub const fn size(self) -> usize {
        match self {
            NvmGroup::Crypto => CRYPTO_SIZE,
            NvmGroup::MacGroup1 => MAC_GROUP1_SIZE,
            NvmGroup::MacGroup2 => MAC_GROUP2_SIZE,
            NvmGroup::SecureElement => SECURE_ELEMENT_SIZE,
            NvmGroup::RegionGroup1 => REGION_GROUP1_SIZE,
            NvmGroup::RegionGroup2 => REGION_GROUP2_SIZE,
            NvmGroup::ClassB => CLASS_B_SIZE,
        }
    }

    /// Field that may carry a narrow-field checksum. Only the region and the
    /// DevEUI survive on their own, every other group is valid as a whole or not at all.
    pub const fn key_field(self) -> Option<Field> {
        match self {
            NvmGroup::MacGroup2 => Some(REGION_FIELD),
            NvmGroup::SecureElement => Some(DEV_EUI_FIELD),
            _ => None,
        }
    }
}

/// Set of NVM groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GroupFlags(u8);

impl GroupFlags {
    /// No group
    pub const NONE: Self = Self(0);
    /// `Crypto`
    pub const CRYPTO: Self = NvmGroup::Crypto.flag();
    /// `MacGroup1`
    pub const MAC_GROUP1: Self = NvmGroup::MacGroup1.flag();
    /// `MacGroup2`
    pub const MAC_GROUP2: Self = NvmGroup::MacGroup2.flag();
    /// `SecureElement`
    pub const SECURE_ELEMENT: Self = NvmGroup::SecureElement.flag();
    /// `RegionGroup1`
    pub const REGION_GROUP1: Self = NvmGroup::RegionGroup1.flag();
    /// `RegionGroup2`
    pub const REGION_GROUP2: Self = NvmGroup::RegionGroup2.flag();
    /// `ClassB`
    pub const CLASS_B: Self = NvmGroup::ClassB.flag();
    /// All seven groups
    pub const ALL: Self = Self((1 << NvmGroup::COUNT) - 1);

    /// Build from the engine's raw notification bits. Unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if no group is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every group in `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// This set without the groups in `other`
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Groups in the set, in flush priority order
    pub fn iter(self) -> impl Iterator<Item = NvmGroup> {
        NvmGroup::iter().filter(move |group| self.contains(group.flag()))
    }
}

impl BitOr for GroupFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for GroupFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Raw group bytes of fixed size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<const N: usize>(pub [u8; N]);

impl<const N: usize> Block<N> {
    /// All-zero block
    pub const fn zeroed() -> Self {
        Self([0; N])
    }
}

/// The engine's complete persistent state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmState {
    /// `Crypto` group
    pub crypto: Block<CRYPTO_SIZE>,
    /// `MacGroup1` group
    pub mac_group1: Block<MAC_GROUP1_SIZE>,
    /// `MacGroup2` group
    pub mac_group2: Block<MAC_GROUP2_SIZE>,
    /// `SecureElement` group
    pub secure_element: Block<SECURE_ELEMENT_SIZE>,
    /// `RegionGroup1` group
    pub region_group1: Block<REGION_GROUP1_SIZE>,
    /// `RegionGroup2` group
    pub region_group2: Block<REGION_GROUP2_SIZE>,
    /// `ClassB` group
    pub class_b: Block<CLASS_B_SIZE>,
}

impl Default for NvmState {
    fn default() -> Self {
        Self::new()
    }
}

impl NvmState {
    /// All groups zeroed
    pub const fn new() -> Self {
        Self {
            crypto: Block::zeroed(),
            mac_group1: Block::zeroed(),
            mac_group2: Block::zeroed(),
            secure_element: Block::zeroed(),
            region_group1: Block::zeroed(),
            region_group2: Block::zeroed(),
            class_b: Block::zeroed(),
        }
    }

    /// Bytes of one group
    pub fn group(&self, group: NvmGroup) -> &[u8] {
        match group {
            NvmGroup::Crypto => &self.crypto.0,
            NvmGroup::MacGroup1 => &self.mac_group1.0,
            NvmGroup::MacGroup2 => &self.mac_group2.0,
            NvmGroup::SecureElement => &self.secure_element.0,
            NvmGroup::RegionGroup1 => &self.region_group1.0,
            NvmGroup::RegionGroup2 => &self.region_group2.0,
            NvmGroup::ClassB => &self.class_b.0,
        }
    }

    /// Mutable bytes of one group
    pub fn group_mut(&mut self, group: NvmGroup) -> &mut [u8] {
        match group {
            NvmGroup::Crypto => &mut self.crypto.0,
            NvmGroup::MacGroup1 => &mut self.mac_group1.0,
            NvmGroup::MacGroup2 => &mut self.mac_group2.0,
            NvmGroup::SecureElement => &mut self.secure_element.0,
            NvmGroup::RegionGroup1 => &mut self.region_group1.0,
            NvmGroup::RegionGroup2 => &mut self.region_group2.0,
            NvmGroup::ClassB => &mut self.class_b.0,
        }
    }

    /// Region identifier stored in `MacGroup2`
    pub fn region_id(&self) -> u32 {
        REGION_FIELD.read_u32(&self.mac_group2.0)
    }

    /// Store a region identifier in `MacGroup2`. The trailer is left untouched.
    pub fn set_region_id(&mut self, id: u32) {
        REGION_FIELD.write(&mut self.mac_group2.0, &id.to_le_bytes());
    }

    /// DevNonce stored in the `Crypto` group
    pub fn dev_nonce(&self) -> u16 {
        let bytes = DEV_NONCE_FIELD.get(&self.crypto.0);
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    /// Store a DevNonce in the `Crypto` group. The trailer is left untouched.
    pub fn set_dev_nonce(&mut self, nonce: u16) {
        DEV_NONCE_FIELD.write(&mut self.crypto.0, &nonce.to_le_bytes());
    }
}
