//! Regional parameters
//!
//! Region identifiers as understood by the MAC engine, and the region switch
//! controller that performs the partial factory reset when the region changes.

/// Region switch controller
pub mod switch;

pub use switch::{set_region, RegionChange};

use strum::{EnumCount, EnumIter, EnumString, FromRepr, IntoStaticStr};

/// Number of 16-bit words in the largest channel mask any region uses
pub const CHANNEL_MASK_WORDS: usize = 6;

/// Channel mask as stored by the engine. Regions with fewer channels use the first word(s).
pub type ChannelMask = [u16; CHANNEL_MASK_WORDS];

/// Region used when none has been persisted
pub const DEFAULT_REGION: Region = Region::EU868;

/// LoRaWAN regional parameter sets
///
/// The discriminants are the engine's region identifiers, which is also what the
/// region field of `MacGroup2` stores.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount, EnumString, IntoStaticStr, FromRepr,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Region {
    /// Asia 923 MHz
    AS923 = 0,
    /// Australia 915 MHz
    AU915 = 1,
    /// China 470 MHz
    CN470 = 2,
    /// China 779 MHz
    CN779 = 3,
    /// Europe 433 MHz
    EU433 = 4,
    /// Europe 868 MHz
    EU868 = 5,
    /// Korea 920 MHz
    KR920 = 6,
    /// India 865 MHz
    IN865 = 7,
    /// United States 915 MHz
    US915 = 8,
    /// Russia 864 MHz
    RU864 = 9,
}

impl Region {
    /// Look up a region by its engine identifier
    pub fn from_id(id: u32) -> Option<Self> {
        u8::try_from(id).ok().and_then(Self::from_repr)
    }

    /// Engine identifier of the region
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Name of the region, e.g. `"EU868"`
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Number of channel mask words used by this region
    pub fn channel_mask_len(self) -> usize {
        match self {
            Region::CN470 | Region::US915 | Region::AU915 => CHANNEL_MASK_WORDS,
            _ => 1,
        }
    }

    /// Size of the region's channel list
    pub fn max_channels(self) -> usize {
        match self {
            Region::CN470 => 96,
            Region::US915 | Region::AU915 => 72,
            _ => 16,
        }
    }
}

/// Channel plan summary of the running engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelList {
    /// Number of channels the region defines
    pub length: usize,
    /// Number of mask words in use
    pub mask_len: usize,
    /// Active channel mask
    pub mask: ChannelMask,
    /// Default channel mask
    pub default_mask: ChannelMask,
}
