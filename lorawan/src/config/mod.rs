//! Session configuration
//!
//! This module contains the settings the session reads from the application's
//! configuration store:
//! - Device class to keep applied after activation
//! - Retransmission counts for confirmed and unconfirmed uplinks
//! - Output format of received payloads
//! - Region fallback and join behaviour

/// Device identity types and MAC defaults
pub mod device;

pub use device::{Activation, DeviceClass, MacDefaults};

use crate::region::{Region, DEFAULT_REGION};

/// How received payloads are forwarded to the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataFormat {
    /// Forward the bytes as they are
    Raw,
    /// Forward the bytes hex encoded
    Hex,
}

/// Configuration consumed by the session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device class re-applied after every activation
    pub device_class: DeviceClass,
    /// Number of transmissions for confirmed uplinks
    pub confirmed_retransmissions: u8,
    /// Number of transmissions for unconfirmed uplinks
    pub unconfirmed_retransmissions: u8,
    /// Received payload format
    pub data_format: DataFormat,
    /// Region used when NVM holds no valid region
    pub default_region: Region,
    /// Snapshot the default channel mask before an OTAA join and restore it afterwards
    pub restore_chmask_after_join: bool,
    /// LoRaWAN MAC version to use in ABP mode, where no version negotiation happens
    pub abp_mac_version: Option<u32>,
    /// MAC parameters applied before NVM state is restored
    pub mac_defaults: MacDefaults,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device_class: DeviceClass::A,
            confirmed_retransmissions: 8,
            unconfirmed_retransmissions: 1,
            data_format: DataFormat::Raw,
            default_region: DEFAULT_REGION,
            restore_chmask_after_join: false,
            abp_mac_version: None,
            mac_defaults: MacDefaults::default(),
        }
    }
}

impl SessionConfig {
    /// Number of transmissions to request for an uplink
    pub fn retransmissions(&self, confirmed: bool) -> u8 {
        if confirmed {
            self.confirmed_retransmissions
        } else {
            self.unconfirmed_retransmissions
        }
    }
}
