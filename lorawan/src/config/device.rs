/// EUI-64 (8 bytes)
pub type EUI64 = [u8; 8];
/// Device Address
pub type DevAddr = u32;

/// LoRaWAN device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceClass {
    /// Class A: Uplink followed by two receive windows
    A,
    /// Class B: Scheduled receive slots (beaconing)
    B,
    /// Class C: Continuously listening except when transmitting
    C,
}

/// Network activation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activation {
    /// Not activated, OTAA before the first join
    None,
    /// Activation by personalization
    Abp,
    /// Over-the-air activation
    Otaa,
}

/// Activation mode selected by the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActivationMode {
    /// Pre-provisioned session, no join exchange
    Abp,
    /// Join through the radio handshake
    Otaa,
}

/// Receive-error budget handed to the engine after NVM restore, in milliseconds
pub const SYSTEM_MAX_RX_ERROR_MS: u32 = 20;

/// MAC parameters applied after engine initialization and before NVM restore
#[derive(Debug, Clone)]
pub struct MacDefaults {
    /// Join (application) EUI
    pub join_eui: EUI64,
    /// Adaptive data rate enabled
    pub adr: bool,
    /// TX power index
    pub tx_power: u8,
    /// Activation type until NVM says otherwise
    pub activation: Activation,
    /// LoRaWAN certification port enabled
    pub cert_port: bool,
}

impl Default for MacDefaults {
    fn default() -> Self {
        Self {
            join_eui: [0x01; 8],
            adr: true,
            // 14 dBm in RFO mode
            tx_power: 1,
            activation: Activation::Abp,
            cert_port: false,
        }
    }
}
