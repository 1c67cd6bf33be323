//! MAC engine adapter
//!
//! The LoRaWAN MAC itself (channel plans, ADR, duty cycle, frame crypto) lives in
//! an external engine. This module defines the narrow surface the session uses:
//! - Typed parameter access for the handful of values the session manages
//! - Join, link check, continuous wave and uplink requests
//! - Access to the engine's NVM contexts
//! - The callbacks the engine reports back, see [`events`]

/// Engine callbacks
pub mod events;

pub use events::{
    Downlink, EventQueue, MacEvent, McpsKind, MlmeConfirm, MlmeKind, Overflow, EVENT_QUEUE_LEN,
    MAX_PAYLOAD_SIZE,
};

use crate::config::device::{Activation, DevAddr, DeviceClass, MacDefaults, EUI64};
use crate::nvm::NvmState;
use crate::radio::Radio;
use crate::region::{ChannelMask, Region};
use crate::signals::Signals;

/// Immediate status of a rejected engine request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MacStatus {
    /// Service is busy
    Busy,
    /// Service unknown
    ServiceUnknown,
    /// A parameter is invalid
    ParameterInvalid,
    /// Frequency invalid
    FrequencyInvalid,
    /// Data rate invalid
    DatarateInvalid,
    /// Frequency and data rate invalid
    FreqAndDrInvalid,
    /// The device has not joined a network
    NoNetworkJoined,
    /// Payload length error
    LengthError,
    /// Region not supported
    RegionNotSupported,
    /// Application data was skipped to send MAC commands
    SkippedAppData,
    /// Duty cycle restriction
    DutyCycleRestricted,
    /// No channel found
    NoChannelFound,
    /// No free channel found
    NoFreeChannelFound,
    /// Busy because of the beacon reserved time
    BusyBeaconReservedTime,
    /// Busy because of a ping slot window
    BusyPingSlotWindowTime,
    /// Busy because of an uplink collision
    BusyUplinkCollision,
    /// Crypto error
    CryptoError,
    /// Frame counter handler error
    FCntHandlerError,
    /// MAC command error
    MacCommandError,
    /// Class B error
    ClassBError,
    /// Confirm queue error
    ConfirmQueueError,
    /// Multicast group undefined
    McGroupUndefined,
    /// Unknown error
    Error,
}

/// Status reported in engine confirms and indications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventStatus {
    /// Operation completed
    Ok,
    /// Generic error
    Error,
    /// Transmission timed out
    TxTimeout,
    /// RX1 window timed out
    Rx1Timeout,
    /// RX2 window timed out
    Rx2Timeout,
    /// Error in RX1
    Rx1Error,
    /// Error in RX2
    Rx2Error,
    /// Join failed
    JoinFail,
    /// Downlink frame counter repeated
    DownlinkRepeated,
    /// Payload does not fit the data rate
    TxDrPayloadSizeError,
    /// Address mismatch
    AddressFail,
    /// MIC check failed
    MicFail,
}

/// Data rate index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataRate(pub u8);

impl DataRate {
    /// DR0, the slowest data rate of every region
    pub const DR0: Self = Self(0);
}

/// Join request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequest {
    /// Activation to perform
    pub activation: Activation,
    /// Data rate of the join request
    pub data_rate: DataRate,
}

/// Uplink request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uplink<'a> {
    /// FPort, 0 for MAC-command-only frames
    pub port: u8,
    /// Application payload
    pub payload: &'a [u8],
    /// Request an acknowledgement
    pub confirmed: bool,
    /// Data rate to request
    pub data_rate: DataRate,
    /// Number of transmissions of the frame. `None` keeps the engine's current setting.
    pub retransmissions: Option<u8>,
}

/// Continuous wave test parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuousWave {
    /// Duration in seconds
    pub timeout_s: u16,
    /// Carrier frequency in Hz
    pub frequency: u32,
    /// TX power in dBm
    pub power: i8,
}

/// The MAC engine driven by the session
pub trait MacEngine {
    /// Initialize the engine for `region`
    fn init(&mut self, region: Region) -> Result<(), MacStatus>;

    /// Stop the MAC and the radio
    fn deinit(&mut self) -> Result<(), MacStatus>;

    /// True if `region` is compiled into the engine
    fn is_region_active(&self, region: Region) -> bool;

    /// True while a transaction is in progress and NVM contexts may be half updated
    fn is_busy(&self) -> bool;

    /// Run the engine's processing step.
    ///
    /// NVM groups changed during the step are marked on `signals` directly, a
    /// dirty bit never waits in `events`. Callbacks are pushed to `events` and
    /// dispatched by the session right after. Confirms must always fit: when
    /// the queue is full the engine drops indications first and reports every
    /// dropped callback in the [`Overflow`].
    fn process(&mut self, events: &mut EventQueue, signals: &Signals) -> Result<(), Overflow>;

    /// Radio with a deferred interrupt handler, if any
    fn radio(&mut self) -> Option<&mut dyn Radio> {
        None
    }

    /// Live NVM contexts
    fn nvm(&self) -> &NvmState;

    /// Live NVM contexts, mutable
    fn nvm_mut(&mut self) -> &mut NvmState;

    /// Restore all contexts at once. Groups failing their checksum fall back to defaults.
    fn restore_nvm(&mut self, state: &NvmState) -> Result<(), MacStatus>;

    /// Reset the `Crypto` context to its defaults
    fn reset_crypto(&mut self);

    /// Apply firmware defaults
    fn apply_defaults(&mut self, defaults: &MacDefaults) -> Result<(), MacStatus>;

    /// Receive-error budget in milliseconds
    fn set_max_rx_error(&mut self, ms: u32) -> Result<(), MacStatus>;

    /// Current device class
    fn device_class(&self) -> Result<DeviceClass, MacStatus>;

    /// Switch device class
    fn set_device_class(&mut self, class: DeviceClass) -> Result<(), MacStatus>;

    /// Current activation
    fn activation(&self) -> Activation;

    /// Set the activation type
    fn set_activation(&mut self, activation: Activation) -> Result<(), MacStatus>;

    /// LoRaWAN version to use in ABP mode
    fn set_abp_version(&mut self, version: u32) -> Result<(), MacStatus>;

    /// Default channel mask
    fn channels_default_mask(&self) -> ChannelMask;

    /// Active channel mask
    fn channels_mask(&self) -> ChannelMask;

    /// Replace the default channel mask
    fn set_channels_default_mask(&mut self, mask: &ChannelMask) -> Result<(), MacStatus>;

    /// Replace the active channel mask
    fn set_channels_mask(&mut self, mask: &ChannelMask) -> Result<(), MacStatus>;

    /// Data rate uplinks are sent with
    fn data_rate(&self) -> DataRate;

    /// Device EUI
    fn dev_eui(&self) -> EUI64;

    /// Set the device EUI
    fn set_dev_eui(&mut self, dev_eui: EUI64) -> Result<(), MacStatus>;

    /// Device address
    fn dev_addr(&self) -> DevAddr;

    /// Set the device address
    fn set_dev_addr(&mut self, dev_addr: DevAddr) -> Result<(), MacStatus>;

    /// Store a max EIRP in the current and default MAC parameters of `MacGroup2`
    fn set_max_eirp(&mut self, eirp: u8);

    /// Store uplink and downlink dwell time limits in `MacGroup2`
    fn set_dwell(&mut self, uplink: bool, downlink: bool);

    /// Submit a join request
    fn join(&mut self, request: JoinRequest) -> Result<(), MacStatus>;

    /// Queue a link check request for the next uplink
    fn link_check(&mut self) -> Result<(), MacStatus>;

    /// Start a continuous wave transmission
    fn continuous_wave(&mut self, cw: ContinuousWave) -> Result<(), MacStatus>;

    /// Submit an uplink
    fn send(&mut self, uplink: &Uplink<'_>) -> Result<(), MacStatus>;

    /// Check whether a payload of `len` bytes can be sent with the pending MAC commands
    fn query_tx_possible(&mut self, len: usize) -> Result<(), MacStatus>;
}

/// Re-apply the configured device class. The engine switches to class A during
/// any activation, so this runs after every join.
pub fn sync_device_class<E: MacEngine>(engine: &mut E, class: DeviceClass) -> Result<(), MacStatus> {
    if engine.device_class()? == class {
        return Ok(());
    }
    engine.set_device_class(class)
}
