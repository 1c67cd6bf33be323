use heapless::{Deque, Vec};

use super::EventStatus;

/// Maximum MAC payload size
pub const MAX_PAYLOAD_SIZE: usize = 242;

/// Capacity of the callback queue filled during one engine processing step
pub const EVENT_QUEUE_LEN: usize = 8;

/// Callbacks produced by one engine processing step
pub type EventQueue = Deque<MacEvent, EVENT_QUEUE_LEN>;

/// Number of callbacks an engine step could not queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overflow(pub usize);

/// Uplink request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum McpsKind {
    /// Unconfirmed data
    Unconfirmed,
    /// Confirmed data
    Confirmed,
    /// Proprietary frame
    Proprietary,
    /// Multicast data
    Multicast,
}

/// Management request types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MlmeKind {
    /// Network join
    Join,
    /// Link check
    LinkCheck,
    /// Continuous wave test
    ContinuousWave,
    /// Any request the session does not track
    Other(u8),
}

/// Management confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MlmeConfirm {
    /// Confirmed request
    pub kind: MlmeKind,
    /// Outcome
    pub status: EventStatus,
    /// Link check demodulation margin in dB
    pub margin: u8,
    /// Number of gateways that received the link check
    pub gateways: u8,
}

impl MlmeConfirm {
    /// Confirm without link check data
    pub fn new(kind: MlmeKind, status: EventStatus) -> Self {
        Self {
            kind,
            status,
            margin: 0,
            gateways: 0,
        }
    }
}

/// Downlink indication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downlink {
    /// Reception status
    pub status: EventStatus,
    /// FPort of the frame
    pub port: u8,
    /// Decrypted application payload
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
    /// True if the frame carried application data
    pub rx_data: bool,
    /// The network server has more downlinks and expects an uplink
    pub uplink_pending: bool,
    /// RSSI of the frame
    pub rssi: i16,
}

/// Callback from the engine to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacEvent {
    /// An uplink finished
    McpsConfirm {
        /// Request type of the uplink
        kind: McpsKind,
        /// True if a confirmed uplink was acknowledged
        ack_received: bool,
        /// Outcome
        status: EventStatus,
    },
    /// The engine retransmitted an uplink
    McpsRetransmit,
    /// A downlink was received
    McpsIndication(Downlink),
    /// A management request finished
    MlmeConfirm(MlmeConfirm),
    /// Unsolicited management indication
    MlmeIndication {
        /// Engine indication code
        kind: u8,
        /// Status
        status: EventStatus,
    },
}
