//! Notifications emitted to the application console

/// Outcome of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinResult {
    /// The device joined the network
    Succeeded,
    /// All attempts failed
    Failed,
}

/// Network events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkEvent {
    /// A confirmed uplink was acknowledged
    Ack,
    /// A confirmed uplink was not acknowledged
    NoAck,
    /// The engine retransmitted an uplink
    Retransmission,
    /// Link check answer
    Answer {
        /// Demodulation margin in dB
        margin: u8,
        /// Number of gateways that received the request
        gateways: u8,
    },
    /// Link check went unanswered
    NoAnswer,
}

/// Received payload, in the configured data format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload<'a> {
    /// To be printed hex encoded
    Hex(&'a [u8]),
    /// To be written as is
    Raw(&'a [u8]),
}

impl<'a> Payload<'a> {
    /// Payload bytes regardless of format
    pub fn bytes(&self) -> &'a [u8] {
        match self {
            Payload::Hex(bytes) | Payload::Raw(bytes) => bytes,
        }
    }
}

/// Notification for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification<'a> {
    /// Join finished
    Join(JoinResult),
    /// Network event
    Network(NetworkEvent),
    /// Continuous wave test ended
    ContinuousWaveEnd,
    /// Downlink payload
    Received {
        /// FPort
        port: u8,
        /// Payload
        payload: Payload<'a>,
    },
}

/// Receiver of session notifications, usually the AT command console
pub trait Notifier {
    /// Deliver one notification
    fn notify(&mut self, notification: Notification<'_>);
}
