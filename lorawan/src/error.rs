use thiserror::Error;

use crate::engine::MacStatus;

/// Errors returned by session operations.
///
/// The first four variants are the conditions this layer checks itself. Any other
/// rejection from the MAC engine is carried unchanged in [`Error::Engine`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Bad call arguments
    #[error("invalid parameter")]
    InvalidParameter,

    /// A conflicting operation, e.g. a join, is already in progress
    #[error("busy")]
    Busy,

    /// The requested region is not compiled into the engine
    #[error("region not supported")]
    RegionNotSupported,

    /// The payload does not fit, usually because of pending MAC commands
    #[error("length error")]
    LengthError,

    /// Engine-internal failure, reported verbatim
    #[error("engine error: {0:?}")]
    Engine(MacStatus),
}

impl From<MacStatus> for Error {
    fn from(status: MacStatus) -> Self {
        match status {
            MacStatus::ParameterInvalid => Error::InvalidParameter,
            MacStatus::Busy => Error::Busy,
            MacStatus::RegionNotSupported => Error::RegionNotSupported,
            MacStatus::LengthError => Error::LengthError,
            other => Error::Engine(other),
        }
    }
}
