use crate::core::driver::DriverError;

/// Failure to obtain the reader list
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnumerationError {
    #[error("smart card service is not available")]
    NoService,
    #[error("reader list did not fit the negotiated buffer")]
    InsufficientBuffer,
    #[error("unexpected driver failure: {0}")]
    Unexpected(DriverError),
}

impl From<DriverError> for EnumerationError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::NoService => EnumerationError::NoService,
            DriverError::InsufficientBuffer => EnumerationError::InsufficientBuffer,
            other => EnumerationError::Unexpected(other),
        }
    }
}

/// Failure to open a reader session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    #[error("unknown reader")]
    UnknownReader,
    #[error("reader is in use by another application")]
    SharingViolation,
    #[error("no smart card present")]
    NoSmartcard,
    #[error("reader is unavailable")]
    ReaderUnavailable,
    #[error("unexpected driver failure: {0}")]
    Unexpected(DriverError),
}

impl From<DriverError> for ConnectError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::UnknownReader => ConnectError::UnknownReader,
            DriverError::SharingViolation => ConnectError::SharingViolation,
            DriverError::NoSmartcard => ConnectError::NoSmartcard,
            DriverError::ReaderUnavailable => ConnectError::ReaderUnavailable,
            other => ConnectError::Unexpected(other),
        }
    }
}

/// Failure of a single APDU exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmitError {
    #[error("invalid card handle")]
    InvalidHandle,
    #[error("protocol mismatch")]
    ProtoMismatch,
    #[error("card is unpowered")]
    Unpowered,
    #[error("card was removed")]
    Removed,
    #[error("card is unresponsive")]
    Unresponsive,
    #[error("response does not fit the receive buffer")]
    InsufficientBuffer,
    #[error("unexpected driver failure: {0}")]
    Unexpected(DriverError),
}

impl From<DriverError> for TransmitError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::InvalidHandle => TransmitError::InvalidHandle,
            DriverError::ProtoMismatch => TransmitError::ProtoMismatch,
            DriverError::UnpoweredCard => TransmitError::Unpowered,
            DriverError::RemovedCard => TransmitError::Removed,
            DriverError::UnresponsiveCard => TransmitError::Unresponsive,
            DriverError::InsufficientBuffer => TransmitError::InsufficientBuffer,
            other => TransmitError::Unexpected(other),
        }
    }
}

/// Malformed user input for an outbound command
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}
