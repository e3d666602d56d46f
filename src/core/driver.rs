use std::ffi::CString;

/// Scope of a resource manager context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    User,
    Terminal,
    System,
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Scope::User),
            "terminal" => Ok(Scope::Terminal),
            "system" => Ok(Scope::System),
            _ => Err(format!("Invalid scope: {s}")),
        }
    }
}

impl From<Scope> for pcsc::Scope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::User => pcsc::Scope::User,
            Scope::Terminal => pcsc::Scope::Terminal,
            Scope::System => pcsc::Scope::System,
        }
    }
}

/// Whether a connection is shared with other processes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    Shared,
    Exclusive,
    Direct,
}

impl std::str::FromStr for ShareMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(ShareMode::Shared),
            "exclusive" => Ok(ShareMode::Exclusive),
            "direct" => Ok(ShareMode::Direct),
            _ => Err(format!("Invalid share mode: {s}")),
        }
    }
}

impl From<ShareMode> for pcsc::ShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Shared => pcsc::ShareMode::Shared,
            ShareMode::Exclusive => pcsc::ShareMode::Exclusive,
            ShareMode::Direct => pcsc::ShareMode::Direct,
        }
    }
}

/// Transmission protocol negotiated with the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    T0,
    T1,
    /// Raw or undefined
    Raw,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::T0 => write!(f, "T=0"),
            Protocol::T1 => write!(f, "T=1"),
            Protocol::Raw => write!(f, "RAW"),
        }
    }
}

/// Action taken on the card when disconnecting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    #[default]
    LeaveCard,
    ResetCard,
    UnpowerCard,
    EjectCard,
}

impl From<Disposition> for pcsc::Disposition {
    fn from(disposition: Disposition) -> Self {
        match disposition {
            Disposition::LeaveCard => pcsc::Disposition::LeaveCard,
            Disposition::ResetCard => pcsc::Disposition::ResetCard,
            Disposition::UnpowerCard => pcsc::Disposition::UnpowerCard,
            Disposition::EjectCard => pcsc::Disposition::EjectCard,
        }
    }
}

/// Status reported by the resource manager for a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("smart card resource manager is not running")]
    NoService,
    #[error("data buffer is too small for the result")]
    InsufficientBuffer,
    #[error("no smart card readers are available")]
    NoReadersAvailable,
    #[error("reader name is not recognized")]
    UnknownReader,
    #[error("card is in use by another connection")]
    SharingViolation,
    #[error("no smart card in the reader")]
    NoSmartcard,
    #[error("reader is unavailable")]
    ReaderUnavailable,
    #[error("invalid card handle")]
    InvalidHandle,
    #[error("requested protocol is not in use by the card")]
    ProtoMismatch,
    #[error("card is unpowered")]
    UnpoweredCard,
    #[error("card has been removed")]
    RemovedCard,
    #[error("card is not responding to reset")]
    UnresponsiveCard,
    #[error("driver status 0x{0:08X}")]
    Other(u32),
}

impl From<pcsc::Error> for DriverError {
    fn from(err: pcsc::Error) -> Self {
        match err {
            pcsc::Error::NoService | pcsc::Error::ServiceStopped => DriverError::NoService,
            pcsc::Error::InsufficientBuffer => DriverError::InsufficientBuffer,
            pcsc::Error::NoReadersAvailable => DriverError::NoReadersAvailable,
            pcsc::Error::UnknownReader => DriverError::UnknownReader,
            pcsc::Error::SharingViolation => DriverError::SharingViolation,
            pcsc::Error::NoSmartcard => DriverError::NoSmartcard,
            pcsc::Error::ReaderUnavailable => DriverError::ReaderUnavailable,
            pcsc::Error::InvalidHandle => DriverError::InvalidHandle,
            pcsc::Error::ProtoMismatch => DriverError::ProtoMismatch,
            pcsc::Error::UnpoweredCard => DriverError::UnpoweredCard,
            pcsc::Error::RemovedCard => DriverError::RemovedCard,
            pcsc::Error::UnresponsiveCard => DriverError::UnresponsiveCard,
            other => DriverError::Other(other as u32),
        }
    }
}

/// Smart card resource manager operations used by the shell.
///
/// The context and session handles are owned values: releasing a context or
/// disconnecting a session consumes the handle, so neither can be used afterwards.
pub trait CardDriver {
    type Context;
    type Session;

    fn establish_context(&self, scope: Scope) -> Result<Self::Context, DriverError>;

    fn release_context(&self, context: Self::Context) -> Result<(), DriverError>;

    /// With no destination, returns the buffer size needed for the reader list.
    /// With a destination, fills it with NUL-separated, double-NUL-terminated reader
    /// names and returns the number of bytes written.
    fn list_readers(
        &self,
        context: &Self::Context,
        destination: Option<&mut [u8]>,
    ) -> Result<usize, DriverError>;

    fn connect(
        &self,
        context: &Self::Context,
        reader: &str,
        share_mode: ShareMode,
        protocols: &[Protocol],
    ) -> Result<(Self::Session, Protocol), DriverError>;

    /// Sends `command` and writes the card's answer into `response`, returning the
    /// number of bytes written.
    fn transmit(
        &self,
        session: &Self::Session,
        protocol: Protocol,
        command: &[u8],
        response: &mut [u8],
    ) -> Result<usize, DriverError>;

    fn disconnect(&self, session: Self::Session, disposition: Disposition)
        -> Result<(), DriverError>;
}

/// `CardDriver` backed by the system PC/SC library
#[derive(Debug, Default, Clone, Copy)]
pub struct PcscDriver;

impl PcscDriver {
    pub fn new() -> Self {
        Self
    }
}

impl CardDriver for PcscDriver {
    type Context = pcsc::Context;
    type Session = pcsc::Card;

    fn establish_context(&self, scope: Scope) -> Result<pcsc::Context, DriverError> {
        log::debug!("Establishing PCSC context ({scope:?})");
        Ok(pcsc::Context::establish(scope.into())?)
    }

    fn release_context(&self, context: pcsc::Context) -> Result<(), DriverError> {
        context.release().map_err(|(_, e)| DriverError::from(e))
    }

    fn list_readers(
        &self,
        context: &pcsc::Context,
        destination: Option<&mut [u8]>,
    ) -> Result<usize, DriverError> {
        match destination {
            None => Ok(context.list_readers_len()?),
            Some(buffer) => {
                let names = context.list_readers(buffer)?;
                // Each name is followed by its NUL, and the list by one more.
                Ok(names.map(|name| name.to_bytes().len() + 1).sum::<usize>() + 1)
            }
        }
    }

    fn connect(
        &self,
        context: &pcsc::Context,
        reader: &str,
        share_mode: ShareMode,
        protocols: &[Protocol],
    ) -> Result<(pcsc::Card, Protocol), DriverError> {
        let reader_cstr = CString::new(reader).map_err(|_| DriverError::UnknownReader)?;

        let mask = protocols
            .iter()
            .fold(pcsc::Protocols::empty(), |mask, protocol| match protocol {
                Protocol::T0 => mask | pcsc::Protocols::T0,
                Protocol::T1 => mask | pcsc::Protocols::T1,
                Protocol::Raw => mask | pcsc::Protocols::RAW,
            });

        let card = context.connect(&reader_cstr, share_mode.into(), mask)?;

        let active = match card.status2_owned() {
            Ok(status) => match status.protocol2() {
                Some(pcsc::Protocol::T0) => Protocol::T0,
                Some(pcsc::Protocol::T1) => Protocol::T1,
                _ => Protocol::Raw,
            },
            Err(e) => {
                log::warn!("Could not query active protocol: {e}");
                Protocol::Raw
            }
        };

        Ok((card, active))
    }

    fn transmit(
        &self,
        session: &pcsc::Card,
        _protocol: Protocol,
        command: &[u8],
        response: &mut [u8],
    ) -> Result<usize, DriverError> {
        // The card handle already carries the active protocol's PCI.
        let received = session.transmit(command, response)?;
        Ok(received.len())
    }

    fn disconnect(&self, session: pcsc::Card, disposition: Disposition) -> Result<(), DriverError> {
        session
            .disconnect(disposition.into())
            .map_err(|(_, e)| DriverError::from(e))
    }
}
