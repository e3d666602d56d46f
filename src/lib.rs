/// Card Utility - interactive APDU shell for PC/SC smart card readers
///
/// The core talks to the resource manager only through the `CardDriver` trait, so
/// the whole session flow can run against a test double.
pub mod cli;
pub mod core;

// Re-export commonly used types
pub use crate::cli::shell::{Directive, InteractiveShell, ShellConfig, ShellError};
pub use crate::core::{
    commands::{parse_command, ApduCommand, ApduExchanger, ApduResponse},
    driver::{CardDriver, Disposition, DriverError, PcscDriver, Protocol, Scope, ShareMode},
    history::{CommandHistory, HistoryEntry},
    reader::{enumerate, parse_reader_names, ReaderDescriptor},
    session::ReaderSession,
    transcript::{Direction, FileTranscript, NullTranscript, Transcript},
    utils::{format_hex, format_hex_spaced, parse_hex},
};
