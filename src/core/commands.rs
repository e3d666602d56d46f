use std::time::Instant;

use crate::core::driver::{CardDriver, DriverError};
use crate::core::error::{InputError, TransmitError};
use crate::core::session::ReaderSession;
use crate::core::transcript::{Direction, Transcript};
use crate::core::utils::{format_hex, parse_hex};

/// Receive buffer size for a single exchange
pub const RECEIVE_CAPACITY: usize = 256;

/// Largest response an extended-length APDU can produce (65536 data bytes + SW1 SW2)
pub const EXTENDED_RECEIVE_CAPACITY: usize = 65_538;

/// Marker that introduces an outbound command on the console
pub const COMMAND_MARKER: char = '<';

/// A parsed, non-empty command APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCommand {
    bytes: Vec<u8>,
}

impl ApduCommand {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Response bytes of a successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub duration_ms: u64,
}

/// Fixed-capacity buffer that only exposes the bytes the driver reported
struct ReceiveBuffer {
    bytes: Vec<u8>,
    used: usize,
}

impl ReceiveBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            used: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn fill_with<F>(&mut self, fill: F) -> Result<(), TransmitError>
    where
        F: FnOnce(&mut [u8]) -> Result<usize, DriverError>,
    {
        let written = fill(self.bytes.as_mut_slice())?;
        if written > self.bytes.len() {
            return Err(TransmitError::InsufficientBuffer);
        }
        self.used = written;
        Ok(())
    }

    fn into_vec(mut self) -> Vec<u8> {
        self.bytes.truncate(self.used);
        self.bytes
    }
}

/// Parse console text into a command APDU.
///
/// One leading `<` marker is stripped if present; whitespace is ignored.
pub fn parse_command(text: &str) -> Result<ApduCommand, InputError> {
    let text = text.trim();
    let text = text.strip_prefix(COMMAND_MARKER).unwrap_or(text);

    let bytes = parse_hex(text)?;
    if bytes.is_empty() {
        return Err(InputError::InvalidHex("command is empty".to_string()));
    }

    Ok(ApduCommand { bytes })
}

/// Sends command APDUs through an open session
#[derive(Debug, Clone)]
pub struct ApduExchanger {
    retry_with_extended_buffer: bool,
}

impl ApduExchanger {
    pub fn new() -> Self {
        Self {
            retry_with_extended_buffer: true,
        }
    }

    /// Surface `InsufficientBuffer` immediately instead of retrying once with a
    /// buffer of `EXTENDED_RECEIVE_CAPACITY` bytes
    pub fn without_retry(mut self) -> Self {
        self.retry_with_extended_buffer = false;
        self
    }

    /// Transmit `command` and return the card's response.
    ///
    /// The outbound frame is recorded before every driver call, including the retry;
    /// the inbound frame only when the exchange succeeds.
    pub fn transmit<D: CardDriver, T: Transcript + ?Sized>(
        &self,
        session: &ReaderSession<'_, D>,
        command: &ApduCommand,
        transcript: &mut T,
    ) -> Result<ApduResponse, TransmitError> {
        let start_time = Instant::now();

        if let Err(e) = transcript.record(Direction::Outbound, command.as_bytes()) {
            log::warn!("Failed to write transcript: {e}");
        }

        log::info!("Transmitting APDU: {}", format_hex(command.as_bytes()));

        let handle = session.handle().ok_or(TransmitError::InvalidHandle)?;
        let driver = session.driver();
        let protocol = session.protocol();

        let mut buffer = ReceiveBuffer::with_capacity(RECEIVE_CAPACITY);
        let mut result =
            buffer.fill_with(|recv| driver.transmit(handle, protocol, command.as_bytes(), recv));

        if result == Err(TransmitError::InsufficientBuffer) && self.retry_with_extended_buffer {
            log::info!(
                "Response exceeds {} bytes, retrying with {} bytes",
                buffer.capacity(),
                EXTENDED_RECEIVE_CAPACITY
            );
            // The card sees the command a second time.
            if let Err(e) = transcript.record(Direction::Outbound, command.as_bytes()) {
                log::warn!("Failed to write transcript: {e}");
            }
            buffer = ReceiveBuffer::with_capacity(EXTENDED_RECEIVE_CAPACITY);
            result =
                buffer.fill_with(|recv| driver.transmit(handle, protocol, command.as_bytes(), recv));
        }

        let duration = start_time.elapsed();

        if let Err(e) = result {
            log::error!("Transmit failed: {e}");
            return Err(e);
        }

        let data = buffer.into_vec();
        log::info!("Received response: {}", format_hex(&data));

        if let Err(e) = transcript.record(Direction::Inbound, &data) {
            log::warn!("Failed to write transcript: {e}");
        }

        Ok(ApduResponse {
            data,
            duration_ms: duration.as_millis() as u64,
        })
    }
}

impl Default for ApduExchanger {
    fn default() -> Self {
        Self::new()
    }
}
