use crate::core::driver::{CardDriver, Disposition, Protocol, ShareMode};
use crate::core::error::ConnectError;
use crate::core::reader::ReaderDescriptor;

/// One open connection to a reader.
///
/// The session handle lives from a successful `connect` until `disconnect`, which
/// consumes the session. A session dropped without an explicit disconnect leaves the
/// card as it is and releases the reader.
pub struct ReaderSession<'d, D: CardDriver> {
    driver: &'d D,
    handle: Option<D::Session>,
    protocol: Protocol,
    reader: ReaderDescriptor,
}

impl<'d, D: CardDriver> ReaderSession<'d, D> {
    /// Connect to `reader`, offering `protocols` to the card
    pub fn connect(
        driver: &'d D,
        context: &D::Context,
        reader: &ReaderDescriptor,
        share_mode: ShareMode,
        protocols: &[Protocol],
    ) -> Result<Self, ConnectError> {
        log::info!("Connecting to reader: {reader} ({share_mode:?})");

        let (handle, protocol) = driver
            .connect(context, reader.name(), share_mode, protocols)
            .map_err(|e| {
                log::error!("Connect to {reader} failed: {e}");
                ConnectError::from(e)
            })?;

        log::info!("Successfully connected to reader: {reader}, protocol {protocol}");

        Ok(Self {
            driver,
            handle: Some(handle),
            protocol,
            reader: reader.clone(),
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn reader(&self) -> &ReaderDescriptor {
        &self.reader
    }

    pub fn driver(&self) -> &'d D {
        self.driver
    }

    pub(crate) fn handle(&self) -> Option<&D::Session> {
        self.handle.as_ref()
    }

    /// Close the connection
    pub fn disconnect(mut self, disposition: Disposition) {
        self.release(disposition);
    }

    fn release(&mut self, disposition: Disposition) {
        if let Some(handle) = self.handle.take() {
            match self.driver.disconnect(handle, disposition) {
                Ok(()) => log::info!("Disconnected from reader: {}", self.reader),
                Err(e) => log::warn!("Failed to disconnect cleanly from {}: {e}", self.reader),
            }
        }
    }
}

impl<D: CardDriver> Drop for ReaderSession<'_, D> {
    fn drop(&mut self) {
        self.release(Disposition::LeaveCard);
    }
}
