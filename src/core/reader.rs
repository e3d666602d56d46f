use crate::core::driver::{CardDriver, DriverError};
use crate::core::error::EnumerationError;

/// Display name of one reader slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderDescriptor {
    name: String,
}

impl ReaderDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ReaderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Enumerate the readers known to the resource manager.
///
/// Asks the driver for the required buffer size first, then fills a buffer of
/// exactly that size. A driver report of "no readers" in either phase is an empty
/// list, not an error.
pub fn enumerate<D: CardDriver>(
    driver: &D,
    context: &D::Context,
) -> Result<Vec<ReaderDescriptor>, EnumerationError> {
    let required = match driver.list_readers(context, None) {
        Ok(len) => len,
        Err(DriverError::NoReadersAvailable) => return Ok(Vec::new()),
        Err(e) => {
            log::error!("Failed to get reader list length: {e}");
            return Err(e.into());
        }
    };

    log::debug!("Reader list needs {required} bytes");

    let mut buffer = vec![0u8; required];
    let written = match driver.list_readers(context, Some(&mut buffer)) {
        Ok(len) => len,
        Err(DriverError::NoReadersAvailable) => return Ok(Vec::new()),
        Err(e) => {
            log::error!("Failed to list readers: {e}");
            return Err(e.into());
        }
    };

    let readers = parse_reader_names(&buffer[..written.min(buffer.len())]);
    log::info!("Found {} reader(s)", readers.len());
    Ok(readers)
}

/// Split a NUL-separated multi-string into reader names, in order.
///
/// Blank segments (including the ones produced by the terminating NULs) and repeated
/// names are dropped.
pub fn parse_reader_names(blob: &[u8]) -> Vec<ReaderDescriptor> {
    let mut readers: Vec<ReaderDescriptor> = Vec::new();

    for segment in blob.split(|&b| b == 0) {
        let name = String::from_utf8_lossy(segment);
        if name.trim().is_empty() {
            continue;
        }
        if readers.iter().any(|r| r.name == name) {
            log::debug!("Skipping duplicate reader name: {name}");
            continue;
        }
        readers.push(ReaderDescriptor {
            name: name.into_owned(),
        });
    }

    readers
}
