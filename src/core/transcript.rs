use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

use crate::core::utils::format_hex_spaced;

/// Direction of a frame relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn marker(self) -> char {
        match self {
            Direction::Outbound => '<',
            Direction::Inbound => '>',
        }
    }
}

/// Destination for the frames exchanged with the card
#[cfg_attr(test, mockall::automock)]
pub trait Transcript {
    fn record(&mut self, direction: Direction, bytes: &[u8]) -> io::Result<()>;
}

/// Format one transcript line without the timestamp; an empty frame is the bare marker
pub fn format_record(direction: Direction, bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return direction.marker().to_string();
    }
    format!("{} {}", direction.marker(), format_hex_spaced(bytes))
}

/// Appends timestamped frames to a text file
#[derive(Debug)]
pub struct FileTranscript {
    file: File,
}

impl FileTranscript {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::debug!("Transcript file: {}", path.display());
        Ok(Self { file })
    }
}

impl Transcript for FileTranscript {
    fn record(&mut self, direction: Direction, bytes: &[u8]) -> io::Result<()> {
        writeln!(
            self.file,
            "{} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            format_record(direction, bytes)
        )
    }
}

/// Discards every frame
#[derive(Debug, Default)]
pub struct NullTranscript;

impl Transcript for NullTranscript {
    fn record(&mut self, _direction: Direction, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

impl<T: Transcript + ?Sized> Transcript for &mut T {
    fn record(&mut self, direction: Direction, bytes: &[u8]) -> io::Result<()> {
        (**self).record(direction, bytes)
    }
}

impl<T: Transcript + ?Sized> Transcript for Box<T> {
    fn record(&mut self, direction: Direction, bytes: &[u8]) -> io::Result<()> {
        (**self).record(direction, bytes)
    }
}
