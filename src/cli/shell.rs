use std::io::{self, BufRead, Write};

use crate::core::{
    commands::{parse_command, ApduExchanger, COMMAND_MARKER},
    driver::{CardDriver, Disposition, DriverError, Protocol, Scope, ShareMode},
    error::{ConnectError, EnumerationError},
    history::CommandHistory,
    reader::{self, ReaderDescriptor},
    session::ReaderSession,
    transcript::{format_record, Direction, Transcript},
};

/// Protocols offered to the card when connecting
pub const OFFERED_PROTOCOLS: [Protocol; 2] = [Protocol::T0, Protocol::T1];

const CLEAR_SCREEN: &str = "\x1B[2J\x1B[1;1H";

/// Settings the shell applies to the resource manager
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub scope: Scope,
    pub share_mode: ShareMode,
    pub retry_with_extended_buffer: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            scope: Scope::System,
            share_mode: ShareMode::Shared,
            retry_with_extended_buffer: true,
        }
    }
}

/// Failures that end the shell
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("Failed to establish context: {0}")]
    Context(DriverError),
    #[error("Failed to list readers: {0}")]
    Enumeration(#[from] EnumerationError),
    #[error("No smart card readers found.")]
    NoReaders,
    #[error("Invalid selection.")]
    InvalidSelection,
    #[error("Failed to connect to reader: {0}")]
    Connect(#[from] ConnectError),
    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A classified line of console input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Hex text following the `<` marker, trimmed
    Send(&'a str),
    History,
    ClearScreen,
    Reselect,
    Quit,
}

impl<'a> Directive<'a> {
    /// Classify `line` by its prefix. Letter directives ignore case.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(COMMAND_MARKER) {
            return Some(Directive::Send(rest.trim()));
        }

        let lower = line.to_lowercase();
        if lower.starts_with('h') {
            Some(Directive::History)
        } else if lower.starts_with("cls") {
            Some(Directive::ClearScreen)
        } else if lower.starts_with('q') {
            Some(Directive::Quit)
        } else if lower.starts_with('r') {
            Some(Directive::Reselect)
        } else {
            None
        }
    }
}

enum State<'d, D: CardDriver> {
    SelectingReader,
    Connected(ReaderSession<'d, D>),
    Exited,
}

/// Line-oriented console for one run of the utility
pub struct InteractiveShell<'d, D: CardDriver, R, W, T> {
    driver: &'d D,
    input: R,
    output: W,
    transcript: T,
    config: ShellConfig,
    exchanger: ApduExchanger,
    history: CommandHistory,
}

impl<'d, D, R, W, T> InteractiveShell<'d, D, R, W, T>
where
    D: CardDriver,
    R: BufRead,
    W: Write,
    T: Transcript,
{
    pub fn new(driver: &'d D, input: R, output: W, transcript: T, config: ShellConfig) -> Self {
        let exchanger = if config.retry_with_extended_buffer {
            ApduExchanger::new()
        } else {
            ApduExchanger::new().without_retry()
        };

        Self {
            driver,
            input,
            output,
            transcript,
            config,
            exchanger,
            history: CommandHistory::new(),
        }
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    /// Run until the user quits or a setup step fails.
    ///
    /// Fatal errors are reported on the console before being returned. The context
    /// is released on every path once it has been established.
    pub fn run(&mut self) -> Result<(), ShellError> {
        writeln!(self.output, "Card Utility")?;

        let result = match self.driver.establish_context(self.config.scope) {
            Ok(context) => {
                let result = self.run_with_context(&context);
                if let Err(e) = self.driver.release_context(context) {
                    log::warn!("Failed to release context: {e}");
                }
                result
            }
            Err(e) => Err(ShellError::Context(e)),
        };

        if let Err(ref e) = result {
            log::error!("{e}");
            // The console may be the thing that failed.
            let _ = writeln!(self.output, "{e}");
            let _ = self.output.flush();
        }

        result
    }

    fn run_with_context(&mut self, context: &D::Context) -> Result<(), ShellError> {
        let mut state = State::SelectingReader;

        loop {
            state = match state {
                State::SelectingReader => State::Connected(self.select_reader(context)?),
                State::Connected(session) => self.interact(session)?,
                State::Exited => return Ok(()),
            };
        }
    }

    fn select_reader(&mut self, context: &D::Context) -> Result<ReaderSession<'d, D>, ShellError> {
        log::debug!("State: selecting reader");

        let readers = reader::enumerate(self.driver, context)?;

        writeln!(self.output, "Connected Smart Card Readers:")?;
        for (i, reader) in readers.iter().enumerate() {
            writeln!(self.output, "[{i}] {reader}")?;
        }

        if readers.is_empty() {
            return Err(ShellError::NoReaders);
        }

        let selected = self.prompt_selection(&readers)?;

        let session = ReaderSession::connect(
            self.driver,
            context,
            selected,
            self.config.share_mode,
            &OFFERED_PROTOCOLS,
        )?;

        writeln!(self.output, "Connected to reader.")?;
        writeln!(
            self.output,
            "Send APDU Command prefixed by '<'\n\tenter h for history\n\tenter cls to clear console\n\tenter r to select reader\n\tpress q to exit"
        )?;

        Ok(session)
    }

    fn prompt_selection<'r>(
        &mut self,
        readers: &'r [ReaderDescriptor],
    ) -> Result<&'r ReaderDescriptor, ShellError> {
        write!(self.output, "Select a reader by index: ")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ShellError::InvalidSelection);
        }

        let index: usize = line
            .trim()
            .parse()
            .map_err(|_| ShellError::InvalidSelection)?;

        readers.get(index).ok_or(ShellError::InvalidSelection)
    }

    fn interact(&mut self, session: ReaderSession<'d, D>) -> Result<State<'d, D>, ShellError> {
        log::debug!("State: connected to {}", session.reader());

        loop {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                log::info!("End of input, exiting");
                return self.finish(session);
            }

            match Directive::parse(&line) {
                Some(Directive::Send(text)) => self.send(&session, text)?,
                Some(Directive::History) => {
                    writeln!(self.output, "Command History:")?;
                    for entry in self.history.list() {
                        writeln!(self.output, "{} {}", entry.index, entry.raw_text)?;
                    }
                }
                Some(Directive::ClearScreen) => {
                    write!(self.output, "{CLEAR_SCREEN}")?;
                    self.output.flush()?;
                }
                Some(Directive::Reselect) => {
                    session.disconnect(Disposition::LeaveCard);
                    writeln!(self.output, "Disconnected from reader.")?;
                    return Ok(State::SelectingReader);
                }
                Some(Directive::Quit) => return self.finish(session),
                None => log::debug!("Ignoring input: {}", line.trim()),
            }
        }
    }

    fn send(&mut self, session: &ReaderSession<'d, D>, text: &str) -> Result<(), ShellError> {
        let command = match parse_command(text) {
            Ok(command) => command,
            Err(e) => {
                log::warn!("Rejected command '{text}': {e}");
                writeln!(self.output, "Invalid APDU: {e}")?;
                return Ok(());
            }
        };

        self.history.append(text);

        match self
            .exchanger
            .transmit(session, &command, &mut self.transcript)
        {
            Ok(response) => {
                writeln!(
                    self.output,
                    "{}",
                    format_record(Direction::Inbound, &response.data)
                )?;
                log::debug!("Exchange took {}ms", response.duration_ms);
            }
            Err(e) => writeln!(self.output, "Failed to transmit APDU: {e}")?,
        }

        Ok(())
    }

    fn finish(&mut self, session: ReaderSession<'d, D>) -> Result<State<'d, D>, ShellError> {
        session.disconnect(Disposition::LeaveCard);
        writeln!(self.output, "Disconnected from reader.")?;
        self.output.flush()?;
        Ok(State::Exited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_send() {
        assert_eq!(
            Directive::parse("< 00 A4 04 00\n"),
            Some(Directive::Send("00 A4 04 00"))
        );
        assert_eq!(Directive::parse("  <ZZ"), Some(Directive::Send("ZZ")));
        assert_eq!(Directive::parse("<"), Some(Directive::Send("")));
    }

    #[test]
    fn test_directive_meta_case_insensitive() {
        assert_eq!(Directive::parse("h"), Some(Directive::History));
        assert_eq!(Directive::parse("H\r\n"), Some(Directive::History));
        assert_eq!(Directive::parse("CLS"), Some(Directive::ClearScreen));
        assert_eq!(Directive::parse("q"), Some(Directive::Quit));
        assert_eq!(Directive::parse("Quit"), Some(Directive::Quit));
        assert_eq!(Directive::parse("r"), Some(Directive::Reselect));
    }

    #[test]
    fn test_directive_unrecognized() {
        assert_eq!(Directive::parse(""), None);
        assert_eq!(Directive::parse("   "), None);
        assert_eq!(Directive::parse("00A40400"), None);
        assert_eq!(Directive::parse("> 90 00"), None);
        assert_eq!(Directive::parse("cl"), None);
    }

    #[test]
    fn test_shell_error_messages() {
        assert_eq!(
            ShellError::NoReaders.to_string(),
            "No smart card readers found."
        );
        assert_eq!(ShellError::InvalidSelection.to_string(), "Invalid selection.");
        assert_eq!(
            ShellError::Connect(ConnectError::NoSmartcard).to_string(),
            "Failed to connect to reader: no smart card present"
        );
    }

    #[test]
    fn test_default_config() {
        let config = ShellConfig::default();
        assert_eq!(config.scope, Scope::System);
        assert_eq!(config.share_mode, ShareMode::Shared);
        assert!(config.retry_with_extended_buffer);
    }
}
