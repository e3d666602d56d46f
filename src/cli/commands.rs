use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::shell::{InteractiveShell, ShellConfig};
use crate::core::{
    driver::{PcscDriver, Scope, ShareMode},
    transcript::{FileTranscript, NullTranscript, Transcript},
};

#[derive(Parser, Debug)]
#[command(name = "card-utility")]
#[command(about = "Interactive shell for sending APDUs to a smart card over PC/SC")]
#[command(version)]
pub struct Cli {
    /// File that receives a timestamped transcript of every frame
    #[arg(short, long, default_value = "commandlog.txt")]
    pub log_file: PathBuf,

    /// Do not write a transcript
    #[arg(long)]
    pub no_log: bool,

    /// Resource manager context scope (user, terminal, system)
    #[arg(short, long, default_value = "system")]
    pub scope: Scope,

    /// Connection share mode (shared, exclusive, direct)
    #[arg(short, long, default_value = "shared")]
    pub mode: ShareMode,

    /// Write the command history as JSON to this file on exit
    #[arg(long)]
    pub history_out: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else if self.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        }
    }

    fn shell_config(&self) -> ShellConfig {
        ShellConfig {
            scope: self.scope,
            share_mode: self.mode,
            ..ShellConfig::default()
        }
    }

    fn open_transcript(&self) -> Result<Box<dyn Transcript>> {
        if self.no_log {
            return Ok(Box::new(NullTranscript));
        }
        let transcript = FileTranscript::open(&self.log_file).with_context(|| {
            format!("Failed to open transcript file: {}", self.log_file.display())
        })?;
        Ok(Box::new(transcript))
    }
}

pub fn run_cli() -> Result<ExitCode> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level())
        .init();

    run(&cli)
}

/// Run the shell against the system PC/SC service on stdin/stdout
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let driver = PcscDriver::new();
    let transcript = cli.open_transcript()?;

    let stdin = io::stdin();
    let stdout = io::stdout();

    let mut shell = InteractiveShell::new(
        &driver,
        stdin.lock(),
        stdout.lock(),
        transcript,
        cli.shell_config(),
    );

    if let Err(e) = shell.run() {
        log::debug!("Shell terminated: {e:?}");
        return Ok(ExitCode::FAILURE);
    }

    if let Some(path) = &cli.history_out {
        let json = shell.history().export_json()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write history file: {}", path.display()))?;
        log::info!("Wrote {} history entries to {}", shell.history().len(), path.display());
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["card-utility"]).unwrap();
        assert_eq!(cli.log_file, PathBuf::from("commandlog.txt"));
        assert!(!cli.no_log);
        assert_eq!(cli.scope, Scope::System);
        assert_eq!(cli.mode, ShareMode::Shared);
        assert!(cli.history_out.is_none());
        assert_eq!(cli.log_level(), log::LevelFilter::Warn);
    }

    #[test]
    fn test_cli_options() {
        let cli = Cli::try_parse_from([
            "card-utility",
            "--log-file",
            "/tmp/apdu.log",
            "--scope",
            "user",
            "-m",
            "exclusive",
            "--history-out",
            "history.json",
            "-d",
        ])
        .unwrap();

        assert_eq!(cli.log_file, PathBuf::from("/tmp/apdu.log"));
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);

        let config = cli.shell_config();
        assert_eq!(config.scope, Scope::User);
        assert_eq!(config.share_mode, ShareMode::Exclusive);
        assert!(config.retry_with_extended_buffer);
    }

    #[test]
    fn test_cli_direct_mode() {
        let cli = Cli::try_parse_from(["card-utility", "--mode", "direct"]).unwrap();
        assert_eq!(cli.shell_config().share_mode, ShareMode::Direct);
    }

    #[test]
    fn test_help_lists_every_share_mode() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("(shared, exclusive, direct)"));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["card-utility", "--mode", "sometimes"]).is_err());
        assert!(Cli::try_parse_from(["card-utility", "--scope", "planet"]).is_err());
    }

    #[test]
    fn test_open_transcript_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let cli = Cli::try_parse_from(["card-utility", "-l", path.to_str().unwrap()]).unwrap();

        cli.open_transcript().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_no_log_skips_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let cli = Cli::try_parse_from(["card-utility", "--no-log", "-l", path.to_str().unwrap()])
            .unwrap();

        cli.open_transcript().unwrap();
        assert!(!path.exists());
    }
}
