//! Command line interface
//!
//! Argument definitions and the glue between the parsed arguments and the
//! [`Pipeline`](crate::pipeline::Pipeline).

use std::ffi::OsString;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, CommandFactory, FromArgMatches, Parser};

use crate::output::OutputFormatter;
use crate::pipeline::{InputMode, Pipeline};

/// Extract text from cells and text boxes of Excel files (.xls, .xlsx, .xlsm).
///
/// Output is human-readable on a terminal and tab-separated
/// (file, sheet, address, content) when redirected.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "xlte", version)]
pub struct Cli {
    /// Excel file to process
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Directory to scan for Excel files
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Descend into subdirectories in directory mode
    #[arg(
        short = 'r',
        long = "recursive",
        value_name = "BOOL",
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    pub recursive: bool,
}

impl Cli {
    /// The command with `-v`/`--version` in place of clap's `-V`.
    pub fn build_command() -> Command {
        <Self as CommandFactory>::command()
            .disable_version_flag(true)
            .arg(
                Arg::new("version")
                    .short('v')
                    .long("version")
                    .help("Print version")
                    .action(ArgAction::Version),
            )
    }

    /// Parses arguments (the first one being the program name).
    ///
    /// Help and version requests come back as errors whose
    /// [`use_stderr`](clap::Error::use_stderr) is false.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::build_command().try_get_matches_from(args)?;
        <Self as FromArgMatches>::from_arg_matches(&matches)
    }

    pub fn input_mode(&self) -> Result<InputMode, crate::pipeline::InputError> {
        InputMode::from_args(self.file.clone(), self.dir.clone(), self.recursive)
    }
}

/// Runs the parsed command against the process's stdout and stderr and
/// returns the exit status.
pub fn run(cli: &Cli) -> i32 {
    let stderr = io::stderr();
    let mut err = stderr.lock();

    let mode = match cli.input_mode() {
        Ok(mode) => mode,
        Err(e) => {
            let _ = writeln!(err, "{}", e);
            return 1;
        }
    };

    let stdout = io::stdout();
    let formatter = OutputFormatter::for_stdout(stdout.is_terminal());
    let mut out = stdout.lock();
    Pipeline::new(formatter).run(&mode, &mut out, &mut err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_command_is_valid() {
        Cli::build_command().debug_assert();
    }

    #[test]
    fn test_file_mode() {
        let cli = Cli::try_parse_args(["xlte", "-f", "book.xlsx"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("book.xlsx")));
        assert_eq!(cli.dir, None);
        assert!(cli.recursive);
        assert_eq!(
            cli.input_mode(),
            Ok(InputMode::SingleFile(PathBuf::from("book.xlsx")))
        );
    }

    #[test]
    fn test_recursive_flag() {
        let cli = Cli::try_parse_args(["xlte", "--dir", "docs", "--recursive", "false"]).unwrap();
        assert!(!cli.recursive);

        let cli = Cli::try_parse_args(["xlte", "-d", "docs", "-r"]).unwrap();
        assert!(cli.recursive);
    }

    #[test]
    fn test_help_and_version() {
        let err = Cli::try_parse_args(["xlte", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.use_stderr());

        let err = Cli::try_parse_args(["xlte", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_unknown_flag_is_error() {
        let err = Cli::try_parse_args(["xlte", "--bogus"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_run_without_input_fails() {
        let cli = Cli::try_parse_args(["xlte"]).unwrap();
        assert_eq!(run(&cli), 1);
    }
}
