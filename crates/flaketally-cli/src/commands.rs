//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use flaketally::{ReportFormat, DEFAULT_GREP, DEFAULT_ITERATIONS};
use std::path::PathBuf;

/// Flaketally: repeat a test and count how often it fails
#[derive(Parser, Debug)]
#[command(name = "flaketally")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a test repeatedly and write a failure report
    Run(RunArgs),

    /// Show a previously written failure report
    Show(ShowArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Number of sequential iterations
    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS, value_parser = clap::value_parser!(u32).range(1..))]
    pub iterations: u32,

    /// Test name filter for the default test command
    #[arg(short, long, default_value = DEFAULT_GREP)]
    pub grep: String,

    /// Structured report format the test command prints
    #[arg(short, long, value_enum, default_value = "mocha")]
    pub format: FormatArg,

    /// Directory the report file is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Per-iteration timeout in milliseconds
    #[arg(long, value_name = "MS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,

    /// Exit non-zero when any test failed at least once
    #[arg(long)]
    pub fail_on_flaky: bool,

    /// Print the outcome as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Test command to repeat instead of the default (after `--`)
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Report file to display
    pub report: PathBuf,

    /// Only show the N most frequent failures
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,
}

/// Report format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Mocha `--reporter json`
    #[default]
    Mocha,
    /// libtest `--format json`
    Libtest,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Mocha => Self::Mocha,
            FormatArg::Libtest => Self::Libtest,
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
