//! Flaketally CLI: repeat a test and count how often it fails
//!
//! ## Usage
//!
//! ```bash
//! flaketally run                                # 32 x the default mocha test
//! flaketally run -n 100 --grep "copies the URL" # pick the test and count
//! flaketally run --format libtest -- cargo test -- --exact net::reconnects -Z unstable-options --format json
//! flaketally show test_harness_output_*.txt     # ranked failure counts
//! ```

use clap::Parser;
use flaketally_cli::{
    handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, LogWriter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(io) = e.print() {
                eprintln!("Error: {io}");
            }
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    match cli.command {
        Commands::Run(args) => handlers::execute_run(&config, &args).map(|_| ()),
        Commands::Show(args) => handlers::execute_show(&config, &args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new().with_verbosity(verbosity).with_color(color)
}

fn init_tracing(verbosity: Verbosity) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(verbosity.log_filter())),
        )
        .with_writer(LogWriter::default)
        .with_target(false)
        .init();
}
