//! Run command handler

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use flaketally::{Harness, HarnessConfig, HarnessOutcome, ReportFormat, TestCommand};
use std::time::Duration;
use tracing::debug;

/// Test command for `args`: the trailing command if given, otherwise the
/// runner's default invocation filtered by `--grep`
pub fn build_test_command(args: &RunArgs) -> CliResult<TestCommand> {
    if !args.command.is_empty() {
        return Ok(TestCommand::from_argv(&args.command)?);
    }
    Ok(match ReportFormat::from(args.format) {
        ReportFormat::Mocha => TestCommand::mocha(&args.grep),
        ReportFormat::Libtest => TestCommand::libtest(&args.grep),
    })
}

/// Harness configuration for `args`
pub fn build_harness_config(args: &RunArgs) -> CliResult<HarnessConfig> {
    let config = HarnessConfig::new()
        .with_iterations(args.iterations)
        .with_output_dir(&args.output_dir)
        .with_format(args.format.into())
        .with_command(build_test_command(args)?)
        .with_timeout(args.timeout.map(Duration::from_millis));
    config.validate()?;
    debug!(?config, "harness configured");
    Ok(config)
}

/// Execute the run command
pub fn execute_run(config: &CliConfig, args: &RunArgs) -> CliResult<HarnessOutcome> {
    let harness = Harness::new(build_harness_config(args)?)?;

    // In JSON mode the outcome document is the only output.
    let mut reporter = ProgressReporter::new(
        config.color.should_color(),
        config.verbosity.is_quiet() || args.json,
    )
    .with_verbose(config.verbosity.is_verbose());
    reporter.header("Flaketally");
    reporter.info(&format!(
        "{} x {}",
        harness.config().iterations,
        harness.config().command
    ));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;
    let outcome = rt.block_on(harness.run(&mut reporter));
    reporter.finish();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        reporter.summary(&outcome);
        match (outcome.report_path(), outcome.persist_error.as_deref()) {
            (Some(path), _) => println!("Report written to {}", path.display()),
            (None, Some(error)) => reporter.failure(&format!("Report not written: {error}")),
            (None, None) => {}
        }
        if let Some(ref report) = outcome.report {
            if !report.is_complete() {
                reporter.warning(&format!("{} report line(s) could not be written", report.lines_failed));
            }
        }
    }

    if args.fail_on_flaky && outcome.has_failures() {
        return Err(CliError::FlakyTests {
            count: outcome.tally.len(),
        });
    }
    Ok(outcome)
}
