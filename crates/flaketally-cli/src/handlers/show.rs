//! Show command handler

use crate::commands::ShowArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use flaketally::ReportFile;

/// Execute the show command
pub fn execute_show(config: &CliConfig, args: &ShowArgs) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;
    let entries = rt.block_on(ReportFile::at(&args.report).read())?;
    let entries = rank_entries(entries, args.top);

    if entries.is_empty() {
        if !config.verbosity.is_quiet() {
            println!("No failures recorded in {}", args.report.display());
        }
        return Ok(());
    }

    print!("{}", render_entries(&entries));
    Ok(())
}

/// Sort by descending count (ties by title) and keep the first `top`
#[must_use]
pub fn rank_entries(mut entries: Vec<(String, u32)>, top: Option<usize>) -> Vec<(String, u32)> {
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some(n) = top {
        entries.truncate(n);
    }
    entries
}

/// Render entries as a right-aligned count column
#[must_use]
pub fn render_entries(entries: &[(String, u32)]) -> String {
    let width = entries
        .iter()
        .map(|(_, count)| count.to_string().len())
        .max()
        .unwrap_or(1);
    entries
        .iter()
        .map(|(title, count)| format!("{count:>width$}  {title}\n"))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entries(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(t, c)| ((*t).to_string(), *c)).collect()
    }

    #[test]
    fn test_rank_entries() {
        let ranked = rank_entries(entries(&[("b", 1), ("c", 7), ("a", 1)]), None);
        assert_eq!(ranked, entries(&[("c", 7), ("a", 1), ("b", 1)]));
    }

    #[test]
    fn test_rank_entries_top() {
        let ranked = rank_entries(entries(&[("b", 1), ("c", 7), ("a", 3)]), Some(2));
        assert_eq!(ranked, entries(&[("c", 7), ("a", 3)]));
    }

    #[test]
    fn test_render_entries() {
        let text = render_entries(&entries(&[("slow test", 12), ("quick test", 3)]));
        assert_eq!(text, "12  slow test\n 3  quick test\n");
    }

    #[test]
    fn test_execute_show_reads_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_harness_output_x.txt");
        std::fs::write(&path, "a: 1\nb: 4\n").unwrap();
        let args = ShowArgs {
            report: path,
            top: None,
        };
        assert!(execute_show(&CliConfig::default(), &args).is_ok());
    }

    #[test]
    fn test_execute_show_missing_file() {
        let args = ShowArgs {
            report: PathBuf::from("/nonexistent/flaketally/report.txt"),
            top: None,
        };
        let err = execute_show(&CliConfig::default(), &args).unwrap_err();
        assert!(matches!(err, CliError::Harness(flaketally::HarnessError::Io(_))));
    }

    #[test]
    fn test_execute_show_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        std::fs::write(&path, "no separator here\n").unwrap();
        let args = ShowArgs {
            report: path,
            top: None,
        };
        let err = execute_show(&CliConfig::default(), &args).unwrap_err();
        assert!(matches!(err, CliError::Harness(flaketally::HarnessError::Decode { .. })));
    }
}
