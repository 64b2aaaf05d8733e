//! Command handlers - extracted from main.rs for testability

pub mod run;
pub mod show;

pub use run::{build_harness_config, build_test_command, execute_run};
pub use show::{execute_show, rank_entries, render_entries};
