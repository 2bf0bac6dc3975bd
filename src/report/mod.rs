//! Reporting: formatted terminal and text-file output.
//!
//! Formatting lives here so the alignment and factor code stays free of
//! presentation details, and output changes stay localized.

mod format;

pub use format::{format_loadings_report, format_run_summary, format_saved_summary};
