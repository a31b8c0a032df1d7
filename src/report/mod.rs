//! Report generation for verification runs
//!
//! This module provides output formatters for verification runs:
//!
//! - **JSON**: Machine-readable format for programmatic consumption
//! - **CSV**: Spreadsheet-compatible format, one row per checked channel
//!
//! # Usage
//!
//! ```ignore
//! use tonecheck::report;
//!
//! // Automatically picks format based on extension
//! report::generate("report.json", &run)?;  // JSON
//! report::generate("report.csv", &run)?;   // CSV
//! ```

pub mod csv;
pub mod json;

use crate::error::Result;
use crate::verify::VerificationRun;
use serde::Serialize;
use std::path::Path;

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, run: &VerificationRun) -> Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "json" => json::write(&mut file, run),
        _ => csv::write(&mut file, run),
    }
}

/// Channel counts for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub verified: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    pub fn from_run(run: &VerificationRun) -> Self {
        let mut summary = Self {
            total: run.channels.len() + run.skipped,
            skipped: run.skipped,
            ..Self::default()
        };

        for channel in &run.channels {
            if channel.errors.is_empty() {
                summary.verified += 1;
            } else {
                summary.failed += 1;
            }
        }

        summary
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    // ==========================================================================
    // SUMMARY STATISTICS TESTS
    // ==========================================================================
    //
    // The Summary struct counts channel outcomes for one run. Skipped
    // channels count toward the total but are neither verified nor failed.
    // ==========================================================================

    #[test]
    fn test_summary_empty() {
        let summary = Summary::from_run(&VerificationRun::default());

        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn test_summary_all_verified() {
        let summary = Summary::from_run(&run(vec![passing(0), passing(1)], 0));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.verified, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_summary_mixed() {
        let summary = Summary::from_run(&run(
            vec![passing(0), failing(2, "Can not find dominant frequency.")],
            1,
        ));

        assert_eq!(summary.total, 3);
        assert_eq!(summary.verified, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
    }

    // ==========================================================================
    // FORMAT SELECTION TESTS
    // ==========================================================================

    #[test]
    fn test_generate_picks_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.JSON");

        generate(&path, &run(vec![passing(0)], 0)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["passed"], serde_json::json!(true));
    }

    #[test]
    fn test_generate_defaults_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");

        generate(&path, &run(vec![passing(0)], 0)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("test_channel,"));
    }
}
