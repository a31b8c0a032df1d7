//! JSON report output

use super::Summary;
use crate::error::Result;
use crate::verify::{ChannelOutcome, VerificationRun};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct Report<'a> {
    passed: bool,
    summary: Summary,
    channels: &'a [ChannelOutcome],
}

pub fn write<W: Write>(writer: &mut W, run: &VerificationRun) -> Result<()> {
    let report = Report {
        passed: run.passed(),
        summary: Summary::from_run(run),
        channels: &run.channels,
    };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
