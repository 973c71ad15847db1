use std::io::{self, Write};

use crossterm::style::Stylize;
use serde::Serialize;

use crate::app::{OutcomeStatus, RunReport};
use crate::run_log::LogLevel;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &RunReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        Self::write_report(&mut stdout, report)
    }

    pub fn write_report<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
        let title = if report.dry_run {
            "modfetch check summary"
        } else {
            "modfetch summary"
        };
        writeln!(out, "{}", title.cyan().bold())?;

        for outcome in &report.outcomes {
            let label = match outcome.status {
                OutcomeStatus::Success if report.dry_run => "UPDATE".yellow(),
                OutcomeStatus::Success => "OK".green(),
                OutcomeStatus::Ignored => "SKIP".dark_grey(),
                OutcomeStatus::Error => "FAIL".red(),
            };
            write!(out, "{label} {}", outcome.reference_url)?;
            if let Some(file_name) = &outcome.file_name {
                write!(out, " -> {file_name}")?;
            }
            if let Some(detail) = &outcome.detail {
                write!(out, " ({detail})")?;
            }
            writeln!(out)?;
        }

        if !report.problems.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", "Warnings and errors".bold())?;
            for entry in &report.problems {
                let level = match entry.level {
                    LogLevel::Severe => entry.level.to_string().red(),
                    _ => entry.level.to_string().yellow(),
                };
                writeln!(out, "{level}: {}", entry.message)?;
            }
        }

        writeln!(out)?;
        let updated = if report.dry_run { "Updates available" } else { "Updated" };
        writeln!(out, "{}: {}", updated, report.counts.success.to_string().green())?;
        writeln!(out, "Up to date: {}", report.counts.ignored)?;
        writeln!(out, "Errors: {}", report.counts.error.to_string().red())?;
        writeln!(
            out,
            "Finished in {:.2}s",
            report.elapsed_ms as f64 / 1000.0
        )?;
        Ok(())
    }
}
