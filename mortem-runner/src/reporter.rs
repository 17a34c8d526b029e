// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting evaluated test results.
//!
//! The main structure in this module is [`ResultReporter`].

use crate::{errors::WriteReportError, helpers::plural, test_result::TestResult};
use mortem_metadata::ResolutionKind;
use owo_colors::{OwoColorize, Style};
use std::io::{self, Write};
use swrite::{SWrite, swrite};

/// The format results are reported in.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MessageFormat {
    /// One human-readable line per test.
    #[default]
    Human,

    /// One JSON summary per line.
    Json,
}

/// Builds a [`ResultReporter`].
#[derive(Debug, Default)]
pub struct ResultReporterBuilder {
    message_format: MessageFormat,
    print_diffs: bool,
    should_colorize: bool,
}

impl ResultReporterBuilder {
    /// Sets the format results are reported in.
    pub fn set_message_format(&mut self, message_format: MessageFormat) -> &mut Self {
        self.message_format = message_format;
        self
    }

    /// If true, each host's diff is printed after the result line. Only applies to the human
    /// format.
    pub fn set_print_diffs(&mut self, print_diffs: bool) -> &mut Self {
        self.print_diffs = print_diffs;
        self
    }

    /// Sets whether the human format should be colorized.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Creates a new reporter.
    pub fn build(&self) -> ResultReporter {
        let mut styles = Box::<Styles>::default();
        if self.should_colorize {
            styles.colorize();
        }
        ResultReporter {
            message_format: self.message_format,
            print_diffs: self.print_diffs,
            styles,
            stats: RunStats::default(),
        }
    }
}

/// Reports test results as they are evaluated, and keeps count of them.
#[derive(Debug)]
pub struct ResultReporter {
    message_format: MessageFormat,
    print_diffs: bool,
    styles: Box<Styles>,
    stats: RunStats,
}

impl ResultReporter {
    /// Reports a single result to `writer`.
    pub fn report(
        &mut self,
        result: &TestResult,
        writer: &mut dyn Write,
    ) -> Result<(), WriteReportError> {
        self.stats.on_result(result.resolution().kind());
        match self.message_format {
            MessageFormat::Human => self
                .write_human(result, writer)
                .map_err(WriteReportError::Io),
            MessageFormat::Json => self.write_json(result, writer),
        }
    }

    /// The statistics for the results reported so far.
    pub fn run_stats(&self) -> RunStats {
        self.stats
    }

    /// Writes the closing statistics line to `writer`.
    pub fn write_stats(&self, writer: &mut dyn Write) -> Result<(), WriteReportError> {
        let mut out = String::new();
        write_stats_str(&self.stats, &self.styles, &mut out);
        writeln!(writer, "{out}").map_err(WriteReportError::Io)
    }

    fn write_human(&self, result: &TestResult, writer: &mut dyn Write) -> io::Result<()> {
        let (resolution, style) = match result.resolution().kind() {
            Some(kind) => (kind.as_str(), self.styles.resolution_style(kind)),
            None => ("unset", self.styles.other),
        };
        write!(
            writer,
            "{} {}",
            result.test().directory().style(self.styles.directory),
            resolution.style(style)
        )?;
        if !result.issues().is_empty() {
            write!(writer, " {}", result.issues())?;
        }
        writeln!(writer)?;

        if self.print_diffs {
            for diff in result.diffs().values() {
                for line in diff {
                    let style = match line.first() {
                        Some(b'+') => self.styles.diff_added,
                        Some(b'-') => self.styles.diff_removed,
                        _ => Style::new(),
                    };
                    writeln!(writer, "{}", line.style(style))?;
                }
            }
        }
        Ok(())
    }

    fn write_json(
        &self,
        result: &TestResult,
        writer: &mut dyn Write,
    ) -> Result<(), WriteReportError> {
        let summary = result.summary();
        serde_json::to_writer(&mut *writer, &summary).map_err(|error| WriteReportError::Json {
            test_name: summary.test_name.clone(),
            error,
        })?;
        writeln!(writer).map_err(WriteReportError::Io)
    }
}

/// Counts of reported results, by resolution.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of tests reported.
    pub total: usize,

    /// The number of tests that passed.
    pub passed: usize,

    /// The number of tests that failed.
    pub failed: usize,

    /// The number of tests that were attempted but couldn't be resolved.
    pub unresolved: usize,

    /// The number of tests that were never attempted.
    pub untested: usize,

    /// The number of unsupported tests.
    pub unsupported: usize,
}

impl RunStats {
    /// Returns true if any test failed or couldn't be resolved.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.unresolved > 0
    }

    fn on_result(&mut self, resolution: Option<ResolutionKind>) {
        self.total += 1;
        match resolution {
            Some(ResolutionKind::Passed) => self.passed += 1,
            Some(ResolutionKind::Failed) => self.failed += 1,
            // An unset resolution is an evaluator defect; count it against the run.
            Some(ResolutionKind::Unresolved) | None => self.unresolved += 1,
            Some(ResolutionKind::Untested) => self.untested += 1,
            Some(ResolutionKind::Unsupported) => self.unsupported += 1,
        }
    }
}

fn write_stats_str(stats: &RunStats, styles: &Styles, out: &mut String) {
    swrite!(
        out,
        "{} {}: {} {}, {} {}, {} {}, {} {}",
        stats.total.style(styles.count),
        plural::tests_str(stats.total),
        stats.passed.style(styles.count),
        "passed".style(styles.pass),
        stats.failed.style(styles.count),
        "failed".style(styles.fail),
        stats.unresolved.style(styles.count),
        "unresolved".style(styles.unresolved),
        stats.untested.style(styles.count),
        "untested".style(styles.other),
    );
    if stats.unsupported > 0 {
        swrite!(
            out,
            ", {} {}",
            stats.unsupported.style(styles.count),
            "unsupported".style(styles.other)
        );
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    directory: Style,
    pass: Style,
    fail: Style,
    unresolved: Style,
    other: Style,
    diff_added: Style,
    diff_removed: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.directory = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.unresolved = Style::new().yellow().bold();
        self.other = Style::new().dimmed();
        self.diff_added = Style::new().green();
        self.diff_removed = Style::new().red();
    }

    fn resolution_style(&self, kind: ResolutionKind) -> Style {
        match kind {
            ResolutionKind::Passed => self.pass,
            ResolutionKind::Failed => self.fail,
            ResolutionKind::Unresolved => self.unresolved,
            ResolutionKind::Untested | ResolutionKind::Unsupported => self.other,
        }
    }
}
