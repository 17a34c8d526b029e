// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluating the output of a single test run.
//!
//! [`TestResult::evaluate`] starts out assuming the test passed, then scans the run's output
//! directory for evidence to the contrary:
//!
//! 1. Each host's daemon log is checked for assertion failures and similar.
//! 2. Each host's raw console output is checked for crashes, timeouts and truncation, then
//!    sanitized and compared against the reference output.
//!
//! Evidence only ever escalates the resolution; see [`Resolution`].

use crate::{
    artifact::{ArtifactCache, bytes_regex, grep},
    errors::{DisplayErrorChain, SaveError},
    issues::{IssueKind, IssueRegistry},
    resolution::Resolution,
    sanitizer::Sanitizer,
    test_list::{CONSOLE_TXT_SUFFIX, TestDescriptor},
    text_diff::{self, Diff},
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use bstr::{BString, ByteSlice};
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use mortem_metadata::TestResultSummary;
use regex::bytes::Regex;
use std::{cell::OnceCell, io::Write, sync::LazyLock, time::Duration};
use tracing::{debug, error};

/// Written as the last line of a host's raw console output once its scripts have all run.
pub const DONE_MARKER: &str = ">>>>>>>>>>cut>>>>>>>>>> done <<<<<<<<<<tuc<<<<<<<<<<";

/// Written to a host's raw console output when one of its scripts times out.
pub const TIMEOUT_MARKER: &str = ">>>>>>>>>> timeout while running test script";

/// The auxiliary log holding the run's timing information.
pub const DEBUG_LOG_FILE_NAME: &str = "debug.log";

/// The format of timestamps in the debug log.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// The daemon log of `host`.
pub fn daemon_log_file_name(host: &str) -> String {
    format!("{host}.pluto.log")
}

/// The raw console output of `host`.
pub fn raw_console_file_name(host: &str) -> String {
    format!("{host}.console.verbose.txt")
}

/// The sanitized console output of `host`.
pub fn sanitized_console_file_name(host: &str) -> String {
    format!("{host}{CONSOLE_TXT_SUFFIX}")
}

/// The diff between the reference and sanitized console output of `host`.
pub fn console_diff_file_name(host: &str) -> String {
    format!("{host}.console.diff")
}

#[derive(Copy, Clone, Debug)]
enum Severity {
    // Recorded, but doesn't affect the resolution.
    Note,
    Failure,
}

#[derive(Debug)]
struct Marker {
    regex: Regex,
    issue: IssueKind,
    severity: Severity,
}

impl Marker {
    fn new(pattern: &str, issue: IssueKind, severity: Severity) -> Self {
        Self {
            regex: static_regex(pattern),
            issue,
            severity,
        }
    }
}

fn static_regex(pattern: &str) -> Regex {
    bytes_regex(pattern).expect("built-in patterns are valid")
}

static DAEMON_LOG_MARKERS: LazyLock<[Marker; 4]> = LazyLock::new(|| {
    [
        Marker::new("ASSERTION FAILED", IssueKind::Assertion, Severity::Failure),
        Marker::new("EXPECTATION FAILED", IssueKind::Expectation, Severity::Note),
        Marker::new(r"\(null\)", IssueKind::PrintfNull, Severity::Failure),
        // Can't detect a newline embedded in a log line.
        Marker::new(r"[^ -~\n]", IssueKind::Iscntrl, Severity::Failure),
    ]
});

static RAW_CONSOLE_MARKERS: LazyLock<[Marker; 5]> = LazyLock::new(|| {
    [
        Marker::new(r"[\r\n]CORE FOUND", IssueKind::Core, Severity::Failure),
        Marker::new("SEGFAULT", IssueKind::Segfault, Severity::Failure),
        Marker::new("GPFAULT", IssueKind::Gpfault, Severity::Failure),
        Marker::new(
            r"\[ *\d+\.\d+\] Call Trace:",
            IssueKind::Kernel,
            Severity::Failure,
        ),
        Marker::new(
            &regex::escape(TIMEOUT_MARKER),
            IssueKind::Timeout,
            Severity::Failure,
        ),
    ]
});

static SANITIZED_OUTPUT_MARKERS: LazyLock<[Marker; 2]> = LazyLock::new(|| {
    [
        Marker::new(r"\(null\)", IssueKind::PrintfNull, Severity::Failure),
        // Console output has \r\n line endings.
        Marker::new(r"[^ -~\r\n\t]", IssueKind::Iscntrl, Severity::Failure),
    ]
});

static DONE_REGEX: LazyLock<Regex> = LazyLock::new(|| static_regex(&regex::escape(DONE_MARKER)));

// starting debug log at 2018-08-15 13:00:12.275358
static START_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"starting debug log at (.*)$"));
// ending debug log at 2018-08-15 13:01:31.602533
static STOP_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r"ending debug log at (.*)$"));
// stop testing basic-pluto-01 (test 2 of 756) after 79.3 seconds
static RUNTIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r": stop testing .* after (.*) second"));
// stop booting domains after 56.9 seconds
static BOOT_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r": stop booting domains after (.*) second"));
// stop running scripts east:eastinit.sh ... after 22.4 seconds
static SCRIPT_TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| static_regex(r": stop running scripts .* after (.*) second"));

/// Options controlling [`TestResult::evaluate`].
#[derive(Clone, Debug, Default)]
pub struct EvaluateOptions {
    /// Reuse previously saved sanitized output and diffs rather than recomputing them.
    ///
    /// Faster, but stale if the sanitizer or reference output changed since they were saved.
    pub quick: bool,

    /// Read the run's output from this directory rather than the test's own output directory.
    pub output_directory: Option<Utf8PathBuf>,
}

/// The evaluated result of a single test run.
#[derive(Debug)]
pub struct TestResult {
    test: TestDescriptor,
    output_directory: Utf8PathBuf,
    resolution: Resolution,
    issues: IssueRegistry,
    sanitized_output: IndexMap<String, Bytes>,
    diffs: IndexMap<String, Diff>,
    artifacts: ArtifactCache,
    start_time: OnceCell<NaiveDateTime>,
    stop_time: OnceCell<NaiveDateTime>,
    runtime: OnceCell<Duration>,
    boot_time: OnceCell<Duration>,
    script_time: OnceCell<Duration>,
}

impl TestResult {
    /// Evaluates the output of `test`, sanitizing console output with `sanitizer`.
    pub fn evaluate(
        test: &TestDescriptor,
        sanitizer: &dyn Sanitizer,
        options: &EvaluateOptions,
    ) -> Self {
        let output_directory = options
            .output_directory
            .clone()
            .unwrap_or_else(|| test.output_directory().to_owned());
        let mut result = Self {
            test: test.clone(),
            artifacts: ArtifactCache::new(&output_directory),
            output_directory,
            resolution: Resolution::new(),
            issues: IssueRegistry::new(),
            sanitized_output: IndexMap::new(),
            diffs: IndexMap::new(),
            start_time: OnceCell::new(),
            stop_time: OnceCell::new(),
            runtime: OnceCell::new(),
            boot_time: OnceCell::new(),
            script_time: OnceCell::new(),
        };

        // An output directory is the sign that an attempt was made to run the test.
        if !result.output_directory.exists() {
            debug!("output directory missing: {}", result.output_directory);
            result.resolution.untested();
            return result;
        }

        // Assume the test passed, then prove otherwise.
        result.resolution.passed();

        for host in test.host_names() {
            result.check_daemon_log(host);
        }
        for host in test.host_names() {
            result.check_console_output(host, sanitizer, options.quick);
        }
        debug!(
            "test {} resolved to {} with issues '{}'",
            test.name(),
            result.resolution,
            result.issues
        );
        result
    }

    /// The test that was evaluated.
    pub fn test(&self) -> &TestDescriptor {
        &self.test
    }

    /// The directory the run's output was read from.
    pub fn output_directory(&self) -> &Utf8Path {
        &self.output_directory
    }

    /// The resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns true if the test was attempted: passed, failed or unresolved.
    pub fn is_attempted(&self) -> bool {
        self.resolution.is_attempted()
    }

    /// The issues explaining the resolution.
    pub fn issues(&self) -> &IssueRegistry {
        &self.issues
    }

    pub(crate) fn issues_mut(&mut self) -> &mut IssueRegistry {
        &mut self.issues
    }

    /// Sanitized console output, keyed by host, for each host that could be sanitized.
    pub fn sanitized_output(&self) -> &IndexMap<String, Bytes> {
        &self.sanitized_output
    }

    /// Differences between the reference and sanitized console output, keyed by host, for each
    /// host whose output didn't match.
    pub fn diffs(&self) -> &IndexMap<String, Diff> {
        &self.diffs
    }

    /// When the debug log was started.
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.memoized_timing(&self.start_time, &START_TIME_REGEX, parse_timestamp)
    }

    /// When the debug log was closed.
    pub fn stop_time(&self) -> Option<NaiveDateTime> {
        self.memoized_timing(&self.stop_time, &STOP_TIME_REGEX, parse_timestamp)
    }

    /// How long the whole test took.
    pub fn runtime(&self) -> Option<Duration> {
        self.memoized_timing(&self.runtime, &RUNTIME_REGEX, parse_seconds)
    }

    /// How long booting the test's domains took.
    pub fn boot_time(&self) -> Option<Duration> {
        self.memoized_timing(&self.boot_time, &BOOT_TIME_REGEX, parse_seconds)
    }

    /// How long running the test's scripts took.
    pub fn script_time(&self) -> Option<Duration> {
        self.memoized_timing(&self.script_time, &SCRIPT_TIME_REGEX, parse_seconds)
    }

    /// Returns a machine-readable summary of this result.
    pub fn summary(&self) -> TestResultSummary {
        let issues = self
            .issues
            .by_host()
            .into_iter()
            .map(|(host, issues)| {
                let issues = issues.iter().map(|issue| issue.as_str().to_owned());
                (host.to_owned(), issues.collect())
            })
            .collect();
        TestResultSummary {
            test_name: self.test.name().to_owned(),
            directory: self.test.directory().to_owned(),
            resolution: self.resolution.kind(),
            issues,
            start_time: self.start_time(),
            stop_time: self.stop_time(),
            runtime: self.runtime().map(|d| d.as_secs_f64()),
            boot_time: self.boot_time().map(|d| d.as_secs_f64()),
            script_time: self.script_time().map(|d| d.as_secs_f64()),
        }
    }

    /// Writes the sanitized output and diffs to the output directory.
    pub fn save(&self) -> Result<(), SaveError> {
        self.save_to(&self.output_directory)
    }

    /// Writes the sanitized output and diffs to `output_directory`.
    ///
    /// `<host>.console.txt` is written for every host with sanitized output, and
    /// `<host>.console.diff` for every host, empty if its output matched. Does nothing if
    /// `output_directory` doesn't exist.
    pub fn save_to(&self, output_directory: &Utf8Path) -> Result<(), SaveError> {
        if !output_directory.exists() {
            debug!("output directory missing: {output_directory}");
            return Ok(());
        }

        for host in self.test.host_names() {
            if let Some(sanitized_output) = self.sanitized_output.get(host) {
                let path = output_directory.join(sanitized_console_file_name(host));
                debug!("host {host} writing sanitized output file: {path}");
                write_atomic(&path, |f| f.write_all(sanitized_output))?;
            }
        }

        for host in self.test.host_names() {
            let path = output_directory.join(console_diff_file_name(host));
            debug!("host {host} writing diff file {path}");
            let diff = self.diffs.get(host).map_or(&[][..], Vec::as_slice);
            write_atomic(&path, |f| {
                for line in diff {
                    f.write_all(line)?;
                    f.write_all(b"\n")?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    // ---
    // Helper methods
    // ---

    fn record(&mut self, issue: IssueKind, host: &str, severity: Severity) {
        self.issues.add(issue, host);
        match severity {
            Severity::Note => {}
            Severity::Failure => self.resolution.failed(),
        }
    }

    fn record_unresolved(&mut self, issue: IssueKind, host: &str) {
        self.issues.add(issue, host);
        self.resolution.unresolved();
    }

    fn scan(&mut self, host: &str, contents: &[u8], markers: &[Marker]) {
        for marker in markers {
            if grep(contents, &marker.regex).is_some() {
                self.record(marker.issue, host, marker.severity);
            }
        }
    }

    fn check_daemon_log(&mut self, host: &str) {
        if let Some(log) = self.artifacts.file_contents(&daemon_log_file_name(host)) {
            debug!("host {host} checking daemon log for signs of a crash");
            self.scan(host, &log, &*DAEMON_LOG_MARKERS);
        }
    }

    fn check_console_output(&mut self, host: &str, sanitizer: &dyn Sanitizer, quick: bool) {
        let raw_file_name = raw_console_file_name(host);

        // Without any raw console output things went badly wrong, for instance while booting,
        // and there's nothing to validate.
        let Some(raw_output) = self.artifacts.file_contents(&raw_file_name) else {
            self.record_unresolved(IssueKind::OutputMissing, host);
            return;
        };

        debug!("host {host} checking raw console output for signs of a crash");
        self.scan(host, &raw_output, &*RAW_CONSOLE_MARKERS);

        // The done marker is the last thing written: without it the output was cut short by an
        // exception, or the test is still running. Sanitizing what there is remains useful.
        debug!("host {host} checking if raw console output is complete");
        if grep(&raw_output, &DONE_REGEX).is_none() {
            self.record_unresolved(IssueKind::OutputTruncated, host);
        }

        let sanitized_path = self.output_directory.join(sanitized_console_file_name(host));
        let saved = if quick {
            self.artifacts.contents_of(&sanitized_path)
        } else {
            None
        };
        let sanitized_output = match saved {
            Some(saved) => {
                debug!("host {host} reusing sanitized output '{sanitized_path}'");
                saved
            }
            None => {
                let raw_path = self.output_directory.join(&raw_file_name);
                debug!("host {host} sanitizing console output '{raw_path}'");
                match sanitizer.sanitize(&raw_path, &self.test) {
                    Ok(output) => Bytes::from(output),
                    Err(err) => {
                        error!("host {host}: {}", DisplayErrorChain::new(&err));
                        self.record_unresolved(IssueKind::SanitizerFailed, host);
                        return;
                    }
                }
            }
        };
        self.sanitized_output
            .insert(host.to_owned(), sanitized_output.clone());

        self.scan(host, &sanitized_output, &*SANITIZED_OUTPUT_MARKERS);

        let expected_path = self.test.expected_output_path(host);
        debug!("host {host} comparing against known-good output '{expected_path}'");
        let Some(expected_output) = self.artifacts.contents_of(&expected_path) else {
            self.record_unresolved(IssueKind::OutputUnchecked, host);
            return;
        };

        let saved_diff = if quick {
            self.artifacts
                .file_contents(&console_diff_file_name(host))
                .map(|saved| saved.lines().map(BString::from).collect::<Diff>())
        } else {
            None
        };
        let diff = saved_diff.unwrap_or_else(|| {
            let file_name = sanitized_console_file_name(host);
            let directory = self.test.directory();
            text_diff::diff(
                &format!("MASTER/{directory}/{file_name}"),
                &expected_output,
                &format!("OUTPUT/{directory}/{file_name}"),
                &sanitized_output,
            )
        });

        if !diff.is_empty() {
            self.diffs.insert(host.to_owned(), diff);
            let issue = if text_diff::whitespace_equal(&expected_output, &sanitized_output) {
                IssueKind::OutputWhitespace
            } else {
                IssueKind::OutputDifferent
            };
            self.record(issue, host, Severity::Failure);
        }
    }

    fn memoized_timing<T: Copy>(
        &self,
        cell: &OnceCell<T>,
        regex: &Regex,
        cast: fn(&str) -> Option<T>,
    ) -> Option<T> {
        if let Some(value) = cell.get() {
            return Some(*value);
        }
        let value = self.artifacts.grub_as(DEBUG_LOG_FILE_NAME, regex, cast)?;
        Some(*cell.get_or_init(|| value))
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).ok()
}

fn parse_seconds(text: &str) -> Option<Duration> {
    let seconds: f64 = text.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

fn write_atomic(
    path: &Utf8Path,
    write: impl FnOnce(&mut std::fs::File) -> std::io::Result<()>,
) -> Result<(), SaveError> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(write)
        .map_err(|error| SaveError::new(path, error))
}
