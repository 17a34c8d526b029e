// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issues: tagged diagnostic facts explaining a resolution, attributed to hosts.
//!
//! Code asks "did this issue happen on any host?", while people want to read the issues grouped
//! by host (`host:issue,issue host:issue`). [`IssueRegistry`] stores each `(issue, host)` fact
//! once, in observation order, and derives both views from that single record.

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use mortem_metadata::ResolutionKind;
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::fmt;
use tracing::debug;

/// The pseudo-host that baseline-wide issues are attributed to.
pub const BASELINE_HOST: &str = "baseline";

/// A kind of issue.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum IssueKind {
    /// The test doesn't exist in the baseline.
    Absent,
    /// The external sanitizer failed.
    SanitizerFailed,

    /// The daemon logged an assertion failure.
    Assertion,
    /// The daemon logged an expectation failure.
    Expectation,
    /// A core dump was found.
    Core,
    /// A segmentation fault was reported.
    Segfault,
    /// A general protection fault was reported.
    Gpfault,
    /// `(null)` was printed, a sign that a NULL pointer was formatted.
    PrintfNull,
    /// The kernel printed a call trace.
    Kernel,
    /// Output contains a non-printable character.
    Iscntrl,

    /// A test script timed out.
    Timeout,

    /// There is no raw console output.
    OutputMissing,
    /// There is no reference output to compare against.
    OutputUnchecked,
    /// The raw console output is incomplete.
    OutputTruncated,
    /// Sanitized output differs from the reference only in whitespace.
    OutputWhitespace,
    /// Sanitized output differs from the reference.
    OutputDifferent,

    /// The baseline failed where this run didn't.
    BaselineFailed,
    /// The baseline passed where this run didn't.
    BaselinePassed,
    /// The baseline has no sanitized output for the host.
    BaselineMissing,
    /// Both failed; the outputs differ only in whitespace.
    BaselineWhitespace,
    /// Both failed, but differently.
    BaselineDifferent,
    /// The baseline itself was neither passed nor failed.
    BaselineResolution(ResolutionKind),
}

impl IssueKind {
    /// Returns the issue's tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::SanitizerFailed => "sanitizer-failed",
            Self::Assertion => "ASSERTION",
            Self::Expectation => "EXPECTATION",
            Self::Core => "CORE",
            Self::Segfault => "SEGFAULT",
            Self::Gpfault => "GPFAULT",
            Self::PrintfNull => "PRINTF_NULL",
            Self::Kernel => "KERNEL",
            Self::Iscntrl => "ISCNTRL",
            Self::Timeout => "timeout",
            Self::OutputMissing => "output-missing",
            Self::OutputUnchecked => "output-unchecked",
            Self::OutputTruncated => "output-truncated",
            Self::OutputWhitespace => "output-whitespace",
            Self::OutputDifferent => "output-different",
            Self::BaselineFailed => "baseline-failed",
            Self::BaselinePassed => "baseline-passed",
            Self::BaselineMissing => "baseline-missing",
            Self::BaselineWhitespace => "baseline-whitespace",
            Self::BaselineDifferent => "baseline-different",
            Self::BaselineResolution(kind) => kind.as_str(),
        }
    }

    /// Returns true if this issue means the daemon crashed.
    pub fn is_crash(self) -> bool {
        matches!(
            self,
            Self::Assertion | Self::Expectation | Self::Core | Self::Segfault | Self::Gpfault
        )
    }

    /// Returns true if this issue is attributed to the [`BASELINE_HOST`] pseudo-host rather
    /// than to a real host.
    pub fn is_baseline_wide(self) -> bool {
        matches!(self, Self::Absent | Self::BaselineResolution(_))
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of issues found while evaluating a test.
#[derive(Clone, Debug, Default)]
pub struct IssueRegistry {
    // Every (issue, host) fact, in the order first observed.
    facts: IndexSet<(IssueKind, String)>,
}

impl IssueRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `host` has `issue`. Adding the same pair again has no effect.
    pub fn add(&mut self, issue: IssueKind, host: impl Into<String>) {
        let host = host.into();
        debug!("host {host} has issue {issue}");
        self.facts.insert((issue, host));
    }

    /// Returns true if any host has `issue`.
    pub fn contains(&self, issue: IssueKind) -> bool {
        self.facts.iter().any(|(kind, _)| *kind == issue)
    }

    /// Returns the hosts that have `issue`, in the order first observed.
    pub fn hosts_for(&self, issue: IssueKind) -> Vec<&str> {
        self.facts
            .iter()
            .filter(|(kind, _)| *kind == issue)
            .map(|(_, host)| host.as_str())
            .collect()
    }

    /// Returns the issues recorded for `host`, in the order first observed.
    pub fn issues_for(&self, host: &str) -> Vec<IssueKind> {
        self.facts
            .iter()
            .filter(|(_, h)| h == host)
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// Iterates over the distinct issues, in the order first observed.
    pub fn iter(&self) -> impl Iterator<Item = IssueKind> + '_ {
        self.facts.iter().map(|(kind, _)| *kind).unique()
    }

    /// Returns true if no issues have been recorded.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Returns the issues grouped by host, both in the order first observed.
    pub fn by_host(&self) -> IndexMap<&str, Vec<IssueKind>> {
        let mut by_host: IndexMap<&str, Vec<IssueKind>> = IndexMap::new();
        for (kind, host) in &self.facts {
            by_host.entry(host.as_str()).or_default().push(*kind);
        }
        by_host
    }
}

/// Renders as `host:issue,issue host:issue`, with hosts and issues sorted alphabetically. A host
/// with an empty name omits the `host:` prefix.
impl fmt::Display for IssueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by_host = self.by_host();
        let hosts = by_host.iter().sorted_by(|(a, _), (b, _)| a.cmp(b));
        for (index, (host, issues)) in hosts.enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            if !host.is_empty() {
                write!(f, "{host}:")?;
            }
            let issues = issues.iter().map(|issue| issue.as_str()).sorted().join(",");
            f.write_str(&issues)?;
        }
        Ok(())
    }
}

/// Serializes as an object mapping each host to its issues.
impl Serialize for IssueRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let by_host = self.by_host();
        let mut map = serializer.serialize_map(Some(by_host.len()))?;
        for (host, issues) in &by_host {
            let issues: Vec<_> = issues.iter().map(|issue| issue.as_str()).collect();
            map.serialize_entry(host, &issues)?;
        }
        map.end()
    }
}
