// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The verdict reached for a single test.
///
/// These follow the POSIX 1003.3 result states, plus `unsupported`.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionKind {
    /// No output directory exists: the test was never attempted.
    Untested,

    /// The test ran and every check passed.
    Passed,

    /// The test ran and the system under test misbehaved.
    Failed,

    /// The test ran but the evidence needed to decide is missing or incomplete.
    Unresolved,

    /// The test is not supported in this environment.
    Unsupported,
}

impl ResolutionKind {
    /// Returns the string used for this resolution in reports and issue lists.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untested => "untested",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Unresolved => "unresolved",
            Self::Unsupported => "unsupported",
        }
    }

    /// Returns true if a test with this resolution was attempted.
    ///
    /// That is POSIX 1003.3 PASS, FAIL or UNRESOLVED.
    pub fn is_attempted(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Unresolved)
    }
}

impl fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable summary of one evaluated test, as printed by
/// `mortem --message-format json`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestResultSummary {
    /// The name of the test.
    pub test_name: String,

    /// The directory of the test, relative to the testing directory.
    pub directory: String,

    /// The resolution, or `None` if the test was never evaluated.
    pub resolution: Option<ResolutionKind>,

    /// Issues keyed by host, in the order they were first observed.
    #[serde(default)]
    pub issues: IndexMap<String, Vec<String>>,

    /// When the test's debug log was started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,

    /// When the test's debug log was closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_time: Option<NaiveDateTime>,

    /// Total runtime of the test, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<f64>,

    /// Time taken to boot the test domains, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_time: Option<f64>,

    /// Time taken to run the test scripts, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_time: Option<f64>,
}
