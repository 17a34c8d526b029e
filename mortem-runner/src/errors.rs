// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by mortem.
//!
//! Expected test-level conditions (missing files, crashes, output differences) are never errors:
//! they are folded into the [`Resolution`](crate::resolution::Resolution) and
//! [`IssueRegistry`](crate::issues::IssueRegistry) of a test result.

use crate::{helpers::display_exited_with, resolution::ResolutionTransition};
use camino::Utf8PathBuf;
use config::ConfigError;
use mortem_metadata::ResolutionKind;
use std::{fmt, process::ExitStatus};
use thiserror::Error;

pub use display_error_chain::DisplayErrorChain;

/// An illegal [`Resolution`](crate::resolution::Resolution) transition.
///
/// This indicates a broken invariant in the evaluator itself, and is only ever used to format
/// the resulting panic.
#[derive(Clone, Debug, Error)]
#[error(
    "illegal resolution transition: `{}` called while resolution is `{}`",
    .transition.as_str(),
    DisplayState(.from_state),
)]
pub struct ResolutionTransitionError {
    transition: ResolutionTransition,
    from_state: Option<ResolutionKind>,
}

impl ResolutionTransitionError {
    pub(crate) fn new(
        transition: ResolutionTransition,
        from_state: Option<ResolutionKind>,
    ) -> Self {
        Self {
            transition,
            from_state,
        }
    }

    /// The transition that was attempted.
    pub fn transition(&self) -> ResolutionTransition {
        self.transition
    }

    /// The state the transition was attempted from.
    pub fn from_state(&self) -> Option<ResolutionKind> {
        self.from_state
    }
}

struct DisplayState<'a>(&'a Option<ResolutionKind>);

impl fmt::Display for DisplayState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(kind) => kind.fmt(f),
            None => f.write_str("unset"),
        }
    }
}

/// An error that occurred while running the external sanitizer.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// The sanitizer could not be started.
    #[error("failed to execute sanitizer `{command}`")]
    Exec {
        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The sanitizer exited with a non-zero status.
    #[error(
        "sanitizer `{command}` {}; stderr: '{stderr}'",
        display_exited_with(*.status),
    )]
    Failed {
        /// The command line.
        command: String,

        /// The exit status.
        status: ExitStatus,

        /// Anything written to stderr.
        stderr: String,
    },

    /// The sanitizer exited successfully, but wrote to stderr.
    #[error("sanitizer `{command}` wrote to stderr: '{stderr}'")]
    Stderr {
        /// The command line.
        command: String,

        /// Anything written to stderr.
        stderr: String,
    },
}

/// An error that occurred while saving sanitized output and diffs.
#[derive(Debug, Error)]
#[error("failed to write `{path}`")]
pub struct SaveError {
    path: Utf8PathBuf,
    #[source]
    error: atomicwrites::Error<std::io::Error>,
}

impl SaveError {
    pub(crate) fn new(
        path: impl Into<Utf8PathBuf>,
        error: atomicwrites::Error<std::io::Error>,
    ) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// The file that couldn't be written.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse mortem config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurred while discovering tests.
#[derive(Debug, Error)]
pub enum TestDiscoveryError {
    /// A directory couldn't be read.
    #[error("failed to read directory `{path}`")]
    ReadDir {
        /// The directory.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A test directory has no usable name.
    #[error("test directory `{path}` has no name")]
    NoTestName {
        /// The test directory.
        path: Utf8PathBuf,
    },

    /// A test directory couldn't be located relative to a testing directory.
    #[error("cannot determine the testing directory for test `{path}`")]
    NoTestingDirectory {
        /// The test directory.
        path: Utf8PathBuf,
    },
}

/// An error that occurred while writing a report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteReportError {
    /// An error occurred while writing to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// A summary couldn't be serialized.
    #[error("error serializing summary for test `{test_name}`")]
    Json {
        /// The test being reported.
        test_name: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}
