// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use mortem_metadata::MortemExitCode;
use mortem_runner::errors::*;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that mortem expects may happen, as opposed to a bug in mortem itself.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("test directory not found")]
    TestDirectoryNotFound {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test discovery error")]
    TestDiscoveryError {
        #[from]
        err: TestDiscoveryError,
    },
    #[error("baseline discovery error")]
    BaselineDiscoveryError {
        baseline: Utf8PathBuf,
        #[source]
        err: TestDiscoveryError,
    },
    #[error("error saving results")]
    SaveError {
        #[from]
        err: SaveError,
    },
    #[error("error writing report")]
    WriteReportError {
        #[from]
        err: WriteReportError,
    },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::TestDirectoryNotFound { .. }
            | Self::ConfigParseError { .. }
            | Self::TestDiscoveryError { .. }
            | Self::BaselineDiscoveryError { .. } => MortemExitCode::SETUP_ERROR,
            Self::SaveError { .. } | Self::WriteReportError { .. } => {
                MortemExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::TestDirectoryNotFound { path, err } => {
                error!("test directory `{}` not found", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::TestDiscoveryError { err } => {
                error!("failed to discover tests");
                Some(err as &dyn Error)
            }
            Self::BaselineDiscoveryError { baseline, err } => {
                error!(
                    "failed to discover baseline tests in `{}`",
                    baseline.style(styles.bold)
                );
                Some(err as &dyn Error)
            }
            Self::SaveError { err } => {
                error!(
                    "failed to save results to `{}`",
                    err.path().style(styles.bold)
                );
                err.source()
            }
            Self::WriteReportError { err } => {
                error!("failed to write report");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
