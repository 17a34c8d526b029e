// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for mortem-runner.

use std::process::ExitStatus;

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }
}

// "exited with"/"terminated via"
pub(crate) fn display_exited_with(exit_status: ExitStatus) -> String {
    match exit_status.code() {
        Some(code) => format!("exited with exit code {code}"),
        None => display_signal(exit_status),
    }
}

#[cfg(unix)]
fn display_signal(exit_status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match exit_status.signal() {
        Some(signal) => format!("terminated via signal {signal}"),
        None => "exited with an unknown error".to_owned(),
    }
}

#[cfg(not(unix))]
fn display_signal(_exit_status: ExitStatus) -> String {
    "exited with an unknown error".to_owned()
}
