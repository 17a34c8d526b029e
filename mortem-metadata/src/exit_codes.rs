// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `mortem` failures.
///
/// `mortem` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum MortemExitCode {}

impl MortemExitCode {
    /// Every attempted test passed.
    pub const OK: i32 = 0;

    /// One or more tests failed or could not be resolved.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// A user issue happened while setting up a mortem invocation, for example an unreadable
    /// config file or a test directory that doesn't exist.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout, stderr or the output directory produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
