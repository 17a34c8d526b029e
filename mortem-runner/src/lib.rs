// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `mortem`, a post-mortem classifier for multi-host protocol-daemon
//! test runs.
//!
//! The basic flow is:
//!
//! 1. Discover the tests with [`test_list::TestList`].
//! 2. Evaluate each test with [`test_result::TestResult::evaluate`], which scans the captured
//!    logs for crashes and checks that each host's sanitized console output matches the
//!    reference output.
//! 3. Optionally compare the result against a baseline run with [`mortem::mortem`].
//! 4. Report with [`reporter::ResultReporter`] and persist with [`test_result::TestResult::save`].

pub mod artifact;
pub mod config;
pub mod errors;
mod helpers;
pub mod issues;
pub mod mortem;
pub mod reporter;
pub mod resolution;
pub mod sanitizer;
pub mod test_list;
pub mod test_result;
pub mod text_diff;

#[cfg(test)]
mod test_helpers;
