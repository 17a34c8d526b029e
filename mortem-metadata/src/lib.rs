// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to mortem's machine-readable output.
//!
//! This crate is deliberately small so that tools consuming `mortem --message-format json`
//! don't need to depend on the evaluation engine itself.

mod exit_codes;
mod summary;

pub use exit_codes::*;
pub use summary::*;
