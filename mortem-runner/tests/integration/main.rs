// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests driving mortem-runner against testing directories on disk.

mod baseline;
mod basic;
mod fixtures;
