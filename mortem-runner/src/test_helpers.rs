// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures shared by unit tests.

use crate::{
    config::MortemConfig,
    errors::SanitizeError,
    sanitizer::Sanitizer,
    test_list::TestDescriptor,
    test_result::{DONE_MARKER, raw_console_file_name},
};
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use std::{cell::Cell, collections::HashMap};

/// A testing directory holding a single test.
pub(crate) struct TestFixture {
    testing: Utf8TempDir,
    test: TestDescriptor,
}

impl TestFixture {
    pub(crate) fn new(name: &str, hosts: &[&str]) -> Self {
        let testing = Utf8TempDir::new().expect("created temp dir");
        let config = MortemConfig::default_config();
        let hosts = hosts.iter().map(|&host| host.to_owned()).collect();
        let test = TestDescriptor::new(testing.path(), name, hosts, config.tests());
        std::fs::create_dir_all(test.test_directory()).expect("created test directory");
        Self { testing, test }
    }

    pub(crate) fn testing_directory(&self) -> &Utf8Path {
        self.testing.path()
    }

    pub(crate) fn test(&self) -> &TestDescriptor {
        &self.test
    }

    pub(crate) fn create_output_directory(&self) -> &Utf8Path {
        let output_directory = self.test.output_directory();
        std::fs::create_dir_all(output_directory).expect("created output directory");
        output_directory
    }

    /// Writes `file_name` into the output directory, creating it if needed.
    pub(crate) fn write_output(&self, file_name: &str, contents: impl AsRef<[u8]>) -> Utf8PathBuf {
        let path = self.create_output_directory().join(file_name);
        std::fs::write(&path, contents).expect("wrote output file");
        path
    }

    /// Writes complete raw console output for `host`: `body` followed by the done marker.
    pub(crate) fn write_raw_console(&self, host: &str, body: &str) -> Utf8PathBuf {
        self.write_output(
            &raw_console_file_name(host),
            format!("{body}\n{DONE_MARKER}\n"),
        )
    }

    pub(crate) fn write_reference(&self, host: &str, contents: &str) {
        std::fs::write(self.test.expected_output_path(host), contents)
            .expect("wrote reference output");
    }
}

/// A [`Sanitizer`] returning canned output per host, and failing for any other host.
#[derive(Debug, Default)]
pub(crate) struct FakeSanitizer {
    outputs: HashMap<String, Vec<u8>>,
    calls: Cell<usize>,
}

impl FakeSanitizer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_output(mut self, host: &str, output: impl Into<Vec<u8>>) -> Self {
        self.outputs.insert(host.to_owned(), output.into());
        self
    }

    /// The number of times `sanitize` was called.
    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Sanitizer for FakeSanitizer {
    fn sanitize(
        &self,
        raw_path: &Utf8Path,
        _test: &TestDescriptor,
    ) -> Result<Vec<u8>, SanitizeError> {
        self.calls.set(self.calls.get() + 1);
        let host = raw_path
            .file_name()
            .and_then(|name| name.strip_suffix(".console.verbose.txt"))
            .unwrap_or_default();
        self.outputs
            .get(host)
            .cloned()
            .ok_or_else(|| SanitizeError::Stderr {
                command: format!("fake-sanitizer {raw_path}"),
                stderr: format!("no output for host '{host}'\n"),
            })
    }
}
