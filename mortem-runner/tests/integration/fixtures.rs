// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use bstr::ByteSlice;
use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Context, Result};
use mortem_runner::{
    config::MortemConfig,
    errors::SanitizeError,
    sanitizer::Sanitizer,
    test_list::TestDescriptor,
    test_result::{DONE_MARKER, raw_console_file_name},
};

/// A testing directory on disk, laid out as the default config expects.
pub(crate) struct TestingDirectory {
    dir: Utf8TempDir,
    config: MortemConfig,
}

impl TestingDirectory {
    pub(crate) fn new() -> Result<Self> {
        let dir = camino_tempfile::Builder::new()
            .prefix("mortem-testing-")
            .tempdir()
            .wrap_err("failed to create testing directory")?;
        Ok(Self {
            dir,
            config: MortemConfig::default_config(),
        })
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn config(&self) -> &MortemConfig {
        &self.config
    }

    /// Adds a test whose hosts each have an init script and the given reference output.
    pub(crate) fn add_test(&self, name: &str, references: &[(&str, &str)]) -> Result<TestDir> {
        let path = self.path().join(self.config.tests().directory()).join(name);
        std::fs::create_dir_all(&path)?;
        for (host, reference) in references {
            std::fs::write(path.join(format!("{host}init.sh")), "ipsec start\n")?;
            std::fs::write(path.join(format!("{host}.console.txt")), reference)?;
        }
        Ok(TestDir {
            output: path.join(self.config.tests().output_directory()),
            path,
        })
    }

    pub(crate) fn descriptor(&self, test: &TestDir) -> Result<TestDescriptor> {
        Ok(TestDescriptor::from_test_directory(
            &test.path,
            None,
            self.config.tests(),
        )?)
    }
}

/// A single test's directory.
pub(crate) struct TestDir {
    path: Utf8PathBuf,
    output: Utf8PathBuf,
}

impl TestDir {
    /// Writes a file into the output directory, as a test run would.
    pub(crate) fn write_output(&self, file_name: &str, contents: impl AsRef<[u8]>) -> Result<()> {
        std::fs::create_dir_all(&self.output)?;
        std::fs::write(self.output.join(file_name), contents)?;
        Ok(())
    }

    /// Writes a host's console capture: the given lines with CRLF endings, then the done marker.
    pub(crate) fn write_console(&self, host: &str, lines: &[&str]) -> Result<()> {
        let mut contents = String::new();
        for line in lines {
            contents.push_str(line);
            contents.push_str("\r\n");
        }
        contents.push_str(DONE_MARKER);
        contents.push_str("\r\n");
        self.write_output(&raw_console_file_name(host), contents)
    }

    pub(crate) fn read_output(&self, file_name: &str) -> Result<String> {
        let path = self.output.join(file_name);
        std::fs::read_to_string(&path).wrap_err_with(|| format!("failed to read {path}"))
    }
}

/// Sanitizes in-process: strips carriage returns and the done marker.
pub(crate) struct LineEndingSanitizer;

impl Sanitizer for LineEndingSanitizer {
    fn sanitize(
        &self,
        raw_path: &Utf8Path,
        _test: &TestDescriptor,
    ) -> Result<Vec<u8>, SanitizeError> {
        let raw = std::fs::read(raw_path).map_err(|error| SanitizeError::Exec {
            command: format!("read {raw_path}"),
            error,
        })?;
        let mut sanitized = Vec::with_capacity(raw.len());
        for line in raw.lines() {
            if line == DONE_MARKER.as_bytes() {
                continue;
            }
            sanitized.extend_from_slice(line);
            sanitized.push(b'\n');
        }
        Ok(sanitized)
    }
}

/// Fails every call. Used to check that quick mode doesn't sanitize.
pub(crate) struct FailingSanitizer;

impl Sanitizer for FailingSanitizer {
    fn sanitize(
        &self,
        raw_path: &Utf8Path,
        _test: &TestDescriptor,
    ) -> Result<Vec<u8>, SanitizeError> {
        Err(SanitizeError::Stderr {
            command: format!("failing-sanitizer {raw_path}"),
            stderr: "always fails\n".to_owned(),
        })
    }
}
