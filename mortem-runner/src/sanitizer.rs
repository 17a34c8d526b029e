// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sanitizing raw console output.
//!
//! The sanitization rules live in an external program; mortem only invokes it and reacts to
//! the outcome.

use crate::{config::SanitizerConfig, errors::SanitizeError, test_list::TestDescriptor};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use tracing::{debug, trace};

/// Normalizes a host's raw console output so that it can be compared against reference output.
pub trait Sanitizer {
    /// Sanitizes the raw console output at `raw_path`, captured while running `test`.
    fn sanitize(
        &self,
        raw_path: &Utf8Path,
        test: &TestDescriptor,
    ) -> Result<Vec<u8>, SanitizeError>;
}

impl<S: Sanitizer + ?Sized> Sanitizer for &S {
    fn sanitize(
        &self,
        raw_path: &Utf8Path,
        test: &TestDescriptor,
    ) -> Result<Vec<u8>, SanitizeError> {
        (**self).sanitize(raw_path, test)
    }
}

/// A [`Sanitizer`] that runs an external program as `<program> <raw-path> <reference-dir>`.
///
/// The program's standard output is the sanitized output. Exiting with a non-zero status, or
/// writing anything at all to standard error, is a failure.
#[derive(Clone, Debug)]
pub struct ExternalSanitizer {
    program: Utf8PathBuf,
}

impl ExternalSanitizer {
    /// Creates a sanitizer running `program`. A relative path is resolved against each test's
    /// testing directory.
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Creates a sanitizer from the config.
    pub fn from_config(config: &SanitizerConfig) -> Self {
        Self::new(config.program())
    }

    /// The program, as configured.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Returns the program and arguments used to sanitize `raw_path` for `test`.
    pub fn command_line(&self, raw_path: &Utf8Path, test: &TestDescriptor) -> Vec<Utf8PathBuf> {
        vec![
            test.testing_path(&self.program),
            raw_path.to_owned(),
            test.reference_directory(),
        ]
    }

    /// Convert the command to a [`duct::Expression`].
    pub fn to_expression(&self, raw_path: &Utf8Path, test: &TestDescriptor) -> duct::Expression {
        duct::cmd(
            test.testing_path(&self.program).into_std_path_buf(),
            [raw_path.to_owned(), test.reference_directory()],
        )
    }
}

impl Sanitizer for ExternalSanitizer {
    fn sanitize(
        &self,
        raw_path: &Utf8Path,
        test: &TestDescriptor,
    ) -> Result<Vec<u8>, SanitizeError> {
        let command = self.command_line(raw_path, test).iter().join(" ");
        debug!("sanitize command: {command}");

        let expression = self.to_expression(raw_path, test);
        trace!("Executing command: {:?}", expression);
        let output = expression
            .stdin_null()
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| SanitizeError::Exec {
                command: command.clone(),
                error,
            })?;
        trace!("sanitized output:\n{}", String::from_utf8_lossy(&output.stdout));

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !output.status.success() {
            return Err(SanitizeError::Failed {
                command,
                status: output.status,
                stderr,
            });
        }
        if !stderr.is_empty() {
            return Err(SanitizeError::Stderr { command, stderr });
        }
        Ok(output.stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::MortemConfig;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;

    fn setup(script: &str) -> (Utf8TempDir, TestDescriptor, Utf8PathBuf) {
        let testing = Utf8TempDir::new().expect("should create the temp dir successfully");
        let config = MortemConfig::default_config();

        let program = testing.path().join("utils/sanitizer.sh");
        std::fs::create_dir_all(program.parent().unwrap()).unwrap();
        std::fs::write(&program, script).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let test = TestDescriptor::new(testing.path(), "basic-01", Vec::new(), config.tests());
        let raw_path = test.output_directory().join("east.console.verbose.txt");
        std::fs::create_dir_all(test.output_directory()).unwrap();
        std::fs::write(&raw_path, "east # ipsec up\r\n").unwrap();

        (testing, test, raw_path)
    }

    #[test]
    fn test_sanitize_success() {
        let (_testing, test, raw_path) = setup(indoc! {r#"
            #!/bin/sh
            echo "reference: $(basename "$2")"
            tr -d '\r' < "$1"
        "#});
        let sanitizer = ExternalSanitizer::new("utils/sanitizer.sh");
        let output = sanitizer
            .sanitize(&raw_path, &test)
            .expect("sanitizer should succeed");
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "reference: basic-01\neast # ipsec up\n"
        );
    }

    #[test]
    fn test_sanitize_exit_failure() {
        let (_testing, test, raw_path) = setup(indoc! {r#"
            #!/bin/sh
            echo partial
            echo "cannot sanitize" >&2
            exit 3
        "#});
        let sanitizer = ExternalSanitizer::new("utils/sanitizer.sh");
        let err = sanitizer
            .sanitize(&raw_path, &test)
            .expect_err("sanitizer should fail");
        match err {
            SanitizeError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "cannot sanitize\n");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_sanitize_stderr_is_failure() {
        let (_testing, test, raw_path) = setup(indoc! {r#"
            #!/bin/sh
            cat "$1"
            echo "warning: odd input" >&2
        "#});
        let sanitizer = ExternalSanitizer::new("utils/sanitizer.sh");
        let err = sanitizer
            .sanitize(&raw_path, &test)
            .expect_err("stderr output should fail");
        assert!(
            matches!(&err, SanitizeError::Stderr { stderr, .. } if stderr == "warning: odd input\n"),
            "unexpected error {err:?}"
        );
    }

    #[test]
    fn test_fail_to_spawn() {
        let (testing, test, raw_path) = setup("#!/bin/sh\n");
        // No OS will allow executing a directory.
        let sanitizer = ExternalSanitizer::new(testing.path().join("utils"));
        let err = sanitizer
            .sanitize(&raw_path, &test)
            .expect_err("a directory can't be executed");
        assert!(
            matches!(err, SanitizeError::Exec { .. }),
            "unexpected error {err:?}"
        );
    }
}
