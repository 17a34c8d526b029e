// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test descriptors and discovery.
//!
//! A testing directory is laid out as:
//!
//! ```text
//! <testing>/
//!   utils/sanitizer.sh
//!   pluto/
//!     <test>/
//!       <host>.console.txt      reference output
//!       <host>run.sh            host scripts
//!       OUTPUT/                 written by the test run
//! ```

use crate::{config::TestsConfig, errors::TestDiscoveryError};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::debug;

/// The suffix of reference and sanitized console output files.
pub const CONSOLE_TXT_SUFFIX: &str = ".console.txt";

/// Describes a single test: where its reference output lives, where the run's output went, and
/// which hosts took part.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TestDescriptor {
    name: String,
    directory: String,
    testing_directory: Utf8PathBuf,
    test_directory: Utf8PathBuf,
    output_directory: Utf8PathBuf,
    host_names: Vec<String>,
}

impl TestDescriptor {
    /// Creates a descriptor for the test `name` in `testing_directory`, with the given hosts.
    ///
    /// The hosts are evaluated in the order provided.
    pub fn new(
        testing_directory: impl Into<Utf8PathBuf>,
        name: impl Into<String>,
        host_names: Vec<String>,
        config: &TestsConfig,
    ) -> Self {
        let testing_directory = testing_directory.into();
        let name = name.into();
        let test_directory = testing_directory.join(config.directory()).join(&name);
        let output_directory = test_directory.join(config.output_directory());
        Self {
            directory: format!("{}/{}", config.directory(), name),
            name,
            testing_directory,
            test_directory,
            output_directory,
            host_names,
        }
    }

    /// Reads the test in `test_directory`, discovering its hosts.
    ///
    /// If `testing_directory` isn't specified, it is the grandparent of `test_directory`.
    pub fn from_test_directory(
        test_directory: &Utf8Path,
        testing_directory: Option<&Utf8Path>,
        config: &TestsConfig,
    ) -> Result<Self, TestDiscoveryError> {
        let name = test_directory
            .file_name()
            .ok_or_else(|| TestDiscoveryError::NoTestName {
                path: test_directory.to_owned(),
            })?;
        let testing_directory = match testing_directory {
            Some(dir) => dir.to_owned(),
            None => test_directory
                .parent()
                .and_then(Utf8Path::parent)
                .ok_or_else(|| TestDiscoveryError::NoTestingDirectory {
                    path: test_directory.to_owned(),
                })?
                .to_owned(),
        };
        let host_names = discover_hosts(test_directory, config.host_scripts())?;
        debug!(
            "test {name} in {test_directory} has hosts {}",
            host_names.join(",")
        );

        Ok(Self {
            directory: format!("{}/{}", config.directory(), name),
            name: name.to_owned(),
            testing_directory,
            test_directory: test_directory.to_owned(),
            output_directory: test_directory.join(config.output_directory()),
            host_names,
        })
    }

    /// The test's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The test's directory relative to the testing directory, for example `pluto/basic-01`.
    /// Used to label diffs.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// The testing directory this test belongs to.
    pub fn testing_directory(&self) -> &Utf8Path {
        &self.testing_directory
    }

    /// The directory the test was read from.
    pub fn test_directory(&self) -> &Utf8Path {
        &self.test_directory
    }

    /// The directory the test run writes its output to.
    pub fn output_directory(&self) -> &Utf8Path {
        &self.output_directory
    }

    /// The hosts taking part in the test.
    pub fn host_names(&self) -> &[String] {
        &self.host_names
    }

    /// The directory holding the test's reference output.
    pub fn reference_directory(&self) -> Utf8PathBuf {
        self.testing_directory.join(&self.directory)
    }

    /// The path of the reference console output for `host`.
    pub fn expected_output_path(&self, host: &str) -> Utf8PathBuf {
        self.reference_directory()
            .join(format!("{host}{CONSOLE_TXT_SUFFIX}"))
    }

    /// Resolves `path` against the testing directory. Absolute paths are returned unchanged.
    pub fn testing_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.testing_directory.join(path)
    }
}

fn discover_hosts(
    test_directory: &Utf8Path,
    host_scripts: &[String],
) -> Result<Vec<String>, TestDiscoveryError> {
    let mut hosts = BTreeSet::new();
    for file_name in read_dir_names(test_directory, false)? {
        let host = file_name.strip_suffix(CONSOLE_TXT_SUFFIX).or_else(|| {
            host_scripts
                .iter()
                .find_map(|suffix| file_name.strip_suffix(suffix.as_str()))
        });
        match host {
            Some(host) if !host.is_empty() => {
                hosts.insert(host.to_owned());
            }
            _ => {}
        }
    }
    Ok(hosts.into_iter().collect())
}

// Returns the names of the entries of `dir` that are (or aren't) directories, sorted.
fn read_dir_names(dir: &Utf8Path, directories: bool) -> Result<Vec<String>, TestDiscoveryError> {
    let read_dir_err = |error: std::io::Error| TestDiscoveryError::ReadDir {
        path: dir.to_owned(),
        error,
    };

    let mut names = Vec::new();
    for entry in dir.read_dir_utf8().map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        let file_type = entry.file_type().map_err(read_dir_err)?;
        if file_type.is_dir() == directories {
            names.push(entry.file_name().to_owned());
        }
    }
    names.sort_unstable();
    Ok(names)
}

/// The tests to evaluate.
#[derive(Clone, Debug)]
pub struct TestList {
    tests: Vec<TestDescriptor>,
}

impl TestList {
    /// Creates a test list from the given test directories, in the order provided.
    pub fn from_test_directories<'a>(
        test_directories: impl IntoIterator<Item = &'a Utf8Path>,
        testing_directory: Option<&Utf8Path>,
        config: &TestsConfig,
    ) -> Result<Self, TestDiscoveryError> {
        let tests = test_directories
            .into_iter()
            .map(|dir| TestDescriptor::from_test_directory(dir, testing_directory, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { tests })
    }

    /// Discovers every test in `testing_directory`, sorted by name.
    pub fn from_testing_directory(
        testing_directory: &Utf8Path,
        config: &TestsConfig,
    ) -> Result<Self, TestDiscoveryError> {
        let tests_directory = testing_directory.join(config.directory());
        let tests = read_dir_names(&tests_directory, true)?
            .into_iter()
            .map(|name| {
                TestDescriptor::from_test_directory(
                    &tests_directory.join(name),
                    Some(testing_directory),
                    config,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!("found {} tests in {tests_directory}", tests.len());
        Ok(Self { tests })
    }

    /// Iterates over the tests.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestDescriptor> {
        self.tests.iter()
    }

    /// The number of tests.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if there are no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// The tests of a previously recorded run, keyed by test name.
#[derive(Clone, Debug, Default)]
pub struct BaselineTests {
    tests: IndexMap<String, TestDescriptor>,
}

impl BaselineTests {
    /// Discovers every test in the baseline `testing_directory`.
    pub fn from_testing_directory(
        testing_directory: &Utf8Path,
        config: &TestsConfig,
    ) -> Result<Self, TestDiscoveryError> {
        let list = TestList::from_testing_directory(testing_directory, config)?;
        Ok(list.tests.into_iter().collect())
    }

    /// Returns the baseline test called `name`.
    pub fn get(&self, name: &str) -> Option<&TestDescriptor> {
        self.tests.get(name)
    }

    /// The number of tests in the baseline.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Returns true if the baseline has no tests.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

impl FromIterator<TestDescriptor> for BaselineTests {
    fn from_iter<T: IntoIterator<Item = TestDescriptor>>(iter: T) -> Self {
        let tests = iter
            .into_iter()
            .map(|test| (test.name.clone(), test))
            .collect();
        Self { tests }
    }
}
