// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, ValueEnum};
use mortem_metadata::MortemExitCode;
use mortem_runner::{
    config::MortemConfig,
    errors::{TestDiscoveryError, WriteReportError},
    mortem::mortem,
    reporter::{MessageFormat, ResultReporterBuilder},
    sanitizer::ExternalSanitizer,
    test_list::{BaselineTests, TestList},
    test_result::EvaluateOptions,
};
use std::io::Write;
use tracing::debug;

/// Classify the results of multi-host protocol-daemon test runs.
///
/// For each test directory, examine the run's output directory and report whether the test
/// passed, failed or is unresolved, along with the issues found on each host.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100,
)]
pub struct MortemApp {
    /// Test directories to evaluate
    #[arg(value_name = "TEST-DIRS", required = true)]
    test_directories: Vec<Utf8PathBuf>,

    #[command(flatten)]
    run_opts: RunOpts,

    #[command(flatten)]
    reporter_opts: ReporterOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    output: OutputOpts,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Evaluation options")]
struct RunOpts {
    /// Testing directory [default: the grandparent of each test directory]
    #[arg(long, value_name = "DIR")]
    testing_directory: Option<Utf8PathBuf>,

    /// Compare results against the same tests in this baseline testing directory
    #[arg(long, value_name = "DIR")]
    baseline: Option<Utf8PathBuf>,

    /// Reuse previously saved sanitized output and diffs
    #[arg(long)]
    quick: bool,

    /// Save sanitized output and diffs to each test's output directory
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Reporter options")]
struct ReporterOpts {
    /// Print each host's diff after the test's result
    #[arg(long)]
    print_diffs: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormatOpts,
}

impl ReporterOpts {
    fn to_builder(&self, should_colorize: bool) -> ResultReporterBuilder {
        let mut builder = ResultReporterBuilder::default();
        builder
            .set_message_format(self.message_format.into())
            .set_print_diffs(self.print_diffs)
            .set_colorize(should_colorize);
        builder
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    /// One line per test: directory, resolution and issues
    #[default]
    Human,
    /// One JSON summary per line
    Json,
}

impl From<MessageFormatOpts> for MessageFormat {
    fn from(format: MessageFormatOpts) -> Self {
        match format {
            MessageFormatOpts::Human => Self::Human,
            MessageFormatOpts::Json => Self::Json,
        }
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file [default: testing-directory/.config/mortem.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, testing_directory: &Utf8Path) -> Result<MortemConfig> {
        Ok(MortemConfig::from_sources(
            testing_directory,
            self.config_file.as_deref(),
        )?)
    }
}

impl MortemApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let test_directories = self
            .test_directories
            .iter()
            .map(|dir| {
                dir.canonicalize_utf8()
                    .map_err(|err| ExpectedError::TestDirectoryNotFound {
                        path: dir.clone(),
                        err,
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let config_directory = match &self.run_opts.testing_directory {
            Some(dir) => dir.clone(),
            None => config_directory(&test_directories)?,
        };
        debug!("reading config from testing directory {config_directory}");
        let config = self.config_opts.make_config(&config_directory)?;

        let tests = TestList::from_test_directories(
            test_directories.iter().map(Utf8PathBuf::as_path),
            self.run_opts.testing_directory.as_deref(),
            config.tests(),
        )?;
        let baseline = self
            .run_opts
            .baseline
            .as_deref()
            .map(|baseline| {
                BaselineTests::from_testing_directory(baseline, config.tests()).map_err(|err| {
                    ExpectedError::BaselineDiscoveryError {
                        baseline: baseline.to_owned(),
                        err,
                    }
                })
            })
            .transpose()?;

        let sanitizer = ExternalSanitizer::from_config(config.sanitizer());
        let options = EvaluateOptions {
            quick: self.run_opts.quick,
            output_directory: None,
        };
        let mut reporter = self
            .reporter_opts
            .to_builder(output.color.should_colorize(supports_color::Stream::Stdout))
            .build();

        {
            let mut stdout = output_writer.stdout_writer();
            for test in tests.iter() {
                let result = mortem(test, &sanitizer, &options, baseline.as_ref());
                if self.run_opts.save {
                    result.save()?;
                }
                reporter.report(&result, &mut stdout)?;
            }
            stdout.flush().map_err(WriteReportError::Io)?;
        }

        let mut stderr = output_writer.stderr_writer();
        reporter.write_stats(&mut stderr)?;
        stderr.flush().map_err(WriteReportError::Io)?;

        if reporter.run_stats().has_failures() {
            Ok(MortemExitCode::TEST_RUN_FAILED)
        } else {
            Ok(MortemExitCode::OK)
        }
    }
}

/// Config is read from the testing directory of the first test: the grandparent of its test
/// directory.
fn config_directory(test_directories: &[Utf8PathBuf]) -> Result<Utf8PathBuf> {
    let Some(first) = test_directories.first() else {
        return Ok(Utf8PathBuf::from("."));
    };
    let testing_directory = first
        .parent()
        .and_then(Utf8Path::parent)
        .ok_or_else(|| TestDiscoveryError::NoTestingDirectory {
            path: first.clone(),
        })?;
    Ok(testing_directory.to_owned())
}
