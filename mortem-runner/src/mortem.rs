// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Comparing a test result against a baseline run.
//!
//! The aim is that grepping the report for `baseline` shows every regression and progression:
//!
//! * the test passing where the baseline failed,
//! * the test failing where the baseline passed,
//! * the test and the baseline both failing, but differently.
//!
//! The test and the baseline failing the same way is not interesting, and isn't reported.

use crate::{
    issues::{BASELINE_HOST, IssueKind},
    sanitizer::Sanitizer,
    test_list::{BaselineTests, TestDescriptor},
    test_result::{EvaluateOptions, TestResult, sanitized_console_file_name},
    text_diff,
};
use mortem_metadata::ResolutionKind;
use tracing::debug;

/// Evaluates `test`, then compares the result against the same test in `baseline`, if
/// provided.
///
/// Baseline results are always evaluated in quick mode, reusing their saved sanitized output
/// and diffs: re-sanitizing an old run with the current sanitizer and reference output tends to
/// turn baseline passes into confusing failures.
pub fn mortem(
    test: &TestDescriptor,
    sanitizer: &dyn Sanitizer,
    options: &EvaluateOptions,
    baseline: Option<&BaselineTests>,
) -> TestResult {
    let mut result = TestResult::evaluate(test, sanitizer, options);
    if !result.is_attempted() {
        return result;
    }
    let Some(baseline) = baseline else {
        return result;
    };

    let Some(baseline_test) = baseline.get(test.name()) else {
        debug!("test {} is absent from the baseline", test.name());
        result.issues_mut().add(IssueKind::Absent, BASELINE_HOST);
        return result;
    };

    let baseline_options = EvaluateOptions {
        quick: true,
        output_directory: None,
    };
    let baseline_result = TestResult::evaluate(baseline_test, sanitizer, &baseline_options);
    compare_with_baseline(&mut result, &baseline_result);
    result
}

/// Adds issues to `result` describing how it differs from `baseline`, a result for the same
/// test from a baseline run.
///
/// Diffs are left alone: a host's diff remains the one against the reference output.
pub fn compare_with_baseline(result: &mut TestResult, baseline: &TestResult) {
    for (issue, host) in baseline_issues(result, baseline) {
        result.issues_mut().add(issue, host);
    }
}

fn baseline_issues(result: &TestResult, baseline: &TestResult) -> Vec<(IssueKind, String)> {
    match baseline.resolution().kind() {
        Some(ResolutionKind::Passed | ResolutionKind::Failed) => {}
        Some(kind) => {
            return vec![(IssueKind::BaselineResolution(kind), BASELINE_HOST.to_owned())];
        }
        None => return Vec::new(),
    }

    if result.resolution() == ResolutionKind::Passed
        && baseline.resolution() == ResolutionKind::Passed
    {
        return Vec::new();
    }

    let mut issues = Vec::new();
    for host in result.test().host_names() {
        if let Some(issue) = compare_host(result, baseline, host) {
            issues.push((issue, host.clone()));
        }
    }
    issues
}

fn compare_host(result: &TestResult, baseline: &TestResult, host: &str) -> Option<IssueKind> {
    let failed = |result: &TestResult| result.diffs().contains_key(host);

    let Some(output) = result.sanitized_output().get(host) else {
        // No output to compare, but the baseline's status is still of interest.
        if !baseline.sanitized_output().contains_key(host) {
            return None;
        }
        return Some(if failed(baseline) {
            IssueKind::BaselineFailed
        } else {
            IssueKind::BaselinePassed
        });
    };
    let Some(baseline_output) = baseline.sanitized_output().get(host) else {
        return Some(IssueKind::BaselineMissing);
    };

    match (failed(result), failed(baseline)) {
        (false, true) => Some(IssueKind::BaselineFailed),
        (false, false) => None,
        (true, false) => Some(IssueKind::BaselinePassed),
        (true, true) => {
            let file_name = sanitized_console_file_name(host);
            let directory = result.test().directory();
            let diff = text_diff::diff(
                &format!("BASELINE/{directory}/{file_name}"),
                baseline_output,
                &format!("OUTPUT/{directory}/{file_name}"),
                output,
            );
            if diff.is_empty() {
                debug!("host {host} failed the same way as the baseline");
                None
            } else if text_diff::whitespace_equal(baseline_output, output) {
                Some(IssueKind::BaselineWhitespace)
            } else {
                Some(IssueKind::BaselineDifferent)
            }
        }
    }
}
