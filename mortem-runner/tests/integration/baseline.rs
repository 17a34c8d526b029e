// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use mortem_metadata::ResolutionKind;
use mortem_runner::{
    mortem::mortem,
    test_list::{BaselineTests, TestList},
    test_result::{EvaluateOptions, TestResult},
};
use pretty_assertions::assert_eq;

const EAST_REFERENCE: &str = "east #\n ipsec auto --up road\n";
const WEST_REFERENCE: &str = "west #\n ipsec whack --trafficstatus\n";

const EAST_GOOD: &[&str] = &["east #", " ipsec auto --up road"];
const WEST_GOOD: &[&str] = &["west #", " ipsec whack --trafficstatus"];
const WEST_BAD: &[&str] = &["west #", " ipsec whack --trafficstatus", "no SA"];

/// Sets up a run of `basic-01`, plus `only-in-run-01` when `extra` is set, with west
/// producing the given output.
fn setup_run(west: &[&str], extra: bool) -> Result<TestingDirectory> {
    let testing = TestingDirectory::new()?;
    let dir = testing.add_test("basic-01", &[
        ("east", EAST_REFERENCE),
        ("west", WEST_REFERENCE),
    ])?;
    dir.write_console("east", EAST_GOOD)?;
    dir.write_console("west", west)?;
    if extra {
        let dir = testing.add_test("only-in-run-01", &[("east", EAST_REFERENCE)])?;
        dir.write_console("east", EAST_GOOD)?;
    }
    Ok(testing)
}

/// Evaluates and saves every test in `testing`, as a previous run would have.
fn save_baseline(testing: &TestingDirectory) -> Result<BaselineTests> {
    let config = testing.config().tests();
    for test in TestList::from_testing_directory(testing.path(), config)?.iter() {
        TestResult::evaluate(test, &LineEndingSanitizer, &EvaluateOptions::default()).save()?;
    }
    Ok(BaselineTests::from_testing_directory(testing.path(), config)?)
}

fn run_against(
    testing: &TestingDirectory,
    baseline: &BaselineTests,
) -> Result<Vec<(String, Option<ResolutionKind>, String)>> {
    let tests = TestList::from_testing_directory(testing.path(), testing.config().tests())?;
    Ok(tests
        .iter()
        .map(|test| {
            let result = mortem(
                test,
                &LineEndingSanitizer,
                &EvaluateOptions::default(),
                Some(baseline),
            );
            (
                result.test().name().to_owned(),
                result.resolution().kind(),
                result.issues().to_string(),
            )
        })
        .collect())
}

#[test]
fn progression_against_baseline() -> Result<()> {
    let baseline = setup_run(WEST_BAD, false)?;
    let baseline_tests = save_baseline(&baseline)?;
    assert_eq!(baseline_tests.len(), 1);

    let run = setup_run(WEST_GOOD, true)?;
    assert_eq!(run_against(&run, &baseline_tests)?, vec![
        (
            "basic-01".to_owned(),
            Some(ResolutionKind::Passed),
            "west:baseline-failed".to_owned(),
        ),
        (
            "only-in-run-01".to_owned(),
            Some(ResolutionKind::Passed),
            "baseline:absent".to_owned(),
        ),
    ]);

    Ok(())
}

#[test]
fn regression_against_baseline() -> Result<()> {
    let baseline = setup_run(WEST_GOOD, false)?;
    let baseline_tests = save_baseline(&baseline)?;

    let run = setup_run(WEST_BAD, false)?;
    assert_eq!(run_against(&run, &baseline_tests)?, vec![(
        "basic-01".to_owned(),
        Some(ResolutionKind::Failed),
        "west:baseline-passed,output-different".to_owned(),
    )]);

    Ok(())
}

#[test]
fn same_failure_as_baseline() -> Result<()> {
    let baseline = setup_run(WEST_BAD, false)?;
    let baseline_tests = save_baseline(&baseline)?;

    let run = setup_run(WEST_BAD, false)?;
    assert_eq!(run_against(&run, &baseline_tests)?, vec![(
        "basic-01".to_owned(),
        Some(ResolutionKind::Failed),
        "west:output-different".to_owned(),
    )]);

    Ok(())
}

#[test]
fn untested_baseline() -> Result<()> {
    // The baseline test exists, but was never run.
    let baseline = TestingDirectory::new()?;
    baseline.add_test("basic-01", &[
        ("east", EAST_REFERENCE),
        ("west", WEST_REFERENCE),
    ])?;
    let baseline_tests =
        BaselineTests::from_testing_directory(baseline.path(), baseline.config().tests())?;

    let run = setup_run(WEST_GOOD, false)?;
    assert_eq!(run_against(&run, &baseline_tests)?, vec![(
        "basic-01".to_owned(),
        Some(ResolutionKind::Passed),
        "baseline:untested".to_owned(),
    )]);

    Ok(())
}
