// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use chrono::NaiveDate;
use color_eyre::eyre::Result;
use indoc::indoc;
use mortem_metadata::ResolutionKind;
use mortem_runner::{
    test_list::TestList,
    test_result::{EvaluateOptions, TestResult},
};
use pretty_assertions::assert_eq;
use std::time::Duration;

const EAST_REFERENCE: &str = indoc! {r#"
    east #
     ipsec auto --up road
    002 "road": initiating Main Mode
"#};

const WEST_REFERENCE: &str = indoc! {"
    west #
     ipsec status | grep road
"};

fn quick() -> EvaluateOptions {
    EvaluateOptions {
        quick: true,
        ..EvaluateOptions::default()
    }
}

#[test]
fn evaluate_save_and_reevaluate_quickly() -> Result<()> {
    let testing = TestingDirectory::new()?;
    let dir = testing.add_test("basic-01", &[
        ("east", EAST_REFERENCE),
        ("west", WEST_REFERENCE),
    ])?;
    dir.write_console("east", &[
        "east #",
        " ipsec auto --up road",
        r#"002 "road": initiating Main Mode"#,
    ])?;
    dir.write_console("west", &["west #", " ipsec status | grep  road"])?;

    let test = testing.descriptor(&dir)?;
    assert_eq!(test.host_names(), ["east", "west"]);

    let result = TestResult::evaluate(&test, &LineEndingSanitizer, &EvaluateOptions::default());
    assert_eq!(result.resolution(), ResolutionKind::Failed);
    assert_eq!(result.issues().to_string(), "west:output-whitespace");

    result.save()?;
    assert_eq!(dir.read_output("east.console.txt")?, EAST_REFERENCE);
    assert_eq!(dir.read_output("east.console.diff")?, "");
    assert_eq!(
        dir.read_output("west.console.diff")?,
        indoc! {"
            --- MASTER/pluto/basic-01/west.console.txt
            +++ OUTPUT/pluto/basic-01/west.console.txt
            @@ -1,2 +1,2 @@
             west #
            - ipsec status | grep road
            + ipsec status | grep  road
        "}
    );

    // Quick mode reuses everything that was saved, so the sanitizer isn't needed.
    let reloaded = TestResult::evaluate(&test, &FailingSanitizer, &quick());
    assert_eq!(reloaded.resolution(), ResolutionKind::Failed);
    assert_eq!(reloaded.issues().to_string(), result.issues().to_string());
    assert_eq!(reloaded.sanitized_output(), result.sanitized_output());
    assert_eq!(reloaded.diffs(), result.diffs());

    Ok(())
}

#[test]
fn quick_without_saved_output_sanitizes() -> Result<()> {
    let testing = TestingDirectory::new()?;
    let dir = testing.add_test("basic-01", &[("east", EAST_REFERENCE)])?;
    dir.write_console("east", &["east #"])?;
    let test = testing.descriptor(&dir)?;

    let result = TestResult::evaluate(&test, &LineEndingSanitizer, &quick());
    assert_eq!(result.resolution(), ResolutionKind::Failed);
    assert_eq!(result.issues().to_string(), "east:output-different");

    let result = TestResult::evaluate(&test, &FailingSanitizer, &quick());
    assert_eq!(result.resolution(), ResolutionKind::Unresolved);
    assert_eq!(result.issues().to_string(), "east:sanitizer-failed");

    Ok(())
}

#[test]
fn discover_and_evaluate_testing_directory() -> Result<()> {
    let testing = TestingDirectory::new()?;
    testing.add_test("basic-01", &[("east", EAST_REFERENCE)])?;
    let partial = testing.add_test("basic-02", &[
        ("east", EAST_REFERENCE),
        ("west", WEST_REFERENCE),
    ])?;
    partial.write_console("east", &[
        "east #",
        " ipsec auto --up road",
        r#"002 "road": initiating Main Mode"#,
    ])?;

    let tests = TestList::from_testing_directory(testing.path(), testing.config().tests())?;
    let results: Vec<_> = tests
        .iter()
        .map(|test| TestResult::evaluate(test, &LineEndingSanitizer, &EvaluateOptions::default()))
        .map(|result| {
            (
                result.test().name().to_owned(),
                result.resolution().kind(),
                result.issues().to_string(),
            )
        })
        .collect();
    assert_eq!(results, vec![
        ("basic-01".to_owned(), Some(ResolutionKind::Untested), String::new()),
        (
            "basic-02".to_owned(),
            Some(ResolutionKind::Unresolved),
            "west:output-missing".to_owned(),
        ),
    ]);

    Ok(())
}

#[test]
fn crashes_and_timings() -> Result<()> {
    let testing = TestingDirectory::new()?;
    let dir = testing.add_test("crash-01", &[("east", EAST_REFERENCE)])?;
    dir.write_console("east", &[
        "east #",
        " ipsec auto --up road",
        r#"002 "road": initiating Main Mode"#,
        "CORE FOUND",
    ])?;
    dir.write_output("east.pluto.log", "| starting\nASSERTION FAILED: st != NULL\n")?;
    dir.write_output(
        "debug.log",
        indoc! {"
            starting debug log at 2018-08-15 13:00:12.275358
            crash-01: stop booting domains after 56.5 seconds
            crash-01: stop running scripts east:eastinit.sh after 22.25 seconds
            crash-01: stop testing crash-01 (test 2 of 756) after 79.5 seconds
            ending debug log at 2018-08-15 13:01:31.602533
        "},
    )?;
    let test = testing.descriptor(&dir)?;

    let result = TestResult::evaluate(&test, &LineEndingSanitizer, &EvaluateOptions::default());
    assert_eq!(result.resolution(), ResolutionKind::Failed);
    assert!(result.issues().iter().any(|issue| issue.is_crash()));
    assert_eq!(
        result.issues().to_string(),
        "east:ASSERTION,CORE,output-different"
    );

    let date = NaiveDate::from_ymd_opt(2018, 8, 15).expect("valid date");
    assert_eq!(
        result.start_time(),
        date.and_hms_micro_opt(13, 0, 12, 275_358)
    );
    assert_eq!(
        result.stop_time(),
        date.and_hms_micro_opt(13, 1, 31, 602_533)
    );
    assert_eq!(result.boot_time(), Some(Duration::from_millis(56_500)));
    assert_eq!(result.script_time(), Some(Duration::from_millis(22_250)));
    assert_eq!(result.runtime(), Some(Duration::from_millis(79_500)));

    let summary = result.summary();
    assert_eq!(summary.runtime, Some(79.5));
    assert_eq!(
        summary.issues.get("east").map(Vec::len),
        Some(3),
        "summary issues: {:?}",
        summary.issues
    );

    Ok(())
}

#[cfg(unix)]
#[test]
fn external_sanitizer() -> Result<()> {
    use mortem_runner::sanitizer::ExternalSanitizer;
    use std::os::unix::fs::PermissionsExt;

    let testing = TestingDirectory::new()?;
    let program = testing.path().join(testing.config().sanitizer().program());
    std::fs::create_dir_all(program.parent().expect("program has a parent"))?;
    std::fs::write(
        &program,
        indoc! {r#"
            #!/bin/sh
            # $2 is the test's reference directory.
            test -f "$2/east.console.txt" || exit 1
            tr -d '\r' < "$1" | grep -v '^>>>>>>>>>>cut'
        "#},
    )?;
    std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755))?;

    let dir = testing.add_test("basic-01", &[("east", EAST_REFERENCE)])?;
    dir.write_console("east", &[
        "east #",
        " ipsec auto --up road",
        r#"002 "road": initiating Main Mode"#,
    ])?;
    let test = testing.descriptor(&dir)?;

    let sanitizer = ExternalSanitizer::from_config(testing.config().sanitizer());
    let result = TestResult::evaluate(&test, &sanitizer, &EvaluateOptions::default());
    assert_eq!(result.resolution(), ResolutionKind::Passed);
    assert!(result.issues().is_empty(), "issues: {}", result.issues());
    assert_eq!(
        result.sanitized_output().get("east").map(|output| &output[..]),
        Some(EAST_REFERENCE.as_bytes())
    );

    Ok(())
}
