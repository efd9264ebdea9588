// Copyright (c) The diem-devtools Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::DateTime;
use goldenfile::Mint;
use junit_report::{TestCase, TestError, TestFailure, TestSuite, TestSuites};
use std::time::Duration;

#[test]
fn fixtures() {
    let mut mint = Mint::new("tests/fixtures");

    let f = mint
        .new_goldenfile("make_report.xml")
        .expect("creating new goldenfile succeeds");
    let mut report = make_report();
    report
        .serialize(f)
        .expect("serializing make_report succeeds");

    let f = mint
        .new_goldenfile("detailed_report.xml")
        .expect("creating new goldenfile succeeds");
    let mut report = detailed_report();
    report
        .serialize(f)
        .expect("serializing detailed_report succeeds");
}

#[test]
fn make_report_totals() {
    let mut report = make_report();
    let first = report.make_report().expect("first report succeeds");

    let totals: Vec<_> = report
        .test_suites
        .iter()
        .map(|suite| (suite.tests, suite.failures, suite.errors))
        .collect();
    assert_eq!(totals, vec![(2, 3, 3), (2, 0, 0)]);
    assert_eq!((report.tests, report.failures, report.errors), (4, 3, 3));

    let second = report.make_report().expect("second report succeeds");
    assert_eq!(first, second, "generating a report twice is idempotent");
    assert_eq!((report.tests, report.failures, report.errors), (4, 3, 3));
}

fn make_report() -> TestSuites {
    let mut report = TestSuites::new("testsuites#1", "test_report");

    let mut suite1 = TestSuite::new("testsuite#1", "suite 1");
    suite1
        .add_test_case(TestCase::new("case#1", "case 1", "report.TestMakeReport"))
        .expect("case#1 is unique");

    let mut case2 = TestCase::new("case#2", "case 2", "report.TestMakeReport");
    case2
        .add_failure(TestFailure::new("msg1", "type_fail", "test failure 1"))
        .add_failure(TestFailure::new("msg2", "type_fail", "test failure 2"))
        .add_failure(TestFailure::new("msg3", "type_fail", "test failure 3"))
        .add_error(TestError::new("msg4", "type_err", "test error 1"))
        .add_error(TestError::new("msg5", "type_err", "test error 2"))
        .add_error(TestError::new("msg6", "type_err", "test error 3"));
    suite1.add_test_case(case2).expect("case#2 is unique");
    report
        .add_test_suite(suite1)
        .expect("testsuite#1 is unique");

    let mut suite2 = TestSuite::anonymous();
    suite2
        .add_test_case(TestCase::anonymous())
        .expect("anonymous case is accepted");
    suite2
        .add_test_case(TestCase::anonymous())
        .expect("anonymous case is accepted");
    report
        .add_test_suite(suite2)
        .expect("anonymous suite is accepted");

    report
}

fn detailed_report() -> TestSuites {
    let mut report = TestSuites::new("run-42", "my-test-run");
    report.set_timestamp(
        DateTime::parse_from_rfc3339("2024-01-15T10:30:00+01:00").expect("valid timestamp"),
    );

    let suite = report
        .add_test_suite(TestSuite::new("suite-0", "testsuite0"))
        .expect("suite-0 is unique");
    suite
        .set_timestamp(
            DateTime::parse_from_rfc3339("2024-01-15T10:30:01+01:00").expect("valid timestamp"),
        )
        .add_extra("hostname", "ci-runner-1");

    suite
        .add_test_case(TestCase::new("case-0", "testcase0", "my_crate::tests"))
        .expect("case-0 is unique")
        .set_time(Duration::from_millis(1250))
        .set_content("testcase0-output");

    suite
        .add_test_case(TestCase::new("case-1", "testcase1", "my_crate::tests"))
        .expect("case-1 is unique")
        .set_time(Duration::from_millis(4242))
        .add_failure(TestFailure::new(
            "assertion failed: left == right",
            "assert_eq",
            "left: 1\nright: 2",
        ));

    suite
        .add_test_case(TestCase::anonymous())
        .expect("anonymous case is accepted")
        .set_time(Duration::from_nanos(421_580))
        .add_error(TestError::anonymous("process exited with code 101"));

    suite
        .add_test_case(TestCase::new("case-3", "colored", "my_crate::tests"))
        .expect("case-3 is unique")
        .set_content("\x1b[32mok\x1b[0m")
        .add_extra("file", "src/lib.rs");

    report
        .add_test_suite(TestSuite::new("suite-1", "empty suite"))
        .expect("suite-1 is unique");

    report
}
