// Copyright (c) The diem-devtools Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build JUnit XML reports in memory and write them out.
//!
//! A report is a tree: a [`TestSuites`] root holds [`TestSuite`]s, which hold [`TestCase`]s, which
//! hold [`TestFailure`]s and [`TestError`]s. Counts and durations on suites and on the root are
//! derived from the leaves every time the report is serialized.
//!
//! ```
//! use junit_report::{TestCase, TestFailure, TestSuite, TestSuites};
//!
//! let mut report = TestSuites::new("run-1", "unit tests");
//! let suite = report.add_test_suite(TestSuite::new("parser", "parser tests"))?;
//! suite
//!     .add_test_case(TestCase::new("parse_empty", "parse empty input", "parser::tests"))?
//!     .add_failure(TestFailure::new("assertion failed", "assert_eq", "left: 1\nright: 2"));
//!
//! let xml = String::from_utf8(report.make_report()?)?;
//! assert!(xml.contains(
//!     r#"<testsuites id="run-1" name="unit tests" tests="1" failures="1" errors="0">"#
//! ));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod errors;
mod report;
mod serialize;

pub use errors::*;
pub use report::*;
