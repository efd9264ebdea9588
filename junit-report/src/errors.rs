// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8PathBuf;
use std::io;
use thiserror::Error;

/// An identifier collided with one already present among its siblings.
///
/// Returned by [`TestSuite::add_test_case`](crate::TestSuite::add_test_case) and
/// [`TestSuites::add_test_suite`](crate::TestSuites::add_test_suite). The collection is left
/// unchanged when this is returned.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DuplicateIdError {
    /// A test case with this ID already exists in the suite.
    #[error("cannot add test case: suite ID={suite_id} already contains a case with ID={case_id}")]
    TestCase {
        /// The ID of the suite, or an empty string if the suite is anonymous.
        suite_id: String,

        /// The colliding test case ID.
        case_id: String,
    },

    /// A test suite with this ID already exists in the report.
    #[error(
        "cannot add test suite: suites ID={suites_id} already contains a suite with ID={suite_id}"
    )]
    TestSuite {
        /// The ID of the report root, or an empty string if it is anonymous.
        suites_id: String,

        /// The colliding test suite ID.
        suite_id: String,
    },
}

/// An error that occurs while serializing a [`TestSuites`](crate::TestSuites).
///
/// Returned by [`TestSuites::serialize`](crate::TestSuites::serialize) and
/// [`TestSuites::make_report`](crate::TestSuites::make_report).
#[derive(Debug, Error)]
#[error("error serializing JUnit report")]
pub struct SerializeError {
    #[from]
    inner: quick_xml::Error,
}

/// An error that occurs while writing a report out with
/// [`TestSuites::save_report`](crate::TestSuites::save_report).
#[derive(Debug, Error)]
pub enum SaveReportError {
    /// The report could not be rendered.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// The rendered report could not be written to disk.
    #[error("error writing JUnit report to {path}")]
    Write {
        /// The destination path.
        path: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: io::Error,
    },
}
