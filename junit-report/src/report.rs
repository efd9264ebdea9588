// Copyright (c) The diem-devtools Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{DuplicateIdError, SaveReportError, SerializeError},
    serialize::serialize_report,
};
use camino::Utf8Path;
use chrono::{DateTime, FixedOffset};
use indexmap::map::IndexMap;
use std::{
    borrow::{Borrow, Cow},
    fmt,
    fs::OpenOptions,
    io::{self, Write},
    ops::Deref,
    time::{Duration, Instant},
};
use tracing::debug;

#[cfg(unix)]
const REPORT_FILE_MODE: u32 = 0o644;

/// The root element of a JUnit report, serialized as `<testsuites>`.
///
/// The `tests`, `failures`, `errors` and `time` fields are derived from the test suites. They are
/// recomputed from scratch every time the report is serialized, so the tree may be freely mutated
/// (and re-serialized) after any test suite has been added.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestSuites {
    /// The ID of this report. Omitted from the output if absent or empty.
    pub id: Option<XmlString>,

    /// The name of this report. Omitted from the output if absent or empty.
    pub name: Option<XmlString>,

    /// The time at which the first test in this report began execution.
    ///
    /// This is not part of the JUnit spec, but may be useful for some tools.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// The overall time taken by all test suites. Derived.
    ///
    /// This is serialized as the number of seconds, and omitted if zero.
    pub time: Duration,

    /// The total number of tests from all test suites. Derived.
    pub tests: usize,

    /// The total number of failures from all test suites. Derived.
    pub failures: usize,

    /// The total number of errors from all test suites. Derived.
    pub errors: usize,

    /// The test suites contained in this report.
    pub test_suites: Vec<TestSuite>,
}

impl TestSuites {
    /// Creates a new `TestSuites` with the given ID and name.
    pub fn new(id: impl Into<XmlString>, name: impl Into<XmlString>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Creates a new `TestSuites` with no ID or name.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sets the start timestamp for the report.
    pub fn set_timestamp(&mut self, timestamp: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Adds a test suite to the report, returning a mutable reference to it.
    ///
    /// If the test suite has a non-empty ID, it must be unique among the test suites already in
    /// the report. Otherwise a [`DuplicateIdError`] is returned and the report is left unchanged.
    ///
    /// IDs are compared after [`XmlString`] sanitization, so IDs that differ only in stripped
    /// characters (such as `"a"` and `"a\x07"`) collide.
    pub fn add_test_suite(
        &mut self,
        test_suite: TestSuite,
    ) -> Result<&mut TestSuite, DuplicateIdError> {
        if let Some(suite_id) = non_empty(test_suite.id.as_ref())
            && self.test_suite_index(suite_id).is_some()
        {
            debug!(suite_id, "rejected test suite with duplicate ID");
            return Err(DuplicateIdError::TestSuite {
                suites_id: id_or_empty(self.id.as_ref()),
                suite_id: suite_id.to_owned(),
            });
        }

        let index = self.test_suites.len();
        self.test_suites.push(test_suite);
        Ok(&mut self.test_suites[index])
    }

    /// Removes the first test suite with the given ID, returning it.
    ///
    /// An anonymous test suite has the empty string as its ID. Does nothing and returns `None` if
    /// no test suite matches.
    pub fn remove_test_suite(&mut self, id: &str) -> Option<TestSuite> {
        let index = self
            .test_suites
            .iter()
            .position(|test_suite| id_or_empty_str(test_suite.id.as_ref()) == id)?;
        Some(self.test_suites.remove(index))
    }

    /// Returns a mutable reference to the test suite with the given non-empty ID.
    pub fn test_suite_mut(&mut self, id: &str) -> Option<&mut TestSuite> {
        let index = self.test_suite_index(id)?;
        Some(&mut self.test_suites[index])
    }

    /// Serializes this report to the given writer.
    ///
    /// All derived values are recomputed before serialization.
    pub fn serialize(&mut self, writer: impl io::Write) -> Result<(), SerializeError> {
        self.resolve();
        debug!(
            tests = self.tests,
            failures = self.failures,
            errors = self.errors,
            time = ?self.time,
            "resolved JUnit report totals",
        );
        serialize_report(self, writer)?;
        Ok(())
    }

    /// Generates the report XML as a vector of bytes.
    ///
    /// Useful for any output other than a file; use [`Self::save_report`] to write the report to
    /// disk. All derived values are recomputed when calling this method, so it may be called any
    /// number of times.
    pub fn make_report(&mut self) -> Result<Vec<u8>, SerializeError> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    /// Generates the report XML and writes it to the given path.
    ///
    /// The file is created (with mode `0o644` on Unix) or truncated. Missing parent directories
    /// are not created.
    pub fn save_report(&mut self, path: impl AsRef<Utf8Path>) -> Result<(), SaveReportError> {
        let path = path.as_ref();
        let content = self.make_report()?;
        write_report_file(path, &content).map_err(|error| SaveReportError::Write {
            path: path.to_owned(),
            error,
        })?;
        debug!(%path, bytes = content.len(), "wrote JUnit report");
        Ok(())
    }

    /// Recomputes every derived value in the tree, bottom-up.
    ///
    /// Derived values are reset first, so this is idempotent. Times saturate at `Duration::MAX`.
    pub(crate) fn resolve(&mut self) {
        self.tests = 0;
        self.failures = 0;
        self.errors = 0;
        self.time = Duration::ZERO;

        for test_suite in &mut self.test_suites {
            test_suite.resolve();
            self.tests += test_suite.tests;
            self.failures += test_suite.failures;
            self.errors += test_suite.errors;
            self.time = self.time.saturating_add(test_suite.time);
        }
    }

    fn test_suite_index(&self, id: &str) -> Option<usize> {
        self.test_suites
            .iter()
            .position(|test_suite| non_empty(test_suite.id.as_ref()) == Some(id))
    }
}

/// Represents a single test suite, serialized as `<testsuite>`.
///
/// A `TestSuite` groups together several [`TestCase`] instances. Its counts are derived, and are
/// only brought up to date when the owning [`TestSuites`] is serialized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestSuite {
    /// The ID of this test suite. Omitted from the output if absent or empty.
    pub id: Option<XmlString>,

    /// The name of this test suite. Omitted from the output if absent or empty.
    pub name: Option<XmlString>,

    /// The time at which the test suite began execution.
    pub timestamp: Option<DateTime<FixedOffset>>,

    /// The overall time taken by the test suite. Derived.
    pub time: Duration,

    /// The total number of tests in this test suite. Derived.
    pub tests: usize,

    /// The total number of failures in this test suite. Derived.
    ///
    /// A "failure" is usually some sort of *expected* issue in a test, such as a failed
    /// assertion.
    pub failures: usize,

    /// The total number of errors in this test suite. Derived.
    ///
    /// An "error" is usually some sort of *unexpected* issue in a test.
    pub errors: usize,

    /// The test cases that form this test suite.
    pub test_cases: Vec<TestCase>,

    /// Other fields that may be set as attributes, such as "hostname" or "package".
    pub extra: IndexMap<XmlString, XmlString>,
}

impl TestSuite {
    /// Creates a new `TestSuite` with the given ID and name.
    pub fn new(id: impl Into<XmlString>, name: impl Into<XmlString>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Creates a new `TestSuite` with no ID or name.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sets the start timestamp for the test suite.
    pub fn set_timestamp(&mut self, timestamp: impl Into<DateTime<FixedOffset>>) -> &mut Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Adds an extra attribute to this test suite.
    pub fn add_extra(
        &mut self,
        key: impl Into<XmlString>,
        value: impl Into<XmlString>,
    ) -> &mut Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Adds a test case to this test suite, returning a mutable reference to it.
    ///
    /// If the test case has a non-empty ID, it must be unique among the test cases already in
    /// the suite. Otherwise a [`DuplicateIdError`] is returned and the suite is left unchanged.
    ///
    /// IDs are compared after [`XmlString`] sanitization, so IDs that differ only in stripped
    /// characters (such as `"a"` and `"a\x07"`) collide.
    ///
    /// The counts are not updated until the owning report is serialized.
    pub fn add_test_case(
        &mut self,
        test_case: TestCase,
    ) -> Result<&mut TestCase, DuplicateIdError> {
        if let Some(case_id) = non_empty(test_case.id.as_ref())
            && self.test_case_index(case_id).is_some()
        {
            debug!(case_id, "rejected test case with duplicate ID");
            return Err(DuplicateIdError::TestCase {
                suite_id: id_or_empty(self.id.as_ref()),
                case_id: case_id.to_owned(),
            });
        }

        let index = self.test_cases.len();
        self.test_cases.push(test_case);
        Ok(&mut self.test_cases[index])
    }

    /// Removes the first test case with the given ID, returning it.
    ///
    /// An anonymous test case has the empty string as its ID. Does nothing and returns `None` if
    /// no test case matches.
    pub fn remove_test_case(&mut self, id: &str) -> Option<TestCase> {
        let index = self
            .test_cases
            .iter()
            .position(|test_case| id_or_empty_str(test_case.id.as_ref()) == id)?;
        Some(self.test_cases.remove(index))
    }

    /// Returns a mutable reference to the test case with the given non-empty ID.
    pub fn test_case_mut(&mut self, id: &str) -> Option<&mut TestCase> {
        let index = self.test_case_index(id)?;
        Some(&mut self.test_cases[index])
    }

    fn resolve(&mut self) {
        self.tests = 0;
        self.failures = 0;
        self.errors = 0;
        self.time = Duration::ZERO;

        for test_case in &self.test_cases {
            self.tests += 1;
            self.failures += test_case.failures.len();
            self.errors += test_case.errors.len();
            self.time = self
                .time
                .saturating_add(test_case.time.unwrap_or_default());
        }
    }

    fn test_case_index(&self, id: &str) -> Option<usize> {
        self.test_cases
            .iter()
            .position(|test_case| non_empty(test_case.id.as_ref()) == Some(id))
    }
}

/// Represents a single test case, serialized as `<testcase>`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestCase {
    /// The ID of the test case. If non-empty, it must be unique within its test suite.
    pub id: Option<XmlString>,

    /// The name of the test case.
    pub name: Option<XmlString>,

    /// The time it took to execute this test case.
    ///
    /// Set by [`Self::end`] or [`Self::set_time`], and serialized whenever present.
    pub time: Option<Duration>,

    /// The "classname" of the test case.
    ///
    /// Typically, this represents the module containing the test. In other words, `classname` +
    /// `name` together should uniquely identify and locate a test.
    pub classname: Option<XmlString>,

    /// Free-form output of the test case, serialized as the element's text.
    pub content: XmlString,

    /// Failures recorded for this test case, in insertion order.
    pub failures: Vec<TestFailure>,

    /// Errors recorded for this test case, in insertion order.
    pub errors: Vec<TestError>,

    /// Other fields that may be set as attributes, such as "file" or "line".
    pub extra: IndexMap<XmlString, XmlString>,

    // Never serialized.
    started_at: Option<Instant>,
}

impl TestCase {
    /// Creates a new test case with the given ID, name and classname.
    pub fn new(
        id: impl Into<XmlString>,
        name: impl Into<XmlString>,
        classname: impl Into<XmlString>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            classname: Some(classname.into()),
            ..Self::default()
        }
    }

    /// Creates a new test case with every field empty.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Sets the text content of the test case, replacing any previous content.
    pub fn set_content(&mut self, content: impl Into<XmlString>) -> &mut Self {
        self.content = content.into();
        self
    }

    /// Appends a failure to this test case.
    pub fn add_failure(&mut self, failure: TestFailure) -> &mut Self {
        self.failures.push(failure);
        self
    }

    /// Appends an error to this test case.
    pub fn add_error(&mut self, error: TestError) -> &mut Self {
        self.errors.push(error);
        self
    }

    /// Sets the time taken for the test case, for durations measured elsewhere.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Adds an extra attribute to this test case.
    pub fn add_extra(
        &mut self,
        key: impl Into<XmlString>,
        value: impl Into<XmlString>,
    ) -> &mut Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Marks the start of the test case's execution.
    ///
    /// Has no visible effect until [`Self::end`] is called.
    pub fn start(&mut self) -> &mut Self {
        self.started_at = Some(Instant::now());
        self
    }

    /// Marks the end of the test case's execution, setting its time to the duration elapsed
    /// since [`Self::start`].
    ///
    /// If `start` was not called first (or this is a second `end` for the same `start`), the time
    /// is left unchanged.
    pub fn end(&mut self) -> &mut Self {
        match self.started_at.take() {
            Some(started_at) => {
                self.time = Some(started_at.elapsed());
            }
            None => {
                debug!(
                    case_id = non_empty(self.id.as_ref()),
                    "test case ended without being started, leaving time unchanged",
                );
            }
        }
        self
    }
}

/// A failure recorded against a test case, serialized as `<failure>`.
///
/// A failure is an expected kind of problem, typically a failed assertion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestFailure {
    /// The failure message.
    pub message: Option<XmlString>,

    /// The "type" of failure that occurred.
    pub ty: Option<XmlString>,

    /// A detailed description of the failure, such as the location of the assertion.
    ///
    /// This is serialized as the text node of the element.
    pub content: XmlString,
}

impl TestFailure {
    /// Creates a new `TestFailure` with the given message, type and content.
    pub fn new(
        message: impl Into<XmlString>,
        ty: impl Into<XmlString>,
        content: impl Into<XmlString>,
    ) -> Self {
        Self {
            message: Some(message.into()),
            ty: Some(ty.into()),
            content: content.into(),
        }
    }

    /// Creates a new `TestFailure` with only content set.
    pub fn anonymous(content: impl Into<XmlString>) -> Self {
        Self {
            message: None,
            ty: None,
            content: content.into(),
        }
    }
}

/// An error recorded against a test case, serialized as `<error>`.
///
/// An error is an unexpected problem while running the test, such as a panic outside an
/// assertion or a setup failure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestError {
    /// The error message.
    pub message: Option<XmlString>,

    /// The "type" of error that occurred.
    pub ty: Option<XmlString>,

    /// A detailed description of the error, e.g. the message and a stack trace.
    ///
    /// This is serialized as the text node of the element.
    pub content: XmlString,
}

impl TestError {
    /// Creates a new `TestError` with the given message, type and content.
    pub fn new(
        message: impl Into<XmlString>,
        ty: impl Into<XmlString>,
        content: impl Into<XmlString>,
    ) -> Self {
        Self {
            message: Some(message.into()),
            ty: Some(ty.into()),
            content: content.into(),
        }
    }

    /// Creates a new `TestError` with only content set.
    pub fn anonymous(content: impl Into<XmlString>) -> Self {
        Self {
            message: None,
            ty: None,
            content: content.into(),
        }
    }
}

/// A string that can be embedded in an XML document.
///
/// ANSI escape codes, and characters that are not allowed in XML 1.0 (most control characters
/// along with U+FFFE and U+FFFF), are removed on construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlString {
    data: Box<str>,
}

impl XmlString {
    /// Creates a new `XmlString`, removing any ANSI escapes and characters that are invalid in
    /// XML.
    pub fn new(data: impl AsRef<str>) -> Self {
        let data = data.as_ref();
        let data = if data.contains('\x1b') {
            Cow::Owned(strip_ansi_escapes::strip_str(data))
        } else {
            Cow::Borrowed(data)
        };
        let data = data.replace(is_invalid_xml_char, "").into_boxed_str();
        Self { data }
    }

    /// Returns the string as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Converts the string into a `String`.
    pub fn into_string(self) -> String {
        self.data.into_string()
    }
}

impl From<&str> for XmlString {
    fn from(data: &str) -> Self {
        Self::new(data)
    }
}

impl From<&String> for XmlString {
    fn from(data: &String) -> Self {
        Self::new(data)
    }
}

impl From<String> for XmlString {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<XmlString> for String {
    fn from(s: XmlString) -> Self {
        s.into_string()
    }
}

impl Deref for XmlString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl AsRef<str> for XmlString {
    fn as_ref(&self) -> &str {
        &self.data
    }
}

impl Borrow<str> for XmlString {
    fn borrow(&self) -> &str {
        &self.data
    }
}

impl PartialEq<str> for XmlString {
    fn eq(&self, other: &str) -> bool {
        &*self.data == other
    }
}

impl PartialEq<&str> for XmlString {
    fn eq(&self, other: &&str) -> bool {
        &*self.data == *other
    }
}

impl fmt::Display for XmlString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

fn is_invalid_xml_char(c: char) -> bool {
    matches!(
        c,
        '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f' | '\u{fffe}' | '\u{ffff}'
    )
}

/// Returns the string if it is present and non-empty.
pub(crate) fn non_empty(s: Option<&XmlString>) -> Option<&str> {
    s.map(XmlString::as_str).filter(|s| !s.is_empty())
}

fn id_or_empty_str(id: Option<&XmlString>) -> &str {
    id.map_or("", XmlString::as_str)
}

fn id_or_empty(id: Option<&XmlString>) -> String {
    id_or_empty_str(id).to_owned()
}

fn write_report_file(path: &Utf8Path, content: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(REPORT_FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.flush()
}
