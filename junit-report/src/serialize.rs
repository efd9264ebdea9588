// Copyright (c) The diem-devtools Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialize a `TestSuites`.

use crate::{
    TestCase, TestError, TestFailure, TestSuite, TestSuites, XmlString, report::non_empty,
};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use quick_xml::{
    Writer,
    escape::escape,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event, attributes::Attribute},
    name::QName,
};
use std::{borrow::Cow, io, time::Duration};

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static ERROR_TAG: &str = "error";

const INDENT_SIZE: usize = 4;

pub(crate) fn serialize_report(
    test_suites: &TestSuites,
    writer: impl io::Write,
) -> quick_xml::Result<()> {
    let mut writer = Writer::new_with_indent(writer, b' ', INDENT_SIZE);

    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(Event::Decl(decl))?;

    serialize_test_suites(test_suites, &mut writer)?;

    // Add a trailing newline.
    writer.write_indent()
}

fn serialize_test_suites(
    test_suites: &TestSuites,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    // Use the destructuring syntax to ensure that all fields are handled.
    let TestSuites {
        id,
        name,
        timestamp,
        time,
        tests,
        failures,
        errors,
        test_suites,
    } = test_suites;

    let mut testsuites_tag = BytesStart::new(TESTSUITES_TAG);
    push_optional_attribute(&mut testsuites_tag, "id", id.as_ref());
    push_optional_attribute(&mut testsuites_tag, "name", name.as_ref());
    push_counts(&mut testsuites_tag, *tests, *failures, *errors);
    if !time.is_zero() {
        testsuites_tag.push_attribute(("time", serialize_time(time).as_str()));
    }
    if let Some(timestamp) = timestamp {
        testsuites_tag.push_attribute(("timestamp", serialize_timestamp(timestamp).as_str()));
    }

    if test_suites.is_empty() {
        return writer.write_event(Event::Empty(testsuites_tag));
    }

    writer.write_event(Event::Start(testsuites_tag))?;
    for test_suite in test_suites {
        serialize_test_suite(test_suite, writer)?;
    }
    serialize_end_tag(TESTSUITES_TAG, writer)
}

fn serialize_test_suite(
    test_suite: &TestSuite,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let TestSuite {
        id,
        name,
        timestamp,
        time,
        tests,
        failures,
        errors,
        test_cases,
        extra,
    } = test_suite;

    let mut testsuite_tag = BytesStart::new(TESTSUITE_TAG);
    push_optional_attribute(&mut testsuite_tag, "id", id.as_ref());
    push_optional_attribute(&mut testsuite_tag, "name", name.as_ref());
    push_counts(&mut testsuite_tag, *tests, *failures, *errors);
    if !time.is_zero() {
        testsuite_tag.push_attribute(("time", serialize_time(time).as_str()));
    }
    if let Some(timestamp) = timestamp {
        testsuite_tag.push_attribute(("timestamp", serialize_timestamp(timestamp).as_str()));
    }
    push_extra(&mut testsuite_tag, extra);

    if test_cases.is_empty() {
        return writer.write_event(Event::Empty(testsuite_tag));
    }

    writer.write_event(Event::Start(testsuite_tag))?;
    for test_case in test_cases {
        serialize_test_case(test_case, writer)?;
    }
    serialize_end_tag(TESTSUITE_TAG, writer)
}

fn serialize_test_case(
    test_case: &TestCase,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let TestCase {
        id,
        name,
        time,
        classname,
        content,
        failures,
        errors,
        extra,
        ..
    } = test_case;

    let mut testcase_tag = BytesStart::new(TESTCASE_TAG);
    push_optional_attribute(&mut testcase_tag, "id", id.as_ref());
    push_optional_attribute(&mut testcase_tag, "name", name.as_ref());
    if let Some(time) = time {
        testcase_tag.push_attribute(("time", serialize_time(time).as_str()));
    }
    push_optional_attribute(&mut testcase_tag, "classname", classname.as_ref());
    push_extra(&mut testcase_tag, extra);

    if content.is_empty() && failures.is_empty() && errors.is_empty() {
        return writer.write_event(Event::Empty(testcase_tag));
    }

    writer.write_event(Event::Start(testcase_tag))?;
    if !content.is_empty() {
        writer.write_event(Event::Text(BytesText::new(content)))?;
        // Text suppresses the next line break, so put any child elements on their own lines.
        if !failures.is_empty() || !errors.is_empty() {
            writer.write_indent()?;
        }
    }
    for TestFailure {
        message,
        ty,
        content,
    } in failures
    {
        serialize_status(message.as_ref(), ty.as_ref(), content, FAILURE_TAG, writer)?;
    }
    for TestError {
        message,
        ty,
        content,
    } in errors
    {
        serialize_status(message.as_ref(), ty.as_ref(), content, ERROR_TAG, writer)?;
    }
    serialize_end_tag(TESTCASE_TAG, writer)
}

fn serialize_status(
    message: Option<&XmlString>,
    ty: Option<&XmlString>,
    content: &XmlString,
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    let mut tag = BytesStart::new(tag_name);
    push_optional_attribute(&mut tag, "message", message);
    push_optional_attribute(&mut tag, "type", ty);

    if content.is_empty() {
        writer.write_event(Event::Empty(tag))
    } else {
        writer.write_event(Event::Start(tag))?;
        writer.write_event(Event::Text(BytesText::new(content)))?;
        serialize_end_tag(tag_name, writer)
    }
}

fn push_optional_attribute(tag: &mut BytesStart<'_>, key: &str, value: Option<&XmlString>) {
    if let Some(value) = non_empty(value) {
        push_text_attribute(tag, key, value);
    }
}

// Parsers normalize literal whitespace in attribute values to spaces, so tabs and line breaks
// are written as character references.
fn push_text_attribute(tag: &mut BytesStart<'_>, key: &str, value: &str) {
    let mut escaped = escape(value).into_owned();
    if escaped.contains(['\n', '\r', '\t']) {
        escaped = escaped
            .replace('\n', "&#10;")
            .replace('\r', "&#13;")
            .replace('\t', "&#9;");
    }
    tag.push_attribute(Attribute {
        key: QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    });
}

// Counts are always emitted, even when zero.
fn push_counts(tag: &mut BytesStart<'_>, tests: usize, failures: usize, errors: usize) {
    tag.push_attribute(("tests", tests.to_string().as_str()));
    tag.push_attribute(("failures", failures.to_string().as_str()));
    tag.push_attribute(("errors", errors.to_string().as_str()));
}

fn push_extra(tag: &mut BytesStart<'_>, extra: &IndexMap<XmlString, XmlString>) {
    for (k, v) in extra {
        push_text_attribute(tag, k, v);
    }
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<impl io::Write>,
) -> quick_xml::Result<()> {
    writer.write_event(Event::End(BytesEnd::new(tag_name)))
}

fn serialize_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    format!("{}", timestamp.format("%+"))
}

// Serialize time as seconds with 3 decimal points.
fn serialize_time(time: &Duration) -> String {
    format!("{:.3}", time.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Duration::ZERO, "0.000" ; "zero")]
    #[test_case(Duration::from_millis(4242), "4.242" ; "millis")]
    #[test_case(Duration::new(42, 234_567_890), "42.235" ; "rounded")]
    #[test_case(Duration::from_nanos(421_580), "0.000" ; "sub millisecond")]
    fn time_is_seconds(time: Duration, expected: &str) {
        assert_eq!(serialize_time(&time), expected);
    }

    fn render(test_suites: &TestSuites) -> String {
        let mut buf = Vec::new();
        serialize_report(test_suites, &mut buf).expect("serializing to a Vec succeeds");
        String::from_utf8(buf).expect("output is UTF-8")
    }

    #[test]
    fn empty_report() {
        assert_eq!(
            render(&TestSuites::anonymous()),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <testsuites tests=\"0\" failures=\"0\" errors=\"0\"/>\n"
        );
    }

    #[test]
    fn empty_strings_are_omitted() {
        let mut test_suites = TestSuites::new("", "");
        let mut test_suite = TestSuite::new("", "suite");
        let mut test_case = TestCase::new("", "", "");
        test_case.add_failure(TestFailure::new("", "", ""));
        test_suite.test_cases.push(test_case);
        test_suites.test_suites.push(test_suite);

        assert_eq!(
            render(&test_suites),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <testsuites tests=\"0\" failures=\"0\" errors=\"0\">\n    \
                 <testsuite name=\"suite\" tests=\"0\" failures=\"0\" errors=\"0\">\n        \
                     <testcase>\n            \
                         <failure/>\n        \
                     </testcase>\n    \
                 </testsuite>\n\
             </testsuites>\n"
        );
    }

    #[test]
    fn content_followed_by_children() {
        let mut test_suites = TestSuites::anonymous();
        let mut test_suite = TestSuite::anonymous();
        let mut test_case = TestCase::anonymous();
        test_case
            .set_content("captured output")
            .add_failure(TestFailure::new("line1\nline2", "assert", "details"))
            .add_error(TestError::new("tab\tseparated", "", "boom"))
            .add_extra("note", "cr\rhere");
        test_case.name = Some("mixed".into());
        test_suite.test_cases.push(test_case);
        test_suites.test_suites.push(test_suite);

        assert_eq!(
            render(&test_suites),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <testsuites tests=\"0\" failures=\"0\" errors=\"0\">\n    \
                 <testsuite tests=\"0\" failures=\"0\" errors=\"0\">\n        \
                     <testcase name=\"mixed\" note=\"cr&#13;here\">captured output\n            \
                         <failure message=\"line1&#10;line2\" type=\"assert\">details</failure>\n            \
                         <error message=\"tab&#9;separated\">boom</error>\n        \
                     </testcase>\n    \
                 </testsuite>\n\
             </testsuites>\n"
        );
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let mut test_suites = TestSuites::anonymous();
        let mut test_suite = TestSuite::anonymous();
        let mut test_case = TestCase::new("a&b", "<name>", "mod");
        test_case.set_content("1 < 2 & 3 > 2");
        test_suite.test_cases.push(test_case);
        test_suites.test_suites.push(test_suite);

        let output = render(&test_suites);
        assert!(
            output.contains(
                "<testcase id=\"a&amp;b\" name=\"&lt;name&gt;\" classname=\"mod\">\
                 1 &lt; 2 &amp; 3 &gt; 2</testcase>"
            ),
            "unexpected output: {output}"
        );
    }
}
