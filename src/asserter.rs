use core::fmt;
use std::cmp::Ordering;
use std::fmt::Display;

use flume::Receiver;
use flume::SendError;
use flume::Sender;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;

use crate::error::CaseError;
use crate::error::ConfigError;
use crate::extractor::Target;
use crate::runner::CapturedResponse;
use crate::runner::RunnerResult;

pub struct Asserter {}

#[derive(Error, Debug)]
pub enum AsserterError {
    #[error("channel error")]
    ChannelError(#[from] SendError<CaseReport>),
}

/// Outcome of one case instance. A failure carries the first error hit, there
/// is never more than one per instance.
#[derive(Debug)]
pub enum Verdict {
    Pass,
    Fail(CaseError),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl From<Result<(), CaseError>> for Verdict {
    fn from(result: Result<(), CaseError>) -> Self {
        match result {
            Ok(()) => Verdict::Pass,
            Err(error) => Verdict::Fail(error),
        }
    }
}

#[derive(Debug)]
pub struct CaseReport {
    pub name: String,
    pub description: String,
    pub method: String,
    pub url: String,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionKind {
    Equal,
    NotEqual,
    Contains,
    IsNotNone,
    GreaterThan,
    TypeEqual,
    StartsWith,
}

impl AssertionKind {
    fn parse(index: usize, raw: &Value) -> Result<Self, ConfigError> {
        let unsupported = || ConfigError::UnsupportedKind {
            index,
            kind: match raw {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        };

        let kind = match raw.as_str().ok_or_else(unsupported)?.to_lowercase().as_str() {
            "equal" => AssertionKind::Equal,
            "not_equal" => AssertionKind::NotEqual,
            "contains" => AssertionKind::Contains,
            "is_not_none" => AssertionKind::IsNotNone,
            "greater_than" => AssertionKind::GreaterThan,
            "type_equal" => AssertionKind::TypeEqual,
            "starts_with" => AssertionKind::StartsWith,
            _ => return Err(unsupported()),
        };

        Ok(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionKind::Equal => "equal",
            AssertionKind::NotEqual => "not_equal",
            AssertionKind::Contains => "contains",
            AssertionKind::IsNotNone => "is_not_none",
            AssertionKind::GreaterThan => "greater_than",
            AssertionKind::TypeEqual => "type_equal",
            AssertionKind::StartsWith => "starts_with",
        }
    }
}

/// Type names accepted by `type_equal`, one per JSON variant that can be
/// checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    String,
    Integer,
    Boolean,
    Object,
    Array,
}

impl TypeName {
    fn parse(index: usize, raw: &Value) -> Result<Self, ConfigError> {
        let type_name = match raw.as_str() {
            Some("string" | "str") => TypeName::String,
            Some("integer" | "int") => TypeName::Integer,
            Some("boolean" | "bool") => TypeName::Boolean,
            Some("object" | "dict") => TypeName::Object,
            Some("array" | "list") => TypeName::Array,
            _ => {
                return Err(ConfigError::UnsupportedTypeName {
                    index,
                    name: raw.clone(),
                });
            }
        };

        Ok(type_name)
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            TypeName::String => value.is_string(),
            TypeName::Integer => value.is_i64() || value.is_u64(),
            TypeName::Boolean => value.is_boolean(),
            TypeName::Object => value.is_object(),
            TypeName::Array => value.is_array(),
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeName::String => "string",
            TypeName::Integer => "integer",
            TypeName::Boolean => "boolean",
            TypeName::Object => "object",
            TypeName::Array => "array",
        };
        write!(f, "{name}")
    }
}

/// One declared assertion with its three required fields present. Target and
/// kind are only interpreted when the assertion's turn comes.
#[derive(Debug)]
pub struct AssertionSpec {
    pub target: Value,
    pub expected: Value,
    pub kind: Value,
}

impl AssertionSpec {
    /// Checks that the assertion at 1-based position `index` carries `target`,
    /// `expected` and `kind` (which may also be spelled `type`).
    pub fn from_value(index: usize, raw: &Value) -> Result<Self, ConfigError> {
        let Value::Object(table) = raw else {
            return Err(ConfigError::InvalidField {
                field: format!("assert #{index}"),
                message: format!("an assertion must be a table, got {raw}"),
            });
        };

        let target = table.get("target");
        let expected = table.get("expected");
        let kind = table.get("kind").or_else(|| table.get("type"));

        let (Some(target), Some(expected), Some(kind)) = (target, expected, kind) else {
            let missing = [("target", target), ("expected", expected), ("kind", kind)]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();

            return Err(ConfigError::MissingAssertionFields { index, missing });
        };

        Ok(AssertionSpec {
            target: target.clone(),
            expected: expected.clone(),
            kind: kind.clone(),
        })
    }

    pub fn target(&self, index: usize) -> Result<Target, ConfigError> {
        match &self.target {
            Value::String(target) => Target::parse(index, target),
            other => Err(ConfigError::UnsupportedTarget {
                index,
                target: other.to_string(),
            }),
        }
    }

    /// Compares `actual` with the expected value according to the kind.
    pub fn check(&self, index: usize, actual: &Value) -> Result<(), CaseError> {
        let kind = AssertionKind::parse(index, &self.kind)?;
        let expected = &self.expected;
        let fail = |message: String| CaseError::AssertionFailed {
            index,
            message,
            actual: actual.clone(),
            expected: expected.clone(),
        };
        let mismatch = |supported: &'static str| ConfigError::TypeMismatch {
            index,
            kind: kind.as_str(),
            supported,
            actual: actual.clone(),
            expected: expected.clone(),
        };

        match kind {
            AssertionKind::Equal => {
                if !values_equal(actual, expected) {
                    return Err(fail(format!(
                        "actual value {actual} does not equal expected value {expected}"
                    )));
                }
            }
            AssertionKind::NotEqual => {
                if values_equal(actual, expected) {
                    return Err(fail(format!(
                        "actual value {actual} should not equal expected value {expected}"
                    )));
                }
            }
            AssertionKind::Contains => match actual {
                Value::Array(items) => {
                    if !items.iter().any(|item| values_equal(item, expected)) {
                        return Err(fail(format!("list {actual} does not contain {expected}")));
                    }
                }
                _ => {
                    if !plain_text(actual).contains(&plain_text(expected)) {
                        return Err(fail(format!("{actual} does not contain {expected}")));
                    }
                }
            },
            AssertionKind::IsNotNone => {
                if actual.is_null() {
                    return Err(fail(format!("expected a value, got {actual}")));
                }
            }
            AssertionKind::GreaterThan => {
                let (Value::Number(a), Value::Number(e)) = (actual, expected) else {
                    return Err(mismatch("numbers").into());
                };

                if compare_numbers(a, e) != Some(Ordering::Greater) {
                    return Err(fail(format!("{actual} is not greater than {expected}")));
                }
            }
            AssertionKind::TypeEqual => {
                let type_name = TypeName::parse(index, expected)?;

                if !type_name.matches(actual) {
                    return Err(fail(format!(
                        "type mismatch, expected {type_name} but got {}",
                        json_type_name(actual)
                    )));
                }
            }
            AssertionKind::StartsWith => {
                let (Some(a), Some(e)) = (actual.as_str(), expected.as_str()) else {
                    return Err(mismatch("strings").into());
                };

                if !a.starts_with(e) {
                    return Err(fail(format!("{actual} does not start with {expected}")));
                }
            }
        }

        Ok(())
    }
}

/// Checks every assertion for its required fields up front, stopping at the
/// first incomplete one, so nothing gets extracted for a broken case.
pub fn parse_assertions(raw: &[Value]) -> Result<Vec<AssertionSpec>, ConfigError> {
    raw.iter()
        .enumerate()
        .map(|(i, assertion)| AssertionSpec::from_value(i + 1, assertion))
        .collect()
}

/// Checks the declared assertions against a response in order and stops at
/// the first failure. No assertions at all is a pass.
pub fn evaluate(response: &CapturedResponse, assertions: &[Value]) -> Result<(), CaseError> {
    let specs = parse_assertions(assertions)?;

    for (i, spec) in specs.iter().enumerate() {
        let index = i + 1;
        let actual = spec
            .target(index)?
            .extract(response)
            .map_err(|source| CaseError::Extraction { index, source })?;

        spec.check(index, &actual)?;
    }

    Ok(())
}

/// Structural equality where numbers compare by value, so `5 == 5.0` but
/// `5 != "5"`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b) == Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, a)| b.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    a.as_f64()?.partial_cmp(&b.as_f64()?)
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.verdict {
            Verdict::Pass => {
                write!(
                    f,
                    "{} {} {} {}",
                    console::style("✔").green().bold(),
                    console::style("PASS!").green().bold(),
                    self.name,
                    console::style(&self.description).dim(),
                )
            }
            Verdict::Fail(error) => {
                writeln!(
                    f,
                    "{} {} {} {}",
                    console::style("✘").red().bold(),
                    console::style("FAIL!").red().bold(),
                    self.name,
                    console::style(&self.description).dim(),
                )?;
                writeln!(
                    f,
                    "  {} {} {}",
                    console::style("Request:").yellow().bold(),
                    self.method,
                    self.url
                )?;
                if let Some(index) = error.index() {
                    writeln!(
                        f,
                        "  {} #{index}",
                        console::style("Assertion:").yellow().bold()
                    )?;
                }
                writeln!(f, "  {}", console::style(error).red())?;

                if let CaseError::AssertionFailed {
                    actual, expected, ..
                } = error
                {
                    writeln!(
                        f,
                        "  {} {}",
                        console::style("Expected:").green(),
                        console::style(expected).green().bold()
                    )?;
                    writeln!(
                        f,
                        "  {} {}",
                        console::style("Actual:  ").red(),
                        console::style(actual).red().bold()
                    )?;
                }

                Ok(())
            }
        }
    }
}

pub trait Assert {
    fn assert(self) -> CaseReport;
}

impl Assert for RunnerResult {
    fn assert(self) -> CaseReport {
        let verdict = self
            .response
            .and_then(|response| evaluate(&response, &self.assertions))
            .into();

        CaseReport {
            name: self.name,
            description: self.description,
            method: self.method,
            url: self.url,
            verdict,
        }
    }
}

impl Asserter {
    pub async fn run(
        rx: Receiver<RunnerResult>,
        output_tx: Sender<CaseReport>,
    ) -> Result<(), AsserterError> {
        while let Ok(msg) = rx.recv_async().await {
            output_tx.send_async(msg.assert()).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use reqwest::StatusCode;
    use serde_json::Value;
    use serde_json::json;

    use crate::asserter::Asserter;
    use crate::asserter::CaseReport;
    use crate::asserter::Verdict;
    use crate::asserter::evaluate;
    use crate::asserter::values_equal;
    use crate::error::CaseError;
    use crate::error::ConfigError;
    use crate::extractor::ExtractionError;
    use crate::runner::CapturedResponse;
    use crate::runner::RunnerResult;

    fn response(status: StatusCode, body: &str) -> CapturedResponse {
        CapturedResponse {
            status,
            body_text: body.to_string(),
            body_json: serde_json::from_str(body).ok(),
        }
    }

    fn ok_json(body: Value) -> CapturedResponse {
        response(StatusCode::OK, &body.to_string())
    }

    fn single(target: &str, expected: Value, kind: &str) -> Vec<Value> {
        vec![json!({ "target": target, "expected": expected, "type": kind })]
    }

    #[test]
    fn no_assertions_pass() {
        assert!(evaluate(&response(StatusCode::INTERNAL_SERVER_ERROR, ""), &[]).is_ok());
    }

    #[test]
    fn status_code_equal_ignores_body() {
        let resp = response(StatusCode::NOT_FOUND, "definitely not json");

        assert!(evaluate(&resp, &single("status_code", json!(404), "equal")).is_ok());
    }

    #[test]
    fn equal_is_type_sensitive() {
        let resp = ok_json(json!({ "code": 5 }));

        assert!(evaluate(&resp, &single("$.code", json!(5), "equal")).is_ok());

        let err = evaluate(&resp, &single("$.code", json!("5"), "equal")).unwrap_err();
        assert!(matches!(
            err,
            CaseError::AssertionFailed { index: 1, ref actual, ref expected, .. }
                if *actual == json!(5) && *expected == json!("5")
        ));
    }

    #[test]
    fn equal_compares_numbers_by_value() {
        assert!(values_equal(&json!(5), &json!(5.0)));
        assert!(values_equal(&json!({ "a": [1, 2.0] }), &json!({ "a": [1.0, 2] })));
        assert!(!values_equal(&json!(1), &json!(true)));
        assert!(!values_equal(&json!([1]), &json!([1, 1])));
    }

    #[test]
    fn not_equal() {
        let resp = ok_json(json!({ "msg": "ok" }));

        assert!(evaluate(&resp, &single("$.msg", json!("error"), "not_equal")).is_ok());
        assert!(evaluate(&resp, &single("$.msg", json!("ok"), "not_equal")).is_err());
    }

    #[test]
    fn contains() {
        let resp = ok_json(json!({
            "tags": ["a", "b"],
            "greeting": "hello world",
            "short": "hello",
            "count": 1234
        }));

        assert!(evaluate(&resp, &single("$.tags", json!("b"), "contains")).is_ok());
        assert!(evaluate(&resp, &single("$.greeting", json!("wor"), "contains")).is_ok());
        assert!(evaluate(&resp, &single("$.count", json!(23), "contains")).is_ok());

        let err = evaluate(&resp, &single("$.short", json!("xyz"), "contains")).unwrap_err();
        assert!(matches!(err, CaseError::AssertionFailed { index: 1, .. }));

        // list membership is by element, not by substring of an element
        assert!(evaluate(&resp, &single("$.tags", json!("ab"), "contains")).is_err());
    }

    #[test]
    fn is_not_none() {
        let resp = ok_json(json!({ "token": "abc", "missing": null }));

        assert!(evaluate(&resp, &single("$.token", json!(true), "is_not_none")).is_ok());
        assert!(evaluate(&resp, &single("$.missing", json!(true), "is_not_none")).is_err());
    }

    #[test]
    fn greater_than_requires_numbers() {
        let resp = ok_json(json!({ "n": 10, "s": "5", "f": 2.5 }));

        assert!(evaluate(&resp, &single("$.n", json!(3), "greater_than")).is_ok());
        assert!(evaluate(&resp, &single("$.f", json!(2), "greater_than")).is_ok());
        assert!(matches!(
            evaluate(&resp, &single("$.n", json!(10), "greater_than")),
            Err(CaseError::AssertionFailed { .. })
        ));

        let err = evaluate(&resp, &single("$.s", json!(3), "greater_than")).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::TypeMismatch { index: 1, kind: "greater_than", .. })
        ));
    }

    #[test]
    fn type_equal() {
        let resp = ok_json(json!({
            "s": "x", "i": 1, "f": 1.5, "b": false, "o": {}, "a": []
        }));

        for (target, name) in [
            ("$.s", "string"),
            ("$.i", "integer"),
            ("$.b", "boolean"),
            ("$.o", "object"),
            ("$.a", "array"),
            ("$.s", "str"),
            ("$.a", "list"),
        ] {
            assert!(
                evaluate(&resp, &single(target, json!(name), "type_equal")).is_ok(),
                "{target} should be {name}"
            );
        }

        assert!(evaluate(&resp, &single("$.f", json!("integer"), "type_equal")).is_err());
        assert!(evaluate(&resp, &single("$.i", json!("string"), "type_equal")).is_err());

        let err = evaluate(&resp, &single("$.s", json!("uuid"), "type_equal")).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::UnsupportedTypeName { index: 1, .. })
        ));
    }

    #[test]
    fn starts_with() {
        let resp = ok_json(json!({ "img": "data:image/png;base64,AAAA", "n": 7 }));

        assert!(evaluate(&resp, &single("$.img", json!("data:image"), "starts_with")).is_ok());
        assert!(evaluate(&resp, &single("$.img", json!("http"), "starts_with")).is_err());

        let err = evaluate(&resp, &single("$.n", json!("7"), "starts_with")).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::TypeMismatch { kind: "starts_with", .. })
        ));
    }

    #[test]
    fn kind_is_case_insensitive_and_may_be_spelled_kind() {
        let resp = ok_json(json!({ "a": 1 }));
        let assertions = vec![
            json!({ "target": "$.a", "expected": 1, "type": "EQUAL" }),
            json!({ "target": "$.a", "expected": 0, "kind": "Greater_Than" }),
        ];

        assert!(evaluate(&resp, &assertions).is_ok());
    }

    #[test]
    fn unknown_kind() {
        let resp = ok_json(json!({ "a": 1 }));

        let err = evaluate(&resp, &single("$.a", json!(1), "less_than")).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::UnsupportedKind { index: 1, ref kind })
                if kind == "less_than"
        ));
    }

    #[test]
    fn earlier_mismatch_beats_later_unknown_kind() {
        let resp = response(StatusCode::NOT_FOUND, "");
        let assertions = vec![
            json!({ "target": "status_code", "expected": 200, "type": "equal" }),
            json!({ "target": "status_code", "expected": 1, "type": "less_than" }),
        ];

        let err = evaluate(&resp, &assertions).unwrap_err();
        assert!(matches!(
            err,
            CaseError::AssertionFailed { index: 1, ref actual, .. } if *actual == json!(404)
        ));
    }

    #[test]
    fn target_and_kind_are_checked_in_turn() {
        let resp = ok_json(json!({ "a": 1 }));

        let assertions = vec![
            json!({ "target": "$.a", "expected": 2, "type": "equal" }),
            json!({ "target": "headers.location", "expected": "/", "type": "equal" }),
        ];
        let err = evaluate(&resp, &assertions).unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert!(matches!(err, CaseError::AssertionFailed { .. }));

        let assertions = vec![
            json!({ "target": "$.a", "expected": 1, "type": "equal" }),
            json!({ "target": "headers.location", "expected": "/", "type": "equal" }),
        ];
        let err = evaluate(&resp, &assertions).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::UnsupportedTarget { index: 2, .. })
        ));
    }

    #[test]
    fn missing_fields_are_reported_before_extraction() {
        // The body is not JSON, so extracting the first assertion would fail.
        // The broken second assertion has to win.
        let resp = response(StatusCode::OK, "plain");
        let assertions = vec![
            json!({ "target": "$.a", "expected": 1, "type": "equal" }),
            json!({ "target": "$.b", "type": "equal" }),
        ];

        let err = evaluate(&resp, &assertions).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::MissingAssertionFields { index: 2, ref missing })
                if *missing == vec!["expected"]
        ));
        assert_eq!(
            err.to_string(),
            "assertion #2 is missing required fields: expected"
        );
    }

    #[test]
    fn expected_null_counts_as_present() {
        let resp = ok_json(json!({ "a": null }));
        let assertions = vec![json!({ "target": "$.a", "expected": null, "type": "equal" })];

        assert!(evaluate(&resp, &assertions).is_ok());
    }

    #[test]
    fn every_missing_field_is_named() {
        let resp = ok_json(json!({}));

        let err = evaluate(&resp, &[json!({})]).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Configuration(ConfigError::MissingAssertionFields { index: 1, ref missing })
                if *missing == vec!["target", "expected", "kind"]
        ));
    }

    #[test]
    fn extraction_errors_carry_the_index() {
        let resp = ok_json(json!({ "a": 1 }));
        let assertions = vec![
            json!({ "target": "status_code", "expected": 200, "type": "equal" }),
            json!({ "target": "$.nope", "expected": 1, "type": "equal" }),
        ];

        let err = evaluate(&resp, &assertions).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Extraction { index: 2, source: ExtractionError::NoMatch(_) }
        ));

        let resp = response(StatusCode::OK, "<html/>");
        let err = evaluate(&resp, &single("$.a", json!(1), "equal")).unwrap_err();
        assert!(matches!(
            err,
            CaseError::Extraction { index: 1, source: ExtractionError::NotStructured }
        ));
    }

    #[test]
    fn stops_at_first_failure() {
        let resp = ok_json(json!({ "a": 1, "b": 2 }));
        let assertions = vec![
            json!({ "target": "$.a", "expected": 1, "type": "equal" }),
            json!({ "target": "$.b", "expected": 3, "type": "equal" }),
            json!({ "target": "$.a", "expected": 9, "type": "equal" }),
        ];

        let err = evaluate(&resp, &assertions).unwrap_err();
        assert_eq!(err.index(), Some(2));
    }

    #[test]
    fn many_matches_compare_as_a_list() {
        let resp = ok_json(json!({ "users": [{ "id": 1 }, { "id": 2 }] }));

        assert!(evaluate(&resp, &single("$.users[*].id", json!([1, 2]), "equal")).is_ok());
        assert!(evaluate(&resp, &single("$.users[*].id", json!(2), "contains")).is_ok());
    }

    #[tokio::test]
    async fn asserter_stage_forwards_one_report_per_result() {
        let (runner_tx, asserter_rx) = flume::unbounded::<RunnerResult>();
        let (asserter_tx, outputter_rx) = flume::unbounded::<CaseReport>();

        tokio::spawn(async move {
            Asserter::run(asserter_rx, asserter_tx).await.unwrap();
        });

        runner_tx
            .send_async(RunnerResult {
                name: "login[1]".into(),
                description: "valid user".into(),
                method: "POST".into(),
                url: "http://test.com/login".into(),
                response: Ok(ok_json(json!({ "token": "abc" }))),
                assertions: single("$.token", json!("a"), "starts_with"),
            })
            .await
            .unwrap();

        runner_tx
            .send_async(RunnerResult {
                name: "login[2]".into(),
                description: "wrong password".into(),
                method: "POST".into(),
                url: "http://test.com/login".into(),
                response: Ok(response(StatusCode::UNAUTHORIZED, "")),
                assertions: single("status_code", json!(200), "equal"),
            })
            .await
            .unwrap();
        drop(runner_tx);

        let first = outputter_rx.recv_async().await.unwrap();
        assert_eq!(first.name, "login[1]");
        assert!(first.verdict.is_pass());

        let second = outputter_rx.recv_async().await.unwrap();
        assert_eq!(second.description, "wrong password");
        let Verdict::Fail(error) = second.verdict else {
            panic!("expected a failure");
        };
        assert_eq!(error.index(), Some(1));
        assert!(error.to_string().contains("401"));

        assert!(outputter_rx.recv_async().await.is_err());
    }
}
