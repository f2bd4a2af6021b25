use serde_json::Value;
use serde_json_path::JsonPath;
use thiserror::Error;

use crate::error::ConfigError;
use crate::runner::CapturedResponse;

/// Literal target selecting the numeric HTTP status code.
pub const STATUS_CODE_TARGET: &str = "status_code";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("response body is not structured data, cannot use a path expression")]
    NotStructured,

    #[error("path expression `{0}` matched nothing")]
    NoMatch(String),
}

/// Where the actual value of an assertion comes from.
#[derive(Debug)]
pub enum Target {
    StatusCode,
    Path { raw: String, path: JsonPath },
}

impl Target {
    /// Parses an assertion target. Path expressions start with `$`, or with `.`
    /// as a shorthand for `$.`.
    pub fn parse(index: usize, raw: &str) -> Result<Self, ConfigError> {
        if raw == STATUS_CODE_TARGET {
            return Ok(Target::StatusCode);
        }

        let expression = if raw.starts_with('$') {
            raw.to_string()
        } else if raw.starts_with('.') {
            format!("${raw}")
        } else {
            return Err(ConfigError::UnsupportedTarget {
                index,
                target: raw.to_string(),
            });
        };

        let path = JsonPath::parse(&expression).map_err(|e| ConfigError::InvalidPath {
            index,
            path: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Target::Path {
            raw: raw.to_string(),
            path,
        })
    }

    pub fn extract(&self, response: &CapturedResponse) -> Result<Value, ExtractionError> {
        match self {
            Target::StatusCode => Ok(Value::from(response.status.as_u16())),
            Target::Path { raw, path } => {
                let body = response
                    .body_json
                    .as_ref()
                    .ok_or(ExtractionError::NotStructured)?;

                query(body, path).ok_or_else(|| ExtractionError::NoMatch(raw.clone()))
            }
        }
    }
}

/// Runs a path query. A single match unwraps to the bare value, several matches
/// come back as an array and no match at all is `None`, never `null`.
pub fn query(value: &Value, path: &JsonPath) -> Option<Value> {
    let mut matches = path.query(value).all();

    match matches.len() {
        0 => None,
        1 => matches.pop().cloned(),
        _ => Some(Value::Array(matches.into_iter().cloned().collect())),
    }
}
