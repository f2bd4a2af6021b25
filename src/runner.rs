#![allow(clippy::enum_variant_names)]

use std::sync::Arc;
use std::time::Duration;

use flume::SendError;
use flume::Sender;
use futures::future::join_all;
use reqwest::Client;
use reqwest::Method;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::COOKIE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::AcquireError;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::debug;
use tracing::info;
use url::Url;

use crate::asserter::Assert;
use crate::asserter::Verdict;
use crate::error::CaseError;
use crate::error::ConfigError;
use crate::expander::ResolvedInstance;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("channel error")]
    ChannelError(#[from] SendError<RunnerResult>),

    #[error("failed to acquire a request slot")]
    SemaphoreError(#[from] AcquireError),

    #[error("case task panicked or was cancelled")]
    TaskError(#[from] JoinError),
}

/// Everything the asserter needs to judge one instance.
#[derive(Debug)]
pub struct RunnerResult {
    pub name: String,
    pub description: String,
    pub method: String,
    pub url: String,
    pub response: Result<CapturedResponse, CaseError>,
    pub assertions: Vec<Value>,
}

#[derive(Debug)]
pub struct CapturedResponse {
    pub status: StatusCode,
    pub body_text: String,
    pub body_json: Option<Value>,
}

impl CapturedResponse {
    pub async fn from_response(resp: Response) -> Result<Self, reqwest::Error> {
        let status = resp.status();

        // Consume the body exactly once
        let body_text = resp.text().await?;

        // A body that is not JSON is fine until a path assertion needs it
        let body_json = serde_json::from_str::<Value>(&body_text).ok();

        Ok(Self {
            status,
            body_text,
            body_json,
        })
    }
}

/// Settings shared by every request, passed in rather than read from globals.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub base_url: String,
    pub default_timeout: Duration,
    pub headers: HeaderMap,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            default_timeout: DEFAULT_TIMEOUT,
            headers: HeaderMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A resolved instance turned into a concrete request.
#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
    pub assertions: Vec<Value>,
}

pub struct Dispatcher {
    client: Client,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Validates the request fields of an instance and builds the request.
    pub fn prepare(&self, instance: &ResolvedInstance) -> Result<PreparedRequest, ConfigError> {
        let url = match instance.get("url") {
            Some(Value::String(url)) => resolve_url(&self.config.base_url, url)?,
            Some(Value::Null) | None => return Err(ConfigError::MissingField("url")),
            Some(other) => return Err(invalid("url", format!("must be a string, got {other}"))),
        };

        let method = match instance.get("method") {
            Some(Value::String(method)) => parse_method(method)?,
            Some(Value::Null) | None => return Err(ConfigError::MissingField("method")),
            Some(other) => return Err(invalid("method", format!("must be a string, got {other}"))),
        };

        // Global headers first, a header set on the case wins.
        let mut headers = self.config.headers.clone();
        if let Some(case_headers) = non_null(instance.get("headers")) {
            headers.extend(parse_header_map(case_headers, "headers")?);
        }

        if let Some(cookies) = non_null(instance.get("cookies")) {
            let cookie = to_pairs(cookies, "cookies")?
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| invalid("cookies", format!("not a valid cookie header: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let (query, body) = match non_null(instance.get("body")) {
            None => (Vec::new(), RequestBody::Empty),
            Some(Value::Object(body)) => {
                let query = match non_null(body.get("params")) {
                    Some(params) => to_pairs(params, "body.params")?,
                    None => Vec::new(),
                };

                let sends_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
                let json = non_null(body.get("json"));
                let form = non_null(body.get("form"));

                let body = match (sends_body, json, form) {
                    (true, Some(json), _) => RequestBody::Json(json.clone()),
                    (true, None, Some(form)) => RequestBody::Form(to_pairs(form, "body.form")?),
                    _ => RequestBody::Empty,
                };

                (query, body)
            }
            Some(other) => return Err(invalid("body", format!("must be a table, got {other}"))),
        };

        let timeout = match non_null(instance.get("timeout")) {
            None => self.config.default_timeout,
            Some(value) => parse_timeout(value)?,
        };

        let assertions = match non_null(instance.get("assert")) {
            None => Vec::new(),
            Some(Value::Array(assertions)) => assertions.clone(),
            Some(other) => {
                return Err(invalid(
                    "assert",
                    format!("must be a list of assertions, got {other}"),
                ));
            }
        };

        Ok(PreparedRequest {
            method,
            url,
            headers,
            query,
            body,
            timeout,
            assertions,
        })
    }

    /// Sends a prepared request. Connection errors and timeouts come back as
    /// [`CaseError::Transport`] and are never retried.
    pub async fn dispatch(&self, request: &PreparedRequest) -> Result<CapturedResponse, CaseError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .timeout(request.timeout);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(json) => builder.json(json),
            RequestBody::Form(form) => builder.form(form),
        };

        let response = CapturedResponse::from_response(builder.send().await?).await?;

        debug!(
            method = %request.method,
            url = %request.url,
            status = %response.status,
            body = %response.body_text,
            "response received"
        );

        Ok(response)
    }

    /// Prepares and sends one instance, without judging the response yet.
    pub async fn execute(&self, instance: &ResolvedInstance) -> RunnerResult {
        let name = instance.name();
        info!(case = %name, description = %instance.description, "running case");

        let raw_field = |key: &str| match instance.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let (method, url, response, assertions) = match self.prepare(instance) {
            Ok(request) => {
                let response = self.dispatch(&request).await;
                (
                    request.method.to_string(),
                    request.url.to_string(),
                    response,
                    request.assertions,
                )
            }
            Err(error) => (
                raw_field("method").to_uppercase(),
                raw_field("url"),
                Err(CaseError::from(error)),
                Vec::new(),
            ),
        };

        RunnerResult {
            name,
            description: instance.description.clone(),
            method,
            url,
            response,
            assertions,
        }
    }

    /// Runs one instance end to end and returns its verdict.
    pub async fn run(&self, instance: &ResolvedInstance) -> Verdict {
        self.execute(instance).await.assert().verdict
    }
}

/// Runner stage of the pipeline. Every instance runs in its own task, at most
/// `concurrency` of them in flight, and results are sent in completion order.
pub async fn run_cases(
    instances: Vec<ResolvedInstance>,
    dispatcher: Arc<Dispatcher>,
    concurrency: usize,
    tx: Sender<RunnerResult>,
) -> Result<(), RunnerError> {
    let slots = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(instances.len());

    for instance in instances {
        let permit = slots.clone().acquire_owned().await?;
        let dispatcher = dispatcher.clone();
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            let result = dispatcher.execute(&instance).await;
            drop(permit);
            tx.send_async(result).await
        }));
    }

    for handle in join_all(handles).await {
        handle??;
    }

    Ok(())
}

fn invalid(field: &str, message: String) -> ConfigError {
    ConfigError::InvalidField {
        field: field.to_string(),
        message,
    }
}

fn non_null(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

/// A url starting with `/` is relative to the base url, anything else is
/// taken as absolute.
fn resolve_url(base_url: &str, url: &str) -> Result<Url, ConfigError> {
    let full = if url.starts_with('/') {
        format!("{base_url}{url}")
    } else {
        url.to_string()
    };

    Url::parse(&full).map_err(|e| invalid("url", format!("`{full}` is not a valid url: {e}")))
}

fn parse_method(raw: &str) -> Result<Method, ConfigError> {
    let method = match raw.to_uppercase().as_str() {
        "GET" => Method::GET,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "DELETE" => Method::DELETE,
        "PATCH" => Method::PATCH,
        other => {
            return Err(ConfigError::UnsupportedMethod {
                method: other.to_string(),
            });
        }
    };

    Ok(method)
}

fn parse_timeout(value: &Value) -> Result<Duration, ConfigError> {
    value
        .as_f64()
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| invalid("timeout", format!("must be a positive number of seconds, got {value}")))
}

/// Parses a table of header names to scalar values.
pub fn parse_header_map(value: &Value, field: &str) -> Result<HeaderMap, ConfigError> {
    let mut header_map = HeaderMap::new();

    for (key, value) in to_pairs(value, field)? {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| invalid(field, format!("invalid header name `{key}`: {e}")))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| invalid(field, format!("invalid header value for `{key}`: {e}")))?;

        header_map.append(name, value);
    }

    Ok(header_map)
}

/// Flattens a table of scalars into key/value pairs. A list repeats its key
/// once per element and `null` entries are dropped.
fn to_pairs(value: &Value, field: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let Value::Object(table) = value else {
        return Err(invalid(field, format!("must be a table, got {value}")));
    };

    let mut pairs = Vec::with_capacity(table.len());
    for (key, value) in table {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    pairs.push((key.clone(), scalar_text(item, field, key)?));
                }
            }
            other => pairs.push((key.clone(), scalar_text(other, field, key)?)),
        }
    }

    Ok(pairs)
}

fn scalar_text(value: &Value, field: &str, key: &str) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid(
            field,
            format!("value of `{key}` must be a string, number or boolean, got {other}"),
        )),
    }
}
