use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use miette::NamedSource;
use miette::SourceSpan;
use reqwest::header::HeaderMap;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::expander::DDTS_KEY;
use crate::expander::ExpandError;
use crate::expander::ResolvedInstance;
use crate::expander::expand;
use crate::parser::CaseFormat;
use crate::parser::DdtQuest;
use crate::parser::parse_case;
use crate::runner::DEFAULT_TIMEOUT;
use crate::runner::DispatchConfig;
use crate::runner::parse_header_map;

const BASE_URL_ENDS_WITH: &str =
    "The base URL from setup can't end with a /, relative case URLs must start with one";
const DEFAULT_CASE_DIR: &str = "cases";
const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid field `{field}`: {message}")]
pub struct ValidationError {
    field: String,
    message: String,
    #[source_code]
    src: Option<NamedSource<String>>,
    #[label("invalid value here")]
    span: Option<SourceSpan>,
}

macro_rules! validation_err {
    ($field:expr, $msg:expr, $file_name:expr, $src:expr, $span:expr) => {
        ValidationError {
            field: $field.to_string(),
            message: $msg.to_string(),
            src: Some(NamedSource::new($file_name, $src.to_string())),
            span: $span,
        }
    };
}

/// Validated settings for one run.
#[derive(Debug)]
pub struct RunConfig {
    pub dispatch: DispatchConfig,
    pub case_dir: PathBuf,
    pub concurrency: usize,
}

pub struct Validator {
    settings: DdtQuest,
    toml_src: String,
    file_name: String,
}

impl Validator {
    pub fn new(settings: &DdtQuest, toml_src: &str, file_name: &str) -> Self {
        Self {
            settings: settings.clone(),
            toml_src: toml_src.into(),
            file_name: file_name.into(),
        }
    }

    pub fn validate(&self) -> Result<RunConfig, ValidationError> {
        let setup = &self.settings.setup;

        let base_url = parse_base_url(&setup.base_url).map_err(|message| {
            self.error("setup.base_url", message, find_span(&setup.base_url, &self.toml_src))
        })?;

        let default_timeout = match setup.timeout {
            None => DEFAULT_TIMEOUT,
            Some(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(self.error(
                    "setup.timeout",
                    format!("must be a positive number of seconds, got {secs}"),
                    find_key_span("timeout", &self.toml_src),
                ));
            }
        };

        let concurrency = match setup.concurrency {
            None => DEFAULT_CONCURRENCY,
            Some(0) => {
                return Err(self.error(
                    "setup.concurrency",
                    "must be at least 1",
                    find_key_span("concurrency", &self.toml_src),
                ));
            }
            Some(n) => n,
        };

        let headers = match &self.settings.global.headers {
            None => HeaderMap::new(),
            Some(value) => parse_header_map(value, "global.headers").map_err(|e| {
                self.error("global.headers", e, find_key_span("headers", &self.toml_src))
            })?,
        };

        // Case files live next to the settings file unless the path is absolute.
        let case_dir = setup.case_dir.as_deref().unwrap_or(DEFAULT_CASE_DIR);
        let case_dir = Path::new(&self.file_name)
            .parent()
            .unwrap_or(Path::new(""))
            .join(case_dir);

        Ok(RunConfig {
            dispatch: DispatchConfig {
                base_url,
                default_timeout,
                headers,
            },
            case_dir,
            concurrency,
        })
    }

    fn error(&self, field: &str, message: impl ToString, span: Option<SourceSpan>) -> ValidationError {
        validation_err!(field, message.to_string(), &self.file_name, &self.toml_src, span)
    }
}

fn parse_base_url(base_url: &str) -> Result<String, String> {
    if base_url.ends_with('/') {
        return Err(BASE_URL_ENDS_WITH.to_string());
    }

    Url::parse(base_url).map_err(|e| format!("Failed to parse URL: {e}"))?;

    Ok(base_url.to_string())
}

/// Reads, parses and expands one case file. Any problem with the file itself
/// is reported against its source before a single request goes out.
pub fn load_case(path: &Path) -> Result<Vec<ResolvedInstance>, ValidationError> {
    let file_name = path.display().to_string();
    let case = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.clone());

    let Some(format) = CaseFormat::from_path(path) else {
        return Err(ValidationError {
            field: file_name,
            message: "case files must end in .toml, .yaml or .yml".into(),
            src: None,
            span: None,
        });
    };

    let src = std::fs::read_to_string(path).map_err(|e| ValidationError {
        field: file_name.clone(),
        message: format!("Failed to read case file: {e}"),
        src: None,
        span: None,
    })?;

    let raw = parse_case(&src, format).map_err(|e| {
        let span = e
            .span()
            .map(|range| SourceSpan::new(range.start.into(), range.len()));
        validation_err!(case, e, &file_name, &src, span)
    })?;

    let Value::Object(raw) = raw else {
        return Err(validation_err!(
            case,
            "a case file must hold a single table at the top level",
            &file_name,
            &src,
            None
        ));
    };

    expand(&case, &raw).map_err(|e| {
        let field = match &e {
            ExpandError::DdtsNotAList(_) => DDTS_KEY.to_string(),
            ExpandError::OverlayNotATable { index, .. } => format!("{DDTS_KEY} #{index}"),
        };
        validation_err!(field, e, &file_name, &src, find_key_span(DDTS_KEY, &src))
    })
}

/// Lists the case files in `dir` in name order. With a non-empty `only`, keeps
/// the files whose name or stem is listed and fails on names that match none.
pub fn discover_cases(dir: &Path, only: &[String]) -> Result<Vec<PathBuf>, ValidationError> {
    let read_error = |e: std::io::Error| ValidationError {
        field: dir.display().to_string(),
        message: format!("Failed to read case directory: {e}"),
        src: None,
        span: None,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_file() && CaseFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();

    if only.is_empty() {
        return Ok(files);
    }

    let matches = |path: &Path, name: &str| {
        path.file_name().is_some_and(|n| n == name) || path.file_stem().is_some_and(|s| s == name)
    };

    if let Some(unknown) = only
        .iter()
        .find(|name| !files.iter().any(|path| matches(path, name)))
    {
        return Err(ValidationError {
            field: "--case".into(),
            message: format!("no case file named `{unknown}` in {}", dir.display()),
            src: None,
            span: None,
        });
    }

    files.retain(|path| only.iter().any(|name| matches(path, name)));

    Ok(files)
}

fn find_span(needle: &str, toml_src: &str) -> Option<SourceSpan> {
    let pattern = format!("\"{}\"", needle);
    toml_src
        .find(&pattern)
        .map(|start| SourceSpan::new(start.into(), pattern.len()))
}

/// Finds the line that assigns `key`, either `key = ...` (TOML) or `key: ...`
/// (YAML). Comments and mentions inside other values are skipped.
fn find_key_span(key: &str, src: &str) -> Option<SourceSpan> {
    let mut offset = 0;
    for line in src.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let assigns = trimmed
            .strip_prefix(key)
            .map(str::trim_start)
            .is_some_and(|rest| rest.starts_with('=') || rest.starts_with(':'));

        if assigns {
            let start = offset + (line.len() - trimmed.len());
            return Some(SourceSpan::new(start.into(), key.len()));
        }
        offset += line.len();
    }

    None
}
