use std::ops::Range;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Deserialize, Debug, Clone)]
pub struct DdtQuest {
    pub setup: Setup,
    #[serde(default)]
    pub global: Global,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Setup {
    pub base_url: String,
    pub case_dir: Option<String>,
    pub timeout: Option<f64>,
    pub concurrency: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Global {
    pub headers: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFormat {
    Toml,
    Yaml,
}

impl CaseFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(CaseFormat::Toml),
            "yaml" | "yml" => Some(CaseFormat::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaseParseError {
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CaseParseError {
    /// Byte range of the offending text, when the parser reports one.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            CaseParseError::Toml(error) => error.span(),
            CaseParseError::Yaml(error) => error.location().map(|l| l.index()..l.index() + 1),
        }
    }
}

/// Parses a case definition into a schema-less value. Both formats end up in
/// the same shape, so the rest of the pipeline does not care which was used.
pub fn parse_case(src: &str, format: CaseFormat) -> Result<Value, CaseParseError> {
    let value = match format {
        CaseFormat::Toml => toml::from_str::<Value>(src)?,
        CaseFormat::Yaml => serde_yaml::from_str::<Value>(src)?,
    };

    Ok(value)
}
