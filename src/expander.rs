use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

/// Reserved key holding the list of variant overlays.
pub const DDTS_KEY: &str = "ddts";
/// Overlay key carrying the human readable description of a variant.
pub const DESC_KEY: &str = "desc";
pub const DEFAULT_DESCRIPTION: &str = "No description";

#[derive(Debug, Error, PartialEq)]
pub enum ExpandError {
    #[error("`ddts` must be a list of tables, got {0}")]
    DdtsNotAList(Value),

    #[error("`ddts` entry #{index} must be a table, got {value}")]
    OverlayNotATable { index: usize, value: Value },
}

/// One fully materialised variant of a case, ready to be dispatched.
///
/// The description lives next to the fields rather than inside them, so an
/// overlay can never clobber it and the dispatcher never sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInstance {
    pub case: String,
    pub ordinal: usize,
    pub description: String,
    pub fields: Map<String, Value>,
}

impl ResolvedInstance {
    /// Name used in reports, `case[ordinal]`.
    pub fn name(&self) -> String {
        format!("{}[{}]", self.case, self.ordinal)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Expands one raw case definition into one instance per overlay in `ddts`.
///
/// Every instance starts from its own deep copy of the template (the raw
/// definition minus `ddts`) and each overlay key replaces the template value
/// wholesale. A missing or empty `ddts` still yields a single instance.
pub fn expand(case: &str, raw: &Map<String, Value>) -> Result<Vec<ResolvedInstance>, ExpandError> {
    let base: Map<String, Value> = raw
        .iter()
        .filter(|(key, _)| key.as_str() != DDTS_KEY)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let no_overrides = [Value::Object(Map::new())];
    let overlays: &[Value] = match raw.get(DDTS_KEY) {
        None | Some(Value::Null) => &no_overrides,
        Some(Value::Array(overlays)) if overlays.is_empty() => &no_overrides,
        Some(Value::Array(overlays)) => overlays,
        Some(other) => return Err(ExpandError::DdtsNotAList(other.clone())),
    };

    overlays
        .iter()
        .enumerate()
        .map(|(i, overlay)| {
            let Value::Object(overlay) = overlay else {
                return Err(ExpandError::OverlayNotATable {
                    index: i + 1,
                    value: overlay.clone(),
                });
            };

            let mut fields = base.clone();
            for (key, value) in overlay {
                if key != DESC_KEY {
                    fields.insert(key.clone(), value.clone());
                }
            }

            Ok(ResolvedInstance {
                case: case.to_string(),
                ordinal: i + 1,
                description: describe(overlay.get(DESC_KEY)),
                fields,
            })
        })
        .collect()
}

fn describe(desc: Option<&Value>) -> String {
    match desc {
        Some(Value::String(desc)) => desc.clone(),
        Some(Value::Null) | None => DEFAULT_DESCRIPTION.to_string(),
        Some(other) => other.to_string(),
    }
}
