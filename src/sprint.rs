use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SprintParseError {
    #[error("Sprint value has no properties: {0}")]
    NoProperties(String),
    #[error("Unsupported sprint value: {0}")]
    UnsupportedValue(String),
    #[error("Unparseable date: {0}")]
    Date(String),
}

/// Properties of one sprint an issue passed through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SprintRecord {
    properties: BTreeMap<String, String>,
}

impl SprintRecord {
    /// A property value. Empty, `null` and `<null>` values read as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !is_null_marker(value))
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn start_date(&self) -> Option<&str> {
        self.get("startDate")
    }

    pub fn end_date(&self) -> Option<&str> {
        self.get("endDate")
    }

    /// Parses a legacy greenhopper blob such as
    /// `com.atlassian.greenhopper.service.sprint.Sprint@1f[id=4,name=Sprint 4,startDate=...]`.
    pub fn parse_blob(blob: &str) -> Result<Self, SprintParseError> {
        let body = match (blob.find('['), blob.rfind(']')) {
            (Some(open), Some(close)) if open < close => &blob[open + 1..close],
            _ => blob,
        };

        let mut properties: BTreeMap<String, String> = BTreeMap::new();
        let mut last_key: Option<String> = None;

        for segment in body.split(',') {
            match segment.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim().to_string();
                    properties.insert(key.clone(), value.to_string());
                    last_key = Some(key);
                }
                // A comma inside a value (sprint names, goals) splits it; glue it back.
                None => {
                    if let Some(value) = last_key.as_ref().and_then(|key| properties.get_mut(key)) {
                        value.push(',');
                        value.push_str(segment);
                    }
                }
            }
        }

        if properties.is_empty() {
            return Err(SprintParseError::NoProperties(blob.to_string()));
        }
        Ok(Self { properties })
    }

    /// Reads a cloud-style sprint object, e.g. `{"name": "Sprint 4", "startDate": "..."}`.
    pub fn from_object(object: &serde_json::Map<String, Value>) -> Self {
        let properties = object
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text.clone(),
                    Value::Number(number) => number.to_string(),
                    Value::Bool(flag) => flag.to_string(),
                    _ => return None,
                };
                Some((key.clone(), value))
            })
            .collect();
        Self { properties }
    }

    pub fn from_value(value: &Value) -> Result<Self, SprintParseError> {
        match value {
            Value::String(blob) => Self::parse_blob(blob),
            Value::Object(object) => Ok(Self::from_object(object)),
            other => Err(SprintParseError::UnsupportedValue(other.to_string())),
        }
    }
}

fn is_null_marker(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null") || value.eq_ignore_ascii_case("<null>")
}

/// Every sprint record of a raw sprint field value, in membership order.
/// Malformed entries are logged and skipped.
pub fn sprint_records(value: Option<&Value>) -> Vec<SprintRecord> {
    let entries: Vec<&Value> = match value {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries.iter().collect(),
        Some(single) => vec![single],
    };

    entries
        .into_iter()
        .filter_map(|entry| match SprintRecord::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Failed to retrieve sprint properties: {}", e);
                None
            }
        })
        .collect()
}

/// Parses the timestamp formats the tracker emits
/// (`2019-01-07T15:00:00.000Z`, `2019-01-07T15:00:00.000+0000`).
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, SprintParseError> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| SprintParseError::Date(text.to_string()))
}

/// Like [`parse_timestamp`], but logs and swallows failures.
pub fn parse_timestamp_logged(text: &str) -> Option<DateTime<Utc>> {
    match parse_timestamp(text) {
        Ok(date) => Some(date),
        Err(e) => {
            log::warn!("Failed to parse time: {}", e);
            None
        }
    }
}
