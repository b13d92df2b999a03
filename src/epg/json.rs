//! JSON EPG loader
//!
//! Accepts `{"programmes": [...]}` or `{"entries": [...]}` with flat item
//! objects. Field names can be remapped with [`JsonFieldMap`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{EpgIndex, EpgLoad};
use crate::config::IngestConfig;
use crate::diagnostics::{Diagnostics, Skip};
use crate::models::Programme;

/// JSON key used for each logical programme field. Defaults to the field's own name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonFieldMap {
    pub channel: String,
    pub start: String,
    pub stop: String,
    pub title: String,
    pub desc: String,
    pub category: String,
    pub episode: String,
    pub rating: String,
}

impl Default for JsonFieldMap {
    fn default() -> Self {
        Self {
            channel: "channel".to_string(),
            start: "start".to_string(),
            stop: "stop".to_string(),
            title: "title".to_string(),
            desc: "desc".to_string(),
            category: "category".to_string(),
            episode: "episode".to_string(),
            rating: "rating".to_string(),
        }
    }
}

impl JsonFieldMap {
    /// Build from `logical name -> JSON key` pairs; unknown names are ignored
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut map = Self::default();
        for (logical, actual) in pairs {
            let slot = match logical {
                "channel" => &mut map.channel,
                "start" => &mut map.start,
                "stop" => &mut map.stop,
                "title" => &mut map.title,
                "desc" => &mut map.desc,
                "category" => &mut map.category,
                "episode" => &mut map.episode,
                "rating" => &mut map.rating,
                _ => continue,
            };
            *slot = actual.to_string();
        }
        map
    }
}

/// Parse a JSON guide into an index, discarding diagnostics
pub fn load_json_epg(json: &str, fields: Option<&JsonFieldMap>) -> EpgIndex {
    parse_json_epg(json, fields).index
}

pub fn parse_json_epg(json: &str, fields: Option<&JsonFieldMap>) -> EpgLoad {
    let config = IngestConfig::default();
    let fields = fields.unwrap_or(&config.json_fields);
    load(json, fields, Diagnostics::with_limit(config.max_diagnostics))
}

pub fn parse_json_epg_with(json: &str, config: &IngestConfig) -> EpgLoad {
    load(
        json,
        &config.json_fields,
        Diagnostics::with_limit(config.max_diagnostics),
    )
}

fn load(json: &str, fields: &JsonFieldMap, mut diagnostics: Diagnostics) -> EpgLoad {
    let mut index = EpgIndex::new();

    let root: Value = match serde_json::from_str(json) {
        Ok(root) => root,
        Err(e) => {
            diagnostics.record(Skip::UnparsableDocument {
                reason: e.to_string(),
            });
            return EpgLoad { index, diagnostics };
        }
    };

    let Value::Object(root) = root else {
        diagnostics.record(Skip::UnparsableDocument {
            reason: "root is not an object".to_string(),
        });
        return EpgLoad { index, diagnostics };
    };

    for (i, item) in programme_items(&root).iter().enumerate() {
        let Value::Object(item) = item else {
            diagnostics.record(Skip::InvalidJsonItem {
                index: i,
                reason: "not an object".to_string(),
            });
            continue;
        };

        let Some(channel) = channel_id(item, &fields.channel) else {
            diagnostics.record(Skip::InvalidJsonItem {
                index: i,
                reason: format!("missing or invalid \"{}\"", fields.channel),
            });
            continue;
        };

        index.push(
            channel,
            Programme {
                start: field(item, &fields.start),
                stop: field(item, &fields.stop),
                title: field(item, &fields.title),
                desc: field(item, &fields.desc),
                category: field(item, &fields.category),
                episode: field(item, &fields.episode),
                rating: field(item, &fields.rating),
            },
        );
    }

    index.sort();
    info!(
        channels = index.len(),
        programmes = index.programme_count(),
        skipped = diagnostics.total(),
        "JSON EPG loaded"
    );
    EpgLoad { index, diagnostics }
}

/// `programmes` unless it is missing or empty, then `entries`.
/// A non-empty value that is not an array yields no items.
fn programme_items(root: &Map<String, Value>) -> &[Value] {
    match root.get("programmes") {
        Some(programmes) if !is_empty_value(programmes) => array_at(root, "programmes"),
        _ => array_at(root, "entries"),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(true) => false,
    }
}

fn array_at<'a>(root: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    match root.get(key) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// Channel id from a non-empty string or a number
fn channel_id(item: &Map<String, Value>, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Field value as a string; missing and null become empty
fn field(item: &Map<String, Value>, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
