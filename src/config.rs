//! Ingestion configuration

use serde::{Deserialize, Serialize};

use crate::diagnostics::DEFAULT_LIMIT;
use crate::epg::{JsonFieldMap, DEFAULT_KEY_ORDER};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Channel attributes probed, in order, when joining EPG data
    #[serde(default = "default_key_order")]
    pub epg_key_order: Vec<String>,
    /// Field names used by JSON EPG documents
    #[serde(default)]
    pub json_fields: JsonFieldMap,
    /// Keep EXTINF entries that have no URL, with an empty `url`
    #[serde(default)]
    pub keep_unplayable: bool,
    #[serde(default = "default_max_diagnostics")]
    pub max_diagnostics: usize,
}

fn default_key_order() -> Vec<String> {
    DEFAULT_KEY_ORDER.iter().map(|k| k.to_string()).collect()
}

fn default_max_diagnostics() -> usize { DEFAULT_LIMIT }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            epg_key_order: default_key_order(),
            json_fields: JsonFieldMap::default(),
            keep_unplayable: false,
            max_diagnostics: DEFAULT_LIMIT,
        }
    }
}

impl IngestConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(Error::Config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Config)
    }

    pub fn key_order(&self) -> Vec<&str> {
        self.epg_key_order.iter().map(String::as_str).collect()
    }
}
