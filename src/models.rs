//! Data models for playlist channels and EPG programmes

use chrono::{DateTime, FixedOffset, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::epg::parse_timestamp;

/// Group used when a channel carries neither `group-title` nor `#EXTGRP`
pub const DEFAULT_GROUP: &str = "Other";

/// EXTINF attribute key
///
/// The handful of keys the rest of the crate reads are matched
/// case-insensitively; everything else is kept with its original spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrKey {
    TvgId,
    TvgName,
    TvgLogo,
    GroupTitle,
    EpgId,
    Other(String),
}

impl AttrKey {
    pub fn parse(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "tvg-id" => AttrKey::TvgId,
            "tvg-name" => AttrKey::TvgName,
            "tvg-logo" => AttrKey::TvgLogo,
            "group-title" => AttrKey::GroupTitle,
            "epg-id" => AttrKey::EpgId,
            _ => AttrKey::Other(key.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttrKey::TvgId => "tvg-id",
            AttrKey::TvgName => "tvg-name",
            AttrKey::TvgLogo => "tvg-logo",
            AttrKey::GroupTitle => "group-title",
            AttrKey::EpgId => "epg-id",
            AttrKey::Other(key) => key,
        }
    }
}

/// Insertion-ordered attribute map where the first occurrence of a key wins.
/// Equality compares key/value pairs regardless of order.
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<(AttrKey, String)>,
}

impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        // keys are unique, so equal length plus containment is map equality
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get_key(k) == Some(v.as_str()))
    }
}

impl Eq for Attributes {}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already present. Returns whether the value was stored.
    pub fn insert_first(&mut self, key: AttrKey, value: String) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.entries.push((key, value));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_key(&AttrKey::parse(key))
    }

    pub fn get_key(&self, key: &AttrKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `key` when present and not blank
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn contains_key(&self, key: &AttrKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by key name, used when synthesizing an EXTINF line
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One playable playlist entry
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    /// Position in the playlist, 0-based with no gaps
    pub index: usize,
    /// Seconds, `-1` for live or unknown
    pub duration: i64,
    pub title: String,
    pub url: String,
    pub attrs: Attributes,
    /// Name from a preceding `#EXTGRP`, used only when `group-title` is absent
    pub group: String,
    /// Raw property lines that preceded the entry, verbatim
    pub properties: Vec<String>,
    pub vlc_opts: BTreeMap<String, String>,
    pub kodi_props: BTreeMap<String, String>,
    /// Unrecognized directive lines, verbatim
    pub other_props: Vec<String>,
    /// Original EXTINF line
    pub raw_extinf: String,
    pub epg: Option<Vec<Programme>>,
}

impl Channel {
    /// Resolves `group-title`, then `#EXTGRP`, then [`DEFAULT_GROUP`]. Never empty.
    pub fn group_title(&self) -> &str {
        self.attrs
            .get_key(&AttrKey::GroupTitle)
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .or_else(|| Some(self.group.trim()).filter(|g| !g.is_empty()))
            .unwrap_or(DEFAULT_GROUP)
    }

    pub fn tvg_id(&self) -> &str {
        self.attrs.get_key(&AttrKey::TvgId).unwrap_or_default()
    }

    /// Alternate name for EPG matching, falls back to the title
    pub fn tvg_name(&self) -> &str {
        self.attrs
            .get_key(&AttrKey::TvgName)
            .unwrap_or(self.title.as_str())
    }

    pub fn tvg_logo(&self) -> &str {
        self.attrs.get_key(&AttrKey::TvgLogo).unwrap_or_default()
    }

    pub fn epg_id(&self) -> &str {
        self.attrs.get_key(&AttrKey::EpgId).unwrap_or_default()
    }

    pub fn is_playable(&self) -> bool {
        !self.url.is_empty()
    }

    /// Programme airing at `now`, if the channel has a schedule attached
    pub fn current_programme(&self, now: DateTime<Utc>) -> Option<&Programme> {
        self.epg.as_ref()?.iter().find(|p| p.is_airing(now))
    }

    /// Render the channel as an M3U block for re-export.
    ///
    /// Property lines come first, then the original EXTINF line when one was
    /// captured (byte-exact), otherwise a synthesized one with attributes
    /// sorted by key, then the URL.
    pub fn to_block(&self) -> String {
        let mut lines: Vec<String> = self.properties.clone();
        if !self.raw_extinf.is_empty() {
            lines.push(self.raw_extinf.clone());
        } else {
            let attrs = self
                .attrs
                .sorted()
                .into_iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, escape_value(v)))
                .collect::<Vec<_>>()
                .join(" ");
            if attrs.is_empty() {
                lines.push(format!("#EXTINF:{},{}", self.duration, self.title));
            } else {
                lines.push(format!("#EXTINF:{} {},{}", self.duration, attrs, self.title));
            }
        }
        lines.push(self.url.clone());
        lines.join("\n")
    }
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// A single schedule entry. Every field is a string, empty when the source omits it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Programme {
    /// Start timestamp exactly as it appeared in the source
    pub start: String,
    pub stop: String,
    pub title: String,
    pub desc: String,
    pub category: String,
    pub episode: String,
    pub rating: String,
}

impl Programme {
    pub fn start_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.start)
    }

    pub fn stop_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_timestamp(&self.stop)
    }

    pub fn is_airing(&self, now: DateTime<Utc>) -> bool {
        match (self.start_at(), self.stop_at()) {
            (Some(start), Some(stop)) => start <= now && stop > now,
            _ => false,
        }
    }

    /// Format episode number (e.g., "0.4." -> "S01E05"), raw text otherwise
    pub fn episode_label(&self) -> String {
        let episode = self.episode.trim();

        // xmltv_ns: "season.episode.part", 0-indexed
        let parts: Vec<&str> = episode.split('.').collect();
        if parts.len() >= 2 {
            let season = parts[0].trim().parse::<i32>().ok().map(|s| s + 1);
            let ep = parts[1].trim().parse::<i32>().ok().map(|e| e + 1);
            if let (Some(season), Some(ep)) = (season, ep) {
                if season > 0 && ep > 0 {
                    return format!("S{:02}E{:02}", season, ep);
                }
            }
        }

        episode.to_string()
    }
}
