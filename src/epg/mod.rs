//! EPG (Electronic Program Guide) module
//!
//! Loaders for XMLTV and JSON guides, the per-channel programme index they
//! produce, and the join that attaches schedules to playlist channels.

mod json;
mod mapper;
mod parser;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::models::Programme;

pub use json::{load_json_epg, parse_json_epg, parse_json_epg_with, JsonFieldMap};
pub use mapper::{map_epg, DEFAULT_KEY_ORDER};
pub use parser::{load_xmltv, parse_xmltv, parse_xmltv_with};

/// Channel information from an XMLTV `<channel>` element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpgChannel {
    pub id: String,
    pub display_name: String,
    pub icon: String,
}

/// Programmes indexed by channel id, each list sorted by `start`.
///
/// Ordering compares the raw `start` strings, which is only meaningful when
/// every source uses the same fixed-width timestamp format.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpgIndex {
    programmes: HashMap<String, Vec<Programme>>,
    channels: HashMap<String, EpgChannel>,
}

/// Index plus the skip records from building it
#[derive(Debug, Clone, Default)]
pub struct EpgLoad {
    pub index: EpgIndex,
    pub diagnostics: Diagnostics,
}

impl EpgIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel_id: &str) -> Option<&[Programme]> {
        self.programmes.get(channel_id).map(Vec::as_slice)
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.programmes.contains_key(channel_id)
    }

    /// Number of channels with at least one programme
    pub fn len(&self) -> usize {
        self.programmes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programmes.is_empty()
    }

    /// Total number of programmes
    pub fn programme_count(&self) -> usize {
        self.programmes.values().map(Vec::len).sum()
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.programmes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Programme])> {
        self.programmes
            .iter()
            .map(|(id, progs)| (id.as_str(), progs.as_slice()))
    }

    /// Append a programme; call [`EpgIndex::sort`] once loading is done
    pub fn push(&mut self, channel_id: impl Into<String>, programme: Programme) {
        self.programmes
            .entry(channel_id.into())
            .or_default()
            .push(programme);
    }

    /// Stable sort of every list by the raw `start` string
    pub fn sort(&mut self) {
        for programmes in self.programmes.values_mut() {
            programmes.sort_by(|a, b| a.start.cmp(&b.start));
        }
    }

    pub fn channel_info(&self, channel_id: &str) -> Option<&EpgChannel> {
        self.channels.get(channel_id)
    }

    pub(crate) fn insert_channel(&mut self, channel: EpgChannel) {
        self.channels.entry(channel.id.clone()).or_insert(channel);
    }

    /// Fold another index into this one. Lists for a shared channel id are
    /// concatenated (existing entries first) and re-sorted.
    pub fn merge(&mut self, other: EpgIndex) {
        for (id, programmes) in other.programmes {
            self.programmes.entry(id).or_default().extend(programmes);
        }
        for (_, channel) in other.channels {
            self.insert_channel(channel);
        }
        self.sort();
    }

    /// Programme airing on `channel_id` at `now`
    pub fn current_programme(&self, channel_id: &str, now: DateTime<Utc>) -> Option<&Programme> {
        self.get(channel_id)?.iter().find(|p| p.is_airing(now))
    }

    /// Programmes overlapping `[from, to)`; entries with unreadable timestamps are left out
    pub fn programmes_between(
        &self,
        channel_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<&Programme> {
        self.get(channel_id)
            .map(|progs| {
                progs
                    .iter()
                    .filter(|p| match (p.start_at(), p.stop_at()) {
                        (Some(start), Some(stop)) => stop > from && start < to,
                        _ => false,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Decode an EPG document held in memory - auto-detects gzip compression
pub fn decode_document(bytes: &[u8]) -> Result<String> {
    // gzip magic bytes 1f 8b
    if bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b {
        let mut decoder = GzDecoder::new(bytes);
        let mut inflated = Vec::new();
        decoder.read_to_end(&mut inflated)?;
        return Ok(String::from_utf8_lossy(&inflated).into_owned());
    }
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Parse a guide timestamp.
///
/// Accepts XMLTV `YYYYMMDDhhmmss` with an optional `±hhmm` offset (UTC when
/// absent), RFC 3339, and Unix seconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if value.len() >= 14 && value.as_bytes()[..14].iter().all(u8::is_ascii_digit) {
        let naive = NaiveDateTime::parse_from_str(&value[..14], "%Y%m%d%H%M%S").ok()?;
        let offset = parse_tz_offset(value[14..].trim())?;
        return offset.from_local_datetime(&naive).single();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        let secs: i64 = value.parse().ok()?;
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.fixed_offset());
    }

    None
}

/// Parse timezone offset like "+0100" or "-0530"; empty means UTC
fn parse_tz_offset(tz: &str) -> Option<FixedOffset> {
    if tz.is_empty() {
        return FixedOffset::east_opt(0);
    }

    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let digits = tz.trim_start_matches(['+', '-']);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes): (i32, i32) = match digits.len() {
        4 => (digits[0..2].parse().ok()?, digits[2..4].parse().ok()?),
        2 => (digits.parse().ok()?, 0),
        _ => return None,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
