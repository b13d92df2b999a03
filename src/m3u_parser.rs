//! Extended M3U playlist parser
//!
//! A single pass over the lines of the document. Directive lines seen before
//! a URL (`#EXTGRP`, property lines, other `#EXT` tags) build up a context
//! that is attached to the next entry that resolves to a URL.

use std::collections::{BTreeMap, HashSet};
use std::mem;

use tracing::debug;

use crate::attrs::{scan_attributes, scan_extinf, ExtInf};
use crate::config::IngestConfig;
use crate::diagnostics::{Diagnostics, Skip};
use crate::epg::{self, EpgIndex};
use crate::line::{classify, Line, PropertyKind};
use crate::models::{AttrKey, Attributes, Channel};

/// Attributes consulted, in order, to seed `epg-id`
const EPG_ID_SOURCES: [&str; 3] = ["epg-id", "epg_channel_id", "tvg-id"];

/// Parsed playlist
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub channels: Vec<Channel>,
    /// Attributes from the `#EXTM3U` header line
    pub header: Attributes,
    pub diagnostics: Diagnostics,
}

/// Directive lines waiting for the next entry
#[derive(Debug, Default)]
struct Context {
    properties: Vec<String>,
    vlc_opts: Vec<(String, String)>,
    kodi_props: Vec<(String, String)>,
    other_props: Vec<String>,
    extgrp: Option<String>,
}

impl Context {
    /// Fold in directives that came later; a later `#EXTGRP` overrides.
    fn absorb(&mut self, later: Context) {
        self.properties.extend(later.properties);
        self.vlc_opts.extend(later.vlc_opts);
        self.kodi_props.extend(later.kodi_props);
        self.other_props.extend(later.other_props);
        if later.extgrp.is_some() {
            self.extgrp = later.extgrp;
        }
    }
}

/// An EXTINF line still looking for its URL
struct PendingEntry {
    line: usize,
    raw: String,
    extinf: ExtInf,
    context: Context,
}

/// Parse M3U content and return the channels
pub fn parse_m3u(content: &str) -> Vec<Channel> {
    Playlist::parse(content).channels
}

impl Playlist {
    pub fn parse(content: &str) -> Self {
        Self::parse_with(content, &IngestConfig::default())
    }

    pub fn parse_with(content: &str, config: &IngestConfig) -> Self {
        let mut playlist = Playlist {
            diagnostics: Diagnostics::with_limit(config.max_diagnostics),
            ..Default::default()
        };
        let mut context = Context::default();
        let mut pending: Option<PendingEntry> = None;
        let mut seen_header = false;

        for (line_no, raw) in content.lines().enumerate() {
            match classify(raw) {
                Line::Blank | Line::Ignorable => {}
                Line::Header(rest) => {
                    if !seen_header {
                        playlist.header = scan_attributes(rest);
                        seen_header = true;
                    }
                }
                Line::Group(name) => {
                    if !name.is_empty() {
                        context.extgrp = Some(name.to_string());
                    }
                }
                Line::Property(prop) => {
                    context.properties.push(prop.raw.to_string());
                    if let Some((key, value)) = prop.option {
                        let staged = match prop.kind {
                            PropertyKind::KodiProp => &mut context.kodi_props,
                            _ => &mut context.vlc_opts,
                        };
                        staged.push((key.to_string(), value.to_string()));
                    }
                }
                Line::Directive(tag) => context.other_props.push(tag.to_string()),
                Line::Entry(body) => {
                    if let Some(stale) = pending.take() {
                        playlist.resolve_without_url(stale, config);
                    }
                    pending = Some(PendingEntry {
                        line: line_no + 1,
                        raw: raw.to_string(),
                        extinf: scan_extinf(body),
                        context: mem::take(&mut context),
                    });
                }
                Line::Url(url) => {
                    // a URL with no EXTINF in front of it is not a channel
                    if let Some(mut entry) = pending.take() {
                        entry.context.absorb(mem::take(&mut context));
                        playlist.push_channel(entry, url.to_string());
                    }
                }
            }
        }

        if let Some(stale) = pending.take() {
            playlist.resolve_without_url(stale, config);
        }

        debug!(
            channels = playlist.channels.len(),
            skipped = playlist.diagnostics.total(),
            "playlist parsed"
        );
        playlist
    }

    /// An entry reached the next EXTINF or the end of input without a URL.
    /// Its context is dropped with it unless unplayable entries are kept.
    fn resolve_without_url(&mut self, entry: PendingEntry, config: &IngestConfig) {
        if config.keep_unplayable {
            self.push_channel(entry, String::new());
        } else {
            self.diagnostics.record(Skip::MalformedEntry { line: entry.line });
        }
    }

    fn push_channel(&mut self, entry: PendingEntry, url: String) {
        let PendingEntry {
            raw,
            extinf,
            context,
            ..
        } = entry;
        let ExtInf {
            duration,
            mut attrs,
            title,
        } = extinf;

        let group = attrs
            .get_non_empty("group-title")
            .map(str::to_string)
            .or(context.extgrp)
            .unwrap_or_default();

        let epg_id = EPG_ID_SOURCES
            .iter()
            .find_map(|key| attrs.get_non_empty(key))
            .map(str::to_string);
        if let Some(epg_id) = epg_id {
            attrs.insert_first(AttrKey::EpgId, epg_id);
        }

        self.channels.push(Channel {
            index: self.channels.len(),
            duration,
            title,
            url,
            attrs,
            group,
            properties: context.properties,
            vlc_opts: context.vlc_opts.into_iter().collect::<BTreeMap<_, _>>(),
            kodi_props: context.kodi_props.into_iter().collect::<BTreeMap<_, _>>(),
            other_props: context.other_props,
            raw_extinf: raw,
            epg: None,
        });
    }

    /// Distinct group titles in first-seen order
    pub fn groups(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut groups: Vec<String> = Vec::new();
        for channel in &self.channels {
            let group = channel.group_title();
            if seen.insert(group) {
                groups.push(group.to_string());
            }
        }
        groups
    }

    pub fn filter_by_groups<S: AsRef<str>>(&self, groups: &[S]) -> Vec<&Channel> {
        self.channels
            .iter()
            .filter(|c| groups.iter().any(|g| g.as_ref() == c.group_title()))
            .collect()
    }

    /// EPG URL advertised by the header (`x-tvg-url`, then `url-tvg`)
    pub fn epg_url(&self) -> Option<&str> {
        self.header
            .get_non_empty("x-tvg-url")
            .or_else(|| self.header.get_non_empty("url-tvg"))
    }

    pub fn to_block(channel: &Channel) -> String {
        channel.to_block()
    }

    pub fn to_blocks<'a, I>(channels: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a Channel>,
    {
        channels.into_iter().map(Channel::to_block).collect()
    }

    /// Attach programme lists using the default key order
    pub fn map_epg(&mut self, index: &EpgIndex) -> usize {
        epg::map_epg(&mut self.channels, index, &epg::DEFAULT_KEY_ORDER)
    }

    pub fn map_epg_with_keys(&mut self, index: &EpgIndex, key_order: &[&str]) -> usize {
        epg::map_epg(&mut self.channels, index, key_order)
    }

    pub fn map_epg_with_config(&mut self, index: &EpgIndex, config: &IngestConfig) -> usize {
        epg::map_epg(&mut self.channels, index, &config.key_order())
    }
}

/// Write a standalone playlist for the given channels
pub fn export_m3u<'a, I>(channels: I) -> String
where
    I: IntoIterator<Item = &'a Channel>,
{
    let mut out = String::from("#EXTM3U\n");
    for block in Playlist::to_blocks(channels) {
        out.push_str(&block);
        out.push('\n');
    }
    out
}
