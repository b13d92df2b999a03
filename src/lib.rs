//! Playlist and EPG ingestion for IPTV clients
//!
//! Turns Extended-M3U text into an ordered channel list, loads XMLTV and
//! JSON programme guides into a per-channel index, and joins the two.
//! Nothing here performs I/O; malformed input is skipped and reported through
//! [`Diagnostics`] rather than returned as an error.

pub mod attrs;
pub mod config;
pub mod diagnostics;
pub mod epg;
pub mod error;
pub mod line;
pub mod m3u_parser;
pub mod models;

#[cfg(test)]
mod m3u_parser_tests;

pub use config::IngestConfig;
pub use diagnostics::{Diagnostics, Skip};
pub use epg::{
    decode_document, load_json_epg, load_xmltv, map_epg, parse_json_epg, parse_xmltv, EpgIndex,
    EpgLoad, JsonFieldMap,
};
pub use error::{Error, Result};
pub use m3u_parser::{export_m3u, parse_m3u, Playlist};
pub use models::{AttrKey, Attributes, Channel, Programme};
