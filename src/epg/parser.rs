//! XMLTV loader
//! Streaming parser over an in-memory document. Malformed `<programme>`
//! nodes are skipped; a document that cannot be read at all yields an
//! empty index.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;
use tracing::info;

use super::{EpgChannel, EpgIndex, EpgLoad};
use crate::config::IngestConfig;
use crate::diagnostics::{Diagnostics, Skip};
use crate::models::Programme;

/// Parse XMLTV into an index, discarding diagnostics
pub fn load_xmltv(xml: &str) -> EpgIndex {
    parse_xmltv(xml).index
}

pub fn parse_xmltv(xml: &str) -> EpgLoad {
    parse_xmltv_with(xml, &IngestConfig::default())
}

pub fn parse_xmltv_with(xml: &str, config: &IngestConfig) -> EpgLoad {
    let mut diagnostics = Diagnostics::with_limit(config.max_diagnostics);
    let sanitized = sanitize_xml(xml);
    let index = XmltvReader::new(&sanitized).read(&mut diagnostics);
    info!(
        channels = index.len(),
        programmes = index.programme_count(),
        skipped = diagnostics.total(),
        "XMLTV loaded"
    );
    EpgLoad { index, diagnostics }
}

/// Child element text is being collected for
#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Desc,
    Category,
    EpisodeNum,
    Rating,
    RatingValue,
    DisplayName,
}

/// Programme under construction. Only the first of each child is kept.
#[derive(Debug, Default)]
struct ProgrammeBuilder {
    channel: String,
    start: String,
    stop: String,
    title: Option<String>,
    desc: Option<String>,
    category: Option<String>,
    episode: Option<String>,
    rating: Option<String>,
    rating_value: Option<String>,
    in_rating: bool,
}

impl ProgrammeBuilder {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            channel: get_attribute(e, b"channel").unwrap_or_default(),
            start: get_attribute(e, b"start").unwrap_or_default(),
            stop: get_attribute(e, b"stop").unwrap_or_default(),
            ..Default::default()
        }
    }

    fn set(&mut self, field: Field, text: &str) {
        let text = text.trim().to_string();
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Desc => &mut self.desc,
            Field::Category => &mut self.category,
            Field::EpisodeNum => &mut self.episode,
            Field::Rating => &mut self.rating,
            Field::RatingValue => &mut self.rating_value,
            Field::DisplayName => return,
        };
        if slot.is_none() {
            *slot = Some(text);
        }
    }

    fn finish(self) -> (String, Programme) {
        let programme = Programme {
            start: self.start,
            stop: self.stop,
            title: self.title.unwrap_or_default(),
            desc: self.desc.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            episode: self.episode.unwrap_or_default(),
            // <rating><value> first, then the text of <rating> itself
            rating: self.rating_value.or(self.rating).unwrap_or_default(),
        };
        (self.channel, programme)
    }
}

/// Where the reader is in the document
enum Scope {
    Root,
    Channel(EpgChannel),
    Programme {
        builder: ProgrammeBuilder,
        position: u64,
    },
}

struct XmltvReader<'a> {
    reader: Reader<&'a [u8]>,
    index: EpgIndex,
    scope: Scope,
    /// Element depth, `<tv>` is 1
    depth: usize,
    /// Text target and the depth of the element that owns it
    field: Option<(Field, usize)>,
    text_buf: String,
    seen_root: bool,
}

impl<'a> XmltvReader<'a> {
    fn new(xml: &'a str) -> Self {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            index: EpgIndex::new(),
            scope: Scope::Root,
            depth: 0,
            field: None,
            text_buf: String::new(),
            seen_root: false,
        }
    }

    fn read(mut self, diagnostics: &mut Diagnostics) -> EpgIndex {
        let mut buf = Vec::with_capacity(8192);

        loop {
            let position = self.reader.buffer_position() as u64;
            match self.reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    if !self.open(e, position, diagnostics) {
                        return EpgIndex::new();
                    }
                    self.depth += 1;
                }
                Ok(Event::Empty(ref e)) => {
                    if !self.open(e, position, diagnostics) {
                        return EpgIndex::new();
                    }
                    // self-closing: open and close at the same depth
                    self.depth += 1;
                    self.close(e.name().as_ref(), diagnostics);
                    self.depth -= 1;
                }
                Ok(Event::End(ref e)) => {
                    self.close(e.name().as_ref(), diagnostics);
                    self.depth = self.depth.saturating_sub(1);
                }
                Ok(Event::Text(e)) => {
                    if self.field.is_some() {
                        let raw = String::from_utf8_lossy(e.as_ref());
                        self.text_buf.push_str(&decode_xml_entities(&raw));
                    }
                }
                Ok(Event::CData(e)) => {
                    if self.field.is_some() {
                        self.text_buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Ok(Event::GeneralRef(e)) => {
                    if self.field.is_some() {
                        let name = String::from_utf8_lossy(e.as_ref());
                        self.text_buf
                            .push_str(&decode_xml_entities(&format!("&{};", name)));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    if !self.seen_root {
                        diagnostics.record(Skip::UnparsableDocument {
                            reason: e.to_string(),
                        });
                        return EpgIndex::new();
                    }
                    if let Scope::Programme { position: opened_at, .. } = self.scope {
                        diagnostics.record(Skip::MalformedProgrammeNode {
                            position: opened_at,
                            reason: "unterminated element".to_string(),
                        });
                    }
                    diagnostics.record(Skip::TruncatedDocument {
                        position,
                        reason: e.to_string(),
                    });
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        if !self.seen_root {
            diagnostics.record(Skip::UnparsableDocument {
                reason: "no <tv> root element".to_string(),
            });
            return EpgIndex::new();
        }

        self.index.sort();
        self.index
    }

    /// Handle an opening tag. Returns false when the root is not `<tv>`.
    fn open(&mut self, e: &BytesStart, position: u64, diagnostics: &mut Diagnostics) -> bool {
        let depth = self.depth + 1;
        let name = e.name();
        let name = name.as_ref();

        if depth == 1 {
            if name != b"tv" {
                diagnostics.record(Skip::UnparsableDocument {
                    reason: format!("unexpected root <{}>", String::from_utf8_lossy(name)),
                });
                return false;
            }
            self.seen_root = true;
            return true;
        }

        if matches!(self.scope, Scope::Root) {
            if depth == 2 {
                match name {
                    b"programme" => {
                        self.scope = Scope::Programme {
                            builder: ProgrammeBuilder::from_element(e),
                            position,
                        };
                    }
                    b"channel" => {
                        self.scope = Scope::Channel(EpgChannel {
                            id: get_attribute(e, b"id").unwrap_or_default(),
                            ..Default::default()
                        });
                    }
                    _ => {}
                }
            }
            return true;
        }

        let field = match (&mut self.scope, depth, name) {
            (Scope::Programme { .. }, 3, b"title") => Some(Field::Title),
            (Scope::Programme { .. }, 3, b"desc") => Some(Field::Desc),
            (Scope::Programme { .. }, 3, b"category") => Some(Field::Category),
            (Scope::Programme { .. }, 3, b"episode-num") => Some(Field::EpisodeNum),
            (Scope::Programme { builder, .. }, 3, b"rating") => {
                builder.in_rating = true;
                Some(Field::Rating)
            }
            (Scope::Programme { builder, .. }, 4, b"value") if builder.in_rating => {
                Some(Field::RatingValue)
            }
            (Scope::Channel(_), 3, b"display-name") => Some(Field::DisplayName),
            (Scope::Channel(channel), 3, b"icon") => {
                if channel.icon.is_empty() {
                    channel.icon = get_attribute(e, b"src").unwrap_or_default();
                }
                None
            }
            _ => None,
        };
        self.start_field(field, depth);
        true
    }

    fn start_field(&mut self, field: Option<Field>, depth: usize) {
        if let Some(field) = field {
            self.field = Some((field, depth));
            self.text_buf.clear();
        }
    }

    fn close(&mut self, name: &[u8], diagnostics: &mut Diagnostics) {
        let depth = self.depth;

        if let Some((field, owner)) = self.field {
            if owner == depth {
                self.finish_field(field);
                self.field = None;
            }
        }

        if depth == 3 && name == b"rating" {
            if let Scope::Programme { builder, .. } = &mut self.scope {
                builder.in_rating = false;
            }
        }

        if depth != 2 {
            return;
        }
        match std::mem::replace(&mut self.scope, Scope::Root) {
            Scope::Programme { builder, position } => {
                if builder.channel.is_empty() {
                    diagnostics.record(Skip::MalformedProgrammeNode {
                        position,
                        reason: "missing channel attribute".to_string(),
                    });
                } else {
                    let (channel, programme) = builder.finish();
                    self.index.push(channel, programme);
                }
            }
            Scope::Channel(channel) => {
                if !channel.id.is_empty() {
                    self.index.insert_channel(channel);
                }
            }
            Scope::Root => {}
        }
    }

    fn finish_field(&mut self, field: Field) {
        let text = std::mem::take(&mut self.text_buf);
        match &mut self.scope {
            Scope::Programme { builder, .. } => builder.set(field, &text),
            Scope::Channel(channel) if field == Field::DisplayName => {
                if channel.display_name.is_empty() {
                    channel.display_name = text.trim().to_string();
                }
            }
            _ => {}
        }
    }
}

/// Replace characters that are illegal in XML 1.0 and escape bare `&`
/// outside CDATA sections and comments.
/// Legal XML 1.0: #x9 | #xA | #xD | [#x20-#xD7FF] | [#xE000-#xFFFD] | [#x10000-#x10FFFF]
fn sanitize_xml(xml: &str) -> Cow<'_, str> {
    if !xml.contains('&') && !xml.chars().any(is_illegal_char) {
        return Cow::Borrowed(xml);
    }

    let bytes = xml.as_bytes();
    let mut out = String::with_capacity(xml.len() + 64);
    let mut verbatim_until = 0;
    for (i, c) in xml.char_indices() {
        if i >= verbatim_until {
            if c == '<' {
                if let Some(len) = verbatim_section_len(&xml[i..]) {
                    verbatim_until = i + len;
                }
            } else if c == '&' && !is_valid_entity_start(&bytes[i..]) {
                out.push_str("&amp;");
                continue;
            }
        }
        if is_illegal_char(c) {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    if out == xml {
        Cow::Borrowed(xml)
    } else {
        Cow::Owned(out)
    }
}

/// Length of a CDATA section or comment starting at `s`, through its terminator
fn verbatim_section_len(s: &str) -> Option<usize> {
    [("<![CDATA[", "]]>"), ("<!--", "-->")]
        .into_iter()
        .find(|(open, _)| s.starts_with(*open))
        .map(|(open, close)| {
            s[open.len()..]
                .find(close)
                .map_or(s.len(), |end| open.len() + end + close.len())
        })
}

fn is_illegal_char(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => false,
        '\u{0}'..='\u{1f}' | '\u{7f}' => true,
        '\u{fffe}' | '\u{ffff}' => true,
        _ => false,
    }
}

/// Check if bytes starting with & look like a valid XML entity
fn is_valid_entity_start(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }

    // numeric entity &#
    if bytes[1] == b'#' {
        return true;
    }

    // named entity &name;
    let mut end = 1;
    while end < bytes.len() && end < 10 {
        match bytes[end] {
            b';' => return end > 1,
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => end += 1,
            _ => return false,
        }
    }

    false
}

/// Decode XML entities back to normal characters
fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 12)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Get attribute value from XML element
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8_lossy(attr.value.as_ref());
            return Some(decode_xml_entities(&raw));
        }
    }
    None
}
