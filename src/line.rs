//! Line classifier for Extended M3U playlists

/// Property directive prefixes carried verbatim with the next entry
pub const PROPERTY_PREFIXES: [&str; 4] = ["#EXTVLCOPT", "#KODIPROP", "#EXTHTTP", "#EXTIMG"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    VlcOpt,
    KodiProp,
    Http,
    Img,
}

/// A property directive line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property<'a> {
    pub kind: PropertyKind,
    /// The line as it appeared in the input
    pub raw: &'a str,
    /// `key=value` pair for `#EXTVLCOPT:` and `#KODIPROP:` lines
    pub option: Option<(&'a str, &'a str)>,
}

/// Category of a single playlist line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    /// `#EXTM3U`, with whatever follows the marker
    Header(&'a str),
    /// `#EXTGRP:<name>`, name trimmed
    Group(&'a str),
    Property(Property<'a>),
    /// `#EXTINF:` (or `EXTINF:`), with the text after the colon
    Entry(&'a str),
    /// A candidate stream URL. A `#http...` line is reported without its `#`.
    Url(&'a str),
    /// Any other `#EXT` directive, verbatim
    Directive(&'a str),
    Ignorable,
}

/// Strip whitespace, byte-order marks and stray control characters from both ends
pub fn clean_line(raw: &str) -> &str {
    raw.trim_matches(|c: char| {
        c.is_whitespace() || c.is_control() || c == '\u{feff}' || c == '\u{fdfa}'
    })
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

fn split_option(rest: &str) -> Option<(&str, &str)> {
    let (key, value) = rest.split_once('=')?;
    Some((key.trim(), value.trim()))
}

/// Classify one raw line
pub fn classify(raw: &str) -> Line<'_> {
    let line = clean_line(raw);
    if line.is_empty() {
        return Line::Blank;
    }

    if !line.starts_with('#') {
        if let Some(body) = strip_prefix_ci(line, "EXTINF:") {
            return Line::Entry(body);
        }
        return Line::Url(line);
    }

    if let Some(rest) = strip_prefix_ci(line, "#EXTM3U") {
        return Line::Header(rest.trim());
    }
    if let Some(body) = strip_prefix_ci(line, "#EXTINF:") {
        return Line::Entry(body);
    }
    if let Some(name) = strip_prefix_ci(line, "#EXTGRP:") {
        return Line::Group(name.trim());
    }

    let kinds = [
        PropertyKind::VlcOpt,
        PropertyKind::KodiProp,
        PropertyKind::Http,
        PropertyKind::Img,
    ];
    for (prefix, kind) in PROPERTY_PREFIXES.iter().zip(kinds) {
        if let Some(rest) = strip_prefix_ci(line, prefix) {
            let option = match kind {
                PropertyKind::VlcOpt | PropertyKind::KodiProp => {
                    rest.strip_prefix(':').and_then(split_option)
                }
                _ => None,
            };
            return Line::Property(Property { kind, raw, option });
        }
    }

    // Some feeds comment out raw links
    if strip_prefix_ci(line, "#http").is_some() {
        return Line::Url(&line[1..]);
    }

    if strip_prefix_ci(line, "#EXT").is_some() {
        return Line::Directive(line);
    }

    Line::Ignorable
}
