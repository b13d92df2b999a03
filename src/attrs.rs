//! Attribute scanner for `key=value` fragments on EXTINF and EXTM3U lines
//!
//! Values may be double-quoted, single-quoted or bare (ending at whitespace
//! or a comma). Junk between attributes, such as a stray quote before a key,
//! is skipped. The first occurrence of a repeated key wins.

use crate::models::{AttrKey, Attributes};

/// Parsed body of an EXTINF directive
#[derive(Debug, Clone, PartialEq)]
pub struct ExtInf {
    pub duration: i64,
    pub attrs: Attributes,
    pub title: String,
}

/// Scan a fragment that holds only attributes (e.g. the rest of `#EXTM3U`)
pub fn scan_attributes(fragment: &str) -> Attributes {
    let mut scanner = Scanner::new(fragment);
    let mut attrs = Attributes::new();
    while !scanner.at_end() {
        if !scanner.attribute(&mut attrs) {
            scanner.bump();
        }
    }
    attrs
}

/// Parse the text after `EXTINF:` into duration, attributes and title.
///
/// The title is everything after the first comma outside a quoted value. The
/// one exception is a comma directly after the duration that is followed by a
/// quoted `key="..."` assignment: that is the `10.0,a="x",Title` layout and
/// attributes continue. Titles may contain commas and `=`.
pub fn scan_extinf(body: &str) -> ExtInf {
    let body = body.trim_start();
    let token_end = body
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(body.len());
    let duration = parse_duration(&body[..token_end]);

    let mut scanner = Scanner::new(&body[token_end..]);
    let mut attrs = Attributes::new();
    let mut title = "";
    let mut after_duration = true;

    loop {
        scanner.skip_ws();
        match scanner.peek() {
            None => break,
            Some(b',') => {
                scanner.bump();
                if !(after_duration && scanner.assignment_ahead(true)) {
                    title = scanner.rest();
                    break;
                }
                after_duration = false;
            }
            Some(_) => {
                after_duration = false;
                if !scanner.attribute(&mut attrs) {
                    scanner.bump();
                }
            }
        }
    }

    ExtInf {
        duration,
        attrs,
        title: title.trim().to_string(),
    }
}

fn parse_duration(token: &str) -> i64 {
    if let Ok(d) = token.parse::<i64>() {
        return d;
    }
    match token.parse::<f64>() {
        Ok(d) if d.is_finite() => d.trunc() as i64,
        _ => -1,
    }
}

/// True when text after a quote reads as the end of a value
fn closes_value(after: &str) -> bool {
    let trimmed = after.trim_start();
    trimmed.is_empty() || trimmed.starts_with(',') || Scanner::new(trimmed).assignment_ahead(false)
}

fn is_key_start(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_key_char(b: u8) -> bool {
    is_key_start(b) || b == b'-'
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// Advance one whole character
    fn bump(&mut self) {
        if let Some(c) = self.rest().chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.rest().chars().next() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn key(&mut self) -> Option<&'a str> {
        let start = self.pos;
        if !self.peek().is_some_and(is_key_start) {
            return None;
        }
        while self.peek().is_some_and(is_key_char) {
            self.pos += 1;
        }
        Some(&self.src[start..self.pos])
    }

    /// True when the upcoming text is `key =`, without consuming it.
    /// With `quoted_only` the value must also open with a quote.
    fn assignment_ahead(&self, quoted_only: bool) -> bool {
        let mut ahead = Scanner {
            src: self.src,
            pos: self.pos,
        };
        ahead.skip_ws();
        if ahead.key().is_none() {
            return false;
        }
        ahead.skip_ws();
        if ahead.peek() != Some(b'=') {
            return false;
        }
        ahead.pos += 1;
        ahead.skip_ws();
        !quoted_only || matches!(ahead.peek(), Some(b'"' | b'\''))
    }

    /// Try to read one `key=value`. Returns false when no key starts here.
    fn attribute(&mut self, attrs: &mut Attributes) -> bool {
        let Some(key) = self.key() else {
            return false;
        };
        let after_key = self.pos;
        self.skip_ws();
        if self.peek() != Some(b'=') {
            // a bare word, not an assignment
            self.pos = after_key;
            return true;
        }
        self.pos += 1;
        self.skip_ws();

        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => self.quoted(quote),
            _ => Some(self.bare()),
        };
        if let Some(value) = value {
            attrs.insert_first(AttrKey::parse(key), value.trim().to_string());
        }
        true
    }

    /// Quoted value. An unterminated quote falls back to a bare value.
    ///
    /// Inside double quotes `\\` is a backslash and `\"` is a quote, except
    /// when the quote is followed by the end of the fragment, a comma or another
    /// assignment. Then the backslash is literal and the quote closes the value,
    /// as in `tvg-logo="C:\logos\" tvg-id="x"`.
    fn quoted(&mut self, quote: u8) -> Option<String> {
        let open = self.pos;
        self.pos += 1;
        let rest = self.rest();
        let mut value = String::new();
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c as u32 == quote as u32 {
                self.pos += i + 1;
                return Some(value);
            }
            if c == '\\' && quote == b'"' {
                match chars.clone().next() {
                    Some((j, '"')) if closes_value(&rest[j + 1..]) => {
                        value.push(c);
                        self.pos += j + 1;
                        return Some(value);
                    }
                    Some((_, next @ ('"' | '\\'))) => {
                        value.push(next);
                        chars.next();
                        continue;
                    }
                    _ => {}
                }
            }
            value.push(c);
        }

        self.pos = open + 1;
        let bare = self.bare();
        if bare.is_empty() {
            None
        } else {
            Some(bare)
        }
    }

    fn bare(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.rest().chars().next() {
            if c.is_whitespace() || c == ',' {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.src[start..self.pos].to_string()
    }
}
