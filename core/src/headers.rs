//! Raw header text parsing.
//!
//! Turns the header block captured by a transport into a `Headers` map:
//! folded lines are unfolded, every status line restarts accumulation so only
//! the final response's fields survive, field names are canonicalized
//! (`content-type` becomes `Content-Type`) and repeated fields collect into a
//! list instead of overwriting each other.

use std::collections::HashMap;
use std::fmt;

/// Value of a parsed header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    /// The field appeared more than once; values in arrival order.
    Multiple(Vec<String>),
}

impl HeaderValue {
    /// First occurrence.
    pub fn first(&self) -> &str {
        match self {
            HeaderValue::Single(v) => v,
            HeaderValue::Multiple(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::Single(v) => vec![v.as_str()],
            HeaderValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// All values joined with `", "`.
    pub fn joined(&self) -> String {
        self.values().join(", ")
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(first) => {
                *self = HeaderValue::Multiple(vec![std::mem::take(first), value]);
            }
            HeaderValue::Multiple(vs) => vs.push(value),
        }
    }
}

impl PartialEq<&str> for HeaderValue {
    fn eq(&self, other: &&str) -> bool {
        matches!(self, HeaderValue::Single(v) if v == other)
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// Parsed response headers.
///
/// Iteration yields canonical names in first-seen order; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
    index: HashMap<String, usize>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.index
            .get(&lookup_key(name))
            .map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&lookup_key(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Add a field; a repeated name turns the stored value into a list.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let canonical = canonical_field_name(name);
        let key = lookup_key(name);
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1.push(value),
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((canonical, HeaderValue::Single(value)));
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a HeaderValue);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a HeaderValue)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Title-case a field name: lower-case everything, then upper-case the first
/// character and each character that follows a space, tab or hyphen.
pub fn canonical_field_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.trim().chars() {
        if upper_next {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper_next = matches!(c, ' ' | '\t' | '-');
    }
    out
}

/// Index key for a field name. Stored and looked-up names go through the
/// same canonicalisation, so whitespace and case never cause a miss.
fn lookup_key(name: &str) -> String {
    canonical_field_name(name).to_ascii_lowercase()
}

/// Replace every CRLF followed by spaces or tabs with a single space.
fn unfold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find("\r\n") {
        let after = &rest[pos + 2..];
        let continuation = after.trim_start_matches([' ', '\t']);
        out.push_str(&rest[..pos]);
        if continuation.len() < after.len() {
            out.push(' ');
        } else {
            out.push_str("\r\n");
        }
        rest = continuation;
    }
    out.push_str(rest);
    out
}

fn is_status_line(line: &str) -> bool {
    line.len() >= 5 && line.as_bytes()[..5].eq_ignore_ascii_case(b"HTTP/")
}

/// Parse a raw header block into `Headers`.
///
/// Lines that are neither a status line nor `name: value` are skipped.
pub fn parse_http_headers(text: &str) -> Headers {
    let mut headers = Headers::new();
    let unfolded = unfold(text);
    for line in unfolded.split("\r\n") {
        if line.is_empty() {
            continue;
        }
        if is_status_line(line) {
            headers.clear();
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().is_empty() {
            continue;
        }
        headers.append(name, value.trim());
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_names() {
        assert_eq!(canonical_field_name("content-type"), "Content-Type");
        assert_eq!(canonical_field_name("X-REQUEST-ID"), "X-Request-Id");
        assert_eq!(canonical_field_name("www-authenticate"), "Www-Authenticate");
        assert_eq!(canonical_field_name("odd name"), "Odd Name");
        assert_eq!(canonical_field_name("  etag "), "Etag");
    }

    #[test]
    fn parses_simple_block() {
        let h = parse_http_headers("HTTP/1.1 200 OK\r\ncontent-type: text/html\r\nContent-Length: 12\r\n\r\n");
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("Content-Type").unwrap(), &"text/html");
        assert_eq!(h.get("content-length").unwrap(), &"12");
    }

    #[test]
    fn lookup_ignores_case_but_iteration_is_canonical() {
        let h = parse_http_headers("x-custom-thing: 1\r\n");
        assert_eq!(h.get("X-CUSTOM-THING"), h.get("x-custom-thing"));
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["X-Custom-Thing"]);
    }

    #[test]
    fn lookup_trims_and_matches_non_ascii_names() {
        let mut h = Headers::new();
        h.append("Ärger-Öl", "1");
        h.append("X-Trace", "2");
        assert_eq!(h.get("ärger-öl").unwrap(), &"1");
        assert!(h.contains("ÄRGER-ÖL"));
        assert_eq!(h.get("  x-trace\t").unwrap(), &"2");
        assert!(h.contains(" X-TRACE "));
    }

    #[test]
    fn folded_lines_are_joined() {
        let folded = parse_http_headers("X-Long: part one\r\n  part two\r\n\tpart three\r\nB: 2\r\n");
        let flat = parse_http_headers("X-Long: part one part two part three\r\nB: 2\r\n");
        assert_eq!(folded, flat);
    }

    #[test]
    fn repeated_fields_collect_in_order() {
        let h = parse_http_headers("Set-Cookie: a=1\r\nset-cookie: b=2\r\nSET-COOKIE: c=3\r\n");
        assert_eq!(
            h.get("set-cookie"),
            Some(&HeaderValue::Multiple(vec!["a=1".into(), "b=2".into(), "c=3".into()]))
        );
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn only_last_status_block_survives() {
        let text = "HTTP/1.1 301 Moved Permanently\r\nLocation: /x\r\nX-Hop: 1\r\n\r\n\
                    HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n";
        let h = parse_http_headers(text);
        assert!(!h.contains("location"));
        assert!(!h.contains("x-hop"));
        assert_eq!(h.get("content-type").unwrap(), &"text/plain");
    }

    #[test]
    fn interim_continue_block_is_discarded() {
        let text = "HTTP/1.1 100 Continue\r\n\r\nHTTP/2 201 Created\r\nLocation: /things/1\r\n\r\n";
        let h = parse_http_headers(text);
        assert_eq!(h.get("location").unwrap().first(), "/things/1");
    }

    #[test]
    fn values_are_trimmed_and_colons_kept() {
        let h = parse_http_headers("Location:   http://example.com:8080/a  \r\n");
        assert_eq!(h.get("location").unwrap(), &"http://example.com:8080/a");
    }

    #[test]
    fn junk_lines_are_skipped() {
        let h = parse_http_headers("not a header\r\n: no name\r\nGood: yes\r\n");
        assert_eq!(h.len(), 1);
        assert!(h.contains("good"));
    }

    #[test]
    fn empty_text_gives_empty_headers() {
        assert!(parse_http_headers("").is_empty());
    }

    #[test]
    fn joined_and_values_helpers() {
        let mut h = Headers::new();
        h.append("accept", "a");
        h.append("ACCEPT", "b");
        let v = h.get("Accept").unwrap();
        assert_eq!(v.first(), "a");
        assert_eq!(v.values(), vec!["a", "b"]);
        assert_eq!(v.to_string(), "a, b");
    }
}
