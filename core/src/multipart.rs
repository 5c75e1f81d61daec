//! Multipart body splitting.
//!
//! # Design
//! This module only produces plain `RawPart` values; turning them into
//! `Response`s (and recursing into nested multiparts) happens in
//! `Response::extract_multipart`. The scan works line by line on CRLF:
//! a `--boundary` line opens a part, `--boundary--` stops the scan, and
//! inside a part the lines up to the first blank one form its header
//! section. Only `Content-Type` lines are kept as part headers; every other
//! line, header-looking or not, belongs to the part body.

/// One part of a multipart body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPart {
    /// Kept header lines joined with CRLF.
    pub header_text: String,
    /// Body lines joined with CRLF.
    pub body: Vec<u8>,
}

/// Whether a content type names a multipart body (prefix, case-insensitive).
pub fn is_multipart(content_type: &str) -> bool {
    content_type.len() >= 9 && content_type.as_bytes()[..9].eq_ignore_ascii_case(b"multipart")
}

/// Boundary character set from RFC 2046, minus the space which may not end
/// a boundary and is rejected here altogether.
fn is_boundary_char(c: u8) -> bool {
    matches!(c,
        b'0'..=b'9' | b'A'..=b'Z' | b'a'..=b'z' |
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' |
        b'/' | b':' | b'=' | b'?'
    )
}

fn is_valid_boundary(boundary: &str) -> bool {
    (1..=70).contains(&boundary.len()) && boundary.bytes().all(is_boundary_char)
}

/// Extract the boundary token from a `multipart/<subtype>; boundary=...`
/// content type. The value may be quoted.
pub fn boundary(content_type: &str) -> Option<String> {
    let (media_type, params) = content_type.split_once(';')?;
    let (primary, subtype) = media_type.trim().split_once('/')?;
    if !primary.eq_ignore_ascii_case("multipart") || subtype.trim().is_empty() {
        return None;
    }
    params.split(';').find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        is_valid_boundary(value).then(|| value.to_string())
    })
}

#[derive(Default)]
struct PartLines<'a> {
    headers: Vec<&'a [u8]>,
    body: Vec<&'a [u8]>,
}

fn split_crlf(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut rest = Some(data);
    std::iter::from_fn(move || {
        let current = rest?;
        match current.windows(2).position(|w| w == b"\r\n") {
            Some(pos) => {
                rest = Some(&current[pos + 2..]);
                Some(&current[..pos])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}

fn join_crlf(lines: &[&[u8]]) -> Vec<u8> {
    lines.join(&b"\r\n"[..])
}

/// Split a multipart body into its parts.
///
/// Returns `None` when `content_type` is not multipart or carries no usable
/// boundary. A body without any opening boundary yields `Some(vec![])`.
pub fn extract_multipart_parts(body: &[u8], content_type: &str) -> Option<Vec<RawPart>> {
    if !is_multipart(content_type) {
        return None;
    }
    let Some(boundary) = boundary(content_type) else {
        log::debug!("multipart content type without usable boundary: {content_type}");
        return None;
    };
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut parts: Vec<PartLines<'_>> = Vec::new();
    let mut inside_part = false;
    let mut in_header_section = true;

    for line in split_crlf(body) {
        if line == open.as_bytes() {
            parts.push(PartLines::default());
            inside_part = true;
            in_header_section = true;
            continue;
        }
        if line == close.as_bytes() {
            break;
        }
        if !inside_part {
            continue;
        }
        let Some(part) = parts.last_mut() else {
            continue;
        };
        if in_header_section && line.is_empty() {
            in_header_section = false;
        } else if in_header_section && line.starts_with(b"Content-Type") {
            part.headers.push(line);
        } else {
            part.body.push(line);
        }
    }

    log::debug!("multipart body split into {} part(s)", parts.len());
    Some(
        parts
            .iter()
            .map(|p| RawPart {
                header_text: String::from_utf8_lossy(&join_crlf(&p.headers)).into_owned(),
                body: join_crlf(&p.body),
            })
            .collect(),
    )
}
