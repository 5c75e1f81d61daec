//! Structured view of an executed request.

use std::borrow::Cow;

use serde::de::DeserializeOwned;

use crate::error::DecodeError;
use crate::headers::{parse_http_headers, HeaderValue, Headers};
use crate::http::{RawResponse, TransportInfo};
use crate::multipart::{self, RawPart};

/// Nesting depth past which `Response::extract_multipart` drops containers.
pub const MAX_MULTIPART_DEPTH: usize = 32;

/// Decoded body returned by `Response::data`.
#[derive(Debug, Clone, PartialEq)]
pub enum Data<'a> {
    /// The body was declared `application/json` and parsed.
    Json(serde_json::Value),
    /// Any other content type; the body untouched.
    Raw(&'a [u8]),
}

/// Status, parsed headers and body of a response.
///
/// Built once from a `RawResponse` and never mutated afterwards. Children
/// produced by `extract_multipart` carry the parent's status and transport
/// info alongside their own headers and body.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    info: TransportInfo,
}

impl Response {
    pub fn new(status: u16, header_text: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::with_info(status, header_text, body, TransportInfo::new())
    }

    pub fn with_info(
        status: u16,
        header_text: &str,
        body: impl Into<Vec<u8>>,
        info: TransportInfo,
    ) -> Self {
        Self {
            status,
            headers: parse_http_headers(header_text),
            body: body.into(),
            info,
        }
    }

    pub fn from_raw(raw: RawResponse) -> Self {
        Self::with_info(raw.status, &raw.header_text, raw.body, raw.info)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header_field(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    fn content_type(&self) -> Option<&str> {
        self.header_field("Content-Type").map(HeaderValue::first)
    }

    pub fn raw_data(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body decoded according to `Content-Type`.
    ///
    /// Only a content type starting with `application/json` (case-sensitive)
    /// triggers decoding; everything else comes back as `Data::Raw`.
    pub fn data(&self) -> Result<Data<'_>, DecodeError> {
        match self.content_type() {
            Some(ct) if ct.starts_with("application/json") => {
                let value = serde_json::from_slice(&self.body).map_err(|e| {
                    log::debug!("JSON body failed to decode: {e}");
                    DecodeError::Json(e)
                })?;
                Ok(Data::Json(value))
            }
            _ => Ok(Data::Raw(&self.body)),
        }
    }

    /// Deserialize the body as JSON into `T`, whatever the content type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type().is_some_and(multipart::is_multipart)
    }

    /// One transport diagnostic, e.g. `info::URL`.
    pub fn info(&self, key: &str) -> Option<&serde_json::Value> {
        self.info.get(key)
    }

    pub fn transport_info(&self) -> &TransportInfo {
        &self.info
    }

    /// Split a multipart body into one response per part.
    ///
    /// Nested multipart parts are replaced by their own parts, so the result
    /// only holds leaves. Returns `None` for a non-multipart response or one
    /// whose `Content-Type` has no usable boundary; a nested part in that
    /// state contributes nothing, as does a container nested deeper than
    /// `MAX_MULTIPART_DEPTH`.
    pub fn extract_multipart(&self) -> Option<Vec<Response>> {
        let mut leaves = Vec::new();
        // Next part to visit is at the end; children are pushed reversed to
        // keep document order.
        let mut pending: Vec<(Response, usize)> =
            self.split_parts()?.into_iter().rev().map(|part| (part, 1)).collect();
        while let Some((part, depth)) = pending.pop() {
            if !part.is_multipart() {
                leaves.push(part);
            } else if depth >= MAX_MULTIPART_DEPTH {
                log::warn!("dropping multipart part nested {depth} levels deep");
            } else {
                match part.split_parts() {
                    Some(children) => pending.extend(children.into_iter().rev().map(|c| (c, depth + 1))),
                    None => log::debug!("dropping nested multipart part without boundary"),
                }
            }
        }
        Some(leaves)
    }

    /// One level of splitting; children share status and transport info.
    fn split_parts(&self) -> Option<Vec<Response>> {
        let content_type = self.content_type()?;
        let parts = multipart::extract_multipart_parts(&self.body, content_type)?;
        Some(
            parts
                .into_iter()
                .map(|RawPart { header_text, body }| {
                    Response::with_info(self.status, &header_text, body, self.info.clone())
                })
                .collect(),
        )
    }
}

impl From<RawResponse> for Response {
    fn from(raw: RawResponse) -> Self {
        Response::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::info;
    use serde_json::json;

    #[test]
    fn json_body_is_decoded() {
        let resp = Response::new(
            200,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n",
            "{\"a\":1}",
        );
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.header_field("content-type").unwrap(), &"application/json");
        assert_eq!(resp.data().unwrap(), Data::Json(json!({"a": 1})));
    }

    #[test]
    fn json_with_charset_is_decoded() {
        let resp = Response::new(200, "Content-Type: application/json; charset=utf-8\r\n", "[1,2]");
        assert_eq!(resp.data().unwrap(), Data::Json(json!([1, 2])));
    }

    #[test]
    fn json_content_type_match_is_case_sensitive() {
        let resp = Response::new(200, "Content-Type: Application/JSON\r\n", "{}");
        assert_eq!(resp.data().unwrap(), Data::Raw(b"{}"));
    }

    #[test]
    fn invalid_json_is_a_decode_error_and_raw_stays_readable() {
        let resp = Response::new(200, "Content-Type: application/json\r\n", "{nope");
        assert!(matches!(resp.data(), Err(DecodeError::Json(_))));
        assert_eq!(resp.raw_data(), b"{nope");
    }

    #[test]
    fn other_content_types_return_raw() {
        let resp = Response::new(200, "Content-Type: text/xml\r\n", "<a/>");
        assert_eq!(resp.data().unwrap(), Data::Raw(b"<a/>"));
        let no_type = Response::new(204, "", "");
        assert_eq!(no_type.data().unwrap(), Data::Raw(b""));
        assert!(no_type.header_field("content-type").is_none());
    }

    #[test]
    fn typed_json_decode() {
        #[derive(serde::Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }
        let resp = Response::new(200, "", "{\"x\":3,\"y\":4}");
        let p: Point = resp.json().unwrap();
        assert_eq!((p.x, p.y), (3, 4));
    }

    #[test]
    fn info_lookup() {
        let mut raw = RawResponse {
            status: 200,
            ..Default::default()
        };
        raw.info.insert(info::URL.to_string(), json!("http://example.com/"));
        let resp = Response::from(raw);
        assert_eq!(resp.info(info::URL), Some(&json!("http://example.com/")));
        assert_eq!(resp.info("missing"), None);
    }

    #[test]
    fn extracts_parts_sharing_status_and_info() {
        let mut info_map = TransportInfo::new();
        info_map.insert(info::HTTP_CODE.to_string(), json!(207));
        let body = "--XYZ\r\nContent-Type: text/plain\r\n\r\none\r\n--XYZ\r\nContent-Type: application/json\r\n\r\n{\"n\":2}\r\n--XYZ--\r\n";
        let resp = Response::with_info(207, "Content-Type: multipart/mixed; boundary=XYZ\r\n", body, info_map);
        assert!(resp.is_multipart());

        let parts = resp.extract_multipart().unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.status() == 207));
        assert!(parts.iter().all(|p| p.info(info::HTTP_CODE) == Some(&json!(207))));
        assert_eq!(parts[0].text(), "one");
        assert_eq!(parts[1].data().unwrap(), Data::Json(json!({"n": 2})));
    }

    #[test]
    fn nested_multipart_is_flattened() {
        let body = "--outer\r\nContent-Type: text/plain\r\n\r\nfirst\r\n\
                    --outer\r\nContent-Type: multipart/alternative; boundary=inner\r\n\r\n\
                    --inner\r\nContent-Type: text/plain\r\n\r\nsecond\r\n\
                    --inner\r\nContent-Type: text/html\r\n\r\n<b>third</b>\r\n\
                    --inner--\r\n\
                    --outer--\r\n";
        let resp = Response::new(200, "Content-Type: multipart/mixed; boundary=outer\r\n", body);
        let parts = resp.extract_multipart().unwrap();
        let texts: Vec<_> = parts.iter().map(|p| p.text().into_owned()).collect();
        assert_eq!(texts, vec!["first", "second", "<b>third</b>"]);
        assert!(parts.iter().all(|p| !p.is_multipart()));
    }

    #[test]
    fn nested_multipart_without_boundary_is_dropped() {
        let body = "--B\r\nContent-Type: multipart/mixed\r\n\r\nlost\r\n--B\r\nContent-Type: text/plain\r\n\r\nkept\r\n--B--";
        let resp = Response::new(200, "Content-Type: multipart/mixed; boundary=B\r\n", body);
        let parts = resp.extract_multipart().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text(), "kept");
    }

    /// A single text leaf wrapped in `levels` multipart containers.
    /// Returns the outermost content type and body.
    fn nested_chain(levels: usize) -> (String, String) {
        let mut content_type = "text/plain".to_string();
        let mut body = "leaf".to_string();
        for i in 0..levels {
            body = format!("--b{i}\r\nContent-Type: {content_type}\r\n\r\n{body}\r\n--b{i}--");
            content_type = format!("multipart/mixed; boundary=b{i}");
        }
        (content_type, body)
    }

    #[test]
    fn nesting_within_limit_reaches_the_leaf() {
        let (content_type, body) = nested_chain(MAX_MULTIPART_DEPTH);
        let resp = Response::new(200, &format!("Content-Type: {content_type}\r\n"), body);
        let parts = resp.extract_multipart().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text(), "leaf");
    }

    #[test]
    fn nesting_past_limit_is_dropped_and_siblings_survive() {
        let (inner_type, inner_body) = nested_chain(MAX_MULTIPART_DEPTH + 8);
        let body = format!(
            "--top\r\nContent-Type: text/plain\r\n\r\nkept\r\n\
             --top\r\nContent-Type: {inner_type}\r\n\r\n{inner_body}\r\n--top--"
        );
        let resp = Response::new(200, "Content-Type: multipart/mixed; boundary=top\r\n", body);
        let parts = resp.extract_multipart().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text(), "kept");
    }

    #[test]
    fn very_deep_nesting_returns_without_overflow() {
        let (content_type, body) = nested_chain(2_000);
        let resp = Response::new(200, &format!("Content-Type: {content_type}\r\n"), body);
        assert_eq!(resp.extract_multipart().unwrap().len(), 0);
    }

    #[test]
    fn extraction_on_plain_response_is_none() {
        let resp = Response::new(200, "Content-Type: text/plain\r\n", "--B\r\n");
        assert!(!resp.is_multipart());
        assert!(resp.extract_multipart().is_none());
        let no_boundary = Response::new(200, "Content-Type: multipart/mixed\r\n", "");
        assert!(no_boundary.is_multipart());
        assert!(no_boundary.extract_multipart().is_none());
    }
}
