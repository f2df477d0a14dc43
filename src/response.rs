//! The response object returned from `Session::request`.

use std::io::Read;

use flate2::read::GzDecoder;

use crate::error::Result;
use crate::parser::RawHeader;

/// A fully materialized HTTP response: status, headers, and a
/// transparently-decoded body.
pub struct Response {
    status_code: u16,
    headers: Vec<RawHeader>,
    content: Vec<u8>,
}

impl Response {
    pub(crate) fn new(status_code: u16, headers: Vec<RawHeader>, raw_body: Vec<u8>) -> Self {
        let content = if is_gzip_encoded(&headers) {
            decode_gzip(&raw_body).unwrap_or(raw_body)
        } else {
            raw_body
        };

        Self {
            status_code,
            headers,
            content,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Header multimap, preserving the byte-exact case and insertion order
    /// the wire delivered.
    pub fn headers(&self) -> &[RawHeader] {
        &self.headers
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        crate::parser::header_value(&self.headers, name)
    }

    /// Body bytes, gzip-decoded if `Content-Encoding` named it.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> std::result::Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.content)
    }
}

fn is_gzip_encoded(headers: &[RawHeader]) -> bool {
    crate::parser::header_value(headers, "content-encoding")
        .map(|value| {
            value
                .split(|b| *b == b',')
                .any(|token| token.trim_ascii().eq_ignore_ascii_case(b"gzip"))
        })
        .unwrap_or(false)
}

fn decode_gzip(raw: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(raw);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(crate::error::ConduitError::from)?;
    Ok(out)
}
