//! Incremental HTTP/1.1 response parsing.
//!
//! The status line and headers are parsed by `httparse` — the same
//! incremental, re-invoke-as-more-bytes-arrive parser `hyper` itself is
//! built on. This module is the thin binding around it plus the body
//! framing (Content-Length / chunked / read-until-close) that httparse
//! itself does not cover.

use crate::error::{ConduitError, Result};

/// A header as the wire delivered it: byte-exact name case, no value
/// decoding.
pub type RawHeader = (Box<[u8]>, Box<[u8]>);

pub struct ParsedHeaders {
    pub status_code: u16,
    pub headers: Vec<RawHeader>,
    /// Bytes of `buf` consumed by the status line and header block,
    /// including the terminating blank line.
    pub consumed: usize,
}

/// Attempts to parse a complete status line + header block from `buf`.
/// Returns `Ok(None)` if more bytes are needed.
pub fn try_parse_headers(buf: &[u8]) -> Result<Option<ParsedHeaders>> {
    let mut header_storage = [httparse::EMPTY_HEADER; 128];
    let mut response = httparse::Response::new(&mut header_storage);

    match response.parse(buf) {
        Ok(httparse::Status::Complete(consumed)) => {
            let status_code = response.code.unwrap_or(0);
            let headers = response
                .headers
                .iter()
                .map(|h| {
                    (
                        h.name.as_bytes().to_vec().into_boxed_slice(),
                        h.value.to_vec().into_boxed_slice(),
                    )
                })
                .collect();
            Ok(Some(ParsedHeaders {
                status_code,
                headers,
                consumed,
            }))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(err) => Err(ConduitError::Protocol(err.to_string())),
    }
}

pub fn header_value<'a>(headers: &'a [RawHeader], name: &str) -> Option<&'a [u8]> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name.as_bytes()))
        .map(|(_, value)| value.as_ref())
}

/// How the response body is framed, determined once headers are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// No body is present or expected (HEAD, 204, 304).
    None,
    ContentLength(usize),
    Chunked,
    /// No framing header present; the body runs until the peer closes the
    /// connection (HTTP/1.0-style or an explicit `Connection: close`).
    UntilClose,
}

pub fn determine_framing(is_head: bool, status_code: u16, headers: &[RawHeader]) -> BodyFraming {
    if is_head || matches!(status_code, 204 | 304) {
        return BodyFraming::None;
    }

    if let Some(value) = header_value(headers, "transfer-encoding") {
        if value
            .split(|b| *b == b',')
            .any(|token| token.trim_ascii().eq_ignore_ascii_case(b"chunked"))
        {
            return BodyFraming::Chunked;
        }
    }

    if let Some(value) = header_value(headers, "content-length") {
        if let Ok(text) = std::str::from_utf8(value) {
            if let Ok(n) = text.trim().parse::<usize>() {
                return BodyFraming::ContentLength(n);
            }
        }
    }

    BodyFraming::UntilClose
}

/// Attempts to fully dechunk `raw`, the bytes received so far after the
/// header block. Returns `Ok(None)` if the terminating `0`-length chunk
/// has not arrived yet. Trailer headers after the terminating chunk are
/// accepted but discarded.
pub fn try_decode_chunked(raw: &[u8]) -> Result<Option<Vec<u8>>> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = match find_crlf(&raw[pos..]) {
            Some(offset) => pos + offset,
            None => return Ok(None),
        };

        let size_line = std::str::from_utf8(&raw[pos..line_end])
            .map_err(|_| ConduitError::Protocol("non-UTF-8 chunk size line".into()))?;
        let size_str = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| ConduitError::Protocol(format!("invalid chunk size: {size_str:?}")))?;

        let chunk_start = line_end + 2;

        if size == 0 {
            // Terminating chunk: wait for the trailer section's final
            // blank line before declaring the message complete.
            return match find_crlf_crlf(&raw[chunk_start..]) {
                Some(_) => Ok(Some(body)),
                None if raw[chunk_start..].starts_with(b"\r\n") => Ok(Some(body)),
                None => Ok(None),
            };
        }

        let chunk_end = chunk_start + size;
        if raw.len() < chunk_end + 2 {
            return Ok(None);
        }

        body.extend_from_slice(&raw[chunk_start..chunk_end]);
        pos = chunk_end + 2;
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn find_crlf_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
