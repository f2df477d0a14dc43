//! The single-use request/response driver.
//!
//! Conceptually this type moves through the stages `Init -> Writing ->
//! ReadingHeaders -> ReadingBody -> Released | Failed`, but because every
//! one of those stages does nothing except "write some bytes" or "read
//! until a condition holds", and because `Connection` already releases
//! itself unconditionally on drop, the stages are not reified as an enum:
//! `drive` simply runs them in order with `?`, and whichever way it
//! returns, `connection` goes out of scope and its lease is released
//! exactly once.

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::endpoint::EndpointKey;
use crate::error::{ConduitError, Result};
use crate::parser::{self, BodyFraming};
use crate::response::Response;

pub(crate) struct HttpRequest<'a> {
    connection: Connection,
    endpoint: &'a EndpointKey,
    path: &'a str,
    method: String,
    headers: Vec<(String, String)>,
    config: &'a SessionConfig,
}

impl<'a> HttpRequest<'a> {
    pub(crate) fn new(
        connection: Connection,
        endpoint: &'a EndpointKey,
        path: &'a str,
        method: &str,
        headers: &[(&str, &str)],
        config: &'a SessionConfig,
    ) -> Self {
        Self {
            connection,
            endpoint,
            path,
            method: method.to_ascii_uppercase(),
            headers: headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            config,
        }
    }

    /// Drives the request through `Writing`, `ReadingHeaders`, and
    /// `ReadingBody`, releasing the Connection on every exit path.
    pub(crate) async fn drive(self) -> Result<Response> {
        let Self {
            connection,
            endpoint,
            path,
            method,
            headers,
            config,
        } = self;

        // HEAD responses never carry a body, decided up front so the body
        // stage below can skip straight to `None` framing.
        let is_head = method == "HEAD";

        let request_bytes = build_request_bytes(&method, path, endpoint, &headers, config);
        connection.send(&request_bytes).await?;

        // `ReadingHeaders`: feed the parser bytes at a time until it
        // reports headers_complete.
        let mut buf = vec![0u8; config.read_buffer_size];
        let mut raw = Vec::new();
        let parsed = loop {
            let n = connection.read(&mut buf).await?;
            if n == 0 {
                return Err(ConduitError::Eof);
            }
            raw.extend_from_slice(&buf[..n]);
            if let Some(parsed) = parser::try_parse_headers(&raw)? {
                break parsed;
            }
        };

        let mut body_raw = raw.split_off(parsed.consumed);
        let framing = parser::determine_framing(is_head, parsed.status_code, &parsed.headers);

        // `ReadingBody`, or an immediate skip to `Released` for HEAD.
        let body = match framing {
            BodyFraming::None => Vec::new(),
            BodyFraming::ContentLength(expected) => {
                while body_raw.len() < expected {
                    let n = connection.read(&mut buf).await?;
                    if n == 0 {
                        return Err(ConduitError::Eof);
                    }
                    body_raw.extend_from_slice(&buf[..n]);
                }
                body_raw.truncate(expected);
                body_raw
            }
            BodyFraming::Chunked => loop {
                if let Some(decoded) = parser::try_decode_chunked(&body_raw)? {
                    break decoded;
                }
                let n = connection.read(&mut buf).await?;
                if n == 0 {
                    return Err(ConduitError::Eof);
                }
                body_raw.extend_from_slice(&buf[..n]);
            },
            BodyFraming::UntilClose => {
                loop {
                    let n = connection.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    body_raw.extend_from_slice(&buf[..n]);
                }
                body_raw
            }
        };

        Ok(Response::new(parsed.status_code, parsed.headers, body))
    }
}

fn build_request_bytes(
    method: &str,
    path: &str,
    endpoint: &EndpointKey,
    headers: &[(String, String)],
    config: &SessionConfig,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(method.as_bytes());
    out.push(b' ');
    out.extend_from_slice(path.as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");

    // Host is always Session-derived; any caller-supplied Host below is
    // skipped rather than letting it shadow this one.
    write_header(&mut out, "Host", &host_header_value(endpoint));

    // The default User-Agent is also written up front, ahead of the
    // caller's own headers, unless the caller supplies one themselves —
    // defaults precede caller headers on the wire either way.
    let caller_sets_user_agent = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"));
    if !caller_sets_user_agent {
        write_header(&mut out, "User-Agent", &config.user_agent);
    }

    for (name, value) in headers {
        if name.eq_ignore_ascii_case("host") {
            continue;
        }
        write_header(&mut out, name, value);
    }

    out.extend_from_slice(b"\r\n");
    out
}

fn host_header_value(endpoint: &EndpointKey) -> String {
    if endpoint.port() == endpoint.scheme().default_port() {
        endpoint.host().to_string()
    } else {
        format!("{}:{}", endpoint.host(), endpoint.port())
    }
}

fn write_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Scheme;

    #[test]
    fn host_header_omits_default_port() {
        let endpoint = EndpointKey::new(Scheme::Http, "example.com", 80);
        assert_eq!(host_header_value(&endpoint), "example.com");

        let endpoint = EndpointKey::new(Scheme::Http, "example.com", 8080);
        assert_eq!(host_header_value(&endpoint), "example.com:8080");
    }

    #[test]
    fn caller_supplied_host_is_overridden() {
        let endpoint = EndpointKey::new(Scheme::Http, "example.com", 80);
        let config = SessionConfig::default();
        let headers = [("Host".to_string(), "evil.example".to_string())];
        let bytes = build_request_bytes("GET", "/", &endpoint, &headers, &config);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.matches("Host:").count(), 1);
        assert!(text.contains("Host: example.com\r\n"));
        assert!(!text.contains("evil.example"));
    }

    #[test]
    fn default_user_agent_is_added_when_absent() {
        let endpoint = EndpointKey::new(Scheme::Http, "example.com", 80);
        let config = SessionConfig::default();
        let bytes = build_request_bytes("GET", "/", &endpoint, &[], &config);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(&format!("User-Agent: {}\r\n", config.user_agent)));
    }

    #[test]
    fn defaults_precede_caller_headers_on_the_wire() {
        let endpoint = EndpointKey::new(Scheme::Http, "example.com", 80);
        let config = SessionConfig::default();
        let headers = [("X-Caller".to_string(), "value".to_string())];
        let bytes = build_request_bytes("GET", "/", &endpoint, &headers, &config);
        let text = String::from_utf8(bytes).unwrap();

        let host_pos = text.find("Host:").unwrap();
        let user_agent_pos = text.find("User-Agent:").unwrap();
        let caller_pos = text.find("X-Caller:").unwrap();
        assert!(host_pos < caller_pos);
        assert!(user_agent_pos < caller_pos, "default User-Agent must precede caller headers");
    }

    #[test]
    fn caller_supplied_user_agent_replaces_the_default() {
        let endpoint = EndpointKey::new(Scheme::Http, "example.com", 80);
        let config = SessionConfig::default();
        let headers = [("User-Agent".to_string(), "custom/1.0".to_string())];
        let bytes = build_request_bytes("GET", "/", &endpoint, &headers, &config);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.matches("User-Agent:").count(), 1);
        assert!(text.contains("User-Agent: custom/1.0\r\n"));
    }
}
