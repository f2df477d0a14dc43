use std::fmt;

use url::Url;

use crate::error::{ConduitError, Result};

/// The wire scheme of an endpoint. Only the two HTTP/1.1 schemes are
/// meaningful at this layer; anything else is rejected by
/// `EndpointKey::from_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn is_tls(self) -> bool {
        matches!(self, Scheme::Https)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        })
    }
}

/// The canonical identity of a `Pool`: `scheme://host:port`, bytes-level
/// equality, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    scheme: Scheme,
    host: Box<str>,
    port: u16,
}

/// A parsed request target: the endpoint it routes to plus the
/// path-and-query that is unique to this particular request.
pub struct RequestTarget {
    pub endpoint: EndpointKey,
    pub path_and_query: String,
}

impl EndpointKey {
    pub fn new(scheme: Scheme, host: impl Into<Box<str>>, port: u16) -> Self {
        Self {
            scheme,
            host: host.into(),
            port,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Parses `url` into its endpoint identity and request target,
    /// defaulting the port to 80 for `http` and 443 for `https`.
    pub fn parse(raw_url: &str) -> Result<RequestTarget> {
        let url = Url::parse(raw_url)?;

        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(ConduitError::Protocol(format!(
                    "unsupported scheme: {other}"
                )));
            }
        };

        let host = url.host_str().ok_or(ConduitError::MissingHost)?;
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let mut path_and_query = url.path().to_string();
        if path_and_query.is_empty() {
            path_and_query.push('/');
        }
        if let Some(query) = url.query() {
            path_and_query.push('?');
            path_and_query.push_str(query);
        }

        Ok(RequestTarget {
            endpoint: EndpointKey::new(scheme, host, port),
            path_and_query,
        })
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scheme, self.host, self.port)
    }
}
