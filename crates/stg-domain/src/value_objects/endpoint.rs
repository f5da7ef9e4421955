//! Target keys: the `(host, port, protocol)` triple identifying a target.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scheme of a target endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Default TCP port implied by the scheme.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

impl_from_str!(Protocol, "Unknown protocol: {}", {
    "http" => Protocol::Http,
    "https" => Protocol::Https,
});

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalised `(host, port, protocol)` triple.
///
/// Hosts are lowercased; a port equal to the scheme default is dropped so the
/// same endpoint always maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetKey {
    pub host: String,
    pub port: Option<u16>,
    pub protocol: Protocol,
}

impl TargetKey {
    /// Build a key, applying host lowercasing and default-port normalisation.
    #[must_use]
    pub fn new(host: &str, port: Option<u16>, protocol: Protocol) -> Self {
        let port = port.filter(|p| *p != protocol.default_port());
        Self {
            host: host.trim().to_lowercase(),
            port,
            protocol,
        }
    }

    /// Derive a key from a URL.
    ///
    /// # Errors
    ///
    /// Returns a parse error for unparseable URLs, non-http(s) schemes, or
    /// URLs without a host component.
    pub fn from_url(raw: &str) -> Result<Self> {
        let parsed = url::Url::parse(raw)
            .map_err(|e| Error::parse_with_source(format!("Invalid URL '{raw}'"), e))?;
        let protocol = match parsed.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            other => {
                return Err(Error::parse(format!(
                    "Unsupported scheme '{other}' in URL '{raw}'"
                )));
            }
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::parse(format!("URL '{raw}' has no host")))?;
        // The url crate already strips scheme-default ports during parsing.
        Ok(Self::new(host, parsed.port(), protocol))
    }

    /// Scheme://host[:port] form.
    #[must_use]
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.protocol, self.host, port),
            None => format!("{}://{}", self.protocol, self.host),
        }
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_normalised_away() {
        let key = TargetKey::new("API.Example.Com", Some(443), Protocol::Https);
        assert_eq!(key.host, "api.example.com");
        assert_eq!(key.port, None);
        assert_eq!(key.base_url(), "https://api.example.com");
    }

    #[test]
    fn explicit_nonstandard_port_is_kept() {
        let key = TargetKey::new("example.com", Some(8443), Protocol::Https);
        assert_eq!(key.port, Some(8443));
        assert_eq!(key.base_url(), "https://example.com:8443");
    }

    #[test]
    fn from_url_strips_default_port() {
        let key = TargetKey::from_url("https://api.example.com:443/v1/ping").expect("parse");
        assert_eq!(key.host, "api.example.com");
        assert_eq!(key.port, None);
        assert_eq!(key.protocol, Protocol::Https);
    }

    #[test]
    fn from_url_rejects_other_schemes() {
        let err = TargetKey::from_url("ftp://example.com/").expect_err("must fail");
        assert_eq!(err.kind(), "parse_error");
    }

    #[test]
    fn from_url_requires_a_host() {
        assert!(TargetKey::from_url("not a url").is_err());
    }
}
