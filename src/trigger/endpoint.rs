//! Broker endpoint resolution.
//!
//! Parses the `BrokerUrl` setting into an ordered list of validated
//! `host:port` pairs. Validation is purely syntactic; no DNS lookups happen
//! here, so unreachable hosts only surface when a subscription opens.
//!
//! # Example
//!
//! ```rust
//! use kafkasub::trigger::endpoint::resolve;
//!
//! let endpoints = resolve("192.168.10.1:9092,a.123.z-fr.c:9096").unwrap();
//! assert_eq!(endpoints.len(), 2);
//! assert_eq!(endpoints.as_slice()[1].host(), "a.123.z-fr.c");
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, TriggerError};

/// Maximum length of a DNS name.
const MAX_HOST_LEN: usize = 253;

fn host_label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$")
            .expect("host label pattern is a valid regex")
    })
}

/// A single validated broker address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Returns the host part.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port part.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = TriggerError;

    fn from_str(segment: &str) -> Result<Self> {
        let invalid = |reason: &str| TriggerError::InvalidEndpoint {
            segment: segment.to_string(),
            reason: reason.to_string(),
        };

        let (host, port) = segment
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if port.is_empty() {
            return Err(invalid("missing port"));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port must be an integer between 1 and 65535"))?;
        if port == 0 {
            return Err(invalid("port must be an integer between 1 and 65535"));
        }

        if host.len() > MAX_HOST_LEN {
            return Err(invalid("host name too long"));
        }
        if !host.split('.').all(|label| host_label_pattern().is_match(label)) {
            return Err(invalid("host is not a valid hostname or IPv4 address"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

/// Ordered, non-empty list of broker endpoints.
///
/// Duplicates are preserved as given; [`EndpointSet::bootstrap_servers`]
/// collapses them when the list is handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; an empty set cannot be resolved.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Entries in declaration order.
    pub fn as_slice(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Iterates entries in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Endpoint> {
        self.endpoints.iter()
    }

    /// Renders the `bootstrap.servers` value.
    ///
    /// Repeated identical entries appear once, in first-occurrence order, so
    /// a redundant list addresses the cluster exactly like a single entry.
    pub fn bootstrap_servers(&self) -> String {
        let mut unique: Vec<&Endpoint> = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            if !unique.contains(&endpoint) {
                unique.push(endpoint);
            }
        }
        unique
            .iter()
            .map(|endpoint| endpoint.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for EndpointSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.endpoints.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}

impl<'a> IntoIterator for &'a EndpointSet {
    type Item = &'a Endpoint;
    type IntoIter = std::slice::Iter<'a, Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.iter()
    }
}

/// Resolves a comma-separated broker list.
///
/// # Errors
///
/// Returns `TriggerError::InvalidEndpoint` for empty input, an empty
/// segment, a segment without a colon, or a bad host or port.
pub fn resolve(broker_url: &str) -> Result<EndpointSet> {
    if broker_url.trim().is_empty() {
        return Err(TriggerError::InvalidEndpoint {
            segment: broker_url.to_string(),
            reason: "broker list is empty".to_string(),
        });
    }

    let endpoints = broker_url
        .split(',')
        .enumerate()
        .map(|(position, segment)| {
            let segment = segment.trim();
            if segment.is_empty() {
                return Err(TriggerError::InvalidEndpoint {
                    segment: segment.to_string(),
                    reason: format!("empty entry at position {} in broker list", position),
                });
            }
            segment.parse::<Endpoint>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EndpointSet { endpoints })
}
