//! Transport Endpoints
//!
//! Immutable addressing data identifying the remote peer, one type per
//! backend: host + port for TCP, remote socket name + remote CPU name for
//! the rpmsg socket family.
//!
//! The rpmsg name fields are bounded by [`RPMSG_NAME_MAX`]; longer values
//! are truncated, not rejected, matching the fixed-size character arrays
//! of the underlying `sockaddr_rpmsg` structure.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum length (in bytes, NUL excluded) of the rpmsg socket name and
/// remote CPU name. Mirrors the fixed-size fields of `sockaddr_rpmsg`.
pub const RPMSG_NAME_MAX: usize = 15;

/// TCP endpoint: host name or literal address, plus port
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpEndpoint {
    /// Host name or IP address of the peer (or the listen address in
    /// server role)
    pub host: String,
    /// Port number
    pub port: u16,
}

impl TcpEndpoint {
    /// Create a new TCP endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TcpEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Rpmsg endpoint: remote socket name plus remote CPU name
///
/// Both fields are truncated to [`RPMSG_NAME_MAX`] bytes on construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpmsgEndpoint {
    /// Remote socket name
    pub name: String,
    /// Remote CPU name
    pub cpu: String,
}

impl RpmsgEndpoint {
    /// Create a new rpmsg endpoint, truncating over-long names
    pub fn new(name: impl Into<String>, cpu: impl Into<String>) -> Self {
        Self {
            name: bounded(&name.into(), RPMSG_NAME_MAX),
            cpu: bounded(&cpu.into(), RPMSG_NAME_MAX),
        }
    }
}

impl fmt::Display for RpmsgEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.cpu)
    }
}

/// Truncate a string to at most `max` bytes without splitting a character
fn bounded(s: &str, max: usize) -> String {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
