//! Transport Configuration
//!
//! Configuration types for selecting a backend, its endpoint, and the
//! role an instance plays. Used by the factory entry points; the
//! framework's host application typically builds one of these from its
//! own config file or from the environment.

use serde::{Deserialize, Serialize};

#[cfg(target_os = "linux")]
use crate::endpoint::RpmsgEndpoint;
use crate::endpoint::TcpEndpoint;
use crate::transport::Role;

/// Default host used when the environment specifies none
const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port used when the environment specifies none
const DEFAULT_PORT: u16 = 5407;

/// Backend selection plus its addressing data
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TransportKind {
    /// IP/TCP stream socket
    Tcp {
        /// Peer (client role) or listen (server role) endpoint
        endpoint: TcpEndpoint,
    },

    /// Inter-processor rpmsg stream socket
    #[cfg(target_os = "linux")]
    Rpmsg {
        /// Remote socket name + remote CPU name
        endpoint: RpmsgEndpoint,
    },
}

/// Transport configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Which backend to use, and where to connect/listen
    pub kind: TransportKind,
    /// Client or server role
    pub role: Role,
}

impl TransportConfig {
    /// Configuration for a TCP transport
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16, role: Role) -> Self {
        Self {
            kind: TransportKind::Tcp {
                endpoint: TcpEndpoint::new(host, port),
            },
            role,
        }
    }

    /// Configuration for an rpmsg transport
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn rpmsg(name: impl Into<String>, cpu: impl Into<String>, role: Role) -> Self {
        Self {
            kind: TransportKind::Rpmsg {
                endpoint: RpmsgEndpoint::new(name, cpu),
            },
            role,
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `WIRECALL_TRANSPORT`: "tcp" (default) or "rpmsg"
    /// - `WIRECALL_ROLE`: "client" (default) or "server"
    /// - `WIRECALL_HOST`, `WIRECALL_PORT`: TCP endpoint
    /// - `WIRECALL_RPMSG_NAME`, `WIRECALL_RPMSG_CPU`: rpmsg endpoint
    pub fn from_env() -> Self {
        let role = match std::env::var("WIRECALL_ROLE")
            .as_deref()
            .map(str::to_lowercase)
        {
            Ok(ref s) if s == "server" => Role::Server,
            _ => Role::Client,
        };

        let kind = match std::env::var("WIRECALL_TRANSPORT")
            .as_deref()
            .map(str::to_lowercase)
        {
            #[cfg(target_os = "linux")]
            Ok(ref s) if s == "rpmsg" => TransportKind::Rpmsg {
                endpoint: RpmsgEndpoint::new(
                    std::env::var("WIRECALL_RPMSG_NAME").unwrap_or_else(|_| "rpc".into()),
                    std::env::var("WIRECALL_RPMSG_CPU").unwrap_or_else(|_| "remote".into()),
                ),
            },

            _ => TransportKind::Tcp {
                endpoint: TcpEndpoint::new(
                    std::env::var("WIRECALL_HOST").unwrap_or_else(|_| DEFAULT_HOST.into()),
                    std::env::var("WIRECALL_PORT")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(DEFAULT_PORT),
                ),
            },
        };

        Self { kind, role }
    }

    /// Check if this is a TCP configuration
    pub fn is_tcp(&self) -> bool {
        matches!(self.kind, TransportKind::Tcp { .. })
    }

    /// Check if this is an rpmsg configuration
    #[cfg(target_os = "linux")]
    pub fn is_rpmsg(&self) -> bool {
        matches!(self.kind, TransportKind::Rpmsg { .. })
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::tcp(DEFAULT_HOST, DEFAULT_PORT, Role::Client)
    }
}
