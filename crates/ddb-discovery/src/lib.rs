#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Service-discovery data contract.
//!
//! The MQTT transport that listens for new debuggee endpoints is external
//! to the core (spec §1); this crate hosts only the wire format it decodes
//! into and the callback the core implements to learn about a new
//! session.

use std::net::Ipv4Addr;

use async_trait::async_trait;
use thiserror::Error;

/// One discovered debuggee endpoint, decoded from the wire message
/// `"<ip_int>:<tag>:<pid>"` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// The debuggee host's address.
    pub ip: Ipv4Addr,
    /// An opaque, stable identifier for the process (used as the session
    /// tag and, for remote-bt, the cross-session routing key).
    pub tag: String,
    /// The debuggee's process id.
    pub pid: u32,
}

/// Errors decoding a discovery wire message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The message did not have exactly three colon-separated fields.
    #[error("malformed discovery message: {0:?}")]
    Malformed(String),

    /// The `ip_int` or `pid` field was not a valid integer.
    #[error("invalid integer field in discovery message: {0:?}")]
    InvalidInteger(String),
}

impl ServiceInfo {
    /// Parses the wire format `"<ip_int>:<tag>:<pid>"`, where `ip_int` is
    /// the 32-bit network-order representation of the IPv4 address.
    pub fn parse(message: &str) -> Result<Self, DiscoveryError> {
        let mut parts = message.splitn(3, ':');
        let (Some(ip_field), Some(tag), Some(pid_field)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(DiscoveryError::Malformed(message.to_owned()));
        };

        let ip_int: u32 = ip_field
            .parse()
            .map_err(|_| DiscoveryError::InvalidInteger(ip_field.to_owned()))?;
        let pid: u32 = pid_field
            .parse()
            .map_err(|_| DiscoveryError::InvalidInteger(pid_field.to_owned()))?;

        Ok(Self {
            ip: Ipv4Addr::from(ip_int.to_be_bytes()),
            tag: tag.to_owned(),
            pid,
        })
    }

    /// The session tag this endpoint would register under, matching the
    /// original's `f"{hostname}:-{pid}"` construction.
    #[must_use]
    pub fn session_tag(&self) -> String {
        format!("{}:-{}", self.ip, self.pid)
    }
}

/// Implemented by whatever drives new-session creation in response to
/// discovery. The core only ever consumes this callback; it never owns
/// the MQTT listener that invokes it.
#[async_trait]
pub trait DiscoveryCallback: Send + Sync {
    /// Called once per newly discovered debuggee endpoint.
    async fn discover(&self, info: ServiceInfo);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_message() {
        // 10.0.0.1 as network-order u32.
        let ip_int: u32 = u32::from_be_bytes([10, 0, 0, 1]);
        let msg = format!("{ip_int}:worker-a:4242");
        let info = ServiceInfo::parse(&msg).unwrap();
        assert_eq!(info.ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(info.tag, "worker-a");
        assert_eq!(info.pid, 4242);
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(matches!(
            ServiceInfo::parse("only-one-field"),
            Err(DiscoveryError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_non_integer_pid() {
        assert!(matches!(
            ServiceInfo::parse("123:tag:not-a-number"),
            Err(DiscoveryError::InvalidInteger(_))
        ));
    }

    #[test]
    fn session_tag_matches_original_format() {
        let info = ServiceInfo {
            ip: Ipv4Addr::new(192, 168, 1, 1),
            tag: "ignored".to_owned(),
            pid: 99,
        };
        assert_eq!(info.session_tag(), "192.168.1.1:-99");
    }
}
