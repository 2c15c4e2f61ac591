//! Network primitives: address resolution, socket creation and the
//! readiness poller that drives the scan engine.

pub mod poller;
pub mod resolver;
pub mod socket;

pub use poller::{Poller, Readiness};
pub use resolver::{resolve, Target};

use crate::config::IpVersion;
use serde::{Deserialize, Serialize};

/// Terminal classification of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortStatus {
    Open,
    Closed,
    Filtered,
    Unknown,
    #[serde(rename = "open|filtered")]
    OpenFiltered,
}

impl std::fmt::Display for PortStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortStatus::Open => write!(f, "open"),
            PortStatus::Closed => write!(f, "closed"),
            PortStatus::Filtered => write!(f, "filtered"),
            PortStatus::Unknown => write!(f, "unknown"),
            PortStatus::OpenFiltered => write!(f, "open|filtered"),
        }
    }
}

/// Family tag attached to every result.
pub fn family_of(addr: std::net::IpAddr) -> IpVersion {
    match addr {
        std::net::IpAddr::V4(_) => IpVersion::Ipv4,
        std::net::IpAddr::V6(_) => IpVersion::Ipv6,
    }
}
