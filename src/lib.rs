//! portprobe - an event-driven TCP connect scanner.
//!
//! One single-threaded event loop multiplexes thousands of in-flight
//! non-blocking connects against a target, classifies every port as
//! open / closed / filtered / unknown, and identifies listening services
//! from their banners.

pub mod config;
pub mod error;
pub mod network;
pub mod output;
pub mod scanner;
pub mod service;

// Re-export commonly used types
pub use config::{CancelToken, IpVersion, ScanConfig};
pub use error::ScanError;
pub use network::PortStatus;
pub use scanner::{ScanEngine, ScanReport, ScanResult};
pub use service::ServiceInfo;

pub type Result<T> = std::result::Result<T, ScanError>;
