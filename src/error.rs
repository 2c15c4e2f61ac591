//! Error types for the scanner.
//!
//! The engine distinguishes fatal errors, which abort a scan before or as it
//! starts, from per-port conditions, which are folded into the result stream
//! as `PortStatus::Unknown` and never surface here.

use thiserror::Error;

/// Main error type for scanning operations.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("readiness poller error: {0}")]
    Poller(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config file error: {0}")]
    ConfigFile(String),

    #[error("output error: {0}")]
    Output(String),
}

impl From<std::net::AddrParseError> for ScanError {
    fn from(e: std::net::AddrParseError) -> Self {
        ScanError::InvalidTarget(e.to_string())
    }
}

impl From<std::num::ParseIntError> for ScanError {
    fn from(e: std::num::ParseIntError) -> Self {
        ScanError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ScanError = io.into();
        assert!(matches!(err, ScanError::Io(_)));
    }

    #[test]
    fn parse_int_errors_convert() {
        let err: ScanError = "notaport".parse::<u16>().unwrap_err().into();
        assert!(matches!(err, ScanError::Parse(_)));
    }
}
