//! Scan configuration: recognized options, validation, and file loading.
//!
//! Config files are JSON or XML, selected by file extension. Values given on
//! the command line override values loaded from a file.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Inclusive bounds accepted by [`ScanConfig::validate`].
pub const MAX_TIMEOUT_MS: u64 = 60_000;
pub const MAX_CONCURRENCY: usize = 2_000;

/// IP version selection for the socket family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    Ipv4,
    Ipv6,
    Auto,
}

impl std::str::FromStr for IpVersion {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ipv4" | "4" => Ok(IpVersion::Ipv4),
            "ipv6" | "6" => Ok(IpVersion::Ipv6),
            "auto" => Ok(IpVersion::Auto),
            other => Err(ScanError::Parse(format!("unknown ip version: {other}"))),
        }
    }
}

impl std::fmt::Display for IpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpVersion::Ipv4 => write!(f, "ipv4"),
            IpVersion::Ipv6 => write!(f, "ipv6"),
            IpVersion::Auto => write!(f, "auto"),
        }
    }
}

/// Externally observable cancellation flag shared with the scan engine.
///
/// Cloning the token shares the underlying flag. Cancellation is
/// at-most-once; a cancelled scan cannot resume.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Main configuration structure for a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Target host name or IP literal.
    pub target: String,

    /// Ports to scan, normalized to ascending unique order.
    pub ports: Vec<u16>,

    /// Per-connect deadline in milliseconds.
    pub timeout: u64,

    /// Maximum simultaneous in-flight connection attempts.
    pub concurrency: usize,

    /// Run the pattern matcher on open ports.
    pub service_detection: bool,

    /// Grab banners from open ports (required for detection to see data).
    pub banner_grabbing: bool,

    /// Socket family selection.
    pub ip_version: IpVersion,

    /// Result format: txt, json or xml.
    pub output_format: String,

    /// Write results here instead of stdout.
    pub output_file: Option<String>,

    pub verbose: bool,

    /// Cancellation flag polled by the engine. Not part of the serialized
    /// surface; every deserialized config gets a fresh token.
    #[serde(skip)]
    pub cancel: CancelToken,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: "127.0.0.1".to_string(),
            ports: vec![
                21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 993, 995, 1723, 3306,
                3389, 5432, 5900, 8080,
            ],
            timeout: 3000,
            concurrency: 100,
            service_detection: true,
            banner_grabbing: true,
            ip_version: IpVersion::Auto,
            output_format: "txt".to_string(),
            output_file: None,
            verbose: false,
            cancel: CancelToken::new(),
        }
    }
}

impl ScanConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = timeout_ms;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_ip_version(mut self, version: IpVersion) -> Self {
        self.ip_version = version;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Sort ports ascending and drop duplicates.
    pub fn normalize_ports(&mut self) {
        self.ports.sort_unstable();
        self.ports.dedup();
    }

    /// Validate the recognized options. Port 0 is outside the scanable
    /// domain; timeout and concurrency have hard upper bounds.
    pub fn validate(&self) -> crate::Result<()> {
        if self.target.is_empty() {
            return Err(ScanError::InvalidConfig("target cannot be empty".into()));
        }
        if self.ports.is_empty() {
            return Err(ScanError::InvalidConfig("no ports specified".into()));
        }
        if self.ports.contains(&0) {
            return Err(ScanError::InvalidConfig(
                "port out of range: ports must be in 1..=65535".into(),
            ));
        }
        if self.timeout == 0 || self.timeout > MAX_TIMEOUT_MS {
            return Err(ScanError::InvalidConfig(format!(
                "timeout must be in 1..={MAX_TIMEOUT_MS} ms"
            )));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ScanError::InvalidConfig(format!(
                "concurrency must be in 1..={MAX_CONCURRENCY}"
            )));
        }
        Ok(())
    }

    /// Load a config from a JSON or XML file, keyed on the extension.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::ConfigFile(format!("{}: {e}", path.display())))?;

        match ext.as_str() {
            "json" => Self::from_json(&content),
            "xml" => Self::from_xml(&content),
            other => Err(ScanError::ConfigFile(format!(
                "unsupported config file format: {other}"
            ))),
        }
    }

    /// Save the config next to the results, format keyed on the extension.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let content = match ext.as_str() {
            "json" => self.to_json()?,
            "xml" => self.to_xml()?,
            other => {
                return Err(ScanError::ConfigFile(format!(
                    "unsupported config file format: {other}"
                )))
            }
        };
        std::fs::write(path, content)
            .map_err(|e| ScanError::ConfigFile(format!("{}: {e}", path.display())))?;
        Ok(())
    }

    pub fn from_json(content: &str) -> crate::Result<Self> {
        let mut config: ScanConfig =
            serde_json::from_str(content).map_err(|e| ScanError::ConfigFile(e.to_string()))?;
        config.normalize_ports();
        Ok(config)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ScanError::ConfigFile(e.to_string()))
    }

    pub fn from_xml(content: &str) -> crate::Result<Self> {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        let mut reader = Reader::from_str(content);
        let mut config = ScanConfig::default();

        loop {
            match reader
                .read_event()
                .map_err(|e| ScanError::ConfigFile(e.to_string()))?
            {
                Event::Start(start) => {
                    let tag = start.name().as_ref().to_vec();
                    let text = reader
                        .read_text(start.name())
                        .map_err(|e| ScanError::ConfigFile(e.to_string()))?;
                    let text = text.trim();
                    match tag.as_slice() {
                        b"target" => config.target = text.to_string(),
                        b"ports" => config.ports = parse_port_spec(text)?,
                        b"timeout" => config.timeout = text.parse()?,
                        b"concurrency" => config.concurrency = text.parse()?,
                        b"service_detection" => config.service_detection = text == "true",
                        b"banner_grabbing" => config.banner_grabbing = text == "true",
                        b"ip_version" => config.ip_version = text.parse()?,
                        b"output_format" => config.output_format = text.to_string(),
                        b"output_file" => config.output_file = Some(text.to_string()),
                        b"verbose" => config.verbose = text == "true",
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        config.normalize_ports();
        Ok(config)
    }

    pub fn to_xml(&self) -> crate::Result<String> {
        use quick_xml::escape::escape;
        use std::fmt::Write;

        let ports = self
            .ports
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<scan_config>\n");
        let _ = writeln!(xml, "  <target>{}</target>", escape(&self.target));
        let _ = writeln!(xml, "  <ports>{ports}</ports>");
        let _ = writeln!(xml, "  <timeout>{}</timeout>", self.timeout);
        let _ = writeln!(xml, "  <concurrency>{}</concurrency>", self.concurrency);
        let _ = writeln!(
            xml,
            "  <service_detection>{}</service_detection>",
            self.service_detection
        );
        let _ = writeln!(
            xml,
            "  <banner_grabbing>{}</banner_grabbing>",
            self.banner_grabbing
        );
        let _ = writeln!(xml, "  <ip_version>{}</ip_version>", self.ip_version);
        let _ = writeln!(
            xml,
            "  <output_format>{}</output_format>",
            escape(&self.output_format)
        );
        if let Some(file) = &self.output_file {
            let _ = writeln!(xml, "  <output_file>{}</output_file>", escape(file));
        }
        let _ = writeln!(xml, "  <verbose>{}</verbose>", self.verbose);
        xml.push_str("</scan_config>\n");
        Ok(xml)
    }
}

/// Parse a port specification into an ascending, duplicate-free list.
///
/// Accepts comma-separated single ports and dash ranges. A reversed range
/// like `3-1` normalizes to `1-3`.
pub fn parse_port_spec(spec: &str) -> crate::Result<Vec<u16>> {
    let mut ports = Vec::new();

    for part in spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((lo, hi)) = part.split_once('-') {
            let lo: u16 = lo.trim().parse()?;
            let hi: u16 = hi.trim().parse()?;
            let (start, end) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            if start == 0 {
                return Err(ScanError::Parse(format!("port out of range: {part}")));
            }
            ports.extend(start..=end);
        } else {
            let port: u16 = part.parse()?;
            if port == 0 {
                return Err(ScanError::Parse(format!("port out of range: {part}")));
            }
            ports.push(port);
        }
    }

    if ports.is_empty() {
        return Err(ScanError::Parse(format!("empty port specification: {spec:?}")));
    }

    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_port() {
        assert_eq!(parse_port_spec("80").unwrap(), vec![80]);
    }

    #[test]
    fn comma_list() {
        assert_eq!(parse_port_spec("80,443").unwrap(), vec![80, 443]);
    }

    #[test]
    fn dash_range() {
        assert_eq!(parse_port_spec("1-3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn reversed_range_normalizes() {
        assert_eq!(parse_port_spec("3-1").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn duplicates_removed_ascending() {
        assert_eq!(parse_port_spec("443,80,443,80-82").unwrap(), vec![80, 81, 82, 443]);
    }

    #[test]
    fn rejects_port_zero_and_garbage() {
        assert!(parse_port_spec("0").is_err());
        assert!(parse_port_spec("0-3").is_err());
        assert!(parse_port_spec("http").is_err());
        assert!(parse_port_spec("70000").is_err());
        assert!(parse_port_spec("").is_err());
    }

    #[test]
    fn validate_bounds() {
        let mut config = ScanConfig::default();
        assert!(config.validate().is_ok());

        config.ports.clear();
        assert!(config.validate().is_err());

        config.ports = vec![80];
        config.timeout = 0;
        assert!(config.validate().is_err());
        config.timeout = MAX_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());

        config.timeout = 1000;
        config.concurrency = 0;
        assert!(config.validate().is_err());
        config.concurrency = MAX_CONCURRENCY + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_round_trip_is_idempotent() {
        let mut config = ScanConfig::new("192.0.2.7")
            .with_ports(vec![443, 80, 22])
            .with_timeout(1500)
            .with_concurrency(64)
            .with_ip_version(IpVersion::Ipv4);
        config.normalize_ports();

        let json = config.to_json().unwrap();
        let reparsed = ScanConfig::from_json(&json).unwrap();
        let json2 = reparsed.to_json().unwrap();

        assert_eq!(json, json2);
        assert_eq!(reparsed.target, "192.0.2.7");
        assert_eq!(reparsed.ports, vec![22, 80, 443]);
        assert_eq!(reparsed.timeout, 1500);
        assert_eq!(reparsed.concurrency, 64);
        assert_eq!(reparsed.ip_version, IpVersion::Ipv4);
    }

    #[test]
    fn xml_round_trip_is_idempotent() {
        let mut config = ScanConfig::new("scanme.example.org").with_ports(vec![8080, 22]);
        config.service_detection = false;
        config.normalize_ports();

        let xml = config.to_xml().unwrap();
        let reparsed = ScanConfig::from_xml(&xml).unwrap();
        assert_eq!(reparsed.target, "scanme.example.org");
        assert_eq!(reparsed.ports, vec![22, 8080]);
        assert!(!reparsed.service_detection);
        assert!(reparsed.banner_grabbing);
        assert_eq!(reparsed.to_xml().unwrap(), xml);
    }

    #[test]
    fn xml_ports_accept_ranges() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<scan_config>
  <target>10.0.0.1</target>
  <ports>1-3,80</ports>
  <timeout>500</timeout>
</scan_config>"#;
        let config = ScanConfig::from_xml(xml).unwrap();
        assert_eq!(config.ports, vec![1, 2, 3, 80]);
        assert_eq!(config.timeout, 500);
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
