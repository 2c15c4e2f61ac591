//! Banner pattern tables and per-protocol analyzers.

use super::ServiceInfo;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// How a matched pattern derives extra fields from the banner.
#[derive(Debug)]
pub enum ExtractionRule {
    None,
    /// Capture group 1 becomes `version`.
    Version(Regex),
    /// Capture group 1 becomes `product`.
    Product(Regex),
}

/// One recognizable banner shape for a port.
#[derive(Debug)]
pub struct ServicePattern {
    /// Literal substring that must occur in the banner. The empty prefix
    /// matches any banner, including an empty one.
    pub prefix: &'static str,
    pub service: &'static str,
    pub rule: ExtractionRule,
    pub confidence: f32,
}

fn version_rule(re: &str) -> ExtractionRule {
    ExtractionRule::Version(Regex::new(re).expect("builtin pattern regex"))
}

fn product_rule(re: &str) -> ExtractionRule {
    ExtractionRule::Product(Regex::new(re).expect("builtin pattern regex"))
}

/// Built-in pattern table, ordered per port, first match wins.
static PATTERNS: Lazy<HashMap<u16, Vec<ServicePattern>>> = Lazy::new(|| {
    let mut table: HashMap<u16, Vec<ServicePattern>> = HashMap::new();
    let mut add = |port: u16, pattern: ServicePattern| {
        table.entry(port).or_default().push(pattern);
    };

    add(21, ServicePattern {
        prefix: "220",
        service: "ftp",
        rule: product_rule(r"220[ -]([^\r\n]+)"),
        confidence: 0.8,
    });
    add(22, ServicePattern {
        prefix: "SSH-",
        service: "ssh",
        rule: version_rule(r"SSH-([0-9.]+)"),
        confidence: 0.9,
    });
    add(25, ServicePattern {
        prefix: "220",
        service: "smtp",
        rule: product_rule(r"220\s+(\S+)"),
        confidence: 0.8,
    });
    add(53, ServicePattern {
        prefix: "",
        service: "dns",
        rule: ExtractionRule::None,
        confidence: 0.7,
    });
    add(80, ServicePattern {
        prefix: "HTTP/",
        service: "http",
        rule: product_rule(r"Server:\s*([^\r\n]+)"),
        confidence: 0.9,
    });
    add(110, ServicePattern {
        prefix: "+OK",
        service: "pop3",
        rule: product_rule(r"\+OK\s+([^\r\n]+)"),
        confidence: 0.8,
    });
    add(143, ServicePattern {
        prefix: "* OK",
        service: "imap",
        rule: product_rule(r"\*\s+OK\s+([^\r\n]+)"),
        confidence: 0.8,
    });
    add(443, ServicePattern {
        prefix: "HTTP/",
        service: "https",
        rule: product_rule(r"Server:\s*([^\r\n]+)"),
        confidence: 0.9,
    });
    add(3306, ServicePattern {
        prefix: "",
        service: "mysql",
        rule: version_rule(r"([0-9]+\.[0-9]+\.[0-9]+)"),
        confidence: 0.7,
    });
    add(5432, ServicePattern {
        prefix: "",
        service: "postgresql",
        rule: ExtractionRule::None,
        confidence: 0.7,
    });
    add(6379, ServicePattern {
        prefix: "",
        service: "redis",
        rule: ExtractionRule::None,
        confidence: 0.7,
    });
    add(27017, ServicePattern {
        prefix: "",
        service: "mongodb",
        rule: ExtractionRule::None,
        confidence: 0.7,
    });

    table
});

/// Well-known TCP service names, the fallback when no pattern fires.
static WELL_KNOWN: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (21, "ftp"),
        (22, "ssh"),
        (23, "telnet"),
        (25, "smtp"),
        (53, "domain"),
        (80, "http"),
        (110, "pop3"),
        (111, "rpcbind"),
        (135, "msrpc"),
        (139, "netbios-ssn"),
        (143, "imap"),
        (443, "https"),
        (445, "microsoft-ds"),
        (993, "imaps"),
        (995, "pop3s"),
        (1433, "mssql"),
        (1723, "pptp"),
        (3306, "mysql"),
        (3389, "rdp"),
        (5432, "postgresql"),
        (5900, "vnc"),
        (5984, "couchdb"),
        (6379, "redis"),
        (8080, "http-proxy"),
        (8443, "https-alt"),
        (27017, "mongodb"),
    ])
});

pub fn well_known_name(port: u16) -> &'static str {
    WELL_KNOWN.get(&port).copied().unwrap_or("unknown")
}

/// Match `banner` against the ordered pattern list for `port`.
///
/// First hit wins; a miss falls back to the well-known name at 0.5.
pub fn match_patterns(port: u16, banner: &str) -> ServiceInfo {
    if let Some(list) = PATTERNS.get(&port) {
        for pattern in list {
            if banner.contains(pattern.prefix) {
                let mut info = ServiceInfo::named(pattern.service, pattern.confidence);
                match &pattern.rule {
                    ExtractionRule::Version(re) => {
                        if let Some(caps) = re.captures(banner) {
                            info.version = Some(caps[1].to_string());
                        }
                    }
                    ExtractionRule::Product(re) => {
                        if let Some(caps) = re.captures(banner) {
                            info.product = Some(caps[1].to_string());
                        }
                    }
                    ExtractionRule::None => {}
                }
                return info;
            }
        }
    }

    ServiceInfo::named(well_known_name(port), 0.5)
}

fn line_end(s: &str) -> usize {
    s.find(|c: char| c == '\r' || c == '\n').unwrap_or(s.len())
}

/// HTTP analyzer: base confidence 0.8, raised to 0.9 when a `Server:`
/// header yields a product.
pub fn analyze_http(banner: &str) -> ServiceInfo {
    let mut info = ServiceInfo::named("http", 0.8);

    if let Some(pos) = banner.find("Server:") {
        let value = banner[pos + "Server:".len()..].trim_start_matches(' ');
        let value = &value[..line_end(value)];
        if !value.is_empty() {
            info.product = Some(value.to_string());
            info.confidence = 0.9;
        }
    }

    info
}

/// SSH analyzer: parses the `SSH-<version>-<product>` identification line.
pub fn analyze_ssh(banner: &str) -> ServiceInfo {
    let mut info = ServiceInfo::named("ssh", 0.9);

    if let Some(pos) = banner.find("SSH-") {
        let after = &banner[pos + "SSH-".len()..];
        if let Some(dash) = after.find('-') {
            let product = &after[dash + 1..];
            let end = product
                .find(|c: char| c == ' ' || c == '\r' || c == '\n')
                .unwrap_or(product.len());
            info.version = Some(after[..dash].to_string());
            info.product = Some(product[..end].to_string());
            info.confidence = 0.95;
        }
    }

    info
}

/// FTP analyzer: a leading `220 ` greeting carries the product string.
pub fn analyze_ftp(banner: &str) -> ServiceInfo {
    let mut info = ServiceInfo::named("ftp", 0.8);

    if let Some(rest) = banner.strip_prefix("220 ") {
        let product = &rest[..line_end(rest)];
        if !product.is_empty() {
            info.product = Some(product.to_string());
            info.confidence = 0.85;
        }
    }

    info
}
