//! Service detection: banner grabbing plus banner-driven identification.

pub mod banner;
pub mod patterns;

pub use banner::BannerGrabber;
pub use patterns::match_patterns;

use serde::{Deserialize, Serialize};

/// What the matcher believes is listening on a port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub extra_info: Option<String>,
    /// Trust in the identification, in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl ServiceInfo {
    pub fn named(name: &str, confidence: f32) -> Self {
        Self {
            name: name.to_string(),
            confidence,
            ..Default::default()
        }
    }
}

/// Identify the service behind `(port, banner)`.
///
/// Pattern matching runs first; for the protocols with a dedicated analyzer
/// the analyzer result replaces it only when strictly more confident.
/// Pure function: same input, same output.
pub fn identify_service(port: u16, banner: &str) -> ServiceInfo {
    let mut info = match_patterns(port, banner);

    let analyzed = match port {
        80 | 8080 | 443 => Some(patterns::analyze_http(banner)),
        22 => Some(patterns::analyze_ssh(banner)),
        21 => Some(patterns::analyze_ftp(banner)),
        _ => None,
    };

    if let Some(analyzed) = analyzed {
        if analyzed.confidence > info.confidence {
            info = analyzed;
        }
    }

    info
}
