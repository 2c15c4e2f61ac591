//! Result formatting and the terminal progress display.

use crate::error::ScanError;
use crate::network::PortStatus;
use crate::scanner::{ScanReport, ScanResult};
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};

/// Supported result formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Xml,
}

impl std::str::FromStr for OutputFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(ScanError::Output(format!("unknown output format: {other}"))),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub colored: bool,
    pub show_closed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            show_closed: false,
        }
    }
}

/// Writes a finished report to stdout or a file.
pub struct OutputManager {
    config: OutputConfig,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    target: &'a str,
    duration_secs: f64,
    total_ports: usize,
    open_ports: usize,
    closed_ports: usize,
    filtered_ports: usize,
    ports: Vec<JsonPortEntry<'a>>,
}

#[derive(Serialize)]
struct JsonPortEntry<'a> {
    port: u16,
    status: String,
    response_time_ms: u64,
    ip_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    service: Option<&'a crate::service::ServiceInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    banner: Option<&'a str>,
}

impl<'a> From<&'a ScanResult> for JsonPortEntry<'a> {
    fn from(result: &'a ScanResult) -> Self {
        Self {
            port: result.port,
            status: result.status.to_string(),
            response_time_ms: result.response_time.as_millis() as u64,
            ip_version: result.ip_version.to_string(),
            service: result.service.as_ref(),
            banner: result.banner.as_deref(),
        }
    }
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Render the report and write it to the configured destination.
    pub fn write_report(&self, report: &ScanReport, target: &str) -> crate::Result<()> {
        let rendered = match self.config.format {
            OutputFormat::Text => self.format_text(report, target),
            OutputFormat::Json => self.format_json(report, target)?,
            OutputFormat::Xml => self.format_xml(report, target)?,
        };

        match &self.config.file {
            Some(path) => {
                let mut file =
                    File::create(path).map_err(|e| ScanError::Output(format!("{path}: {e}")))?;
                file.write_all(rendered.as_bytes())
                    .map_err(|e| ScanError::Output(format!("{path}: {e}")))?;
                log::info!("results written to {path}");
            }
            None => print!("{rendered}"),
        }

        Ok(())
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if !self.config.colored {
            return text.to_string();
        }
        match color {
            "green" => text.green().to_string(),
            "red" => text.red().to_string(),
            "yellow" => text.yellow().to_string(),
            "bold" => text.bold().to_string(),
            _ => text.to_string(),
        }
    }

    fn format_text(&self, report: &ScanReport, target: &str) -> String {
        let mut sorted: Vec<&ScanResult> = report.results().iter().collect();
        sorted.sort_by_key(|r| r.port);

        let mut out = String::new();
        out.push_str(&self.paint(&format!("Scan report for {target}\n"), "bold"));
        out.push('\n');

        let shown: Vec<&&ScanResult> = sorted
            .iter()
            .filter(|r| self.config.show_closed || r.status == PortStatus::Open)
            .collect();

        if !shown.is_empty() {
            out.push_str(&format!(
                "{:<10} {:<10} {:<16} {:<24} {}\n",
                "PORT", "STATE", "SERVICE", "VERSION", "RESPONSE"
            ));
            for result in shown {
                let service = result
                    .service
                    .as_ref()
                    .map(|s| s.name.as_str())
                    .unwrap_or("unknown");
                let version = result
                    .service
                    .as_ref()
                    .map(|s| {
                        let product = s.product.as_deref().unwrap_or("");
                        let version = s.version.as_deref().unwrap_or("");
                        format!("{product} {version}").trim().to_string()
                    })
                    .unwrap_or_default();
                let line = format!(
                    "{:<10} {:<10} {:<16} {:<24} {}ms\n",
                    format!("{}/tcp", result.port),
                    result.status.to_string(),
                    service,
                    version,
                    result.response_time.as_millis()
                );
                let color = match result.status {
                    PortStatus::Open => "green",
                    PortStatus::Closed => "red",
                    _ => "yellow",
                };
                out.push_str(&self.paint(&line, color));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "{} ports scanned: {} open, {} closed, {} filtered, {} unknown in {:.2}s\n",
            report.total_count(),
            report.open_count(),
            report.closed_count(),
            report.filtered_count(),
            report.unknown_count(),
            report.stats.duration.as_secs_f64(),
        ));

        out
    }

    fn format_json(&self, report: &ScanReport, target: &str) -> crate::Result<String> {
        let mut ports: Vec<JsonPortEntry> = report.results().iter().map(Into::into).collect();
        ports.sort_by_key(|p| p.port);

        let doc = JsonReport {
            target,
            duration_secs: report.stats.duration.as_secs_f64(),
            total_ports: report.total_count(),
            open_ports: report.open_count(),
            closed_ports: report.closed_count(),
            filtered_ports: report.filtered_count(),
            ports,
        };

        serde_json::to_string_pretty(&doc)
            .map(|s| s + "\n")
            .map_err(|e| ScanError::Output(e.to_string()))
    }

    fn format_xml(&self, report: &ScanReport, target: &str) -> crate::Result<String> {
        use quick_xml::escape::escape;
        use std::fmt::Write as _;

        let mut sorted: Vec<&ScanResult> = report.results().iter().collect();
        sorted.sort_by_key(|r| r.port);

        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<scan_results target=\"{}\">", escape(target));
        xml.push_str("  <summary>\n");
        let _ = writeln!(
            xml,
            "    <total_ports>{}</total_ports>",
            report.total_count()
        );
        let _ = writeln!(xml, "    <open_ports>{}</open_ports>", report.open_count());
        let _ = writeln!(
            xml,
            "    <closed_ports>{}</closed_ports>",
            report.closed_count()
        );
        let _ = writeln!(
            xml,
            "    <filtered_ports>{}</filtered_ports>",
            report.filtered_count()
        );
        xml.push_str("  </summary>\n");
        xml.push_str("  <ports>\n");
        for result in &sorted {
            let service = result
                .service
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or_default();
            let _ = writeln!(
                xml,
                "    <port number=\"{}\" status=\"{}\" service=\"{}\" response_time_ms=\"{}\"/>",
                result.port,
                result.status,
                escape(service),
                result.response_time.as_millis()
            );
        }
        xml.push_str("  </ports>\n");
        xml.push_str("</scan_results>\n");
        Ok(xml)
    }
}

/// Carriage-return progress bar fed by the engine's progress callback.
///
/// Redraws are throttled so the callback stays cheap on the engine thread.
pub struct ProgressDisplay {
    total: usize,
    completed: usize,
    start: std::time::Instant,
    last_draw: std::time::Instant,
}

impl ProgressDisplay {
    pub fn new(total: usize) -> Self {
        let now = std::time::Instant::now();
        Self {
            total,
            completed: 0,
            start: now,
            last_draw: now,
        }
    }

    pub fn update(&mut self, completed: usize) {
        self.completed = completed;
        if self.last_draw.elapsed().as_millis() >= 100 || completed == self.total {
            self.draw();
            self.last_draw = std::time::Instant::now();
        }
    }

    fn draw(&self) {
        let percent = if self.total > 0 {
            self.completed as f64 / self.total as f64 * 100.0
        } else {
            100.0
        };
        let rate = self.completed as f64 / self.start.elapsed().as_secs_f64().max(0.001);

        let width = 40;
        let filled = (percent / 100.0 * width as f64) as usize;
        let bar = "#".repeat(filled) + &"-".repeat(width - filled);

        print!(
            "\r[{bar}] {percent:.1}% ({}/{}) {rate:.0} ports/s",
            self.completed, self.total
        );
        let _ = io::stdout().flush();
    }

    pub fn finish(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IpVersion;
    use crate::service::ServiceInfo;
    use std::time::Duration;

    fn sample_report() -> ScanReport {
        let mut report = ScanReport::new();
        report.add_result(ScanResult {
            port: 22,
            status: PortStatus::Open,
            response_time: Duration::from_millis(3),
            service: Some(ServiceInfo {
                name: "ssh".into(),
                product: Some("OpenSSH_8.9p1".into()),
                version: Some("2.0".into()),
                extra_info: None,
                confidence: 0.95,
            }),
            banner: Some("SSH-2.0-OpenSSH_8.9p1\r\n".into()),
            ip_version: IpVersion::Ipv4,
        });
        report.add_result(ScanResult {
            port: 81,
            status: PortStatus::Closed,
            response_time: Duration::from_millis(1),
            service: None,
            banner: None,
            ip_version: IpVersion::Ipv4,
        });
        report.stats.duration = Duration::from_millis(40);
        report
    }

    #[test]
    fn format_parsing() {
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("xml".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn text_output_lists_open_ports_and_summary() {
        let manager = OutputManager::new(OutputConfig {
            colored: false,
            ..Default::default()
        });
        let text = manager.format_text(&sample_report(), "127.0.0.1");
        assert!(text.contains("22/tcp"));
        assert!(text.contains("ssh"));
        assert!(!text.contains("81/tcp"));
        assert!(text.contains("2 ports scanned: 1 open, 1 closed, 0 filtered, 0 unknown"));
    }

    #[test]
    fn text_output_can_show_closed() {
        let manager = OutputManager::new(OutputConfig {
            colored: false,
            show_closed: true,
            ..Default::default()
        });
        let text = manager.format_text(&sample_report(), "127.0.0.1");
        assert!(text.contains("81/tcp"));
    }

    #[test]
    fn json_output_is_valid() {
        let manager = OutputManager::new(OutputConfig::default());
        let json = manager.format_json(&sample_report(), "127.0.0.1").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["target"], "127.0.0.1");
        assert_eq!(value["total_ports"], 2);
        assert_eq!(value["open_ports"], 1);
        assert_eq!(value["ports"][0]["port"], 22);
        assert_eq!(value["ports"][0]["service"]["name"], "ssh");
        assert_eq!(value["ports"][1]["status"], "closed");
    }

    #[test]
    fn xml_output_has_summary_and_ports() {
        let manager = OutputManager::new(OutputConfig::default());
        let xml = manager.format_xml(&sample_report(), "127.0.0.1").unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<scan_results target=\"127.0.0.1\">"));
        assert!(xml.contains("<open_ports>1</open_ports>"));
        assert!(xml.contains("number=\"22\""));
        assert!(xml.contains("status=\"open\""));
        assert!(xml.contains("service=\"ssh\""));
    }
}
