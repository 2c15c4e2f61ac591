//! Scan results and the result sink.

pub mod engine;

pub use engine::ScanEngine;

use crate::config::IpVersion;
use crate::network::PortStatus;
use crate::service::ServiceInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome for a single port. Immutable once emitted into the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub port: u16,
    pub status: PortStatus,
    pub response_time: Duration,
    pub service: Option<ServiceInfo>,
    pub banner: Option<String>,
    pub ip_version: IpVersion,
}

/// Engine-side counters for one scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub duration: Duration,
    /// High-water mark of the connection table, bounded by `concurrency`.
    pub max_in_flight: usize,
}

/// Append-only collection of results, in arrival order.
///
/// The engine is single-threaded on the hot path, so the sink carries no
/// synchronization.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScanReport {
    results: Vec<ScanResult>,
    pub stats: ScanStats,
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: ScanResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    pub fn open_count(&self) -> usize {
        self.count_status(PortStatus::Open)
    }

    pub fn closed_count(&self) -> usize {
        self.count_status(PortStatus::Closed)
    }

    pub fn filtered_count(&self) -> usize {
        self.count_status(PortStatus::Filtered)
    }

    pub fn unknown_count(&self) -> usize {
        self.count_status(PortStatus::Unknown)
    }

    pub fn open_ports(&self) -> Vec<&ScanResult> {
        self.results
            .iter()
            .filter(|r| r.status == PortStatus::Open)
            .collect()
    }

    /// Reorder by port number for presentation. Arrival order is lost.
    pub fn sort_by_port(&mut self) {
        self.results.sort_by_key(|r| r.port);
    }

    pub fn ports_per_second(&self) -> f64 {
        let secs = self.stats.duration.as_secs_f64();
        if secs > 0.0 {
            self.results.len() as f64 / secs
        } else {
            0.0
        }
    }

    fn count_status(&self, status: PortStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(port: u16, status: PortStatus) -> ScanResult {
        ScanResult {
            port,
            status,
            response_time: Duration::from_millis(5),
            service: None,
            banner: None,
            ip_version: IpVersion::Ipv4,
        }
    }

    #[test]
    fn counts_by_status() {
        let mut report = ScanReport::new();
        report.add_result(result(22, PortStatus::Open));
        report.add_result(result(23, PortStatus::Closed));
        report.add_result(result(24, PortStatus::Filtered));
        report.add_result(result(25, PortStatus::Open));
        report.add_result(result(26, PortStatus::Unknown));

        assert_eq!(report.total_count(), 5);
        assert_eq!(report.open_count(), 2);
        assert_eq!(report.closed_count(), 1);
        assert_eq!(report.filtered_count(), 1);
        assert_eq!(report.unknown_count(), 1);
    }

    #[test]
    fn open_ports_filter() {
        let mut report = ScanReport::new();
        report.add_result(result(443, PortStatus::Open));
        report.add_result(result(80, PortStatus::Closed));

        let open: Vec<u16> = report.open_ports().iter().map(|r| r.port).collect();
        assert_eq!(open, vec![443]);
    }

    #[test]
    fn sort_by_port_reorders() {
        let mut report = ScanReport::new();
        report.add_result(result(443, PortStatus::Closed));
        report.add_result(result(22, PortStatus::Open));
        report.add_result(result(80, PortStatus::Closed));

        report.sort_by_port();
        let ports: Vec<u16> = report.results().iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![22, 80, 443]);
    }
}
