//! The connect-scan engine.
//!
//! A single-threaded event loop drives every in-flight attempt: batches of
//! non-blocking connects are registered for write-readiness, classified by
//! their terminal socket state, aged out against per-attempt deadlines, and
//! emitted in completion order. Nothing on the hot path takes a lock.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::network::poller::{Poller, Readiness};
use crate::network::resolver::{resolve, Target};
use crate::network::socket::create_scan_socket;
use crate::network::PortStatus;
use crate::scanner::{ScanReport, ScanResult};
use crate::service::{identify_service, BannerGrabber};
use socket2::Socket;
use std::collections::HashMap;
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

/// Lifecycle of one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Pending,
    Connected,
    Failed,
}

/// One in-flight attempt. The record owns the descriptor exclusively until
/// classification; dropping it closes the socket.
struct ConnRecord {
    socket: Socket,
    port: u16,
    start: Instant,
    state: ConnState,
}

/// Connect-scan engine over a resolved target.
pub struct ScanEngine {
    config: ScanConfig,
    target: Target,
    poller: Poller,
    table: HashMap<usize, ConnRecord>,
    grabber: BannerGrabber,
}

impl ScanEngine {
    /// Validate the config, resolve the target and create the poller.
    /// Each failure here is fatal; no scan is performed.
    pub fn new(mut config: ScanConfig) -> crate::Result<Self> {
        config.normalize_ports();
        config.validate()?;

        let target = resolve(&config.target, config.ip_version)?;
        let poller = Poller::new().map_err(ScanError::Poller)?;

        Ok(Self {
            config,
            target,
            poller,
            table: HashMap::new(),
            grabber: BannerGrabber::default(),
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan every configured port and return the report.
    pub fn scan(&mut self) -> crate::Result<ScanReport> {
        self.scan_with_progress(|_, _| {})
    }

    /// Scan with a progress callback invoked as `(completed, total)` after
    /// each emitted result. The callback runs on the engine thread and must
    /// be cheap.
    pub fn scan_with_progress<F>(&mut self, mut progress: F) -> crate::Result<ScanReport>
    where
        F: FnMut(usize, usize),
    {
        let ports = self.config.ports.clone();
        let total = ports.len();
        let deadline = self.config.timeout_duration();
        let started = Instant::now();

        log::info!(
            "scanning {} ports on {} ({}), timeout {}ms, concurrency {}",
            total,
            self.target.host,
            self.target.addr,
            self.config.timeout,
            self.config.concurrency
        );

        let mut report = ScanReport::new();

        'batches: for batch in ports.chunks(self.config.concurrency) {
            if self.config.cancel.is_cancelled() {
                break 'batches;
            }

            self.open_batch(batch, &mut report, total, &mut progress);

            while !self.table.is_empty() {
                if self.config.cancel.is_cancelled() {
                    self.abort_in_flight();
                    break 'batches;
                }

                let poll_timeout = self.next_poll_timeout(deadline);
                let events = self
                    .poller
                    .wait(Some(poll_timeout))
                    .map_err(ScanError::Poller)?;

                for (token, readiness) in events {
                    self.classify_event(token, readiness, &mut report, total, &mut progress);
                }

                self.sweep_deadlines(deadline, &mut report, total, &mut progress);
            }
        }

        report.stats.duration = started.elapsed();
        log::info!(
            "scan of {} finished: {}/{} ports open in {:.2}s ({:.0} ports/s)",
            self.target.host,
            report.open_count(),
            report.total_count(),
            report.stats.duration.as_secs_f64(),
            report.ports_per_second()
        );

        Ok(report)
    }

    /// Initiate the connects for one batch. Per-port failures degrade to
    /// `Unknown` results; the batch keeps going.
    fn open_batch<F>(&mut self, ports: &[u16], report: &mut ScanReport, total: usize, progress: &mut F)
    where
        F: FnMut(usize, usize),
    {
        for &port in ports {
            if self.config.cancel.is_cancelled() {
                return;
            }
            self.open_connection(port, report, total, progress);
        }
    }

    fn open_connection<F>(&mut self, port: u16, report: &mut ScanReport, total: usize, progress: &mut F)
    where
        F: FnMut(usize, usize),
    {
        let addr = self.target.socket_addr(port);

        let socket = match create_scan_socket(addr, self.config.timeout_duration()) {
            Ok(socket) => socket,
            Err(e) => {
                log::debug!("socket creation for port {port} failed: {e}");
                let result = self.build_result(port, PortStatus::Unknown, Duration::ZERO);
                Self::emit(report, total, progress, result);
                return;
            }
        };

        let fd = socket.as_raw_fd();
        let token = fd as usize;

        if let Err(e) = self.poller.register_writable(fd, token) {
            log::debug!("registration for port {port} failed: {e}");
            let result = self.build_result(port, PortStatus::Unknown, Duration::ZERO);
            Self::emit(report, total, progress, result);
            return;
        }

        let mut record = ConnRecord {
            socket,
            port,
            start: Instant::now(),
            state: ConnState::Pending,
        };

        match record.socket.connect(&addr.into()) {
            Ok(()) => record.state = ConnState::Connected,
            Err(e) if connect_in_progress(&e) => {}
            Err(e) => {
                record.state = ConnState::Failed;
                let status = if e.kind() == io::ErrorKind::ConnectionRefused {
                    PortStatus::Closed
                } else {
                    log::debug!("connect to port {port} failed outright: {e}");
                    PortStatus::Unknown
                };
                let elapsed = record.start.elapsed();
                let _ = self.poller.unregister(fd);
                drop(record);
                let result = self.build_result(port, status, elapsed);
                Self::emit(report, total, progress, result);
                return;
            }
        }

        self.table.insert(token, record);
        if self.table.len() > report.stats.max_in_flight {
            report.stats.max_in_flight = self.table.len();
        }
    }

    /// Classify a readiness event: `SO_ERROR` decides between open and
    /// closed; error or hangup without writability is a refusal.
    fn classify_event<F>(
        &mut self,
        token: usize,
        readiness: Readiness,
        report: &mut ScanReport,
        total: usize,
        progress: &mut F,
    ) where
        F: FnMut(usize, usize),
    {
        let Some(mut record) = self.table.remove(&token) else {
            return;
        };

        let response_time = record.start.elapsed();
        let _ = self.poller.unregister(record.socket.as_raw_fd());

        let status = if readiness.writable {
            match record.socket.take_error() {
                Ok(None) => {
                    record.state = ConnState::Connected;
                    PortStatus::Open
                }
                Ok(Some(_)) | Err(_) => {
                    record.state = ConnState::Failed;
                    PortStatus::Closed
                }
            }
        } else if readiness.error || readiness.hangup {
            record.state = ConnState::Failed;
            PortStatus::Closed
        } else {
            record.state = ConnState::Failed;
            PortStatus::Unknown
        };

        let port = record.port;
        // Close the scan descriptor before the grabber opens its own.
        drop(record);

        let result = self.build_result(port, status, response_time);
        Self::emit(report, total, progress, result);
    }

    /// Age out records whose deadline has passed. A record that reached
    /// `Connected` without a consumed event still counts as open.
    fn sweep_deadlines<F>(
        &mut self,
        deadline: Duration,
        report: &mut ScanReport,
        total: usize,
        progress: &mut F,
    ) where
        F: FnMut(usize, usize),
    {
        let now = Instant::now();
        let expired: Vec<usize> = self
            .table
            .iter()
            .filter(|(_, record)| now.duration_since(record.start) >= deadline)
            .map(|(&token, _)| token)
            .collect();

        for token in expired {
            let Some(record) = self.table.remove(&token) else {
                continue;
            };
            let _ = self.poller.unregister(record.socket.as_raw_fd());

            let status = match record.state {
                ConnState::Connected => PortStatus::Open,
                ConnState::Pending | ConnState::Failed => PortStatus::Filtered,
            };
            let response_time = now.duration_since(record.start);
            let port = record.port;
            drop(record);

            let result = self.build_result(port, status, response_time);
            Self::emit(report, total, progress, result);
        }
    }

    /// Nearest per-attempt deadline, clamped to zero, as the poll timeout.
    fn next_poll_timeout(&self, deadline: Duration) -> Duration {
        let now = Instant::now();
        self.table
            .values()
            .map(|record| (record.start + deadline).saturating_duration_since(now))
            .min()
            .unwrap_or(Duration::ZERO)
    }

    /// Close every in-flight descriptor without emitting results.
    fn abort_in_flight(&mut self) {
        log::info!("cancellation observed, dropping {} in-flight attempts", self.table.len());
        for (_, record) in self.table.drain() {
            let _ = self.poller.unregister(record.socket.as_raw_fd());
        }
    }

    fn build_result(&self, port: u16, status: PortStatus, response_time: Duration) -> ScanResult {
        let mut banner = None;
        let mut service = None;

        if status == PortStatus::Open {
            let grabbed = if self.config.banner_grabbing {
                self.grabber.grab(&self.target.host, self.target.socket_addr(port))
            } else {
                String::new()
            };
            if self.config.service_detection {
                service = Some(identify_service(port, &grabbed));
            }
            if !grabbed.is_empty() {
                banner = Some(grabbed);
            }
        }

        ScanResult {
            port,
            status,
            response_time,
            service,
            banner,
            ip_version: self.target.family(),
        }
    }

    fn emit<F>(report: &mut ScanReport, total: usize, progress: &mut F, result: ScanResult)
    where
        F: FnMut(usize, usize),
    {
        report.add_result(result);
        progress(report.total_count(), total);
    }
}

fn connect_in_progress(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EINPROGRESS) || e.kind() == io::ErrorKind::WouldBlock
}
