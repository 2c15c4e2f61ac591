//! Banner grabbing over a fresh blocking connection.
//!
//! The scan engine classifies a port on its non-blocking descriptor and
//! hands only `(host, addr)` here; the grabber opens its own socket so that
//! protocol I/O failures stay isolated from classification.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_millis(2000);

const HTTP_READ_LIMIT: usize = 4096;
const PASSIVE_READ_LIMIT: usize = 1024;

/// Grabs the first bytes a service emits, optionally after a probe.
#[derive(Debug, Clone)]
pub struct BannerGrabber {
    timeout: Duration,
}

impl Default for BannerGrabber {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_BANNER_TIMEOUT,
        }
    }
}

impl BannerGrabber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Grab a banner from `addr`. Any failure yields an empty banner; the
    /// port status computed by the engine is never affected from here.
    pub fn grab(&self, host: &str, addr: SocketAddr) -> String {
        let grabbed = match addr.port() {
            80 | 8080 => self.grab_http(host, addr),
            _ => self.grab_passive(addr),
        };

        match grabbed {
            Ok(banner) => banner,
            Err(e) => {
                log::debug!("banner grab for {addr} failed: {e}");
                String::new()
            }
        }
    }

    fn connect(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        Ok(stream)
    }

    /// Probe with a fixed HTTP request and read the reply.
    fn grab_http(&self, host: &str, addr: SocketAddr) -> std::io::Result<String> {
        let mut stream = self.connect(addr)?;
        let request = format!("GET / HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes())?;

        let mut buf = vec![0u8; HTTP_READ_LIMIT];
        let n = stream.read(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// Read whatever a greeting-first service volunteers, sending nothing.
    fn grab_passive(&self, addr: SocketAddr) -> std::io::Result<String> {
        let mut stream = self.connect(addr)?;
        let mut buf = vec![0u8; PASSIVE_READ_LIMIT];
        let n = stream.read(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }
}
