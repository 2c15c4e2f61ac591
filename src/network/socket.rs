//! Socket factory for connect-scan attempts.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Create a non-blocking TCP socket in the family of `addr`, configured for
/// a scan attempt: `SO_REUSEADDR`, `TCP_NODELAY`, and send/recv timeouts as
/// a backstop for any later blocking I/O on the descriptor.
///
/// A failure here is transient; the engine records the port as `Unknown`
/// and moves on.
pub fn create_scan_socket(addr: SocketAddr, timeout: Duration) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_options_applied() {
        let addr: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let socket = create_scan_socket(addr, Duration::from_millis(500)).unwrap();

        assert!(socket.reuse_address().unwrap());
        assert!(socket.nodelay().unwrap());
        assert_eq!(
            socket.read_timeout().unwrap(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            socket.write_timeout().unwrap(),
            Some(Duration::from_millis(500))
        );
    }

    #[test]
    fn ipv6_family_selected() {
        let addr: SocketAddr = "[::1]:80".parse().unwrap();
        // Creation alone proves the AF_INET6 domain was accepted.
        assert!(create_scan_socket(addr, Duration::from_millis(100)).is_ok());
    }
}
