//! Target resolution: IP literals first, then DNS.

use crate::config::IpVersion;
use crate::error::ScanError;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

/// A resolved scan target: one address plus the family the engine will use
/// for its sockets.
#[derive(Debug, Clone)]
pub struct Target {
    /// Original host string as given, kept for the HTTP Host header.
    pub host: String,
    pub addr: IpAddr,
}

impl Target {
    pub fn family(&self) -> IpVersion {
        super::family_of(self.addr)
    }

    pub fn socket_addr(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.addr, port)
    }
}

/// Resolve a hostname or IP literal into a [`Target`].
///
/// A string that parses as an IP literal is used as-is, provided its family
/// matches the requested one. Otherwise the name is resolved and the first
/// address of the requested family wins; `Auto` prefers IPv4.
pub fn resolve(host: &str, version: IpVersion) -> crate::Result<Target> {
    if host.is_empty() {
        return Err(ScanError::InvalidTarget("target cannot be empty".into()));
    }

    if let Ok(addr) = host.parse::<IpAddr>() {
        if !family_matches(addr, version) {
            return Err(ScanError::Resolve {
                host: host.to_string(),
                reason: format!("address family does not match requested {version}"),
            });
        }
        return Ok(Target {
            host: host.to_string(),
            addr,
        });
    }

    // Port 0 satisfies ToSocketAddrs; only the addresses matter.
    let addrs: Vec<IpAddr> = (host, 0u16)
        .to_socket_addrs()
        .map_err(|e| ScanError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .map(|sa| sa.ip())
        .collect();

    let chosen = match version {
        IpVersion::Ipv4 => addrs.iter().find(|a| a.is_ipv4()),
        IpVersion::Ipv6 => addrs.iter().find(|a| a.is_ipv6()),
        IpVersion::Auto => addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first()),
    };

    match chosen {
        Some(&addr) => {
            log::debug!("resolved {host} to {addr}");
            Ok(Target {
                host: host.to_string(),
                addr,
            })
        }
        None => Err(ScanError::Resolve {
            host: host.to_string(),
            reason: format!("no address of family {version} found"),
        }),
    }
}

fn family_matches(addr: IpAddr, version: IpVersion) -> bool {
    match version {
        IpVersion::Ipv4 => addr.is_ipv4(),
        IpVersion::Ipv6 => addr.is_ipv6(),
        IpVersion::Auto => true,
    }
}
