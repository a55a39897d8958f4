//! Minimal `host:port` parsing for IPv4 dotted-quad addresses.
//!
//! This is deliberately the only address-parsing surface in the crate: no
//! hostname resolution, no IPv6. Mirrors the original's direct use of
//! `net.ParseIP(...).To4()`.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Splits `addr` (`host:port`) and parses the host as a dotted-quad IPv4
/// address and the port as a `u16`.
pub fn parse_ipv4(addr: &str) -> Result<(Ipv4Addr, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| Error::IpFormat(addr.to_string()))?;

    let ip: Ipv4Addr = host
        .parse()
        .map_err(|_| Error::IpFormat(host.to_string()))?;

    let port: u16 = port
        .parse()
        .map_err(|_| Error::IpFormat(addr.to_string()))?;

    Ok((ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_loopback() {
        let (ip, port) = parse_ipv4("127.0.0.1:9090").unwrap();
        assert_eq!(ip, Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(port, 9090);
    }

    #[test]
    fn rejects_malformed_ip() {
        let err = parse_ipv4("not-an-ip:9090").unwrap_err();
        assert!(matches!(err, Error::IpFormat(_)));
    }

    #[test]
    fn rejects_missing_port() {
        let err = parse_ipv4("127.0.0.1").unwrap_err();
        assert!(matches!(err, Error::IpFormat(_)));
    }
}
