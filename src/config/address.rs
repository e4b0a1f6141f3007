use std::net::{IpAddr, SocketAddr};

use tokio::net::lookup_host;

use super::ConfigError;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_PORT: u16 = 7198;

// -----------------------------------------------------------------------------
// ----- Bind address ----------------------------------------------------------

/// Resolves `host[:port]` to the socket the gateway listens on.
///
/// Accepts IP literals (`0.0.0.0:7198`, `[::1]:7198`, `::1`), bare hosts
/// (default port 7198) and hostnames, which resolve to their first address.
pub async fn resolve_bind_address(raw: &str) -> Result<SocketAddr, ConfigError> {
    let (host, port) = split_host_port(raw)?;

    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let mut addrs = lookup_host((host, port))
        .await
        .map_err(|e| ConfigError::ResolveBindAddress {
            addr: raw.to_string(),
            source: e,
        })?;

    addrs.next().ok_or_else(|| ConfigError::InvalidBindAddress {
        addr: raw.to_string(),
        reason: "host resolved to no addresses",
    })
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn split_host_port(raw: &str) -> Result<(&str, u16), ConfigError> {
    let invalid = |reason| ConfigError::InvalidBindAddress {
        addr: raw.to_string(),
        reason,
    };

    let raw_trimmed = raw.trim();
    if raw_trimmed.is_empty() {
        return Err(invalid("address is empty"));
    }

    // Bracketed IPv6, with or without a port.
    if let Some(rest) = raw_trimmed.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("unclosed '['"))?;
        let port = match tail {
            "" => DEFAULT_PORT,
            _ => {
                let port = tail.strip_prefix(':').ok_or_else(|| invalid("junk after ']'"))?;
                parse_port(port).ok_or_else(|| invalid("port is not a number in 0..=65535"))?
            }
        };
        return Ok((host, port));
    }

    // Unbracketed IPv6 literal without a port.
    if raw_trimmed.parse::<std::net::Ipv6Addr>().is_ok() {
        return Ok((raw_trimmed, DEFAULT_PORT));
    }

    match raw_trimmed.rsplit_once(':') {
        None => Ok((raw_trimmed, DEFAULT_PORT)),
        Some(("", _)) => Err(invalid("host is empty")),
        Some((host, port)) => {
            if host.contains(':') {
                return Err(invalid("IPv6 addresses with a port must be bracketed"));
            }
            let port = parse_port(port).ok_or_else(|| invalid("port is not a number in 0..=65535"))?;
            Ok((host, port))
        }
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.parse::<u16>().ok()
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
