//! Network endpoints.
//!
//! An [`Endpoint`] names either the local address a fallback listener binds
//! to or the remote address a session dials. Addresses are IP literals only;
//! host names are not resolved.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
};

use crate::error::EndpointError;

/// Port used when none is given.
pub const DEFAULT_PORT: u16 = 10000;

/// An IP address and port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: IpAddr,
    port: u16,
}

impl Endpoint {
    /// Create an endpoint from an address and port.
    pub const fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    /// Loopback endpoint on [`DEFAULT_PORT`].
    pub const fn loopback() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT)
    }

    /// Parse an address literal and pair it with `port`.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// - `EndpointError::InvalidAddress` if `address` is not an IPv4 or IPv6
    ///   literal
    pub fn parse_address(address: &str, port: u16) -> Result<Self, EndpointError> {
        let trimmed = address.trim();
        let address = trimmed
            .parse::<IpAddr>()
            .map_err(|_| EndpointError::InvalidAddress(trimmed.to_string()))?;

        Ok(Self::new(address, port))
    }

    /// IP address.
    pub const fn address(&self) -> IpAddr {
        self.address
    }

    /// TCP port.
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Same address, different port.
    #[must_use]
    pub const fn with_port(self, port: u16) -> Self {
        Self { port, ..self }
    }

    /// Socket address for binding or connecting.
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::loopback()
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.socket_addr()
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    /// Parse `address:port` (IPv6 as `[address]:port`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(addr) = trimmed.parse::<SocketAddr>() {
            return Ok(addr.into());
        }

        let Some((address, port)) = trimmed.rsplit_once(':') else {
            return Err(EndpointError::MissingPort(trimmed.to_string()));
        };

        let port =
            port.parse::<u16>().map_err(|_| EndpointError::InvalidPort(port.to_string()))?;

        Self::parse_address(address.trim_start_matches('[').trim_end_matches(']'), port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}
