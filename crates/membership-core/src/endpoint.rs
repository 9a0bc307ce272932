//! Endpoint: identifies a node in the group.
//!
//! A 32-bit numeric identifier plus a 16-bit port. Displays as `id:port`
//! (e.g. `1:0` for the bootstrap introducer) and converts to/from an IPv4
//! socket address so the UDP transport can route on it.

use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use thiserror::Error;

/// Size of an endpoint on the wire: 4-byte id + 2-byte port.
pub const ENDPOINT_WIRE_SIZE: usize = 6;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Invalid endpoint format: expected `id:port`")]
    InvalidFormat,
    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),
}

/// Identifies a node: numeric id plus port.
///
/// # Examples
/// ```
/// use membership_core::Endpoint;
///
/// let endpoint = Endpoint::new(1, 0);
/// assert_eq!(endpoint.to_string(), "1:0");
///
/// let parsed: Endpoint = "7:8080".parse().unwrap();
/// assert_eq!(parsed.id(), 7);
/// assert_eq!(parsed.port(), 8080);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    id: u32,
    port: u16,
}

impl Endpoint {
    pub const fn new(id: u32, port: u16) -> Self {
        Self { id, port }
    }

    /// The well-known bootstrap introducer (`1:0`).
    pub const fn introducer() -> Self {
        Self::new(1, 0)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The IPv4 socket address this endpoint names.
    pub fn to_socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::from(self.id), self.port)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, port) = s.split_once(':').ok_or(EndpointError::InvalidFormat)?;
        if id.is_empty() || port.is_empty() {
            return Err(EndpointError::InvalidFormat);
        }
        Ok(Self::new(id.parse()?, port.parse()?))
    }
}

impl From<SocketAddrV4> for Endpoint {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(u32::from(*addr.ip()), addr.port())
    }
}

impl From<Endpoint> for SocketAddrV4 {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_socket_addr()
    }
}

// Serialize as `id:port` so audit logs stay readable
impl serde::Serialize for Endpoint {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Endpoint {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
