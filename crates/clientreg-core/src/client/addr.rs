//! Network identifiers used to recognize clients
//!
//! - [`ClientIp`]: an IP address with an optional IPv6 zone
//! - [`IpSubnet`]: a network prefix in CIDR notation
//! - [`MacAddr`]: a hardware address

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::Error;

/// An IP address that may carry an IPv6 zone (scope) index
///
/// Two addresses that differ only by zone are distinct values, so both can be
/// claimed by different persistent clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientIp {
    addr: IpAddr,
    zone: Option<Box<str>>,
}

impl ClientIp {
    /// Address without a zone
    pub fn new(addr: IpAddr) -> Self {
        Self { addr, zone: None }
    }

    /// IPv6 address with a zone. An empty zone is treated as no zone.
    pub fn with_zone(addr: Ipv6Addr, zone: impl Into<String>) -> Self {
        let zone: String = zone.into();
        Self {
            addr: IpAddr::V6(addr),
            zone: (!zone.is_empty()).then(|| zone.into_boxed_str()),
        }
    }

    /// The address part
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// The zone, if any
    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// The same address with the zone stripped
    pub fn without_zone(&self) -> IpAddr {
        self.addr
    }
}

impl From<IpAddr> for ClientIp {
    fn from(addr: IpAddr) -> Self {
        Self::new(addr)
    }
}

impl From<Ipv4Addr> for ClientIp {
    fn from(addr: Ipv4Addr) -> Self {
        Self::new(IpAddr::V4(addr))
    }
}

impl FromStr for ClientIp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('%') {
            Some((addr, zone)) => {
                if zone.is_empty() {
                    return Err(Error::parse(format!("empty zone in {s:?}")));
                }
                let addr: Ipv6Addr = addr
                    .parse()
                    .map_err(|_| Error::parse(format!("bad zoned IPv6 address {s:?}")))?;
                Ok(Self::with_zone(addr, zone))
            }
            None => s
                .parse::<IpAddr>()
                .map(Self::new)
                .map_err(|_| Error::parse(format!("bad IP address {s:?}"))),
        }
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.zone {
            Some(zone) => write!(f, "{}%{}", self.addr, zone),
            None => write!(f, "{}", self.addr),
        }
    }
}

/// A network prefix such as `10.0.0.0/24`
///
/// Host bits are cleared on construction, so `10.0.0.7/24` and `10.0.0.0/24`
/// are the same subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpSubnet {
    network: IpAddr,
    prefix_len: u8,
}

impl IpSubnet {
    /// Create a subnet, masking host bits
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, Error> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(Error::parse(format!(
                "prefix length {prefix_len} out of range for {addr}"
            )));
        }

        Ok(Self {
            network: mask(addr, prefix_len),
            prefix_len,
        })
    }

    /// The network address
    pub fn network(&self) -> IpAddr {
        self.network
    }

    /// Number of leading bits in the prefix
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether `ip` lies within this subnet. Addresses of the other family
    /// never match.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(ip, self.prefix_len) == self.network
            }
            _ => false,
        }
    }
}

fn mask(addr: IpAddr, prefix_len: u8) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let masked = match prefix_len {
                0 => 0,
                n => bits & (u32::MAX << (32 - u32::from(n))),
            };
            IpAddr::V4(Ipv4Addr::from(masked))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let masked = match prefix_len {
                0 => 0,
                n => bits & (u128::MAX << (128 - u32::from(n))),
            };
            IpAddr::V6(Ipv6Addr::from(masked))
        }
    }
}

impl FromStr for IpSubnet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| Error::parse(format!("missing prefix length in {s:?}")))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| Error::parse(format!("bad subnet address {s:?}")))?;
        let bad_len = || Error::parse(format!("bad prefix length in {s:?}"));
        if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad_len());
        }
        let len: u8 = len.parse().map_err(|_| bad_len())?;

        Self::new(addr, len)
    }
}

impl fmt::Display for IpSubnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// A hardware address: EUI-48, EUI-64 or a 20-byte InfiniBand address
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(Box<[u8]>);

impl MacAddr {
    /// Build from raw bytes. Only 6, 8 and 20 byte addresses are accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.len() {
            6 | 8 | 20 => Ok(Self(bytes.into())),
            n => Err(Error::parse(format!("bad hardware address length {n}"))),
        }
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` and `aabb.ccdd.eeff`
    /// forms (and their 8 and 20 byte equivalents).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || Error::parse(format!("bad hardware address {s:?}"));

        let groups: Vec<&str>;
        let group_len;
        if s.contains(':') {
            groups = s.split(':').collect();
            group_len = 2;
        } else if s.contains('-') {
            groups = s.split('-').collect();
            group_len = 2;
        } else if s.contains('.') {
            groups = s.split('.').collect();
            group_len = 4;
        } else {
            return Err(bad());
        }

        let mut bytes = Vec::with_capacity(groups.len() * group_len / 2);
        for group in groups {
            // from_str_radix alone lets a leading '+' through
            if group.len() != group_len || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(bad());
            }
            for pair in group.as_bytes().chunks(2) {
                let pair = std::str::from_utf8(pair).map_err(|_| bad())?;
                bytes.push(u8::from_str_radix(pair, 16).map_err(|_| bad())?);
            }
        }

        Self::from_bytes(&bytes).map_err(|_| bad())
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

macro_rules! serde_via_string {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_via_string!(ClientIp);
serde_via_string!(IpSubnet);
serde_via_string!(MacAddr);
