//! Persistent (user-configured) clients

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::addr::{ClientIp, IpSubnet, MacAddr};
use crate::error::{Error, Result};
use crate::traits::Upstreams;

/// Maximum length of a ClientID
pub const MAX_CLIENT_ID_LEN: usize = 64;

/// Unique identifier of a persistent client
///
/// Generated once when the client is created and never changed, so it
/// identifies the client across renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uid(uuid::Uuid);

impl Uid {
    /// Generate a fresh random UID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// The nil UID, never valid for a stored client
    pub fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    /// Whether this is the nil UID
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::parse(format!("bad uid {s:?}: {e}")))
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Per-client settings that travel with the record but are not indexed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Use the global filtering settings instead of the ones below
    #[serde(default = "default_true")]
    pub use_global_settings: bool,

    /// Whether filtering is enabled for this client
    #[serde(default)]
    pub filtering_enabled: bool,

    /// Whether safe browsing is enabled for this client
    #[serde(default)]
    pub safe_browsing_enabled: bool,

    /// Blocked service identifiers
    #[serde(default)]
    pub blocked_services: Vec<String>,

    /// Upstream DNS server addresses specific to this client
    #[serde(default)]
    pub upstreams: Vec<String>,

    /// Free-form tags
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            use_global_settings: true,
            filtering_enabled: false,
            safe_browsing_enabled: false,
            blocked_services: Vec::new(),
            upstreams: Vec::new(),
            tags: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A user-configured client
///
/// Cloning is shallow: the clone shares the [`Upstreams`] resource with the
/// original, everything else is copied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Persistent {
    /// Unique identifier, see [`Uid`]
    #[serde(default)]
    pub uid: Uid,

    /// Display name, unique among persistent clients
    pub name: String,

    /// Individual addresses
    #[serde(default)]
    pub ips: Vec<ClientIp>,

    /// Network prefixes
    #[serde(default)]
    pub subnets: Vec<IpSubnet>,

    /// Protocol-level client identifiers (DoH path, DoT/DoQ SNI prefix)
    #[serde(default)]
    pub client_ids: Vec<String>,

    /// Hardware address
    #[serde(default)]
    pub mac: Option<MacAddr>,

    /// Filtering and upstream settings
    #[serde(default)]
    pub settings: ClientSettings,

    /// Upstream resources built from `settings.upstreams`, if any
    #[serde(skip)]
    pub upstreams: Option<Arc<dyn Upstreams>>,
}

impl Persistent {
    /// Create a client with a fresh UID and no identifiers
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uid: Uid::new(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the UID
    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = uid;
        self
    }

    /// Add an individual address
    pub fn with_ip(mut self, ip: impl Into<ClientIp>) -> Self {
        self.ips.push(ip.into());
        self
    }

    /// Add a subnet
    pub fn with_subnet(mut self, subnet: IpSubnet) -> Self {
        self.subnets.push(subnet);
        self
    }

    /// Add a ClientID
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_ids.push(id.into());
        self
    }

    /// Set the hardware address
    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = Some(mac);
        self
    }

    /// Attach upstream resources
    pub fn with_upstreams(mut self, upstreams: Arc<dyn Upstreams>) -> Self {
        self.upstreams = Some(upstreams);
        self
    }

    /// String forms of every identifier of the client, for logging
    pub fn ids(&self) -> Vec<String> {
        self.ips
            .iter()
            .map(ToString::to_string)
            .chain(self.subnets.iter().map(ToString::to_string))
            .chain(self.mac.iter().map(ToString::to_string))
            .chain(self.client_ids.iter().cloned())
            .collect()
    }

    /// Validate the client before submitting it to the registry
    ///
    /// Checks the record on its own: non-nil UID, non-empty name that does
    /// not read as an address, at least one identifier, well-formed ClientIDs
    /// and no repeated values. Uniqueness across clients is checked by the
    /// registry.
    pub fn validate(&self) -> Result<()> {
        if self.uid.is_nil() {
            return Err(Error::validation(format!("client {:?} has nil uid", self.name)));
        }

        if self.name.trim().is_empty() {
            return Err(Error::validation("empty name"));
        }

        // Names are looked up before addresses, so an address-like name
        // would shadow the client that owns that address.
        if self.name.parse::<ClientIp>().is_ok() || self.name.parse::<MacAddr>().is_ok() {
            return Err(Error::validation(format!(
                "name {:?} looks like an address",
                self.name
            )));
        }

        if self.ips.is_empty()
            && self.subnets.is_empty()
            && self.client_ids.is_empty()
            && self.mac.is_none()
        {
            return Err(Error::validation(format!(
                "client {:?} has no identifiers",
                self.name
            )));
        }

        for id in &self.client_ids {
            validate_client_id(id)?;
        }

        find_repeated(&self.ips, "IP")?;
        find_repeated(&self.subnets, "subnet")?;
        find_repeated(&self.client_ids, "ClientID")?;

        Ok(())
    }

    /// Release upstream resources, if the client owns any
    pub fn close_upstreams(&self) -> Result<()> {
        match &self.upstreams {
            Some(upstreams) => upstreams.close(),
            None => Ok(()),
        }
    }
}

fn find_repeated<T>(values: &[T], kind: &str) -> Result<()>
where
    T: std::hash::Hash + Eq + fmt::Display,
{
    let mut seen = HashSet::with_capacity(values.len());
    for v in values {
        if !seen.insert(v) {
            let v = v.to_string();
            return Err(Error::validation(format!("repeated {kind} {v:?}")));
        }
    }

    Ok(())
}

/// Check ClientID syntax: lowercase ASCII letters, digits and hyphens, no
/// leading or trailing hyphen, at most [`MAX_CLIENT_ID_LEN`] characters
pub fn validate_client_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_CLIENT_ID_LEN {
        return Err(Error::validation(format!(
            "ClientID {id:?} must be 1 to {MAX_CLIENT_ID_LEN} characters"
        )));
    }

    if id.starts_with('-') || id.ends_with('-') {
        return Err(Error::validation(format!(
            "ClientID {id:?} starts or ends with a hyphen"
        )));
    }

    if let Some(c) = id
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(Error::validation(format!(
            "ClientID {id:?} contains bad character {c:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[test]
    fn test_validate_ok() {
        let p = Persistent::new("laptop")
            .with_ip("192.168.1.10".parse::<IpAddr>().unwrap())
            .with_client_id("laptop-1");

        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        assert!(Persistent::new("  ").with_client_id("a").validate().is_err());
        assert!(Persistent::new("bare").validate().is_err());
        assert!(Persistent::new("x").with_client_id("-bad").validate().is_err());
        assert!(Persistent::new("x").with_client_id("Upper").validate().is_err());

        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let err = Persistent::new("x")
            .with_ip(ip)
            .with_ip(ip)
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), r#"invalid client: repeated IP "10.0.0.1""#);
    }

    #[test]
    fn test_validate_rejects_nil_uid() {
        let err = Persistent::new("x")
            .with_uid(Uid::nil())
            .with_client_id("x")
            .validate()
            .unwrap_err();

        assert_eq!(err.to_string(), r#"invalid client: client "x" has nil uid"#);
    }

    #[test]
    fn test_validate_rejects_address_like_names() {
        for name in ["10.0.0.1", "fe80::1%eth0", "aa:bb:cc:dd:ee:ff", "aabb.ccdd.eeff"] {
            let err = Persistent::new(name).with_client_id("x").validate().unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{name}: {err}");
        }

        assert!(Persistent::new("10.0.0.1.lan").with_client_id("x").validate().is_ok());
    }

    #[test]
    fn test_ids_and_shallow_clone() {
        let mac: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let p = Persistent::new("tv")
            .with_ip("10.0.0.5".parse::<IpAddr>().unwrap())
            .with_subnet("10.1.0.0/16".parse().unwrap())
            .with_mac(mac)
            .with_client_id("tv");

        assert_eq!(
            p.ids(),
            vec!["10.0.0.5", "10.1.0.0/16", "aa:bb:cc:dd:ee:ff", "tv"]
        );

        let mut copy = p.clone();
        copy.name = "renamed".to_string();
        copy.ips.clear();
        assert_eq!(p.name, "tv");
        assert_eq!(p.ips.len(), 1);
        assert_eq!(copy.uid, p.uid);
    }

    #[test]
    fn test_uid_roundtrip_and_uniqueness() {
        let uid = Uid::new();
        let parsed: Uid = uid.to_string().parse().unwrap();

        assert_eq!(parsed, uid);
        assert_ne!(Uid::new(), uid);
        assert!(Uid::nil().is_nil());
        assert!("not-a-uid".parse::<Uid>().is_err());
    }
}
