//! Runtime (auto-discovered) clients
//!
//! A runtime client is keyed by its IP address and holds what each discovery
//! source has reported about that address. Every source's contribution is kept
//! apart, so one source can be retracted without touching the others.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Origin of runtime client information
///
/// Variants are ordered by ascending priority: when several sources know a
/// host name for the same address, the later variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// WHOIS lookups
    Whois,
    /// Neighbor (ARP/NDP) table
    Arp,
    /// Reverse DNS
    Rdns,
    /// DHCP leases
    Dhcp,
    /// System hosts file
    HostsFile,
}

impl Source {
    /// All sources, lowest priority first
    pub const ALL: [Source; 5] = [
        Source::Whois,
        Source::Arp,
        Source::Rdns,
        Source::Dhcp,
        Source::HostsFile,
    ];

    /// Short name used in logs and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Whois => "whois",
            Source::Arp => "arp",
            Source::Rdns => "rdns",
            Source::Dhcp => "dhcp",
            Source::HostsFile => "etc/hosts",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WHOIS data about an address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisInfo {
    /// City
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Country code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Organization name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orgname: Option<String>,
}

impl WhoisInfo {
    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.country.is_none() && self.orgname.is_none()
    }
}

/// What a single source knows about an address
///
/// Merging overwrites only the fields that are set in the incoming value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// WHOIS data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whois: Option<WhoisInfo>,
    /// Lease expiry, for sources that hand out leases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expiry: Option<DateTime<Utc>>,
}

impl SourceInfo {
    /// Only a host name
    pub fn host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    /// Only WHOIS data
    pub fn whois(whois: WhoisInfo) -> Self {
        Self {
            whois: Some(whois),
            ..Self::default()
        }
    }

    /// Set the lease expiry
    pub fn with_lease_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.lease_expiry = Some(expiry);
        self
    }

    /// Whether the source contributes nothing. Empty host names and empty
    /// WHOIS data count as absent.
    pub fn is_empty(&self) -> bool {
        self.host.as_deref().is_none_or(str::is_empty)
            && self.whois.as_ref().is_none_or(WhoisInfo::is_empty)
            && self.lease_expiry.is_none()
    }

    fn merge(&mut self, other: SourceInfo) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.whois.is_some() {
            self.whois = other.whois;
        }
        if other.lease_expiry.is_some() {
            self.lease_expiry = other.lease_expiry;
        }
    }
}

/// Auto-discovered information about one IP address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeClient {
    addr: IpAddr,
    sources: BTreeMap<Source, SourceInfo>,
}

impl RuntimeClient {
    /// Client with no information yet
    pub fn new(addr: IpAddr) -> Self {
        Self {
            addr,
            sources: BTreeMap::new(),
        }
    }

    /// Add one source's information
    pub fn with_source(mut self, source: Source, info: SourceInfo) -> Self {
        self.set_info(source, info);
        self
    }

    /// The address
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Merge `info` into what `source` already reported. If the result is
    /// empty, the source is unset.
    pub fn set_info(&mut self, source: Source, info: SourceInfo) {
        let entry = self.sources.entry(source).or_default();
        entry.merge(info);
        if entry.is_empty() {
            self.sources.remove(&source);
        }
    }

    /// Forget everything `source` reported. Returns whether it had reported
    /// anything.
    pub fn unset(&mut self, source: Source) -> bool {
        self.sources.remove(&source).is_some()
    }

    /// Merge every source of `other` into this client
    pub fn merge(&mut self, other: RuntimeClient) {
        for (source, info) in other.sources {
            self.set_info(source, info);
        }
    }

    /// Keep only the sources for which `keep` returns true
    pub fn retain_sources(&mut self, mut keep: impl FnMut(Source) -> bool) {
        self.sources.retain(|source, _| keep(*source));
    }

    /// Whether no source contributes anything
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// What `source` reported, if anything
    pub fn info(&self, source: Source) -> Option<&SourceInfo> {
        self.sources.get(&source)
    }

    /// Sources with live information, lowest priority first
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.sources.keys().copied()
    }

    /// Host name from the highest-priority source that has one
    pub fn host(&self) -> Option<(&str, Source)> {
        self.sources.iter().rev().find_map(|(source, info)| {
            info.host
                .as_deref()
                .filter(|h| !h.is_empty())
                .map(|h| (h, *source))
        })
    }

    /// WHOIS data from the highest-priority source that has some
    pub fn whois(&self) -> Option<&WhoisInfo> {
        self.sources
            .values()
            .rev()
            .find_map(|info| info.whois.as_ref().filter(|w| !w.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> IpAddr {
        "192.168.1.20".parse().unwrap()
    }

    #[test]
    fn test_host_priority() {
        let rc = RuntimeClient::new(addr())
            .with_source(Source::Arp, SourceInfo::host("arp-name"))
            .with_source(Source::HostsFile, SourceInfo::host("hosts-name"))
            .with_source(Source::Rdns, SourceInfo::host("rdns-name"));

        assert_eq!(rc.host(), Some(("hosts-name", Source::HostsFile)));
        assert_eq!(
            rc.sources().collect::<Vec<_>>(),
            vec![Source::Arp, Source::Rdns, Source::HostsFile]
        );
    }

    #[test]
    fn test_merge_per_field() {
        let expiry = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut rc = RuntimeClient::new(addr())
            .with_source(Source::Dhcp, SourceInfo::host("old").with_lease_expiry(expiry));
        rc.set_info(Source::Dhcp, SourceInfo::host("new"));

        let info = rc.info(Source::Dhcp).unwrap();
        assert_eq!(info.host.as_deref(), Some("new"));
        assert_eq!(info.lease_expiry, Some(expiry));
    }

    #[test]
    fn test_unset_last_source_makes_empty() {
        let mut rc = RuntimeClient::new(addr())
            .with_source(Source::Rdns, SourceInfo::host("a"))
            .with_source(Source::Arp, SourceInfo::host("b"));

        assert!(rc.unset(Source::Rdns));
        assert!(!rc.unset(Source::Rdns));
        assert!(!rc.is_empty());
        assert!(rc.unset(Source::Arp));
        assert!(rc.is_empty());
    }

    #[test]
    fn test_empty_info_is_not_stored() {
        let rc = RuntimeClient::new(addr())
            .with_source(Source::Rdns, SourceInfo::host(""))
            .with_source(Source::Whois, SourceInfo::whois(WhoisInfo::default()));

        assert!(rc.is_empty());
        assert_eq!(rc.host(), None);
    }
}
