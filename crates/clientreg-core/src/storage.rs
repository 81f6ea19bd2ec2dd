//! Client storage facade
//!
//! [`Storage`] is the one type the rest of the service talks to. It puts the
//! [`PersistentStore`] and the [`RuntimeDirectory`] behind a single API and
//! drops runtime data from sources disabled in the configuration.
//!
//! ## Data Flow
//!
//! ```text
//!  configuration ──add/update/remove──┐
//!                                     ▼
//!                              ┌─────────────┐      ┌─────────────────┐
//!  discovery ──merge/retract──▶│   Storage   │─────▶│ PersistentStore │
//!                              └─────────────┘      └─────────────────┘
//!                                     │             ┌─────────────────┐
//!  DNS / UI ──find/client_runtime─────┘────────────▶│ RuntimeDirectory│
//!                                                   └─────────────────┘
//! ```

use std::net::IpAddr;
use tracing::debug;

use crate::client::{MacAddr, Persistent, RuntimeClient, Source, SourceInfo, WhoisInfo};
use crate::config::{RuntimeSourcesConfig, StorageConfig};
use crate::error::Result;
use crate::state::{PersistentStore, RuntimeDirectory};

/// Persistent and runtime client information
///
/// # Example
///
/// ```rust
/// use clientreg_core::client::{Persistent, RuntimeClient, Source, SourceInfo};
/// use clientreg_core::{Storage, StorageConfig};
/// use std::net::IpAddr;
///
/// let storage = Storage::new(StorageConfig::default());
/// let ip: IpAddr = "192.168.1.10".parse().unwrap();
///
/// storage.add(Persistent::new("laptop").with_ip(ip)).unwrap();
/// storage.add_or_merge_runtime(
///     RuntimeClient::new(ip).with_source(Source::Dhcp, SourceInfo::host("laptop.lan")),
/// );
///
/// assert_eq!(storage.find("laptop").unwrap().ips.len(), 1);
/// assert_eq!(storage.client_runtime(ip).unwrap().host(), Some(("laptop.lan", Source::Dhcp)));
/// ```
#[derive(Debug, Default)]
pub struct Storage {
    persistent: PersistentStore,
    runtime: RuntimeDirectory,
    runtime_sources: RuntimeSourcesConfig,
}

impl Storage {
    /// Create empty storage
    pub fn new(config: StorageConfig) -> Self {
        Self {
            persistent: PersistentStore::new(),
            runtime: RuntimeDirectory::new(),
            runtime_sources: config.runtime_sources,
        }
    }

    /// Enabled runtime sources
    pub fn runtime_sources(&self) -> &RuntimeSourcesConfig {
        &self.runtime_sources
    }

    // Persistent clients

    /// See [`PersistentStore::add`]
    pub fn add(&self, p: Persistent) -> Result<()> {
        self.persistent.add(p)
    }

    /// See [`PersistentStore::update`]
    pub fn update(&self, name: &str, p: Persistent) -> Result<()> {
        self.persistent.update(name, p)
    }

    /// See [`PersistentStore::remove_by_name`]
    pub fn remove_by_name(&self, name: &str) -> bool {
        self.persistent.remove_by_name(name)
    }

    /// See [`PersistentStore::find`]
    pub fn find(&self, id: &str) -> Option<Persistent> {
        self.persistent.find(id)
    }

    /// See [`PersistentStore::find_loose`]
    pub fn find_loose(&self, ip: IpAddr, id: &str) -> Option<Persistent> {
        self.persistent.find_loose(ip, id)
    }

    /// See [`PersistentStore::find_by_name`]
    pub fn find_by_name(&self, name: &str) -> Option<Persistent> {
        self.persistent.find_by_name(name)
    }

    /// See [`PersistentStore::find_by_mac`]
    pub fn find_by_mac(&self, mac: &MacAddr) -> Option<Persistent> {
        self.persistent.find_by_mac(mac)
    }

    /// See [`PersistentStore::range_by_name`]
    pub fn range_by_name(&self, f: impl FnMut(&Persistent) -> bool) {
        self.persistent.range_by_name(f);
    }

    /// See [`PersistentStore::list`]
    pub fn list(&self) -> Vec<Persistent> {
        self.persistent.list()
    }

    /// Number of persistent clients
    pub fn size(&self) -> usize {
        self.persistent.size()
    }

    /// See [`PersistentStore::close_upstreams`]
    pub fn close_upstreams(&self) -> Result<()> {
        self.persistent.close_upstreams()
    }

    // Runtime clients

    /// Runtime information about `ip`
    pub fn client_runtime(&self, ip: IpAddr) -> Option<RuntimeClient> {
        self.runtime.get(ip)
    }

    /// Merge runtime information, dropping sources that are disabled
    ///
    /// Returns whether anything was stored.
    pub fn add_or_merge_runtime(&self, mut rc: RuntimeClient) -> bool {
        let before = rc.sources().count();
        rc.retain_sources(|s| self.runtime_sources.is_enabled(s));
        let dropped = before - rc.sources().count();
        if dropped > 0 {
            debug!(addr = %rc.addr(), dropped, "runtime clients: ignoring disabled sources");
        }

        self.runtime.add_or_merge(rc)
    }

    /// See [`RuntimeDirectory::delete`]
    pub fn delete_runtime(&self, ip: IpAddr) -> bool {
        self.runtime.delete(ip)
    }

    /// See [`RuntimeDirectory::delete_by_source`]
    pub fn delete_by_source(&self, source: Source) -> usize {
        self.runtime.delete_by_source(source)
    }

    /// Replace everything `source` has reported, see
    /// [`RuntimeDirectory::replace_source`]
    ///
    /// For a disabled source the old data is still retracted but nothing new
    /// is stored.
    pub fn replace_source(
        &self,
        source: Source,
        entries: impl IntoIterator<Item = (IpAddr, SourceInfo)>,
    ) -> (usize, usize) {
        if !self.runtime_sources.is_enabled(source) {
            debug!(%source, "runtime clients: source disabled, only retracting");
            return (self.runtime.delete_by_source(source), 0);
        }

        self.runtime.replace_source(source, entries)
    }

    /// Record the reverse DNS host name and WHOIS data for `ip`
    ///
    /// A missing or empty value retracts what that source said before.
    pub fn update_address(&self, ip: IpAddr, host: Option<&str>, whois: Option<WhoisInfo>) {
        match host.filter(|h| !h.is_empty()) {
            Some(host) => {
                self.add_or_merge_runtime(
                    RuntimeClient::new(ip).with_source(Source::Rdns, SourceInfo::host(host)),
                );
            }
            None => {
                self.runtime.unset(ip, Source::Rdns);
            }
        }

        match whois.filter(|w| !w.is_empty()) {
            Some(whois) => {
                self.add_or_merge_runtime(
                    RuntimeClient::new(ip).with_source(Source::Whois, SourceInfo::whois(whois)),
                );
            }
            None => {
                self.runtime.unset(ip, Source::Whois);
            }
        }
    }

    /// See [`RuntimeDirectory::range`]
    pub fn range_runtime(&self, f: impl FnMut(&RuntimeClient) -> bool) {
        self.runtime.range(f);
    }

    /// Number of addresses with runtime information
    pub fn runtime_size(&self) -> usize {
        self.runtime.size()
    }
}
