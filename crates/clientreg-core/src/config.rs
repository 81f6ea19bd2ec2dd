//! Configuration types for the client registry
//!
//! Configuration is handed to [`Storage::new`](crate::Storage::new) as a
//! value; reading it from disk is up to the caller.

use serde::{Deserialize, Serialize};

use crate::client::Source;

/// Main registry configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which discovery sources may contribute runtime client information
    #[serde(default)]
    pub runtime_sources: RuntimeSourcesConfig,
}

impl StorageConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runtime source switches
///
/// A disabled source's reports are dropped before they reach the runtime
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSourcesConfig {
    /// Accept WHOIS data
    #[serde(default = "default_enabled")]
    pub whois: bool,

    /// Accept neighbor table entries
    #[serde(default = "default_enabled")]
    pub arp: bool,

    /// Accept reverse DNS host names
    #[serde(default = "default_enabled")]
    pub rdns: bool,

    /// Accept DHCP leases
    #[serde(default = "default_enabled")]
    pub dhcp: bool,

    /// Accept hosts file entries
    #[serde(default = "default_enabled")]
    pub hosts: bool,
}

impl RuntimeSourcesConfig {
    /// Every source disabled
    pub fn none() -> Self {
        Self {
            whois: false,
            arp: false,
            rdns: false,
            dhcp: false,
            hosts: false,
        }
    }

    /// Enable or disable one source
    pub fn with_source(mut self, source: Source, enabled: bool) -> Self {
        *self.flag_mut(source) = enabled;
        self
    }

    /// Whether `source` is enabled
    pub fn is_enabled(&self, source: Source) -> bool {
        match source {
            Source::Whois => self.whois,
            Source::Arp => self.arp,
            Source::Rdns => self.rdns,
            Source::Dhcp => self.dhcp,
            Source::HostsFile => self.hosts,
        }
    }

    fn flag_mut(&mut self, source: Source) -> &mut bool {
        match source {
            Source::Whois => &mut self.whois,
            Source::Arp => &mut self.arp,
            Source::Rdns => &mut self.rdns,
            Source::Dhcp => &mut self.dhcp,
            Source::HostsFile => &mut self.hosts,
        }
    }
}

impl Default for RuntimeSourcesConfig {
    fn default() -> Self {
        Self {
            whois: default_enabled(),
            arp: default_enabled(),
            rdns: default_enabled(),
            dhcp: default_enabled(),
            hosts: default_enabled(),
        }
    }
}

fn default_enabled() -> bool {
    true
}
