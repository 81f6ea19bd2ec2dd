// # Persistent Store
//
// The [`Index`] behind a single mutex.
//
// ## Atomicity
//
// `add` and `update` are check-then-act sequences: the clash check and the
// write that follows run under one lock acquisition, so two callers racing
// for the same name or address cannot both succeed. Every other method takes
// the same lock for its whole duration.
//
// ## Copies
//
// Lookups return clones of the stored clients. Cloning is shallow (upstream
// resources are shared), which is enough to keep callers from changing what
// the index has stored.

use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

use crate::client::{MacAddr, Persistent};
use crate::error::{Error, Result, ResultExt};
use crate::index::Index;

/// Lock-guarded store of persistent clients
///
/// # Example
///
/// ```rust
/// use clientreg_core::client::Persistent;
/// use clientreg_core::state::PersistentStore;
/// use std::net::IpAddr;
///
/// let store = PersistentStore::new();
/// let ip: IpAddr = "192.168.1.10".parse().unwrap();
/// store.add(Persistent::new("laptop").with_ip(ip)).unwrap();
///
/// let found = store.find("192.168.1.10").unwrap();
/// assert_eq!(found.name, "laptop");
/// ```
#[derive(Debug, Default)]
pub struct PersistentStore {
    index: Mutex<Index>,
}

impl PersistentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Index> {
        // Index methods never panic halfway through a write, so the maps are
        // consistent even if a previous holder panicked.
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new client
    ///
    /// `p` should already have passed [`Persistent::validate`]. Fails with a
    /// clash error if the UID or any identifier is taken; nothing is stored in
    /// that case.
    pub fn add(&self, p: Persistent) -> Result<()> {
        let mut index = self.lock();

        index.clashes_uid(&p).context("adding client")?;
        index.clashes(&p).context("adding client")?;

        let name = p.name.clone();
        let ids = p.ids();
        index.add(p);

        debug!(name = %name, ids = ?ids, size = index.size(), "client storage: added client");

        Ok(())
    }

    /// Replace the client called `name` with `p`
    ///
    /// The stored UID is copied onto `p`, so an update never changes a
    /// client's UID. `p` is checked against every other client; on any error
    /// the store is left unchanged.
    pub fn update(&self, name: &str, mut p: Persistent) -> Result<()> {
        let mut index = self.lock();

        let stored = index
            .find_by_name(name)
            .cloned()
            .ok_or_else(|| Error::not_found(name))
            .context("updating client")?;

        p.uid = stored.uid;

        index.clashes(&p).context("updating client")?;

        index.delete(&stored);
        let new_name = p.name.clone();
        index.add(p);

        debug!(old_name = %name, name = %new_name, uid = %stored.uid, "client storage: updated client");

        Ok(())
    }

    /// Remove the client called `name`
    ///
    /// The client's upstream resources are released first; a release failure
    /// is logged and does not stop the removal. Returns false if no such
    /// client exists.
    pub fn remove_by_name(&self, name: &str) -> bool {
        let mut index = self.lock();

        let Some(p) = index.find_by_name(name).cloned() else {
            return false;
        };

        if let Err(e) = p.close_upstreams() {
            error!(name = %p.name, error = %e, "client storage: removing client: closing upstreams");
        }

        index.delete(&p);

        debug!(name = %p.name, size = index.size(), "client storage: removed client");

        true
    }

    /// Find a client by ClientID, UID, name, IP address or MAC, see
    /// [`Index::find`]
    pub fn find(&self, id: &str) -> Option<Persistent> {
        self.lock().find(id).cloned()
    }

    /// Like [`PersistentStore::find`], but if nothing matches `id`, also look
    /// for a client holding `ip` with any zone
    ///
    /// Used by callers that only have zone-less addresses. Several clients can
    /// hold the same address with different zones, so which one is returned
    /// in that case is not defined.
    pub fn find_loose(&self, ip: IpAddr, id: &str) -> Option<Persistent> {
        let index = self.lock();

        index
            .find(id)
            .or_else(|| index.find_by_ip_without_zone(ip))
            .cloned()
    }

    /// Find a client by exact name
    pub fn find_by_name(&self, name: &str) -> Option<Persistent> {
        self.lock().find_by_name(name).cloned()
    }

    /// Find a client by hardware address
    pub fn find_by_mac(&self, mac: &MacAddr) -> Option<Persistent> {
        self.lock().find_by_mac(mac).cloned()
    }

    /// Call `f` with each client in name order until it returns false
    ///
    /// The lock is held throughout, so `f` sees a consistent snapshot. `f`
    /// must not call back into the store.
    pub fn range_by_name(&self, f: impl FnMut(&Persistent) -> bool) {
        self.lock().range_by_name(f);
    }

    /// Copies of all clients in name order
    pub fn list(&self) -> Vec<Persistent> {
        let index = self.lock();
        let mut clients = Vec::with_capacity(index.size());
        index.range_by_name(|p| {
            clients.push(p.clone());
            true
        });
        clients
    }

    /// Number of clients
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// Release the upstream resources of every client, for shutdown
    pub fn close_upstreams(&self) -> Result<()> {
        self.lock().close_upstreams()
    }
}
