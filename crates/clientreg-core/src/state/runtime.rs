// # Runtime Directory
//
// Best-effort information about addresses seen on the network, one entry per
// IP address.
//
// ## Sources
//
// Each entry keeps the contribution of every discovery source apart. When a
// source restarts or its data expires, `delete_by_source` clears that source
// everywhere; an entry is dropped only once no source has anything left to
// say about the address.
//
// ## Locking
//
// The directory has its own mutex, independent of the persistent store, so
// discovery sources running on different threads can merge and retract
// concurrently.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::client::{RuntimeClient, Source, SourceInfo};

/// Lock-guarded map from address to [`RuntimeClient`]
///
/// Every entry has at least one live source.
#[derive(Debug, Default)]
pub struct RuntimeDirectory {
    clients: Mutex<HashMap<IpAddr, RuntimeClient>>,
}

impl RuntimeDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, RuntimeClient>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert `rc`, or merge its sources into the existing entry for the same
    /// address
    ///
    /// Returns false if `rc` has no live source, in which case nothing is
    /// stored.
    pub fn add_or_merge(&self, rc: RuntimeClient) -> bool {
        add_or_merge_locked(&mut self.lock(), rc)
    }

    /// Copy of the entry for `addr`
    pub fn get(&self, addr: IpAddr) -> Option<RuntimeClient> {
        self.lock().get(&addr).cloned()
    }

    /// Remove the entry for `addr`, whatever its sources. Returns whether
    /// there was one.
    pub fn delete(&self, addr: IpAddr) -> bool {
        self.lock().remove(&addr).is_some()
    }

    /// Clear `source` from the entry for `addr`, dropping the entry if no
    /// source is left. Returns whether the source had reported anything.
    pub fn unset(&self, addr: IpAddr, source: Source) -> bool {
        let mut clients = self.lock();
        let Some(rc) = clients.get_mut(&addr) else {
            return false;
        };

        let had = rc.unset(source);
        if rc.is_empty() {
            clients.remove(&addr);
        }

        had
    }

    /// Clear `source` from every entry and drop entries left with no source
    ///
    /// Returns the number of entries dropped, not the number cleared.
    pub fn delete_by_source(&self, source: Source) -> usize {
        let n = delete_by_source_locked(&mut self.lock(), source);

        debug!(%source, removed = n, "runtime clients: deleted by source");

        n
    }

    /// Replace everything `source` has reported with `entries`
    ///
    /// Runs as one critical section, so readers never observe the directory
    /// with the source half reloaded. Returns the number of entries dropped by
    /// the retraction and the number of entries stored afterwards from
    /// `entries`.
    pub fn replace_source(
        &self,
        source: Source,
        entries: impl IntoIterator<Item = (IpAddr, SourceInfo)>,
    ) -> (usize, usize) {
        let mut clients = self.lock();

        let removed = delete_by_source_locked(&mut clients, source);
        let mut added = 0;
        for (addr, info) in entries {
            let rc = RuntimeClient::new(addr).with_source(source, info);
            if add_or_merge_locked(&mut clients, rc) {
                added += 1;
            }
        }

        debug!(%source, removed, added, size = clients.len(), "runtime clients: reloaded source");

        (removed, added)
    }

    /// Call `f` with each entry, in no particular order, until it returns
    /// false
    ///
    /// The lock is held throughout; `f` must not call back into the directory.
    pub fn range(&self, mut f: impl FnMut(&RuntimeClient) -> bool) {
        for rc in self.lock().values() {
            if !f(rc) {
                return;
            }
        }
    }

    /// Number of addresses with at least one live source
    pub fn size(&self) -> usize {
        self.lock().len()
    }
}

fn add_or_merge_locked(clients: &mut HashMap<IpAddr, RuntimeClient>, rc: RuntimeClient) -> bool {
    if rc.is_empty() {
        return false;
    }

    match clients.entry(rc.addr()) {
        Entry::Occupied(mut entry) => entry.get_mut().merge(rc),
        Entry::Vacant(entry) => {
            entry.insert(rc);
        }
    }

    true
}

fn delete_by_source_locked(clients: &mut HashMap<IpAddr, RuntimeClient>, source: Source) -> usize {
    let before = clients.len();
    clients.retain(|_, rc| {
        rc.unset(source);
        !rc.is_empty()
    });

    before - clients.len()
}
