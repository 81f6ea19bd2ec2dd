//! Identifier index over persistent clients
//!
//! The index keeps one lookup map per identifier space (UID, name, IP,
//! subnet, ClientID, MAC) and enforces that every value in every space is
//! claimed by at most one client.
//!
//! ## Locking
//!
//! The index does no locking of its own. [`PersistentStore`] wraps it in a
//! mutex so that a clash check and the following insert happen atomically.
//!
//! [`PersistentStore`]: crate::state::PersistentStore

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

use crate::client::{ClientIp, IpSubnet, MacAddr, Persistent, Uid};
use crate::error::{Error, Result};

/// Parallel lookup maps over persistent clients
#[derive(Debug, Default)]
pub struct Index {
    /// Owns the clients; every other map points here
    uid_to_client: HashMap<Uid, Persistent>,

    /// Sorted so that [`Index::range_by_name`] needs no extra work
    name_to_uid: BTreeMap<String, Uid>,

    ip_to_uid: HashMap<ClientIp, Uid>,
    subnet_to_uid: HashMap<IpSubnet, Uid>,
    client_id_to_uid: HashMap<String, Uid>,
    mac_to_uid: HashMap<MacAddr, Uid>,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`Error::DuplicateUid`] if another client has `p.uid`
    ///
    /// Run this before [`Index::clashes`] when adding, so that a reused UID
    /// is reported as such rather than as a name or address clash.
    pub fn clashes_uid(&self, p: &Persistent) -> Result<()> {
        match self.uid_to_client.get(&p.uid) {
            Some(existing) => Err(Error::DuplicateUid {
                holder: existing.name.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Fail if any identifier of `p` is claimed by a client with a different
    /// UID
    ///
    /// Fields are checked in order: name, IPs, subnets, ClientIDs, MAC. The
    /// first clash found is returned. A client never clashes with itself, which
    /// is what lets an update keep its own identifiers.
    pub fn clashes(&self, p: &Persistent) -> Result<()> {
        if self.other_holder(self.name_to_uid.get(&p.name), p).is_some() {
            return Err(Error::DuplicateName {
                name: p.name.clone(),
            });
        }

        for ip in &p.ips {
            if let Some(holder) = self.other_holder(self.ip_to_uid.get(ip), p) {
                return Err(Error::DuplicateIp {
                    ip: ip.to_string(),
                    holder: holder.name.clone(),
                });
            }
        }

        for subnet in &p.subnets {
            if let Some(holder) = self.other_holder(self.subnet_to_uid.get(subnet), p) {
                return Err(Error::DuplicateSubnet {
                    subnet: subnet.to_string(),
                    holder: holder.name.clone(),
                });
            }
        }

        for id in &p.client_ids {
            if let Some(holder) = self.other_holder(self.client_id_to_uid.get(id), p) {
                return Err(Error::DuplicateClientId {
                    client_id: id.clone(),
                    holder: holder.name.clone(),
                });
            }
        }

        if let Some(mac) = &p.mac {
            if let Some(holder) = self.other_holder(self.mac_to_uid.get(mac), p) {
                return Err(Error::DuplicateMac {
                    mac: mac.to_string(),
                    holder: holder.name.clone(),
                });
            }
        }

        Ok(())
    }

    fn other_holder(&self, uid: Option<&Uid>, p: &Persistent) -> Option<&Persistent> {
        uid.filter(|uid| **uid != p.uid)
            .and_then(|uid| self.uid_to_client.get(uid))
    }

    /// Insert `p` into every map
    ///
    /// No checks are made: call [`Index::clashes_uid`] and [`Index::clashes`]
    /// first.
    pub fn add(&mut self, p: Persistent) {
        let uid = p.uid;

        self.name_to_uid.insert(p.name.clone(), uid);
        for ip in &p.ips {
            self.ip_to_uid.insert(ip.clone(), uid);
        }
        for subnet in &p.subnets {
            self.subnet_to_uid.insert(*subnet, uid);
        }
        for id in &p.client_ids {
            self.client_id_to_uid.insert(id.clone(), uid);
        }
        if let Some(mac) = &p.mac {
            self.mac_to_uid.insert(mac.clone(), uid);
        }

        self.uid_to_client.insert(uid, p);
    }

    /// Remove the client with the UID of `p` from every map and return it
    ///
    /// The keys removed are those of the stored client, so a caller holding a
    /// modified copy cannot leave stale entries behind. Entries that point to
    /// another UID are left alone.
    pub fn delete(&mut self, p: &Persistent) -> Option<Persistent> {
        let uid = p.uid;
        let stored = self.uid_to_client.remove(&uid)?;

        if self.name_to_uid.get(&stored.name) == Some(&uid) {
            self.name_to_uid.remove(&stored.name);
        }
        for ip in &stored.ips {
            remove_if_owned(&mut self.ip_to_uid, ip, uid);
        }
        for subnet in &stored.subnets {
            remove_if_owned(&mut self.subnet_to_uid, subnet, uid);
        }
        for id in &stored.client_ids {
            remove_if_owned(&mut self.client_id_to_uid, id, uid);
        }
        if let Some(mac) = &stored.mac {
            remove_if_owned(&mut self.mac_to_uid, mac, uid);
        }

        Some(stored)
    }

    /// Resolve a string identifier
    ///
    /// Tried in order: ClientID, UID, name, IP address (exact, then the most
    /// specific subnet containing it), MAC. Some MAC forms also parse as IPv6
    /// addresses, so a failed IP lookup still falls through to the MAC.
    ///
    /// A name that reads as an address would shadow the client owning that
    /// address; [`Persistent::validate`] rejects such names.
    pub fn find(&self, id: &str) -> Option<&Persistent> {
        if let Some(p) = self.lookup(self.client_id_to_uid.get(id)) {
            return Some(p);
        }

        if let Ok(uid) = id.parse::<Uid>() {
            if let Some(p) = self.uid_to_client.get(&uid) {
                return Some(p);
            }
        }

        if let Some(p) = self.find_by_name(id) {
            return Some(p);
        }

        if let Ok(ip) = id.parse::<ClientIp>() {
            if let Some(p) = self.find_by_ip(&ip) {
                return Some(p);
            }
        }

        id.parse::<MacAddr>()
            .ok()
            .and_then(|mac| self.find_by_mac(&mac))
    }

    fn lookup(&self, uid: Option<&Uid>) -> Option<&Persistent> {
        uid.and_then(|uid| self.uid_to_client.get(uid))
    }

    /// Find by exact name
    pub fn find_by_name(&self, name: &str) -> Option<&Persistent> {
        self.lookup(self.name_to_uid.get(name))
    }

    /// Find by hardware address
    pub fn find_by_mac(&self, mac: &MacAddr) -> Option<&Persistent> {
        self.lookup(self.mac_to_uid.get(mac))
    }

    /// Find by exact address, zone included, then by the longest subnet that
    /// contains the address
    pub fn find_by_ip(&self, ip: &ClientIp) -> Option<&Persistent> {
        if let Some(p) = self.lookup(self.ip_to_uid.get(ip)) {
            return Some(p);
        }

        let addr = ip.without_zone();
        self.subnet_to_uid
            .iter()
            .filter(|(subnet, _)| subnet.contains(addr))
            .max_by(|(a, _), (b, _)| {
                a.prefix_len()
                    .cmp(&b.prefix_len())
                    .then_with(|| b.network().cmp(&a.network()))
            })
            .and_then(|(_, uid)| self.uid_to_client.get(uid))
    }

    /// Find a client with an individual address equal to `ip` once the zone
    /// of the stored address is stripped
    ///
    /// Several clients can hold the same address with different zones, in
    /// which case any one of them may be returned.
    pub fn find_by_ip_without_zone(&self, ip: IpAddr) -> Option<&Persistent> {
        self.ip_to_uid
            .iter()
            .find(|(stored, _)| stored.without_zone() == ip)
            .and_then(|(_, uid)| self.uid_to_client.get(uid))
    }

    /// Call `f` for each client in name order until it returns false
    pub fn range_by_name(&self, mut f: impl FnMut(&Persistent) -> bool) {
        for uid in self.name_to_uid.values() {
            if let Some(p) = self.uid_to_client.get(uid) {
                if !f(p) {
                    return;
                }
            }
        }
    }

    /// Number of clients
    pub fn size(&self) -> usize {
        self.uid_to_client.len()
    }

    /// Release the upstream resources of every client
    ///
    /// All clients are attempted; failures are collected.
    pub fn close_upstreams(&self) -> Result<()> {
        let errs: Vec<Error> = self
            .uid_to_client
            .values()
            .filter_map(|p| {
                p.close_upstreams()
                    .err()
                    .map(|e| Error::upstream(format!("client {:?}: {e}", p.name)))
            })
            .collect();

        if errs.is_empty() {
            Ok(())
        } else {
            Err(Error::Upstreams(errs))
        }
    }
}

fn remove_if_owned<K, Q>(map: &mut HashMap<K, Uid>, key: &Q, uid: Uid)
where
    K: std::borrow::Borrow<Q> + std::hash::Hash + Eq,
    Q: std::hash::Hash + Eq + ?Sized,
{
    if map.get(key) == Some(&uid) {
        map.remove(key);
    }
}
