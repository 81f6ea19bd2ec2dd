//! Contract Test: Concurrent Access
//!
//! Constraints verified:
//! - Concurrent adds with disjoint identifiers all succeed
//! - Concurrent adds racing for one name or address: exactly one succeeds
//! - Concurrent merges and retractions keep the runtime invariant

mod common;

use clientreg_core::client::{Persistent, RuntimeClient, Source, SourceInfo};
use clientreg_core::{Storage, StorageConfig};
use common::*;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

const TASKS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disjoint_adds_all_succeed() {
    let storage = Arc::new(Storage::new(StorageConfig::default()));

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                storage.add(
                    Persistent::new(format!("client-{i}"))
                        .with_ip(ip(&format!("10.0.1.{i}")))
                        .with_client_id(format!("cid-{i}")),
                )
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().expect("disjoint add succeeds");
    }

    assert_eq!(storage.size(), TASKS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_adds_have_one_winner() {
    let storage = Arc::new(Storage::new(StorageConfig::default()));

    // Half race for the name, half for the address.
    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                let p = if i % 2 == 0 {
                    Persistent::new("contested").with_ip(ip(&format!("10.0.2.{i}")))
                } else {
                    Persistent::new(format!("racer-{i}")).with_ip(ip("10.0.3.1"))
                };
                storage.add(p)
            })
        })
        .collect();

    let mut ok = 0;
    let mut clashes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(e) => {
                assert!(e.is_clash(), "unexpected error: {e}");
                clashes += 1;
            }
        }
    }

    // One winner for the name and one for the address.
    assert_eq!(ok, 2);
    assert_eq!(clashes, TASKS - 2);
    assert_eq!(storage.size(), 2);
    assert!(storage.find_by_name("contested").is_some());
    assert!(storage.find("10.0.3.1").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_stay_consistent() {
    let storage = Arc::new(Storage::new(StorageConfig::default()));
    storage.add(client_with_ip("target", "10.0.4.1")).unwrap();
    let uid = storage.find_by_name("target").unwrap().uid;

    let handles: Vec<_> = (0..TASKS)
        .map(|i| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                let _ = storage.update("target", client_with_ip("target", &format!("10.0.5.{i}")));
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let stored = storage.find_by_name("target").unwrap();
    assert_eq!(stored.uid, uid);
    assert_eq!(stored.ips.len(), 1);
    assert_eq!(storage.size(), 1);
    assert!(storage.find("10.0.4.1").is_none());
    // Only the final address resolves.
    let resolving: Vec<_> = (0..TASKS)
        .filter(|i| storage.find(&format!("10.0.5.{i}")).is_some())
        .collect();
    assert_eq!(resolving.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sources_keep_runtime_invariant() {
    let storage = Arc::new(Storage::new(StorageConfig::default()));
    let addrs: Vec<IpAddr> = (1..=50u8).map(|i| IpAddr::from([172, 16, 0, i])).collect();

    // Every address is reported by ARP and, for even addresses, by DHCP too.
    let arp = {
        let storage = Arc::clone(&storage);
        let addrs = addrs.clone();
        tokio::spawn(async move {
            for a in addrs {
                storage.add_or_merge_runtime(
                    RuntimeClient::new(a).with_source(Source::Arp, SourceInfo::host("arp")),
                );
            }
        })
    };
    let dhcp = {
        let storage = Arc::clone(&storage);
        let addrs = addrs.clone();
        tokio::spawn(async move {
            for a in addrs.into_iter().filter(|a| matches!(a, IpAddr::V4(v4) if v4.octets()[3] % 2 == 0)) {
                storage.add_or_merge_runtime(
                    RuntimeClient::new(a).with_source(Source::Dhcp, SourceInfo::host("dhcp")),
                );
            }
        })
    };
    arp.await.unwrap();
    dhcp.await.unwrap();
    assert_eq!(storage.runtime_size(), 50);

    // ARP restarts while readers look entries up.
    let retract = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move { storage.delete_by_source(Source::Arp) })
    };
    let reader = {
        let storage = Arc::clone(&storage);
        let addrs = addrs.clone();
        tokio::spawn(async move {
            for a in addrs {
                if let Some(rc) = storage.client_runtime(a) {
                    assert!(!rc.is_empty());
                }
            }
        })
    };

    assert_eq!(retract.await.unwrap(), 25);
    reader.await.unwrap();

    let mut seen = HashSet::new();
    storage.range_runtime(|rc| {
        assert_eq!(rc.sources().collect::<Vec<_>>(), vec![Source::Dhcp]);
        seen.insert(rc.addr());
        true
    });
    assert_eq!(seen.len(), 25);
}
