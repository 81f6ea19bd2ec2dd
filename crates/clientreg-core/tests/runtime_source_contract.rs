//! Contract Test: Runtime Source Retraction
//!
//! Constraints verified:
//! - A runtime entry exists iff at least one source contributes to it
//! - Retracting a source removes only the entries it was the last source of
//! - Reloading a source does not disturb other sources' contributions

mod common;

use clientreg_core::client::{RuntimeClient, Source, SourceInfo};
use clientreg_core::{Storage, StorageConfig};
use std::net::IpAddr;

fn addr(i: u8) -> IpAddr {
    IpAddr::from([192, 168, 1, i])
}

#[test]
fn entry_with_two_sources_survives_clearing_one() {
    let storage = Storage::new(StorageConfig::default());
    storage.add_or_merge_runtime(
        RuntimeClient::new(addr(1)).with_source(Source::Dhcp, SourceInfo::host("lease")),
    );
    storage.add_or_merge_runtime(
        RuntimeClient::new(addr(1)).with_source(Source::Arp, SourceInfo::host("neighbor")),
    );

    let removed = storage.delete_by_source(Source::Dhcp);

    assert_eq!(removed, 0);
    let rc = storage.client_runtime(addr(1)).expect("arp still vouches for it");
    assert_eq!(rc.host(), Some(("neighbor", Source::Arp)));

    assert_eq!(storage.delete_by_source(Source::Arp), 1);
    assert!(storage.client_runtime(addr(1)).is_none());
    assert_eq!(storage.runtime_size(), 0);
}

#[test]
fn retraction_count_is_entries_removed() {
    let storage = Storage::new(StorageConfig::default());
    for i in 1..=10 {
        let mut rc = RuntimeClient::new(addr(i)).with_source(Source::Rdns, SourceInfo::host(format!("r{i}")));
        if i % 2 == 0 {
            rc = rc.with_source(Source::HostsFile, SourceInfo::host(format!("h{i}")));
        }
        storage.add_or_merge_runtime(rc);
    }

    assert_eq!(storage.delete_by_source(Source::Rdns), 5);
    assert_eq!(storage.runtime_size(), 5);

    let mut sources = Vec::new();
    storage.range_runtime(|rc| {
        sources.extend(rc.sources());
        true
    });
    assert!(sources.iter().all(|s| *s == Source::HostsFile));
}

#[test]
fn reloading_a_source_keeps_other_sources() {
    let storage = Storage::new(StorageConfig::default());
    storage.replace_source(
        Source::HostsFile,
        vec![
            (addr(1), SourceInfo::host("nas")),
            (addr(2), SourceInfo::host("printer")),
        ],
    );
    storage.add_or_merge_runtime(
        RuntimeClient::new(addr(2)).with_source(Source::Arp, SourceInfo::host("printer-arp")),
    );

    // The hosts file was edited: the printer line is gone, a new line appeared.
    let (removed, added) = storage.replace_source(
        Source::HostsFile,
        vec![
            (addr(1), SourceInfo::host("nas")),
            (addr(3), SourceInfo::host("tv")),
        ],
    );

    assert_eq!((removed, added), (1, 2));
    assert_eq!(
        storage.client_runtime(addr(2)).unwrap().host(),
        Some(("printer-arp", Source::Arp))
    );
    assert!(storage.client_runtime(addr(3)).is_some());
    assert_eq!(storage.runtime_size(), 3);
}

#[test]
fn delete_by_address_ignores_sources() {
    let storage = Storage::new(StorageConfig::default());
    storage.add_or_merge_runtime(
        RuntimeClient::new(addr(7))
            .with_source(Source::Arp, SourceInfo::host("a"))
            .with_source(Source::Dhcp, SourceInfo::host("d")),
    );

    assert!(storage.delete_runtime(addr(7)));
    assert!(storage.client_runtime(addr(7)).is_none());
    assert!(!storage.delete_runtime(addr(7)));
}

#[test]
fn runtime_and_persistent_are_independent() {
    let storage = Storage::new(StorageConfig::default());
    storage
        .add(common::client_with_ip("desktop", "192.168.1.9"))
        .unwrap();
    storage.add_or_merge_runtime(
        RuntimeClient::new(addr(9)).with_source(Source::Dhcp, SourceInfo::host("desktop-lease")),
    );

    assert_eq!(storage.delete_by_source(Source::Dhcp), 1);
    assert_eq!(storage.find("192.168.1.9").unwrap().name, "desktop");

    assert!(storage.remove_by_name("desktop"));
    assert_eq!(storage.runtime_size(), 0);
}
