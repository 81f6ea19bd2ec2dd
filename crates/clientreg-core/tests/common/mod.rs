//! Test doubles and common utilities for registry contract tests

#![allow(dead_code)]

use clientreg_core::client::{ClientIp, IpSubnet, Persistent, Uid};
use clientreg_core::error::{Error, Result};
use clientreg_core::traits::Upstreams;
use clientreg_core::Storage;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upstreams double that counts `close` calls and can be told to fail
#[derive(Debug, Default)]
pub struct CountingUpstreams {
    close_call_count: AtomicUsize,
    fail: bool,
}

impl CountingUpstreams {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            close_call_count: AtomicUsize::new(0),
            fail: true,
        })
    }

    /// Get the number of times close() was called
    pub fn close_call_count(&self) -> usize {
        self.close_call_count.load(Ordering::SeqCst)
    }
}

impl Upstreams for CountingUpstreams {
    fn close(&self) -> Result<()> {
        self.close_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::upstream("connection reset"));
        }
        Ok(())
    }
}

pub fn ip(s: &str) -> ClientIp {
    s.parse().expect("valid ip")
}

pub fn subnet(s: &str) -> IpSubnet {
    s.parse().expect("valid subnet")
}

/// Name, UID and identifiers of every stored client, in name order
pub fn snapshot(storage: &Storage) -> Vec<(String, Uid, Vec<String>)> {
    storage
        .list()
        .into_iter()
        .map(|p| (p.name.clone(), p.uid, p.ids()))
        .collect()
}

/// Client with one address, as configured through the UI
pub fn client_with_ip(name: &str, addr: &str) -> Persistent {
    Persistent::new(name).with_ip(ip(addr))
}
