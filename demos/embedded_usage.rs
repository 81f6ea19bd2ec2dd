//! Minimal embedding example for clientreg-core
//!
//! Configuration and discovery are simulated in-process: a "config" step adds
//! persistent clients, two discovery tasks feed the runtime directory
//! concurrently, and a query step resolves addresses the way a DNS request
//! handler would.
//!
//! Set `CLIENTREG_LOG_LEVEL=debug` to see the registry's own log lines.

use anyhow::{Context, Result};
use clientreg_core::client::{Persistent, RuntimeClient, Source, SourceInfo};
use clientreg_core::traits::Upstreams;
use clientreg_core::{Storage, StorageConfig};
use std::env;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Stand-in for a client's private upstream connections
#[derive(Debug)]
struct DemoUpstreams {
    name: String,
}

impl Upstreams for DemoUpstreams {
    fn close(&self) -> clientreg_core::Result<()> {
        info!(client = %self.name, "closing upstream connections");
        Ok(())
    }
}

fn log_level() -> Level {
    match env::var("CLIENTREG_LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(log_level()).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    let config: StorageConfig = serde_json::from_str(r#"{"runtime_sources":{"whois":false}}"#)
        .context("parsing storage config")?;
    let storage = Arc::new(Storage::new(config));

    // 1. Configuration: persistent clients.
    let laptop = Persistent::new("laptop")
        .with_ip("192.168.1.10".parse::<IpAddr>()?)
        .with_client_id("laptop")
        .with_upstreams(Arc::new(DemoUpstreams {
            name: "laptop".to_string(),
        }));
    laptop.validate()?;
    storage.add(laptop)?;

    let kids = Persistent::new("kids")
        .with_subnet("192.168.50.0/24".parse()?)
        .with_mac("aa:bb:cc:00:11:22".parse()?);
    kids.validate()?;
    storage.add(kids)?;

    if let Err(e) = storage.add(Persistent::new("dup").with_ip("192.168.1.10".parse::<IpAddr>()?)) {
        warn!(error = %e, "rejected as expected");
    }

    // 2. Discovery: two sources report concurrently.
    let hosts = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            storage.replace_source(
                Source::HostsFile,
                vec![
                    (IpAddr::from([192, 168, 1, 2]), SourceInfo::host("nas")),
                    (IpAddr::from([192, 168, 1, 3]), SourceInfo::host("printer")),
                ],
            )
        })
    };
    let arp = {
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            for i in 2..=4u8 {
                storage.add_or_merge_runtime(
                    RuntimeClient::new(IpAddr::from([192, 168, 1, i]))
                        .with_source(Source::Arp, SourceInfo::host(format!("dev-{i}"))),
                );
            }
        })
    };
    let (removed, added) = hosts.await?;
    arp.await?;
    info!(removed, added, runtime = storage.runtime_size(), "discovery done");

    // 3. Queries.
    for id in ["laptop", "192.168.50.7", "AA-BB-CC-00-11-22", "192.168.1.3"] {
        match storage.find(id) {
            Some(p) => info!(id, client = %p.name, "persistent match"),
            None => {
                let runtime = id
                    .parse::<IpAddr>()
                    .ok()
                    .and_then(|ip| storage.client_runtime(ip));
                match runtime.as_ref().and_then(|rc| rc.host()) {
                    Some((host, source)) => info!(id, host, %source, "runtime match"),
                    None => info!(id, "unknown client"),
                }
            }
        }
    }

    // ARP table flushed: only hosts file entries survive.
    let dropped = storage.delete_by_source(Source::Arp);
    info!(dropped, runtime = storage.runtime_size(), "arp retracted");

    // 4. Shutdown.
    storage.close_upstreams()?;
    info!(clients = storage.size(), "shutdown complete");

    Ok(())
}
