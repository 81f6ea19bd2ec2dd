// # clientreg-core
//
// Client identity registry for a LAN-facing network service.
//
// ## Architecture Overview
//
// - **Index**: parallel lookup maps over persistent clients, one per
//   identifier space (UID, name, IP, subnet, ClientID, MAC), with clash checks
// - **PersistentStore**: the index behind a mutex; add, update and remove are
//   atomic with respect to each other
// - **RuntimeDirectory**: per-address information from discovery sources,
//   each source retractable on its own
// - **Storage**: facade over both stores, the only type other subsystems use
//
// ## Design Principles
//
// 1. **In-memory only**: no I/O under any lock; loading and saving clients is
//    the caller's job
// 2. **Copies out**: lookups return copies, never references into the maps
// 3. **All-or-nothing writes**: a rejected add or update leaves no trace

pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod state;
pub mod storage;
pub mod traits;

// Re-export core types for convenience
pub use client::{Persistent, RuntimeClient, Source, SourceInfo, Uid};
pub use config::{RuntimeSourcesConfig, StorageConfig};
pub use error::{Error, Result};
pub use index::Index;
pub use state::{PersistentStore, RuntimeDirectory};
pub use storage::Storage;
pub use traits::Upstreams;
