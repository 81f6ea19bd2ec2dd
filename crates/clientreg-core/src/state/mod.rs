// # Client Stores
//
// - [`PersistentStore`]: user-configured clients with uniqueness checks
// - [`RuntimeDirectory`]: auto-discovered information keyed by address

pub mod persistent;
pub mod runtime;

pub use persistent::PersistentStore;
pub use runtime::RuntimeDirectory;
