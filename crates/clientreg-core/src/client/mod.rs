//! Client record types
//!
//! - [`Persistent`]: a user-configured client with its identifiers
//! - [`RuntimeClient`]: what discovery sources know about one address
//! - [`ClientIp`], [`IpSubnet`], [`MacAddr`]: identifier value types

pub mod addr;
pub mod persistent;
pub mod runtime;

pub use addr::{ClientIp, IpSubnet, MacAddr};
pub use persistent::{ClientSettings, Persistent, Uid, validate_client_id};
pub use runtime::{RuntimeClient, Source, SourceInfo, WhoisInfo};
