//! Core traits for the client registry
//!
//! - [`Upstreams`]: long-lived resources owned by a persistent client

pub mod upstreams;

pub use upstreams::Upstreams;
