// # Upstreams Trait
//
// A persistent client may carry its own upstream DNS configuration. Building
// that configuration opens long-lived connections, so the registry has to
// tell the owner when the client goes away.
//
// ## Usage
//
// ```rust,ignore
// use clientreg_core::traits::Upstreams;
//
// #[derive(Debug)]
// struct DohPool { /* connections */ }
//
// impl Upstreams for DohPool {
//     fn close(&self) -> clientreg_core::Result<()> {
//         // drop idle connections
//         Ok(())
//     }
// }
// ```

use std::fmt;

/// Resources owned by a persistent client that must be released when the
/// client is removed or the service shuts down
///
/// # Thread Safety
///
/// `close` is called while the persistent store lock is held, so
/// implementations must not block on I/O or call back into the registry.
/// Closing twice must be harmless: a shallow copy of a client shares the same
/// resource.
pub trait Upstreams: Send + Sync + fmt::Debug {
    /// Release the resources
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Released
    /// - `Err(Error)`: Release failed; the caller decides whether to propagate
    fn close(&self) -> crate::Result<()>;
}
