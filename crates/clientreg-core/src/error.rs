//! Error types for the client registry
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the client registry
#[derive(Error, Debug)]
pub enum Error {
    /// Another persistent client already has this UID
    #[error("another client {holder:?} uses the same uid")]
    DuplicateUid {
        /// Name of the client holding the UID
        holder: String,
    },

    /// Another persistent client already has this name
    #[error("another client uses the same name {name:?}")]
    DuplicateName {
        /// The clashing name
        name: String,
    },

    /// Another persistent client already claims this IP address
    #[error("another client {holder:?} uses the same IP \"{ip}\"")]
    DuplicateIp {
        /// The clashing address, zone included
        ip: String,
        /// Name of the client holding the address
        holder: String,
    },

    /// Another persistent client already claims this subnet
    #[error("another client {holder:?} uses the same subnet \"{subnet}\"")]
    DuplicateSubnet {
        /// The clashing prefix
        subnet: String,
        /// Name of the client holding the prefix
        holder: String,
    },

    /// Another persistent client already claims this ClientID
    #[error("another client {holder:?} uses the same ClientID {client_id:?}")]
    DuplicateClientId {
        /// The clashing ClientID
        client_id: String,
        /// Name of the client holding the ClientID
        holder: String,
    },

    /// Another persistent client already claims this hardware address
    #[error("another client {holder:?} uses the same MAC \"{mac}\"")]
    DuplicateMac {
        /// The clashing hardware address
        mac: String,
        /// Name of the client holding the address
        holder: String,
    },

    /// Client not found
    #[error("client {0:?} is not found")]
    NotFound(String),

    /// Malformed persistent client
    #[error("invalid client: {0}")]
    Validation(String),

    /// Identifier parsing errors
    #[error("parse error: {0}")]
    Parse(String),

    /// Releasing upstream resources failed
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Several upstream resources failed to release
    #[error("closing upstreams: {}", join_errors(.0))]
    Upstreams(Vec<Error>),

    /// An error annotated with the operation that produced it
    #[error("{context}: {source}")]
    Context {
        /// Operation description, e.g. "adding client"
        context: &'static str,
        /// Underlying error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an upstream error
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Wrap this error with an operation description
    pub fn context(self, context: &'static str) -> Self {
        Self::Context {
            context,
            source: Box::new(self),
        }
    }

    /// The innermost error, with all [`Error::Context`] layers removed
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// Whether the root error is one of the uniqueness violations
    pub fn is_clash(&self) -> bool {
        matches!(
            self.root(),
            Error::DuplicateUid { .. }
                | Error::DuplicateName { .. }
                | Error::DuplicateIp { .. }
                | Error::DuplicateSubnet { .. }
                | Error::DuplicateClientId { .. }
                | Error::DuplicateMac { .. }
        )
    }
}

fn join_errors(errs: &[Error]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Extension for annotating results, mirroring [`Error::context`]
pub(crate) trait ResultExt<T> {
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|err| err.context(context))
    }
}
