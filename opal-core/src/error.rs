//! Engine error taxonomy.

use thiserror::Error;

use naas_client::ControllerError;

/// boxed store error; the concrete type differs per `LeaseStore` backend
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// the identifier cannot be resolved to a slice or sliver
    #[error("the identifier hasn't the expected format ({0})")]
    MalformedUrn(String),
    #[error("lease {name}({res_type}) not found")]
    LeaseNotFound { name: String, res_type: String },
    #[error("lease is already taken ({0})")]
    LeaseAlreadyTaken(String),
    #[error("desired lease duration is too far in the future ({0})")]
    DurationExceeded(String),
    /// the operation is not legal from the lease's current status
    #[error("only {expected} leases can be {op} in this aggregate ({name})")]
    UnsupportedTransition {
        name: String,
        expected: &'static str,
        op: &'static str,
    },
    /// the identifier kind is not accepted by this operation
    #[error("only slice or sliver identifiers can be {op} in this aggregate ({urn})")]
    UnsupportedOperation { op: &'static str, urn: String },
    /// the batch matched nothing at all
    #[error("there are no resources in the given slice(s)")]
    EmptyResult,
    #[error("controller error: {0}")]
    Controller(#[from] ControllerError),
    /// a reservation/reconciliation precondition failed
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("lease store error: {0}")]
    Store(#[source] BoxError),
}

impl Error {
    pub(crate) fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Store(Box::new(err))
    }
}
