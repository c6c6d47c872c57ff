//! opal prelude

pub use crate::{
    aggregate::{Aggregate, ResourceRequest, SliverStatus},
    config::{LeaseDurations, OpalConfig},
    error::Error,
    manager::ResourceManager,
    sweep::ExpirySweepGuard,
    tracing::{self, debug, error, info, instrument, trace, warn},
    urn::Identifier,
};

pub use lease_store::{Lease, LeaseKey, LeaseStatus, LeaseStore};
pub use naas_client::{ConnectionId, ConnectionParams, Controller, ControllerError};

pub use std::sync::Arc;
