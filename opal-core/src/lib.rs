//! # opal
//!
//! opal grants, extends, and revokes time-bounded exclusive reservations
//! ("leases") of named physical resources on behalf of slices, and keeps
//! each reserved resource's cross-connection set reconciled against the
//! external NaaS controller that owns the hardware.
//!
//! The protocol front-end (request document decoding, transport) lives above
//! this crate; everything here speaks plain types.
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity)]

pub use anyhow;
pub use async_trait::async_trait;
pub use chrono;
pub use tokio;
pub use tracing;

pub use lease_store;
pub use naas_client;

pub mod aggregate;
pub mod config;
pub mod error;
pub mod manager;
pub mod policy;
pub mod prelude;
pub mod reconcile;
mod rollback;
pub mod sweep;
pub mod urn;
