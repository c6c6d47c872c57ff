//! # lease-store
//!
//! `lease-store` defines a trait `LeaseStore` that provides the durable table
//! of lease records, keyed by (slice, resource type, resource name), with
//! atomic single-record operations.
//!
//! This trait is not meant to be used by callers directly. Instead, it's
//! wrapped by `opal-core`'s `ResourceManager`, which re-fetches, mutates, and
//! commits a record within each call so that no lease is ever acted on from a
//! stale copy.

pub mod memory;
pub mod sqlite;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a lease.
///
/// `Allocated` and `Provisioned` are live states. `Unallocated` and `Shutdown`
/// are terminal: an unallocated lease has no record anymore (the status only
/// shows up in operation results), a shutdown record is retained until the
/// expiry sweep removes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Allocated,
    Provisioned,
    Unallocated,
    Shutdown,
}

impl LeaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseStatus::Allocated => "allocated",
            LeaseStatus::Provisioned => "provisioned",
            LeaseStatus::Unallocated => "unallocated",
            LeaseStatus::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for LeaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown lease status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for LeaseStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allocated" => Ok(LeaseStatus::Allocated),
            "provisioned" => Ok(LeaseStatus::Provisioned),
            "unallocated" => Ok(LeaseStatus::Unallocated),
            "shutdown" => Ok(LeaseStatus::Shutdown),
            other => Err(ParseStatusError(other.to_owned())),
        }
    }
}

/// Composite key identifying a lease. At most one record exists per key at
/// any time, the store rejects a second insert for the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeaseKey {
    pub slice_name: String,
    pub res_type: String,
    pub res_name: String,
}

impl LeaseKey {
    pub fn new(
        slice_name: impl Into<String>,
        res_type: impl Into<String>,
        res_name: impl Into<String>,
    ) -> Self {
        Self {
            slice_name: slice_name.into(),
            res_type: res_type.into(),
            res_name: res_name.into(),
        }
    }

    /// human readable name, `slice.type.name`
    pub fn hrn(&self) -> String {
        format!("{}.{}.{}", self.slice_name, self.res_type, self.res_name)
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.slice_name, self.res_type, self.res_name)
    }
}

/// A reservation record binding a slice to one physical resource for a
/// bounded time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub slice_name: String,
    pub res_type: String,
    pub res_name: String,
    /// opaque owner identifier, handed in by the caller
    pub owner: String,
    pub status: LeaseStatus,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn key(&self) -> LeaseKey {
        LeaseKey::new(&self.slice_name, &self.res_type, &self.res_name)
    }

    /// human readable name, `slice.type.name`
    pub fn hrn(&self) -> String {
        format!("{}.{}.{}", self.slice_name, self.res_type, self.res_name)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[async_trait]
pub trait LeaseStore: Send + Sync + 'static {
    // send/sync/static required for async trait bounds
    type Error: std::error::Error + Send + Sync + 'static;

    /// insert a new record; errors if the key is already present
    async fn insert(&self, lease: &Lease) -> Result<(), Self::Error>;
    /// fetch one record by key
    async fn get(&self, key: &LeaseKey) -> Result<Option<Lease>, Self::Error>;
    /// every lease belonging to one slice, in store enumeration order
    async fn list_slice(&self, slice_name: &str) -> Result<Vec<Lease>, Self::Error>;
    /// distinct slice names present in the table
    async fn slice_names(&self) -> Result<Vec<String>, Self::Error>;
    /// overwrite an existing record; returns the stored record, or `None` if
    /// the key has disappeared in the meantime
    async fn update(&self, lease: &Lease) -> Result<Option<Lease>, Self::Error>;
    /// remove a record, returning what was removed
    async fn delete(&self, key: &LeaseKey) -> Result<Option<Lease>, Self::Error>;
    /// every lease whose expiry has passed at `now`
    async fn expired(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, Self::Error>;
}
