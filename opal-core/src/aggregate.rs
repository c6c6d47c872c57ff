//! Batch operations over slices and slivers.
//!
//! One driver applies a lifecycle operation to every lease addressed by the
//! given identifiers and collects per-item rows. Under `best_effort` a
//! failing item is annotated and the batch keeps going; otherwise the first
//! failure undoes every mutation applied so far and fails the whole call, so
//! no partial effect is observably retained.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, instrument};

use lease_store::{Lease, LeaseStatus, LeaseStore};
use naas_client::{ConnectionId, Controller};

use crate::{
    config::LeaseDurations,
    error::Error,
    manager::ResourceManager,
    reconcile,
    rollback::RollbackLog,
    urn::{self, Identifier},
};

/// per-item annotation when a slice identifier matches no leases
pub const NO_RESOURCES_IN_SLICE: &str = "There are no resources in the given slice";

/// One row of a batch result: one lease, or one identifier that could not be
/// resolved (then only the error annotation is set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SliverStatus {
    pub urn: String,
    pub res_type: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub status: Option<LeaseStatus>,
    /// set when this item failed in a best-effort batch
    pub error: Option<String>,
}

impl SliverStatus {
    fn row(urn: String, lease: &Lease) -> Self {
        Self {
            urn,
            res_type: Some(lease.res_type.clone()),
            expires: Some(lease.expires_at),
            status: Some(lease.status),
            error: None,
        }
    }

    fn annotated(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn unresolved(urn: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            urn: urn.into(),
            res_type: None,
            expires: None,
            status: None,
            error: Some(error.into()),
        }
    }
}

/// A resource to reserve for a slice, along with the cross-connections the
/// resource should end up carrying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub res_type: String,
    pub res_name: String,
    pub connections: Vec<ConnectionId>,
}

/// the lifecycle operation a batch applies to each addressed lease
#[derive(Debug, Clone, Copy)]
enum BatchOp {
    Renew { expiration: Option<DateTime<Utc>> },
    Provision { end_time: Option<DateTime<Utc>> },
    Delete,
    Status,
}

impl BatchOp {
    fn rollback_log(&self) -> RollbackLog {
        match self {
            BatchOp::Renew { .. } => RollbackLog::timeouts(false),
            BatchOp::Provision { .. } => RollbackLog::timeouts(true),
            BatchOp::Delete => RollbackLog::deletes(),
            BatchOp::Status => RollbackLog::None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BatchOp::Renew { .. } => "renewed",
            BatchOp::Provision { .. } => "provisioned",
            BatchOp::Delete => "deleted",
            BatchOp::Status => "described",
        }
    }
}

/// The operations the protocol layer drives. Owns the per-lease manager and
/// the controller client.
pub struct Aggregate<S, C> {
    mgr: ResourceManager<S>,
    controller: C,
    authority: String,
}

impl<S, C> fmt::Debug for Aggregate<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregate")
            .field("authority", &self.authority)
            .finish()
    }
}

impl<S, C> Aggregate<S, C>
where
    S: LeaseStore,
    C: Controller,
{
    pub fn new(
        store: S,
        controller: C,
        durations: LeaseDurations,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            mgr: ResourceManager::new(store, durations),
            controller,
            authority: authority.into(),
        }
    }

    pub fn manager(&self) -> &ResourceManager<S> {
        &self.mgr
    }

    /// Reserve every requested resource for the slice and reconcile each
    /// resource's cross-connections.
    ///
    /// An availability, controller, or connection failure wipes the slice's
    /// current lease set (clean slate) before the error surfaces; a
    /// reservation guard failure (key taken, duration beyond the maximum)
    /// propagates as-is.
    #[instrument(level = "debug", skip(self, requests))]
    pub async fn allocate(
        &self,
        slice_urn: &str,
        requests: &[ResourceRequest],
        end_time: Option<DateTime<Utc>>,
        owner: &str,
    ) -> Result<Vec<SliverStatus>, Error> {
        let slice_name = Identifier::slice_name(slice_urn)?;

        let mut reserved = Vec::new();
        for req in requests {
            match self
                .controller
                .check_availability(&req.res_type, &req.res_name)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    self.rollback_allocates(&slice_name).await?;
                    return Err(Error::MalformedRequest(format!(
                        "the resource you are trying to allocate is not available ({} {})",
                        req.res_type, req.res_name
                    )));
                }
                Err(err) => {
                    self.rollback_allocates(&slice_name).await?;
                    return Err(err.into());
                }
            }

            let lease = self
                .mgr
                .reserve_lease(&slice_name, &req.res_type, &req.res_name, owner, end_time)
                .await?;

            if let Err(err) = reconcile::apply(
                &self.controller,
                &req.res_type,
                &req.res_name,
                &req.connections,
            )
            .await
            {
                self.rollback_allocates(&slice_name).await?;
                return Err(err);
            }

            reserved.push(SliverStatus::row(
                urn::sliver_urn(&self.authority, &lease),
                &lease,
            ));
        }

        if reserved.is_empty() {
            return Err(Error::EmptyResult);
        }
        Ok(reserved)
    }

    /// extend the addressed leases' end times
    pub async fn renew(
        &self,
        urns: &[String],
        expiration: Option<DateTime<Utc>>,
        best_effort: bool,
    ) -> Result<Vec<SliverStatus>, Error> {
        self.run_batch(urns, BatchOp::Renew { expiration }, best_effort)
            .await
    }

    /// promote the addressed leases to `provisioned`
    pub async fn provision(
        &self,
        urns: &[String],
        end_time: Option<DateTime<Utc>>,
        best_effort: bool,
    ) -> Result<Vec<SliverStatus>, Error> {
        self.run_batch(urns, BatchOp::Provision { end_time }, best_effort)
            .await
    }

    /// release the addressed leases; their records are deleted
    pub async fn delete(
        &self,
        urns: &[String],
        best_effort: bool,
    ) -> Result<Vec<SliverStatus>, Error> {
        self.run_batch(urns, BatchOp::Delete, best_effort).await
    }

    /// report the addressed leases without touching them
    pub async fn status(&self, urns: &[String]) -> Result<Vec<SliverStatus>, Error> {
        self.run_batch(urns, BatchOp::Status, false).await
    }

    /// Administratively halt every lease in the slice. Records are kept,
    /// carrying the terminal `shutdown` status. Only reachable per slice.
    #[instrument(level = "debug", skip(self))]
    pub async fn shutdown(&self, slice_urn: &str) -> Result<Vec<SliverStatus>, Error> {
        let slice_name = match Identifier::classify(slice_urn) {
            Identifier::Slice { slice_name } => slice_name,
            _ => {
                return Err(Error::UnsupportedOperation {
                    op: "shut down",
                    urn: slice_urn.to_owned(),
                })
            }
        };

        let leases = self.mgr.leases_in_slice(&slice_name).await?;
        if leases.is_empty() {
            return Err(Error::EmptyResult);
        }

        let mut results = Vec::new();
        for lease in leases {
            if !matches!(
                lease.status,
                LeaseStatus::Allocated | LeaseStatus::Provisioned
            ) {
                return Err(Error::UnsupportedTransition {
                    name: lease.hrn(),
                    expected: "allocated or provisioned",
                    op: "shut down",
                });
            }
            let updated = self
                .mgr
                .change_status(&lease.key(), LeaseStatus::Shutdown)
                .await?;
            results.push(SliverStatus::row(
                urn::sliver_urn(&self.authority, &updated),
                &updated,
            ));
        }
        Ok(results)
    }

    /// every slice and its leases
    pub async fn all_leases(&self) -> Result<Vec<(String, Vec<Lease>)>, Error> {
        self.mgr.all_leases().await
    }

    /// Resolve each identifier, apply `op` to each addressed lease, and
    /// enforce the tolerance policy. Identifiers are processed in the order
    /// supplied; slices expand in store enumeration order.
    #[instrument(level = "debug", skip(self, urns))]
    async fn run_batch(
        &self,
        urns: &[String],
        op: BatchOp,
        best_effort: bool,
    ) -> Result<Vec<SliverStatus>, Error> {
        let mut results = Vec::new();
        let mut undo = op.rollback_log();

        for raw in urns {
            match Identifier::classify(raw) {
                Identifier::Slice { slice_name } => {
                    let leases = match self.mgr.leases_in_slice(&slice_name).await {
                        Ok(leases) => leases,
                        Err(err) => return Self::abort(&self.mgr, undo, err).await,
                    };
                    if leases.is_empty() {
                        // surfaced rather than silently dropped, in both modes
                        results.push(SliverStatus::unresolved(raw.as_str(), NO_RESOURCES_IN_SLICE));
                        continue;
                    }
                    for lease in leases {
                        match self.apply(op, &lease, &mut undo).await {
                            Ok(row) => results.push(row),
                            Err(err) if best_effort => results.push(
                                SliverStatus::row(
                                    urn::sliver_urn(&self.authority, &lease),
                                    &lease,
                                )
                                .annotated(err.to_string()),
                            ),
                            Err(err) => return Self::abort(&self.mgr, undo, err).await,
                        }
                    }
                }
                Identifier::Sliver { key } => {
                    let lease = match self.mgr.find_lease(&key).await {
                        Ok(lease) => lease,
                        Err(err @ Error::LeaseNotFound { .. }) if best_effort => {
                            results.push(SliverStatus::unresolved(raw.as_str(), err.to_string()));
                            continue;
                        }
                        Err(err) => return Self::abort(&self.mgr, undo, err).await,
                    };
                    match self.apply(op, &lease, &mut undo).await {
                        Ok(row) => results.push(row),
                        Err(err) if best_effort => results.push(
                            SliverStatus::row(urn::sliver_urn(&self.authority, &lease), &lease)
                                .annotated(err.to_string()),
                        ),
                        Err(err) => return Self::abort(&self.mgr, undo, err).await,
                    }
                }
                Identifier::Other => {
                    if best_effort {
                        results.push(SliverStatus::unresolved(
                            raw.as_str(),
                            format!(
                                "Only slice or sliver identifiers can be {} in this aggregate",
                                op.name()
                            ),
                        ));
                    } else {
                        // nothing was mutated for this identifier, but
                        // earlier items may have been
                        return Self::abort(
                            &self.mgr,
                            undo,
                            Error::UnsupportedOperation {
                                op: op.name(),
                                urn: raw.clone(),
                            },
                        )
                        .await;
                    }
                }
            }
        }

        if results.is_empty() {
            return Err(Error::EmptyResult);
        }
        Ok(results)
    }

    /// apply one operation to one lease, recording what a strict abort would
    /// have to undo
    async fn apply(
        &self,
        op: BatchOp,
        lease: &Lease,
        undo: &mut RollbackLog,
    ) -> Result<SliverStatus, Error> {
        let urn = urn::sliver_urn(&self.authority, lease);
        match op {
            BatchOp::Renew { expiration } => {
                // guard before recording: a lease that never passes the guard
                // must not be touched by a later rollback
                if !matches!(
                    lease.status,
                    LeaseStatus::Allocated | LeaseStatus::Provisioned
                ) {
                    return Err(Error::UnsupportedTransition {
                        name: lease.hrn(),
                        expected: "allocated or provisioned",
                        op: "renewed",
                    });
                }
                undo.record_timeout(lease);
                let updated = self.mgr.extend_lease(&lease.key(), expiration).await?;
                Ok(SliverStatus::row(urn, &updated))
            }
            BatchOp::Provision { end_time } => {
                if lease.status != LeaseStatus::Allocated {
                    return Err(Error::UnsupportedTransition {
                        name: lease.hrn(),
                        expected: "allocated",
                        op: "provisioned",
                    });
                }
                undo.record_timeout(lease);
                let updated = self.mgr.promote_lease(&lease.key(), end_time).await?;
                Ok(SliverStatus::row(urn, &updated))
            }
            BatchOp::Delete => {
                let removed = self.mgr.free_lease(&lease.key()).await?;
                undo.record_delete(removed.clone());
                Ok(SliverStatus {
                    urn,
                    res_type: Some(removed.res_type.clone()),
                    expires: Some(removed.expires_at),
                    status: Some(LeaseStatus::Unallocated),
                    error: None,
                })
            }
            BatchOp::Status => Ok(SliverStatus::row(urn, lease)),
        }
    }

    async fn abort(
        mgr: &ResourceManager<S>,
        undo: RollbackLog,
        err: Error,
    ) -> Result<Vec<SliverStatus>, Error> {
        undo.undo(mgr).await?;
        Err(err)
    }

    /// Clean slate on allocation failure: every lease currently recorded
    /// under the slice goes, not only the ones this call added.
    async fn rollback_allocates(&self, slice_name: &str) -> Result<(), Error> {
        error!(slice = %slice_name, "errors found -- allocate rollback begins");
        for lease in self.mgr.leases_in_slice(slice_name).await? {
            self.mgr.free_lease(&lease.key()).await?;
        }
        Ok(())
    }
}
