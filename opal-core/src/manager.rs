//! Per-lease operations over the lease store.
//!
//! Every mutating method re-fetches the record, mutates it, and commits it
//! within the same call; nothing here holds a lease across operations, so a
//! record is never written back from a stale copy. The store's single-record
//! atomicity is the only serialization point.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use lease_store::{Lease, LeaseKey, LeaseStatus, LeaseStore};

use crate::{config::LeaseDurations, error::Error, policy};

#[derive(Debug)]
pub struct ResourceManager<S> {
    store: S,
    durations: LeaseDurations,
}

impl<S: Clone> Clone for ResourceManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            durations: self.durations,
        }
    }
}

impl<S> ResourceManager<S>
where
    S: LeaseStore,
{
    pub fn new(store: S, durations: LeaseDurations) -> Self {
        Self { store, durations }
    }

    pub fn durations(&self) -> &LeaseDurations {
        &self.durations
    }

    /// Create a new `allocated` lease. The requested end time is capped by
    /// the allocated maximum; a record already under the key refuses the
    /// reservation.
    pub async fn reserve_lease(
        &self,
        slice_name: &str,
        res_type: &str,
        res_name: &str,
        owner: &str,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Lease, Error> {
        let key = LeaseKey::new(slice_name, res_type, res_name);
        if self.store.get(&key).await.map_err(Error::store)?.is_some() {
            return Err(Error::LeaseAlreadyTaken(res_name.to_owned()));
        }

        let expires_at =
            policy::cap_end_time(Utc::now(), end_time, self.durations.allocated(), res_name)?;
        let lease = Lease {
            slice_name: slice_name.to_owned(),
            res_type: res_type.to_owned(),
            res_name: res_name.to_owned(),
            owner: owner.to_owned(),
            status: LeaseStatus::Allocated,
            expires_at,
        };

        debug!(hrn = %lease.hrn(), expires_at = %expires_at, "reserving lease");
        if let Err(err) = self.store.insert(&lease).await {
            // two reserves racing on one key; the store's key constraint is
            // the tiebreak
            warn!(%err, "insert failed, lease key likely taken by a concurrent reserve");
            return Err(Error::LeaseAlreadyTaken(res_name.to_owned()));
        }
        Ok(lease)
    }

    pub async fn find_lease(&self, key: &LeaseKey) -> Result<Lease, Error> {
        self.store
            .get(key)
            .await
            .map_err(Error::store)?
            .ok_or_else(|| Error::LeaseNotFound {
                name: key.res_name.clone(),
                res_type: key.res_type.clone(),
            })
    }

    pub async fn leases_in_slice(&self, slice_name: &str) -> Result<Vec<Lease>, Error> {
        self.store.list_slice(slice_name).await.map_err(Error::store)
    }

    /// every slice and its leases
    pub async fn all_leases(&self) -> Result<Vec<(String, Vec<Lease>)>, Error> {
        let mut results = Vec::new();
        for slice_name in self.store.slice_names().await.map_err(Error::store)? {
            let leases = self.store.list_slice(&slice_name).await.map_err(Error::store)?;
            results.push((slice_name, leases));
        }
        Ok(results)
    }

    /// Extend a lease's end time, capped by the policy maximum for its
    /// current status. Only live leases can be extended.
    pub async fn extend_lease(
        &self,
        key: &LeaseKey,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Lease, Error> {
        let mut lease = self.find_lease(key).await?;
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

        let max = self.durations.max_for(lease.status);
        lease.expires_at = policy::cap_end_time(Utc::now(), end_time, max, &lease.res_name)?;
        debug!(hrn = %lease.hrn(), expires_at = %lease.expires_at, "end time changed");
        self.commit(lease).await
    }

    /// Promote an `allocated` lease to `provisioned`. The extension is
    /// capped against the provisioned maximum and must pass before the
    /// status flips; both land in one commit.
    pub async fn promote_lease(
        &self,
        key: &LeaseKey,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Lease, Error> {
        let mut lease = self.find_lease(key).await?;
        if lease.status != LeaseStatus::Allocated {
            return Err(Error::UnsupportedTransition {
                name: lease.hrn(),
                expected: "allocated",
                op: "provisioned",
            });
        }

        lease.expires_at = policy::cap_end_time(
            Utc::now(),
            end_time,
            self.durations.provisioned(),
            &lease.res_name,
        )?;
        lease.status = LeaseStatus::Provisioned;
        debug!(hrn = %lease.hrn(), expires_at = %lease.expires_at, "promoting lease");
        self.commit(lease).await
    }

    /// Write an end time back verbatim. Used by the rollback engine to
    /// restore a captured value without re-capping it.
    pub async fn restore_end_time(
        &self,
        key: &LeaseKey,
        end_time: DateTime<Utc>,
    ) -> Result<Lease, Error> {
        let mut lease = self.find_lease(key).await?;
        lease.expires_at = end_time;
        debug!(hrn = %lease.hrn(), expires_at = %end_time, "end time restored");
        self.commit(lease).await
    }

    pub async fn change_status(&self, key: &LeaseKey, status: LeaseStatus) -> Result<Lease, Error> {
        let mut lease = self.find_lease(key).await?;
        debug!(hrn = %lease.hrn(), %status, "status changed");
        lease.status = status;
        self.commit(lease).await
    }

    /// delete the record, returning what was removed
    pub async fn free_lease(&self, key: &LeaseKey) -> Result<Lease, Error> {
        info!(hrn = %key.hrn(), "freeing lease");
        self.store
            .delete(key)
            .await
            .map_err(Error::store)?
            .ok_or_else(|| Error::LeaseNotFound {
                name: key.res_name.clone(),
                res_type: key.res_type.clone(),
            })
    }

    /// Re-insert a record captured before deletion. A best-effort
    /// reconstruction from the in-memory copy, used by the delete rollback.
    pub async fn undo_free(&self, lease: &Lease) -> Result<(), Error> {
        self.store.insert(lease).await.map_err(Error::store)
    }

    /// delete every lease whose end time has passed
    pub async fn expire_elements(&self) -> Result<usize, Error> {
        let expired = self
            .store
            .expired(Utc::now())
            .await
            .map_err(Error::store)?;

        let mut removed = 0;
        for lease in expired {
            info!(hrn = %lease.hrn(), "removing expired lease");
            match self.store.delete(&lease.key()).await {
                Ok(_) => removed += 1,
                // racing a concurrent delete is fine, the record is gone
                Err(err) => warn!(%err, hrn = %lease.hrn(), "failed to remove expired lease"),
            }
        }
        Ok(removed)
    }

    async fn commit(&self, lease: Lease) -> Result<Lease, Error> {
        self.store
            .update(&lease)
            .await
            .map_err(Error::store)?
            .ok_or_else(|| Error::LeaseNotFound {
                name: lease.res_name.clone(),
                res_type: lease.res_type.clone(),
            })
    }
}
