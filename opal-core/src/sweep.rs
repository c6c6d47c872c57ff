//! Background expiry sweep: periodically deletes leases past their end time.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, trace};

use lease_store::LeaseStore;

use crate::manager::ResourceManager;

/// The task runner for the expiry sweep; the task is aborted on drop.
#[derive(Debug)]
pub struct ExpirySweepGuard {
    task_handle: JoinHandle<()>,
}

impl Drop for ExpirySweepGuard {
    fn drop(&mut self) {
        trace!("ExpirySweepGuard drop called");
        self.task_handle.abort();
    }
}

/// Spawn the sweep with the given period.
///
/// The sweep may interleave with any in-flight operation; an operation that
/// loses the race on a key observes `LeaseNotFound`, which is the accepted
/// outcome.
pub fn spawn<S>(mgr: ResourceManager<S>, period: Duration) -> ExpirySweepGuard
where
    S: LeaseStore,
{
    let task_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(err) = mgr.expire_elements().await {
                error!(%err, "expiry sweep failed");
            }
        }
    });
    ExpirySweepGuard { task_handle }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use lease_store::{memory::MemoryStore, Lease, LeaseStatus, LeaseStore};

    use super::*;
    use crate::config::LeaseDurations;

    #[tokio::test]
    async fn sweep_removes_expired_leases() {
        let store = MemoryStore::new();
        store
            .insert(&Lease {
                slice_name: "alice".into(),
                res_type: "roadm".into(),
                res_name: "r1".into(),
                owner: "owner".into(),
                status: LeaseStatus::Allocated,
                expires_at: Utc::now() - ChronoDuration::seconds(1),
            })
            .await
            .expect("seed expired lease");

        let mgr = ResourceManager::new(store.clone(), LeaseDurations::default());
        let _guard = spawn(mgr, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store
            .expired(Utc::now())
            .await
            .expect("expired query")
            .is_empty());
    }
}
