//! Compensating strategies for strict batches that abort partway through.
//!
//! The batch driver records every applied mutation here; on abort the log is
//! undone in reverse application order. A failed undo step propagates, there
//! is no nested compensation.

use chrono::{DateTime, Utc};
use tracing::error;

use lease_store::{Lease, LeaseStatus, LeaseStore};

use crate::{error::Error, manager::ResourceManager};

#[derive(Debug)]
pub(crate) enum RollbackLog {
    /// renew/provision batches: restore each captured end time and, for
    /// promotions, the `allocated` status
    Timeouts {
        entries: Vec<(Lease, DateTime<Utc>)>,
        restore_status: bool,
    },
    /// delete batches: re-insert each captured record
    Deletes { entries: Vec<Lease> },
    /// read-only batches have nothing to undo
    None,
}

impl RollbackLog {
    pub(crate) fn timeouts(restore_status: bool) -> Self {
        RollbackLog::Timeouts {
            entries: Vec::new(),
            restore_status,
        }
    }

    pub(crate) fn deletes() -> Self {
        RollbackLog::Deletes {
            entries: Vec::new(),
        }
    }

    /// capture a lease's end time (and implicitly its status) before an
    /// extension touches it
    pub(crate) fn record_timeout(&mut self, lease: &Lease) {
        if let RollbackLog::Timeouts { entries, .. } = self {
            entries.push((lease.clone(), lease.expires_at));
        }
    }

    /// capture a record as it was deleted
    pub(crate) fn record_delete(&mut self, lease: Lease) {
        if let RollbackLog::Deletes { entries } = self {
            entries.push(lease);
        }
    }

    /// run the compensation
    pub(crate) async fn undo<S>(self, mgr: &ResourceManager<S>) -> Result<(), Error>
    where
        S: LeaseStore,
    {
        match self {
            RollbackLog::Timeouts {
                entries,
                restore_status,
            } => {
                if entries.is_empty() {
                    return Ok(());
                }
                error!("errors found -- timeouts rollback begins");
                for (lease, prev_end) in entries.into_iter().rev() {
                    let key = lease.key();
                    mgr.restore_end_time(&key, prev_end).await?;
                    if restore_status {
                        mgr.change_status(&key, LeaseStatus::Allocated).await?;
                    }
                }
            }
            RollbackLog::Deletes { entries } => {
                if entries.is_empty() {
                    return Ok(());
                }
                error!("errors found -- delete rollback begins");
                for lease in entries.into_iter().rev() {
                    mgr.undo_free(&lease).await?;
                }
            }
            RollbackLog::None => {}
        }
        Ok(())
    }
}
