//! Cross-connection reconciliation: compute and apply the minimal
//! add/remove diff between a resource's desired and active connection sets.

use tracing::{debug, info};

use naas_client::{ConnectionId, Controller};

use crate::error::Error;

/// The add/remove sets that turn an active connection set into a desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDiff {
    pub additions: Vec<ConnectionId>,
    pub removals: Vec<ConnectionId>,
}

impl ConnectionDiff {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }
}

/// `additions = desired \ active`, `removals = active \ desired`
pub fn diff(desired: &[ConnectionId], active: &[ConnectionId]) -> ConnectionDiff {
    let mut removals = active.to_vec();
    let mut additions = Vec::new();

    for want in desired {
        if let Some(pos) = removals.iter().position(|have| have == want) {
            // already active, keep it
            removals.remove(pos);
        } else {
            additions.push(want.clone());
        }
    }

    ConnectionDiff {
        additions,
        removals,
    }
}

/// Fetch the resource's active set, compute the diff against `desired`, and
/// apply it.
///
/// A failed fetch aborts before anything is touched. A failed add or remove
/// is *not* reversed here; the allocation that drives the reconciliation
/// compensates one level up by deleting the owning lease(s).
pub async fn apply<C>(
    controller: &C,
    res_type: &str,
    res_name: &str,
    desired: &[ConnectionId],
) -> Result<ConnectionDiff, Error>
where
    C: Controller,
{
    let active = controller
        .list_connections(res_type, res_name)
        .await
        .map_err(|err| {
            Error::MalformedRequest(format!(
                "cannot fetch active connections for {res_type} {res_name}: {err}"
            ))
        })?;

    let diff = diff(desired, &active);
    debug!(?diff, res_name, "reconciling cross-connections");

    for conn in &diff.additions {
        let params = conn
            .params()
            .map_err(|err| Error::MalformedRequest(err.to_string()))?;
        info!(%conn, res_name, "creating cross-connection");
        controller
            .create_connection(res_type, res_name, conn, &params)
            .await?;
    }
    for conn in &diff.removals {
        info!(%conn, res_name, "removing cross-connection");
        controller.remove_connection(res_type, res_name, conn).await?;
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ConnectionId> {
        raw.iter().map(|s| ConnectionId::new(*s)).collect()
    }

    #[test]
    fn kept_connections_are_neither_added_nor_removed() {
        let desired = ids(&["A:1::B:2"]);
        let active = ids(&["A:1::B:2", "C:3::D:4"]);

        let diff = diff(&desired, &active);
        assert!(diff.additions.is_empty());
        assert_eq!(diff.removals, ids(&["C:3::D:4"]));
    }

    #[test]
    fn additions_are_desired_minus_active() {
        let desired = ids(&["A:1::B:2", "E:5::F:6"]);
        let active = ids(&["A:1::B:2", "C:3::D:4"]);

        let diff = diff(&desired, &active);
        assert_eq!(diff.additions, ids(&["E:5::F:6"]));
        assert_eq!(diff.removals, ids(&["C:3::D:4"]));
    }

    #[test]
    fn applying_the_diff_to_active_yields_desired() {
        let desired = ids(&["A:1::B:2", "E:5::F:6", "G:7::H:8"]);
        let active = ids(&["C:3::D:4", "E:5::F:6"]);

        let diff = diff(&desired, &active);
        let mut result: Vec<ConnectionId> = active
            .iter()
            .filter(|conn| !diff.removals.contains(conn))
            .cloned()
            .collect();
        result.extend(diff.additions.iter().cloned());

        let mut result_sorted = result;
        result_sorted.sort();
        let mut desired_sorted = desired;
        desired_sorted.sort();
        assert_eq!(result_sorted, desired_sorted);
    }

    #[test]
    fn identical_sets_are_a_no_op() {
        let set = ids(&["A:1::B:2", "C:3::D:4"]);
        assert!(diff(&set, &set).is_empty());
    }

    #[test]
    fn empty_active_set_adds_everything() {
        let desired = ids(&["A:1::B:2"]);
        let diff = diff(&desired, &[]);
        assert_eq!(diff.additions, desired);
        assert!(diff.removals.is_empty());
    }
}
