//! Cluster ingestion, transitive merge and de-duplication.
//!
//! All passes are sequential over one in-memory collection. Merge order
//! matters for which cluster survives as the representative, never for the
//! merged field values.

use std::collections::BTreeSet;

use crate::cluster::Cluster;
use crate::costs::{apply_costs, CostMaps};
use crate::tracking::Tracking;

/// Index of the first cluster in the tracking's group sharing an order id.
pub fn find_cluster(clusters: &[Cluster], tracking: &Tracking) -> Option<usize> {
    clusters.iter().position(|c| {
        c.group == tracking.group && !c.orders.is_disjoint(&tracking.order_ids)
    })
}

/// Fold observed trackings into the collection, creating clusters on demand.
///
/// Lookup is first-match over the collection as it stands at each step, so
/// a cluster created for an earlier tracking in the same batch is visible to
/// later ones.
pub fn update(clusters: &mut Vec<Cluster>, trackings: &[Tracking]) {
    let before = clusters.len();
    for tracking in trackings {
        let idx = match find_cluster(clusters, tracking) {
            Some(idx) => idx,
            None => {
                clusters.push(Cluster::new(tracking.group.clone()));
                clusters.len() - 1
            }
        };

        let cluster = &mut clusters[idx];
        cluster.orders.extend(tracking.order_ids.iter().cloned());
        cluster.trackings.insert(tracking.tracking_number.clone());
        if tracking.ship_date > cluster.last_ship_date {
            cluster.last_ship_date = tracking.ship_date.clone();
        }
        cluster.to_email = tracking.to_email.clone();
    }
    tracing::debug!(
        trackings = trackings.len(),
        created = clusters.len() - before,
        "ingested trackings"
    );
}

/// Index of the first candidate in `cluster`'s group sharing a purchase order.
///
/// A cluster without purchase orders never matches anything.
pub fn find_by_shared_key(cluster: &Cluster, candidates: &[Cluster]) -> Option<usize> {
    if cluster.purchase_orders.is_empty() {
        return None;
    }
    candidates.iter().position(|c| {
        c.group == cluster.group && !c.purchase_orders.is_disjoint(&cluster.purchase_orders)
    })
}

/// One fold over the collection: each cluster joins the first earlier result
/// it shares a purchase order with, or starts a new result.
pub fn run_merge_iteration(clusters: Vec<Cluster>) -> Vec<Cluster> {
    let mut result: Vec<Cluster> = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        match find_by_shared_key(&cluster, &result) {
            Some(idx) => result[idx].merge_with(&cluster),
            None => result.push(cluster),
        }
    }
    result
}

/// Merge clusters connected through shared purchase orders until no pass
/// reduces the count.
///
/// A single pass can miss a chain where a later cluster bridges two results
/// that were already separate, so passes repeat to a fixpoint. The result is
/// one cluster per connected component of the "shares a purchase order"
/// relation within a group.
pub fn merge_by_shared_key(mut clusters: Vec<Cluster>) -> Vec<Cluster> {
    let mut passes = 0;
    loop {
        let prev_len = clusters.len();
        clusters = run_merge_iteration(clusters);
        passes += 1;
        if clusters.len() == prev_len {
            break;
        }
    }
    tracing::debug!(passes, clusters = clusters.len(), "merge by purchase order reached fixpoint");
    clusters
}

/// Apply each group's costs, merge by purchase order, then dedupe.
///
/// Costs are applied once before the merge, which attaches purchase orders,
/// and again on the merged clusters. `merge_with` adds amounts, so a key
/// spanning two merged clusters would otherwise be counted twice.
pub fn consolidate(mut clusters: Vec<Cluster>, costs: &[(&str, &CostMaps)]) -> Vec<Cluster> {
    for (group, maps) in costs {
        apply_costs(&mut clusters, group, maps);
    }
    let mut clusters = merge_by_shared_key(clusters);
    for (group, maps) in costs {
        apply_costs(&mut clusters, group, maps);
    }
    dedupe(clusters)
}

/// Drop clusters without a group and clusters that re-claim a tracking
/// already claimed by an earlier cluster.
///
/// Earlier clusters win. The dropped cluster's costs are not carried over.
pub fn dedupe(clusters: Vec<Cluster>) -> Vec<Cluster> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut result = Vec::with_capacity(clusters.len());
    let mut dropped = 0usize;
    for cluster in clusters {
        if cluster.group.is_empty() {
            dropped += 1;
            continue;
        }
        if cluster.trackings.is_disjoint(&seen) {
            seen.extend(cluster.trackings.iter().cloned());
            result.push(cluster);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        tracing::info!(dropped, kept = result.len(), "dropped duplicate clusters");
    }
    result
}
