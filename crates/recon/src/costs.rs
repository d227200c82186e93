//! Cost maps produced by sources and their application to clusters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;

/// Tracking numbers a source prices together (one receipt, one box).
///
/// Normalized on construction: trimmed, blanks dropped, duplicates removed,
/// first-seen order kept.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackingKey(Vec<String>);

impl TrackingKey {
    /// Returns `None` when no non-blank tracking number remains.
    pub fn new<I, S>(trackings: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut numbers: Vec<String> = Vec::new();
        for t in trackings {
            let t = t.as_ref().trim();
            if !t.is_empty() && !numbers.iter().any(|n| n == t) {
                numbers.push(t.to_string());
            }
        }
        if numbers.is_empty() {
            None
        } else {
            Some(Self(numbers))
        }
    }

    pub fn single(tracking: &str) -> Option<Self> {
        Self::new([tracking])
    }

    pub fn trackings(&self) -> &[String] {
        &self.0
    }

    pub fn overlaps(&self, set: &BTreeSet<String>) -> bool {
        self.0.iter().any(|t| set.contains(t))
    }
}

impl fmt::Display for TrackingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// What one source reported for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostMaps {
    /// Reimbursed cost per tracking key, in cents.
    #[serde(with = "entries")]
    pub tracking_costs: BTreeMap<TrackingKey, i64>,
    /// Cost per purchase order, in cents.
    pub po_costs: BTreeMap<String, i64>,
    /// Purchase orders each tracking number was seen on.
    pub tracking_pos: BTreeMap<String, BTreeSet<String>>,
}

impl CostMaps {
    pub fn is_empty(&self) -> bool {
        self.tracking_costs.is_empty() && self.po_costs.is_empty() && self.tracking_pos.is_empty()
    }

    pub fn known_keys(&self) -> BTreeSet<TrackingKey> {
        self.tracking_costs.keys().cloned().collect()
    }

    /// Later values win per key; purchase-order associations accumulate.
    pub fn extend(&mut self, other: CostMaps) {
        self.tracking_costs.extend(other.tracking_costs);
        self.po_costs.extend(other.po_costs);
        for (tracking, pos) in other.tracking_pos {
            self.tracking_pos.entry(tracking).or_default().extend(pos);
        }
    }

    pub fn link_po(&mut self, key: &TrackingKey, po: &str) {
        let po = po.trim();
        if po.is_empty() {
            return;
        }
        for t in key.trackings() {
            self.tracking_pos
                .entry(t.clone())
                .or_default()
                .insert(po.to_string());
        }
    }
}

/// Tracking keys serialize as a list of entries since JSON map keys must be
/// strings.
mod entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::TrackingKey;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        trackings: TrackingKey,
        cost_cents: i64,
    }

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<TrackingKey, i64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(k, v)| Entry {
                trackings: k.clone(),
                cost_cents: *v,
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<TrackingKey, i64>, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries.into_iter().map(|e| (e.trackings, e.cost_cents)).collect())
    }
}

/// Write a group's reported costs into its clusters.
///
/// Recomputes `tracked_cost` and `non_reimbursed_trackings` from scratch and
/// adds the purchase orders seen on the cluster's trackings, so applying the
/// same maps twice is harmless.
pub fn apply_costs(clusters: &mut [Cluster], group: &str, maps: &CostMaps) {
    let mut touched = 0usize;
    for cluster in clusters.iter_mut().filter(|c| c.group == group) {
        let mut tracked = 0i64;
        let mut reimbursed: BTreeSet<&str> = BTreeSet::new();
        for (key, cost) in &maps.tracking_costs {
            if !key.overlaps(&cluster.trackings) {
                continue;
            }
            tracked += cost;
            if *cost > 0 {
                reimbursed.extend(key.trackings().iter().map(String::as_str));
            }
        }
        cluster.tracked_cost_cents = tracked;
        cluster.non_reimbursed_trackings = cluster
            .trackings
            .iter()
            .filter(|t| !reimbursed.contains(t.as_str()))
            .cloned()
            .collect();

        for tracking in &cluster.trackings {
            if let Some(pos) = maps.tracking_pos.get(tracking) {
                cluster.purchase_orders.extend(pos.iter().cloned());
            }
        }
        touched += 1;
    }
    tracing::debug!(group, clusters = touched, "applied costs");
}

/// Set each cluster's billed amount from per-order billed amounts.
///
/// Clusters none of whose orders appear in `order_costs` keep their value.
pub fn fill_expected_costs(clusters: &mut [Cluster], order_costs: &BTreeMap<String, i64>) {
    for cluster in clusters.iter_mut() {
        let mut any = false;
        let mut total = 0i64;
        for order in &cluster.orders {
            if let Some(cost) = order_costs.get(order) {
                any = true;
                total += cost;
            }
        }
        if any {
            cluster.expected_cost_cents = total;
        }
    }
}
