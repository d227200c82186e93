//! `shiprecon reconcile`: one full batch pass over the cluster store.
//!
//! Order matters: trackings are ingested before costs are applied so new
//! trackings get priced. Costs are applied before the purchase-order merge
//! because applying is what attaches purchase orders to clusters, and again
//! after it because merging sums the amounts of the merged clusters.

use std::path::PathBuf;

use shiprecon_io::csv::{import_order_costs, import_trackings, write_clusters};
use shiprecon_io::CostLedger;
use shiprecon_recon::money::format_cents;
use shiprecon_recon::{consolidate, fill_expected_costs, update, CostMaps};
use shiprecon_sources::{CostReconciler, FetchError};

use crate::util::{cluster_store, flush, load_settings, open_output};
use crate::CliError;

pub struct ReconcileArgs {
    pub trackings: PathBuf,
    pub orders: Option<PathBuf>,
    pub groups: Vec<String>,
    pub full: bool,
    pub skip_fetch: bool,
    pub out: Option<PathBuf>,
}

pub fn cmd_reconcile(config: Option<PathBuf>, args: ReconcileArgs) -> Result<(), CliError> {
    let reconciler = CostReconciler::new(load_settings(config)?);
    let settings = reconciler.settings();

    // Read every input before touching anything on disk.
    let trackings = import_trackings(&args.trackings)?;
    let order_costs = args.orders.as_deref().map(import_order_costs).transpose()?;

    let groups: Vec<String> = if args.groups.is_empty() {
        reconciler.groups().map(str::to_string).collect()
    } else {
        for group in &args.groups {
            if settings.group(group).is_none() {
                return Err(FetchError::UnknownGroup(group.clone()).into());
            }
        }
        args.groups.clone()
    };

    let store = cluster_store(settings);
    let mut clusters = store.load()?;
    let before = clusters.len();
    update(&mut clusters, &trackings);
    tracing::info!(
        trackings = trackings.len(),
        new_clusters = clusters.len() - before,
        "ingested trackings",
    );

    let mut ledger = CostLedger::load(&settings.data_dir)?;
    if args.skip_fetch {
        tracing::info!("skipping fetch, using ledger costs");
    } else {
        for group in &groups {
            let known = ledger.known_keys(group);
            let fetched = reconciler.fetch_costs_with_retry(group, &known, args.full)?;
            ledger.merge(group, fetched);
            // A later group failing must not lose this one's costs.
            ledger.save()?;
        }
    }

    if let Some(order_costs) = &order_costs {
        fill_expected_costs(&mut clusters, order_costs);
    }
    let costs: Vec<(&str, &CostMaps)> = ledger.groups().collect();
    let clusters = consolidate(clusters, &costs);
    let clusters = store.save(clusters)?;

    if let Some(out) = &args.out {
        let (mut writer, label) = open_output(Some(out))?;
        write_clusters(&mut writer, &clusters)?;
        flush(writer, &label)?;
        eprintln!("wrote {}", label);
    }

    let unreimbursed = clusters
        .iter()
        .filter(|c| !c.non_reimbursed_trackings.is_empty())
        .count();
    let diff: i64 = clusters.iter().map(|c| c.total_diff_cents()).sum();
    eprintln!(
        "{} clusters, {} with non-reimbursed trackings, total diff {}",
        clusters.len(),
        unreimbursed,
        format_cents(diff),
    );
    Ok(())
}
