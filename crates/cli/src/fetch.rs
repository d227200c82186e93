//! `shiprecon fetch`: one orchestrator call for a single group.
//!
//! Read-only: the ledger supplies the known keys but is not updated.

use std::path::PathBuf;

use shiprecon_io::csv::write_cost_map;
use shiprecon_io::CostLedger;
use shiprecon_sources::CostReconciler;

use crate::util::{flush, load_settings, open_output};
use crate::CliError;

pub fn cmd_fetch(
    config: Option<PathBuf>,
    group: String,
    full: bool,
    out: Option<PathBuf>,
) -> Result<(), CliError> {
    let reconciler = CostReconciler::new(load_settings(config)?);
    let known = CostLedger::load(&reconciler.settings().data_dir)?.known_keys(&group);

    let maps = reconciler.fetch_costs_with_retry(&group, &known, full)?;

    let (mut writer, label) = open_output(out.as_deref())?;
    write_cost_map(&mut writer, &maps)?;
    flush(writer, &label)?;

    eprintln!(
        "{}: {} tracking keys, {} purchase orders written to {}",
        group,
        maps.tracking_costs.len(),
        maps.po_costs.len(),
        label,
    );
    Ok(())
}
