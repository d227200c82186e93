use std::path::PathBuf;

use shiprecon_io::csv::write_clusters;

use crate::util::{cluster_store, flush, load_settings, open_output};
use crate::CliError;

pub fn cmd_export(config: Option<PathBuf>, out: Option<PathBuf>) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    let clusters = cluster_store(&settings).load()?;

    let (mut writer, label) = open_output(out.as_deref())?;
    write_clusters(&mut writer, &clusters)?;
    flush(writer, &label)?;

    if out.is_some() {
        eprintln!("{} clusters written to {}", clusters.len(), label);
    }
    Ok(())
}
