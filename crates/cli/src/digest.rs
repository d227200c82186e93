//! `shiprecon digest`: the new-trackings notification as plain text, plus
//! the tracking spreadsheet its footer points at.

use std::io::Write;
use std::path::PathBuf;

use chrono::NaiveDate;
use shiprecon_io::csv::{import_trackings, write_trackings};
use shiprecon_recon::digest::{digest_subject, render_digest};

use crate::util::{flush, open_output};
use crate::CliError;

pub fn cmd_digest(
    trackings: PathBuf,
    date: Option<String>,
    out: Option<PathBuf>,
    csv: Option<PathBuf>,
) -> Result<(), CliError> {
    let date = match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|_| CliError::args(format!("invalid --date '{}'", s)).with_hint("use YYYY-MM-DD"))?,
        None => chrono::Local::now().date_naive(),
    };
    let trackings = import_trackings(&trackings)?;

    let (mut writer, label) = open_output(out.as_deref())?;
    write!(
        writer,
        "Subject: {}\n\n{}\n",
        digest_subject(date),
        render_digest(&trackings)
    )
    .map_err(|e| CliError::io(format!("cannot write {}: {}", label, e)))?;
    flush(writer, &label)?;

    if let Some(csv) = &csv {
        let (writer, label) = open_output(Some(csv))?;
        write_trackings(writer, &trackings)?;
        eprintln!("wrote {}", label);
    }
    Ok(())
}
