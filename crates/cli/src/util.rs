// Shared plumbing for the commands: settings, stores, output targets

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use shiprecon_config::Settings;
use shiprecon_io::{ClusterStore, DirMirror};

use crate::CliError;

/// `--config`, else the default location.
pub fn config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(Settings::config_path)
}

/// Load and validate settings. A missing file means defaults.
pub fn load_settings(flag: Option<PathBuf>) -> Result<Settings, CliError> {
    let path = config_path(flag);
    let settings = Settings::load_or_default(&path)?;
    settings.validate().map_err(|e| {
        CliError::from(e).with_hint(format!("fix {} and run `shiprecon config validate`", path.display()))
    })?;
    Ok(settings)
}

pub fn cluster_store(settings: &Settings) -> ClusterStore {
    let store = ClusterStore::new(&settings.data_dir);
    match &settings.mirror_dir {
        Some(dir) => store.with_mirror(Box::new(DirMirror::new(dir))),
        None => store,
    }
}

/// Buffered writer for `--out`, or stdout. Returns a label for messages.
pub fn open_output(out: Option<&Path>) -> Result<(Box<dyn Write>, String), CliError> {
    match out {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| CliError::io(format!("cannot create {}: {}", path.display(), e)))?;
            Ok((Box::new(BufWriter::new(file)), path.display().to_string()))
        }
        None => Ok((
            Box::new(BufWriter::new(std::io::stdout().lock())),
            "stdout".to_string(),
        )),
    }
}

pub fn flush(mut writer: Box<dyn Write>, label: &str) -> Result<(), CliError> {
    writer
        .flush()
        .map_err(|e| CliError::io(format!("cannot write {}: {}", label, e)))
}
