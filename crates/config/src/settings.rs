// Settings: data paths, retry budget and one table per buying group

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "SHIPRECON_CONFIG";

/// Which kind of backend a group's costs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Receipts portal with a paginated JSON listing.
    Portal,
    /// Tracking API priced one tracking at a time.
    TrackingApi,
    /// Payment export in CSV form.
    PaymentSheet,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Portal => "portal",
            SourceKind::TrackingApi => "tracking_api",
            SourceKind::PaymentSheet => "payment_sheet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,
    /// Retired sub-groups whose costs are read from archive snapshots.
    #[serde(default)]
    pub archives: Vec<String>,
    /// Portal rows older than this stop an incremental scan.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: u32,
    /// Payment export; relative paths resolve against the config file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl GroupConfig {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            base_url: None,
            username: None,
            password: None,
            password_env: None,
            archives: Vec::new(),
            stale_after_days: default_stale_after_days(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub mirror_dir: Option<PathBuf>,
    pub archive_dir: Option<PathBuf>,
    /// Whole-fetch attempts per group before giving up.
    pub max_attempts: u32,
    /// Per-request retries inside one attempt.
    pub http_retries: u32,
    pub http_timeout_secs: u64,
    pub groups: BTreeMap<String, GroupConfig>,
}

fn default_stale_after_days() -> u32 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("output"),
            mirror_dir: None,
            archive_dir: None,
            max_attempts: 5,
            http_retries: 3,
            http_timeout_secs: 30,
            groups: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// `$SHIPRECON_CONFIG`, else `<config dir>/shiprecon/config.toml`.
    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shiprecon")
            .join("config.toml")
    }

    /// Parse a config file. Relative payment-sheet paths are made relative
    /// to the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for group in settings.groups.values_mut() {
            if let Some(file) = &group.file {
                if file.is_relative() {
                    group.file = Some(base.join(file));
                }
            }
        }
        tracing::debug!(path = %path.display(), groups = settings.groups.len(), "loaded settings");
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("archives"))
    }

    pub fn group(&self, id: &str) -> Option<&GroupConfig> {
        self.groups.get(id)
    }

    /// Report every problem at once rather than the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.max_attempts == 0 {
            problems.push("max_attempts must be at least 1".to_string());
        }
        if self.http_timeout_secs == 0 {
            problems.push("http_timeout_secs must be at least 1".to_string());
        }

        for (id, group) in &self.groups {
            let kind = group.kind.as_str();
            match group.kind {
                SourceKind::Portal | SourceKind::TrackingApi => {
                    match group.base_url.as_deref() {
                        None | Some("") => {
                            problems.push(format!("groups.{id}: {kind} requires base_url"))
                        }
                        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
                            problems.push(format!("groups.{id}: base_url must be http(s), got '{url}'"))
                        }
                        Some(_) => {}
                    }
                    if group.username.as_deref().unwrap_or("").is_empty() {
                        problems.push(format!("groups.{id}: {kind} requires username"));
                    }
                    if group.file.is_some() {
                        problems.push(format!("groups.{id}: file only applies to payment_sheet"));
                    }
                }
                SourceKind::PaymentSheet => {
                    if group.file.is_none() {
                        problems.push(format!("groups.{id}: payment_sheet requires file"));
                    }
                }
            }
            if !group.archives.is_empty() && group.kind != SourceKind::Portal {
                problems.push(format!("groups.{id}: archives only apply to portal groups"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    /// Write a commented starter config, refusing to overwrite.
    pub fn write_template(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, TEMPLATE).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }
}

const TEMPLATE: &str = r#"# Where clusters.json and ledger.json live
data_dir = "output"

# Synced directory holding the authoritative copy of clusters.json
# mirror_dir = "/path/to/shared/folder"

# Fetch attempts per group before giving up
max_attempts = 5

# Per-request retries on 429/5xx and network errors
http_retries = 3
http_timeout_secs = 30

# [groups.mysite]
# kind = "portal"
# base_url = "https://portal.example.com"
# username = "me@example.com"
# password_env = "MYSITE_PASSWORD"
# archives = ["mysite-2019"]
# stale_after_days = 30

# [groups.usa]
# kind = "tracking_api"
# base_url = "https://api.example.com"
# username = "me@example.com"

# [groups.bfmr]
# kind = "payment_sheet"
# file = "payments.csv"
"#;
