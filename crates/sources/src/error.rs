use shiprecon_config::ConfigError;
use shiprecon_io::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unknown group '{0}'")]
    UnknownGroup(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{source_name} auth failed ({status}): {message}")]
    Auth {
        source_name: String,
        status: u16,
        message: String,
    },

    #[error("{source_name} request rejected ({status}): {message}")]
    Rejected {
        source_name: String,
        status: u16,
        message: String,
    },

    #[error("{source_name} rate limited after {attempts} attempts")]
    RateLimited { source_name: String, attempts: u32 },

    #[error("{source_name} upstream error: {message}")]
    Upstream { source_name: String, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to set up {what}: {message}")]
    Setup { what: String, message: String },

    #[error("{group}: exceeded retry limit after {attempts} attempts: {last}")]
    RetriesExhausted {
        group: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub(crate) fn upstream(source_name: &str, message: impl Into<String>) -> Self {
        FetchError::Upstream {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Configuration problems cannot be fixed by trying again.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FetchError::UnknownGroup(_) | FetchError::Config(_) | FetchError::Setup { .. }
        )
    }

    /// The final cause behind any retry wrapper.
    pub fn root(&self) -> &FetchError {
        match self {
            FetchError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}
