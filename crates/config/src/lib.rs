// Configuration loading

pub mod credentials;
pub mod error;
pub mod settings;

pub use credentials::{resolve_credentials, Credentials, CredentialSource};
pub use error::ConfigError;
pub use settings::{GroupConfig, Settings, SourceKind};
