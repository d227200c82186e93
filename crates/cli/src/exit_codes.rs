//! Exit code registry for `shiprecon`.
//!
//! Every code the binary can return lives here. Scripts that drive the
//! nightly reconcile branch on these values, so a code is never reused for
//! a different meaning once released.
//!
//! | Range | Meaning                                   |
//! |-------|-------------------------------------------|
//! | 0     | Success                                   |
//! | 1-9   | Generic failures (usage, io, bad input)   |
//! | 10-19 | Configuration                             |
//! | 50-59 | Cost sources (auth, upstream, retry cap)  |

use shiprecon_config::ConfigError;
use shiprecon_io::StoreError;
use shiprecon_sources::FetchError;

// =============================================================================
// Generic (0-9)
// =============================================================================

pub const EXIT_SUCCESS: u8 = 0;

/// Anything without a more specific code.
pub const EXIT_ERROR: u8 = 1;

/// Bad arguments. Also what clap uses for parse failures.
pub const EXIT_USAGE: u8 = 2;

/// A file could not be read or written.
pub const EXIT_IO: u8 = 3;

/// Input file was readable but malformed (CSV row, JSON store).
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Configuration (10-19)
// =============================================================================

/// Config file failed to parse or validate.
pub const EXIT_CONFIG_INVALID: u8 = 10;

/// Group id not present in the config.
pub const EXIT_UNKNOWN_GROUP: u8 = 11;

// =============================================================================
// Cost sources (50-59)
// =============================================================================

/// No password configured for the group (neither inline nor env var).
pub const EXIT_FETCH_NOT_AUTH: u8 = 50;

/// Login rejected by upstream (401/403).
pub const EXIT_FETCH_AUTH: u8 = 51;

/// Request rejected by upstream (400/422).
pub const EXIT_FETCH_VALIDATION: u8 = 52;

/// Rate limited after per-request retries (429).
pub const EXIT_FETCH_RATE_LIMIT: u8 = 53;

/// Upstream error (5xx), network failure or unexpected response shape.
pub const EXIT_FETCH_UPSTREAM: u8 = 54;

/// Every attempt of a group fetch failed.
pub const EXIT_FETCH_RETRIES: u8 = 55;

// =============================================================================
// Error mapping
// =============================================================================

pub fn store_exit_code(err: &StoreError) -> u8 {
    if err.is_parse() {
        EXIT_PARSE
    } else {
        EXIT_IO
    }
}

pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::Read { .. } | ConfigError::Write { .. } => EXIT_IO,
        ConfigError::Parse { .. } | ConfigError::Invalid { .. } => EXIT_CONFIG_INVALID,
        ConfigError::MissingCredentials { .. } => EXIT_FETCH_NOT_AUTH,
    }
}

pub fn fetch_exit_code(err: &FetchError) -> u8 {
    match err {
        FetchError::UnknownGroup(_) => EXIT_UNKNOWN_GROUP,
        FetchError::Config(e) => config_exit_code(e),
        FetchError::Auth { .. } => EXIT_FETCH_AUTH,
        FetchError::Rejected { .. } => EXIT_FETCH_VALIDATION,
        FetchError::RateLimited { .. } => EXIT_FETCH_RATE_LIMIT,
        FetchError::Upstream { .. } => EXIT_FETCH_UPSTREAM,
        FetchError::Store(e) => store_exit_code(e),
        FetchError::Setup { .. } => EXIT_ERROR,
        FetchError::RetriesExhausted { .. } => EXIT_FETCH_RETRIES,
    }
}
