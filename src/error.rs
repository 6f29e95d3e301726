//! Error types for the grid data source
//!
//! Centralized error handling using snafu for ergonomic error definitions.

use snafu::Snafu;

/// Main error type for the data source
#[derive(Debug, Snafu)]
pub enum Error {
    /// Any call made after `destroy()`
    #[snafu(display("Row source has been destroyed"))]
    Destroyed,

    /// The data source was built without a row fetcher
    #[snafu(display("A row fetcher is required to build a row source"))]
    MissingFetcher,

    /// Invalid configuration value
    #[snafu(display("Invalid config: {message}"))]
    InvalidConfig { message: String },

    /// The row provider rejected a block request
    #[snafu(display("Fetch failed: {message}"))]
    Fetch { message: String },

    /// IO error (config file loading)
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// TOML deserialization error
    #[snafu(display("TOML parse error: {source}"))]
    TomlDe { source: toml::de::Error },
}

impl Error {
    /// Shorthand for a provider failure
    pub fn fetch(message: impl Into<String>) -> Self {
        Error::Fetch {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<toml::de::Error> for Error {
    fn from(source: toml::de::Error) -> Self {
        Error::TomlDe { source }
    }
}

/// Result type alias for convenience
pub type Result<T, E = Error> = std::result::Result<T, E>;
