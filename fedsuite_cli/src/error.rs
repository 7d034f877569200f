//! Error type of the command-line front end.

use fedsuite_core::{CatalogError, ConfigError, PatternError, StoreError};
use fedsuite_env::EnvError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Export failed: {0}")]
    Export(#[from] std::io::Error),

    #[error("Encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}
