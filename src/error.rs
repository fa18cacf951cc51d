use std::path::PathBuf;
use thiserror::Error;

/// Failures isolated to a single unit or to configuration loading.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed module dump {}: {source}", path.display())]
    ModuleFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid indicator configuration: {0}")]
    InvalidConfig(String),
}
