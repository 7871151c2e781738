use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the resource files. Any of these aborts the
/// whole report run; there is no partial-success mode.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {}: {source}", file.display())]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", file.display())]
    Parse {
        file: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid record in {}: plugin '{plugin}' finding #{index} has neither 'url' nor 'issue'", file.display())]
    Validation {
        file: PathBuf,
        plugin: String,
        index: usize,
    },
}
