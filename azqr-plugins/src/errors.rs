use std::path::PathBuf;

use azqr_core::infrastructure::http::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("cannot register nil plugin")]
    NilPlugin,

    #[error("plugin name cannot be empty")]
    EmptyName,

    #[error("plugin {0} not found")]
    NotFound(String),

    #[error("failed to read YAML plugin file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML plugin: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("plugin name is required")]
    MissingName,

    #[error("plugin must have at least one query")]
    NoQueries,

    #[error("failed to read query file {file}: {source}")]
    QueryFile {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("query {0} must have either 'query' or 'queryFile' specified")]
    EmptyQuery(String),

    #[error("query missing required field 'aprlGuid'")]
    MissingGuid,

    #[error("query {0} missing required field 'description'")]
    MissingDescription(String),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{0}")]
    Scan(String),
}
