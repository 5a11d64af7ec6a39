pub mod builder;
pub mod client;
pub mod config;
pub mod manifest;
pub mod paths;
pub mod schema;

use thiserror::Error;

pub use builder::MpiJobBuilder;
pub use client::JobClient;
pub use config::StorageSettings;
pub use schema::{Role, RoleLayout, SchemaVariant};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("No client bound: submit() or bind() must be called before delete()")]
    NotBound,
    #[error("Remote request failed: {0}")]
    Remote(#[from] kube::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
