use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up or driving the agent.
///
/// Everything here is a configuration or boundary failure. Objects missing
/// from a frame are never reported through this type.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("couldn't load template {}", path.display())]
    TemplateLoad { path: PathBuf },

    #[error("template mask is {mask:?}, expected {image:?}")]
    MaskSize { image: (i32, i32), mask: (i32, i32) },

    #[error(transparent)]
    Vision(#[from] opencv::Error),

    #[error("invalid template manifest: {0}")]
    Manifest(String),

    #[error("couldn't parse {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("environment failure: {0}")]
    Environment(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
