//! Error types for the node runtime.

/// Errors that can occur while configuring or running a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("node is shutting down")]
    ShuttingDown,
}
