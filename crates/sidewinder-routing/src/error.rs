//! Routing core error types.

use sidewinder_core::WireError;

#[derive(Debug, thiserror::Error)]
pub enum SnekError {
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("teardown payload too short: {0} bytes")]
    TeardownTooShort(usize),
}
