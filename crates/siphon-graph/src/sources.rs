pub mod dump;
#[cfg(feature = "native")]
pub mod pipewire;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::Snapshot;

pub use dump::{parse_dump, PwDumpSource};
#[cfg(feature = "native")]
pub use pipewire::NativeSource;

/// Why a snapshot read produced nothing. A failed read never yields a
/// partial snapshot.
#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error("graph unavailable: {0}")]
    Unavailable(String),

    #[error("graph read timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed graph dump: {0}")]
    Malformed(String),
}

/// Somewhere a [`Snapshot`] can be read from.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn read(&self) -> Result<Snapshot, ReadFailure>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
