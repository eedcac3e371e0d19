use async_trait::async_trait;

use crate::{domain::FileRef, Result};

/// Lazily downloads the bytes behind a [`FileRef`].
///
/// Called only when a batch is processed, never at upload time. A failure
/// skips that one file.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, file: &FileRef) -> Result<Vec<u8>>;
}
