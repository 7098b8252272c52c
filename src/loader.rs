use std::sync::Arc;

use crate::document::ByteSource;
use crate::error::{PreviewError, Result};

/// Read a document's raw bytes.
pub async fn load_bytes(source: &ByteSource) -> Result<Arc<[u8]>> {
    match source {
        ByteSource::Memory(bytes) => Ok(Arc::clone(bytes)),
        ByteSource::File(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                PreviewError::UnreadableSource(format!("{}: {}", path.display(), e))
            })?;
            tracing::debug!("loaded {} bytes from {}", bytes.len(), path.display());
            Ok(bytes.into())
        }
    }
}
