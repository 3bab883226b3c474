use async_trait::async_trait;
use bytes::Bytes;

use super::ProviderResult;

/// Object storage for uploaded media, objects are reachable by public URL
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the object under the key, returning its public URL
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> ProviderResult<String>;

    async fn delete(&self, key: &str) -> ProviderResult<()>;
}
