use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ProviderResult;

/// A tab or chord sheet found by a tab source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabResult {
    /// The name of the source, like "songsterr"
    pub source: String,
    pub title: String,
    pub artist: Option<String>,
    pub url: String,
    pub has_chords: Option<bool>,
}

/// Something that can look up tabs for a query
#[async_trait]
pub trait TabSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str) -> ProviderResult<Vec<TabResult>>;
}
