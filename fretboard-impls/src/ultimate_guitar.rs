use async_trait::async_trait;
use fretboard_core::{ProviderResult, TabResult, TabSource};
use url::Url;

use crate::http::parse_error;

/// Links to ultimate-guitar.com's search page for the query.
///
/// There's no public API, so no request is made and the result is always a single link.
pub struct UltimateGuitarSource;

impl UltimateGuitarSource {
    const SEARCH_URL: &'static str = "https://www.ultimate-guitar.com/search.php";

    pub fn new() -> Self {
        Self
    }

    fn search_url(query: &str) -> ProviderResult<Url> {
        Url::parse_with_params(
            Self::SEARCH_URL,
            [("search_type", "title"), ("value", query)],
        )
        .map_err(parse_error)
    }
}

impl Default for UltimateGuitarSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TabSource for UltimateGuitarSource {
    fn name(&self) -> &'static str {
        "ultimate-guitar"
    }

    async fn search(&self, query: &str) -> ProviderResult<Vec<TabResult>> {
        let url = Self::search_url(query)?;

        Ok(vec![TabResult {
            source: self.name().to_string(),
            title: query.to_string(),
            artist: None,
            url: url.into(),
            has_chords: None,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn links_to_the_search_page() {
        let results = UltimateGuitarSource::new()
            .search("Rock & Roll")
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "ultimate-guitar");
        assert_eq!(results[0].title, "Rock & Roll");
        assert_eq!(
            results[0].url,
            "https://www.ultimate-guitar.com/search.php?search_type=title&value=Rock+%26+Roll"
        );
    }
}
