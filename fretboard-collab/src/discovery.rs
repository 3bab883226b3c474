use std::sync::Arc;

use bytes::Bytes;
use fretboard_core::{ProviderResult, RecognitionMatch, Recognizer, TabResult, TabSource};
use futures_util::future::join_all;
use log::warn;

use crate::{util::non_blank, CollabContext, CollabError, CollabResult, PlanGate, PrimaryKey};

/// Finding out what a song is, and where to find tabs for it
pub struct DiscoveryManager {
    recognizer: Arc<dyn Recognizer>,
    tab_sources: Vec<Arc<dyn TabSource>>,
    gate: PlanGate,
}

impl DiscoveryManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            recognizer: context.providers.recognizer.clone(),
            tab_sources: context.providers.tab_sources.clone(),
            gate: PlanGate::new(context),
        }
    }

    /// Identifies a recorded sample, `None` when nothing matched
    pub async fn recognize(
        &self,
        user_id: PrimaryKey,
        audio: Bytes,
        filename: &str,
    ) -> CollabResult<Option<RecognitionMatch>> {
        self.gate.check(user_id).await?;

        if audio.is_empty() {
            return Err(CollabError::invalid("Aucun fichier audio fourni"));
        }

        Ok(self.recognizer.recognize(audio, filename).await?)
    }

    /// Queries every tab source at once.
    /// Results keep the order of the sources, a failing source is skipped.
    pub async fn search_tabs(&self, user_id: PrimaryKey, query: &str) -> CollabResult<Vec<TabResult>> {
        self.gate.check(user_id).await?;

        let query = non_blank(Some(query.to_string()))
            .ok_or_else(|| CollabError::invalid("La recherche est vide"))?;

        let searches = self.tab_sources.iter().map(|s| s.search(&query));
        let outcomes = join_all(searches).await;

        merge_tab_results(&self.tab_sources, outcomes)
    }
}

fn merge_tab_results(
    sources: &[Arc<dyn TabSource>],
    outcomes: Vec<ProviderResult<Vec<TabResult>>>,
) -> CollabResult<Vec<TabResult>> {
    let mut results = vec![];
    let mut failures = 0;

    for (source, outcome) in sources.iter().zip(outcomes) {
        match outcome {
            Ok(found) => results.extend(found),
            Err(e) => {
                failures += 1;
                warn!("Tab source {} failed: {}", source.name(), e);
            }
        }
    }

    if failures > 0 && failures == sources.len() {
        return Err(CollabError::SourcesFailed);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use fretboard_core::Plan;

    use crate::testing::{FakeTabSource, TestCollab};

    use super::*;

    #[tokio::test]
    async fn keeps_source_order_and_skips_failures() {
        let test = TestCollab::with_tab_sources(vec![
            FakeTabSource::ok("songsterr", &["Minor Swing"]),
            FakeTabSource::failing("broken"),
            FakeTabSource::ok("ultimate-guitar", &["Minor Swing chords", "Minor Swing tab"]),
        ]);
        let user = test.user_with_plan("django", Plan::Pro).await;

        let results = test
            .collab
            .discovery
            .search_tabs(user.user.id, "minor swing")
            .await
            .unwrap();

        let sources: Vec<_> = results.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, ["songsterr", "ultimate-guitar", "ultimate-guitar"]);
    }

    #[tokio::test]
    async fn fails_when_every_source_fails() {
        let test = TestCollab::with_tab_sources(vec![
            FakeTabSource::failing("a"),
            FakeTabSource::failing("b"),
        ]);
        let user = test.user_with_plan("django", Plan::Band).await;

        let result = test.collab.discovery.search_tabs(user.user.id, "nuages").await;
        assert!(matches!(result, Err(CollabError::SourcesFailed)));
    }

    #[tokio::test]
    async fn requires_a_query_and_a_plan() {
        let test = TestCollab::new();
        let free = test.user("free").await;
        let pro = test.user_with_plan("pro", Plan::Pro).await;

        let gated = test.collab.discovery.search_tabs(free.user.id, "nuages").await;
        assert!(matches!(gated, Err(CollabError::PlanRequired)));

        let blank = test.collab.discovery.search_tabs(pro.user.id, "  ").await;
        assert!(matches!(blank, Err(CollabError::Invalid(_))));
    }

    #[tokio::test]
    async fn rejects_empty_samples() {
        let test = TestCollab::new();
        let user = test.user_with_plan("django", Plan::Pro).await;

        let result = test
            .collab
            .discovery
            .recognize(user.user.id, Bytes::new(), "sample.webm")
            .await;
        assert!(matches!(result, Err(CollabError::Invalid(_))));

        let found = test
            .collab
            .discovery
            .recognize(user.user.id, Bytes::from_static(b"riff"), "sample.webm")
            .await
            .unwrap();
        assert_eq!(found.map(|m| m.title), Some("Minor Swing".to_string()));
    }
}
