//! Observers backed by the remote feature query.

use std::sync::Arc;

use async_trait::async_trait;
use mapsearch_transport::QueryTransport;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Claim, Flow, SearchObserver, SearchParams};
use crate::{
    collaborators::Suggestion,
    config::SearchSettings,
    query::{DispatchOutcome, QueryCollection, QueryStatus, SearchQuery},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureObserverMode {
    /// Full search; claims with the result set.
    Search,
    /// Typing; claims with suggestions, fetched with the smaller page size.
    Suggest,
}

/// Runs one [`QueryCollection`] per event and claims it when anything matched.
///
/// Zero matches and failed queries both pass the event on.
pub struct FeatureObserver {
    mode: FeatureObserverMode,
    transport: Arc<dyn QueryTransport>,
    settings: Arc<SearchSettings>,
}

impl FeatureObserver {
    pub fn new(
        mode: FeatureObserverMode,
        transport: Arc<dyn QueryTransport>,
        settings: Arc<SearchSettings>,
    ) -> Self {
        Self {
            mode,
            transport,
            settings,
        }
    }

    fn page_size(&self) -> usize {
        match self.mode {
            FeatureObserverMode::Search => self.settings.page_size,
            FeatureObserverMode::Suggest => self.settings.autocomplete_page_size,
        }
    }
}

#[async_trait]
impl SearchObserver for FeatureObserver {
    fn name(&self) -> &str {
        match self.mode {
            FeatureObserverMode::Search => "feature search",
            FeatureObserverMode::Suggest => "feature suggest",
        }
    }

    async fn observe(&self, params: &SearchParams, _cancel: &CancellationToken) -> Flow {
        let collection = QueryCollection::new(
            self.transport.clone(),
            self.settings.clone(),
            params.view_box,
        );
        let query = SearchQuery::new(params.text.as_str()).with_page_size(self.page_size());

        match collection.dispatch(&query).await {
            DispatchOutcome::Completed(QueryStatus::Success) => {}
            DispatchOutcome::Completed(status) => {
                warn!(
                    %status,
                    error = collection.last_error().as_deref().unwrap_or("unknown"),
                    "Feature query failed, passing to the next observer"
                );
                return Flow::Next;
            }
            DispatchOutcome::Ignored => return Flow::Next,
        }

        let results = collection.results();
        if results.is_empty() {
            debug!(text = %params.text, "No matching features");
            return Flow::Next;
        }

        match self.mode {
            FeatureObserverMode::Search => Flow::Stop(Claim::Features(results)),
            FeatureObserverMode::Suggest => Flow::Stop(Claim::Suggestions(
                results.iter().map(Suggestion::feature).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use mapsearch_transport::{QueryResponse, ScriptedTransport};
    use serde_json::json;

    use super::*;

    fn settings() -> Arc<SearchSettings> {
        Arc::new(
            SearchSettings::builder("mem://query")
                .autocomplete_page_size(3)
                .build()
                .unwrap(),
        )
    }

    fn one_row() -> QueryResponse {
        QueryResponse::ok(
            ["fsc_id", "holder", "xmin", "ymin", "xmax", "ymax"]
                .into_iter()
                .map(String::from)
                .collect(),
            vec![vec![json!("A-1"), json!("Acme Corp"), json!(0), json!(0), json!(10), json!(10)]],
        )
    }

    fn observer(mode: FeatureObserverMode, transport: &Arc<ScriptedTransport>) -> FeatureObserver {
        FeatureObserver::new(mode, transport.clone(), settings())
    }

    #[tokio::test]
    async fn test_search_claims_matches() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(one_row());

        let flow = observer(FeatureObserverMode::Search, &transport)
            .observe(&SearchParams::new("Acme"), &CancellationToken::new())
            .await;

        let Flow::Stop(Claim::Features(results)) = flow else {
            panic!("expected features, got {flow:?}");
        };
        assert_eq!(results.first().unwrap().id, "A-1");
        assert_eq!(transport.requests()[0].param("limit"), Some("50"));
    }

    #[tokio::test]
    async fn test_suggest_uses_autocomplete_page_size() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(one_row());

        let flow = observer(FeatureObserverMode::Suggest, &transport)
            .observe(&SearchParams::new("Ac"), &CancellationToken::new())
            .await;

        assert_eq!(
            flow,
            Flow::Stop(Claim::Suggestions(vec![Suggestion {
                label: "Acme Corp".to_string(),
                source: crate::collaborators::SuggestionSource::Feature {
                    id: "A-1".to_string()
                },
            }]))
        );
        assert_eq!(transport.requests()[0].param("limit"), Some("3"));
    }

    #[tokio::test]
    async fn test_zero_matches_pass() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(QueryResponse::ok(vec![], vec![]));

        let flow = observer(FeatureObserverMode::Search, &transport)
            .observe(&SearchParams::new("Nobody"), &CancellationToken::new())
            .await;
        assert_eq!(flow, Flow::Next);
    }

    #[tokio::test]
    async fn test_errors_pass() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(QueryResponse::error("timeout"));
        transport.push_failure("connection refused");
        let observer = observer(FeatureObserverMode::Search, &transport);

        for _ in 0..2 {
            let flow = observer
                .observe(&SearchParams::new("Acme"), &CancellationToken::new())
                .await;
            assert_eq!(flow, Flow::Next);
        }
    }
}
