//! Remote feature queries and their lifecycle.
//!
//! A [`QueryCollection`] is created for one search attempt. It builds the
//! request from a [`SearchQuery`], sends it through a [`QueryTransport`] and
//! exposes the outcome as a [`ResultSet`] plus a [`QueryStatus`]:
//!
//! ```text
//! Idle --dispatch--> Pending --reply ok--> Success
//!                           \--error----> Error
//!                           \--dropped--> Error
//! Success | Error --dispatch--> Pending
//! ```
//!
//! Every completed dispatch broadcasts exactly one [`QueryEvent::Update`]
//! and, when it failed, an additional [`QueryEvent::Error`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::NaiveDate;
use mapsearch_transport::QueryTransport;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

pub use error::QueryError;
use error::Result;
pub use request::{build_request, clean_search_text};
use rows::rows_to_items;

use crate::{config::SearchSettings, geo::BBox};

mod request;
mod rows;

mod error {
    use chrono::NaiveDate;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum QueryError {
        #[error("Transport error: {0}")]
        Transport(#[from] mapsearch_transport::TransportError),
        #[error("Server error: {0}")]
        Server(String),
        #[error("Query cancelled before the reply arrived")]
        Cancelled,
        #[error("Date interval starts after it ends: {start} > {end}")]
        InvalidDateInterval { start: NaiveDate, end: NaiveDate },
    }
    pub type Result<T> = std::result::Result<T, QueryError>;
}

const EVENT_CAPACITY: usize = 16;

/// Inclusive date range a query is restricted to.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateInterval {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateInterval {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(QueryError::InvalidDateInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// One search attempt's query. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    raw_text: String,
    page_size: Option<usize>,
    date_interval: Option<DateInterval>,
}

impl SearchQuery {
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            page_size: None,
            date_interval: None,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, rows: usize) -> Self {
        self.page_size = Some(rows);
        self
    }

    #[must_use]
    pub fn with_date_interval(mut self, interval: DateInterval) -> Self {
        self.date_interval = Some(interval);
        self
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// The text actually searched for, with surrounding quotes and whitespace removed.
    pub fn text(&self) -> &str {
        clean_search_text(&self.raw_text)
    }

    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    pub fn date_interval(&self) -> Option<&DateInterval> {
        self.date_interval.as_ref()
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

impl QueryStatus {
    /// `Success` or `Error`: the last dispatch has finished.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One matched feature.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ResultItem {
    /// Feature identity (`fsc_id`)
    pub id: String,
    /// Holder name, shown in the list and the search box
    pub label: String,
    /// Envelope in the service projection
    pub bbox: BBox,
    /// Auxiliary attributes keyed by attribute name
    pub aux_fields: BTreeMap<String, String>,
}

/// Ordered matches of one dispatch together with its status.
///
/// Order is the server's (label ascending); the first item is the best match.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
    pub status: QueryStatus,
}

impl ResultSet {
    pub fn first(&self) -> Option<&ResultItem> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultItem> {
        self.items.iter()
    }
}

/// Notifications broadcast by a [`QueryCollection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// A dispatch finished; fired for success and error alike.
    Update { status: QueryStatus, count: usize },
    /// A dispatch finished with a transport or server error.
    Error { message: String },
}

/// Result of calling [`QueryCollection::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The round-trip ran and left the collection in this status.
    Completed(QueryStatus),
    /// A dispatch was already pending; nothing was sent.
    Ignored,
}

#[derive(Debug, Default)]
struct CollectionState {
    status: QueryStatus,
    items: Vec<ResultItem>,
    view_box: Option<BBox>,
    last_error: Option<String>,
}

/// Query lifecycle for a single search attempt.
pub struct QueryCollection {
    transport: Arc<dyn QueryTransport>,
    settings: Arc<SearchSettings>,
    state: Mutex<CollectionState>,
    events: broadcast::Sender<QueryEvent>,
}

impl QueryCollection {
    /// Create a collection bound to the view box the map shows right now.
    pub fn new(
        transport: Arc<dyn QueryTransport>,
        settings: Arc<SearchSettings>,
        view_box: Option<BBox>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            transport,
            settings,
            state: Mutex::new(CollectionState {
                view_box,
                ..CollectionState::default()
            }),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> QueryStatus {
        self.state.lock().status
    }

    /// Snapshot of the current result set.
    pub fn results(&self) -> ResultSet {
        let state = self.state.lock();
        ResultSet {
            items: state.items.clone(),
            status: state.status,
        }
    }

    /// Message of the last failed dispatch, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn view_box(&self) -> Option<BBox> {
        self.state.lock().view_box
    }

    /// Record the map's new view box. Only affects the next dispatch, and only
    /// when view-restricted search is configured.
    pub fn on_view_changed(&self, view_box: BBox) {
        debug!(?view_box, "View box changed");
        self.state.lock().view_box = Some(view_box);
    }

    fn notify(&self, status: QueryStatus, count: usize, error: Option<String>) {
        // Nobody listening is fine.
        let _ = self.events.send(QueryEvent::Update { status, count });
        if let Some(message) = error {
            let _ = self.events.send(QueryEvent::Error { message });
        }
    }

    /// Run one query round-trip.
    ///
    /// While a previous dispatch is still pending this returns
    /// [`DispatchOutcome::Ignored`] without touching the network or emitting events.
    ///
    /// Dropping the returned future before it completes settles the
    /// collection as [`QueryError::Cancelled`], so it never stays `Pending`.
    #[instrument(name = "Query dispatch", level = "debug", skip_all, fields(text = query.text()))]
    pub async fn dispatch(&self, query: &SearchQuery) -> DispatchOutcome {
        let view_box = {
            let mut state = self.state.lock();
            if state.status == QueryStatus::Pending {
                debug!("Dispatch ignored, previous query still pending");
                return DispatchOutcome::Ignored;
            }
            state.status = QueryStatus::Pending;
            state.view_box
        };
        let guard = PendingGuard {
            collection: self,
            armed: true,
        };

        let request = build_request(&self.settings, query, view_box.as_ref());
        debug!(%request, "Sending query");
        let outcome = self.round_trip(&request).await;
        guard.disarm();

        let (status, count, error) = {
            let mut state = self.state.lock();
            match outcome {
                Ok(items) => {
                    info!(count = items.len(), "Query succeeded");
                    state.status = QueryStatus::Success;
                    state.items = items;
                    state.last_error = None;
                    (QueryStatus::Success, state.items.len(), None)
                }
                Err(e) => {
                    warn!(error = %e, "Query failed");
                    let message = e.to_string();
                    state.status = QueryStatus::Error;
                    state.items.clear();
                    state.last_error = Some(message.clone());
                    (QueryStatus::Error, 0, Some(message))
                }
            }
        };

        self.notify(status, count, error);
        DispatchOutcome::Completed(status)
    }

    async fn round_trip(
        &self,
        request: &mapsearch_transport::QueryRequest,
    ) -> Result<Vec<ResultItem>> {
        let response = self.transport.send(request).await?;
        if let Some(message) = response.error_message() {
            return Err(QueryError::Server(message.to_string()));
        }
        Ok(response
            .result
            .as_ref()
            .map(|rows| rows_to_items(&self.settings, rows))
            .unwrap_or_default())
    }
}

/// Settles a dispatch whose future was dropped while the request was in flight.
struct PendingGuard<'a> {
    collection: &'a QueryCollection,
    armed: bool,
}

impl PendingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("Query dispatch dropped while pending");
        let message = QueryError::Cancelled.to_string();
        {
            let mut state = self.collection.state.lock();
            state.status = QueryStatus::Error;
            state.items.clear();
            state.last_error = Some(message.clone());
        }
        self.collection.notify(QueryStatus::Error, 0, Some(message));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mapsearch_transport::{QueryResponse, ScriptedTransport};
    use serde_json::json;

    use super::*;

    fn settings() -> Arc<SearchSettings> {
        Arc::new(SearchSettings::builder("mem://query").build().unwrap())
    }

    fn acme_reply() -> QueryResponse {
        QueryResponse::ok(
            ["fsc_id", "holder", "xmin", "ymin", "xmax", "ymax"]
                .into_iter()
                .map(String::from)
                .collect(),
            vec![
                vec![json!("A-1"), json!("Acme Corp"), json!(0), json!(0), json!(10), json!(10)],
                vec![json!("A-2"), json!("Acme Holdings"), json!(20), json!(20), json!(30), json!(30)],
            ],
        )
    }

    fn collection(transport: &Arc<ScriptedTransport>) -> QueryCollection {
        QueryCollection::new(transport.clone(), settings(), None)
    }

    #[tokio::test]
    async fn test_success_transitions() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(acme_reply());
        let collection = collection(&transport);
        let mut events = collection.subscribe();

        assert_eq!(collection.status(), QueryStatus::Idle);
        let outcome = collection.dispatch(&SearchQuery::new("Acme")).await;

        assert_eq!(outcome, DispatchOutcome::Completed(QueryStatus::Success));
        assert_eq!(collection.status(), QueryStatus::Success);
        let results = collection.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results.first().unwrap().label, "Acme Corp");
        assert_eq!(
            events.try_recv().unwrap(),
            QueryEvent::Update {
                status: QueryStatus::Success,
                count: 2
            }
        );
        assert!(events.try_recv().is_err(), "no error event on success");
    }

    #[tokio::test]
    async fn test_server_error_clears_results() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(acme_reply());
        transport.push_reply(QueryResponse::error("timeout"));
        let collection = collection(&transport);

        collection.dispatch(&SearchQuery::new("Acme")).await;
        let mut events = collection.subscribe();
        let outcome = collection.dispatch(&SearchQuery::new("Acme")).await;

        assert_eq!(outcome, DispatchOutcome::Completed(QueryStatus::Error));
        assert!(collection.results().is_empty());
        assert_eq!(collection.last_error().as_deref(), Some("Server error: timeout"));
        assert_eq!(
            events.try_recv().unwrap(),
            QueryEvent::Update {
                status: QueryStatus::Error,
                count: 0
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            QueryEvent::Error {
                message: "Server error: timeout".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_transport_failure_is_error_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_failure("connection refused");
        let collection = collection(&transport);

        let outcome = collection.dispatch(&SearchQuery::new("Acme")).await;
        assert_eq!(outcome, DispatchOutcome::Completed(QueryStatus::Error));
        assert!(collection.last_error().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(QueryResponse::ok(vec![], vec![]));
        let collection = collection(&transport);

        let outcome = collection.dispatch(&SearchQuery::new("Nobody")).await;
        assert_eq!(outcome, DispatchOutcome::Completed(QueryStatus::Success));
        assert!(collection.results().is_empty());
    }

    #[tokio::test]
    async fn test_redispatch_after_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_reply(QueryResponse::error("boom"));
        transport.push_reply(acme_reply());
        let collection = collection(&transport);

        collection.dispatch(&SearchQuery::new("Acme")).await;
        assert_eq!(collection.status(), QueryStatus::Error);
        collection.dispatch(&SearchQuery::new("Acme")).await;
        assert_eq!(collection.status(), QueryStatus::Success);
        assert_eq!(collection.last_error(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_while_pending_is_ignored() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_delayed_reply(acme_reply(), Duration::from_millis(200));
        let collection = collection(&transport);
        let mut events = collection.subscribe();

        let query = SearchQuery::new("Acme");
        let (first, second) = tokio::join!(collection.dispatch(&query), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(collection.status(), QueryStatus::Pending);
            collection.dispatch(&query).await
        });

        assert_eq!(first, DispatchOutcome::Completed(QueryStatus::Success));
        assert_eq!(second, DispatchOutcome::Ignored);
        assert_eq!(transport.request_count(), 1);
        assert!(matches!(events.try_recv(), Ok(QueryEvent::Update { .. })));
        assert!(events.try_recv().is_err(), "exactly one update per dispatch");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_dispatch_does_not_stay_pending() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_delayed_reply(acme_reply(), Duration::from_secs(10));
        transport.push_reply(acme_reply());
        let collection = collection(&transport);
        let mut events = collection.subscribe();
        let query = SearchQuery::new("Acme");

        let timed_out =
            tokio::time::timeout(Duration::from_millis(100), collection.dispatch(&query)).await;

        assert!(timed_out.is_err());
        assert_eq!(collection.status(), QueryStatus::Error);
        assert_eq!(
            collection.last_error().as_deref(),
            Some("Query cancelled before the reply arrived")
        );
        assert_eq!(
            events.try_recv().unwrap(),
            QueryEvent::Update {
                status: QueryStatus::Error,
                count: 0
            }
        );
        assert!(matches!(events.try_recv(), Ok(QueryEvent::Error { .. })));

        let outcome = collection.dispatch(&query).await;
        assert_eq!(outcome, DispatchOutcome::Completed(QueryStatus::Success));
        assert_eq!(transport.request_count(), 2);
        assert_eq!(collection.results().len(), 2);
    }

    #[tokio::test]
    async fn test_view_box_is_tracked() {
        let transport = Arc::new(ScriptedTransport::new());
        let collection = QueryCollection::new(
            transport.clone(),
            settings(),
            Some(BBox::new(0.0, 0.0, 1.0, 1.0)),
        );

        collection.on_view_changed(BBox::new(5.0, 5.0, 6.0, 6.0));
        assert_eq!(collection.view_box(), Some(BBox::new(5.0, 5.0, 6.0, 6.0)));
    }

    #[test]
    fn test_search_query_text_is_cleaned() {
        let query = SearchQuery::new(" «Acme» ");
        assert_eq!(query.raw_text(), " «Acme» ");
        assert_eq!(query.text(), "Acme");
    }

    #[test]
    fn test_date_interval_order() {
        let early = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let late = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert!(DateInterval::new(early, late).is_ok());
        assert!(DateInterval::new(early, early).is_ok());
        assert!(matches!(
            DateInterval::new(late, early),
            Err(QueryError::InvalidDateInterval { .. })
        ));
    }

    #[test]
    fn test_status_settled() {
        assert!(!QueryStatus::Idle.is_settled());
        assert!(!QueryStatus::Pending.is_settled());
        assert!(QueryStatus::Success.is_settled());
        assert!(QueryStatus::Error.is_settled());
    }
}
