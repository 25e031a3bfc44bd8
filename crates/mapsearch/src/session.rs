//! One user's search box, from keystroke to highlighted result.

use std::sync::Arc;

use mapsearch_transport::QueryTransport;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    collaborators::{
        Geocoder, LayerHandle, Localizer, MapViewport, MarkerHandle, ResultPanel, Suggestion,
        SuggestionSource,
    },
    config::SearchSettings,
    error::{MapSearchError, Result},
    geo::LatLon,
    highlight::{HighlightTarget, ResultHighlighter},
    i18n::keys,
    observer::{ChainOutcome, Claim, EventKind, ObserverChain, SearchParams, install_default_observers},
    query::{ResultItem, ResultSet},
};

const EVENT_CAPACITY: usize = 32;

/// Map artifacts the session has put on the map, plus the last result list.
///
/// Holds at most one dropped marker and one highlight; writing either
/// removes what was there before.
#[derive(Debug, Default)]
pub struct SessionState {
    marker: Option<MarkerHandle>,
    highlight: Vec<LayerHandle>,
    results: ResultSet,
}

impl SessionState {
    pub fn marker(&self) -> Option<MarkerHandle> {
        self.marker
    }

    pub fn highlight_layers(&self) -> &[LayerHandle] {
        &self.highlight
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub(crate) fn take_highlight(&mut self) -> Vec<LayerHandle> {
        std::mem::take(&mut self.highlight)
    }

    pub(crate) fn push_highlight(&mut self, handle: LayerHandle) {
        self.highlight.push(handle);
    }

    /// Drop a draggable marker at `point`, removing the previous one.
    pub(crate) fn replace_marker(&mut self, viewport: &dyn MapViewport, point: LatLon) -> MarkerHandle {
        if let Some(previous) = self.marker.take() {
            viewport.remove_marker(previous);
        }
        let handle = viewport.add_marker(point, true);
        self.marker = Some(handle);
        handle
    }
}

/// How a [`SearchSession::run`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Blank input, or an observer vetoed the search.
    NoSearch,
    /// Features matched; `primary` was highlighted.
    Features { count: usize, primary: ResultItem },
    /// The text was a coordinate pair; the map moved there.
    Coordinate(LatLon),
    /// The generic geocoder found something with this label.
    Geocoded(String),
    NotFound,
    /// A newer run started before this one finished. Nothing was presented.
    Superseded,
}

/// Broadcast around each search.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BeforeSearch { text: String },
    /// The host should redraw the panel now.
    RepaintRequested,
    AfterSearch { outcome: SessionOutcome },
}

/// The external collaborators a session drives.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub viewport: Arc<dyn MapViewport>,
    pub panel: Arc<dyn ResultPanel>,
    pub geocoder: Arc<dyn Geocoder>,
    pub localizer: Arc<dyn Localizer>,
}

#[derive(Default)]
struct RunTracker {
    generation: u64,
    current: Option<CancellationToken>,
}

pub struct SearchSession {
    chain: Arc<ObserverChain>,
    viewport: Arc<dyn MapViewport>,
    panel: Arc<dyn ResultPanel>,
    geocoder: Arc<dyn Geocoder>,
    localizer: Arc<dyn Localizer>,
    highlighter: ResultHighlighter,
    state: Mutex<SessionState>,
    runs: Mutex<RunTracker>,
    events: broadcast::Sender<SessionEvent>,
}

impl SearchSession {
    pub fn new(
        chain: Arc<ObserverChain>,
        collaborators: SessionCollaborators,
        settings: &SearchSettings,
    ) -> Self {
        let SessionCollaborators {
            viewport,
            panel,
            geocoder,
            localizer,
        } = collaborators;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            chain,
            highlighter: ResultHighlighter::new(viewport.clone(), settings),
            viewport,
            panel,
            geocoder,
            localizer,
            state: Mutex::new(SessionState::default()),
            runs: Mutex::new(RunTracker::default()),
            events,
        }
    }

    /// A session over a fresh chain carrying the coordinate and feature observers.
    pub fn with_default_observers(
        transport: Arc<dyn QueryTransport>,
        collaborators: SessionCollaborators,
        settings: Arc<SearchSettings>,
    ) -> Self {
        let chain = Arc::new(ObserverChain::new());
        install_default_observers(&chain, &transport, &settings);
        Self::new(chain, collaborators, &settings)
    }

    pub fn chain(&self) -> &Arc<ObserverChain> {
        &self.chain
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Localized hint for the empty search box.
    pub fn placeholder(&self) -> String {
        self.localizer.text(keys::PLACEHOLDER)
    }

    /// Results of the last search that matched features.
    pub fn results(&self) -> ResultSet {
        self.state.lock().results.clone()
    }

    pub fn marker(&self) -> Option<MarkerHandle> {
        self.state.lock().marker()
    }

    pub fn highlight_layers(&self) -> Vec<LayerHandle> {
        self.state.lock().highlight_layers().to_vec()
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn begin_run(&self) -> (u64, CancellationToken) {
        let mut runs = self.runs.lock();
        if let Some(previous) = runs.current.take() {
            previous.cancel();
        }
        runs.generation += 1;
        let token = CancellationToken::new();
        runs.current = Some(token.clone());
        (runs.generation, token)
    }

    fn finish_run(&self, generation: u64) {
        let mut runs = self.runs.lock();
        if runs.generation == generation {
            runs.current = None;
        }
    }

    /// Search for `text` and present whatever claims it.
    #[instrument(name = "Search", level = "info", skip(self))]
    pub async fn run(&self, text: &str) -> SessionOutcome {
        if text.trim().is_empty() {
            debug!("Blank input, nothing to search");
            return SessionOutcome::NoSearch;
        }

        let (generation, token) = self.begin_run();
        self.emit(SessionEvent::BeforeSearch {
            text: text.to_string(),
        });
        self.panel.open();
        self.panel.show_loading(&self.localizer.text(keys::LOADING));
        self.emit(SessionEvent::RepaintRequested);

        let params = SearchParams::new(text).with_view_box(self.viewport.view_box());
        let chain_outcome = self.chain.dispatch(EventKind::SearchStarting, &params).await;
        if token.is_cancelled() {
            return Self::superseded(generation);
        }

        let outcome = match chain_outcome {
            ChainOutcome::Superseded => return Self::superseded(generation),
            ChainOutcome::Handled(Claim::NoSearch) => SessionOutcome::NoSearch,
            ChainOutcome::Handled(Claim::Features(results)) => self.present_features(results),
            ChainOutcome::Handled(Claim::Coordinate(point)) => self.present_coordinate(point),
            ChainOutcome::Handled(Claim::Suggestions(_)) => {
                warn!("Search observer answered with suggestions, using the geocoder instead");
                self.fall_back(text, &token).await
            }
            ChainOutcome::Deferred => self.fall_back(text, &token).await,
        };
        if outcome == SessionOutcome::Superseded {
            return Self::superseded(generation);
        }

        // A rendered result list replaces the loading indicator by itself.
        if !matches!(outcome, SessionOutcome::Features { .. }) {
            self.panel.hide_loading();
        }

        self.finish_run(generation);
        info!(?outcome, "Search finished");
        self.emit(SessionEvent::RepaintRequested);
        self.emit(SessionEvent::AfterSearch {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn superseded(generation: u64) -> SessionOutcome {
        debug!(generation, "Search superseded by a newer one");
        SessionOutcome::Superseded
    }

    fn present_features(&self, results: ResultSet) -> SessionOutcome {
        let Some(primary) = results.first().cloned() else {
            return SessionOutcome::NotFound;
        };
        let count = results.len();

        self.panel.set_search_text(&primary.label);

        {
            let mut state = self.state.lock();
            self.highlighter.clear(&mut state);
            self.highlighter
                .highlight(&HighlightTarget::from(&primary), &mut state);
            state.results = results.clone();
        }

        self.panel
            .render_results(&self.localizer.text(keys::RESULTS_TITLE), &results.items);

        SessionOutcome::Features { count, primary }
    }

    fn present_coordinate(&self, point: LatLon) -> SessionOutcome {
        self.viewport.pan_to(point);
        self.state.lock().replace_marker(self.viewport.as_ref(), point);
        SessionOutcome::Coordinate(point)
    }

    async fn fall_back(&self, text: &str, token: &CancellationToken) -> SessionOutcome {
        let lookup = tokio::select! {
            biased;
            () = token.cancelled() => return SessionOutcome::Superseded,
            lookup = self.geocoder.geocode(text) => lookup,
        };
        if token.is_cancelled() {
            return SessionOutcome::Superseded;
        }

        match lookup {
            Ok(Some(hit)) => {
                self.geocoder.show_hit(&hit);
                SessionOutcome::Geocoded(hit.label)
            }
            Ok(None) => {
                self.geocoder
                    .show_not_found(&self.localizer.text(keys::NO_RESULTS));
                SessionOutcome::NotFound
            }
            Err(e) => {
                warn!(error = %e, "Geocoder failed");
                self.geocoder
                    .show_not_found(&self.localizer.text(keys::NO_RESULTS));
                SessionOutcome::NotFound
            }
        }
    }

    /// Highlight the `index`-th entry of the last result list again.
    pub fn select_result(&self, index: usize) -> Result<ResultItem> {
        let mut state = self.state.lock();
        let item = state
            .results
            .items
            .get(index)
            .cloned()
            .ok_or(MapSearchError::NoSuchResult(index))?;
        self.highlighter
            .highlight(&HighlightTarget::from(&item), &mut state);
        Ok(item)
    }

    /// Suggestions for partially typed `text`.
    #[instrument(name = "Autocomplete", level = "debug", skip(self))]
    pub async fn autocomplete(&self, text: &str) -> Vec<Suggestion> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let params = SearchParams::new(text).with_view_box(self.viewport.view_box());
        match self
            .chain
            .dispatch(EventKind::AutocompleteStarting, &params)
            .await
        {
            ChainOutcome::Handled(Claim::Suggestions(suggestions)) => suggestions,
            ChainOutcome::Handled(Claim::Features(results)) => {
                results.iter().map(Suggestion::feature).collect()
            }
            ChainOutcome::Handled(Claim::Coordinate(point)) => vec![Suggestion {
                label: format!("{}: {point}", self.localizer.text(keys::COORDINATES)),
                source: SuggestionSource::Coordinate(point),
            }],
            ChainOutcome::Handled(Claim::NoSearch) | ChainOutcome::Superseded => Vec::new(),
            ChainOutcome::Deferred => self.geocoder.suggest(text).await.unwrap_or_else(|e| {
                warn!(error = %e, "Geocoder suggestions failed");
                Vec::new()
            }),
        }
    }
}
