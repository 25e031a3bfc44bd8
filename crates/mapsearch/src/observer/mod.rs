//! Short-circuiting handler chain run before every search and autocomplete.
//!
//! Each [`EventKind`] has its own ordered lane of [`SearchObserver`]s. A
//! dispatch walks the lane in registration order; the first observer that
//! returns [`Flow::Stop`] claims the event and the walk ends. If every
//! observer passes with [`Flow::Next`], the caller falls through to the
//! generic geocoder.
//!
//! Dispatches of the same kind supersede each other: starting a new one
//! cancels the token handed to the older one, and the older dispatch resolves
//! to [`ChainOutcome::Superseded`] no matter what its observers return later.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mapsearch_transport::QueryTransport;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub use coordinate::{CoordinateError, CoordinateObserver, parse_coordinates};
pub use feature::{FeatureObserver, FeatureObserverMode};

use crate::{
    collaborators::Suggestion,
    config::SearchSettings,
    geo::{BBox, LatLon},
    query::ResultSet,
};

mod coordinate;
mod feature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The user submitted a search.
    SearchStarting,
    /// The user typed; suggestions are wanted.
    AutocompleteStarting,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SearchStarting => "search",
            Self::AutocompleteStarting => "autocomplete",
        })
    }
}

/// What observers get to look at.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub text: String,
    /// What the map showed when the event started, in the service projection
    pub view_box: Option<BBox>,
}

impl SearchParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            view_box: None,
        }
    }

    #[must_use]
    pub fn with_view_box(mut self, view_box: Option<BBox>) -> Self {
        self.view_box = view_box;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// How an observer resolved an event it stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// Nothing to search for; do nothing at all.
    NoSearch,
    Coordinate(LatLon),
    Features(ResultSet),
    Suggestions(Vec<Suggestion>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Claim the event; later observers do not run.
    Stop(Claim),
    /// Pass to the next observer, or to the fallback if none is left.
    Next,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    Handled(Claim),
    /// Every observer passed.
    Deferred,
    /// A newer dispatch of the same kind started before this one resolved.
    Superseded,
}

/// One stage of the chain.
#[async_trait]
pub trait SearchObserver: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect `params` and either claim the event or pass it on.
    ///
    /// `cancel` fires when a newer dispatch supersedes this one; long-running
    /// observers may watch it, but the chain stops waiting either way.
    async fn observe(&self, params: &SearchParams, cancel: &CancellationToken) -> Flow;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Run before every observer already installed.
    pub at_front: bool,
}

impl InstallOptions {
    pub fn at_front() -> Self {
        Self { at_front: true }
    }
}

struct Entry {
    observer: Arc<dyn SearchObserver>,
    builtin: bool,
}

#[derive(Default)]
struct Lane {
    entries: Vec<Entry>,
    generation: u64,
    current: Option<CancellationToken>,
}

impl Lane {
    fn insert(&mut self, entry: Entry, options: InstallOptions) {
        if options.at_front {
            self.entries.insert(0, entry);
        } else {
            self.entries.push(entry);
        }
    }

    /// Cancel the running dispatch, if any, and start a new generation.
    fn begin(&mut self) -> (u64, CancellationToken, Vec<Arc<dyn SearchObserver>>) {
        if let Some(previous) = self.current.take() {
            previous.cancel();
        }
        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some(token.clone());
        let observers = self.entries.iter().map(|e| e.observer.clone()).collect();
        (self.generation, token, observers)
    }

    fn finish(&mut self, generation: u64) {
        if self.generation == generation {
            self.current = None;
        }
    }
}

/// Per-kind ordered observer lanes.
#[derive(Default)]
pub struct ObserverChain {
    search: Mutex<Lane>,
    autocomplete: Mutex<Lane>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, kind: EventKind) -> &Mutex<Lane> {
        match kind {
            EventKind::SearchStarting => &self.search,
            EventKind::AutocompleteStarting => &self.autocomplete,
        }
    }

    pub fn install_observer(
        &self,
        kind: EventKind,
        observer: Arc<dyn SearchObserver>,
        options: InstallOptions,
    ) {
        debug!(%kind, name = observer.name(), at_front = options.at_front, "Installing observer");
        self.lane(kind).lock().insert(
            Entry {
                observer,
                builtin: false,
            },
            options,
        );
    }

    /// Install the host's default handler for `kind`, the one
    /// [`clear_default`](Self::clear_default) removes.
    pub fn install_builtin(&self, kind: EventKind, observer: Arc<dyn SearchObserver>) {
        debug!(%kind, name = observer.name(), "Installing built-in observer");
        self.lane(kind).lock().insert(
            Entry {
                observer,
                builtin: true,
            },
            InstallOptions::default(),
        );
    }

    /// Remove the built-in handler of `kind`. Returns `false` when there is
    /// none left, so only the first call has an effect.
    pub fn clear_default(&self, kind: EventKind) -> bool {
        let mut lane = self.lane(kind).lock();
        match lane.entries.iter().position(|e| e.builtin) {
            Some(index) => {
                let entry = lane.entries.remove(index);
                info!(%kind, name = entry.observer.name(), "Cleared built-in observer");
                true
            }
            None => false,
        }
    }

    /// Drop every observer of both kinds and cancel whatever is running.
    pub fn reset(&self) {
        for kind in [EventKind::SearchStarting, EventKind::AutocompleteStarting] {
            let mut lane = self.lane(kind).lock();
            if let Some(token) = lane.current.take() {
                token.cancel();
            }
            lane.entries.clear();
        }
        info!("Observer chain reset");
    }

    /// Cancel the running dispatch of `kind`, if any.
    pub fn cancel(&self, kind: EventKind) {
        if let Some(token) = self.lane(kind).lock().current.take() {
            token.cancel();
        }
    }

    pub fn len(&self, kind: EventKind) -> usize {
        self.lane(kind).lock().entries.len()
    }

    pub fn is_empty(&self, kind: EventKind) -> bool {
        self.len(kind) == 0
    }

    pub fn observer_names(&self, kind: EventKind) -> Vec<String> {
        self.lane(kind)
            .lock()
            .entries
            .iter()
            .map(|e| e.observer.name().to_string())
            .collect()
    }

    /// Run the lane of `kind` for `params`.
    ///
    /// Blank text resolves to `Handled(NoSearch)` without running anything.
    #[instrument(name = "Chain dispatch", level = "debug", skip(self, params), fields(text = %params.text))]
    pub async fn dispatch(&self, kind: EventKind, params: &SearchParams) -> ChainOutcome {
        if params.is_blank() {
            return ChainOutcome::Handled(Claim::NoSearch);
        }

        let (generation, token, observers) = self.lane(kind).lock().begin();

        for observer in observers {
            let flow = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!(generation, "Dispatch superseded");
                    return ChainOutcome::Superseded;
                }
                flow = observer.observe(params, &token) => flow,
            };

            match flow {
                Flow::Stop(_) | Flow::Next if token.is_cancelled() => {
                    debug!(generation, "Dispatch superseded");
                    return ChainOutcome::Superseded;
                }
                Flow::Stop(claim) => {
                    debug!(generation, observer = observer.name(), "Event claimed");
                    self.lane(kind).lock().finish(generation);
                    return ChainOutcome::Handled(claim);
                }
                Flow::Next => {}
            }
        }

        debug!(generation, "No observer claimed the event");
        self.lane(kind).lock().finish(generation);
        ChainOutcome::Deferred
    }
}

/// The startup mutation: drop the built-in handlers and put the coordinate
/// parser and the feature-search observers in their place.
pub fn install_default_observers(
    chain: &ObserverChain,
    transport: &Arc<dyn QueryTransport>,
    settings: &Arc<SearchSettings>,
) {
    for kind in [EventKind::SearchStarting, EventKind::AutocompleteStarting] {
        chain.clear_default(kind);
        chain.install_observer(kind, Arc::new(CoordinateObserver), InstallOptions::at_front());
    }

    chain.install_observer(
        EventKind::SearchStarting,
        Arc::new(FeatureObserver::new(
            FeatureObserverMode::Search,
            transport.clone(),
            settings.clone(),
        )),
        InstallOptions::default(),
    );
    chain.install_observer(
        EventKind::AutocompleteStarting,
        Arc::new(FeatureObserver::new(
            FeatureObserverMode::Suggest,
            transport.clone(),
            settings.clone(),
        )),
        InstallOptions::default(),
    );
}
