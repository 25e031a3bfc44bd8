//! Mapsearch - interactive map search core
//!
//! Mapsearch resolves what a user types into a map's search box. Free text is
//! matched against a remote vector-data layer, coordinate pairs move the map
//! straight to the point, and anything neither recognizes falls through to a
//! generic geocoder. The best match is highlighted on the map and the full
//! ranked list goes to the result panel.
//!
//! The map, the panel, the geocoder and the string catalog belong to the host
//! application; the core only talks to them through the traits in
//! [`collaborators`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use mapsearch::{
//!     Catalog, SearchSession, SearchSettings, SessionCollaborators, SessionOutcome,
//!     testing::{RecordingGeocoder, RecordingPanel, RecordingViewport},
//!     transport::{QueryResponse, ScriptedTransport},
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let transport = Arc::new(ScriptedTransport::new());
//! transport.push_reply(QueryResponse::ok(
//!     ["fsc_id", "holder", "xmin", "ymin", "xmax", "ymax"].map(String::from).to_vec(),
//!     vec![vec!["A-1".into(), "Acme Corp".into(), 0.into(), 0.into(), 10.into(), 10.into()]],
//! ));
//!
//! let settings = Arc::new(SearchSettings::builder("https://gis.example.org/query").build()?);
//! let session = SearchSession::with_default_observers(
//!     transport,
//!     SessionCollaborators {
//!         viewport: Arc::new(RecordingViewport::new()),
//!         panel: Arc::new(RecordingPanel::new()),
//!         geocoder: Arc::new(RecordingGeocoder::new()),
//!         localizer: Arc::new(Catalog::default()),
//!     },
//!     settings,
//! );
//!
//! match session.run("Acme").await {
//!     SessionOutcome::Features { primary, .. } => println!("Best match: {}", primary.label),
//!     other => println!("{other:?}"),
//! }
//! # Ok::<(), mapsearch::error::MapSearchError>(())
//! # }).unwrap();
//! ```
//!
//! # Pipeline
//!
//! - [`ObserverChain`]: ordered, short-circuiting handlers per event kind
//! - [`QueryCollection`]: one remote query round-trip and its status
//! - [`SearchSession`]: drives the chain and presents the outcome
//! - [`ResultHighlighter`]: fits, filters and outlines the chosen feature

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod collaborators;
mod config;
pub mod error;
pub mod geo;
mod highlight;
mod i18n;
mod observer;
mod query;
mod session;
pub mod testing;

pub use config::{AuxField, SearchSettings, SearchSettingsBuilder};
pub use highlight::{FeatureFilter, HighlightTarget, ResultHighlighter};
pub use i18n::{Catalog, keys};
pub use mapsearch_transport as transport;
pub use observer::{
    ChainOutcome, Claim, CoordinateError, CoordinateObserver, EventKind, FeatureObserver,
    FeatureObserverMode, Flow, InstallOptions, ObserverChain, SearchObserver, SearchParams,
    install_default_observers, parse_coordinates,
};
pub use query::{
    DateInterval, DispatchOutcome, QueryCollection, QueryError, QueryEvent, QueryStatus,
    ResultItem, ResultSet, SearchQuery, build_request, clean_search_text,
};
pub use session::{
    SearchSession, SessionCollaborators, SessionEvent, SessionOutcome, SessionState,
};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the search pipeline.
///
/// `RUST_LOG` wins over `level` when set. Safe to call more than once; only
/// the first call installs the subscriber.
///
/// ```rust
/// mapsearch::init_logging(tracing::Level::INFO)?;
/// # Ok::<(), mapsearch::error::MapSearchError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> error::Result<()> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("reqwest=warn".parse()?)
            .add_directive("hyper_util=warn".parse()?);

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok::<_, error::MapSearchError>(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        assert!(init_logging(tracing::Level::WARN).is_ok());
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }
}
