//! Interfaces of the collaborators the search core drives but does not implement.
//!
//! The map surface, the result panel, the generic geocoder and the string
//! catalog all live outside this crate. The core only calls these traits.

use async_trait::async_trait;

use crate::{
    geo::{GeoBounds, LatLon},
    highlight::FeatureFilter,
    query::ResultItem,
};

/// Handle of a layer the core added to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(pub u64);

/// Handle of a marker the core dropped on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// Geometry the core asks the map to draw on top of everything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Overlay {
    /// Outline of a highlighted feature's bounds.
    Outline(GeoBounds),
}

/// The pre-existing map surface.
pub trait MapViewport: Send + Sync {
    fn pan_to(&self, point: LatLon);

    fn fit_bounds(&self, bounds: GeoBounds);

    fn add_overlay(&self, overlay: Overlay) -> LayerHandle;

    fn remove_layer(&self, handle: LayerHandle);

    /// Restrict what a layer-tree layer renders; `None` lifts the restriction.
    fn set_filter(&self, layer_id: &str, filter: Option<FeatureFilter>);

    /// Visibility of a layer in the layer tree, by its stable identifier.
    fn is_layer_visible(&self, layer_id: &str) -> bool;

    /// Make a layer visible and add it to the map.
    fn show_layer(&self, layer_id: &str);

    fn add_marker(&self, point: LatLon, draggable: bool) -> MarkerHandle;

    fn remove_marker(&self, handle: MarkerHandle);

    /// What the map currently shows, in the service projection.
    fn view_box(&self) -> Option<crate::geo::BBox> {
        None
    }
}

/// The side panel that hosts the search box and the result list.
pub trait ResultPanel: Send + Sync {
    fn open(&self);

    fn show_loading(&self, caption: &str);

    /// End the loading state of a search that produced no result list.
    fn hide_loading(&self);

    /// Render `items` in order; each entry is expected to call back into
    /// [`SearchSession::select_result`](crate::SearchSession::select_result).
    fn render_results(&self, title: &str, items: &[ResultItem]);

    fn set_search_text(&self, text: &str);
}

/// A hit from the generic geocoder.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub label: String,
    pub point: LatLon,
    pub bounds: Option<GeoBounds>,
}

/// Where a suggestion came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SuggestionSource {
    Feature { id: String },
    Coordinate(LatLon),
    Geocoder,
}

/// One autocomplete entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub label: String,
    pub source: SuggestionSource,
}

impl Suggestion {
    pub fn feature(item: &ResultItem) -> Self {
        Self {
            label: item.label.clone(),
            source: SuggestionSource::Feature {
                id: item.id.clone(),
            },
        }
    }
}

/// Generic geocoding, used when no observer claims a search.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, text: &str) -> anyhow::Result<Option<GeocodeHit>>;

    async fn suggest(&self, _text: &str) -> anyhow::Result<Vec<Suggestion>> {
        Ok(Vec::new())
    }

    /// Present a hit in the geocoder's own result view.
    fn show_hit(&self, hit: &GeocodeHit);

    /// The geocoder's "not found" presentation.
    fn show_not_found(&self, caption: &str);
}

/// Display strings by key.
pub trait Localizer: Send + Sync {
    fn text(&self, key: &str) -> String;
}
