//! In-memory collaborators that record what the core asked of them.
//!
//! Pair these with [`ScriptedTransport`](crate::transport::ScriptedTransport)
//! to drive a [`SearchSession`](crate::SearchSession) without a map or a network.

use std::collections::VecDeque;

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    collaborators::{
        GeocodeHit, Geocoder, LayerHandle, MapViewport, MarkerHandle, Overlay, ResultPanel,
        Suggestion,
    },
    geo::{BBox, GeoBounds, LatLon},
    highlight::FeatureFilter,
    query::ResultItem,
};

#[derive(Default)]
struct ViewportLog {
    next_handle: u64,
    panned: Vec<LatLon>,
    fitted: Vec<GeoBounds>,
    overlays: Vec<(LayerHandle, Overlay)>,
    filters: HashMap<String, Option<FeatureFilter>>,
    hidden: HashSet<String>,
    shown: Vec<String>,
    markers: Vec<MarkerHandle>,
    view_box: Option<BBox>,
}

impl ViewportLog {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// A map that draws nothing. Every layer starts out visible.
#[derive(Default)]
pub struct RecordingViewport {
    log: Mutex<ViewportLog>,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `view_box` as the visible extent.
    pub fn with_view_box(view_box: BBox) -> Self {
        let viewport = Self::new();
        viewport.log.lock().view_box = Some(view_box);
        viewport
    }

    /// Untick a layer in the layer tree.
    pub fn hide_layer(&self, layer_id: &str) {
        self.log.lock().hidden.insert(layer_id.to_string());
    }

    pub fn panned_to(&self) -> Vec<LatLon> {
        self.log.lock().panned.clone()
    }

    pub fn fitted_bounds(&self) -> Vec<GeoBounds> {
        self.log.lock().fitted.clone()
    }

    /// Overlays added and not yet removed, oldest first.
    pub fn live_overlays(&self) -> Vec<Overlay> {
        self.log.lock().overlays.iter().map(|(_, o)| *o).collect()
    }

    pub fn filter(&self, layer_id: &str) -> Option<FeatureFilter> {
        self.log.lock().filters.get(layer_id).cloned().flatten()
    }

    /// Layers that were hidden and then shown by the core.
    pub fn shown_layers(&self) -> Vec<String> {
        self.log.lock().shown.clone()
    }

    pub fn live_markers(&self) -> Vec<MarkerHandle> {
        self.log.lock().markers.clone()
    }
}

impl MapViewport for RecordingViewport {
    fn pan_to(&self, point: LatLon) {
        self.log.lock().panned.push(point);
    }

    fn fit_bounds(&self, bounds: GeoBounds) {
        self.log.lock().fitted.push(bounds);
    }

    fn add_overlay(&self, overlay: Overlay) -> LayerHandle {
        let mut log = self.log.lock();
        let handle = LayerHandle(log.handle());
        log.overlays.push((handle, overlay));
        handle
    }

    fn remove_layer(&self, handle: LayerHandle) {
        self.log.lock().overlays.retain(|(h, _)| *h != handle);
    }

    fn set_filter(&self, layer_id: &str, filter: Option<FeatureFilter>) {
        self.log.lock().filters.insert(layer_id.to_string(), filter);
    }

    fn is_layer_visible(&self, layer_id: &str) -> bool {
        !self.log.lock().hidden.contains(layer_id)
    }

    fn show_layer(&self, layer_id: &str) {
        let mut log = self.log.lock();
        log.hidden.remove(layer_id);
        log.shown.push(layer_id.to_string());
    }

    fn add_marker(&self, _point: LatLon, _draggable: bool) -> MarkerHandle {
        let mut log = self.log.lock();
        let handle = MarkerHandle(log.handle());
        log.markers.push(handle);
        handle
    }

    fn remove_marker(&self, handle: MarkerHandle) {
        self.log.lock().markers.retain(|m| *m != handle);
    }

    fn view_box(&self) -> Option<BBox> {
        self.log.lock().view_box
    }
}

/// One call made on a [`RecordingPanel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCall {
    Open,
    Loading(String),
    LoadingDone,
    Results { title: String, labels: Vec<String> },
    SearchText(String),
}

#[derive(Default)]
pub struct RecordingPanel {
    calls: Mutex<Vec<PanelCall>>,
}

impl RecordingPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PanelCall> {
        self.calls.lock().clone()
    }

    /// The text last written into the search box.
    pub fn search_text(&self) -> Option<String> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            PanelCall::SearchText(text) => Some(text.clone()),
            _ => None,
        })
    }
}

impl ResultPanel for RecordingPanel {
    fn open(&self) {
        self.calls.lock().push(PanelCall::Open);
    }

    fn show_loading(&self, caption: &str) {
        self.calls.lock().push(PanelCall::Loading(caption.to_string()));
    }

    fn hide_loading(&self) {
        self.calls.lock().push(PanelCall::LoadingDone);
    }

    fn render_results(&self, title: &str, items: &[ResultItem]) {
        self.calls.lock().push(PanelCall::Results {
            title: title.to_string(),
            labels: items.iter().map(|item| item.label.clone()).collect(),
        });
    }

    fn set_search_text(&self, text: &str) {
        self.calls.lock().push(PanelCall::SearchText(text.to_string()));
    }
}

#[derive(Default)]
struct GeocoderLog {
    hits: VecDeque<GeocodeHit>,
    suggestions: Vec<Suggestion>,
    queries: Vec<String>,
    shown: Vec<GeocodeHit>,
    not_found: Vec<String>,
}

/// A geocoder that finds nothing unless told otherwise.
#[derive(Default)]
pub struct RecordingGeocoder {
    log: Mutex<GeocoderLog>,
}

impl RecordingGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next lookup with `hit`.
    pub fn push_hit(&self, hit: GeocodeHit) {
        self.log.lock().hits.push_back(hit);
    }

    /// Offer `suggestion` on every suggest call.
    pub fn push_suggestion(&self, suggestion: Suggestion) {
        self.log.lock().suggestions.push(suggestion);
    }

    pub fn queries(&self) -> Vec<String> {
        self.log.lock().queries.clone()
    }

    pub fn shown_hits(&self) -> Vec<GeocodeHit> {
        self.log.lock().shown.clone()
    }

    pub fn not_found_captions(&self) -> Vec<String> {
        self.log.lock().not_found.clone()
    }
}

#[async_trait]
impl Geocoder for RecordingGeocoder {
    async fn geocode(&self, text: &str) -> anyhow::Result<Option<GeocodeHit>> {
        let mut log = self.log.lock();
        log.queries.push(text.to_string());
        Ok(log.hits.pop_front())
    }

    async fn suggest(&self, _text: &str) -> anyhow::Result<Vec<Suggestion>> {
        Ok(self.log.lock().suggestions.clone())
    }

    fn show_hit(&self, hit: &GeocodeHit) {
        self.log.lock().shown.push(hit.clone());
    }

    fn show_not_found(&self, caption: &str) {
        self.log.lock().not_found.push(caption.to_string());
    }
}
