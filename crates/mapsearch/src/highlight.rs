//! Emphasizing one feature on the map.
//!
//! Highlighting a result does three things:
//! - fits the viewport to the feature's envelope
//! - filters the reference layer down to that single feature (showing the
//!   layer first if the user had hidden it)
//! - draws an outline overlay, replacing the outline of the previous call

use std::{collections::BTreeMap, sync::Arc};

use tracing::{debug, instrument};

use crate::{
    collaborators::{MapViewport, Overlay},
    config::SearchSettings,
    geo::BBox,
    query::ResultItem,
    session::SessionState,
};

/// Attribute predicate applied to a map layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureFilter {
    Eq { attribute: String, value: String },
    All(Vec<FeatureFilter>),
}

impl FeatureFilter {
    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, attributes: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Eq { attribute, value } => attributes.get(attribute) == Some(value),
            Self::All(filters) => filters.iter().all(|f| f.matches(attributes)),
        }
    }
}

/// What gets highlighted. Derived from a [`ResultItem`] and used once.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightTarget {
    pub id: String,
    pub label: String,
    pub bbox: BBox,
}

impl From<&ResultItem> for HighlightTarget {
    fn from(item: &ResultItem) -> Self {
        Self {
            id: item.id.clone(),
            label: item.label.clone(),
            bbox: item.bbox,
        }
    }
}

pub struct ResultHighlighter {
    viewport: Arc<dyn MapViewport>,
    layer_id: String,
    id_attribute: String,
    label_attribute: String,
}

impl ResultHighlighter {
    pub fn new(viewport: Arc<dyn MapViewport>, settings: &SearchSettings) -> Self {
        Self {
            viewport,
            layer_id: settings.reference_layer.clone(),
            id_attribute: settings.id_field.clone(),
            label_attribute: settings.label_field.clone(),
        }
    }

    /// Filter matching exactly the target's feature on the reference layer.
    pub fn filter_for(&self, target: &HighlightTarget) -> FeatureFilter {
        FeatureFilter::All(vec![
            FeatureFilter::equals(&self.id_attribute, &target.id),
            FeatureFilter::equals(&self.label_attribute, &target.label),
        ])
    }

    /// Remove every highlight overlay recorded in `state`.
    pub fn clear(&self, state: &mut SessionState) {
        for handle in state.take_highlight() {
            self.viewport.remove_layer(handle);
        }
    }

    #[instrument(name = "Highlight", level = "debug", skip_all, fields(id = %target.id))]
    pub fn highlight(&self, target: &HighlightTarget, state: &mut SessionState) {
        self.clear(state);

        let bounds = target.bbox.to_geo_bounds();
        self.viewport.fit_bounds(bounds);

        if !self.viewport.is_layer_visible(&self.layer_id) {
            debug!(layer = %self.layer_id, "Reference layer hidden, showing it for the match");
            self.viewport.show_layer(&self.layer_id);
        }
        self.viewport
            .set_filter(&self.layer_id, Some(self.filter_for(target)));

        let handle = self.viewport.add_overlay(Overlay::Outline(bounds));
        state.push_highlight(handle);
    }
}
