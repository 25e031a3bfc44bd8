use std::time::Duration;

use crate::{error::MapSearchError, i18n::Catalog};

/// One auxiliary column requested from the service and the attribute name it
/// is stored under in a result item.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxField {
    pub column: String,
    pub attribute: String,
}

impl AuxField {
    pub fn new(column: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            attribute: attribute.into(),
        }
    }
}

/// Everything the search pipeline needs to know about the remote layer and the map.
///
/// Use [`SearchSettings::builder`] to create one; `build()` validates it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Query endpoint of the vector-data service
    pub endpoint: String,
    /// Identity column, also the first searched text field
    pub id_field: String,
    /// Holder-name column; second searched text field and sort key
    pub label_field: String,
    /// Auxiliary attribute columns carried into each result
    pub aux_fields: Vec<AuxField>,
    /// Geometry column the envelope columns are derived from
    pub geometry_column: String,
    /// Rows requested for a full search
    pub page_size: usize,
    /// Rows requested while typing
    pub autocomplete_page_size: usize,
    /// Layer-tree identifier of the layer that gets filtered on highlight
    pub reference_layer: String,
    /// Send the current view box with each query
    pub restrict_to_view: bool,
    /// Per-request timeout of the HTTP transport
    pub request_timeout: Duration,
    /// Locale of the built-in string catalog
    pub locale: String,
}

impl SearchSettings {
    pub fn builder(endpoint: impl Into<String>) -> SearchSettingsBuilder {
        SearchSettingsBuilder::new(endpoint)
    }

    /// String catalog for the configured locale.
    pub fn catalog(&self) -> Catalog {
        Catalog::new(&self.locale)
    }

    /// HTTP transport honouring the configured timeout.
    #[cfg(feature = "http")]
    pub fn http_transport(&self) -> mapsearch_transport::HttpTransport {
        mapsearch_transport::HttpTransport::new().with_timeout(self.request_timeout)
    }
}

/// Builder for [`SearchSettings`] with the defaults of the concession layer.
#[derive(Debug, Clone)]
pub struct SearchSettingsBuilder {
    settings: SearchSettings,
}

impl SearchSettingsBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            settings: SearchSettings {
                endpoint: endpoint.into(),
                id_field: "fsc_id".to_string(),
                label_field: "holder".to_string(),
                aux_fields: vec![
                    AuxField::new("region", "region"),
                    AuxField::new("area_ha", "area"),
                ],
                geometry_column: "geom".to_string(),
                page_size: 50,
                autocomplete_page_size: 7,
                reference_layer: "concessions".to_string(),
                restrict_to_view: false,
                request_timeout: Duration::from_secs(15),
                locale: "en".to_string(),
            },
        }
    }

    /// Small pages and a short timeout, for slow links.
    pub fn compact(endpoint: impl Into<String>) -> Self {
        let mut builder = Self::new(endpoint);
        builder.settings.page_size = 10;
        builder.settings.autocomplete_page_size = 5;
        builder.settings.request_timeout = Duration::from_secs(5);
        builder
    }

    /// Identity column, also the first searched text field.
    pub fn id_field(mut self, column: impl Into<String>) -> Self {
        self.settings.id_field = column.into();
        self
    }

    /// Holder-name column, searched and used as the sort key.
    pub fn label_field(mut self, column: impl Into<String>) -> Self {
        self.settings.label_field = column.into();
        self
    }

    /// Replace the auxiliary columns.
    pub fn aux_fields(mut self, fields: impl IntoIterator<Item = AuxField>) -> Self {
        self.settings.aux_fields = fields.into_iter().collect();
        self
    }

    /// Geometry column the envelope columns are derived from.
    pub fn geometry_column(mut self, column: impl Into<String>) -> Self {
        self.settings.geometry_column = column.into();
        self
    }

    /// Rows requested for a full search.
    pub fn page_size(mut self, rows: usize) -> Self {
        self.settings.page_size = rows;
        self
    }

    /// Rows requested while typing.
    pub fn autocomplete_page_size(mut self, rows: usize) -> Self {
        self.settings.autocomplete_page_size = rows;
        self
    }

    /// Layer-tree identifier of the layer filtered on highlight.
    pub fn reference_layer(mut self, layer_id: impl Into<String>) -> Self {
        self.settings.reference_layer = layer_id.into();
        self
    }

    /// Send the current view box with each query.
    pub fn restrict_to_view(mut self, enabled: bool) -> Self {
        self.settings.restrict_to_view = enabled;
        self
    }

    /// Per-request timeout of the HTTP transport.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    /// Locale of the built-in string catalog.
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.settings.locale = locale.into();
        self
    }

    pub fn build(self) -> Result<SearchSettings, MapSearchError> {
        let settings = self.settings;
        if settings.endpoint.trim().is_empty() {
            return Err(MapSearchError::ConfigError(
                "Query endpoint must not be empty".to_string(),
            ));
        }
        for (name, value) in [
            ("id_field", &settings.id_field),
            ("label_field", &settings.label_field),
            ("geometry_column", &settings.geometry_column),
            ("reference_layer", &settings.reference_layer),
        ] {
            if value.trim().is_empty() {
                return Err(MapSearchError::ConfigError(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if settings.id_field == settings.label_field {
            return Err(MapSearchError::ConfigError(format!(
                "id_field and label_field must differ, both are {:?}",
                settings.id_field
            )));
        }
        if settings.page_size == 0 || settings.autocomplete_page_size == 0 {
            return Err(MapSearchError::ConfigError(
                "Page sizes must be at least 1".to_string(),
            ));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINT: &str = "https://gis.example.org/api/query";

    #[test]
    fn test_default_builder() {
        let settings = SearchSettings::builder(ENDPOINT).build().unwrap();
        assert_eq!(settings.id_field, "fsc_id");
        assert_eq!(settings.label_field, "holder");
        assert_eq!(settings.aux_fields.len(), 2);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.autocomplete_page_size, 7);
        assert!(!settings.restrict_to_view);
        assert_eq!(settings.locale, "en");
    }

    #[test]
    fn test_compact_preset() {
        let settings = SearchSettingsBuilder::compact(ENDPOINT).build().unwrap();
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.autocomplete_page_size, 5);
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_override_preset() {
        let settings = SearchSettingsBuilder::compact(ENDPOINT)
            .page_size(25)
            .locale("ru")
            .restrict_to_view(true)
            .build()
            .unwrap();

        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.autocomplete_page_size, 5);
        assert_eq!(settings.locale, "ru");
        assert!(settings.restrict_to_view);
        assert_eq!(settings.catalog().locale(), "ru");
    }

    #[test]
    fn test_method_chaining() {
        let settings = SearchSettings::builder(ENDPOINT)
            .id_field("lease_id")
            .label_field("owner")
            .aux_fields([AuxField::new("lease_type", "kind")])
            .geometry_column("shape")
            .reference_layer("leases")
            .build()
            .unwrap();

        assert_eq!(settings.id_field, "lease_id");
        assert_eq!(settings.label_field, "owner");
        assert_eq!(settings.aux_fields, vec![AuxField::new("lease_type", "kind")]);
        assert_eq!(settings.geometry_column, "shape");
        assert_eq!(settings.reference_layer, "leases");
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let result = SearchSettings::builder("  ").build();
        assert!(matches!(result, Err(MapSearchError::ConfigError(_))));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(SearchSettings::builder(ENDPOINT).page_size(0).build().is_err());
        assert!(
            SearchSettings::builder(ENDPOINT)
                .autocomplete_page_size(0)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_identical_text_fields_rejected() {
        let result = SearchSettings::builder(ENDPOINT)
            .id_field("name")
            .label_field("name")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_layer_rejected() {
        let result = SearchSettings::builder(ENDPOINT).reference_layer("").build();
        assert!(result.is_err());
    }
}
