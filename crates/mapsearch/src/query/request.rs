//! Turning a [`SearchQuery`] into a request for the query endpoint.

use itertools::Itertools;
use mapsearch_transport::QueryRequest;

use super::SearchQuery;
use crate::{config::SearchSettings, geo::BBox};

/// Characters stripped from both ends of the user's text, besides whitespace.
const QUOTE_CHARS: &[char] = &['"', '\'', '`', '«', '»', '“', '”', '„'];

/// Aliases of the derived envelope columns, in `xmin, ymin, xmax, ymax` order.
pub(crate) const ENVELOPE_ALIASES: [&str; 4] = ["xmin", "ymin", "xmax", "ymax"];
const ENVELOPE_FUNCTIONS: [&str; 4] = ["ST_XMin", "ST_YMin", "ST_XMax", "ST_YMax"];

/// Trim leading/trailing quotes and whitespace in any mix.
pub fn clean_search_text(raw: &str) -> &str {
    raw.trim_matches(|c: char| c.is_whitespace() || QUOTE_CHARS.contains(&c))
}

/// Escape text for use inside a single-quoted `ILIKE '%...%'` pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\'' => escaped.push_str("''"),
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

fn predicate(settings: &SearchSettings, text: &str) -> String {
    let pattern = escape_like(text);
    format!(
        "{id} ILIKE '%{pattern}%' OR {label} ILIKE '%{pattern}%'",
        id = settings.id_field,
        label = settings.label_field,
    )
}

fn out_fields(settings: &SearchSettings) -> String {
    let envelope = ENVELOPE_FUNCTIONS
        .iter()
        .zip(ENVELOPE_ALIASES)
        .map(|(function, alias)| format!("{function}({}) AS {alias}", settings.geometry_column));

    [settings.id_field.clone(), settings.label_field.clone()]
        .into_iter()
        .chain(settings.aux_fields.iter().map(|field| field.column.clone()))
        .chain(envelope)
        .join(",")
}

/// Build the request for `query`.
///
/// `view_box` is only sent when the settings ask for view-restricted search.
pub fn build_request(
    settings: &SearchSettings,
    query: &SearchQuery,
    view_box: Option<&BBox>,
) -> QueryRequest {
    let mut request = QueryRequest::new(settings.endpoint.clone())
        .with_param("f", "json")
        .with_param("where", predicate(settings, query.text()))
        .with_param("fields", out_fields(settings))
        .with_param("order_by", format!("{} ASC", settings.label_field))
        .with_param(
            "limit",
            query.page_size().unwrap_or(settings.page_size).to_string(),
        );

    if let Some(interval) = query.date_interval() {
        request = request
            .with_param("date_from", interval.start().format("%Y-%m-%d").to_string())
            .with_param("date_to", interval.end().format("%Y-%m-%d").to_string());
    }

    if settings.restrict_to_view {
        if let Some(view_box) = view_box {
            request = request.with_param("bbox", view_box.to_param());
        }
    }

    request
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::query::DateInterval;

    fn settings() -> SearchSettings {
        SearchSettings::builder("https://gis.example.org/query")
            .build()
            .unwrap()
    }

    #[test]
    fn test_clean_search_text() {
        assert_eq!(clean_search_text("  \"Acme\"  "), "Acme");
        assert_eq!(clean_search_text("«Acme Corp»"), "Acme Corp");
        assert_eq!(clean_search_text("'O'Neil'"), "O'Neil");
        assert_eq!(clean_search_text(" \" ' "), "");
        assert_eq!(clean_search_text("plain"), "plain");
    }

    #[test]
    fn test_predicate_searches_both_fields() {
        let request = build_request(&settings(), &SearchQuery::new("\"Acme\""), None);
        assert_eq!(
            request.param("where"),
            Some("fsc_id ILIKE '%Acme%' OR holder ILIKE '%Acme%'")
        );
    }

    #[test]
    fn test_predicate_escapes_pattern() {
        let request = build_request(&settings(), &SearchQuery::new("O'Neil 10%_a"), None);
        let predicate = request.param("where").unwrap();
        assert!(predicate.contains("O''Neil 10\\%\\_a"), "{predicate}");
    }

    #[test]
    fn test_requested_fields_and_order() {
        let request = build_request(&settings(), &SearchQuery::new("Acme"), None);
        assert_eq!(
            request.param("fields"),
            Some(
                "fsc_id,holder,region,area_ha,ST_XMin(geom) AS xmin,ST_YMin(geom) AS ymin,\
                 ST_XMax(geom) AS xmax,ST_YMax(geom) AS ymax"
            )
        );
        assert_eq!(request.param("order_by"), Some("holder ASC"));
        assert_eq!(request.param("f"), Some("json"));
        assert_eq!(request.endpoint, "https://gis.example.org/query");
    }

    #[test]
    fn test_page_size_overrides_default() {
        let request = build_request(&settings(), &SearchQuery::new("Acme"), None);
        assert_eq!(request.param("limit"), Some("50"));

        let query = SearchQuery::new("Acme").with_page_size(5);
        let request = build_request(&settings(), &query, None);
        assert_eq!(request.param("limit"), Some("5"));
    }

    #[test]
    fn test_date_interval_params() {
        let interval = DateInterval::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 6, 30).unwrap(),
        )
        .unwrap();
        let query = SearchQuery::new("Acme").with_date_interval(interval);

        let request = build_request(&settings(), &query, None);
        assert_eq!(request.param("date_from"), Some("2020-01-01"));
        assert_eq!(request.param("date_to"), Some("2021-06-30"));
    }

    #[test]
    fn test_view_box_only_when_restricted() {
        let view_box = BBox::new(0.0, 0.0, 10.0, 10.0);

        let request = build_request(&settings(), &SearchQuery::new("Acme"), Some(&view_box));
        assert_eq!(request.param("bbox"), None);

        let restricted = SearchSettings::builder("https://gis.example.org/query")
            .restrict_to_view(true)
            .build()
            .unwrap();
        let request = build_request(&restricted, &SearchQuery::new("Acme"), Some(&view_box));
        assert_eq!(request.param("bbox"), Some("0,0,10,10"));
    }
}
