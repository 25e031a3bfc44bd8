//! End-to-end search against a scripted query service
//!
//! This example runs the whole pipeline without a network or a map:
//! - a feature search that matches two holders
//! - re-selecting the second entry of the result list
//! - a coordinate search
//! - a search nothing matches, which falls through to the geocoder
//! - autocomplete suggestions while typing

use std::sync::Arc;

use mapsearch::{
    SearchSession, SearchSettings, SessionCollaborators, SessionOutcome,
    testing::{RecordingGeocoder, RecordingPanel, RecordingViewport},
    transport::{QueryRequest, QueryResponse, ScriptedTransport},
};
use serde_json::json;

/// Answers like the concession layer would for a handful of holders.
fn concession_service(request: &QueryRequest) -> mapsearch::transport::Result<QueryResponse> {
    let predicate = request.param("where").unwrap_or_default();
    let fields = ["fsc_id", "holder", "region", "area_ha", "xmin", "ymin", "xmax", "ymax"]
        .map(String::from)
        .to_vec();

    let rows = if predicate.contains("'%Ac") {
        vec![
            vec![
                json!("A-1"),
                json!("Acme Corp"),
                json!("North"),
                json!(1250.5),
                json!(4_186_000),
                json!(7_509_000),
                json!(4_187_000),
                json!(7_511_000),
            ],
            vec![
                json!("A-2"),
                json!("Acme Holdings"),
                json!("South"),
                json!(80),
                json!(4_190_000),
                json!(7_500_000),
                json!(4_191_000),
                json!(7_501_000),
            ],
        ]
    } else {
        Vec::new()
    };
    Ok(QueryResponse::ok(fields, rows))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    mapsearch::init_logging(tracing::Level::INFO)?;

    let settings = Arc::new(SearchSettings::builder("https://gis.example.org/query").build()?);
    let viewport = Arc::new(RecordingViewport::new());
    let panel = Arc::new(RecordingPanel::new());

    let session = SearchSession::with_default_observers(
        Arc::new(ScriptedTransport::with_responder(concession_service)),
        SessionCollaborators {
            viewport: viewport.clone(),
            panel: panel.clone(),
            geocoder: Arc::new(RecordingGeocoder::new()),
            localizer: Arc::new(settings.catalog()),
        },
        settings.clone(),
    );
    println!("Search box hint: {}", session.placeholder());

    for text in ["\"Acme\"", "55.75, 37.61", "Zzyzx"] {
        println!("\nSearching for {text}:");
        print_outcome(&session.run(text).await);
    }

    println!("\nRe-selecting the second result:");
    let item = session.select_result(1)?;
    println!("  highlighted {} ({})", item.label, item.id);
    println!("  viewport fitted {} times", viewport.fitted_bounds().len());

    println!("\nSuggestions for 'Ac':");
    for suggestion in session.autocomplete("Ac").await {
        println!("  - {}", suggestion.label);
    }

    println!("\nPanel calls: {:#?}", panel.calls());
    Ok(())
}

fn print_outcome(outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::Features { count, primary } => {
            let region = primary.aux_fields.get("region").map_or("?", String::as_str);
            println!("  {count} matches, best: {} in {region}", primary.label);
        }
        SessionOutcome::Coordinate(point) => println!("  moved the map to {point}"),
        SessionOutcome::Geocoded(label) => println!("  geocoder found {label}"),
        SessionOutcome::NotFound => println!("  nothing found"),
        SessionOutcome::NoSearch | SessionOutcome::Superseded => println!("  {outcome:?}"),
    }
}
