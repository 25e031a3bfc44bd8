//! Zipping the service's `fields`/`values` table into result items.

use std::collections::BTreeMap;

use ahash::AHashMap as HashMap;
use mapsearch_transport::QueryRows;
use serde_json::Value;
use tracing::warn;

use super::{ResultItem, request::ENVELOPE_ALIASES};
use crate::{config::SearchSettings, geo::BBox};

/// Where a column of the reply ends up in a [`ResultItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot<'a> {
    Id,
    Label,
    Envelope(usize),
    Aux(&'a str),
}

/// Field name → attribute table for one settings instance.
struct FieldTable<'a> {
    slots: HashMap<&'a str, Slot<'a>>,
}

impl<'a> FieldTable<'a> {
    fn new(settings: &'a SearchSettings) -> Self {
        let mut slots = HashMap::new();
        slots.insert(settings.id_field.as_str(), Slot::Id);
        slots.insert(settings.label_field.as_str(), Slot::Label);
        for (position, alias) in ENVELOPE_ALIASES.iter().enumerate() {
            slots.insert(*alias, Slot::Envelope(position));
        }
        for field in &settings.aux_fields {
            slots.insert(field.column.as_str(), Slot::Aux(field.attribute.as_str()));
        }
        Self { slots }
    }

    fn slot(&self, field: &str) -> Option<Slot<'a>> {
        self.slots.get(field).copied()
    }
}

fn cell_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn cell_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Map every row to a [`ResultItem`], keeping server order.
///
/// Rows without an id, a label or a complete valid envelope cannot be
/// highlighted and are dropped with a warning.
pub(crate) fn rows_to_items(settings: &SearchSettings, rows: &QueryRows) -> Vec<ResultItem> {
    let table = FieldTable::new(settings);
    let slots: Vec<Option<Slot<'_>>> = rows.fields.iter().map(|f| table.slot(f)).collect();

    rows.values
        .iter()
        .enumerate()
        .filter_map(|(row_number, row)| {
            let mut id = None;
            let mut label = None;
            let mut envelope = [None; 4];
            let mut aux_fields = BTreeMap::new();

            for (slot, cell) in slots.iter().zip(row) {
                match slot {
                    Some(Slot::Id) => id = cell_to_string(cell),
                    Some(Slot::Label) => label = cell_to_string(cell),
                    Some(Slot::Envelope(position)) => envelope[*position] = cell_to_f64(cell),
                    Some(Slot::Aux(attribute)) => {
                        if let Some(value) = cell_to_string(cell) {
                            aux_fields.insert((*attribute).to_string(), value);
                        }
                    }
                    None => {}
                }
            }

            let bbox = match envelope {
                [Some(xmin), Some(ymin), Some(xmax), Some(ymax)] => {
                    Some(BBox::new(xmin, ymin, xmax, ymax)).filter(BBox::is_valid)
                }
                _ => None,
            };

            match (id, label, bbox) {
                (Some(id), Some(label), Some(bbox)) => Some(ResultItem {
                    id,
                    label,
                    bbox,
                    aux_fields,
                }),
                (id, label, bbox) => {
                    warn!(
                        row_number,
                        has_id = id.is_some(),
                        has_label = label.is_some(),
                        has_bbox = bbox.is_some(),
                        "Skipping incomplete result row"
                    );
                    None
                }
            }
        })
        .collect()
}
