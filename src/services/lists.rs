// src/services/lists.rs

//! List protocol decoder.
//!
//! One generic algorithm serves every reference entity: parse the literal
//! payload, walk its `list` sequence and build each entity by copying the
//! source fields named in a field map.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::services::literal;

/// Decode a list payload into entities of type `T`.
///
/// `field_map` holds `(target_field, source_field)` pairs. Upstream order is
/// preserved and the output has exactly one entity per `list` item.
pub fn decode_list<T: DeserializeOwned>(
    payload: &str,
    field_map: &[(&str, &str)],
) -> Result<Vec<T>> {
    let document = literal::parse(payload)?;

    let items = document
        .get("list")
        .ok_or_else(|| AppError::decode("list payload", "missing key 'list'"))?
        .as_array()
        .ok_or_else(|| AppError::decode("list payload", "'list' is not a sequence"))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_item(index, item, field_map))
        .collect()
}

fn decode_item<T: DeserializeOwned>(
    index: usize,
    item: &Value,
    field_map: &[(&str, &str)],
) -> Result<T> {
    let context = format!("list item {index}");
    let source = item
        .as_object()
        .ok_or_else(|| AppError::decode(&context, "item is not a mapping"))?;

    let mut target = Map::with_capacity(field_map.len());
    for (target_field, source_field) in field_map {
        let value = source.get(*source_field).ok_or_else(|| {
            AppError::decode(&context, format!("missing source field '{source_field}'"))
        })?;
        target.insert((*target_field).to_string(), value.clone());
    }

    serde_json::from_value(Value::Object(target)).map_err(|e| AppError::decode(&context, e))
}
