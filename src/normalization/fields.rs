//! Field extraction shared by the lead and deal canonicalizers.

use serde_json::Value;

/// Read the pipeline stage of a CRM entity, lower-cased.
///
/// A non-empty nested `pipelineStage.value` wins over a flat `stage`. A flat
/// `stage` may itself be an object carrying `value` or `name`, which is how
/// deal payloads nest it. Returns `""` when no stage is present.
pub fn extract_stage(entity: &Value) -> String {
    let nested = entity
        .get("pipelineStage")
        .and_then(|stage| stage.get("value"))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty());

    let stage = nested.or_else(|| match entity.get("stage") {
        Some(Value::String(flat)) => Some(flat.as_str()),
        Some(Value::Object(object)) => object
            .get("value")
            .or_else(|| object.get("name"))
            .and_then(Value::as_str),
        _ => None,
    });

    stage.unwrap_or_default().to_lowercase()
}

/// Pick the primary entry of a `[{ value, primary }]` list.
///
/// The first entry flagged `primary: true` wins, then the first entry.
/// A missing or empty list falls back to the legacy flat scalar, and `""`
/// is returned when neither yields a value.
pub fn extract_primary(items: Option<&Value>, legacy_scalar: Option<&Value>) -> String {
    if let Some(entries) = items.and_then(Value::as_array).filter(|e| !e.is_empty()) {
        let selected = entries
            .iter()
            .find(|entry| entry.get("primary").and_then(Value::as_bool) == Some(true))
            .unwrap_or(&entries[0]);

        return selected
            .get("value")
            .and_then(scalar_to_string)
            .unwrap_or_default();
    }

    legacy_scalar.and_then(scalar_to_string).unwrap_or_default()
}

/// Render a JSON string or number as text. CRM ids arrive as either.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// First present, non-null field among `keys`.
pub fn first_field<'a>(source: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| source.get(*key))
        .find(|value| !value.is_null())
}

/// First field among `keys` rendered as non-empty text.
pub fn text_field(source: &Value, keys: &[&str]) -> Option<String> {
    first_field(source, keys)
        .and_then(scalar_to_string)
        .filter(|text| !text.is_empty())
}

/// First field among `keys` read as a number. Numeric strings and
/// `{ value }` wrappers are accepted.
pub fn number_field(source: &Value, keys: &[&str]) -> Option<f64> {
    match first_field(source, keys)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        Value::Object(object) => object.get("value").and_then(|inner| match inner {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_pipeline_stage_wins() {
        let entity = json!({ "pipelineStage": { "value": "Interested" }, "stage": "lost" });
        assert_eq!(extract_stage(&entity), "interested");
    }

    #[test]
    fn empty_nested_stage_falls_back_to_flat() {
        let entity = json!({ "pipelineStage": { "value": "" }, "stage": "WON" });
        assert_eq!(extract_stage(&entity), "won");
    }

    #[test]
    fn flat_stage_object_is_read() {
        let deal = json!({ "stage": { "id": 4, "name": "Won" } });
        assert_eq!(extract_stage(&deal), "won");
    }

    #[test]
    fn missing_stage_is_empty() {
        assert_eq!(extract_stage(&json!({ "pipelineStage": null })), "");
        assert_eq!(extract_stage(&json!({})), "");
    }

    #[test]
    fn primary_entry_beats_array_order() {
        let phones = json!([
            { "value": "111", "primary": false },
            { "value": "222", "primary": true }
        ]);
        assert_eq!(extract_primary(Some(&phones), None), "222");
    }

    #[test]
    fn first_entry_used_without_primary_flag() {
        let emails = json!([{ "value": "a@x.com" }, { "value": "b@x.com" }]);
        assert_eq!(extract_primary(Some(&emails), Some(&json!("legacy@x.com"))), "a@x.com");
    }

    #[test]
    fn legacy_scalar_used_when_array_missing_or_empty() {
        let legacy = json!("legacy@x.com");
        assert_eq!(extract_primary(None, Some(&legacy)), "legacy@x.com");
        assert_eq!(extract_primary(Some(&json!([])), Some(&legacy)), "legacy@x.com");
        assert_eq!(extract_primary(None, Some(&json!(9876543210u64))), "9876543210");
    }

    #[test]
    fn nothing_present_is_empty() {
        assert_eq!(extract_primary(None, None), "");
        assert_eq!(extract_primary(Some(&Value::Null), Some(&Value::Null)), "");
    }

    #[test]
    fn number_field_accepts_strings_and_wrappers() {
        let source = json!({ "a": "12.5", "b": { "value": 3 }, "c": true });
        assert_eq!(number_field(&source, &["a"]), Some(12.5));
        assert_eq!(number_field(&source, &["b"]), Some(3.0));
        assert_eq!(number_field(&source, &["c"]), None);
        assert_eq!(number_field(&source, &["missing", "b"]), Some(3.0));
    }
}
