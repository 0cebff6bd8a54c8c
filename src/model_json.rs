//! Purpose: JSON envelopes for model metadata and records printed by the CLI.
//! Exports: `options_json`, `field_json`, `record_json`, `resolved_json`.
//! Role: Keep CLI output shapes in one place.
//! Invariants: Stable key names; optional attributes are emitted only when set.

use serde_json::{Map, Value, json};
use syncano::api::ApiResult;
use syncano::models::{Field, FieldKind, Options, Record};

pub(crate) fn options_json(options: &Options) -> Value {
    let mut map = Map::new();
    map.insert("model".to_string(), json!(options.model()));
    map.insert("name".to_string(), json!(options.name()));
    map.insert("plural_name".to_string(), json!(options.plural_name()));
    map.insert("related_name".to_string(), json!(options.related_name()));
    if let Some(parent) = options.parent() {
        map.insert("parent".to_string(), json!(parent));
    }
    if options.is_dynamic() {
        map.insert("dynamic".to_string(), json!(true));
    }
    map.insert("endpoints".to_string(), endpoints_json(options));
    map.insert(
        "fields".to_string(),
        Value::Array(options.fields().iter().map(field_json).collect()),
    );
    Value::Object(map)
}

fn endpoints_json(options: &Options) -> Value {
    let mut map = Map::new();
    for (name, endpoint) in options.endpoints() {
        map.insert(
            name.clone(),
            json!({
                "methods": endpoint.methods.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
                "path": endpoint.path,
                "properties": endpoint.properties,
            }),
        );
    }
    Value::Object(map)
}

pub(crate) fn field_json(field: &Field) -> Value {
    let mut map = Map::new();
    map.insert("name".to_string(), json!(field.name));
    map.insert("type".to_string(), json!(field.kind.type_name()));
    map.insert("required".to_string(), json!(field.required));
    map.insert("read_only".to_string(), json!(field.read_only));
    if let Some(label) = &field.label {
        map.insert("label".to_string(), json!(label));
    }
    if let Some(max_length) = field.max_length {
        map.insert("max_length".to_string(), json!(max_length));
    }
    if let Some(min_length) = field.min_length {
        map.insert("min_length".to_string(), json!(min_length));
    }
    if let FieldKind::Choice(choices) = &field.kind {
        let choices: Vec<Value> = choices
            .iter()
            .map(|choice| json!({"display_name": choice.display_name, "value": choice.value}))
            .collect();
        map.insert("choices".to_string(), Value::Array(choices));
    }
    if let Some(default) = field.default.as_ref().and_then(|value| value.to_json().ok()) {
        map.insert("default".to_string(), default);
    }
    Value::Object(map)
}

pub(crate) fn record_json(record: &Record) -> ApiResult<Value> {
    record.to_json()
}

pub(crate) fn resolved_json(options: &Options, properties: Map<String, Value>) -> Value {
    json!({
        "model": options.model(),
        "properties": Value::Object(properties),
    })
}
