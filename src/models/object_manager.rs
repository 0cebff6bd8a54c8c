//! Purpose: Manager behavior for dynamically shaped data objects.
//! Exports: `get_class_name`, `LOOKUP_SEPARATOR`, `ALLOWED_LOOKUPS`, `Manager::filter`.
//! Role: Picks the concrete per-(instance, class) model before objects are built or created.
//! Invariants: One synthesized model per (instance, class) pair; later calls reuse it.
//! Invariants: A class schema is fetched at most once per registry until `clear_schemas`.
//! Invariants: Without both an instance and a class name the generic base model is used.
use super::fields::Field;
use super::manager::{INSTANCE_NAME, Manager};
use super::options::Options;
use crate::api::transport::{Method, Request, not_found_as};
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

const CLASS_NAME: &str = "class_name";

pub const LOOKUP_SEPARATOR: &str = "__";

pub const ALLOWED_LOOKUPS: &[&str] = &[
    "gt",
    "gte",
    "lt",
    "lte",
    "eq",
    "neq",
    "exists",
    "in",
    "startswith",
    "endswith",
    "contains",
    "istartswith",
    "iendswith",
    "icontains",
    "ieq",
];

/// Deterministic model name for a tuple of parts: `("my_instance", "books", "object")`
/// becomes `MyInstanceBooksObject`.
pub fn get_class_name(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split(|ch: char| !ch.is_alphanumeric()))
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

impl Manager {
    /// Concrete model for an object described by `values`.
    pub fn get_class_model(&self, values: &Map<String, Value>) -> ApiResult<Arc<Options>> {
        let base = self.options()?;
        let instance = self.property_or_default(&base, values, INSTANCE_NAME);
        let class = self.property_or_default(&base, values, CLASS_NAME);
        let (Some(instance), Some(class)) = (instance, class) else {
            return Ok(base);
        };

        if let Some(options) = self.registry().class_model(&instance, &class) {
            return Ok(options);
        }

        let schema = self.get_class_schema(&base, &instance, &class)?;
        let name = get_class_name(&[&instance, &class, "object"]);
        let mut options = base.derive(name);
        for field in schema {
            if !options.has_field(&field.name) {
                options.add_field(field)?;
            }
        }
        let options = self.registry().add_class_model(&instance, &class, options)?;
        debug!(model = %options.model(), instance = %instance, class = %class, "synthesized object model");
        Ok(options)
    }

    /// Field table for a class, from the registry cache or an OPTIONS call
    /// against the object list endpoint (`actions.POST`).
    pub fn get_class_schema(
        &self,
        base: &Options,
        instance: &str,
        class: &str,
    ) -> ApiResult<Vec<Field>> {
        if let Some(schema) = self.registry().get_schema(instance, class) {
            return Ok(schema);
        }

        let mut properties = Map::new();
        properties.insert(INSTANCE_NAME.to_string(), Value::from(instance));
        properties.insert(CLASS_NAME.to_string(), Value::from(class));
        let path = base.resolve_endpoint("list", &properties)?;
        debug!(instance, class, path = %path, "fetching class schema");

        let response = self
            .transport()
            .request(&Request::new(Method::Options, path))
            .map_err(|err| not_found_as(base.model(), err))?;
        let schema = parse_schema(response.pointer("/actions/POST"))?;
        self.registry().set_schema(instance, class, schema.clone());
        Ok(schema)
    }

    /// Constrain an object listing. Keys are `field` or `field__op`; values
    /// end up in the `query` param as `{field: {"_op": value}}`.
    pub fn filter(&self, lookups: Map<String, Value>) -> ApiResult<Manager> {
        let mut manager = self.with_target(Method::Get, "list");
        let model = manager.get_class_model(manager.properties())?;

        let mut query: Map<String, Value> = Map::new();
        for (key, value) in lookups {
            let (field, lookup) = match key.rsplit_once(LOOKUP_SEPARATOR) {
                Some((field, lookup)) => (field.to_string(), lookup.to_string()),
                None => (key.clone(), "eq".to_string()),
            };
            if !model.has_field(&field) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_model(model.model())
                    .with_field(field.clone())
                    .with_message(format!("Invalid field name \"{field}\".")));
            }
            if !ALLOWED_LOOKUPS.contains(&lookup.as_str()) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_model(model.model())
                    .with_field(field.clone())
                    .with_message(format!("Invalid lookup type \"{lookup}\".")));
            }
            let entry = query
                .entry(field)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(format!("_{lookup}"), value);
            }
        }

        let encoded = serde_json::to_string(&Value::Object(query)).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode object query")
                .with_source(err)
        })?;
        manager.query.insert("query".to_string(), Value::String(encoded));
        Ok(manager)
    }
}

fn parse_schema(actions: Option<&Value>) -> ApiResult<Vec<Field>> {
    match actions {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, definition)| Field::from_schema(name, definition))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|definition| {
                let name = definition.get("name").and_then(Value::as_str).ok_or_else(|| {
                    Error::new(ErrorKind::Internal).with_message("schema entry is missing a name")
                })?;
                Field::from_schema(name, definition)
            })
            .collect(),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(Error::new(ErrorKind::Internal).with_message("unexpected class schema shape")),
    }
}
