//! Purpose: Per-model metadata: names, endpoints, path templates and field bookkeeping.
//! Exports: `Options`, `Endpoint`, `path_properties`, `camelcase_to_underscore`.
//! Role: Resolves endpoint names to concrete paths and composes nested (parent/child) paths.
//! Invariants: Every endpoint's properties are exactly the `{name}` placeholders of its path.
//! Invariants: With a parent, every path is prefixed by the parent's detail path and the
//!             parent's own properties are renamed `<parent>_<prop>`; inherited ones keep their name.
//! Invariants: Field names are unique within a model.
use super::fields::{Field, FieldKind};
use crate::api::transport::Method;
use crate::core::error::{ApiResult, Error, ErrorKind};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\{([^}]*)\}").expect("placeholder regex"));

#[derive(Clone, Debug, PartialEq)]
pub struct Endpoint {
    pub methods: Vec<Method>,
    pub path: String,
    pub properties: Vec<String>,
}

impl Endpoint {
    pub fn new(methods: &[Method], path: impl Into<String>) -> Self {
        let path = path.into();
        let properties = path_properties(&path);
        Self {
            methods: methods.to_vec(),
            path,
            properties,
        }
    }

    pub fn allows(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }
}

#[derive(Clone, Debug)]
pub struct Options {
    model: String,
    name: String,
    plural_name: String,
    related_name: String,
    parent: Option<String>,
    endpoints: BTreeMap<String, Endpoint>,
    endpoint_fields: Vec<String>,
    fields: Vec<Field>,
    inherited: Vec<String>,
    parent_resolved: bool,
    dynamic: bool,
}

impl Options {
    /// Metadata for the model registered as `model` (e.g. `ApiKey`). The
    /// human name, plural and related name derive from it unless overridden.
    pub fn new(model: impl Into<String>) -> Self {
        let model = model.into();
        let name = capitalize(&camelcase_to_underscore(&model).replace('_', " "));
        let plural_name = format!("{name}s");
        let related_name = plural_name.replace(' ', "_").to_lowercase();
        Self {
            model,
            name,
            plural_name,
            related_name,
            parent: None,
            endpoints: BTreeMap::new(),
            endpoint_fields: Vec::new(),
            fields: Vec::new(),
            inherited: Vec::new(),
            parent_resolved: false,
            dynamic: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_plural_name(mut self, plural_name: impl Into<String>) -> Self {
        self.plural_name = plural_name.into();
        self.related_name = self.plural_name.replace(' ', "_").to_lowercase();
        self
    }

    pub fn with_related_name(mut self, related_name: impl Into<String>) -> Self {
        self.related_name = related_name.into();
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Instances of this model have a server-defined shape discovered at runtime.
    pub fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, methods: &[Method], path: &str) -> Self {
        let endpoint = Endpoint::new(methods, path);
        for property in &endpoint.properties {
            if !self.endpoint_fields.contains(property) {
                self.endpoint_fields.push(property.clone());
            }
        }
        self.endpoints.insert(name.into(), endpoint);
        self
    }

    pub fn with_field(mut self, name: &str, field: Field) -> ApiResult<Self> {
        let mut field = field;
        if field.name.is_empty() {
            field.name = name.to_string();
        }
        self.add_field(field)?;
        Ok(self)
    }

    pub fn add_field(&mut self, field: Field) -> ApiResult<()> {
        if self.has_field(&field.name) {
            return Err(Error::new(ErrorKind::Usage)
                .with_model(self.model.clone())
                .with_message(format!("Field \"{}\" already defined", field.name)));
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plural_name(&self) -> &str {
        &self.plural_name
    }

    pub fn related_name(&self) -> &str {
        &self.related_name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn parent_resolved(&self) -> bool {
        self.parent_resolved
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn endpoints(&self) -> &BTreeMap<String, Endpoint> {
        &self.endpoints
    }

    /// Every property referenced by any endpoint path, parent properties first.
    pub fn endpoint_fields(&self) -> &[String] {
        &self.endpoint_fields
    }

    pub fn is_endpoint_field(&self, name: &str) -> bool {
        self.endpoint_fields.iter().any(|field| field == name)
    }

    /// Path properties contributed by the parent chain, e.g. `instance_name`.
    pub fn parent_properties(&self) -> &[String] {
        &self.inherited
    }

    pub fn is_parent_property(&self, name: &str) -> bool {
        self.inherited.iter().any(|field| field == name)
    }

    /// Copy of this metadata registered under another model name.
    pub fn derive(&self, model: impl Into<String>) -> Self {
        let mut derived = self.clone();
        derived.model = model.into();
        derived
    }

    pub fn get_endpoint(&self, name: &str) -> ApiResult<&Endpoint> {
        self.endpoints.get(name).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_model(self.model.clone())
                .with_message(format!("Invalid path name: \"{name}\"."))
        })
    }

    pub fn get_endpoint_properties(&self, name: &str) -> ApiResult<&[String]> {
        Ok(&self.get_endpoint(name)?.properties)
    }

    pub fn get_endpoint_path(&self, name: &str) -> ApiResult<&str> {
        Ok(&self.get_endpoint(name)?.path)
    }

    /// Substitute every `{prop}` of the named endpoint's path.
    pub fn resolve_endpoint(&self, name: &str, properties: &Map<String, Value>) -> ApiResult<String> {
        let endpoint = self.get_endpoint(name)?;
        let mut path = endpoint.path.clone();
        for property in &endpoint.properties {
            let value = properties
                .get(property)
                .filter(|value| !value.is_null())
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_model(self.model.clone())
                        .with_message(format!("Request property \"{property}\" is required."))
                })?;
            path = path.replace(&format!("{{{property}}}"), &property_to_string(value));
        }
        Ok(path)
    }

    /// The subset of `params` that is not consumed by the endpoint's path.
    pub fn get_endpoint_query_params(
        &self,
        name: &str,
        params: &Map<String, Value>,
    ) -> ApiResult<Map<String, Value>> {
        let properties = self.get_endpoint_properties(name)?;
        Ok(params
            .iter()
            .filter(|(key, _)| !properties.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    /// Rewrite every endpoint under `parent`'s detail path.
    pub fn resolve_parent_data(&mut self, parent: &Options) -> ApiResult<()> {
        let prefix_name = parent.name.replace(' ', "_").to_lowercase();
        let detail = parent.get_endpoint("detail")?;

        let mut prefix = detail.path.clone();
        let mut properties = Vec::with_capacity(detail.properties.len());
        for property in &detail.properties {
            if parent.inherited.contains(property) {
                properties.push(property.clone());
                continue;
            }
            let renamed = format!("{prefix_name}_{property}");
            prefix = prefix.replace(&format!("{{{property}}}"), &format!("{{{renamed}}}"));
            properties.push(renamed);
        }

        for endpoint in self.endpoints.values_mut() {
            let own = std::mem::take(&mut endpoint.properties);
            endpoint.properties = properties.iter().cloned().chain(own).collect();
            endpoint.path = join_path(&prefix, &endpoint.path);
        }

        let own_fields = std::mem::take(&mut self.endpoint_fields);
        self.endpoint_fields = properties.clone();
        for field in own_fields {
            if !self.endpoint_fields.contains(&field) {
                self.endpoint_fields.push(field);
            }
        }

        for property in &properties {
            if !self.has_field(property) {
                self.fields
                    .push(Field::named(property.clone(), FieldKind::String).optional());
            }
        }

        self.inherited = properties;
        self.parent_resolved = true;
        Ok(())
    }
}

/// Placeholders of the form `/{name}` in a path template, in order.
pub fn path_properties(path: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .captures_iter(path)
        .filter_map(|captures| captures.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

pub fn camelcase_to_underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if index > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn property_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Options, camelcase_to_underscore, path_properties};
    use crate::api::transport::Method;
    use crate::core::error::ErrorKind;
    use crate::models::fields::Field;
    use serde_json::{Map, Value, json};

    fn props(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object")
    }

    fn parent() -> Options {
        Options::new("Parent")
            .with_endpoint("detail", &[Method::Get], "/parents/{id}/")
            .with_endpoint("list", &[Method::Get], "/parents/")
    }

    fn child() -> Options {
        Options::new("Child")
            .with_parent("Parent")
            .with_endpoint("detail", &[Method::Get, Method::Delete], "/children/{id}/")
            .with_endpoint("list", &[Method::Get, Method::Post], "/children/")
    }

    #[test]
    fn names_derive_from_model() {
        let options = Options::new("ApiKey");
        assert_eq!(options.name(), "Api key");
        assert_eq!(options.plural_name(), "Api keys");
        assert_eq!(options.related_name(), "api_keys");
        assert_eq!(camelcase_to_underscore("ScriptTrace"), "script_trace");
    }

    #[test]
    fn placeholders_are_discovered_in_order() {
        assert_eq!(
            path_properties("/v1/instances/{instance_name}/classes/{name}/"),
            vec!["instance_name".to_string(), "name".to_string()]
        );
        assert!(path_properties("/v1/instances/").is_empty());
    }

    #[test]
    fn resolve_endpoint_substitutes_and_requires_properties() {
        let options = Options::new("Child")
            .with_endpoint("detail", &[Method::Get], "/parents/{parent_id}/children/{id}/");
        let path = options
            .resolve_endpoint("detail", &props(json!({"parent_id": 5, "id": 9})))
            .expect("path");
        assert_eq!(path, "/parents/5/children/9/");

        let err = options
            .resolve_endpoint("detail", &props(json!({"id": 9})))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().unwrap_or_default().contains("parent_id"));

        let err = options
            .resolve_endpoint("nope", &Map::new())
            .expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn parent_prefix_and_renamed_properties() {
        let mut options = child();
        options.resolve_parent_data(&parent()).expect("resolve");

        let detail = options.get_endpoint("detail").expect("detail");
        assert_eq!(detail.path, "/parents/{parent_id}/children/{id}/");
        assert_eq!(detail.properties, vec!["parent_id", "id"]);

        let list = options.get_endpoint("list").expect("list");
        assert_eq!(list.path, "/parents/{parent_id}/children/");
        assert_eq!(list.properties, vec!["parent_id"]);

        assert_eq!(options.endpoint_fields(), ["parent_id", "id"]);
        assert_eq!(options.parent_properties(), ["parent_id"]);
        assert!(options.has_field("parent_id"));
        assert!(options.parent_resolved());
    }

    #[test]
    fn grandchildren_keep_inherited_names() {
        let mut middle = child();
        middle.resolve_parent_data(&parent()).expect("middle");
        let mut leaf = Options::new("Leaf")
            .with_parent("Child")
            .with_endpoint("detail", &[Method::Get], "/leaves/{id}/");
        leaf.resolve_parent_data(&middle).expect("leaf");

        let detail = leaf.get_endpoint("detail").expect("detail");
        assert_eq!(
            detail.path,
            "/parents/{parent_id}/children/{child_id}/leaves/{id}/"
        );
        assert_eq!(detail.properties, vec!["parent_id", "child_id", "id"]);
    }

    #[test]
    fn query_params_exclude_path_properties() {
        let options = Options::new("Thing").with_endpoint("list", &[Method::Get], "/things/{kind}/");
        let params = options
            .get_endpoint_query_params("list", &props(json!({"kind": "a", "page_size": 2})))
            .expect("params");
        assert_eq!(Value::Object(params), json!({"page_size": 2}));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let options = Options::new("Thing")
            .with_field("label", Field::string())
            .expect("first");
        let err = options
            .with_field("label", Field::string())
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn unnamed_fields_adopt_attribute_name() {
        let options = Options::new("Thing")
            .with_field("label", Field::string())
            .expect("field");
        assert_eq!(options.field("label").map(|f| f.name.as_str()), Some("label"));
    }
}
