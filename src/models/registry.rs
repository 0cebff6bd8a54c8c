//! Purpose: Directory of model metadata, reverse path lookup and discovered schemas.
//! Exports: `Registry`, `get_model_patterns`.
//! Role: Shared, cheaply clonable handle injected into managers and clients.
//! Invariants: A model name is registered at most once; re-adding only flushes pending children.
//! Invariants: Path patterns are tried in registration order; the first match wins.
//! Invariants: A child whose parent is unknown waits in `pending` until the parent is added.
//! Invariants: Each (instance, class) pair maps to its own synthesized model, even when names collide.
//! Notes: State sits behind one `RwLock`; schema discovery and default propagation take the write side.
use super::fields::{Field, FieldValue};
use super::options::Options;
use crate::core::error::{ApiResult, Error, ErrorKind};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

const INSTANCE_NAME: &str = "instance_name";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]*)\}").expect("token regex"));

#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryState>>,
}

#[derive(Default)]
struct RegistryState {
    models: Vec<Arc<Options>>,
    index: HashMap<String, usize>,
    patterns: Vec<(Regex, usize)>,
    pending: BTreeMap<String, Vec<Options>>,
    schemas: HashMap<(String, String), Vec<Field>>,
    class_models: HashMap<(String, String), String>,
    last_used_instance: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.inner.read().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.inner.write().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Register a model. A model with an unregistered parent is held back
    /// and completed once the parent arrives.
    pub fn add(&self, options: Options) -> ApiResult<()> {
        self.write().add(options)
    }

    /// Replace the metadata of an already registered model.
    pub fn update(&self, options: Options) -> ApiResult<()> {
        let mut state = self.write();
        let position = state.position(options.model())?;
        let patterns = get_model_patterns(&options)?;
        state.patterns.retain(|(_, index)| *index != position);
        state
            .patterns
            .extend(patterns.into_iter().map(|pattern| (pattern, position)));
        state.models[position] = Arc::new(options);
        Ok(())
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.read().index.contains_key(name)
    }

    pub fn get_model_by_name(&self, name: &str) -> ApiResult<Arc<Options>> {
        let state = self.read();
        let position = state.position(name)?;
        Ok(Arc::clone(&state.models[position]))
    }

    /// Models in registration order.
    pub fn models(&self) -> Vec<Arc<Options>> {
        self.read().models.clone()
    }

    /// Models still waiting for their parent, keyed by the missing parent.
    pub fn pending(&self) -> BTreeMap<String, Vec<String>> {
        self.read()
            .pending
            .iter()
            .map(|(parent, children)| {
                let names = children.iter().map(|child| child.model().to_string()).collect();
                (parent.clone(), names)
            })
            .collect()
    }

    pub fn get_model_by_path(&self, path: &str) -> ApiResult<Arc<Options>> {
        self.resolve_path(path).map(|(options, _)| options)
    }

    /// Find the model addressed by `path` and the property values captured from it.
    pub fn resolve_path(&self, path: &str) -> ApiResult<(Arc<Options>, Map<String, Value>)> {
        let target = path_component(path);
        let state = self.read();
        for (pattern, position) in &state.patterns {
            let Some(captures) = pattern.captures(&target) else {
                continue;
            };
            let properties = pattern
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    captures
                        .name(name)
                        .map(|m| (name.to_string(), Value::String(m.as_str().to_string())))
                })
                .collect();
            return Ok((Arc::clone(&state.models[*position]), properties));
        }
        Err(Error::new(ErrorKind::Lookup)
            .with_message("No model found matching the path.")
            .with_path(path))
    }

    /// Overwrite the default of `name` on every model that declares that field.
    pub fn set_default_property(&self, name: &str, value: FieldValue) {
        self.write().set_default_property(name, Some(value));
    }

    pub fn set_default_instance(&self, instance_name: &str) {
        self.set_default_property(INSTANCE_NAME, FieldValue::from(instance_name));
    }

    /// Record the instance most recently addressed; defaults only move when it changes.
    pub fn set_last_used_instance(&self, instance_name: &str) {
        let mut state = self.write();
        if state.last_used_instance.as_deref() == Some(instance_name) {
            return;
        }
        debug!(instance = instance_name, "switching default instance");
        state.last_used_instance = Some(instance_name.to_string());
        state.set_default_property(INSTANCE_NAME, Some(FieldValue::from(instance_name)));
    }

    pub fn last_used_instance(&self) -> Option<String> {
        self.read().last_used_instance.clone()
    }

    pub fn clear_instance_name(&self) {
        let mut state = self.write();
        state.last_used_instance = None;
        state.set_default_property(INSTANCE_NAME, None);
    }

    pub fn get_schema(&self, instance_name: &str, class_name: &str) -> Option<Vec<Field>> {
        self.read()
            .schemas
            .get(&(instance_name.to_string(), class_name.to_string()))
            .cloned()
    }

    pub fn set_schema(&self, instance_name: &str, class_name: &str, schema: Vec<Field>) {
        self.write()
            .schemas
            .insert((instance_name.to_string(), class_name.to_string()), schema);
    }

    pub fn clear_schemas(&self) {
        self.write().schemas.clear();
    }

    /// Model synthesized earlier for an (instance, class) pair.
    pub fn class_model(&self, instance_name: &str, class_name: &str) -> Option<Arc<Options>> {
        let state = self.read();
        let name = state
            .class_models
            .get(&(instance_name.to_string(), class_name.to_string()))?;
        let position = state.index.get(name)?;
        Some(Arc::clone(&state.models[*position]))
    }

    /// Register a model synthesized for an (instance, class) pair. The pair
    /// keeps the first model registered for it; a name already taken by
    /// another model gets a numeric suffix.
    pub fn add_class_model(
        &self,
        instance_name: &str,
        class_name: &str,
        options: Options,
    ) -> ApiResult<Arc<Options>> {
        let key = (instance_name.to_string(), class_name.to_string());
        let mut state = self.write();
        if let Some(position) = state.class_models.get(&key).and_then(|name| state.index.get(name)) {
            return Ok(Arc::clone(&state.models[*position]));
        }

        let base = options.model().to_string();
        let mut name = base.clone();
        let mut suffix = 2;
        while state.index.contains_key(&name) {
            name = format!("{base}{suffix}");
            suffix += 1;
        }
        let options = if name == base {
            options
        } else {
            debug!(model = %base, renamed = %name, "model name taken by another class");
            options.derive(name.clone())
        };

        state.add(options)?;
        let position = state.position(&name)?;
        state.class_models.insert(key, name);
        Ok(Arc::clone(&state.models[position]))
    }
}

impl RegistryState {
    fn position(&self, name: &str) -> ApiResult<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_model(name)
                .with_message("Model is not registered.")
        })
    }

    fn add(&mut self, mut options: Options) -> ApiResult<()> {
        let name = options.model().to_string();
        if self.index.contains_key(&name) {
            return self.flush_pending(&name);
        }

        if let Some(parent) = options.parent().map(str::to_string) {
            if !options.parent_resolved() {
                match self.index.get(&parent) {
                    Some(&position) => {
                        let parent_options = Arc::clone(&self.models[position]);
                        options.resolve_parent_data(&parent_options)?;
                    }
                    None => {
                        debug!(model = %name, parent = %parent, "deferring model until parent is registered");
                        self.pending.entry(parent).or_default().push(options);
                        return Ok(());
                    }
                }
            }
        }

        if let Some(instance) = self.last_used_instance.clone() {
            if let Some(field) = options.field_mut(INSTANCE_NAME) {
                field.default = Some(FieldValue::from(instance));
            }
        }

        let patterns = get_model_patterns(&options)?;
        let position = self.models.len();
        self.models.push(Arc::new(options));
        self.index.insert(name.clone(), position);
        self.patterns
            .extend(patterns.into_iter().map(|pattern| (pattern, position)));
        debug!(model = %name, "registered model");

        self.flush_pending(&name)
    }

    fn flush_pending(&mut self, name: &str) -> ApiResult<()> {
        let Some(children) = self.pending.remove(name) else {
            return Ok(());
        };
        for child in children {
            self.add(child)?;
        }
        Ok(())
    }

    fn set_default_property(&mut self, name: &str, value: Option<FieldValue>) {
        for model in &mut self.models {
            if !model.has_field(name) {
                continue;
            }
            if let Some(field) = Arc::make_mut(model).field_mut(name) {
                field.default = value.clone();
            }
        }
    }
}

/// One anchored regex per endpoint; each `{name}` captures a single path
/// segment without dots.
pub fn get_model_patterns(options: &Options) -> ApiResult<Vec<Regex>> {
    options
        .endpoints()
        .values()
        .map(|endpoint| {
            let mut pattern = String::from("^");
            let mut last = 0;
            for token in TOKEN_RE.captures_iter(&endpoint.path) {
                let (Some(whole), Some(name)) = (token.get(0), token.get(1)) else {
                    continue;
                };
                pattern.push_str(&regex::escape(&endpoint.path[last..whole.start()]));
                pattern.push_str(&format!("(?P<{}>[^/.]+?)", name.as_str()));
                last = whole.end();
            }
            pattern.push_str(&regex::escape(&endpoint.path[last..]));
            pattern.push('$');
            Regex::new(&pattern).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_model(options.model())
                    .with_message("invalid endpoint path pattern")
                    .with_path(endpoint.path.clone())
                    .with_source(err)
            })
        })
        .collect()
}

/// Strip scheme, host and query so absolute links match path templates.
fn path_component(path: &str) -> String {
    let path = match url::Url::parse(path) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => path.split('?').next().unwrap_or_default().to_string(),
    };
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::{Registry, get_model_patterns};
    use crate::api::transport::Method;
    use crate::core::error::ErrorKind;
    use crate::models::fields::{Field, FieldValue};
    use crate::models::options::Options;
    use serde_json::{Value, json};

    fn instance() -> Options {
        Options::new("Instance")
            .with_endpoint("detail", &[Method::Get], "/v1/instances/{name}/")
            .with_endpoint("list", &[Method::Get], "/v1/instances/")
            .with_field("name", Field::string())
            .expect("field")
    }

    fn class() -> Options {
        Options::new("Class")
            .with_parent("Instance")
            .with_plural_name("Classes")
            .with_endpoint("detail", &[Method::Get], "/classes/{name}/")
            .with_endpoint("list", &[Method::Get], "/classes/")
            .with_field("name", Field::string())
            .expect("field")
    }

    #[test]
    fn patterns_escape_literals_and_capture_segments() {
        let patterns = get_model_patterns(&instance()).expect("patterns");
        assert_eq!(patterns.len(), 2);
        assert!(patterns.iter().any(|p| p.is_match("/v1/instances/demo/")));
        assert!(!patterns.iter().any(|p| p.is_match("/v1/instances/de.mo/")));
        assert!(!patterns.iter().any(|p| p.is_match("/v1/instances/demo/extra/")));
    }

    #[test]
    fn adding_twice_keeps_one_entry() {
        let registry = Registry::new();
        registry.add(instance()).expect("add");
        registry.add(instance()).expect("add again");
        assert_eq!(registry.models().len(), 1);
        let state = registry.read();
        assert_eq!(state.patterns.len(), 2);
    }

    #[test]
    fn child_waits_for_parent() {
        let registry = Registry::new();
        registry.add(class()).expect("deferred");
        assert!(!registry.has_model("Class"));
        assert_eq!(registry.pending()["Instance"], vec!["Class".to_string()]);

        registry.add(instance()).expect("parent");
        assert!(registry.has_model("Class"));
        assert!(registry.pending().is_empty());

        let class = registry.get_model_by_name("Class").expect("class");
        assert_eq!(
            class.get_endpoint_path("detail").expect("path"),
            "/v1/instances/{instance_name}/classes/{name}/"
        );
    }

    #[test]
    fn resolve_path_returns_model_and_captures() {
        let registry = Registry::new();
        registry.add(instance()).expect("instance");
        registry.add(class()).expect("class");

        let (model, properties) = registry
            .resolve_path("/v1/instances/demo/classes/books/")
            .expect("resolve");
        assert_eq!(model.model(), "Class");
        assert_eq!(
            Value::Object(properties),
            json!({"instance_name": "demo", "name": "books"})
        );

        let model = registry
            .get_model_by_path("https://api.example.io/v1/instances/demo/?x=1")
            .expect("absolute");
        assert_eq!(model.model(), "Instance");

        let err = registry.get_model_by_path("/v2/nothing/").expect_err("miss");
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn last_used_instance_propagates_defaults() {
        let registry = Registry::new();
        registry.add(instance()).expect("instance");
        registry.add(class()).expect("class");

        registry.set_last_used_instance("demo");
        let class = registry.get_model_by_name("Class").expect("class");
        assert_eq!(
            class.field("instance_name").and_then(|f| f.default.clone()),
            Some(FieldValue::from("demo"))
        );
        assert_eq!(registry.last_used_instance().as_deref(), Some("demo"));

        registry.clear_instance_name();
        let class = registry.get_model_by_name("Class").expect("class");
        assert_eq!(class.field("instance_name").and_then(|f| f.default.clone()), None);
        assert_eq!(registry.last_used_instance(), None);
    }

    #[test]
    fn schemas_are_cached_per_instance_and_class() {
        let registry = Registry::new();
        assert!(registry.get_schema("demo", "books").is_none());
        registry.set_schema("demo", "books", vec![Field::named("title", Field::string().kind)]);
        assert_eq!(registry.get_schema("demo", "books").map(|s| s.len()), Some(1));
        assert!(registry.get_schema("demo", "authors").is_none());
        registry.clear_schemas();
        assert!(registry.get_schema("demo", "books").is_none());
    }

    #[test]
    fn class_models_are_keyed_by_pair() {
        let registry = Registry::new();
        let first = registry
            .add_class_model("shop", "old_books", Options::new("ShopOldBooksObject"))
            .expect("first");
        let second = registry
            .add_class_model("shop_old", "books", Options::new("ShopOldBooksObject"))
            .expect("second");
        assert_eq!(first.model(), "ShopOldBooksObject");
        assert_eq!(second.model(), "ShopOldBooksObject2");

        let again = registry
            .add_class_model("shop", "old_books", Options::new("Ignored"))
            .expect("again");
        assert_eq!(again.model(), "ShopOldBooksObject");
        assert!(!registry.has_model("Ignored"));
        assert_eq!(
            registry.class_model("shop_old", "books").map(|o| o.model().to_string()),
            Some("ShopOldBooksObject2".to_string())
        );
        assert!(registry.class_model("shop", "books").is_none());
    }

    #[test]
    fn unknown_model_is_usage_error() {
        let err = Registry::new().get_model_by_name("Nope").expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
}
