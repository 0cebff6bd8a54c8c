//! Purpose: Fluent query/command builder bound to one registered model.
//! Exports: `Manager`, `Lookup`, `Record`, `ResultIter`.
//! Role: Resolves endpoint paths through `Options`, calls the `Transport`, materializes `Model`s.
//! Invariants: Every builder method returns a new manager; the receiver is never mutated.
//! Invariants: Listing is lazy; no request is made until the iterator is first advanced.
//! Invariants: Pages are fetched one at a time following the server's `next` link.
//! Invariants: A 404 becomes the model's `DoesNotExist`; every other transport error passes through.
use super::model::Model;
use super::options::{Options, property_to_string};
use super::registry::Registry;
use crate::api::transport::{Method, Request, Transport, not_found_as};
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) const INSTANCE_NAME: &str = "instance_name";

/// Positional and named arguments addressing an endpoint. Positional
/// values bind to the endpoint's path properties in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lookup {
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub fn from_kwargs(kwargs: Map<String, Value>) -> Self {
        Self {
            args: Vec::new(),
            kwargs,
        }
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Model(Model),
    Raw(Value),
}

impl Record {
    pub fn as_model(&self) -> Option<&Model> {
        match self {
            Record::Model(model) => Some(model),
            Record::Raw(_) => None,
        }
    }

    pub fn into_model(self) -> Option<Model> {
        match self {
            Record::Model(model) => Some(model),
            Record::Raw(_) => None,
        }
    }

    pub fn to_json(&self) -> ApiResult<Value> {
        match self {
            Record::Model(model) => model.to_json().map(Value::Object),
            Record::Raw(value) => Ok(value.clone()),
        }
    }
}

#[derive(Clone)]
pub struct Manager {
    model: String,
    registry: Registry,
    transport: Arc<dyn Transport>,
    endpoint: String,
    properties: Map<String, Value>,
    method: Method,
    pub(crate) query: Map<String, Value>,
    data: Map<String, Value>,
    limit: Option<usize>,
    serialize: bool,
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .field("properties", &self.properties)
            .field("query", &self.query)
            .field("limit", &self.limit)
            .field("serialize", &self.serialize)
            .finish()
    }
}

impl Manager {
    pub fn new(model: impl Into<String>, registry: Registry, transport: Arc<dyn Transport>) -> Self {
        Self {
            model: model.into(),
            registry,
            transport,
            endpoint: "list".to_string(),
            properties: Map::new(),
            method: Method::Get,
            query: Map::new(),
            data: Map::new(),
            limit: None,
            serialize: true,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    pub fn get_limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn is_raw(&self) -> bool {
        !self.serialize
    }

    pub fn options(&self) -> ApiResult<Arc<Options>> {
        self.registry.get_model_by_name(&self.model)
    }

    // Object actions

    /// Save a new model built from `data` laid over the accumulated properties.
    pub fn create(&self, data: Map<String, Value>) -> ApiResult<Model> {
        let mut values = self.properties.clone();
        values.extend(data);
        let options = self.model_for(&values)?;
        let mut model = Model::with_values(options, &values)?;
        model.save(self.transport.as_ref())?;
        self.note_instance(&model);
        Ok(model)
    }

    pub fn bulk_create(&self, objects: Vec<Map<String, Value>>) -> ApiResult<Vec<Model>> {
        objects.into_iter().map(|data| self.create(data)).collect()
    }

    pub fn get(&self, lookup: Lookup) -> ApiResult<Record> {
        let mut manager = self.clone();
        manager.method = Method::Get;
        manager.endpoint = "detail".to_string();
        manager.apply(&lookup)?;
        let response = manager.request(None)?;
        manager.serialize(response)
    }

    pub fn detail(&self, lookup: Lookup) -> ApiResult<Record> {
        self.get(lookup)
    }

    /// `get`, falling back to `create` with `defaults` < builder properties < lookup.
    pub fn get_or_create(
        &self,
        lookup: Lookup,
        defaults: Map<String, Value>,
    ) -> ApiResult<(Record, bool)> {
        match self.get(lookup.clone()) {
            Ok(record) => Ok((record, false)),
            Err(err) if err.kind() == ErrorKind::DoesNotExist => {
                let values = self.merged_under(&lookup, defaults)?;
                Ok((self.wrap(self.create(values)?)?, true))
            }
            Err(err) => Err(err),
        }
    }

    pub fn delete(&self, lookup: Lookup) -> ApiResult<()> {
        let mut manager = self.clone();
        manager.method = Method::Delete;
        manager.endpoint = "detail".to_string();
        manager.apply(&lookup)?;
        manager.request(None)?;
        Ok(())
    }

    pub fn update(&self, lookup: Lookup, data: Map<String, Value>) -> ApiResult<Record> {
        let mut manager = self.clone();
        manager.method = Method::Put;
        manager.endpoint = "detail".to_string();
        manager.data = data;
        manager.apply(&lookup)?;
        let response = manager.request(None)?;
        manager.serialize(response)
    }

    /// `update`, falling back to `create` with `defaults` < `data` < builder properties < lookup.
    pub fn update_or_create(
        &self,
        lookup: Lookup,
        data: Map<String, Value>,
        defaults: Map<String, Value>,
    ) -> ApiResult<(Record, bool)> {
        match self.update(lookup.clone(), data.clone()) {
            Ok(record) => Ok((record, false)),
            Err(err) if err.kind() == ErrorKind::DoesNotExist => {
                let mut base = defaults;
                base.extend(data);
                let values = self.merged_under(&lookup, base)?;
                Ok((self.wrap(self.create(values)?)?, true))
            }
            Err(err) => Err(err),
        }
    }

    /// Call the model's `run` endpoint. POST carries `payload` as a JSON string.
    pub fn run(&self, lookup: Lookup, payload: Map<String, Value>) -> ApiResult<Value> {
        let mut manager = self.clone();
        manager.endpoint = "run".to_string();
        manager.apply(&lookup)?;
        let options = manager.options()?;
        if options.get_endpoint("run")?.allows(Method::Post) {
            let encoded = serde_json::to_string(&Value::Object(payload)).map_err(|err| {
                Error::new(ErrorKind::Internal)
                    .with_message("failed to encode run payload")
                    .with_source(err)
            })?;
            manager.method = Method::Post;
            manager.data = Map::from_iter([("payload".to_string(), Value::String(encoded))]);
        } else {
            manager.method = Method::Get;
        }
        manager.request(None)
    }

    // List actions

    pub fn all(&self) -> Self {
        let mut manager = self.clone();
        manager.limit = None;
        manager.method = Method::Get;
        manager.endpoint = "list".to_string();
        manager
    }

    pub fn list(&self, lookup: Lookup) -> ApiResult<Self> {
        let mut manager = self.clone();
        manager.method = Method::Get;
        manager.endpoint = "list".to_string();
        manager.apply(&lookup)?;
        Ok(manager)
    }

    pub fn page_size(&self, value: usize) -> ApiResult<Self> {
        if value == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_model(self.model.clone())
                .with_message("page_size value needs to be a positive int."));
        }
        let mut manager = self.clone();
        manager.query.insert("page_size".to_string(), Value::from(value));
        Ok(manager)
    }

    pub fn limit(&self, value: usize) -> ApiResult<Self> {
        if value == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_model(self.model.clone())
                .with_message("Limit value needs to be a positive int."));
        }
        let mut manager = self.clone();
        manager.limit = Some(value);
        Ok(manager)
    }

    pub fn order_by(&self, field: &str) -> ApiResult<Self> {
        if field.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_model(self.model.clone())
                .with_message("Order by field needs to be a non-empty string."));
        }
        let mut manager = self.clone();
        manager.query.insert("order_by".to_string(), Value::from(field));
        Ok(manager)
    }

    pub fn raw(&self) -> Self {
        let mut manager = self.clone();
        manager.serialize = false;
        manager
    }

    pub fn using(&self, transport: Arc<dyn Transport>) -> Self {
        let mut manager = self.clone();
        manager.transport = transport;
        manager
    }

    pub fn first(&self) -> ApiResult<Option<Record>> {
        self.limit(1)?.iterator().next().transpose()
    }

    /// Lazy, forward-only sequence over every page of the configured list.
    pub fn iterator(&self) -> ResultIter {
        ResultIter {
            manager: self.clone(),
            buffer: VecDeque::new(),
            next_url: None,
            started: false,
            finished: false,
            yielded: 0,
        }
    }

    /// Manager for the model addressed by one of `model`'s named links.
    pub fn related(&self, model: &Model, name: &str) -> ApiResult<Manager> {
        let links = model.links();
        let path = links.get(name).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_model(model.model_name())
                .with_message(format!("Unknown link \"{name}\"."))
        })?;
        let (options, properties) = self.registry.resolve_path(path)?;
        let mut manager = Manager::new(options.model(), self.registry.clone(), Arc::clone(&self.transport));
        manager.properties = properties;
        Ok(manager.all())
    }

    // Other stuff

    pub(crate) fn with_target(&self, method: Method, endpoint: &str) -> Self {
        let mut manager = self.clone();
        manager.method = method;
        manager.endpoint = endpoint.to_string();
        manager
    }

    fn apply(&mut self, lookup: &Lookup) -> ApiResult<()> {
        if !lookup.args.is_empty() {
            let options = self.options()?;
            let names = options.get_endpoint_properties(&self.endpoint)?;
            if lookup.args.len() > names.len() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_model(self.model.clone())
                    .with_message(format!(
                        "Endpoint \"{}\" takes at most {} positional arguments.",
                        self.endpoint,
                        names.len()
                    )));
            }
            for (name, value) in names.iter().zip(&lookup.args) {
                self.properties.insert(name.clone(), value.clone());
            }
        }
        self.properties
            .extend(lookup.kwargs.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    fn merged_under(&self, lookup: &Lookup, base: Map<String, Value>) -> ApiResult<Map<String, Value>> {
        let mut addressed = self.clone();
        addressed.endpoint = "detail".to_string();
        addressed.apply(lookup)?;
        let mut values = base;
        values.extend(addressed.properties);
        Ok(values)
    }

    fn wrap(&self, model: Model) -> ApiResult<Record> {
        if self.serialize {
            Ok(Record::Model(model))
        } else {
            Ok(Record::Raw(Value::Object(model.to_json()?)))
        }
    }

    /// Accumulated properties, with the endpoint's missing path properties
    /// taken from field defaults.
    pub(crate) fn resolved_properties(&self, options: &Options) -> ApiResult<Map<String, Value>> {
        let mut properties = self.properties.clone();
        for name in options.get_endpoint_properties(&self.endpoint)? {
            if properties.get(name).is_some_and(|value| !value.is_null()) {
                continue;
            }
            let default = options.field(name).and_then(|field| field.default.as_ref());
            if let Some(default) = default {
                let value = default.to_json()?;
                if !value.is_null() {
                    properties.insert(name.clone(), value);
                }
            }
        }
        Ok(properties)
    }

    /// Perform the configured call. An explicit `path` (a pagination link)
    /// bypasses the accumulated properties, params and body.
    pub fn request(&self, path: Option<&str>) -> ApiResult<Value> {
        let request = match path {
            Some(path) => Request::new(self.method, path),
            None => {
                let options = self.options()?;
                let properties = self.resolved_properties(&options)?;
                let path = options.resolve_endpoint(&self.endpoint, &properties)?;
                let mut request = Request::new(self.method, path);
                if !self.query.is_empty() {
                    request = request.with_params(self.query.clone());
                }
                if !self.data.is_empty() {
                    request = request.with_json(Value::Object(self.data.clone()));
                }
                request
            }
        };
        debug!(model = %self.model, method = %request.method, path = %request.path, "manager request");
        self.transport
            .request(&request)
            .map_err(|err| not_found_as(&self.model, err))
    }

    /// Turn one response object into a record, merging known properties under it.
    pub fn serialize(&self, data: Value) -> ApiResult<Record> {
        if !self.serialize {
            return Ok(Record::Raw(data));
        }
        let Value::Object(object) = data else {
            return Err(Error::new(ErrorKind::Internal)
                .with_model(self.model.clone())
                .with_message("expected a JSON object in the response"));
        };
        let mut values = self.properties.clone();
        values.extend(object);
        let options = self.model_for(&values)?;
        let model = Model::from_data(options, &values)?;
        self.note_instance(&model);
        Ok(Record::Model(model))
    }

    fn model_for(&self, values: &Map<String, Value>) -> ApiResult<Arc<Options>> {
        let options = self.options()?;
        if options.is_dynamic() {
            return self.get_class_model(values);
        }
        Ok(options)
    }

    fn note_instance(&self, model: &Model) {
        if let Some(name) = model.value(INSTANCE_NAME).and_then(|value| value.as_str()) {
            if !name.is_empty() {
                self.registry.set_last_used_instance(name);
            }
        }
    }

    /// Named value from `values`, else the base model's field default.
    pub(crate) fn property_or_default(
        &self,
        options: &Options,
        values: &Map<String, Value>,
        name: &str,
    ) -> Option<String> {
        match values.get(name) {
            Some(value) if !value.is_null() => Some(property_to_string(value)),
            _ => options
                .field(name)
                .and_then(|field| field.default.as_ref())
                .and_then(|value| value.as_str())
                .map(str::to_string),
        }
    }
}

impl IntoIterator for Manager {
    type Item = ApiResult<Record>;
    type IntoIter = ResultIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iterator()
    }
}

impl IntoIterator for &Manager {
    type Item = ApiResult<Record>;
    type IntoIter = ResultIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iterator()
    }
}

pub struct ResultIter {
    manager: Manager,
    buffer: VecDeque<Value>,
    next_url: Option<String>,
    started: bool,
    finished: bool,
    yielded: usize,
}

impl ResultIter {
    fn limit_reached(&self) -> bool {
        self.manager.limit.is_some_and(|limit| self.yielded >= limit)
    }

    fn fetch(&mut self) -> ApiResult<bool> {
        let path = if self.started {
            match self.next_url.take() {
                Some(url) => Some(url),
                None => return Ok(false),
            }
        } else {
            None
        };
        self.started = true;
        debug!(model = %self.manager.model, next = ?path, "fetching page");
        let response = self.manager.request(path.as_deref())?;
        let objects = response
            .get("objects")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        self.next_url = response
            .get("next")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string);
        if objects.is_empty() {
            return Ok(false);
        }
        self.buffer.extend(objects);
        Ok(true)
    }
}

impl Iterator for ResultIter {
    type Item = ApiResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished || self.limit_reached() {
                self.finished = true;
                return None;
            }
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                trace!(model = %self.manager.model, index = self.yielded, "yielding item");
                return Some(self.manager.serialize(item));
            }
            match self.fetch() {
                Ok(true) => continue,
                Ok(false) => {
                    self.finished = true;
                    return None;
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
