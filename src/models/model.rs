//! Purpose: Addressable entity: shared metadata plus one instance's field values.
//! Exports: `Model`.
//! Role: Validates writes through the field table and persists itself through a `Transport`.
//! Invariants: Writes run `validate` then `to_python`; reads fall back to the field default.
//! Invariants: The wire body never carries read-only fields, parent path properties or nulls.
//! Invariants: A 404 on delete/reload is reported as the model's `DoesNotExist`.
use super::fields::{Field, FieldValue};
use super::options::Options;
use crate::api::transport::{Method, Request, Transport, not_found_as};
use crate::core::error::{ApiResult, Error, ErrorKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct Model {
    options: Arc<Options>,
    values: BTreeMap<String, FieldValue>,
    persisted: bool,
}

impl Model {
    pub fn new(options: Arc<Options>) -> Self {
        Self {
            options,
            values: BTreeMap::new(),
            persisted: false,
        }
    }

    /// Build from a server response. Unknown keys are ignored.
    pub fn from_data(options: Arc<Options>, data: &Map<String, Value>) -> ApiResult<Self> {
        let mut model = Self::new(options);
        model.load(data)?;
        model.persisted = true;
        Ok(model)
    }

    /// Build a new, unsaved instance from caller-supplied values.
    pub fn with_values(options: Arc<Options>, values: &Map<String, Value>) -> ApiResult<Self> {
        let mut model = Self::new(options);
        for (name, value) in values {
            if model.options.has_field(name) {
                model.set(name, value.clone())?;
            }
        }
        Ok(model)
    }

    pub fn options(&self) -> &Arc<Options> {
        &self.options
    }

    pub fn model_name(&self) -> &str {
        self.options.model()
    }

    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    fn field(&self, name: &str) -> ApiResult<&Field> {
        self.options.field(name).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_model(self.options.model())
                .with_field(name)
                .with_message("Unknown field.")
        })
    }

    /// Held value, else the field default; what read-only checks compare against.
    fn effective<'a>(&'a self, field: &'a Field) -> Option<&'a FieldValue> {
        self.values.get(&field.name).or(field.default.as_ref())
    }

    /// Current value, or the field default when none is held.
    pub fn get(&self, name: &str) -> ApiResult<FieldValue> {
        let field = self.field(name)?;
        Ok(self
            .values
            .get(name)
            .cloned()
            .or_else(|| field.default.clone())
            .unwrap_or(FieldValue::Null))
    }

    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) -> ApiResult<()> {
        let field = self.field(name)?;
        field.validate(&value, self.effective(field))?;
        let native = field.to_python(&value)?;
        self.values.insert(name.to_string(), native);
        Ok(())
    }

    /// Assign an already-native value; the wire form is still validated.
    pub fn set_value(&mut self, name: &str, value: FieldValue) -> ApiResult<()> {
        let field = self.field(name)?;
        let native = field.coerce(value)?;
        field.validate(&field.to_native(&native)?, self.effective(field))?;
        self.values.insert(name.to_string(), native);
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Option<FieldValue> {
        self.values.remove(name)
    }

    /// Named hyperlinks reported by the server for this instance.
    pub fn links(&self) -> BTreeMap<String, String> {
        self.values
            .get("links")
            .and_then(FieldValue::as_links)
            .cloned()
            .unwrap_or_default()
    }

    /// Every field value, defaults included, in wire form.
    pub fn to_json(&self) -> ApiResult<Map<String, Value>> {
        let mut out = Map::new();
        for field in self.options.fields() {
            let value = self.get(&field.name)?;
            out.insert(field.name.clone(), field.to_native(&value)?);
        }
        Ok(out)
    }

    /// Request body for save.
    pub fn to_native(&self) -> ApiResult<Map<String, Value>> {
        let mut out = Map::new();
        for field in self.options.fields() {
            if field.read_only || self.options.is_parent_property(&field.name) {
                continue;
            }
            let value = self.get(&field.name)?;
            if matches!(value, FieldValue::Null) {
                continue;
            }
            out.insert(field.name.clone(), field.to_native(&value)?);
        }
        Ok(out)
    }

    /// Values for every endpoint path property, defaults included.
    pub fn endpoint_data(&self) -> ApiResult<Map<String, Value>> {
        let mut out = Map::new();
        for name in self.options.endpoint_fields() {
            let value = match self.options.field(name) {
                Some(field) => field.to_native(&self.get(name)?)?,
                None => continue,
            };
            if !value.is_null() {
                out.insert(name.clone(), value);
            }
        }
        Ok(out)
    }

    /// Run every writable field's constraints against the values held.
    pub fn validate(&self) -> ApiResult<()> {
        for field in self.options.fields() {
            if field.read_only || self.options.is_parent_property(&field.name) {
                continue;
            }
            let value = field.to_native(&self.get(&field.name)?)?;
            field.validate(&value, None)?;
        }
        Ok(())
    }

    /// POST to `list` when new, PUT to `detail` otherwise, then take the server's values.
    pub fn save(&mut self, transport: &dyn Transport) -> ApiResult<()> {
        self.validate()?;
        let (endpoint, method) = if self.is_new() {
            ("list", Method::Post)
        } else {
            ("detail", Method::Put)
        };
        let path = self
            .options
            .resolve_endpoint(endpoint, &self.endpoint_data()?)?;
        debug!(model = %self.model_name(), %method, path = %path, "saving model");
        let request = Request::new(method, path).with_json(Value::Object(self.to_native()?));
        let response = transport
            .request(&request)
            .map_err(|err| not_found_as(self.model_name(), err))?;
        self.refresh(&response)
    }

    pub fn delete(&self, transport: &dyn Transport) -> ApiResult<()> {
        self.ensure_persisted()?;
        let path = self
            .options
            .resolve_endpoint("detail", &self.endpoint_data()?)?;
        transport
            .request(&Request::new(Method::Delete, path))
            .map_err(|err| not_found_as(self.model_name(), err))?;
        Ok(())
    }

    pub fn reload(&mut self, transport: &dyn Transport) -> ApiResult<()> {
        self.ensure_persisted()?;
        let path = self
            .options
            .resolve_endpoint("detail", &self.endpoint_data()?)?;
        let response = transport
            .request(&Request::new(Method::Get, path))
            .map_err(|err| not_found_as(self.model_name(), err))?;
        self.refresh(&response)
    }

    fn ensure_persisted(&self) -> ApiResult<()> {
        if self.is_new() {
            return Err(Error::new(ErrorKind::Usage)
                .with_model(self.model_name())
                .with_message("Method allowed only on existing model."));
        }
        Ok(())
    }

    /// Replace held values with a server response, keeping endpoint path properties.
    fn refresh(&mut self, response: &Value) -> ApiResult<()> {
        let Value::Object(data) = response else {
            self.persisted = true;
            return Ok(());
        };
        let kept: BTreeMap<String, FieldValue> = self
            .values
            .iter()
            .filter(|(name, _)| self.options.is_endpoint_field(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        self.values = kept;
        self.load(data)?;
        self.persisted = true;
        Ok(())
    }

    fn load(&mut self, data: &Map<String, Value>) -> ApiResult<()> {
        for (name, value) in data {
            if let Some(field) = self.options.field(name) {
                let native = field.to_python(value)?;
                self.values.insert(name.clone(), native);
            }
        }
        Ok(())
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.options.model() == other.options.model()
            && self.values == other.values
            && self.persisted == other.persisted
    }
}
