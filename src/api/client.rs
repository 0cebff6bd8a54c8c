//! Purpose: Entry point binding a model registry to a transport.
//! Exports: `Client`.
//! Role: Hands out managers per registered model; used by the CLI and by library callers.
//! Invariants: Managers are only handed out for registered models.
//! Invariants: A configured instance name becomes the `instance_name` default of every model.
use super::config::ClientConfig;
use super::connection::Connection;
use super::transport::Transport;
use crate::core::error::{ApiResult, Error, ErrorKind};
use crate::models::builtin::default_registry;
use crate::models::manager::Manager;
use crate::models::model::Model;
use crate::models::registry::Registry;
use std::sync::Arc;

#[derive(Clone)]
pub struct Client {
    registry: Registry,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(registry: Registry, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// HTTP client over the built-in resource models.
    pub fn connect(config: &ClientConfig) -> ApiResult<Self> {
        Self::connect_with(config, default_registry()?)
    }

    pub fn connect_with(config: &ClientConfig, registry: Registry) -> ApiResult<Self> {
        let connection = Connection::new(config)?;
        if let Some(instance) = config.instance_name.as_deref() {
            registry.set_default_instance(instance);
        }
        Ok(Self::new(registry, Arc::new(connection)))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn manager(&self, model: &str) -> ApiResult<Manager> {
        if !self.registry.has_model(model) {
            return Err(Error::new(ErrorKind::Usage)
                .with_model(model)
                .with_message("Model is not registered.")
                .with_hint("Run `syncano models` to list the available models."));
        }
        Ok(Manager::new(model, self.registry.clone(), Arc::clone(&self.transport)))
    }

    /// Manager for data objects; the concrete class model is picked per object.
    pub fn objects(&self) -> ApiResult<Manager> {
        self.manager("Object")
    }

    pub fn related(&self, model: &Model, link: &str) -> ApiResult<Manager> {
        self.manager(model.model_name())?.related(model, link)
    }

    pub fn save(&self, model: &mut Model) -> ApiResult<()> {
        model.save(self.transport.as_ref())
    }

    pub fn delete(&self, model: &Model) -> ApiResult<()> {
        model.delete(self.transport.as_ref())
    }

    pub fn reload(&self, model: &mut Model) -> ApiResult<()> {
        model.reload(self.transport.as_ref())
    }
}
