//! Purpose: Resource definitions for the backend's REST endpoints.
//! Exports: `default_registry`, `register_defaults`.
//! Role: Data only; every definition is an `Options` value registered into a `Registry`.
//! Invariants: Children are declared relative to their parent's detail path.
use super::fields::{Choice, Field};
use super::options::Options;
use super::registry::Registry;
use crate::api::transport::Method::{self, Delete, Get, Patch, Post, Put};
use crate::core::error::ApiResult;

const DETAIL: &[Method] = &[Put, Get, Patch, Delete];
const READ: &[Method] = &[Get];
const LIST: &[Method] = &[Post, Get];

pub fn default_registry() -> ApiResult<Registry> {
    let registry = Registry::new();
    register_defaults(&registry)?;
    Ok(registry)
}

/// Register the built-in resources. Order does not matter; children
/// wait for their parents.
pub fn register_defaults(registry: &Registry) -> ApiResult<()> {
    for options in [
        object()?,
        script_trace()?,
        instance()?,
        admin()?,
        api_key()?,
        class()?,
        script()?,
        schedule()?,
        webhook()?,
        user()?,
    ] {
        registry.add(options)?;
    }
    Ok(())
}

fn choices(values: &[&str]) -> Vec<Choice> {
    values.iter().map(|value| Choice::new(*value, *value)).collect()
}

fn created_at() -> Field {
    Field::datetime().read_only().optional()
}

fn instance() -> ApiResult<Options> {
    Options::new("Instance")
        .with_endpoint("detail", DETAIL, "/v1/instances/{name}/")
        .with_endpoint("list", LIST, "/v1/instances/")
        .with_field("name", Field::string().with_max_length(64).with_label("instance name"))?
        .with_field("description", Field::string().optional())?
        .with_field("role", Field::string().read_only().optional())?
        .with_field("owner", Field::field().read_only().optional())?
        .with_field("links", Field::links())?
        .with_field("metadata", Field::field().optional())?
        .with_field("created_at", created_at())?
        .with_field("updated_at", created_at())
}

fn admin() -> ApiResult<Options> {
    Options::new("Admin")
        .with_parent("Instance")
        .with_endpoint("detail", DETAIL, "/admins/{id}/")
        .with_endpoint("list", READ, "/admins/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field("first_name", Field::string().read_only().optional())?
        .with_field("last_name", Field::string().read_only().optional())?
        .with_field("email", Field::email().read_only().optional())?
        .with_field("role", Field::choice(choices(&["full", "write", "read"])))?
        .with_field("links", Field::links())
}

fn api_key() -> ApiResult<Options> {
    Options::new("ApiKey")
        .with_parent("Instance")
        .with_endpoint("detail", &[Get, Delete], "/api_keys/{id}/")
        .with_endpoint("list", LIST, "/api_keys/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field("api_key", Field::string().read_only().optional())?
        .with_field("description", Field::string().optional())?
        .with_field("allow_user_create", Field::boolean().optional())?
        .with_field("ignore_acl", Field::boolean().optional())?
        .with_field("links", Field::links())
}

fn class() -> ApiResult<Options> {
    Options::new("Class")
        .with_parent("Instance")
        .with_plural_name("Classes")
        .with_endpoint("detail", DETAIL, "/classes/{name}/")
        .with_endpoint("list", LIST, "/classes/")
        .with_field("name", Field::string().with_max_length(50))?
        .with_field("description", Field::string().optional())?
        .with_field("objects_count", Field::integer().read_only().optional())?
        .with_field("schema", Field::field().optional())?
        .with_field("status", Field::string().read_only().optional())?
        .with_field("links", Field::links())?
        .with_field("metadata", Field::field().optional())?
        .with_field("revision", Field::integer().read_only().optional())?
        .with_field("created_at", created_at())?
        .with_field("updated_at", created_at())
}

fn object() -> ApiResult<Options> {
    Options::new("Object")
        .with_parent("Class")
        .dynamic()
        .with_endpoint("detail", DETAIL, "/objects/{id}/")
        .with_endpoint("list", LIST, "/objects/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field("revision", Field::integer().read_only().optional())?
        .with_field("owner", Field::integer().optional())?
        .with_field("owner_permissions", Field::string().optional())?
        .with_field("group", Field::integer().optional())?
        .with_field("group_permissions", Field::string().optional())?
        .with_field("other_permissions", Field::string().optional())?
        .with_field("channel", Field::string().optional())?
        .with_field("channel_room", Field::string().optional().with_max_length(64))?
        .with_field("links", Field::links())?
        .with_field("created_at", created_at())?
        .with_field("updated_at", created_at())
}

fn script() -> ApiResult<Options> {
    Options::new("Script")
        .with_parent("Instance")
        .with_endpoint("detail", DETAIL, "/snippets/scripts/{id}/")
        .with_endpoint("list", LIST, "/snippets/scripts/")
        .with_endpoint("run", &[Post], "/snippets/scripts/{id}/run/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field("label", Field::string().with_max_length(80))?
        .with_field("description", Field::string().optional())?
        .with_field("source", Field::string())?
        .with_field(
            "runtime_name",
            Field::choice(choices(&["nodejs", "python", "ruby", "golang"])),
        )?
        .with_field("config", Field::field().optional())?
        .with_field("links", Field::links())?
        .with_field("created_at", created_at())?
        .with_field("updated_at", created_at())
}

fn script_trace() -> ApiResult<Options> {
    Options::new("ScriptTrace")
        .with_parent("Script")
        .with_endpoint("detail", READ, "/traces/{id}/")
        .with_endpoint("list", READ, "/traces/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field(
            "status",
            Field::choice(choices(&["success", "failure", "timeout", "pending"]))
                .read_only()
                .optional(),
        )?
        .with_field("links", Field::links())?
        .with_field("executed_at", created_at())?
        .with_field("result", Field::field().read_only().optional())?
        .with_field("duration", Field::integer().read_only().optional())
}

fn schedule() -> ApiResult<Options> {
    Options::new("Schedule")
        .with_parent("Instance")
        .with_endpoint("detail", DETAIL, "/schedules/{id}/")
        .with_endpoint("list", LIST, "/schedules/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field("label", Field::string().with_max_length(80))?
        .with_field("script", Field::integer().with_label("script id"))?
        .with_field("interval_sec", Field::integer().optional())?
        .with_field("crontab", Field::string().with_max_length(40).optional())?
        .with_field("payload", Field::string().optional())?
        .with_field("created_at", created_at())?
        .with_field("scheduled_next", created_at())?
        .with_field("links", Field::links())
}

fn webhook() -> ApiResult<Options> {
    Options::new("Webhook")
        .with_parent("Instance")
        .with_endpoint("detail", DETAIL, "/webhooks/{name}/")
        .with_endpoint("list", LIST, "/webhooks/")
        .with_endpoint("run", &[Get], "/webhooks/{name}/run/")
        .with_field("name", Field::slug().with_max_length(50))?
        .with_field("script", Field::integer().with_label("script id"))?
        .with_field("public", Field::boolean().optional())?
        .with_field("public_link", Field::string().read_only().optional())?
        .with_field("links", Field::links())
}

fn user() -> ApiResult<Options> {
    Options::new("User")
        .with_parent("Instance")
        .with_endpoint("detail", DETAIL, "/users/{id}/")
        .with_endpoint("reset_key", &[Post], "/users/{id}/reset_key/")
        .with_endpoint("list", LIST, "/users/")
        .with_field("id", Field::integer().read_only().optional())?
        .with_field("username", Field::string().with_max_length(64))?
        .with_field("password", Field::string())?
        .with_field("user_key", Field::string().read_only().optional())?
        .with_field("links", Field::links())?
        .with_field("created_at", created_at())?
        .with_field("updated_at", created_at())
}
