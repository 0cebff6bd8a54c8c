//! Purpose: Hold top-level CLI command dispatch for `syncano`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: `models`, `resolve` and `completion` never touch the network.
//! Invariants: Output envelopes come from `model_json`.

use super::*;
use super::model_json::{field_json, options_json, record_json, resolved_json};
use syncano::api::Client;
use syncano::models::{Lookup, default_registry};

pub(super) fn dispatch_command(command: Command, config: &ClientConfig) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "syncano", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Models => {
            let registry = default_registry()?;
            let models: Vec<Value> = registry
                .models()
                .iter()
                .map(|options| options_json(options))
                .collect();
            emit_json(&json!({ "models": models }));
            Ok(RunOutcome::ok())
        }
        Command::Resolve { path } => {
            let registry = default_registry()?;
            let (options, properties) = registry.resolve_path(&path)?;
            emit_json(&resolved_json(&options, properties));
            Ok(RunOutcome::ok())
        }
        Command::List {
            model,
            props,
            limit,
            page_size,
            order_by,
            raw,
        } => {
            let client = Client::connect(config)?;
            let mut manager = client
                .manager(&model)?
                .list(Lookup::from_kwargs(parse_props(&props)?))?;
            if let Some(limit) = limit {
                manager = manager.limit(limit)?;
            }
            if let Some(page_size) = page_size {
                manager = manager.page_size(page_size)?;
            }
            if let Some(order_by) = order_by {
                manager = manager.order_by(&order_by)?;
            }
            if raw {
                manager = manager.raw();
            }
            for record in manager.iterator() {
                emit_json_line(&record_json(&record?)?);
            }
            Ok(RunOutcome::ok())
        }
        Command::Get { model, props } => {
            let client = Client::connect(config)?;
            let record = client
                .manager(&model)?
                .get(Lookup::from_kwargs(parse_props(&props)?))?;
            emit_json(&record_json(&record)?);
            Ok(RunOutcome::ok())
        }
        Command::Schema { class } => {
            let instance = config.instance_name.clone().ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message("schema requires an instance name")
                    .with_hint("Pass --instance or set SYNCANO_INSTANCE.")
            })?;
            let client = Client::connect(config)?;
            let mut values = Map::new();
            values.insert("instance_name".to_string(), json!(instance));
            values.insert("class_name".to_string(), json!(class));
            let options = client.objects()?.get_class_model(&values)?;
            let fields: Vec<Value> = options.fields().iter().map(field_json).collect();
            emit_json(&json!({
                "model": options.model(),
                "instance": instance,
                "class": class,
                "fields": fields,
            }));
            Ok(RunOutcome::ok())
        }
    }
}
