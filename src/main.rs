//! Purpose: `syncano` CLI entry point.
//! Role: Binary crate root; parses args, installs tracing, dispatches commands, emits JSON on stdout.
//! Invariants: Commands emit JSON on stdout; `list` emits one JSON object per line.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
//! Invariants: Logs go to stderr so stdout stays machine readable.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod model_json;

use syncano::api::{
    ClientConfig, DEFAULT_API_ROOT, ENV_API_KEY, ENV_API_ROOT, ENV_EMAIL, ENV_INSTANCE,
    ENV_PASSWORD, Error, ErrorKind, to_exit_code,
};

const ENV_LOG_LEVEL: &str = "SYNCANO_LOGLEVEL";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

#[derive(Parser)]
#[command(
    name = "syncano",
    version,
    about = "Inspect and query Syncano resources through their models",
    after_help = r#"EXAMPLES
  $ syncano models
  $ syncano resolve /v1/instances/demo/classes/books/
  $ syncano --instance demo list Class --limit 5
  $ syncano --instance demo get Class --prop name=books
  $ syncano --instance demo schema books
  $ syncano completion bash > ~/.local/share/bash-completion/completions/syncano"#,
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, env = ENV_API_ROOT, default_value = DEFAULT_API_ROOT, help = "API root URL")]
    api_root: String,
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true, help = "Account or instance API key")]
    api_key: Option<String>,
    #[arg(long, global = true, env = ENV_EMAIL, help = "Account email (used when no API key is set)")]
    email: Option<String>,
    #[arg(long, global = true, env = ENV_PASSWORD, hide_env_values = true, help = "Account password")]
    password: Option<String>,
    #[arg(long, global = true, env = ENV_INSTANCE, help = "Default instance name for nested resources")]
    instance: Option<String>,
    #[arg(long, global = true, default_value_t = 30, help = "Request timeout in seconds")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::new()
            .with_api_root(self.api_root.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(api_key) = &self.api_key {
            config = config.with_api_key(api_key.clone());
        }
        config.email = self.email.clone();
        config.password = self.password.clone();
        if let Some(instance) = &self.instance {
            config = config.with_instance(instance.clone());
        }
        config
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "List registered models with their endpoints and fields")]
    Models,
    #[command(about = "Find the model addressed by an API path")]
    Resolve {
        #[arg(help = "API path or absolute URL, e.g. /v1/instances/demo/")]
        path: String,
    },
    #[command(about = "List resources of a model (one JSON object per line)")]
    List {
        #[arg(help = "Model name, e.g. Class")]
        model: String,
        #[arg(long = "prop", value_name = "KEY=VALUE", help = "Path property (repeatable)")]
        props: Vec<String>,
        #[arg(long, help = "Stop after N results")]
        limit: Option<usize>,
        #[arg(long, help = "Server page size")]
        page_size: Option<usize>,
        #[arg(long, help = "Field to order by")]
        order_by: Option<String>,
        #[arg(long, help = "Print server objects untouched")]
        raw: bool,
    },
    #[command(about = "Fetch one resource of a model")]
    Get {
        #[arg(help = "Model name, e.g. Instance")]
        model: String,
        #[arg(long = "prop", value_name = "KEY=VALUE", help = "Path property (repeatable)")]
        props: Vec<String>,
    },
    #[command(about = "Show the fields of a class's object model")]
    Schema {
        #[arg(help = "Class name")]
        class: String,
    },
    #[command(about = "Generate shell completions")]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(ENV_LOG_LEVEL))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(std::env::args_os().collect::<Vec<OsString>>()) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome { exit_code });
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `syncano --help`."));
            }
        },
    };

    let config = cli.config();
    command_dispatch::dispatch_command(cli.command, &config).map_err(add_hint)
}

fn add_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match (err.kind(), err.status()) {
        (ErrorKind::Request, Some(401 | 403)) => {
            err.with_hint("Check --api-key (or SYNCANO_APIKEY) and its permissions.")
        }
        (ErrorKind::Io, _) => err.with_hint("Check --api-root and network connectivity."),
        (ErrorKind::Lookup, _) => err.with_hint("Run `syncano models` to see known path templates."),
        _ => err,
    }
}

fn parse_props(raw: &[String]) -> Result<Map<String, Value>, Error> {
    let mut props = Map::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid --prop \"{item}\""))
                .with_hint("Use KEY=VALUE, e.g. --prop name=books."));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid --prop \"{item}\": empty key")));
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        props.insert(key.to_string(), value);
    }
    Ok(props)
}

fn emit_json(value: &Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_json_line(value: &Value) {
    let json = serde_json::to_string(value)
        .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
    println!("{json}");
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Field => "invalid field value".to_string(),
        ErrorKind::Request => "request failed".to_string(),
        ErrorKind::DoesNotExist => "does not exist".to_string(),
        ErrorKind::Lookup => "lookup failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(field) = err.field_name() {
        inner.insert("field".to_string(), json!(field));
    }
    if let Some(model) = err.model() {
        inner.insert("model".to_string(), json!(model));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path));
    }
    if let Some(body) = err.body() {
        inner.insert("body".to_string(), body.clone());
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = vec![format!("error: {}", error_message(err))];
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(model) = err.model() {
        lines.push(format!("model: {model}"));
    }
    if let Some(status) = err.status() {
        lines.push(format!("status: {status}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {path}"));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{Cli, error_json, parse_props};
    use clap::CommandFactory;
    use serde_json::json;
    use syncano::api::{Error, ErrorKind};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn props_parse_json_values_with_string_fallback() {
        let props = parse_props(&["id=5".to_string(), "name=books".to_string()]).expect("props");
        assert_eq!(props["id"], json!(5));
        assert_eq!(props["name"], json!("books"));
        let err = parse_props(&["oops".to_string()]).expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn error_json_carries_status_and_model() {
        let err = Error::new(ErrorKind::DoesNotExist)
            .with_model("Instance")
            .with_status(404)
            .with_message("Instance matching query does not exist.");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], json!("DoesNotExist"));
        assert_eq!(value["error"]["model"], json!("Instance"));
        assert_eq!(value["error"]["status"], json!(404));
    }
}
