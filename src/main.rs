//! Purpose: `subwire` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit one JSON document or JSON line stream on stdout.
//! Invariants: Errors are emitted as JSON on stderr; diagnostics go through tracing.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use subwire::api::{
    ChannelSpec, Client, Error, ErrorKind, Hub, MessageSpec, RemoteTrigger, Server,
    TriggerBackend, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[derive(Parser)]
#[command(name = "subwire", version, about = "Typed channels over external pub/sub services")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send one event to a remote trigger endpoint.
    Trigger {
        /// Base url of the pub/sub service.
        #[arg(long)]
        url: String,
        /// Application identifier on the service.
        #[arg(long)]
        app: String,
        /// Bearer token for the service.
        #[arg(long, conflicts_with = "token_file")]
        token: Option<String>,
        /// File holding the bearer token.
        #[arg(long, value_name = "PATH")]
        token_file: Option<PathBuf>,
        /// Concrete channel name.
        channel: String,
        /// Concrete event name.
        event: String,
        /// JSON payload; reads stdin when omitted or "-".
        data: Option<String>,
    },
    /// Run a typed subscribe/trigger round trip over the in-process hub.
    Demo {
        /// Number of events to trigger.
        #[arg(long, default_value_t = 3)]
        events: u32,
    },
    /// Generate shell completions.
    Completions { shell: Shell },
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

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
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
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(clap_error_summary(&err)));
            }
        },
    };

    match cli.command {
        Command::Trigger {
            url,
            app,
            token,
            token_file,
            channel,
            event,
            data,
        } => run_trigger(url, app, token, token_file, channel, event, data),
        Command::Demo { events } => run_demo(events),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "subwire", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
    }
}

fn run_trigger(
    url: String,
    app: String,
    token: Option<String>,
    token_file: Option<PathBuf>,
    channel: String,
    event: String,
    data: Option<String>,
) -> Result<RunOutcome, Error> {
    let raw = read_data(data)?;
    let payload: Value = serde_json::from_str(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("data is not valid json")
            .with_source(err)
    })?;

    let mut trigger = RemoteTrigger::new(url, app)?;
    if let Some(token) = resolve_token(token, token_file)? {
        trigger = trigger.with_token(token);
    }
    trigger.trigger(&channel, &event, &payload)?;

    println!("{}", json!({"triggered": {"channel": channel, "event": event}}));
    Ok(RunOutcome::ok())
}

fn read_data(data: Option<String>) -> Result<String, Error> {
    match data {
        Some(data) if data != "-" => Ok(data),
        _ => {
            let mut raw = String::new();
            io::stdin().read_to_string(&mut raw).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read data from stdin")
                    .with_source(err)
            })?;
            Ok(raw)
        }
    }
}

fn resolve_token(
    token: Option<String>,
    token_file: Option<PathBuf>,
) -> Result<Option<String>, Error> {
    if token.is_some() {
        return Ok(token);
    }
    let Some(path) = token_file else {
        return Ok(None);
    };
    let raw = std::fs::read_to_string(&path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to read token file {}", path.display()))
            .with_hint("Pass --token instead, or point --token-file at a readable file.")
            .with_source(err)
    })?;
    let token = raw.trim();
    if token.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("token file {} is empty", path.display())));
    }
    Ok(Some(token.to_string()))
}

#[derive(Serialize, Deserialize)]
struct RoomInput {
    room: String,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    from: String,
    body: String,
}

const CHAT: ChannelSpec<RoomInput> = ChannelSpec::new("chat");
const MESSAGE_SENT: MessageSpec<RoomInput, (), ChatMessage> = CHAT.message("message-sent");

fn run_demo(events: u32) -> Result<RunOutcome, Error> {
    let hub = Hub::new();
    let client = Client::new(hub.clone());
    let server = Server::new(hub.clone());
    let room = RoomInput {
        room: "lobby".to_string(),
    };

    let subscription = client.subscribe(&MESSAGE_SENT, &room, &(), |message: ChatMessage| {
        println!(
            "{}",
            json!({"delivered": {"from": message.from, "body": message.body}})
        );
    })?;

    for index in 0..events {
        server.trigger(
            &MESSAGE_SENT,
            &room,
            &(),
            &ChatMessage {
                from: "demo".to_string(),
                body: format!("event {index}"),
            },
        )?;
    }

    println!(
        "{}",
        json!({
            "demo": {
                "channel": subscription.channel(),
                "event": subscription.event(),
                "delivered": hub.delivered_count(),
                "dropped": hub.dropped_count(),
            }
        })
    );
    Ok(RunOutcome::ok())
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

fn emit_error(err: &Error) {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    if let Some(message) = err.message() {
        inner.insert("message".to_string(), json!(message));
    }
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(channel) = err.channel() {
        inner.insert("channel".to_string(), json!(channel));
    }
    if let Some(event) = err.event() {
        inner.insert("event".to_string(), json!(event));
    }
    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    eprintln!("{}", Value::Object(outer));
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
