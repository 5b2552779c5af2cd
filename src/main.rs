//! Pong Client - headless live-match client
//!
//! Plays local, online and tournament matches against the Pong server:
//! - frames and status messages go to the log
//! - paddle input is read from stdin (`+w`, `-w`, `+up`, `tap down`, `start`, `leave`)

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use pong_client::api::GameParameters;
use pong_client::flows;
use pong_client::game::input::{InputEvent, Key, TouchButton, TouchPhase};
use pong_client::render::{Frame, FrameSink, StatusLevel};
use pong_client::ws::protocol::Role;
use pong_client::{ClientContext, Config};

const USAGE: &str = "usage: pong-client local | tournament <id> | watch <id> <left|right|both> \
                     | invite <friend> | accept <invitation> | decline <invitation>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    let command = Command::parse(std::env::args().skip(1))?;

    info!("Starting Pong client");
    info!("Origin: {}", config.origin);

    let sink = Arc::new(LogSink::new(config.touch));
    let ctx = ClientContext::new(config, sink);

    // Device input
    tokio::spawn(read_input(ctx.clone()));

    tokio::select! {
        result = run(&ctx, command) => result?,
        _ = shutdown_signal() => ctx.navigate_away(),
    }

    info!("Client shutdown complete");
    Ok(())
}

/// What to play
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Local,
    Tournament(Uuid),
    Watch(Uuid, Role),
    Invite(String),
    Accept(Uuid),
    Decline(Uuid),
}

impl Command {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let args: Vec<String> = args.into_iter().collect();
        let id = |i: usize| -> anyhow::Result<Uuid> {
            let raw = args.get(i).context(USAGE)?;
            Uuid::parse_str(raw).with_context(|| format!("invalid id: {raw}"))
        };

        let command = match args.first().map(String::as_str) {
            Some("local") => Command::Local,
            Some("tournament") => Command::Tournament(id(1)?),
            Some("watch") => {
                let role = args.get(2).map(String::as_str).unwrap_or("both");
                let role = Role::from_str(role).map_err(anyhow::Error::msg)?;
                Command::Watch(id(1)?, role)
            }
            Some("invite") => Command::Invite(args.get(1).context(USAGE)?.clone()),
            Some("accept") => Command::Accept(id(1)?),
            Some("decline") => Command::Decline(id(1)?),
            _ => bail!(USAGE),
        };
        Ok(command)
    }
}

async fn run(ctx: &ClientContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Local => {
            let outcome = flows::run_local_game(ctx, GameParameters::default()).await?;
            info!(?outcome, "Local game done");
        }
        Command::Tournament(id) => {
            let outcome = flows::run_tournament(ctx, id).await;
            info!(?outcome, "Tournament done");
        }
        Command::Watch(id, role) => {
            let end = ctx.play_match(id, role, None).await;
            info!(?end, "Match done");
        }
        Command::Invite(friend) => {
            let game_id = flows::create_online_game(ctx, GameParameters::default()).await?;
            let outcome = flows::invite_friend(ctx, game_id, &friend).await?;
            info!(?outcome, "Online game done");
        }
        Command::Accept(invitation) => {
            let outcome = flows::accept_invitation(ctx, invitation).await?;
            info!(?outcome, "Online game done");
        }
        Command::Decline(invitation) => flows::decline_invitation(ctx, invitation).await?,
    }
    Ok(())
}

/// One line of stdin
#[derive(Debug, Clone, PartialEq, Eq)]
enum InputLine {
    Event(InputEvent),
    Start,
    Leave,
}

fn parse_input_line(line: &str) -> Option<InputLine> {
    let line = line.trim();
    let button = |name: &str| match name {
        "up" => Some(TouchButton::Up),
        "down" => Some(TouchButton::Down),
        _ => None,
    };
    let touch = |name: &str, phase| {
        button(name).map(|button| InputLine::Event(InputEvent::Touch { button, phase }))
    };

    match line.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["start"] => Some(InputLine::Start),
        ["leave"] | ["quit"] => Some(InputLine::Leave),
        ["tap", name] => touch(*name, TouchPhase::Click),
        ["press", name] => touch(*name, TouchPhase::Start),
        ["release", name] => touch(*name, TouchPhase::End),
        [key] => {
            let (pressed, name) = if let Some(name) = key.strip_prefix('+') {
                (true, name)
            } else if let Some(name) = key.strip_prefix('-') {
                (false, name)
            } else {
                return None;
            };
            (!name.is_empty()).then(|| {
                InputLine::Event(InputEvent::Key {
                    key: Key::parse(name),
                    pressed,
                    repeat: false,
                })
            })
        }
        _ => None,
    }
}

/// Forward stdin lines to the running match
async fn read_input(ctx: ClientContext) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read input");
                break;
            }
        };
        match parse_input_line(&line) {
            Some(InputLine::Event(event)) => {
                if !ctx.input.dispatch(event) {
                    debug!("No match is taking input");
                }
            }
            Some(InputLine::Start) => ctx.request_start(),
            Some(InputLine::Leave) => ctx.navigate_away(),
            None => warn!(line = %line, "Unrecognized input"),
        }
    }
}

/// Sink writing the score label and status messages to the log
struct LogSink {
    touch_controls: bool,
    score_label: Mutex<String>,
}

impl LogSink {
    fn new(touch_controls: bool) -> Self {
        Self {
            touch_controls,
            score_label: Mutex::new(String::new()),
        }
    }
}

impl FrameSink for LogSink {
    fn present(&self, frame: &Frame) {
        trace!(commands = frame.commands.len(), "Frame");
    }

    fn set_score_label(&self, text: &str) {
        let mut label = self.score_label.lock();
        if *label != text {
            info!(score = %text, "Score");
            *label = text.to_string();
        }
    }

    fn set_start_button_active(&self, active: bool) {
        if active {
            info!("Type `start` to begin the match");
        }
    }

    fn has_touch_controls(&self) -> bool {
        self.touch_controls
    }

    fn has_start_button(&self) -> bool {
        true
    }

    fn show_status(&self, message: &str, level: StatusLevel) {
        match level {
            StatusLevel::Info | StatusLevel::Success => info!(%message, "Status"),
            StatusLevel::Error => error!(%message, "Status"),
        }
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Ctrl+C / terminate signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, leaving the match");
        }
        _ = terminate => {
            info!("Received terminate signal, leaving the match");
        }
    }
}
