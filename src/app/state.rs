//! Client context shared by every flow

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::config::Config;
use crate::game::input::{InputEvent, InputMode};
use crate::lifecycle::{MatchConfig, MatchEnd, MatchSession, StartAction};
use crate::render::{FrameSink, StatusLevel};
use crate::tournament::CancelFlag;
use crate::ws::connection::ConnectionRegistry;
use crate::ws::protocol::Role;

/// Forwards device input to whichever match is currently attached
#[derive(Clone, Default)]
pub struct InputRouter {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<InputEvent>>>>,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route input to a new receiver, replacing the previous one
    pub fn attach(&self) -> mpsc::UnboundedReceiver<InputEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.slot.lock() = Some(tx);
        rx
    }

    pub fn detach(&self) {
        self.slot.lock().take();
    }

    /// Returns `false` if no match takes input right now
    pub fn dispatch(&self, event: InputEvent) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_ref().map(|tx| tx.send(event)) {
            Some(Ok(())) => true,
            Some(Err(_)) => {
                // Match ended and dropped its receiver
                *slot = None;
                false
            }
            None => false,
        }
    }
}

/// Shared client state
#[derive(Clone)]
pub struct ClientContext {
    pub config: Arc<Config>,
    pub api: ApiClient,
    pub registry: ConnectionRegistry,
    pub tournament_cancel: CancelFlag,
    pub sink: Arc<dyn FrameSink>,
    pub input: InputRouter,
    start_requests: Arc<Notify>,
}

impl ClientContext {
    pub fn new(config: Config, sink: Arc<dyn FrameSink>) -> Self {
        let api = ApiClient::new(&config);
        Self::with_api(config, api, sink)
    }

    pub fn with_api(config: Config, api: ApiClient, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            config: Arc::new(config),
            api,
            registry: ConnectionRegistry::new(),
            tournament_cancel: CancelFlag::new(),
            sink,
            input: InputRouter::new(),
            start_requests: Arc::new(Notify::new()),
        }
    }

    pub fn input_mode(&self) -> InputMode {
        if self.config.touch {
            InputMode::Touch
        } else {
            InputMode::Keyboard
        }
    }

    /// Leave the current page: close the live socket and stop any tournament
    pub fn navigate_away(&self) {
        let closed = self.registry.close_active();
        self.tournament_cancel.cancel();
        self.input.detach();
        info!(closed_socket = closed, "Navigated away");
    }

    /// Press the start button of the running match, if it shows one
    pub fn request_start(&self) {
        self.start_requests.notify_waiters();
    }

    pub fn match_config(&self, match_id: Uuid, role: Role) -> MatchConfig {
        MatchConfig::new(match_id, role, self.config.origin.clone())
            .with_watchdog(self.config.watchdog)
            .with_frame_interval(self.config.frame_interval)
            .with_input_mode(self.input_mode())
    }

    /// Run one live match to its end.
    ///
    /// A socket that cannot be opened ends the match as disconnected. An
    /// inactive match also navigates away.
    pub async fn play_match(&self, match_id: Uuid, role: Role, start: Option<StartAction>) -> MatchEnd {
        let mut config = self.match_config(match_id, role);
        if let Some(action) = start {
            config = config.with_start_action(action);
        }

        let input = self.input.attach();
        let session = match MatchSession::start(&self.registry, config, Arc::clone(&self.sink), input) {
            Ok(session) => session,
            Err(e) => {
                error!(%match_id, error = %e, "Failed to open match socket");
                self.sink.show_status("Unable to join the match", StatusLevel::Error);
                return MatchEnd::Disconnected;
            }
        };

        loop {
            tokio::select! {
                _ = session.completion() => break,
                _ = self.start_requests.notified() => {
                    session.press_start();
                }
            }
        }
        let end = session.finish().await;
        self.input.detach();

        if end == MatchEnd::Inactive {
            warn!(%match_id, "Match inactive, leaving");
            self.sink
                .show_status("The match stopped responding", StatusLevel::Error);
            self.navigate_away();
        }
        end
    }
}
