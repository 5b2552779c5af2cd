//! Match lifecycle: connect, attach, reconcile, tear down once

pub mod signal;

pub use signal::CompletionSignal;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::effects::EffectRegistry;
use crate::game::input::{attach_input, InputEvent, InputMode, Subscription};
use crate::game::reconciler::{Reconciled, StateReconciler};
use crate::game::state::{new_shared_view, SharedView};
use crate::render::{FrameSink, RenderLoop, SpriteAtlas};
use crate::ws::connection::{
    open_match_connection, ConnectionError, ConnectionEvent, ConnectionHandle, ConnectionRegistry,
};
use crate::ws::protocol::Role;

/// Default inactivity window
pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(3);
/// Default render interval, roughly one display refresh
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Callback run when the player presses start
pub type StartAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Immutable per-match settings
#[derive(Clone)]
pub struct MatchConfig {
    pub match_id: Uuid,
    pub role: Role,
    /// Page origin the socket URL is derived from
    pub origin: String,
    pub start_action: Option<StartAction>,
    /// `None` disables the inactivity watchdog
    pub watchdog: Option<Duration>,
    pub frame_interval: Duration,
    pub input_mode: InputMode,
}

impl MatchConfig {
    pub fn new(match_id: Uuid, role: Role, origin: impl Into<String>) -> Self {
        Self {
            match_id,
            role,
            origin: origin.into(),
            start_action: None,
            watchdog: Some(DEFAULT_WATCHDOG),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            input_mode: InputMode::Keyboard,
        }
    }

    pub fn with_start_action(mut self, action: StartAction) -> Self {
        self.start_action = Some(action);
        self
    }

    pub fn with_watchdog(mut self, watchdog: Option<Duration>) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_input_mode(mut self, mode: InputMode) -> Self {
        self.input_mode = mode;
        self
    }
}

impl fmt::Debug for MatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchConfig")
            .field("match_id", &self.match_id)
            .field("role", &self.role)
            .field("origin", &self.origin)
            .field("start_action", &self.start_action.is_some())
            .field("watchdog", &self.watchdog)
            .field("frame_interval", &self.frame_interval)
            .field("input_mode", &self.input_mode)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Connecting,
    Active,
    Terminal,
}

/// How a match ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEnd {
    GameOver { winner: Option<String> },
    Aborted { winner: Option<String> },
    /// Socket closed, or never opened
    Disconnected,
    /// No snapshot within the watchdog window
    Inactive,
    /// Ended locally via [`MatchSession::cancel`]
    Cancelled,
}

impl MatchEnd {
    pub fn winner(&self) -> Option<&str> {
        match self {
            MatchEnd::GameOver { winner } | MatchEnd::Aborted { winner } => winner.as_deref(),
            _ => None,
        }
    }
}

/// A running match.
///
/// Starting and awaiting are separate: the session is returned as soon as
/// the socket is requested, and [`MatchSession::completion`] resolves once
/// the match reaches its terminal state. Dropping the session cancels it.
pub struct MatchSession {
    match_id: Uuid,
    phase: Arc<Mutex<MatchPhase>>,
    completion: CompletionSignal<MatchEnd>,
    conn: ConnectionHandle,
    view: SharedView,
    sink: Arc<dyn FrameSink>,
    start_action: Option<StartAction>,
    start_pressed: Arc<AtomicBool>,
    driver: Option<JoinHandle<()>>,
}

impl MatchSession {
    /// Open the match socket and drive the match on it
    pub fn start(
        registry: &ConnectionRegistry,
        config: MatchConfig,
        sink: Arc<dyn FrameSink>,
        input: mpsc::UnboundedReceiver<InputEvent>,
    ) -> Result<Self, ConnectionError> {
        let (conn, events) = open_match_connection(registry, &config.origin, config.match_id)?;
        Ok(Self::with_connection(
            config,
            conn,
            events,
            sink,
            input,
            registry.clone(),
        ))
    }

    /// Drive a match on an already requested connection
    pub fn with_connection(
        config: MatchConfig,
        conn: ConnectionHandle,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        sink: Arc<dyn FrameSink>,
        input: mpsc::UnboundedReceiver<InputEvent>,
        registry: ConnectionRegistry,
    ) -> Self {
        let phase = Arc::new(Mutex::new(MatchPhase::Idle));
        let completion = CompletionSignal::new();
        let view = new_shared_view();

        if config.start_action.is_some() {
            if sink.has_start_button() {
                sink.set_start_button_active(true);
            } else {
                warn!(match_id = %config.match_id, "Start button missing, start action unavailable");
            }
        }

        *phase.lock() = MatchPhase::Connecting;
        info!(match_id = %config.match_id, role = config.role.as_str(), "Match connecting");

        let driver = Driver {
            match_id: config.match_id,
            role: config.role,
            input_mode: config.input_mode,
            watchdog: config.watchdog,
            frame_interval: config.frame_interval,
            phase: Arc::clone(&phase),
            completion: completion.clone(),
            conn: conn.clone(),
            view: view.clone(),
            sink: Arc::clone(&sink),
            registry,
        };
        // Subscribed before spawning so a cancel ahead of the first poll is seen
        let done = completion.subscribe();
        let task = tokio::spawn(driver.run(events, input, done));

        Self {
            match_id: config.match_id,
            phase,
            completion,
            conn,
            view,
            sink,
            start_action: config.start_action,
            start_pressed: Arc::new(AtomicBool::new(false)),
            driver: Some(task),
        }
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn phase(&self) -> MatchPhase {
        *self.phase.lock()
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.conn
    }

    /// Resolves once with how the match ended
    pub async fn completion(&self) -> MatchEnd {
        self.completion.wait().await
    }

    pub fn completion_signal(&self) -> CompletionSignal<MatchEnd> {
        self.completion.clone()
    }

    /// Wait for the end and for teardown to finish
    pub async fn finish(mut self) -> MatchEnd {
        let end = self.completion.wait().await;
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
        end
    }

    /// End the match locally; no-op once terminal
    pub fn cancel(&self) {
        if self.completion.resolve(MatchEnd::Cancelled) {
            info!(match_id = %self.match_id, "Match cancelled");
        }
    }

    /// Hide the start button and run the start action, at most once
    pub fn press_start(&self) -> bool {
        let Some(action) = &self.start_action else {
            return false;
        };
        if self.completion.is_resolved() || self.start_pressed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.sink.set_start_button_active(false);
        debug!(match_id = %self.match_id, "Start pressed");
        tokio::spawn(action());
        true
    }
}

impl Drop for MatchSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// State owned by the per-match task
struct Driver {
    match_id: Uuid,
    role: Role,
    input_mode: InputMode,
    watchdog: Option<Duration>,
    frame_interval: Duration,
    phase: Arc<Mutex<MatchPhase>>,
    completion: CompletionSignal<MatchEnd>,
    conn: ConnectionHandle,
    view: SharedView,
    sink: Arc<dyn FrameSink>,
    registry: ConnectionRegistry,
}

impl Driver {
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        input: mpsc::UnboundedReceiver<InputEvent>,
        mut done: watch::Receiver<Option<MatchEnd>>,
    ) {
        let effects = EffectRegistry::new();
        let mut reconciler = StateReconciler::new(self.view.clone(), effects.clone());
        let mut input = Some(input);
        let mut subscription = Subscription::none();
        let mut render: Option<RenderLoop> = None;

        // Armed by the first snapshot, pushed back by every later one
        let watchdog = tokio::time::sleep(self.watchdog.unwrap_or(DEFAULT_WATCHDOG));
        tokio::pin!(watchdog);
        let mut watchdog_armed = false;

        loop {
            if self.completion.is_resolved() {
                break;
            }
            tokio::select! {
                biased;
                _ = done.changed() => break,
                event = events.recv() => match event {
                    Some(ConnectionEvent::Opened) => {
                        if self.completion.is_resolved() {
                            break;
                        }
                        *self.phase.lock() = MatchPhase::Active;
                        info!(match_id = %self.match_id, "Match active");

                        if let Some(input) = input.take() {
                            subscription = attach_input(
                                self.input_mode,
                                self.role,
                                self.conn.clone(),
                                input,
                                self.sink.has_touch_controls(),
                            );
                        }
                        render = Some(RenderLoop::start(
                            self.view.clone(),
                            effects.clone(),
                            Arc::new(SpriteAtlas::load()),
                            Arc::clone(&self.sink),
                            self.frame_interval,
                            &self.completion,
                        ));
                    }
                    Some(ConnectionEvent::Message(raw)) => {
                        let before = reconciler.snapshots_received();
                        if let Reconciled::Terminal(end) = reconciler.on_message(&raw) {
                            info!(match_id = %self.match_id, end = ?end, "Match over");
                            self.completion.resolve(end);
                            break;
                        }
                        if reconciler.snapshots_received() > before {
                            if let Some(window) = self.watchdog {
                                watchdog.as_mut().reset(Instant::now() + window);
                                watchdog_armed = true;
                            }
                        }
                    }
                    Some(ConnectionEvent::Closed) | None => {
                        info!(match_id = %self.match_id, "Match connection closed");
                        self.completion.resolve(MatchEnd::Disconnected);
                        break;
                    }
                },
                _ = &mut watchdog, if watchdog_armed => {
                    warn!(match_id = %self.match_id, "No game state received, match considered abandoned");
                    self.completion.resolve(MatchEnd::Inactive);
                    break;
                }
            }
        }

        // Teardown runs exactly once, whichever trigger came first
        *self.phase.lock() = MatchPhase::Terminal;
        self.conn.close();
        self.registry.clear_if(self.conn.id());
        subscription.detach();
        if let Some(mut render) = render.take() {
            render.stop();
        }
        reconciler.shutdown();
        debug!(match_id = %self.match_id, "Match torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSink;
    use crate::ws::connection::Outbound;
    use std::sync::atomic::AtomicUsize;

    struct Harness {
        session: MatchSession,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        input: mpsc::UnboundedSender<InputEvent>,
        sink: Arc<RecordingSink>,
        registry: ConnectionRegistry,
    }

    fn harness(config: MatchConfig, sink: RecordingSink) -> Harness {
        let (conn, outbound) = ConnectionHandle::channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let sink = Arc::new(sink);
        let registry = ConnectionRegistry::new();
        registry.set(conn.clone());
        let session = MatchSession::with_connection(
            config,
            conn,
            events_rx,
            sink.clone(),
            input_rx,
            registry.clone(),
        );
        Harness {
            session,
            events: events_tx,
            outbound,
            input: input_tx,
            sink,
            registry,
        }
    }

    fn config() -> MatchConfig {
        MatchConfig::new(Uuid::nil(), Role::Left, "http://localhost:8000")
    }

    fn open(h: &Harness) {
        h.session.connection().mark_open();
        h.events.send(ConnectionEvent::Opened).unwrap();
    }

    fn message(h: &Harness, raw: &str) {
        h.events.send(ConnectionEvent::Message(raw.into())).unwrap();
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn phases_follow_the_connection() {
        let h = harness(config(), RecordingSink::new());
        assert_eq!(h.session.phase(), MatchPhase::Connecting);

        open(&h);
        settle().await;
        assert_eq!(h.session.phase(), MatchPhase::Active);

        message(&h, r#"{"type":"game_over","winner":"left"}"#);
        let end = h.session.completion().await;
        assert_eq!(end.winner(), Some("left"));
        settle().await;
        assert_eq!(h.session.phase(), MatchPhase::Terminal);
        assert!(h.session.connection().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_triggers_resolve_once() {
        let mut h = harness(config(), RecordingSink::new());
        open(&h);
        message(&h, r#"{"type":"game_aborted","winner":"right"}"#);
        message(&h, r#"{"type":"game_over","winner":"left"}"#);
        let _ = h.events.send(ConnectionEvent::Closed);
        let _ = h.events.send(ConnectionEvent::Closed);

        let aborted = MatchEnd::Aborted {
            winner: Some("right".into()),
        };
        assert_eq!(h.session.completion().await, aborted);
        h.session.cancel();
        settle().await;
        assert_eq!(h.session.completion().await, aborted);
        let frames = h.sink.frame_count();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.sink.frame_count(), frames);

        let mut closes = 0;
        while let Ok(out) = h.outbound.try_recv() {
            if out == Outbound::Close {
                closes += 1;
            }
        }
        assert_eq!(closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_before_open_is_a_disconnect() {
        let h = harness(config(), RecordingSink::new());
        h.events.send(ConnectionEvent::Closed).unwrap();
        assert_eq!(h.session.completion().await, MatchEnd::Disconnected);
        assert_eq!(h.sink.frame_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_fires_without_snapshots() {
        let h = harness(config(), RecordingSink::new());
        open(&h);
        let snapshot = r#"{"type":"game_state","score_left":0,"score_right":0}"#;

        for _ in 0..4 {
            tokio::time::sleep(Duration::from_secs(2)).await;
            message(&h, snapshot);
        }
        settle().await;
        assert!(!h.session.completion_signal().is_resolved());

        // Events other than snapshots do not feed the watchdog
        message(&h, r#"{"type":"countdown","countdown_nb":1}"#);
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(h.session.completion_signal().value(), Some(MatchEnd::Inactive));
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_waits_for_the_first_snapshot() {
        let h = harness(config(), RecordingSink::new());
        open(&h);

        // Nothing arrives until someone presses start, then a silent countdown
        tokio::time::sleep(Duration::from_secs(10)).await;
        for n in [3, 2, 1] {
            message(&h, &format!(r#"{{"type":"countdown","countdown_nb":{n}}}"#));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        message(&h, r#"{"type":"game_state","score_left":0,"score_right":0}"#);
        settle().await;
        assert!(!h.session.completion_signal().is_resolved());
        assert_eq!(h.session.phase(), MatchPhase::Active);

        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(h.session.completion_signal().value(), Some(MatchEnd::Inactive));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_connecting_tears_down() {
        let mut h = harness(config(), RecordingSink::new());
        h.session.cancel();
        settle().await;

        assert_eq!(h.session.phase(), MatchPhase::Terminal);
        assert!(h.session.connection().is_closed());
        assert_eq!(h.outbound.try_recv().unwrap(), Outbound::Close);
        assert!(h.registry.get().is_none());
        assert_eq!(h.session.completion().await, MatchEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_watchdog_never_fires() {
        let h = harness(config().with_watchdog(None), RecordingSink::new());
        open(&h);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!h.session.completion_signal().is_resolved());
        h.session.cancel();
        assert_eq!(h.session.completion().await, MatchEnd::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn input_attaches_on_open_and_detaches_at_end() {
        let mut h = harness(config(), RecordingSink::new());
        h.input
            .send(InputEvent::Key {
                key: crate::game::input::Key::ArrowUp,
                pressed: true,
                repeat: false,
            })
            .unwrap();
        settle().await;
        assert!(h.outbound.try_recv().is_err());

        open(&h);
        settle().await;
        assert_eq!(
            h.outbound.try_recv().unwrap(),
            Outbound::Text(r#"{"action":"start_move","player":"left","direction":"up"}"#.into())
        );

        h.session.cancel();
        settle().await;
        assert_eq!(h.outbound.try_recv().unwrap(), Outbound::Close);
        let _ = h.input.send(InputEvent::Key {
            key: crate::game::input::Key::ArrowUp,
            pressed: false,
            repeat: false,
        });
        settle().await;
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn start_action_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let action: StartAction = Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        let h = harness(
            config().with_start_action(action),
            RecordingSink::with_controls(false, true),
        );
        assert_eq!(h.sink.recorded().start_button_active, Some(true));

        assert!(h.session.press_start());
        assert!(!h.session.press_start());
        settle().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.recorded().start_button_active, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn finish_waits_for_teardown() {
        let h = harness(config(), RecordingSink::new());
        open(&h);
        settle().await;
        let conn = h.session.connection().clone();
        message(&h, r#"{"type":"game_over"}"#);
        let end = h.session.finish().await;
        assert_eq!(end, MatchEnd::GameOver { winner: None });
        assert!(conn.is_closed());
    }
}
