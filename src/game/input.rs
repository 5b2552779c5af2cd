//! Keyboard and touch input mapped to paddle intents

use std::collections::HashSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error};

use crate::ws::connection::ConnectionHandle;
use crate::ws::protocol::{ClientMsg, Direction, Role, Side};

/// Delay between the start and stop of a click-activated touch button
pub const CLICK_RELEASE_DELAY: Duration = Duration::from_millis(200);
/// Two touch-ends closer than this count as a double tap
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);

/// Keys the mapper cares about; anything else is carried through and ignored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    S,
    ArrowUp,
    ArrowDown,
    Other(String),
}

impl Key {
    /// Parse a DOM-style key name (`w`, `W`, `ArrowUp`, ...)
    pub fn parse(name: &str) -> Self {
        match name {
            "w" | "W" => Key::W,
            "s" | "S" => Key::S,
            "ArrowUp" | "up" | "Up" => Key::ArrowUp,
            "ArrowDown" | "down" | "Down" => Key::ArrowDown,
            other => Key::Other(other.to_string()),
        }
    }
}

/// Paddle and direction a key drives for a role
pub fn key_binding(role: Role, key: &Key) -> Option<(Side, Direction)> {
    match (role, key) {
        (Role::Both, Key::W) => Some((Side::Left, Direction::Up)),
        (Role::Both, Key::S) => Some((Side::Left, Direction::Down)),
        (Role::Both, Key::ArrowUp) => Some((Side::Right, Direction::Up)),
        (Role::Both, Key::ArrowDown) => Some((Side::Right, Direction::Down)),
        (Role::Left, Key::ArrowUp) => Some((Side::Left, Direction::Up)),
        (Role::Left, Key::ArrowDown) => Some((Side::Left, Direction::Down)),
        (Role::Right, Key::ArrowUp) => Some((Side::Right, Direction::Up)),
        (Role::Right, Key::ArrowDown) => Some((Side::Right, Direction::Down)),
        _ => None,
    }
}

/// Keyboard state for one match.
///
/// A start is emitted once per physical press; the matching stop only if
/// that start was emitted.
#[derive(Debug)]
pub struct KeyboardMapper {
    role: Role,
    held: HashSet<Key>,
}

impl KeyboardMapper {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            held: HashSet::new(),
        }
    }

    pub fn key_down(&mut self, key: &Key, repeat: bool) -> Option<ClientMsg> {
        if repeat {
            return None;
        }
        let (side, direction) = key_binding(self.role, key)?;
        if !self.held.insert(key.clone()) {
            return None;
        }
        Some(ClientMsg::start_move(side, direction))
    }

    pub fn key_up(&mut self, key: &Key) -> Option<ClientMsg> {
        let (side, _) = key_binding(self.role, key)?;
        if !self.held.remove(key) {
            return None;
        }
        Some(ClientMsg::stop_move(side))
    }
}

/// On-screen touch buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchButton {
    Up,
    Down,
}

impl TouchButton {
    pub fn direction(self) -> Direction {
        match self {
            TouchButton::Up => Direction::Up,
            TouchButton::Down => Direction::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    End,
    /// Activation without touch events, e.g. from accessibility tooling
    Click,
}

/// Touch buttons always drive a single paddle; `both` drives the left one
#[derive(Debug, Clone, Copy)]
pub struct TouchMapper {
    side: Side,
}

impl TouchMapper {
    pub fn new(role: Role) -> Self {
        let side = match role {
            Role::Right => Side::Right,
            Role::Left | Role::Both => Side::Left,
        };
        Self { side }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn touch_start(&self, button: TouchButton) -> ClientMsg {
        ClientMsg::start_move(self.side, button.direction())
    }

    pub fn touch_end(&self) -> ClientMsg {
        ClientMsg::stop_move(self.side)
    }
}

/// Flags touch-ends that follow the previous one too closely
#[derive(Debug, Default)]
pub struct DoubleTapGuard {
    last_touch_end: Option<Instant>,
}

impl DoubleTapGuard {
    /// Record a touch-end; returns `true` when its default should be suppressed
    pub fn touch_end(&mut self, now: Instant) -> bool {
        let suppress = self
            .last_touch_end
            .map(|last| now.saturating_duration_since(last) <= DOUBLE_TAP_WINDOW)
            .unwrap_or(false);
        self.last_touch_end = Some(now);
        suppress
    }
}

/// Input device, chosen once per match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Keyboard,
    Touch,
}

/// Raw input delivered by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Key {
        key: Key,
        pressed: bool,
        repeat: bool,
    },
    Touch {
        button: TouchButton,
        phase: TouchPhase,
    },
}

/// Live input attachment; dropping or detaching stops delivery
#[derive(Debug, Default)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription with nothing attached
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_attached(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Start translating `events` into intents on `conn`.
///
/// Keyboard and touch are exclusive: events of the other kind are dropped.
/// Touch mode without touch controls attaches nothing.
pub fn attach_input(
    mode: InputMode,
    role: Role,
    conn: ConnectionHandle,
    events: mpsc::UnboundedReceiver<InputEvent>,
    touch_controls_available: bool,
) -> Subscription {
    let task = match mode {
        InputMode::Keyboard => tokio::spawn(run_keyboard(role, conn, events)),
        InputMode::Touch => {
            if !touch_controls_available {
                error!(connection_id = conn.id(), "Touch controls missing, input not attached");
                return Subscription::none();
            }
            tokio::spawn(run_touch(role, conn, events))
        }
    };
    debug!(mode = ?mode, role = role.as_str(), "Input attached");
    Subscription { task: Some(task) }
}

async fn run_keyboard(
    role: Role,
    conn: ConnectionHandle,
    mut events: mpsc::UnboundedReceiver<InputEvent>,
) {
    let mut mapper = KeyboardMapper::new(role);
    while let Some(event) = events.recv().await {
        let InputEvent::Key {
            key,
            pressed,
            repeat,
        } = event
        else {
            continue;
        };
        let msg = if pressed {
            mapper.key_down(&key, repeat)
        } else {
            mapper.key_up(&key)
        };
        if let Some(msg) = msg {
            conn.send(&msg);
        }
    }
}

async fn run_touch(
    role: Role,
    conn: ConnectionHandle,
    mut events: mpsc::UnboundedReceiver<InputEvent>,
) {
    let mapper = TouchMapper::new(role);
    let mut guard = DoubleTapGuard::default();
    // Dropped with this task, which aborts any pending release
    let mut releases = JoinSet::new();

    while let Some(event) = events.recv().await {
        let InputEvent::Touch { button, phase } = event else {
            continue;
        };
        match phase {
            TouchPhase::Start => {
                conn.send(&mapper.touch_start(button));
            }
            TouchPhase::End => {
                if guard.touch_end(Instant::now()) {
                    debug!("Double tap suppressed");
                }
                conn.send(&mapper.touch_end());
            }
            TouchPhase::Click => {
                conn.send(&mapper.touch_start(button));
                let conn = conn.clone();
                let stop = mapper.touch_end();
                releases.spawn(async move {
                    tokio::time::sleep(CLICK_RELEASE_DELAY).await;
                    conn.send(&stop);
                });
            }
        }
    }
}
