//! Renderable match state shared between the reconciler and the renderer

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::{PowerupKind, Side};

/// Logical court width in pixels
pub const COURT_WIDTH: f64 = 800.0;
/// Logical court height in pixels
pub const COURT_HEIGHT: f64 = 400.0;
/// Inset of the court border and of the paddles from the canvas edge
pub const BORDER_INSET: f64 = 50.0;
/// X offset of paddle collision effects from each edge
pub const PADDLE_COLLISION_OFFSET: f64 = 60.0;
/// Y of the top border collision effect
pub const BORDER_TOP_Y: f64 = 50.0;
/// Y of the bottom border collision effect
pub const BORDER_BOTTOM_Y: f64 = 350.0;

/// Powerup orb lying on the court
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerupOrb {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", default)]
    pub kind: PowerupKind,
}

/// Bumper obstacle; spawn/expire notifications omit the size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bumper {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub size: f64,
}

/// Authoritative snapshot plus the display-only overlays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    pub ball_x: f64,
    pub ball_y: f64,
    pub ball_size: f64,
    pub ball_speed_x: f64,
    pub ball_speed_y: f64,
    pub paddle_left_y: f64,
    pub paddle_right_y: f64,
    pub paddle_width: f64,
    pub paddle_left_height: f64,
    pub paddle_right_height: f64,
    pub score_left: u32,
    pub score_right: u32,
    pub powerups: Vec<PowerupOrb>,
    pub bumpers: Vec<Bumper>,
    /// Server-side flash flag
    pub flash_effect: bool,

    /// Countdown overlay, cleared by the next snapshot
    #[serde(skip)]
    pub countdown: Option<i64>,
    /// Score-event overlay, cleared by the next snapshot
    #[serde(skip)]
    pub score_msg: Option<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            ball_x: 400.0,
            ball_y: 200.0,
            ball_size: 7.0,
            ball_speed_x: 4.0,
            ball_speed_y: 4.0,
            paddle_left_y: 170.0,
            paddle_right_y: 170.0,
            paddle_width: 10.0,
            paddle_left_height: 60.0,
            paddle_right_height: 60.0,
            score_left: 0,
            score_right: 0,
            powerups: Vec::new(),
            bumpers: Vec::new(),
            flash_effect: false,
            countdown: None,
            score_msg: None,
        }
    }
}

impl GameState {
    /// Text written to the score label
    pub fn score_label(&self) -> String {
        format!(" {} - {} ", self.score_left, self.score_right)
    }
}

/// Active powerups on one side, in the order they were applied.
///
/// Re-applying a kind already present keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectSet(Vec<PowerupKind>);

impl EffectSet {
    /// Returns false if `kind` was already active
    pub fn insert(&mut self, kind: PowerupKind) -> bool {
        if self.0.contains(&kind) {
            return false;
        }
        self.0.push(kind);
        true
    }

    pub fn remove(&mut self, kind: &PowerupKind) -> bool {
        let before = self.0.len();
        self.0.retain(|k| k != kind);
        self.0.len() != before
    }

    pub fn contains(&self, kind: &PowerupKind) -> bool {
        self.0.contains(kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PowerupKind> {
        self.0.iter()
    }

    /// Most recently applied
    pub fn last(&self) -> Option<PowerupKind> {
        self.0.last().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a EffectSet {
    type Item = &'a PowerupKind;
    type IntoIter = std::slice::Iter<'a, PowerupKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Client-only powerup state the snapshot protocol does not carry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveEffects {
    pub left: EffectSet,
    pub right: EffectSet,
    /// Full-screen flash triggered by a `flash` powerup
    pub flash: bool,
}

impl ActiveEffects {
    pub fn side(&self, side: Side) -> &EffectSet {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut EffectSet {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn contains(&self, side: Side, kind: PowerupKind) -> bool {
        self.side(side).contains(&kind)
    }
}

/// Everything the renderer needs from one match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchView {
    pub game: GameState,
    pub effects: ActiveEffects,
}

impl MatchView {
    /// Flash from either the server flag or a client-side powerup
    pub fn flashing(&self) -> bool {
        self.game.flash_effect || self.effects.flash
    }
}

/// Shared handle; only the reconciler writes through it
pub type SharedView = Arc<RwLock<MatchView>>;

pub fn new_shared_view() -> SharedView {
    Arc::new(RwLock::new(MatchView::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_set_keeps_application_order() {
        let mut set = EffectSet::default();
        assert!(set.insert(PowerupKind::Sticky));
        assert!(set.insert(PowerupKind::Speed));
        assert!(!set.insert(PowerupKind::Sticky));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![PowerupKind::Sticky, PowerupKind::Speed]);
        assert_eq!(set.last(), Some(PowerupKind::Speed));

        assert!(set.remove(&PowerupKind::Speed));
        assert!(!set.remove(&PowerupKind::Speed));
        assert_eq!(set.last(), Some(PowerupKind::Sticky));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn defaults_match_court_layout() {
        let state = GameState::default();
        assert_eq!((state.ball_x, state.ball_y), (COURT_WIDTH / 2.0, COURT_HEIGHT / 2.0));
        assert_eq!(state.paddle_left_y, 170.0);
        assert_eq!(state.score_label(), " 0 - 0 ");
    }

    #[test]
    fn partial_snapshot_keeps_defaults() {
        let state: GameState = serde_json::from_str(r#"{"score_left":3}"#).unwrap();
        assert_eq!(state.score_left, 3);
        assert_eq!(state.paddle_width, 10.0);
    }

    #[test]
    fn flash_from_either_source() {
        let mut view = MatchView::default();
        assert!(!view.flashing());
        view.effects.flash = true;
        assert!(view.flashing());
        view.effects.flash = false;
        view.game.flash_effect = true;
        assert!(view.flashing());
    }
}
