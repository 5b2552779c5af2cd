//! Applies server messages to the shared match view

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::game::effects::{EffectKind, EffectRegistry, BUMPER_BLUE, WHITE};
use crate::game::state::{
    SharedView, BORDER_BOTTOM_Y, BORDER_TOP_Y, COURT_WIDTH, PADDLE_COLLISION_OFFSET,
};
use crate::game::timers::KeyedTimers;
use crate::lifecycle::MatchEnd;
use crate::ws::protocol::{BorderSide, Collision, PowerupKind, ServerMsg, Side};

/// How long a `flash` powerup whites out the screen
pub const FLASH_DURATION: Duration = Duration::from_millis(300);

/// Result of applying one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Continue,
    Terminal(MatchEnd),
}

/// Sole writer of the match view.
///
/// Snapshots replace the game state wholesale; the client-side powerup sets
/// live next to it and are never touched by a snapshot.
pub struct StateReconciler {
    view: SharedView,
    effects: EffectRegistry,
    powerup_timers: KeyedTimers<(Side, PowerupKind)>,
    flash_timer: KeyedTimers<()>,
    last_snapshot: Option<Instant>,
    snapshots_received: u64,
}

impl StateReconciler {
    pub fn new(view: SharedView, effects: EffectRegistry) -> Self {
        Self {
            view,
            effects,
            powerup_timers: KeyedTimers::new(),
            flash_timer: KeyedTimers::new(),
            last_snapshot: None,
            snapshots_received: 0,
        }
    }

    /// Parse and apply one raw frame; malformed frames are ignored
    pub fn on_message(&mut self, raw: &str) -> Reconciled {
        match ServerMsg::parse(raw) {
            Ok(msg) => self.apply(msg),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed server message");
                Reconciled::Continue
            }
        }
    }

    pub fn apply(&mut self, msg: ServerMsg) -> Reconciled {
        match msg {
            ServerMsg::GameState(state) => {
                self.view.write().game = state;
                self.last_snapshot = Some(Instant::now());
                self.snapshots_received += 1;
            }
            ServerMsg::PowerupSpawned { powerup } => {
                self.effects.push(
                    EffectKind::PowerupSpawn,
                    powerup.x,
                    powerup.y,
                    powerup.kind.color(),
                    Some(powerup.kind),
                );
            }
            ServerMsg::PowerupExpired { powerup } => {
                self.effects.push(
                    EffectKind::PowerupExpire,
                    powerup.x,
                    powerup.y,
                    WHITE,
                    Some(powerup.kind),
                );
            }
            ServerMsg::BumperSpawned { bumper } => {
                self.effects
                    .push(EffectKind::BumperSpawn, bumper.x, bumper.y, BUMPER_BLUE, None);
            }
            ServerMsg::BumperExpired { bumper } => {
                self.effects
                    .push(EffectKind::BumperExpire, bumper.x, bumper.y, BUMPER_BLUE, None);
            }
            ServerMsg::Countdown { countdown_nb } => {
                self.view.write().game.countdown = Some(countdown_nb);
            }
            ServerMsg::Scored { score_msg } => {
                self.view.write().game.score_msg = Some(score_msg);
            }
            ServerMsg::CollisionEvent { collision } => self.on_collision(collision),
            ServerMsg::PowerupApplied {
                player,
                effect,
                duration,
            } => self.on_powerup_applied(player, effect, duration),
            ServerMsg::GameOver { winner } => {
                return Reconciled::Terminal(MatchEnd::GameOver { winner });
            }
            ServerMsg::GameAborted { winner } => {
                return Reconciled::Terminal(MatchEnd::Aborted { winner });
            }
            ServerMsg::Unknown => {
                debug!("Ignoring unknown server message type");
            }
        }
        Reconciled::Continue
    }

    fn on_collision(&self, collision: Collision) {
        let (ball_x, ball_y) = {
            let view = self.view.read();
            (view.game.ball_x, view.game.ball_y)
        };

        match collision {
            Collision::PaddleCollision { paddle_side } => {
                let x = match paddle_side {
                    Some(Side::Left) => PADDLE_COLLISION_OFFSET,
                    _ => COURT_WIDTH - PADDLE_COLLISION_OFFSET,
                };
                self.effects
                    .push(EffectKind::PaddleCollision, x, ball_y, WHITE, None);
            }
            Collision::BorderCollision {
                border_side,
                coor_x_collision,
            } => {
                let y = match border_side {
                    Some(BorderSide::Up) => BORDER_TOP_Y,
                    _ => BORDER_BOTTOM_Y,
                };
                self.effects.push(
                    EffectKind::BorderCollision,
                    coor_x_collision.unwrap_or(ball_x),
                    y,
                    WHITE,
                    None,
                );
            }
            Collision::BumperCollision { bumper_x, bumper_y } => {
                self.effects.push(
                    EffectKind::BumperCollision,
                    bumper_x.unwrap_or(ball_x),
                    bumper_y.unwrap_or(ball_y),
                    BUMPER_BLUE,
                    None,
                );
            }
            Collision::Unknown => debug!("Ignoring unknown collision type"),
        }
    }

    fn on_powerup_applied(&self, player: Side, effect: PowerupKind, duration_secs: f64) {
        if effect == PowerupKind::Flash {
            self.view.write().effects.flash = true;
            let view = self.view.clone();
            self.flash_timer.schedule((), FLASH_DURATION, move || {
                view.write().effects.flash = false;
            });
            return;
        }

        let side = display_side(player, effect);
        self.view.write().effects.side_mut(side).insert(effect);
        debug!(player = player.as_str(), side = side.as_str(), effect = effect.as_str(), "Powerup applied");

        let view = self.view.clone();
        let lifetime = Duration::try_from_secs_f64(duration_secs).unwrap_or(Duration::ZERO);
        self.powerup_timers.schedule((side, effect), lifetime, move || {
            view.write().effects.side_mut(side).remove(&effect);
        });
    }

    /// When the last snapshot arrived
    pub fn last_snapshot(&self) -> Option<Instant> {
        self.last_snapshot
    }

    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    /// Cancel every pending expiry and drop the transient effects
    pub fn shutdown(&self) {
        self.powerup_timers.cancel_all();
        self.flash_timer.cancel_all();
        self.effects.clear();
    }
}

/// Buffs show on the acting player's side, everything else on the opponent's
pub fn display_side(player: Side, effect: PowerupKind) -> Side {
    if effect.is_buff() {
        player
    } else {
        player.opposite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::new_shared_view;

    fn reconciler() -> (StateReconciler, SharedView, EffectRegistry) {
        let view = new_shared_view();
        let effects = EffectRegistry::new();
        (
            StateReconciler::new(view.clone(), effects.clone()),
            view,
            effects,
        )
    }

    const SNAPSHOT: &str = r#"{"type":"game_state","ball_x":300,"ball_y":120,"ball_size":7,
        "ball_speed_x":4,"ball_speed_y":4,"paddle_left_y":170,"paddle_right_y":170,
        "paddle_width":10,"paddle_left_height":60,"paddle_right_height":60,
        "score_left":1,"score_right":0,"powerups":[],"bumpers":[]}"#;

    #[tokio::test(start_paused = true)]
    async fn effects_survive_snapshot_replacement() {
        let (mut rec, view, _) = reconciler();
        rec.on_message(r#"{"type":"powerup_applied","player":"left","effect":"speed","duration":5}"#);
        assert!(view.read().effects.contains(Side::Left, PowerupKind::Speed));

        assert_eq!(rec.on_message(SNAPSHOT), Reconciled::Continue);
        let view = view.read();
        assert_eq!(view.game.score_left, 1);
        assert!(view.effects.contains(Side::Left, PowerupKind::Speed));
        assert_eq!(view.effects.left.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debuffs_are_shown_on_the_opponent() {
        let (mut rec, view, _) = reconciler();
        rec.on_message(r#"{"type":"powerup_applied","player":"left","effect":"shrink","duration":5}"#);
        rec.on_message(r#"{"type":"powerup_applied","player":"left","effect":"speed","duration":5}"#);
        rec.on_message(r#"{"type":"powerup_applied","player":"right","effect":"sticky","duration":5}"#);
        rec.on_message(r#"{"type":"powerup_applied","player":"right","effect":"invert","duration":5}"#);

        let view = view.read();
        assert!(view.effects.contains(Side::Right, PowerupKind::Shrink));
        assert!(!view.effects.contains(Side::Left, PowerupKind::Shrink));
        assert!(view.effects.contains(Side::Left, PowerupKind::Speed));
        assert!(view.effects.contains(Side::Right, PowerupKind::Sticky));
        assert!(view.effects.contains(Side::Left, PowerupKind::Invert));
    }

    #[tokio::test(start_paused = true)]
    async fn reapplication_resets_expiry() {
        let (mut rec, view, _) = reconciler();
        let ice = r#"{"type":"powerup_applied","player":"right","effect":"ice","duration":5}"#;

        rec.on_message(ice);
        tokio::time::sleep(Duration::from_secs(2)).await;
        rec.on_message(ice);

        // Past the first application's expiry
        tokio::time::sleep(Duration::from_millis(4_000)).await;
        assert!(view.read().effects.contains(Side::Left, PowerupKind::Ice));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert!(!view.read().effects.contains(Side::Left, PowerupKind::Ice));
        assert!(view.read().effects.left.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn flash_is_global_and_short() {
        let (mut rec, view, _) = reconciler();
        rec.on_message(r#"{"type":"powerup_applied","player":"left","effect":"flash","duration":5}"#);
        {
            let view = view.read();
            assert!(view.flashing());
            assert!(view.effects.left.is_empty());
            assert!(view.effects.right.is_empty());
        }

        tokio::time::sleep(Duration::from_millis(310)).await;
        assert!(!view.read().flashing());
    }

    #[tokio::test(start_paused = true)]
    async fn overlays_last_until_next_snapshot() {
        let (mut rec, view, _) = reconciler();
        rec.on_message(r#"{"type":"countdown","countdown_nb":3}"#);
        rec.on_message(r#"{"type":"scored","scoreMsg":"Left scores!"}"#);
        assert_eq!(view.read().game.countdown, Some(3));
        assert_eq!(view.read().game.score_msg.as_deref(), Some("Left scores!"));

        rec.on_message(SNAPSHOT);
        assert_eq!(view.read().game.countdown, None);
        assert_eq!(view.read().game.score_msg, None);
    }

    #[tokio::test(start_paused = true)]
    async fn collisions_are_positioned_from_court_geometry() {
        let (mut rec, _, effects) = reconciler();
        rec.on_message(SNAPSHOT);
        rec.on_message(r#"{"type":"collision_event","collision":{"type":"paddle_collision","paddle_side":"right"}}"#);
        rec.on_message(r#"{"type":"collision_event","collision":{"type":"border_collision","border_side":"down","coor_x_collision":222}}"#);
        rec.on_message(r#"{"type":"collision_event","collision":{"type":"bumper_collision","bumper_x":410,"bumper_y":90}}"#);

        let live = effects.snapshot();
        assert_eq!(live.len(), 3);
        assert_eq!((live[0].kind, live[0].x, live[0].y), (EffectKind::PaddleCollision, 740.0, 120.0));
        assert_eq!((live[1].kind, live[1].x, live[1].y), (EffectKind::BorderCollision, 222.0, 350.0));
        assert_eq!((live[2].kind, live[2].x, live[2].y), (EffectKind::BumperCollision, 410.0, 90.0));
    }

    #[tokio::test(start_paused = true)]
    async fn spawn_events_never_touch_the_snapshot() {
        let (mut rec, view, effects) = reconciler();
        let before = view.read().game.clone();
        rec.on_message(r#"{"type":"powerup_spawned","powerup":{"x":100,"y":100,"type":"ice"}}"#);
        rec.on_message(r#"{"type":"bumper_expired","bumper":{"x":200,"y":150}}"#);

        assert_eq!(view.read().game, before);
        let live = effects.snapshot();
        assert_eq!(live[0].color, "#00FFFF");
        assert_eq!(live[1].kind, EffectKind::BumperExpire);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(effects.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_and_ignored_messages() {
        let (mut rec, _, _) = reconciler();
        assert_eq!(rec.on_message(r#"{"type":"mystery"}"#), Reconciled::Continue);
        assert_eq!(rec.on_message("{not json"), Reconciled::Continue);
        assert_eq!(
            rec.on_message(r#"{"type":"game_over","winner":"left"}"#),
            Reconciled::Terminal(MatchEnd::GameOver {
                winner: Some("left".into())
            })
        );
        assert_eq!(
            rec.on_message(r#"{"type":"game_aborted"}"#),
            Reconciled::Terminal(MatchEnd::Aborted { winner: None })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_expiries() {
        let (mut rec, view, effects) = reconciler();
        rec.on_message(r#"{"type":"powerup_applied","player":"left","effect":"ice","duration":1}"#);
        rec.on_message(r#"{"type":"bumper_spawned","bumper":{"x":1,"y":1}}"#);
        rec.shutdown();
        assert!(effects.is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        // Expiry was cancelled, so the tag is left as-is for the final frame
        assert!(view.read().effects.contains(Side::Right, PowerupKind::Ice));
    }

    #[test]
    fn display_side_partition() {
        assert_eq!(display_side(Side::Left, PowerupKind::Shrink), Side::Right);
        assert_eq!(display_side(Side::Left, PowerupKind::Speed), Side::Left);
        assert_eq!(display_side(Side::Right, PowerupKind::Other), Side::Left);
    }
}
