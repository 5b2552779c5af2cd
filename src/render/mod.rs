//! Frame composition and the surfaces frames are drawn to

pub mod effects;
pub mod frame;
pub mod scheduler;
pub mod sprites;

pub use frame::{DrawCmd, Frame, Glow, SpriteId, TextAlign};
pub use scheduler::RenderLoop;
pub use sprites::SpriteAtlas;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::game::effects::{CollisionEffect, BUMPER_BLUE};
use crate::game::state::{MatchView, BORDER_INSET, COURT_HEIGHT, COURT_WIDTH};
use crate::ws::protocol::Side;

pub const BACKGROUND: &str = "#101A32";
pub const FLASH_FILL: &str = "#FFFFFF";
const DIM_FILL: &str = "rgba(0, 0, 0, 0.5)";
const GLOW_BLUR: f64 = 10.0;
const LABEL_FONT: &str = "bold 25px Arial";
const OVERLAY_FONT: &str = "bold 80px Arial";
const LABEL_MARGIN: f64 = 20.0;
const LABEL_TOP: f64 = 60.0;
const LABEL_STEP: f64 = 20.0;

/// Severity of a user-visible status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Error,
}

/// Display surface of a match: canvas, score label, controls, status line.
///
/// Implementations use interior mutability; the render loop and the
/// lifecycle controller share one sink.
pub trait FrameSink: Send + Sync + 'static {
    fn present(&self, frame: &Frame);

    fn set_score_label(&self, text: &str);

    fn set_start_button_active(&self, _active: bool) {}

    fn has_touch_controls(&self) -> bool {
        false
    }

    fn has_start_button(&self) -> bool {
        false
    }

    fn show_status(&self, message: &str, level: StatusLevel);
}

/// Compose one frame from the current view.
///
/// Layer order: background or flash, court border, paddles, ball, orbs,
/// bumpers, active-effect labels, transient effects, countdown overlay,
/// score overlay. A flash replaces the court layers.
pub fn compose_frame(
    view: &MatchView,
    effects: &[CollisionEffect],
    atlas: &SpriteAtlas,
    now: Instant,
) -> Frame {
    let game = &view.game;
    let mut frame = Frame {
        commands: Vec::with_capacity(16 + effects.len() * 8),
        score_label: game.score_label(),
    };

    if view.flashing() {
        frame.push(DrawCmd::fill_rect(0.0, 0.0, COURT_WIDTH, COURT_HEIGHT, FLASH_FILL));
    } else {
        frame.push(DrawCmd::fill_rect(0.0, 0.0, COURT_WIDTH, COURT_HEIGHT, BACKGROUND));
        frame.push(DrawCmd::StrokeRect {
            x: BORDER_INSET,
            y: BORDER_INSET,
            w: COURT_WIDTH - 2.0 * BORDER_INSET,
            h: COURT_HEIGHT - 2.0 * BORDER_INSET,
            color: "white".into(),
            line_width: 2.0,
        });

        for side in [Side::Left, Side::Right] {
            let glow = view
                .effects
                .side(side)
                .last()
                .map(|kind| Glow::new(kind.color(), GLOW_BLUR));
            let (x, y, h) = match side {
                Side::Left => (BORDER_INSET, game.paddle_left_y, game.paddle_left_height),
                Side::Right => (
                    COURT_WIDTH - BORDER_INSET - game.paddle_width,
                    game.paddle_right_y,
                    game.paddle_right_height,
                ),
            };
            frame.push(DrawCmd::FillRect {
                x,
                y,
                w: game.paddle_width,
                h,
                color: "white".into(),
                alpha: 1.0,
                glow,
            });
        }

        frame.push(DrawCmd::FillCircle {
            x: game.ball_x,
            y: game.ball_y,
            radius: game.ball_size,
            color: "white".into(),
            alpha: 1.0,
        });

        for orb in &game.powerups {
            frame.push(DrawCmd::Sprite {
                sprite: atlas.powerup_sprite(orb.kind),
                x: orb.x - 15.0,
                y: orb.y - 15.0,
                w: 30.0,
                h: 30.0,
                glow: Some(Glow::new(orb.kind.color(), GLOW_BLUR)),
            });
        }

        for bumper in &game.bumpers {
            frame.push(DrawCmd::Sprite {
                sprite: SpriteId::Bumper,
                x: bumper.x - bumper.size,
                y: bumper.y - bumper.size,
                w: bumper.size * 2.0,
                h: bumper.size * 2.0,
                glow: Some(Glow::new(BUMPER_BLUE, GLOW_BLUR)),
            });
        }
    }

    push_effect_labels(&mut frame, view);

    for effect in effects {
        frame.extend(effects::effect_shapes(effect, effect.progress(now)));
    }

    if let Some(countdown) = game.countdown {
        push_overlay(&mut frame, countdown.to_string(), "white", "rgba(255, 255, 255, 0.8)");
    }
    if let Some(msg) = &game.score_msg {
        push_overlay(&mut frame, msg.clone(), "yellow", "rgba(255, 255, 0, 0.8)");
    }

    frame
}

fn push_effect_labels(frame: &mut Frame, view: &MatchView) {
    for side in [Side::Left, Side::Right] {
        let (x, align) = match side {
            Side::Left => (LABEL_MARGIN, TextAlign::Left),
            Side::Right => (COURT_WIDTH - LABEL_MARGIN, TextAlign::Right),
        };
        let mut y = LABEL_TOP;
        for kind in view.effects.side(side) {
            let Some(label) = kind.label() else {
                continue;
            };
            frame.push(DrawCmd::Text {
                text: label.to_string(),
                x,
                y,
                font: LABEL_FONT.into(),
                color: kind.color().into(),
                align,
                glow: None,
            });
            y += LABEL_STEP;
        }
    }
}

fn push_overlay(frame: &mut Frame, text: String, color: &str, glow: &str) {
    frame.push(DrawCmd::FillRect {
        x: 0.0,
        y: 0.0,
        w: COURT_WIDTH,
        h: COURT_HEIGHT,
        color: DIM_FILL.into(),
        alpha: 1.0,
        glow: None,
    });
    frame.push(DrawCmd::Text {
        text,
        x: COURT_WIDTH / 2.0,
        y: COURT_HEIGHT / 3.0,
        font: OVERLAY_FONT.into(),
        color: color.into(),
        align: TextAlign::Center,
        glow: Some(Glow::new(glow, 20.0)),
    });
}

/// Sink that keeps everything it is given; handy for headless runs and tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Recorded>,
    touch_controls: bool,
    start_button: bool,
}

#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub frames: Vec<Frame>,
    pub score_label: String,
    pub start_button_active: Option<bool>,
    pub statuses: Vec<(String, StatusLevel)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controls(touch_controls: bool, start_button: bool) -> Self {
        Self {
            touch_controls,
            start_button,
            ..Self::default()
        }
    }

    pub fn recorded(&self) -> Recorded {
        self.inner.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.inner.lock().frames.last().cloned()
    }
}

impl FrameSink for RecordingSink {
    fn present(&self, frame: &Frame) {
        self.inner.lock().frames.push(frame.clone());
    }

    fn set_score_label(&self, text: &str) {
        self.inner.lock().score_label = text.to_string();
    }

    fn set_start_button_active(&self, active: bool) {
        self.inner.lock().start_button_active = Some(active);
    }

    fn has_touch_controls(&self) -> bool {
        self.touch_controls
    }

    fn has_start_button(&self) -> bool {
        self.start_button
    }

    fn show_status(&self, message: &str, level: StatusLevel) {
        self.inner.lock().statuses.push((message.to_string(), level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::{EffectKind, WHITE};
    use crate::game::state::{Bumper, PowerupOrb};
    use crate::ws::protocol::PowerupKind;
    use std::time::Duration;

    fn view() -> MatchView {
        MatchView::default()
    }

    #[test]
    fn default_view_draws_court_paddles_and_ball() {
        let frame = compose_frame(&view(), &[], &SpriteAtlas::load(), Instant::now());
        assert_eq!(frame.score_label, " 0 - 0 ");
        assert_eq!(frame.commands[0], DrawCmd::fill_rect(0.0, 0.0, 800.0, 400.0, BACKGROUND));
        assert!(matches!(
            frame.commands[1],
            DrawCmd::StrokeRect { x, y, w, h, .. } if (x, y, w, h) == (50.0, 50.0, 700.0, 300.0)
        ));
        assert!(matches!(
            frame.commands[3],
            DrawCmd::FillRect { x, glow: None, .. } if x == 740.0
        ));
        assert!(matches!(frame.commands[4], DrawCmd::FillCircle { radius, .. } if radius == 7.0));
        assert_eq!(frame.commands.len(), 5);
    }

    #[test]
    fn flash_replaces_court_layers() {
        let mut v = view();
        v.effects.flash = true;
        v.game.powerups.push(PowerupOrb {
            x: 10.0,
            y: 10.0,
            kind: PowerupKind::Ice,
        });
        let frame = compose_frame(&v, &[], &SpriteAtlas::load(), Instant::now());
        assert_eq!(frame.commands, vec![DrawCmd::fill_rect(0.0, 0.0, 800.0, 400.0, FLASH_FILL)]);
    }

    #[test]
    fn sprites_are_centered_on_their_objects() {
        let mut v = view();
        v.game.powerups.push(PowerupOrb {
            x: 100.0,
            y: 120.0,
            kind: PowerupKind::Other,
        });
        v.game.bumpers.push(Bumper {
            x: 400.0,
            y: 200.0,
            size: 20.0,
        });
        let frame = compose_frame(&v, &[], &SpriteAtlas::load(), Instant::now());
        let sprites: Vec<_> = frame
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Sprite { sprite, x, y, w, .. } => Some((*sprite, *x, *y, *w)),
                _ => None,
            })
            .collect();
        assert_eq!(
            sprites,
            vec![
                (SpriteId::Powerup(PowerupKind::Speed), 85.0, 105.0, 30.0),
                (SpriteId::Bumper, 380.0, 180.0, 40.0),
            ]
        );
    }

    #[test]
    fn labels_and_paddle_glow_follow_active_effects() {
        let mut v = view();
        v.effects.left.insert(PowerupKind::Speed);
        v.effects.left.insert(PowerupKind::Sticky);
        v.effects.right.insert(PowerupKind::Shrink);

        let frame = compose_frame(&v, &[], &SpriteAtlas::load(), Instant::now());
        assert_eq!(frame.texts(), vec!["SPEED", "STICKY", "SHRINK"]);
        assert!(matches!(
            &frame.commands[2],
            DrawCmd::FillRect { glow: Some(g), .. } if g.color == PowerupKind::Sticky.color()
        ));
        let ys: Vec<_> = frame
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCmd::Text { y, align, .. } => Some((*y, *align)),
                _ => None,
            })
            .collect();
        assert_eq!(
            ys,
            vec![(60.0, TextAlign::Left), (80.0, TextAlign::Left), (60.0, TextAlign::Right)]
        );
    }

    #[test]
    fn most_recent_effect_wins_the_glow() {
        let mut v = view();
        v.effects.left.insert(PowerupKind::Sticky);
        v.effects.left.insert(PowerupKind::Speed);

        let frame = compose_frame(&v, &[], &SpriteAtlas::load(), Instant::now());
        assert_eq!(frame.texts(), vec!["STICKY", "SPEED"]);
        assert!(matches!(
            &frame.commands[2],
            DrawCmd::FillRect { glow: Some(g), .. } if g.color == PowerupKind::Speed.color()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn overlays_come_last_in_order() {
        let registry = crate::game::effects::EffectRegistry::new();
        registry.push(EffectKind::PaddleCollision, 60.0, 200.0, WHITE, None);
        tokio::time::sleep(Duration::from_millis(150)).await;

        let mut v = view();
        v.game.countdown = Some(3);
        v.game.score_msg = Some("Left scores!".into());
        let frame = compose_frame(&v, &registry.snapshot(), &SpriteAtlas::load(), Instant::now());

        assert_eq!(frame.texts(), vec!["3", "Left scores!"]);
        let n = frame.commands.len();
        assert!(matches!(
            &frame.commands[n - 5],
            DrawCmd::StrokeCircle { alpha, .. } if *alpha == 0.5
        ));
        assert!(matches!(&frame.commands[n - 1], DrawCmd::Text { color, .. } if color == "yellow"));
    }
}
