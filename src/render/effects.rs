//! Shapes for transient effects, parameterised by progress in `[0, 1]`

use std::f64::consts::{PI, TAU};

use crate::game::effects::{CollisionEffect, EffectKind, BUMPER_BLUE};
use crate::render::frame::DrawCmd;

fn ring_point(x: f64, y: f64, index: usize, count: usize, distance: f64) -> (f64, f64) {
    let angle = (index as f64 / count as f64) * TAU;
    (x + angle.cos() * distance, y + angle.sin() * distance)
}

fn dot(center: (f64, f64), color: &str, alpha: f64) -> DrawCmd {
    DrawCmd::FillCircle {
        x: center.0,
        y: center.1,
        radius: 2.0,
        color: color.to_string(),
        alpha,
    }
}

/// Draw commands for `effect` at `progress`; progress is clamped first
pub fn effect_shapes(effect: &CollisionEffect, progress: f64) -> Vec<DrawCmd> {
    let p = progress.clamp(0.0, 1.0);
    let alpha = 1.0 - p;
    let (x, y) = (effect.x, effect.y);
    let color = effect.color.as_str();

    match effect.kind {
        // Ripple
        EffectKind::PaddleCollision => vec![DrawCmd::StrokeCircle {
            x,
            y,
            radius: 20.0 + p * 40.0,
            color: color.to_string(),
            line_width: 3.0 * (1.0 - p),
            alpha,
        }],

        // Fading glow on the border
        EffectKind::BorderCollision => vec![DrawCmd::FillCircle {
            x,
            y,
            radius: 20.0 * (1.0 - p),
            color: color.to_string(),
            alpha: alpha * alpha,
        }],

        // Particle burst
        EffectKind::BumperCollision => (0..8)
            .map(|i| DrawCmd::Line {
                from: ring_point(x, y, i, 8, 10.0),
                to: ring_point(x, y, i, 8, 30.0 * p),
                color: BUMPER_BLUE.to_string(),
                line_width: 3.0 * (1.0 - p),
                alpha,
            })
            .collect(),

        // Expanding rings plus sparkles
        EffectKind::PowerupSpawn => {
            let mut cmds: Vec<DrawCmd> = (0..3)
                .map(|i| DrawCmd::StrokeCircle {
                    x,
                    y,
                    radius: ((p + i as f64 / 3.0) % 1.0) * 40.0,
                    color: color.to_string(),
                    line_width: 2.0,
                    alpha,
                })
                .collect();
            cmds.extend((0..8).map(|i| dot(ring_point(x, y, i, 8, 20.0 + p * 20.0), color, alpha)));
            cmds
        }

        // Imploding circle with inward particles
        EffectKind::PowerupExpire => {
            let radius = 20.0 * (1.0 - p);
            let mut cmds = vec![DrawCmd::StrokeCircle {
                x,
                y,
                radius,
                color: color.to_string(),
                line_width: 2.0 * (1.0 - p),
                alpha,
            }];
            cmds.extend((0..6).map(|i| dot(ring_point(x, y, i, 6, radius * 2.0 * p), color, alpha)));
            cmds
        }

        // Two diamonds rotating half a turn
        EffectKind::BumperSpawn => {
            let rotation = p * PI;
            [40.0 * p, 60.0 * p]
                .into_iter()
                .map(|size| DrawCmd::Polygon {
                    points: diamond(x, y, size, rotation),
                    color: BUMPER_BLUE.to_string(),
                    line_width: 2.0,
                    alpha,
                })
                .collect()
        }

        // Dissolving rings, each shedding square particles
        EffectKind::BumperExpire => {
            let mut cmds = Vec::with_capacity(3 * 9);
            for i in 0..3 {
                let radius = 20.0 * ((p + i as f64 / 3.0) % 1.0);
                cmds.push(DrawCmd::StrokeCircle {
                    x,
                    y,
                    radius,
                    color: BUMPER_BLUE.to_string(),
                    line_width: 2.0 * (1.0 - p),
                    alpha,
                });
                for j in 0..8 {
                    let (px, py) = ring_point(x, y, j, 8, radius * (1.0 + p));
                    cmds.push(DrawCmd::FillRect {
                        x: px - 1.0,
                        y: py - 1.0,
                        w: 2.0,
                        h: 2.0,
                        color: BUMPER_BLUE.to_string(),
                        alpha,
                        glow: None,
                    });
                }
            }
            cmds
        }
    }
}

fn diamond(x: f64, y: f64, size: f64, rotation: f64) -> Vec<(f64, f64)> {
    let (sin, cos) = rotation.sin_cos();
    [(0.0, -size), (size, 0.0), (0.0, size), (-size, 0.0)]
        .into_iter()
        .map(|(dx, dy)| (x + dx * cos - dy * sin, y + dx * sin + dy * cos))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::WHITE;
    use tokio::time::Instant;

    fn effect(kind: EffectKind) -> CollisionEffect {
        CollisionEffect {
            id: 1,
            kind,
            x: 100.0,
            y: 100.0,
            color: WHITE.to_string(),
            powerup: None,
            created_at: Instant::now(),
            duration: kind.duration(),
        }
    }

    fn alphas(cmds: &[DrawCmd]) -> Vec<f64> {
        cmds.iter()
            .filter_map(|c| match c {
                DrawCmd::StrokeCircle { alpha, .. }
                | DrawCmd::FillCircle { alpha, .. }
                | DrawCmd::Line { alpha, .. }
                | DrawCmd::Polygon { alpha, .. }
                | DrawCmd::FillRect { alpha, .. } => Some(*alpha),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn ripple_grows_and_fades() {
        let start = effect_shapes(&effect(EffectKind::PaddleCollision), 0.0);
        let half = effect_shapes(&effect(EffectKind::PaddleCollision), 0.5);
        match (&start[0], &half[0]) {
            (
                DrawCmd::StrokeCircle { radius: r0, alpha: a0, .. },
                DrawCmd::StrokeCircle { radius: r1, alpha: a1, line_width, .. },
            ) => {
                assert_eq!((*r0, *a0), (20.0, 1.0));
                assert_eq!((*r1, *a1, *line_width), (40.0, 0.5, 1.5));
            }
            other => panic!("expected ripples, got {other:?}"),
        }
    }

    #[test]
    fn late_samples_are_clamped() {
        for kind in [
            EffectKind::PaddleCollision,
            EffectKind::BorderCollision,
            EffectKind::BumperCollision,
            EffectKind::PowerupSpawn,
            EffectKind::PowerupExpire,
            EffectKind::BumperSpawn,
            EffectKind::BumperExpire,
        ] {
            let over = effect_shapes(&effect(kind), 7.5);
            let done = effect_shapes(&effect(kind), 1.0);
            assert_eq!(over, done, "{kind:?} overshot");
            assert!(alphas(&over).iter().all(|a| *a == 0.0));
        }
    }

    #[test]
    fn shape_counts() {
        assert_eq!(effect_shapes(&effect(EffectKind::BumperCollision), 0.3).len(), 8);
        assert_eq!(effect_shapes(&effect(EffectKind::PowerupSpawn), 0.3).len(), 3 + 8);
        assert_eq!(effect_shapes(&effect(EffectKind::PowerupExpire), 0.3).len(), 1 + 6);
        assert_eq!(effect_shapes(&effect(EffectKind::BumperSpawn), 0.3).len(), 2);
        assert_eq!(effect_shapes(&effect(EffectKind::BumperExpire), 0.3).len(), 3 * 9);
    }

    #[test]
    fn diamond_rotates_half_turn() {
        let e = effect(EffectKind::BumperSpawn);
        let DrawCmd::Polygon { points, .. } = &effect_shapes(&e, 1.0)[0] else {
            panic!("expected diamond");
        };
        // Top vertex ends up at the bottom after a rotation of PI
        assert!((points[0].0 - 100.0).abs() < 1e-9);
        assert!((points[0].1 - 140.0).abs() < 1e-9);
    }
}
