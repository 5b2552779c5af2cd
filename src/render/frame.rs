//! Backend-neutral draw commands

use crate::ws::protocol::PowerupKind;

/// Shadow glow applied to a command
#[derive(Debug, Clone, PartialEq)]
pub struct Glow {
    pub color: String,
    pub blur: f64,
}

impl Glow {
    pub fn new(color: impl Into<String>, blur: f64) -> Self {
        Self {
            color: color.into(),
            blur,
        }
    }
}

/// Pre-rendered image reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpriteId {
    Powerup(PowerupKind),
    Bumper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    /// `x` is the right edge of the text
    Right,
}

/// One drawing primitive on the 800x400 logical canvas.
///
/// Every command carries its own alpha and glow, so a backend never has to
/// track save/restore state between commands.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    FillRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
        alpha: f64,
        glow: Option<Glow>,
    },
    StrokeRect {
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        color: String,
        line_width: f64,
    },
    FillCircle {
        x: f64,
        y: f64,
        radius: f64,
        color: String,
        alpha: f64,
    },
    StrokeCircle {
        x: f64,
        y: f64,
        radius: f64,
        color: String,
        line_width: f64,
        alpha: f64,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        color: String,
        line_width: f64,
        alpha: f64,
    },
    /// Closed outline through `points`
    Polygon {
        points: Vec<(f64, f64)>,
        color: String,
        line_width: f64,
        alpha: f64,
    },
    Sprite {
        sprite: SpriteId,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        glow: Option<Glow>,
    },
    Text {
        text: String,
        x: f64,
        y: f64,
        font: String,
        color: String,
        align: TextAlign,
        glow: Option<Glow>,
    },
}

impl DrawCmd {
    pub fn fill_rect(x: f64, y: f64, w: f64, h: f64, color: impl Into<String>) -> Self {
        DrawCmd::FillRect {
            x,
            y,
            w,
            h,
            color: color.into(),
            alpha: 1.0,
            glow: None,
        }
    }
}

/// Output of one render tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub commands: Vec<DrawCmd>,
    /// Text for the score label element
    pub score_label: String,
}

impl Frame {
    pub fn push(&mut self, cmd: DrawCmd) {
        self.commands.push(cmd);
    }

    pub fn extend(&mut self, cmds: impl IntoIterator<Item = DrawCmd>) {
        self.commands.extend(cmds);
    }

    /// All text drawn on the canvas, in drawing order
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DrawCmd::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
