//! Live-match protocol message definitions
//! These are the wire types exchanged with the Pong match socket

use serde::{Deserialize, Serialize};

use crate::game::state::{Bumper, GameState, PowerupOrb};

/// One of the two paddles
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Which paddle(s) this client controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Left,
    Right,
    /// Local two-player match on a single device
    Both,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Left => "left",
            Role::Right => "right",
            Role::Both => "both",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Role::Left),
            "right" => Ok(Role::Right),
            "both" => Ok(Role::Both),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Paddle movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Powerup effect tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerupKind {
    Invert,
    Shrink,
    Ice,
    Speed,
    Flash,
    Sticky,
    /// Tag this client does not know how to draw
    #[serde(other)]
    Other,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 6] = [
        PowerupKind::Invert,
        PowerupKind::Shrink,
        PowerupKind::Ice,
        PowerupKind::Speed,
        PowerupKind::Flash,
        PowerupKind::Sticky,
    ];

    /// Buffs stay on the acting player's side; everything else hits the opponent.
    pub fn is_buff(self) -> bool {
        matches!(self, PowerupKind::Speed | PowerupKind::Sticky)
    }

    /// Main colour, used for glows, labels and spawn effects
    pub fn color(self) -> &'static str {
        match self {
            PowerupKind::Invert => "#FF69B4",
            PowerupKind::Shrink => "#FF0000",
            PowerupKind::Ice => "#00FFFF",
            PowerupKind::Speed => "#FFD700",
            PowerupKind::Flash => "#FFFF00",
            PowerupKind::Sticky => "#32CD32",
            PowerupKind::Other => "#FFFFFF",
        }
    }

    /// Outer gradient colour of the sprite
    pub fn glow_color(self) -> &'static str {
        match self {
            PowerupKind::Invert => "#FF1493",
            PowerupKind::Shrink => "#8B0000",
            PowerupKind::Ice => "#00CED1",
            PowerupKind::Speed => "#FFA500",
            PowerupKind::Flash => "#FFD700",
            PowerupKind::Sticky => "#228B22",
            PowerupKind::Other => "#FFA500",
        }
    }

    /// Side label shown while the effect is active
    pub fn label(self) -> Option<&'static str> {
        match self {
            PowerupKind::Speed => Some("SPEED"),
            PowerupKind::Shrink => Some("SHRINK"),
            PowerupKind::Ice => Some("ICE"),
            PowerupKind::Sticky => Some("STICKY"),
            PowerupKind::Invert => Some("INVERT"),
            PowerupKind::Flash | PowerupKind::Other => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerupKind::Invert => "invert",
            PowerupKind::Shrink => "shrink",
            PowerupKind::Ice => "ice",
            PowerupKind::Speed => "speed",
            PowerupKind::Flash => "flash",
            PowerupKind::Sticky => "sticky",
            PowerupKind::Other => "other",
        }
    }
}

impl Default for PowerupKind {
    fn default() -> Self {
        Self::Speed
    }
}

/// Court border that was hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderSide {
    Up,
    #[serde(other)]
    Down,
}

/// Collision notification payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Collision {
    PaddleCollision {
        #[serde(default)]
        paddle_side: Option<Side>,
    },
    BorderCollision {
        #[serde(default)]
        border_side: Option<BorderSide>,
        #[serde(default)]
        coor_x_collision: Option<f64>,
    },
    BumperCollision {
        #[serde(default)]
        bumper_x: Option<f64>,
        #[serde(default)]
        bumper_y: Option<f64>,
    },
    #[serde(other)]
    Unknown,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Full authoritative snapshot
    GameState(GameState),

    PowerupSpawned {
        powerup: PowerupOrb,
    },

    PowerupExpired {
        powerup: PowerupOrb,
    },

    BumperSpawned {
        bumper: Bumper,
    },

    BumperExpired {
        bumper: Bumper,
    },

    /// Pre-serve countdown
    Countdown {
        countdown_nb: i64,
    },

    /// A point was scored
    Scored {
        #[serde(rename = "scoreMsg")]
        score_msg: String,
    },

    CollisionEvent {
        collision: Collision,
    },

    /// A player picked up a powerup
    PowerupApplied {
        player: Side,
        effect: PowerupKind,
        /// Seconds
        duration: f64,
    },

    GameOver {
        #[serde(default)]
        winner: Option<String>,
    },

    GameAborted {
        #[serde(default)]
        winner: Option<String>,
    },

    /// Any `type` this client does not understand
    #[serde(other)]
    Unknown,
}

impl ServerMsg {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// `game_over` and `game_aborted` end the match
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerMsg::GameOver { .. } | ServerMsg::GameAborted { .. })
    }
}

/// Paddle intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveAction {
    StartMove,
    StopMove,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMsg {
    pub action: MoveAction,
    pub player: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl ClientMsg {
    pub fn start_move(player: Side, direction: Direction) -> Self {
        Self {
            action: MoveAction::StartMove,
            player,
            direction: Some(direction),
        }
    }

    pub fn stop_move(player: Side) -> Self {
        Self {
            action: MoveAction::StopMove,
            player,
            direction: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
