//! Bracket and next-match payloads, plus preview resolution

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Avatar shown when a player has no entry in the avatar map
pub const DEFAULT_AVATAR: &str = "/static/svg/default_avatar.svg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    #[default]
    Pending,
    Semifinal1InProgress,
    Semifinal1Done,
    Semifinal2InProgress,
    Semifinal2Done,
    FinalInProgress,
    Finished,
    #[serde(other)]
    Other,
}

/// Current standings of a four-player tournament
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Bracket {
    #[serde(default)]
    pub tournament_name: String,
    #[serde(default)]
    pub tournament_status: TournamentStatus,
    #[serde(default)]
    pub player1: String,
    #[serde(default)]
    pub player2: String,
    #[serde(default)]
    pub player3: String,
    #[serde(default)]
    pub player4: String,
    #[serde(default)]
    pub winner_semifinal_1: Option<String>,
    #[serde(default)]
    pub winner_semifinal_2: Option<String>,
    #[serde(default)]
    pub winner_final: Option<String>,
    #[serde(default)]
    pub player_avatars: HashMap<String, String>,
}

impl Bracket {
    pub fn is_finished(&self) -> bool {
        self.tournament_status == TournamentStatus::Finished
    }

    pub fn avatar(&self, player: &str) -> &str {
        self.player_avatars
            .get(player)
            .map(String::as_str)
            .unwrap_or(DEFAULT_AVATAR)
    }
}

/// `next_match_type` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSlot {
    Semifinal1,
    Semifinal2,
    Final,
    Finished,
    #[serde(other)]
    Other,
}

impl MatchSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchSlot::Semifinal1 => "semifinal1",
            MatchSlot::Semifinal2 => "semifinal2",
            MatchSlot::Final => "final",
            MatchSlot::Finished => "finished",
            MatchSlot::Other => "other",
        }
    }

    /// A slot a session can be created for
    pub fn is_playable(self) -> bool {
        matches!(self, MatchSlot::Semifinal1 | MatchSlot::Semifinal2 | MatchSlot::Final)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct NextMatch {
    pub next_match_type: MatchSlot,
}

/// One side of a match preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPlayer {
    pub name: String,
    pub avatar: String,
}

/// Who plays the upcoming match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPreview {
    pub slot: MatchSlot,
    pub left: PreviewPlayer,
    pub right: PreviewPlayer,
}

impl MatchPreview {
    /// Resolve the players of `slot` from the bracket.
    ///
    /// Returns `None` for slots nobody plays. Final players not yet known
    /// show as `???` with the default avatar.
    pub fn resolve(bracket: &Bracket, slot: MatchSlot) -> Option<Self> {
        let (left, right) = match slot {
            MatchSlot::Semifinal1 => (Some(&bracket.player1), Some(&bracket.player2)),
            MatchSlot::Semifinal2 => (Some(&bracket.player3), Some(&bracket.player4)),
            MatchSlot::Final => (
                bracket.winner_semifinal_1.as_ref(),
                bracket.winner_semifinal_2.as_ref(),
            ),
            MatchSlot::Finished | MatchSlot::Other => return None,
        };

        let player = |name: Option<&String>| match name.filter(|n| !n.is_empty()) {
            Some(name) => PreviewPlayer {
                name: name.clone(),
                avatar: bracket.avatar(name).to_string(),
            },
            None => PreviewPlayer {
                name: "???".to_string(),
                avatar: DEFAULT_AVATAR.to_string(),
            },
        };

        Some(Self {
            slot,
            left: player(left),
            right: player(right),
        })
    }
}
