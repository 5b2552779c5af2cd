//! Typed wrappers for the `/game/` endpoints

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::client::{ApiClient, ApiError};
use crate::tournament::bracket::{Bracket, MatchSlot, NextMatch};
use crate::ws::protocol::{Role, Side};

const GAME_APP: &str = "game";

/// Match settings shared by local, online and tournament games
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameParameters {
    /// 1 slow, 2 medium, 3 fast
    pub ball_speed: u8,
    /// 1 small, 2 medium, 3 large
    pub paddle_size: u8,
    pub bonus_enabled: bool,
    pub obstacles_enabled: bool,
}

impl Default for GameParameters {
    fn default() -> Self {
        Self {
            ball_speed: 2,
            paddle_size: 2,
            bonus_enabled: true,
            obstacles_enabled: false,
        }
    }
}

impl GameParameters {
    /// Clamp both levels into 1..=3
    pub fn normalized(self) -> Self {
        Self {
            ball_speed: self.ball_speed.clamp(1, 3),
            paddle_size: self.paddle_size.clamp(1, 3),
            ..self
        }
    }

    pub fn to_form(self, is_touch: bool) -> Vec<(&'static str, String)> {
        let p = self.normalized();
        vec![
            ("ball_speed", p.ball_speed.to_string()),
            ("paddle_size", p.paddle_size.to_string()),
            ("bonus_enabled", p.bonus_enabled.to_string()),
            ("obstacles_enabled", p.obstacles_enabled.to_string()),
            ("is_touch", is_touch.to_string()),
        ]
    }
}

/// A four-player tournament to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TournamentForm {
    pub name: String,
    pub players: [String; 4],
    pub parameters: GameParameters,
}

impl TournamentForm {
    pub fn to_form(&self, is_touch: bool) -> Vec<(&'static str, String)> {
        let mut form = vec![("name", self.name.clone())];
        let keys = ["player1", "player2", "player3", "player4"];
        form.extend(keys.iter().zip(&self.players).map(|(k, p)| (*k, p.clone())));
        form.extend(self.parameters.to_form(is_touch));
        form
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvitationCheck {
    pub invitation_status: InvitationStatus,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Running,
    Finished,
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct GameCreated {
    game_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct TournamentCreated {
    tournament_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct InvitationSent {
    invitation_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct SessionRef {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct InvitationAccepted {
    session: SessionRef,
}

#[derive(Debug, Deserialize)]
struct GameStatus {
    session_status: SessionStatus,
}

fn start_form(game_id: Uuid, role: Role) -> [(&'static str, String); 2] {
    [("game_id", game_id.to_string()), ("userRole", role.as_str().to_string())]
}

impl ApiClient {
    pub async fn create_local_game(&self, params: GameParameters, is_touch: bool) -> Result<Uuid, ApiError> {
        let created: GameCreated = self
            .post_form(GAME_APP, "create_local_game", &params.to_form(is_touch))
            .await?;
        Ok(created.game_id)
    }

    pub async fn start_local_game(&self, game_id: Uuid, role: Role) -> Result<(), ApiError> {
        self.start_game("start_local_game", game_id, role).await
    }

    pub async fn create_online_game(&self, params: GameParameters, is_touch: bool) -> Result<Uuid, ApiError> {
        let created: GameCreated = self
            .post_form(GAME_APP, "create_game_online", &params.to_form(is_touch))
            .await?;
        Ok(created.game_id)
    }

    pub async fn send_invitation(&self, friend_username: &str, session_id: Uuid) -> Result<Uuid, ApiError> {
        let form = [
            ("friend_username", friend_username.to_string()),
            ("session_id", session_id.to_string()),
        ];
        let sent: InvitationSent = self
            .post_form(GAME_APP, "send_gameSession_invitation", &form)
            .await?;
        Ok(sent.invitation_id)
    }

    pub async fn check_invitation_status(&self, invitation_id: Uuid) -> Result<InvitationCheck, ApiError> {
        self.get(GAME_APP, &format!("check_invitation_status/{invitation_id}"))
            .await
    }

    /// Accept an invitation; returns the session to join
    pub async fn accept_invitation(&self, invitation_id: Uuid) -> Result<Uuid, ApiError> {
        let accepted: InvitationAccepted = self
            .post_form(GAME_APP, &format!("accept_game_invitation/{invitation_id}"), &[])
            .await?;
        Ok(accepted.session.id)
    }

    pub async fn reject_invitation(&self, invitation_id: Uuid) -> Result<(), ApiError> {
        self.post_form::<IgnoredAny>(GAME_APP, &format!("reject_game_invitation/{invitation_id}"), &[])
            .await
            .map(|_| ())
    }

    /// Take a seat in an online game; `Side::Left` is the inviter
    pub async fn join_online_game(&self, side: Side, game_id: Uuid, is_touch: bool) -> Result<(), ApiError> {
        let view = format!("join_online_game_as_{}/{game_id}", side.as_str());
        self.post_form::<IgnoredAny>(GAME_APP, &view, &[("is_touch", is_touch.to_string())])
            .await
            .map(|_| ())
    }

    /// Mark `role` ready; the server runs the game once both sides are
    pub async fn start_online_game(&self, game_id: Uuid, role: Role) -> Result<(), ApiError> {
        self.start_game("start_online_game", game_id, role).await
    }

    pub async fn create_tournament(&self, form: &TournamentForm, is_touch: bool) -> Result<Uuid, ApiError> {
        let created: TournamentCreated = self
            .post_form(GAME_APP, "create_tournament", &form.to_form(is_touch))
            .await?;
        Ok(created.tournament_id)
    }

    pub async fn tournament_bracket(&self, tournament_id: Uuid) -> Result<Bracket, ApiError> {
        self.get(GAME_APP, &format!("tournament_bracket/{tournament_id}"))
            .await
    }

    pub async fn tournament_next_game(&self, tournament_id: Uuid) -> Result<NextMatch, ApiError> {
        self.get(GAME_APP, &format!("tournament_next_game/{tournament_id}"))
            .await
    }

    pub async fn create_tournament_game_session(
        &self,
        tournament_id: Uuid,
        slot: MatchSlot,
    ) -> Result<Uuid, ApiError> {
        let created: GameCreated = self
            .post_form(
                GAME_APP,
                &format!("create_tournament_game_session/{tournament_id}"),
                &[("next_match_type", slot.as_str().to_string())],
            )
            .await?;
        Ok(created.game_id)
    }

    pub async fn start_tournament_game_session(&self, game_id: Uuid, role: Role) -> Result<(), ApiError> {
        self.start_game("start_tournament_game_session", game_id, role).await
    }

    /// Start buttons all post the game id and the pressing player's role
    async fn start_game(&self, view: &str, game_id: Uuid, role: Role) -> Result<(), ApiError> {
        self.post_form::<IgnoredAny>(GAME_APP, &format!("{view}/{game_id}"), &start_form(game_id, role))
            .await
            .map(|_| ())
    }

    pub async fn game_status(&self, game_id: Uuid) -> Result<SessionStatus, ApiError> {
        let status: GameStatus = self
            .get(GAME_APP, &format!("get_game_status/{game_id}"))
            .await?;
        Ok(status.session_status)
    }
}
