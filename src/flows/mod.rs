//! Match flows: create a session over HTTP, play it live, check how it ended

pub mod online;

pub use online::{
    accept_invitation, create_online_game, decline_invitation, invite_friend, join_online_game,
    poll_invitation, OnlineError,
};

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiError, GameParameters, SessionStatus, TournamentForm};
use crate::app::ClientContext;
use crate::lifecycle::{MatchEnd, StartAction};
use crate::render::StatusLevel;
use crate::tournament::{
    MatchRunner, TournamentOrchestrator, TournamentOutcome, TournamentStep,
};
use crate::ws::protocol::Role;

/// Which endpoint the start button calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    Local,
    Online,
    Tournament,
}

/// Start action posting `role` to the matching `start_*` endpoint for `game_id`
pub fn start_action(api: &ApiClient, kind: StartKind, game_id: Uuid, role: Role) -> StartAction {
    let api = api.clone();
    Arc::new(move || {
        let api = api.clone();
        async move {
            let result = match kind {
                StartKind::Local => api.start_local_game(game_id, role).await,
                StartKind::Online => api.start_online_game(game_id, role).await,
                StartKind::Tournament => api.start_tournament_game_session(game_id, role).await,
            };
            if let Err(e) = result {
                error!(%game_id, ?kind, role = role.as_str(), error = %e, "Start request failed");
            }
        }
        .boxed()
    })
}

/// How a played game ended according to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    Finished { game_id: Uuid, end: MatchEnd },
    /// A player left and the server cancelled the session
    Cancelled { game_id: Uuid },
    /// The session ended in some other state
    Unfinished { game_id: Uuid, status: SessionStatus },
    /// The status check itself failed
    Lost { game_id: Uuid },
}

/// Query the session status after a match and report it to the user
pub async fn check_game_status(ctx: &ClientContext, game_id: Uuid, end: MatchEnd) -> GameOutcome {
    match ctx.api.game_status(game_id).await {
        Ok(SessionStatus::Finished) => {
            let message = match end.winner() {
                Some(winner) => format!("Game over, {winner} wins"),
                None => "Game over".to_string(),
            };
            ctx.sink.show_status(&message, StatusLevel::Success);
            GameOutcome::Finished { game_id, end }
        }
        Ok(SessionStatus::Cancelled) => {
            ctx.sink
                .show_status("A player disconnected, game cancelled", StatusLevel::Error);
            GameOutcome::Cancelled { game_id }
        }
        Ok(status) => {
            warn!(%game_id, ?status, ?end, "Game ended without finishing");
            GameOutcome::Unfinished { game_id, status }
        }
        Err(e) => {
            error!(%game_id, error = %e, "Game status check failed");
            ctx.sink
                .show_status("You were disconnected from the game", StatusLevel::Error);
            GameOutcome::Lost { game_id }
        }
    }
}

/// Log and show an HTTP failure, passing it through
fn report_api_error(ctx: &ClientContext, what: &str, err: ApiError) -> ApiError {
    error!(error = %err, "{what} failed");
    ctx.sink.show_status(&err.user_message(), StatusLevel::Error);
    err
}

/// Two players on one device
pub async fn run_local_game(ctx: &ClientContext, params: GameParameters) -> Result<GameOutcome, ApiError> {
    let game_id = ctx
        .api
        .create_local_game(params, ctx.config.touch)
        .await
        .map_err(|e| report_api_error(ctx, "Local game creation", e))?;
    info!(%game_id, "Local game created");

    let start = start_action(&ctx.api, StartKind::Local, game_id, Role::Both);
    let end = ctx.play_match(game_id, Role::Both, Some(start)).await;
    Ok(check_game_status(ctx, game_id, end).await)
}

/// Plays tournament matches live on this device
pub struct LiveMatchRunner {
    ctx: ClientContext,
}

impl LiveMatchRunner {
    pub fn new(ctx: ClientContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl MatchRunner for LiveMatchRunner {
    async fn run_match(&self, game_id: Uuid) -> MatchEnd {
        let start = start_action(&self.ctx.api, StartKind::Tournament, game_id, Role::Both);
        self.ctx.play_match(game_id, Role::Both, Some(start)).await
    }
}

fn show_step(ctx: &ClientContext, step: &TournamentStep) {
    match step {
        TournamentStep::BracketShown(bracket) => {
            info!(
                name = %bracket.tournament_name,
                status = ?bracket.tournament_status,
                semifinal_1 = bracket.winner_semifinal_1.as_deref().unwrap_or("-"),
                semifinal_2 = bracket.winner_semifinal_2.as_deref().unwrap_or("-"),
                champion = bracket.winner_final.as_deref().unwrap_or("-"),
                "Bracket"
            );
        }
        TournamentStep::PreviewShown(preview) => {
            ctx.sink.show_status(
                &format!(
                    "Next match ({}): {} vs {}",
                    preview.slot.as_str(),
                    preview.left.name,
                    preview.right.name
                ),
                StatusLevel::Info,
            );
        }
        TournamentStep::MatchStarted { slot, game_id } => {
            info!(%game_id, slot = slot.as_str(), "Match started");
        }
        TournamentStep::MatchEnded { slot, game_id, end } => {
            info!(%game_id, slot = slot.as_str(), ?end, "Match ended");
        }
    }
}

/// Run an existing tournament on this device until it finishes or the user
/// navigates away
pub async fn run_tournament(ctx: &ClientContext, tournament_id: Uuid) -> TournamentOutcome {
    ctx.tournament_cancel.reset();

    let observer_ctx = ctx.clone();
    let orchestrator = TournamentOrchestrator::new(
        tournament_id,
        ctx.api.clone(),
        LiveMatchRunner::new(ctx.clone()),
        ctx.tournament_cancel.clone(),
    )
    .with_delay(ctx.config.tournament_delay)
    .with_observer(Arc::new(move |step: &TournamentStep| show_step(&observer_ctx, step)));

    let outcome = orchestrator.run().await;
    match &outcome {
        TournamentOutcome::Finished => {
            ctx.sink.show_status("Tournament finished", StatusLevel::Success);
        }
        TournamentOutcome::Cancelled | TournamentOutcome::Aborted(_) => {
            ctx.sink.show_status("Tournament cancelled", StatusLevel::Error);
        }
    }
    outcome
}

/// Create a tournament, then run it
pub async fn create_and_run_tournament(
    ctx: &ClientContext,
    form: &TournamentForm,
) -> Result<TournamentOutcome, ApiError> {
    let tournament_id = ctx
        .api
        .create_tournament(form, ctx.config.touch)
        .await
        .map_err(|e| report_api_error(ctx, "Tournament creation", e))?;
    info!(%tournament_id, name = %form.name, "Tournament created");
    Ok(run_tournament(ctx, tournament_id).await)
}
