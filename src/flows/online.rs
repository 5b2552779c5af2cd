//! Online games: invitations, polling, joining a side

use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{check_game_status, report_api_error, start_action, GameOutcome, StartKind};
use crate::api::{ApiError, GameParameters, InvitationStatus};
use crate::app::ClientContext;
use crate::render::StatusLevel;
use crate::ws::protocol::{Role, Side};

#[derive(Debug, thiserror::Error)]
pub enum OnlineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invitation declined")]
    Declined,

    #[error("Invitation expired")]
    Expired,

    #[error("Invitation accepted without a game session")]
    MissingSession,

    #[error("Left the page while waiting")]
    Cancelled,
}

/// Create an online game waiting for an opponent
pub async fn create_online_game(ctx: &ClientContext, params: GameParameters) -> Result<Uuid, ApiError> {
    let game_id = ctx
        .api
        .create_online_game(params, ctx.config.touch)
        .await
        .map_err(|e| report_api_error(ctx, "Online game creation", e))?;
    info!(%game_id, "Online game created");
    Ok(game_id)
}

/// Wait for an invitation to be answered; returns the session to join.
///
/// Polls every `every`, the first check one period after the call. Leaving
/// the page stops the wait.
pub async fn poll_invitation(
    ctx: &ClientContext,
    invitation_id: Uuid,
    every: Duration,
) -> Result<Uuid, OnlineError> {
    let every = every.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if ctx.tournament_cancel.is_cancelled() {
            return Err(OnlineError::Cancelled);
        }

        let check = match ctx.api.check_invitation_status(invitation_id).await {
            Ok(check) => check,
            Err(e) => {
                error!(%invitation_id, error = %e, "Invitation status check failed");
                return Err(e.into());
            }
        };

        match check.invitation_status {
            InvitationStatus::Pending => {
                debug!(%invitation_id, "Invitation still pending");
            }
            InvitationStatus::Accepted => {
                info!(%invitation_id, "Invitation accepted");
                return check.session_id.ok_or(OnlineError::MissingSession);
            }
            InvitationStatus::Rejected => {
                ctx.sink.show_status("Invitation declined", StatusLevel::Error);
                return Err(OnlineError::Declined);
            }
            InvitationStatus::Expired => {
                ctx.sink.show_status("Invitation expired", StatusLevel::Error);
                return Err(OnlineError::Expired);
            }
            InvitationStatus::Other => {
                warn!(%invitation_id, "Unknown invitation status");
            }
        }
    }
}

/// Invite a friend to `game_id`, wait for the answer, then play as left
pub async fn invite_friend(
    ctx: &ClientContext,
    game_id: Uuid,
    friend_username: &str,
) -> Result<GameOutcome, OnlineError> {
    ctx.tournament_cancel.reset();

    let invitation_id = ctx
        .api
        .send_invitation(friend_username, game_id)
        .await
        .map_err(|e| report_api_error(ctx, "Invitation", e))?;
    info!(%invitation_id, friend = friend_username, "Invitation sent");

    let session_id = poll_invitation(ctx, invitation_id, ctx.config.invite_poll_interval).await?;
    join_online_game(ctx, Side::Left, session_id).await
}

/// Accept a received invitation and play as right
pub async fn accept_invitation(ctx: &ClientContext, invitation_id: Uuid) -> Result<GameOutcome, OnlineError> {
    let session_id = ctx
        .api
        .accept_invitation(invitation_id)
        .await
        .map_err(|e| report_api_error(ctx, "Accepting the invitation", e))?;
    info!(%invitation_id, %session_id, "Invitation accepted, joining");
    join_online_game(ctx, Side::Right, session_id).await
}

pub async fn decline_invitation(ctx: &ClientContext, invitation_id: Uuid) -> Result<(), ApiError> {
    ctx.api
        .reject_invitation(invitation_id)
        .await
        .map_err(|e| report_api_error(ctx, "Declining the invitation", e))?;
    info!(%invitation_id, "Invitation declined");
    Ok(())
}

/// Take `side` in an online game and play it
pub async fn join_online_game(ctx: &ClientContext, side: Side, game_id: Uuid) -> Result<GameOutcome, OnlineError> {
    ctx.api
        .join_online_game(side, game_id, ctx.config.touch)
        .await
        .map_err(|e| report_api_error(ctx, "Joining the game", e))?;

    let role = match side {
        Side::Left => Role::Left,
        Side::Right => Role::Right,
    };
    let start = start_action(&ctx.api, StartKind::Online, game_id, role);
    let end = ctx.play_match(game_id, role, Some(start)).await;
    Ok(check_game_status(ctx, game_id, end).await)
}
