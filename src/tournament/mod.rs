//! Tournament orchestrator: bracket, preview, match, status check, repeat
//!
//! Runs a four-player local tournament as a sequence of live matches played
//! on one device. The only way to stop a run from outside is the
//! [`CancelFlag`], checked at every step boundary; a match in progress ends
//! only through its own completion.

pub mod bracket;

pub use bracket::{
    Bracket, MatchPreview, MatchSlot, NextMatch, PreviewPlayer, TournamentStatus, DEFAULT_AVATAR,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ApiError, SessionStatus};
use crate::lifecycle::MatchEnd;

/// Default pause between bracket/preview display and the next step
pub const DISPLAY_DELAY: Duration = Duration::from_secs(3);

/// Process-wide stop request for the running tournament
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag before a new run
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Server calls the orchestrator depends on
#[async_trait]
pub trait TournamentApi: Send + Sync {
    async fn bracket(&self, tournament_id: Uuid) -> Result<Bracket, ApiError>;
    async fn next_match(&self, tournament_id: Uuid) -> Result<NextMatch, ApiError>;
    async fn create_match(&self, tournament_id: Uuid, slot: MatchSlot) -> Result<Uuid, ApiError>;
    async fn match_status(&self, game_id: Uuid) -> Result<SessionStatus, ApiError>;
}

#[async_trait]
impl TournamentApi for ApiClient {
    async fn bracket(&self, tournament_id: Uuid) -> Result<Bracket, ApiError> {
        self.tournament_bracket(tournament_id).await
    }

    async fn next_match(&self, tournament_id: Uuid) -> Result<NextMatch, ApiError> {
        self.tournament_next_game(tournament_id).await
    }

    async fn create_match(&self, tournament_id: Uuid, slot: MatchSlot) -> Result<Uuid, ApiError> {
        self.create_tournament_game_session(tournament_id, slot).await
    }

    async fn match_status(&self, game_id: Uuid) -> Result<SessionStatus, ApiError> {
        self.game_status(game_id).await
    }
}

/// Plays one tournament match to completion
#[async_trait]
pub trait MatchRunner: Send + Sync {
    async fn run_match(&self, game_id: Uuid) -> MatchEnd;
}

/// Progress reported while a tournament runs
#[derive(Debug, Clone, PartialEq)]
pub enum TournamentStep {
    BracketShown(Bracket),
    PreviewShown(MatchPreview),
    MatchStarted { slot: MatchSlot, game_id: Uuid },
    MatchEnded { slot: MatchSlot, game_id: Uuid, end: MatchEnd },
}

pub trait TournamentObserver: Send + Sync {
    fn on_step(&self, step: &TournamentStep);
}

impl<F> TournamentObserver for F
where
    F: Fn(&TournamentStep) + Send + Sync,
{
    fn on_step(&self, step: &TournamentStep) {
        self(step)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TournamentError {
    #[error("Tournament request failed: {0}")]
    Api(#[from] ApiError),

    #[error("Next match type {0:?} cannot be played")]
    UnexpectedSlot(MatchSlot),

    #[error("Match {game_id} ended as {status:?} instead of finished")]
    MatchNotFinished { game_id: Uuid, status: SessionStatus },
}

#[derive(Debug)]
pub enum TournamentOutcome {
    /// Bracket or next match reported the tournament finished
    Finished,
    /// The cancel flag was observed at a step boundary
    Cancelled,
    Aborted(TournamentError),
}

impl TournamentOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, TournamentOutcome::Finished)
    }
}

pub struct TournamentOrchestrator<A, R> {
    tournament_id: Uuid,
    api: A,
    runner: R,
    cancel: CancelFlag,
    delay: Duration,
    observer: Option<Arc<dyn TournamentObserver>>,
}

impl<A, R> TournamentOrchestrator<A, R>
where
    A: TournamentApi,
    R: MatchRunner,
{
    pub fn new(tournament_id: Uuid, api: A, runner: R, cancel: CancelFlag) -> Self {
        Self {
            tournament_id,
            api,
            runner,
            cancel,
            delay: DISPLAY_DELAY,
            observer: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TournamentObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn report(&self, step: TournamentStep) {
        if let Some(observer) = &self.observer {
            observer.on_step(&step);
        }
    }

    fn cancelled(&self) -> bool {
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!(tournament_id = %self.tournament_id, "Tournament cancelled");
        }
        cancelled
    }

    fn abort(&self, err: TournamentError) -> TournamentOutcome {
        error!(tournament_id = %self.tournament_id, error = %err, "Tournament aborted");
        TournamentOutcome::Aborted(err)
    }

    /// Play matches until the bracket reports finished, the flag is set,
    /// or a step fails
    pub async fn run(&self) -> TournamentOutcome {
        info!(tournament_id = %self.tournament_id, "Tournament started");

        loop {
            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }

            let bracket = match self.api.bracket(self.tournament_id).await {
                Ok(bracket) => bracket,
                Err(e) => return self.abort(e.into()),
            };
            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }
            let finished = bracket.is_finished();
            self.report(TournamentStep::BracketShown(bracket.clone()));
            tokio::time::sleep(self.delay).await;

            if finished {
                info!(tournament_id = %self.tournament_id, "Tournament finished");
                return TournamentOutcome::Finished;
            }
            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }

            let next = match self.api.next_match(self.tournament_id).await {
                Ok(next) => next,
                Err(e) => return self.abort(e.into()),
            };
            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }
            let slot = next.next_match_type;
            if slot == MatchSlot::Finished {
                info!(tournament_id = %self.tournament_id, "No match left, tournament finished");
                return TournamentOutcome::Finished;
            }
            let Some(preview) = MatchPreview::resolve(&bracket, slot) else {
                return self.abort(TournamentError::UnexpectedSlot(slot));
            };
            self.report(TournamentStep::PreviewShown(preview));
            tokio::time::sleep(self.delay).await;

            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }
            let game_id = match self.api.create_match(self.tournament_id, slot).await {
                Ok(id) => id,
                Err(e) => return self.abort(e.into()),
            };
            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }

            info!(tournament_id = %self.tournament_id, %game_id, slot = slot.as_str(), "Tournament match starting");
            self.report(TournamentStep::MatchStarted { slot, game_id });
            let end = self.runner.run_match(game_id).await;
            self.report(TournamentStep::MatchEnded {
                slot,
                game_id,
                end: end.clone(),
            });

            if self.cancelled() {
                return TournamentOutcome::Cancelled;
            }
            match self.api.match_status(game_id).await {
                Ok(SessionStatus::Finished) => {}
                Ok(status) => {
                    warn!(%game_id, ?status, ?end, "Tournament match did not finish");
                    return self.abort(TournamentError::MatchNotFinished { game_id, status });
                }
                Err(e) => return self.abort(e.into()),
            }
        }
    }
}
