//! HTTP boundary: match creation, tournament queries and invitations

pub mod client;
pub mod game;

pub use client::{decode_envelope, ApiClient, ApiError, Envelope, ResponseStatus};
pub use game::{GameParameters, InvitationCheck, InvitationStatus, SessionStatus, TournamentForm};
