//! Client-side match state: snapshots, transient effects, timers, input

pub mod effects;
pub mod input;
pub mod reconciler;
pub mod state;
pub mod timers;

pub use effects::{CollisionEffect, EffectKind, EffectRegistry};
pub use input::{attach_input, InputEvent, InputMode, Key, Subscription, TouchButton, TouchPhase};
pub use reconciler::{Reconciled, StateReconciler};
pub use state::{ActiveEffects, EffectSet, GameState, MatchView, SharedView};
pub use timers::KeyedTimers;
