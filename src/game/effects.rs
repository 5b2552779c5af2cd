//! Self-expiring registry of transient visual effects

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::ws::protocol::PowerupKind;

/// Lifetime of collision ripples/bursts
pub const COLLISION_EFFECT_DURATION: Duration = Duration::from_millis(300);
/// Lifetime of spawn animations
pub const SPAWN_EFFECT_DURATION: Duration = Duration::from_millis(500);
/// Lifetime of expire animations
pub const EXPIRE_EFFECT_DURATION: Duration = Duration::from_millis(300);

/// Default effect colour
pub const WHITE: &str = "#FFFFFF";
/// Bumper effect colour
pub const BUMPER_BLUE: &str = "#4169E1";

/// Kind of transient effect; decides both shape and lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    PaddleCollision,
    BorderCollision,
    BumperCollision,
    PowerupSpawn,
    PowerupExpire,
    BumperSpawn,
    BumperExpire,
}

impl EffectKind {
    pub fn duration(self) -> Duration {
        match self {
            EffectKind::PaddleCollision
            | EffectKind::BorderCollision
            | EffectKind::BumperCollision => COLLISION_EFFECT_DURATION,
            EffectKind::PowerupSpawn | EffectKind::BumperSpawn => SPAWN_EFFECT_DURATION,
            EffectKind::PowerupExpire | EffectKind::BumperExpire => EXPIRE_EFFECT_DURATION,
        }
    }
}

/// Registry-unique effect identity
pub type EffectId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEffect {
    pub id: EffectId,
    pub kind: EffectKind,
    pub x: f64,
    pub y: f64,
    pub color: String,
    /// Powerup that produced the effect, if any
    pub powerup: Option<PowerupKind>,
    pub created_at: Instant,
    pub duration: Duration,
}

impl CollisionEffect {
    /// Elapsed fraction of the lifetime, clamped to `[0, 1]`
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.created_at);
        (elapsed.as_nanos() as f64 / self.duration.as_nanos() as f64).clamp(0.0, 1.0)
    }
}

struct RegistryInner {
    effects: Vec<CollisionEffect>,
    timers: Vec<(EffectId, JoinHandle<()>)>,
}

/// Effects pushed by the reconciler and removed by their own timers.
///
/// Removal is by [`EffectId`], never by position.
#[derive(Clone)]
pub struct EffectRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    next_id: Arc<AtomicU64>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                effects: Vec::new(),
                timers: Vec::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Register an effect and arm its removal timer
    pub fn push(
        &self,
        kind: EffectKind,
        x: f64,
        y: f64,
        color: impl Into<String>,
        powerup: Option<PowerupKind>,
    ) -> EffectId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let duration = kind.duration();
        let effect = CollisionEffect {
            id,
            kind,
            x,
            y,
            color: color.into(),
            powerup,
            created_at: Instant::now(),
            duration,
        };

        let inner = Arc::clone(&self.inner);
        let mut guard = self.inner.lock();
        guard.effects.push(effect);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut guard = inner.lock();
            guard.effects.retain(|e| e.id != id);
            guard.timers.retain(|(timer_id, _)| *timer_id != id);
        });
        guard.timers.push((id, handle));
        id
    }

    /// Copy of the live effects, oldest first
    pub fn snapshot(&self) -> Vec<CollisionEffect> {
        self.inner.lock().effects.clone()
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.inner.lock().effects.iter().any(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().effects.is_empty()
    }

    /// Drop every effect and cancel the pending removals
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        guard.effects.clear();
        for (_, handle) in guard.timers.drain(..) {
            handle.abort();
        }
    }
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_by_class() {
        assert_eq!(EffectKind::PaddleCollision.duration(), Duration::from_millis(300));
        assert_eq!(EffectKind::BumperSpawn.duration(), Duration::from_millis(500));
        assert_eq!(EffectKind::PowerupExpire.duration(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn effect_expires_after_its_duration() {
        let registry = EffectRegistry::new();
        let id = registry.push(EffectKind::PowerupSpawn, 10.0, 20.0, "#FFD700", None);

        tokio::time::sleep(Duration::from_millis(499)).await;
        assert!(registry.contains(id));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!registry.contains(id));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn removal_is_by_identity() {
        let registry = EffectRegistry::new();
        let short = registry.push(EffectKind::BorderCollision, 0.0, 50.0, WHITE, None);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let long = registry.push(EffectKind::BumperSpawn, 5.0, 5.0, BUMPER_BLUE, None);
        let late = registry.push(EffectKind::BumperCollision, 7.0, 7.0, WHITE, None);

        tokio::time::sleep(Duration::from_millis(250)).await;
        let ids: Vec<_> = registry.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![long, late]);
        assert!(!registry.contains(short));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let ids: Vec<_> = registry.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![long]);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_monotonic_and_clamped() {
        let registry = EffectRegistry::new();
        registry.push(EffectKind::PaddleCollision, 60.0, 200.0, WHITE, None);
        let effect = registry.snapshot().remove(0);
        let start = effect.created_at;

        let mut last = 0.0;
        for ms in [0u64, 50, 150, 299, 300, 301, 5_000] {
            let p = effect.progress(start + Duration::from_millis(ms));
            assert!(p >= last, "progress went backwards at {ms}ms");
            assert!((0.0..=1.0).contains(&p));
            last = p;
        }
        assert_eq!(effect.progress(start + Duration::from_millis(150)), 0.5);
        assert_eq!(effect.progress(start + Duration::from_secs(60)), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_removals() {
        let registry = EffectRegistry::new();
        registry.push(EffectKind::PaddleCollision, 60.0, 200.0, WHITE, None);
        registry.clear();
        assert!(registry.is_empty());

        let id = registry.push(EffectKind::BumperExpire, 1.0, 1.0, BUMPER_BLUE, None);
        assert!(registry.contains(id));
    }
}
