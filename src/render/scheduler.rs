//! Self-rescheduling render task

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::game::effects::EffectRegistry;
use crate::game::state::SharedView;
use crate::lifecycle::signal::CompletionSignal;
use crate::render::{compose_frame, FrameSink, SpriteAtlas};

/// One render task per match.
///
/// Ticks at a fixed interval independent of message arrival and stops
/// before drawing once the completion signal resolves.
pub struct RenderLoop {
    task: Option<JoinHandle<()>>,
    frames: Arc<AtomicU64>,
}

impl RenderLoop {
    pub fn start<T>(
        view: SharedView,
        effects: EffectRegistry,
        atlas: Arc<SpriteAtlas>,
        sink: Arc<dyn FrameSink>,
        interval: Duration,
        completion: &CompletionSignal<T>,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let frames = Arc::new(AtomicU64::new(0));
        let drawn = Arc::clone(&frames);
        let mut done = completion.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    changed = done.changed() => {
                        if changed.is_err() || done.borrow().is_some() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if done.borrow().is_some() {
                            break;
                        }
                        let snapshot = view.read().clone();
                        let frame = compose_frame(&snapshot, &effects.snapshot(), &atlas, Instant::now());
                        sink.set_score_label(&frame.score_label);
                        sink.present(&frame);
                        drawn.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            debug!(frames = drawn.load(Ordering::Relaxed), "Render loop stopped");
        });

        Self {
            task: Some(task),
            frames,
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Abort the task; returns `false` if it was already stopped
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::new_shared_view;
    use crate::render::RecordingSink;

    #[tokio::test(start_paused = true)]
    async fn draws_until_completion() {
        let view = new_shared_view();
        let sink = Arc::new(RecordingSink::new());
        let completion = CompletionSignal::<u8>::new();
        let mut render = RenderLoop::start(
            view.clone(),
            EffectRegistry::new(),
            Arc::new(SpriteAtlas::load()),
            sink.clone(),
            Duration::from_millis(16),
            &completion,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        let drawn = render.frames_drawn();
        assert!(drawn >= 5, "only {drawn} frames");
        assert_eq!(sink.recorded().score_label, " 0 - 0 ");

        view.write().game.score_left = 2;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sink.recorded().score_label, " 2 - 0 ");

        completion.resolve(1);
        tokio::time::sleep(Duration::from_millis(1)).await;
        let at_stop = render.frames_drawn();
        assert!(!render.is_running());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(render.frames_drawn(), at_stop);
        assert_eq!(sink.frame_count() as u64, at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let completion = CompletionSignal::<()>::new();
        let mut render = RenderLoop::start(
            new_shared_view(),
            EffectRegistry::new(),
            Arc::new(SpriteAtlas::load()),
            Arc::new(RecordingSink::new()),
            Duration::from_millis(16),
            &completion,
        );
        assert!(render.stop());
        assert!(!render.stop());
        assert!(!render.is_running());
    }
}
