//! Observable pipeline stage with delayed return to idle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::debug;

use crate::types::PipelineStage;

type Observer = Arc<dyn Fn(PipelineStage) + Send + Sync>;

#[derive(Default)]
struct SequencerState {
    stage: PipelineStage,
    generation: u64,
    next_observer: u64,
    observers: Vec<(u64, Observer)>,
}

/// Holds the current [`PipelineStage`] and notifies observers on every change.
///
/// Observers run synchronously on the thread performing the transition, after
/// the internal lock is released.
#[derive(Clone, Default)]
pub struct StatusSequencer {
    state: Arc<Mutex<SequencerState>>,
}

impl std::fmt::Debug for StatusSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("StatusSequencer")
            .field("stage", &state.stage)
            .field("generation", &state.generation)
            .field("observers", &state.observers.len())
            .finish()
    }
}

/// Handle returned by [`StatusSequencer::subscribe`].
#[must_use = "dropping a subscription keeps the observer registered"]
pub struct Subscription {
    id: u64,
    state: Weak<Mutex<SequencerState>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(state) = self.state.upgrade() {
            lock(&state).observers.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(state: &Mutex<SequencerState>) -> MutexGuard<'_, SequencerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StatusSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PipelineStage {
        lock(&self.state).stage
    }

    /// Moves to `stage` and returns the generation of this transition.
    pub fn set(&self, stage: PipelineStage) -> u64 {
        let (generation, observers) = {
            let mut state = lock(&self.state);
            state.stage = stage;
            state.generation += 1;
            let observers: Vec<Observer> =
                state.observers.iter().map(|(_, observer)| observer.clone()).collect();
            (state.generation, observers)
        };

        debug!(%stage, generation, "pipeline stage changed");
        for observer in observers {
            observer(stage);
        }
        generation
    }

    /// Moves to `stage`, then back to idle after `delay` unless another
    /// transition happens first.
    pub fn set_with_auto_idle(&self, stage: PipelineStage, delay: Duration) -> u64 {
        let generation = self.set(stage);
        let sequencer = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if lock(&sequencer.state).generation == generation {
                sequencer.set(PipelineStage::Idle);
            }
        });
        generation
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(PipelineStage) + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        let id = state.next_observer;
        state.next_observer += 1;
        state.observers.push((id, Arc::new(observer)));

        Subscription {
            id,
            state: Arc::downgrade(&self.state),
        }
    }
}
