//! Transient user-facing notices that expire on their own.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct NoticeState {
    messages: Vec<String>,
    generation: u64,
}

/// Most recent batch of validation or ingestion messages.
///
/// Posting replaces the previous batch; each batch is dismissed after the
/// configured lifetime unless replaced or cleared first.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    ttl: Duration,
    state: Arc<Mutex<NoticeState>>,
}

impl NoticeBoard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Arc::default(),
        }
    }

    pub fn post(&self, messages: Vec<String>) {
        if messages.is_empty() {
            return;
        }

        let generation = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.messages = messages;
            state.generation += 1;
            state.generation
        };

        let board = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(board.ttl).await;
            let mut state = board.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.generation == generation {
                state.messages.clear();
            }
        });
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.messages.clear();
        state.generation += 1;
    }

    pub fn current(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .clone()
    }
}
