//! Staging area for accepted files awaiting the next turn.

use std::collections::HashSet;

use tracing::debug;

use crate::entities::{Attachment, CandidateFile};
use crate::types::{PipelineError, PipelineResult};

/// Ordered, capacity-bounded collection of staged attachments.
#[derive(Debug)]
pub struct AttachmentStore {
    capacity: usize,
    items: Vec<Attachment>,
    issued: HashSet<String>,
}

impl AttachmentStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::new(),
            issued: HashSet::new(),
        }
    }

    /// Encodes and appends a batch. The batch is all-or-nothing.
    pub async fn add(&mut self, files: Vec<CandidateFile>) -> PipelineResult<Vec<Attachment>> {
        if self.items.len() + files.len() > self.capacity {
            return Err(PipelineError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let mut workers = Vec::with_capacity(files.len());
        for file in files {
            let id = self.next_id();
            workers.push(tokio::task::spawn_blocking(move || Attachment::encode(id, file)));
        }

        let mut added = Vec::with_capacity(workers.len());
        for worker in workers {
            added.push(worker.await?);
        }

        debug!(count = added.len(), total = self.items.len() + added.len(), "staged attachments");
        self.items.extend(added.iter().cloned());
        Ok(added)
    }

    /// Removes an attachment by id. Returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|attachment| attachment.id != id);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn list(&self) -> Vec<Attachment> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    fn next_id(&mut self) -> String {
        loop {
            let id = cuid2::create_id();
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}
