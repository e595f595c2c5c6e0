//! Upload constraint checks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use nooverfit_config::UploadConfig;
use tracing::{debug, warn};

use crate::entities::{Attachment, CandidateFile};
use crate::types::{PipelineError, PipelineResult};

/// Limits applied to every upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_file_size_mb: u64,
    pub max_pages_per_doc: usize,
    pub allowed_mime_types: Vec<String>,
    pub probe_timeout: Duration,
}

impl UploadLimits {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    fn allows(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|allowed| allowed == mime_type)
    }
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_file_size_mb: config.max_file_size_mb,
            max_pages_per_doc: config.max_pages_per_doc,
            allowed_mime_types: config.allowed_mime_types.clone(),
            probe_timeout: Duration::from_millis(config.pdf_probe_timeout_ms),
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

/// Counts the pages of a PDF document.
#[async_trait]
pub trait PageCounter: Send + Sync {
    async fn count_pages(&self, bytes: Bytes) -> PipelineResult<usize>;
}

/// Default counter. Reads only the page tree with `lopdf`, on a blocking worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageCounter;

#[async_trait]
impl PageCounter for PdfPageCounter {
    async fn count_pages(&self, bytes: Bytes) -> PipelineResult<usize> {
        tokio::task::spawn_blocking(move || {
            lopdf::Document::load_mem(&bytes)
                .map(|document| document.get_pages().len())
                .map_err(|err| PipelineError::probe(err.to_string()))
        })
        .await?
    }
}

/// Outcome of a page-count probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageProbe {
    Counted(usize),
    Unreadable(String),
    TimedOut,
}

/// Files that passed validation plus the messages for those that did not.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub accepted: Vec<CandidateFile>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn rejected(error: String) -> Self {
        Self {
            accepted: Vec::new(),
            errors: vec![error],
        }
    }
}

pub struct UploadValidator {
    limits: UploadLimits,
    page_counter: Arc<dyn PageCounter>,
}

impl UploadValidator {
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            limits,
            page_counter: Arc::new(PdfPageCounter),
        }
    }

    pub fn with_page_counter(mut self, page_counter: Arc<dyn PageCounter>) -> Self {
        self.page_counter = page_counter;
        self
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Races the page counter against the probe timeout. On timeout the
    /// counting task is left to finish on its own.
    pub async fn probe_pages(&self, bytes: Bytes) -> PageProbe {
        match tokio::time::timeout(self.limits.probe_timeout, self.page_counter.count_pages(bytes))
            .await
        {
            Ok(Ok(pages)) => PageProbe::Counted(pages),
            Ok(Err(err)) => PageProbe::Unreadable(err.to_string()),
            Err(_) => PageProbe::TimedOut,
        }
    }

    /// Checks a candidate batch against the limits, given what is already staged.
    pub async fn validate(
        &self,
        candidates: Vec<CandidateFile>,
        current: &[Attachment],
    ) -> ValidationReport {
        if current.len() + candidates.len() > self.limits.max_files {
            debug!(
                current = current.len(),
                incoming = candidates.len(),
                "upload batch exceeds capacity"
            );
            return ValidationReport::rejected(
                PipelineError::CapacityExceeded {
                    capacity: self.limits.max_files,
                }
                .to_string(),
            );
        }

        let mut report = ValidationReport::default();
        for file in candidates {
            match self.check(&file).await {
                Ok(()) => report.accepted.push(file),
                Err(message) => report.errors.push(message),
            }
        }

        debug!(
            accepted = report.accepted.len(),
            rejected = report.errors.len(),
            "validated upload batch"
        );
        report
    }

    async fn check(&self, file: &CandidateFile) -> Result<(), String> {
        if !self.limits.allows(&file.mime_type) {
            return Err(format!("{}: Unsupported format.", file.name));
        }

        if file.size() > self.limits.max_file_size_bytes() {
            return Err(format!(
                "{}: Exceeds {}MB limit.",
                file.name, self.limits.max_file_size_mb
            ));
        }

        if file.is_pdf() {
            match self.probe_pages(file.bytes.clone()).await {
                PageProbe::Counted(pages) if pages > self.limits.max_pages_per_doc => {
                    return Err(format!(
                        "{}: Has {} pages (Max {} allowed).",
                        file.name, pages, self.limits.max_pages_per_doc
                    ));
                }
                PageProbe::Counted(_) => {}
                PageProbe::Unreadable(reason) => {
                    warn!(file = %file.name, %reason, "could not count PDF pages, accepting");
                }
                PageProbe::TimedOut => {
                    warn!(file = %file.name, "PDF page count timed out, accepting");
                }
            }
        }

        Ok(())
    }
}
