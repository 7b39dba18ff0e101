//! In-memory job table keyed by document name.
//!
//! Every submission gets a fresh generation. Terminal transitions go through
//! [`JobRegistry::compare_and_set`], so a job leaves `in_progress` exactly
//! once and a stale run never overwrites the record of a newer upload.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::pipeline::grouping::Summary;

/// Wire status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Complete,
    Error,
}

#[derive(Debug, Clone)]
pub enum JobState {
    InProgress,
    Complete { result: Arc<Summary> },
    Error { message: String },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::InProgress => JobStatus::InProgress,
            JobState::Complete { .. } => JobStatus::Complete,
            JobState::Error { .. } => JobStatus::Error,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::InProgress)
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub document_name: String,
    pub generation: u64,
    pub state: JobState,
    /// SHA-256 of the uploaded bytes; absent for jobs restored from disk
    pub content_hash: Option<String>,
    pub project_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub in_progress: usize,
    pub complete: usize,
    pub error: usize,
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: DashMap<String, Job>,
    next_generation: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a new in-progress job, returning it and whatever it replaced.
    pub fn submit(
        &self,
        document_name: &str,
        content_hash: String,
        project_id: Option<String>,
    ) -> (Job, Option<Job>) {
        let job = Job {
            document_name: document_name.to_string(),
            generation: self.allocate_generation(),
            state: JobState::InProgress,
            content_hash: Some(content_hash),
            project_id,
            submitted_at: Utc::now(),
            finished_at: None,
        };
        let previous = self.jobs.insert(document_name.to_string(), job.clone());
        (job, previous)
    }

    pub fn get(&self, document_name: &str) -> Option<Job> {
        self.jobs.get(document_name).map(|job| job.clone())
    }

    /// Move an in-progress job of the given generation to a terminal state.
    ///
    /// Returns `false` if the job was replaced, removed or already finished.
    pub fn compare_and_set(&self, document_name: &str, generation: u64, state: JobState) -> bool {
        let Some(mut job) = self.jobs.get_mut(document_name) else {
            return false;
        };
        if job.generation != generation || job.state.is_terminal() {
            return false;
        }
        job.state = state;
        job.finished_at = Some(Utc::now());
        true
    }

    /// Insert a completed job loaded from disk, unless the name is already tracked.
    pub fn restore_complete(&self, document_name: &str, summary: Summary) -> bool {
        match self.jobs.entry(document_name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let now = Utc::now();
                slot.insert(Job {
                    document_name: document_name.to_string(),
                    generation: self.allocate_generation(),
                    state: JobState::Complete {
                        result: Arc::new(summary),
                    },
                    content_hash: None,
                    project_id: None,
                    submitted_at: now,
                    finished_at: Some(now),
                });
                true
            }
        }
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.jobs.iter() {
            match job.state.status() {
                JobStatus::InProgress => counts.in_progress += 1,
                JobStatus::Complete => counts.complete += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}
