//! Job Tracker
//!
//! In-memory record of the jobs this process has accepted. All state
//! changes go through [`JobTracker::transition`], which refuses edges the
//! lifecycle does not allow.
//!
//! Records are evicted on insert once they have been idle long enough:
//! finished jobs after the retention period, unfinished ones after the
//! retention period plus the longest step of the lifecycle. An unfinished
//! job that idle has been given up by its background phase.

use chrono::{DateTime, Utc};
use deskpilot_core::domain::job::{Job, JobState, deployment_name};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {name} cannot move from {from} to {to}")]
    IllegalTransition {
        name: String,
        from: JobState,
        to: JobState,
    },
}

const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

pub struct JobTracker {
    jobs: RwLock<HashMap<String, Job>>,
    last_timestamp: AtomicI64,
    retention: Duration,
    step_bound: Duration,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION, Duration::ZERO)
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker keeping finished jobs for `retention`
    ///
    /// `step_bound` is the longest a live job may go without a transition.
    pub fn with_retention(retention: Duration, step_bound: Duration) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            last_timestamp: AtomicI64::new(0),
            retention,
            step_bound,
        }
    }

    /// Mints a deployment name no earlier request has used
    ///
    /// The timestamp is the current unix second, bumped past the last one
    /// handed out when requests arrive within the same second.
    pub fn mint_name(&self, client_id: &str, frequency: &str) -> String {
        let now = Utc::now().timestamp();
        let previous = self
            .last_timestamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        let timestamp = now.max(previous + 1);

        deployment_name(client_id, frequency, timestamp)
    }

    pub fn insert(&self, job: Job) {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        self.evict_idle(&mut jobs, Utc::now());
        jobs.insert(job.deployment_name.clone(), job);
    }

    fn evict_idle(&self, jobs: &mut HashMap<String, Job>, now: DateTime<Utc>) {
        let Some(finished_cutoff) = cutoff(now, self.retention) else {
            return;
        };
        let Some(abandoned_cutoff) = cutoff(now, self.retention.saturating_add(self.step_bound)) else {
            return;
        };

        let before = jobs.len();
        jobs.retain(|_, job| {
            let cutoff = if job.state.is_terminal() {
                finished_cutoff
            } else {
                abandoned_cutoff
            };
            job.updated_at >= cutoff
        });

        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!("Evicted {} idle job record(s)", evicted);
        }
    }

    /// Moves a job to `next`, applying `update` to it first
    ///
    /// Returns the updated job. `update` runs only when the edge is legal.
    pub fn transition(
        &self,
        name: &str,
        next: JobState,
        update: impl FnOnce(&mut Job),
    ) -> Result<Job, TrackerError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let job = jobs
            .get_mut(name)
            .ok_or_else(|| TrackerError::NotFound(name.to_string()))?;

        if !job.state.can_transition_to(next) {
            warn!("Rejected transition of {}: {} -> {}", name, job.state, next);
            return Err(TrackerError::IllegalTransition {
                name: name.to_string(),
                from: job.state,
                to: next,
            });
        }

        update(job);
        debug!("{}: {} -> {}", name, job.state, next);
        job.state = next;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    pub fn get(&self, name: &str) -> Option<Job> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(name).cloned()
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.deployment_name.cmp(&a.deployment_name))
        });
        all
    }
}

/// `now - idle`, or `None` when that lies before the representable range
fn cutoff(now: DateTime<Utc>, idle: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(idle)
        .ok()
        .and_then(|idle| now.checked_sub_signed(idle))
}
