//! Registry of background and suspended jobs.
//!
//! There is no asynchronous reaper: a finished job stays registered until a
//! `jobs` listing or an `fg` observes it.

use crate::error::ShellError;
use crate::process::{ProcessHandle, ProcessStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use tracing::debug;

pub type JobId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Suspended,
    Done,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Running => "Running",
            JobStatus::Suspended => "Suspended",
            JobStatus::Done => "Done",
        })
    }
}

#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub handle: ProcessHandle,
    pub command_text: String,
    pub status: JobStatus,
}

impl Job {
    /// Refresh `status` from the process without blocking.
    fn refresh(&mut self) -> JobStatus {
        self.status = match self.handle.poll() {
            ProcessStatus::Exited(_) => JobStatus::Done,
            ProcessStatus::Stopped => JobStatus::Suspended,
            ProcessStatus::Running => JobStatus::Running,
        };
        self.status
    }
}

/// One line of `jobs` output: `[<id>] <status> <command_text>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub id: JobId,
    pub status: JobStatus,
    pub command_text: String,
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.id, self.status, self.command_text)
    }
}

/// Jobs keyed by id. Ids start at 1, grow by one per job and are never reused.
#[derive(Debug)]
pub struct JobTable {
    jobs: BTreeMap<JobId, Job>,
    next_id: JobId,
}

impl Default for JobTable {
    fn default() -> Self {
        JobTable {
            jobs: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process under a fresh id.
    pub fn add(&mut self, handle: ProcessHandle, command_text: String, status: JobStatus) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        debug!(id, pid = %handle.pid(), %status, %command_text, "job registered");
        self.jobs.insert(
            id,
            Job {
                id,
                handle,
                command_text,
                status,
            },
        );
        id
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Poll every job, report it, and drop the ones observed done.
    pub fn list(&mut self) -> Vec<JobReport> {
        let reports: Vec<JobReport> = self
            .jobs
            .values_mut()
            .map(|job| JobReport {
                id: job.id,
                status: job.refresh(),
                command_text: job.command_text.clone(),
            })
            .collect();
        self.jobs.retain(|id, job| {
            let keep = job.status != JobStatus::Done;
            if !keep {
                debug!(id, "job reaped");
            }
            keep
        });
        reports
    }

    /// Remove a job so the caller can wait on it in the foreground.
    pub fn take_for_foreground(&mut self, id: JobId) -> Result<Job, ShellError> {
        let mut job = self
            .jobs
            .remove(&id)
            .ok_or(ShellError::JobNotFound { command: "fg", id })?;
        job.refresh();
        Ok(job)
    }

    /// Continue a suspended job without waiting for it. The job stays registered.
    pub fn resume_in_background(&mut self, id: JobId) -> Result<&Job, ShellError> {
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or(ShellError::JobNotFound { command: "bg", id })?;
        if job.refresh() != JobStatus::Suspended {
            return Err(ShellError::JobState {
                command: "bg",
                id,
                reason: "already running or not suspended",
            });
        }
        job.handle
            .resume()
            .map_err(|e| ShellError::io(format!("bg: job {id}"), io::Error::from(e)))?;
        job.status = JobStatus::Running;
        debug!(id, "job continued in background");
        Ok(job)
    }
}
