use crate::core::{HardSoftScore, SolverStatus};
use crate::solver::JobManager;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result};
use std::time::{Duration, Instant};

/// Score trajectory of a solve job.
#[derive(Debug, Deserialize, Serialize)]
pub struct Report {
    job: String,
    entries: Vec<ReportEntry>,
}

impl Report {
    /// Create a new report.
    fn new(job: String) -> Self {
        let entries = Vec::new();
        Self { job, entries }
    }

    /// Get the job id.
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job
    }

    /// Get the entries.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Get the last observed score.
    #[must_use]
    pub fn final_score(&self) -> Option<HardSoftScore> {
        self.entries.last().and_then(|entry| entry.score)
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        writeln!(f, "Job: {}", self.job)?;
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        writeln!(f, "-------------------")
    }
}

/// A change of score or status observed while polling.
#[non_exhaustive]
#[derive(Debug, Deserialize, Serialize)]
pub struct ReportEntry {
    pub time: f64,
    pub score: Option<HardSoftScore>,
    pub status: SolverStatus,
}

impl Display for ReportEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self.score {
            Some(score) => write!(f, "{:.2} sec: {score} ({})", self.time, self.status),
            None => write!(f, "{:.2} sec: not scored ({})", self.time, self.status),
        }
    }
}

/// Polls the job until it terminates, recording every change of score or status.
///
/// # Errors
/// - If the job is unknown.
pub fn watch(manager: &JobManager, job: &str, poll: Duration) -> crate::Result<Report> {
    let mut report = Report::new(job.into());
    let started = Instant::now();

    loop {
        let schedule = manager.get_schedule(job)?;
        let changed = report.entries.last().map_or(true, |last| {
            last.score != schedule.score || last.status != schedule.solver_status
        });

        if changed {
            report.entries.push(ReportEntry {
                time: started.elapsed().as_secs_f64(),
                score: schedule.score,
                status: schedule.solver_status,
            });
        }

        if schedule.solver_status == SolverStatus::Terminated {
            return Ok(report);
        }

        std::thread::sleep(poll);
    }
}
