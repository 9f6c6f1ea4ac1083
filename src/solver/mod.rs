//! Asynchronous solve jobs.
//!
//! Every submitted schedule becomes a job with its own thread. The search
//! engine runs on a scoped thread next to it and sends improved candidates
//! over a channel; the job thread is the only writer of the job's snapshot.

use crate::algo;
use crate::core::{
    ConstraintWeights, HardSoftScore, Schedule, ScoreAnalysis, ScoreDirector, SearchEngine,
    SolveContext, SolverStatus, Termination, Unfairness,
};
use crate::{Error, Result};
use ahash::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Opaque identifier of a solve job.
pub type JobId = String;

/// Creates a fresh search engine for a job.
pub type EngineFactory = fn() -> Box<dyn SearchEngine>;

/// Configuration shared by every job of a [`JobManager`].
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverConfig {
    /// Name of the registered search engine.
    pub engine: String,
    pub termination: Termination,
    pub unfairness: Unfairness,
    /// Seed of the engine, random when unset.
    pub seed: Option<u64>,
}

impl SolverConfig {
    /// Sets the search engine.
    #[must_use]
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Sets the wall clock budget of every job.
    #[must_use]
    pub const fn with_spent_limit(mut self, limit: Duration) -> Self {
        self.termination.spent_limit = limit;
        self
    }

    /// Stops a job after this long without improvement.
    #[must_use]
    pub const fn with_unimproved_spent_limit(mut self, limit: Duration) -> Self {
        self.termination.unimproved_spent_limit = Some(limit);
        self
    }

    /// Sets the engine seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            engine: algo::DEFAULT_ENGINE.into(),
            termination: Termination::default(),
            unfairness: Unfairness::default(),
            seed: None,
        }
    }
}

/// Score levels of a status document. Zero until the job was scored.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLevels {
    pub hard_score: i64,
    pub soft_score: i64,
}

impl From<HardSoftScore> for ScoreLevels {
    fn from(score: HardSoftScore) -> Self {
        Self {
            hard_score: score.hard,
            soft_score: score.soft,
        }
    }
}

/// Lightweight projection of a job.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub score: ScoreLevels,
    pub solver_status: SolverStatus,
}

enum JobEvent {
    Started,
    Improved(Schedule),
    Finished(Result<()>),
}

struct Job {
    snapshot: Schedule,
    status: SolverStatus,
    weights: ConstraintWeights,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Jobs {
    order: Vec<JobId>,
    jobs: HashMap<JobId, Job>,
}

impl Jobs {
    fn get(&self, id: &str) -> Result<&Job> {
        self.jobs.get(id).ok_or_else(|| Error::JobNotFound(id.into()))
    }

    fn apply(&mut self, id: &str, event: JobEvent) {
        let Some(job) = self.jobs.get_mut(id) else {
            return;
        };

        match event {
            JobEvent::Started => {
                job.status = SolverStatus::SolvingActive;
                debug!(job = id, "solving started");
            }
            JobEvent::Improved(candidate) => {
                if candidate.same_problem(&job.snapshot) {
                    debug!(job = id, score = ?candidate.score, "improved candidate");
                    job.snapshot = candidate;
                } else {
                    warn!(job = id, "rejected candidate that changes the problem facts");
                }
            }
            JobEvent::Finished(result) => {
                job.status = SolverStatus::Terminated;
                match result {
                    Ok(()) => info!(job = id, score = ?job.snapshot.score, "solving ended"),
                    Err(err) => error!(job = id, error = %err, "search engine failed"),
                }
            }
        }
    }
}

/// Owns the solve jobs and their latest snapshots.
pub struct JobManager {
    config: SolverConfig,
    factory: Option<EngineFactory>,
    jobs: Arc<Mutex<Jobs>>,
}

impl JobManager {
    /// Creates a manager that runs the engine named in the configuration.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            factory: None,
            jobs: Arc::default(),
        }
    }

    /// Creates a manager that runs engines from the given factory.
    #[must_use]
    pub fn with_factory(config: SolverConfig, factory: EngineFactory) -> Self {
        Self {
            config,
            factory: Some(factory),
            jobs: Arc::default(),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Jobs> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create_engine(&self) -> Result<Box<dyn SearchEngine>> {
        let mut engine = match self.factory {
            Some(factory) => factory(),
            None => algo::engine(&self.config.engine)?,
        };
        if let Some(seed) = self.config.seed {
            engine.seed(seed);
        }
        Ok(engine)
    }

    /// Registers a new job and starts solving it in the background.
    /// The weights apply to this job only.
    ///
    /// # Errors
    /// - If the configured engine is unknown.
    /// - If the job thread cannot be spawned.
    pub fn submit(&self, mut schedule: Schedule, weights: ConstraintWeights) -> Result<JobId> {
        let engine = self.create_engine()?;
        let id = uuid::Uuid::new_v4().to_string();
        let stop = Arc::new(AtomicBool::new(false));
        let director = ScoreDirector::new(weights).with_unfairness(self.config.unfairness);

        schedule.score = None;
        schedule.solver_status = SolverStatus::NotSolving;

        {
            let mut jobs = self.lock();
            jobs.order.push(id.clone());
            jobs.jobs.insert(
                id.clone(),
                Job {
                    snapshot: schedule.clone(),
                    status: SolverStatus::SolvingScheduled,
                    weights,
                    stop: Arc::clone(&stop),
                    handle: None,
                },
            );
        }

        let worker = Worker {
            jobs: Arc::clone(&self.jobs),
            id: id.clone(),
            director,
            termination: self.config.termination,
            stop,
        };
        let spawned = std::thread::Builder::new()
            .name(format!("job-{id}"))
            .spawn(move || worker.run(engine, schedule));

        let mut jobs = self.lock();
        match spawned {
            Ok(handle) => {
                if let Some(job) = jobs.jobs.get_mut(&id) {
                    job.handle = Some(handle);
                }
                info!(job = %id, weights = ?weights, "job submitted");
                Ok(id)
            }
            Err(err) => {
                jobs.order.retain(|other| *other != id);
                jobs.jobs.remove(&id);
                Err(Error::Spawn(err))
            }
        }
    }

    /// Returns the latest snapshot of the job with its current status.
    ///
    /// # Errors
    /// - If the job is unknown.
    pub fn get_schedule(&self, id: &str) -> Result<Schedule> {
        let jobs = self.lock();
        let job = jobs.get(id)?;
        Ok(job.snapshot.clone().with_status(job.status))
    }

    /// Returns the score and status of the job.
    ///
    /// # Errors
    /// - If the job is unknown.
    pub fn get_status(&self, id: &str) -> Result<JobStatus> {
        let jobs = self.lock();
        let job = jobs.get(id)?;
        Ok(JobStatus {
            score: job.snapshot.score.unwrap_or_default().into(),
            solver_status: job.status,
        })
    }

    /// Returns the weights the job was submitted with.
    ///
    /// # Errors
    /// - If the job is unknown.
    pub fn weights(&self, id: &str) -> Result<ConstraintWeights> {
        Ok(self.lock().get(id)?.weights)
    }

    /// Asks the job to stop and returns its current snapshot without waiting.
    /// Terminating a job that already ended only logs a warning.
    ///
    /// # Errors
    /// - If the job is unknown.
    pub fn terminate(&self, id: &str) -> Result<Schedule> {
        let jobs = self.lock();
        let job = jobs.get(id)?;

        if let Err(err) = Self::signal_stop(id, job) {
            warn!(job = id, error = %err, "termination ignored");
        }

        Ok(job.snapshot.clone().with_status(job.status))
    }

    fn signal_stop(id: &str, job: &Job) -> Result<()> {
        if job.status == SolverStatus::Terminated {
            return Err(Error::TerminationFailure {
                id: id.into(),
                reason: "job already terminated",
            });
        }
        if job.stop.swap(true, Ordering::Relaxed) {
            debug!(job = id, "termination already requested");
        }
        Ok(())
    }

    /// Waits for the job thread to exit and returns the final snapshot.
    ///
    /// # Errors
    /// - If the job is unknown.
    pub fn join(&self, id: &str) -> Result<Schedule> {
        let handle = self
            .lock()
            .jobs
            .get_mut(id)
            .ok_or_else(|| Error::JobNotFound(id.into()))?
            .handle
            .take();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(job = id, "job thread panicked");
                if let Some(job) = self.lock().jobs.get_mut(id) {
                    job.status = SolverStatus::Terminated;
                }
            }
        }

        self.get_schedule(id)
    }

    /// Breaks the score of a schedule down with the given weights.
    #[must_use]
    pub fn analyze(&self, schedule: &Schedule, weights: ConstraintWeights) -> ScoreAnalysis {
        ScoreDirector::new(weights)
            .with_unfairness(self.config.unfairness)
            .analyze(schedule)
    }

    /// Returns the ids of all jobs in submission order.
    #[must_use]
    pub fn list_jobs(&self) -> Vec<JobId> {
        self.lock().order.clone()
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        for job in self.lock().jobs.values() {
            job.stop.store(true, Ordering::Relaxed);
        }
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("config", &self.config)
            .field("jobs", &self.lock().order)
            .finish_non_exhaustive()
    }
}

/// The job thread: runs the engine on a scoped thread and applies its events.
struct Worker {
    jobs: Arc<Mutex<Jobs>>,
    id: JobId,
    director: ScoreDirector,
    termination: Termination,
    stop: Arc<AtomicBool>,
}

impl Worker {
    fn run(self, mut engine: Box<dyn SearchEngine>, schedule: Schedule) {
        let Self {
            jobs,
            id,
            director,
            termination,
            stop,
        } = self;
        let (sender, receiver) = mpsc::channel();

        std::thread::scope(|scope| {
            let engine_thread = scope.spawn(move || {
                let _ = sender.send(JobEvent::Started);

                let mut listener = |candidate: Schedule| {
                    let _ = sender.send(JobEvent::Improved(candidate));
                };
                let mut context = SolveContext::new(director, termination, &stop, &mut listener);
                let result = engine.solve(schedule, &mut context);

                let _ = sender.send(JobEvent::Finished(result));
            });

            for event in receiver {
                jobs.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(&id, event);
            }

            // a panicking engine never sends `Finished`
            if engine_thread.join().is_err() {
                let event = JobEvent::Finished(Err(Error::EnginePanicked(id.clone())));
                jobs.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .apply(&id, event);
            }
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{Resource, Task};
    use crate::data::DemoData;
    use crate::ErrorKind;
    use std::time::Instant;

    fn problem() -> Result<Schedule> {
        let resources = vec![
            Resource::new("Alice", 100, ["python", "sql"]),
            Resource::new("Bob", 50, ["java"]),
        ];
        let tasks = vec![
            Task::new("1", "Python Task", 30).with_required_skill("python"),
            Task::new("2", "Java Task", 40).with_required_skill("java"),
        ];
        Schedule::new(resources, tasks)
    }

    /// Offers three assignments, each better than the previous one.
    struct Stepwise;

    impl SearchEngine for Stepwise {
        fn solve(&mut self, mut schedule: Schedule, context: &mut SolveContext<'_>) -> Result<()> {
            schedule.assign(0, Some(1))?;
            schedule.assign(1, Some(0))?;
            context.offer(&schedule);
            schedule.assign(0, Some(0))?;
            context.offer(&schedule);
            schedule.assign(1, Some(1))?;
            context.offer(&schedule);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Stepwise"
        }
    }

    /// Keeps running until asked to stop.
    struct Spinning;

    impl SearchEngine for Spinning {
        fn solve(&mut self, schedule: Schedule, context: &mut SolveContext<'_>) -> Result<()> {
            context.offer(&schedule);
            while !context.should_terminate() {
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Spinning"
        }
    }

    /// Offers a schedule of a different problem.
    struct Foreign;

    impl SearchEngine for Foreign {
        fn solve(&mut self, _: Schedule, context: &mut SolveContext<'_>) -> Result<()> {
            let other = Schedule::new(vec![Resource::new("Zed", 1, ["x"])], vec![])?;
            context.offer(&other);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Foreign"
        }
    }

    /// Returns without offering anything.
    struct Idle;

    impl SearchEngine for Idle {
        fn solve(&mut self, _: Schedule, _: &mut SolveContext<'_>) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "Idle"
        }
    }

    /// Reports the submitted schedule, then panics.
    struct Panicking;

    impl SearchEngine for Panicking {
        fn solve(&mut self, schedule: Schedule, context: &mut SolveContext<'_>) -> Result<()> {
            context.offer(&schedule);
            panic!("engine failure");
        }

        fn name(&self) -> &'static str {
            "Panicking"
        }
    }

    fn manager(factory: EngineFactory) -> JobManager {
        let config = SolverConfig::default().with_spent_limit(Duration::from_secs(60));
        JobManager::with_factory(config, factory)
    }

    #[test]
    fn last_candidate_wins() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Stepwise));
        let id = manager.submit(problem()?, ConstraintWeights::default())?;
        let schedule = manager.join(&id)?;

        assert_eq!(schedule.solver_status, SolverStatus::Terminated);
        assert_eq!(schedule.tasks()[0].resource(), Some(0));
        assert_eq!(schedule.tasks()[1].resource(), Some(1));

        // Bob holds 40 of 50; soft: 15 + 20 duration, unfairness sqrt(2 * 5^2) = 7 -> 3
        assert_eq!(schedule.score, Some(HardSoftScore::new(0, -38)));
        let status = manager.get_status(&id)?;
        assert_eq!(status.score, ScoreLevels { hard_score: 0, soft_score: -38 });
        assert_eq!(status.solver_status, SolverStatus::Terminated);
        Ok(())
    }

    #[test]
    fn status_defaults_to_zero_score() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Idle));
        let id = manager.submit(problem()?, ConstraintWeights::default())?;
        manager.join(&id)?;

        let status = manager.get_status(&id)?;
        assert_eq!(status.score, ScoreLevels::default());
        assert_eq!(status.solver_status, SolverStatus::Terminated);
        assert_eq!(manager.get_schedule(&id)?.score, None);
        Ok(())
    }

    #[test]
    fn terminate_stops_job_and_is_idempotent() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Spinning));
        let id = manager.submit(problem()?, ConstraintWeights::default())?;

        manager.terminate(&id)?;
        let schedule = manager.join(&id)?;
        assert_eq!(schedule.solver_status, SolverStatus::Terminated);
        assert!(schedule.score.is_some());

        let again = manager.terminate(&id)?;
        assert_eq!(again.solver_status, SolverStatus::Terminated);
        Ok(())
    }

    #[test]
    fn engine_panic_terminates_job() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Panicking));
        let id = manager.submit(problem()?, ConstraintWeights::default())?;

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut status = manager.get_status(&id)?;
        while status.solver_status != SolverStatus::Terminated && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
            status = manager.get_status(&id)?;
        }

        assert_eq!(status.solver_status, SolverStatus::Terminated);
        assert!(manager.get_schedule(&id)?.score.is_some());
        Ok(())
    }

    #[test]
    fn unknown_job_is_not_found() {
        let manager = manager(|| Box::new(Idle));
        for result in [
            manager.get_schedule("missing").map(|_| ()),
            manager.get_status("missing").map(|_| ()),
            manager.terminate("missing").map(|_| ()),
            manager.join("missing").map(|_| ()),
            manager.weights("missing").map(|_| ()),
        ] {
            assert!(matches!(result, Err(err) if err.kind() == ErrorKind::NotFound));
        }
    }

    #[test]
    fn foreign_candidate_is_rejected() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Foreign));
        let initial = problem()?;
        let id = manager.submit(initial.clone(), ConstraintWeights::default())?;
        let schedule = manager.join(&id)?;

        assert!(schedule.same_problem(&initial));
        assert_eq!(schedule.score, None);
        Ok(())
    }

    #[test]
    fn jobs_are_listed_in_submission_order() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Idle));
        let ids = (0..5)
            .map(|_| manager.submit(problem()?, ConstraintWeights::default()))
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(manager.list_jobs(), ids);
        Ok(())
    }

    #[test]
    fn unknown_engine_fails_before_registration() -> anyhow::Result<()> {
        let manager = JobManager::new(SolverConfig::default().with_engine("Nope"));
        let result = manager.submit(problem()?, ConstraintWeights::default());
        assert!(matches!(result, Err(Error::UnknownEngine(_))));
        assert!(manager.list_jobs().is_empty());
        Ok(())
    }

    #[test]
    fn concurrent_jobs_keep_their_own_weights() -> anyhow::Result<()> {
        let config = SolverConfig::default()
            .with_spent_limit(Duration::from_millis(300))
            .with_seed(7);
        let manager = JobManager::new(config);

        let full = ConstraintWeights::default();
        let hard_only = ConstraintWeights::new(100, 100, 0, 0)?;
        let first = manager.submit(DemoData::Small.generate()?, full)?;
        let second = manager.submit(DemoData::Small.generate()?, hard_only)?;

        let first_schedule = manager.join(&first)?;
        let second_schedule = manager.join(&second)?;

        assert_eq!(manager.weights(&first)?, full);
        assert_eq!(manager.weights(&second)?, hard_only);

        let first_score = first_schedule.score.unwrap_or_default();
        let second_score = second_schedule.score.unwrap_or_default();
        assert_eq!(first_score, crate::core::score(&first_schedule, &full));
        assert_eq!(second_score, crate::core::score(&second_schedule, &hard_only));
        assert!(first_score.soft < 0);
        assert_eq!(second_score.soft, 0);
        Ok(())
    }

    #[test]
    fn analyze_uses_supplied_weights() -> anyhow::Result<()> {
        let manager = manager(|| Box::new(Idle));
        let mut schedule = problem()?;
        schedule.assign(0, Some(1))?;

        let analysis = manager.analyze(&schedule, ConstraintWeights::default());
        assert_eq!(analysis.score.hard, -1);

        let analysis = manager.analyze(&schedule, ConstraintWeights::new(0, 100, 50, 50)?);
        assert_eq!(analysis.score.hard, 0);
        Ok(())
    }
}
