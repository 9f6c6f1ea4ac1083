use super::{HardSoftScore, Schedule, ScoreDirector};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// When a search run stops on its own.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Termination {
    /// Wall clock budget of the whole run.
    pub spent_limit: Duration,
    /// Stop early when no better candidate was found for this long.
    pub unimproved_spent_limit: Option<Duration>,
}

impl Termination {
    /// Creates a termination with only a wall clock budget.
    #[must_use]
    pub const fn new(spent_limit: Duration) -> Self {
        Self {
            spent_limit,
            unimproved_spent_limit: None,
        }
    }

    /// Sets the unimproved time limit.
    #[must_use]
    pub const fn with_unimproved(mut self, limit: Duration) -> Self {
        self.unimproved_spent_limit = Some(limit);
        self
    }
}

impl Default for Termination {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Everything a search engine talks to during one run: the scoring function,
/// the stop signal, the time limits and the listener of improved candidates.
pub struct SolveContext<'a> {
    director: ScoreDirector,
    termination: Termination,
    stop: &'a AtomicBool,
    started: Instant,
    last_improvement: Instant,
    best: Option<HardSoftScore>,
    listener: &'a mut dyn FnMut(Schedule),
}

impl<'a> SolveContext<'a> {
    /// Creates a new context. The clock starts now.
    pub fn new(
        director: ScoreDirector,
        termination: Termination,
        stop: &'a AtomicBool,
        listener: &'a mut dyn FnMut(Schedule),
    ) -> Self {
        let now = Instant::now();
        Self {
            director,
            termination,
            stop,
            started: now,
            last_improvement: now,
            best: None,
            listener,
        }
    }

    /// Returns the scoring function of the run.
    #[must_use]
    pub const fn director(&self) -> &ScoreDirector {
        &self.director
    }

    /// Returns the best score reported so far.
    #[must_use]
    pub const fn best_score(&self) -> Option<HardSoftScore> {
        self.best
    }

    /// Returns whether the run was asked to stop or ran out of time.
    #[must_use]
    pub fn should_terminate(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
            || self.started.elapsed() >= self.termination.spent_limit
            || self
                .termination
                .unimproved_spent_limit
                .is_some_and(|limit| self.last_improvement.elapsed() >= limit)
    }

    /// Scores the candidate and reports it to the listener if it beats the best so far.
    /// The first candidate is always reported. Returns whether it was reported.
    pub fn offer(&mut self, candidate: &Schedule) -> bool {
        let score = self.director.score(candidate);

        if self.best.is_some_and(|best| score <= best) {
            return false;
        }

        self.best = Some(score);
        self.last_improvement = Instant::now();

        let mut improved = candidate.clone();
        improved.score = Some(score);
        (self.listener)(improved);
        true
    }
}

impl std::fmt::Debug for SolveContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolveContext")
            .field("director", &self.director)
            .field("termination", &self.termination)
            .field("stop", &self.stop)
            .field("best", &self.best)
            .finish_non_exhaustive()
    }
}
