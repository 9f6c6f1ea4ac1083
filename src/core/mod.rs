mod constraints;
mod context;
mod problem;
mod score;

pub use constraints::*;
pub use context::*;
pub use problem::*;
pub use score::*;

/// Improves the assignment of a schedule.
///
/// An engine reports every improved candidate through [`SolveContext::offer`]
/// and returns once [`SolveContext::should_terminate`] holds or it cannot
/// improve any further.
pub trait SearchEngine: Send {
    /// Searches for better assignments of the given schedule.
    ///
    /// # Errors
    /// - If the engine produced an invalid assignment.
    fn solve(&mut self, schedule: Schedule, context: &mut SolveContext<'_>) -> crate::Result<()>;

    /// Seeds the random number generator of the engine, if it has one.
    fn seed(&mut self, _seed: u64) {}

    /// Returns the name of the engine.
    fn name(&self) -> &'static str;
}
