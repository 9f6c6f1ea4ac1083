use crate::core::{HardSoftScore, Schedule, SearchEngine, SolveContext};
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A change of the assignment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Move {
    /// Reassigns a task.
    Change { task: usize, resource: Option<usize> },
    /// Exchanges the resources of two tasks.
    Swap { first: usize, second: usize },
}

impl Move {
    /// Applies the move and returns the move that undoes it.
    fn apply(self, schedule: &mut Schedule) -> Result<Self> {
        match self {
            Self::Change { task, resource } => {
                let previous = schedule.tasks()[task].resource();
                schedule.assign(task, resource)?;
                Ok(Self::Change {
                    task,
                    resource: previous,
                })
            }
            Self::Swap { first, second } => {
                let a = schedule.tasks()[first].resource();
                let b = schedule.tasks()[second].resource();
                schedule.assign(first, b)?;
                schedule.assign(second, a)?;
                Ok(self)
            }
        }
    }
}

type Neighborhood<'a> = dyn Iterator<Item = Move> + 'a;

/// Neighborhood that moves a task to another resource.
struct ChangeResource<'a> {
    schedule: &'a Schedule,
    task: usize,
    resource: usize,
}

/// Creates a new instance of `ChangeResource` neighborhood.
fn change_resource(schedule: &Schedule) -> Box<Neighborhood<'_>> {
    Box::new(ChangeResource {
        schedule,
        task: 0,
        resource: 0,
    })
}

impl Iterator for ChangeResource<'_> {
    type Item = Move;

    fn next(&mut self) -> Option<Self::Item> {
        while self.task < self.schedule.tasks().len() {
            while self.resource < self.schedule.resources().len() {
                let resource = self.resource;
                self.resource += 1;

                if self.schedule.tasks()[self.task].resource() != Some(resource) {
                    return Some(Move::Change {
                        task: self.task,
                        resource: Some(resource),
                    });
                }
            }
            self.task += 1;
            self.resource = 0;
        }
        None
    }
}

/// Neighborhood that swaps two tasks assigned to different resources.
struct SwapResources<'a> {
    schedule: &'a Schedule,
    first: usize,
    second: usize,
}

/// Creates a new instance of `SwapResources` neighborhood.
fn swap_resources(schedule: &Schedule) -> Box<Neighborhood<'_>> {
    Box::new(SwapResources {
        schedule,
        first: 0,
        second: 1,
    })
}

impl Iterator for SwapResources<'_> {
    type Item = Move;

    fn next(&mut self) -> Option<Self::Item> {
        let tasks = self.schedule.tasks();

        while self.first + 1 < tasks.len() {
            while self.second < tasks.len() {
                let second = self.second;
                self.second += 1;

                if tasks[self.first].resource() != tasks[second].resource() {
                    return Some(Move::Swap {
                        first: self.first,
                        second,
                    });
                }
            }
            self.first += 1;
            self.second = self.first + 1;
        }
        None
    }
}

/// Best improvement descent over all neighborhoods. Returns the score of the local optimum.
fn neighborhood_search(
    schedule: &mut Schedule,
    context: &SolveContext<'_>,
) -> Result<HardSoftScore> {
    let factories = [change_resource, swap_resources];
    let director = *context.director();
    let mut score = director.score(schedule);

    let mut k = 0;

    while k < factories.len() && !context.should_terminate() {
        let moves: Vec<Move> = factories[k](schedule).collect();
        let mut best_move = None;

        for candidate in moves {
            let undo = candidate.apply(schedule)?;
            let candidate_score = director.score(schedule);
            undo.apply(schedule)?;

            if candidate_score > score {
                score = candidate_score;
                best_move = Some(candidate);
            }
        }

        if let Some(best_move) = best_move {
            best_move.apply(schedule)?;
            k = 0;
        } else {
            k += 1;
        }
    }

    Ok(score)
}

/// Variable Neighborhood Search started from the greedy construction.
/// Every round shakes the best schedule with random reassignments and descends again;
/// the shake grows by one task after every round without improvement.
#[derive(Clone, Debug)]
pub struct VariableNeighborhoodSearch {
    rng: StdRng,
}

impl VariableNeighborhoodSearch {
    /// Creates a new instance of `VariableNeighborhoodSearch`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Reassigns `strength` random tasks to random resources.
    fn shake(&mut self, schedule: &mut Schedule, strength: usize) -> Result<()> {
        let tasks = schedule.tasks().len();
        let resources = schedule.resources().len();

        for _ in 0..strength {
            let task = self.rng.gen_range(0..tasks);
            let resource = self.rng.gen_range(0..resources);
            Move::Change {
                task,
                resource: Some(resource),
            }
            .apply(schedule)?;
        }

        Ok(())
    }
}

impl Default for VariableNeighborhoodSearch {
    fn default() -> Self {
        Self {
            rng: StdRng::from_rng(rand::thread_rng()).unwrap_or_else(|_| StdRng::seed_from_u64(0)),
        }
    }
}

impl SearchEngine for VariableNeighborhoodSearch {
    fn solve(&mut self, mut schedule: Schedule, context: &mut SolveContext<'_>) -> Result<()> {
        super::list::construct(&mut schedule)?;
        context.offer(&schedule);

        // a single resource leaves nothing to choose
        if schedule.tasks().is_empty() || schedule.resources().len() < 2 {
            return Ok(());
        }

        let mut best_score = neighborhood_search(&mut schedule, context)?;
        context.offer(&schedule);

        let mut strength = 1;
        while !context.should_terminate() {
            let mut candidate = schedule.clone();
            self.shake(&mut candidate, strength)?;

            let score = neighborhood_search(&mut candidate, context)?;
            if score > best_score {
                best_score = score;
                schedule = candidate;
                context.offer(&schedule);
                strength = 1;
            } else {
                strength = strength % schedule.tasks().len() + 1;
            }
        }

        Ok(())
    }

    fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn name(&self) -> &'static str {
        "VNS"
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::SEARCH_ENGINES)]
static INSTANCE: fn() -> Box<dyn SearchEngine> = || Box::new(VariableNeighborhoodSearch::default());
