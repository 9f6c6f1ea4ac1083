use super::{HardSoftScore, Resource, Schedule, Task};
use crate::{cast_i64, Error};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Strength of a constraint in percent. Zero disables the constraint.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Weight(u8);

impl Weight {
    pub const DISABLED: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// Creates a weight. Returns `None` above 100.
    #[must_use]
    pub const fn new(percent: u8) -> Option<Self> {
        if percent <= 100 {
            Some(Self(percent))
        } else {
            None
        }
    }

    /// Returns the weight in percent.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns whether the constraint is enabled.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        self.0 > 0
    }

    /// Scales a penalty, rounding down.
    #[must_use]
    pub const fn scale(self, penalty: u64) -> u64 {
        penalty.saturating_mul(self.0 as u64) / 100
    }

    /// Scales a penalty, rounding up.
    #[must_use]
    pub const fn scale_up(self, penalty: u64) -> u64 {
        penalty.saturating_mul(self.0 as u64).div_ceil(100)
    }

    fn parse(name: &'static str, value: Option<i64>, default: Self) -> Result<Self, Error> {
        let Some(value) = value else {
            return Ok(default);
        };
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(Error::InvalidWeight { name, value })
    }
}

/// Weights of the four constraints, captured per solve job.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", try_from = "RawWeights")]
pub struct ConstraintWeights {
    pub required_skill: Weight,
    pub resource_capacity: Weight,
    pub minimize_duration: Weight,
    pub balance_load: Weight,
}

impl ConstraintWeights {
    /// Creates a weight configuration from percentages.
    ///
    /// # Errors
    /// - If any of the weights is above 100.
    pub fn new(
        required_skill: u8,
        resource_capacity: u8,
        minimize_duration: u8,
        balance_load: u8,
    ) -> Result<Self, Error> {
        RawWeights {
            required_skill: Some(required_skill.into()),
            resource_capacity: Some(resource_capacity.into()),
            minimize_duration: Some(minimize_duration.into()),
            balance_load: Some(balance_load.into()),
        }
        .try_into()
    }

    /// Returns the weight of the given constraint.
    #[must_use]
    pub const fn get(&self, constraint: Constraint) -> Weight {
        match constraint {
            Constraint::RequiredSkill => self.required_skill,
            Constraint::ResourceCapacity => self.resource_capacity,
            Constraint::MinimizeDuration => self.minimize_duration,
            Constraint::BalanceLoad => self.balance_load,
        }
    }
}

impl Default for ConstraintWeights {
    fn default() -> Self {
        Self {
            required_skill: Weight::FULL,
            resource_capacity: Weight::FULL,
            minimize_duration: Weight(50),
            balance_load: Weight(50),
        }
    }
}

/// Weights as they arrive on the wire. Missing fields take the default.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWeights {
    required_skill: Option<i64>,
    resource_capacity: Option<i64>,
    minimize_duration: Option<i64>,
    balance_load: Option<i64>,
}

impl TryFrom<RawWeights> for ConstraintWeights {
    type Error = Error;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        let default = Self::default();
        Ok(Self {
            required_skill: Weight::parse(
                "requiredSkill",
                raw.required_skill,
                default.required_skill,
            )?,
            resource_capacity: Weight::parse(
                "resourceCapacity",
                raw.resource_capacity,
                default.resource_capacity,
            )?,
            minimize_duration: Weight::parse(
                "minimizeDuration",
                raw.minimize_duration,
                default.minimize_duration,
            )?,
            balance_load: Weight::parse("balanceLoad", raw.balance_load, default.balance_load)?,
        })
    }
}

/// Dispersion statistic over per-resource loads used by the load balancing rule.
/// Variants are versioned, a new formula gets a new variant.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Unfairness {
    /// `sqrt(sum((load - mean)^2))`, rounded down.
    #[default]
    SquaredDeviationV1,
    /// Population standard deviation `sqrt(sum((load - mean)^2) / n)`, rounded down.
    StandardDeviationV1,
}

impl Unfairness {
    /// Measures the unfairness of the given loads. Equal loads measure zero.
    #[must_use]
    pub fn measure(self, loads: &[u64]) -> u64 {
        if loads.is_empty() {
            return 0;
        }

        let n = crate::cast_u128(loads.len());
        let sum: u128 = loads.iter().map(|&load| u128::from(load)).sum();
        let squares = loads
            .iter()
            .map(|&load| u128::from(load) * u128::from(load))
            .fold(0u128, u128::saturating_add);

        // n * sum((x - mean)^2) == n * sum(x^2) - sum(x)^2
        let deviation = n.saturating_mul(squares).saturating_sub(sum.saturating_mul(sum));
        let denominator = match self {
            Self::SquaredDeviationV1 => n,
            Self::StandardDeviationV1 => n * n,
        };

        u64::try_from(floor_sqrt_ratio(deviation, denominator)).unwrap_or(u64::MAX)
    }
}

/// Largest `k` such that `k * k * denominator <= numerator`.
fn floor_sqrt_ratio(numerator: u128, denominator: u128) -> u128 {
    let fits = |k: u128| {
        k.checked_mul(k)
            .and_then(|square| square.checked_mul(denominator))
            .is_some_and(|value| value <= numerator)
    };

    let (mut low, mut high) = (0u128, u128::from(u64::MAX) + 1);
    while low + 1 < high {
        let middle = low + (high - low) / 2;
        if fits(middle) {
            low = middle;
        } else {
            high = middle;
        }
    }
    low
}

/// Score level a constraint penalizes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Level {
    Hard,
    Soft,
}

/// The constraints of the model, in evaluation order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Constraint {
    RequiredSkill,
    ResourceCapacity,
    MinimizeDuration,
    BalanceLoad,
}

impl Constraint {
    pub const ALL: [Self; 4] = [
        Self::RequiredSkill,
        Self::ResourceCapacity,
        Self::MinimizeDuration,
        Self::BalanceLoad,
    ];

    /// Returns the display name of the constraint.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RequiredSkill => "Required skill missing",
            Self::ResourceCapacity => "Resource capacity exceeded",
            Self::MinimizeDuration => "Minimize total duration",
            Self::BalanceLoad => "Balance resource load",
        }
    }

    /// Returns the level penalized by the constraint.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::RequiredSkill | Self::ResourceCapacity => Level::Hard,
            Self::MinimizeDuration | Self::BalanceLoad => Level::Soft,
        }
    }

    const fn unit(self) -> HardSoftScore {
        match self.level() {
            Level::Hard => HardSoftScore::ONE_HARD,
            Level::Soft => HardSoftScore::ONE_SOFT,
        }
    }

    fn penalize(self, penalty: u64) -> HardSoftScore {
        match self.level() {
            Level::Hard => HardSoftScore::of_hard(-cast_i64(penalty)),
            Level::Soft => HardSoftScore::of_soft(-cast_i64(penalty)),
        }
    }
}

/// What a constraint match is about.
enum Subject<'a> {
    Task(&'a Task, &'a Resource),
    Resource(&'a Resource, u64),
    Loads(&'a [Resource], &'a [u64], u64),
}

/// Pure scoring function of one solve job: constraint weights and the unfairness policy.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ScoreDirector {
    weights: ConstraintWeights,
    unfairness: Unfairness,
}

impl ScoreDirector {
    /// Creates a score director with the default unfairness policy.
    #[must_use]
    pub fn new(weights: ConstraintWeights) -> Self {
        Self {
            weights,
            unfairness: Unfairness::default(),
        }
    }

    /// Replaces the unfairness policy.
    #[must_use]
    pub const fn with_unfairness(mut self, unfairness: Unfairness) -> Self {
        self.unfairness = unfairness;
        self
    }

    /// Returns the constraint weights.
    #[must_use]
    pub const fn weights(&self) -> &ConstraintWeights {
        &self.weights
    }

    /// Calculates the score of the schedule.
    #[must_use]
    pub fn score(&self, schedule: &Schedule) -> HardSoftScore {
        let loads = schedule.loads();
        Constraint::ALL
            .into_iter()
            .map(|constraint| self.contribution_with(constraint, schedule, &loads))
            .sum()
    }

    /// Calculates the score and stores it in the schedule.
    pub fn score_and_set(&self, schedule: &mut Schedule) -> HardSoftScore {
        let score = self.score(schedule);
        schedule.score = Some(score);
        score
    }

    /// Returns the score contribution of a single constraint.
    #[must_use]
    pub fn contribution(&self, constraint: Constraint, schedule: &Schedule) -> HardSoftScore {
        self.contribution_with(constraint, schedule, &schedule.loads())
    }

    fn contribution_with(
        &self,
        constraint: Constraint,
        schedule: &Schedule,
        loads: &[u64],
    ) -> HardSoftScore {
        let mut penalty = 0u64;
        self.visit(constraint, schedule, loads, |value, _| {
            penalty = penalty.saturating_add(value);
        });
        constraint.penalize(penalty)
    }

    /// Breaks the score of the schedule down per constraint and per match.
    #[must_use]
    pub fn analyze(&self, schedule: &Schedule) -> ScoreAnalysis {
        let loads = schedule.loads();
        let constraints: Vec<_> = Constraint::ALL
            .into_iter()
            .map(|constraint| {
                let mut matches = Vec::new();
                self.visit(constraint, schedule, &loads, |penalty, subject| {
                    matches.push(ConstraintMatch {
                        name: constraint.name(),
                        score: constraint.penalize(penalty),
                        justification: justify(constraint, &subject),
                    });
                });

                let weight = if self.weights.get(constraint).is_enabled() {
                    constraint.unit()
                } else {
                    HardSoftScore::ZERO
                };

                ConstraintAnalysis {
                    name: constraint.name(),
                    weight,
                    score: matches.iter().map(|m| m.score).sum(),
                    matches,
                }
            })
            .collect();

        ScoreAnalysis {
            score: constraints.iter().map(|c| c.score).sum(),
            constraints,
        }
    }

    /// Calls `on_match` with the penalty of every non-zero match of the constraint.
    fn visit<'a, F>(
        &self,
        constraint: Constraint,
        schedule: &'a Schedule,
        loads: &'a [u64],
        mut on_match: F,
    )
    where
        F: FnMut(u64, Subject<'a>),
    {
        let weight = self.weights.get(constraint);
        if !weight.is_enabled() {
            return;
        }

        let assigned = schedule
            .tasks()
            .iter()
            .filter_map(|task| schedule.resource_of(task).map(|resource| (task, resource)));

        match constraint {
            Constraint::RequiredSkill => {
                for (task, resource) in assigned {
                    if !resource.has_skill(&task.required_skill) {
                        on_match(weight.scale_up(1), Subject::Task(task, resource));
                    }
                }
            }
            Constraint::ResourceCapacity => {
                for (resource, &load) in schedule.resources().iter().zip(loads) {
                    if load > resource.capacity {
                        let penalty = weight.scale(load - resource.capacity);
                        if penalty > 0 {
                            on_match(penalty, Subject::Resource(resource, load));
                        }
                    }
                }
            }
            Constraint::MinimizeDuration => {
                for (task, resource) in assigned {
                    let penalty = weight.scale(task.duration);
                    if penalty > 0 {
                        on_match(penalty, Subject::Task(task, resource));
                    }
                }
            }
            Constraint::BalanceLoad => {
                let unfairness = self.unfairness.measure(loads);
                let penalty = weight.scale(unfairness);
                if penalty > 0 {
                    on_match(penalty, Subject::Loads(schedule.resources(), loads, unfairness));
                }
            }
        }
    }
}

fn justify(constraint: Constraint, subject: &Subject<'_>) -> String {
    match (constraint, subject) {
        (Constraint::RequiredSkill, Subject::Task(task, resource)) => format!(
            "Task '{}' ({}) requires skill '{}' which {} does not have",
            task.id, task.name, task.required_skill, resource.name
        ),
        (_, Subject::Task(task, resource)) => format!(
            "Task '{}' ({}) takes {} on {}",
            task.id, task.name, task.duration, resource.name
        ),
        (_, Subject::Resource(resource, load)) => format!(
            "{} is assigned {load} against a capacity of {}",
            resource.name, resource.capacity
        ),
        (_, Subject::Loads(resources, loads, unfairness)) => {
            let mut text = String::from("Loads [");
            for (i, (resource, load)) in resources.iter().zip(loads.iter()).enumerate() {
                let separator = if i == 0 { "" } else { ", " };
                let _ = write!(text, "{separator}{}: {load}", resource.name);
            }
            let _ = write!(text, "] have unfairness {unfairness}");
            text
        }
    }
}

/// Calculates the score of the schedule under the given weights.
#[must_use]
pub fn score(schedule: &Schedule, weights: &ConstraintWeights) -> HardSoftScore {
    ScoreDirector::new(*weights).score(schedule)
}

/// Breaks the score of the schedule down under the given weights.
#[must_use]
pub fn analyze(schedule: &Schedule, weights: &ConstraintWeights) -> ScoreAnalysis {
    ScoreDirector::new(*weights).analyze(schedule)
}

/// Score breakdown of a schedule.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ScoreAnalysis {
    pub score: HardSoftScore,
    pub constraints: Vec<ConstraintAnalysis>,
}

impl ScoreAnalysis {
    /// Returns the analysis of the constraint with the given name.
    #[must_use]
    pub fn constraint(&self, constraint: Constraint) -> Option<&ConstraintAnalysis> {
        self.constraints.iter().find(|c| c.name == constraint.name())
    }
}

/// Contribution of one constraint to the score.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConstraintAnalysis {
    pub name: &'static str,
    pub weight: HardSoftScore,
    pub score: HardSoftScore,
    pub matches: Vec<ConstraintMatch>,
}

/// A single entity, or group of entities, penalized by a constraint.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ConstraintMatch {
    pub name: &'static str,
    pub score: HardSoftScore,
    pub justification: String,
}
