use super::HardSoftScore;
use crate::{Error, Result};
use ahash::{HashSet, HashSetExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// A resource tasks can be assigned to. Problem fact, never changed while solving.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Resource {
    pub name: String,
    pub capacity: u64,
    pub skills: BTreeSet<String>,
}

impl Resource {
    /// Creates a new resource.
    #[must_use]
    pub fn new<S, I>(name: impl Into<String>, capacity: u64, skills: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        Self {
            name: name.into(),
            capacity,
            skills: skills.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns whether the resource can perform a task requiring `skill`.
    /// An empty skill is satisfied by every resource.
    #[must_use]
    pub fn has_skill(&self, skill: &str) -> bool {
        skill.is_empty() || self.skills.contains(skill)
    }
}

/// A task to be assigned. The assigned resource is the planning variable and
/// is stored as an index into the resources of the owning [`Schedule`].
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub duration: u64,
    pub required_skill: String,
    resource: Option<usize>,
}

impl Task {
    /// Creates a new unassigned task without a skill requirement.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, duration: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            duration,
            required_skill: String::new(),
            resource: None,
        }
    }

    /// Sets the required skill.
    #[must_use]
    pub fn with_required_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skill = skill.into();
        self
    }

    /// Assigns the task to the resource with the given index.
    /// The index is validated when the task is put into a [`Schedule`].
    #[must_use]
    pub fn assigned_to(mut self, resource: usize) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Returns whether both tasks are equal apart from their assignment.
    fn same_facts(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.duration == other.duration
            && self.required_skill == other.required_skill
    }

    /// Returns the index of the assigned resource.
    #[must_use]
    pub const fn resource(&self) -> Option<usize> {
        self.resource
    }
}

/// Lifecycle of a solve job as seen by the job manager.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolverStatus {
    #[default]
    NotSolving,
    SolvingScheduled,
    SolvingActive,
    Terminated,
}

impl Display for SolverStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotSolving => "NOT_SOLVING",
            Self::SolvingScheduled => "SOLVING_SCHEDULED",
            Self::SolvingActive => "SOLVING_ACTIVE",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// The planning solution: resources, tasks and their assignment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Schedule {
    resources: Vec<Resource>,
    tasks: Vec<Task>,
    pub score: Option<HardSoftScore>,
    pub solver_status: SolverStatus,
}

impl Schedule {
    /// Creates a new schedule.
    ///
    /// # Errors
    /// - If two resources share a name.
    /// - If two tasks share an id.
    /// - If a task is assigned to a resource index outside of `resources`.
    pub fn new(resources: Vec<Resource>, tasks: Vec<Task>) -> Result<Self> {
        let mut names = HashSet::with_capacity(resources.len());
        if let Some(resource) = resources.iter().find(|r| !names.insert(r.name.as_str())) {
            return Err(Error::DuplicateResource(resource.name.clone()));
        }

        let mut ids = HashSet::with_capacity(tasks.len());
        if let Some(task) = tasks.iter().find(|t| !ids.insert(t.id.as_str())) {
            return Err(Error::DuplicateTask(task.id.clone()));
        }

        let out_of_range = tasks
            .iter()
            .find_map(|t| t.resource.filter(|&r| r >= resources.len()).map(|r| (t, r)));
        if let Some((task, index)) = out_of_range {
            return Err(Error::ResourceOutOfRange {
                task: task.id.clone(),
                index,
                resources: resources.len(),
            });
        }

        Ok(Self {
            resources,
            tasks,
            score: None,
            solver_status: SolverStatus::NotSolving,
        })
    }

    /// Returns the resources.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Returns the tasks.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns the resource the task is assigned to.
    #[must_use]
    pub fn resource_of(&self, task: &Task) -> Option<&Resource> {
        task.resource.and_then(|index| self.resources.get(index))
    }

    /// Assigns a task to a resource, or unassigns it with `None`.
    /// Invalidates the score.
    ///
    /// # Errors
    /// - If the resource index is out of range.
    ///
    /// # Panics
    /// - If the task index is out of range.
    pub fn assign(&mut self, task: usize, resource: Option<usize>) -> Result<()> {
        if let Some(index) = resource.filter(|&r| r >= self.resources.len()) {
            return Err(Error::ResourceOutOfRange {
                task: self.tasks[task].id.clone(),
                index,
                resources: self.resources.len(),
            });
        }
        self.tasks[task].resource = resource;
        self.score = None;
        Ok(())
    }

    /// Returns the total duration assigned to every resource, indexed like `resources`.
    /// Idle resources have a load of zero. Sums saturate at `u64::MAX`.
    #[must_use]
    pub fn loads(&self) -> Vec<u64> {
        let mut loads = vec![0u64; self.resources.len()];
        for task in &self.tasks {
            if let Some(resource) = task.resource {
                loads[resource] = loads[resource].saturating_add(task.duration);
            }
        }
        loads
    }

    /// Returns whether both schedules describe the same problem: equal resources
    /// and equal tasks in the same order. Assignments may differ.
    #[must_use]
    pub fn same_problem(&self, other: &Self) -> bool {
        self.resources == other.resources
            && self.tasks.len() == other.tasks.len()
            && self.tasks.iter().zip(&other.tasks).all(|(a, b)| a.same_facts(b))
    }

    /// Returns the schedule with the given solver status.
    #[must_use]
    pub fn with_status(mut self, status: SolverStatus) -> Self {
        self.solver_status = status;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn alice() -> Resource {
        Resource::new("Alice", 100, ["python", "sql"])
    }

    fn bob() -> Resource {
        Resource::new("Bob", 50, ["java"])
    }

    #[test]
    fn empty_skill_is_always_held() {
        assert!(alice().has_skill(""));
        assert!(alice().has_skill("python"));
        assert!(!bob().has_skill("python"));
    }

    #[test]
    fn schedule_should_reject_duplicates() {
        let result = Schedule::new(vec![alice(), alice()], vec![]);
        assert!(matches!(result, Err(Error::DuplicateResource(name)) if name == "Alice"));

        let tasks = vec![Task::new("1", "a", 1), Task::new("1", "b", 2)];
        let result = Schedule::new(vec![alice()], tasks);
        assert!(matches!(result, Err(Error::DuplicateTask(id)) if id == "1"));
    }

    #[test]
    fn schedule_should_reject_dangling_assignment() {
        let tasks = vec![Task::new("1", "a", 1).assigned_to(2)];
        let result = Schedule::new(vec![alice(), bob()], tasks);
        assert!(matches!(result, Err(Error::ResourceOutOfRange { index: 2, .. })));
    }

    #[test]
    fn loads_include_idle_resources() -> anyhow::Result<()> {
        let tasks = vec![
            Task::new("1", "a", 30).assigned_to(1),
            Task::new("2", "b", 40).assigned_to(1),
            Task::new("3", "c", 99),
        ];
        let schedule = Schedule::new(vec![alice(), bob()], tasks)?;
        assert_eq!(schedule.loads(), vec![0, 70]);
        Ok(())
    }

    #[test]
    fn assign_should_validate_resource() -> anyhow::Result<()> {
        let mut schedule = Schedule::new(vec![alice()], vec![Task::new("1", "a", 30)])?;
        schedule.score = Some(HardSoftScore::ZERO);

        schedule.assign(0, Some(0))?;
        assert_eq!(schedule.tasks()[0].resource(), Some(0));
        assert_eq!(schedule.resource_of(&schedule.tasks()[0]), Some(&alice()));
        assert_eq!(schedule.score, None);

        assert!(schedule.assign(0, Some(1)).is_err());
        assert_eq!(schedule.tasks()[0].resource(), Some(0));
        Ok(())
    }

    #[test]
    fn same_problem_ignores_assignment() -> anyhow::Result<()> {
        let schedule = Schedule::new(vec![alice(), bob()], vec![Task::new("1", "a", 30)])?;
        let mut candidate = schedule.clone();
        candidate.assign(0, Some(1))?;
        assert!(schedule.same_problem(&candidate));

        let other = Schedule::new(vec![alice()], vec![Task::new("1", "a", 30)])?;
        assert!(!schedule.same_problem(&other));
        Ok(())
    }

    #[test]
    fn same_problem_compares_task_facts() -> anyhow::Result<()> {
        let resources = vec![alice(), bob()];
        let schedule = Schedule::new(resources.clone(), vec![Task::new("1", "a", 30)])?;

        let longer = Schedule::new(resources.clone(), vec![Task::new("1", "a", 31)])?;
        let renamed = Schedule::new(resources.clone(), vec![Task::new("1", "b", 30)])?;
        let skilled = Task::new("1", "a", 30).with_required_skill("java");
        let skilled = Schedule::new(resources, vec![skilled])?;

        assert!(!schedule.same_problem(&longer));
        assert!(!schedule.same_problem(&renamed));
        assert!(!schedule.same_problem(&skilled));
        Ok(())
    }

    #[test]
    fn loads_saturate() -> anyhow::Result<()> {
        let huge = u64::MAX / 2 + 1;
        let tasks = vec![
            Task::new("1", "a", huge).assigned_to(0),
            Task::new("2", "b", huge).assigned_to(0),
        ];
        let schedule = Schedule::new(vec![alice()], tasks)?;
        assert_eq!(schedule.loads(), vec![u64::MAX]);
        Ok(())
    }
}
