use crate::core::{Schedule, SearchEngine, SolveContext};
use crate::Result;
use std::cmp::Reverse;

/// Assigns every unassigned task, longest first, to the least loaded resource
/// that holds the required skill and still has room for it. Tasks nobody can take
/// go to the least loaded skilled resource, then to the least loaded one.
/// Tasks that are already assigned keep their resource.
pub(super) fn construct(schedule: &mut Schedule) -> Result<()> {
    if schedule.resources().is_empty() {
        return Ok(());
    }

    let mut loads = schedule.loads();

    let mut tasks: Vec<usize> = (0..schedule.tasks().len())
        .filter(|&i| schedule.tasks()[i].resource().is_none())
        .collect();
    tasks.sort_by_key(|&i| Reverse(schedule.tasks()[i].duration));

    for task in tasks {
        let duration = schedule.tasks()[task].duration;
        let skill = &schedule.tasks()[task].required_skill;

        let chosen = schedule
            .resources()
            .iter()
            .enumerate()
            .min_by_key(|&(i, resource)| {
                let unskilled = !resource.has_skill(skill);
                let overflows = loads[i].saturating_add(duration) > resource.capacity;
                (unskilled, overflows, loads[i], i)
            })
            .map(|(i, _)| i);

        if let Some(resource) = chosen {
            schedule.assign(task, Some(resource))?;
            loads[resource] = loads[resource].saturating_add(duration);
        }
    }

    Ok(())
}

/// Greedy construction. Reports a single candidate.
#[derive(Clone, Debug, Default)]
pub struct Greedy;

impl SearchEngine for Greedy {
    fn solve(&mut self, mut schedule: Schedule, context: &mut SolveContext<'_>) -> Result<()> {
        construct(&mut schedule)?;
        context.offer(&schedule);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Greedy"
    }
}

#[allow(unsafe_code)]
#[linkme::distributed_slice(super::SEARCH_ENGINES)]
static INSTANCE: fn() -> Box<dyn SearchEngine> = || Box::new(Greedy);

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::{
        Constraint, ConstraintWeights, HardSoftScore, Resource, ScoreDirector, Task, Termination,
    };
    use crate::data::DemoData;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn construct_assigns_every_task() -> anyhow::Result<()> {
        let mut schedule = DemoData::Small.generate()?;
        construct(&mut schedule)?;

        assert!(schedule.tasks().iter().all(|t| t.resource().is_some()));
        for task in schedule.tasks() {
            let resource = schedule.resource_of(task);
            assert!(resource.is_some_and(|r| r.has_skill(&task.required_skill)));
        }
        let director = ScoreDirector::new(ConstraintWeights::default());
        let skills = director.contribution(Constraint::RequiredSkill, &schedule);
        assert_eq!(skills, HardSoftScore::ZERO);
        Ok(())
    }

    #[test]
    fn construct_keeps_existing_assignments() -> anyhow::Result<()> {
        let resources = vec![
            Resource::new("Alice", 100, ["python"]),
            Resource::new("Bob", 100, ["python"]),
        ];
        let tasks = vec![
            Task::new("1", "Pinned", 10).assigned_to(1),
            Task::new("2", "Free", 10).with_required_skill("python"),
        ];
        let mut schedule = Schedule::new(resources, tasks)?;
        construct(&mut schedule)?;

        assert_eq!(schedule.tasks()[0].resource(), Some(1));
        assert_eq!(schedule.tasks()[1].resource(), Some(0));
        Ok(())
    }

    #[test]
    fn construct_falls_back_when_nobody_is_skilled() -> anyhow::Result<()> {
        let resources = vec![Resource::new("Alice", 10, ["sql"])];
        let tasks = vec![Task::new("1", "Task", 45).with_required_skill("python")];
        let mut schedule = Schedule::new(resources, tasks)?;
        construct(&mut schedule)?;

        assert_eq!(schedule.tasks()[0].resource(), Some(0));
        Ok(())
    }

    #[test]
    fn construct_handles_huge_durations() -> anyhow::Result<()> {
        let huge = u64::MAX / 2 + 1;
        let resources = vec![Resource::new("Alice", 10, ["python"])];
        let tasks = vec![Task::new("1", "a", huge), Task::new("2", "b", huge)];
        let mut schedule = Schedule::new(resources, tasks)?;
        construct(&mut schedule)?;

        assert!(schedule.tasks().iter().all(|t| t.resource() == Some(0)));
        assert_eq!(schedule.loads(), vec![u64::MAX]);
        Ok(())
    }

    #[test]
    fn construct_without_resources_leaves_tasks_unassigned() -> anyhow::Result<()> {
        let mut schedule = Schedule::new(Vec::new(), vec![Task::new("1", "Task", 5)])?;
        construct(&mut schedule)?;
        assert_eq!(schedule.tasks()[0].resource(), None);
        Ok(())
    }

    #[test]
    fn greedy_reports_once() -> anyhow::Result<()> {
        let stop = AtomicBool::new(false);
        let mut reported = Vec::new();
        let mut listener = |schedule: Schedule| reported.push(schedule);
        let director = ScoreDirector::new(ConstraintWeights::default());
        let mut context = SolveContext::new(director, Termination::default(), &stop, &mut listener);

        Greedy.solve(DemoData::Medium.generate()?, &mut context)?;
        let best = context.best_score();

        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].score, best);
        assert!(best.is_some_and(|score| score.soft < 0));
        Ok(())
    }
}
