use crate::core::{Resource, Schedule, Task};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Generated demo datasets.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemoData {
    /// 3 resources, 10 tasks.
    Small,
    /// 5 resources, 25 tasks. Total capacity 700, total duration close to it.
    Medium,
}

impl DemoData {
    pub const ALL: [Self; 2] = [Self::Small, Self::Medium];

    /// Returns the identifier of the dataset.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Small => "SMALL",
            Self::Medium => "MEDIUM",
        }
    }

    /// Generates the dataset with every task unassigned.
    ///
    /// # Errors
    /// - Never for the built-in datasets; kept for the invariants checked by [`Schedule::new`].
    pub fn generate(self) -> Result<Schedule> {
        match self {
            Self::Small => small(),
            Self::Medium => medium(),
        }
    }
}

impl FromStr for DemoData {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|data| data.id() == id)
            .ok_or_else(|| Error::DatasetNotFound(id.into()))
    }
}

fn small() -> Result<Schedule> {
    let resources = vec![
        Resource::new("Alice", 100, ["python", "sql"]),
        Resource::new("Bob", 120, ["python", "java"]),
        Resource::new("Charlie", 80, ["sql", "java"]),
    ];

    let tasks = [
        ("Data Pipeline", 30, "python"),
        ("API Development", 45, "python"),
        ("Database Schema", 20, "sql"),
        ("Query Optimization", 35, "sql"),
        ("Backend Service", 50, "java"),
        ("Data Analysis", 25, "python"),
        ("Report Generation", 15, "sql"),
        ("Integration Tests", 40, "java"),
        ("Code Review", 20, ""),
        ("Documentation", 15, ""),
    ];
    let tasks = tasks
        .into_iter()
        .enumerate()
        .map(|(i, (name, duration, skill))| {
            Task::new(format!("task-{}", i + 1), name, duration).with_required_skill(skill)
        })
        .collect();

    Schedule::new(resources, tasks)
}

fn medium() -> Result<Schedule> {
    const SKILLS: [&str; 7] = ["python", "sql", "java", "ml", "devops", "frontend", ""];

    let resources = vec![
        Resource::new("Alice", 150, ["python", "sql", "ml"]),
        Resource::new("Bob", 140, ["python", "java", "devops"]),
        Resource::new("Charlie", 130, ["sql", "java", "frontend"]),
        Resource::new("Diana", 160, ["python", "ml", "devops"]),
        Resource::new("Eve", 120, ["frontend", "java", "sql"]),
    ];

    let tasks = (0..25u64)
        .zip(SKILLS.into_iter().cycle())
        .map(|(i, skill)| {
            let duration = 15 + (i * 3) % 25;
            Task::new(format!("task-{}", i + 1), format!("Task {}", i + 1), duration)
                .with_required_skill(skill)
        })
        .collect();

    Schedule::new(resources, tasks)
}
