//! JSON documents exchanged with clients.
//!
//! Resources are referenced by name in documents and by index in a [`Schedule`];
//! names are resolved on decode and flattened back on encode.

mod demo;
mod run;

pub use demo::*;
pub use run::*;

use crate::core::{ConstraintWeights, HardSoftScore, Resource, Schedule, SolverStatus, Task};
use crate::{Error, Result};
use ahash::{HashMap, HashMapExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::io::BufRead;

const fn default_capacity() -> u64 {
    100
}

/// A resource as it appears in a schedule document.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDocument {
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: u64,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// A task as it appears in a schedule document, referencing its resource by name.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    pub id: String,
    pub name: String,
    pub duration: u64,
    #[serde(default)]
    pub required_skill: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// A schedule document. Submitted documents may carry constraint weights.
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDocument {
    pub resources: Vec<ResourceDocument>,
    pub tasks: Vec<TaskDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<HardSoftScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solver_status: Option<SolverStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_weights: Option<ConstraintWeights>,
}

impl ScheduleDocument {
    /// Resolves the document into a schedule.
    ///
    /// # Errors
    /// - If two resources share a name or two tasks share an id.
    /// - If a task references a resource name that is not in the document.
    pub fn into_schedule(self) -> Result<Schedule> {
        let mut indices = HashMap::with_capacity(self.resources.len());
        let mut resources = Vec::with_capacity(self.resources.len());

        for resource in self.resources {
            match indices.entry(resource.name.clone()) {
                Entry::Occupied(_) => return Err(Error::DuplicateResource(resource.name)),
                Entry::Vacant(entry) => entry.insert(resources.len()),
            };
            resources.push(Resource::new(resource.name, resource.capacity, resource.skills));
        }

        let tasks = self
            .tasks
            .into_iter()
            .map(|document| {
                let task = Task::new(document.id, document.name, document.duration)
                    .with_required_skill(document.required_skill);
                match document.resource {
                    None => Ok(task),
                    Some(name) => match indices.get(&name) {
                        Some(&index) => Ok(task.assigned_to(index)),
                        None => Err(Error::UnknownResource {
                            task: task.id,
                            resource: name,
                        }),
                    },
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut schedule = Schedule::new(resources, tasks)?;
        schedule.score = self.score;
        Ok(schedule)
    }
}

impl From<&Schedule> for ScheduleDocument {
    fn from(schedule: &Schedule) -> Self {
        let resources = schedule
            .resources()
            .iter()
            .map(|resource| ResourceDocument {
                name: resource.name.clone(),
                capacity: resource.capacity,
                skills: resource.skills.iter().cloned().collect(),
            })
            .collect();

        let tasks = schedule
            .tasks()
            .iter()
            .map(|task| TaskDocument {
                id: task.id.clone(),
                name: task.name.clone(),
                duration: task.duration,
                required_skill: task.required_skill.clone(),
                resource: schedule.resource_of(task).map(|r| r.name.clone()),
            })
            .collect();

        Self {
            resources,
            tasks,
            score: schedule.score,
            solver_status: Some(schedule.solver_status),
            constraint_weights: None,
        }
    }
}

/// Decodes a JSON value from the reader.
///
/// # Errors
/// - If the input is not valid JSON for `T`.
pub fn deserialize<T: DeserializeOwned>(reader: &mut impl BufRead) -> Result<T> {
    Ok(serde_json::from_reader(reader)?)
}

/// Encodes a value as pretty printed JSON.
///
/// # Errors
/// - If the value cannot be represented as JSON.
pub fn to_string<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Decodes a schedule document from the reader, returning the schedule and
/// the weights it carries, or the default weights.
///
/// # Errors
/// - If the document is malformed or references unknown resources.
pub fn read_schedule(reader: &mut impl BufRead) -> Result<(Schedule, ConstraintWeights)> {
    let document: ScheduleDocument = deserialize(reader)?;
    let weights = document.constraint_weights.unwrap_or_default();
    Ok((document.into_schedule()?, weights))
}
