//! Crop task templates served under `/templates`.
//!
//! A template is a named plan of task definitions, each offset from a start
//! day. Applying one on the server creates a calendar task per definition.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::task::{NewTask, Priority, TaskKind};

/// One task definition inside a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTask {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub description: Option<String>,
    /// Offset from the start day the template is applied with.
    pub days_from_start: u32,
    #[serde(default)]
    pub priority: Priority,
}

/// A crop and season plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Slug such as `rice_monsoon`.
    pub id: String,
    pub name: String,
    pub description: String,
    pub crop_type: String,
    pub season: String,
    pub tasks: Vec<TemplateTask>,
    pub created_at: NaiveDateTime,
}

impl TaskTemplate {
    /// The tasks the server creates when this template is applied on `start`.
    #[must_use]
    pub fn schedule(&self, start: NaiveDate) -> Vec<NewTask> {
        self.tasks
            .iter()
            .map(|def| {
                let date = start
                    .checked_add_days(Days::new(u64::from(def.days_from_start)))
                    .unwrap_or(NaiveDate::MAX);
                NewTask::new(def.title.clone(), def.kind.clone(), date)
                    .with_description(def.description.clone().unwrap_or_default())
                    .with_priority(def.priority.clone())
            })
            .collect()
    }
}

/// Templates grouped by season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCategory {
    pub name: String,
    pub description: String,
    pub templates: Vec<TaskTemplate>,
}

/// Response of `GET /templates/categories`, keyed by season slug.
pub type TemplateCategories = BTreeMap<String, TemplateCategory>;

/// Response of `POST /templates/apply/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateApplied {
    pub message: String,
    pub tasks_created: usize,
    pub start_date: NaiveDate,
    pub template_name: String,
}
