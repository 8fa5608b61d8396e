//! Core data model.
//!
//! A task is one filtered extraction request. Processing a task produces
//! sales records owned by that task.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Longest accepted company filter string.
pub const MAX_COMPANIES_LEN: usize = 100;

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A queued extraction request and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    pub status: TaskStatus,

    /// Inclusive lower bound on the sale year.
    pub start_year: i32,

    /// Inclusive upper bound on the sale year.
    pub end_year: i32,

    /// Comma-joined company allowlist. None means every company matches.
    pub companies: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Task {
    /// The allowlist split on commas, exactly as stored.
    ///
    /// Entries are neither trimmed nor case-folded, so `"Honda, Toyota"`
    /// yields `" Toyota"` and only matches a company spelled that way.
    pub fn company_list(&self) -> Option<Vec<String>> {
        self.companies
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.split(',').map(str::to_string).collect())
    }
}

/// Newtype for task IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(TaskId)
            .map_err(|_| Error::Validation(format!("invalid task id: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created and queued, not yet picked up by the worker.
    Pending,
    /// Worker is fetching and filtering records.
    InProgress,
    /// Records persisted. Terminal.
    Completed,
    /// Processing aborted. Terminal.
    Failed,
}

impl TaskStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, to),
            (Pending, InProgress)
                | (Pending, Failed) // lookup or claim failed before start
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }

    /// Statuses from which `self` is reachable in one step.
    pub fn predecessors(self) -> &'static [TaskStatus] {
        use TaskStatus::*;
        match self {
            Pending => &[],
            InProgress => &[Pending],
            Completed => &[InProgress],
            Failed => &[Pending, InProgress],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(Error::Other(format!("unknown task status: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Sales records
// ---------------------------------------------------------------------------

/// One sale observation as read from a feed, before it belongs to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSale {
    pub company: String,
    pub car_model: String,
    pub sale_date: NaiveDate,
    pub price: f64,
}

impl RawSale {
    pub fn year(&self) -> i32 {
        self.sale_date.year()
    }
}

/// A filtered sale tagged with the task that produced it, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSalesRecord {
    pub task_id: TaskId,
    pub sale: RawSale,
}

/// A persisted sale owned by a task. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub id: i64,
    pub task_id: TaskId,
    pub company: String,
    pub car_model: String,
    pub sale_date: NaiveDate,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Validated input for creating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub(crate) start_year: i32,
    pub(crate) end_year: i32,
    pub(crate) companies: Option<String>,
}

impl NewTask {
    /// Validate filters. An empty company string is treated as no filter.
    pub fn new(start_year: i32, end_year: i32, companies: Option<String>) -> Result<Self> {
        if start_year > end_year {
            return Err(Error::Validation(format!(
                "start_year ({start_year}) must not be greater than end_year ({end_year})"
            )));
        }

        let companies = companies.filter(|s| !s.is_empty());
        if let Some(ref list) = companies {
            validate_companies(list)?;
        }

        Ok(Self {
            start_year,
            end_year,
            companies,
        })
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    pub fn companies(&self) -> Option<&str> {
        self.companies.as_deref()
    }
}

fn validate_companies(list: &str) -> Result<()> {
    if list.chars().count() > MAX_COMPANIES_LEN {
        return Err(Error::Validation(format!(
            "companies must be at most {MAX_COMPANIES_LEN} characters"
        )));
    }
    if let Some(bad) = list
        .chars()
        .find(|c| !(c.is_alphabetic() || *c == ',' || *c == ' '))
    {
        return Err(Error::Validation(format!(
            "companies may only contain letters, commas and spaces (found {bad:?})"
        )));
    }
    Ok(())
}
