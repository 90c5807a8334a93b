use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use deunicode::deunicode;
use uuid::Uuid;

use crate::datetime::add_years_clamped;
use crate::error::AgendaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    InProgress,
    Completed,
}

impl Status {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_keyword(raw).as_str() {
            "pending" | "pendente" | "todo" => Some(Self::Pending),
            "in_progress" | "inprogress" | "progress" | "em_andamento" | "andamento" => {
                Some(Self::InProgress)
            }
            "completed" | "complete" | "done" | "concluida" | "concluido" => {
                Some(Self::Completed)
            }
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_keyword(raw).as_str() {
            "low" | "l" | "baixa" => Some(Self::Low),
            "medium" | "m" | "media" => Some(Self::Medium),
            "high" | "h" | "alta" => Some(Self::High),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Unrecognized text yields `None`, which callers treat as "no series".
    pub fn parse(raw: &str) -> Option<Self> {
        match fold_keyword(raw).as_str() {
            "daily" | "day" | "diaria" | "diario" => Some(Self::Daily),
            "weekly" | "week" | "semanal" => Some(Self::Weekly),
            "monthly" | "month" | "mensal" => Some(Self::Monthly),
            "yearly" | "year" | "annual" | "anual" => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn fold_keyword(raw: &str) -> String {
    deunicode(raw.trim())
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

/// A normalized recurrence definition. `interval` is always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    interval: u32,
    pub end_date: Option<NaiveDate>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency, interval: i64, end_date: Option<NaiveDate>) -> Self {
        Self {
            frequency,
            interval: normalize_interval(interval),
            end_date,
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// `end_date` when set, otherwise one calendar year after `start`.
    pub fn effective_end(&self, start: NaiveDate) -> NaiveDate {
        self.end_date
            .or_else(|| add_years_clamped(start, 1))
            .unwrap_or(NaiveDate::MAX)
    }
}

pub fn normalize_interval(raw: i64) -> u32 {
    if raw < 1 {
        1
    } else {
        u32::try_from(raw).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due_date: NaiveDate,
    status: Status,
    pub priority: Priority,
    pub parent_task_id: Option<Uuid>,
    recurrence_rule: Option<RecurrenceRule>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Task {
    pub fn new(title: String, due_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            description: None,
            category: None,
            due_date,
            status: Status::Pending,
            priority: Priority::default(),
            parent_task_id: None,
            recurrence_rule: None,
            created: now,
            modified: now,
        }
    }

    /// Builds one generated occurrence of `anchor`'s series.
    pub fn occurrence_of(anchor: &Task, due_date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: anchor.title.clone(),
            description: anchor.description.clone(),
            category: anchor.category.clone(),
            due_date,
            status: anchor.status,
            priority: anchor.priority,
            parent_task_id: Some(anchor.id),
            recurrence_rule: None,
            created: now,
            modified: now,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Legacy mirror of `status == Completed`.
    pub fn completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn set_status(&mut self, status: Status, now: DateTime<Utc>) {
        self.status = status;
        self.modified = now;
    }

    /// Flips between pending and completed, skipping in-progress.
    pub fn quick_toggle(&mut self, now: DateTime<Utc>) -> Status {
        let next = if self.status == Status::Completed {
            Status::Pending
        } else {
            Status::Completed
        };
        self.set_status(next, now);
        next
    }

    pub fn recurrence_rule(&self) -> Option<&RecurrenceRule> {
        self.recurrence_rule.as_ref()
    }

    pub fn set_recurrence(
        &mut self,
        rule: Option<RecurrenceRule>,
        now: DateTime<Utc>,
    ) -> Result<(), AgendaError> {
        if rule.is_some() && self.parent_task_id.is_some() {
            return Err(AgendaError::OccurrenceCannotRecur(self.id));
        }
        self.recurrence_rule = rule;
        self.modified = now;
        Ok(())
    }

    pub fn is_anchor(&self) -> bool {
        self.recurrence_rule.is_some()
    }

    pub fn is_occurrence(&self) -> bool {
        self.parent_task_id.is_some()
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// User input for a new task, checked before it becomes a `Task`.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due_date: NaiveDate,
    pub status: Status,
    pub priority: Priority,
    pub recurrence: Option<RecurrenceRule>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: None,
            due_date,
            status: Status::Pending,
            priority: Priority::default(),
            recurrence: None,
        }
    }

    pub fn validate(&self) -> Result<(), AgendaError> {
        if self.title.trim().is_empty() {
            return Err(AgendaError::EmptyTitle);
        }
        Ok(())
    }

    pub fn into_task(self, now: DateTime<Utc>) -> Result<Task, AgendaError> {
        self.validate()?;
        let mut task = Task::new(self.title.trim().to_string(), self.due_date, now);
        task.description = non_blank(self.description);
        task.category = non_blank(self.category);
        task.status = self.status;
        task.priority = self.priority;
        task.recurrence_rule = self.recurrence;
        Ok(task)
    }
}

pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
