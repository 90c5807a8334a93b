use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::datetime::calendar_date_serde;
use crate::error::AgendaError;
use crate::task::{Frequency, Priority, RecurrenceRule, Status, Task};

/// The create/read/update/delete collaborator behind the core.
///
/// Every call is all-or-nothing: a failed batch leaves the store as it was.
pub trait TaskStore {
    fn load_all(&self) -> anyhow::Result<Vec<Task>>;
    fn create_batch(&mut self, tasks: &[Task]) -> anyhow::Result<()>;
    fn update(&mut self, task: &Task) -> anyhow::Result<()>;
    fn delete_batch(&mut self, ids: &[Uuid]) -> anyhow::Result<()>;
}

/// One persisted task line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(with = "calendar_date_serde")]
    pub due_date: NaiveDate,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub priority: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub parent_task_id: Option<Uuid>,

    #[serde(default)]
    pub recurrence_type: Option<String>,

    #[serde(default)]
    pub recurrence_interval: Option<i64>,

    #[serde(default, with = "calendar_date_serde::option")]
    pub recurrence_end_date: Option<NaiveDate>,

    pub created: DateTime<Utc>,

    pub modified: DateTime<Utc>,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        let rule = task.recurrence_rule();
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date,
            status: Some(task.status().as_str().to_string()),
            completed: task.completed(),
            priority: Some(task.priority.as_str().to_string()),
            category: task.category.clone(),
            parent_task_id: task.parent_task_id,
            recurrence_type: rule.map(|r| r.frequency.as_str().to_string()),
            recurrence_interval: rule.map(|r| i64::from(r.interval())),
            recurrence_end_date: rule.and_then(|r| r.end_date),
            created: task.created,
            modified: task.modified,
        }
    }
}

impl TaskRecord {
    /// Rebuilds the in-memory task, normalizing whatever an older or
    /// foreign writer left behind.
    pub fn into_task(self) -> Task {
        let status = resolve_status(&self);
        let priority = self
            .priority
            .as_deref()
            .and_then(Priority::parse)
            .unwrap_or_default();

        let rule = match self.recurrence_type.as_deref() {
            Some(raw) if !raw.trim().is_empty() => match Frequency::parse(raw) {
                Some(frequency) => Some(RecurrenceRule::new(
                    frequency,
                    self.recurrence_interval.unwrap_or(1),
                    self.recurrence_end_date,
                )),
                None => {
                    warn!(id = %self.id, recurrence_type = %raw, "unknown recurrence type; treating as plain task");
                    None
                }
            },
            _ => None,
        };

        let mut task = Task::new(self.title, self.due_date, self.created);
        task.id = self.id;
        task.description = self.description;
        task.category = self.category;
        task.priority = priority;
        task.parent_task_id = self.parent_task_id;
        task.set_status(status, self.modified);
        if let Err(err) = task.set_recurrence(rule, self.modified) {
            warn!(id = %task.id, error = %err, "dropping recurrence on series occurrence");
        }
        task
    }
}

fn resolve_status(record: &TaskRecord) -> Status {
    let parsed = record.status.as_deref().and_then(Status::parse);
    match parsed {
        Some(status) => {
            if (status == Status::Completed) != record.completed {
                warn!(
                    id = %record.id,
                    status = %status,
                    completed = record.completed,
                    "status and completed flag disagree; status wins"
                );
            }
            status
        }
        None if record.completed => Status::Completed,
        None => Status::Pending,
    }
}

/// JSONL task file under a data directory.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join("tasks.data");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")
                .with_context(|| format!("failed to create {}", tasks_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    fn load_records(&self) -> anyhow::Result<Vec<TaskRecord>> {
        load_jsonl(&self.tasks_path).context("failed to load tasks.data")
    }

    fn save_records(&self, records: &[TaskRecord]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, records).context("failed to save tasks.data")
    }
}

impl TaskStore for DataStore {
    #[tracing::instrument(skip(self))]
    fn load_all(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self
            .load_records()?
            .into_iter()
            .map(TaskRecord::into_task)
            .collect())
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    fn create_batch(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut records = self.load_records()?;
        check_new_ids(records.iter().map(|r| r.id), tasks)?;
        records.extend(tasks.iter().map(TaskRecord::from));
        self.save_records(&records)?;
        debug!(total = records.len(), "created task batch");
        Ok(())
    }

    #[tracing::instrument(skip(self, task), fields(id = %task.id))]
    fn update(&mut self, task: &Task) -> anyhow::Result<()> {
        let mut records = self.load_records()?;
        let slot = records
            .iter_mut()
            .find(|r| r.id == task.id)
            .ok_or(AgendaError::TaskNotFound(task.id))?;
        *slot = TaskRecord::from(task);
        self.save_records(&records)
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    fn delete_batch(&mut self, ids: &[Uuid]) -> anyhow::Result<()> {
        let mut records = self.load_records()?;
        check_known_ids(records.iter().map(|r| r.id), ids)?;
        let doomed: HashSet<&Uuid> = ids.iter().collect();
        let before = records.len();
        records.retain(|r| !doomed.contains(&r.id));
        info!(before, after = records.len(), "deleted task batch");
        self.save_records(&records)
    }
}

/// Keeps tasks in memory; same batch semantics as [`DataStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tasks: Vec<Task>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskStore for MemoryStore {
    fn load_all(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }

    fn create_batch(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        check_new_ids(self.tasks.iter().map(|t| t.id), tasks)?;
        self.tasks.extend(tasks.iter().cloned());
        Ok(())
    }

    fn update(&mut self, task: &Task) -> anyhow::Result<()> {
        let slot = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or(AgendaError::TaskNotFound(task.id))?;
        *slot = task.clone();
        Ok(())
    }

    fn delete_batch(&mut self, ids: &[Uuid]) -> anyhow::Result<()> {
        check_known_ids(self.tasks.iter().map(|t| t.id), ids)?;
        self.tasks.retain(|t| !ids.contains(&t.id));
        Ok(())
    }
}

fn check_new_ids(existing: impl Iterator<Item = Uuid>, tasks: &[Task]) -> anyhow::Result<()> {
    let mut seen: HashSet<Uuid> = existing.collect();
    for task in tasks {
        if !seen.insert(task.id) {
            return Err(AgendaError::DuplicateId(task.id).into());
        }
    }
    Ok(())
}

fn check_known_ids(existing: impl Iterator<Item = Uuid>, ids: &[Uuid]) -> anyhow::Result<()> {
    let known: HashSet<Uuid> = existing.collect();
    if let Some(missing) = ids.iter().find(|id| !known.contains(*id)) {
        return Err(AgendaError::TaskNotFound(*missing).into());
    }
    Ok(())
}

/// Resolves a full id or a unique id prefix against `tasks`.
pub fn resolve_id(tasks: &[Task], raw: &str) -> Result<Uuid, AgendaError> {
    let needle = raw.trim().to_ascii_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(AgendaError::UnknownIdPrefix(raw.to_string()));
    }

    let mut hits = tasks
        .iter()
        .filter(|task| task.id.simple().to_string().starts_with(&needle));
    let first = hits
        .next()
        .ok_or_else(|| AgendaError::UnknownIdPrefix(raw.to_string()))?;
    if hits.next().is_some() {
        return Err(AgendaError::AmbiguousId(raw.to_string()));
    }
    Ok(first.id)
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<TaskRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record: TaskRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(record);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, records))]
fn save_jsonl_atomic(path: &Path, records: &[TaskRecord]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = records.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for record in records {
        let serialized = serde_json::to_string(record)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
