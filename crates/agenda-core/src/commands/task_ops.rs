use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::datastore::{TaskRecord, TaskStore, resolve_id};
use crate::error::AgendaError;
use crate::filter::TaskFilter;
use crate::recurrence::{SeriesPlan, expand_anchor, plan_reexpansion};
use crate::task::{Priority, RecurrenceRule, Status, Task, TaskDraft, non_blank};
use crate::view::TaskView;

/// Creates a task and, for an anchor, its whole series in one batch.
///
/// Returns the anchor first, followed by its occurrences.
#[instrument(skip(store, draft, now), fields(title = %draft.title))]
pub fn create_task<S: TaskStore + ?Sized>(
    store: &mut S,
    draft: TaskDraft,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<Task>> {
    let anchor = draft.into_task(now)?;
    let occurrences = expand_anchor(&anchor, now);

    let mut batch = Vec::with_capacity(occurrences.len() + 1);
    batch.push(anchor);
    batch.extend(occurrences);

    store
        .create_batch(&batch)
        .context("failed to save task series")?;
    info!(id = %batch[0].id, occurrences = batch.len() - 1, "task created");
    Ok(batch)
}

/// Builds the list view over the current store snapshot.
#[instrument(skip(store, filter, today))]
pub fn load_view<S: TaskStore + ?Sized>(
    store: &S,
    filter: TaskFilter,
    today: NaiveDate,
    show_completed: bool,
) -> anyhow::Result<TaskView> {
    let mut tasks = store.load_all()?;
    if !show_completed {
        tasks.retain(|task| !task.completed());
    }
    Ok(TaskView::new(tasks, filter, today))
}

pub fn find_task<S: TaskStore + ?Sized>(store: &S, raw_id: &str) -> anyhow::Result<Task> {
    let tasks = store.load_all()?;
    let id = resolve_id(&tasks, raw_id)?;
    tasks
        .into_iter()
        .find(|task| task.id == id)
        .ok_or_else(|| AgendaError::TaskNotFound(id).into())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RecurrenceEdit {
    #[default]
    Keep,
    Clear,
    Set(RecurrenceRule),
}

/// Field edits for one task. `None` leaves a field alone; an empty
/// description or category clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub recurrence: RecurrenceEdit,
}

#[derive(Debug, Clone)]
pub struct ModifyOutcome {
    pub task: Task,
    pub plan: SeriesPlan,
}

/// Applies `edit` to one task. When an anchor's due date or recurrence
/// changes, its open occurrences are regenerated.
#[instrument(skip(store, edit, now), fields(id = %id))]
pub fn modify_task<S: TaskStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    edit: TaskEdit,
    now: DateTime<Utc>,
) -> anyhow::Result<ModifyOutcome> {
    let tasks = store.load_all()?;
    let mut task = tasks
        .iter()
        .find(|task| task.id == id)
        .cloned()
        .ok_or(AgendaError::TaskNotFound(id))?;
    let was_anchor = task.is_anchor();
    let before_rule = task.recurrence_rule().copied();
    let before_due = task.due_date;

    if let Some(title) = edit.title {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AgendaError::EmptyTitle.into());
        }
        task.title = trimmed.to_string();
    }
    if let Some(description) = edit.description {
        task.description = non_blank(Some(description));
    }
    if let Some(category) = edit.category {
        task.category = non_blank(Some(category));
    }
    if let Some(due) = edit.due_date {
        task.due_date = due;
    }
    if let Some(priority) = edit.priority {
        task.priority = priority;
    }
    if let Some(status) = edit.status {
        task.set_status(status, now);
    }
    match edit.recurrence {
        RecurrenceEdit::Keep => {}
        RecurrenceEdit::Clear => task.set_recurrence(None, now)?,
        RecurrenceEdit::Set(rule) => task.set_recurrence(Some(rule), now)?,
    }
    task.modified = now;

    let series_changed = task.recurrence_rule().copied() != before_rule
        || ((was_anchor || task.is_anchor()) && task.due_date != before_due);

    let plan = if series_changed && !task.is_occurrence() {
        plan_reexpansion(&task, &tasks, now)?
    } else {
        SeriesPlan::default()
    };

    store.update(&task)?;
    apply_series_plan(store, &plan)?;

    debug!(
        removed = plan.remove.len(),
        created = plan.create.len(),
        "task modified"
    );
    Ok(ModifyOutcome { task, plan })
}

/// Re-runs expansion for an anchor without other edits.
#[instrument(skip(store, now), fields(id = %id))]
pub fn reexpand_task<S: TaskStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<SeriesPlan> {
    let tasks = store.load_all()?;
    let anchor = tasks
        .iter()
        .find(|task| task.id == id)
        .ok_or(AgendaError::TaskNotFound(id))?;
    if !anchor.is_anchor() {
        return Err(AgendaError::NotAnAnchor(id).into());
    }

    let plan = plan_reexpansion(anchor, &tasks, now)?;
    apply_series_plan(store, &plan)?;
    Ok(plan)
}

fn apply_series_plan<S: TaskStore + ?Sized>(store: &mut S, plan: &SeriesPlan) -> anyhow::Result<()> {
    if plan.is_empty() {
        return Ok(());
    }
    if !plan.remove.is_empty() {
        store
            .delete_batch(&plan.remove)
            .context("failed to remove previous occurrences")?;
    }
    if !plan.create.is_empty()
        && let Err(err) = store.create_batch(&plan.create)
    {
        warn!(error = %err, "occurrences were removed but the new series was not saved");
        return Err(err).context("series left incomplete; run expand again");
    }
    Ok(())
}

/// Quick toggle between pending and completed.
#[instrument(skip(store, now), fields(id = %id))]
pub fn toggle_task<S: TaskStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<Task> {
    let mut task = load_one(store, id)?;
    let next = task.quick_toggle(now);
    store.update(&task)?;
    info!(status = %next, "task toggled");
    Ok(task)
}

#[instrument(skip(store, now), fields(id = %id))]
pub fn set_task_status<S: TaskStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    status: Status,
    now: DateTime<Utc>,
) -> anyhow::Result<Task> {
    let mut task = load_one(store, id)?;
    task.set_status(status, now);
    store.update(&task)?;
    Ok(task)
}

/// Deletes exactly `ids` in one batch. Series members of a deleted anchor
/// are left in place.
#[instrument(skip(store, ids), fields(count = ids.len()))]
pub fn delete_tasks<S: TaskStore + ?Sized>(store: &mut S, ids: &[Uuid]) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Err(AgendaError::EmptySelection.into());
    }
    store.delete_batch(ids)?;
    Ok(ids.len())
}

/// Selects everything in the view and deletes it as one batch.
pub fn delete_view<S: TaskStore + ?Sized>(
    store: &mut S,
    view: &mut TaskView,
) -> anyhow::Result<Vec<Uuid>> {
    view.clear_selection();
    view.toggle_all();
    let batch = view.take_bulk_delete()?;
    delete_tasks(store, &batch)?;
    let remaining = store.load_all()?;
    view.set_tasks(remaining);
    Ok(batch)
}

pub fn export_json(tasks: &[Task]) -> anyhow::Result<String> {
    let records: Vec<TaskRecord> = tasks.iter().map(TaskRecord::from).collect();
    serde_json::to_string_pretty(&records).context("failed to serialize export")
}

fn load_one<S: TaskStore + ?Sized>(store: &S, id: Uuid) -> anyhow::Result<Task> {
    store
        .load_all()?
        .into_iter()
        .find(|task| task.id == id)
        .ok_or_else(|| AgendaError::TaskNotFound(id).into())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{RecurrenceEdit, TaskEdit, create_task, modify_task, toggle_task};
    use crate::datastore::{MemoryStore, TaskStore};
    use crate::error::AgendaError;
    use crate::task::{Frequency, RecurrenceRule, Status, TaskDraft};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn blank_title_never_reaches_the_store() {
        let mut store = MemoryStore::new();
        let err = create_task(&mut store, TaskDraft::new("  ", d(2025, 1, 10)), now())
            .expect_err("blank title");
        assert_eq!(
            err.downcast_ref::<AgendaError>(),
            Some(&AgendaError::EmptyTitle)
        );
        assert!(store.load_all().expect("load").is_empty());
    }

    #[test]
    fn editing_an_occurrence_does_not_reexpand() {
        let mut store = MemoryStore::new();
        let mut draft = TaskDraft::new("Pagar conta", d(2025, 1, 10));
        draft.recurrence = Some(RecurrenceRule::new(
            Frequency::Monthly,
            1,
            Some(d(2025, 4, 10)),
        ));
        let created = create_task(&mut store, draft, now()).expect("create");
        let child = created[1].id;

        let edit = TaskEdit {
            title: Some("Pagar conta de luz".to_string()),
            due_date: Some(d(2025, 2, 12)),
            ..TaskEdit::default()
        };
        let outcome = modify_task(&mut store, child, edit, now()).expect("modify");
        assert!(outcome.plan.is_empty());
        assert_eq!(store.load_all().expect("load").len(), 4);

        let recur = TaskEdit {
            recurrence: RecurrenceEdit::Set(RecurrenceRule::new(Frequency::Daily, 1, None)),
            ..TaskEdit::default()
        };
        let err = modify_task(&mut store, child, recur, now()).expect_err("occurrence");
        assert_eq!(
            err.downcast_ref::<AgendaError>(),
            Some(&AgendaError::OccurrenceCannotRecur(child))
        );
    }

    #[test]
    fn toggle_round_trips_status() {
        let mut store = MemoryStore::new();
        let created =
            create_task(&mut store, TaskDraft::new("Cerca", d(2025, 1, 10)), now()).expect("create");
        let id = created[0].id;

        assert_eq!(toggle_task(&mut store, id, now()).expect("toggle").status(), Status::Completed);
        let back = toggle_task(&mut store, id, now()).expect("toggle");
        assert_eq!(back.status(), Status::Pending);
        assert!(!back.completed());
    }
}
