//! Recurrence expansion.
//!
//! A series is an anchor task carrying a [`RecurrenceRule`] plus the
//! occurrences generated from it. Expansion is pure: it returns the tasks
//! to create and leaves persistence of the whole batch to the caller.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::datetime::step;
use crate::error::AgendaError;
use crate::task::{RecurrenceRule, Status, Task};

/// Occurrence dates for a series anchored at `start`.
///
/// Dates are strictly after `start`, never past the rule's effective end,
/// ascending and unique. Each date is one step from the previous one.
#[instrument(skip(rule), fields(frequency = %rule.frequency, interval = rule.interval()))]
pub fn series_dates(start: NaiveDate, rule: &RecurrenceRule) -> Vec<NaiveDate> {
    let end = rule.effective_end(start);
    let mut out = Vec::new();
    let mut current = start;

    loop {
        let Some(next) = step(current, rule.frequency, rule.interval()) else {
            warn!(last = %current, "series step left the calendar range; stopping");
            break;
        };
        if next > end {
            break;
        }
        out.push(next);
        current = next;
    }

    debug!(count = out.len(), %end, "computed series dates");
    out
}

/// Materializes one occurrence per series date of `base`.
///
/// `base` is the anchor; its own due date is not repeated.
#[instrument(skip(base, rule, now), fields(anchor = %base.id))]
pub fn expand_series(
    base: &Task,
    start: NaiveDate,
    rule: &RecurrenceRule,
    now: DateTime<Utc>,
) -> Vec<Task> {
    series_dates(start, rule)
        .into_iter()
        .map(|date| Task::occurrence_of(base, date, now))
        .collect()
}

/// Expands `anchor` with its own rule and due date. Plain tasks yield nothing.
pub fn expand_anchor(anchor: &Task, now: DateTime<Utc>) -> Vec<Task> {
    match anchor.recurrence_rule() {
        Some(rule) => expand_series(anchor, anchor.due_date, rule, now),
        None => Vec::new(),
    }
}

#[derive(Debug, Default, Clone)]
pub struct SeriesPlan {
    pub remove: Vec<Uuid>,
    pub create: Vec<Task>,
}

impl SeriesPlan {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.create.is_empty()
    }
}

/// Plans the replacement of `anchor`'s occurrences after its recurrence
/// parameters changed.
///
/// Open occurrences are dropped and regenerated. Completed occurrences are
/// kept and their dates are not generated again.
#[instrument(skip(anchor, existing, now), fields(anchor = %anchor.id))]
pub fn plan_reexpansion(
    anchor: &Task,
    existing: &[Task],
    now: DateTime<Utc>,
) -> Result<SeriesPlan, AgendaError> {
    if anchor.is_occurrence() {
        return Err(AgendaError::NotAnAnchor(anchor.id));
    }

    let children = existing
        .iter()
        .filter(|task| task.parent_task_id == Some(anchor.id));

    let mut remove = Vec::new();
    let mut kept_dates = BTreeSet::new();
    for child in children {
        if child.status() == Status::Completed {
            kept_dates.insert(child.due_date);
        } else {
            remove.push(child.id);
        }
    }

    let create: Vec<Task> = expand_anchor(anchor, now)
        .into_iter()
        .filter(|task| !kept_dates.contains(&task.due_date))
        .collect();

    debug!(
        remove = remove.len(),
        create = create.len(),
        kept = kept_dates.len(),
        "planned series re-expansion"
    );

    Ok(SeriesPlan { remove, create })
}
