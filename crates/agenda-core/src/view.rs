//! Presentation state for a task list: overdue status, default ordering,
//! the active filters and the bulk-operation selection.

use std::cmp::Ordering;

use chrono::NaiveDate;
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use crate::error::AgendaError;
use crate::filter::{PriorityFilter, SearchQuery, StatusFilter, TaskFilter};
use crate::selection::{Selection, clear_selection, toggle_all, toggle_selection};
use crate::task::{Status, Task};

/// A task is overdue when it is not completed and its due date is
/// strictly before `today`.
pub fn is_overdue(task: &Task, today: NaiveDate) -> bool {
    task.due_date < today && task.status() != Status::Completed
}

/// Overdue tasks first, then ascending due date.
pub fn compare_default(a: &Task, b: &Task, today: NaiveDate) -> Ordering {
    is_overdue(b, today)
        .cmp(&is_overdue(a, today))
        .then_with(|| a.due_date.cmp(&b.due_date))
}

/// Stable sort by [`compare_default`].
pub fn sort_default(tasks: &mut [Task], today: NaiveDate) {
    tasks.sort_by(|a, b| compare_default(a, b, today));
}

/// Filtered, default-ordered rows over a task snapshot.
///
/// `today` is pinned when the view is built and only moves through
/// [`TaskView::set_today`]. Any change to the snapshot, the filters or
/// `today` clears the selection.
#[derive(Debug, Clone)]
pub struct TaskView {
    tasks: Vec<Task>,
    filter: TaskFilter,
    today: NaiveDate,
    rows: Vec<Task>,
    selection: Selection,
}

impl TaskView {
    pub fn new(tasks: Vec<Task>, filter: TaskFilter, today: NaiveDate) -> Self {
        let mut view = Self {
            tasks,
            filter,
            today,
            rows: Vec::new(),
            selection: Selection::new(),
        };
        view.refresh();
        view
    }

    #[instrument(skip(self), fields(today = %self.today))]
    fn refresh(&mut self) {
        let mut rows: Vec<Task> = self
            .tasks
            .iter()
            .filter(|task| self.filter.matches(task, self.today))
            .cloned()
            .collect();
        sort_default(&mut rows, self.today);
        if !self.selection.is_empty() {
            debug!(dropped = self.selection.len(), "view changed; clearing selection");
        }
        self.selection = clear_selection();
        trace!(total = self.tasks.len(), visible = rows.len(), "view refreshed");
        self.rows = rows;
    }

    pub fn rows(&self) -> &[Task] {
        &self.rows
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn overdue_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|task| is_overdue(task, self.today))
            .count()
    }

    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.refresh();
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.filter.status = status;
        self.refresh();
    }

    pub fn set_priority_filter(&mut self, priority: PriorityFilter) {
        self.filter.priority = priority;
        self.refresh();
    }

    pub fn set_search(&mut self, term: &str) {
        self.filter.search = SearchQuery::new(term);
        self.refresh();
    }

    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
        self.refresh();
    }

    pub fn is_visible(&self, id: &Uuid) -> bool {
        self.rows.iter().any(|task| task.id == *id)
    }

    /// Flips `id` in the selection. Ids outside the view are refused.
    pub fn toggle(&mut self, id: Uuid) -> Result<(), AgendaError> {
        if !self.is_visible(&id) {
            return Err(AgendaError::TaskNotFound(id));
        }
        self.selection = toggle_selection(&self.selection, id);
        Ok(())
    }

    pub fn toggle_all(&mut self) {
        let visible: Vec<Uuid> = self.rows.iter().map(|task| task.id).collect();
        self.selection = toggle_all(&self.selection, &visible);
    }

    pub fn clear_selection(&mut self) {
        self.selection = clear_selection();
    }

    /// Hands out the selected ids as one delete batch and empties the
    /// selection.
    pub fn take_bulk_delete(&mut self) -> Result<Vec<Uuid>, AgendaError> {
        if self.selection.is_empty() {
            return Err(AgendaError::EmptySelection);
        }
        let batch = self.selection.to_vec();
        self.selection = clear_selection();
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{TaskView, compare_default, is_overdue, sort_default};
    use crate::error::AgendaError;
    use crate::filter::{StatusFilter, TaskFilter};
    use crate::task::{Status, Task};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn task(title: &str, due: NaiveDate) -> Task {
        let now = Utc
            .with_ymd_and_hms(2025, 1, 1, 9, 0, 0)
            .single()
            .expect("valid now");
        Task::new(title.to_string(), due, now)
    }

    fn titles(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn completed_tasks_are_never_overdue() {
        let today = d(2025, 3, 1);
        let mut t = task("Fechar caixa", d(2020, 1, 1));
        assert!(is_overdue(&t, today));

        t.set_status(Status::InProgress, t.modified);
        assert!(is_overdue(&t, today));

        t.set_status(Status::Completed, t.modified);
        assert!(!is_overdue(&t, today));
    }

    #[test]
    fn due_today_is_not_overdue() {
        let today = d(2025, 3, 1);
        assert!(!is_overdue(&task("Hoje", today), today));
        assert!(is_overdue(&task("Ontem", d(2025, 2, 28)), today));
    }

    #[test]
    fn default_order_puts_overdue_first() {
        let today = d(2025, 3, 1);
        let mut done_old = task("done-old", d(2025, 1, 1));
        done_old.set_status(Status::Completed, done_old.modified);
        let mut tasks = vec![
            task("future-b", d(2025, 3, 20)),
            task("late-b", d(2025, 2, 20)),
            done_old,
            task("future-a", d(2025, 3, 2)),
            task("late-a", d(2025, 1, 15)),
        ];

        sort_default(&mut tasks, today);
        assert_eq!(
            titles(&tasks),
            vec!["late-a", "late-b", "done-old", "future-a", "future-b"]
        );

        let once: Vec<_> = tasks.iter().map(|t| t.id).collect();
        sort_default(&mut tasks, today);
        let twice: Vec<_> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn default_order_is_stable_for_equal_dates() {
        let today = d(2025, 3, 1);
        let mut tasks = vec![
            task("first", d(2025, 3, 5)),
            task("second", d(2025, 3, 5)),
            task("third", d(2025, 3, 5)),
        ];
        sort_default(&mut tasks, today);
        assert_eq!(titles(&tasks), vec!["first", "second", "third"]);
        assert_eq!(
            compare_default(&tasks[0], &tasks[1], today),
            std::cmp::Ordering::Equal
        );
    }

    #[test]
    fn filter_change_clears_selection() {
        let today = d(2025, 3, 1);
        let tasks = vec![task("a", d(2025, 3, 2)), task("b", d(2025, 3, 3))];
        let first = tasks[0].id;
        let mut view = TaskView::new(tasks, TaskFilter::default(), today);

        view.toggle(first).expect("visible task");
        assert_eq!(view.selection().len(), 1);

        view.set_status_filter(StatusFilter::Only(Status::Pending));
        assert!(view.selection().is_empty());

        view.toggle_all();
        assert_eq!(view.selection().len(), 2);
        view.set_search("b");
        assert!(view.selection().is_empty());
        assert_eq!(view.rows().len(), 1);
    }

    #[test]
    fn hidden_ids_cannot_be_selected() {
        let today = d(2025, 3, 1);
        let tasks = vec![task("pasto", d(2025, 3, 2)), task("cerca", d(2025, 3, 3))];
        let hidden = tasks[1].id;
        let mut view = TaskView::new(tasks, TaskFilter::default(), today);
        view.set_search("pasto");

        assert_eq!(view.toggle(hidden), Err(AgendaError::TaskNotFound(hidden)));
        assert!(view.selection().is_empty());
    }

    #[test]
    fn bulk_delete_hands_out_selection_once() {
        let today = d(2025, 3, 1);
        let tasks = vec![task("a", d(2025, 3, 2)), task("b", d(2025, 3, 3))];
        let mut view = TaskView::new(tasks, TaskFilter::default(), today);

        assert_eq!(view.take_bulk_delete(), Err(AgendaError::EmptySelection));

        view.toggle_all();
        let batch = view.take_bulk_delete().expect("non-empty selection");
        assert_eq!(batch.len(), 2);
        assert!(view.selection().is_empty());
    }

    #[test]
    fn moving_today_reorders_and_clears() {
        let tasks = vec![task("early", d(2025, 3, 2)), task("late", d(2025, 3, 10))];
        let mut view = TaskView::new(tasks, TaskFilter::default(), d(2025, 3, 1));
        assert_eq!(view.overdue_count(), 0);
        view.toggle_all();

        view.set_today(d(2025, 3, 5));
        assert_eq!(view.overdue_count(), 1);
        assert!(view.selection().is_empty());
        assert_eq!(titles(view.rows()), vec!["early", "late"]);
    }
}
