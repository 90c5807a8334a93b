use agenda_core::commands::{
    RecurrenceEdit, TaskEdit, create_task, delete_tasks, delete_view, export_json, load_view,
    modify_task, reexpand_task, toggle_task,
};
use agenda_core::datastore::{DataStore, TaskStore};
use agenda_core::filter::{PriorityFilter, StatusFilter, TaskFilter};
use agenda_core::task::{Frequency, Priority, RecurrenceRule, Status, TaskDraft};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tempfile::tempdir;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 5, 12, 0, 0)
        .single()
        .expect("valid now")
}

fn monthly_bill() -> TaskDraft {
    let mut draft = TaskDraft::new("Pagar conta", d(2025, 1, 10));
    draft.recurrence = Some(RecurrenceRule::new(
        Frequency::Monthly,
        1,
        Some(d(2025, 4, 10)),
    ));
    draft
}

#[test]
fn monthly_series_persists_with_parent_links() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    let created = create_task(&mut store, monthly_bill(), now()).expect("create series");
    let anchor_id = created[0].id;

    let reopened = DataStore::open(temp.path()).expect("reopen datastore");
    let mut tasks = reopened.load_all().expect("load tasks");
    tasks.sort_by_key(|t| t.due_date);
    assert_eq!(tasks.len(), 4);

    let anchor = &tasks[0];
    assert_eq!(anchor.id, anchor_id);
    assert!(anchor.is_anchor());
    assert_eq!(anchor.parent_task_id, None);

    let dates: Vec<NaiveDate> = tasks[1..].iter().map(|t| t.due_date).collect();
    assert_eq!(dates, vec![d(2025, 2, 10), d(2025, 3, 10), d(2025, 4, 10)]);
    for child in &tasks[1..] {
        assert_eq!(child.title, "Pagar conta");
        assert_eq!(child.status(), Status::Pending);
        assert_eq!(child.priority, Priority::Medium);
        assert_eq!(child.parent_task_id, Some(anchor_id));
        assert!(child.recurrence_rule().is_none());
    }
}

#[test]
fn overdue_keyword_search_ignores_text() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    create_task(&mut store, TaskDraft::new("Vacinar bezerros", d(2025, 2, 1)), now())
        .expect("create");
    create_task(&mut store, TaskDraft::new("Consertar cerca", d(2025, 3, 20)), now())
        .expect("create");
    let mut done = TaskDraft::new("Vencimento do boleto", d(2025, 1, 15));
    done.status = Status::Completed;
    create_task(&mut store, done, now()).expect("create");

    let today = d(2025, 3, 1);
    let view = load_view(
        &store,
        TaskFilter::new(StatusFilter::All, PriorityFilter::All, "Atrasadas"),
        today,
        true,
    )
    .expect("view");
    let titles: Vec<&str> = view.rows().iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Vacinar bezerros"]);

    let view = load_view(
        &store,
        TaskFilter::new(StatusFilter::All, PriorityFilter::All, "vencido"),
        today,
        true,
    )
    .expect("view");
    assert_eq!(view.rows().len(), 1);
    assert_eq!(view.overdue_count(), 1);

    let view = load_view(
        &store,
        TaskFilter::new(StatusFilter::All, PriorityFilter::All, "CERCÁ"),
        today,
        true,
    )
    .expect("view");
    assert_eq!(view.rows().len(), 1);
    assert_eq!(view.rows()[0].title, "Consertar cerca");
}

#[test]
fn deleting_an_anchor_leaves_its_occurrences() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    let created = create_task(&mut store, monthly_bill(), now()).expect("create series");
    let anchor_id = created[0].id;

    assert_eq!(delete_tasks(&mut store, &[anchor_id]).expect("delete"), 1);

    let remaining = store.load_all().expect("load");
    assert_eq!(remaining.len(), 3);
    assert!(
        remaining
            .iter()
            .all(|t| t.parent_task_id == Some(anchor_id))
    );
}

#[test]
fn bulk_delete_removes_exactly_the_filtered_view() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");

    let mut high = TaskDraft::new("Comprar ração", d(2025, 3, 5));
    high.priority = Priority::High;
    create_task(&mut store, high, now()).expect("create");
    create_task(&mut store, TaskDraft::new("Limpar galpão", d(2025, 3, 6)), now())
        .expect("create");

    let mut view = load_view(
        &store,
        TaskFilter::new(
            StatusFilter::All,
            PriorityFilter::Only(Priority::High),
            "",
        ),
        d(2025, 3, 1),
        true,
    )
    .expect("view");
    let deleted = delete_view(&mut store, &mut view).expect("bulk delete");
    assert_eq!(deleted.len(), 1);
    assert!(view.selection().is_empty());
    assert!(view.rows().is_empty());

    let remaining = store.load_all().expect("load");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Limpar galpão");
}

#[test]
fn changing_a_filter_clears_the_selection() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let created = create_task(&mut store, monthly_bill(), now()).expect("create series");

    let mut view = load_view(&store, TaskFilter::default(), d(2025, 1, 5), true).expect("view");
    view.toggle(created[1].id).expect("visible");
    view.toggle(created[2].id).expect("visible");
    assert_eq!(view.selection().len(), 2);

    view.set_status_filter(StatusFilter::Only(Status::Pending));
    assert!(view.selection().is_empty());
    assert_eq!(view.rows().len(), 4);
}

#[test]
fn completed_occurrences_survive_reexpansion() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let created = create_task(&mut store, monthly_bill(), now()).expect("create series");
    let anchor_id = created[0].id;

    toggle_task(&mut store, created[1].id, now()).expect("complete february");

    let edit = TaskEdit {
        recurrence: RecurrenceEdit::Set(RecurrenceRule::new(
            Frequency::Monthly,
            1,
            Some(d(2025, 6, 10)),
        )),
        ..TaskEdit::default()
    };
    let outcome = modify_task(&mut store, anchor_id, edit, now()).expect("modify");
    assert_eq!(outcome.plan.remove.len(), 2);
    assert_eq!(outcome.plan.create.len(), 4);

    let mut children: Vec<_> = store
        .load_all()
        .expect("load")
        .into_iter()
        .filter(|t| t.parent_task_id == Some(anchor_id))
        .collect();
    children.sort_by_key(|t| t.due_date);
    let dates: Vec<NaiveDate> = children.iter().map(|t| t.due_date).collect();
    assert_eq!(
        dates,
        vec![
            d(2025, 2, 10),
            d(2025, 3, 10),
            d(2025, 4, 10),
            d(2025, 5, 10),
            d(2025, 6, 10)
        ]
    );
    assert!(children[0].completed());

    let again = reexpand_task(&mut store, anchor_id, now()).expect("expand again");
    assert_eq!(again.remove.len(), 4);
    assert_eq!(again.create.len(), 4);
    assert_eq!(store.load_all().expect("load").len(), 6);
}

#[test]
fn export_writes_completed_flag_from_status() {
    let temp = tempdir().expect("tempdir");
    let mut store = DataStore::open(temp.path()).expect("open datastore");
    let mut draft = TaskDraft::new("Ordenhar", d(2025, 1, 6));
    draft.status = Status::Completed;
    let created = create_task(&mut store, draft, now()).expect("create");

    let json = export_json(&created).expect("export");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value[0]["completed"], serde_json::Value::Bool(true));
    assert_eq!(value[0]["status"], "completed");
    assert_eq!(value[0]["due_date"], "2025-01-06");
}
