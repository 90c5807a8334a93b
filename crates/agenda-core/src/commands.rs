mod task_ops;

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument};

use crate::cli::{AddArgs, Command, DeleteArgs, ModifyArgs, RecurArgs, ViewArgs};
use crate::config::Config;
use crate::datastore::{TaskStore, resolve_id};
use crate::datetime::parse_date_expr;
use crate::filter::{PriorityFilter, StatusFilter, TaskFilter};
use crate::render::Renderer;
use crate::task::{Frequency, Priority, RecurrenceRule, Status, TaskDraft};

pub use task_ops::{
    ModifyOutcome, RecurrenceEdit, TaskEdit, create_task, delete_tasks, delete_view, export_json,
    find_task, load_view, modify_task, reexpand_task, set_task_status, toggle_task,
};

#[instrument(skip(store, cfg, renderer, command, now, today))]
pub fn dispatch<S: TaskStore + ?Sized>(
    store: &mut S,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    debug!(?command, %today, "dispatching command");

    match command {
        Command::Add(args) => cmd_add(store, args, now, today),
        Command::List(args) => cmd_list(store, cfg, renderer, &args, today),
        Command::Info { id } => cmd_info(store, renderer, &id, today),
        Command::Modify(args) => cmd_modify(store, args, now, today),
        Command::Toggle { id } => cmd_toggle(store, &id, now),
        Command::Status { id, status } => cmd_status(store, &id, &status, now),
        Command::Delete(args) => cmd_delete(store, cfg, args, today),
        Command::Expand { id } => cmd_expand(store, &id, now),
        Command::Export(args) => cmd_export(store, cfg, &args, today),
    }
}

pub fn default_command() -> Command {
    Command::List(ViewArgs {
        status: "all".to_string(),
        priority: "all".to_string(),
        search: String::new(),
    })
}

fn view_filter(args: &ViewArgs) -> anyhow::Result<TaskFilter> {
    let status: StatusFilter = args.status.parse()?;
    let priority: PriorityFilter = args.priority.parse()?;
    Ok(TaskFilter::new(status, priority, &args.search))
}

fn show_completed(cfg: &Config) -> bool {
    cfg.get_bool("list.show_completed").unwrap_or(true)
}

fn parse_status(raw: &str) -> anyhow::Result<Status> {
    Status::parse(raw).ok_or_else(|| anyhow!("unknown status: {raw}"))
}

fn parse_priority(raw: &str) -> anyhow::Result<Priority> {
    Priority::parse(raw).ok_or_else(|| anyhow!("unknown priority: {raw}"))
}

/// Builds a rule from `--recur/--every/--until`. An unrecognized
/// frequency means a plain task.
fn recurrence_from_args(
    args: &RecurArgs,
    base: Option<&RecurrenceRule>,
    today: NaiveDate,
) -> anyhow::Result<Option<RecurrenceRule>> {
    let frequency = match args.recur.as_deref() {
        Some(raw) => match Frequency::parse(raw) {
            Some(frequency) => Some(frequency),
            None => {
                tracing::warn!(recur = %raw, "unrecognized frequency; no series created");
                return Ok(None);
            }
        },
        None => base.map(|rule| rule.frequency),
    };
    let Some(frequency) = frequency else {
        return Ok(None);
    };

    let interval = args
        .every
        .or_else(|| base.map(|rule| i64::from(rule.interval())))
        .unwrap_or(1);
    let end_date = match args.until.as_deref() {
        Some(raw) => Some(parse_date_expr(raw, today)?),
        None => base.and_then(|rule| rule.end_date),
    };
    Ok(Some(RecurrenceRule::new(frequency, interval, end_date)))
}

#[instrument(skip(store, args, now, today))]
fn cmd_add<S: TaskStore + ?Sized>(
    store: &mut S,
    args: AddArgs,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command add");

    let mut draft = TaskDraft::new(args.title.join(" "), parse_date_expr(&args.due, today)?);
    draft.description = args.description;
    draft.category = args.category;
    if let Some(raw) = args.priority.as_deref() {
        draft.priority = parse_priority(raw)?;
    }
    if let Some(raw) = args.status.as_deref() {
        draft.status = parse_status(raw)?;
    }
    draft.recurrence = recurrence_from_args(&args.recurrence, None, today)?;

    let created = create_task(store, draft, now)?;
    let anchor = &created[0];
    if created.len() > 1 {
        println!(
            "Created task {} with {} occurrence(s) through {}.",
            anchor.short_id(),
            created.len() - 1,
            created[created.len() - 1].due_date.format("%Y-%m-%d")
        );
    } else {
        println!("Created task {}.", anchor.short_id());
    }
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, today))]
fn cmd_list<S: TaskStore + ?Sized>(
    store: &mut S,
    cfg: &Config,
    renderer: &mut Renderer,
    args: &ViewArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command list");

    let view = load_view(store, view_filter(args)?, today, show_completed(cfg))?;
    renderer.print_task_table(view.rows(), today)?;
    println!();
    println!(
        "{} task(s), {} overdue, as of {}.",
        view.rows().len(),
        view.overdue_count(),
        today.format("%Y-%m-%d")
    );
    Ok(())
}

#[instrument(skip(store, renderer, today))]
fn cmd_info<S: TaskStore + ?Sized>(
    store: &mut S,
    renderer: &mut Renderer,
    id: &str,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command info");

    let task = find_task(store, id)?;
    renderer.print_task_info(&task, today)
}

#[instrument(skip(store, args, now, today))]
fn cmd_modify<S: TaskStore + ?Sized>(
    store: &mut S,
    args: ModifyArgs,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command modify");

    let task = find_task(store, &args.id)?;

    let recurrence_requested = args.recurrence.recur.is_some()
        || args.recurrence.every.is_some()
        || args.recurrence.until.is_some();
    let recurrence = if args.no_recur {
        RecurrenceEdit::Clear
    } else if recurrence_requested {
        match recurrence_from_args(&args.recurrence, task.recurrence_rule(), today)? {
            Some(rule) => RecurrenceEdit::Set(rule),
            None if args.recurrence.recur.is_some() => RecurrenceEdit::Clear,
            None => {
                return Err(anyhow!(
                    "--every/--until need --recur on a task without a series"
                ));
            }
        }
    } else {
        RecurrenceEdit::Keep
    };

    let edit = TaskEdit {
        title: args.title,
        description: args.description,
        category: args.category,
        due_date: args
            .due
            .as_deref()
            .map(|raw| parse_date_expr(raw, today))
            .transpose()?,
        status: args.status.as_deref().map(parse_status).transpose()?,
        priority: args.priority.as_deref().map(parse_priority).transpose()?,
        recurrence,
    };

    let outcome = modify_task(store, task.id, edit, now)?;
    if outcome.plan.is_empty() {
        println!("Modified task {}.", outcome.task.short_id());
    } else {
        println!(
            "Modified task {}; replaced {} open occurrence(s) with {}.",
            outcome.task.short_id(),
            outcome.plan.remove.len(),
            outcome.plan.create.len()
        );
    }
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_toggle<S: TaskStore + ?Sized>(
    store: &mut S,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command toggle");

    let task = find_task(store, id)?;
    let task = toggle_task(store, task.id, now)?;
    println!("Task {} is now {}.", task.short_id(), task.status());
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_status<S: TaskStore + ?Sized>(
    store: &mut S,
    id: &str,
    status: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command status");

    let status = parse_status(status)?;
    let task = find_task(store, id)?;
    let task = set_task_status(store, task.id, status, now)?;
    println!("Task {} is now {}.", task.short_id(), task.status());
    Ok(())
}

#[instrument(skip(store, cfg, args, today))]
fn cmd_delete<S: TaskStore + ?Sized>(
    store: &mut S,
    cfg: &Config,
    args: DeleteArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command delete");

    let deleted = if args.all {
        let mut view = load_view(store, view_filter(&args.view)?, today, show_completed(cfg))?;
        delete_view(store, &mut view)?.len()
    } else {
        if args.ids.is_empty() {
            return Err(anyhow!("delete needs task ids or --all"));
        }
        let tasks = store.load_all()?;
        let mut ids = Vec::with_capacity(args.ids.len());
        for raw in &args.ids {
            let id = resolve_id(&tasks, raw)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        delete_tasks(store, &ids)?
    };

    println!("Deleted {deleted} task(s).");
    Ok(())
}

#[instrument(skip(store, now))]
fn cmd_expand<S: TaskStore + ?Sized>(
    store: &mut S,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command expand");

    let task = find_task(store, id)?;
    let plan = reexpand_task(store, task.id, now)
        .with_context(|| format!("failed to expand task {}", task.short_id()))?;
    println!(
        "Series {}: removed {} open occurrence(s), created {}.",
        task.short_id(),
        plan.remove.len(),
        plan.create.len()
    );
    Ok(())
}

#[instrument(skip(store, cfg, args, today))]
fn cmd_export<S: TaskStore + ?Sized>(
    store: &mut S,
    cfg: &Config,
    args: &ViewArgs,
    today: NaiveDate,
) -> anyhow::Result<()> {
    info!("command export");

    let view = load_view(store, view_filter(args)?, today, show_completed(cfg))?;
    println!("{}", export_json(view.rows())?);
    Ok(())
}
