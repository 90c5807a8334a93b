use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::{Status, Task};
use crate::view::is_overdue;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, today))]
    pub fn print_task_table(&mut self, tasks: &[Task], today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let paint = self.color && io::stdout().is_terminal();
        write_task_table(&mut out, tasks, today, paint)
    }

    #[tracing::instrument(skip(self, task, today))]
    pub fn print_task_info(&mut self, task: &Task, today: NaiveDate) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write_task_info(&mut out, task, today)
    }
}

pub fn write_task_table<W: Write>(
    writer: W,
    tasks: &[Task],
    today: NaiveDate,
    paint: bool,
) -> anyhow::Result<()> {
    let headers = vec![
        "ID".to_string(),
        "Due".to_string(),
        "Status".to_string(),
        "Pri".to_string(),
        "Category".to_string(),
        "Title".to_string(),
        "Series".to_string(),
    ];

    let mut rows = Vec::with_capacity(tasks.len());

    for task in tasks {
        let due = task.due_date.format("%Y-%m-%d").to_string();
        let due = if paint && is_overdue(task, today) {
            colorize(&due, "31")
        } else {
            due
        };

        let id = if paint {
            colorize(&task.short_id(), "33")
        } else {
            task.short_id()
        };

        rows.push(vec![
            id,
            due,
            status_label(task.status()).to_string(),
            task.priority.to_string(),
            task.category.clone().unwrap_or_default(),
            task.title.clone(),
            series_label(task),
        ]);
    }

    write_table(writer, headers, rows)
}

pub fn write_task_info<W: Write>(mut out: W, task: &Task, today: NaiveDate) -> anyhow::Result<()> {
    writeln!(out, "id          {}", task.id)?;
    writeln!(out, "title       {}", task.title)?;
    writeln!(
        out,
        "description {}",
        task.description.clone().unwrap_or_default()
    )?;
    writeln!(
        out,
        "category    {}",
        task.category.clone().unwrap_or_default()
    )?;
    writeln!(out, "due         {}", task.due_date.format("%Y-%m-%d"))?;
    writeln!(out, "status      {}", task.status())?;
    writeln!(out, "completed   {}", task.completed())?;
    writeln!(out, "overdue     {}", is_overdue(task, today))?;
    writeln!(out, "priority    {}", task.priority)?;

    if let Some(parent) = task.parent_task_id {
        writeln!(out, "parent      {parent}")?;
    }
    if let Some(rule) = task.recurrence_rule() {
        writeln!(
            out,
            "recurrence  every {} {} until {}",
            rule.interval(),
            rule.frequency,
            rule.effective_end(task.due_date).format("%Y-%m-%d")
        )?;
    }

    writeln!(out, "created     {}", task.created.format("%Y-%m-%dT%H:%M:%SZ"))?;
    writeln!(out, "modified    {}", task.modified.format("%Y-%m-%dT%H:%M:%SZ"))?;
    Ok(())
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Pending => "pending",
        Status::InProgress => "in progress",
        Status::Completed => "done",
    }
}

fn series_label(task: &Task) -> String {
    if let Some(rule) = task.recurrence_rule() {
        format!("{} x{}", rule.frequency, rule.interval())
    } else if task.is_occurrence() {
        "occurrence".to_string()
    } else {
        String::new()
    }
}

fn colorize(text: &str, code: &str) -> String {
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
