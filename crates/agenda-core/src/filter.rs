use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::trace;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::task::{
  Priority,
  Status,
  Task
};
use crate::view::is_overdue;

/// Stems that turn a search into an
/// "overdue tasks" query ("atrasada",
/// "atraso", "vencida",
/// "vencimento").
const OVERDUE_STEMS: [&str; 2] =
  ["atras", "venc"];

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum StatusFilter {
  #[default]
  All,
  Only(Status)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Only(Priority)
}

fn is_all_keyword(raw: &str) -> bool {
  matches!(
    normalize_text(raw).trim(),
    "all" | "todas" | "todos" | "*"
  )
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if is_all_keyword(s) {
      return Ok(Self::All);
    }
    Status::parse(s)
      .map(Self::Only)
      .ok_or_else(|| {
        anyhow!(
          "unknown status filter: {s}"
        )
      })
  }
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    if is_all_keyword(s) {
      return Ok(Self::All);
    }
    Priority::parse(s)
      .map(Self::Only)
      .ok_or_else(|| {
        anyhow!(
          "unknown priority filter: {s}"
        )
      })
  }
}

impl StatusFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Only(status) => {
        task.status() == status
      }
    }
  }
}

impl PriorityFilter {
  pub fn matches(
    self,
    task: &Task
  ) -> bool {
    match self {
      | Self::All => true,
      | Self::Only(priority) => {
        task.priority == priority
      }
    }
  }
}

/// Canonical decomposition with
/// combining marks dropped, then
/// lowercased. Letters without a
/// decomposition (`ß`, `ª`, `Œ`) are
/// kept as they are.
#[must_use]
pub fn normalize_text(
  raw: &str
) -> String {
  raw
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .collect::<String>()
    .to_lowercase()
}

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct SearchQuery {
  normalized: String
}

impl SearchQuery {
  pub fn new(raw: &str) -> Self {
    Self {
      normalized: normalize_text(
        raw.trim()
      )
    }
  }

  pub fn is_empty(&self) -> bool {
    self.normalized.is_empty()
  }

  /// True when the query asks for
  /// overdue tasks instead of text.
  pub fn is_overdue_keyword(
    &self
  ) -> bool {
    OVERDUE_STEMS.iter().any(|stem| {
      self.normalized.contains(stem)
    })
  }

  pub fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    if self.is_empty() {
      return true;
    }
    if self.is_overdue_keyword() {
      return is_overdue(task, today);
    }

    let q = self.normalized.as_str();
    [
      Some(task.title.as_str()),
      task.description.as_deref(),
      task.category.as_deref()
    ]
    .into_iter()
    .flatten()
    .any(|field| {
      normalize_text(field).contains(q)
    })
  }
}

#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct TaskFilter {
  pub status:   StatusFilter,
  pub priority: PriorityFilter,
  pub search:   SearchQuery
}

impl TaskFilter {
  pub fn new(
    status: StatusFilter,
    priority: PriorityFilter,
    search_term: &str
  ) -> Self {
    Self {
      status,
      priority,
      search: SearchQuery::new(
        search_term
      )
    }
  }

  pub fn matches(
    &self,
    task: &Task,
    today: NaiveDate
  ) -> bool {
    let ok = self.status.matches(task)
      && self.priority.matches(task)
      && self
        .search
        .matches(task, today);
    trace!(id = %task.id, ok, "task filter evaluation");
    ok
  }
}

/// Tasks that pass every active filter,
/// in input order.
#[tracing::instrument(skip(
  tasks, today
))]
pub fn apply_filters(
  tasks: &[Task],
  status: StatusFilter,
  priority: PriorityFilter,
  search_term: &str,
  today: NaiveDate
) -> Vec<Task> {
  let filter = TaskFilter::new(
    status,
    priority,
    search_term
  );
  tasks
    .iter()
    .filter(|task| {
      filter.matches(task, today)
    })
    .cloned()
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    PriorityFilter,
    SearchQuery,
    StatusFilter,
    apply_filters,
    normalize_text
  };
  use crate::task::{
    Priority,
    Status,
    Task
  };

  fn d(
    y: i32,
    m: u32,
    day: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day)
      .expect("valid date")
  }

  fn task(
    title: &str,
    due: NaiveDate
  ) -> Task {
    let now = Utc
      .with_ymd_and_hms(
        2025, 1, 1, 9, 0, 0
      )
      .single()
      .expect("valid now");
    Task::new(
      title.to_string(),
      due,
      now
    )
  }

  fn titles(
    tasks: &[Task]
  ) -> Vec<&str> {
    tasks
      .iter()
      .map(|t| t.title.as_str())
      .collect()
  }

  #[test]
  fn search_ignores_accents_and_case()
  {
    let today = d(2025, 3, 1);
    let tasks = vec![
      task(
        "Reunião com veterinário",
        d(2025, 3, 5)
      ),
      task("Comprar sal", d(2025, 3, 6)),
    ];

    let hits = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "reuniao",
      today
    );
    assert_eq!(
      titles(&hits),
      vec!["Reunião com veterinário"]
    );

    let hits = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "VETERINÁRIO",
      today
    );
    assert_eq!(hits.len(), 1);
  }

  #[test]
  fn search_covers_description_and_category()
   {
    let today = d(2025, 3, 1);
    let mut a =
      task("Tarefa A", d(2025, 3, 5));
    a.description =
      Some("Levar o gado ao pasto".to_string());
    let mut b =
      task("Tarefa B", d(2025, 3, 5));
    b.category =
      Some("Manutenção".to_string());
    let tasks = vec![a, b];

    let by_desc = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "gado",
      today
    );
    assert_eq!(
      titles(&by_desc),
      vec!["Tarefa A"]
    );

    let by_category = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "manutencao",
      today
    );
    assert_eq!(
      titles(&by_category),
      vec!["Tarefa B"]
    );
  }

  #[test]
  fn overdue_keywords_replace_text_match()
  {
    let today = d(2025, 3, 1);
    let late =
      task("Pagar boleto", d(2025, 2, 1));
    let mut late_done =
      task("Renovar seguro", d(2025, 2, 1));
    late_done.set_status(
      Status::Completed,
      late_done.modified
    );
    let named = task(
      "Verificar tarefa atrasada",
      d(2025, 3, 10)
    );
    let tasks =
      vec![late, late_done, named];

    for term in [
      "atrasada",
      "vencido",
      "Vencimento",
      "ATRASO"
    ] {
      let hits = apply_filters(
        &tasks,
        StatusFilter::All,
        PriorityFilter::All,
        term,
        today
      );
      assert_eq!(
        titles(&hits),
        vec!["Pagar boleto"],
        "term {term}"
      );
    }
  }

  #[test]
  fn filters_combine_with_and() {
    let today = d(2025, 3, 1);
    let mut high = task(
      "Vacinar bezerros",
      d(2025, 3, 4)
    );
    high.priority = Priority::High;
    let mut high_done = task(
      "Vacinar vacas",
      d(2025, 3, 4)
    );
    high_done.priority = Priority::High;
    high_done.set_status(
      Status::Completed,
      high_done.modified
    );
    let low =
      task("Vacinar touro", d(2025, 3, 4));
    let tasks =
      vec![high, high_done, low];

    let hits = apply_filters(
      &tasks,
      StatusFilter::Only(
        Status::Pending
      ),
      PriorityFilter::Only(
        Priority::High
      ),
      "vacinar",
      today
    );
    assert_eq!(
      titles(&hits),
      vec!["Vacinar bezerros"]
    );

    let everything = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "   ",
      today
    );
    assert_eq!(everything.len(), 3);
  }

  #[test]
  fn parses_filter_keywords() {
    assert_eq!(
      "todas"
        .parse::<StatusFilter>()
        .expect("all"),
      StatusFilter::All
    );
    assert_eq!(
      "pendente"
        .parse::<StatusFilter>()
        .expect("pending"),
      StatusFilter::Only(
        Status::Pending
      )
    );
    assert_eq!(
      "alta"
        .parse::<PriorityFilter>()
        .expect("high"),
      PriorityFilter::Only(
        Priority::High
      )
    );
    assert!(
      "urgent"
        .parse::<PriorityFilter>()
        .is_err()
    );
    assert!(
      SearchQuery::new("Vencidas")
        .is_overdue_keyword()
    );
    assert!(
      !SearchQuery::new("reuniao")
        .is_overdue_keyword()
    );
  }

  #[test]
  fn folding_only_strips_combining_marks()
  {
    let today = d(2025, 3, 1);
    let tasks = vec![
      task("Straße", d(2025, 3, 5)),
      task("1ª parcela", d(2025, 3, 5)),
      task("€ 100", d(2025, 3, 5)),
      task("Мост", d(2025, 3, 5)),
      task("Reunião", d(2025, 3, 5)),
    ];

    for query in
      ["ss", "1a parcela", "eur", "most"]
    {
      let hits = apply_filters(
        &tasks,
        StatusFilter::All,
        PriorityFilter::All,
        query,
        today
      );
      assert!(
        hits.is_empty(),
        "{query} matched {:?}",
        titles(&hits)
      );
    }

    let hits = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "reuniao",
      today
    );
    assert_eq!(
      titles(&hits),
      vec!["Reunião"]
    );

    let hits = apply_filters(
      &tasks,
      StatusFilter::All,
      PriorityFilter::All,
      "straße",
      today
    );
    assert_eq!(
      titles(&hits),
      vec!["Straße"]
    );
    assert_eq!(
      normalize_text("ÁTRÁS"),
      "atras"
    );
  }
}
