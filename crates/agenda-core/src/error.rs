use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgendaError {
    #[error("task title is required")]
    EmptyTitle,

    #[error("task {0} belongs to a series and cannot carry its own recurrence")]
    OccurrenceCannotRecur(Uuid),

    #[error("task {0} is not the anchor of a series")]
    NotAnAnchor(Uuid),

    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("task id already exists: {0}")]
    DuplicateId(Uuid),

    #[error("no task matches id '{0}'")]
    UnknownIdPrefix(String),

    #[error("id prefix '{0}' matches more than one task")]
    AmbiguousId(String),

    #[error("selection is empty")]
    EmptySelection,
}
