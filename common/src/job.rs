use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskKind;

/// Fase del job. Sólo avanza: Map -> Reduce -> Done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Map,
    Reduce,
    Done,
}

impl Phase {
    /// Tipo de tarea que se reparte en esta fase (ninguno en Done).
    pub fn task_kind(self) -> Option<TaskKind> {
        match self {
            Phase::Map => Some(TaskKind::Map),
            Phase::Reduce => Some(TaskKind::Reduce),
            Phase::Done => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseProgress {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub idle: u32,
}

/// Respuesta de `GET /api/v1/job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub phase: Phase,
    pub done: bool,
    pub maps: PhaseProgress,
    pub reduces: PhaseProgress,
    /// Tareas recuperadas por timeout desde el arranque.
    pub reclaimed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Respuesta de `GET /api/v1/job/done`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobDoneResponse {
    pub done: bool,
}
