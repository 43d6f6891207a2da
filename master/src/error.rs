use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mr_common::{TaskId, WorkerId};
use serde_json::json;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errores visibles para el worker. Sólo los pedidos imposibles (violaciones
/// del protocolo) llegan acá; las carreras entre intentos se absorben antes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("tarea desconocida: {0}")]
    UnknownTask(TaskId),

    #[error("worker desconocido: {0} (falta registrarse)")]
    UnknownWorker(WorkerId),

    #[error("salida {output:?} inválida para la tarea {task_id}: se esperaba {expected}")]
    MalformedOutput {
        task_id: TaskId,
        output: String,
        expected: String,
    },

    #[error("transición inválida: {0}")]
    InvalidState(String),
}

impl From<RegistryError> for CoordinatorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownTask(id) => CoordinatorError::UnknownTask(id),
            other @ (RegistryError::InvalidState { .. } | RegistryError::TooManyTasks { .. }) => {
                CoordinatorError::InvalidState(other.to_string())
            }
        }
    }
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = match self {
            CoordinatorError::UnknownTask(_)
            | CoordinatorError::UnknownWorker(_)
            | CoordinatorError::MalformedOutput { .. } => StatusCode::BAD_REQUEST,
            CoordinatorError::InvalidState(_) => StatusCode::CONFLICT,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
