use serde::{Deserialize, Serialize};

use crate::worker::WorkerId;

/// Id de tarea. Los maps ocupan `0..n_map` (en el orden de los archivos de
/// entrada) y los reduces `n_map..n_map + n_reduce`.
pub type TaskId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Map,
    Reduce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Idle,
    InProgress,
    Completed,
}

/// Lo que recibe un worker cuando se le asigna una tarea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub task_id: TaskId,
    pub kind: TaskKind,

    /// Map: el archivo de entrada.
    /// Reduce: los archivos intermedios de su partición, de todos los maps
    /// ya confirmados.
    pub input_files: Vec<String>,

    /// Intento actual; hay que devolverlo tal cual en el reporte.
    pub attempt: u32,

    pub n_reduce: u32,
    pub n_map: u32,

    /// Sólo para reduce: la partición que consume.
    pub partition: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub worker_id: WorkerId,
}

/// Respuesta a `POST /api/v1/tasks/next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskReply {
    /// No hay tarea elegible ahora, pero la fase no terminó: volver a pedir.
    Wait,
    /// El job terminó; el worker puede salir.
    Exit,
    Task(TaskDescriptor),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReportRequest {
    pub task_id: TaskId,
    pub worker_id: WorkerId,
    pub attempt: u32,

    /// Map: archivos intermedios producidos (vacío = todas las particiones
    /// según la convención de nombres).
    /// Reduce: el archivo de salida de la partición.
    #[serde(default)]
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReportResponse {
    /// `false` si el reporte era viejo o duplicado y se descartó.
    pub accepted: bool,
}

/// Una fila de la tabla de tareas, para `GET /api/v1/tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub input: String,
    pub state: TaskState,
    pub assigned_worker: Option<WorkerId>,
    pub attempt: u32,
    /// Milisegundos desde la asignación actual (sólo en vuelo).
    pub running_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_reply_usa_tag_type() {
        let wait = serde_json::to_value(TaskReply::Wait).unwrap();
        assert_eq!(wait, json!({"type": "WAIT"}));

        let reply = TaskReply::Task(TaskDescriptor {
            task_id: 4,
            kind: TaskKind::Reduce,
            input_files: vec!["mr-0-1".into()],
            attempt: 2,
            n_reduce: 3,
            n_map: 1,
            partition: Some(1),
        });
        let v = serde_json::to_value(&reply).unwrap();
        assert_eq!(v["type"], "TASK");
        assert_eq!(v["kind"], "REDUCE");
        assert_eq!(v["partition"], 1);
    }

    #[test]
    fn report_sin_outputs_deserializa_vacio() {
        let req: TaskReportRequest =
            serde_json::from_value(json!({"task_id": 1, "worker_id": 7, "attempt": 1}))
                .unwrap();
        assert!(req.outputs.is_empty());
    }
}
