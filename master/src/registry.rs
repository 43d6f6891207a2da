// master/src/registry.rs

use std::time::{Duration, Instant};

use mr_common::{PhaseProgress, TaskId, TaskKind, TaskSnapshot, TaskState, WorkerId};
use thiserror::Error;
use tracing::debug;

/// Entrada de una tarea: un archivo para map, una partición para reduce.
/// Los archivos concretos de un reduce se resuelven al despacharlo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskInput {
    File(String),
    Partition(u32),
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    pub input: TaskInput,
    pub state: TaskState,
    pub assigned_worker: Option<WorkerId>,
    /// Instante monotónico de la asignación actual.
    pub assigned_at: Option<Instant>,
    /// Sube en cada (re)asignación. 0 = nunca asignada.
    pub attempt: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tarea desconocida: {0}")]
    UnknownTask(TaskId),

    #[error("la tarea {id} no admite la transición desde {state:?}")]
    InvalidState { id: TaskId, state: TaskState },

    #[error("{n_files} archivos y {n_reduce} particiones exceden el rango de ids de tarea")]
    TooManyTasks { n_files: usize, n_reduce: u32 },
}

/// Cantidad de maps, si los `n_files + n_reduce` ids de tarea caben en
/// `TaskId`.
pub fn checked_map_count(n_files: usize, n_reduce: u32) -> Option<u32> {
    let n_map = TaskId::try_from(n_files).ok()?;
    n_map.checked_add(n_reduce)?;
    Some(n_map)
}

/// Resultado de aplicar un reporte de fin de tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// El reporte correspondía al intento actual y la tarea quedó Completed.
    Committed,
    /// Reporte viejo o duplicado; no cambió nada.
    Ignored,
}

/// Una tarea que el detector devolvió a Idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reclaimed {
    pub task_id: TaskId,
    pub worker: Option<WorkerId>,
    pub attempt: u32,
    pub elapsed: Duration,
}

/// Tabla de tareas del job. El índice en `tasks` es el id de la tarea.
///
/// No tiene lock propio: vive dentro de `Job`, detrás del único mutex del
/// master, así que cada método corre entero dentro de la sección crítica.
#[derive(Debug)]
pub struct TaskRegistry {
    tasks: Vec<Task>,
    n_map: u32,
    n_reduce: u32,
    timeout: Duration,
}

impl TaskRegistry {
    /// Crea un map por archivo (ids `0..n_map`) y un reduce por partición
    /// (ids `n_map..n_map + n_reduce`).
    pub fn new(
        files: &[String],
        n_reduce: u32,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let n_map =
            checked_map_count(files.len(), n_reduce).ok_or(RegistryError::TooManyTasks {
                n_files: files.len(),
                n_reduce,
            })?;

        let maps = files.iter().zip(0..).map(|(f, id)| Task {
            id,
            kind: TaskKind::Map,
            input: TaskInput::File(f.clone()),
            state: TaskState::Idle,
            assigned_worker: None,
            assigned_at: None,
            attempt: 0,
        });
        let reduces = (0..n_reduce).map(|p| Task {
            id: n_map + p,
            kind: TaskKind::Reduce,
            input: TaskInput::Partition(p),
            state: TaskState::Idle,
            assigned_worker: None,
            assigned_at: None,
            attempt: 0,
        });

        Ok(Self {
            tasks: maps.chain(reduces).collect(),
            n_map,
            n_reduce,
            timeout,
        })
    }

    pub fn n_map(&self) -> u32 {
        self.n_map
    }

    pub fn n_reduce(&self) -> u32 {
        self.n_reduce
    }

    pub fn get(&self, id: TaskId) -> Result<&Task, RegistryError> {
        self.tasks
            .get(id as usize)
            .ok_or(RegistryError::UnknownTask(id))
    }

    fn get_mut(&mut self, id: TaskId) -> Result<&mut Task, RegistryError> {
        self.tasks
            .get_mut(id as usize)
            .ok_or(RegistryError::UnknownTask(id))
    }

    pub fn tasks(&self, kind: TaskKind) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.kind == kind)
    }

    fn is_expired(&self, task: &Task, now: Instant) -> bool {
        task.state == TaskState::InProgress
            && task
                .assigned_at
                .map(|at| now.saturating_duration_since(at) > self.timeout)
                .unwrap_or(true)
    }

    /// Idle, o InProgress con el plazo vencido (recuperable).
    fn is_eligible(&self, task: &Task, now: Instant) -> bool {
        match task.state {
            TaskState::Idle => true,
            TaskState::InProgress => self.is_expired(task, now),
            TaskState::Completed => false,
        }
    }

    /// Ids elegibles de ese tipo, en orden ascendente.
    pub fn list_eligible(&self, kind: TaskKind, now: Instant) -> Vec<TaskId> {
        self.tasks(kind)
            .filter(|t| self.is_eligible(t, now))
            .map(|t| t.id)
            .collect()
    }

    /// Asigna la tarea a `worker` y devuelve el intento nuevo.
    ///
    /// Falla con `InvalidState` si la tarea ya terminó o si está en vuelo con
    /// el plazo todavía vigente: dos asignaciones seguidas sobre la misma
    /// tarea sólo pueden ocurrir si la primera venció.
    pub fn assign(
        &mut self,
        id: TaskId,
        worker: WorkerId,
        now: Instant,
    ) -> Result<u32, RegistryError> {
        let eligible = self.is_eligible(self.get(id)?, now);
        let task = self.get_mut(id)?;
        if !eligible {
            return Err(RegistryError::InvalidState {
                id,
                state: task.state,
            });
        }

        task.state = TaskState::InProgress;
        task.assigned_worker = Some(worker);
        task.assigned_at = Some(now);
        task.attempt += 1;
        Ok(task.attempt)
    }

    /// Marca la tarea como Completed si `attempt` es el intento actual.
    ///
    /// Cualquier otro caso (intento viejo, tarea ya terminada, intento 0) es
    /// un no-op y devuelve `Ignored`. Un reporte del intento actual sobre una
    /// tarea que el detector devolvió a Idle se acepta: nadie la reasignó
    /// todavía y el resultado es igual de válido.
    pub fn complete(
        &mut self,
        id: TaskId,
        worker: WorkerId,
        attempt: u32,
    ) -> Result<Completion, RegistryError> {
        let task = self.get_mut(id)?;

        if task.state == TaskState::Completed || attempt == 0 || attempt != task.attempt {
            debug!(
                task_id = id,
                worker,
                attempt,
                current = task.attempt,
                state = ?task.state,
                "reporte descartado"
            );
            return Ok(Completion::Ignored);
        }

        if task.assigned_worker.is_some_and(|w| w != worker) {
            debug!(
                task_id = id,
                worker,
                assigned = ?task.assigned_worker,
                "reporte del intento actual desde otro worker"
            );
        }

        task.state = TaskState::Completed;
        task.assigned_worker = None;
        task.assigned_at = None;
        Ok(Completion::Committed)
    }

    /// Devuelve a Idle toda tarea en vuelo cuyo plazo venció. No toca
    /// `attempt`: la próxima asignación lo incrementa.
    pub fn reclaim_expired(&mut self, now: Instant) -> Vec<Reclaimed> {
        let timeout = self.timeout;
        let mut out = Vec::new();

        for task in self.tasks.iter_mut() {
            if task.state != TaskState::InProgress {
                continue;
            }
            let elapsed = task
                .assigned_at
                .map(|at| now.saturating_duration_since(at))
                .unwrap_or(Duration::MAX);
            if elapsed <= timeout {
                continue;
            }

            out.push(Reclaimed {
                task_id: task.id,
                worker: task.assigned_worker,
                attempt: task.attempt,
                elapsed,
            });
            task.state = TaskState::Idle;
            task.assigned_worker = None;
            task.assigned_at = None;
        }

        out
    }

    pub fn progress(&self, kind: TaskKind) -> PhaseProgress {
        let mut p = PhaseProgress::default();
        for t in self.tasks(kind) {
            p.total += 1;
            match t.state {
                TaskState::Idle => p.idle += 1,
                TaskState::InProgress => p.in_progress += 1,
                TaskState::Completed => p.completed += 1,
            }
        }
        p
    }

    pub fn snapshot(&self, now: Instant) -> Vec<TaskSnapshot> {
        self.tasks
            .iter()
            .map(|t| TaskSnapshot {
                task_id: t.id,
                kind: t.kind,
                input: match &t.input {
                    TaskInput::File(f) => f.clone(),
                    TaskInput::Partition(p) => format!("partition {}", p),
                },
                state: t.state,
                assigned_worker: t.assigned_worker,
                attempt: t.attempt,
                running_ms: t
                    .assigned_at
                    .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            })
            .collect()
    }
}
