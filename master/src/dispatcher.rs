use std::time::Instant;

use mr_common::{TaskDescriptor, TaskId, TaskReply, WorkerId};
use tracing::{debug, info};

use crate::error::CoordinatorError;
use crate::job::Job;
use crate::registry::TaskInput;

impl Job {
    /// RequestTask: asigna al worker la tarea elegible de menor id de la fase
    /// actual, o responde `Wait`/`Exit`.
    ///
    /// Los reduces no son visibles hasta que la fase pasa a Reduce, o sea,
    /// hasta que todos los maps están confirmados.
    pub fn request_task(
        &mut self,
        worker: WorkerId,
        now: Instant,
    ) -> Result<TaskReply, CoordinatorError> {
        let phase = self.current_phase();
        let Some(kind) = phase.task_kind() else {
            return Ok(TaskReply::Exit);
        };

        // list_eligible viene ordenada: siempre la de menor id
        let Some(&task_id) = self.registry.list_eligible(kind, now).first() else {
            debug!(worker, ?phase, "sin tareas elegibles, el worker espera");
            return Ok(TaskReply::Wait);
        };

        let attempt = self.registry.assign(task_id, worker, now)?;
        let descriptor = self.describe(task_id, attempt)?;

        info!(
            task_id,
            attempt,
            worker,
            kind = ?descriptor.kind,
            inputs = descriptor.input_files.len(),
            "tarea asignada"
        );
        Ok(TaskReply::Task(descriptor))
    }

    fn describe(&self, task_id: TaskId, attempt: u32) -> Result<TaskDescriptor, CoordinatorError> {
        let task = self.registry.get(task_id)?;
        let (input_files, partition) = match &task.input {
            TaskInput::File(f) => (vec![f.clone()], None),
            // se resuelve ahora: los intermedios del intento que confirmó cada map
            TaskInput::Partition(p) => (self.reduce_inputs(*p), Some(*p)),
        };

        Ok(TaskDescriptor {
            task_id,
            kind: task.kind,
            input_files,
            attempt,
            n_reduce: self.registry.n_reduce(),
            n_map: self.registry.n_map(),
            partition,
        })
    }
}
