// master/src/state.rs

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::job::Job;
use crate::workers::WorkerRegistry;

/// Estado compartido del master.
///
/// `job` es el único estado mutable que tocan a la vez el despacho, los
/// reportes y el detector de fallos: cada operación completa (buscar +
/// asignar, validar + confirmar, revisar + revertir) se hace con este lock
/// tomado. `workers` tiene su propio lock y nunca se toma junto con `job`.
#[derive(Clone)]
pub struct AppState {
    job: Arc<Mutex<Job>>,
    workers: Arc<Mutex<WorkerRegistry>>,
}

impl AppState {
    pub fn new(job: Job) -> Self {
        Self {
            job: Arc::new(Mutex::new(job)),
            workers: Arc::new(Mutex::new(WorkerRegistry::new())),
        }
    }

    // Un lock envenenado se recupera: ninguna transición queda a medias.
    pub fn job(&self) -> MutexGuard<'_, Job> {
        self.job.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn workers(&self) -> MutexGuard<'_, WorkerRegistry> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// IsJobDone.
    pub fn is_done(&self) -> bool {
        self.job().is_done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use std::time::{Duration, Instant};

    use mr_common::{Phase, TaskKind, TaskReply, TaskReportRequest, WorkerId};

    use crate::registry::Completion;

    const WORKERS: u64 = 8;
    const TIMEOUT: Duration = Duration::from_secs(10);

    fn state(n_files: usize, n_reduce: u32) -> AppState {
        let files: Vec<String> = (0..n_files).map(|i| format!("in-{}.txt", i)).collect();
        AppState::new(Job::new(&files, n_reduce, TIMEOUT).unwrap())
    }

    /// Corre `f(worker)` en `WORKERS` hilos que arrancan juntos.
    fn race<T, F>(f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(WorkerId) -> T + Sync,
    {
        let barrier = Barrier::new(WORKERS as usize);
        thread::scope(|s| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|w| {
                    let (barrier, f) = (&barrier, &f);
                    s.spawn(move || {
                        barrier.wait();
                        f(w)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn pedidos_concurrentes_asignan_la_tarea_una_sola_vez() {
        let state = state(1, 1);
        let now = Instant::now();

        let replies = race(|w| state.job().request_task(w, now).unwrap());

        let winners: Vec<_> = replies
            .iter()
            .filter_map(|r| match r {
                TaskReply::Task(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].task_id, 0);
        assert_eq!(winners[0].attempt, 1);
        assert_eq!(
            replies.iter().filter(|r| **r == TaskReply::Wait).count(),
            WORKERS as usize - 1
        );

        let task = state.job().registry.get(0).unwrap().clone();
        assert_eq!(task.attempt, 1);
        assert!(task.assigned_worker.is_some());
    }

    #[test]
    fn reportes_finales_concurrentes_cambian_de_fase_una_vez() {
        let state = state(1, 1);
        let now = Instant::now();

        let TaskReply::Task(map) = state.job().request_task(0, now).unwrap() else {
            panic!("se esperaba el map");
        };
        let map_report = TaskReportRequest {
            task_id: map.task_id,
            worker_id: 0,
            attempt: map.attempt,
            outputs: vec![],
        };

        let outcomes = race(|_| state.job().report_done(&map_report).unwrap());
        assert_eq!(
            outcomes.iter().filter(|o| **o == Completion::Committed).count(),
            1
        );
        {
            let job = state.job();
            assert_eq!(job.current_phase(), Phase::Reduce);
            assert_eq!(job.phase.completed(TaskKind::Map), 1);
        }

        let TaskReply::Task(reduce) = state.job().request_task(1, now).unwrap() else {
            panic!("se esperaba el reduce");
        };
        let reduce_report = TaskReportRequest {
            task_id: reduce.task_id,
            worker_id: 1,
            attempt: reduce.attempt,
            outputs: vec![],
        };

        let outcomes = race(|_| state.job().report_done(&reduce_report).unwrap());
        assert_eq!(
            outcomes.iter().filter(|o| **o == Completion::Committed).count(),
            1
        );

        assert!(state.is_done());
        let job = state.job();
        assert_eq!(job.phase.completed(TaskKind::Reduce), 1);
        assert!(job.status().finished_at.is_some());
    }

    #[test]
    fn maps_distintos_se_reparten_sin_repetir() {
        let state = state(WORKERS as usize, 2);
        let now = Instant::now();

        let mut ids: Vec<u32> = race(|w| match state.job().request_task(w, now).unwrap() {
            TaskReply::Task(t) => t.task_id,
            other => panic!("se esperaba una tarea, llegó {:?}", other),
        });
        ids.sort_unstable();

        let expected: Vec<u32> = (0..WORKERS as u32).collect();
        assert_eq!(ids, expected);
        assert_eq!(state.job().request_task(99, now).unwrap(), TaskReply::Wait);
    }
}
