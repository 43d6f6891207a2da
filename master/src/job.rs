use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mr_common::{naming, JobStatus, Phase, TaskId, TaskKind, TaskSnapshot};

use crate::phase::PhaseController;
use crate::registry::{RegistryError, TaskRegistry};

/// Estado completo del job: tabla de tareas, fase y los intermedios de cada
/// map confirmado. Vive detrás de un único mutex (`AppState::job`); el
/// despacho, los reportes y el detector de fallos son métodos `&mut self`
/// de este tipo (ver `dispatcher.rs`, `completion.rs` y `failover.rs`).
#[derive(Debug)]
pub struct Job {
    pub(crate) registry: TaskRegistry,
    pub(crate) phase: PhaseController,

    /// Intermedios reportados por el intento que confirmó cada map.
    pub(crate) map_outputs: BTreeMap<TaskId, Vec<String>>,

    pub(crate) reclaimed: u64,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        files: &[String],
        n_reduce: u32,
        task_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let registry = TaskRegistry::new(files, n_reduce, task_timeout)?;
        let phase = PhaseController::new(registry.n_map(), registry.n_reduce());
        let started_at = Utc::now();
        let finished_at = phase.is_done().then_some(started_at);

        Ok(Self {
            registry,
            phase,
            map_outputs: BTreeMap::new(),
            reclaimed: 0,
            started_at,
            finished_at,
        })
    }

    pub fn current_phase(&self) -> Phase {
        self.phase.current_phase()
    }

    /// `true` cuando todos los maps y reduces están confirmados. Una vez
    /// `true`, no vuelve a `false`.
    pub fn is_done(&self) -> bool {
        self.phase.is_done()
    }

    /// Archivos intermedios de la partición, en orden de id de map.
    /// Sólo incluye maps confirmados.
    pub fn reduce_inputs(&self, partition: u32) -> Vec<String> {
        self.map_outputs
            .values()
            .flatten()
            .filter(|f| matches!(naming::parse_intermediate(f), Some((_, r)) if r == partition))
            .cloned()
            .collect()
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            phase: self.current_phase(),
            done: self.is_done(),
            maps: self.registry.progress(TaskKind::Map),
            reduces: self.registry.progress(TaskKind::Reduce),
            reclaimed: self.reclaimed,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    pub fn snapshot(&self, now: Instant) -> Vec<TaskSnapshot> {
        self.registry.snapshot(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_sin_entradas_arranca_en_reduce() {
        let job = Job::new(&[], 2, Duration::from_secs(10)).unwrap();
        assert_eq!(job.current_phase(), Phase::Reduce);
        assert!(!job.is_done());
        assert_eq!(job.status().maps.total, 0);
        assert_eq!(job.status().reduces.total, 2);
    }

    #[test]
    fn reduce_inputs_filtra_por_particion_en_orden_de_map() {
        let files = vec!["a".to_string(), "b".to_string()];
        let mut job = Job::new(&files, 2, Duration::from_secs(10)).unwrap();
        job.map_outputs
            .insert(1, vec!["out/mr-1-0".into(), "out/mr-1-1".into()]);
        job.map_outputs
            .insert(0, vec!["out/mr-0-0".into(), "out/mr-0-1".into()]);

        assert_eq!(job.reduce_inputs(1), vec!["out/mr-0-1", "out/mr-1-1"]);
        assert_eq!(job.reduce_inputs(0), vec!["out/mr-0-0", "out/mr-1-0"]);
    }
}
