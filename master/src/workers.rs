use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use mr_common::{WorkerId, WorkerMetrics};

use crate::error::CoordinatorError;

#[derive(Debug, Clone)]
pub struct WorkerMeta {
    pub hostname: String,
    pub registered_at: DateTime<Utc>,
    pub last_seen: Instant,

    // Métricas
    pub tasks_started: u64,
    pub reports_accepted: u64,
    pub reports_ignored: u64,
}

/// Workers conocidos. Sólo sirve para dar ids y para `GET /api/v1/workers`:
/// la vida de un worker nunca se decide acá sino por el plazo de sus tareas.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    next_id: WorkerId,
    workers: BTreeMap<WorkerId, WorkerMeta>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// InitWorker: da un id nuevo, único durante toda la vida del master.
    pub fn register(&mut self, hostname: String, now: Instant) -> WorkerId {
        let id = self.next_id;
        self.next_id += 1;

        self.workers.insert(
            id,
            WorkerMeta {
                hostname,
                registered_at: Utc::now(),
                last_seen: now,
                tasks_started: 0,
                reports_accepted: 0,
                reports_ignored: 0,
            },
        );
        id
    }

    fn get_mut(&mut self, id: WorkerId) -> Result<&mut WorkerMeta, CoordinatorError> {
        self.workers
            .get_mut(&id)
            .ok_or(CoordinatorError::UnknownWorker(id))
    }

    /// Marca contacto del worker; falla si nunca se registró.
    pub fn touch(&mut self, id: WorkerId, now: Instant) -> Result<(), CoordinatorError> {
        self.get_mut(id)?.last_seen = now;
        Ok(())
    }

    pub fn record_started(&mut self, id: WorkerId) {
        if let Ok(meta) = self.get_mut(id) {
            meta.tasks_started += 1;
        }
    }

    pub fn record_report(&mut self, id: WorkerId, accepted: bool) {
        if let Ok(meta) = self.get_mut(id) {
            if accepted {
                meta.reports_accepted += 1;
            } else {
                meta.reports_ignored += 1;
            }
        }
    }

    pub fn metrics(&self, now: Instant) -> Vec<WorkerMetrics> {
        self.workers
            .iter()
            .map(|(id, meta)| WorkerMetrics {
                worker_id: *id,
                hostname: meta.hostname.clone(),
                registered_at: meta.registered_at,
                last_seen_secs_ago: now.saturating_duration_since(meta.last_seen).as_secs(),
                tasks_started: meta.tasks_started,
                reports_accepted: meta.reports_accepted,
                reports_ignored: meta.reports_ignored,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn register_da_ids_unicos_y_crecientes() {
        let mut reg = WorkerRegistry::new();
        let now = Instant::now();
        let a = reg.register("h1".into(), now);
        let b = reg.register("h1".into(), now);
        let c = reg.register("h2".into(), now);

        assert!(a < b && b < c);
        assert_eq!(reg.metrics(now).len(), 3);
    }

    #[test]
    fn touch_de_worker_desconocido_falla() {
        let mut reg = WorkerRegistry::new();
        assert_eq!(
            reg.touch(3, Instant::now()),
            Err(CoordinatorError::UnknownWorker(3))
        );
    }

    #[test]
    fn metrics_refleja_contadores() {
        let mut reg = WorkerRegistry::new();
        let t0 = Instant::now();
        let id = reg.register("host".into(), t0);
        reg.record_started(id);
        reg.record_report(id, true);
        reg.record_report(id, false);
        reg.touch(id, t0 + Duration::from_secs(2)).unwrap();

        let m = &reg.metrics(t0 + Duration::from_secs(5))[0];
        assert_eq!(m.worker_id, id);
        assert_eq!(m.hostname, "host");
        assert_eq!(m.tasks_started, 1);
        assert_eq!(m.reports_accepted, 1);
        assert_eq!(m.reports_ignored, 1);
        assert_eq!(m.last_seen_secs_ago, 3);
    }
}
