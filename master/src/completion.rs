use std::collections::HashSet;

use chrono::Utc;
use mr_common::{naming, Phase, TaskKind, TaskReportRequest};
use tracing::{debug, info};

use crate::error::CoordinatorError;
use crate::job::Job;
use crate::registry::{Completion, Task, TaskInput};

impl Job {
    /// ReportDone: aplica el reporte de fin de un intento.
    ///
    /// Reportes viejos o duplicados devuelven `Completion::Ignored` sin tocar
    /// nada. Sólo son error los pedidos imposibles: tarea desconocida o
    /// nombres de salida que no respetan la convención.
    pub fn report_done(
        &mut self,
        report: &TaskReportRequest,
    ) -> Result<Completion, CoordinatorError> {
        let task = self.registry.get(report.task_id)?;
        let kind = task.kind;
        self.validate_outputs(task, &report.outputs)?;

        let outcome =
            self.registry
                .complete(report.task_id, report.worker_id, report.attempt)?;

        if outcome == Completion::Ignored {
            debug!(
                task_id = report.task_id,
                worker = report.worker_id,
                attempt = report.attempt,
                "reporte viejo o duplicado, se descarta"
            );
            return Ok(outcome);
        }

        info!(
            task_id = report.task_id,
            worker = report.worker_id,
            attempt = report.attempt,
            ?kind,
            "tarea confirmada"
        );

        if kind == TaskKind::Map {
            let outputs = if report.outputs.is_empty() {
                (0..self.registry.n_reduce())
                    .map(|r| naming::intermediate_name(report.task_id, r))
                    .collect()
            } else {
                report.outputs.clone()
            };
            self.map_outputs.insert(report.task_id, outputs);
        }

        if let Some(next) = self.phase.record_commit(kind) {
            info!(phase = ?next, "cambio de fase");
            if next == Phase::Done {
                self.finished_at = Some(Utc::now());
            }
        }

        Ok(outcome)
    }

    /// Cada salida debe respetar la convención de nombres y nombrar una
    /// partición distinta: un duplicado haría que el reduce leyera dos veces
    /// el mismo intermedio.
    fn validate_outputs(&self, task: &Task, outputs: &[String]) -> Result<(), CoordinatorError> {
        let n_reduce = self.registry.n_reduce();
        let mut seen = HashSet::new();

        for output in outputs {
            let (partition, expected) = match &task.input {
                TaskInput::File(_) => (
                    naming::parse_intermediate(output)
                        .filter(|&(m, r)| m == task.id && r < n_reduce)
                        .map(|(_, r)| r),
                    format!("mr-{}-<0..{}>", task.id, n_reduce),
                ),
                TaskInput::Partition(p) => (
                    naming::parse_output(output).filter(|r| r == p),
                    naming::output_name(*p),
                ),
            };

            let Some(partition) = partition else {
                return Err(CoordinatorError::MalformedOutput {
                    task_id: task.id,
                    output: output.clone(),
                    expected,
                });
            };

            if !seen.insert(partition) {
                return Err(CoordinatorError::MalformedOutput {
                    task_id: task.id,
                    output: output.clone(),
                    expected: format!("una sola salida para la partición {}", partition),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mr_common::{TaskReply, TaskState};
    use std::time::{Duration, Instant};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn job(n_files: usize, n_reduce: u32) -> Job {
        let files: Vec<String> = (0..n_files).map(|i| format!("in-{}.txt", i)).collect();
        Job::new(&files, n_reduce, TIMEOUT).unwrap()
    }

    fn assign(job: &mut Job, worker: u64, now: Instant) -> (u32, u32) {
        match job.request_task(worker, now).unwrap() {
            TaskReply::Task(t) => (t.task_id, t.attempt),
            other => panic!("se esperaba una tarea, llegó {:?}", other),
        }
    }

    fn report(task_id: u32, worker: u64, attempt: u32, outputs: &[&str]) -> TaskReportRequest {
        TaskReportRequest {
            task_id,
            worker_id: worker,
            attempt,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn tarea_desconocida_es_bad_request() {
        let mut job = job(1, 1);
        assert_eq!(
            job.report_done(&report(42, 1, 1, &[])),
            Err(CoordinatorError::UnknownTask(42))
        );
    }

    #[test]
    fn salida_de_map_con_nombre_ajeno_se_rechaza() {
        let mut job = job(2, 2);
        let now = Instant::now();
        let (id, attempt) = assign(&mut job, 1, now);

        // intermedio de otro map
        let err = job
            .report_done(&report(id, 1, attempt, &["mr-1-0"]))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::MalformedOutput { task_id: 0, .. }));

        // partición fuera de rango
        assert!(job.report_done(&report(id, 1, attempt, &["mr-0-2"])).is_err());

        // y la tarea sigue en vuelo
        assert_eq!(job.registry.get(id).unwrap().state, TaskState::InProgress);
    }

    #[test]
    fn salida_de_map_con_particion_repetida_se_rechaza() {
        let mut job = job(1, 2);
        let now = Instant::now();
        let (id, attempt) = assign(&mut job, 1, now);

        let err = job
            .report_done(&report(id, 1, attempt, &["a/mr-0-0", "b/mr-0-0"]))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::MalformedOutput { task_id: 0, .. }));

        // nada quedó registrado y la tarea sigue en vuelo
        assert_eq!(job.registry.get(id).unwrap().state, TaskState::InProgress);
        assert!(job.reduce_inputs(0).is_empty());

        // el reporte correcto del mismo intento todavía se acepta
        assert_eq!(
            job.report_done(&report(id, 1, attempt, &["a/mr-0-0", "a/mr-0-1"])),
            Ok(Completion::Committed)
        );
        assert_eq!(job.reduce_inputs(0), vec!["a/mr-0-0"]);
    }

    #[test]
    fn salida_de_reduce_repetida_se_rechaza() {
        let mut job = job(1, 1);
        let now = Instant::now();
        let (m, a) = assign(&mut job, 1, now);
        job.report_done(&report(m, 1, a, &[])).unwrap();

        let (r, ra) = assign(&mut job, 1, now);
        assert!(job
            .report_done(&report(r, 1, ra, &["mr-out-0", "x/mr-out-0"]))
            .is_err());
        assert!(!job.is_done());
    }

    #[test]
    fn salida_de_reduce_debe_ser_su_particion() {
        let mut job = job(1, 2);
        let now = Instant::now();
        let (m, a) = assign(&mut job, 1, now);
        job.report_done(&report(m, 1, a, &[])).unwrap();

        let (r, ra) = assign(&mut job, 1, now);
        assert!(job.report_done(&report(r, 1, ra, &["mr-out-1"])).is_err());
        assert_eq!(
            job.report_done(&report(r, 1, ra, &["out/mr-out-0"])),
            Ok(Completion::Committed)
        );
    }

    #[test]
    fn reporte_tardio_del_worker_lento_se_descarta() {
        let mut job = job(1, 1);
        let t0 = Instant::now();

        let (id, slow_attempt) = assign(&mut job, 1, t0);
        job.reclaim_expired(t0 + TIMEOUT + Duration::from_secs(1));
        let (same_id, new_attempt) = assign(&mut job, 2, t0 + TIMEOUT * 2);
        assert_eq!(same_id, id);
        assert!(new_attempt > slow_attempt);

        assert_eq!(
            job.report_done(&report(id, 2, new_attempt, &["b/mr-0-0"])),
            Ok(Completion::Committed)
        );
        assert_eq!(
            job.report_done(&report(id, 1, slow_attempt, &["a/mr-0-0"])),
            Ok(Completion::Ignored)
        );

        let t = job.registry.get(id).unwrap();
        assert_eq!(t.state, TaskState::Completed);
        assert_eq!(t.attempt, new_attempt);
        // los intermedios visibles son los del intento confirmado
        assert_eq!(job.reduce_inputs(0), vec!["b/mr-0-0"]);
        assert_eq!(job.phase.completed(TaskKind::Map), 1);
    }

    #[test]
    fn reporte_duplicado_no_cuenta_dos_veces() {
        let mut job = job(2, 1);
        let now = Instant::now();
        let (id, attempt) = assign(&mut job, 1, now);

        job.report_done(&report(id, 1, attempt, &[])).unwrap();
        job.report_done(&report(id, 1, attempt, &[])).unwrap();

        assert_eq!(job.phase.completed(TaskKind::Map), 1);
        assert_eq!(job.current_phase(), Phase::Map);
    }

    #[test]
    fn done_registra_finished_at() {
        let mut job = job(1, 1);
        let now = Instant::now();
        let (m, a) = assign(&mut job, 1, now);
        job.report_done(&report(m, 1, a, &[])).unwrap();
        assert!(job.finished_at.is_none());

        let (r, ra) = assign(&mut job, 1, now);
        job.report_done(&report(r, 1, ra, &[])).unwrap();
        assert!(job.is_done());
        assert!(job.status().finished_at.is_some());
    }
}
