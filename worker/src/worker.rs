use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use mr_common::engine;
use mr_common::wordcount;
use mr_common::{
    TaskDescriptor, TaskKind, TaskReply, TaskReportRequest, TaskReportResponse, TaskRequest,
    WorkerId, WorkerRegisterRequest, WorkerRegisterResponse, Workload,
};
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub poll: Duration,
    pub max_retries: u32,
}

/// Llamadas HTTP al master.
struct MasterApi {
    client: Client,
    base_url: String,
}

impl MasterApi {
    fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }

    async fn register(&self, hostname: &str) -> Result<WorkerId> {
        let url = format!("{}/api/v1/workers/register", self.base_url);
        let resp: WorkerRegisterResponse = self
            .client
            .post(&url)
            .json(&WorkerRegisterRequest {
                hostname: hostname.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.worker_id)
    }

    async fn next_task(&self, worker_id: WorkerId) -> Result<TaskReply> {
        let url = format!("{}/api/v1/tasks/next", self.base_url);
        let reply = self
            .client
            .post(&url)
            .json(&TaskRequest { worker_id })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(reply)
    }

    async fn report(&self, report: &TaskReportRequest) -> Result<bool> {
        let url = format!("{}/api/v1/tasks/complete", self.base_url);
        let resp: TaskReportResponse = self
            .client
            .post(&url)
            .json(report)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.accepted)
    }
}

/// Cuenta fallos seguidos al hablar con el master.
struct Retries {
    failures: u32,
    max: u32,
}

impl Retries {
    fn new(max: u32) -> Self {
        Self { failures: 0, max }
    }

    fn ok(&mut self) {
        self.failures = 0;
    }

    /// Registra un fallo; devuelve false cuando ya no hay que reintentar.
    fn failed(&mut self) -> bool {
        self.failures += 1;
        self.failures <= self.max
    }
}

/// Loop principal del worker.
/// - Se registra en el master.
/// - Pide tareas hasta recibir EXIT.
/// - Ejecuta cada tarea y reporta las salidas con el intento recibido.
/// - Si el master deja de responder `max_retries` veces seguidas, asume que
///   el job terminó y sale.
pub async fn run(config: WorkerConfig) -> Result<()> {
    let api = MasterApi::new(&config.base_url);
    let mut retries = Retries::new(config.max_retries);

    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let worker_id = loop {
        match api.register(&hostname).await {
            Ok(id) => break id,
            Err(e) => {
                if !retries.failed() {
                    warn!("no se pudo registrar en {}: {:#}", config.base_url, e);
                    return Ok(());
                }
                debug!("registro falló ({:#}), reintentando", e);
                sleep(config.poll).await;
            }
        }
    };
    retries.ok();

    info!(
        "worker {} registrado contra {} (dir={})",
        worker_id,
        config.base_url,
        config.data_dir.display()
    );

    loop {
        let reply = match api.next_task(worker_id).await {
            Ok(reply) => {
                retries.ok();
                reply
            }
            Err(e) => {
                if !retries.failed() {
                    warn!("master inalcanzable, saliendo: {:#}", e);
                    return Ok(());
                }
                debug!("pedido de tarea falló ({:#}), reintentando", e);
                sleep(config.poll).await;
                continue;
            }
        };

        let task = match reply {
            TaskReply::Task(task) => task,
            TaskReply::Wait => {
                debug!("sin tareas elegibles, esperando {:?}", config.poll);
                sleep(config.poll).await;
                continue;
            }
            TaskReply::Exit => {
                info!("job terminado, worker {} sale", worker_id);
                return Ok(());
            }
        };

        info!(
            task_id = task.task_id,
            kind = ?task.kind,
            attempt = task.attempt,
            inputs = task.input_files.len(),
            "tarea recibida"
        );

        let task_id = task.task_id;
        let attempt = task.attempt;
        let dir = config.data_dir.clone();

        // map/reduce tocan disco: fuera del runtime async
        let handle = tokio::task::spawn_blocking(move || {
            execute(&wordcount::workload(), &task, &dir)
        });

        let outputs = match handle.await {
            Ok(Ok(outputs)) => outputs,
            Ok(Err(e)) => {
                // sin reporte: el master la reasigna al vencer el plazo
                warn!("error procesando tarea {}: {:#}", task_id, e);
                continue;
            }
            Err(e) => {
                warn!("panic o join error en tarea {}: {:?}", task_id, e);
                continue;
            }
        };

        let report = TaskReportRequest {
            task_id,
            worker_id,
            attempt,
            outputs,
        };

        match api.report(&report).await {
            Ok(true) => info!("tarea {} confirmada", task_id),
            Ok(false) => info!("tarea {} ya estaba resuelta, reporte descartado", task_id),
            Err(e) => warn!("no se pudo reportar la tarea {}: {:#}", task_id, e),
        }
    }
}

/// Ejecuta una tarea y devuelve las rutas escritas.
pub fn execute(workload: &Workload, task: &TaskDescriptor, dir: &Path) -> Result<Vec<String>> {
    match task.kind {
        TaskKind::Map => {
            let input = task
                .input_files
                .first()
                .with_context(|| format!("map {} sin archivo de entrada", task.task_id))?;
            engine::run_map_task(workload, task.task_id, input, task.n_reduce, dir)
        }
        TaskKind::Reduce => {
            let partition = task
                .partition
                .with_context(|| format!("reduce {} sin partición", task.task_id))?;
            let output = engine::run_reduce_task(workload, partition, &task.input_files, dir)?;
            Ok(vec![output])
        }
    }
}
