use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id de worker, asignado por el master en el registro.
pub type WorkerId = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterRequest {
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRegisterResponse {
    pub worker_id: WorkerId,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerMetrics {
    pub worker_id: WorkerId,
    pub hostname: String,
    pub registered_at: DateTime<Utc>,
    pub last_seen_secs_ago: u64,
    pub tasks_started: u64,
    pub reports_accepted: u64,
    pub reports_ignored: u64,
}
