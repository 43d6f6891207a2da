use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::job::Job;
use crate::registry::Reclaimed;
use crate::state::AppState;

impl Job {
    /// Detector de fallos: devuelve a Idle las tareas en vuelo con el plazo
    /// vencido. No hay heartbeats: el único dato de vida es `assigned_at`.
    pub fn reclaim_expired(&mut self, now: Instant) -> Vec<Reclaimed> {
        let reclaimed = self.registry.reclaim_expired(now);
        self.reclaimed += reclaimed.len() as u64;
        reclaimed
    }
}

/// Loop principal de tolerancia a fallos:
/// - cada `every` revisa la tabla de tareas
/// - reencola (vuelve a Idle) las que superaron el plazo
/// - termina cuando el job está Done
///
/// No intenta contactar ni matar al worker original: si sigue vivo y
/// reporta tarde, el chequeo de intento decide.
pub async fn run_failover_loop(state: AppState, every: Duration) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if state.is_done() {
            info!("job terminado, el detector de fallos se detiene");
            return;
        }

        sweep_once(&state, Instant::now());
    }
}

/// Una pasada de chequeo. Devuelve cuántas tareas se recuperaron.
pub fn sweep_once(state: &AppState, now: Instant) -> usize {
    let reclaimed = state.job().reclaim_expired(now);

    for r in &reclaimed {
        warn!(
            task_id = r.task_id,
            worker = ?r.worker,
            attempt = r.attempt,
            elapsed_ms = r.elapsed.as_millis() as u64,
            "tarea vencida, vuelve a Idle para reasignarse"
        );
    }

    reclaimed.len()
}
