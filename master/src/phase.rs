use mr_common::{Phase, TaskKind};

/// Máquina de fases del job: Map -> Reduce -> Done, sólo hacia adelante.
///
/// Los contadores sólo suben con confirmaciones (`Completion::Committed`),
/// y cada tarea se confirma una única vez, así que cada transición dispara
/// exactamente una vez aunque lleguen dos reportes finales a la vez: ambos
/// pasan por el mismo lock.
#[derive(Debug)]
pub struct PhaseController {
    phase: Phase,
    n_map: u32,
    n_reduce: u32,
    maps_done: u32,
    reduces_done: u32,
}

impl PhaseController {
    pub fn new(n_map: u32, n_reduce: u32) -> Self {
        let mut c = Self {
            phase: Phase::Map,
            n_map,
            n_reduce,
            maps_done: 0,
            reduces_done: 0,
        };
        // sin archivos de entrada no hay nada que mapear
        c.advance();
        c
    }

    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    #[cfg(test)]
    pub fn completed(&self, kind: TaskKind) -> u32 {
        match kind {
            TaskKind::Map => self.maps_done,
            TaskKind::Reduce => self.reduces_done,
        }
    }

    /// Registra una tarea confirmada. Devuelve la fase nueva si hubo
    /// transición.
    pub fn record_commit(&mut self, kind: TaskKind) -> Option<Phase> {
        match kind {
            TaskKind::Map => self.maps_done += 1,
            TaskKind::Reduce => self.reduces_done += 1,
        }
        self.advance()
    }

    fn advance(&mut self) -> Option<Phase> {
        let before = self.phase;
        if self.phase == Phase::Map && self.maps_done >= self.n_map {
            self.phase = Phase::Reduce;
        }
        if self.phase == Phase::Reduce && self.reduces_done >= self.n_reduce {
            self.phase = Phase::Done;
        }
        (self.phase != before).then_some(self.phase)
    }
}
