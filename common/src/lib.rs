//! Tipos compartidos entre master, worker y cliente.
//!
//! Todo lo que viaja por HTTP (JSON) vive aquí, junto con la convención de
//! nombres de archivos intermedios y la aplicación WordCount que ejecutan
//! los workers.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};

pub mod engine;
pub mod job;
pub mod naming;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use job::{JobDoneResponse, JobStatus, Phase, PhaseProgress};
pub use task::{
    TaskDescriptor, TaskId, TaskKind, TaskReply, TaskReportRequest, TaskReportResponse,
    TaskRequest, TaskSnapshot, TaskState,
};
pub use worker::{WorkerId, WorkerMetrics, WorkerRegisterRequest, WorkerRegisterResponse};

/* --------- Aplicación map/reduce --------- */

/// Un par clave/valor emitido por la función map.
/// Los archivos intermedios guardan uno por línea en JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// map(nombre_archivo, contenido) -> pares intermedios
pub type MapFn = fn(filename: &str, contents: &str) -> Vec<KeyValue>;

/// reduce(clave, valores) -> valor final
pub type ReduceFn = fn(key: &str, values: &[String]) -> String;

/// Una aplicación MapReduce: el par de funciones que corre el worker.
#[derive(Clone, Copy)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/// Hash de una clave intermedia. La partición de reduce es
/// `ihash(key) % n_reduce`.
pub fn ihash(key: &str) -> u32 {
    let mut hasher = fnv::FnvHasher::default();
    hasher.write(key.as_bytes());
    (hasher.finish() & 0x7fff_ffff) as u32
}

/// Partición de reduce para una clave.
pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihash_es_estable_y_positivo() {
        let a = ihash("hola");
        let b = ihash("hola");
        assert_eq!(a, b);
        assert!(a <= 0x7fff_ffff);
    }

    #[test]
    fn partition_for_queda_en_rango() {
        for key in ["a", "mundo", "mapreduce", "", "zzz"] {
            assert!(partition_for(key, 3) < 3);
        }
        // n_reduce = 0 no debe dividir por cero
        assert_eq!(partition_for("x", 0), 0);
    }
}
