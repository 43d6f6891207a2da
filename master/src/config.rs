use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use glob::glob;

use crate::registry::checked_map_count;

/// Argumentos del master. Cada uno se puede dar también por variable de
/// entorno.
#[derive(Parser, Debug)]
#[command(name = "mr-master")]
#[command(about = "Coordinador MapReduce: reparte tareas map/reduce entre workers")]
pub struct Args {
    /// Dirección donde escucha el API HTTP
    #[arg(long, env = "MR_MASTER_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// Cantidad de particiones (tareas reduce)
    #[arg(long, env = "MR_N_REDUCE", default_value_t = 10)]
    pub n_reduce: u32,

    /// Plazo en segundos antes de dar por perdida una tarea en vuelo
    #[arg(long, env = "MR_TASK_TIMEOUT_SECS", default_value_t = 10)]
    pub task_timeout_secs: u64,

    /// Cada cuánto corre el detector de fallos, en milisegundos
    #[arg(long, env = "MR_SWEEP_INTERVAL_MS", default_value_t = 1000)]
    pub sweep_interval_ms: u64,

    /// Segundos que el master sigue respondiendo EXIT después de terminar
    #[arg(long, env = "MR_LINGER_SECS", default_value_t = 3)]
    pub linger_secs: u64,

    /// Archivos de entrada (rutas o patrones glob)
    #[arg(value_name = "FILES", required = true)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub n_reduce: u32,
    pub task_timeout: Duration,
    pub sweep_interval: Duration,
    pub linger: Duration,
    /// Un map por archivo, en este orden.
    pub files: Vec<String>,
}

impl Args {
    pub fn into_config(self) -> Result<Config> {
        if self.n_reduce == 0 {
            bail!("--n-reduce debe ser mayor que cero");
        }
        if self.task_timeout_secs == 0 {
            bail!("--task-timeout-secs debe ser mayor que cero");
        }
        if self.sweep_interval_ms == 0 {
            bail!("--sweep-interval-ms debe ser mayor que cero");
        }

        let files = expand_inputs(&self.files)?;
        check_task_count(files.len(), self.n_reduce)?;

        Ok(Config {
            addr: self.addr,
            n_reduce: self.n_reduce,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            linger: Duration::from_secs(self.linger_secs),
            files,
        })
    }
}

/// Los ids de tarea son `u32`: maps y reduces juntos tienen que caber.
fn check_task_count(n_files: usize, n_reduce: u32) -> Result<()> {
    if checked_map_count(n_files, n_reduce).is_none() {
        bail!(
            "demasiadas tareas: {} archivos de entrada y {} particiones",
            n_files,
            n_reduce
        );
    }
    Ok(())
}

/// Expande los patrones en archivos concretos, respetando el orden de los
/// patrones (cada glob sale ordenado) y sin repetir. Un patrón que no
/// coincide con ningún archivo es un error.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        let mut matched = 0;
        let entries = glob(pattern).with_context(|| format!("patrón inválido: {}", pattern))?;

        for entry in entries {
            let path = entry.with_context(|| format!("leyendo coincidencias de {}", pattern))?;
            if !path.is_file() {
                continue;
            }
            matched += 1;
            let path = path.to_string_lossy().to_string();
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }

        if matched == 0 {
            bail!("el patrón {} no coincide con ningún archivo", pattern);
        }
    }

    Ok(files)
}
