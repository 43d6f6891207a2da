mod worker;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::worker::WorkerConfig;

#[derive(Parser, Debug)]
#[command(name = "mr-worker")]
#[command(about = "Worker MapReduce: pide tareas al master y las ejecuta")]
struct Args {
    /// URL base del master (en Docker: http://master:8080)
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080")]
    master: String,

    /// Directorio donde se escriben intermedios y salidas
    #[arg(long, env = "MR_DATA_DIR", default_value = ".")]
    dir: PathBuf,

    /// Espera entre pedidos cuando el master responde WAIT, en milisegundos
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,

    /// Intentos seguidos sin poder hablar con el master antes de salir
    #[arg(long, default_value_t = 5)]
    max_retries: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mr_worker=info")),
        )
        .init();

    let args = Args::parse();

    worker::run(WorkerConfig {
        base_url: args.master.trim_end_matches('/').to_string(),
        data_dir: args.dir,
        poll: Duration::from_millis(args.poll_ms),
        max_retries: args.max_retries,
    })
    .await
}
