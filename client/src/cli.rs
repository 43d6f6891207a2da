use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mr_common::{JobDoneResponse, JobStatus, PhaseProgress, TaskSnapshot, WorkerMetrics};
use reqwest::Client;
use serde::de::DeserializeOwned;

#[derive(Parser)]
#[command(name = "mr-client")]
#[command(about = "CLI simple para consultar al master MapReduce")]
struct Cli {
    /// URL base del master (en Docker: http://master:8080)
    #[arg(long, env = "MASTER_URL", default_value = "http://localhost:8080")]
    master: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fase y progreso del job
    Status,
    /// Sale con código 0 si el job terminó, 1 si no
    Done,
    /// Espera hasta que el job termine
    Wait {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Tabla de tareas
    Tasks,
    /// Workers registrados y sus contadores
    Workers,
}

async fn get_json<T: DeserializeOwned>(client: &Client, base_url: &str, path: &str) -> Result<T> {
    let url = format!("{}{}", base_url, path);
    let value = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(value)
}

fn progress_line(name: &str, p: &PhaseProgress) -> String {
    format!(
        "  {:<8}: {}/{} completas ({} en curso, {} libres)",
        name, p.completed, p.total, p.in_progress, p.idle
    )
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();
    let base_url = cli.master.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Status => {
            let status: JobStatus = get_json(&client, &base_url, "/api/v1/job").await?;
            println!("Job:");
            println!("  fase    : {:?}", status.phase);
            println!("  terminado: {}", status.done);
            println!("{}", progress_line("maps", &status.maps));
            println!("{}", progress_line("reduces", &status.reduces));
            println!("  recuperadas por timeout: {}", status.reclaimed);
            println!("  inicio  : {}", status.started_at);
            match status.finished_at {
                Some(t) => println!("  fin     : {}", t),
                None => println!("  fin     : (en curso)"),
            }
        }

        Commands::Done => {
            let resp: JobDoneResponse = get_json(&client, &base_url, "/api/v1/job/done").await?;
            println!("{}", resp.done);
            if !resp.done {
                std::process::exit(1);
            }
        }

        Commands::Wait { interval_ms } => {
            let interval = Duration::from_millis(interval_ms.max(1));
            loop {
                let resp: JobDoneResponse =
                    get_json(&client, &base_url, "/api/v1/job/done").await?;
                if resp.done {
                    println!("Job terminado.");
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        }

        Commands::Tasks => {
            let tasks: Vec<TaskSnapshot> = get_json(&client, &base_url, "/api/v1/tasks").await?;
            if tasks.is_empty() {
                println!("El job no tiene tareas.");
            }
            for t in tasks {
                let worker = t
                    .assigned_worker
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let running = t
                    .running_ms
                    .map(|ms| format!("{} ms", ms))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>4} {:<7} {:<11} worker={:<4} intento={:<3} {:<10} {}",
                    t.task_id,
                    format!("{:?}", t.kind),
                    format!("{:?}", t.state),
                    worker,
                    t.attempt,
                    running,
                    t.input
                );
            }
        }

        Commands::Workers => {
            let workers: Vec<WorkerMetrics> =
                get_json(&client, &base_url, "/api/v1/workers").await?;
            if workers.is_empty() {
                println!("No hay workers registrados.");
            }
            for w in workers {
                println!("Worker {}", w.worker_id);
                println!("  host          : {}", w.hostname);
                println!("  registrado    : {}", w.registered_at);
                println!("  último contacto: {} s", w.last_seen_secs_ago);
                println!(
                    "  tareas        : iniciadas={}, aceptadas={}, descartadas={}",
                    w.tasks_started, w.reports_accepted, w.reports_ignored
                );
                println!();
            }
        }
    }

    Ok(())
}
