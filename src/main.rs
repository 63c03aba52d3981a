use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod analytics;
mod config;
mod error;
mod http;
mod models;
mod predictor;
mod report;
mod store;

use config::AppConfig;
use predictor::{LinearModel, Predictor};
use store::{Dataset, DatasetStore, UploadPolicy};

#[derive(Parser)]
#[command(name = "student-analytics")]
#[command(about = "Cohort and per-student performance analytics with pass/fail prediction", long_about = None)]
struct Cli {
    /// Dataset loaded at startup
    #[arg(long, env = "STUDENT_DATA", default_value = config::DEFAULT_DATA_PATH, global = true)]
    data: PathBuf,
    /// Trained model artifact (JSON)
    #[arg(long, env = "STUDENT_MODEL", default_value = config::DEFAULT_MODEL_PATH, global = true)]
    model: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API
    Serve {
        #[arg(long, env = "STUDENT_BIND", default_value = config::DEFAULT_BIND)]
        bind: SocketAddr,
        /// Written on every accepted upload
        #[arg(long, default_value = config::DEFAULT_UPDATED_PATH)]
        updated_path: PathBuf,
        /// Written on every download request
        #[arg(long, default_value = config::DEFAULT_CURRENT_PATH)]
        current_path: PathBuf,
        /// Also require a Student_ID column in uploaded files
        #[arg(long, env = "STUDENT_REQUIRE_ID")]
        require_student_id: bool,
    },
    /// Print headline metrics and the lowest-scoring students
    Summary {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn load_inputs(
    data: &Path,
    model_path: &Path,
    policy: UploadPolicy,
) -> anyhow::Result<(Dataset, LinearModel)> {
    let dataset = Dataset::load(data, policy).context("dataset is required at startup")?;
    let model = LinearModel::load(model_path).context("model artifact is required at startup")?;
    tracing::info!(
        students = dataset.len(),
        data = %data.display(),
        model = %model_path.display(),
        "inputs loaded"
    );
    Ok((dataset, model))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("student_analytics=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            updated_path,
            current_path,
            require_student_id,
        } => {
            let config = AppConfig {
                bind,
                data_path: cli.data,
                model_path: cli.model,
                updated_path,
                current_path,
                upload_policy: UploadPolicy { require_student_id },
            };
            let (dataset, model) =
                load_inputs(&config.data_path, &config.model_path, config.upload_policy)?;

            let store = Arc::new(DatasetStore::new(dataset));
            let predictor: Arc<dyn Predictor> = Arc::new(model);
            let state = http::HttpState::new(store, predictor, &config);

            http::serve(config.bind, state, async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down");
            })
            .await?;
        }
        Commands::Summary { limit } => {
            let (dataset, model) = load_inputs(&cli.data, &cli.model, UploadPolicy::default())?;
            let summary = analytics::cohort_summary(&dataset, &model)?;
            let ranked = analytics::rank_by_score(&dataset, &model)?;

            println!("Students: {}", summary.dataset_size);
            println!("Average attendance: {:.2}%", summary.average_attendance);
            println!("Predicted to pass: {}", summary.predicted_pass);

            println!("Lowest predicted scores:");
            for student in ranked.iter().take(limit) {
                println!(
                    "- {} ({}) score {:.2} [{:?}]: {}",
                    student.name,
                    student.student_id.as_deref().unwrap_or("no id"),
                    student.prediction.score,
                    student.prediction.result,
                    student.recommendations.join(" | ")
                );
            }
        }
        Commands::Report { out } => {
            let (dataset, model) = load_inputs(&cli.data, &cli.model, UploadPolicy::default())?;
            let report = report::build_report(
                &dataset,
                &model,
                &cli.data.display().to_string(),
                chrono::Utc::now(),
            )?;
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
