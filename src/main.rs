use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod db;
mod directory;
mod error;
mod models;
mod promotion;
mod report;
mod semester;
mod store;
mod summary;
mod telemetry;

use crate::db::PgStore;
use crate::models::NewIdentity;

#[derive(Parser)]
#[command(name = "campus-records")]
#[command(about = "Attendance summaries and semester promotion for the campus console", long_about = None)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5, global = true)]
    max_connections: u32,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Print a student's academic summary as JSON
    Summary {
        #[arg(long)]
        student: Uuid,
    },
    /// List the subjects for a student's current semester
    Courses {
        #[arg(long)]
        student: Uuid,
    },
    /// List the timetable for a student's class
    Timetable {
        #[arg(long)]
        student: Uuid,
    },
    /// Generate a markdown attendance report for a student
    Report {
        #[arg(long)]
        student: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a student's per-subject attendance as CSV
    Export {
        #[arg(long)]
        student: Uuid,
        #[arg(long, default_value = "attendance.csv")]
        out: PathBuf,
    },
    /// Advance every student one semester and graduate final-semester students
    Promote,
    /// Create directory accounts from a JSON array
    Enroll {
        #[arg(long)]
        file: PathBuf,
    },
    /// Show directory totals
    Stats,
    /// Store a face embedding (JSON array of numbers) for a student
    RegisterFace {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        embedding: PathBuf,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_tracing(env!("CARGO_CRATE_NAME"), &cli.log_level);

    let database_url = cli
        .database_url
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Summary { student } => {
            let summary = summary::compute_summary(&store, student).await?;
            print_json(&summary)?;
        }
        Commands::Courses { student } => {
            let courses = summary::compute_courses(&store, student).await?;
            print_json(&serde_json::json!({ "courses": courses }))?;
        }
        Commands::Timetable { student } => {
            let timetable = summary::compute_timetable(&store, student).await?;
            print_json(&serde_json::json!({ "timetable": timetable }))?;
        }
        Commands::Report { student, out } => {
            let summary = summary::compute_summary(&store, student).await?;
            let report = report::build_report(&summary, chrono::Utc::now().date_naive());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { student, out } => {
            let summary = summary::compute_summary(&store, student).await?;
            report::export_subject_csv(&out, &summary.academics.subject_stats)?;
            println!(
                "Exported {} subjects to {}.",
                summary.academics.subject_stats.len(),
                out.display()
            );
        }
        Commands::Promote => {
            let result = promotion::promote_cohort(&store).await?;
            print_json(&result)?;
        }
        Commands::Enroll { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let entries: Vec<NewIdentity> =
                serde_json::from_str(&raw).context("users must be a JSON array")?;
            let results = directory::enroll_identities(&store, &entries).await;
            print_json(&results)?;
        }
        Commands::Stats => {
            let stats = directory::directory_stats(&store).await?;
            print_json(&stats)?;
        }
        Commands::RegisterFace { student, embedding } => {
            let raw = std::fs::read_to_string(&embedding)
                .with_context(|| format!("failed to read {}", embedding.display()))?;
            let vector: Vec<f32> =
                serde_json::from_str(&raw).context("embedding must be a JSON array of numbers")?;
            directory::register_face(&store, student, &vector).await?;
            println!("Face registered for {student}.");
        }
    }

    Ok(())
}
