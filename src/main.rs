use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use my_grades::grade::{self, GradeError};
use my_grades::{db, report};

#[derive(Parser)]
#[command(name = "my-grades")]
#[command(about = "Course grade tracking for students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import assignments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the assignments of a course
    Assignments {
        #[arg(long)]
        course: Uuid,
    },
    /// Print the grade summary of a course as JSON
    Grade {
        #[arg(long)]
        course: Uuid,
    },
    /// Generate a markdown grade report for a student
    Report {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

/// Exit status for a course that could not be graded.
fn exit_code(err: &GradeError) -> u8 {
    match err {
        GradeError::NoGradedAssignments => 2,
        GradeError::MalformedInput { .. } => 3,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;
    let max_connections = match std::env::var("MY_GRADES_MAX_CONNECTIONS") {
        Ok(value) => value
            .parse::<u32>()
            .with_context(|| format!("MY_GRADES_MAX_CONNECTIONS is not a number: {value}"))?,
        Err(_) => 5,
    };

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            info!("schema ready");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            info!("seed data inserted");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} assignments from {}.", csv.display());
        }
        Commands::Assignments { course } => {
            db::fetch_course(&pool, course)
                .await?
                .with_context(|| format!("course {course} not found"))?;
            let assignments = db::fetch_assignments(&pool, course).await?;
            println!("{}", serde_json::to_string_pretty(&assignments)?);
        }
        Commands::Grade { course } => {
            db::fetch_course(&pool, course)
                .await?
                .with_context(|| format!("course {course} not found"))?;
            let records = db::fetch_assignment_records(&pool, course).await?;

            match grade::aggregate(&records) {
                Ok(summary) => {
                    info!(%course, grade = %summary.final_grade_string, "course graded");
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(err) => {
                    tracing::warn!(%course, error = %err, "course could not be graded");
                    let body = serde_json::json!({
                        "error": err.to_string(),
                        "kind": err.kind(),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    return Ok(ExitCode::from(exit_code(&err)));
                }
            }
        }
        Commands::Report { username, out } => {
            let student = db::fetch_student(&pool, &username)
                .await?
                .with_context(|| format!("student {username} not found"))?;
            let courses = db::fetch_student_courses(&pool, &username).await?;

            let mut graded = Vec::with_capacity(courses.len());
            for course in courses {
                let records = db::fetch_assignment_records(&pool, course.id).await?;
                let summary = grade::aggregate(&records);
                graded.push((course, summary));
            }

            let report = report::build_report(&student, Utc::now().date_naive(), &graded);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
