use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dropout_risk::config::{
    DEFAULT_MIN_TIER_SAMPLES, DEFAULT_MODEL_DIR, DEFAULT_SAMPLES, DEFAULT_SEED, DEFAULT_TREES,
};
use dropout_risk::synth::SeededRandom;
use dropout_risk::{
    counsel, report, FileModelRepository, ModelRepository, RiskPredictor, Settings,
    StudentObservation, TrainingConfig,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod db;

#[derive(Parser)]
#[command(name = "dropout-risk")]
#[command(about = "Student dropout risk scoring and counselling support", long_about = None)]
struct Cli {
    /// Directory holding the trained model artifacts
    #[arg(long, env = "DROPOUT_MODEL_DIR", default_value = DEFAULT_MODEL_DIR, global = true)]
    model_dir: PathBuf,

    /// Postgres connection string for the assessment record log
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    database_url: Option<String>,

    #[arg(long, default_value_t = DEFAULT_SEED, global = true)]
    seed: u64,

    #[arg(long, default_value_t = DEFAULT_SAMPLES, global = true)]
    samples: usize,

    #[arg(long, default_value_t = DEFAULT_TREES, global = true)]
    trees: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Train the risk model and replace the stored artifacts
    Train,
    /// Score one student
    Predict {
        #[arg(long)]
        name: String,
        #[arg(long)]
        attendance: f64,
        #[arg(long)]
        gpa: f64,
        #[arg(long)]
        participation: f64,
        #[arg(long)]
        stress: f64,
        #[arg(long)]
        family_income: f64,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
        /// Skip writing the assessment to the record log
        #[arg(long)]
        dry_run: bool,
    },
    /// Score and record students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List recorded assessments, most recent first
    Students {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Ask the counselling assistant
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            model_dir: self.model_dir.clone(),
            training: TrainingConfig {
                seed: self.seed,
                samples: self.samples,
                trees: self.trees,
                min_tier_samples: DEFAULT_MIN_TIER_SAMPLES,
                max_depth: None,
            },
        }
    }

    async fn connect(&self) -> anyhow::Result<PgPool> {
        let database_url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance for this command")?;
        PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to Postgres")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();
    let predictor = RiskPredictor::new(FileModelRepository::from_settings(&settings));

    match &cli.command {
        Commands::InitDb => {
            let pool = cli.connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Train => {
            let handle = predictor.repository().retrain()?;
            match &handle.warning {
                Some(warning) => println!("Model trained but not saved: {warning}"),
                None => println!(
                    "Model {} trained and saved to {}.",
                    handle.model.run_id,
                    settings.model_dir.display()
                ),
            }
        }
        Commands::Predict {
            name,
            attendance,
            gpa,
            participation,
            stress,
            family_income,
            json,
            dry_run,
        } => {
            let observation = StudentObservation {
                attendance: *attendance,
                gpa: *gpa,
                participation: *participation,
                stress: *stress,
                family_income: *family_income,
            };
            let outcome = predictor.assess(name, observation)?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome.response())?);
            } else {
                println!(
                    "{}: {} risk ({}% confidence)",
                    outcome.name, outcome.assessment.risk_level, outcome.assessment.risk_score
                );
                for recommendation in &outcome.recommendations {
                    println!("- {recommendation}");
                }
            }

            if !*dry_run {
                let pool = cli.connect().await?;
                db::insert_assessment(&pool, &outcome.to_record()).await?;
                eprintln!("Recorded assessment for {}.", outcome.name);
            }
        }
        Commands::Import { csv } => {
            let pool = cli.connect().await?;
            let summary = db::import_csv(&pool, &predictor, csv).await?;
            println!(
                "Recorded {} assessments from {} ({} invalid rows skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
        Commands::Students { limit } => {
            let pool = cli.connect().await?;
            let records = db::fetch_assessments(&pool, None, *limit).await?;

            if records.is_empty() {
                println!("No assessments recorded yet.");
                return Ok(());
            }

            println!("Most recent assessments:");
            for record in &records {
                println!(
                    "- {} ({}) {} risk, {}% confidence",
                    record.name,
                    record.recorded_at.format("%Y-%m-%d %H:%M"),
                    record.risk_level,
                    record.risk_score
                );
            }
        }
        Commands::Report { since_days, out } => {
            let pool = cli.connect().await?;
            let cutoff = report::cutoff(*since_days);
            let records = db::fetch_assessments(&pool, Some(cutoff), i64::MAX).await?;
            let report = report::build_report(*since_days, cutoff, &records);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Chat { message } => {
            let mut rng = SeededRandom::new(rand::random());
            println!("{}", counsel::respond(&message.join(" "), &mut rng));
        }
    }

    Ok(())
}
