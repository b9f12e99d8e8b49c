use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use matcher_core::config;
use matcher_core::models::EntityKind;
use matcher_core::pipeline::{build_registry, build_vector_store, Orchestrator};
use std::path::PathBuf;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    let pool = storage::connect(&cfg.database.path).await?;
    storage::migrate(&pool).await?;
    let registry = build_registry(&cfg);
    let store = build_vector_store(&cfg);
    let orchestrator = Orchestrator::new(pool.clone(), registry, store, &cfg);

    match cli.command {
        Commands::AddResume {
            candidate_id,
            name,
            text,
            text_file,
            no_pipeline,
        } => {
            let extracted = match (text, text_file) {
                (Some(t), _) => t,
                (None, Some(path)) => std::fs::read_to_string(path)?,
                (None, None) => bail!("provide --text or --text-file"),
            };
            let id = Uuid::new_v4().to_string();
            let candidate_id = candidate_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            storage::insert_resume(&pool, &id, &candidate_id, &name, Some(&extracted)).await?;
            println!("{id}");
            if !no_pipeline {
                // Dispatch is fire-and-forget; the process just outlives the run.
                let handle = orchestrator.trigger_pipeline(EntityKind::Resume, id.clone());
                handle.await?;
                print_status(&orchestrator, EntityKind::Resume, &id).await?;
            }
        }
        Commands::AddJob {
            title,
            description,
            requirements,
            no_pipeline,
        } => {
            let id = Uuid::new_v4().to_string();
            storage::insert_job(
                &pool,
                &id,
                &title,
                description.as_deref(),
                requirements.as_deref(),
            )
            .await?;
            println!("{id}");
            if !no_pipeline {
                let handle = orchestrator.trigger_pipeline(EntityKind::Job, id.clone());
                handle.await?;
                print_status(&orchestrator, EntityKind::Job, &id).await?;
            }
        }
        Commands::Pipeline { kind, id } => {
            let handle = orchestrator.trigger_pipeline(kind.into(), id.clone());
            handle.await?;
            print_status(&orchestrator, kind.into(), &id).await?;
        }
        Commands::Status { kind, id } => {
            print_status(&orchestrator, kind.into(), &id).await?;
        }
        Commands::Match {
            kind,
            id,
            limit,
            min_score,
        } => {
            let limit = limit.unwrap_or(cfg.matching.limit);
            let min_score = min_score.unwrap_or(cfg.matching.min_score);
            let results = orchestrator
                .rank_matches(kind.into(), &id, limit, min_score)
                .await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::Embed { kind, id } => {
            orchestrator.embed_now(kind.into(), &id).await?;
            print_status(&orchestrator, kind.into(), &id).await?;
        }
        Commands::Delete { kind, id } => {
            orchestrator.delete_entity(kind.into(), &id).await?;
            println!("deleted {id}");
        }
        Commands::DeleteVector { id } => {
            orchestrator.delete_vector(&id).await?;
            println!("deleted vector {id}");
        }
    }
    Ok(())
}

async fn print_status(orchestrator: &Orchestrator, kind: EntityKind, id: &str) -> Result<()> {
    let status = orchestrator.get_pipeline_status(kind, id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[derive(Parser)]
#[command(name = "hr-matcher")]
#[command(about = "Semantic candidate/job matching", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Resume,
    Job,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Resume => EntityKind::Resume,
            KindArg::Job => EntityKind::Job,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register a resume from extracted text and run its pipeline
    AddResume {
        /// Candidate id; generated when omitted
        #[arg(long)]
        candidate_id: Option<String>,
        /// Candidate display name
        #[arg(long)]
        name: String,
        /// Extracted resume text, inline
        #[arg(long)]
        text: Option<String>,
        /// Read extracted resume text from a file
        #[arg(long)]
        text_file: Option<PathBuf>,
        /// Insert only; do not run the pipeline
        #[arg(long, default_value_t = false)]
        no_pipeline: bool,
    },
    /// Register a job posting and run its pipeline
    AddJob {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        requirements: Option<String>,
        /// Insert only; do not run the pipeline
        #[arg(long, default_value_t = false)]
        no_pipeline: bool,
    },
    /// Re-run the parse/embed pipeline for an entity
    Pipeline {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
    },
    /// Show an entity's pipeline status
    Status {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
    },
    /// Rank entities of the opposite kind against this one
    Match {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
        /// Number of results
        #[arg(short, long)]
        limit: Option<usize>,
        /// Drop results scoring below this floor
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// Embed an entity now, bypassing the parse stage
    Embed {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
    },
    /// Delete an entity and its vector
    Delete {
        #[arg(value_enum)]
        kind: KindArg,
        id: String,
    },
    /// Delete only the stored vector for an id
    DeleteVector { id: String },
}
