use crate::config::AppConfig;
use crate::embeddings::EmbeddingService;
use crate::error::MatchError;
use crate::matching::{parsed_from_row, MatchingService};
use crate::models::{
    EmbedIntent, EntityKind, MatchResult, PipelineStatus, ProcessingStatus, StageError,
};
use crate::vectorstore::{InMemoryStore, QdrantStore, VectorStore};
use chrono::Utc;
use providers::gemini::{GeminiConfig, GeminiProvider};
use providers::hash::HashEmbeddingProvider;
use providers::noop::NoopProvider;
use providers::qdrant::QdrantClient;
use providers::ProviderRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Drives the per-entity state machine pending → parsing → embedding →
/// completed/failed, persisting the status after every stage so a failure in
/// one stage never corrupts the entity's record.
///
/// Runs for different entities are independent; nothing orders or blocks one
/// entity's pipeline on another's. Re-triggering an entity whose previous run
/// is still in flight is allowed: the outcome is last-writer-wins on the
/// parsed data and the vector.
#[derive(Clone)]
pub struct Orchestrator {
    pool: SqlitePool,
    registry: ProviderRegistry,
    store: Arc<dyn VectorStore>,
    embeddings: Arc<EmbeddingService>,
    llm_provider: String,
}

impl Orchestrator {
    pub fn new(
        pool: SqlitePool,
        registry: ProviderRegistry,
        store: Arc<dyn VectorStore>,
        config: &AppConfig,
    ) -> Self {
        let embeddings = Arc::new(EmbeddingService::new(
            registry.clone(),
            store.clone(),
            config.embeddings.clone(),
        ));
        Self {
            pool,
            registry,
            store,
            embeddings,
            llm_provider: config.llm.provider.clone(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    pub fn matching(&self) -> MatchingService {
        MatchingService::new(
            self.registry.clone(),
            self.embeddings.clone(),
            self.llm_provider.clone(),
        )
    }

    /// Fire-and-forget dispatch: the caller gets the handle back immediately
    /// and does not wait for completion. Failures are recorded on the entity
    /// row and logged, never propagated out of the task.
    pub fn trigger_pipeline(&self, kind: EntityKind, id: String) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.run_pipeline(kind, &id).await {
                error!(id = %id, kind = kind.as_str(), error = %e, "pipeline run failed");
            }
        })
    }

    /// One full pipeline run. Calling this on a completed entity is a fresh
    /// run that overwrites the parsed data and vector, not a no-op.
    pub async fn run_pipeline(&self, kind: EntityKind, id: &str) -> Result<(), MatchError> {
        match kind {
            EntityKind::Resume => self.run_resume_pipeline(id).await,
            EntityKind::Job => self.run_job_pipeline(id).await,
        }
    }

    async fn run_resume_pipeline(&self, id: &str) -> Result<(), MatchError> {
        let resume = storage::fetch_resume(&self.pool, id)
            .await?
            .ok_or_else(|| MatchError::not_found("resume", id))?;
        let raw_text = resume
            .extracted_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                MatchError::Precondition(format!("resume '{id}' has no extracted text"))
            })?
            .to_string();

        storage::mark_resume_status(&self.pool, id, ProcessingStatus::Parsing.as_str()).await?;
        info!(id, "parsing resume");

        let parsed = match self.parse_stage(&raw_text).await {
            Ok(parsed) => parsed,
            Err(e) => {
                storage::mark_resume_failed(&self.pool, id, e.kind(), &e.to_string()).await?;
                return Err(e);
            }
        };
        let parsed_json = serde_json::to_string(&parsed)
            .map_err(|e| MatchError::ExternalService(e.to_string()))?;
        storage::mark_resume_parsed(&self.pool, id, &parsed_json, &Utc::now().to_rfc3339())
            .await?;
        info!(id, "resume parsed, embedding");

        match self
            .embeddings
            .embed_resume(&resume, &parsed, EmbedIntent::Store)
            .await
        {
            Ok(_) => {
                storage::mark_resume_completed(&self.pool, id).await?;
                info!(id, "resume pipeline completed");
                Ok(())
            }
            Err(e) => {
                // Parsed data survives; only this run's embedding failed.
                storage::mark_resume_failed(&self.pool, id, e.kind(), &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn parse_stage(&self, raw_text: &str) -> Result<crate::models::ParsedResume, MatchError> {
        let llm = self.registry.llm(Some(&self.llm_provider))?;
        let parsed = llm.parse_resume(raw_text).await?;
        // The schema's identifying field is mandatory; a record without it
        // fails the stage.
        if parsed
            .full_name
            .as_deref()
            .map_or(true, |n| n.trim().is_empty())
        {
            return Err(MatchError::ExternalService(
                "parsed resume is missing required field 'full_name'".into(),
            ));
        }
        Ok(parsed)
    }

    /// Jobs are created with structured fields, so their runs enter the state
    /// machine at the embedding stage.
    async fn run_job_pipeline(&self, id: &str) -> Result<(), MatchError> {
        let job = storage::fetch_job(&self.pool, id)
            .await?
            .ok_or_else(|| MatchError::not_found("job", id))?;

        storage::mark_job_status(&self.pool, id, ProcessingStatus::Embedding.as_str()).await?;
        info!(id, "embedding job");

        match self.embeddings.embed_job(&job, EmbedIntent::Store).await {
            Ok(_) => {
                storage::mark_job_embedded(&self.pool, id, &Utc::now().to_rfc3339()).await?;
                info!(id, "job pipeline completed");
                Ok(())
            }
            Err(e) => {
                storage::mark_job_failed(&self.pool, id, e.kind(), &e.to_string()).await?;
                Err(e)
            }
        }
    }

    pub async fn get_pipeline_status(
        &self,
        kind: EntityKind,
        id: &str,
    ) -> Result<PipelineStatus, MatchError> {
        let (status, error_kind, error_message, last_stage_at) = match kind {
            EntityKind::Resume => {
                let r = storage::fetch_resume(&self.pool, id)
                    .await?
                    .ok_or_else(|| MatchError::not_found("resume", id))?;
                (
                    r.processing_status,
                    r.last_error_kind,
                    r.last_error_message,
                    r.parsed_at,
                )
            }
            EntityKind::Job => {
                let j = storage::fetch_job(&self.pool, id)
                    .await?
                    .ok_or_else(|| MatchError::not_found("job", id))?;
                (
                    j.processing_status,
                    j.last_error_kind,
                    j.last_error_message,
                    j.embedded_at,
                )
            }
        };
        let last_error = match (error_kind, error_message) {
            (Some(kind), Some(message)) => Some(StageError { kind, message }),
            _ => None,
        };
        Ok(PipelineStatus {
            id: id.to_string(),
            kind,
            status: ProcessingStatus::parse(&status).unwrap_or(ProcessingStatus::Pending),
            last_error,
            last_stage_at,
        })
    }

    /// Manual embedding, bypassing the parse stage. For resumes this requires
    /// a prior successful parse.
    pub async fn embed_now(&self, kind: EntityKind, id: &str) -> Result<(), MatchError> {
        match kind {
            EntityKind::Resume => {
                let resume = storage::fetch_resume(&self.pool, id)
                    .await?
                    .ok_or_else(|| MatchError::not_found("resume", id))?;
                let parsed = parsed_from_row(&resume)?;
                storage::mark_resume_status(&self.pool, id, ProcessingStatus::Embedding.as_str())
                    .await?;
                match self
                    .embeddings
                    .embed_resume(&resume, &parsed, EmbedIntent::Store)
                    .await
                {
                    Ok(_) => {
                        storage::mark_resume_completed(&self.pool, id).await?;
                        Ok(())
                    }
                    Err(e) => {
                        storage::mark_resume_failed(&self.pool, id, e.kind(), &e.to_string())
                            .await?;
                        Err(e)
                    }
                }
            }
            EntityKind::Job => self.run_job_pipeline(id).await,
        }
    }

    pub async fn rank_matches(
        &self,
        kind: EntityKind,
        id: &str,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<MatchResult>, MatchError> {
        self.matching()
            .rank(&self.pool, kind, id, limit, min_score)
            .await
    }

    /// Idempotent vector removal; invoked when the owning entity goes away so
    /// the store never holds orphan vectors.
    pub async fn delete_vector(&self, id: &str) -> Result<(), MatchError> {
        self.store.delete(id).await
    }

    /// Delete the entity row and its vector together.
    pub async fn delete_entity(&self, kind: EntityKind, id: &str) -> Result<(), MatchError> {
        let deleted = match kind {
            EntityKind::Resume => storage::delete_resume(&self.pool, id).await?,
            EntityKind::Job => storage::delete_job(&self.pool, id).await?,
        };
        if deleted == 0 {
            return Err(MatchError::not_found(kind.as_str(), id));
        }
        self.delete_vector(id).await
    }
}

pub fn build_registry(config: &AppConfig) -> ProviderRegistry {
    let hash_dimension = if config.embeddings.dimension > 0 {
        config.embeddings.dimension
    } else {
        256
    };
    let mut reg = ProviderRegistry::new()
        .with_embedding("noop", Arc::new(NoopProvider))
        .with_llm("noop", Arc::new(NoopProvider))
        .with_embedding("hash", Arc::new(HashEmbeddingProvider::new(hash_dimension)));

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        let base_url = std::env::var("GEMINI_BASE_URL")
            .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string());
        let provider = GeminiProvider::new(GeminiConfig {
            api_key: key,
            base_url,
            model: config.llm.model.clone(),
            embedding_model: config.embeddings.model.clone(),
            timeout_secs: config.llm.timeout_secs,
        });
        reg = reg
            .with_embedding("gemini", Arc::new(provider.clone()))
            .with_llm("gemini", Arc::new(provider));
    }

    reg.set_preferred_embedding(&config.embeddings.provider)
        .set_preferred_llm(&config.llm.provider)
}

pub fn build_vector_store(config: &AppConfig) -> Arc<dyn VectorStore> {
    match config.vectors.provider.as_str() {
        "qdrant" => {
            if let Some(url) = &config.vectors.url {
                let client = QdrantClient::new(providers::qdrant::QdrantConfig {
                    url: url.clone(),
                    collection: config.vectors.collection.clone(),
                    api_key: std::env::var("QDRANT_API_KEY").ok(),
                });
                return Arc::new(QdrantStore::new(client));
            }
            Arc::new(InMemoryStore::new())
        }
        _ => Arc::new(InMemoryStore::new()),
    }
}
