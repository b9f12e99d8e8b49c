use crate::embeddings::EmbeddingService;
use crate::error::MatchError;
use crate::models::{EmbedIntent, EntityKind, MatchResult, ParsedResume};
use providers::ProviderRegistry;
use sqlx::SqlitePool;
use std::sync::Arc;
use storage::ResumeRow;
use tracing::{debug, warn};

/// Convert a cosine distance in [0, 2] to a similarity score in [0, 1]:
/// identical vectors score 1.0, orthogonal 0.5, opposite 0.0.
pub fn distance_to_score(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Ranks entities of one kind against the opposite kind: query embedding,
/// nearest-neighbor search, distance-to-score conversion, then a
/// natural-language explanation per result.
pub struct MatchingService {
    registry: ProviderRegistry,
    embeddings: Arc<EmbeddingService>,
    llm_provider: String,
}

impl MatchingService {
    pub fn new(
        registry: ProviderRegistry,
        embeddings: Arc<EmbeddingService>,
        llm_provider: String,
    ) -> Self {
        Self {
            registry,
            embeddings,
            llm_provider,
        }
    }

    /// Rank entities of the kind opposite to `kind` against the source
    /// entity. Results are ordered by descending score; exact ties keep the
    /// store's ascending-id order. Results scoring below `min_score` are
    /// dropped before explanations are requested.
    pub async fn rank(
        &self,
        pool: &SqlitePool,
        kind: EntityKind,
        id: &str,
        limit: usize,
        min_score: f32,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if limit == 0 {
            return Err(MatchError::Validation("limit must be positive".into()));
        }

        let source_text = self.source_text(pool, kind, id).await?;
        let query = self
            .embeddings
            .embed_text(&source_text, EmbedIntent::Query)
            .await?;

        let opposite = kind.opposite();
        let hits = self
            .embeddings
            .store()
            .search(&query, limit, Some(opposite))
            .await?;
        debug!(source = id, hits = hits.len(), "vector search complete");

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let score = distance_to_score(hit.distance);
            if score < min_score {
                continue;
            }
            let Some((label, matched_text)) = self.matched_text(pool, opposite, &hit.id).await?
            else {
                // Vector without a live entity row; stale entry, skip it.
                warn!(id = %hit.id, "vector hit has no backing entity");
                continue;
            };

            // Enrichment only: a failed explanation never cancels the ranking.
            let explanation = match self.registry.llm(Some(&self.llm_provider)) {
                Ok(llm) => match llm.explain(&source_text, &matched_text, score).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(id = %hit.id, error = %e, "explanation generation failed");
                        None
                    }
                },
                Err(e) => {
                    warn!(error = %e, "no explanation provider available");
                    None
                }
            };

            results.push(MatchResult {
                id: hit.id,
                kind: opposite,
                score,
                label,
                explanation,
            });
        }
        Ok(results)
    }

    /// Composed query text for the source entity; `Precondition` when the
    /// entity has nothing query-able yet (e.g. an unparsed resume).
    async fn source_text(
        &self,
        pool: &SqlitePool,
        kind: EntityKind,
        id: &str,
    ) -> Result<String, MatchError> {
        let text = match kind {
            EntityKind::Resume => {
                let resume = storage::fetch_resume(pool, id)
                    .await?
                    .ok_or_else(|| MatchError::not_found("resume", id))?;
                let parsed = parsed_from_row(&resume)?;
                EmbeddingService::compose_resume_text(&parsed)
            }
            EntityKind::Job => {
                let job = storage::fetch_job(pool, id)
                    .await?
                    .ok_or_else(|| MatchError::not_found("job", id))?;
                EmbeddingService::compose_job_text(&job)
            }
        };
        if text.is_empty() {
            return Err(MatchError::Precondition(format!(
                "{} '{}' has no query-able text",
                kind.as_str(),
                id
            )));
        }
        Ok(text)
    }

    async fn matched_text(
        &self,
        pool: &SqlitePool,
        kind: EntityKind,
        id: &str,
    ) -> Result<Option<(String, String)>, MatchError> {
        match kind {
            EntityKind::Resume => {
                let Some(resume) = storage::fetch_resume(pool, id).await? else {
                    return Ok(None);
                };
                let Ok(parsed) = parsed_from_row(&resume) else {
                    return Ok(None);
                };
                Ok(Some((
                    resume.candidate_name.clone(),
                    EmbeddingService::compose_resume_text(&parsed),
                )))
            }
            EntityKind::Job => {
                let Some(job) = storage::fetch_job(pool, id).await? else {
                    return Ok(None);
                };
                Ok(Some((
                    job.title.clone(),
                    EmbeddingService::compose_job_text(&job),
                )))
            }
        }
    }
}

pub(crate) fn parsed_from_row(resume: &ResumeRow) -> Result<ParsedResume, MatchError> {
    let json = resume.parsed_json.as_deref().ok_or_else(|| {
        MatchError::Precondition(format!("resume '{}' has not been parsed", resume.id))
    })?;
    serde_json::from_str(json)
        .map_err(|e| MatchError::ExternalService(format!("stored parsed data is invalid: {e}")))
}
