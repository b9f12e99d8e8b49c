use crate::config::EmbeddingConfig;
use crate::error::MatchError;
use crate::models::{EmbedIntent, EntityKind, ParsedResume};
use crate::vectorstore::{VectorRecord, VectorStore};
use providers::ProviderRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use storage::{JobRow, ResumeRow};
use tracing::debug;

/// Composes canonical text for an entity, calls the embedding provider, and
/// writes Store-intent vectors into the vector store. Never touches the
/// entity's processing status; that belongs to the pipeline.
pub struct EmbeddingService {
    registry: ProviderRegistry,
    store: Arc<dyn VectorStore>,
    cfg: EmbeddingConfig,
}

impl EmbeddingService {
    pub fn new(registry: ProviderRegistry, store: Arc<dyn VectorStore>, cfg: EmbeddingConfig) -> Self {
        Self {
            registry,
            store,
            cfg,
        }
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    /// Deterministic, order-stable text for a parsed resume. Missing fields
    /// are skipped; an entirely empty record composes to an empty string.
    pub fn compose_resume_text(parsed: &ParsedResume) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(summary) = parsed.summary.as_deref().filter(|s| !s.is_empty()) {
            parts.push(summary.to_string());
        }
        if !parsed.skills.is_empty() {
            parts.push(format!("Skills: {}", parsed.skills.join(", ")));
        }
        for exp in &parsed.experience {
            let mut line = format!("{} at {}", exp.title, exp.company);
            if let Some(desc) = exp.description.as_deref().filter(|s| !s.is_empty()) {
                line.push_str(": ");
                line.push_str(desc);
            }
            parts.push(line);
        }
        for edu in &parsed.education {
            let mut line = String::new();
            if let Some(degree) = edu.degree.as_deref().filter(|s| !s.is_empty()) {
                line.push_str(degree);
            }
            if let Some(field) = edu.field.as_deref().filter(|s| !s.is_empty()) {
                if !line.is_empty() {
                    line.push_str(" in ");
                }
                line.push_str(field);
            }
            if !line.is_empty() {
                line.push_str(" from ");
            }
            line.push_str(&edu.institution);
            parts.push(line);
        }
        if !parsed.languages.is_empty() {
            parts.push(format!("Languages: {}", parsed.languages.join(", ")));
        }
        if !parsed.certifications.is_empty() {
            parts.push(format!(
                "Certifications: {}",
                parsed.certifications.join(", ")
            ));
        }
        parts.join("\n")
    }

    /// Canonical job text: title, description, requirements; missing fields
    /// skipped.
    pub fn compose_job_text(job: &JobRow) -> String {
        let mut parts: Vec<String> = vec![job.title.clone()];
        if let Some(desc) = job.description.as_deref().filter(|s| !s.is_empty()) {
            parts.push(desc.to_string());
        }
        if let Some(req) = job.requirements.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Requirements: {}", req));
        }
        parts.join("\n")
    }

    /// Provider call plus response validation: wrong dimensionality or
    /// non-finite values fail as an external-service error.
    pub async fn embed_text(
        &self,
        text: &str,
        intent: EmbedIntent,
    ) -> Result<Vec<f32>, MatchError> {
        let provider = self.registry.embedding(Some(&self.cfg.provider))?;
        let vector = provider.embed(text, intent).await?;
        if self.cfg.dimension > 0 && vector.len() != self.cfg.dimension {
            return Err(MatchError::ExternalService(format!(
                "embedding has dimension {}, expected {}",
                vector.len(),
                self.cfg.dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::ExternalService(
                "embedding contains non-finite values".into(),
            ));
        }
        Ok(vector)
    }

    /// Embed a parsed resume. Store intent upserts the vector keyed by the
    /// resume id; Query intent only returns it.
    pub async fn embed_resume(
        &self,
        resume: &ResumeRow,
        parsed: &ParsedResume,
        intent: EmbedIntent,
    ) -> Result<Vec<f32>, MatchError> {
        let text = Self::compose_resume_text(parsed);
        if text.is_empty() {
            return Err(MatchError::Precondition(format!(
                "resume '{}' has no embeddable content",
                resume.id
            )));
        }
        let vector = self.embed_text(&text, intent).await?;
        if intent == EmbedIntent::Store {
            let mut metadata = HashMap::new();
            metadata.insert("candidate_id".to_string(), resume.candidate_id.clone());
            metadata.insert("label".to_string(), resume.candidate_name.clone());
            debug!(id = %resume.id, "storing resume vector");
            self.store
                .upsert(VectorRecord {
                    id: resume.id.clone(),
                    kind: EntityKind::Resume,
                    vector: vector.clone(),
                    metadata,
                })
                .await?;
        }
        Ok(vector)
    }

    pub async fn embed_job(
        &self,
        job: &JobRow,
        intent: EmbedIntent,
    ) -> Result<Vec<f32>, MatchError> {
        let text = Self::compose_job_text(job);
        if text.is_empty() {
            return Err(MatchError::Precondition(format!(
                "job '{}' has no embeddable content",
                job.id
            )));
        }
        let vector = self.embed_text(&text, intent).await?;
        if intent == EmbedIntent::Store {
            let mut metadata = HashMap::new();
            metadata.insert("label".to_string(), job.title.clone());
            metadata.insert("is_active".to_string(), job.is_active.to_string());
            debug!(id = %job.id, "storing job vector");
            self.store
                .upsert(VectorRecord {
                    id: job.id.clone(),
                    kind: EntityKind::Job,
                    vector: vector.clone(),
                    metadata,
                })
                .await?;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Education, WorkExperience};
    use crate::vectorstore::InMemoryStore;
    use providers::hash::HashEmbeddingProvider;

    fn parsed_fixture() -> ParsedResume {
        ParsedResume {
            full_name: Some("Ada Alvarez".into()),
            summary: Some("Spreadsheet wrangler".into()),
            skills: vec!["Excel".into(), "Data Entry".into()],
            experience: vec![WorkExperience {
                company: "Acme".into(),
                title: "Clerk".into(),
                description: Some("Entered data".into()),
                ..Default::default()
            }],
            education: vec![Education {
                institution: "State U".into(),
                degree: Some("BA".into()),
                field: Some("Economics".into()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn service(dimension: usize) -> (EmbeddingService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let registry = ProviderRegistry::new()
            .with_embedding("hash", Arc::new(HashEmbeddingProvider::new(256)))
            .set_preferred_embedding("hash");
        let cfg = EmbeddingConfig {
            provider: "hash".into(),
            model: "hash".into(),
            dimension,
        };
        (
            EmbeddingService::new(registry, store.clone(), cfg),
            store,
        )
    }

    fn resume_row() -> ResumeRow {
        ResumeRow {
            id: "r1".into(),
            candidate_id: "c1".into(),
            candidate_name: "Ada Alvarez".into(),
            extracted_text: Some("raw".into()),
            processing_status: "embedding".into(),
            last_error_kind: None,
            last_error_message: None,
            parsed_json: None,
            parsed_at: None,
            created_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn resume_composition_is_stable_and_skips_missing_fields() {
        let text = EmbeddingService::compose_resume_text(&parsed_fixture());
        assert_eq!(
            text,
            "Spreadsheet wrangler\nSkills: Excel, Data Entry\nClerk at Acme: Entered data\nBA in Economics from State U"
        );

        let sparse = ParsedResume {
            skills: vec!["Rust".into()],
            ..Default::default()
        };
        assert_eq!(
            EmbeddingService::compose_resume_text(&sparse),
            "Skills: Rust"
        );
        assert_eq!(
            EmbeddingService::compose_resume_text(&ParsedResume::default()),
            ""
        );
    }

    #[test]
    fn job_composition_skips_missing_fields() {
        let job = JobRow {
            id: "j1".into(),
            title: "Data Entry Specialist".into(),
            description: None,
            requirements: Some("Excel".into()),
            is_active: true,
            processing_status: "pending".into(),
            last_error_kind: None,
            last_error_message: None,
            embedded_at: None,
            created_at: "2024-01-01T00:00:00Z".into(),
        };
        assert_eq!(
            EmbeddingService::compose_job_text(&job),
            "Data Entry Specialist\nRequirements: Excel"
        );
    }

    #[tokio::test]
    async fn store_intent_upserts_query_intent_does_not() {
        let (service, store) = service(256);
        let resume = resume_row();
        let parsed = parsed_fixture();

        service
            .embed_resume(&resume, &parsed, EmbedIntent::Query)
            .await
            .unwrap();
        assert!(store.get("r1").await.is_err());

        service
            .embed_resume(&resume, &parsed, EmbedIntent::Store)
            .await
            .unwrap();
        let record = store.get("r1").await.unwrap();
        assert_eq!(record.kind, EntityKind::Resume);
        assert_eq!(record.metadata.get("label").unwrap(), "Ada Alvarez");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_external_service_error() {
        let (service, _store) = service(64);
        let err = service
            .embed_resume(&resume_row(), &parsed_fixture(), EmbedIntent::Store)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::ExternalService(_)));
    }

    #[tokio::test]
    async fn re_embedding_identical_text_is_bit_identical() {
        let (service, store) = service(256);
        let resume = resume_row();
        let parsed = parsed_fixture();

        service
            .embed_resume(&resume, &parsed, EmbedIntent::Store)
            .await
            .unwrap();
        let first = store.get("r1").await.unwrap().vector;
        service
            .embed_resume(&resume, &parsed, EmbedIntent::Store)
            .await
            .unwrap();
        let second = store.get("r1").await.unwrap().vector;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_resume_is_a_precondition_error() {
        let (service, _store) = service(256);
        let err = service
            .embed_resume(&resume_row(), &ParsedResume::default(), EmbedIntent::Store)
            .await
            .unwrap_err();
        assert!(matches!(err, MatchError::Precondition(_)));
    }
}
