use matcher_core::config::{
    AppConfig, DatabaseConfig, EmbeddingConfig, LlmConfig, MatchingConfig, VectorConfig,
};
use matcher_core::error::MatchError;
use matcher_core::models::{EntityKind, ParsedResume, ProcessingStatus};
use matcher_core::pipeline::Orchestrator;
use matcher_core::vectorstore::{InMemoryStore, VectorStore};
use providers::hash::HashEmbeddingProvider;
use providers::{LlmProvider, ProviderError, ProviderRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parser double: fails while `fail` is set, otherwise returns a structured
/// record built from the raw text (first line is the name, the rest are
/// comma-separated skills).
struct ScriptedParser {
    fail: AtomicBool,
}

impl ScriptedParser {
    fn new(fail: bool) -> Self {
        Self {
            fail: AtomicBool::new(fail),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedParser {
    async fn parse_resume(&self, raw_text: &str) -> Result<ParsedResume, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::InvalidPayload("malformed model output".into()));
        }
        let mut lines = raw_text.lines();
        let full_name = lines.next().unwrap_or_default().trim().to_string();
        let skills: Vec<String> = lines
            .next()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(ParsedResume {
            full_name: Some(full_name),
            skills,
            ..Default::default()
        })
    }

    async fn explain(
        &self,
        _source_text: &str,
        matched_text: &str,
        score: f32,
    ) -> Result<String, ProviderError> {
        Ok(format!("Overlap with '{matched_text}' scores {score:.2}"))
    }
}

fn test_config(db_url: &str) -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            path: db_url.to_string(),
        },
        embeddings: EmbeddingConfig {
            provider: "hash".into(),
            model: "hash".into(),
            dimension: 256,
        },
        llm: LlmConfig {
            provider: "scripted".into(),
            model: "scripted".into(),
            timeout_secs: None,
        },
        vectors: VectorConfig {
            provider: "memory".into(),
            url: None,
            collection: "entities".into(),
        },
        matching: MatchingConfig::default(),
    }
}

async fn build(db_url: &str, parser: Arc<ScriptedParser>) -> Orchestrator {
    let cfg = test_config(db_url);
    let pool = storage::connect(&cfg.database.path).await.unwrap();
    storage::migrate(&pool).await.unwrap();
    let registry = ProviderRegistry::new()
        .with_embedding("hash", Arc::new(HashEmbeddingProvider::new(256)))
        .with_llm("scripted", parser)
        .set_preferred_embedding("hash")
        .set_preferred_llm("scripted");
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryStore::new());
    Orchestrator::new(pool, registry, store, &cfg)
}

#[tokio::test]
async fn full_pipeline_and_matching_flow() {
    // Shared in-memory DB so every connection sees the same data.
    let db_url = "sqlite://file:hr_pipeline_flow?mode=memory&cache=shared";
    let parser = Arc::new(ScriptedParser::new(true));
    let orch = build(db_url, parser.clone()).await;

    // 1. A failing parse is terminal and leaves no parsed data behind.
    storage::insert_resume(
        orch.pool(),
        "resume-a",
        "cand-1",
        "Ada Alvarez",
        Some("Ada Alvarez\nExcel, Data Entry"),
    )
    .await
    .unwrap();
    let err = orch
        .run_pipeline(EntityKind::Resume, "resume-a")
        .await
        .unwrap_err();
    assert!(matches!(err, MatchError::ExternalService(_)));
    let status = orch
        .get_pipeline_status(EntityKind::Resume, "resume-a")
        .await
        .unwrap();
    assert_eq!(status.status, ProcessingStatus::Failed);
    assert_eq!(status.last_error.as_ref().unwrap().kind, "external_service");
    let row = storage::fetch_resume(orch.pool(), "resume-a")
        .await
        .unwrap()
        .unwrap();
    assert!(row.parsed_json.is_none());
    // Matching against an unparsed resume is refused.
    assert!(matches!(
        orch.rank_matches(EntityKind::Resume, "resume-a", 5, 0.0)
            .await
            .unwrap_err(),
        MatchError::Precondition(_)
    ));

    // 2. Re-triggering the same entity overwrites the failed run.
    parser.fail.store(false, Ordering::SeqCst);
    orch.run_pipeline(EntityKind::Resume, "resume-a")
        .await
        .unwrap();
    let status = orch
        .get_pipeline_status(EntityKind::Resume, "resume-a")
        .await
        .unwrap();
    assert_eq!(status.status, ProcessingStatus::Completed);
    assert!(status.last_error.is_none());
    assert!(status.last_stage_at.is_some());

    // 3. Jobs embed directly; both pipelines dispatch without blocking.
    storage::insert_job(
        orch.pool(),
        "job-b",
        "Data Entry Specialist",
        None,
        Some("Excel"),
    )
    .await
    .unwrap();
    storage::insert_job(orch.pool(), "job-c", "House Cleaner", None, Some("cleaning"))
        .await
        .unwrap();
    let h1 = orch.trigger_pipeline(EntityKind::Job, "job-b".into());
    let h2 = orch.trigger_pipeline(EntityKind::Job, "job-c".into());
    h1.await.unwrap();
    h2.await.unwrap();

    // 4. The aligned job ranks the resume highly, with an explanation.
    let matches = orch
        .rank_matches(EntityKind::Job, "job-b", 5, 0.0)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "resume-a");
    assert_eq!(matches[0].label, "Ada Alvarez");
    assert!(matches[0].score > 0.8, "score was {}", matches[0].score);
    assert!(matches[0].explanation.is_some());

    // 5. From the resume side: both jobs, sorted by descending score.
    let matches = orch
        .rank_matches(EntityKind::Resume, "resume-a", 5, 0.0)
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "job-b");
    assert!(matches[0].score > matches[1].score);

    // 6. Deleting an entity removes its vector from future searches.
    orch.delete_entity(EntityKind::Job, "job-c").await.unwrap();
    let matches = orch
        .rank_matches(EntityKind::Resume, "resume-a", 5, 0.0)
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "job-b");
}

#[tokio::test]
async fn concurrent_pipelines_stay_independent() {
    let db_url = "sqlite://file:hr_pipeline_concurrent?mode=memory&cache=shared";
    let parser = Arc::new(ScriptedParser::new(false));
    let orch = build(db_url, parser).await;

    storage::insert_resume(
        orch.pool(),
        "resume-1",
        "cand-1",
        "Ada Alvarez",
        Some("Ada Alvarez\nExcel"),
    )
    .await
    .unwrap();
    storage::insert_resume(
        orch.pool(),
        "resume-2",
        "cand-2",
        "Bo Lindgren",
        Some("Bo Lindgren\nRust, SQL"),
    )
    .await
    .unwrap();

    let h1 = orch.trigger_pipeline(EntityKind::Resume, "resume-1".into());
    let h2 = orch.trigger_pipeline(EntityKind::Resume, "resume-2".into());
    h1.await.unwrap();
    h2.await.unwrap();

    for id in ["resume-1", "resume-2"] {
        let status = orch
            .get_pipeline_status(EntityKind::Resume, id)
            .await
            .unwrap();
        assert_eq!(status.status, ProcessingStatus::Completed);
        assert!(orch.embeddings().store().get(id).await.is_ok());
    }
}
