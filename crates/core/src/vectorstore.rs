use crate::error::MatchError;
use crate::models::EntityKind;
use providers::qdrant::{QdrantClient, QdrantPoint};
use std::collections::HashMap;
use std::sync::RwLock;

/// One stored vector. A record is superseded whole on re-upsert of the same
/// id; the store never holds more than one live vector per entity.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub kind: EntityKind,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub distance: f32,
    pub metadata: HashMap<String, String>,
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace; succeeds whether or not `id` already exists.
    async fn upsert(&self, record: VectorRecord) -> Result<(), MatchError>;

    /// Up to `limit` nearest entries by cosine distance, nearest first, ties
    /// broken by ascending id. An empty store or filtered subset yields an
    /// empty vec, never an error.
    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        kind: Option<EntityKind>,
    ) -> Result<Vec<SearchHit>, MatchError>;

    async fn get(&self, id: &str) -> Result<VectorRecord, MatchError>;

    /// Idempotent; deleting an unknown id is a no-op.
    async fn delete(&self, id: &str) -> Result<(), MatchError>;
}

/// Cosine distance in [0, 2]. A zero vector has no direction; treat it as
/// orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

/// In-memory backend: full-scan cosine distance over a locked map. Intended
/// for tests and keyless local runs.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryStore {
    async fn upsert(&self, record: VectorRecord) -> Result<(), MatchError> {
        let mut records = self.records.write().expect("vector store lock poisoned");
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        kind: Option<EntityKind>,
    ) -> Result<Vec<SearchHit>, MatchError> {
        let records = self.records.read().expect("vector store lock poisoned");
        let mut hits: Vec<SearchHit> = records
            .values()
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .map(|r| SearchHit {
                id: r.id.clone(),
                distance: cosine_distance(query, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<VectorRecord, MatchError> {
        let records = self.records.read().expect("vector store lock poisoned");
        records
            .get(id)
            .cloned()
            .ok_or_else(|| MatchError::not_found("vector", id))
    }

    async fn delete(&self, id: &str) -> Result<(), MatchError> {
        let mut records = self.records.write().expect("vector store lock poisoned");
        records.remove(id);
        Ok(())
    }
}

/// Persistent backend over the qdrant REST API. Qdrant reports cosine
/// *similarity*; hits are converted back to distance so both backends speak
/// the same unit, and re-sorted locally to keep the ascending-id tie-break.
pub struct QdrantStore {
    client: QdrantClient,
}

impl QdrantStore {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, record: VectorRecord) -> Result<(), MatchError> {
        let mut payload: HashMap<String, serde_json::Value> = record
            .metadata
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        payload.insert(
            "kind".to_string(),
            serde_json::Value::String(record.kind.as_str().to_string()),
        );
        let point = QdrantPoint {
            id: record.id,
            vector: record.vector,
            payload,
        };
        self.client.upsert(vec![point]).await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        kind: Option<EntityKind>,
    ) -> Result<Vec<SearchHit>, MatchError> {
        let filter = kind.map(|k| {
            serde_json::json!({
                "must": [{ "key": "kind", "match": { "value": k.as_str() } }]
            })
        });
        let resp = self
            .client
            .search(query.to_vec(), limit as u64, filter)
            .await?;
        let mut hits: Vec<SearchHit> = resp
            .result
            .into_iter()
            .map(|r| SearchHit {
                id: id_to_string(&r.id),
                distance: (1.0 - r.score).clamp(0.0, 2.0),
                metadata: payload_to_metadata(r.payload),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn get(&self, id: &str) -> Result<VectorRecord, MatchError> {
        let resp = self.client.retrieve(vec![id.to_string()]).await?;
        let point = resp
            .result
            .into_iter()
            .next()
            .ok_or_else(|| MatchError::not_found("vector", id))?;
        let metadata = payload_to_metadata(point.payload);
        let kind = metadata
            .get("kind")
            .and_then(|k| EntityKind::parse(k))
            .ok_or_else(|| MatchError::ExternalService("vector payload missing kind".into()))?;
        Ok(VectorRecord {
            id: id_to_string(&point.id),
            kind,
            vector: point.vector.unwrap_or_default(),
            metadata,
        })
    }

    async fn delete(&self, id: &str) -> Result<(), MatchError> {
        self.client.delete_points(vec![id.to_string()]).await?;
        Ok(())
    }
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn payload_to_metadata(payload: Option<serde_json::Value>) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    if let Some(serde_json::Value::Object(map)) = payload {
        for (k, v) in map {
            match v {
                serde_json::Value::String(s) => {
                    metadata.insert(k, s);
                }
                other => {
                    metadata.insert(k, other.to_string());
                }
            }
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, kind: EntityKind, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            kind,
            vector,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn cosine_distance_bounds() {
        let a = [1.0, 0.0];
        assert!((cosine_distance(&a, &[1.0, 0.0]) - 0.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&a, &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_is_orthogonal() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn search_orders_nearest_first_with_id_tie_break() {
        let store = InMemoryStore::new();
        store
            .upsert(record("b", EntityKind::Resume, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(record("a", EntityKind::Resume, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(record("c", EntityKind::Resume, vec![0.0, 1.0]))
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn search_filters_by_kind_and_respects_limit() {
        let store = InMemoryStore::new();
        store
            .upsert(record("r1", EntityKind::Resume, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(record("j1", EntityKind::Job, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(record("j2", EntityKind::Job, vec![0.9, 0.1]))
            .await
            .unwrap();

        let hits = store
            .search(&[1.0, 0.0], 1, Some(EntityKind::Job))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "j1");
    }

    #[tokio::test]
    async fn empty_store_returns_empty_not_error() {
        let store = InMemoryStore::new();
        let hits = store.search(&[1.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());

        let hits = store
            .search(&[1.0, 0.0], 5, Some(EntityKind::Job))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn upsert_supersedes_and_delete_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .upsert(record("x", EntityKind::Resume, vec![1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(record("x", EntityKind::Resume, vec![0.0, 1.0]))
            .await
            .unwrap();
        let got = store.get("x").await.unwrap();
        assert_eq!(got.vector, vec![0.0, 1.0]);

        store.delete("x").await.unwrap();
        store.delete("x").await.unwrap();
        assert!(matches!(
            store.get("x").await,
            Err(MatchError::NotFound { .. })
        ));
    }
}
