use crate::{EmbedIntent, EmbeddingProvider, LlmProvider, ParsedResume, ProviderError};

#[derive(Debug, Default)]
pub struct NoopProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for NoopProvider {
    async fn embed(&self, _text: &str, _intent: EmbedIntent) -> Result<Vec<f32>, ProviderError> {
        Ok(vec![])
    }
}

#[async_trait::async_trait]
impl LlmProvider for NoopProvider {
    async fn parse_resume(&self, _raw_text: &str) -> Result<ParsedResume, ProviderError> {
        Err(ProviderError::NotImplemented)
    }

    async fn explain(
        &self,
        _source_text: &str,
        _matched_text: &str,
        _score: f32,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::NotImplemented)
    }
}
