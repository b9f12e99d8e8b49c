use crate::{EmbedIntent, EmbeddingProvider, LlmProvider, ParsedResume, ProviderError};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

const PARSE_PROMPT: &str = "You are a resume parser. Extract structured information from the \
following resume text.\nBe thorough: extract all skills, work experience, and education \
entries.\nIf a field is not found, leave it as null or an empty list.\nReturn a single JSON \
object with the keys: full_name, email, phone, summary, skills, experience (company, title, \
start_date, end_date, description), education (institution, degree, field, year), languages, \
certifications.\n\nResume text:\n";

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    cfg: Arc<GeminiConfig>,
}

impl GeminiProvider {
    pub fn new(cfg: GeminiConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(secs) = cfg.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build().unwrap_or_else(|_| Client::new());
        Self {
            client,
            cfg: Arc::new(cfg),
        }
    }

    async fn generate(&self, prompt: &str, json_mode: bool) -> Result<String, ProviderError> {
        let mut generation_config = serde_json::json!({ "temperature": 0.2 });
        if json_mode {
            generation_config["responseMimeType"] = serde_json::json!("application/json");
        }
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.cfg.base_url, self.cfg.model
        );
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "status {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct GenerateResponse {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: Content,
        }
        #[derive(Deserialize)]
        struct Content {
            #[serde(default)]
            parts: Vec<Part>,
        }
        #[derive(Deserialize)]
        struct Part {
            #[serde(default)]
            text: String,
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::InvalidPayload("empty model output".into()));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, text: &str, intent: EmbedIntent) -> Result<Vec<f32>, ProviderError> {
        let body = serde_json::json!({
            "content": { "parts": [{ "text": text }] },
            "taskType": intent.task_type(),
        });
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.cfg.base_url, self.cfg.embedding_model
        );
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ProviderError::RequestFailed(format!(
                "status {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct EmbedResponse {
            embedding: Embedding,
        }
        #[derive(Deserialize)]
        struct Embedding {
            values: Vec<f32>,
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        Ok(parsed.embedding.values)
    }
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn parse_resume(&self, raw_text: &str) -> Result<ParsedResume, ProviderError> {
        let prompt = format!("{PARSE_PROMPT}{raw_text}");
        let text = self.generate(&prompt, true).await?;
        serde_json::from_str(&text).map_err(|e| ProviderError::InvalidPayload(e.to_string()))
    }

    async fn explain(
        &self,
        source_text: &str,
        matched_text: &str,
        score: f32,
    ) -> Result<String, ProviderError> {
        let prompt = format!(
            "You are an HR matching assistant. In one or two sentences, explain why the \
             match below is a good or poor fit for the reference (similarity score {score:.2}).\
             \n\nReference:\n{source_text}\n\nMatch:\n{matched_text}"
        );
        let text = self.generate(&prompt, false).await?;
        Ok(text.trim().to_string())
    }
}
