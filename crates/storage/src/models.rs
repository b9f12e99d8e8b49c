use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ResumeRow {
    pub id: String,
    pub candidate_id: String,
    pub candidate_name: String,
    pub extracted_text: Option<String>,
    pub processing_status: String,
    pub last_error_kind: Option<String>,
    pub last_error_message: Option<String>,
    pub parsed_json: Option<String>,
    pub parsed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub is_active: bool,
    pub processing_status: String,
    pub last_error_kind: Option<String>,
    pub last_error_message: Option<String>,
    pub embedded_at: Option<String>,
    pub created_at: String,
}
