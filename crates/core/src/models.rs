use serde::{Deserialize, Serialize};

pub use providers::{EmbedIntent, Education, ParsedResume, WorkExperience};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Resume,
    Job,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Resume => "resume",
            EntityKind::Job => "job",
        }
    }

    pub fn opposite(&self) -> EntityKind {
        match self {
            EntityKind::Resume => EntityKind::Job,
            EntityKind::Job => EntityKind::Resume,
        }
    }

    pub fn parse(s: &str) -> Option<EntityKind> {
        match s {
            "resume" => Some(EntityKind::Resume),
            "job" => Some(EntityKind::Job),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Parsing,
    Embedding,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Parsing => "parsing",
            ProcessingStatus::Embedding => "embedding",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<ProcessingStatus> {
        match s {
            "pending" => Some(ProcessingStatus::Pending),
            "parsing" => Some(ProcessingStatus::Parsing),
            "embedding" => Some(ProcessingStatus::Embedding),
            "completed" => Some(ProcessingStatus::Completed),
            "failed" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

/// Error recorded on an entity row after a failed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageError {
    pub kind: String,
    pub message: String,
}

/// Snapshot of an entity's pipeline state, as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub id: String,
    pub kind: EntityKind,
    pub status: ProcessingStatus,
    pub last_error: Option<StageError>,
    /// Timestamp of the last successful stage (parse for resumes, embed for
    /// jobs), RFC3339.
    pub last_stage_at: Option<String>,
}

/// One ranked match. Transient: computed per query, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub id: String,
    pub kind: EntityKind,
    pub score: f32,
    pub label: String,
    pub explanation: Option<String>,
}
