//! Storage layer: SQLite schemas and the narrow status-update contract the
//! pipeline drives.
//!
//! Every stage transition is a single UPDATE, so a transition is atomic from
//! the caller's point of view.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub mod models;

pub use models::{JobRow, ResumeRow};

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}", norm);
        }
    }
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect(&url).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations.
    // Safe to run multiple times (idempotent).
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_resume(
    pool: &SqlitePool,
    id: &str,
    candidate_id: &str,
    candidate_name: &str,
    extracted_text: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO resumes (id, candidate_id, candidate_name, extracted_text) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(id)
    .bind(candidate_id)
    .bind(candidate_name)
    .bind(extracted_text)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_job(
    pool: &SqlitePool,
    id: &str,
    title: &str,
    description: Option<&str>,
    requirements: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO jobs (id, title, description, requirements) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(requirements)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn fetch_resume(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<ResumeRow>> {
    sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_job(pool: &SqlitePool, id: &str) -> sqlx::Result<Option<JobRow>> {
    sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Plain stage transition; leaves parsed data and error fields untouched.
pub async fn mark_resume_status(pool: &SqlitePool, id: &str, status: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE resumes SET processing_status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Successful parse: stores the structured record whole, stamps parsed_at,
/// clears any previous error, and advances to the embedding stage.
pub async fn mark_resume_parsed(
    pool: &SqlitePool,
    id: &str,
    parsed_json: &str,
    parsed_at: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE resumes SET parsed_json = ?, parsed_at = ?, processing_status = 'embedding', \
         last_error_kind = NULL, last_error_message = NULL WHERE id = ?",
    )
    .bind(parsed_json)
    .bind(parsed_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_resume_completed(pool: &SqlitePool, id: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE resumes SET processing_status = 'completed', \
         last_error_kind = NULL, last_error_message = NULL WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal failure for this run; parsed data from an earlier successful
/// stage is deliberately preserved.
pub async fn mark_resume_failed(
    pool: &SqlitePool,
    id: &str,
    error_kind: &str,
    error_message: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE resumes SET processing_status = 'failed', last_error_kind = ?, \
         last_error_message = ? WHERE id = ?",
    )
    .bind(error_kind)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_job_status(pool: &SqlitePool, id: &str, status: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE jobs SET processing_status = ? WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_job_embedded(
    pool: &SqlitePool,
    id: &str,
    embedded_at: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE jobs SET processing_status = 'completed', embedded_at = ?, \
         last_error_kind = NULL, last_error_message = NULL WHERE id = ?",
    )
    .bind(embedded_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_job_failed(
    pool: &SqlitePool,
    id: &str,
    error_kind: &str,
    error_message: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE jobs SET processing_status = 'failed', last_error_kind = ?, \
         last_error_message = ? WHERE id = ?",
    )
    .bind(error_kind)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_resume(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM resumes WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_job(pool: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
