pub mod trello;
pub mod youtrack;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::model::{Attachment, Board, Card, Checklist, Comment, List, Page};

/// Read side of the migration. Listing calls fetch one page at a time;
/// feeding the returned cursor back in resumes from that point.
#[async_trait]
pub trait Source: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError>;
    async fn get_board(&self, board_id: &str) -> Result<Board, ApiError>;
    async fn list_lists(&self, board_id: &str) -> Result<Vec<List>, ApiError>;
    async fn list_cards(
        &self,
        list_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Card>, ApiError>;
    async fn list_comments(
        &self,
        card_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Comment>, ApiError>;
    async fn list_attachments(&self, card_id: &str) -> Result<Vec<Attachment>, ApiError>;
    async fn list_checklists(&self, card_id: &str) -> Result<Vec<Checklist>, ApiError>;
    /// Download an uploaded attachment's payload. Link-only attachments
    /// yield `None`.
    async fn fetch_attachment_bytes(
        &self,
        attachment: &Attachment,
    ) -> Result<Option<Vec<u8>>, ApiError>;
}

/// An issue ready for creation, already transformed by the orchestrator
/// (identity mapped, labels passed through, stage resolved from the source
/// list name).
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub summary: String,
    pub description: String,
    /// Workflow stage derived from the source list name.
    pub stage: Option<String>,
    /// Destination login, already resolved by the identity mapper.
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub source_id: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    /// Final comment body, including the original author/date header.
    pub text: String,
    pub date: DateTime<Utc>,
    pub source_id: String,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub filename: String,
    pub mime_type: Option<String>,
    /// Original URL; kept as a reference when no payload was downloadable.
    pub url: Option<String>,
    pub bytes: Option<Vec<u8>>,
    pub source_id: String,
}

#[derive(Debug, Clone)]
pub struct NewChecklistItem {
    pub checklist_name: String,
    pub text: String,
    pub complete: bool,
    pub source_id: String,
}

/// Write side of the migration. Thin typed wrappers over the destination
/// API; no deduplication — idempotence is handled (and documented) at the
/// orchestrator level.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn create_project(&self, board: &Board) -> Result<String, ApiError>;
    async fn create_issue(&self, project_id: &str, issue: &NewIssue) -> Result<String, ApiError>;
    async fn create_comment(
        &self,
        issue_id: &str,
        comment: &NewComment,
    ) -> Result<String, ApiError>;
    async fn create_attachment(
        &self,
        issue_id: &str,
        attachment: &NewAttachment,
    ) -> Result<String, ApiError>;
    async fn create_checklist_item(
        &self,
        project_id: &str,
        issue_id: &str,
        item: &NewChecklistItem,
    ) -> Result<String, ApiError>;
}

#[cfg(test)]
pub mod tests;
