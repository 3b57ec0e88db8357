use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::{
    Destination, NewAttachment, NewChecklistItem, NewComment, NewIssue, Source,
};
use crate::error::ApiError;
use crate::model::card::ItemState;
use crate::model::{Attachment, Board, Card, Checklist, ChecklistItem, Comment, Label, List, Page};

pub fn ts(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, n, 0).unwrap()
}

pub fn make_board(id: &str, name: &str) -> Board {
    Board {
        id: id.to_string(),
        name: name.to_string(),
        desc: String::new(),
    }
}

pub fn make_list(id: &str, name: &str, pos: f64) -> List {
    List {
        id: id.to_string(),
        name: name.to_string(),
        pos,
        closed: false,
    }
}

pub fn make_card(id: &str, name: &str, pos: f64, members: &[&str]) -> Card {
    Card {
        id: id.to_string(),
        name: name.to_string(),
        desc: format!("Description of {name}"),
        pos,
        id_list: None,
        id_members: members.iter().map(|m| m.to_string()).collect(),
        labels: vec![],
        short_url: Some(format!("https://trello.com/c/{id}")),
        due: None,
        due_complete: false,
        closed: false,
    }
}

pub fn make_label(name: &str, color: &str) -> Label {
    Label {
        name: name.to_string(),
        color: Some(color.to_string()),
    }
}

pub fn make_comment(id: &str, text: &str, author: &str, date: DateTime<Utc>) -> Comment {
    Comment {
        id: id.to_string(),
        text: text.to_string(),
        author: author.to_string(),
        author_name: Some(format!("{author} (full name)")),
        date,
    }
}

pub fn make_attachment(id: &str, name: &str, is_upload: bool) -> Attachment {
    Attachment {
        id: id.to_string(),
        name: name.to_string(),
        url: Some(format!("https://files.example/{id}")),
        mime_type: Some("application/octet-stream".to_string()),
        is_upload,
    }
}

pub fn make_checklist(id: &str, name: &str, items: &[(&str, &str, bool)]) -> Checklist {
    Checklist {
        id: id.to_string(),
        name: name.to_string(),
        check_items: items
            .iter()
            .enumerate()
            .map(|(i, (item_id, text, complete))| ChecklistItem {
                id: item_id.to_string(),
                name: text.to_string(),
                state: if *complete {
                    ItemState::Complete
                } else {
                    ItemState::Incomplete
                },
                pos: (i + 1) as f64,
            })
            .collect(),
    }
}

/// In-memory source backed by fixture maps; paginates like the real API.
#[derive(Default)]
pub struct MockSource {
    pub boards: Vec<Board>,
    /// board id -> lists
    pub lists: HashMap<String, Vec<List>>,
    /// list id -> cards
    pub cards: HashMap<String, Vec<Card>>,
    /// card id -> comments, newest first, like the real actions endpoint
    pub comments: HashMap<String, Vec<Comment>>,
    pub attachments: HashMap<String, Vec<Attachment>>,
    pub checklists: HashMap<String, Vec<Checklist>>,
    /// attachment id -> payload for uploads
    pub payloads: HashMap<String, Vec<u8>>,
    /// card ids whose comment listing 404s
    pub missing_comments: HashSet<String>,
    pub page_size: usize,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            page_size: 50,
            ..Self::default()
        }
    }

    fn paginate<T: Clone>(
        items: &[T],
        cursor: Option<&str>,
        page_size: usize,
        id_of: impl Fn(&T) -> &str,
    ) -> Page<T> {
        let start = match cursor {
            Some(cursor) => items
                .iter()
                .position(|item| id_of(item) == cursor)
                .map(|pos| pos + 1)
                .unwrap_or(items.len()),
            None => 0,
        };
        let end = (start + page_size).min(items.len());
        let slice = items[start..end].to_vec();
        let next_cursor = if end < items.len() {
            slice.last().map(|item| id_of(item).to_string())
        } else {
            None
        };
        Page {
            items: slice,
            next_cursor,
        }
    }
}

#[async_trait]
impl Source for MockSource {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        Ok(self.boards.clone())
    }

    async fn get_board(&self, board_id: &str) -> Result<Board, ApiError> {
        self.boards
            .iter()
            .find(|b| b.id == board_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("board {board_id}")))
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<List>, ApiError> {
        Ok(self.lists.get(board_id).cloned().unwrap_or_default())
    }

    async fn list_cards(
        &self,
        list_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Card>, ApiError> {
        let cards = self.cards.get(list_id).cloned().unwrap_or_default();
        Ok(Self::paginate(&cards, cursor, self.page_size, |c| &c.id))
    }

    async fn list_comments(
        &self,
        card_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Comment>, ApiError> {
        if self.missing_comments.contains(card_id) {
            return Err(ApiError::NotFound(format!("card {card_id}")));
        }
        let comments = self.comments.get(card_id).cloned().unwrap_or_default();
        Ok(Self::paginate(&comments, cursor, self.page_size, |c| &c.id))
    }

    async fn list_attachments(&self, card_id: &str) -> Result<Vec<Attachment>, ApiError> {
        Ok(self.attachments.get(card_id).cloned().unwrap_or_default())
    }

    async fn list_checklists(&self, card_id: &str) -> Result<Vec<Checklist>, ApiError> {
        Ok(self.checklists.get(card_id).cloned().unwrap_or_default())
    }

    async fn fetch_attachment_bytes(
        &self,
        attachment: &Attachment,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        if !attachment.is_upload {
            return Ok(None);
        }
        Ok(self.payloads.get(&attachment.id).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct CreatedIssue {
    pub id: String,
    pub project_id: String,
    pub summary: String,
    pub description: String,
    pub stage: Option<String>,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub source_id: String,
}

#[derive(Debug, Default)]
pub struct DestState {
    next_id: u32,
    pub projects: Vec<(String, String)>,
    pub issues: Vec<CreatedIssue>,
    /// (issue id, text, source id)
    pub comments: Vec<(String, String, String)>,
    /// (issue id, filename, had payload)
    pub attachments: Vec<(String, String, bool)>,
    /// (issue id, rendered text, complete)
    pub checklist_items: Vec<(String, String, bool)>,
}

impl DestState {
    fn alloc(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    pub fn issues_in_project(&self, project_id: &str) -> Vec<&CreatedIssue> {
        self.issues
            .iter()
            .filter(|i| i.project_id == project_id)
            .collect()
    }

    pub fn comments_of(&self, issue_id: &str) -> Vec<&str> {
        self.comments
            .iter()
            .filter(|(id, _, _)| id == issue_id)
            .map(|(_, text, _)| text.as_str())
            .collect()
    }
}

/// Recording destination with per-entity failure injection keyed by the
/// entity's source id (board id for projects).
#[derive(Default)]
pub struct MockDestination {
    pub state: Mutex<DestState>,
    /// source id -> number of rate-limit responses to serve first
    pub rate_limits: Mutex<HashMap<String, u32>>,
    /// source ids that always fail with a transient error
    pub poisoned: Mutex<HashSet<String>>,
    /// source ids that fail with a validation error
    pub invalid: Mutex<HashSet<String>>,
    /// source ids that fail with an auth error
    pub unauthorized: Mutex<HashSet<String>>,
}

impl MockDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_limit(&self, source_id: &str, times: u32) {
        self.rate_limits
            .lock()
            .unwrap()
            .insert(source_id.to_string(), times);
    }

    pub fn poison(&self, source_id: &str) {
        self.poisoned.lock().unwrap().insert(source_id.to_string());
    }

    pub fn reject(&self, source_id: &str) {
        self.invalid.lock().unwrap().insert(source_id.to_string());
    }

    pub fn revoke_auth_for(&self, source_id: &str) {
        self.unauthorized
            .lock()
            .unwrap()
            .insert(source_id.to_string());
    }

    fn check(&self, source_id: &str) -> Result<(), ApiError> {
        if self.unauthorized.lock().unwrap().contains(source_id) {
            return Err(ApiError::Auth("token revoked".into()));
        }
        if self.poisoned.lock().unwrap().contains(source_id) {
            return Err(ApiError::Transient("connection reset".into()));
        }
        if self.invalid.lock().unwrap().contains(source_id) {
            return Err(ApiError::Validation("rejected by destination".into()));
        }
        let mut limits = self.rate_limits.lock().unwrap();
        if let Some(remaining) = limits.get_mut(source_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::RateLimited { retry_after: None });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Destination for MockDestination {
    async fn create_project(&self, board: &Board) -> Result<String, ApiError> {
        self.check(&board.id)?;
        let mut state = self.state.lock().unwrap();
        let id = state.alloc("proj");
        state.projects.push((id.clone(), board.name.clone()));
        Ok(id)
    }

    async fn create_issue(&self, project_id: &str, issue: &NewIssue) -> Result<String, ApiError> {
        self.check(&issue.source_id)?;
        let mut state = self.state.lock().unwrap();
        let id = state.alloc("ISSUE");
        state.issues.push(CreatedIssue {
            id: id.clone(),
            project_id: project_id.to_string(),
            summary: issue.summary.clone(),
            description: issue.description.clone(),
            stage: issue.stage.clone(),
            assignee: issue.assignee.clone(),
            labels: issue.labels.clone(),
            source_id: issue.source_id.clone(),
        });
        Ok(id)
    }

    async fn create_comment(
        &self,
        issue_id: &str,
        comment: &NewComment,
    ) -> Result<String, ApiError> {
        self.check(&comment.source_id)?;
        let mut state = self.state.lock().unwrap();
        let id = state.alloc("comment");
        state.comments.push((
            issue_id.to_string(),
            comment.text.clone(),
            comment.source_id.clone(),
        ));
        Ok(id)
    }

    async fn create_attachment(
        &self,
        issue_id: &str,
        attachment: &NewAttachment,
    ) -> Result<String, ApiError> {
        self.check(&attachment.source_id)?;
        let mut state = self.state.lock().unwrap();
        let id = state.alloc("file");
        state.attachments.push((
            issue_id.to_string(),
            attachment.filename.clone(),
            attachment.bytes.is_some(),
        ));
        Ok(id)
    }

    async fn create_checklist_item(
        &self,
        _project_id: &str,
        issue_id: &str,
        item: &NewChecklistItem,
    ) -> Result<String, ApiError> {
        self.check(&item.source_id)?;
        let mut state = self.state.lock().unwrap();
        let id = state.alloc("SUB");
        state.checklist_items.push((
            issue_id.to_string(),
            format!("{}: {}", item.checklist_name, item.text),
            item.complete,
        ));
        Ok(id)
    }
}

#[tokio::test]
async fn mock_source_paginates_cards() {
    let mut source = MockSource::new();
    source.page_size = 2;
    let cards: Vec<Card> = (1..=5)
        .map(|i| make_card(&format!("card-{i}"), &format!("Card {i}"), i as f64, &[]))
        .collect();
    source.cards.insert("list-1".into(), cards);

    let first = source.list_cards("list-1", None).await.unwrap();
    assert_eq!(first.items.len(), 2);
    let cursor = first.next_cursor.expect("more pages");
    assert_eq!(cursor, "card-2");

    let second = source.list_cards("list-1", Some(&cursor)).await.unwrap();
    assert_eq!(second.items[0].id, "card-3");

    let third = source
        .list_cards("list-1", second.next_cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(third.items.len(), 1);
    assert!(third.next_cursor.is_none());
}

#[tokio::test]
async fn mock_destination_serves_injected_rate_limits_then_succeeds() {
    let dest = MockDestination::new();
    dest.rate_limit("brd-1", 2);
    let board = make_board("brd-1", "Board");

    assert!(matches!(
        dest.create_project(&board).await,
        Err(ApiError::RateLimited { .. })
    ));
    assert!(matches!(
        dest.create_project(&board).await,
        Err(ApiError::RateLimited { .. })
    ));
    let id = dest.create_project(&board).await.unwrap();
    assert_eq!(dest.state.lock().unwrap().projects.len(), 1);
    assert!(id.starts_with("proj-"));
}
