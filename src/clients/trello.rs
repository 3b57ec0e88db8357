use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::Source;
use crate::error::ApiError;
use crate::model::{Attachment, Board, Card, Checklist, Comment, List, Page};

const BASE_URL: &str = "https://api.trello.com/1";

/// Page size for cursor-paginated listings (cards, comment actions).
const PAGE_LIMIT: usize = 100;

pub struct TrelloClient {
    api_key: String,
    token: String,
    client: reqwest::Client,
    base_url: String,
}

impl TrelloClient {
    pub fn new(api_key: String, token: String) -> Self {
        Self {
            api_key,
            token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: BASE_URL.to_string(),
        }
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&self.auth_params())
            .query(query)
            .send()
            .await
            .map_err(ApiError::from)?;
        decode(resp, path).await
    }

    /// One page of a cursor-paginated listing. Trello pages by id: passing
    /// the previous page's last id as `before` yields the next page.
    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cursor: Option<&str>,
        id_of: impl Fn(&T) -> &str,
    ) -> Result<Page<T>, ApiError> {
        let limit = PAGE_LIMIT.to_string();
        let mut params: Vec<(&str, &str)> = vec![("limit", &limit)];
        params.extend_from_slice(query);
        if let Some(before) = cursor {
            params.push(("before", before));
        }
        let items: Vec<T> = self.get_json(path, &params).await?;
        let next_cursor = if items.len() == PAGE_LIMIT {
            items.last().map(|item| id_of(item).to_string())
        } else {
            None
        };
        Ok(Page { items, next_cursor })
    }
}

/// Comment actions as the source API returns them; flattened into
/// `model::Comment` before leaving this module.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentAction {
    id: String,
    date: DateTime<Utc>,
    #[serde(default)]
    data: ActionData,
    member_creator: Option<ActionMember>,
}

#[derive(Deserialize, Default)]
struct ActionData {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionMember {
    #[serde(default)]
    username: String,
    full_name: Option<String>,
}

impl From<CommentAction> for Comment {
    fn from(action: CommentAction) -> Self {
        let (author, author_name) = match action.member_creator {
            Some(m) => (m.username, m.full_name),
            None => (String::new(), None),
        };
        Comment {
            id: action.id,
            text: action.data.text,
            author,
            author_name,
            date: action.date,
        }
    }
}

#[async_trait]
impl Source for TrelloClient {
    async fn list_boards(&self) -> Result<Vec<Board>, ApiError> {
        self.get_json(
            "/members/me/boards",
            &[("fields", "id,name,desc"), ("filter", "open")],
        )
        .await
    }

    async fn get_board(&self, board_id: &str) -> Result<Board, ApiError> {
        self.get_json(
            &format!("/boards/{board_id}"),
            &[("fields", "id,name,desc")],
        )
        .await
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<List>, ApiError> {
        self.get_json(
            &format!("/boards/{board_id}/lists"),
            &[("fields", "id,name,pos,closed"), ("filter", "open")],
        )
        .await
    }

    async fn list_cards(
        &self,
        list_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Card>, ApiError> {
        self.get_page(
            &format!("/lists/{list_id}/cards"),
            &[(
                "fields",
                "id,name,desc,pos,idList,idMembers,labels,shortUrl,due,dueComplete,closed",
            )],
            cursor,
            |card: &Card| &card.id,
        )
        .await
    }

    async fn list_comments(
        &self,
        card_id: &str,
        cursor: Option<&str>,
    ) -> Result<Page<Comment>, ApiError> {
        let page = self
            .get_page(
                &format!("/cards/{card_id}/actions"),
                &[("filter", "commentCard")],
                cursor,
                |action: &CommentAction| &action.id,
            )
            .await?;
        Ok(Page {
            items: page.items.into_iter().map(Comment::from).collect(),
            next_cursor: page.next_cursor,
        })
    }

    async fn list_attachments(&self, card_id: &str) -> Result<Vec<Attachment>, ApiError> {
        self.get_json(
            &format!("/cards/{card_id}/attachments"),
            &[("fields", "id,name,url,mimeType,isUpload")],
        )
        .await
    }

    async fn list_checklists(&self, card_id: &str) -> Result<Vec<Checklist>, ApiError> {
        self.get_json(
            &format!("/cards/{card_id}/checklists"),
            &[("checkItems", "all")],
        )
        .await
    }

    async fn fetch_attachment_bytes(
        &self,
        attachment: &Attachment,
    ) -> Result<Option<Vec<u8>>, ApiError> {
        // Link attachments point at arbitrary external URLs; only files
        // hosted by the source system are downloaded.
        let url = match (&attachment.url, attachment.is_upload) {
            (Some(url), true) => url,
            _ => return Ok(None),
        };
        // Downloads authenticate via an OAuth header rather than query
        // params.
        let auth = format!(
            "OAuth oauth_consumer_key=\"{}\", oauth_token=\"{}\"",
            self.api_key, self.token
        );
        let resp = self
            .client
            .get(url)
            .header("Authorization", auth)
            .send()
            .await
            .map_err(ApiError::from)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status, url, retry_after(&resp)));
        }
        let bytes = resp.bytes().await.map_err(ApiError::from)?;
        Ok(Some(bytes.to_vec()))
    }
}

pub(super) fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub(super) async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    context: &str,
) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let retry_after = retry_after(&resp);
        return Err(ApiError::from_status(status, context, retry_after));
    }
    resp.json::<T>().await.map_err(ApiError::from)
}
