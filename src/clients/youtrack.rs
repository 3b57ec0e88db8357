use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::trello::decode;
use super::{Destination, NewAttachment, NewChecklistItem, NewComment, NewIssue};
use crate::error::ApiError;
use crate::model::Board;

pub struct YouTrackClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct CreatedEntity {
    id: String,
    #[serde(rename = "idReadable")]
    id_readable: Option<String>,
}

impl CreatedEntity {
    /// Issues are addressed by their readable id everywhere else in the
    /// API; fall back to the internal id for entities that have no
    /// readable form.
    fn into_id(self) -> String {
        self.id_readable.unwrap_or(self.id)
    }
}

impl YouTrackClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/api{path}", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
        fields: &str,
    ) -> Result<T, ApiError> {
        let resp = self
            .request(reqwest::Method::POST, path)
            .query(&[("fields", fields), ("muteUpdateNotifications", "true")])
            .json(body)
            .send()
            .await
            .map_err(ApiError::from)?;
        decode(resp, path).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, fields: &str) -> Result<T, ApiError> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .query(&[("fields", fields)])
            .send()
            .await
            .map_err(ApiError::from)?;
        decode(resp, path).await
    }

    /// Project creation requires a leader; the token's own user fills that
    /// role.
    async fn me(&self) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct Me {
            id: String,
        }
        let me: Me = self.get_json("/users/me", "id").await?;
        Ok(me.id)
    }

    fn issue_payload(&self, project_id: &str, issue: &NewIssue) -> Value {
        let mut custom_fields = Vec::new();
        if let Some(stage) = &issue.stage {
            custom_fields.push(json!({
                "name": "State",
                "$type": "StateIssueCustomField",
                "value": {"name": stage, "$type": "StateBundleElement"}
            }));
        }
        if let Some(login) = &issue.assignee {
            custom_fields.push(json!({
                "name": "Assignee",
                "$type": "SingleUserIssueCustomField",
                "value": {"login": login}
            }));
        }
        if !issue.labels.is_empty() {
            custom_fields.push(json!({
                "name": "Label",
                "$type": "MultiEnumIssueCustomField",
                "value": issue.labels.iter().map(|l| json!({"name": l})).collect::<Vec<_>>()
            }));
        }

        let mut payload = json!({
            "summary": issue.summary,
            "description": issue.description,
            "project": {"id": project_id}
        });
        if !custom_fields.is_empty() {
            payload["customFields"] = Value::Array(custom_fields);
        }
        payload
    }
}

/// Derive a destination project key from the board name: initials of the
/// first words, alphanumeric only.
pub fn project_short_name(board_name: &str) -> String {
    let initials: String = board_name
        .split_whitespace()
        .filter_map(|word| word.chars().find(char::is_ascii_alphanumeric))
        .map(|c| c.to_ascii_uppercase())
        .take(8)
        .collect();
    if initials.is_empty() {
        "MIG".to_string()
    } else {
        initials
    }
}

#[async_trait]
impl Destination for YouTrackClient {
    async fn create_project(&self, board: &Board) -> Result<String, ApiError> {
        let leader = self.me().await?;
        let mut description = board.desc.clone();
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        // Durable back-reference to the source board.
        description.push_str(&format!("Migrated from Trello board {}", board.id));

        let body = json!({
            "name": board.name,
            "shortName": project_short_name(&board.name),
            "description": description,
            "leader": {"id": leader}
        });
        let created: CreatedEntity = self.post_json("/admin/projects", &body, "id").await?;
        Ok(created.into_id())
    }

    async fn create_issue(&self, project_id: &str, issue: &NewIssue) -> Result<String, ApiError> {
        let body = self.issue_payload(project_id, issue);
        let created: CreatedEntity = self.post_json("/issues", &body, "id,idReadable").await?;
        let id = created.into_id();
        debug!(source_id = %issue.source_id, issue = %id, "created issue");
        Ok(id)
    }

    async fn create_comment(
        &self,
        issue_id: &str,
        comment: &NewComment,
    ) -> Result<String, ApiError> {
        let body = json!({"text": comment.text});
        let created: CreatedEntity = self
            .post_json(&format!("/issues/{issue_id}/comments"), &body, "id")
            .await?;
        Ok(created.into_id())
    }

    async fn create_attachment(
        &self,
        issue_id: &str,
        attachment: &NewAttachment,
    ) -> Result<String, ApiError> {
        match &attachment.bytes {
            Some(bytes) => {
                let mut part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(attachment.filename.clone());
                if let Some(mime) = &attachment.mime_type {
                    part = part
                        .mime_str(mime)
                        .map_err(|e| ApiError::Validation(format!("bad mime type: {e}")))?;
                }
                let form = reqwest::multipart::Form::new().part("file", part);
                let path = format!("/issues/{issue_id}/attachments");
                let resp = self
                    .request(reqwest::Method::POST, &path)
                    .query(&[("fields", "id"), ("muteUpdateNotifications", "true")])
                    .multipart(form)
                    .send()
                    .await
                    .map_err(ApiError::from)?;
                let created: Vec<CreatedEntity> = decode(resp, &path).await?;
                created
                    .into_iter()
                    .next()
                    .map(CreatedEntity::into_id)
                    .ok_or_else(|| {
                        ApiError::Validation("attachment upload returned no entity".into())
                    })
            }
            None => {
                // External link attachment: preserved as a reference
                // comment, since there is no payload to upload.
                let url = attachment.url.as_deref().unwrap_or("(no url)");
                let body = json!({
                    "text": format!("Attachment: [{}]({url})", attachment.filename)
                });
                let created: CreatedEntity = self
                    .post_json(&format!("/issues/{issue_id}/comments"), &body, "id")
                    .await?;
                Ok(created.into_id())
            }
        }
    }

    async fn create_checklist_item(
        &self,
        project_id: &str,
        issue_id: &str,
        item: &NewChecklistItem,
    ) -> Result<String, ApiError> {
        // Rendered as a sub-issue of the card's issue.
        let marker = if item.complete { "✓" } else { "☐" };
        let body = json!({
            "summary": format!("{marker} {}: {}", item.checklist_name, item.text),
            "description": format!("Checklist item migrated from Trello ({})", item.source_id),
            "project": {"id": project_id}
        });
        let created: CreatedEntity = self.post_json("/issues", &body, "id,idReadable").await?;
        let sub_id = created.into_id();

        // Link it under the parent. A command is a creation-time
        // association, not an update to the parent's content.
        let command = json!({
            "query": format!("subtask of {issue_id}"),
            "issues": [{"idReadable": sub_id.as_str()}]
        });
        self.post_json::<Value>("/commands", &command, "issues(idReadable)")
            .await?;
        Ok(sub_id)
    }
}
