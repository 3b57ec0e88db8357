use std::future::Future;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::clients::{Destination, NewAttachment, NewChecklistItem, NewComment, NewIssue, Source};
use crate::correlate::{CorrelationTable, EntityKind};
use crate::error::ApiError;
use crate::mapping::IdentityMapper;
use crate::model::{Attachment, Card, Comment, List};
use crate::report::RunReport;
use crate::retry::RetryPolicy;

/// Everything a single run accumulates: the correlation table and the
/// report. Owned here and passed explicitly to every step; nothing is
/// process-global.
#[derive(Debug, Default)]
struct RunContext {
    correlation: CorrelationTable,
    report: RunReport,
}

#[derive(Debug)]
pub struct MigrationOutcome {
    pub report: RunReport,
    pub correlation: CorrelationTable,
}

/// Drives the top-down traversal: board → lists → cards → (comments,
/// attachments, checklist items), creating each entity in the destination
/// with retry and recording its new id before any of its children are
/// touched.
pub struct Migrator<'a> {
    source: &'a dyn Source,
    dest: &'a dyn Destination,
    users: &'a IdentityMapper,
    policy: RetryPolicy,
}

impl<'a> Migrator<'a> {
    pub fn new(source: &'a dyn Source, dest: &'a dyn Destination, users: &'a IdentityMapper) -> Self {
        Self {
            source,
            dest,
            users,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Migrate one board. `existing_project` reuses a destination project
    /// instead of creating one.
    ///
    /// Re-running against a non-empty destination creates duplicates: the
    /// destination is never queried for prior runs and nothing is
    /// deduplicated.
    pub async fn run(
        &self,
        board_id: &str,
        existing_project: Option<&str>,
    ) -> Result<MigrationOutcome> {
        let mut ctx = RunContext::default();

        let board = match self
            .policy
            .run("fetch board", || self.source.get_board(board_id))
            .await
        {
            Ok(board) => board,
            Err(ApiError::Auth(msg)) => bail!("authentication failed: {msg}"),
            Err(err) => bail!("failed to fetch board {board_id}: {err}"),
        };
        info!(board = %board.name, "starting migration");

        let project_id = match existing_project {
            Some(id) => {
                ctx.correlation
                    .record(EntityKind::Project, &board.id, id.to_string());
                ctx.report.record_skipped(EntityKind::Project);
                id.to_string()
            }
            None => {
                let created = self
                    .create_entity(&mut ctx, EntityKind::Project, &board.id, &board.name, || {
                        self.dest.create_project(&board)
                    })
                    .await?;
                match created {
                    Some(id) => id,
                    // Without a project nothing else can be created.
                    None => {
                        warn!(board = %board.name, "project creation failed, nothing to migrate into");
                        return Ok(self.finish(ctx));
                    }
                }
            }
        };

        let mut lists = match self
            .policy
            .run("list lists", || self.source.list_lists(&board.id))
            .await
        {
            Ok(lists) => lists,
            Err(ApiError::Auth(msg)) => bail!("authentication failed: {msg}"),
            Err(err) => bail!("failed to list columns of board {board_id}: {err}"),
        };
        lists.sort_by(|a, b| a.pos.total_cmp(&b.pos));

        for list in &lists {
            if list.closed {
                continue;
            }
            self.migrate_list(&mut ctx, &project_id, list).await?;
        }

        Ok(self.finish(ctx))
    }

    fn finish(&self, ctx: RunContext) -> MigrationOutcome {
        info!(
            created = ctx.report.total_created(),
            failed = ctx.report.failures().len(),
            "migration finished"
        );
        MigrationOutcome {
            report: ctx.report,
            correlation: ctx.correlation,
        }
    }

    async fn migrate_list(
        &self,
        ctx: &mut RunContext,
        project_id: &str,
        list: &List,
    ) -> Result<()> {
        let mut cards = match self.drain_cards(&list.id).await {
            Ok(cards) => cards,
            Err(ApiError::Auth(msg)) => bail!("authentication failed: {msg}"),
            Err(ApiError::NotFound(what)) => {
                warn!(list = %list.name, "column vanished while listing cards: {what}");
                return Ok(());
            }
            Err(err) => {
                warn!(list = %list.name, "failed to list cards: {err}");
                ctx.report.record_failure(
                    EntityKind::Issue,
                    &list.id,
                    &list.name,
                    format!("failed to list cards: {err}"),
                );
                return Ok(());
            }
        };
        cards.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        info!(list = %list.name, cards = cards.len(), "migrating column");

        for card in &cards {
            if card.closed {
                ctx.report.record_skipped(EntityKind::Issue);
                continue;
            }
            self.migrate_card(ctx, project_id, card, &list.name).await?;
        }
        Ok(())
    }

    async fn migrate_card(
        &self,
        ctx: &mut RunContext,
        project_id: &str,
        card: &Card,
        list_name: &str,
    ) -> Result<()> {
        let issue = self.build_issue(card, list_name);
        let created = self
            .create_entity(ctx, EntityKind::Issue, &card.id, &card.name, || {
                self.dest.create_issue(project_id, &issue)
            })
            .await?;
        if created.is_none() {
            warn!(card = %card.name, "issue not created, skipping its comments/attachments/checklists");
            return Ok(());
        }
        // Children re-link through the correlation table, which the create
        // above populated before returning.
        let Some(issue_id) = ctx
            .correlation
            .lookup(EntityKind::Issue, &card.id)
            .map(str::to_string)
        else {
            return Ok(());
        };

        self.migrate_comments(ctx, card, &issue_id).await?;
        self.migrate_attachments(ctx, card, &issue_id).await?;
        self.migrate_checklists(ctx, project_id, card, &issue_id)
            .await?;
        Ok(())
    }

    async fn migrate_comments(
        &self,
        ctx: &mut RunContext,
        card: &Card,
        issue_id: &str,
    ) -> Result<()> {
        let mut comments = match self.drain_comments(&card.id).await {
            Ok(comments) => comments,
            Err(err) => return self.skip_children(ctx, EntityKind::Comment, card, err),
        };
        // The source returns newest-first; recreate in original order.
        comments.sort_by_key(|c| c.date);

        for comment in &comments {
            let new_comment = self.render_comment(comment);
            self.create_entity(ctx, EntityKind::Comment, &comment.id, &card.name, || {
                self.dest.create_comment(issue_id, &new_comment)
            })
            .await?;
        }
        Ok(())
    }

    async fn migrate_attachments(
        &self,
        ctx: &mut RunContext,
        card: &Card,
        issue_id: &str,
    ) -> Result<()> {
        let attachments = match self
            .policy
            .run("list attachments", || self.source.list_attachments(&card.id))
            .await
        {
            Ok(attachments) => attachments,
            Err(err) => return self.skip_children(ctx, EntityKind::Attachment, card, err),
        };

        for attachment in &attachments {
            let bytes = match self
                .policy
                .run("fetch attachment", || {
                    self.source.fetch_attachment_bytes(attachment)
                })
                .await
            {
                Ok(bytes) => bytes,
                Err(ApiError::Auth(msg)) => bail!("authentication failed: {msg}"),
                Err(err) => {
                    ctx.report.record_failure(
                        EntityKind::Attachment,
                        &attachment.id,
                        &attachment.name,
                        format!("download failed: {err}"),
                    );
                    continue;
                }
            };
            let new_attachment = build_attachment(attachment, bytes);
            self.create_entity(
                ctx,
                EntityKind::Attachment,
                &attachment.id,
                &attachment.name,
                || self.dest.create_attachment(issue_id, &new_attachment),
            )
            .await?;
        }
        Ok(())
    }

    async fn migrate_checklists(
        &self,
        ctx: &mut RunContext,
        project_id: &str,
        card: &Card,
        issue_id: &str,
    ) -> Result<()> {
        let checklists = match self
            .policy
            .run("list checklists", || self.source.list_checklists(&card.id))
            .await
        {
            Ok(checklists) => checklists,
            Err(err) => return self.skip_children(ctx, EntityKind::ChecklistItem, card, err),
        };

        for checklist in &checklists {
            let mut items = checklist.check_items.clone();
            items.sort_by(|a, b| a.pos.total_cmp(&b.pos));
            for item in &items {
                let new_item = NewChecklistItem {
                    checklist_name: checklist.name.clone(),
                    text: item.name.clone(),
                    complete: item.is_complete(),
                    source_id: item.id.clone(),
                };
                self.create_entity(ctx, EntityKind::ChecklistItem, &item.id, &item.name, || {
                    self.dest.create_checklist_item(project_id, issue_id, &new_item)
                })
                .await?;
            }
        }
        Ok(())
    }

    /// Create one destination entity with retry. On success the new id is
    /// recorded in the correlation table before returning. A per-entity
    /// failure is recorded in the report and `None` returned; only an auth
    /// failure aborts the run.
    async fn create_entity<F, Fut>(
        &self,
        ctx: &mut RunContext,
        kind: EntityKind,
        source_id: &str,
        name: &str,
        op: F,
    ) -> Result<Option<String>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, ApiError>>,
    {
        match self.policy.run("create entity", op).await {
            Ok(dest_id) => {
                ctx.correlation.record(kind, source_id, dest_id.clone());
                ctx.report.record_created(kind);
                Ok(Some(dest_id))
            }
            Err(ApiError::Auth(msg)) => bail!("authentication failed: {msg}"),
            Err(err) => {
                warn!(%kind, source_id, name, "giving up on entity: {err}");
                ctx.report.record_failure(kind, source_id, name, err.to_string());
                Ok(None)
            }
        }
    }

    /// A child listing failed: skip that subtree, keep the rest of the card.
    fn skip_children(
        &self,
        ctx: &mut RunContext,
        kind: EntityKind,
        card: &Card,
        err: ApiError,
    ) -> Result<()> {
        match err {
            ApiError::Auth(msg) => bail!("authentication failed: {msg}"),
            ApiError::NotFound(what) => {
                warn!(card = %card.name, "{kind} listing returned not-found, skipping: {what}");
                Ok(())
            }
            err => {
                ctx.report.record_failure(
                    kind,
                    &card.id,
                    &card.name,
                    format!("failed to list {kind}s: {err}"),
                );
                Ok(())
            }
        }
    }

    async fn drain_cards(&self, list_id: &str) -> Result<Vec<Card>, ApiError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .policy
                .run("list cards", || {
                    self.source.list_cards(list_id, cursor.as_deref())
                })
                .await?;
            all.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    async fn drain_comments(&self, card_id: &str) -> Result<Vec<Comment>, ApiError> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .policy
                .run("list comments", || {
                    self.source.list_comments(card_id, cursor.as_deref())
                })
                .await?;
            all.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(all),
            }
        }
    }

    fn build_issue(&self, card: &Card, list_name: &str) -> NewIssue {
        let mut description = card.desc.clone();
        if !description.is_empty() {
            description.push_str("\n\n");
        }
        // Durable back-reference to the source card.
        match &card.short_url {
            Some(url) => description.push_str(&format!("**Original Trello Card:** {url}")),
            None => description.push_str(&format!("Migrated from Trello card {}", card.id)),
        }
        if let Some(due) = card.due {
            let status = if card.due_complete { " (completed)" } else { "" };
            description.push_str(&format!("\n**Due:** {}{status}", due.format("%Y-%m-%d")));
        }

        NewIssue {
            summary: card.name.clone(),
            description,
            stage: Some(list_name.to_string()),
            assignee: self.users.resolve_first(&card.id_members).map(str::to_string),
            labels: card
                .labels
                .iter()
                .filter_map(|l| l.display_name())
                .map(str::to_string)
                .collect(),
            source_id: card.id.clone(),
        }
    }

    fn render_comment(&self, comment: &Comment) -> NewComment {
        // Mapped login first, the source display name second. The
        // default-assignee policy is deliberately not applied here: a
        // comment author is attribution, not assignment.
        let author = self
            .users
            .resolve_exact(&comment.author)
            .map(str::to_string)
            .or_else(|| comment.author_name.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        NewComment {
            text: format!(
                "[{author} on {}]\n{}",
                format_date(comment.date),
                comment.text
            ),
            date: comment.date,
            source_id: comment.id.clone(),
        }
    }
}

fn build_attachment(attachment: &Attachment, bytes: Option<Vec<u8>>) -> NewAttachment {
    NewAttachment {
        filename: attachment.name.clone(),
        mime_type: attachment.mime_type.clone(),
        url: attachment.url.clone(),
        bytes,
        source_id: attachment.id.clone(),
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}
