pub mod board;
pub mod card;

pub use board::{Board, Label, List};
pub use card::{Attachment, Card, Checklist, ChecklistItem, Comment};

/// One page of a paginated listing. `next_cursor` is `None` on the last
/// page; feeding it back into the same call resumes from where this page
/// ended.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}
