use serde::Deserialize;

/// Top-level container of lists and cards in the source system.
#[derive(Debug, Clone, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
}

/// A column on the board. Maps to a workflow stage in the destination.
#[derive(Debug, Clone, Deserialize)]
pub struct List {
    pub id: String,
    pub name: String,
    /// Ordinal position within the board.
    #[serde(default)]
    pub pos: f64,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl Label {
    /// Labels without a name fall back to their color, matching how the
    /// source UI displays them.
    pub fn display_name(&self) -> Option<&str> {
        if !self.name.is_empty() {
            Some(&self.name)
        } else {
            self.color.as_deref()
        }
    }
}
