use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

/// Resolves source user identifiers to destination logins.
///
/// Backed by a user-supplied JSON object mapping source username to
/// destination login. Lookups are case-insensitive. A missing mapping never
/// fails an entity: `resolve` falls back to the configured default login,
/// or leaves the entity unassigned.
#[derive(Debug, Default)]
pub struct IdentityMapper {
    map: HashMap<String, String>,
    default_login: Option<String>,
}

impl IdentityMapper {
    pub fn new(entries: HashMap<String, String>, default_login: Option<String>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { map, default_login }
    }

    pub fn load(path: &Path, default_login: Option<String>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read user mapping from {}", path.display()))?;
        let entries: HashMap<String, String> = serde_json::from_str(&contents)
            .with_context(|| format!("invalid user mapping in {}", path.display()))?;
        Ok(Self::new(entries, default_login))
    }

    /// Mapper with no entries; every lookup yields the default policy.
    pub fn unmapped(default_login: Option<String>) -> Self {
        Self {
            map: HashMap::new(),
            default_login,
        }
    }

    pub fn resolve(&self, source_user: &str) -> Option<&str> {
        self.resolve_exact(source_user)
            .or(self.default_login.as_deref())
    }

    /// Like `resolve` but without the default-login fallback. Used where
    /// the caller wants attribution, not the assignment policy.
    pub fn resolve_exact(&self, source_user: &str) -> Option<&str> {
        self.map
            .get(&source_user.to_lowercase())
            .map(String::as_str)
    }

    /// Assignee for a set of source members: the first explicitly mapped
    /// member wins; when none is mapped but members exist, the default
    /// applies; an empty member list stays unassigned.
    pub fn resolve_first(&self, source_users: &[String]) -> Option<&str> {
        source_users
            .iter()
            .find_map(|u| self.resolve_exact(u))
            .or_else(|| {
                if source_users.is_empty() {
                    None
                } else {
                    self.default_login.as_deref()
                }
            })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
