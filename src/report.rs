use std::collections::BTreeMap;
use std::fmt;

use crate::correlate::EntityKind;

/// One entity the run could not migrate, with enough context to remediate
/// manually and re-run.
#[derive(Debug, Clone)]
pub struct Failure {
    pub kind: EntityKind,
    pub source_id: String,
    pub name: String,
    pub reason: String,
}

/// Terminal state of a migration run: created/skipped counts per entity
/// kind plus every per-entity failure.
#[derive(Debug, Default)]
pub struct RunReport {
    created: BTreeMap<EntityKind, usize>,
    skipped: BTreeMap<EntityKind, usize>,
    failures: Vec<Failure>,
}

impl RunReport {
    pub fn record_created(&mut self, kind: EntityKind) {
        *self.created.entry(kind).or_default() += 1;
    }

    pub fn record_skipped(&mut self, kind: EntityKind) {
        *self.skipped.entry(kind).or_default() += 1;
    }

    pub fn record_failure(&mut self, kind: EntityKind, source_id: &str, name: &str, reason: String) {
        self.failures.push(Failure {
            kind,
            source_id: source_id.to_string(),
            name: name.to_string(),
            reason,
        });
    }

    pub fn created(&self, kind: EntityKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn skipped(&self, kind: EntityKind) -> usize {
        self.skipped.get(&kind).copied().unwrap_or(0)
    }

    pub fn failed(&self, kind: EntityKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    pub fn total_created(&self) -> usize {
        self.created.values().sum()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migration summary:")?;
        let kinds = [
            EntityKind::Project,
            EntityKind::Issue,
            EntityKind::Comment,
            EntityKind::Attachment,
            EntityKind::ChecklistItem,
        ];
        for kind in kinds {
            let created = self.created(kind);
            let skipped = self.skipped(kind);
            let failed = self.failed(kind);
            if created + skipped + failed == 0 {
                continue;
            }
            write!(f, "  {kind}: {created} created")?;
            if skipped > 0 {
                write!(f, ", {skipped} skipped")?;
            }
            if failed > 0 {
                write!(f, ", {failed} failed")?;
            }
            writeln!(f)?;
        }
        if self.failures.is_empty() {
            writeln!(f, "  no failures")?;
        } else {
            writeln!(f, "Failures:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "  {} {} ({}): {}",
                    failure.kind, failure.source_id, failure.name, failure.reason
                )?;
            }
        }
        Ok(())
    }
}
