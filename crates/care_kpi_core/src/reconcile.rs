//! Template-name reconciliation planner.
//!
//! Given every template row and a uniqueness key, decide which rows keep
//! their name and what the others are renamed to. The plan is pure: stores
//! load rows, call [`plan_reconciliation`] inside their migration
//! transaction, and write the result back.
//!
//! Partitioning is on the key with the name compared case-insensitively.
//! Within a partition rows are ordered by `created_at`, then `id`; the first
//! row survives untouched and every later row gets
//! `"<name> (<marker>-<id prefix>)"`. No row is ever deleted.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{CareSettingTemplate, GLOBAL_AUTHORITY};

const SHORT_ID_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniquenessKey {
    /// `(lower(name), unit_id, health_authority)`
    NameUnitAuthority,
    /// `(lower(name), health_authority)`
    NameAuthority,
}

impl UniquenessKey {
    fn includes_unit(self) -> bool {
        matches!(self, Self::NameUnitAuthority)
    }

    /// Whether two rows violate a unique index on this key. Mirrors SQL
    /// semantics: a NULL in any indexed column never collides.
    pub fn guard_collides(self, a: &TemplateRow, b: &TemplateRow) -> bool {
        let authority = matches!(
            (&a.health_authority, &b.health_authority),
            (Some(x), Some(y)) if x == y
        );
        let unit = !self.includes_unit()
            || matches!((a.unit_id, b.unit_id), (Some(x), Some(y)) if x == y);
        a.folded_name == b.folded_name && authority && unit
    }
}

/// A template row as seen by the planner.
///
/// `folded_name` is the name after the storage engine's own case folding
/// (`LOWER(name)` in Postgres) so partitions line up with the unique index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub folded_name: String,
    pub unit_id: Option<Uuid>,
    pub health_authority: Option<String>,
    pub is_master: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&CareSettingTemplate> for TemplateRow {
    fn from(t: &CareSettingTemplate) -> Self {
        Self {
            id: t.id,
            name: t.name.clone(),
            folded_name: t.name.to_lowercase(),
            unit_id: t.unit_id,
            health_authority: t.health_authority.clone(),
            is_master: t.is_master,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PartitionKey {
    folded_name: String,
    unit_id: Option<Uuid>,
    health_authority: Option<String>,
}

impl PartitionKey {
    fn of(row: &TemplateRow, key: UniquenessKey, folded_name: String) -> Self {
        Self {
            folded_name,
            unit_id: if key.includes_unit() { row.unit_id } else { None },
            health_authority: row.health_authority.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRename {
    pub id: Uuid,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub renames: Vec<TemplateRename>,
    /// GLOBAL templates not yet flagged as master.
    pub master_backfill: Vec<Uuid>,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.renames.is_empty() && self.master_backfill.is_empty()
    }
}

pub fn plan_reconciliation(
    rows: &[TemplateRow],
    key: UniquenessKey,
    marker: &str,
    backfill_masters: bool,
) -> ReconciliationPlan {
    let mut partitions: BTreeMap<PartitionKey, Vec<&TemplateRow>> = BTreeMap::new();
    for row in rows {
        partitions
            .entry(PartitionKey::of(row, key, row.folded_name.clone()))
            .or_default()
            .push(row);
    }

    // Survivors and rows that never collided keep their keys; renamed rows
    // must not land on any of them.
    let mut occupied: HashSet<PartitionKey> = partitions.keys().cloned().collect();
    let mut renames = Vec::new();

    for members in partitions.values_mut() {
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        for row in members.iter().skip(1) {
            let (to, new_key) = disambiguate(row, key, marker, &occupied);
            occupied.insert(new_key);
            renames.push(TemplateRename {
                id: row.id,
                from: row.name.clone(),
                to,
            });
        }
    }

    let master_backfill = if backfill_masters {
        let mut ids: Vec<Uuid> = rows
            .iter()
            .filter(|r| !r.is_master && r.health_authority.as_deref() == Some(GLOBAL_AUTHORITY))
            .map(|r| r.id)
            .collect();
        ids.sort();
        ids
    } else {
        Vec::new()
    };

    ReconciliationPlan {
        renames,
        master_backfill,
    }
}

/// Pick the first free suffix: short id prefix, then the full id, then the
/// full id with a counter.
fn disambiguate(
    row: &TemplateRow,
    key: UniquenessKey,
    marker: &str,
    occupied: &HashSet<PartitionKey>,
) -> (String, PartitionKey) {
    let full = row.id.simple().to_string();
    let mut attempt = 0u32;
    loop {
        let suffix = match attempt {
            0 => full[..SHORT_ID_LEN].to_string(),
            1 => full.clone(),
            n => format!("{full}-{n}"),
        };
        let tail = format!(" ({marker}-{suffix})");
        let new_key = PartitionKey::of(row, key, format!("{}{}", row.folded_name, tail.to_lowercase()));
        if !occupied.contains(&new_key) {
            return (format!("{}{}", row.name, tail), new_key);
        }
        attempt += 1;
    }
}
