//! Roster CSV import: a preview pass that classifies every row against the
//! current member list, and a confirmation payload applied by the store.

mod parser;
mod similarity;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use serde::{Deserialize, Serialize};

use super::domain::{Member, MemberId, RankTier};
use parser::parse_roster;
pub(crate) use similarity::are_similar;

/// Imported row classified against the existing roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedMember {
    pub name: String,
    pub rank: RankTier,
    pub is_new: bool,
    pub rank_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_rank: Option<RankTier>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub similar_match: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberToRemove {
    pub id: MemberId,
    pub name: String,
    pub rank: RankTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterImportPreview {
    pub detected_members: Vec<DetectedMember>,
    pub members_to_remove: Vec<MemberToRemove>,
    pub errors: Vec<String>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub rank: RankTier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub old_name: String,
    pub new_name: String,
}

/// Confirmed import. Renames run first, then adds/rank updates, then removals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterChanges {
    pub members: Vec<RosterEntry>,
    pub remove_member_ids: Vec<MemberId>,
    pub renames: Vec<Rename>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterApplyResult {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RosterImportError {
    #[error("failed to parse roster csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("roster csv is empty")]
    Empty,
}

/// Classify an uploaded roster against `existing` without writing anything.
pub fn preview_import<R: Read>(
    reader: R,
    existing: &[Member],
) -> Result<RosterImportPreview, RosterImportError> {
    let parsed = parse_roster(reader)?;
    let by_name: BTreeMap<&str, &Member> = existing
        .iter()
        .map(|member| (member.name.as_str(), member))
        .collect();

    let detected_members: Vec<DetectedMember> = parsed
        .rows
        .into_iter()
        .map(|row| match by_name.get(row.name.as_str()) {
            Some(current) => DetectedMember {
                rank_changed: current.rank != row.rank,
                old_rank: (current.rank != row.rank).then_some(current.rank),
                name: row.name,
                rank: row.rank,
                is_new: false,
                similar_match: Vec::new(),
            },
            None => DetectedMember {
                similar_match: by_name
                    .keys()
                    .filter(|name| are_similar(&row.name, name))
                    .map(|name| name.to_string())
                    .collect(),
                name: row.name,
                rank: row.rank,
                is_new: true,
                rank_changed: false,
                old_rank: None,
            },
        })
        .collect();

    let imported: BTreeSet<&str> = detected_members
        .iter()
        .map(|member| member.name.as_str())
        .collect();
    let members_to_remove = by_name
        .values()
        .filter(|member| !imported.contains(member.name.as_str()))
        .map(|member| MemberToRemove {
            id: member.id,
            name: member.name.clone(),
            rank: member.rank,
        })
        .collect();

    Ok(RosterImportPreview {
        detected_members,
        members_to_remove,
        errors: parsed.errors,
        total_rows: parsed.total_rows,
    })
}
