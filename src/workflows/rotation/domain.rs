use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for roster members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub u32);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordinal rank tier inside the group, R1 (junior) through R5 (leader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankTier {
    R1,
    R2,
    R3,
    R4,
    R5,
}

impl RankTier {
    /// Senior tiers receive the neglect boost and may serve as backups.
    pub fn is_senior(self) -> bool {
        matches!(self, RankTier::R4 | RankTier::R5)
    }

    pub fn label(self) -> &'static str {
        match self {
            RankTier::R1 => "R1",
            RankTier::R2 => "R2",
            RankTier::R3 => "R3",
            RankTier::R4 => "R4",
            RankTier::R5 => "R5",
        }
    }
}

impl fmt::Display for RankTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rank '{0}' (must be R1-R5)")]
pub struct InvalidRank(pub String);

impl FromStr for RankTier {
    type Err = InvalidRank;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "R1" => Ok(RankTier::R1),
            "R2" => Ok(RankTier::R2),
            "R3" => Ok(RankTier::R3),
            "R4" => Ok(RankTier::R4),
            "R5" => Ok(RankTier::R5),
            _ => Err(InvalidRank(value.trim().to_string())),
        }
    }
}

/// Roster entry. Ineligible members are still ranked but never receive duty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub rank: RankTier,
    #[serde(default = "default_eligible")]
    pub eligible: bool,
}

fn default_eligible() -> bool {
    true
}

/// One calendar day of duty. The store keys records by `date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyRecord {
    pub date: NaiveDate,
    pub conductor: MemberId,
    #[serde(default)]
    pub backup: Option<MemberId>,
    /// `None` while the outcome is unknown; `Some(false)` means the backup covered.
    #[serde(default)]
    pub conductor_showed_up: Option<bool>,
    #[serde(default)]
    pub conductor_score: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DutyRecord {
    pub fn assignment(
        date: NaiveDate,
        conductor: MemberId,
        backup: Option<MemberId>,
        conductor_score: i64,
    ) -> Self {
        Self {
            date,
            conductor,
            backup,
            conductor_showed_up: None,
            conductor_score: Some(conductor_score),
            notes: None,
        }
    }

    /// Backup that actually performed the duty, if the conductor did not show up.
    pub fn covering_backup(&self) -> Option<MemberId> {
        match self.conductor_showed_up {
            Some(false) => self.backup,
            _ => None,
        }
    }

    /// Whether `member` served on this date, either as conductor or as covering backup.
    pub fn served_by(&self, member: MemberId) -> bool {
        self.conductor == member || self.covering_backup() == Some(member)
    }
}

/// Podium placement of a weekly award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Placement {
    First,
    Second,
    Third,
}

impl Placement {
    pub fn ordinal(self) -> u8 {
        match self {
            Placement::First => 1,
            Placement::Second => 2,
            Placement::Third => 3,
        }
    }
}

impl TryFrom<u8> for Placement {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Placement::First),
            2 => Ok(Placement::Second),
            3 => Ok(Placement::Third),
            other => Err(format!("placement must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Placement> for u8 {
    fn from(value: Placement) -> Self {
        value.ordinal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardRecord {
    /// Monday of the week the award was given for.
    pub week: NaiveDate,
    pub category: String,
    pub placement: Placement,
    pub member: MemberId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub member: MemberId,
    pub author: String,
    #[serde(default)]
    pub note: String,
    pub created_at: NaiveDateTime,
}

/// Separately tracked strength value; never subject to reset semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerRecord {
    pub member: MemberId,
    pub power: i64,
    pub recorded_at: NaiveDateTime,
}

/// Point values and constants consumed by the scoring function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSettings {
    pub award_first_points: i64,
    pub award_second_points: i64,
    pub award_third_points: i64,
    pub recent_duty_window_days: i64,
    pub above_average_penalty: i64,
    pub senior_rank_boost: i64,
    pub first_time_boost: i64,
    pub power_tracking_enabled: bool,
}

impl ScoringSettings {
    pub fn award_points(&self, placement: Placement) -> i64 {
        match placement {
            Placement::First => self.award_first_points,
            Placement::Second => self.award_second_points,
            Placement::Third => self.award_third_points,
        }
    }
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            award_first_points: 3,
            award_second_points: 2,
            award_third_points: 1,
            recent_duty_window_days: 30,
            above_average_penalty: 10,
            senior_rank_boost: 5,
            first_time_boost: 5,
            power_tracking_enabled: false,
        }
    }
}
