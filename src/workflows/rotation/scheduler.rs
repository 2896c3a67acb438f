//! Greedy weekly planner: the seven best-scored eligible members conduct one day
//! each, and senior members outside that pool are drawn at random as backups.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, NaiveDate};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use tracing::warn;

use super::context::RankingContext;
use super::domain::{DutyRecord, Member, MemberId, RankTier};
use super::rankings::ranking_order;
use super::scoring::score;

pub const DAYS_PER_WEEK: usize = 7;

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Monday through Sunday of the week starting at `monday`.
pub fn week_range(monday: NaiveDate) -> RangeInclusive<NaiveDate> {
    monday..=monday + Duration::days(DAYS_PER_WEEK as i64 - 1)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error(
        "not enough eligible members for weekly scheduling (need {required}, have {available})"
    )]
    InsufficientCandidates { required: usize, available: usize },
}

/// Non-fatal conditions surfaced alongside a produced schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleWarning {
    NoEligibleBackup { date: NaiveDate },
}

/// One planned day with member names and ranks resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledDuty {
    pub date: NaiveDate,
    pub conductor_id: MemberId,
    pub conductor_name: String,
    pub conductor_rank: RankTier,
    pub conductor_score: i64,
    pub backup_id: Option<MemberId>,
    pub backup_name: Option<String>,
    pub backup_rank: Option<RankTier>,
}

impl ScheduledDuty {
    pub fn to_record(&self) -> DutyRecord {
        DutyRecord::assignment(
            self.date,
            self.conductor_id,
            self.backup_id,
            self.conductor_score,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklySchedule {
    pub week_start: NaiveDate,
    pub assignments: Vec<ScheduledDuty>,
    pub warnings: Vec<ScheduleWarning>,
}

impl WeeklySchedule {
    pub fn records(&self) -> Vec<DutyRecord> {
        self.assignments.iter().map(ScheduledDuty::to_record).collect()
    }
}

/// Plan the week beginning `monday` without touching the store.
///
/// `members` may include ineligible entries; they are filtered out here.
pub fn plan_week<R>(
    monday: NaiveDate,
    members: &[Member],
    context: &RankingContext,
    rng: &mut R,
) -> Result<WeeklySchedule, ScheduleError>
where
    R: Rng + ?Sized,
{
    let mut candidates: Vec<(i64, &Member)> = members
        .iter()
        .filter(|member| member.eligible)
        .map(|member| (score(member, context), member))
        .collect();

    if candidates.len() < DAYS_PER_WEEK {
        return Err(ScheduleError::InsufficientCandidates {
            required: DAYS_PER_WEEK,
            available: candidates.len(),
        });
    }

    candidates.sort_by(|a, b| ranking_order(*a, *b));
    let (pool, rest) = candidates.split_at(DAYS_PER_WEEK);

    let mut used_backups: HashSet<MemberId> = HashSet::new();
    let mut assignments = Vec::with_capacity(DAYS_PER_WEEK);
    let mut warnings = Vec::new();

    for (&(conductor_score, conductor), date) in pool.iter().zip(monday.iter_days()) {
        let available: Vec<&Member> = rest
            .iter()
            .map(|(_, member)| *member)
            .filter(|member| member.rank.is_senior() && !used_backups.contains(&member.id))
            .collect();

        let backup = available.choose(rng).copied();
        match backup {
            Some(member) => {
                used_backups.insert(member.id);
            }
            None => {
                warn!(%date, "no eligible backup left, day scheduled without one");
                warnings.push(ScheduleWarning::NoEligibleBackup { date });
            }
        }

        assignments.push(ScheduledDuty {
            date,
            conductor_id: conductor.id,
            conductor_name: conductor.name.clone(),
            conductor_rank: conductor.rank,
            conductor_score,
            backup_id: backup.map(|member| member.id),
            backup_name: backup.map(|member| member.name.clone()),
            backup_rank: backup.map(|member| member.rank),
        });
    }

    Ok(WeeklySchedule {
        week_start: monday,
        assignments,
        warnings,
    })
}
