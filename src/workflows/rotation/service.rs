use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::context::RankingContext;
use super::domain::{
    AwardRecord, DutyRecord, Member, MemberId, Placement, PowerRecord, RankTier,
    RecommendationRecord, ScoringSettings,
};
use super::rankings::{rank_members, RankingTable};
use super::repository::{EventStore, HistoryRepository, RepositoryError, RosterRepository};
use super::roster::{
    preview_import, RosterApplyResult, RosterChanges, RosterImportError, RosterImportPreview,
};
use super::scheduler::{plan_week, week_range, week_start, ScheduleError, WeeklySchedule};
use super::scoring::score;
use super::timeline::{replay_timelines, TimelineInputs, TimelineReport, DEFAULT_LOOKBACK_MONTHS};

/// Service composing the event store, scoring context, scheduler and timeline replay.
pub struct RotationService<S> {
    store: Arc<S>,
    rng: Mutex<StdRng>,
}

impl<S> RotationService<S>
where
    S: EventStore + 'static,
{
    /// `rng` drives backup selection; inject a seeded generator for reproducible weeks.
    pub fn new(store: Arc<S>, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
        }
    }

    pub fn seeded(store: Arc<S>, seed: u64) -> Self {
        Self::new(store, StdRng::seed_from_u64(seed))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rank every member as of `reference_date`, best score first.
    pub fn compute_rankings(
        &self,
        reference_date: NaiveDate,
    ) -> Result<RankingTable, RotationError> {
        let context = RankingContext::build(self.store.as_ref(), reference_date)
            .map_err(RotationError::ContextLoad)?;
        let members = self.store.members().map_err(RotationError::ContextLoad)?;
        Ok(rank_members(&members, &context))
    }

    /// Plan and persist the week containing `any_date`.
    ///
    /// Records already stored for that week are ignored while scoring and then
    /// overwritten, so re-running a week replaces it instead of stacking on it.
    pub fn auto_schedule(&self, any_date: NaiveDate) -> Result<WeeklySchedule, RotationError> {
        let monday = week_start(any_date);
        info!(week_start = %monday, "scheduling week");

        let context =
            RankingContext::build_excluding(self.store.as_ref(), monday, week_range(monday))
                .map_err(RotationError::ContextLoad)?;
        let members = self.store.members().map_err(RotationError::ContextLoad)?;

        let schedule = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            plan_week(monday, &members, &context, &mut *rng)?
        };

        self.store
            .upsert_week(schedule.records())
            .map_err(|err| {
                error!(week_start = %monday, error = %err, "failed to persist weekly schedule");
                RotationError::Persistence(err)
            })?;

        info!(
            week_start = %monday,
            assignments = schedule.assignments.len(),
            warnings = schedule.warnings.len(),
            "week scheduled"
        );
        Ok(schedule)
    }

    /// Replay score components over the last `lookback_months` months. Zero
    /// falls back to the default window.
    pub fn compute_timelines(
        &self,
        lookback_months: u32,
        today: NaiveDate,
    ) -> Result<TimelineReport, RotationError> {
        let lookback_months = if lookback_months == 0 {
            DEFAULT_LOOKBACK_MONTHS
        } else {
            lookback_months
        };

        let load = || -> Result<_, RepositoryError> {
            Ok((
                self.store.settings()?,
                self.store.members()?,
                self.store.duty_records()?,
                self.store.awards()?,
                self.store.recommendations()?,
                self.store.power_records()?,
            ))
        };
        let (settings, members, duties, awards, recommendations, power_records) =
            load().map_err(RotationError::ContextLoad)?;

        let inputs = TimelineInputs {
            settings: &settings,
            members: &members,
            duties: &duties,
            awards: &awards,
            recommendations: &recommendations,
            power_records: &power_records,
        };
        Ok(replay_timelines(&inputs, lookback_months, today))
    }

    /// Manually assign `date`, replacing any existing record for that day.
    ///
    /// The stored conductor score is computed as of `date` without the record
    /// being replaced.
    pub fn enter_duty(
        &self,
        date: NaiveDate,
        conductor: MemberId,
        backup: Option<MemberId>,
        notes: Option<String>,
    ) -> Result<DutyRecord, RotationError> {
        let member = self.require_member(conductor)?;
        let context = RankingContext::build_excluding(self.store.as_ref(), date, date..=date)
            .map_err(RotationError::ContextLoad)?;

        let record = DutyRecord {
            notes,
            ..DutyRecord::assignment(date, conductor, backup, score(&member, &context))
        };
        let record = self.store.upsert_duty(record).map_err(write_failure)?;
        info!(%date, conductor = %conductor, ?backup, "duty entered manually");
        Ok(record)
    }

    /// Set whether the conductor showed up on `date`.
    pub fn record_outcome(
        &self,
        date: NaiveDate,
        showed_up: Option<bool>,
    ) -> Result<DutyRecord, RotationError> {
        match self.store.record_outcome(date, showed_up) {
            Ok(record) => {
                info!(%date, ?showed_up, "duty outcome recorded");
                Ok(record)
            }
            Err(RepositoryError::NotFound) => Err(RotationError::NotFound(format!(
                "no duty scheduled on {date}"
            ))),
            Err(other) => Err(RotationError::Persistence(other)),
        }
    }

    /// Duty counters per member, sorted by name.
    pub fn member_duty_summaries(&self) -> Result<Vec<MemberDutySummary>, RotationError> {
        let members = self.store.members().map_err(RotationError::ContextLoad)?;
        let duties = self
            .store
            .duty_records()
            .map_err(RotationError::ContextLoad)?;

        let mut tallies: HashMap<MemberId, DutyTally> = HashMap::new();
        for record in &duties {
            let conductor = tallies.entry(record.conductor).or_default();
            conductor.conductor_count += 1;
            conductor.last_conductor_date = conductor.last_conductor_date.max(Some(record.date));
            if record.conductor_showed_up == Some(false) {
                conductor.no_show_count += 1;
            }

            if let Some(backup) = record.backup {
                let tally = tallies.entry(backup).or_default();
                tally.backup_count += 1;
                if record.covering_backup().is_some() {
                    tally.backup_used_count += 1;
                }
            }
        }

        let mut summaries: Vec<MemberDutySummary> = members
            .into_iter()
            .map(|member| {
                let tally = tallies.remove(&member.id).unwrap_or_default();
                MemberDutySummary {
                    member_id: member.id,
                    name: member.name,
                    rank: member.rank,
                    eligible: member.eligible,
                    conductor_count: tally.conductor_count,
                    last_conductor_date: tally.last_conductor_date,
                    backup_count: tally.backup_count,
                    backup_used_count: tally.backup_used_count,
                    no_show_count: tally.no_show_count,
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then(a.member_id.cmp(&b.member_id)));
        Ok(summaries)
    }

    /// Classify an uploaded roster CSV against the current members.
    pub fn preview_roster_import<R: Read>(
        &self,
        reader: R,
    ) -> Result<RosterImportPreview, RotationError> {
        let members = self.store.members().map_err(RotationError::ContextLoad)?;
        Ok(preview_import(reader, &members)?)
    }

    fn require_member(&self, id: MemberId) -> Result<Member, RotationError> {
        self.store
            .members()
            .map_err(RotationError::ContextLoad)?
            .into_iter()
            .find(|member| member.id == id)
            .ok_or_else(|| RotationError::NotFound(format!("member {id} not found")))
    }
}

impl<S> RotationService<S>
where
    S: EventStore + HistoryRepository + 'static,
{
    pub fn update_settings(
        &self,
        settings: ScoringSettings,
    ) -> Result<ScoringSettings, RotationError> {
        if settings.recent_duty_window_days < 0 {
            return Err(RotationError::Invalid(format!(
                "recent duty window must not be negative (got {})",
                settings.recent_duty_window_days
            )));
        }

        let settings = self.store.put_settings(settings).map_err(write_failure)?;
        info!(?settings, "scoring settings updated");
        Ok(settings)
    }

    /// Replace the awards of the week containing `any_date`.
    pub fn save_week_awards(
        &self,
        any_date: NaiveDate,
        entries: Vec<AwardEntry>,
    ) -> Result<Vec<AwardRecord>, RotationError> {
        let week = week_start(any_date);
        for entry in &entries {
            self.require_member(entry.member_id)?;
        }

        let awards = entries
            .into_iter()
            .map(|entry| AwardRecord {
                week,
                category: entry.category,
                placement: entry.placement,
                member: entry.member_id,
            })
            .collect();
        let awards = self
            .store
            .replace_week_awards(week, awards)
            .map_err(write_failure)?;
        info!(week_start = %week, awards = awards.len(), "weekly awards replaced");
        Ok(awards)
    }

    pub fn add_recommendation(
        &self,
        member: MemberId,
        author: &str,
        note: &str,
        created_at: NaiveDateTime,
    ) -> Result<RecommendationRecord, RotationError> {
        self.require_member(member)?;
        let recommendation = self
            .store
            .add_recommendation(RecommendationRecord {
                member,
                author: author.to_string(),
                note: note.to_string(),
                created_at,
            })
            .map_err(write_failure)?;
        info!(member = %member, "recommendation recorded");
        Ok(recommendation)
    }

    pub fn record_power(
        &self,
        member: MemberId,
        power: i64,
        recorded_at: NaiveDateTime,
    ) -> Result<PowerRecord, RotationError> {
        if power < 0 {
            return Err(RotationError::Invalid(format!(
                "power must not be negative (got {power})"
            )));
        }
        self.require_member(member)?;
        self.store
            .add_power_record(PowerRecord {
                member,
                power,
                recorded_at,
            })
            .map_err(write_failure)
    }
}

impl<S> RotationService<S>
where
    S: EventStore + RosterRepository + 'static,
{
    pub fn confirm_roster_import(
        &self,
        changes: &RosterChanges,
    ) -> Result<RosterApplyResult, RotationError> {
        let result = self
            .store
            .apply_roster_changes(changes)
            .map_err(RotationError::Persistence)?;
        info!(
            added = result.added,
            updated = result.updated,
            unchanged = result.unchanged,
            removed = result.removed,
            "roster import applied"
        );
        Ok(result)
    }
}

fn write_failure(error: RepositoryError) -> RotationError {
    match error {
        RepositoryError::Invalid(message) => RotationError::Invalid(message),
        other => RotationError::Persistence(other),
    }
}

/// One podium slot submitted for a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardEntry {
    pub category: String,
    pub placement: Placement,
    pub member_id: MemberId,
}

#[derive(Debug, Default)]
struct DutyTally {
    conductor_count: u32,
    last_conductor_date: Option<NaiveDate>,
    backup_count: u32,
    backup_used_count: u32,
    no_show_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDutySummary {
    pub member_id: MemberId,
    pub name: String,
    pub rank: RankTier,
    pub eligible: bool,
    pub conductor_count: u32,
    pub last_conductor_date: Option<NaiveDate>,
    /// Days scheduled as backup, whether or not they had to step in.
    pub backup_count: u32,
    pub backup_used_count: u32,
    pub no_show_count: u32,
}

/// Error raised by the rotation service.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error(
        "not enough eligible members for weekly scheduling (need {required}, have {available})"
    )]
    InsufficientCandidates { required: usize, available: usize },
    #[error("failed to load ranking context: {0}")]
    ContextLoad(RepositoryError),
    #[error("failed to persist changes: {0}")]
    Persistence(RepositoryError),
    #[error(transparent)]
    Roster(#[from] RosterImportError),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl From<ScheduleError> for RotationError {
    fn from(value: ScheduleError) -> Self {
        match value {
            ScheduleError::InsufficientCandidates {
                required,
                available,
            } => Self::InsufficientCandidates {
                required,
                available,
            },
        }
    }
}
