use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    AwardRecord, DutyRecord, Member, MemberId, PowerRecord, RankTier, RecommendationRecord,
    ScoringSettings,
};
use super::repository::{EventStore, HistoryRepository, RepositoryError, RosterRepository};
use super::roster::{RosterApplyResult, RosterChanges};

/// Serializable image of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    pub settings: ScoringSettings,
    pub members: Vec<Member>,
    pub duty_records: Vec<DutyRecord>,
    pub awards: Vec<AwardRecord>,
    pub recommendations: Vec<RecommendationRecord>,
    pub power_records: Vec<PowerRecord>,
}

#[derive(Debug, Default)]
struct StoreState {
    settings: ScoringSettings,
    members: BTreeMap<MemberId, Member>,
    duties: BTreeMap<NaiveDate, DutyRecord>,
    awards: Vec<AwardRecord>,
    recommendations: Vec<RecommendationRecord>,
    power_records: Vec<PowerRecord>,
}

impl StoreState {
    fn next_member_id(&self) -> MemberId {
        let highest = self.members.keys().next_back().map(|id| id.0).unwrap_or(0);
        MemberId(highest + 1)
    }

    fn validate(&self, record: &DutyRecord) -> Result<(), RepositoryError> {
        if !self.members.contains_key(&record.conductor) {
            return Err(RepositoryError::Invalid(format!(
                "{}: unknown conductor {}",
                record.date, record.conductor
            )));
        }

        if let Some(backup) = record.backup {
            let member = self.members.get(&backup).ok_or_else(|| {
                RepositoryError::Invalid(format!("{}: unknown backup {}", record.date, backup))
            })?;
            if !member.rank.is_senior() {
                return Err(RepositoryError::Invalid(format!(
                    "{}: backup {} holds {}, R4 or R5 required",
                    record.date, member.name, member.rank
                )));
            }
            if backup == record.conductor {
                return Err(RepositoryError::Invalid(format!(
                    "{}: conductor cannot be their own backup",
                    record.date
                )));
            }
        }

        Ok(())
    }
}

/// Lock-guarded event store kept entirely in memory.
///
/// Duty records live in a map keyed by date, so an upsert for an existing date
/// replaces the previous assignment.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    state: RwLock<StoreState>,
}

impl InMemoryEventStore {
    pub fn new(settings: ScoringSettings) -> Self {
        Self {
            state: RwLock::new(StoreState {
                settings,
                ..StoreState::default()
            }),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, RepositoryError> {
        let store = Self::default();
        store.restore(snapshot)?;
        Ok(store)
    }

    pub fn snapshot(&self) -> Result<StoreSnapshot, RepositoryError> {
        let state = self.read()?;
        Ok(StoreSnapshot {
            settings: state.settings.clone(),
            members: state.members.values().cloned().collect(),
            duty_records: state.duties.values().cloned().collect(),
            awards: state.awards.clone(),
            recommendations: state.recommendations.clone(),
            power_records: state.power_records.clone(),
        })
    }

    /// Replace the whole state. Duplicate member ids or duty dates are rejected.
    pub fn restore(&self, snapshot: StoreSnapshot) -> Result<(), RepositoryError> {
        let mut members = BTreeMap::new();
        for member in snapshot.members {
            if let Some(previous) = members.insert(member.id, member) {
                return Err(RepositoryError::Conflict(format!(
                    "duplicate member id {}",
                    previous.id
                )));
            }
        }

        let mut duties = BTreeMap::new();
        for record in snapshot.duty_records {
            if let Some(previous) = duties.insert(record.date, record) {
                return Err(RepositoryError::Conflict(format!(
                    "duplicate duty date {}",
                    previous.date
                )));
            }
        }

        let mut state = self.write()?;
        *state = StoreState {
            settings: snapshot.settings,
            members,
            duties,
            awards: snapshot.awards,
            recommendations: snapshot.recommendations,
            power_records: snapshot.power_records,
        };
        Ok(())
    }

    /// Add a member with the next free identifier.
    pub fn add_member(
        &self,
        name: &str,
        rank: RankTier,
        eligible: bool,
    ) -> Result<Member, RepositoryError> {
        let mut state = self.write()?;
        let member = Member {
            id: state.next_member_id(),
            name: name.to_string(),
            rank,
            eligible,
        };
        state.members.insert(member.id, member.clone());
        Ok(member)
    }

    pub fn set_eligible(&self, id: MemberId, eligible: bool) -> Result<(), RepositoryError> {
        let mut state = self.write()?;
        let member = state
            .members
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        member.eligible = eligible;
        Ok(())
    }

    pub fn add_award(&self, award: AwardRecord) -> Result<(), RepositoryError> {
        self.write()?.awards.push(award);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>, RepositoryError> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>, RepositoryError> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl EventStore for InMemoryEventStore {
    fn settings(&self) -> Result<ScoringSettings, RepositoryError> {
        Ok(self.read()?.settings.clone())
    }

    fn members(&self) -> Result<Vec<Member>, RepositoryError> {
        Ok(self.read()?.members.values().cloned().collect())
    }

    fn duty_records(&self) -> Result<Vec<DutyRecord>, RepositoryError> {
        Ok(self.read()?.duties.values().cloned().collect())
    }

    fn awards(&self) -> Result<Vec<AwardRecord>, RepositoryError> {
        Ok(self.read()?.awards.clone())
    }

    fn recommendations(&self) -> Result<Vec<RecommendationRecord>, RepositoryError> {
        Ok(self.read()?.recommendations.clone())
    }

    fn power_records(&self) -> Result<Vec<PowerRecord>, RepositoryError> {
        Ok(self.read()?.power_records.clone())
    }

    fn upsert_week(
        &self,
        assignments: Vec<DutyRecord>,
    ) -> Result<Vec<DutyRecord>, RepositoryError> {
        let mut state = self.write()?;
        for (index, record) in assignments.iter().enumerate() {
            state.validate(record)?;
            if assignments[..index]
                .iter()
                .any(|earlier| earlier.date == record.date)
            {
                return Err(RepositoryError::Conflict(format!(
                    "{} assigned twice in one week",
                    record.date
                )));
            }
        }

        for record in &assignments {
            state.duties.insert(record.date, record.clone());
        }
        Ok(assignments)
    }

    fn upsert_duty(&self, record: DutyRecord) -> Result<DutyRecord, RepositoryError> {
        let mut state = self.write()?;
        state.validate(&record)?;
        state.duties.insert(record.date, record.clone());
        Ok(record)
    }

    fn record_outcome(
        &self,
        date: NaiveDate,
        showed_up: Option<bool>,
    ) -> Result<DutyRecord, RepositoryError> {
        let mut state = self.write()?;
        let record = state
            .duties
            .get_mut(&date)
            .ok_or(RepositoryError::NotFound)?;
        record.conductor_showed_up = showed_up;
        Ok(record.clone())
    }
}

impl HistoryRepository for InMemoryEventStore {
    fn put_settings(&self, settings: ScoringSettings) -> Result<ScoringSettings, RepositoryError> {
        self.write()?.settings = settings.clone();
        Ok(settings)
    }

    fn replace_week_awards(
        &self,
        week: NaiveDate,
        awards: Vec<AwardRecord>,
    ) -> Result<Vec<AwardRecord>, RepositoryError> {
        if let Some(stray) = awards.iter().find(|award| award.week != week) {
            return Err(RepositoryError::Invalid(format!(
                "award for week {} submitted under week {}",
                stray.week, week
            )));
        }

        let mut state = self.write()?;
        state.awards.retain(|award| award.week != week);
        state.awards.extend(awards.iter().cloned());
        Ok(awards)
    }

    fn add_recommendation(
        &self,
        recommendation: RecommendationRecord,
    ) -> Result<RecommendationRecord, RepositoryError> {
        self.write()?.recommendations.push(recommendation.clone());
        Ok(recommendation)
    }

    fn add_power_record(&self, record: PowerRecord) -> Result<PowerRecord, RepositoryError> {
        self.write()?.power_records.push(record.clone());
        Ok(record)
    }
}

impl RosterRepository for InMemoryEventStore {
    fn apply_roster_changes(
        &self,
        changes: &RosterChanges,
    ) -> Result<RosterApplyResult, RepositoryError> {
        let mut state = self.write()?;
        let mut result = RosterApplyResult::default();

        for rename in &changes.renames {
            if let Some(member) = state
                .members
                .values_mut()
                .find(|member| member.name == rename.old_name)
            {
                member.name = rename.new_name.clone();
            }
        }

        for entry in &changes.members {
            let existing = state
                .members
                .values_mut()
                .find(|member| member.name == entry.name);
            match existing {
                Some(member) if member.rank != entry.rank => {
                    member.rank = entry.rank;
                    result.updated += 1;
                }
                Some(_) => result.unchanged += 1,
                None => {
                    let member = Member {
                        id: state.next_member_id(),
                        name: entry.name.clone(),
                        rank: entry.rank,
                        eligible: true,
                    };
                    state.members.insert(member.id, member);
                    result.added += 1;
                }
            }
        }

        for id in &changes.remove_member_ids {
            if state.members.remove(id).is_some() {
                result.removed += 1;
            }
        }

        Ok(result)
    }
}
