use chrono::NaiveDate;

use super::domain::{
    AwardRecord, DutyRecord, Member, PowerRecord, RecommendationRecord, ScoringSettings,
};
use super::roster::{RosterApplyResult, RosterChanges};

/// Read and write access the ranking engine needs from the event store.
///
/// Implementations must enforce "at most one duty record per date" themselves;
/// the engine never serialises writes in-process.
pub trait EventStore: Send + Sync {
    fn settings(&self) -> Result<ScoringSettings, RepositoryError>;
    fn members(&self) -> Result<Vec<Member>, RepositoryError>;
    fn duty_records(&self) -> Result<Vec<DutyRecord>, RepositoryError>;
    fn awards(&self) -> Result<Vec<AwardRecord>, RepositoryError>;
    fn recommendations(&self) -> Result<Vec<RecommendationRecord>, RepositoryError>;
    fn power_records(&self) -> Result<Vec<PowerRecord>, RepositoryError>;

    /// Upsert a whole week of assignments keyed by date. Either every record is
    /// written or none is.
    fn upsert_week(
        &self,
        assignments: Vec<DutyRecord>,
    ) -> Result<Vec<DutyRecord>, RepositoryError>;

    /// Manual single-day entry with the same overwrite semantics.
    fn upsert_duty(&self, record: DutyRecord) -> Result<DutyRecord, RepositoryError>;

    fn record_outcome(
        &self,
        date: NaiveDate,
        showed_up: Option<bool>,
    ) -> Result<DutyRecord, RepositoryError>;
}

/// Roster maintenance hooks used by the CSV import confirmation.
pub trait RosterRepository: Send + Sync {
    fn apply_roster_changes(
        &self,
        changes: &RosterChanges,
    ) -> Result<RosterApplyResult, RepositoryError>;
}

/// Writes for the credit and configuration history that scoring reads back.
pub trait HistoryRepository: Send + Sync {
    fn put_settings(&self, settings: ScoringSettings) -> Result<ScoringSettings, RepositoryError>;

    /// Replace every award recorded for `week` with `awards`. Awards dated for
    /// another week are rejected as invalid.
    fn replace_week_awards(
        &self,
        week: NaiveDate,
        awards: Vec<AwardRecord>,
    ) -> Result<Vec<AwardRecord>, RepositoryError>;

    fn add_recommendation(
        &self,
        recommendation: RecommendationRecord,
    ) -> Result<RecommendationRecord, RepositoryError>;

    fn add_power_record(&self, record: PowerRecord) -> Result<PowerRecord, RepositoryError>;
}

/// Error enumeration for event store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting record: {0}")]
    Conflict(String),
    #[error("invalid record: {0}")]
    Invalid(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
