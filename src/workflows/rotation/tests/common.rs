use std::sync::Arc;

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::workflows::rotation::domain::{
    AwardRecord, DutyRecord, Member, MemberId, Placement, PowerRecord, RankTier,
    RecommendationRecord, ScoringSettings,
};
use crate::workflows::rotation::memory::InMemoryEventStore;
use crate::workflows::rotation::repository::{
    EventStore, HistoryRepository, RepositoryError, RosterRepository,
};
use crate::workflows::rotation::roster::{RosterApplyResult, RosterChanges};
use crate::workflows::rotation::service::RotationService;

pub(super) const SEED: u64 = 7;

pub(super) fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).expect("valid date")
}

pub(super) fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0).expect("valid time")
}

/// Monday 2025-03-03.
pub(super) fn monday() -> NaiveDate {
    day(3, 3)
}

pub(super) fn recommendation(member: u32, created: NaiveDate) -> RecommendationRecord {
    RecommendationRecord {
        member: MemberId(member),
        author: "Oak".to_string(),
        note: "steady under pressure".to_string(),
        created_at: at(created, 10),
    }
}

pub(super) fn award(member: u32, week: NaiveDate, placement: Placement) -> AwardRecord {
    AwardRecord {
        week,
        category: "Donations".to_string(),
        placement,
        member: MemberId(member),
    }
}

pub(super) fn power(member: u32, recorded: NaiveDate, value: i64) -> PowerRecord {
    PowerRecord {
        member: MemberId(member),
        power: value,
        recorded_at: at(recorded, 20),
    }
}

/// Twelve members:
/// - ids 1-7 are juniors with one active recommendation each;
/// - 8-10 are seniors (R4, R5, R4) without merit;
/// - 11 is an R3 without merit;
/// - 12 is an ineligible R5.
///
/// With no duty history the juniors fill the conductor pool and the three
/// seniors are the only possible backups.
pub(super) fn roster_store() -> InMemoryEventStore {
    let store = InMemoryEventStore::new(ScoringSettings::default());
    let roster = [
        ("Alder", RankTier::R1, true),
        ("Birch", RankTier::R2, true),
        ("Cedar", RankTier::R3, true),
        ("Dogwood", RankTier::R2, true),
        ("Elm", RankTier::R1, true),
        ("Fir", RankTier::R3, true),
        ("Ginkgo", RankTier::R2, true),
        ("Oak", RankTier::R4, true),
        ("Pine", RankTier::R5, true),
        ("Spruce", RankTier::R4, true),
        ("Willow", RankTier::R3, true),
        ("Yew", RankTier::R5, false),
    ];
    for (name, rank, eligible) in roster {
        store.add_member(name, rank, eligible).expect("member added");
    }
    for id in 1..=7 {
        store
            .add_recommendation(recommendation(id, day(2, 20)))
            .expect("recommendation added");
    }
    store
}

/// Store with only `count` eligible juniors.
pub(super) fn small_store(count: usize) -> InMemoryEventStore {
    let store = InMemoryEventStore::new(ScoringSettings::default());
    for index in 0..count {
        store
            .add_member(&format!("Member {index}"), RankTier::R2, true)
            .expect("member added");
    }
    store
}

pub(super) fn build_service(
    store: InMemoryEventStore,
) -> (RotationService<InMemoryEventStore>, Arc<InMemoryEventStore>) {
    let store = Arc::new(store);
    let service = RotationService::seeded(store.clone(), SEED);
    (service, store)
}

pub(super) fn member(id: u32, name: &str, rank: RankTier) -> Member {
    Member {
        id: MemberId(id),
        name: name.to_string(),
        rank,
        eligible: true,
    }
}

/// Reads succeed; every write fails as if the disk went away mid-request.
pub(super) struct ReadOnlyStore {
    pub(super) inner: InMemoryEventStore,
}

impl EventStore for ReadOnlyStore {
    fn settings(&self) -> Result<ScoringSettings, RepositoryError> {
        self.inner.settings()
    }

    fn members(&self) -> Result<Vec<Member>, RepositoryError> {
        self.inner.members()
    }

    fn duty_records(&self) -> Result<Vec<DutyRecord>, RepositoryError> {
        self.inner.duty_records()
    }

    fn awards(&self) -> Result<Vec<AwardRecord>, RepositoryError> {
        self.inner.awards()
    }

    fn recommendations(&self) -> Result<Vec<RecommendationRecord>, RepositoryError> {
        self.inner.recommendations()
    }

    fn power_records(&self) -> Result<Vec<PowerRecord>, RepositoryError> {
        self.inner.power_records()
    }

    fn upsert_week(
        &self,
        _assignments: Vec<DutyRecord>,
    ) -> Result<Vec<DutyRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn upsert_duty(&self, _record: DutyRecord) -> Result<DutyRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn record_outcome(
        &self,
        _date: NaiveDate,
        _showed_up: Option<bool>,
    ) -> Result<DutyRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl EventStore for UnavailableStore {
    fn settings(&self) -> Result<ScoringSettings, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn members(&self) -> Result<Vec<Member>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn duty_records(&self) -> Result<Vec<DutyRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn awards(&self) -> Result<Vec<AwardRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn recommendations(&self) -> Result<Vec<RecommendationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn power_records(&self) -> Result<Vec<PowerRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_week(
        &self,
        _assignments: Vec<DutyRecord>,
    ) -> Result<Vec<DutyRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn upsert_duty(&self, _record: DutyRecord) -> Result<DutyRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_outcome(
        &self,
        _date: NaiveDate,
        _showed_up: Option<bool>,
    ) -> Result<DutyRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl HistoryRepository for UnavailableStore {
    fn put_settings(&self, _settings: ScoringSettings) -> Result<ScoringSettings, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn replace_week_awards(
        &self,
        _week: NaiveDate,
        _awards: Vec<AwardRecord>,
    ) -> Result<Vec<AwardRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_recommendation(
        &self,
        _recommendation: RecommendationRecord,
    ) -> Result<RecommendationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn add_power_record(&self, _record: PowerRecord) -> Result<PowerRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl RosterRepository for UnavailableStore {
    fn apply_roster_changes(
        &self,
        _changes: &RosterChanges,
    ) -> Result<RosterApplyResult, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
