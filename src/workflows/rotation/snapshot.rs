use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use tracing::{debug, error};

use super::domain::{
    AwardRecord, DutyRecord, Member, PowerRecord, RecommendationRecord, ScoringSettings,
};
use super::memory::{InMemoryEventStore, StoreSnapshot};
use super::repository::{EventStore, HistoryRepository, RepositoryError, RosterRepository};
use super::roster::{RosterApplyResult, RosterChanges};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("snapshot {path} is not valid json: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Event store that mirrors every successful write to a JSON file.
///
/// Reads are served from memory. A write whose flush fails is rolled back so
/// memory never runs ahead of disk.
#[derive(Debug)]
pub struct SnapshotEventStore {
    path: PathBuf,
    inner: InMemoryEventStore,
    write_lock: Mutex<()>,
}

impl SnapshotEventStore {
    /// Open `path`, starting from an empty store when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let path = path.into();
        let snapshot = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<StoreSnapshot>(&bytes).map_err(|source| {
                SnapshotError::Parse {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => StoreSnapshot::default(),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };

        debug!(
            path = %path.display(),
            members = snapshot.members.len(),
            duty_records = snapshot.duty_records.len(),
            "event store snapshot loaded"
        );

        Ok(Self {
            inner: InMemoryEventStore::from_snapshot(snapshot)?,
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_through<T>(
        &self,
        apply: impl FnOnce(&InMemoryEventStore) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| RepositoryError::Unavailable("snapshot lock poisoned".to_string()))?;

        let before = self.inner.snapshot()?;
        let value = apply(&self.inner)?;

        if let Err(err) = self.flush() {
            error!(
                path = %self.path.display(),
                error = %err,
                "snapshot flush failed, rolling back"
            );
            self.inner.restore(before)?;
            return Err(RepositoryError::Unavailable(err.to_string()));
        }

        Ok(value)
    }

    fn flush(&self) -> io::Result<()> {
        let snapshot = self
            .inner
            .snapshot()
            .map_err(|err| io::Error::other(err.to_string()))?;
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &self.path)
    }
}

impl EventStore for SnapshotEventStore {
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
        assignments: Vec<DutyRecord>,
    ) -> Result<Vec<DutyRecord>, RepositoryError> {
        self.write_through(|store| store.upsert_week(assignments))
    }

    fn upsert_duty(&self, record: DutyRecord) -> Result<DutyRecord, RepositoryError> {
        self.write_through(|store| store.upsert_duty(record))
    }

    fn record_outcome(
        &self,
        date: NaiveDate,
        showed_up: Option<bool>,
    ) -> Result<DutyRecord, RepositoryError> {
        self.write_through(|store| store.record_outcome(date, showed_up))
    }
}

impl HistoryRepository for SnapshotEventStore {
    fn put_settings(&self, settings: ScoringSettings) -> Result<ScoringSettings, RepositoryError> {
        self.write_through(|store| store.put_settings(settings))
    }

    fn replace_week_awards(
        &self,
        week: NaiveDate,
        awards: Vec<AwardRecord>,
    ) -> Result<Vec<AwardRecord>, RepositoryError> {
        self.write_through(|store| store.replace_week_awards(week, awards))
    }

    fn add_recommendation(
        &self,
        recommendation: RecommendationRecord,
    ) -> Result<RecommendationRecord, RepositoryError> {
        self.write_through(|store| store.add_recommendation(recommendation))
    }

    fn add_power_record(&self, record: PowerRecord) -> Result<PowerRecord, RepositoryError> {
        self.write_through(|store| store.add_power_record(record))
    }
}

impl RosterRepository for SnapshotEventStore {
    fn apply_roster_changes(
        &self,
        changes: &RosterChanges,
    ) -> Result<RosterApplyResult, RepositoryError> {
        self.write_through(|store| store.apply_roster_changes(changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::rotation::domain::{MemberId, RankTier};

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "duty-rotation-{}-{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("scratch dir");
        dir.join("rotation.json")
    }

    #[test]
    fn missing_file_opens_empty_store() {
        let path = scratch_path("missing");
        let _ = fs::remove_file(&path);

        let store = SnapshotEventStore::open(&path).expect("opens");
        assert!(store.members().expect("read").is_empty());
        assert_eq!(store.settings().expect("read"), ScoringSettings::default());
    }

    #[test]
    fn writes_survive_reopen() {
        let path = scratch_path("reopen");
        let seed = InMemoryEventStore::new(ScoringSettings::default());
        seed.add_member("Ash", RankTier::R2, true).expect("add");
        let bytes = serde_json::to_vec(&seed.snapshot().expect("snapshot")).expect("json");
        fs::write(&path, bytes).expect("seed file");

        let store = SnapshotEventStore::open(&path).expect("opens");
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date");
        store
            .upsert_duty(DutyRecord::assignment(date, MemberId(1), None, 4))
            .expect("writes");

        let reopened = SnapshotEventStore::open(&path).expect("reopens");
        let records = reopened.duty_records().expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].conductor_score, Some(4));
    }

    #[test]
    fn replaced_awards_survive_reopen() {
        use crate::workflows::rotation::domain::Placement;

        let path = scratch_path("awards");
        let _ = fs::remove_file(&path);
        let week = NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date");
        let award = AwardRecord {
            week,
            category: "Donations".to_string(),
            placement: Placement::Second,
            member: MemberId(4),
        };

        let store = SnapshotEventStore::open(&path).expect("opens");
        store
            .replace_week_awards(week, vec![award.clone()])
            .expect("writes");

        let reopened = SnapshotEventStore::open(&path).expect("reopens");
        assert_eq!(reopened.awards().expect("read"), vec![award]);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = scratch_path("corrupt");
        fs::write(&path, b"{ not json").expect("seed file");

        assert!(matches!(
            SnapshotEventStore::open(&path),
            Err(SnapshotError::Parse { .. })
        ));
    }
}
