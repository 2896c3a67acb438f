//! Merit ranking and weekly duty rotation.
//!
//! Scores are derived from an append-only event history (duties, awards,
//! recommendations). A duty consumes every award and recommendation dated on or
//! before it, so credit is spent exactly once. The scheduler turns one ranking
//! pass into a week of conductor and backup assignments, and the timeline
//! replayer reconstructs how each member's score evolved week by week.

pub(crate) mod context;
pub mod domain;
pub(crate) mod ledger;
pub mod memory;
pub mod rankings;
pub mod repository;
pub mod roster;
pub mod router;
pub mod scheduler;
pub mod scoring;
pub mod service;
pub mod snapshot;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use context::{AwardDetail, DutyStats, RankingContext};
pub use domain::{
    AwardRecord, DutyRecord, InvalidRank, Member, MemberId, Placement, PowerRecord, RankTier,
    RecommendationRecord, ScoringSettings,
};
pub use ledger::DutyLedger;
pub use memory::{InMemoryEventStore, StoreSnapshot};
pub use rankings::{MemberRanking, RankingTable};
pub use repository::{EventStore, HistoryRepository, RepositoryError, RosterRepository};
pub use roster::{
    RosterApplyResult, RosterChanges, RosterEntry, RosterImportError, RosterImportPreview,
};
pub use router::rotation_router;
pub use scheduler::{ScheduleWarning, ScheduledDuty, WeeklySchedule};
pub use scoring::{score, score_member, ScoreBreakdown, ScoreComponent, ScoreFactor};
pub use service::{AwardEntry, MemberDutySummary, RotationError, RotationService};
pub use snapshot::{SnapshotError, SnapshotEventStore};
pub use timeline::{MemberTimeline, SeriesPair, TimelineReport};
