use std::collections::HashMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::domain::{
    AwardRecord, DutyRecord, MemberId, Placement, RecommendationRecord, ScoringSettings,
};
use super::ledger::DutyLedger;
use super::repository::{EventStore, RepositoryError};

/// Per-member duty aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DutyStats {
    pub conductor_count: u32,
    pub last_conductor_date: Option<NaiveDate>,
    pub last_backup_used_date: Option<NaiveDate>,
}

impl DutyStats {
    /// Most recent day served in either role.
    pub fn last_duty_date(&self) -> Option<NaiveDate> {
        self.last_conductor_date.max(self.last_backup_used_date)
    }
}

/// Award history line shown next to a ranking, with its ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwardDetail {
    pub category: String,
    pub placement: Placement,
    pub points: i64,
    pub week: NaiveDate,
    pub expired: bool,
}

/// Immutable snapshot consumed by one scoring pass.
#[derive(Debug, Clone)]
pub struct RankingContext {
    settings: ScoringSettings,
    reference_date: NaiveDate,
    active_recommendations: HashMap<MemberId, u32>,
    active_award_points: HashMap<MemberId, i64>,
    duty_stats: HashMap<MemberId, DutyStats>,
    average_duty_count: f64,
    award_details: HashMap<MemberId, Vec<AwardDetail>>,
}

impl RankingContext {
    /// Load settings and history from `store`. Any read failure aborts the build.
    pub fn build<S>(store: &S, reference_date: NaiveDate) -> Result<Self, RepositoryError>
    where
        S: EventStore + ?Sized,
    {
        Self::load(store, reference_date, None)
    }

    /// Same as [`RankingContext::build`] but ignores duty records dated inside
    /// `excluded`, which the caller is about to overwrite.
    pub fn build_excluding<S>(
        store: &S,
        reference_date: NaiveDate,
        excluded: RangeInclusive<NaiveDate>,
    ) -> Result<Self, RepositoryError>
    where
        S: EventStore + ?Sized,
    {
        Self::load(store, reference_date, Some(excluded))
    }

    fn load<S>(
        store: &S,
        reference_date: NaiveDate,
        excluded: Option<RangeInclusive<NaiveDate>>,
    ) -> Result<Self, RepositoryError>
    where
        S: EventStore + ?Sized,
    {
        let settings = store.settings()?;
        let mut duties = store.duty_records()?;
        if let Some(range) = &excluded {
            duties.retain(|record| !range.contains(&record.date));
        }
        let awards = store.awards()?;
        let recommendations = store.recommendations()?;

        let context =
            Self::from_records(settings, &duties, &awards, &recommendations, reference_date);
        debug!(
            %reference_date,
            duty_records = duties.len(),
            awards = awards.len(),
            recommendations = recommendations.len(),
            average_duty_count = context.average_duty_count,
            "ranking context built"
        );
        Ok(context)
    }

    /// Pure aggregation over already-loaded history.
    pub fn from_records(
        settings: ScoringSettings,
        duties: &[DutyRecord],
        awards: &[AwardRecord],
        recommendations: &[RecommendationRecord],
        reference_date: NaiveDate,
    ) -> Self {
        let ledger = DutyLedger::from_records(duties);

        let mut active_recommendations: HashMap<MemberId, u32> = HashMap::new();
        for recommendation in recommendations {
            if !ledger.recommendation_expired(recommendation) {
                *active_recommendations
                    .entry(recommendation.member)
                    .or_default() += 1;
            }
        }

        let mut active_award_points: HashMap<MemberId, i64> = HashMap::new();
        let mut award_details: HashMap<MemberId, Vec<AwardDetail>> = HashMap::new();
        for award in awards {
            let points = settings.award_points(award.placement);
            let expired = ledger.award_expired(award);
            if !expired {
                *active_award_points.entry(award.member).or_default() += points;
            }
            award_details
                .entry(award.member)
                .or_default()
                .push(AwardDetail {
                    category: award.category.clone(),
                    placement: award.placement,
                    points,
                    week: award.week,
                    expired,
                });
        }
        for details in award_details.values_mut() {
            details.sort_by(|a, b| b.week.cmp(&a.week).then(a.placement.cmp(&b.placement)));
        }

        let mut duty_stats: HashMap<MemberId, DutyStats> = HashMap::new();
        for record in duties {
            let stats = duty_stats.entry(record.conductor).or_default();
            stats.conductor_count += 1;
            stats.last_conductor_date = stats.last_conductor_date.max(Some(record.date));

            if let Some(backup) = record.covering_backup() {
                let stats = duty_stats.entry(backup).or_default();
                stats.last_backup_used_date = stats.last_backup_used_date.max(Some(record.date));
            }
        }

        let (total, conductors) = duty_stats
            .values()
            .filter(|stats| stats.conductor_count > 0)
            .fold((0u32, 0u32), |(total, conductors), stats| {
                (total + stats.conductor_count, conductors + 1)
            });
        let average_duty_count = if conductors == 0 {
            0.0
        } else {
            f64::from(total) / f64::from(conductors)
        };

        Self {
            settings,
            reference_date,
            active_recommendations,
            active_award_points,
            duty_stats,
            average_duty_count,
            award_details,
        }
    }

    pub fn settings(&self) -> &ScoringSettings {
        &self.settings
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn active_recommendations(&self, member: MemberId) -> u32 {
        self.active_recommendations
            .get(&member)
            .copied()
            .unwrap_or(0)
    }

    pub fn active_award_points(&self, member: MemberId) -> i64 {
        self.active_award_points.get(&member).copied().unwrap_or(0)
    }

    pub fn duty_stats(&self, member: MemberId) -> Option<&DutyStats> {
        self.duty_stats.get(&member)
    }

    pub fn conductor_count(&self, member: MemberId) -> u32 {
        self.duty_stats(member)
            .map(|stats| stats.conductor_count)
            .unwrap_or(0)
    }

    pub fn average_duty_count(&self) -> f64 {
        self.average_duty_count
    }

    pub fn award_details(&self, member: MemberId) -> &[AwardDetail] {
        self.award_details
            .get(&member)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Days between the member's most recent duty and the reference date, or
    /// `None` if they never served.
    pub fn days_since_last_duty(&self, member: MemberId) -> Option<i64> {
        self.duty_stats(member)
            .and_then(DutyStats::last_duty_date)
            .map(|last| (self.reference_date - last).num_days())
    }
}
