//! Credit consumption. Awards and recommendations are "cashed in" by the first
//! duty a member serves on or after the credit's date; later credit stays active
//! until the following duty.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::domain::{AwardRecord, DutyRecord, MemberId, RecommendationRecord};

/// Dates on which each member served, as conductor or as covering backup.
#[derive(Debug, Clone, Default)]
pub struct DutyLedger {
    served: HashMap<MemberId, Vec<NaiveDate>>,
}

impl DutyLedger {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a DutyRecord>) -> Self {
        let mut served: HashMap<MemberId, Vec<NaiveDate>> = HashMap::new();
        for record in records {
            served.entry(record.conductor).or_default().push(record.date);
            if let Some(backup) = record.covering_backup() {
                served.entry(backup).or_default().push(record.date);
            }
        }
        for dates in served.values_mut() {
            dates.sort_unstable();
            dates.dedup();
        }
        Self { served }
    }

    /// Served dates for `member`, ascending.
    pub fn served_dates(&self, member: MemberId) -> &[NaiveDate] {
        self.served.get(&member).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True once `member` has any duty dated on or after `since`.
    pub fn consumed_since(&self, member: MemberId, since: NaiveDate) -> bool {
        self.served_dates(member)
            .last()
            .is_some_and(|latest| *latest >= since)
    }

    pub fn award_expired(&self, award: &AwardRecord) -> bool {
        self.consumed_since(award.member, award.week)
    }

    pub fn recommendation_expired(&self, recommendation: &RecommendationRecord) -> bool {
        self.consumed_since(recommendation.member, recommendation.created_at.date())
    }
}
