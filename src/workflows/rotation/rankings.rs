use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::Serialize;

use super::context::{AwardDetail, RankingContext};
use super::domain::{Member, ScoringSettings};
use super::scoring::{score_member, ScoreBreakdown, ScoreFactor};

/// One row of the ranking table. Penalties are reported as positive amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRanking {
    pub member: Member,
    pub total_score: i64,
    pub recommendation_points: i64,
    pub award_points: i64,
    pub rank_boost: i64,
    pub first_time_boost: i64,
    pub above_average_penalty: i64,
    pub recent_duty_penalty: i64,
    pub recommendation_count: u32,
    pub conductor_count: u32,
    pub last_conductor_date: Option<NaiveDate>,
    pub days_since_last_duty: Option<i64>,
    pub award_details: Vec<AwardDetail>,
}

impl MemberRanking {
    fn from_breakdown(
        member: &Member,
        breakdown: &ScoreBreakdown,
        context: &RankingContext,
    ) -> Self {
        let stats = context.duty_stats(member.id);
        Self {
            member: member.clone(),
            total_score: breakdown.total,
            recommendation_points: breakdown.points(ScoreFactor::Recommendations),
            award_points: breakdown.points(ScoreFactor::Awards),
            rank_boost: breakdown.points(ScoreFactor::RankBoost),
            first_time_boost: breakdown.points(ScoreFactor::FirstTimeBoost),
            above_average_penalty: -breakdown.points(ScoreFactor::AboveAveragePenalty),
            recent_duty_penalty: -breakdown.points(ScoreFactor::RecentDutyPenalty),
            recommendation_count: context.active_recommendations(member.id),
            conductor_count: context.conductor_count(member.id),
            last_conductor_date: stats.and_then(|stats| stats.last_conductor_date),
            days_since_last_duty: context.days_since_last_duty(member.id),
            award_details: context.award_details(member.id).to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingTable {
    pub reference_date: NaiveDate,
    pub settings: ScoringSettings,
    pub average_conductor_count: f64,
    pub rankings: Vec<MemberRanking>,
}

/// Descending by score; equal scores fall back to ascending member id.
pub fn ranking_order(left: (i64, &Member), right: (i64, &Member)) -> Ordering {
    right.0.cmp(&left.0).then(left.1.id.cmp(&right.1.id))
}

/// Rank every member, eligible or not.
pub fn rank_members(members: &[Member], context: &RankingContext) -> RankingTable {
    let mut rankings: Vec<MemberRanking> = members
        .iter()
        .map(|member| {
            let breakdown = score_member(member, context);
            MemberRanking::from_breakdown(member, &breakdown, context)
        })
        .collect();
    rankings.sort_by(|a, b| {
        ranking_order((a.total_score, &a.member), (b.total_score, &b.member))
    });

    RankingTable {
        reference_date: context.reference_date(),
        settings: context.settings().clone(),
        average_conductor_count: context.average_duty_count(),
        rankings,
    }
}
