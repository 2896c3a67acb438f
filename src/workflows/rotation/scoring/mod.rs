pub mod rules;

use serde::{Deserialize, Serialize};

use super::context::RankingContext;
use super::domain::{Member, MemberId};

/// Term of the merit score, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    Recommendations,
    Awards,
    RankBoost,
    FirstTimeBoost,
    AboveAveragePenalty,
    RecentDutyPenalty,
}

/// Signed contribution of one factor, kept for transparent audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub factor: ScoreFactor,
    pub points: i64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub member_id: MemberId,
    pub total: i64,
    pub components: Vec<ScoreComponent>,
}

impl ScoreBreakdown {
    /// Signed points for `factor`; 0 when the factor did not apply.
    pub fn points(&self, factor: ScoreFactor) -> i64 {
        self.components
            .iter()
            .filter(|component| component.factor == factor)
            .map(|component| component.points)
            .sum()
    }
}

/// Total merit score of `member` against `context`.
pub fn score(member: &Member, context: &RankingContext) -> i64 {
    score_member(member, context).total
}

/// Score with the per-factor trail. Factors that contribute nothing are omitted.
pub fn score_member(member: &Member, context: &RankingContext) -> ScoreBreakdown {
    let settings = context.settings();
    let mut tally = Tally::default();

    let recommendations = context.active_recommendations(member.id);
    tally.add(
        ScoreFactor::Recommendations,
        rules::recommendation_points(recommendations),
        || format!("{recommendations} active recommendation(s)"),
    );

    tally.add(
        ScoreFactor::Awards,
        context.active_award_points(member.id),
        || "active award points".to_string(),
    );

    let days_since_duty = context.days_since_last_duty(member.id).unwrap_or(0);
    if member.rank.is_senior() {
        tally.add(
            ScoreFactor::RankBoost,
            rules::rank_boost(settings.senior_rank_boost, days_since_duty),
            || format!("{} with {days_since_duty} day(s) since last duty", member.rank),
        );
    }

    let duty_count = context.conductor_count(member.id);
    tally.add(
        ScoreFactor::FirstTimeBoost,
        rules::first_time_boost(settings.first_time_boost, duty_count, tally.total),
        || "never served as conductor".to_string(),
    );

    let average = context.average_duty_count();
    tally.add(
        ScoreFactor::AboveAveragePenalty,
        -rules::above_average_penalty(settings.above_average_penalty, duty_count, average),
        || format!("{duty_count} duties above group average {average:.2}"),
    );

    tally.add(
        ScoreFactor::RecentDutyPenalty,
        -rules::recency_penalty(settings.recent_duty_window_days, days_since_duty),
        || {
            format!(
                "{days_since_duty} day(s) since last duty inside {}-day window",
                settings.recent_duty_window_days
            )
        },
    );

    ScoreBreakdown {
        member_id: member.id,
        total: tally.total,
        components: tally.components,
    }
}

#[derive(Default)]
struct Tally {
    total: i64,
    components: Vec<ScoreComponent>,
}

impl Tally {
    fn add(&mut self, factor: ScoreFactor, points: i64, notes: impl FnOnce() -> String) {
        if points == 0 {
            return;
        }
        self.total = self.total.saturating_add(points);
        self.components.push(ScoreComponent {
            factor,
            points,
            notes: notes(),
        });
    }
}
