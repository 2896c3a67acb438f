//! Week-by-week replay of score components for charting.
//!
//! Every member carries two accumulators per component: one that resets at the
//! end of any week in which the member served duty, and a lifetime one that never
//! resets. Point-in-time terms (rank boost, penalties) are recomputed from the
//! duty history known as of each week's last day.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Months, NaiveDate};
use serde::Serialize;

use super::domain::{
    AwardRecord, DutyRecord, Member, MemberId, PowerRecord, RankTier, RecommendationRecord,
    ScoringSettings,
};
use super::ledger::DutyLedger;
use super::scheduler::{week_range, week_start, DAYS_PER_WEEK};
use super::scoring::rules;

pub const DEFAULT_LOOKBACK_MONTHS: u32 = 3;

/// History the replay runs over.
#[derive(Debug, Clone, Copy)]
pub struct TimelineInputs<'a> {
    pub settings: &'a ScoringSettings,
    pub members: &'a [Member],
    pub duties: &'a [DutyRecord],
    pub awards: &'a [AwardRecord],
    pub recommendations: &'a [RecommendationRecord],
    pub power_records: &'a [PowerRecord],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesPair {
    pub with_reset: Vec<i64>,
    pub cumulative: Vec<i64>,
}

impl SeriesPair {
    fn push(&mut self, with_reset: i64, cumulative: i64) {
        self.with_reset.push(with_reset);
        self.cumulative.push(cumulative);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineWeek {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl TimelineWeek {
    fn starting(monday: NaiveDate) -> Self {
        let end = *week_range(monday).end();
        Self {
            start: monday,
            end,
            label: week_label(monday, end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberTimeline {
    pub member_id: MemberId,
    pub member_name: String,
    pub rank: RankTier,
    pub weeks: Vec<TimelineWeek>,
    /// Award plus recommendation points.
    pub merit: SeriesPair,
    pub awards: SeriesPair,
    pub recommendations: SeriesPair,
    pub rank_boost: SeriesPair,
    pub first_time_boost: SeriesPair,
    pub recent_penalty: SeriesPair,
    pub above_average_penalty: SeriesPair,
    /// Days served inside the window, for reset markers.
    pub duty_dates: Vec<NaiveDate>,
    pub duty_weeks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineReport {
    pub lookback_start: NaiveDate,
    pub generated_on: NaiveDate,
    pub timelines: BTreeMap<MemberId, MemberTimeline>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    awards: i64,
    recommendations: i64,
    rank_boost: i64,
    first_time_boost: i64,
    recent_penalty: i64,
    above_average_penalty: i64,
}

impl Accumulator {
    fn add(&mut self, week: &Accumulator) {
        self.awards = self.awards.saturating_add(week.awards);
        self.recommendations = self.recommendations.saturating_add(week.recommendations);
        self.rank_boost = self.rank_boost.saturating_add(week.rank_boost);
        self.first_time_boost = self.first_time_boost.saturating_add(week.first_time_boost);
        self.recent_penalty = self.recent_penalty.saturating_add(week.recent_penalty);
        self.above_average_penalty = self
            .above_average_penalty
            .saturating_add(week.above_average_penalty);
    }

    fn merit(&self) -> i64 {
        self.awards.saturating_add(self.recommendations)
    }
}

/// Replay `lookback_months` of history ending on `today`.
pub fn replay_timelines(
    inputs: &TimelineInputs<'_>,
    lookback_months: u32,
    today: NaiveDate,
) -> TimelineReport {
    let lookback_start = today
        .checked_sub_months(Months::new(lookback_months))
        .unwrap_or(today);

    let mut weeks = Vec::new();
    let mut monday = week_start(lookback_start);
    while monday <= today {
        weeks.push(TimelineWeek::starting(monday));
        monday += Duration::days(DAYS_PER_WEEK as i64);
    }

    let ledger = DutyLedger::from_records(inputs.duties);
    let conductor_dates = conductor_dates(inputs.duties);
    let averages: Vec<f64> = weeks
        .iter()
        .map(|week| group_average_as_of(&conductor_dates, week.end))
        .collect();

    let timelines = inputs
        .members
        .iter()
        .map(|member| {
            let timeline = replay_member(
                inputs,
                member,
                &ledger,
                conductor_dates
                    .get(&member.id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
                &weeks,
                &averages,
                lookback_start,
            );
            (member.id, timeline)
        })
        .collect();

    TimelineReport {
        lookback_start,
        generated_on: today,
        timelines,
    }
}

fn replay_member(
    inputs: &TimelineInputs<'_>,
    member: &Member,
    ledger: &DutyLedger,
    conducted: &[NaiveDate],
    weeks: &[TimelineWeek],
    averages: &[f64],
    lookback_start: NaiveDate,
) -> MemberTimeline {
    let settings = inputs.settings;
    let served = ledger.served_dates(member.id);

    let mut current = Accumulator::default();
    let mut cumulative = Accumulator::default();
    let mut timeline = MemberTimeline {
        member_id: member.id,
        member_name: member.name.clone(),
        rank: member.rank,
        weeks: weeks.to_vec(),
        merit: SeriesPair::default(),
        awards: SeriesPair::default(),
        recommendations: SeriesPair::default(),
        rank_boost: SeriesPair::default(),
        first_time_boost: SeriesPair::default(),
        recent_penalty: SeriesPair::default(),
        above_average_penalty: SeriesPair::default(),
        duty_dates: Vec::new(),
        duty_weeks: Vec::new(),
        power: settings.power_tracking_enabled.then(Vec::new),
    };

    for (week, &average) in weeks.iter().zip(averages) {
        let range = week.start..=week.end;
        let served_as_of = served.partition_point(|date| *date <= week.end);
        let reset = served.iter().any(|date| range.contains(date));
        let days_since_duty = served_as_of
            .checked_sub(1)
            .map(|index| (week.end - served[index]).num_days())
            .unwrap_or(0);

        let mut this_week = Accumulator {
            awards: inputs
                .awards
                .iter()
                .filter(|award| award.member == member.id && range.contains(&award.week))
                .map(|award| settings.award_points(award.placement))
                .sum(),
            recommendations: rules::recommendation_points(
                inputs
                    .recommendations
                    .iter()
                    .filter(|rec| rec.member == member.id && range.contains(&rec.created_at.date()))
                    .count() as u32,
            ),
            ..Accumulator::default()
        };
        if member.rank.is_senior() {
            this_week.rank_boost = rules::rank_boost(settings.senior_rank_boost, days_since_duty);
        }

        let merit_so_far = [
            this_week.awards,
            current.recommendations,
            this_week.recommendations,
            current.rank_boost,
            this_week.rank_boost,
        ]
        .into_iter()
        .fold(current.awards, i64::saturating_add);
        this_week.first_time_boost =
            rules::first_time_boost(settings.first_time_boost, served_as_of as u32, merit_so_far);
        this_week.recent_penalty =
            rules::recency_penalty(settings.recent_duty_window_days, days_since_duty);
        this_week.above_average_penalty = rules::above_average_penalty(
            settings.above_average_penalty,
            conducted.partition_point(|date| *date <= week.end) as u32,
            average,
        );

        current.add(&this_week);
        cumulative.add(&this_week);
        if reset {
            current = Accumulator::default();
        }

        timeline.merit.push(current.merit(), cumulative.merit());
        timeline.awards.push(current.awards, cumulative.awards);
        timeline
            .recommendations
            .push(current.recommendations, cumulative.recommendations);
        timeline
            .rank_boost
            .push(current.rank_boost, cumulative.rank_boost);
        timeline
            .first_time_boost
            .push(current.first_time_boost, cumulative.first_time_boost);
        timeline
            .recent_penalty
            .push(current.recent_penalty, cumulative.recent_penalty);
        timeline
            .above_average_penalty
            .push(current.above_average_penalty, cumulative.above_average_penalty);

        if let Some(power) = timeline.power.as_mut() {
            let weekly_max = inputs
                .power_records
                .iter()
                .filter(|record| {
                    record.member == member.id && range.contains(&record.recorded_at.date())
                })
                .map(|record| record.power)
                .max()
                .unwrap_or(0);
            power.push(weekly_max);
        }
    }

    let window_end = weeks.last().map(|week| week.end).unwrap_or(lookback_start);
    for &date in served
        .iter()
        .filter(|date| **date >= lookback_start && **date <= window_end)
    {
        let monday = week_start(date);
        timeline.duty_dates.push(date);
        timeline
            .duty_weeks
            .push(week_label(monday, *week_range(monday).end()));
    }

    timeline
}

fn conductor_dates(duties: &[DutyRecord]) -> HashMap<MemberId, Vec<NaiveDate>> {
    let mut dates: HashMap<MemberId, Vec<NaiveDate>> = HashMap::new();
    for record in duties {
        dates.entry(record.conductor).or_default().push(record.date);
    }
    for list in dates.values_mut() {
        list.sort_unstable();
    }
    dates
}

fn group_average_as_of(
    conductor_dates: &HashMap<MemberId, Vec<NaiveDate>>,
    day: NaiveDate,
) -> f64 {
    let (total, conductors) = conductor_dates
        .values()
        .map(|dates| dates.partition_point(|date| *date <= day))
        .filter(|count| *count > 0)
        .fold((0usize, 0usize), |(total, conductors), count| {
            (total + count, conductors + 1)
        });
    if conductors == 0 {
        0.0
    } else {
        total as f64 / conductors as f64
    }
}

fn week_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} - {}", start.format("%b %-d"), end.format("%b %-d"))
}
