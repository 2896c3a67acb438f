use chrono::{Duration, NaiveDate};

use super::common::*;

use crate::workflows::rotation::domain::{
    AwardRecord, DutyRecord, Member, MemberId, Placement, PowerRecord, RankTier,
    RecommendationRecord, ScoringSettings,
};
use crate::workflows::rotation::repository::EventStore;
use crate::workflows::rotation::scoring::rules::RANK_BOOST_CEILING;
use crate::workflows::rotation::timeline::{replay_timelines, TimelineInputs};

struct History {
    settings: ScoringSettings,
    members: Vec<Member>,
    duties: Vec<DutyRecord>,
    awards: Vec<AwardRecord>,
    recommendations: Vec<RecommendationRecord>,
    power_records: Vec<PowerRecord>,
}

impl History {
    /// Birch (R2) earns credit in the week of Mar 3 and serves on Mar 12;
    /// Oak (R4) never serves and never earns anything.
    fn sample() -> Self {
        Self {
            settings: ScoringSettings::default(),
            members: vec![member(1, "Birch", RankTier::R2), member(2, "Oak", RankTier::R4)],
            duties: vec![DutyRecord::assignment(day(3, 12), MemberId(1), None, 0)],
            awards: vec![award(1, day(3, 3), Placement::First)],
            recommendations: vec![recommendation(1, day(3, 4))],
            power_records: vec![
                power(1, day(3, 4), 100),
                power(1, day(3, 6), 120),
                power(2, day(3, 25), 80),
            ],
        }
    }

    fn inputs(&self) -> TimelineInputs<'_> {
        TimelineInputs {
            settings: &self.settings,
            members: &self.members,
            duties: &self.duties,
            awards: &self.awards,
            recommendations: &self.recommendations,
            power_records: &self.power_records,
        }
    }
}

#[test]
fn weeks_span_lookback_window() {
    let history = History::sample();
    let report = replay_timelines(&history.inputs(), 1, day(3, 30));

    assert_eq!(report.lookback_start, day(2, 28));
    let birch = &report.timelines[&MemberId(1)];
    let labels: Vec<&str> = birch.weeks.iter().map(|week| week.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "Feb 24 - Mar 2",
            "Mar 3 - Mar 9",
            "Mar 10 - Mar 16",
            "Mar 17 - Mar 23",
            "Mar 24 - Mar 30",
        ]
    );
    assert_eq!(birch.weeks[0].start, day(2, 24));
}

#[test]
fn serving_duty_resets_running_totals() {
    let history = History::sample();
    let report = replay_timelines(&history.inputs(), 1, day(3, 30));
    let birch = &report.timelines[&MemberId(1)];

    assert_eq!(birch.awards.with_reset, vec![0, 3, 0, 0, 0]);
    assert_eq!(birch.recommendations.cumulative, vec![0, 10, 10, 10, 10]);
    assert_eq!(birch.merit.with_reset, vec![0, 13, 0, 0, 0]);
    assert_eq!(birch.merit.cumulative, vec![0, 13, 13, 13, 13]);
    assert_eq!(birch.first_time_boost.with_reset, vec![0, 5, 0, 0, 0]);
    assert_eq!(birch.first_time_boost.cumulative, vec![0, 5, 5, 5, 5]);
    assert_eq!(birch.recent_penalty.with_reset, vec![30, 60, 0, 19, 31]);
    assert_eq!(birch.recent_penalty.cumulative, vec![30, 60, 86, 105, 117]);
    assert_eq!(birch.above_average_penalty.cumulative, vec![0; 5]);
    assert_eq!(birch.duty_dates, vec![day(3, 12)]);
    assert_eq!(birch.duty_weeks, vec!["Mar 10 - Mar 16".to_string()]);
    assert!(birch.power.is_none());
}

#[test]
fn neglected_senior_keeps_accumulating() {
    let history = History::sample();
    let report = replay_timelines(&history.inputs(), 1, day(3, 30));
    let oak = &report.timelines[&MemberId(2)];

    assert_eq!(oak.rank_boost.with_reset, vec![5, 10, 15, 20, 25]);
    assert_eq!(oak.first_time_boost.with_reset, vec![5, 10, 15, 20, 25]);
    assert_eq!(oak.merit.cumulative, vec![0; 5]);
    assert!(oak.duty_dates.is_empty());
}

#[test]
fn power_series_uses_weekly_maximum() {
    let mut history = History::sample();
    history.settings.power_tracking_enabled = true;
    let report = replay_timelines(&history.inputs(), 1, day(3, 30));

    assert_eq!(
        report.timelines[&MemberId(1)].power,
        Some(vec![0, 120, 0, 0, 0])
    );
    assert_eq!(
        report.timelines[&MemberId(2)].power,
        Some(vec![0, 0, 0, 0, 80])
    );
}

#[test]
fn service_defaults_to_three_months() {
    let (service, store) = build_service(roster_store());
    store
        .upsert_duty(DutyRecord::assignment(day(3, 4), MemberId(1), None, 0))
        .expect("duty written");

    let report = service.compute_timelines(0, day(3, 30)).expect("timelines");

    let lookback_start = NaiveDate::from_ymd_opt(2024, 12, 30).expect("valid date");
    assert_eq!(report.lookback_start, lookback_start);
    assert_eq!(report.timelines.len(), store.members().expect("read").len());

    let alder = &report.timelines[&MemberId(1)];
    assert_eq!(alder.weeks.len(), 13);
    assert_eq!(alder.weeks[0].start, lookback_start);
    assert_eq!(alder.duty_dates, vec![day(3, 4)]);
}

#[test]
fn covering_backup_week_resets_timeline() {
    let mut history = History::sample();
    history.duties = vec![DutyRecord {
        conductor_showed_up: Some(false),
        ..DutyRecord::assignment(day(3, 12), MemberId(1), Some(MemberId(2)), 0)
    }];
    let report = replay_timelines(&history.inputs(), 1, day(3, 30));

    let oak = &report.timelines[&MemberId(2)];
    assert_eq!(oak.duty_dates, vec![day(3, 12)]);
    assert_eq!(oak.duty_weeks, vec!["Mar 10 - Mar 16".to_string()]);
    assert_eq!(oak.rank_boost.with_reset, vec![5, 10, 0, 15, 45]);
    assert_eq!(oak.rank_boost.cumulative, vec![5, 10, 17, 32, 62]);
    assert_eq!(oak.first_time_boost.with_reset, vec![5, 10, 0, 0, 0]);
    assert_eq!(oak.recent_penalty.with_reset, vec![30, 60, 0, 19, 31]);

    // The absent conductor still counts as having served that day.
    let birch = &report.timelines[&MemberId(1)];
    assert_eq!(birch.awards.with_reset, vec![0, 3, 0, 0, 0]);
}

#[test]
fn above_average_penalty_follows_point_in_time_average() {
    let settings = ScoringSettings::default();
    let members = vec![
        member(1, "Ash", RankTier::R2),
        member(2, "Birch", RankTier::R2),
        member(3, "Cedar", RankTier::R2),
    ];
    let duties = vec![
        DutyRecord::assignment(day(3, 4), MemberId(1), None, 0),
        DutyRecord::assignment(day(3, 5), MemberId(2), None, 0),
        DutyRecord::assignment(day(3, 11), MemberId(1), None, 0),
    ];
    let inputs = TimelineInputs {
        settings: &settings,
        members: &members,
        duties: &duties,
        awards: &[],
        recommendations: &[],
        power_records: &[],
    };

    let report = replay_timelines(&inputs, 1, day(3, 30));

    // Two duties against an average of 1.5 from the week of Mar 10 on.
    let ash = &report.timelines[&MemberId(1)];
    assert_eq!(ash.above_average_penalty.with_reset, vec![0, 0, 0, 10, 20]);
    assert_eq!(ash.above_average_penalty.cumulative, vec![0, 0, 10, 20, 30]);
    for id in [2, 3] {
        assert_eq!(
            report.timelines[&MemberId(id)].above_average_penalty.cumulative,
            vec![0; 5]
        );
    }
}

#[test]
fn long_idle_senior_replays_at_boost_ceiling() {
    let settings = ScoringSettings::default();
    let members = vec![member(1, "Pine", RankTier::R5)];
    let duties = vec![DutyRecord::assignment(day(1, 6), MemberId(1), None, 0)];
    let recommendations = vec![recommendation(1, day(2, 1))];
    let inputs = TimelineInputs {
        settings: &settings,
        members: &members,
        duties: &duties,
        awards: &[],
        recommendations: &recommendations,
        power_records: &[],
    };

    let report = replay_timelines(&inputs, 3, day(1, 6) + Duration::days(500));

    let pine = &report.timelines[&MemberId(1)];
    let weeks = pine.weeks.len() as i64;
    assert!(weeks >= 13);
    assert_eq!(
        pine.rank_boost.cumulative.last(),
        Some(&(RANK_BOOST_CEILING * weeks))
    );
    assert_eq!(pine.rank_boost.with_reset, pine.rank_boost.cumulative);
}
