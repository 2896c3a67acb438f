use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::common::*;

use crate::workflows::rotation::context::RankingContext;
use crate::workflows::rotation::domain::{MemberId, RankTier};
use crate::workflows::rotation::repository::EventStore;
use crate::workflows::rotation::scheduler::{
    plan_week, ScheduleError, ScheduleWarning, DAYS_PER_WEEK,
};
use crate::workflows::rotation::service::{RotationError, RotationService};

#[test]
fn plan_respects_conductor_and_backup_constraints() {
    let store = roster_store();
    let members = store.members().expect("read");
    let context = RankingContext::build(&store, monday()).expect("context builds");
    let mut rng = StdRng::seed_from_u64(SEED);

    let schedule = plan_week(monday(), &members, &context, &mut rng).expect("week planned");

    assert_eq!(schedule.week_start, monday());
    assert_eq!(schedule.assignments.len(), DAYS_PER_WEEK);

    let conductors: Vec<MemberId> = schedule
        .assignments
        .iter()
        .map(|duty| duty.conductor_id)
        .collect();
    assert_eq!(conductors, (1..=7).map(MemberId).collect::<Vec<_>>());
    assert!(schedule
        .assignments
        .iter()
        .all(|duty| duty.conductor_score == -15));

    let dates: Vec<_> = schedule.assignments.iter().map(|duty| duty.date).collect();
    assert_eq!(dates, monday().iter_days().take(7).collect::<Vec<_>>());

    let pool: HashSet<MemberId> = conductors.iter().copied().collect();
    let mut backups = HashSet::new();
    for duty in &schedule.assignments {
        if let Some(backup) = duty.backup_id {
            assert!(!pool.contains(&backup));
            assert!(backups.insert(backup), "backup reused within the week");
            assert!(duty.backup_rank.is_some_and(RankTier::is_senior));
        }
    }
    assert_eq!(
        backups,
        [MemberId(8), MemberId(9), MemberId(10)].into_iter().collect()
    );
}

#[test]
fn days_beyond_senior_supply_carry_warnings() {
    let store = roster_store();
    let members = store.members().expect("read");
    let context = RankingContext::build(&store, monday()).expect("context builds");
    let mut rng = StdRng::seed_from_u64(SEED);

    let schedule = plan_week(monday(), &members, &context, &mut rng).expect("week planned");

    assert!(schedule.assignments[..3]
        .iter()
        .all(|duty| duty.backup_id.is_some()));
    assert!(schedule.assignments[3..]
        .iter()
        .all(|duty| duty.backup_id.is_none() && duty.backup_name.is_none()));
    assert_eq!(
        schedule.warnings,
        (6..=9)
            .map(|date| ScheduleWarning::NoEligibleBackup { date: day(3, date) })
            .collect::<Vec<_>>()
    );
}

#[test]
fn same_seed_yields_same_backups() {
    let store = roster_store();
    let members = store.members().expect("read");
    let context = RankingContext::build(&store, monday()).expect("context builds");

    let first = plan_week(
        monday(),
        &members,
        &context,
        &mut StdRng::seed_from_u64(SEED),
    )
    .expect("week planned");
    let second = plan_week(
        monday(),
        &members,
        &context,
        &mut StdRng::seed_from_u64(SEED),
    )
    .expect("week planned");

    assert_eq!(first, second);
}

#[test]
fn ineligible_members_are_never_assigned() {
    let store = roster_store();
    for id in 1..=7 {
        store.set_eligible(MemberId(id), false).expect("updated");
    }
    store.set_eligible(MemberId(12), false).expect("updated");
    store.set_eligible(MemberId(1), true).expect("updated");
    store.set_eligible(MemberId(2), true).expect("updated");
    store.set_eligible(MemberId(3), true).expect("updated");

    let members = store.members().expect("read");
    let context = RankingContext::build(&store, monday()).expect("context builds");
    let schedule = plan_week(
        monday(),
        &members,
        &context,
        &mut StdRng::seed_from_u64(SEED),
    )
    .expect("seven eligible members remain");

    let assigned: HashSet<MemberId> = schedule
        .assignments
        .iter()
        .flat_map(|duty| [Some(duty.conductor_id), duty.backup_id])
        .flatten()
        .collect();
    assert!(!assigned.contains(&MemberId(12)));
    assert!((4..=7).all(|id| !assigned.contains(&MemberId(id))));
    // Every eligible member conducts, leaving no backups.
    assert_eq!(schedule.warnings.len(), DAYS_PER_WEEK);
}

#[test]
fn fewer_than_seven_candidates_fails_without_writes() {
    let (service, store) = build_service(small_store(6));

    let error = service.auto_schedule(day(3, 5)).expect_err("too few members");

    assert!(matches!(
        error,
        RotationError::InsufficientCandidates {
            required: 7,
            available: 6
        }
    ));
    assert!(store.duty_records().expect("read").is_empty());

    let members = store.members().expect("read");
    let context = RankingContext::build(store.as_ref(), monday()).expect("context builds");
    assert_eq!(
        plan_week(monday(), &members, &context, &mut StdRng::seed_from_u64(SEED)),
        Err(ScheduleError::InsufficientCandidates {
            required: 7,
            available: 6
        })
    );
}

#[test]
fn rescheduling_a_week_overwrites_it() {
    let store = Arc::new(roster_store());
    let first = RotationService::seeded(store.clone(), SEED)
        .auto_schedule(day(3, 5))
        .expect("first run");
    let second = RotationService::seeded(store.clone(), SEED)
        .auto_schedule(day(3, 9))
        .expect("second run");

    assert_eq!(first, second);
    assert_eq!(first.week_start, monday());

    let records = store.duty_records().expect("read");
    assert_eq!(records.len(), 7);
    let dates: HashSet<_> = records.iter().map(|record| record.date).collect();
    assert_eq!(dates.len(), 7);
    assert_eq!(records, first.records());
}

#[test]
fn persistence_failure_is_reported() {
    let service = RotationService::seeded(
        Arc::new(ReadOnlyStore {
            inner: roster_store(),
        }),
        SEED,
    );

    let error = service.auto_schedule(monday()).expect_err("write fails");
    assert!(matches!(error, RotationError::Persistence(_)));
}
