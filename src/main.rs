use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use duty_rotation::config::{AppConfig, RotationConfig};
use duty_rotation::error::AppError;
use duty_rotation::telemetry;
use duty_rotation::workflows::rotation::{
    rotation_router, MemberId, MemberTimeline, RankingTable, RotationService, SnapshotEventStore,
    WeeklySchedule,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Duty Rotation",
    about = "Rank members by merit and schedule weekly duty rotations",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the current ranking table
    Rankings(RankingsArgs),
    /// Plan and persist the week containing the given date
    Schedule(ScheduleArgs),
    /// Print week-by-week score timelines
    Timelines(TimelinesArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct RankingsArgs {
    /// Reference date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    /// Any date inside the target week (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    week: NaiveDate,
}

#[derive(Args, Debug)]
struct TimelinesArgs {
    /// Lookback window in months
    #[arg(long, default_value_t = 3)]
    months: u32,
    /// Only print the timeline for this member id
    #[arg(long)]
    member: Option<u32>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Rankings(args) => run_rankings(args),
        Command::Schedule(args) => run_schedule(args),
        Command::Timelines(args) => run_timelines(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn open_service(config: &RotationConfig) -> Result<RotationService<SnapshotEventStore>, AppError> {
    let store = Arc::new(SnapshotEventStore::open(&config.data_path)?);
    let rng = match config.scheduler_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    Ok(RotationService::new(store, rng))
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let service = Arc::new(open_service(&config.rotation)?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(rotation_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_path = %config.rotation.data_path.display(),
        "duty rotation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_rankings(args: RankingsArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = open_service(&config.rotation)?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let table = service.compute_rankings(date)?;
    render_rankings(&table);
    Ok(())
}

fn run_schedule(args: ScheduleArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let service = open_service(&config.rotation)?;
    let schedule = service.auto_schedule(args.week)?;
    render_schedule(&schedule);
    Ok(())
}

fn run_timelines(args: TimelinesArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = open_service(&config.rotation)?;
    let report = service.compute_timelines(args.months, Local::now().date_naive())?;

    println!(
        "Score timelines from {} to {}",
        report.lookback_start, report.generated_on
    );
    for timeline in report.timelines.values() {
        if args.member.is_some_and(|id| MemberId(id) != timeline.member_id) {
            continue;
        }
        render_timeline(timeline);
    }
    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn render_rankings(table: &RankingTable) {
    println!("Rankings as of {}", table.reference_date);
    println!(
        "Group average conductor duties: {:.2}",
        table.average_conductor_count
    );
    println!();

    for (position, row) in table.rankings.iter().enumerate() {
        let eligibility = if row.member.eligible {
            ""
        } else {
            " (ineligible)"
        };
        let last_duty = match row.days_since_last_duty {
            Some(days) => format!("{days}d since duty"),
            None => "never on duty".to_string(),
        };
        let components = format!(
            "recs +{} awards +{} boost +{} first +{} avg -{} recent -{}",
            row.recommendation_points,
            row.award_points,
            row.rank_boost,
            row.first_time_boost,
            row.above_average_penalty,
            row.recent_duty_penalty,
        );
        println!(
            "{:>3}. {:<20} {} {:>5} | {} | {}{}",
            position + 1,
            row.member.name,
            row.member.rank,
            row.total_score,
            components,
            last_duty,
            eligibility
        );
    }
}

fn render_schedule(schedule: &WeeklySchedule) {
    println!("Week of {}", schedule.week_start);
    for duty in &schedule.assignments {
        let backup = match (&duty.backup_name, duty.backup_rank) {
            (Some(name), Some(rank)) => format!("{name} ({rank})"),
            _ => "none".to_string(),
        };
        println!(
            "- {} {}: {} ({}, score {}), backup {}",
            duty.date.format("%a"),
            duty.date,
            duty.conductor_name,
            duty.conductor_rank,
            duty.conductor_score,
            backup
        );
    }

    if !schedule.warnings.is_empty() {
        println!("\n{} day(s) without an eligible backup", schedule.warnings.len());
    }
}

fn render_timeline(timeline: &MemberTimeline) {
    println!("\n{} ({}, id {})", timeline.member_name, timeline.rank, timeline.member_id);
    for (index, week) in timeline.weeks.iter().enumerate() {
        let reset = if timeline.duty_weeks.contains(&week.label) {
            " *duty*"
        } else {
            ""
        };
        println!(
            "  {:<16} merit {:>4} (lifetime {:>4}) boost {:>5} recent -{:<3} avg -{:<3}{}",
            week.label,
            timeline.merit.with_reset[index],
            timeline.merit.cumulative[index],
            timeline.rank_boost.with_reset[index],
            timeline.recent_penalty.with_reset[index],
            timeline.above_average_penalty.with_reset[index],
            reset
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(ready: bool) -> AppState {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: recorder.handle(),
        }
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let app = Router::new()
            .route("/ready", get(readiness_endpoint))
            .with_state(test_state(false));

        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2025-03-03").is_ok());
        assert!(parse_date("03/03/2025").is_err());
    }
}
