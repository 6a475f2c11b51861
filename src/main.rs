use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nextprayer::alarms::{upcoming_alarms, PlannedAlarm, DEFAULT_PLAN_DAYS};
use nextprayer::cli::{parse_args, print_help};
use nextprayer::config::Config;
use nextprayer::engine::{resolve_moment, Confidence, Outcome, ResolvedMoment};
use nextprayer::format::format_duration;
use nextprayer::schedule::{next_wakeup, plan_refresh, run_scheduler, time_until, WakeupPlan};
use nextprayer::settings::DEFAULT_CITY;
use nextprayer::table::{load_table, PrayerTable};

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    if args.help {
        print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nextprayer=info".parse().unwrap()),
        )
        .init();

    info!("nextprayer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Time zone: {}", config.timezone);
    info!("  Table chain: {} file(s)", config.table_paths.len());
    info!(
        "  Fallback refresh: {}m (tolerance {}m)",
        config.fallback_refresh_mins, config.fallback_tolerance_mins
    );

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let tz = config.timezone;
    let clock = move || Utc::now().with_timezone(&tz);

    if args.alarms {
        return print_alarms(&config, &clock(), args.json);
    }

    if args.once {
        info!("Resolving once (--once mode)");
        refresh(&config, &clock(), args.json);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                shutdown.cancel();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    run_scheduler(clock, cancel, |now| refresh(&config, now, args.json)).await;

    Ok(())
}

fn load(config: &Config) -> Option<PrayerTable> {
    match load_table(&config.table_paths) {
        Ok(table) => {
            if let Some(stamp) = table.last_updated() {
                debug!("Table last updated {}", stamp);
            }
            Some(table)
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// Reload inputs, print the current moment, and plan the next refresh
fn refresh(config: &Config, now: &DateTime<Tz>, json: bool) -> WakeupPlan<Tz> {
    let table = load(config);
    let settings = config.load_settings();

    let outcome = resolve_moment(table.as_ref(), &settings, now.naive_local());
    if let Err(e) = print_moment(&outcome, json) {
        error!("Failed to print moment: {}", e);
    }

    let primary = next_wakeup(table.as_ref(), &settings.selected_location, now);
    let plan = plan_refresh(primary, now, config.fallback_offset(), config.fallback_tolerance());
    match plan.next_trigger() {
        Some(at) => info!("Next refresh at {} (in {})", at, format_duration(time_until(&at, now))),
        None => warn!("Nothing to schedule"),
    }
    plan
}

fn print_moment(outcome: &Outcome<ResolvedMoment>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome).context("serializing moment")?);
        return Ok(());
    }

    let moment = outcome.value();
    let note = match (outcome.is_degraded(), moment.confidence) {
        (true, _) => " [no data]",
        (false, Confidence::Approximate) => " [approximate]",
        (false, Confidence::Low) => " [low confidence]",
        (false, Confidence::High) => "",
    };
    println!(
        "{}: {} {} in {} ({}% elapsed){}",
        moment.city, moment.prayer_name, moment.time, moment.countdown, moment.elapsed_percent, note
    );
    Ok(())
}

fn print_alarms(config: &Config, now: &DateTime<Tz>, json: bool) -> Result<()> {
    let settings = config.load_settings();
    let table = load(config).context("No prayer table available")?;
    let records = table
        .city(&settings.selected_location)
        .or_else(|| table.city(DEFAULT_CITY))
        .unwrap_or_default();

    let alarms: Vec<PlannedAlarm> = upcoming_alarms(records, &settings, now.naive_local(), DEFAULT_PLAN_DAYS);
    info!("{} upcoming notification(s)", alarms.len());

    if json {
        println!("{}", serde_json::to_string(&alarms).context("serializing alarms")?);
    } else {
        for alarm in &alarms {
            println!("{} {} {} | {}", alarm.id, alarm.at, alarm.title, alarm.body);
        }
    }
    Ok(())
}
