#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line driver for the parking lot simulation.

mod demo;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use parkade_core::{Command, Event, ScenarioConfig, SpotKind};
use parkade_session::Session;
use parkade_world::{query, transport::GridTransport};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments accepted by the simulation driver.
#[derive(Debug, Parser)]
#[command(name = "parkade", about = "Runs a parking lot simulation without a window.")]
struct CliArgs {
    /// Scenario file in TOML; every omitted field keeps its default.
    #[arg(long, value_name = "PATH")]
    scenario: Option<PathBuf>,
    /// Lot layout, either a `lot:v1:` string or a path to a file holding one.
    #[arg(long, value_name = "LAYOUT")]
    layout: Option<String>,
    /// Number of in-game days to simulate.
    #[arg(long, default_value_t = 1)]
    days: u32,
    /// Real-time milliseconds covered by each tick.
    #[arg(long, value_name = "MS", default_value_t = 1_000)]
    tick_ms: u64,
    /// Overrides the scenario seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Multiplier applied to every tick.
    #[arg(long, default_value_t = 1.0)]
    time_scale: f32,
    /// Hourly rate charged at metered spots, in cents.
    #[arg(long, value_name = "CENTS")]
    meter_rate: Option<u32>,
    /// Hourly rate charged at booth-paid spots, in cents.
    #[arg(long, value_name = "CENTS")]
    booth_rate: Option<u32>,
    /// Prints the final layout as a transport string.
    #[arg(long)]
    export: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let mut config = load_scenario(args.scenario.as_deref())?;
    if let Some(seed) = args.seed {
        config.rng_seed = seed;
    }

    let mut session = Session::new(&config);
    println!("{}", query::welcome_banner(session.world()));

    match args.layout.as_deref() {
        Some(layout) => {
            let transport = read_layout(layout)?;
            let _ = session
                .load_layout(&transport)
                .context("failed to load layout")?;
        }
        None => {
            for command in demo::starter_lot(config.grid.width, config.grid.height) {
                let _ = session.apply(command);
            }
        }
    }

    if (args.time_scale - 1.0).abs() > f32::EPSILON {
        let _ = session.apply(Command::SetTimeScale {
            scale: args.time_scale,
        });
    }

    let rates = [
        (SpotKind::Meter, args.meter_rate),
        (SpotKind::Booth, args.booth_rate),
    ];
    for (kind, rate) in rates {
        let Some(cents_per_hour) = rate else {
            continue;
        };
        let events = session.apply(Command::SetParkingRate {
            kind,
            cents_per_hour,
        });
        let applied = events
            .iter()
            .any(|event| matches!(event, Event::ParkingRateChanged { .. }));
        if applied && cents_per_hour > config.vehicles.rates.tier(kind).penalty_threshold {
            let messages = session.messages();
            let warning = match kind {
                SpotKind::Meter => &messages.meter_rate_warning,
                SpotKind::Booth => &messages.booth_rate_warning,
            };
            println!("{warning}");
        }
    }

    run(&mut session, &config, &args)?;

    let metrics = query::metrics(session.world());
    println!(
        "{} | money {} | profit {} | spots {}",
        query::clock_label(session.world()),
        format_cents(metrics.money),
        format_cents(metrics.profit),
        metrics.parking_spots
    );
    let verdict = if metrics.profit >= 0 {
        &session.messages().win
    } else {
        &session.messages().lose
    };
    println!("{verdict}");

    if args.export {
        let encoded = query::export_layout(session.world())
            .encode()
            .context("failed to encode layout")?;
        println!("{encoded}");
    }

    Ok(())
}

fn run(session: &mut Session, config: &ScenarioConfig, args: &CliArgs) -> Result<()> {
    let advances = config.clock.minutes_per_second > 0.0 && args.time_scale > 0.0;
    if args.tick_ms == 0 || !advances {
        bail!("clock would never advance with these settings");
    }

    let dt = Duration::from_millis(args.tick_ms);
    let last_day = query::clock(session.world()).day + args.days;
    info!(days = args.days, tick_ms = args.tick_ms, "simulation started");

    while query::clock(session.world()).day < last_day {
        for event in session.tick(dt) {
            match event {
                Event::DailyRatingRecorded { day, rating } => {
                    let shown = rating.map_or_else(|| "n/a".to_owned(), |r| format!("{r:.1}"));
                    println!(
                        "Day {} rated {shown} | money {}",
                        day + 1,
                        format_cents(query::money(session.world()))
                    );
                }
                Event::SpotReservationRejected { vehicle, spot, .. } => {
                    warn!(?vehicle, ?spot, "spot reservation rejected");
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_scenario(path: Option<&Path>) -> Result<ScenarioConfig> {
    let Some(path) = path else {
        return Ok(ScenarioConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    parse_scenario(&contents).with_context(|| format!("invalid scenario {}", path.display()))
}

fn parse_scenario(contents: &str) -> Result<ScenarioConfig> {
    Ok(toml::from_str(contents)?)
}

fn read_layout(value: &str) -> Result<GridTransport> {
    let trimmed = value.trim();
    let contents = if trimmed.starts_with(GridTransport::PREFIX) {
        trimmed.to_owned()
    } else {
        fs::read_to_string(trimmed).with_context(|| format!("failed to read layout {trimmed}"))?
    };
    GridTransport::decode(&contents).context("failed to decode layout")
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let magnitude = cents.unsigned_abs();
    format!("{sign}${}.{:02}", magnitude / 100, magnitude % 100)
}
