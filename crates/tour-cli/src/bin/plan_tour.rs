//! Plan a tour from a list of waypoints.
//!
//! Routes the waypoints through the configured routing service, profiles the
//! result against the elevation service and prints length, ascent, descent
//! and elevation range.
//!
//! Usage:
//!   cargo run -p tour-cli --bin plan_tour -- --point 45.0,9.0 --point 45.01,9.01
//!   cargo run -p tour-cli --bin plan_tour -- --input tour.txt --close-loop --json

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tour_cli::{parse_point, parse_waypoints, render_text};
use tour_core::{GainMethod, LatLng, Mode};
use tour_server::cache::ElevationCache;
use tour_server::config::Config;
use tour_server::planner::{spawn_planner, TourCommand};
use tour_server::providers::{CachedElevation, OpenMeteoElevation, OsrmRouter};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Simple,
    Hysteresis,
}

/// Plan a tour and print its elevation statistics
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Waypoint file: JSON array or one "lat,lon" per line ("-" for stdin)
    #[arg(long, short)]
    input: Option<String>,

    /// Waypoint as LAT,LON (repeatable, appended after --input)
    #[arg(long = "point", value_parser = parse_point)]
    points: Vec<LatLng>,

    /// Connect waypoints by road routing or straight lines
    #[arg(long, value_enum, default_value_t = ModeArg::Automatic)]
    mode: ModeArg,

    /// Append a copy of the first waypoint
    #[arg(long)]
    close_loop: bool,

    /// OSRM-compatible routing service (default: TOUR_ROUTER_URL)
    #[arg(long)]
    router_url: Option<String>,

    /// Routing profile, e.g. foot, bike, car (default: TOUR_ROUTING_PROFILE)
    #[arg(long)]
    routing_profile: Option<String>,

    /// Elevation service (default: TOUR_ELEVATION_URL)
    #[arg(long)]
    elevation_url: Option<String>,

    /// Gain/loss algorithm
    #[arg(long, value_enum)]
    method: Option<MethodArg>,

    /// Ignore elevation changes below this many meters
    #[arg(long)]
    floor_m: Option<f64>,

    /// Cap on a single counted elevation change, in meters
    #[arg(long)]
    cap_m: Option<f64>,

    /// Maximum elevation samples per profile
    #[arg(long)]
    max_samples: Option<usize>,

    /// Give up on the whole run after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Print one line per profile sample
    #[arg(long)]
    profile: bool,

    /// Print the full tour snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("plan_tour=info".parse()?))
        .init();

    let args = Args::parse();

    let mut waypoints = match args.input.as_deref() {
        Some(path) => parse_waypoints(&read_input(path)?)
            .with_context(|| format!("Failed to parse waypoints from {path}"))?,
        None => Vec::new(),
    };
    waypoints.extend(args.points.iter().copied());
    if waypoints.len() < 2 {
        bail!("need at least 2 waypoints, got {}", waypoints.len());
    }

    let config = apply_overrides(Config::from_env(), &args);
    let mut options = config.planner_options();
    options.mode = match args.mode {
        ModeArg::Automatic => Mode::Automatic,
        ModeArg::Manual => Mode::Manual,
    };

    tracing::info!(
        "Planning {} waypoints via {} ({})",
        waypoints.len(),
        config.router_url,
        config.gain_method.name()
    );

    let router = OsrmRouter::new(config.router_url.clone(), config.router_timeout());
    let elevation = CachedElevation::new(
        OpenMeteoElevation::new(
            config.elevation_url.clone(),
            config.elevation_timeout(),
            config.elevation_max_points_per_request,
        ),
        Arc::new(ElevationCache::new(
            config.elevation_cache_ttl(),
            config.elevation_cache_max_entries,
        )),
    );
    let planner = spawn_planner(router, elevation, options);

    for point in waypoints {
        planner
            .execute(TourCommand::Append { point, force: true })
            .await
            .with_context(|| format!("Rejected waypoint {}, {}", point.lat, point.lon))?;
    }
    if args.close_loop {
        planner.close_loop().await.context("Failed to close the loop")?;
    }

    let tour = tokio::time::timeout(Duration::from_secs(args.timeout), planner.settled())
        .await
        .context("Timed out waiting for routing and elevation")??;

    if tour.degraded {
        tracing::warn!("Routing failed; part of the tour is drawn as straight lines");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tour)?);
    } else {
        print!("{}", render_text(&tour, args.profile));
    }

    Ok(())
}

fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read waypoints from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

fn apply_overrides(mut config: Config, args: &Args) -> Config {
    if let Some(url) = &args.router_url {
        config.router_url = url.clone();
    }
    if let Some(profile) = &args.routing_profile {
        config.routing_profile = profile.clone();
    }
    if let Some(url) = &args.elevation_url {
        config.elevation_url = url.clone();
    }
    if let Some(method) = args.method {
        let name = match method {
            MethodArg::Simple => "simple",
            MethodArg::Hysteresis => "hysteresis",
        };
        if let Some(method) = GainMethod::default_for_name(name) {
            config.gain_method = method;
        }
    }
    if let Some(floor) = args.floor_m {
        config.gain_method = config.gain_method.with_floor(floor);
    }
    if let Some(cap) = args.cap_m {
        config.gain_method = config.gain_method.with_cap(cap);
    }
    if let Some(max_samples) = args.max_samples {
        config.profile_max_samples = max_samples;
    }
    config
}
