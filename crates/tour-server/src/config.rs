//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tour_core::{GainMethod, Mode, ProfileConfig, DEFAULT_LOOP_CLOSE_RADIUS_M};

use crate::planner::PlannerOptions;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub router_url: String,
    pub routing_profile: String,
    pub router_timeout_s: u64,
    pub elevation_url: String,
    pub elevation_timeout_s: u64,
    pub elevation_max_points_per_request: usize,
    pub elevation_cache_ttl_s: u64,
    pub elevation_cache_max_entries: usize,
    pub profile_max_samples: usize,
    pub gain_method: GainMethod,
    pub loop_close_radius_m: f64,
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            router_url: "https://router.project-osrm.org".to_string(),
            routing_profile: "foot".to_string(),
            router_timeout_s: 10,
            elevation_url: "https://api.open-meteo.com/v1/elevation".to_string(),
            elevation_timeout_s: 10,
            elevation_max_points_per_request: 100,
            elevation_cache_ttl_s: 3600,
            elevation_cache_max_entries: 50_000,
            profile_max_samples: tour_core::profile::DEFAULT_MAX_SAMPLES,
            gain_method: GainMethod::default(),
            loop_close_radius_m: DEFAULT_LOOP_CLOSE_RADIUS_M,
            event_buffer: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mut gain_method = env::var("TOUR_GAIN_METHOD")
            .ok()
            .and_then(|name| GainMethod::default_for_name(&name))
            .unwrap_or(defaults.gain_method);
        if let Some(floor) = env_parse::<f64>("TOUR_GAIN_FLOOR_M") {
            gain_method = gain_method.with_floor(floor);
        }
        if let Some(cap) = env_parse::<f64>("TOUR_GAIN_CAP_M") {
            gain_method = gain_method.with_cap(cap);
        }
        if let GainMethod::Hysteresis {
            floor_m,
            cap_m,
            window,
            k,
        } = gain_method
        {
            gain_method = GainMethod::Hysteresis {
                floor_m,
                cap_m,
                window: env_parse("TOUR_SMOOTHING_WINDOW").unwrap_or(window),
                k: env_parse("TOUR_HYSTERESIS_K").unwrap_or(k),
            };
        }

        Self {
            server_port: env_parse("TOUR_PORT").unwrap_or(defaults.server_port),
            router_url: env::var("TOUR_ROUTER_URL").unwrap_or(defaults.router_url),
            routing_profile: env::var("TOUR_ROUTING_PROFILE").unwrap_or(defaults.routing_profile),
            router_timeout_s: env_parse("TOUR_ROUTER_TIMEOUT_S")
                .unwrap_or(defaults.router_timeout_s),
            elevation_url: env::var("TOUR_ELEVATION_URL").unwrap_or(defaults.elevation_url),
            elevation_timeout_s: env_parse("TOUR_ELEVATION_TIMEOUT_S")
                .unwrap_or(defaults.elevation_timeout_s),
            elevation_max_points_per_request: env_parse("TOUR_ELEVATION_MAX_POINTS")
                .unwrap_or(defaults.elevation_max_points_per_request),
            elevation_cache_ttl_s: env_parse("TOUR_ELEVATION_CACHE_TTL_S")
                .unwrap_or(defaults.elevation_cache_ttl_s),
            elevation_cache_max_entries: env_parse("TOUR_ELEVATION_CACHE_MAX_ENTRIES")
                .unwrap_or(defaults.elevation_cache_max_entries),
            profile_max_samples: env_parse("TOUR_PROFILE_MAX_SAMPLES")
                .unwrap_or(defaults.profile_max_samples),
            gain_method,
            loop_close_radius_m: env_parse("TOUR_LOOP_CLOSE_RADIUS_M")
                .unwrap_or(defaults.loop_close_radius_m),
            event_buffer: env_parse("TOUR_EVENT_BUFFER").unwrap_or(defaults.event_buffer),
        }
    }

    pub fn router_timeout(&self) -> Duration {
        Duration::from_secs(self.router_timeout_s.max(1))
    }

    pub fn elevation_timeout(&self) -> Duration {
        Duration::from_secs(self.elevation_timeout_s.max(1))
    }

    pub fn elevation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.elevation_cache_ttl_s.max(30))
    }

    pub fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            mode: Mode::Automatic,
            routing_profile: self.routing_profile.clone(),
            loop_close_radius_m: self.loop_close_radius_m,
            profile: ProfileConfig {
                max_samples: self.profile_max_samples.max(2),
                method: self.gain_method,
            },
            event_buffer: self.event_buffer.max(1),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
