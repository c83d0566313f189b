use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::warn;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub simulate: bool,
    pub server_bind: String,
    pub dashboard_origin: String,
    pub results_fixture: PathBuf,
    pub run_delay_ms: u64,
    pub cancel_delay_ms: u64,
    pub eject_delay_ms: u64,
    pub read_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            simulate: true,
            server_bind: "127.0.0.1:5000".into(),
            dashboard_origin: "http://localhost:4000".into(),
            results_fixture: PathBuf::from("data/sample-data.csv"),
            run_delay_ms: 0,
            cancel_delay_ms: 5_000,
            eject_delay_ms: 5_000,
            read_interval_ms: 2_000,
        }
    }
}

/// Simulated instrument latencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimTiming {
    pub run_delay: Duration,
    pub cancel_delay: Duration,
    pub eject_delay: Duration,
    pub read_interval: Duration,
}

impl Settings {
    pub fn timing(&self) -> SimTiming {
        SimTiming {
            run_delay: Duration::from_millis(self.run_delay_ms),
            cancel_delay: Duration::from_millis(self.cancel_delay_ms),
            eject_delay: Duration::from_millis(self.eject_delay_ms),
            read_interval: Duration::from_millis(self.read_interval_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    simulate: Option<bool>,
    bind_addr: Option<String>,
    dashboard_origin: Option<String>,
    results_fixture: Option<PathBuf>,
    run_delay_ms: Option<u64>,
    cancel_delay_ms: Option<u64>,
    eject_delay_ms: Option<u64>,
    read_interval_ms: Option<u64>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new("server.toml"), |key| std::env::var(key).ok())
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
        apply_file_config(&mut settings, file_cfg);
    }

    apply_env_overrides(&mut settings, env);

    settings.dashboard_origin = normalize_origin(&settings.dashboard_origin)
        .with_context(|| format!("invalid dashboard origin '{}'", settings.dashboard_origin))?;
    Ok(settings)
}

fn apply_file_config(settings: &mut Settings, file_cfg: FileConfig) {
    if let Some(v) = file_cfg.simulate {
        settings.simulate = v;
    }
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.dashboard_origin {
        settings.dashboard_origin = v;
    }
    if let Some(v) = file_cfg.results_fixture {
        settings.results_fixture = v;
    }
    if let Some(v) = file_cfg.run_delay_ms {
        settings.run_delay_ms = v;
    }
    if let Some(v) = file_cfg.cancel_delay_ms {
        settings.cancel_delay_ms = v;
    }
    if let Some(v) = file_cfg.eject_delay_ms {
        settings.eject_delay_ms = v;
    }
    if let Some(v) = file_cfg.read_interval_ms {
        settings.read_interval_ms = v;
    }
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("APP__SIMULATE") {
        match parse_bool(&v) {
            Some(parsed) => settings.simulate = parsed,
            None => warn!(value = %v, "ignoring APP__SIMULATE; expected a boolean"),
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("FILE_SERVER_URL") {
        settings.dashboard_origin = v;
    }
    if let Some(v) = env("APP__DASHBOARD_ORIGIN") {
        settings.dashboard_origin = v;
    }

    if let Some(v) = env("APP__RESULTS_FIXTURE") {
        settings.results_fixture = PathBuf::from(v);
    }

    for (key, field) in [
        ("APP__RUN_DELAY_MS", &mut settings.run_delay_ms),
        ("APP__CANCEL_DELAY_MS", &mut settings.cancel_delay_ms),
        ("APP__EJECT_DELAY_MS", &mut settings.eject_delay_ms),
        ("APP__READ_INTERVAL_MS", &mut settings.read_interval_ms),
    ] {
        if let Some(v) = env(key) {
            match v.trim().parse::<u64>() {
                Ok(parsed) => *field = parsed,
                Err(_) => warn!(key, value = %v, "ignoring non-numeric delay override"),
            }
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reduces a URL to its scheme://host[:port] origin.
pub fn normalize_origin(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw.trim())?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("origin must use http or https");
    }
    let origin = url.origin();
    if !origin.is_tuple() {
        bail!("origin has no host");
    }
    Ok(origin.ascii_serialization())
}

/// Normalizes an `Origin` request header. Unlike a configured origin, a
/// declared one must be a bare origin: no path, query, fragment or credentials.
pub fn declared_origin(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    let url = Url::parse(raw)?;
    if raw.ends_with('/') || url.path() != "/" {
        bail!("declared origin carries a path");
    }
    if url.query().is_some() || url.fragment().is_some() {
        bail!("declared origin carries a query or fragment");
    }
    if !url.username().is_empty() || url.password().is_some() {
        bail!("declared origin carries credentials");
    }
    normalize_origin(raw)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
