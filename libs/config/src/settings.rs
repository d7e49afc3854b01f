//! Process-level settings, layered from an optional TOML file and plain
//! environment variables (`SERVER_PORT`, `SERVICE_MODE`, `POLL_INTERVAL`,
//! `DATABASE_URL`, `CLICKHOUSE_URL`, ...).

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::Deserialize;

/// Which surfaces this process hosts.
///
/// The query API is a separate deployment; this binary only ever runs the
/// polling pipeline, but accepts the full mode vocabulary so one config file
/// can drive both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    All,
    Api,
    Poller,
}

impl ServiceMode {
    /// Whether this process should run the polling pipeline.
    pub fn runs_poller(&self) -> bool {
        matches!(self, Self::All | Self::Poller)
    }
}

impl FromStr for ServiceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "api" => Ok(Self::Api),
            "poller" => Ok(Self::Poller),
            other => anyhow::bail!("unknown service mode: {other}"),
        }
    }
}

/// Settings for one Pricegrid process.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub server_port: u16,
    pub service_mode: ServiceMode,
    /// Poll cadence in seconds.
    pub poll_interval: u64,
    /// Per-adapter call deadline in seconds; must stay below the cadence.
    pub poll_deadline: u64,
    /// Outlier look-back window in seconds.
    pub outlier_window: u64,
    /// Relative deviation threshold for outlier flagging (fraction, not %).
    pub outlier_deviation_threshold: f64,
    /// Standard-deviation multiplier for outlier flagging.
    pub outlier_std_dev_multiplier: f64,
    /// Postgres connection string for the token store.
    pub database_url: String,
    /// ClickHouse HTTP endpoint for the time-series store.
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: String,
    pub clickhouse_password: String,
}

impl ServiceSettings {
    /// Load settings: defaults, then the optional TOML file, then plain
    /// environment variables (highest precedence).
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server_port", 8080)?
            .set_default("service_mode", "all")?
            .set_default("poll_interval", 15)?
            .set_default("poll_deadline", 10)?
            .set_default("outlier_window", 60)?
            .set_default("outlier_deviation_threshold", 0.05)?
            .set_default("outlier_std_dev_multiplier", 2.0)?
            .set_default("database_url", "postgres://localhost/pricegrid")?
            .set_default("clickhouse_url", "http://localhost:8123")?
            .set_default("clickhouse_database", "pricegrid")?
            .set_default("clickhouse_user", "default")?
            .set_default("clickhouse_password", "")?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(Environment::default().try_parsing(true));

        let settings: Self = builder
            .build()
            .context("building service settings")?
            .try_deserialize()
            .context("deserializing service settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval == 0 {
            anyhow::bail!("poll_interval must be positive");
        }
        if self.poll_deadline == 0 || self.poll_deadline >= self.poll_interval {
            anyhow::bail!(
                "poll_deadline ({}) must be positive and below poll_interval ({})",
                self.poll_deadline,
                self.poll_interval
            );
        }
        if !(0.0..1.0).contains(&self.outlier_deviation_threshold) {
            anyhow::bail!("outlier_deviation_threshold must be a fraction in [0, 1)");
        }
        Ok(())
    }

    /// Poll cadence as a [`Duration`].
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Per-adapter call deadline as a [`Duration`].
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.poll_deadline)
    }

    /// Outlier look-back window as a [`Duration`].
    pub fn outlier_window(&self) -> Duration {
        Duration::from_secs(self.outlier_window)
    }
}
