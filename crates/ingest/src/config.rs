use std::time::Duration;

/// The worker never ticks faster than this, whatever the configuration says.
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Ingest queue tuning loaded from environment variables.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Minimum time between the starts of two rebuild passes while changes
    /// keep arriving.
    pub bulk_window: Duration,
    /// How often the worker checks whether a rebuild pass is due.
    pub check_interval: Duration,
}

impl IngestConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default | Minimum |
    /// |----------------------------|---------|---------|
    /// | `INGEST_BULK_WINDOW_MS`    | `500`   | `0`     |
    /// | `INGEST_CHECK_INTERVAL_MS` | `100`   | `1`     |
    ///
    /// Values that do not parse or fall below the minimum are replaced by
    /// the default with a warning.
    pub fn from_env() -> Self {
        Self {
            bulk_window: millis_from_env("INGEST_BULK_WINDOW_MS", 500, 0),
            check_interval: millis_from_env(
                "INGEST_CHECK_INTERVAL_MS",
                100,
                MIN_CHECK_INTERVAL.as_millis() as u64,
            ),
        }
    }

    /// `check_interval`, raised to [`MIN_CHECK_INTERVAL`] if set lower.
    pub fn tick_interval(&self) -> Duration {
        self.check_interval.max(MIN_CHECK_INTERVAL)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bulk_window: Duration::from_millis(500),
            check_interval: Duration::from_millis(100),
        }
    }
}

fn millis_from_env(name: &str, default: u64, min: u64) -> Duration {
    parse_millis(name, std::env::var(name).ok().as_deref(), default, min)
}

fn parse_millis(name: &str, raw: Option<&str>, default: u64, min: u64) -> Duration {
    let millis = match raw.map(|raw| (raw, raw.parse::<u64>())) {
        None => default,
        Some((_, Ok(millis))) if millis >= min => millis,
        Some((_, Ok(millis))) => {
            tracing::warn!(var = name, value = millis, min, default, "Duration below minimum, using default");
            default
        }
        Some((raw, Err(_))) => {
            tracing::warn!(var = name, value = %raw, default, "Ignoring unparsable duration");
            default
        }
    };
    Duration::from_millis(millis)
}
