use std::time::Duration;

/// Runtime settings of the operator, read from the environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum number of clusters reconciled in parallel
    pub concurrency: u16,
    /// Deadline of every store call
    pub store_timeout: Duration,
    /// Delay before checking again that a deleted execution space is gone
    pub deletion_poll: Duration,
    /// First retry delay after a failed reconcile
    pub backoff_base: Duration,
    /// Ceiling of the retry delay
    pub backoff_max: Duration,
    /// Bind address of the diagnostics server
    pub metrics_addr: String,
    /// Instance name used when publishing events
    pub pod_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            store_timeout: Duration::from_secs(10),
            deletion_poll: Duration::from_secs(5),
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(5 * 60),
            metrics_addr: "0.0.0.0:9000".to_string(),
            pod_name: "unknown".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(v) => match v.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Ignoring invalid value {v:?} for {key}");
                default
            }
        },
    }
}

impl ControllerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            let raw = parse_or(key, lookup(key), default.as_secs());
            if raw == 0 {
                tracing::warn!("Ignoring zero duration for {key}");
                default
            } else {
                Duration::from_secs(raw)
            }
        };
        let concurrency = match parse_or("FLEET_CONCURRENCY", lookup("FLEET_CONCURRENCY"), d.concurrency) {
            0 => {
                tracing::warn!("Ignoring zero FLEET_CONCURRENCY");
                d.concurrency
            }
            c => c,
        };
        let store_timeout = secs("FLEET_STORE_TIMEOUT_SECS", d.store_timeout);
        let deletion_poll = secs("FLEET_DELETION_POLL_SECS", d.deletion_poll);
        let backoff_base = secs("FLEET_BACKOFF_BASE_SECS", d.backoff_base);
        let mut backoff_max = secs("FLEET_BACKOFF_MAX_SECS", d.backoff_max);
        if backoff_max < backoff_base {
            tracing::warn!("FLEET_BACKOFF_MAX_SECS is lower than FLEET_BACKOFF_BASE_SECS, using the base delay");
            backoff_max = backoff_base;
        }
        Self {
            concurrency,
            store_timeout,
            deletion_poll,
            backoff_base,
            backoff_max,
            metrics_addr: lookup("FLEET_METRICS_ADDR").unwrap_or(d.metrics_addr),
            pod_name: lookup("POD_NAME").unwrap_or(d.pod_name),
        }
    }
}
