//! Environment-driven configuration. Every value has a documented default;
//! a malformed value fails startup outright rather than silently falling
//! back to a default tuning.

use std::time::Duration;

use anyhow::{Context, Result};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {name}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_bool_env(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) => match raw.as_str() {
            "1" | "true" | "TRUE" | "yes" => Ok(true),
            "0" | "false" | "FALSE" | "no" => Ok(false),
            other => Err(anyhow::anyhow!("invalid boolean {name}={other:?}")),
        },
        Err(_) => Ok(default),
    }
}

/// Full process configuration, assembled once at startup from the
/// environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_db: String,

    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub cache_verbose_logging: bool,

    pub ort_intra_threads: usize,
    pub ort_inter_threads: usize,

    pub json_bind: String,

    pub grpc_bind: String,
    pub grpc_max_recv_bytes: usize,
    pub grpc_max_send_bytes: usize,
    pub grpc_grace_seconds: u64,
    pub enable_reflection: bool,

    pub readiness_interval: Duration,
    pub log_health: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mongo_uri: env_or("MONGO_URI", "mongodb://localhost:27017"),
            mongo_db: env_or("MONGO_DB", "onnx_platform"),

            cache_capacity: parse_env("MODEL_CACHE_MAX", 64usize)
                .context("MODEL_CACHE_MAX")?,
            cache_ttl: Duration::from_secs(
                parse_env("MODEL_CACHE_TTL", 0u64).context("MODEL_CACHE_TTL")?,
            ),
            cache_verbose_logging: parse_bool_env("MODEL_CACHE_LOG", false)
                .context("MODEL_CACHE_LOG")?,

            ort_intra_threads: parse_env("ORT_INTRA_OP_THREADS", 0usize)
                .context("ORT_INTRA_OP_THREADS")?,
            ort_inter_threads: parse_env("ORT_INTER_OP_THREADS", 0usize)
                .context("ORT_INTER_OP_THREADS")?,

            json_bind: env_or("HTTP_BIND", "0.0.0.0:8080"),

            grpc_bind: env_or("GRPC_BIND", "[::]:50051"),
            grpc_max_recv_bytes: parse_env("GRPC_MAX_RECV_BYTES", 32 * 1024 * 1024)
                .context("GRPC_MAX_RECV_BYTES")?,
            grpc_max_send_bytes: parse_env("GRPC_MAX_SEND_BYTES", 32 * 1024 * 1024)
                .context("GRPC_MAX_SEND_BYTES")?,
            grpc_grace_seconds: parse_env("GRPC_GRACE_SECONDS", 5u64)
                .context("GRPC_GRACE_SECONDS")?,
            enable_reflection: parse_bool_env("ENABLE_REFLECTION", false)
                .context("ENABLE_REFLECTION")?,

            readiness_interval: Duration::from_secs(
                parse_env("READINESS_INTERVAL", 5u64).context("READINESS_INTERVAL")?,
            ),
            log_health: parse_bool_env("LOG_HEALTH", false).context("LOG_HEALTH")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation isn't safe across concurrently running
    // tests in the same process; serialize the env-dependent cases.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_without_any_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        for key in [
            "MONGO_URI",
            "MODEL_CACHE_MAX",
            "MODEL_CACHE_TTL",
            "MODEL_CACHE_LOG",
            "GRPC_GRACE_SECONDS",
            "ENABLE_REFLECTION",
        ] {
            std::env::remove_var(key);
        }
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.mongo_uri, "mongodb://localhost:27017");
        assert_eq!(cfg.cache_capacity, 64);
        assert_eq!(cfg.cache_ttl, Duration::ZERO);
        assert!(!cfg.cache_verbose_logging);
        assert_eq!(cfg.grpc_grace_seconds, 5);
        assert!(!cfg.enable_reflection);
    }

    #[test]
    fn rejects_non_numeric_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("MODEL_CACHE_MAX", "not-a-number");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("MODEL_CACHE_MAX"));
        std::env::remove_var("MODEL_CACHE_MAX");
    }

    #[test]
    fn rejects_invalid_boolean_override() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("ENABLE_REFLECTION", "maybe");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("ENABLE_REFLECTION"));
        std::env::remove_var("ENABLE_REFLECTION");
    }
}
