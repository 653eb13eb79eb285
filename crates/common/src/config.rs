use std::time::Duration;

use serde::Deserialize;

const DEFAULT_PUBLIC_PREFIXES: &str = "/health,/swagger,/api/auth/login";
const DEFAULT_PRIVILEGED_PREFIXES: &str = "/api/admin=Admin,/api/auth/register=Admin";

/// A path prefix that requires one specific role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PrivilegedPrefix {
    pub prefix: String,
    pub role: String,
}

/// Which transport the scheduler hands due notifications to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum DeliveryBackend {
    /// Write deliveries to the application log only.
    Log,
    /// POST each delivery as JSON to an HTTP endpoint.
    Webhook {
        url: String,
        secret: Option<String>,
    },
    /// Push each delivery onto a Redis list for downstream transport workers.
    RedisQueue { queue_key: String },
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Redis connection string
    pub redis_url: String,

    /// JWT secret used to verify bearer tokens
    pub jwt_secret: String,

    /// HTTP listen port (default: 3000)
    pub api_port: u16,

    /// Delay between scheduler cycles in seconds (default: 300)
    pub scheduler_interval_secs: u64,

    /// Run the delivery scheduler inside the API process
    pub scheduler_enabled: bool,

    /// Upper bound on a single provider call in seconds
    pub dispatch_timeout_secs: u64,

    /// Upper bound on the due-set query in seconds
    pub store_timeout_secs: u64,

    /// Ordered path prefixes that bypass authentication
    pub public_prefixes: Vec<String>,

    /// Ordered path prefixes that require a specific role
    pub privileged_prefixes: Vec<PrivilegedPrefix>,

    /// Reject unauthenticated callers on routes that are neither public nor privileged
    pub enforce_authenticated: bool,

    /// Delivery transport
    pub delivery: DeliveryBackend,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let delivery = match env_or("DELIVERY_PROVIDER", "log").to_ascii_lowercase().as_str() {
            "log" => DeliveryBackend::Log,
            "webhook" => DeliveryBackend::Webhook {
                url: std::env::var("DELIVERY_WEBHOOK_URL").map_err(|_| {
                    anyhow::anyhow!("DELIVERY_WEBHOOK_URL is required when DELIVERY_PROVIDER=webhook")
                })?,
                secret: std::env::var("DELIVERY_WEBHOOK_SECRET").ok(),
            },
            "redis" => DeliveryBackend::RedisQueue {
                queue_key: env_or("DELIVERY_REDIS_QUEUE", "herald:deliveries"),
            },
            other => anyhow::bail!(
                "DELIVERY_PROVIDER must be one of log, webhook, redis (got '{}')",
                other
            ),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", "20")?,
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            api_port: parse_env("API_PORT", "3000")?,
            scheduler_interval_secs: parse_positive_env("SCHEDULER_INTERVAL_SECS", "300")?,
            scheduler_enabled: parse_env("SCHEDULER_ENABLED", "true")?,
            dispatch_timeout_secs: parse_positive_env("DISPATCH_TIMEOUT_SECS", "30")?,
            store_timeout_secs: parse_positive_env("STORE_TIMEOUT_SECS", "10")?,
            public_prefixes: parse_prefix_list(&env_or(
                "AUTH_PUBLIC_PREFIXES",
                DEFAULT_PUBLIC_PREFIXES,
            )),
            privileged_prefixes: parse_privileged_prefixes(&env_or(
                "AUTH_PRIVILEGED_PREFIXES",
                DEFAULT_PRIVILEGED_PREFIXES,
            ))?,
            enforce_authenticated: parse_env("AUTH_ENFORCE_AUTHENTICATED", "true")?,
            delivery,
        })
    }

    pub fn scheduler_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler_interval_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Defaults suitable for tests and local tooling; never reads the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: None,
            db_max_connections: 5,
            redis_url: "redis://localhost:6379".to_string(),
            jwt_secret: jwt_secret.to_string(),
            api_port: 3000,
            scheduler_interval_secs: 300,
            scheduler_enabled: false,
            dispatch_timeout_secs: 30,
            store_timeout_secs: 10,
            public_prefixes: parse_prefix_list(DEFAULT_PUBLIC_PREFIXES),
            privileged_prefixes: parse_privileged_prefixes(DEFAULT_PRIVILEGED_PREFIXES)
                .unwrap_or_default(),
            enforce_authenticated: true,
            delivery: DeliveryBackend::Log,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> anyhow::Result<T> {
    env_or(key, default).trim().parse().map_err(|_| {
        anyhow::anyhow!(
            "{} must be a valid {}",
            key,
            std::any::type_name::<T>()
        )
    })
}

/// Like `parse_env`, but zero is rejected.
fn parse_positive_env(key: &str, default: &str) -> anyhow::Result<u64> {
    require_positive(key, parse_env(key, default)?)
}

fn require_positive(key: &str, value: u64) -> anyhow::Result<u64> {
    if value == 0 {
        anyhow::bail!("{} must be greater than zero", key);
    }
    Ok(value)
}

/// Parse a comma-separated, ordered list of path prefixes.
pub fn parse_prefix_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse an ordered `prefix=Role,prefix=Role` list.
pub fn parse_privileged_prefixes(raw: &str) -> anyhow::Result<Vec<PrivilegedPrefix>> {
    parse_prefix_list(raw)
        .into_iter()
        .map(|entry| {
            let (prefix, role) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Privileged prefix '{}' must be prefix=role", entry))?;
            let (prefix, role) = (prefix.trim(), role.trim());
            if prefix.is_empty() || role.is_empty() {
                anyhow::bail!("Privileged prefix '{}' must be prefix=role", entry);
            }
            Ok(PrivilegedPrefix {
                prefix: prefix.to_string(),
                role: role.to_string(),
            })
        })
        .collect()
}

/// Strip credentials from a connection URL before it is logged.
pub fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{}://***@{}", scheme, host),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix_list_keeps_order_and_skips_blanks() {
        let prefixes = parse_prefix_list(" /health, ,/swagger,/api/auth/login ");
        assert_eq!(prefixes, vec!["/health", "/swagger", "/api/auth/login"]);
    }

    #[test]
    fn test_parse_privileged_prefixes() {
        let rules = parse_privileged_prefixes("/api/admin=Admin, /api/ops = Operator").unwrap();
        assert_eq!(
            rules,
            vec![
                PrivilegedPrefix {
                    prefix: "/api/admin".to_string(),
                    role: "Admin".to_string()
                },
                PrivilegedPrefix {
                    prefix: "/api/ops".to_string(),
                    role: "Operator".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_privileged_prefixes_rejects_missing_role() {
        assert!(parse_privileged_prefixes("/api/admin").is_err());
        assert!(parse_privileged_prefixes("/api/admin=").is_err());
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let err = require_positive("SCHEDULER_INTERVAL_SECS", 0).unwrap_err();
        assert!(err.to_string().contains("SCHEDULER_INTERVAL_SECS"));
        assert!(require_positive("DISPATCH_TIMEOUT_SECS", 0).is_err());
        assert_eq!(require_positive("STORE_TIMEOUT_SECS", 10).unwrap(), 10);
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://herald:hunter2@db:5432/herald"),
            "postgres://***@db:5432/herald"
        );
        assert_eq!(redact_url("redis://localhost:6379"), "redis://localhost:6379");
    }

    #[test]
    fn test_test_config_defaults() {
        let config = AppConfig::for_tests("secret");
        assert_eq!(config.scheduler_interval(), Duration::from_secs(300));
        assert!(config.enforce_authenticated);
        assert_eq!(config.privileged_prefixes.len(), 2);
        assert_eq!(config.delivery, DeliveryBackend::Log);
    }
}
