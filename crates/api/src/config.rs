//! Server configuration, loaded from environment variables with defaults.

use std::path::PathBuf;

use anyhow::Context;
use usergate_auth::PasswordPolicy;

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL: i64 = 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct ApiConfig {
    /// Listen address, `host:port`.
    pub bind_addr: String,
    /// HS256 signing secret.
    pub jwt_secret: String,
    /// Access token lifespan in seconds.
    pub access_token_ttl: i64,
    /// Refresh token lifespan in seconds.
    pub refresh_token_ttl: i64,
    /// Seed data loaded at start-up.
    pub fixtures: Option<PathBuf>,
    /// `(username, password)` of an administrator created if absent.
    pub bootstrap_admin: Option<(String, String)>,
    pub password_policy: PasswordPolicy,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"[REDACTED]")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("fixtures", &self.fixtures)
            .field(
                "bootstrap_admin",
                &self.bootstrap_admin.as_ref().map(|(name, _)| name),
            )
            .field("password_policy", &self.password_policy)
            .finish()
    }
}

impl ApiConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("USERGATE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            "dev-secret".to_string()
        });

        let access_token_ttl = env_ttl("USERGATE_ACCESS_TOKEN_TTL", 3600)?;
        let refresh_token_ttl = env_ttl("USERGATE_REFRESH_TOKEN_TTL", 86400)?;

        let fixtures = std::env::var("USERGATE_FIXTURES").ok().map(PathBuf::from);

        let bootstrap_admin = match (
            std::env::var("USERGATE_BOOTSTRAP_ADMIN").ok(),
            std::env::var("USERGATE_BOOTSTRAP_PASSWORD").ok(),
        ) {
            (Some(name), Some(password)) => Some((name, password)),
            (None, None) => None,
            _ => anyhow::bail!(
                "USERGATE_BOOTSTRAP_ADMIN and USERGATE_BOOTSTRAP_PASSWORD must be set together"
            ),
        };

        let defaults = PasswordPolicy::default();
        let password_policy = PasswordPolicy {
            memory_cost: env_parse("USERGATE_ARGON2_MEMORY_KIB", defaults.memory_cost)?,
            time_cost: env_parse("USERGATE_ARGON2_ITERATIONS", defaults.time_cost)?,
            ..defaults
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            access_token_ttl,
            refresh_token_ttl,
            fixtures,
            bootstrap_admin,
            password_policy,
        })
    }

    /// Configuration for tests: ephemeral port, cheap hashing.
    pub fn for_testing(jwt_secret: &str) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            jwt_secret: jwt_secret.to_string(),
            access_token_ttl: 3600,
            refresh_token_ttl: 86400,
            fixtures: None,
            bootstrap_admin: None,
            password_policy: PasswordPolicy::minimal(),
        }
    }

    pub fn access_token_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.access_token_ttl)
    }

    pub fn refresh_token_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_token_ttl)
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_setting(key, std::env::var(key).ok().as_deref(), default)
}

fn env_ttl(key: &str, default: i64) -> anyhow::Result<i64> {
    parse_ttl(key, std::env::var(key).ok().as_deref(), default)
}

/// An unset variable takes `default`; a set one must parse.
fn parse_setting<T>(key: &str, raw: Option<&str>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key}: cannot parse {value:?}")),
    }
}

/// Token lifetimes are whole seconds in `1..=MAX_TOKEN_TTL`.
fn parse_ttl(key: &str, raw: Option<&str>, default: i64) -> anyhow::Result<i64> {
    let ttl = parse_setting(key, raw, default)?;
    if !(1..=MAX_TOKEN_TTL).contains(&ttl) {
        anyhow::bail!("{key}: token lifetime must be between 1 and {MAX_TOKEN_TTL} seconds, got {ttl}");
    }
    Ok(ttl)
}
