//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;
use tracing::info;

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => parse_flag(&raw),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> bool {
    let v = raw.trim().to_ascii_lowercase();
    matches!(v.as_str(), "1" | "true" | "on" | "yes")
}

/// Database URL: `DATABASE_URL` wins, otherwise composed from the `DB_*` parts.
pub fn db_url() -> anyhow::Result<String> {
    init_env();
    if let Some(v) = env_opt("DATABASE_URL") {
        return Ok(v);
    }

    if let Some(dsn) = build_dsn_from_db_vars() {
        info!(target = "env", "using DSN composed from DB_* variables");
        return Ok(dsn);
    }

    Err(anyhow::anyhow!(
        "no database configured; set DATABASE_URL or DB_HOST/DB_USERNAME/DB_DATABASE"
    ))
}

fn build_dsn_from_db_vars() -> Option<String> {
    let host = env_opt("DB_HOST")?;
    let user = env_opt("DB_USERNAME")?;
    let parts = DsnParts {
        host,
        user,
        password: env_opt("DB_PASSWORD"),
        database: env_opt("DB_DATABASE").unwrap_or_else(|| "postgres".into()),
        port: env_parse("DB_PORT", 5432u16),
        ssl_mode: env_opt("DB_SSLMODE").unwrap_or_else(|| "prefer".into()),
    };
    parts.to_dsn()
}

/// Connection settings supplied as separate variables.
#[derive(Debug, Clone)]
pub struct DsnParts {
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub port: u16,
    pub ssl_mode: String,
}

impl DsnParts {
    /// Build a postgres DSN. Credentials may contain reserved URL characters,
    /// so they go through `url::Url` to be percent-encoded.
    pub fn to_dsn(&self) -> Option<String> {
        let mut out = url::Url::parse("postgresql://localhost").ok()?;
        out.set_username(&self.user).ok()?;
        if let Some(pass) = &self.password {
            out.set_password(Some(pass)).ok()?;
        }

        let host_trimmed = self.host.trim().trim_matches(|c| c == '[' || c == ']');
        if host_trimmed.contains(':') {
            out.set_host(Some(&format!("[{}]", host_trimmed))).ok()?;
        } else {
            out.set_host(Some(host_trimmed)).ok()?;
        }

        out.set_port(Some(self.port)).ok()?;
        out.set_path(&format!("/{}", self.database));

        if self.ssl_mode != "disable" {
            out.query_pairs_mut().append_pair("sslmode", &self.ssl_mode);
        }

        Some(out.to_string())
    }
}

fn redact_value(key: &str, val: &str) -> String {
    let k = key.to_ascii_uppercase();
    if k.contains("PASSWORD") || k.contains("SECRET") || k.contains("TOKEN") {
        return "***".to_string();
    }

    let val_trim = val.trim();

    // Postgres DSNs carry credentials even when the key looks harmless.
    if let Ok(mut u) = url::Url::parse(val_trim) {
        let scheme = u.scheme().to_ascii_lowercase();
        if scheme == "postgres" || scheme == "postgresql" {
            let _ = u.set_username("***");
            let _ = u.set_password(Some("***"));
            return u.to_string();
        }
    }

    val_trim.to_string()
}

/// Validate required keys and log a consolidated, redacted snapshot of configuration.
/// Returns error if any required key is missing.
pub fn preflight_check(title: &str, required: &[&str], also_log: &[&str]) -> anyhow::Result<()> {
    init_env();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|k| env_opt(k).is_none())
        .collect();
    let snapshot: Vec<(String, String)> = also_log
        .iter()
        .map(|&k| {
            let v = env_opt(k).unwrap_or_default();
            (k.to_string(), redact_value(k, &v))
        })
        .collect();
    info!(target = "preflight", title, snapshot = ?snapshot, "configuration snapshot");
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(format!(
            "missing required env: {:?}",
            missing
        )));
    }
    Ok(())
}
