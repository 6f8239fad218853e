use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("APP_ENV must be development or production, got {other:?}"),
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub env: AppEnv,
    /// Offset in which "same calendar day" is evaluated.
    pub day_offset: UtcOffset,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let env = match var("APP_ENV") {
            Some(v) => AppEnv::parse(&v)?,
            None => AppEnv::Production,
        };
        let day_offset = match var("DAY_BOUNDARY_OFFSET") {
            Some(v) => parse_offset(&v)?,
            None => UtcOffset::UTC,
        };
        let port = match var("APP_PORT") {
            Some(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            None => 5050,
        };
        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(v) => parse_max_connections(&v)?,
            None => 10,
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            db_max_connections,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            env,
            day_offset,
        })
    }

    /// Settings for tests: in-memory store, development errors, UTC days.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            env: AppEnv::Development,
            day_offset: UtcOffset::UTC,
        }
    }
}

pub fn parse_max_connections(raw: &str) -> anyhow::Result<u32> {
    let n = raw
        .trim()
        .parse::<u32>()
        .context("DB_MAX_CONNECTIONS must be a positive integer")?;
    anyhow::ensure!(n > 0, "DB_MAX_CONNECTIONS must be a positive integer, got 0");
    Ok(n)
}

/// Accepts `UTC`, `Z`, or `+HH:MM` / `-HH:MM`.
pub fn parse_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("DAY_BOUNDARY_OFFSET must look like +05:30, got {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::offset;

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_offset("UTC").unwrap(), UtcOffset::UTC);
        assert_eq!(parse_offset("z").ok(), None);
        assert_eq!(parse_offset("+05:30").unwrap(), offset!(+5:30));
        assert_eq!(parse_offset(" -08:00 ").unwrap(), offset!(-8));
        assert!(parse_offset("0530").is_err());
        assert!(parse_offset("+05").is_err());
    }

    #[test]
    fn max_connections_must_be_positive() {
        assert_eq!(parse_max_connections("25").unwrap(), 25);
        assert_eq!(parse_max_connections(" 4 ").unwrap(), 4);
        assert!(parse_max_connections("ten").is_err());
        assert!(parse_max_connections("0").is_err());
        assert!(parse_max_connections("-3").is_err());
    }

    #[test]
    fn parses_app_env() {
        assert_eq!(AppEnv::parse("Development").unwrap(), AppEnv::Development);
        assert_eq!(AppEnv::parse("prod").unwrap(), AppEnv::Production);
        assert!(AppEnv::parse("staging").is_err());
        assert!(AppEnv::Development.is_development());
    }
}
