//! Configuration loading from environment variables.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_DB: &str = "campusdocx.db";
const DEFAULT_MIGRATIONS: &str = "db/migrations";
const DEFAULT_ADMIN_PASSWORD: &str = "roronoazoro";
const DEFAULT_MIN_DATE: &str = "2024-06-23";
const DEFAULT_PORT: u16 = 8080;

/// Server settings. Command line flags are applied on top of these in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub migrations_dir: PathBuf,
    /// Password given to the admin user when it is first created
    pub admin_password: String,
    /// Earliest date that can be opened on the calendar
    pub min_date: NaiveDate,
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Reads `CAMPUSDOCX_DB`, `CAMPUSDOCX_MIGRATIONS`, `CAMPUSDOCX_ADMIN_PASSWORD`,
    /// `CAMPUSDOCX_MIN_DATE` and `CAMPUSDOCX_PORT`, either from the environment
    /// or from a `.env` file. Every variable is optional.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("CAMPUSDOCX_DB").unwrap_or_else(|| DEFAULT_DB.to_string());
        let migrations_dir =
            lookup("CAMPUSDOCX_MIGRATIONS").unwrap_or_else(|| DEFAULT_MIGRATIONS.to_string());

        let admin_password = match lookup("CAMPUSDOCX_ADMIN_PASSWORD") {
            Some(password) if !password.is_empty() => password,
            _ => {
                warn!("CAMPUSDOCX_ADMIN_PASSWORD not set, a new admin user gets the default password");
                DEFAULT_ADMIN_PASSWORD.to_string()
            }
        };

        let min_date = lookup("CAMPUSDOCX_MIN_DATE").unwrap_or_else(|| DEFAULT_MIN_DATE.to_string());
        let min_date = NaiveDate::parse_from_str(&min_date, "%Y-%m-%d")
            .with_context(|| format!("CAMPUSDOCX_MIN_DATE is not a YYYY-MM-DD date: {}", min_date))?;

        let port = match lookup("CAMPUSDOCX_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("CAMPUSDOCX_PORT is not a port number: {}", port))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            db_path: PathBuf::from(db_path),
            migrations_dir: PathBuf::from(migrations_dir),
            admin_password,
            min_date,
            port,
        })
    }

    /// Defaults only, ignoring the environment
    #[cfg(test)]
    pub fn defaults() -> Self {
        Self::from_lookup(|_| None).unwrap()
    }
}
