//! Process settings from `APP_*` environment variables (a `.env` file is honoured by the binary).

use crate::error::{ConfigError, StatusMap};
use axum::http::StatusCode;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Schema whose tables are catalogued.
    pub db_schema: String,
    pub debug: bool,
    /// Hide the control tables from the published schema document.
    pub suppress_abstract_table_docs: bool,
    pub bind_addr: String,
    pub max_connections: u32,
    pub status_map: StatusMap,
}

impl Settings {
    pub fn from_env() -> Result<Settings, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Settings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = match get("APP_DATABASE_URL").or_else(|| get("DATABASE_URL")) {
            Some(url) => url,
            None => {
                let host = get("APP_POSTGRES_HOST").ok_or(ConfigError::Missing("APP_POSTGRES_HOST"))?;
                let port = get("APP_POSTGRES_PORT").unwrap_or_else(|| "5432".into());
                let user = get("APP_POSTGRES_USER").ok_or(ConfigError::Missing("APP_POSTGRES_USER"))?;
                let password = get("APP_POSTGRES_PASSWORD").unwrap_or_default();
                let db = get("APP_POSTGRES_DB").ok_or(ConfigError::Missing("APP_POSTGRES_DB"))?;
                if password.is_empty() {
                    format!("postgres://{}@{}:{}/{}", user, host, port, db)
                } else {
                    format!("postgres://{}:{}@{}:{}/{}", user, password, host, port, db)
                }
            }
        };

        let max_connections = match get("APP_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().map_err(|_| ConfigError::Invalid {
                key: "APP_MAX_CONNECTIONS",
                value: v,
            })?,
            None => 5,
        };

        let defaults = StatusMap::default();
        let status = |key: &'static str, default: StatusCode| -> Result<StatusCode, ConfigError> {
            match get(key) {
                Some(v) => v
                    .parse::<u16>()
                    .ok()
                    .and_then(|n| StatusCode::from_u16(n).ok())
                    .ok_or(ConfigError::Invalid { key, value: v }),
                None => Ok(default),
            }
        };
        let status_map = StatusMap {
            not_found: status("APP_STATUS_NOT_FOUND", defaults.not_found)?,
            invalid_argument: status("APP_STATUS_INVALID_ARGUMENT", defaults.invalid_argument)?,
            operation_not_permitted: status("APP_STATUS_OPERATION_NOT_PERMITTED", defaults.operation_not_permitted)?,
            conflict: status("APP_STATUS_CONFLICT", defaults.conflict)?,
            invalid_operation: status("APP_STATUS_INVALID_OPERATION", defaults.invalid_operation)?,
            internal_fault: status("APP_STATUS_INTERNAL_FAULT", defaults.internal_fault)?,
        };

        Ok(Settings {
            database_url,
            db_schema: get("APP_DB_SCHEMA").unwrap_or_else(|| "public".into()),
            debug: parse_bool("APP_DEBUG", get("APP_DEBUG"))?,
            suppress_abstract_table_docs: parse_bool(
                "APP_SUPPRESS_ABSTRACT_TABLE_DOCS",
                get("APP_SUPPRESS_ABSTRACT_TABLE_DOCS"),
            )?,
            bind_addr: get("APP_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into()),
            max_connections,
            status_map,
        })
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(v) = value else {
        return Ok(false);
    };
    match v.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: v }),
    }
}
