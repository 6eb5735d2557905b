//! Database provider selection and connection-string validation.
//!
//! The provider is chosen once from the `Database` setting. Only the external
//! provider takes a connection string, which must opt in to resetting pooled
//! sessions and opt out of ambient transaction enlistment.

use crate::error::{AppError, AppResult};
use sqlx::postgres::PgConnectOptions;
use std::collections::HashMap;
use std::str::FromStr;
use url::Url;

/// Persistence mode for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseMode {
    /// No database at all
    Disabled,
    /// Local SQLite file
    Embedded,
    /// PostgreSQL server
    External,
}

impl DatabaseMode {
    pub const DISABLED: &'static str = "None";
    pub const POSTGRES: &'static str = "PostgreSql";

    /// Map the `Database` setting to a mode.
    ///
    /// Matching is exact: `"postgresql"` is rejected like any other unknown
    /// provider name.
    pub fn select(value: Option<&str>) -> AppResult<Self> {
        match value {
            None | Some("") => Ok(Self::Embedded),
            Some(Self::DISABLED) => Ok(Self::Disabled),
            Some(Self::POSTGRES) => Ok(Self::External),
            Some(other) => Err(AppError::configuration(format!(
                "Application does not support database type {}.",
                other
            ))),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Embedded => "SQLite",
            Self::External => "PostgreSQL",
        }
    }
}

impl std::fmt::Display for DatabaseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Settings handed to the PostgreSQL driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct KeywordSettings {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DriverSettings {
    /// `Key=Value;Key=Value` form
    Keyword(KeywordSettings),
    /// `postgres://` URL with application keys removed
    Url(String),
}

/// Validated configuration for the external provider.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Contains sensitive data - never log
    connection_string: String,
    /// Pooled connections reset their session state when released
    pub reset_on_return: bool,
    /// Connections join ambient distributed transactions
    pub enlist: bool,
    /// Keys not understood by this application
    pub ignored_keys: Vec<String>,
    driver: DriverSettings,
}

/// Keys consumed here rather than by the driver, in normalized form.
const RESET_ON_RETURN: &str = "resetonreturn";
const NO_RESET_ON_CLOSE: &str = "noresetonclose";
const ENLIST: &str = "enlist";

impl ConnectionConfig {
    /// Parse and validate a connection string for the external provider.
    pub fn validate(connection_string: &str) -> AppResult<Self> {
        if connection_string.trim().is_empty() {
            return Err(AppError::configuration(
                "Connection string must be specified for PostgreSql.",
            ));
        }

        let lower = connection_string.trim_start().to_ascii_lowercase();
        let (mut options, driver, ignored_keys) =
            if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
                Self::parse_url(connection_string.trim())?
            } else {
                Self::parse_keywords(connection_string)?
            };

        let reset_on_return = match (
            options.remove(RESET_ON_RETURN),
            options.remove(NO_RESET_ON_CLOSE),
        ) {
            (Some(reset), _) => parse_bool(RESET_ON_RETURN, &reset)?,
            (None, Some(no_reset)) => !parse_bool(NO_RESET_ON_CLOSE, &no_reset)?,
            (None, None) => false,
        };
        if !reset_on_return {
            return Err(AppError::configuration(
                "Reset On Return=true must be specified for PostgreSql.",
            ));
        }

        // Enlistment is on unless explicitly disabled.
        let enlist = match options.remove(ENLIST) {
            Some(value) => parse_bool(ENLIST, &value)?,
            None => true,
        };
        if enlist {
            return Err(AppError::configuration(
                "Enlist=false must be specified for PostgreSql.",
            ));
        }

        Ok(Self {
            connection_string: connection_string.to_string(),
            reset_on_return,
            enlist,
            ignored_keys,
            driver,
        })
    }

    /// The connection string exactly as configured.
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Build driver options from the validated settings.
    pub fn connect_options(&self) -> AppResult<PgConnectOptions> {
        match &self.driver {
            DriverSettings::Url(url) => PgConnectOptions::from_str(url).map_err(|e| {
                AppError::configuration(format!("Invalid PostgreSql connection string: {}", e))
            }),
            DriverSettings::Keyword(settings) => {
                let mut options = PgConnectOptions::new();
                if let Some(host) = &settings.host {
                    options = options.host(host);
                }
                if let Some(port) = settings.port {
                    options = options.port(port);
                }
                if let Some(username) = &settings.username {
                    options = options.username(username);
                }
                if let Some(password) = &settings.password {
                    options = options.password(password);
                }
                if let Some(database) = &settings.database {
                    options = options.database(database);
                }
                Ok(options)
            }
        }
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        match &self.driver {
            DriverSettings::Url(_) => match Url::parse(self.connection_string.trim()) {
                Ok(mut url) if url.password().is_some() => {
                    let _ = url.set_password(Some("****"));
                    url.to_string()
                }
                _ => self.connection_string.clone(),
            },
            DriverSettings::Keyword(_) => self
                .connection_string
                .split(';')
                .map(|pair| match pair.split_once('=') {
                    Some((key, _)) if matches!(normalize_key(key).as_str(), "password" | "pwd") => {
                        format!("{}=****", key)
                    }
                    _ => pair.to_string(),
                })
                .collect::<Vec<_>>()
                .join(";"),
        }
    }

    fn parse_keywords(
        s: &str,
    ) -> AppResult<(HashMap<String, String>, DriverSettings, Vec<String>)> {
        let mut options = HashMap::new();
        let mut settings = KeywordSettings::default();
        let mut ignored = Vec::new();

        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                AppError::configuration(format!(
                    "Invalid connection string segment '{}': expected Key=Value",
                    pair.split('=').next().unwrap_or_default()
                ))
            })?;
            let value = value.trim().to_string();
            match normalize_key(key).as_str() {
                "host" | "server" => settings.host = Some(value),
                "port" => {
                    let port = value.parse().map_err(|_| {
                        AppError::configuration(format!("Invalid port '{}'", value))
                    })?;
                    settings.port = Some(port);
                }
                "username" | "userid" | "user" | "uid" => settings.username = Some(value),
                "password" | "pwd" => settings.password = Some(value),
                "database" | "db" => settings.database = Some(value),
                k @ (RESET_ON_RETURN | NO_RESET_ON_CLOSE | ENLIST) => {
                    options.insert(k.to_string(), value);
                }
                _ => ignored.push(key.trim().to_string()),
            }
        }

        Ok((options, DriverSettings::Keyword(settings), ignored))
    }

    /// Extract application keys from URL query params, keeping others for the driver.
    fn parse_url(s: &str) -> AppResult<(HashMap<String, String>, DriverSettings, Vec<String>)> {
        let mut url = Url::parse(s).map_err(|e| {
            AppError::configuration(format!("Invalid PostgreSql connection URL: {e}"))
        })?;

        let mut options = HashMap::new();
        let remaining: Vec<(String, String)> = url
            .query_pairs()
            .filter_map(|(k, v)| {
                let key = normalize_key(&k);
                if matches!(key.as_str(), RESET_ON_RETURN | NO_RESET_ON_CLOSE | ENLIST) {
                    options.insert(key, v.into_owned());
                    None
                } else {
                    Some((k.into_owned(), v.into_owned()))
                }
            })
            .collect();

        if remaining.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(remaining);
        }

        Ok((options, DriverSettings::Url(url.to_string()), Vec::new()))
    }
}

/// Lowercase and drop spaces and underscores: "Reset On Return" == "reset_on_return".
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(AppError::configuration(format!(
            "Invalid boolean '{}' for connection string key '{}'",
            value, key
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str =
        "Host=db;Port=5432;Username=bench;Password=secret;Database=basic;Reset On Return=true;Enlist=false";

    #[test]
    fn test_select_modes() {
        assert_eq!(DatabaseMode::select(None).unwrap(), DatabaseMode::Embedded);
        assert_eq!(DatabaseMode::select(Some("")).unwrap(), DatabaseMode::Embedded);
        assert_eq!(
            DatabaseMode::select(Some("None")).unwrap(),
            DatabaseMode::Disabled
        );
        assert_eq!(
            DatabaseMode::select(Some("PostgreSql")).unwrap(),
            DatabaseMode::External
        );
    }

    #[test]
    fn test_select_rejects_unknown_provider() {
        for value in ["MySql", "postgresql", "none", "SqlServer", " "] {
            let err = DatabaseMode::select(Some(value)).unwrap_err();
            assert!(matches!(err, AppError::Configuration { .. }));
            assert!(err.to_string().contains(value), "message should name '{}'", value);
        }
    }

    #[test]
    fn test_validate_keyword_form() {
        let config = ConnectionConfig::validate(VALID).unwrap();
        assert!(config.reset_on_return);
        assert!(!config.enlist);
        assert_eq!(config.connection_string(), VALID);
        assert!(config.ignored_keys.is_empty());
        assert_eq!(
            config.driver,
            DriverSettings::Keyword(KeywordSettings {
                host: Some("db".into()),
                port: Some(5432),
                username: Some("bench".into()),
                password: Some("secret".into()),
                database: Some("basic".into()),
            })
        );
    }

    #[test]
    fn test_validate_empty() {
        assert!(matches!(
            ConnectionConfig::validate(""),
            Err(AppError::Configuration { .. })
        ));
        assert!(ConnectionConfig::validate("   ").is_err());
    }

    #[test]
    fn test_reset_on_return_required() {
        let missing = ConnectionConfig::validate("Host=db;Enlist=false").unwrap_err();
        assert!(missing.to_string().contains("Reset On Return"));

        let disabled =
            ConnectionConfig::validate("Host=db;Reset On Return=false;Enlist=false").unwrap_err();
        assert!(disabled.to_string().contains("Reset On Return"));
    }

    #[test]
    fn test_no_reset_on_close_is_negated() {
        assert!(ConnectionConfig::validate("Host=db;No Reset On Close=false;Enlist=false").is_ok());
        assert!(ConnectionConfig::validate("Host=db;No Reset On Close=true;Enlist=false").is_err());
    }

    #[test]
    fn test_enlist_must_be_disabled() {
        let absent = ConnectionConfig::validate("Host=db;Reset On Return=true").unwrap_err();
        assert!(absent.to_string().contains("Enlist=false"));

        let enabled =
            ConnectionConfig::validate("Host=db;Reset On Return=true;Enlist=true").unwrap_err();
        assert!(enabled.to_string().contains("Enlist=false"));
    }

    #[test]
    fn test_keys_case_and_spacing_insensitive() {
        assert!(ConnectionConfig::validate("host=db;RESET_ON_RETURN=TRUE;enlist=False").is_ok());
        assert!(ConnectionConfig::validate("Server=db;ResetOnReturn=true;Enlist=false").is_ok());
    }

    #[test]
    fn test_invalid_boolean_rejected() {
        let err = ConnectionConfig::validate("Host=db;Reset On Return=yes;Enlist=false").unwrap_err();
        assert!(err.to_string().contains("Invalid boolean"));
    }

    #[test]
    fn test_malformed_segment_rejected() {
        assert!(ConnectionConfig::validate("Host=db;garbage;Reset On Return=true;Enlist=false").is_err());
        assert!(ConnectionConfig::validate("Host=db;Port=abc;Reset On Return=true;Enlist=false").is_err());
    }

    #[test]
    fn test_unknown_keys_collected() {
        let config = ConnectionConfig::validate(
            "Host=db;Maximum Pool Size=1024;Reset On Return=true;Enlist=false",
        )
        .unwrap();
        assert_eq!(config.ignored_keys, vec!["Maximum Pool Size"]);
    }

    #[test]
    fn test_validate_url_form_strips_application_keys() {
        let raw = "postgres://bench:secret@db:5432/basic?sslmode=disable&reset_on_return=true&enlist=false";
        let config = ConnectionConfig::validate(raw).unwrap();
        assert_eq!(config.connection_string(), raw);
        match &config.driver {
            DriverSettings::Url(url) => {
                assert!(url.contains("sslmode=disable"));
                assert!(!url.contains("reset_on_return"));
                assert!(!url.contains("enlist"));
            }
            other => panic!("expected URL settings, got {other:?}"),
        }
        assert!(config.connect_options().is_ok());
    }

    #[test]
    fn test_url_form_enforces_same_rules() {
        assert!(ConnectionConfig::validate("postgres://db/basic?enlist=false").is_err());
        assert!(ConnectionConfig::validate("postgres://db/basic?reset_on_return=true").is_err());
    }

    #[test]
    fn test_masked_connection_string() {
        let config = ConnectionConfig::validate(VALID).unwrap();
        let masked = config.masked_connection_string();
        assert!(!masked.contains("secret"));
        assert!(masked.contains("Password=****"));

        let url = ConnectionConfig::validate(
            "postgres://bench:secret@db/basic?reset_on_return=true&enlist=false",
        )
        .unwrap();
        assert!(!url.masked_connection_string().contains("secret"));
    }
}
