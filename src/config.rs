//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::AdminToken;
use crate::error::ConfigError;

/// Reporting and pagination settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// Size of the top-N categorical breakdowns.
    pub top_n: usize,
    /// Admin list page size when the caller gives none.
    pub default_page_size: usize,
    /// Upper bound on a requested page size.
    pub max_page_size: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Server configuration, read from `EV_*` environment variables.
#[derive(Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    /// Tokens accepted on the admin surface. Empty closes it.
    pub admin_tokens: Vec<AdminToken>,
    pub reports: ReportConfig,
    /// Run the finish validation on `PUT` saves with `isComplete: true`.
    pub enforce_finish_validation: bool,
    /// Optional JSON file replacing the built-in pick-lists.
    pub reference_data: Option<PathBuf>,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Allowed CORS origins; `None` allows any.
    pub cors_origins: Option<Vec<String>>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = parse_or(&var, "EV_BIND_ADDR", "0.0.0.0:8080".parse().ok())?;
        let db_path = var("EV_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/ev-readiness.db"));

        let admin_tokens = match var("EV_ADMIN_TOKENS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|entry| {
                    AdminToken::parse(entry).map_err(|message| ConfigError::InvalidValue {
                        key: "EV_ADMIN_TOKENS".to_string(),
                        message,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let defaults = ReportConfig::default();
        let reports = ReportConfig {
            top_n: parse_or(&var, "EV_TOP_N", Some(defaults.top_n))?,
            default_page_size: parse_or(&var, "EV_PAGE_SIZE", Some(defaults.default_page_size))?,
            max_page_size: parse_or(&var, "EV_MAX_PAGE_SIZE", Some(defaults.max_page_size))?,
        };
        if reports.top_n == 0 || reports.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "EV_TOP_N/EV_PAGE_SIZE".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if reports.max_page_size < reports.default_page_size {
            return Err(ConfigError::InvalidValue {
                key: "EV_MAX_PAGE_SIZE".to_string(),
                message: format!(
                    "{} is below EV_PAGE_SIZE {}",
                    reports.max_page_size, reports.default_page_size
                ),
            });
        }

        let enforce_finish_validation = parse_or(&var, "EV_ENFORCE_FINISH_VALIDATION", Some(true))?;

        let cors_origins = var("EV_CORS_ORIGINS").and_then(|list| {
            let origins: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            (!origins.iter().any(|o| o == "*")).then_some(origins)
        });

        Ok(Self {
            bind_addr,
            db_path,
            admin_tokens,
            reports,
            enforce_finish_validation,
            reference_data: var("EV_REFERENCE_DATA").map(PathBuf::from),
            log_dir: var("EV_LOG_DIR").map(PathBuf::from),
            cors_origins,
        })
    }
}

/// Parse `key` if set, else fall back to `default`; unset with no default
/// is a missing variable.
fn parse_or<T, V>(var: &V, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => default.ok_or_else(|| ConfigError::MissingEnvVar(key.to_string())),
    }
}
