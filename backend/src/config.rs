//! Settings from the environment (and `.env`, when present).
//!
//! | Variable                    | Default            |
//! |-----------------------------|--------------------|
//! | `SHAREPOINT_SITE_HOSTNAME`  | required for Graph |
//! | `SHAREPOINT_SITE_PATH`      | required for Graph |
//! | `SHAREPOINT_FILE_PATH`      | required for Graph |
//! | `GRAPH_ACCESS_TOKEN`        | required for Graph |
//! | `GRAPH_TIMEOUT_SECS`        | `60`               |
//! | `SHAREPOINT_TABLE_UNITS`    | `table_name`       |
//! | `SHAREPOINT_TABLE_HISTORY`  | `table_name_hist`  |
//! | `PEITRACK_SCHEMA`           | built-in aliases   |
//! | `PEITRACK_UPDATED_BY`       | `peitrack`         |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_UNITS_TABLE: &str = "table_name";
const DEFAULT_HISTORY_TABLE: &str = "table_name_hist";
const DEFAULT_UPDATED_BY: &str = "peitrack";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Names of the two tables in the workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Executing units directory.
    pub units: String,
    /// Technical-report history, the table records are written to.
    pub history: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            units: DEFAULT_UNITS_TABLE.to_string(),
            history: DEFAULT_HISTORY_TABLE.to_string(),
        }
    }
}

/// Location of the workbook and the token to reach it.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub site_hostname: String,
    pub site_path: String,
    pub file_path: String,
    pub access_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub tables: TableNames,
    pub schema_path: Option<PathBuf>,
    pub updated_by: String,
    pub timeout: Duration,
    site_hostname: Option<String>,
    site_path: Option<String>,
    file_path: Option<String>,
    access_token: Option<String>,
}

impl Settings {
    /// Load `.env` if there is one, then read the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timeout = match get("GRAPH_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidVar {
                    name: "GRAPH_TIMEOUT_SECS".to_string(),
                    message: format!("expected a whole number of seconds, got '{raw}'"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidVar {
                        name: "GRAPH_TIMEOUT_SECS".to_string(),
                        message: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let site_path = get("SHAREPOINT_SITE_PATH").map(|p| leading_slash(&p));
        let file_path = get("SHAREPOINT_FILE_PATH").map(|p| leading_slash(&p));

        Ok(Self {
            tables: TableNames {
                units: get("SHAREPOINT_TABLE_UNITS").unwrap_or_else(|| DEFAULT_UNITS_TABLE.to_string()),
                history: get("SHAREPOINT_TABLE_HISTORY").unwrap_or_else(|| DEFAULT_HISTORY_TABLE.to_string()),
            },
            schema_path: get("PEITRACK_SCHEMA").map(PathBuf::from),
            updated_by: get("PEITRACK_UPDATED_BY").unwrap_or_else(|| DEFAULT_UPDATED_BY.to_string()),
            timeout,
            site_hostname: get("SHAREPOINT_SITE_HOSTNAME"),
            site_path,
            file_path,
            access_token: get("GRAPH_ACCESS_TOKEN"),
        })
    }

    /// Graph settings; fails on the first required variable that is unset.
    pub fn graph(&self) -> ConfigResult<GraphSettings> {
        fn required(value: &Option<String>, name: &str) -> ConfigResult<String> {
            value.clone().ok_or_else(|| ConfigError::MissingVar(name.to_string()))
        }

        Ok(GraphSettings {
            site_hostname: required(&self.site_hostname, "SHAREPOINT_SITE_HOSTNAME")?,
            site_path: required(&self.site_path, "SHAREPOINT_SITE_PATH")?,
            file_path: required(&self.file_path, "SHAREPOINT_FILE_PATH")?,
            access_token: required(&self.access_token, "GRAPH_ACCESS_TOKEN")?,
            timeout: self.timeout,
        })
    }
}

fn leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
