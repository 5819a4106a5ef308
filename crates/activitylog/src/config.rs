//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::format::{Item, StrftimeItems};

use crate::auth::OracleFailurePolicy;
use crate::query::{SortColumn, SortDirection};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "ACTIVITYLOG_";

/// Activity log configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Admin panel identifier used in resource URLs (default: "admin").
    pub panel_id: String,

    /// Hide the field restore action (default: false).
    pub restore_action_hidden: bool,

    /// Disable restoring soft-deleted subjects (default: false).
    pub restore_model_action_hidden: bool,

    /// Hide the "view resource" action (default: false).
    pub resource_action_hidden: bool,

    /// Decision when the authorization oracle fails (default: open).
    pub authorization_failure: OracleFailurePolicy,

    /// Default listing sort column (default: created_at).
    pub default_sort_column: SortColumn,

    /// Default listing sort direction (default: desc).
    pub default_sort_direction: SortDirection,

    /// chrono format string for timestamps.
    pub datetime_format: String,

    /// chrono format string for dates in filters.
    pub date_format: String,

    /// Show the entry count as a navigation badge (default: false).
    pub navigation_count_badge: bool,

    /// JSON state file used by the CLI (default: ./activitylog.json).
    pub state_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            panel_id: "admin".to_string(),
            restore_action_hidden: false,
            restore_model_action_hidden: false,
            resource_action_hidden: false,
            authorization_failure: OracleFailurePolicy::FailOpen,
            default_sort_column: SortColumn::CreatedAt,
            default_sort_direction: SortDirection::Desc,
            datetime_format: "%b %-d, %Y %H:%M:%S".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            navigation_count_badge: false,
            state_file: PathBuf::from("./activitylog.json"),
        }
    }
}

impl Config {
    /// Load configuration from `ACTIVITYLOG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    /// Load configuration through `lookup`, which receives unprefixed keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let panel_id = lookup("PANEL_ID").unwrap_or(defaults.panel_id);
        if panel_id.trim().is_empty() {
            bail!("{ENV_PREFIX}PANEL_ID must not be empty");
        }

        let restore_action_hidden = flag(&lookup, "RESTORE_ACTION_HIDDEN")?;
        let restore_model_action_hidden = flag(&lookup, "RESTORE_MODEL_ACTION_HIDDEN")?;
        let resource_action_hidden = flag(&lookup, "RESOURCE_ACTION_HIDDEN")?;
        let navigation_count_badge = flag(&lookup, "NAVIGATION_COUNT_BADGE")?;

        let authorization_failure = match lookup("AUTHZ_FAILURE") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("{ENV_PREFIX}AUTHZ_FAILURE must be open or closed"))?,
            None => defaults.authorization_failure,
        };

        let default_sort_column = match lookup("DEFAULT_SORT_COLUMN") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("{ENV_PREFIX}DEFAULT_SORT_COLUMN is invalid"))?,
            None => defaults.default_sort_column,
        };

        let default_sort_direction = match lookup("DEFAULT_SORT_DIRECTION") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("{ENV_PREFIX}DEFAULT_SORT_DIRECTION must be asc or desc"))?,
            None => defaults.default_sort_direction,
        };

        let datetime_format = lookup("DATETIME_FORMAT").unwrap_or(defaults.datetime_format);
        check_format("DATETIME_FORMAT", &datetime_format)?;
        let date_format = lookup("DATE_FORMAT").unwrap_or(defaults.date_format);
        check_format("DATE_FORMAT", &date_format)?;

        let state_file = lookup("STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        Ok(Self {
            panel_id,
            restore_action_hidden,
            restore_model_action_hidden,
            resource_action_hidden,
            authorization_failure,
            default_sort_column,
            default_sort_direction,
            datetime_format,
            date_format,
            navigation_count_badge,
            state_file,
        })
    }
}

/// Reject strftime strings chrono cannot render.
fn check_format(key: &str, format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        bail!("{ENV_PREFIX}{key} is not a valid format string: '{format}'");
    }
    Ok(())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    let Some(raw) = lookup(key) else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("{ENV_PREFIX}{key} must be a boolean, got '{other}'"),
    }
}
