//! Process configuration for the catalog CLI.
//!
//! # Responsibility
//! - Resolve the database path and logging settings from flags and env.
//! - Turn `--user` / `--grant` into the request context every command runs under.
//!
//! # Invariants
//! - Empty or whitespace-only overrides fall back to defaults.
//! - Unknown grant codenames are rejected before any database work.

use catalog_core::{parse_capability, Capability, RequestContext, UserId};
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "CATALOG_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "CATALOG_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "CATALOG_LOG_DIR";
pub const USER_ENV: &str = "CATALOG_USER_ID";
pub const GRANTS_ENV: &str = "CATALOG_GRANTS";
const DB_FILE_NAME: &str = "library_catalog.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub user: Option<UserId>,
    pub grants: Vec<Capability>,
}

impl CliConfig {
    /// Builds the config from already-parsed global flags.
    ///
    /// # Errors
    /// Returns a message naming the first grant codename that does not parse.
    pub fn resolve(
        db: Option<&str>,
        log_level: &str,
        log_dir: Option<&str>,
        user: Option<UserId>,
        grants: &[String],
    ) -> Result<Self, String> {
        let grants = grants
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_capability(raw).map_err(|err| format!("invalid --grant: {err}")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            db_path: resolve_db_path(db),
            log_level: log_level.trim().to_string(),
            log_dir: non_blank(log_dir).map(PathBuf::from),
            user,
            grants,
        })
    }

    /// Identity and permissions the current invocation acts with.
    pub fn request_context(&self) -> RequestContext {
        let ctx = match self.user {
            Some(user) => RequestContext::for_user(user),
            None => RequestContext::anonymous(),
        };
        ctx.with_capabilities(self.grants.iter().copied())
    }
}

pub fn resolve_db_path(raw: Option<&str>) -> PathBuf {
    match non_blank(raw) {
        Some(path) => PathBuf::from(path),
        None => std::env::temp_dir().join(DB_FILE_NAME),
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{resolve_db_path, CliConfig, DB_FILE_NAME};
    use catalog_core::Capability;
    use std::path::PathBuf;

    #[test]
    fn blank_db_path_falls_back_to_temp_dir() {
        let expected = std::env::temp_dir().join(DB_FILE_NAME);
        assert_eq!(resolve_db_path(None), expected);
        assert_eq!(resolve_db_path(Some("   ")), expected);
        assert_eq!(
            resolve_db_path(Some(" /data/catalog.db ")),
            PathBuf::from("/data/catalog.db")
        );
    }

    #[test]
    fn grants_are_parsed_and_attached_to_context() {
        let config = CliConfig::resolve(
            None,
            "info",
            Some(""),
            Some(4),
            &["can_mark_returned".to_string(), "catalog.add_book".to_string()],
        )
        .unwrap();
        assert_eq!(config.log_dir, None);
        assert_eq!(
            config.grants,
            vec![Capability::CanMarkReturned, Capability::AddBook]
        );

        let ctx = config.request_context();
        assert_eq!(ctx.user(), Some(4));
        assert!(ctx.has(Capability::AddBook));
        assert!(!ctx.has(Capability::DeleteBook));
    }

    #[test]
    fn unknown_grant_is_rejected() {
        let err = CliConfig::resolve(None, "info", None, None, &["fly".to_string()]).unwrap_err();
        assert!(err.contains("--grant"));
    }

    #[test]
    fn missing_user_yields_anonymous_context() {
        let config = CliConfig::resolve(None, "info", None, None, &[]).unwrap();
        assert_eq!(config.request_context().user(), None);
    }
}
