//! Built-in placeholder namespaces: `env`, `git`, `date`, `project`.
//!
//! The remaining reserved namespaces (`secret`, `resource`, `dependency`,
//! `auth`) are provided by the crates that own their backing state and
//! registered into the same [`ExtensionRegistry`](crate::ExtensionRegistry).

use std::path::PathBuf;
use std::process::Command;

use chrono::Utc;
use tracing::debug;

use crate::error::TemplateResult;
use crate::registry::{bag_keys, bag_str, DataBag, Extension};
use crate::token::Token;

/// `${env:NAME[:default]}` — process environment variable lookup.
pub struct EnvExtension;

impl Extension for EnvExtension {
    fn namespace(&self) -> &str {
        "env"
    }

    fn resolve(&self, token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
        token.require_segments(1)?;
        match std::env::var(&token.path[0]) {
            Ok(value) => Ok(Some(value)),
            Err(_) => match &token.default {
                Some(default) => Ok(Some(default.clone())),
                None => Err(token.unresolved()),
            },
        }
    }
}

/// `${git:...}` — repository metadata.
///
/// Supported paths: `root`, `commit.short`, `commit.full`, `branch.raw`,
/// `branch.clean`. Commands run in the data bag's project directory when
/// set, otherwise the process working directory.
pub struct GitExtension;

impl Extension for GitExtension {
    fn namespace(&self) -> &str {
        "git"
    }

    fn resolve(&self, token: &Token, bag: &DataBag) -> TemplateResult<Option<String>> {
        let dir = working_dir(bag);
        let result = match token.segments().as_slice() {
            ["root"] => git_output(&dir, &["rev-parse", "--show-toplevel"]),
            ["commit", "short"] => git_output(&dir, &["rev-parse", "--short", "HEAD"]),
            ["commit", "full"] => git_output(&dir, &["rev-parse", "HEAD"]),
            ["branch", "raw"] => git_output(&dir, &["rev-parse", "--abbrev-ref", "HEAD"]),
            ["branch", "clean"] => {
                git_output(&dir, &["rev-parse", "--abbrev-ref", "HEAD"]).map(|b| clean_ref(&b))
            }
            _ => {
                return Err(token.extension_error(format!(
                    "unknown git path '{}' (expected root, commit.short, commit.full, \
                     branch.raw or branch.clean)",
                    token.path.join(".")
                )))
            }
        };

        match result {
            Some(value) => Ok(Some(value)),
            None => match &token.default {
                Some(default) => Ok(Some(default.clone())),
                None => Err(token.extension_error("not inside a git repository")),
            },
        }
    }
}

/// `${date:FORMAT}` — current UTC time.
///
/// Formats: `iso` (RFC 3339, the default), `unix`, `ymd`, `full`.
pub struct DateExtension;

impl Extension for DateExtension {
    fn namespace(&self) -> &str {
        "date"
    }

    fn resolve(&self, token: &Token, _bag: &DataBag) -> TemplateResult<Option<String>> {
        let now = Utc::now();
        let format = token.path.first().map(|s| s.as_str()).unwrap_or("iso");
        let value = match format {
            "iso" => now.to_rfc3339(),
            "unix" => now.timestamp().to_string(),
            "ymd" => now.format("%Y%m%d").to_string(),
            "full" => now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            other => {
                return Err(
                    token.extension_error(format!("unknown date format '{other}'"))
                )
            }
        };
        Ok(Some(value))
    }
}

/// `${project:root}` — project root directory, git-aware.
///
/// Prefers the git toplevel when the project directory is inside a
/// repository, otherwise falls back to the configured project directory.
pub struct ProjectExtension;

impl Extension for ProjectExtension {
    fn namespace(&self) -> &str {
        "project"
    }

    fn resolve(&self, token: &Token, bag: &DataBag) -> TemplateResult<Option<String>> {
        token.require_segments(1)?;
        if token.path[0] != "root" {
            return Err(token.extension_error(format!(
                "unknown project path '{}' (expected root)",
                token.path[0]
            )));
        }

        let dir = working_dir(bag);
        if let Some(toplevel) = git_output(&dir, &["rev-parse", "--show-toplevel"]) {
            return Ok(Some(toplevel));
        }
        debug!("Not a git repository, using project directory as root");
        Ok(Some(dir.display().to_string()))
    }
}

/// Register all generic built-in extensions.
pub fn register_builtins(registry: &mut crate::registry::ExtensionRegistry) {
    registry.register(std::sync::Arc::new(EnvExtension));
    registry.register(std::sync::Arc::new(GitExtension));
    registry.register(std::sync::Arc::new(DateExtension));
    registry.register(std::sync::Arc::new(ProjectExtension));
}

fn working_dir(bag: &DataBag) -> PathBuf {
    bag_str(bag, bag_keys::PROJECT_DIR)
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn git_output(dir: &PathBuf, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Lowercase and replace anything outside `[a-z0-9]` with `-`, collapsing
/// runs; suitable for image tags and DNS labels.
fn clean_ref(branch: &str) -> String {
    let mut cleaned = String::with_capacity(branch.len());
    let mut last_dash = false;
    for c in branch.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
            last_dash = false;
        } else if !last_dash {
            cleaned.push('-');
            last_dash = true;
        }
    }
    cleaned.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::resolve;
    use crate::registry::ExtensionRegistry;
    use crate::TemplateError;

    fn builtin_registry() -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::new();
        register_builtins(&mut registry);
        registry
    }

    #[test]
    fn env_extension_reads_process_environment() {
        std::env::set_var("STRATO_TEST_ENV_VAR", "from-env");
        let out = resolve(
            "${env:STRATO_TEST_ENV_VAR}",
            &DataBag::new(),
            &builtin_registry(),
        )
        .unwrap();
        assert_eq!(out, "from-env");
        std::env::remove_var("STRATO_TEST_ENV_VAR");
    }

    #[test]
    fn env_extension_falls_back_to_default() {
        let out = resolve(
            "${env:STRATO_DEFINITELY_UNSET:fallback}",
            &DataBag::new(),
            &builtin_registry(),
        )
        .unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn env_extension_errors_without_default() {
        let err = resolve(
            "${env:STRATO_DEFINITELY_UNSET}",
            &DataBag::new(),
            &builtin_registry(),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::UnresolvedPlaceholder { .. }));
    }

    #[test]
    fn date_extension_formats() {
        let registry = builtin_registry();
        let bag = DataBag::new();

        let ymd = resolve("${date:ymd}", &bag, &registry).unwrap();
        assert_eq!(ymd.len(), 8);
        assert!(ymd.chars().all(|c| c.is_ascii_digit()));

        let unix = resolve("${date:unix}", &bag, &registry).unwrap();
        assert!(unix.parse::<i64>().unwrap() > 1_500_000_000);

        let err = resolve("${date:weird}", &bag, &registry).unwrap_err();
        assert!(matches!(err, TemplateError::Extension { .. }));
    }

    #[test]
    fn git_extension_outside_repo_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = DataBag::new();
        bag.insert(
            bag_keys::PROJECT_DIR.to_string(),
            serde_json::Value::String(dir.path().display().to_string()),
        );

        let out = resolve("${git:commit.short:nogit}", &bag, &builtin_registry()).unwrap();
        assert_eq!(out, "nogit");
    }

    #[test]
    fn project_root_outside_repo_is_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = DataBag::new();
        bag.insert(
            bag_keys::PROJECT_DIR.to_string(),
            serde_json::Value::String(dir.path().display().to_string()),
        );

        let out = resolve("${project:root}", &bag, &builtin_registry()).unwrap();
        assert_eq!(out, dir.path().display().to_string());
    }

    #[test]
    fn clean_ref_sanitizes_branch_names() {
        assert_eq!(clean_ref("feature/ABC-123_new"), "feature-abc-123-new");
        assert_eq!(clean_ref("main"), "main");
        assert_eq!(clean_ref("--weird--"), "weird");
    }
}
