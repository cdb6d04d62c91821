// src/config/properties.rs

//! `project.properties`: per-project metadata in `key = value` form.
//!
//! ```text
//! # comments start with # or !
//! name = shop
//! version = 1.4.0
//! context-path = /api/shop
//! hot-reload = true
//! expose-load-errors = yes
//! unload-on-delete = false
//! ```
//!
//! `:` is accepted in place of `=`. Unknown keys are logged and ignored.

use tracing::warn;

use crate::errors::{HotrouteError, Result};
use crate::types::{parse_flag, ProjectFlags};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectProperties {
    pub name: Option<String>,
    pub version: Option<String>,
    pub context_path: Option<String>,
    pub hot_reload: Option<bool>,
    pub expose_load_errors: Option<bool>,
    pub unload_on_delete: Option<bool>,
}

pub fn parse_properties(text: &str) -> Result<ProjectProperties> {
    let mut props = ProjectProperties::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let Some(split) = line.find(&['=', ':'][..]) else {
            return Err(HotrouteError::ConfigError(format!(
                "project.properties line {}: expected `key = value`",
                idx + 1
            )));
        };
        let key = line[..split].trim();
        let value = line[split + 1..].trim();

        let flag = |value: &str| {
            parse_flag(value).ok_or_else(|| {
                HotrouteError::ConfigError(format!(
                    "project.properties line {}: `{key}` expects a boolean, got `{value}`",
                    idx + 1
                ))
            })
        };

        match key {
            "name" => props.name = non_empty(value),
            "version" => props.version = non_empty(value),
            "context-path" => props.context_path = Some(normalize_context_path(value)),
            "hot-reload" => props.hot_reload = Some(flag(value)?),
            "expose-load-errors" => props.expose_load_errors = Some(flag(value)?),
            "unload-on-delete" => props.unload_on_delete = Some(flag(value)?),
            other => warn!(key = %other, line = idx + 1, "ignoring unknown project property"),
        }
    }

    Ok(props)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Leading slash, no trailing slash; the root context is `/`.
pub fn normalize_context_path(value: &str) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl ProjectProperties {
    /// Project flags with unset keys taken from the host `defaults`.
    pub fn flags(&self, defaults: ProjectFlags) -> ProjectFlags {
        ProjectFlags {
            hot_reload: self.hot_reload.unwrap_or(defaults.hot_reload),
            expose_load_errors: self.expose_load_errors.unwrap_or(defaults.expose_load_errors),
            unload_on_delete: self.unload_on_delete.unwrap_or(defaults.unload_on_delete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_comments_and_separators() {
        let props = parse_properties(
            "# shop\n! legacy comment\nname = shop\nversion: 1.4.0\ncontext-path = api/shop/\nexpose-load-errors = yes\nfoo = bar\n",
        )
        .unwrap();
        assert_eq!(props.name.as_deref(), Some("shop"));
        assert_eq!(props.version.as_deref(), Some("1.4.0"));
        assert_eq!(props.context_path.as_deref(), Some("/api/shop"));
        assert_eq!(props.expose_load_errors, Some(true));
        assert_eq!(props.hot_reload, None);
    }

    #[test]
    fn unset_flags_fall_back_to_host_defaults() {
        let props = parse_properties("unload-on-delete = off\n").unwrap();
        let flags = props.flags(ProjectFlags::default());
        assert!(flags.hot_reload);
        assert!(!flags.expose_load_errors);
        assert!(!flags.unload_on_delete);
    }

    #[test]
    fn bad_lines_are_config_errors() {
        assert!(matches!(
            parse_properties("hot-reload = maybe\n"),
            Err(HotrouteError::ConfigError(_))
        ));
        assert!(parse_properties("just words\n").is_err());
    }

    #[test]
    fn context_paths_are_normalized() {
        assert_eq!(normalize_context_path("/"), "/");
        assert_eq!(normalize_context_path(""), "/");
        assert_eq!(normalize_context_path("/shop/"), "/shop");
    }
}
