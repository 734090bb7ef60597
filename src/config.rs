use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Workspace opened at startup; clients may still `workspace.select`.
    pub workspace: Option<PathBuf>,
    /// Courses must name a department.
    pub require_course_department: bool,
    pub log_format: LogFormat,
}

/// The part of [`Config`] the lifecycle manager consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreConfig {
    pub require_course_department: bool,
}

impl Config {
    /// `SCHOOLD_CONFIG` file first, then `SCHOOLD_*` environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var("SCHOOLD_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::load_from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid config {}", path.to_string_lossy()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(ws) = lookup("SCHOOLD_WORKSPACE") {
            self.workspace = Some(PathBuf::from(ws));
        }
        if let Some(raw) = lookup("SCHOOLD_REQUIRE_COURSE_DEPARTMENT") {
            self.require_course_department = parse_flag(&raw)
                .with_context(|| "SCHOOLD_REQUIRE_COURSE_DEPARTMENT".to_string())?;
        }
        if let Some(raw) = lookup("SCHOOLD_LOG_FORMAT") {
            self.log_format = match raw.trim().to_ascii_lowercase().as_str() {
                "" | "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                other => return Err(anyhow!("SCHOOLD_LOG_FORMAT: unknown format {:?}", other)),
            };
        }
        Ok(())
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        if let Some(ws) = &self.workspace {
            let trimmed = ws.to_string_lossy().trim().to_string();
            if trimmed.is_empty() {
                return Err(anyhow!("workspace path is empty"));
            }
            self.workspace = Some(PathBuf::from(trimmed));
        }
        Ok(())
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            require_course_department: self.require_course_department,
        }
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_permissive() {
        let cfg = Config::default();
        assert_eq!(cfg.workspace, None);
        assert!(!cfg.store().require_course_department);
        assert_eq!(cfg.log_format, LogFormat::Compact);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg: Config =
            serde_json::from_str(r#"{ "workspace": "/srv/a", "logFormat": "json" }"#)
                .expect("parse");
        cfg.apply_env(env(&[
            ("SCHOOLD_WORKSPACE", " /srv/b "),
            ("SCHOOLD_REQUIRE_COURSE_DEPARTMENT", "Yes"),
        ]))
        .expect("apply");
        cfg.normalize_and_validate().expect("valid");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/srv/b")));
        assert!(cfg.require_course_department);
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut cfg = Config::default();
        assert!(cfg
            .apply_env(env(&[("SCHOOLD_REQUIRE_COURSE_DEPARTMENT", "maybe")]))
            .is_err());
        assert!(cfg
            .apply_env(env(&[("SCHOOLD_LOG_FORMAT", "xml")]))
            .is_err());

        let mut cfg = Config::default();
        cfg.apply_env(env(&[("SCHOOLD_WORKSPACE", "   ")]))
            .expect("apply");
        assert!(cfg.normalize_and_validate().is_err());
    }
}
