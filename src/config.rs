use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub parser: ParserRules,
    pub source: SourceRules,
}

/// How a listing is laid out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserRules {
    /// Prefix of the line that starts a set; the rest of the line is its name
    pub name_marker: String,
    /// Line that closes the header region
    pub members_marker: String,
    /// Header key whose value is a list of flag tokens
    pub flag_header_key: String,
    /// Header key holding the set's memory footprint
    pub memory_key: String,
    pub header_valueless_flags: Vec<String>,
    pub member_valueless_flags: Vec<String>,
}

impl Default for ParserRules {
    fn default() -> Self {
        Self {
            name_marker: "Name:".to_string(),
            members_marker: "Members:".to_string(),
            flag_header_key: "Header".to_string(),
            memory_key: "Size in memory".to_string(),
            header_valueless_flags: vec![
                "counters".to_string(),
                "comment".to_string(),
                "skbinfo".to_string(),
                "forceadd".to_string(),
            ],
            member_valueless_flags: vec!["nomatch".to_string()],
        }
    }
}

/// How listings are obtained from the set-management tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRules {
    pub command: String,
    /// Deadline for reading one set's listing
    pub timeout_secs: u64,
}

impl Default for SourceRules {
    fn default() -> Self {
        Self {
            command: "ipset".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SourceRules {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<ToolConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<ToolConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<ToolConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

pub fn default_config() -> &'static ToolConfig {
    static DEFAULT_CONFIG: LazyLock<ToolConfig> = LazyLock::new(ToolConfig::default);
    &DEFAULT_CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg: ToolConfig = toml::from_str(
            r#"
            [parser]
            members_marker = "Entries:"

            [source]
            timeout_secs = 3
            "#,
        )
        .unwrap();

        assert_eq!(cfg.parser.members_marker, "Entries:");
        assert_eq!(cfg.parser.name_marker, "Name:");
        assert_eq!(cfg.source.command, "ipset");
        assert_eq!(cfg.source.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config(Some(Path::new("/nonexistent/ipset-filter.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
