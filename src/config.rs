use crate::{codec::patterns::PatternConfig, error::SsmError};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::Path,
};

/// Namespaces whose first segment exempts a compile from redaction.
pub const DEFAULT_EXEMPT_NAMESPACES: &[&str] = &["internal", "dev", "test"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub exempt_namespaces: Vec<String>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        RedactionConfig {
            enabled: true,
            exempt_namespaces: DEFAULT_EXEMPT_NAMESPACES
                .iter()
                .map(|ns| ns.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run extractors on scoped worker threads
    pub parallel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Pass names to leave out of the standard pipeline
    pub disabled: Vec<String>,
}

/// Everything a [`DocumentCompiler`](crate::codec::DocumentCompiler) can be tuned with.
///
/// Missing sections and fields fall back to their defaults, so an empty file is a valid
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub patterns: PatternConfig,
    pub redaction: RedactionConfig,
    pub extraction: ExtractionConfig,
    pub enrichment: EnrichmentConfig,
}

impl CompilerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SsmError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SsmError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load from a `.toml`, `.yaml` or `.yml` file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SsmError> {
        let path = path.as_ref();
        tracing::debug!("Reading compiler config from {:?}", path);
        let content = read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(SsmError::Config(format!(
                "unsupported config format {other:?} for {path:?}; expected toml or yaml"
            ))),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, SsmError> {
        Ok(toml::to_string(self)?)
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SsmError> {
        tracing::debug!("Writing compiler config to {:?}", path.as_ref());
        write(path, self.to_toml_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(
            CompilerConfig::from_toml_str("").unwrap(),
            CompilerConfig::default()
        );
    }

    #[test]
    fn test_partial_sections() {
        let config = CompilerConfig::from_toml_str(
            r#"
            [extraction]
            parallel = true

            [enrichment]
            disabled = ["test_cases"]
            "#,
        )
        .unwrap();
        assert!(config.extraction.parallel);
        assert_eq!(config.enrichment.disabled, vec!["test_cases"]);
        assert!(config.redaction.enabled);
        assert_eq!(config.patterns, PatternConfig::default());
    }

    #[test]
    fn test_yaml() {
        let config = CompilerConfig::from_yaml_str(
            "redaction:\n  enabled: false\npatterns:\n  chapter_heading_max_level: 1\n",
        )
        .unwrap();
        assert!(!config.redaction.enabled);
        assert_eq!(config.patterns.chapter_heading_max_level, 1);
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("ssm.toml");
        let mut config = CompilerConfig::default();
        config.extraction.parallel = true;
        config.write_to(&toml_path).unwrap();
        assert_eq!(CompilerConfig::from_path(&toml_path).unwrap(), config);

        let yaml_path = dir.path().join("ssm.yml");
        std::fs::write(&yaml_path, "extraction:\n  parallel: true\n").unwrap();
        assert!(CompilerConfig::from_path(&yaml_path).unwrap().extraction.parallel);

        let other = dir.path().join("ssm.ini");
        std::fs::write(&other, "").unwrap();
        assert!(matches!(
            CompilerConfig::from_path(&other),
            Err(SsmError::Config(_))
        ));
        assert!(matches!(
            CompilerConfig::from_path(dir.path().join("missing.toml")),
            Err(SsmError::NotFound(_))
        ));
    }
}
