// Licensed under the Apache-2.0 license

//! Generator configuration.
//!
//! [`GeneratorConfig`] selects the output formats and the directories used
//! by the render step. It can be built in code or loaded from a TOML file:
//!
//! ```
//! use registers_context::config::GeneratorConfig;
//! use registers_context::OutputFormat;
//!
//! let config = GeneratorConfig::from_toml_str(
//!     r#"
//! formats = ["vhdl", "h"]
//! out_dir = "build/regs"
//! "#,
//! )
//! .unwrap()
//! .add_format(OutputFormat::Map);
//! assert_eq!(config.formats.len(), 3);
//! assert_eq!(config.separator, ".");
//! ```

use crate::error::{ContextError, ContextResult};
use crate::render::OutputFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Output formats to generate, in request order.
    pub formats: Vec<OutputFormat>,

    /// Root of the generated tree; each format gets its own subdirectory.
    pub out_dir: PathBuf,

    /// Per-format template sets (`<templates_dir>/<format>/include.txt`).
    pub templates_dir: PathBuf,

    /// Per-format library sets rendered once for the whole design.
    pub libraries_dir: PathBuf,

    /// Joins path segments in `path` and `path_notop`.
    pub separator: String,

    /// Worker threads used to render per-map formats.
    pub jobs: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            formats: Vec::new(),
            out_dir: PathBuf::from("./"),
            templates_dir: PathBuf::from("templates"),
            libraries_dir: PathBuf::from("libraries"),
            separator: ".".to_string(),
            jobs: 1,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(input: &str) -> ContextResult<Self> {
        toml::from_str(input).map_err(|e| ContextError::Configuration(e.to_string()))
    }

    pub fn from_file(path: &Path) -> ContextResult<Self> {
        let input = std::fs::read_to_string(path).map_err(|e| ContextError::io(path, e))?;
        Self::from_toml_str(&input)
    }

    /// Add a format; requesting the same format twice has no effect.
    pub fn add_format(mut self, format: OutputFormat) -> Self {
        if !self.formats.contains(&format) {
            self.formats.push(format);
        }
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = dir.into();
        self
    }

    pub fn libraries_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.libraries_dir = dir.into();
        self
    }

    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn validate(&self) -> ContextResult<()> {
        if self.formats.is_empty() {
            return Err(ContextError::Configuration(
                "no output format selected".to_string(),
            ));
        }
        if self.jobs == 0 {
            return Err(ContextError::Configuration(
                "jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::new();
        assert!(config.formats.is_empty());
        assert_eq!(config.out_dir, PathBuf::from("./"));
        assert_eq!(config.jobs, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder() {
        let config = GeneratorConfig::new()
            .add_format(OutputFormat::Vhdl)
            .add_format(OutputFormat::Vhdl)
            .add_format(OutputFormat::Adoc)
            .out_dir("out")
            .separator("_")
            .jobs(4);
        assert_eq!(config.formats, vec![OutputFormat::Vhdl, OutputFormat::Adoc]);
        assert!(config.wants(OutputFormat::Adoc));
        assert!(!config.wants(OutputFormat::Tcl));
        assert_eq!(config.separator, "_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        assert!(GeneratorConfig::from_toml_str("colour = \"red\"").is_err());
        assert!(GeneratorConfig::from_toml_str("formats = [\"pdf\"]").is_err());
    }

    #[test]
    fn test_zero_jobs() {
        let config = GeneratorConfig::new().add_format(OutputFormat::H).jobs(0);
        assert!(config.validate().is_err());
    }
}
