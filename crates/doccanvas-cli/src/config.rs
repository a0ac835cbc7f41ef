//! CLI settings
//!
//! Loaded from `doccanvas.toml` in the working directory, or from the file
//! passed with `--config`:
//!
//! ```toml
//! [extract]
//! include_headers_footers = false
//!
//! [pdf]
//! program = "flatpak"
//! args = ["run", "org.libreoffice.LibreOffice"]
//! timeout_secs = 60
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use doccanvas_ooxml::ExtractOptions;
use doccanvas_pdf::{PdfConverter, DEFAULT_PROGRAM, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};

/// Config files probed when `--config` is not given
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["doccanvas.toml", ".doccanvas.toml"];

/// Top-level settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub extract: ExtractSettings,
    pub pdf: PdfSettings,
}

impl Settings {
    /// Parse settings from a TOML string
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Load settings from `path`, or from a default config file if present
    ///
    /// An explicit path must exist. Without one, missing defaults fall back to
    /// built-in settings but a default file that fails to parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::read(path),
            None => {
                for candidate in DEFAULT_CONFIG_FILES {
                    let candidate = Path::new(candidate);
                    if candidate.is_file() {
                        return Self::read(candidate);
                    }
                }
                Ok(Self::default())
            }
        }
    }

    fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let settings = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }
}

/// Block extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractSettings {
    /// Include header and footer parts after the body
    pub include_headers_footers: bool,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            include_headers_footers: true,
        }
    }
}

impl ExtractSettings {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            include_headers_footers: self.include_headers_footers,
        }
    }
}

/// External PDF converter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSettings {
    /// Converter executable
    pub program: String,
    /// Arguments placed before the conversion arguments
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl PdfSettings {
    pub fn converter(&self) -> PdfConverter {
        PdfConverter::new()
            .with_program(&self.program)
            .with_leading_args(&self.args)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.extract.include_headers_footers);
        assert_eq!(settings.pdf.program, "soffice");
        assert!(settings.pdf.args.is_empty());
        assert_eq!(settings.pdf.timeout_secs, 120);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str(
            r#"
[pdf]
timeout_secs = 30
"#,
        )
        .unwrap();

        assert_eq!(settings.pdf.timeout_secs, 30);
        assert_eq!(settings.pdf.program, "soffice");
        assert!(settings.extract.include_headers_footers);
    }

    #[test]
    fn test_full_toml() {
        let settings = Settings::from_toml_str(
            r#"
[extract]
include_headers_footers = false

[pdf]
program = "flatpak"
args = ["run", "org.libreoffice.LibreOffice"]
timeout_secs = 45
"#,
        )
        .unwrap();

        assert!(!settings.extract.options().include_headers_footers);
        assert_eq!(settings.pdf.args, vec!["run", "org.libreoffice.LibreOffice"]);
        assert_eq!(
            settings.pdf.converter().timeout(),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(Settings::from_toml_str("[pdf]\ntimeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[extract]\ninclude_headers_footers = false\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert!(!settings.extract.include_headers_footers);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
