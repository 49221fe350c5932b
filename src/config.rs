//! Engine configuration
//!
//! Sources, first match wins per field: an explicit file, `./yangtx.toml`,
//! then `<config dir>/yangtx/config.toml`. `YANGTX_KEEP_TMP_FILES` forces
//! workspace retention on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, YangError};
use crate::locate::expand_path;

pub const CONFIG_FILE_NAME: &str = "yangtx.toml";
pub const KEEP_TMP_FILES_ENV: &str = "YANGTX_KEEP_TMP_FILES";

const DEFAULT_ARTIFACT_TIMEOUT_MS: u64 = 10_000;

/// Overrides for tool discovery
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolPaths {
    pub pyang: Option<PathBuf>,
    pub json2xml: Option<PathBuf>,
    pub xsltproc: Option<PathBuf>,
    /// Directory containing `jsonxsl-templates.xsl`
    pub xslt_dir: Option<PathBuf>,
    /// Searched before `$PATH`
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,
}

/// Raw file contents; every field optional so sources can be layered
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    tmp_dir: Option<PathBuf>,
    keep_tmp_files: Option<bool>,
    artifact_timeout_ms: Option<u64>,
    tools: Option<ToolPaths>,
}

impl RawConfig {
    fn parse(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| YangError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| YangError::Config(format!("{}: {e}", path.display())))
    }

    fn or(self, other: RawConfig) -> RawConfig {
        RawConfig {
            tmp_dir: self.tmp_dir.or(other.tmp_dir),
            keep_tmp_files: self.keep_tmp_files.or(other.keep_tmp_files),
            artifact_timeout_ms: self.artifact_timeout_ms.or(other.artifact_timeout_ms),
            tools: match (self.tools, other.tools) {
                (Some(a), Some(b)) => Some(ToolPaths {
                    pyang: a.pyang.or(b.pyang),
                    json2xml: a.json2xml.or(b.json2xml),
                    xsltproc: a.xsltproc.or(b.xsltproc),
                    xslt_dir: a.xslt_dir.or(b.xslt_dir),
                    search_dirs: if a.search_dirs.is_empty() {
                        b.search_dirs
                    } else {
                        a.search_dirs
                    },
                }),
                (a, b) => a.or(b),
            },
        }
    }
}

/// Resolved engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base directory for workspaces
    pub tmp_dir: PathBuf,
    /// Retain workspaces after each call, for debugging
    pub keep_tmp_files: bool,
    /// How long to wait for a tool's output file to settle
    pub artifact_timeout: Duration,
    pub tools: ToolPaths,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tmp_dir: std::env::temp_dir().join("yang-translate"),
            keep_tmp_files: false,
            artifact_timeout: Duration::from_millis(DEFAULT_ARTIFACT_TIMEOUT_MS),
            tools: ToolPaths::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the standard locations, with `explicit` taking precedence.
    ///
    /// An explicit file must exist and parse. Files found by search are
    /// skipped when unreadable.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut raw = RawConfig::default();

        if let Some(path) = explicit {
            raw = raw.or(RawConfig::parse(path)?);
        }
        if let Ok(cwd) = std::env::current_dir() {
            let path = cwd.join(CONFIG_FILE_NAME);
            if path.is_file() {
                if let Ok(found) = RawConfig::parse(&path) {
                    raw = raw.or(found);
                }
            }
        }
        if let Some(base) = dirs::config_dir() {
            let path = base.join("yangtx").join("config.toml");
            if path.is_file() {
                if let Ok(found) = RawConfig::parse(&path) {
                    raw = raw.or(found);
                }
            }
        }

        let mut config = Self::from_raw(raw);
        if env_flag(KEEP_TMP_FILES_ENV) {
            config.keep_tmp_files = true;
        }
        Ok(config)
    }

    /// Parse a single TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| YangError::Config(e.to_string()))?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let expand = |p: PathBuf| expand_path(&p.to_string_lossy());

        let tools = raw.tools.unwrap_or_default();
        Self {
            tmp_dir: raw.tmp_dir.map(expand).unwrap_or(defaults.tmp_dir),
            keep_tmp_files: raw.keep_tmp_files.unwrap_or(defaults.keep_tmp_files),
            artifact_timeout: raw
                .artifact_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.artifact_timeout),
            tools: ToolPaths {
                pyang: tools.pyang.map(expand),
                json2xml: tools.json2xml.map(expand),
                xsltproc: tools.xsltproc.map(expand),
                xslt_dir: tools.xslt_dir.map(expand),
                search_dirs: tools.search_dirs.into_iter().map(expand).collect(),
            },
        }
    }

    /// Workspace base for one operation family
    pub fn scratch_root(&self, family: &str) -> PathBuf {
        self.tmp_dir.join(family)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
