//! Locating executables and shared resources

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ToolPaths;
use crate::error::{Result, YangError};

/// Template the compiler's `jsonxsl` stylesheets include
pub const JSONXSL_TEMPLATES: &str = "jsonxsl-templates.xsl";

/// Location of [`JSONXSL_TEMPLATES`] below a `share` directory
const XSLT_SHARE_DIR: &str = "yang/xslt";

/// Expand a leading `~`, make the path absolute and resolve symlinks when
/// the path exists.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(raw),
        },
        _ => PathBuf::from(raw),
    };

    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        match env::current_dir() {
            Ok(cwd) => cwd.join(expanded),
            Err(_) => expanded,
        }
    };

    absolute.canonicalize().unwrap_or(absolute)
}

fn path_dirs() -> Vec<PathBuf> {
    env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect())
        .unwrap_or_default()
}

fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
}

/// First regular file called `name` in `extra_dirs`, `$PATH`, or next to the
/// running executable.
pub fn find_executable(name: &str, extra_dirs: &[PathBuf]) -> Option<PathBuf> {
    extra_dirs
        .iter()
        .cloned()
        .chain(path_dirs())
        .chain(exe_dir())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// The `share` directory next to a `$PATH` entry's parent that contains
/// `relative`.
pub fn find_share_path(relative: &str) -> Option<PathBuf> {
    path_dirs()
        .into_iter()
        .chain(exe_dir())
        .filter_map(|dir| dir.parent().map(|prefix| prefix.join("share")))
        .find(|share| share.join(relative).is_file())
}

/// External programs the engine drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// YANG compiler
    Compiler,
    /// JSON to XML renderer fed with a jtox mapping table
    JsonRenderer,
    /// XSLT processor
    StylesheetProcessor,
}

impl Tool {
    pub fn binary_name(&self) -> &'static str {
        match self {
            Tool::Compiler => "pyang",
            Tool::JsonRenderer => "json2xml",
            Tool::StylesheetProcessor => "xsltproc",
        }
    }
}

/// Resolves tool locations from configured overrides and the environment
#[derive(Debug, Clone, Default)]
pub struct Toolchain {
    paths: ToolPaths,
}

impl Toolchain {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    fn configured(&self, tool: Tool) -> Option<&PathBuf> {
        match tool {
            Tool::Compiler => self.paths.pyang.as_ref(),
            Tool::JsonRenderer => self.paths.json2xml.as_ref(),
            Tool::StylesheetProcessor => self.paths.xsltproc.as_ref(),
        }
    }

    /// Path of `tool`, or [`YangError::MissingDependency`]
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        let name = tool.binary_name();
        if let Some(path) = self.configured(tool) {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(YangError::MissingDependency(format!(
                "{name} is configured as {} but that file does not exist",
                path.display()
            )));
        }

        let found = find_executable(name, &self.paths.search_dirs).ok_or_else(|| {
            YangError::MissingDependency(format!("{name} not found in search path"))
        })?;
        debug!(tool = name, path = %found.display(), "resolved executable");
        Ok(found)
    }

    /// Directory holding the compiler's stylesheet templates
    pub fn xslt_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.paths.xslt_dir {
            if dir.join(JSONXSL_TEMPLATES).is_file() {
                return Ok(dir.clone());
            }
            return Err(YangError::MissingDependency(format!(
                "{JSONXSL_TEMPLATES} not found in configured xslt_dir {}",
                dir.display()
            )));
        }

        let relative = format!("{XSLT_SHARE_DIR}/{JSONXSL_TEMPLATES}");
        find_share_path(&relative)
            .map(|share| share.join(XSLT_SHARE_DIR))
            .ok_or_else(|| {
                YangError::MissingDependency(format!(
                    "{JSONXSL_TEMPLATES} not found in any share directory"
                ))
            })
    }
}
