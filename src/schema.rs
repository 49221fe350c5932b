//! Module set and search path resolution
//!
//! Turns caller-supplied module references into the sorted, deduplicated
//! list of absolute paths the compiler is run with, and validates the
//! colon-separated search path it resolves imports against.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Result, YangError};
use crate::locate::expand_path;
use crate::workspace::Workspace;

/// Sorted, deduplicated absolute paths of YANG module files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSet {
    files: Vec<PathBuf>,
}

impl ModuleSet {
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// First module in sort order
    pub fn first(&self) -> &Path {
        // Construction guarantees at least one entry
        &self.files[0]
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Colon-joined absolute directories used to resolve `import`/`include`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    segments: Vec<PathBuf>,
}

impl SearchPath {
    /// Validate `raw`; every non-empty segment must be an existing directory
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in raw.split(':') {
            if segment.is_empty() {
                continue;
            }
            let dir = expand_path(segment);
            if !dir.is_dir() {
                return Err(YangError::InvalidSearchPath(dir));
            }
            segments.push(dir);
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    /// Copy of this path with `dir` appended
    pub fn extended(&self, dir: impl Into<PathBuf>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(dir.into());
        Self { segments }
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self
            .segments
            .iter()
            .map(|s| s.display().to_string())
            .collect();
        f.write_str(&joined.join(":"))
    }
}

/// A resolved module set together with its search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub modules: ModuleSet,
    pub search_path: SearchPath,
}

/// Where the modules come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    /// File paths or glob patterns
    Files(Vec<String>),
    /// YANG text of a single top-level module
    Content(String),
}

impl ModuleSource {
    pub fn file(path: impl Into<String>) -> Self {
        ModuleSource::Files(vec![path.into()])
    }
}

fn expand_reference(reference: &str, out: &mut BTreeSet<PathBuf>) -> Result<()> {
    let path = expand_path(reference);
    if path.is_file() {
        out.insert(path);
        return Ok(());
    }

    let pattern = path.to_string_lossy();
    let matches: Vec<PathBuf> = glob::glob(&pattern)
        .map(|paths| paths.filter_map(|p| p.ok()).filter(|p| p.is_file()).collect())
        .unwrap_or_default();

    if matches.is_empty() {
        return Err(YangError::InvalidModulePath(path));
    }
    out.extend(
        matches
            .into_iter()
            .map(|p| p.canonicalize().unwrap_or(p)),
    );
    Ok(())
}

/// Resolve module references and the search path.
///
/// Without a search path, the directory of the first module is used.
pub fn resolve<S: AsRef<str>>(references: &[S], search_path: Option<&str>) -> Result<Schema> {
    let mut files = BTreeSet::new();
    for reference in references {
        expand_reference(reference.as_ref(), &mut files)?;
    }
    if files.is_empty() {
        return Err(YangError::InvalidInput(
            "at least one YANG module must be given".to_string(),
        ));
    }

    let modules = ModuleSet {
        files: files.into_iter().collect(),
    };

    let search_path = match search_path.filter(|s| !s.trim().is_empty()) {
        Some(raw) => SearchPath::parse(raw)?,
        None => {
            let dir = modules.first().parent().unwrap_or(Path::new("/"));
            SearchPath {
                segments: vec![dir.to_path_buf()],
            }
        }
    };

    Ok(Schema {
        modules,
        search_path,
    })
}

/// Name declared by the `module` (or `submodule`) statement of `text`
pub fn module_name(text: &str) -> Option<String> {
    let re = Regex::new(r#"(?m)^\s*(?:sub)?module\s+["']?([A-Za-z_][\w.\-]*)"#).ok()?;
    re.captures(text).map(|c| c[1].to_string())
}

/// Resolve a [`ModuleSource`], writing inline content into `workspace`
pub fn resolve_source(
    source: &ModuleSource,
    search_path: Option<&str>,
    workspace: &Workspace,
) -> Result<Schema> {
    match source {
        ModuleSource::Files(references) => resolve(references, search_path),
        ModuleSource::Content(text) => {
            let dir = workspace.subdir("modules")?;
            let path = match module_name(text) {
                Some(name) => dir.join(format!("{name}.yang")),
                None => workspace.artifact("yang"),
            };
            std::fs::write(&path, text)?;
            resolve(&[path.to_string_lossy()], search_path)
        }
    }
}
