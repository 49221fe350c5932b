//! Schema compiler adapter
//!
//! Runs the YANG compiler in one of its output formats against a resolved
//! [`Schema`], writing the result into a workspace artifact and returning its
//! text.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, YangError};
use crate::process::{Invocation, ProcessRunner};
use crate::schema::{ModuleSet, SearchPath};
use crate::types::DocumentType;
use crate::workspace::{Workspace, await_artifact};

/// Environment variable the compiler reads the stylesheet template dir from
pub const XSLT_DIR_ENV: &str = "PYANG_XSLT_DIR";

/// Compiler output formats used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// RFC 8340 tree diagram
    Tree,
    /// Sample XML instance
    XmlSkeleton,
    /// Sample RFC 7951 JSON instance (bundled plugin)
    JsonSkeleton,
    /// JSON to XML mapping table
    Jtox,
    /// XSLT stylesheet rendering XML instances as JSON
    JsonXsl,
}

impl OutputFormat {
    pub fn as_flag(&self) -> &'static str {
        match self {
            OutputFormat::Tree => "tree",
            OutputFormat::XmlSkeleton => "sample-xml-skeleton",
            OutputFormat::JsonSkeleton => "sample-json-skeleton",
            OutputFormat::Jtox => "jtox",
            OutputFormat::JsonXsl => "jsonxsl",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tree => "txt",
            OutputFormat::XmlSkeleton => "xml",
            OutputFormat::JsonSkeleton => "json",
            OutputFormat::Jtox => "jtox",
            OutputFormat::JsonXsl => "xsl",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_flag())
    }
}

/// Mode-specific switches
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub doctype: Option<DocumentType>,
    pub defaults: bool,
    pub annotations: bool,
    /// Extra directory scanned for output-format plugins
    pub plugin_dir: Option<PathBuf>,
    /// Stylesheet template directory for `jsonxsl`
    pub xslt_dir: Option<PathBuf>,
    /// Modules appended after the module set
    pub extra_modules: Vec<PathBuf>,
}

/// One compiler run
#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub format: OutputFormat,
    pub modules: &'a ModuleSet,
    pub search_path: &'a SearchPath,
    pub options: CompileOptions,
}

impl<'a> CompileRequest<'a> {
    pub fn new(format: OutputFormat, modules: &'a ModuleSet, search_path: &'a SearchPath) -> Self {
        Self {
            format,
            modules,
            search_path,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the compiler command line writing to `output`
    pub fn invocation(&self, compiler: &Path, output: &Path) -> Invocation {
        let opts = &self.options;
        let mut inv = Invocation::new(compiler);

        if let Some(dir) = &opts.plugin_dir {
            inv = inv.arg("--plugindir").arg(dir);
        }
        inv = inv
            .arg("-f")
            .arg(self.format.as_flag())
            .arg("-o")
            .arg(output)
            .arg("-p")
            .arg(self.search_path.to_string())
            .arg("--lax-quote-checks");

        match self.format {
            OutputFormat::XmlSkeleton => {
                if let Some(doctype) = opts.doctype {
                    inv = inv
                        .arg("--sample-xml-skeleton-doctype")
                        .arg(doctype.as_str());
                }
                if opts.defaults {
                    inv = inv.arg("--sample-xml-skeleton-defaults");
                }
                if opts.annotations {
                    inv = inv.arg("--sample-xml-skeleton-annotations");
                }
            }
            OutputFormat::JsonSkeleton => {
                if let Some(doctype) = opts.doctype {
                    inv = inv
                        .arg("--sample-json-skeleton-doctype")
                        .arg(doctype.as_str());
                }
                if opts.defaults {
                    inv = inv.arg("--sample-json-skeleton-defaults");
                }
            }
            OutputFormat::Tree | OutputFormat::Jtox | OutputFormat::JsonXsl => {}
        }

        inv = inv
            .args(self.modules.files())
            .args(&opts.extra_modules);

        if let Some(dir) = &opts.xslt_dir {
            inv = inv.env(XSLT_DIR_ENV, dir);
        }
        inv
    }
}

/// Output of a successful compiler run
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    /// Artifact file inside the workspace
    pub path: PathBuf,
    pub contents: String,
}

/// Drives the external schema compiler
#[derive(Debug, Clone)]
pub struct SchemaCompiler {
    executable: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    artifact_timeout: Duration,
}

impl SchemaCompiler {
    pub fn new(executable: PathBuf, runner: Arc<dyn ProcessRunner>, artifact_timeout: Duration) -> Self {
        Self {
            executable,
            runner,
            artifact_timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Run the compiler and read back its output artifact
    pub fn compile(&self, request: &CompileRequest<'_>, workspace: &Workspace) -> Result<CompiledArtifact> {
        let output = workspace.artifact(request.format.extension());
        let invocation = request.invocation(&self.executable, &output);
        debug!(format = %request.format, command = %invocation, "invoking schema compiler");

        let result = self
            .runner
            .run(&invocation)
            .map_err(|e| YangError::SchemaCompilation {
                format: request.format,
                output: e.to_string(),
            })?;

        if let Some(diagnostic) = result.failure() {
            return Err(YangError::SchemaCompilation {
                format: request.format,
                output: diagnostic,
            });
        }

        await_artifact(&output, self.artifact_timeout).map_err(|_| YangError::SchemaCompilation {
            format: request.format,
            output: format!("compiler produced no output at {}", output.display()),
        })?;

        let contents = fs::read_to_string(&output)?;
        Ok(CompiledArtifact {
            path: output,
            contents,
        })
    }
}
