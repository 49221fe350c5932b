//! Shared engine context

use std::path::PathBuf;
use std::sync::Arc;

use crate::compiler::SchemaCompiler;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::locate::{Tool, Toolchain};
use crate::process::{ProcessRunner, SystemRunner};
use crate::schema::{ModuleSource, Schema, resolve};
use crate::spec::SpecGenerator;
use crate::translator::Translator;
use crate::types::DocumentType;
use crate::workspace::Workspace;

/// Configuration, tool discovery and process execution shared by every
/// translator and spec generator built from it.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    toolchain: Toolchain,
    runner: Arc<dyn ProcessRunner>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let toolchain = Toolchain::new(config.tools.clone());
        Self {
            config,
            toolchain,
            runner: Arc::new(SystemRunner),
        }
    }

    /// Replace the process runner
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    /// Compiler adapter bound to the resolved compiler executable
    pub fn compiler(&self) -> Result<SchemaCompiler> {
        let executable = self.toolchain.resolve(Tool::Compiler)?;
        Ok(SchemaCompiler::new(
            executable,
            self.runner.clone(),
            self.config.artifact_timeout,
        ))
    }

    /// Acquire a workspace below the scratch root of `family`
    pub fn workspace(&self, family: &str) -> Result<Workspace> {
        Workspace::acquire(self.config.scratch_root(family), self.config.keep_tmp_files)
    }

    pub fn scratch_root(&self, family: &str) -> PathBuf {
        self.config.scratch_root(family)
    }

    /// Translator for the given module references
    pub fn translator<S: AsRef<str>>(
        &self,
        modules: &[S],
        search_path: Option<&str>,
        doctype: DocumentType,
    ) -> Result<Translator> {
        let schema = resolve(modules, search_path)?;
        Ok(Translator::new(self.clone(), schema, doctype))
    }

    /// Translator for an already resolved schema
    pub fn translator_for(&self, schema: Schema, doctype: DocumentType) -> Translator {
        Translator::new(self.clone(), schema, doctype)
    }

    /// Spec generator owning a fresh workspace
    pub fn spec_generator(
        &self,
        source: &ModuleSource,
        search_path: Option<&str>,
        doctype: DocumentType,
    ) -> Result<SpecGenerator> {
        SpecGenerator::new(self.clone(), source, search_path, doctype)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
