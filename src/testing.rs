//! Test doubles for the external toolchain

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{EngineConfig, ToolPaths};
use crate::locate::JSONXSL_TEMPLATES;
use crate::process::{Invocation, ProcessOutput, ProcessRunner};

type Script = Box<dyn Fn(&Invocation) -> (Option<String>, ProcessOutput) + Send + Sync>;

/// Records invocations and answers them from per-program scripts.
///
/// A script returns the text to write to the invocation's `-o` path (if any)
/// and the process result to report.
#[derive(Default)]
pub struct ScriptedRunner {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<Invocation>>,
}

impl std::fmt::Debug for ScriptedRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRunner")
            .field("programs", &self.scripts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        mut self,
        program: &str,
        script: impl Fn(&Invocation) -> (Option<String>, ProcessOutput) + Send + Sync + 'static,
    ) -> Self {
        self.scripts.insert(program.to_string(), Box::new(script));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, program: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.program_name() == program)
            .count()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }

        let name = invocation.program_name();
        let script = self.scripts.get(&name).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no script for {name}"))
        })?;

        let (written, output) = script(invocation);
        if let (Some(text), Some(path)) = (written, invocation.flag_value("-o")) {
            fs::write(path, text)?;
        }
        Ok(output)
    }
}

/// Engine config whose tools are placeholder files under `dir`
pub fn fake_config(dir: &Path) -> EngineConfig {
    let bin = dir.join("bin");
    let xslt = dir.join("share/yang/xslt");
    fs::create_dir_all(&bin).unwrap();
    fs::create_dir_all(&xslt).unwrap();
    fs::write(xslt.join(JSONXSL_TEMPLATES), "<xsl:stylesheet/>").unwrap();

    let tool = |name: &str| -> PathBuf {
        let path = bin.join(name);
        fs::write(&path, "").unwrap();
        path
    };

    EngineConfig {
        tmp_dir: dir.join("tmp"),
        keep_tmp_files: false,
        artifact_timeout: std::time::Duration::from_millis(200),
        tools: ToolPaths {
            pyang: Some(tool("pyang")),
            json2xml: Some(tool("json2xml")),
            xsltproc: Some(tool("xsltproc")),
            xslt_dir: Some(xslt),
            search_dirs: Vec::new(),
        },
    }
}

/// Write a placeholder module and return its path
pub fn fake_module(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.yang"));
    fs::write(&path, format!("module {name} {{ namespace \"urn:{name}\"; prefix x; }}")).unwrap();
    path
}

/// Number of entries directly below `dir` (0 when it does not exist)
pub fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
