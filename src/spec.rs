//! Tree diagrams and sample instance documents for a module set
//!
//! A [`SpecGenerator`] owns one workspace for its whole lifetime. Each
//! generation writes its own artifact into it, optionally copies the result
//! to a caller-chosen path, and removes the artifact again.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::compiler::{CompileOptions, CompileRequest, CompiledArtifact, OutputFormat};
use crate::engine::Engine;
use crate::error::{Result, YangError};
use crate::schema::{ModuleSource, Schema, resolve_source};
use crate::types::DocumentType;
use crate::workspace::Workspace;
use crate::xml;

/// Compiler plugin providing the `sample-json-skeleton` output format
pub const JSON_SKELETON_PLUGIN: &str = include_str!("../assets/pyang/json_skeleton_plugin.py");

const PLUGIN_FILE_NAME: &str = "json_skeleton.py";

/// Scratch root name for spec generation
pub const SPEC_SCRATCH: &str = "spec";

#[derive(Debug, Clone, Default)]
pub struct TreeSchemaOptions {
    /// Copy the tree to this file
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct XmlSchemaOptions {
    pub path: Option<PathBuf>,
    /// Fill leaves with their default values
    pub defaults: bool,
    /// Annotate nodes with their types
    pub annotations: bool,
}

#[derive(Debug, Clone, Default)]
pub struct JsonSchemaOptions {
    pub path: Option<PathBuf>,
    pub defaults: bool,
}

/// Options for [`SpecGenerator::generate_spec`]
#[derive(Debug, Clone, Default)]
pub struct SpecOptions {
    pub tree: TreeSchemaOptions,
    pub xml: XmlSchemaOptions,
    pub json: JsonSchemaOptions,
}

/// All three renderings of one module set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecReport {
    pub json_skeleton: Value,
    pub xml_skeleton: String,
    pub tree: String,
}

/// Generates specs for one resolved module set
#[derive(Debug)]
pub struct SpecGenerator {
    engine: Engine,
    schema: Schema,
    doctype: DocumentType,
    workspace: Workspace,
}

impl SpecGenerator {
    /// Acquire a workspace and resolve `source` against `search_path`.
    ///
    /// Inline module content is written into the workspace first.
    pub fn new(
        engine: Engine,
        source: &ModuleSource,
        search_path: Option<&str>,
        doctype: DocumentType,
    ) -> Result<Self> {
        let workspace = engine.workspace(SPEC_SCRATCH)?;
        let schema = resolve_source(source, search_path, &workspace)?;
        debug!(
            modules = schema.modules.len(),
            search_path = %schema.search_path,
            "spec generator ready"
        );
        Ok(Self {
            engine,
            schema,
            doctype,
            workspace,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doctype(&self) -> DocumentType {
        self.doctype
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// RFC 8340 tree diagram
    pub fn generate_tree(&self, options: &TreeSchemaOptions) -> Result<String> {
        let request = CompileRequest::new(
            OutputFormat::Tree,
            &self.schema.modules,
            &self.schema.search_path,
        );
        self.generate(&request, options.path.as_deref(), |text| Ok(text.to_string()))
    }

    /// Sample XML instance limited to the generator's document type
    pub fn generate_xml_schema(&self, options: &XmlSchemaOptions) -> Result<String> {
        let request = CompileRequest::new(
            OutputFormat::XmlSkeleton,
            &self.schema.modules,
            &self.schema.search_path,
        )
        .with_options(CompileOptions {
            doctype: Some(self.doctype),
            defaults: options.defaults,
            annotations: options.annotations,
            ..CompileOptions::default()
        });

        self.generate(&request, options.path.as_deref(), |text| {
            xml::check_well_formed(text).map_err(|e| {
                YangError::XmlGeneration(format!("Error while reading xml skeleton: {e}"))
            })?;
            Ok(text.to_string())
        })
    }

    /// Sample RFC 7951 JSON instance limited to the generator's document type
    pub fn generate_json_schema(&self, options: &JsonSchemaOptions) -> Result<Value> {
        let plugin_dir = self.stage_plugin()?;
        let request = CompileRequest::new(
            OutputFormat::JsonSkeleton,
            &self.schema.modules,
            &self.schema.search_path,
        )
        .with_options(CompileOptions {
            doctype: Some(self.doctype),
            defaults: options.defaults,
            plugin_dir: Some(plugin_dir),
            ..CompileOptions::default()
        });

        self.generate(&request, options.path.as_deref(), |text| {
            serde_json::from_str(text).map_err(|e| {
                YangError::JsonGeneration(format!("Error while reading json skeleton: {e}"))
            })
        })
    }

    /// Run all three generations.
    ///
    /// When one fails, files written by the earlier ones are removed.
    pub fn generate_spec(&self, options: &SpecOptions) -> Result<SpecReport> {
        let json_skeleton = self.generate_json_schema(&options.json)?;

        let xml_skeleton = match self.generate_xml_schema(&options.xml) {
            Ok(xml) => xml,
            Err(e) => {
                remove_outputs(&[&options.json.path]);
                return Err(e);
            }
        };

        let tree = match self.generate_tree(&options.tree) {
            Ok(tree) => tree,
            Err(e) => {
                remove_outputs(&[&options.json.path, &options.xml.path]);
                return Err(e);
            }
        };

        Ok(SpecReport {
            json_skeleton,
            xml_skeleton,
            tree,
        })
    }

    /// Release the workspace, reporting cleanup failures
    pub fn close(mut self) -> Result<()> {
        self.workspace.release()
    }

    fn stage_plugin(&self) -> Result<PathBuf> {
        let dir = self.workspace.subdir("plugins")?;
        let plugin = dir.join(PLUGIN_FILE_NAME);
        if !plugin.is_file() {
            fs::write(&plugin, JSON_SKELETON_PLUGIN)?;
            debug!(plugin = %plugin.display(), "staged compiler plugin");
        }
        Ok(dir)
    }

    /// Compile, check the artifact with `accept`, and only then persist it
    fn generate<T>(
        &self,
        request: &CompileRequest<'_>,
        output: Option<&Path>,
        accept: impl FnOnce(&str) -> Result<T>,
    ) -> Result<T> {
        let compiler = self.engine.compiler()?;
        let artifact = compiler.compile(request, &self.workspace)?;
        let result = accept(&artifact.contents)
            .and_then(|value| persist(&artifact, output).map(|()| value));
        self.workspace.discard(&artifact.path);
        result
    }
}

/// Copy `artifact` to `output`, creating parent directories as needed
fn persist(artifact: &CompiledArtifact, output: Option<&Path>) -> Result<()> {
    let Some(output) = output else {
        return Ok(());
    };
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = fs::copy(&artifact.path, output) {
        remove_outputs(&[&Some(output.to_path_buf())]);
        return Err(e.into());
    }
    debug!(output = %output.display(), "persisted artifact");
    Ok(())
}

fn remove_outputs(outputs: &[&Option<PathBuf>]) {
    for output in outputs.iter().copied().flatten() {
        if let Err(e) = fs::remove_file(output) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(output = %output.display(), error = %e, "failed to remove output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::{ScriptedRunner, entries, fake_config, fake_module};
    use std::sync::Arc;
    use tempfile::TempDir;

    const TREE: &str = "module: demo\n  +--rw interfaces\n";
    const XML_SKELETON: &str = "<?xml version='1.0' encoding='UTF-8'?>\n<config xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><interfaces xmlns=\"urn:demo\"/></config>\n";
    const JSON_SKELETON: &str = "{\n  \"demo:interfaces\": {\n    \"interface\": [\n      {\n        \"name\": \"\"\n      }\n    ]\n  }\n}\n";

    fn runner() -> ScriptedRunner {
        ScriptedRunner::new().on("pyang", |inv| {
            let body = match inv.flag_value("-f").and_then(|f| f.to_str()) {
                Some("tree") => TREE,
                Some("sample-xml-skeleton") => XML_SKELETON,
                Some("sample-json-skeleton") => JSON_SKELETON,
                _ => return (None, ProcessOutput::failed(2, "unknown format")),
            };
            (Some(body.to_string()), ProcessOutput::ok(""))
        })
    }

    fn setup(dir: &Path, runner: ScriptedRunner) -> (SpecGenerator, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let engine = Engine::new(fake_config(dir)).with_runner(runner.clone());
        let module = fake_module(dir, "demo");
        let generator = engine
            .spec_generator(
                &ModuleSource::file(module.to_string_lossy()),
                None,
                DocumentType::Config,
            )
            .unwrap();
        (generator, runner)
    }

    fn scratch(dir: &Path) -> PathBuf {
        dir.join("tmp").join(SPEC_SCRATCH)
    }

    #[test]
    fn test_tree_persisted_and_artifact_discarded() {
        let dir = TempDir::new().unwrap();
        let (generator, _) = setup(dir.path(), runner());
        let out = dir.path().join("out/nested/tree.txt");

        let tree = generator
            .generate_tree(&TreeSchemaOptions {
                path: Some(out.clone()),
            })
            .unwrap();

        assert_eq!(tree, TREE);
        assert_eq!(fs::read_to_string(&out).unwrap(), TREE);
        assert_eq!(entries(generator.workspace().path()), 0);
    }

    #[test]
    fn test_xml_schema_flags() {
        let dir = TempDir::new().unwrap();
        let (generator, runner) = setup(dir.path(), runner());

        let xml = generator
            .generate_xml_schema(&XmlSchemaOptions {
                defaults: true,
                annotations: false,
                ..XmlSchemaOptions::default()
            })
            .unwrap();
        assert_eq!(xml, XML_SKELETON);

        let args: Vec<String> = runner.calls()[0]
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let doctype = args.iter().position(|a| a == "--sample-xml-skeleton-doctype").unwrap();
        assert_eq!(args[doctype + 1], "config");
        assert!(args.contains(&"--sample-xml-skeleton-defaults".to_string()));
        assert!(!args.contains(&"--sample-xml-skeleton-annotations".to_string()));
    }

    #[test]
    fn test_json_schema_stages_plugin() {
        let dir = TempDir::new().unwrap();
        let (generator, runner) = setup(dir.path(), runner());

        let value = generator
            .generate_json_schema(&JsonSchemaOptions::default())
            .unwrap();
        assert_eq!(value["demo:interfaces"]["interface"][0]["name"], "");

        let calls = runner.calls();
        let plugin_dir = calls[0].flag_value("--plugindir").unwrap();
        assert!(plugin_dir.starts_with(generator.workspace().path()));
        assert_eq!(
            fs::read_to_string(plugin_dir.join(PLUGIN_FILE_NAME)).unwrap(),
            JSON_SKELETON_PLUGIN
        );
    }

    #[test]
    fn test_json_schema_rejects_bad_output() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().on("pyang", |_| {
            (Some("module: demo".to_string()), ProcessOutput::ok(""))
        });
        let (generator, _) = setup(dir.path(), runner);

        let err = generator
            .generate_json_schema(&JsonSchemaOptions::default())
            .unwrap_err();
        assert!(matches!(err, YangError::JsonGeneration(_)));
    }

    fn runner_with(xml: &'static str, json: &'static str) -> ScriptedRunner {
        ScriptedRunner::new().on("pyang", move |inv| {
            let body = match inv.flag_value("-f").and_then(|f| f.to_str()) {
                Some("sample-xml-skeleton") => xml,
                Some("sample-json-skeleton") => json,
                _ => TREE,
            };
            (Some(body.to_string()), ProcessOutput::ok(""))
        })
    }

    #[test]
    fn test_truncated_json_skeleton_not_persisted() {
        let dir = TempDir::new().unwrap();
        let (generator, _) = setup(dir.path(), runner_with(XML_SKELETON, "{\"demo:interfaces\": "));
        let out = dir.path().join("out/skeleton.json");

        let err = generator
            .generate_json_schema(&JsonSchemaOptions {
                path: Some(out.clone()),
                defaults: false,
            })
            .unwrap_err();
        assert!(matches!(err, YangError::JsonGeneration(_)));
        assert!(!out.exists());
        assert_eq!(entries(generator.workspace().path()), 1);
    }

    #[test]
    fn test_malformed_xml_skeleton_not_persisted() {
        let dir = TempDir::new().unwrap();
        let (generator, _) = setup(dir.path(), runner_with("<config><interfaces></config>", JSON_SKELETON));
        let out = dir.path().join("out/skeleton.xml");

        let err = generator
            .generate_xml_schema(&XmlSchemaOptions {
                path: Some(out.clone()),
                ..XmlSchemaOptions::default()
            })
            .unwrap_err();
        assert!(matches!(err, YangError::XmlGeneration(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_failed_spec_removes_earlier_outputs() {
        let dir = TempDir::new().unwrap();
        let (generator, _) = setup(dir.path(), runner_with("<config>", JSON_SKELETON));
        let json_out = dir.path().join("out/skeleton.json");
        let xml_out = dir.path().join("out/skeleton.xml");

        let options = SpecOptions {
            json: JsonSchemaOptions {
                path: Some(json_out.clone()),
                defaults: false,
            },
            xml: XmlSchemaOptions {
                path: Some(xml_out.clone()),
                ..XmlSchemaOptions::default()
            },
            tree: TreeSchemaOptions::default(),
        };
        let err = generator.generate_spec(&options).unwrap_err();

        assert!(matches!(err, YangError::XmlGeneration(_)));
        assert!(!json_out.exists());
        assert!(!xml_out.exists());
    }

    #[test]
    fn test_generate_spec() {
        let dir = TempDir::new().unwrap();
        let (generator, runner) = setup(dir.path(), runner());

        let report = generator.generate_spec(&SpecOptions::default()).unwrap();
        assert_eq!(report.tree, TREE);
        assert_eq!(report.xml_skeleton, XML_SKELETON);
        assert!(report.json_skeleton.is_object());
        assert_eq!(runner.calls_to("pyang"), 3);
    }

    #[test]
    fn test_compile_error_propagates() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().on("pyang", |_| {
            (None, ProcessOutput::failed(1, "demo.yang:3: error: unexpected keyword \"leafs\""))
        });
        let (generator, _) = setup(dir.path(), runner);

        match generator.generate_tree(&TreeSchemaOptions::default()) {
            Err(YangError::SchemaCompilation { format, output }) => {
                assert_eq!(format, OutputFormat::Tree);
                assert!(output.contains("unexpected keyword"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_workspace_lives_until_close() {
        let dir = TempDir::new().unwrap();
        let (generator, _) = setup(dir.path(), runner());

        generator.generate_tree(&TreeSchemaOptions::default()).unwrap();
        generator.generate_tree(&TreeSchemaOptions::default()).unwrap();
        assert_eq!(entries(&scratch(dir.path())), 1);

        generator.close().unwrap();
        assert_eq!(entries(&scratch(dir.path())), 0);
    }

    #[test]
    fn test_workspace_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let (generator, _) = setup(dir.path(), runner());
        drop(generator);
        assert_eq!(entries(&scratch(dir.path())), 0);
    }

    #[test]
    fn test_inline_content_source() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(runner());
        let engine = Engine::new(fake_config(dir.path())).with_runner(runner.clone());

        let generator = engine
            .spec_generator(
                &ModuleSource::Content("module demo { namespace \"urn:demo\"; prefix d; }".into()),
                None,
                DocumentType::Data,
            )
            .unwrap();
        generator.generate_tree(&TreeSchemaOptions::default()).unwrap();

        let module = runner.calls()[0].args.last().unwrap().clone();
        assert!(Path::new(&module).ends_with("modules/demo.yang"));
    }

    #[test]
    fn test_invalid_module_releases_workspace() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::new(fake_config(dir.path())).with_runner(Arc::new(runner()));

        let err = engine
            .spec_generator(
                &ModuleSource::file(dir.path().join("absent.yang").to_string_lossy()),
                None,
                DocumentType::Config,
            )
            .unwrap_err();
        assert!(matches!(err, YangError::InvalidModulePath(_)));
        assert_eq!(entries(&scratch(dir.path())), 0);
    }
}
