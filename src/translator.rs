//! JSON (RFC 7951) to NETCONF XML translation and back
//!
//! Both directions are blocking, single-shot pipelines over a fresh
//! [`Workspace`]:
//!
//! * JSON → XML: validate the JSON, compile a `jtox` mapping table (with the
//!   bundled `nc-op` metadata module on the search path), render XML with
//!   `json2xml`, then re-serialize the result without its declaration.
//! * XML → JSON: validate the XML, compile a `jsonxsl` stylesheet for the
//!   module set, apply it with `xsltproc`, then parse the JSON it produced.
//!
//! The workspace is removed on every exit path unless files are kept.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::compiler::{CompileOptions, CompileRequest, OutputFormat};
use crate::engine::Engine;
use crate::error::{Result, YangError};
use crate::locate::{Tool, expand_path};
use crate::process::Invocation;
use crate::schema::Schema;
use crate::types::DocumentType;
use crate::workspace::{Workspace, await_artifact, scoped};
use crate::xml;

/// NETCONF operation metadata module added to every `jtox` compilation
pub const NETCONF_METADATA_MODULE: &str = include_str!("../assets/yang/nc-op.yang");

const METADATA_FILE_NAME: &str = "nc-op.yang";

/// Scratch root names for each direction
pub const JSON2XML_SCRATCH: &str = "json2xml";
pub const XML2JSON_SCRATCH: &str = "xml2json";

/// JSON document to translate
#[derive(Debug, Clone, PartialEq)]
pub enum JsonInput {
    /// In-memory document, written to the workspace before translation
    Document(Value),
    /// Existing file, used in place
    File(PathBuf),
}

impl JsonInput {
    /// Interpret a command-line style argument: an existing file, otherwise
    /// inline JSON text.
    pub fn from_arg(arg: &str) -> Result<Self> {
        let path = expand_path(arg.trim());
        if path.is_file() {
            return Ok(JsonInput::File(path));
        }
        serde_json::from_str(arg).map(JsonInput::Document).map_err(|e| {
            YangError::InvalidInput(format!(
                "{arg} is neither an existing file nor a JSON document ({e})"
            ))
        })
    }
}

impl From<Value> for JsonInput {
    fn from(value: Value) -> Self {
        JsonInput::Document(value)
    }
}

impl From<PathBuf> for JsonInput {
    fn from(path: PathBuf) -> Self {
        JsonInput::File(path)
    }
}

impl From<&Path> for JsonInput {
    fn from(path: &Path) -> Self {
        JsonInput::File(path.to_path_buf())
    }
}

/// Translator bound to one module set and search path
#[derive(Debug, Clone)]
pub struct Translator {
    engine: Engine,
    schema: Schema,
    doctype: DocumentType,
}

impl Translator {
    pub fn new(engine: Engine, schema: Schema, doctype: DocumentType) -> Self {
        Self {
            engine,
            schema,
            doctype,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn doctype(&self) -> DocumentType {
        self.doctype
    }

    /// Translate RFC 7951 JSON into an XML payload
    pub fn json_to_xml(&self, input: impl Into<JsonInput>) -> Result<String> {
        let input = input.into();
        scoped(
            self.engine.scratch_root(JSON2XML_SCRATCH),
            self.engine.config().keep_tmp_files,
            |ws| self.json_to_xml_in(ws, input),
        )
    }

    /// Translate XML text, or the path of an XML file, into RFC 7951 JSON
    pub fn xml_to_json(&self, input: &str) -> Result<Value> {
        scoped(
            self.engine.scratch_root(XML2JSON_SCRATCH),
            self.engine.config().keep_tmp_files,
            |ws| self.xml_to_json_in(ws, input),
        )
    }

    fn json_to_xml_in(&self, ws: &Workspace, input: JsonInput) -> Result<String> {
        let json_path = match input {
            JsonInput::Document(value) => ws.write_artifact("json", serde_json::to_vec_pretty(&value)?)?,
            JsonInput::File(path) => {
                let path = expand_path(&path.to_string_lossy());
                if !path.is_file() {
                    return Err(YangError::InvalidInput(format!(
                        "{} is not a JSON file",
                        path.display()
                    )));
                }
                path
            }
        };

        let raw = fs::read(&json_path)?;
        serde_json::from_slice::<Value>(&raw).map_err(|e| YangError::InvalidJson(e.to_string()))?;
        debug!(json = %json_path.display(), "validated json input");

        let compiler = self.engine.compiler()?;
        let metadata_dir = ws.subdir("yang")?;
        let metadata_module = metadata_dir.join(METADATA_FILE_NAME);
        fs::write(&metadata_module, NETCONF_METADATA_MODULE)?;

        let search_path = self.schema.search_path.extended(&metadata_dir);
        let request = CompileRequest::new(OutputFormat::Jtox, &self.schema.modules, &search_path)
            .with_options(CompileOptions {
                extra_modules: vec![metadata_module],
                ..CompileOptions::default()
            });
        let jtox = compiler.compile(&request, ws)?;

        let renderer = self.engine.toolchain().resolve(Tool::JsonRenderer)?;
        let xml_path = ws.artifact("xml");
        let invocation = Invocation::new(renderer)
            .arg("-t")
            .arg(self.doctype.as_str())
            .arg("-o")
            .arg(&xml_path)
            .arg(&jtox.path)
            .arg(&json_path);
        self.run_tool(&invocation, &xml_path, YangError::XmlGeneration)?;

        let rendered = fs::read_to_string(&xml_path)?;
        xml::canonicalize(&rendered)
            .map_err(|e| YangError::XmlGeneration(format!("Error while reading xml document: {e}")))
    }

    fn xml_to_json_in(&self, ws: &Workspace, input: &str) -> Result<Value> {
        let inline = xml::ensure_declaration(input);
        let xml_path = match xml::check_well_formed(&inline) {
            Ok(()) => ws.write_artifact("xml", inline)?,
            Err(parse_error) => {
                let path = expand_path(input.trim());
                if !path.is_file() {
                    return Err(YangError::InvalidInput(format!(
                        "Unable to create file or read XML data: {parse_error}"
                    )));
                }
                path
            }
        };

        let raw = fs::read(&xml_path)?;
        let text = String::from_utf8(raw).map_err(|e| YangError::InvalidXml(e.to_string()))?;
        let body = text.trim_start_matches('\u{feff}');
        if xml::has_declaration(body) && !body.starts_with("<?xml") {
            return Err(YangError::InvalidXml(
                "XML declaration must be at the start of the document".to_string(),
            ));
        }
        xml::check_well_formed(&text).map_err(YangError::InvalidXml)?;
        debug!(xml = %xml_path.display(), "validated xml input");

        let xslt_dir = self.engine.toolchain().xslt_dir()?;
        let processor = self.engine.toolchain().resolve(Tool::StylesheetProcessor)?;
        let compiler = self.engine.compiler()?;

        let request = CompileRequest::new(
            OutputFormat::JsonXsl,
            &self.schema.modules,
            &self.schema.search_path,
        )
        .with_options(CompileOptions {
            xslt_dir: Some(xslt_dir),
            ..CompileOptions::default()
        });
        let stylesheet = compiler.compile(&request, ws)?;

        let json_path = ws.artifact("json");
        let invocation = Invocation::new(processor)
            .arg("-o")
            .arg(&json_path)
            .arg(&stylesheet.path)
            .arg(&xml_path);
        self.run_tool(&invocation, &json_path, YangError::JsonGeneration)?;

        let produced = fs::read(&json_path)?;
        serde_json::from_slice(&produced).map_err(|e| {
            YangError::JsonGeneration(format!(
                "Error while reading json document {e} from path {}",
                json_path.display()
            ))
        })
    }

    /// Run a post-compilation tool and wait for its output file
    fn run_tool(
        &self,
        invocation: &Invocation,
        output: &Path,
        fail: fn(String) -> YangError,
    ) -> Result<()> {
        debug!(command = %invocation, "invoking {}", invocation.program_name());
        let result = self
            .engine
            .runner()
            .run(invocation)
            .map_err(|e| fail(format!("{}: {e}", invocation.program_name())))?;

        if let Some(diagnostic) = result.failure() {
            return Err(fail(diagnostic));
        }

        await_artifact(output, self.engine.config().artifact_timeout).map_err(|_| {
            fail(format!(
                "{} produced no output at {}",
                invocation.program_name(),
                output.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::schema::resolve;
    use crate::testing::{ScriptedRunner, entries, fake_config, fake_module};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    const RENDERED: &str = "<?xml version='1.0' encoding='UTF-8'?>\n<config xmlns=\"urn:ietf:params:xml:ns:netconf:base:1.0\"><interfaces xmlns=\"http://openconfig.net/yang/interfaces\"><interface><name>eth0</name><config><name>eth0</name><enabled>true</enabled></config></interface></interfaces></config>\n";

    const SAMPLE_JSON: &str = r#"{"openconfig-interfaces:interfaces":{"interface":[{"name":"eth0","config":{"name":"eth0","enabled":true}}]}}"#;

    fn happy_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .on("pyang", |inv| {
                let format = inv.flag_value("-f").map(|f| f.to_string_lossy().into_owned());
                let body = match format.as_deref() {
                    Some("jtox") => r#"{"modules": {}, "tree": {}}"#.to_string(),
                    _ => "<xsl:stylesheet/>".to_string(),
                };
                (Some(body), ProcessOutput::ok(""))
            })
            .on("json2xml", |_| (Some(RENDERED.to_string()), ProcessOutput::ok("")))
            .on("xsltproc", |inv| {
                let input = fs::read_to_string(inv.args.last().unwrap()).unwrap();
                if !input.starts_with("<?xml") {
                    return (None, ProcessOutput::failed(1, "input lacks declaration"));
                }
                (
                    Some(r#"{"openconfig-interfaces:interfaces":{"interface":[{"name":"eth0","config":{"mtu":1024}}]}}"#.to_string()),
                    ProcessOutput::ok(""),
                )
            })
    }

    fn setup(dir: &Path, runner: ScriptedRunner) -> (Translator, Arc<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let engine = Engine::new(fake_config(dir)).with_runner(runner.clone());
        let module = fake_module(dir, "openconfig-interfaces");
        let schema = resolve(&[module.to_string_lossy()], None).unwrap();
        (engine.translator_for(schema, DocumentType::Config), runner)
    }

    #[test]
    fn test_json_to_xml() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());

        let value: Value = serde_json::from_str(SAMPLE_JSON).unwrap();
        let xml = tl.json_to_xml(value).unwrap();

        assert!(!xml.contains("<?xml"));
        assert!(xml.contains(r#"<interfaces xmlns="http://openconfig.net/yang/interfaces">"#));
        assert!(xml.contains("<enabled>true</enabled>"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        let pyang = &calls[0];
        assert_eq!(pyang.flag_value("-f"), Some(Path::new("jtox")));
        assert!(pyang.args.last().unwrap().to_string_lossy().ends_with(METADATA_FILE_NAME));
        assert!(pyang.flag_value("-p").unwrap().to_string_lossy().ends_with("/yang"));

        let renderer = &calls[1];
        assert_eq!(renderer.flag_value("-t"), Some(Path::new("config")));

        assert_eq!(entries(&dir.path().join("tmp").join(JSON2XML_SCRATCH)), 0);
    }

    #[test]
    fn test_json_to_xml_from_file() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());
        let json_file = dir.path().join("config.json");
        fs::write(&json_file, SAMPLE_JSON).unwrap();

        tl.json_to_xml(json_file.as_path()).unwrap();
        let renderer = &runner.calls()[1];
        assert_eq!(
            Path::new(renderer.args.last().unwrap()),
            json_file.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_invalid_json_fails_before_any_tool() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());
        let json_file = dir.path().join("broken.json");
        fs::write(&json_file, r#"{"name": "eth0", "#).unwrap();

        let err = tl.json_to_xml(json_file.as_path()).unwrap_err();
        assert!(matches!(err, YangError::InvalidJson(_)));
        assert!(runner.calls().is_empty());
        assert_eq!(entries(&dir.path().join("tmp").join(JSON2XML_SCRATCH)), 0);
    }

    #[test]
    fn test_missing_json_file() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());

        let err = tl.json_to_xml(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, YangError::InvalidInput(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_compiler_error_cleans_up() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().on("pyang", |_| {
            (None, ProcessOutput::ok("openconfig-interfaces.yang:1: error: unexpected keyword"))
        });
        let (tl, runner) = setup(dir.path(), runner);

        let err = tl.json_to_xml(json!({"a": 1})).unwrap_err();
        assert!(matches!(err, YangError::SchemaCompilation { format: OutputFormat::Jtox, .. }));
        assert_eq!(runner.calls_to("json2xml"), 0);
        assert_eq!(entries(&dir.path().join("tmp").join(JSON2XML_SCRATCH)), 0);
    }

    #[test]
    fn test_malformed_rendered_xml() {
        let dir = TempDir::new().unwrap();
        let runner = happy_runner().on("json2xml", |_| {
            (Some("<config><interfaces></config>".to_string()), ProcessOutput::ok(""))
        });
        let (tl, _) = setup(dir.path(), runner);

        let err = tl.json_to_xml(json!({"a": 1})).unwrap_err();
        assert!(matches!(err, YangError::XmlGeneration(_)));
        assert_eq!(entries(&dir.path().join("tmp").join(JSON2XML_SCRATCH)), 0);
    }

    #[test]
    fn test_keep_tmp_files_retains_workspace() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(happy_runner());
        let mut config = fake_config(dir.path());
        config.keep_tmp_files = true;
        let engine = Engine::new(config).with_runner(runner);
        let module = fake_module(dir.path(), "demo");
        let tl = engine
            .translator(&[module.to_string_lossy()], None, DocumentType::Config)
            .unwrap();

        tl.json_to_xml(json!({"demo:x": 1})).unwrap();
        assert_eq!(entries(&dir.path().join("tmp").join(JSON2XML_SCRATCH)), 1);
    }

    #[test]
    fn test_search_path_not_accumulated() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());

        tl.json_to_xml(json!({"a": 1})).unwrap();
        tl.json_to_xml(json!({"a": 1})).unwrap();

        let paths: Vec<usize> = runner
            .calls()
            .iter()
            .filter_map(|c| c.flag_value("-p"))
            .map(|p| p.to_string_lossy().split(':').count())
            .collect();
        assert_eq!(paths, vec![2, 2]);
    }

    #[test]
    fn test_xml_to_json_inline() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());

        let value = tl
            .xml_to_json("<data><interfaces xmlns=\"http://openconfig.net/yang/interfaces\"/></data>")
            .unwrap();
        assert_eq!(
            value["openconfig-interfaces:interfaces"]["interface"][0]["config"]["mtu"],
            1024
        );

        let calls = runner.calls();
        let pyang = &calls[0];
        assert_eq!(pyang.flag_value("-f"), Some(Path::new("jsonxsl")));
        assert_eq!(pyang.envs[0].0, crate::compiler::XSLT_DIR_ENV);
        assert_eq!(runner.calls_to("xsltproc"), 1);
        assert_eq!(entries(&dir.path().join("tmp").join(XML2JSON_SCRATCH)), 0);
    }

    #[test]
    fn test_xml_to_json_from_file() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());
        let xml_file = dir.path().join("running.xml");
        fs::write(&xml_file, "<?xml version=\"1.0\"?>\n<data/>").unwrap();

        tl.xml_to_json(&xml_file.to_string_lossy()).unwrap();
        let xslt = runner.calls().into_iter().last().unwrap();
        assert_eq!(
            Path::new(xslt.args.last().unwrap()),
            xml_file.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_xml_to_json_inline_leading_whitespace() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());

        tl.xml_to_json("\n  <?xml version=\"1.0\"?>\n<data/>").unwrap();
        assert_eq!(runner.calls_to("xsltproc"), 1);
    }

    #[test]
    fn test_xml_to_json_file_declaration_not_first() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());
        let xml_file = dir.path().join("indented.xml");
        fs::write(&xml_file, "\n<?xml version=\"1.0\"?>\n<data/>").unwrap();

        let err = tl.xml_to_json(&xml_file.to_string_lossy()).unwrap_err();
        assert!(matches!(err, YangError::InvalidXml(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_xml_to_json_invalid_input() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());

        let err = tl.xml_to_json("invalid path").unwrap_err();
        assert!(err.to_string().contains("Unable to create file or read XML data"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_xml_to_json_malformed_file() {
        let dir = TempDir::new().unwrap();
        let (tl, runner) = setup(dir.path(), happy_runner());
        let xml_file = dir.path().join("broken.xml");
        fs::write(&xml_file, "<data><interfaces></data>").unwrap();

        let err = tl.xml_to_json(&xml_file.to_string_lossy()).unwrap_err();
        assert!(matches!(err, YangError::InvalidXml(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_xml_to_json_missing_templates() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(happy_runner());
        let mut config = fake_config(dir.path());
        let empty = dir.path().join("empty-share");
        fs::create_dir_all(&empty).unwrap();
        config.tools.xslt_dir = Some(empty);
        let engine = Engine::new(config).with_runner(runner.clone());
        let module = fake_module(dir.path(), "demo");
        let tl = engine
            .translator(&[module.to_string_lossy()], None, DocumentType::Data)
            .unwrap();

        let err = tl.xml_to_json("<data/>").unwrap_err();
        assert!(matches!(err, YangError::MissingDependency(_)));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_xml_to_json_bad_processor_output() {
        let dir = TempDir::new().unwrap();
        let runner = happy_runner().on("xsltproc", |_| (Some("{\"a\": ".to_string()), ProcessOutput::ok("")));
        let (tl, _) = setup(dir.path(), runner);

        let err = tl.xml_to_json("<data/>").unwrap_err();
        assert!(matches!(err, YangError::JsonGeneration(_)));
        assert_eq!(entries(&dir.path().join("tmp").join(XML2JSON_SCRATCH)), 0);
    }

    #[test]
    fn test_json_input_from_arg() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("c.json");
        fs::write(&file, "{}").unwrap();

        assert!(matches!(JsonInput::from_arg(&file.to_string_lossy()).unwrap(), JsonInput::File(_)));
        assert_eq!(
            JsonInput::from_arg(r#"{"a": 1}"#).unwrap(),
            JsonInput::Document(json!({"a": 1}))
        );
        assert!(matches!(
            JsonInput::from_arg("nope.json"),
            Err(YangError::InvalidInput(_))
        ));
    }
}
