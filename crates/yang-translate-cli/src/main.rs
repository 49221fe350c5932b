use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use serde_json::json;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

use yang_translate::fetch::DirectorySource;
use yang_translate::{
    DocumentType, Engine, EngineConfig, JsonInput, JsonSchemaOptions, ModuleSource, SchemaStore,
    SpecOptions, TreeSchemaOptions, XmlSchemaOptions, YangError, ops,
};

#[derive(Parser)]
#[command(name = "yangtx", version, about = "YANG-driven JSON/XML translation and spec generation")]
struct Cli {
    /// Configuration file (defaults to ./yangtx.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep the scratch workspace of every call
    #[arg(long, global = true, default_value_t = false)]
    keep_tmp_files: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate RFC 7951 JSON to an XML payload
    Json2xml {
        /// YANG module files or glob patterns
        #[arg(short, long = "file", required = true)]
        files: Vec<String>,
        /// Colon-separated import search path
        #[arg(short, long)]
        search_path: Option<String>,
        #[arg(long, default_value = "config", value_parser = parse_doctype)]
        doctype: DocumentType,
        /// JSON file or inline JSON document
        json: String,
    },
    /// Translate an XML payload to RFC 7951 JSON
    Xml2json {
        #[arg(short, long = "file", required = true)]
        files: Vec<String>,
        #[arg(short, long)]
        search_path: Option<String>,
        /// XML file or inline XML document
        xml: String,
    },
    /// Render tree, XML and JSON skeletons for a module set
    Spec {
        #[arg(short, long = "file", required_unless_present = "content", conflicts_with = "content")]
        files: Vec<String>,
        /// Single YANG module given by content rather than by reference
        #[arg(long)]
        content: Option<PathBuf>,
        #[arg(short, long)]
        search_path: Option<String>,
        #[arg(long, default_value = "config", value_parser = parse_doctype)]
        doctype: DocumentType,
        /// Fill leaves with their default values
        #[arg(long, default_value_t = false)]
        defaults: bool,
        /// Annotate the XML skeleton with node types
        #[arg(long, default_value_t = false)]
        annotations: bool,
        #[arg(long)]
        tree_out: Option<PathBuf>,
        #[arg(long)]
        xml_out: Option<PathBuf>,
        #[arg(long)]
        json_out: Option<PathBuf>,
        /// Print a single rendering instead of the full report
        #[arg(long, value_enum)]
        only: Option<Rendering>,
    },
    /// Collect a module and its transitive imports from a directory
    Fetch {
        /// Directory holding `<module>.yang` files
        #[arg(long)]
        from: PathBuf,
        /// Directory the collected modules are written to
        #[arg(long)]
        to: PathBuf,
        /// Root module name
        schema: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Rendering {
    Tree,
    Xml,
    Json,
}

fn parse_doctype(raw: &str) -> std::result::Result<DocumentType, YangError> {
    raw.parse()
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn load_engine(config: Option<&Path>, keep_tmp_files: bool) -> Result<Engine> {
    let mut config = EngineConfig::load(config)?;
    if keep_tmp_files {
        config.keep_tmp_files = true;
    }
    debug!(tmp_dir = %config.tmp_dir.display(), keep = config.keep_tmp_files, "loaded configuration");
    Ok(Engine::new(config))
}

impl Commands {
    fn run(self, engine: &Engine) -> Result<()> {
        match self {
            Commands::Json2xml {
                files,
                search_path,
                doctype,
                json,
            } => {
                let input = JsonInput::from_arg(&json)?;
                let xml = ops::translate_json_to_xml(engine, &files, search_path.as_deref(), doctype, input)?;
                println!("{xml}");
            }
            Commands::Xml2json {
                files,
                search_path,
                xml,
            } => {
                let value = ops::translate_xml_to_json(engine, &files, search_path.as_deref(), &xml)?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Commands::Spec {
                files,
                content,
                search_path,
                doctype,
                defaults,
                annotations,
                tree_out,
                xml_out,
                json_out,
                only,
            } => {
                let source = match content {
                    Some(path) => ModuleSource::Content(
                        fs::read_to_string(&path)
                            .wrap_err_with(|| format!("reading {}", path.display()))?,
                    ),
                    None => ModuleSource::Files(files),
                };
                let search_path = search_path.as_deref();
                let tree = TreeSchemaOptions { path: tree_out };
                let xml = XmlSchemaOptions {
                    path: xml_out,
                    defaults,
                    annotations,
                };
                let json = JsonSchemaOptions {
                    path: json_out,
                    defaults,
                };

                match only {
                    Some(Rendering::Tree) => {
                        print!("{}", ops::generate_tree_schema(engine, &source, search_path, &tree)?);
                    }
                    Some(Rendering::Xml) => {
                        print!("{}", ops::generate_xml_schema(engine, &source, search_path, doctype, &xml)?);
                    }
                    Some(Rendering::Json) => {
                        let value = ops::generate_json_schema(engine, &source, search_path, doctype, &json)?;
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    None => {
                        let options = SpecOptions { tree, xml, json };
                        let report = ops::generate_spec(engine, &source, search_path, doctype, &options)?;
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    }
                }
            }
            Commands::Fetch { from, to, schema } => {
                let mut store = SchemaStore::new(DirectorySource::new(from)?);
                let report = store.fetch(&schema)?;
                report.persist(&to)?;
                info!(count = report.count, dir = %to.display(), "collected schemas");
                let summary = json!({
                    "changed": report.changed,
                    "count": report.count,
                    "fetched": report.fetched.keys().collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let engine = load_engine(cli.config.as_deref(), cli.keep_tmp_files)?;
    cli.cmd.run(&engine)
}
