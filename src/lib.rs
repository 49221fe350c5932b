//! yang-translate - YANG-driven JSON/XML translation and spec generation
//!
//! This library translates RFC 7951 JSON configuration into NETCONF XML
//! payloads and back, and renders tree diagrams and sample instance
//! documents for a set of YANG modules. The schema work itself is done by
//! the external `pyang`, `json2xml` and `xsltproc` tools, run as
//! subprocesses inside a per-call scratch workspace.
//!
//! # Example
//!
//! ```no_run
//! use yang_translate::{DocumentType, Engine, EngineConfig, ModuleSource, TreeSchemaOptions};
//! use yang_translate::ops;
//!
//! let engine = Engine::new(EngineConfig::load(None).unwrap());
//!
//! // JSON to XML for a single module
//! let json = serde_json::json!({
//!     "openconfig-interfaces:interfaces": {
//!         "interface": [{"name": "eth0", "config": {"name": "eth0", "enabled": true}}]
//!     }
//! });
//! let xml = ops::translate_json_to_xml(
//!     &engine,
//!     &["yang/openconfig-interfaces.yang"],
//!     None,
//!     DocumentType::Config,
//!     json,
//! )
//! .unwrap();
//!
//! // Tree diagram for every module in a directory
//! let tree = ops::generate_tree_schema(
//!     &engine,
//!     &ModuleSource::file("yang/*.yang"),
//!     None,
//!     &TreeSchemaOptions::default(),
//! )
//! .unwrap();
//! ```

pub mod compiler;
mod config;
mod engine;
mod error;
pub mod fetch;
pub mod locate;
pub mod ops;
pub mod process;
pub mod schema;
mod spec;
#[cfg(test)]
mod testing;
mod translator;
mod types;
pub mod workspace;
pub mod xml;

pub use compiler::{OutputFormat, SchemaCompiler};
pub use config::{CONFIG_FILE_NAME, EngineConfig, KEEP_TMP_FILES_ENV, ToolPaths};
pub use engine::Engine;
pub use error::{Result, YangError};
pub use fetch::{FetchReport, SchemaSource, SchemaStore};
pub use schema::{ModuleSource, Schema, SearchPath};
pub use spec::{
    JsonSchemaOptions, SpecGenerator, SpecOptions, SpecReport, TreeSchemaOptions,
    XmlSchemaOptions,
};
pub use translator::{JsonInput, Translator};
pub use types::DocumentType;
pub use workspace::Workspace;
