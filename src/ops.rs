//! Caller-facing operations
//!
//! Each operation validates its inputs, runs one pipeline and attributes
//! any untyped failure to the operation by name.

use serde_json::Value;

use crate::engine::Engine;
use crate::error::Result;
use crate::schema::ModuleSource;
use crate::spec::{
    JsonSchemaOptions, SpecGenerator, SpecOptions, SpecReport, TreeSchemaOptions,
    XmlSchemaOptions,
};
use crate::translator::JsonInput;
use crate::types::DocumentType;

fn run<T>(operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    f().map_err(|e| e.within(operation))
}

fn with_generator<T>(
    engine: &Engine,
    source: &ModuleSource,
    search_path: Option<&str>,
    doctype: DocumentType,
    f: impl FnOnce(&SpecGenerator) -> Result<T>,
) -> Result<T> {
    let generator = engine.spec_generator(source, search_path, doctype)?;
    let value = f(&generator)?;
    generator.close()?;
    Ok(value)
}

/// Translate RFC 7951 JSON to an XML payload for `modules`
pub fn translate_json_to_xml<S: AsRef<str>>(
    engine: &Engine,
    modules: &[S],
    search_path: Option<&str>,
    doctype: DocumentType,
    input: impl Into<JsonInput>,
) -> Result<String> {
    run("translate_json_to_xml", || {
        engine
            .translator(modules, search_path, doctype)?
            .json_to_xml(input)
    })
}

/// Translate XML text or an XML file to RFC 7951 JSON for `modules`
pub fn translate_xml_to_json<S: AsRef<str>>(
    engine: &Engine,
    modules: &[S],
    search_path: Option<&str>,
    input: &str,
) -> Result<Value> {
    run("translate_xml_to_json", || {
        engine
            .translator(modules, search_path, DocumentType::default())?
            .xml_to_json(input)
    })
}

pub fn generate_tree_schema(
    engine: &Engine,
    source: &ModuleSource,
    search_path: Option<&str>,
    options: &TreeSchemaOptions,
) -> Result<String> {
    run("generate_tree_schema", || {
        with_generator(engine, source, search_path, DocumentType::default(), |g| {
            g.generate_tree(options)
        })
    })
}

pub fn generate_xml_schema(
    engine: &Engine,
    source: &ModuleSource,
    search_path: Option<&str>,
    doctype: DocumentType,
    options: &XmlSchemaOptions,
) -> Result<String> {
    run("generate_xml_schema", || {
        with_generator(engine, source, search_path, doctype, |g| {
            g.generate_xml_schema(options)
        })
    })
}

pub fn generate_json_schema(
    engine: &Engine,
    source: &ModuleSource,
    search_path: Option<&str>,
    doctype: DocumentType,
    options: &JsonSchemaOptions,
) -> Result<Value> {
    run("generate_json_schema", || {
        with_generator(engine, source, search_path, doctype, |g| {
            g.generate_json_schema(options)
        })
    })
}

/// All three spec renderings from one workspace
pub fn generate_spec(
    engine: &Engine,
    source: &ModuleSource,
    search_path: Option<&str>,
    doctype: DocumentType,
    options: &SpecOptions,
) -> Result<SpecReport> {
    run("generate_spec", || {
        with_generator(engine, source, search_path, doctype, |g| {
            g.generate_spec(options)
        })
    })
}
