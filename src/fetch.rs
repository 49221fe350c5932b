//! Breadth-first retrieval of a schema and everything it imports
//!
//! The transport is abstracted behind [`SchemaSource`]. [`NetconfSource`]
//! adapts any [`NetconfSession`] using the `ietf-netconf-monitoring`
//! `<get>` filter and `<get-schema>` RPC; [`DirectorySource`] serves
//! modules from a local directory.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, YangError};

pub const MONITORING_NS: &str = "urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring";

/// Subtree filter selecting the schema list of `ietf-netconf-monitoring`
pub const SCHEMAS_FILTER: &str = r#"<filter type="subtree" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0"><netconf-state xmlns="urn:ietf:params:xml:ns:yang:ietf-netconf-monitoring"><schemas/></netconf-state></filter>"#;

/// Something that can list and return YANG schemas
pub trait SchemaSource {
    /// Identifiers of every schema the source can return
    fn catalog(&self) -> Result<BTreeSet<String>>;

    /// YANG text of one schema
    fn get_schema(&self, identifier: &str) -> Result<String>;
}

/// NETCONF operations needed to fetch schemas
pub trait NetconfSession {
    /// `<get>` with a subtree filter, returning the raw reply
    fn get(&self, filter: &str) -> Result<String>;

    /// Send an arbitrary RPC, returning the raw reply
    fn dispatch(&self, rpc: &str) -> Result<String>;
}

/// `<get-schema>` RPC body for `identifier`
pub fn get_schema_request(identifier: &str) -> String {
    format!(
        "<get-schema xmlns=\"{MONITORING_NS}\"><identifier>{}</identifier></get-schema>",
        quick_xml::escape::escape(identifier)
    )
}

/// Identifiers listed in a `netconf-state/schemas` reply
pub fn parse_schema_catalog(xml: &str) -> Result<BTreeSet<String>> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut identifiers = BTreeSet::new();
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(e.local_name().as_ref().to_vec());
                current.clear();
            }
            Ok(Event::Text(t)) if in_identifier(&path) => {
                let text = t.unescape().map_err(|e| YangError::Fetch(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(_)) => {
                if in_identifier(&path) && !current.trim().is_empty() {
                    identifiers.insert(current.trim().to_string());
                }
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(YangError::Fetch(format!(
                    "malformed schema list at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(YangError::Fetch("truncated schema list".to_string()));
    }
    Ok(identifiers)
}

fn in_identifier(path: &[Vec<u8>]) -> bool {
    matches!(path, [.., schema, identifier] if schema == b"schema" && identifier == b"identifier")
}

/// YANG text carried in the `<data>` element of a `<get-schema>` reply
pub fn parse_schema_reply(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut depth_in_data: Option<usize> = None;
    let mut depth = 0usize;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth_in_data.is_none() && e.local_name().as_ref() == b"data" {
                    depth_in_data = Some(depth);
                }
            }
            Ok(Event::End(_)) => {
                if depth_in_data == Some(depth) {
                    return Ok(text);
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(t)) if depth_in_data.is_some() => {
                let chunk = t.unescape().map_err(|e| YangError::Fetch(e.to_string()))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(c)) if depth_in_data.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(YangError::Fetch(format!(
                    "malformed get-schema reply at position {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Err(YangError::Fetch(
        "get-schema reply carries no data element".to_string(),
    ))
}

/// Drop comments and neutralize quoted strings.
///
/// Strings that look like identifiers keep their content so quoted module
/// names survive; any other string becomes `""`.
fn strip_comments_and_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            '"' | '\'' => {
                let mut content = String::new();
                while let Some(next) = chars.next() {
                    if next == c {
                        break;
                    }
                    if c == '"' && next == '\\' {
                        if let Some(escaped) = chars.next() {
                            content.push(escaped);
                        }
                        continue;
                    }
                    content.push(next);
                }
                let identifier = !content.is_empty()
                    && content
                        .chars()
                        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
                out.push('"');
                if identifier {
                    out.push_str(&content);
                }
                out.push('"');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Modules named by `import` and `include` statements, in order of appearance
pub fn dependencies(text: &str) -> Result<Vec<String>> {
    let pattern = Regex::new(r#"(?:^|[;{}])\s*(?:import|include)\s+["']?([A-Za-z_][\w.\-]*)"#)
        .map_err(|e| YangError::Fetch(e.to_string()))?;
    let cleaned = strip_comments_and_strings(text);
    let mut seen = BTreeSet::new();
    Ok(pattern
        .captures_iter(&cleaned)
        .map(|c| c[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect())
}

/// [`SchemaSource`] over a NETCONF session
#[derive(Debug)]
pub struct NetconfSource<N> {
    session: N,
}

impl<N: NetconfSession> NetconfSource<N> {
    pub fn new(session: N) -> Self {
        Self { session }
    }
}

impl<N: NetconfSession> SchemaSource for NetconfSource<N> {
    fn catalog(&self) -> Result<BTreeSet<String>> {
        let reply = self.session.get(SCHEMAS_FILTER)?;
        parse_schema_catalog(&reply)
    }

    fn get_schema(&self, identifier: &str) -> Result<String> {
        let reply = self.session.dispatch(&get_schema_request(identifier))?;
        parse_schema_reply(&reply)
    }
}

/// [`SchemaSource`] serving `<identifier>.yang` files from a directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(YangError::InvalidSearchPath(dir));
        }
        Ok(Self { dir })
    }
}

impl SchemaSource for DirectorySource {
    fn catalog(&self) -> Result<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "yang") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.insert(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    fn get_schema(&self, identifier: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(format!("{identifier}.yang")))
            .map_err(|e| YangError::Fetch(format!("{identifier}: {e}")))
    }
}

/// Outcome of [`SchemaStore::fetch`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Root schema and all its transitive dependencies
    pub fetched: BTreeMap<String, String>,
    /// Schemas retrieved from the source during this run
    pub count: usize,
    pub changed: bool,
}

impl FetchReport {
    /// Write every schema as `<dir>/<identifier>.yang`
    pub fn persist(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.fetched.len());
        for (identifier, text) in &self.fetched {
            let path = dir.join(format!("{identifier}.yang"));
            fs::write(&path, text)?;
            written.push(path);
        }
        debug!(dir = %dir.display(), files = written.len(), "persisted schemas");
        Ok(written)
    }
}

/// Caches schemas fetched from a [`SchemaSource`]
#[derive(Debug)]
pub struct SchemaStore<S> {
    source: S,
    catalog: Option<BTreeSet<String>>,
    cache: BTreeMap<String, String>,
}

impl<S: SchemaSource> SchemaStore<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            catalog: None,
            cache: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Every schema fetched so far
    pub fn cached(&self) -> &BTreeMap<String, String> {
        &self.cache
    }

    /// Fetch `root` and, breadth first, everything it imports or includes.
    ///
    /// Schemas already cached are not requested again.
    pub fn fetch(&mut self, root: &str) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let mut queue = VecDeque::from([root.to_string()]);

        while let Some(identifier) = queue.pop_front() {
            if report.fetched.contains_key(&identifier) {
                continue;
            }

            let text = match self.cache.get(&identifier) {
                Some(text) => text.clone(),
                None => {
                    let text = self.retrieve(&identifier)?;
                    report.count += 1;
                    self.cache.insert(identifier.clone(), text.clone());
                    text
                }
            };

            for dependency in dependencies(&text)? {
                if !report.fetched.contains_key(&dependency) && dependency != identifier {
                    queue.push_back(dependency);
                }
            }
            report.fetched.insert(identifier, text);
        }

        report.changed = report.count > 0;
        info!(
            root,
            total = report.fetched.len(),
            fetched = report.count,
            "schema fetch complete"
        );
        Ok(report)
    }

    fn retrieve(&mut self, identifier: &str) -> Result<String> {
        if self.catalog.is_none() {
            self.catalog = Some(self.source.catalog()?);
        }
        let advertised = self
            .catalog
            .as_ref()
            .is_some_and(|c| c.contains(identifier));
        if !advertised {
            return Err(YangError::Fetch(format!("'{identifier}' yang model is not advertised")));
        }

        let text = self.source.get_schema(identifier)?;
        debug!(identifier, bytes = text.len(), "fetched schema");
        Ok(text)
    }
}
