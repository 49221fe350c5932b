//! XML well-formedness checks and normalization

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::Event;

pub const UTF8_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Whether `text` starts with an XML declaration
pub fn has_declaration(text: &str) -> bool {
    text.trim_start_matches('\u{feff}')
        .trim_start()
        .starts_with("<?xml")
}

/// Drop leading whitespace and byte order mark, then prefix a UTF-8
/// declaration unless the document already has one
pub fn ensure_declaration(text: &str) -> String {
    let body = text.trim_start_matches('\u{feff}').trim_start();
    if body.starts_with("<?xml") {
        body.to_string()
    } else {
        format!("{UTF8_DECLARATION}\n{body}")
    }
}

/// Parse `text` and re-serialize it without the XML declaration.
///
/// Fails unless the document holds exactly one root element and nothing but
/// whitespace, comments and processing instructions outside it.
pub fn canonicalize(text: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
    reader.config_mut().check_end_names = true;

    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut roots = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("at position {}: {e}", reader.buffer_position()))?;

        match &event {
            Event::Eof => break,
            Event::Decl(_) => continue,
            Event::Start(_) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Event::End(_) => {
                if depth == 0 {
                    return Err("closing tag without matching start".to_string());
                }
                depth -= 1;
            }
            Event::Empty(_) => {
                if depth == 0 {
                    roots += 1;
                }
            }
            Event::Text(t) if depth == 0 => {
                let content = t.unescape().map_err(|e| e.to_string())?;
                if !content.trim().is_empty() {
                    return Err(format!("text outside of root element: {}", content.trim()));
                }
                // Whitespace between prolog items is dropped
                continue;
            }
            Event::CData(_) if depth == 0 => {
                return Err("CDATA outside of root element".to_string());
            }
            _ => {}
        }

        if roots > 1 {
            return Err("document has more than one root element".to_string());
        }
        writer.write_event(event).map_err(|e| e.to_string())?;
    }

    if depth != 0 {
        return Err("unexpected end of document".to_string());
    }
    if roots == 0 {
        return Err("document has no root element".to_string());
    }

    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

/// Check that `text` is a well-formed XML document
pub fn check_well_formed(text: &str) -> Result<(), String> {
    canonicalize(text).map(|_| ())
}
