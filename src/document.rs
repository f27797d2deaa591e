//! Reading and writing of settings documents.
//!
//! Documents are small XML files: a single root element, nested `group` and
//! `attribute` elements, and attribute-heavy metadata. This module exposes
//! them as a plain [`Element`] tree so the rest of the crate never touches
//! parser events directly.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use quick_xml::escape::{EscapeError, resolve_xml_entity};
use quick_xml::events::{BytesDecl, BytesEnd, BytesRef, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unable to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: quick_xml::Error,
    },
    #[error("{path} is not a settings document")]
    Malformed { path: PathBuf },
    #[error("Unable to create {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unable to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One document element with its attributes in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.as_str() == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing any existing value under the same name.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Parse the document at `path` into its root element.
pub fn read_document(path: &Path) -> Result<Element, DocumentError> {
    let file = File::open(path).map_err(|source| DocumentError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    parse_with(&mut reader, path)
}

/// Parse an in-memory document, reporting errors against `origin`.
pub fn parse_str(content: &str, origin: &Path) -> Result<Element, DocumentError> {
    let mut reader = Reader::from_reader(content.as_bytes());
    parse_with(&mut reader, origin)
}

fn parse_with<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    path: &Path,
) -> Result<Element, DocumentError> {
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(element_from_tag(e)),
            Ok(Event::Empty(ref e)) => attach(element_from_tag(e), &mut stack, &mut root),
            Ok(Event::End(_)) => {
                if let Some(mut done) = stack.pop() {
                    // Whitespace between child elements is indentation, not
                    // content. Leaf bodies are kept verbatim.
                    if !done.children.is_empty() && done.text.chars().all(char::is_whitespace) {
                        done.text.clear();
                    }
                    attach(done, &mut stack, &mut root);
                }
            }
            Ok(Event::Text(ref t)) => {
                if let Some(open) = stack.last_mut() {
                    let text = match t.xml_content() {
                        Ok(text) => text.into_owned(),
                        Err(_) => String::from_utf8_lossy(t.as_ref()).into_owned(),
                    };
                    open.text.push_str(&text);
                }
            }
            Ok(Event::GeneralRef(ref r)) => {
                if let Some(open) = stack.last_mut() {
                    open.text.push_str(&resolve_reference(r, path)?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(source) => {
                return Err(DocumentError::Parse {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
        buf.clear();
    }
    root.ok_or_else(|| DocumentError::Malformed {
        path: path.to_path_buf(),
    })
}

fn element_from_tag(tag: &BytesStart<'_>) -> Element {
    let mut element = Element::new(String::from_utf8_lossy(tag.name().as_ref()).into_owned());
    for attr in tag.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.attributes.push((key, value));
    }
    element
}

/// Resolve a `&...;` reference from element content to its replacement text.
///
/// Character references and the five predefined entities are supported; any
/// other entity is a parse error, as these documents carry no DTD.
fn resolve_reference(reference: &BytesRef<'_>, path: &Path) -> Result<String, DocumentError> {
    let map_parse = |source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    };
    if let Some(resolved) = reference.resolve_char_ref().map_err(map_parse)? {
        return Ok(resolved.to_string());
    }
    let name = match reference.decode() {
        Ok(name) => name.into_owned(),
        Err(_) => String::from_utf8_lossy(reference.as_ref()).into_owned(),
    };
    match resolve_xml_entity(&name) {
        Some(resolved) => Ok(resolved.to_string()),
        None => Err(map_parse(
            EscapeError::UnrecognizedEntity(0..name.len(), name).into(),
        )),
    }
}

fn attach(element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Write `root` to `path` as an indented UTF-8 document.
pub fn write_document(path: &Path, root: &Element) -> Result<(), DocumentError> {
    let file = File::create(path).map_err(|source| DocumentError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = Writer::new_with_indent(BufWriter::new(file), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    write_element(&mut writer, root, path)?;
    let mut out = writer.into_inner();
    out.write_all(b"\n")
        .and_then(|_| out.flush())
        .map_err(|source| DocumentError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

fn write_element<W: Write>(
    writer: &mut Writer<W>,
    element: &Element,
    path: &Path,
) -> Result<(), DocumentError> {
    let map_write = |source| DocumentError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if element.children.is_empty() && element.text.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(map_write);
    }
    writer.write_event(Event::Start(start)).map_err(map_write)?;
    if !element.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(element.text.as_str())))
            .map_err(map_write)?;
    }
    for child in &element.children {
        write_element(writer, child, path)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(map_write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Element {
        let mut root = Element::new("ConfigurationSettings");
        root.set_attr("version", "0.6.0");
        let mut group = Element::new("group");
        group.set_attr("name", "settings");
        let mut attribute = Element::new("attribute");
        attribute.set_attr("name", "Threads");
        attribute.set_attr("type", "int");
        attribute.text = "4".into();
        group.children.push(attribute);
        root.children.push(group);
        root
    }

    #[test]
    fn writes_and_reparses_documents() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("doc.cfg");
        let document = sample();
        write_document(&path, &document).expect("write");
        let restored = read_document(&path).expect("read");
        assert_eq!(restored, document);
    }

    #[test]
    fn escapes_markup_in_attributes_and_text() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("escaped.cfg");
        let mut document = Element::new("root");
        document.set_attr("label", "A & B <C>");
        document.text = "x < y & \"z\"".into();
        write_document(&path, &document).expect("write");
        let restored = read_document(&path).expect("read");
        assert_eq!(restored.attr("label"), Some("A & B <C>"));
        assert_eq!(restored.text, "x < y & \"z\"");
    }

    #[test]
    fn leaf_text_keeps_its_padding() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("padded.cfg");
        let mut document = Element::new("root");
        let mut padded = Element::new("attribute");
        padded.set_attr("name", "Banner");
        padded.set_attr("type", "text");
        padded.text = "  two spaces each side  ".into();
        document.children.push(padded);
        let mut blank = Element::new("attribute");
        blank.set_attr("name", "Separator");
        blank.set_attr("type", "text");
        blank.text = " ".into();
        document.children.push(blank);
        write_document(&path, &document).expect("write");
        let restored = read_document(&path).expect("read");
        assert_eq!(restored, document);
    }

    #[test]
    fn character_and_entity_references_resolve_in_text() {
        let root = parse_str(
            "<root>&#65;&#x42;&amp;&lt;&gt;&apos;&quot;</root>",
            Path::new("mem.cfg"),
        )
        .expect("parse");
        assert_eq!(root.text, "AB&<>'\"");
    }

    #[test]
    fn undefined_entities_do_not_parse() {
        let error = parse_str("<root>&nbsp;</root>", Path::new("mem.cfg")).unwrap_err();
        assert!(matches!(error, DocumentError::Parse { .. }));
    }

    #[test]
    fn empty_input_has_no_root() {
        let error = parse_str("", Path::new("empty.cfg")).unwrap_err();
        assert!(matches!(error, DocumentError::Malformed { .. }));
    }

    #[test]
    fn mismatched_tags_do_not_parse() {
        assert!(parse_str("<a><b></a>", Path::new("bad.cfg")).is_err());
    }

    #[test]
    fn missing_files_report_the_path() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("absent.cfg");
        let error = read_document(&path).unwrap_err();
        assert!(matches!(error, DocumentError::Open { .. }));
        assert!(error.to_string().contains("absent.cfg"));
    }

    #[test]
    fn set_attr_replaces_existing_values() {
        let mut element = Element::new("e");
        element.set_attr("name", "first");
        element.set_attr("name", "second");
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.attr("name"), Some("second"));
    }

    #[test]
    fn self_closing_elements_parse_as_children() {
        let root = parse_str(
            "<root><child name=\"a\"/><child name=\"b\"/></root>",
            Path::new("mem.cfg"),
        )
        .expect("parse");
        let names: Vec<_> = root
            .children_named("child")
            .filter_map(|child| child.attr("name"))
            .collect();
        assert_eq!(names, ["a", "b"]);
    }
}
