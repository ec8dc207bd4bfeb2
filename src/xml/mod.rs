//! Permissive XML handling for feed documents.
//!
//! The feed protocol is Atom with Google extension namespaces, but nothing
//! here validates against a schema. Documents parse into a generic
//! [`Element`] tree in document order; callers look children up by their
//! qualified name (`gsx:duedate`, `gs:cell`) and coerce shapes themselves.
//!
//! Row saves are textual patches of the originally received `<entry>`
//! fragment, so [`entry_fragments`] recovers those verbatim regions from the
//! raw body alongside the parsed tree.

use crate::errors::{FeedError, FeedResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;

/// One parsed XML element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Qualified element name, prefix included (`gs:rowCount`).
    pub name: String,
    /// Attributes by qualified name, entity references resolved.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated character data, entity references resolved.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// First child with the given qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given qualified name, in document order.
    ///
    /// This is the cardinality normalizer for the schemaless feed: an absent
    /// element yields an empty vector, a single sibling a one-element vector,
    /// repeated siblings all of them.
    pub fn children_named(&self, name: &str) -> Vec<&Element> {
        self.children.iter().filter(|c| c.name == name).collect()
    }

    /// Text of the first child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// Attribute value by qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Parses a UTF-8 XML document into its root [`Element`].
///
/// Whitespace-only text is dropped; CDATA folds into element text. Any
/// tokenizer error surfaces as [`FeedError::Parse`].
pub fn parse_document(xml: &str) -> FeedResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                let element = element_from_tag(&start)?;
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from_tag(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FeedError::Parse("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| FeedError::Parse(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(FeedError::Parse(e.to_string())),
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(FeedError::Parse("unexpected end of document".to_string()));
    }

    root.ok_or_else(|| FeedError::Parse("document has no root element".to_string()))
}

fn element_from_tag(tag: &quick_xml::events::BytesStart<'_>) -> FeedResult<Element> {
    let mut element = Element {
        name: String::from_utf8_lossy(tag.name().as_ref()).into_owned(),
        ..Element::default()
    };
    for attribute in tag.attributes() {
        let attribute = attribute.map_err(|e| FeedError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| FeedError::Parse(e.to_string()))?
            .into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> FeedResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(FeedError::Parse(
                    "multiple root elements".to_string(),
                ));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

/// Escapes `& < > "` for embedding in element or attribute text.
pub fn xml_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Normalizes a column name to the feed's tag convention: whitespace and
/// underscores stripped, lower-cased.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Extracts the verbatim `<entry ...>...</entry>` regions of a feed body, in
/// document order. Entries do not nest in the feed protocol.
pub fn entry_fragments(raw: &str) -> Vec<&str> {
    const OPEN: &str = "<entry";
    const CLOSE: &str = "</entry>";

    let mut fragments = Vec::new();
    let mut pos = 0;
    while let Some(found) = raw[pos..].find(OPEN) {
        let start = pos + found;
        // Require a real tag boundary, not a longer name like <entryset>.
        match raw.as_bytes().get(start + OPEN.len()) {
            Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {}
            _ => {
                pos = start + OPEN.len();
                continue;
            }
        }
        let Some(close) = raw[start..].find(CLOSE) else {
            break;
        };
        let end = start + close + CLOSE.len();
        fragments.push(&raw[start..end]);
        pos = end;
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_document() {
        let root = parse_document(
            "<feed><title type=\"text\">My Sheet</title><entry><id>a</id></entry></feed>",
        )
        .unwrap();
        assert_eq!(root.name, "feed");
        assert_eq!(root.child_text("title"), Some("My Sheet"));
        assert_eq!(root.child("title").unwrap().attr("type"), Some("text"));
        assert_eq!(root.child("entry").unwrap().child_text("id"), Some("a"));
    }

    #[test]
    fn children_cardinality_normalizes() {
        let root =
            parse_document("<feed><entry>1</entry><entry>2</entry><other/></feed>").unwrap();

        let none = root.children_named("missing");
        assert!(none.is_empty());

        let one = root.children_named("other");
        assert_eq!(one.len(), 1);

        let many = root.children_named("entry");
        assert_eq!(many.len(), 2);
        assert_eq!(many[0].text, "1");
        assert_eq!(many[1].text, "2");
    }

    #[test]
    fn empty_element_has_empty_text() {
        let root = parse_document("<entry><gsx:notes/><gsx:name>x</gsx:name></entry>").unwrap();
        assert_eq!(root.child_text("gsx:notes"), Some(""));
        assert_eq!(root.child_text("gsx:name"), Some("x"));
    }

    #[test]
    fn escape_then_parse_round_trips() {
        let original = "a & b < c > d \"quoted\"";
        let doc = format!("<v>{}</v>", xml_escape(original));
        let root = parse_document(&doc).unwrap();
        assert_eq!(root.text, original);
    }

    #[test]
    fn escape_of_empty_is_empty() {
        assert_eq!(xml_escape(""), "");
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_document("").is_err());
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("<a>").is_err());
    }

    #[test]
    fn column_name_normalization() {
        assert_eq!(normalize_column_name("Due Date"), "duedate");
        assert_eq!(normalize_column_name("foo_bar"), "foobar");
        assert_eq!(normalize_column_name(""), "");
        assert_eq!(normalize_column_name("A  B__C"), "abc");
    }

    #[test]
    fn extracts_entry_fragments() {
        let raw = "<feed><entry><gsx:a>1</gsx:a></entry>\n<entry gd:etag=\"x\"><gsx:a>2</gsx:a></entry></feed>";
        let fragments = entry_fragments(raw);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0], "<entry><gsx:a>1</gsx:a></entry>");
        assert!(fragments[1].starts_with("<entry gd:etag=\"x\">"));
    }

    #[test]
    fn fragment_scan_skips_longer_tag_names() {
        let raw = "<feed><entryset>no</entryset><entry>yes</entry></feed>";
        let fragments = entry_fragments(raw);
        assert_eq!(fragments, vec!["<entry>yes</entry>"]);
    }

    #[test]
    fn cdata_folds_into_text() {
        let root = parse_document("<v><![CDATA[a & b]]></v>").unwrap();
        assert_eq!(root.text, "a & b");
    }
}
