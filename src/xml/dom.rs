//! Document tree built incrementally from push-parser events.
//!
//! Elements live in one flat arena owned by [`Document`]; an [`ElemId`]
//! is an index into it. Parent links are plain indices used only for
//! upward traversal, so ownership stays with the arena and dropping a
//! `Document` frees one `Vec` regardless of how deep or wide the tree
//! is — no recursive destruction.

use crate::xml::push::{Event, PushParser, XmlError};

/// Index of an element inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElemId(usize);

/// A single attribute, owned by its element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    value: Option<String>,
    attrs: Vec<Attribute>,
    children: Vec<ElemId>,
    parent: Option<ElemId>,
}

/// One complete parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Element>,
}

impl Document {
    /// The top-level element. The first allocated node is always the
    /// root, and a `Document` is only handed out once it is complete.
    pub fn root(&self) -> ElemId {
        ElemId(0)
    }

    pub fn name(&self, id: ElemId) -> &str {
        &self.nodes[id.0].name
    }

    /// Text value of the element; empty when the element had none.
    pub fn value(&self, id: ElemId) -> &str {
        self.nodes[id.0].value.as_deref().unwrap_or("")
    }

    pub fn parent(&self, id: ElemId) -> Option<ElemId> {
        self.nodes[id.0].parent
    }

    /// Child ids in document order.
    pub fn children(&self, id: ElemId) -> &[ElemId] {
        &self.nodes[id.0].children
    }

    /// Attributes in document order.
    pub fn attributes(&self, id: ElemId) -> &[Attribute] {
        &self.nodes[id.0].attrs
    }

    /// First child with the given name, scanning in document order.
    pub fn find_child(&self, id: ElemId, name: &str) -> Option<ElemId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child.0].name == name)
    }

    /// Next sibling after `id` with the given name.
    pub fn find_next(&self, id: ElemId, name: &str) -> Option<ElemId> {
        let parent = self.nodes[id.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let pos = siblings.iter().position(|&sib| sib == id)?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|&sib| self.nodes[sib.0].name == name)
    }

    /// First attribute with the given name.
    pub fn find_attr(&self, id: ElemId, name: &str) -> Option<&Attribute> {
        self.nodes[id.0].attrs.iter().find(|attr| attr.name == name)
    }

    /// Total number of elements in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Incremental tree builder over a window of bytes.
///
/// One builder accumulates exactly one document; feed it windows of
/// input until [`DomBuilder::parse`] hands the completed tree back.
/// Bytes after the document's closing tag are never consumed, so the
/// caller keeps its own cursor using the returned count. A parse error
/// poisons the builder: the partial tree must be discarded with it.
#[derive(Debug)]
pub struct DomBuilder {
    parser: PushParser,
    nodes: Vec<Element>,
    /// Element currently being built
    cur: Option<ElemId>,
    /// Shared accumulator for content and attribute-value fragments;
    /// flushed only at element and attribute boundaries
    value: Vec<u8>,
}

impl Default for DomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DomBuilder {
    pub fn new() -> Self {
        Self {
            parser: PushParser::new(),
            nodes: Vec::new(),
            cur: None,
            value: Vec::new(),
        }
    }

    /// Consume bytes from `window` until one top-level element closes.
    ///
    /// Returns how many bytes were consumed, plus the completed tree if
    /// this window finished it. When the window ends first, everything
    /// was consumed and the next call resumes exactly where this one
    /// stopped.
    pub fn parse(&mut self, window: &[u8]) -> Result<(usize, Option<Document>), XmlError> {
        let mut consumed = 0;

        for &byte in window {
            let event = self.parser.step(byte)?;
            consumed += 1;

            match event {
                Event::None => {}

                Event::ElemStart => {
                    // trailing text seen so far belongs to the parent
                    if let Some(cur) = self.cur {
                        self.flush_into_element(cur)?;
                    }

                    let id = ElemId(self.nodes.len());
                    self.nodes.push(Element {
                        name: self.parser.elem_name().to_string(),
                        value: None,
                        attrs: Vec::new(),
                        children: Vec::new(),
                        parent: self.cur,
                    });
                    if let Some(cur) = self.cur {
                        self.nodes[cur.0].children.push(id);
                    }
                    self.cur = Some(id);
                }

                Event::Content | Event::AttrVal => {
                    self.value.extend_from_slice(self.parser.data());
                }

                Event::AttrStart => {
                    let cur = self.cur.ok_or(XmlError::Syntax)?;
                    self.nodes[cur.0].attrs.push(Attribute {
                        name: self.parser.attr_name().to_string(),
                        value: String::new(),
                    });
                }

                Event::AttrEnd => {
                    let cur = self.cur.ok_or(XmlError::Syntax)?;
                    let text = self.take_value()?;
                    match self.nodes[cur.0].attrs.last_mut() {
                        Some(attr) => attr.value.push_str(&text),
                        None => return Err(XmlError::Syntax),
                    }
                }

                Event::ElemEnd => {
                    let cur = self.cur.ok_or(XmlError::Syntax)?;
                    self.flush_into_element(cur)?;

                    match self.nodes[cur.0].parent {
                        None => {
                            // one complete top-level element; stop here
                            let doc = Document {
                                nodes: std::mem::take(&mut self.nodes),
                            };
                            self.cur = None;
                            return Ok((consumed, Some(doc)));
                        }
                        Some(parent) => self.cur = Some(parent),
                    }
                }
            }
        }

        Ok((consumed, None))
    }

    /// Drain the accumulator as UTF-8 text.
    fn take_value(&mut self) -> Result<String, XmlError> {
        let text = String::from_utf8(std::mem::take(&mut self.value))
            .map_err(|_| XmlError::Syntax)?;
        Ok(text)
    }

    fn flush_into_element(&mut self, id: ElemId) -> Result<(), XmlError> {
        let text = self.take_value()?;
        self.nodes[id.0]
            .value
            .get_or_insert_with(String::new)
            .push_str(&text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(input: &[u8]) -> Document {
        let mut builder = DomBuilder::new();
        let (consumed, doc) = builder.parse(input).unwrap();
        assert_eq!(consumed, input.len());
        doc.expect("document should be complete")
    }

    #[test]
    fn test_single_element_with_text() {
        let doc = parse_all(b"<response>ok</response>");

        let root = doc.root();
        assert_eq!(doc.name(root), "response");
        assert_eq!(doc.value(root), "ok");
        assert_eq!(doc.parent(root), None);
        assert!(doc.children(root).is_empty());
    }

    #[test]
    fn test_child_and_attribute_order_preserved() {
        let doc = parse_all(br#"<a><c x="1"/><c x="2"/></a>"#);

        let root = doc.root();
        assert_eq!(doc.name(root), "a");
        assert_eq!(doc.children(root).len(), 2);

        let first = doc.find_child(root, "c").unwrap();
        assert_eq!(doc.find_attr(first, "x").unwrap().value, "1");

        let second = doc.find_next(first, "c").unwrap();
        assert_eq!(doc.find_attr(second, "x").unwrap().value, "2");

        assert!(doc.find_next(second, "c").is_none());
    }

    #[test]
    fn test_parent_links() {
        let doc = parse_all(b"<a><b><c/></b></a>");

        let a = doc.root();
        let b = doc.find_child(a, "b").unwrap();
        let c = doc.find_child(b, "c").unwrap();

        assert_eq!(doc.parent(c), Some(b));
        assert_eq!(doc.parent(b), Some(a));
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn test_text_around_children_belongs_to_parent() {
        let doc = parse_all(b"<a>pre<b/>post</a>");

        let root = doc.root();
        assert_eq!(doc.value(root), "prepost");
        let b = doc.find_child(root, "b").unwrap();
        assert_eq!(doc.value(b), "");
    }

    #[test]
    fn test_attribute_value_with_references() {
        let doc = parse_all(br#"<a msg="a&amp;b"/>"#);

        let root = doc.root();
        assert_eq!(doc.find_attr(root, "msg").unwrap().value, "a&b");
    }

    #[test]
    fn test_multiple_attributes_in_order() {
        let doc = parse_all(br#"<m code="65536" warning="yes">W</m>"#);

        let root = doc.root();
        let attrs = doc.attributes(root);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].name, "code");
        assert_eq!(attrs[0].value, "65536");
        assert_eq!(attrs[1].name, "warning");
        assert_eq!(attrs[1].value, "yes");
    }

    #[test]
    fn test_trailing_bytes_left_unconsumed() {
        let mut builder = DomBuilder::new();
        let input = b"<a/><b/>";

        let (consumed, doc) = builder.parse(input).unwrap();

        assert_eq!(consumed, 4);
        assert_eq!(doc.unwrap().name(ElemId(0)), "a");
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let input = br#"<response> <message code="65536" warning="yes">warn &amp; more</message><error critical="no">e1</error> </response>"#;
        let whole = parse_all(input);

        // every two-window split
        for split in 1..input.len() {
            let mut builder = DomBuilder::new();
            let (consumed, doc) = builder.parse(&input[..split]).unwrap();
            let doc = match doc {
                Some(doc) => {
                    assert_eq!(consumed, input.len().min(split));
                    doc
                }
                None => {
                    assert_eq!(consumed, split);
                    let (_, doc) = builder.parse(&input[split..]).unwrap();
                    doc.expect("second window should complete the tree")
                }
            };
            assert_eq!(doc, whole);
        }

        // one byte per window
        let mut builder = DomBuilder::new();
        let mut finished = None;
        for &byte in input.iter() {
            let (consumed, doc) = builder.parse(&[byte]).unwrap();
            assert_eq!(consumed, 1);
            if let Some(doc) = doc {
                finished = Some(doc);
            }
        }
        assert_eq!(finished.expect("tree should complete"), whole);
    }

    #[test]
    fn test_error_aborts_parse() {
        let mut builder = DomBuilder::new();
        let err = builder.parse(b"<a><b></c></a>").unwrap_err();
        assert_eq!(err, XmlError::CloseTag);
    }

    #[test]
    fn test_empty_element_value_is_empty_string() {
        let doc = parse_all(b"<a></a>");
        assert_eq!(doc.value(doc.root()), "");
    }

    #[test]
    fn test_element_count() {
        let doc = parse_all(b"<a><b/><c/><d><e/></d></a>");
        assert_eq!(doc.len(), 5);
        assert!(!doc.is_empty());
    }
}
