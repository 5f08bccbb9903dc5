//! Byte-at-a-time XML push parser.
//!
//! The parser consumes exactly one byte per call and reports what that
//! byte completed, so input can be cut at any position and resumed
//! without re-scanning. It recognizes the subset of XML the device
//! emits: elements, quoted attributes, character data, entity
//! references and comments. Processing instructions are always an
//! error, as are DOCTYPE and CDATA sections.
//!
//! ## Event protocol
//!
//! [`PushParser::step`] returns an [`Event`]; names and data fragments
//! are read back through accessors valid until the next `step` call:
//! - `ElemStart` / `AttrStart`: the name is in [`PushParser::elem_name`]
//!   / [`PushParser::attr_name`]
//! - `Content` / `AttrVal`: the decoded fragment (a byte, or one
//!   decoded reference) is in [`PushParser::data`]
//!
//! Open element names are kept on an internal stack to verify closing
//! tags; the stack is bounded, and exceeding the bound is an error
//! rather than unbounded growth.

use std::fmt;

/// Total bytes of open element names the parser will track.
const STACK_LIMIT: usize = 4096;

/// Longest accepted entity reference body (`&#1114111;`).
const REF_LIMIT: usize = 8;

/// Parse failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlError {
    /// Unknown or malformed entity reference
    Reference,
    /// Closing tag does not match the open element
    CloseTag,
    /// Open-element stack exhausted
    StackOverflow,
    /// Anything else that violates the grammar
    Syntax,
    /// Processing instructions are not supported
    ProcessingInstruction,
    /// Input ended in the middle of a document
    UnexpectedEof,
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            XmlError::Reference => "invalid reference",
            XmlError::CloseTag => "unknown close tag",
            XmlError::StackOverflow => "parser stack overflow",
            XmlError::Syntax => "syntax error",
            XmlError::ProcessingInstruction => "processing instruction not supported",
            XmlError::UnexpectedEof => "unexpected end of input",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for XmlError {}

/// What one consumed byte completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Nothing observable yet
    None,
    /// An element opened; its name is available
    ElemStart,
    /// One fragment of character data is available
    Content,
    /// The current element closed
    ElemEnd,
    /// An attribute name completed
    AttrStart,
    /// One fragment of the attribute value is available
    AttrVal,
    /// The current attribute value closed
    AttrEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefFrom {
    Content,
    Attr(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between documents, or before the first one
    Prolog,
    /// `<` seen, kind of markup still unknown
    TagOpen,
    /// Accumulating an open tag name
    OpenName,
    /// Inside an open tag, between attributes
    InTag,
    /// Accumulating an attribute name
    AttrName,
    /// Attribute name done, `=` still expected
    AttrAfterName,
    /// `=` seen, opening quote expected
    AttrEq,
    /// Inside a quoted attribute value
    AttrValue(u8),
    /// `/` seen inside an open tag
    SelfClose,
    /// Character data inside an element
    Content,
    /// Accumulating a closing tag name
    CloseName,
    /// Closing tag name done, `>` expected
    CloseEnd,
    /// Accumulating an entity reference body
    Reference(RefFrom),
    /// `<!` seen
    CommentBang,
    /// `<!-` seen
    CommentOpen,
    /// Inside a comment
    Comment,
    /// `-` seen inside a comment
    CommentDash,
    /// `--` seen, `>` expected
    CommentClose,
}

/// Resumable single-document push parser.
#[derive(Debug)]
pub struct PushParser {
    state: State,
    /// Name of the element being opened (last ElemStart)
    name_buf: String,
    /// Name of the attribute being parsed (last AttrStart)
    attr_buf: String,
    /// Closing tag name being matched
    close_buf: String,
    /// Entity reference body being accumulated
    ref_buf: Vec<u8>,
    /// Fragment reported with Content/AttrVal
    data_buf: [u8; 4],
    data_len: usize,
    /// Open element names, innermost last
    stack: Vec<String>,
    stack_bytes: usize,
    /// At least one element tree has been fully closed
    root_done: bool,
}

impl Default for PushParser {
    fn default() -> Self {
        Self::new()
    }
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n')
}

fn is_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_' || byte == b':'
}

fn is_name_char(byte: u8) -> bool {
    is_name_start(byte) || byte.is_ascii_digit() || byte == b'-' || byte == b'.'
}

impl PushParser {
    pub fn new() -> Self {
        Self {
            state: State::Prolog,
            name_buf: String::new(),
            attr_buf: String::new(),
            close_buf: String::new(),
            ref_buf: Vec::new(),
            data_buf: [0; 4],
            data_len: 0,
            stack: Vec::new(),
            stack_bytes: 0,
            root_done: false,
        }
    }

    /// Name of the most recently opened element.
    pub fn elem_name(&self) -> &str {
        &self.name_buf
    }

    /// Name of the most recently started attribute.
    pub fn attr_name(&self) -> &str {
        &self.attr_buf
    }

    /// Fragment reported by the last Content/AttrVal event.
    pub fn data(&self) -> &[u8] {
        &self.data_buf[..self.data_len]
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Verify that the input may stop here.
    pub fn finish(&self) -> Result<(), XmlError> {
        if self.state == State::Prolog && self.stack.is_empty() && self.root_done {
            Ok(())
        } else {
            Err(XmlError::UnexpectedEof)
        }
    }

    fn fragment(&mut self, bytes: &[u8]) {
        self.data_buf[..bytes.len()].copy_from_slice(bytes);
        self.data_len = bytes.len();
    }

    fn push_open(&mut self) -> Result<(), XmlError> {
        if self.stack_bytes + self.name_buf.len() > STACK_LIMIT {
            return Err(XmlError::StackOverflow);
        }
        self.stack_bytes += self.name_buf.len();
        self.stack.push(self.name_buf.clone());
        Ok(())
    }

    fn pop_open(&mut self) -> State {
        if let Some(name) = self.stack.pop() {
            self.stack_bytes -= name.len();
        }
        if self.stack.is_empty() {
            self.root_done = true;
            State::Prolog
        } else {
            State::Content
        }
    }

    fn finish_close(&mut self) -> Result<Event, XmlError> {
        if self.close_buf.is_empty() {
            return Err(XmlError::Syntax);
        }
        match self.stack.last() {
            Some(open) if *open == self.close_buf => {
                self.state = self.pop_open();
                Ok(Event::ElemEnd)
            }
            _ => Err(XmlError::CloseTag),
        }
    }

    /// Where plain character flow resumes after a markup construct.
    fn outside_markup(&self) -> State {
        if self.stack.is_empty() {
            State::Prolog
        } else {
            State::Content
        }
    }

    /// Consume one byte.
    pub fn step(&mut self, byte: u8) -> Result<Event, XmlError> {
        match self.state {
            State::Prolog => {
                if byte == b'<' {
                    self.state = State::TagOpen;
                } else if !is_space(byte) {
                    return Err(XmlError::Syntax);
                }
                Ok(Event::None)
            }

            State::TagOpen => {
                if byte == b'/' {
                    if self.stack.is_empty() {
                        return Err(XmlError::Syntax);
                    }
                    self.close_buf.clear();
                    self.state = State::CloseName;
                    Ok(Event::None)
                } else if byte == b'!' {
                    self.state = State::CommentBang;
                    Ok(Event::None)
                } else if byte == b'?' {
                    Err(XmlError::ProcessingInstruction)
                } else if is_name_start(byte) {
                    self.name_buf.clear();
                    self.name_buf.push(byte as char);
                    self.state = State::OpenName;
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::OpenName => {
                if is_name_char(byte) {
                    self.name_buf.push(byte as char);
                    Ok(Event::None)
                } else if is_space(byte) {
                    self.push_open()?;
                    self.state = State::InTag;
                    Ok(Event::ElemStart)
                } else if byte == b'>' {
                    self.push_open()?;
                    self.state = State::Content;
                    Ok(Event::ElemStart)
                } else if byte == b'/' {
                    self.push_open()?;
                    self.state = State::SelfClose;
                    Ok(Event::ElemStart)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::InTag => {
                if is_space(byte) {
                    Ok(Event::None)
                } else if byte == b'>' {
                    self.state = State::Content;
                    Ok(Event::None)
                } else if byte == b'/' {
                    self.state = State::SelfClose;
                    Ok(Event::None)
                } else if is_name_start(byte) {
                    self.attr_buf.clear();
                    self.attr_buf.push(byte as char);
                    self.state = State::AttrName;
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::AttrName => {
                if is_name_char(byte) {
                    self.attr_buf.push(byte as char);
                    Ok(Event::None)
                } else if byte == b'=' {
                    self.state = State::AttrEq;
                    Ok(Event::AttrStart)
                } else if is_space(byte) {
                    self.state = State::AttrAfterName;
                    Ok(Event::AttrStart)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::AttrAfterName => {
                if byte == b'=' {
                    self.state = State::AttrEq;
                    Ok(Event::None)
                } else if is_space(byte) {
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::AttrEq => {
                if byte == b'"' || byte == b'\'' {
                    self.state = State::AttrValue(byte);
                    Ok(Event::None)
                } else if is_space(byte) {
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::AttrValue(quote) => {
                if byte == quote {
                    self.state = State::InTag;
                    Ok(Event::AttrEnd)
                } else if byte == b'&' {
                    self.ref_buf.clear();
                    self.state = State::Reference(RefFrom::Attr(quote));
                    Ok(Event::None)
                } else if byte == b'<' {
                    Err(XmlError::Syntax)
                } else {
                    self.fragment(&[byte]);
                    Ok(Event::AttrVal)
                }
            }

            State::SelfClose => {
                if byte == b'>' {
                    self.state = self.pop_open();
                    Ok(Event::ElemEnd)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::Content => {
                if byte == b'<' {
                    self.state = State::TagOpen;
                    Ok(Event::None)
                } else if byte == b'&' {
                    self.ref_buf.clear();
                    self.state = State::Reference(RefFrom::Content);
                    Ok(Event::None)
                } else {
                    self.fragment(&[byte]);
                    Ok(Event::Content)
                }
            }

            State::CloseName => {
                if is_name_char(byte) {
                    self.close_buf.push(byte as char);
                    Ok(Event::None)
                } else if byte == b'>' {
                    self.finish_close()
                } else if is_space(byte) {
                    if self.close_buf.is_empty() {
                        return Err(XmlError::Syntax);
                    }
                    self.state = State::CloseEnd;
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::CloseEnd => {
                if byte == b'>' {
                    self.finish_close()
                } else if is_space(byte) {
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::Reference(from) => {
                if byte == b';' {
                    let decoded = decode_reference(&self.ref_buf)?;
                    let mut utf8 = [0u8; 4];
                    let encoded = decoded.encode_utf8(&mut utf8).as_bytes();
                    self.data_buf[..encoded.len()].copy_from_slice(encoded);
                    self.data_len = encoded.len();
                    match from {
                        RefFrom::Content => {
                            self.state = State::Content;
                            Ok(Event::Content)
                        }
                        RefFrom::Attr(quote) => {
                            self.state = State::AttrValue(quote);
                            Ok(Event::AttrVal)
                        }
                    }
                } else if byte.is_ascii_alphanumeric() || byte == b'#' {
                    if self.ref_buf.len() >= REF_LIMIT {
                        return Err(XmlError::Reference);
                    }
                    self.ref_buf.push(byte);
                    Ok(Event::None)
                } else {
                    Err(XmlError::Reference)
                }
            }

            State::CommentBang => {
                if byte == b'-' {
                    self.state = State::CommentOpen;
                    Ok(Event::None)
                } else {
                    // DOCTYPE and CDATA are outside the accepted grammar
                    Err(XmlError::Syntax)
                }
            }

            State::CommentOpen => {
                if byte == b'-' {
                    self.state = State::Comment;
                    Ok(Event::None)
                } else {
                    Err(XmlError::Syntax)
                }
            }

            State::Comment => {
                if byte == b'-' {
                    self.state = State::CommentDash;
                }
                Ok(Event::None)
            }

            State::CommentDash => {
                self.state = if byte == b'-' {
                    State::CommentClose
                } else {
                    State::Comment
                };
                Ok(Event::None)
            }

            State::CommentClose => {
                if byte == b'>' {
                    self.state = self.outside_markup();
                    Ok(Event::None)
                } else {
                    // "--" may only end a comment
                    Err(XmlError::Syntax)
                }
            }
        }
    }
}

fn decode_reference(body: &[u8]) -> Result<char, XmlError> {
    if body == b"lt" {
        return Ok('<');
    }
    if body == b"gt" {
        return Ok('>');
    }
    if body == b"amp" {
        return Ok('&');
    }
    if body == b"quot" {
        return Ok('"');
    }
    if body == b"apos" {
        return Ok('\'');
    }

    if body.first() != Some(&b'#') {
        return Err(XmlError::Reference);
    }
    let digits = &body[1..];

    let value = if let Some(hex) = digits.strip_prefix(b"x") {
        if hex.is_empty() {
            return Err(XmlError::Reference);
        }
        let text = std::str::from_utf8(hex).map_err(|_| XmlError::Reference)?;
        u32::from_str_radix(text, 16).map_err(|_| XmlError::Reference)?
    } else {
        if digits.is_empty() {
            return Err(XmlError::Reference);
        }
        let text = std::str::from_utf8(digits).map_err(|_| XmlError::Reference)?;
        text.parse::<u32>().map_err(|_| XmlError::Reference)?
    };

    char::from_u32(value).ok_or(XmlError::Reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive the parser over a byte string, collecting events with their
    /// associated names or data.
    fn run(parser: &mut PushParser, input: &[u8]) -> Result<Vec<String>, XmlError> {
        let mut log = Vec::new();
        for &byte in input {
            match parser.step(byte)? {
                Event::None => {}
                Event::ElemStart => log.push(format!("start:{}", parser.elem_name())),
                Event::ElemEnd => log.push("end".to_string()),
                Event::AttrStart => log.push(format!("attr:{}", parser.attr_name())),
                Event::AttrEnd => log.push("attrend".to_string()),
                Event::Content => {
                    log.push(format!("text:{}", String::from_utf8_lossy(parser.data())))
                }
                Event::AttrVal => {
                    log.push(format!("val:{}", String::from_utf8_lossy(parser.data())))
                }
            }
        }
        Ok(log)
    }

    #[test]
    fn test_simple_element() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<a>hi</a>").unwrap();

        assert_eq!(log, vec!["start:a", "text:h", "text:i", "end"]);
        assert!(parser.finish().is_ok());
    }

    #[test]
    fn test_self_closing_element() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<event/>").unwrap();

        assert_eq!(log, vec!["start:event", "end"]);
    }

    #[test]
    fn test_attributes_in_order() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, br#"<m code="1" warning='no'/>"#).unwrap();

        assert_eq!(
            log,
            vec![
                "start:m", "attr:code", "val:1", "attrend", "attr:warning", "val:n", "val:o",
                "attrend", "end"
            ]
        );
    }

    #[test]
    fn test_nested_elements() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<a><b>x</b></a>").unwrap();

        assert_eq!(
            log,
            vec!["start:a", "start:b", "text:x", "end", "end"]
        );
        assert_eq!(parser.depth(), 0);
    }

    #[test]
    fn test_named_references() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<a>&lt;&amp;&gt;</a>").unwrap();

        assert_eq!(log, vec!["start:a", "text:<", "text:&", "text:>", "end"]);
    }

    #[test]
    fn test_numeric_references() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<a>&#65;&#x42;</a>").unwrap();

        assert_eq!(log, vec!["start:a", "text:A", "text:B", "end"]);
    }

    #[test]
    fn test_invalid_reference() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"<a>&bogus;</a>").unwrap_err();
        assert_eq!(err, XmlError::Reference);
    }

    #[test]
    fn test_mismatched_close_tag() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"<a><b></a>").unwrap_err();
        assert_eq!(err, XmlError::CloseTag);
    }

    #[test]
    fn test_processing_instruction_rejected() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"<?xml version=\"1.0\"?><a/>").unwrap_err();
        assert_eq!(err, XmlError::ProcessingInstruction);
    }

    #[test]
    fn test_doctype_rejected() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"<!DOCTYPE a><a/>").unwrap_err();
        assert_eq!(err, XmlError::Syntax);
    }

    #[test]
    fn test_comment_skipped() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<!-- hello --><a>x<!-- inner -->y</a>").unwrap();

        assert_eq!(log, vec!["start:a", "text:x", "text:y", "end"]);
    }

    #[test]
    fn test_double_dash_in_comment_rejected() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"<!-- a -- b -->").unwrap_err();
        assert_eq!(err, XmlError::Syntax);
    }

    #[test]
    fn test_leading_whitespace_before_root() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"  \r\n\t<a/>").unwrap();
        assert_eq!(log, vec!["start:a", "end"]);
    }

    #[test]
    fn test_text_before_root_rejected() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"junk<a/>").unwrap_err();
        assert_eq!(err, XmlError::Syntax);
    }

    #[test]
    fn test_stack_overflow_on_deep_nesting() {
        let mut parser = PushParser::new();

        let mut err = None;
        for _ in 0..STACK_LIMIT {
            if let Err(e) = run(&mut parser, b"<deeplynested>") {
                err = Some(e);
                break;
            }
        }

        assert_eq!(err, Some(XmlError::StackOverflow));
    }

    #[test]
    fn test_finish_mid_document_is_eof() {
        let mut parser = PushParser::new();
        run(&mut parser, b"<a><b>").unwrap();

        assert_eq!(parser.finish(), Err(XmlError::UnexpectedEof));
    }

    #[test]
    fn test_close_tag_with_whitespace() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<a></a >").unwrap();
        assert_eq!(log, vec!["start:a", "end"]);
    }

    #[test]
    fn test_attribute_with_spaced_equals() {
        let mut parser = PushParser::new();
        let log = run(&mut parser, b"<a x = \"1\"/>").unwrap();
        assert_eq!(
            log,
            vec!["start:a", "attr:x", "val:1", "attrend", "end"]
        );
    }

    #[test]
    fn test_raw_angle_in_attribute_rejected() {
        let mut parser = PushParser::new();
        let err = run(&mut parser, b"<a x=\"<\"/>").unwrap_err();
        assert_eq!(err, XmlError::Syntax);
    }
}
