//! Interpretation of a completed document into a command reply.
//!
//! A reply document is either an unsolicited `<event>` notification or
//! a `<response>` whose `<message>` / `<error>` children carry a
//! composite code, human-readable text and severity attributes.

use crate::code;
use crate::errors::{ClientError, ClientResult};
use crate::xml::{Document, ElemId};

/// Derived (code, text, continued) triple for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    pub continued: bool,
    pub code: u32,
    pub text: String,
}

/// Walk a completed top-level element and derive its reply record.
///
/// Scans `<message>` children in document order for the first nonzero
/// composite code, then `<error>` children the same way. A `<message>`
/// without a `code` attribute (or with `code="0"`) composes to the
/// literal value zero and therefore cannot stop the scan; an `<error>`
/// always composes with the error class bits set and stops it
/// immediately.
pub fn interpret(doc: &Document) -> ClientResult<ResponseRecord> {
    let root = doc.root();

    if doc.name(root) == "event" {
        // unsolicited notification, not a command reply
        return Ok(ResponseRecord {
            continued: false,
            code: 0,
            text: String::new(),
        });
    }

    if doc.name(root) != "response" {
        return Err(ClientError::ResponseFormat);
    }

    let mut code_val: u32 = 0;
    let mut text: Option<String> = None;

    let mut elem = doc.find_child(root, "message");
    while let Some(message) = elem {
        let (group, local) = element_code(doc, message)?;

        code_val = code::info(group, local);
        if let Some(warn) = doc.find_attr(message, "warning") {
            match warn.value.as_str() {
                "yes" => code_val = code::warning(group, local),
                "no" => {}
                _ => return Err(ClientError::ResponseFormat),
            }
        }

        text = Some(doc.value(message).to_string());

        if code_val != 0 {
            break;
        }

        elem = doc.find_next(message, "message");
    }

    if code_val == 0 {
        let mut elem = doc.find_child(root, "error");
        while let Some(error) = elem {
            let (group, local) = element_code(doc, error)?;

            code_val = code::error(group, local);
            if let Some(crit) = doc.find_attr(error, "critical") {
                match crit.value.as_str() {
                    "yes" => code_val = code::critical(group, local),
                    "no" => {}
                    _ => return Err(ClientError::ResponseFormat),
                }
            }

            text = Some(doc.value(error).to_string());

            if code_val != 0 {
                break;
            }

            elem = doc.find_next(error, "error");
        }
    }

    if text.is_none() && doc.find_child(root, "prompt").is_some() {
        text = Some(String::new());
    }

    let mut continued = false;
    if doc.find_child(root, "continued").is_some() {
        continued = true;
        if text.is_none() {
            text = Some(String::new());
        }
    }

    match text {
        Some(text) => Ok(ResponseRecord {
            continued,
            code: code_val,
            text,
        }),
        None => Err(ClientError::ResponseFormat),
    }
}

/// Decode the `code` attribute of a message/error element.
///
/// Absence means "no code". A present value must be a plain decimal
/// unsigned 32-bit integer: ASCII digits only, no sign, no surrounding
/// whitespace.
fn element_code(doc: &Document, id: ElemId) -> ClientResult<(u32, u32)> {
    let Some(attr) = doc.find_attr(id, "code") else {
        return Ok((0, 0));
    };

    let value = &attr.value;
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ClientError::ResponseFormat);
    }

    let raw: u32 = value.parse().map_err(|_| ClientError::ResponseFormat)?;

    Ok((code::group(raw), code::local(raw)))
}
