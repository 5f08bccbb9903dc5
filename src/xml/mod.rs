//! Incremental XML parsing.
//!
//! Split in two layers: [`push`] is a byte-at-a-time event parser and
//! [`dom`] assembles those events into one owned tree per top-level
//! element. Both resume across arbitrary chunk boundaries, which is what
//! lets a document be parsed straight out of the receive window as bytes
//! trickle in.

pub mod dom;
pub mod push;

pub use dom::{Attribute, Document, DomBuilder, ElemId};
pub use push::{Event, PushParser, XmlError};
