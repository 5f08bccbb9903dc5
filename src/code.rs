//! Composite response codes.
//!
//! A response code packs a severity level and a group/local identifier
//! pair into one `u32`:
//!
//! ```text
//! bits 31..30   severity level (0 info, 1 warning, 2 error, 3 critical)
//! bits 29..16   group identifier (14 bits)
//! bits 15..0    local identifier (16 bits)
//! ```
//!
//! An info code with group 0 and local 0 is the literal value zero,
//! which doubles as "no code present".

use serde::Serialize;
use std::fmt;

const LEVEL_ERROR: u32 = 2;

/// Severity class carried in the top bits of a composite code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        f.write_str(name)
    }
}

fn compose(level: u32, group: u32, local: u32) -> u32 {
    (level << 30) | ((group & 0x3fff) << 16) | (local & 0xffff)
}

pub fn info(group: u32, local: u32) -> u32 {
    compose(0, group, local)
}

pub fn warning(group: u32, local: u32) -> u32 {
    compose(1, group, local)
}

pub fn error(group: u32, local: u32) -> u32 {
    compose(2, group, local)
}

pub fn critical(group: u32, local: u32) -> u32 {
    compose(3, group, local)
}

/// Group identifier of a code, or of a raw decoded attribute value.
pub fn group(code: u32) -> u32 {
    (code >> 16) & 0x3fff
}

/// Local identifier of a code.
pub fn local(code: u32) -> u32 {
    code & 0xffff
}

pub fn severity(code: u32) -> Severity {
    match code >> 30 {
        0 => Severity::Info,
        1 => Severity::Warning,
        2 => Severity::Error,
        _ => Severity::Critical,
    }
}

/// Whether the code denotes a failure (error or critical severity).
pub fn failed(code: u32) -> bool {
    (code >> 30) >= LEVEL_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_codeless_info() {
        assert_eq!(info(0, 0), 0);
        assert_eq!(severity(0), Severity::Info);
        assert!(!failed(0));
    }

    #[test]
    fn test_packing_round_trip() {
        let code = warning(0x123, 0x4567);
        assert_eq!(group(code), 0x123);
        assert_eq!(local(code), 0x4567);
        assert_eq!(severity(code), Severity::Warning);
    }

    #[test]
    fn test_raw_decimal_decomposition() {
        // 65536 = 0x10000: group 1, local 0
        assert_eq!(group(65536), 1);
        assert_eq!(local(65536), 0);
    }

    #[test]
    fn test_failure_classes() {
        assert!(!failed(info(1, 2)));
        assert!(!failed(warning(1, 2)));
        assert!(failed(error(0, 0)));
        assert!(failed(critical(0, 0)));
    }

    #[test]
    fn test_group_and_local_are_masked() {
        let code = error(0xffff, 0x1ffff);
        assert_eq!(group(code), 0x3fff);
        assert_eq!(local(code), 0xffff);
        assert_eq!(severity(code), Severity::Error);
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(Severity::Info.to_string(), "info");
        assert_eq!(Severity::Critical.to_string(), "critical");
    }
}
