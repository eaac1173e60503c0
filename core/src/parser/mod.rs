//! Versioned extraction of nodes from a validated `<interface>` element.
//!
//! [`parse_interface`] reads the `version` attribute, refuses anything newer
//! than [`MAX_SUPPORTED_VERSION`], and dispatches to the extractor for that
//! version. Structural validation is expected to have run already (see
//! [`Schema`](crate::Schema)); the extractors only report what the schema
//! cannot: missing required attributes and, under the strict policy,
//! duplicate entries.

mod v1;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ElementRef, InterfaceKind, MAX_SUPPORTED_VERSION, Node, ParseWarning};

/// Semantic failures while extracting nodes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Error parsing {element}: missing version attribute")]
    MissingVersion { element: ElementRef },

    #[error("{}: unsupported interface version: {found} must be <= {max}", path.display())]
    UnsupportedVersion { path: PathBuf, found: u64, max: u32 },

    #[error("Error parsing {element}: missing required attribute '{attribute}'")]
    MissingAttribute {
        element: ElementRef,
        attribute: &'static str,
    },

    #[error("Error parsing {element}: attribute '{attribute}' has invalid value '{value}': {reason}")]
    InvalidAttribute {
        element: ElementRef,
        attribute: String,
        value: String,
        reason: String,
    },

    #[error("Error parsing {element}: duplicate {kind} '{name}'")]
    DuplicateEntry {
        element: ElementRef,
        kind: InterfaceKind,
        name: String,
    },
}

/// What to do when one node declares the same entry name twice for a kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The last declaration replaces earlier ones.
    #[default]
    LastWins,
    /// Any repeated declaration is an error.
    Reject,
}

/// Knobs for extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub duplicates: DuplicatePolicy,
}

impl ParseOptions {
    pub fn strict() -> Self {
        Self {
            duplicates: DuplicatePolicy::Reject,
        }
    }
}

/// Result of extracting one `<interface>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInterface {
    pub version: u32,
    pub nodes: Vec<Node>,
    pub warnings: Vec<ParseWarning>,
}

/// Interprets a role flag attribute value.
///
/// Accepts `true`/`1` and `false`/`0`, case-insensitively and ignoring
/// surrounding whitespace. Anything else is `None`.
///
/// # Examples
///
/// ```
/// use nodl_core::parse_bool;
///
/// assert_eq!(parse_bool("True"), Some(true));
/// assert_eq!(parse_bool(" 0 "), Some(false));
/// assert_eq!(parse_bool("yes"), None);
/// ```
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Reads and gates the `version` attribute of an `<interface>` element.
pub fn interface_version(interface: roxmltree::Node<'_, '_>, path: &Path) -> Result<u32, ParseError> {
    let Some(raw) = interface.attribute("version") else {
        return Err(ParseError::MissingVersion {
            element: element_ref(interface, path),
        });
    };

    let invalid = |reason: &str| ParseError::InvalidAttribute {
        element: element_ref(interface, path),
        attribute: "version".to_string(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let digits = raw.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected a positive integer"));
    }
    // Too many digits for u64 is still just a newer version.
    let found = digits.parse::<u64>().unwrap_or(u64::MAX);
    if found == 0 {
        return Err(invalid("versions start at 1"));
    }
    if found > u64::from(MAX_SUPPORTED_VERSION) {
        return Err(ParseError::UnsupportedVersion {
            path: path.to_path_buf(),
            found,
            max: MAX_SUPPORTED_VERSION,
        });
    }
    u32::try_from(found).map_err(|_| invalid("version out of range"))
}

/// Extracts every node declared under an `<interface>` element.
///
/// Fails without attempting extraction when the version is missing or newer
/// than this build supports. Ambiguous-role findings are returned in
/// [`ParsedInterface::warnings`] and never abort parsing.
pub fn parse_interface(
    interface: roxmltree::Node<'_, '_>,
    path: &Path,
    options: ParseOptions,
) -> Result<ParsedInterface, ParseError> {
    let version = interface_version(interface, path)?;
    let (nodes, warnings) = match version {
        1 => v1::Extractor::new(path, options).run(interface)?,
        other => {
            return Err(ParseError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: u64::from(other),
                max: MAX_SUPPORTED_VERSION,
            });
        }
    };

    Ok(ParsedInterface {
        version,
        nodes,
        warnings,
    })
}

pub(crate) fn element_ref(element: roxmltree::Node<'_, '_>, path: &Path) -> ElementRef {
    let pos = element.document().text_pos_at(element.range().start);
    ElementRef {
        tag: element.tag_name().name().to_string(),
        name: element.attribute("name").map(str::to_string),
        path: path.to_path_buf(),
        line: pos.row,
    }
}

/// Looks up a required attribute, reporting a miss against `element` itself.
pub(crate) fn required_attribute<'a>(
    element: roxmltree::Node<'a, '_>,
    attribute: &'static str,
    path: &Path,
) -> Result<&'a str, ParseError> {
    element
        .attribute(attribute)
        .ok_or_else(|| ParseError::MissingAttribute {
            element: element_ref(element, path),
            attribute,
        })
}

/// Reads an optional role flag; absent means `false`.
pub(crate) fn bool_attribute(
    element: roxmltree::Node<'_, '_>,
    attribute: &'static str,
    path: &Path,
) -> Result<bool, ParseError> {
    match element.attribute(attribute) {
        None => Ok(false),
        Some(value) => parse_bool(value).ok_or_else(|| ParseError::InvalidAttribute {
            element: element_ref(element, path),
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: "expected true, false, 1, or 0".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(xml: &str) -> Result<ParsedInterface, ParseError> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        parse_interface(
            doc.root_element(),
            Path::new("pkg/test.nodl.xml"),
            ParseOptions::default(),
        )
    }

    #[test]
    fn test_missing_version_names_the_element() {
        let err = parse("<interface><node name=\"n\"/></interface>").unwrap_err();
        match err {
            ParseError::MissingVersion { element } => assert_eq!(element.tag, "interface"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_future_version_is_rejected_before_extraction() {
        // The node lacks a name, which version 1 would reject; version gating
        // must fire first.
        let err = parse("<interface version=\"2\"><node/></interface>").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnsupportedVersion { found: 2, max: 1, .. }
        ));
    }

    #[test]
    fn test_version_beyond_u64_is_unsupported() {
        let err = parse("<interface version=\"99999999999999999999999\"><node/></interface>")
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnsupportedVersion { found: u64::MAX, max: 1, .. }
        ));
    }

    #[test]
    fn test_non_numeric_and_zero_versions_are_invalid() {
        assert!(matches!(
            parse("<interface version=\"one\"/>"),
            Err(ParseError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            parse("<interface version=\"0\"/>"),
            Err(ParseError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_empty_interface_has_no_nodes() {
        let parsed = parse("<interface version=\"1\"/>").unwrap();
        assert_eq!(parsed.version, 1);
        assert!(parsed.nodes.is_empty());
        assert!(parsed.warnings.is_empty());
    }

    #[test]
    fn test_parse_bool_contract() {
        for yes in ["true", "TRUE", "1", " true "] {
            assert_eq!(parse_bool(yes), Some(true), "{yes}");
        }
        for no in ["false", "False", "0"] {
            assert_eq!(parse_bool(no), Some(false), "{no}");
        }
        for bad in ["", "yes", "2", "truthy"] {
            assert_eq!(parse_bool(bad), None, "{bad}");
        }
    }
}
