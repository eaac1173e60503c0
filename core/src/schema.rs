//! Structural schema for descriptor documents.
//!
//! A [`Schema`] checks element nesting, the attribute set of every known
//! element, and attribute value syntax before any semantic extraction runs.
//! Elements the schema does not know are skipped wherever the language
//! allows extension (directly under `<interface>` and `<node>`), so newer
//! documents still validate against an older build.
//!
//! Presence of `name` / `type` is checked by the parser instead, which
//! reports it with the offending element's identity.
//!
//! One schema instance exists per supported language version, built on
//! first use and shared read-only afterwards.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::qos::{QOS_POLICIES, QosPreset};

/// Name of the root element every descriptor document must have.
pub const ROOT_ELEMENT: &str = "interface";

/// Structural validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The document is not a descriptor document at all.
    #[error("{}: failed to parse root element: expected <{expected}>, found <{found}>", path.display())]
    MissingRootElement {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },
    /// Any other structural violation, including malformed XML.
    #[error("Error parsing descriptor from {}, line {line}, col {column}: {message}", path.display())]
    DocumentInvalid {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },
}

impl SchemaError {
    /// Wraps an XML well-formedness error.
    pub fn from_xml(path: &Path, err: &roxmltree::Error) -> Self {
        let pos = err.pos();
        Self::DocumentInvalid {
            path: path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message: err.to_string(),
        }
    }

    fn invalid(path: &Path, node: roxmltree::Node<'_, '_>, message: String) -> Self {
        let pos = node.document().text_pos_at(node.range().start);
        Self::DocumentInvalid {
            path: path.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ValueRule {
    Integer,
    Boolean,
    Token,
    Duration,
    Preset,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
enum Content {
    /// Known children are validated; anything else is skipped.
    Open(&'static [&'static str]),
    /// Only the listed children, each at most once.
    Only(&'static [&'static str]),
    Empty,
}

#[derive(Debug)]
struct ElementRule {
    tag: &'static str,
    attributes: Vec<(&'static str, ValueRule)>,
    content: Content,
}

struct ValuePatterns {
    integer: Regex,
    boolean: Regex,
    token: Regex,
    duration: Regex,
}

impl ValuePatterns {
    fn new() -> Self {
        Self {
            integer: Regex::new(r"^\s*[0-9]+\s*$").expect("static regex must compile"),
            boolean: Regex::new(r"(?i)^\s*(true|false|1|0)\s*$").expect("static regex must compile"),
            token: Regex::new(r"\S").expect("static regex must compile"),
            duration: Regex::new(r"(?i)^\s*(infinite|[0-9]+)\s*$").expect("static regex must compile"),
        }
    }
}

/// Structural schema for one descriptor language version.
pub struct Schema {
    version: u32,
    elements: Vec<ElementRule>,
    patterns: ValuePatterns,
}

static SCHEMA_V1: LazyLock<Schema> = LazyLock::new(Schema::v1);

const HISTORY_VALUES: &[&str] = &["system_default", "keep_last", "keep_all"];
const RELIABILITY_VALUES: &[&str] = &["system_default", "reliable", "best_effort"];
const DURABILITY_VALUES: &[&str] = &["system_default", "transient_local", "volatile"];
const LIVELINESS_VALUES: &[&str] = &["system_default", "automatic", "manual_by_topic"];

impl Schema {
    /// Returns the schema for `version`, if this build supports it.
    pub fn for_version(version: u32) -> Option<&'static Schema> {
        match version {
            1 => Some(&SCHEMA_V1),
            _ => None,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn v1() -> Self {
        let roles = |first: &'static str, second: &'static str| {
            vec![
                ("name", ValueRule::Token),
                ("type", ValueRule::Token),
                (first, ValueRule::Boolean),
                (second, ValueRule::Boolean),
                ("qos", ValueRule::Preset),
            ]
        };

        let qos_attributes = QOS_POLICIES
            .iter()
            .map(|&policy| {
                let rule = match policy {
                    "history" => ValueRule::Choice(HISTORY_VALUES),
                    "depth" => ValueRule::Integer,
                    "reliability" => ValueRule::Choice(RELIABILITY_VALUES),
                    "durability" => ValueRule::Choice(DURABILITY_VALUES),
                    "liveliness" => ValueRule::Choice(LIVELINESS_VALUES),
                    "avoid_ros_namespace_conventions" => ValueRule::Boolean,
                    _ => ValueRule::Duration,
                };
                (policy, rule)
            })
            .collect();

        Self {
            version: 1,
            elements: vec![
                ElementRule {
                    tag: ROOT_ELEMENT,
                    attributes: vec![("version", ValueRule::Integer)],
                    content: Content::Open(&["node"]),
                },
                ElementRule {
                    tag: "node",
                    attributes: vec![("name", ValueRule::Token), ("executable", ValueRule::Token)],
                    content: Content::Open(&["action", "service", "topic", "parameter"]),
                },
                ElementRule {
                    tag: "action",
                    attributes: roles("server", "client"),
                    content: Content::Only(&["qos"]),
                },
                ElementRule {
                    tag: "service",
                    attributes: roles("server", "client"),
                    content: Content::Only(&["qos"]),
                },
                ElementRule {
                    tag: "topic",
                    attributes: roles("publisher", "subscriber"),
                    content: Content::Only(&["qos"]),
                },
                ElementRule {
                    tag: "parameter",
                    attributes: vec![("name", ValueRule::Token), ("type", ValueRule::Token)],
                    content: Content::Empty,
                },
                ElementRule {
                    tag: "qos",
                    attributes: qos_attributes,
                    content: Content::Empty,
                },
            ],
            patterns: ValuePatterns::new(),
        }
    }

    /// Checks that the document's root is a descriptor `<interface>` and
    /// returns it.
    ///
    /// This check is version-independent: it is what tells a descriptor
    /// apart from an arbitrary XML file.
    pub fn root<'a, 'input>(
        document: &'a roxmltree::Document<'input>,
        path: &Path,
    ) -> Result<roxmltree::Node<'a, 'input>, SchemaError> {
        let root = document.root_element();
        if root.tag_name().name() != ROOT_ELEMENT || root.tag_name().namespace().is_some() {
            return Err(SchemaError::MissingRootElement {
                path: path.to_path_buf(),
                expected: ROOT_ELEMENT,
                found: root.tag_name().name().to_string(),
            });
        }
        Ok(root)
    }

    /// Validates a whole document against this schema.
    pub fn validate(&self, document: &roxmltree::Document<'_>, path: &Path) -> Result<(), SchemaError> {
        let root = Self::root(document, path)?;
        self.validate_element(root, path)
    }

    /// Validates `element` and everything beneath it.
    pub fn validate_element(
        &self,
        element: roxmltree::Node<'_, '_>,
        path: &Path,
    ) -> Result<(), SchemaError> {
        let tag = element.tag_name().name();
        let Some(rule) = self.rule(tag) else {
            return Err(SchemaError::invalid(
                path,
                element,
                format!("Element '{tag}': no declaration found for this element"),
            ));
        };

        self.validate_attributes(rule, element, path)?;

        let mut seen: Vec<&str> = Vec::new();
        for child in element.children() {
            if child.is_text() {
                let text = child.text().unwrap_or_default();
                if !text.trim().is_empty() {
                    return Err(SchemaError::invalid(
                        path,
                        child,
                        format!("Element '{tag}': character content is not allowed"),
                    ));
                }
                continue;
            }
            if !child.is_element() {
                continue;
            }

            let child_tag = child.tag_name().name();
            let foreign = child.tag_name().namespace().is_some();
            match rule.content {
                Content::Open(known) => {
                    if !foreign && known.contains(&child_tag) {
                        self.validate_element(child, path)?;
                    }
                }
                Content::Only(allowed) => {
                    if foreign || !allowed.contains(&child_tag) {
                        return Err(SchemaError::invalid(
                            path,
                            child,
                            format!(
                                "Element '{child_tag}': this element is not expected inside '{tag}'. Expected is one of ( {} )",
                                allowed.join(", ")
                            ),
                        ));
                    }
                    if seen.contains(&child_tag) {
                        return Err(SchemaError::invalid(
                            path,
                            child,
                            format!("Element '{child_tag}': may appear at most once inside '{tag}'"),
                        ));
                    }
                    seen.push(child_tag);
                    self.validate_element(child, path)?;
                }
                Content::Empty => {
                    return Err(SchemaError::invalid(
                        path,
                        child,
                        format!("Element '{tag}': element content is not allowed, found '{child_tag}'"),
                    ));
                }
            }
        }

        Ok(())
    }

    fn rule(&self, tag: &str) -> Option<&ElementRule> {
        self.elements.iter().find(|rule| rule.tag == tag)
    }

    fn validate_attributes(
        &self,
        rule: &ElementRule,
        element: roxmltree::Node<'_, '_>,
        path: &Path,
    ) -> Result<(), SchemaError> {
        for attribute in element.attributes() {
            // Namespaced attributes (xsi:schemaLocation and friends) are not ours to check.
            if attribute.namespace().is_some() {
                continue;
            }
            let name = attribute.name();
            let Some((_, value_rule)) = rule.attributes.iter().find(|(attr, _)| *attr == name)
            else {
                return Err(SchemaError::invalid(
                    path,
                    element,
                    format!("Element '{}', attribute '{name}': the attribute is not allowed", rule.tag),
                ));
            };

            let value = attribute.value();
            if let Some(expected) = self.check_value(*value_rule, value) {
                return Err(SchemaError::invalid(
                    path,
                    element,
                    format!(
                        "Element '{}', attribute '{name}': '{value}' is not a valid value of {expected}",
                        rule.tag
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Returns a description of the expected value when `value` does not
    /// satisfy `rule`.
    fn check_value(&self, rule: ValueRule, value: &str) -> Option<String> {
        let ok = match rule {
            ValueRule::Integer => self.patterns.integer.is_match(value),
            ValueRule::Boolean => self.patterns.boolean.is_match(value),
            ValueRule::Token => self.patterns.token.is_match(value),
            ValueRule::Duration => self.patterns.duration.is_match(value),
            ValueRule::Preset => value.parse::<QosPreset>().is_ok(),
            ValueRule::Choice(choices) => {
                let normalized = value.trim().to_ascii_lowercase();
                choices.contains(&normalized.as_str())
            }
        };
        if ok {
            return None;
        }
        Some(match rule {
            ValueRule::Integer => "the integer type".to_string(),
            ValueRule::Boolean => "the boolean type (true, false, 1, 0)".to_string(),
            ValueRule::Token => "a non-empty token".to_string(),
            ValueRule::Duration => "a duration in nanoseconds or 'infinite'".to_string(),
            ValueRule::Preset => {
                let keys: Vec<&str> = QosPreset::ALL.iter().map(|p| p.key()).collect();
                format!("the QoS preset set {{{}}}", keys.join(", "))
            }
            ValueRule::Choice(choices) => format!("the set {{{}}}", choices.join(", ")),
        })
    }
}
