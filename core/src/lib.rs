//! Node interface descriptors: model, schema, parser, and merge engine.
//!
//! A descriptor document (`*.nodl.xml`) declares the actions, services,
//! topics, and parameters one or more nodes expose:
//!
//! - [`Node`] and the entry types [`Action`], [`Service`], [`Topic`],
//!   [`Parameter`] form the interface model, with [`Interface`] as the
//!   uniform view over entries.
//! - [`Schema`] checks document structure per language version.
//! - [`parse_interface`] extracts nodes from a validated `<interface>`
//!   element, dispatching on its `version` attribute.
//! - [`Merger`] / [`merge_documents`] fold declarations of the same node
//!   from several documents, failing on disagreeing entries.
//!
//! [`parse`], [`parse_str`], and [`parse_multiple`] chain these together.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use nodl_core::*;
//!
//! let xml = r#"
//! <interface version="1">
//!   <node name="talker">
//!     <topic name="chatter" type="std_msgs/msg/String" publisher="true"/>
//!     <parameter name="rate" type="double"/>
//!   </node>
//! </interface>"#;
//!
//! let document = parse_str(xml, Path::new("talker.nodl.xml"), ParseOptions::default()).unwrap();
//! let talker = document.find_node("talker").unwrap();
//! assert!(talker.topics["chatter"].publisher);
//! assert_eq!(talker.parameters["rate"].value_type, "double");
//! assert!(document.warnings.is_empty());
//! ```

mod error;
mod merge;
mod parser;
mod qos;
mod schema;
mod types;

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

pub use error::NodlError;
pub use merge::{
    ExecutableConflict, MergeConflict, MergeError, MergedInterface, Merger, merge_documents,
};
pub use parser::{
    DuplicatePolicy, ParseError, ParseOptions, ParsedInterface, interface_version, parse_bool,
    parse_interface,
};
pub use qos::{
    Duration, QOS_POLICIES, QosDurability, QosError, QosHistory, QosLiveliness, QosPreset,
    QosProfile, QosReliability,
};
pub use schema::{ROOT_ELEMENT, Schema, SchemaError};
pub use types::*;

/// Parses one descriptor file with default options.
pub fn parse(path: &Path) -> Result<Document, NodlError> {
    parse_with(path, ParseOptions::default())
}

/// Parses one descriptor file.
pub fn parse_with(path: &Path, options: ParseOptions) -> Result<Document, NodlError> {
    let text = fs::read_to_string(path).map_err(|source| NodlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text, path, options)
}

/// Parses descriptor text, attributing diagnostics to `path`.
///
/// Runs the stages in order: XML well-formedness, root element, version
/// gate, structural schema for that version, then extraction.
pub fn parse_str(text: &str, path: &Path, options: ParseOptions) -> Result<Document, NodlError> {
    let xml = roxmltree::Document::parse(text).map_err(|err| SchemaError::from_xml(path, &err))?;
    let root = Schema::root(&xml, path)?;

    let version = interface_version(root, path)?;
    let schema = Schema::for_version(version).ok_or_else(|| ParseError::UnsupportedVersion {
        path: path.to_path_buf(),
        found: u64::from(version),
        max: MAX_SUPPORTED_VERSION,
    })?;
    schema.validate_element(root, path)?;

    let parsed = parse_interface(root, path, options)?;
    debug!(
        path = %path.display(),
        nodes = parsed.nodes.len(),
        warnings = parsed.warnings.len(),
        "Parsed descriptor"
    );

    Ok(Document {
        path: path.to_path_buf(),
        version: parsed.version,
        nodes: parsed.nodes,
        warnings: parsed.warnings,
    })
}

/// Parses several files in parallel, returning documents in input order.
///
/// When more than one file fails, the error for the earliest path wins.
pub fn parse_documents(paths: &[PathBuf], options: ParseOptions) -> Result<Vec<Document>, NodlError> {
    let results: Vec<Result<Document, NodlError>> = paths
        .par_iter()
        .map(|path| parse_with(path, options))
        .collect();
    results.into_iter().collect()
}

/// Parses and merges several files with default options.
pub fn parse_multiple(paths: &[PathBuf]) -> Result<MergedInterface, NodlError> {
    parse_multiple_with(paths, ParseOptions::default())
}

/// Parses several files, then folds their nodes in input order.
pub fn parse_multiple_with(
    paths: &[PathBuf],
    options: ParseOptions,
) -> Result<MergedInterface, NodlError> {
    let documents = parse_documents(paths, options)?;
    Ok(merge_documents(&documents)?)
}
