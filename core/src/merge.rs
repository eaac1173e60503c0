//! Merging one node declared across several descriptor documents.
//!
//! Nodes are folded by name in input order. The first declaration of a node
//! seeds the result; every later declaration may only add entries or repeat
//! identical ones. Two differently-declared entries with the same kind and
//! name are a [`MergeConflict`], and the merge stops there.
//!
//! Provenance (which files contributed to each merged node) is tracked next
//! to the nodes rather than inside them.
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use nodl_core::*;
//!
//! let chatter = Topic::new("chatter", "std_msgs/msg/String").publisher();
//! let rate = Parameter::new("rate", "double");
//!
//! let mut merger = Merger::new();
//! merger.add_node(Node::new("talker").with(chatter), Path::new("a.nodl.xml")).unwrap();
//! merger.add_node(Node::new("talker").with(rate), Path::new("b.nodl.xml")).unwrap();
//!
//! let merged = merger.finish();
//! let talker = merged.get("talker").unwrap();
//! assert_eq!(talker.interface_count(), 2);
//! assert_eq!(merged.origins("talker").len(), 2);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{Document, Interface, InterfaceKind, Node};

/// Two declarations of the same entry that do not agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeConflict {
    pub node: String,
    pub kind: InterfaceKind,
    pub entry: String,
    /// The entry already in the merged node.
    pub existing: Interface,
    /// The entry that disagreed with it.
    pub incoming: Interface,
    /// Files that had contributed to the merged node so far.
    pub existing_origins: Vec<PathBuf>,
    /// File the disagreeing declaration came from.
    pub incoming_origin: PathBuf,
    /// The merged node as it stood when the conflict was found.
    pub existing_node: Node,
    /// The node declaration being merged in.
    pub incoming_node: Node,
}

impl MergeConflict {
    /// Names of the fields whose values differ between the two entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use nodl_core::*;
    ///
    /// let mut merger = Merger::new();
    /// merger.add_node(Node::new("n").with(Action::new("foo", "T1").server()), Path::new("a")).unwrap();
    /// let err = merger
    ///     .add_node(Node::new("n").with(Action::new("foo", "T2").server()), Path::new("b"))
    ///     .unwrap_err();
    /// let MergeError::Conflict(conflict) = err else {
    ///     panic!("expected an entry conflict");
    /// };
    /// assert_eq!(conflict.differing_fields(), vec!["type".to_string()]);
    /// ```
    pub fn differing_fields(&self) -> Vec<String> {
        let existing = self.existing.to_fields();
        let incoming = self.incoming.to_fields();
        let mut fields: Vec<String> = existing
            .iter()
            .filter(|(key, value)| incoming.get(key.as_str()) != Some(value))
            .map(|(key, _)| key.clone())
            .collect();
        fields.extend(
            incoming
                .keys()
                .filter(|key| !existing.contains_key(key.as_str()))
                .cloned(),
        );
        fields
    }
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let existing = serde_json::Value::Object(self.existing.to_fields());
        let incoming = serde_json::Value::Object(self.incoming.to_fields());
        write!(
            f,
            "Could not merge node {} from {} with existing entry from {}: conflict between {} and {}",
            self.node,
            self.incoming_origin.display(),
            display_paths(&self.existing_origins),
            existing,
            incoming
        )
    }
}

/// Two declarations of the same node that name different executables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error(
    "Could not merge node {node} from {} with existing entry from {}: executable '{existing}' differs from '{incoming}'",
    .incoming_origin.display(),
    display_paths(.existing_origins)
)]
pub struct ExecutableConflict {
    pub node: String,
    pub existing: String,
    pub incoming: String,
    pub existing_origins: Vec<PathBuf>,
    pub incoming_origin: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("{0}")]
    Conflict(Box<MergeConflict>),

    #[error("{0}")]
    Executable(Box<ExecutableConflict>),
}

/// Nodes merged across documents, with the files each one came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedInterface {
    nodes: Vec<Node>,
    provenance: BTreeMap<String, Vec<PathBuf>>,
}

impl MergedInterface {
    /// Merged nodes, in order of first appearance.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Files that contributed to the named node, in contribution order.
    pub fn origins(&self, name: &str) -> &[PathBuf] {
        self.provenance.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn provenance(&self) -> &BTreeMap<String, Vec<PathBuf>> {
        &self.provenance
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Sequential fold of nodes into one declaration per node name.
#[derive(Debug, Default)]
pub struct Merger {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    provenance: BTreeMap<String, Vec<PathBuf>>,
    entry_origins: BTreeMap<(String, InterfaceKind, String), PathBuf>,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every node of `document`, attributing them to its path.
    pub fn add_document(&mut self, document: &Document) -> Result<(), MergeError> {
        for node in &document.nodes {
            self.add_node(node.clone(), &document.path)?;
        }
        Ok(())
    }

    /// Merges one node declaration.
    ///
    /// On conflict the accumulated node is left exactly as it was before the
    /// call.
    pub fn add_node(&mut self, node: Node, origin: &Path) -> Result<(), MergeError> {
        let Some(&slot) = self.index.get(&node.name) else {
            debug!(node = %node.name, origin = %origin.display(), "Seeding node");
            self.record_entries(&node, origin);
            self.provenance
                .insert(node.name.clone(), vec![origin.to_path_buf()]);
            self.index.insert(node.name.clone(), self.nodes.len());
            self.nodes.push(node);
            return Ok(());
        };

        let existing = &self.nodes[slot];
        if let (Some(known), Some(declared)) = (&existing.executable, &node.executable) {
            if known != declared {
                return Err(MergeError::Executable(Box::new(ExecutableConflict {
                    node: node.name.clone(),
                    existing: known.clone(),
                    incoming: declared.clone(),
                    existing_origins: self.origins(&node.name).to_vec(),
                    incoming_origin: origin.to_path_buf(),
                })));
            }
        }
        if let Some((existing_entry, incoming_entry)) = first_conflict(existing, &node) {
            let conflict = MergeConflict {
                node: node.name.clone(),
                kind: existing_entry.kind(),
                entry: existing_entry.name().to_string(),
                existing: existing_entry,
                incoming: incoming_entry,
                existing_origins: self.origins(&node.name).to_vec(),
                incoming_origin: origin.to_path_buf(),
                existing_node: existing.clone(),
                incoming_node: node,
            };
            return Err(MergeError::Conflict(Box::new(conflict)));
        }

        debug!(node = %node.name, origin = %origin.display(), "Merging node");
        self.record_entries(&node, origin);
        absorb(&mut self.nodes[slot], node);
        let origins = self.provenance.entry(self.nodes[slot].name.clone()).or_default();
        if !origins.iter().any(|known| known == origin) {
            origins.push(origin.to_path_buf());
        }
        Ok(())
    }

    fn origins(&self, name: &str) -> &[PathBuf] {
        self.provenance.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn record_entries(&mut self, node: &Node, origin: &Path) {
        for entry in node.interfaces() {
            self.entry_origins
                .entry((node.name.clone(), entry.kind(), entry.name().to_string()))
                .or_insert_with(|| origin.to_path_buf());
        }
    }

    /// File that first declared an entry of a merged node.
    pub fn entry_origin(&self, node: &str, kind: InterfaceKind, entry: &str) -> Option<&Path> {
        self.entry_origins
            .get(&(node.to_string(), kind, entry.to_string()))
            .map(PathBuf::as_path)
    }

    pub fn finish(self) -> MergedInterface {
        MergedInterface {
            nodes: self.nodes,
            provenance: self.provenance,
        }
    }
}

/// Merges every node of every document, in order.
pub fn merge_documents(documents: &[Document]) -> Result<MergedInterface, MergeError> {
    let mut merger = Merger::new();
    for document in documents {
        merger.add_document(document)?;
    }
    let merged = merger.finish();
    info!(
        nodes = merged.len(),
        documents = documents.len(),
        "Merged descriptor documents"
    );
    Ok(merged)
}

fn first_conflict(existing: &Node, incoming: &Node) -> Option<(Interface, Interface)> {
    let Node {
        name: _,
        executable: _,
        actions,
        services,
        topics,
        parameters,
    } = incoming;
    conflict_in(&existing.actions, actions)
        .or_else(|| conflict_in(&existing.services, services))
        .or_else(|| conflict_in(&existing.topics, topics))
        .or_else(|| conflict_in(&existing.parameters, parameters))
}

fn conflict_in<T>(
    existing: &BTreeMap<String, T>,
    incoming: &BTreeMap<String, T>,
) -> Option<(Interface, Interface)>
where
    T: Clone + PartialEq + Into<Interface>,
{
    incoming.iter().find_map(|(name, entry)| {
        existing
            .get(name)
            .filter(|known| *known != entry)
            .map(|known| (known.clone().into(), entry.clone().into()))
    })
}

fn absorb(existing: &mut Node, incoming: Node) {
    let Node {
        name: _,
        executable,
        actions,
        services,
        topics,
        parameters,
    } = incoming;
    if existing.executable.is_none() {
        existing.executable = executable;
    }
    absorb_map(&mut existing.actions, actions);
    absorb_map(&mut existing.services, services);
    absorb_map(&mut existing.topics, topics);
    absorb_map(&mut existing.parameters, parameters);
}

fn absorb_map<T>(existing: &mut BTreeMap<String, T>, incoming: BTreeMap<String, T>) {
    for (name, entry) in incoming {
        existing.entry(name).or_insert(entry);
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    let rendered: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!("[{}]", rendered.join(", "))
}
