//! Output formatting for merged interfaces and merge conflicts.

use std::path::{Path, PathBuf};

use nodl_core::{Interface, MergeConflict, MergedInterface, Node, QosProfile};
use serde::{Deserialize, Serialize};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
    Table,
}

/// A merged node together with the files it came from.
#[derive(Debug, Serialize)]
struct NodeReport<'a> {
    #[serde(flatten)]
    node: &'a Node,
    origins: &'a [PathBuf],
}

#[derive(Debug, Serialize)]
struct InterfaceReport<'a> {
    nodes: Vec<NodeReport<'a>>,
}

impl<'a> InterfaceReport<'a> {
    fn new(merged: &'a MergedInterface) -> Self {
        Self {
            nodes: merged
                .nodes()
                .iter()
                .map(|node| NodeReport {
                    node,
                    origins: merged.origins(&node.name),
                })
                .collect(),
        }
    }
}

/// Formats a merged interface in the requested output format.
pub fn format_interface(merged: &MergedInterface, format: OutputFormat) -> Result<String, String> {
    let report = InterfaceReport::new(merged);
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(&report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(interface_to_markdown(&report)),
        OutputFormat::Table => Ok(interface_to_table(&report)),
    }
}

/// Renders a file verbatim under a header naming it.
pub fn format_raw(path: &Path, contents: &str) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("{name}:\n{}\n\n{contents}", "-".repeat(80))
}

/// Renders a merge conflict with both sides in field-level form.
pub fn format_conflict(conflict: &MergeConflict) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "Failed to merge node \"{}\" from {} with existing entry from {}\n",
        conflict.node,
        conflict.incoming_origin.display(),
        path_list(&conflict.existing_origins)
    ));
    out.push_str(&format!(
        "Conflicting {} '{}' differs in: {}\n",
        conflict.kind,
        conflict.entry,
        conflict.differing_fields().join(", ")
    ));

    out.push_str(&format!(
        "\n{}:\n{}\n{}\n",
        conflict.incoming_origin.display(),
        "-".repeat(80),
        pretty_fields(&conflict.incoming)
    ));
    out.push_str(&format!(
        "\n{}:\n{}\n{}\n",
        path_list(&conflict.existing_origins),
        "-".repeat(80),
        pretty_fields(&conflict.existing)
    ));

    out
}

fn pretty_fields(entry: &Interface) -> String {
    let value = serde_json::Value::Object(entry.to_fields());
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

fn path_list(paths: &[PathBuf]) -> String {
    let rendered: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!("[{}]", rendered.join(", "))
}

fn flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn qos_cell(qos: &QosProfile) -> String {
    qos.to_string()
}

fn interface_to_markdown(report: &InterfaceReport<'_>) -> String {
    let mut out = String::new();

    for entry in &report.nodes {
        let node = entry.node;
        out.push_str(&format!("# {}\n\n", node.name));

        if let Some(executable) = &node.executable {
            out.push_str(&format!("**Executable:** `{executable}`\n\n"));
        }

        if !entry.origins.is_empty() {
            out.push_str(&format!("**Sources:** {}\n\n", path_list(entry.origins)));
        }

        if !node.actions.is_empty() {
            out.push_str("## Actions\n\n");
            out.push_str("| Name | Type | Server | Client | QoS |\n");
            out.push_str("|------|------|--------|--------|-----|\n");
            for action in node.actions.values() {
                out.push_str(&format!(
                    "| `{}` | `{}` | {} | {} | {} |\n",
                    action.name,
                    action.value_type,
                    flag(action.server),
                    flag(action.client),
                    qos_cell(&action.qos)
                ));
            }
            out.push('\n');
        }

        if !node.services.is_empty() {
            out.push_str("## Services\n\n");
            out.push_str("| Name | Type | Server | Client | QoS |\n");
            out.push_str("|------|------|--------|--------|-----|\n");
            for service in node.services.values() {
                out.push_str(&format!(
                    "| `{}` | `{}` | {} | {} | {} |\n",
                    service.name,
                    service.value_type,
                    flag(service.server),
                    flag(service.client),
                    qos_cell(&service.qos)
                ));
            }
            out.push('\n');
        }

        if !node.topics.is_empty() {
            out.push_str("## Topics\n\n");
            out.push_str("| Name | Type | Publisher | Subscriber | QoS |\n");
            out.push_str("|------|------|-----------|------------|-----|\n");
            for topic in node.topics.values() {
                out.push_str(&format!(
                    "| `{}` | `{}` | {} | {} | {} |\n",
                    topic.name,
                    topic.value_type,
                    flag(topic.publisher),
                    flag(topic.subscriber),
                    qos_cell(&topic.qos)
                ));
            }
            out.push('\n');
        }

        if !node.parameters.is_empty() {
            out.push_str("## Parameters\n\n");
            out.push_str("| Name | Type |\n");
            out.push_str("|------|------|\n");
            for parameter in node.parameters.values() {
                out.push_str(&format!(
                    "| `{}` | `{}` |\n",
                    parameter.name, parameter.value_type
                ));
            }
            out.push('\n');
        }
    }

    out
}

fn interface_to_table(report: &InterfaceReport<'_>) -> String {
    let mut out = String::new();

    for (index, entry) in report.nodes.iter().enumerate() {
        let node = entry.node;
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "Node: {}  Entries: {}",
            node.name,
            node.interface_count()
        ));
        if let Some(executable) = &node.executable {
            out.push_str(&format!("  Executable: {executable}"));
        }
        if !entry.origins.is_empty() {
            out.push_str(&format!("  Sources: {}", path_list(entry.origins)));
        }
        out.push('\n');

        let rows: Vec<(String, String, String, String)> = node
            .interfaces()
            .map(|item| {
                let roles = roles_of(&item);
                let qos = item.qos().map(qos_cell).unwrap_or_default();
                (
                    format!("{} {}", item.kind(), item.name()),
                    item.value_type().to_string(),
                    roles,
                    qos,
                )
            })
            .collect();
        if rows.is_empty() {
            continue;
        }

        let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(4);
        let type_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(4);
        let role_width = rows.iter().map(|r| r.2.len()).max().unwrap_or(4);
        for (name, value_type, roles, qos) in &rows {
            let line = format!(
                "  {name:<name_width$}  {value_type:<type_width$}  {roles:<role_width$}  {qos}"
            );
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }

    out
}

fn roles_of(item: &Interface) -> String {
    let roles: Vec<&str> = match item {
        Interface::Action(a) => [("server", a.server), ("client", a.client)]
            .into_iter()
            .filter_map(|(role, on)| on.then_some(role))
            .collect(),
        Interface::Service(s) => [("server", s.server), ("client", s.client)]
            .into_iter()
            .filter_map(|(role, on)| on.then_some(role))
            .collect(),
        Interface::Topic(t) => [("publisher", t.publisher), ("subscriber", t.subscriber)]
            .into_iter()
            .filter_map(|(role, on)| on.then_some(role))
            .collect(),
        Interface::Parameter(_) => return "-".to_string(),
    };
    if roles.is_empty() {
        "(none)".to_string()
    } else {
        roles.join(",")
    }
}
