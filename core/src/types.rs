//! Interface model for node descriptors.
//!
//! A [`Node`] aggregates the named actions, services, topics, and parameters
//! one software component exposes. Each entry kind has its own struct so
//! role flags stay kind-specific; [`Interface`] wraps them in a tagged union
//! for code that needs to treat entries uniformly (merging, diagnostics,
//! rendering).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::qos::{QosPreset, QosProfile};

/// Highest descriptor language version this build understands.
pub const MAX_SUPPORTED_VERSION: u32 = 1;

/// File-name suffix carried by every descriptor document.
pub const DESCRIPTOR_SUFFIX: &str = ".nodl.xml";

/// The four kinds of interface entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Action,
    Service,
    Topic,
    Parameter,
}

impl InterfaceKind {
    pub const ALL: [InterfaceKind; 4] = [
        InterfaceKind::Action,
        InterfaceKind::Service,
        InterfaceKind::Topic,
        InterfaceKind::Parameter,
    ];

    /// Element tag used for this kind in descriptor documents.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Service => "service",
            Self::Topic => "topic",
            Self::Parameter => "parameter",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// QoS preset applied when an entry of this kind names none.
    ///
    /// Parameters carry no QoS, so they have no default.
    pub fn default_qos(self) -> Option<QosPreset> {
        match self {
            Self::Action => Some(QosPreset::ActionStatusDefault),
            Self::Service => Some(QosPreset::ServicesDefault),
            Self::Topic => Some(QosPreset::SystemDefault),
            Self::Parameter => None,
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An action a node serves and/or calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub server: bool,
    pub client: bool,
    pub qos: QosProfile,
}

impl Action {
    pub fn new(name: &str, value_type: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: value_type.to_string(),
            server: false,
            client: false,
            qos: QosPreset::ActionStatusDefault.profile(),
        }
    }

    pub fn server(mut self) -> Self {
        self.server = true;
        self
    }

    pub fn client(mut self) -> Self {
        self.client = true;
        self
    }

    pub fn with_qos(mut self, qos: QosProfile) -> Self {
        self.qos = qos;
        self
    }
}

/// A service a node serves and/or calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub server: bool,
    pub client: bool,
    pub qos: QosProfile,
}

impl Service {
    pub fn new(name: &str, value_type: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: value_type.to_string(),
            server: false,
            client: false,
            qos: QosPreset::ServicesDefault.profile(),
        }
    }

    pub fn server(mut self) -> Self {
        self.server = true;
        self
    }

    pub fn client(mut self) -> Self {
        self.client = true;
        self
    }

    pub fn with_qos(mut self, qos: QosProfile) -> Self {
        self.qos = qos;
        self
    }
}

/// A topic a node publishes and/or subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub publisher: bool,
    pub subscriber: bool,
    pub qos: QosProfile,
}

impl Topic {
    pub fn new(name: &str, value_type: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: value_type.to_string(),
            publisher: false,
            subscriber: false,
            qos: QosPreset::SystemDefault.profile(),
        }
    }

    pub fn publisher(mut self) -> Self {
        self.publisher = true;
        self
    }

    pub fn subscriber(mut self) -> Self {
        self.subscriber = true;
        self
    }

    pub fn with_qos(mut self, qos: QosProfile) -> Self {
        self.qos = qos;
        self
    }
}

/// A parameter a node declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
}

impl Parameter {
    pub fn new(name: &str, value_type: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: value_type.to_string(),
        }
    }
}

/// Any interface entry, tagged with its kind.
///
/// Equality is structural over every field; entries of different kinds are
/// never equal, even when they share a name and type.
///
/// # Examples
///
/// ```
/// use nodl_core::*;
///
/// let topic = Interface::Topic(Topic::new("scan", "sensor_msgs/msg/LaserScan").publisher());
/// let service = Interface::Service(Service::new("scan", "sensor_msgs/msg/LaserScan").server());
/// assert_eq!(topic.name(), service.name());
/// assert_ne!(topic, service);
/// assert!(topic.has_role());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interface {
    Action(Action),
    Service(Service),
    Topic(Topic),
    Parameter(Parameter),
}

impl Interface {
    pub fn kind(&self) -> InterfaceKind {
        match self {
            Self::Action(_) => InterfaceKind::Action,
            Self::Service(_) => InterfaceKind::Service,
            Self::Topic(_) => InterfaceKind::Topic,
            Self::Parameter(_) => InterfaceKind::Parameter,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Action(a) => &a.name,
            Self::Service(s) => &s.name,
            Self::Topic(t) => &t.name,
            Self::Parameter(p) => &p.name,
        }
    }

    pub fn value_type(&self) -> &str {
        match self {
            Self::Action(a) => &a.value_type,
            Self::Service(s) => &s.value_type,
            Self::Topic(t) => &t.value_type,
            Self::Parameter(p) => &p.value_type,
        }
    }

    pub fn qos(&self) -> Option<&QosProfile> {
        match self {
            Self::Action(a) => Some(&a.qos),
            Self::Service(s) => Some(&s.qos),
            Self::Topic(t) => Some(&t.qos),
            Self::Parameter(_) => None,
        }
    }

    /// Whether at least one role flag is set. Parameters have no roles and
    /// always report `true`.
    pub fn has_role(&self) -> bool {
        match self {
            Self::Action(a) => a.server || a.client,
            Self::Service(s) => s.server || s.client,
            Self::Topic(t) => t.publisher || t.subscriber,
            Self::Parameter(_) => true,
        }
    }

    /// Field-level rendering used for conflict diagnostics.
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

impl From<Action> for Interface {
    fn from(value: Action) -> Self {
        Self::Action(value)
    }
}

impl From<Service> for Interface {
    fn from(value: Service) -> Self {
        Self::Service(value)
    }
}

impl From<Topic> for Interface {
    fn from(value: Topic) -> Self {
        Self::Topic(value)
    }
}

impl From<Parameter> for Interface {
    fn from(value: Parameter) -> Self {
        Self::Parameter(value)
    }
}

/// A named component and every interface it exposes.
///
/// Entries are keyed by name within each kind. Maps are ordered so rendered
/// output is stable; nothing depends on that order for correctness.
///
/// # Examples
///
/// ```
/// use nodl_core::*;
///
/// let node = Node::new("talker")
///     .with(Topic::new("chatter", "std_msgs/msg/String").publisher())
///     .with(Parameter::new("rate", "double"));
///
/// assert_eq!(node.topics["chatter"].value_type, "std_msgs/msg/String");
/// assert_eq!(node.interface_count(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Executable that runs the node, when the descriptor names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    pub actions: BTreeMap<String, Action>,
    pub services: BTreeMap<String, Service>,
    pub topics: BTreeMap<String, Topic>,
    pub parameters: BTreeMap<String, Parameter>,
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_executable(mut self, executable: &str) -> Self {
        self.executable = Some(executable.to_string());
        self
    }

    /// Adds an entry, builder style.
    pub fn with(mut self, entry: impl Into<Interface>) -> Self {
        self.insert(entry.into());
        self
    }

    /// Inserts an entry, returning the entry of the same kind and name it
    /// replaced, if any.
    pub fn insert(&mut self, entry: Interface) -> Option<Interface> {
        match entry {
            Interface::Action(a) => self
                .actions
                .insert(a.name.clone(), a)
                .map(Interface::Action),
            Interface::Service(s) => self
                .services
                .insert(s.name.clone(), s)
                .map(Interface::Service),
            Interface::Topic(t) => self.topics.insert(t.name.clone(), t).map(Interface::Topic),
            Interface::Parameter(p) => self
                .parameters
                .insert(p.name.clone(), p)
                .map(Interface::Parameter),
        }
    }

    /// Looks up an entry by kind and name.
    pub fn get(&self, kind: InterfaceKind, name: &str) -> Option<Interface> {
        match kind {
            InterfaceKind::Action => self.actions.get(name).cloned().map(Interface::Action),
            InterfaceKind::Service => self.services.get(name).cloned().map(Interface::Service),
            InterfaceKind::Topic => self.topics.get(name).cloned().map(Interface::Topic),
            InterfaceKind::Parameter => {
                self.parameters.get(name).cloned().map(Interface::Parameter)
            }
        }
    }

    /// All entries, kind by kind.
    pub fn interfaces(&self) -> impl Iterator<Item = Interface> + '_ {
        self.actions
            .values()
            .cloned()
            .map(Interface::Action)
            .chain(self.services.values().cloned().map(Interface::Service))
            .chain(self.topics.values().cloned().map(Interface::Topic))
            .chain(self.parameters.values().cloned().map(Interface::Parameter))
    }

    pub fn interface_count(&self) -> usize {
        self.actions.len() + self.services.len() + self.topics.len() + self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interface_count() == 0
    }
}

/// Location of an element in a descriptor document, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementRef {
    pub tag: String,
    /// The element's `name` attribute, when it has one.
    pub name: Option<String>,
    pub path: PathBuf,
    pub line: u32,
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(
                f,
                "<{} name=\"{}\"> at {}:{}",
                self.tag,
                name,
                self.path.display(),
                self.line
            ),
            None => write!(f, "<{}> at {}:{}", self.tag, self.path.display(), self.line),
        }
    }
}

/// Non-fatal findings collected while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// An action that is neither server nor client.
    AmbiguousAction,
    /// A service that is neither server nor client.
    AmbiguousService,
    /// A topic that is neither publisher nor subscriber.
    AmbiguousTopic,
}

impl WarningKind {
    pub fn for_kind(kind: InterfaceKind) -> Option<Self> {
        match kind {
            InterfaceKind::Action => Some(Self::AmbiguousAction),
            InterfaceKind::Service => Some(Self::AmbiguousService),
            InterfaceKind::Topic => Some(Self::AmbiguousTopic),
            InterfaceKind::Parameter => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    pub kind: WarningKind,
    pub element: ElementRef,
}

impl ParseWarning {
    /// Name of the entry the warning refers to.
    pub fn entry_name(&self) -> Option<&str> {
        self.element.name.as_deref()
    }
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.entry_name().unwrap_or("<unnamed>");
        let roles = match self.kind {
            WarningKind::AmbiguousAction | WarningKind::AmbiguousService => {
                "neither server nor client"
            }
            WarningKind::AmbiguousTopic => "neither publisher nor subscriber",
        };
        write!(
            f,
            "{}:{}: {} '{}' is {}",
            self.element.path.display(),
            self.element.line,
            self.element.tag,
            name,
            roles
        )
    }
}

/// The nodes parsed from one descriptor file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub path: PathBuf,
    pub version: u32,
    pub nodes: Vec<Node>,
    /// Non-fatal findings, kept apart from the nodes themselves.
    pub warnings: Vec<ParseWarning>,
}

impl Document {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn find_node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Returns `true` when `path` names a descriptor document.
pub fn is_descriptor_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() > DESCRIPTOR_SUFFIX.len() && name.ends_with(DESCRIPTOR_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_of_different_kinds_are_never_equal() {
        let action = Interface::from(Action::new("foo", "pkg/action/Foo").server());
        let service = Interface::from(Service::new("foo", "pkg/action/Foo").server());
        assert_ne!(action, service);
    }

    #[test]
    fn test_equality_covers_roles_and_qos() {
        let a = Topic::new("scan", "sensor_msgs/msg/LaserScan").publisher();
        let b = Topic::new("scan", "sensor_msgs/msg/LaserScan").publisher();
        assert_eq!(a, b);

        let subscriber = b.clone().subscriber();
        assert_ne!(a, subscriber);

        let sensor = b.with_qos(QosPreset::SensorData.profile());
        assert_ne!(a, sensor);
    }

    #[test]
    fn test_node_insert_returns_replaced_entry() {
        let mut node = Node::new("talker");
        assert!(node.insert(Parameter::new("rate", "double").into()).is_none());
        let replaced = node.insert(Parameter::new("rate", "int").into());
        assert_eq!(replaced, Some(Parameter::new("rate", "double").into()));
        assert_eq!(node.parameters["rate"].value_type, "int");
    }

    #[test]
    fn test_same_name_in_different_kinds_coexists() {
        let node = Node::new("n")
            .with(Topic::new("x", "T").publisher())
            .with(Service::new("x", "S").server());
        assert_eq!(node.interface_count(), 2);
        assert_eq!(
            node.get(InterfaceKind::Service, "x").map(|e| e.kind()),
            Some(InterfaceKind::Service)
        );
    }

    #[test]
    fn test_parameters_have_no_qos() {
        let param = Interface::from(Parameter::new("rate", "double"));
        assert!(param.qos().is_none());
        assert!(param.has_role());
        assert!(!param.to_fields().contains_key("qos"));
    }

    #[test]
    fn test_to_fields_uses_type_key() {
        let fields = Interface::from(Topic::new("chatter", "std_msgs/msg/String")).to_fields();
        assert_eq!(fields["kind"], "topic");
        assert_eq!(fields["type"], "std_msgs/msg/String");
        assert_eq!(fields["publisher"], false);
    }

    #[test]
    fn test_descriptor_path_detection() {
        assert!(is_descriptor_path(Path::new("share/pkg/talker.nodl.xml")));
        assert!(!is_descriptor_path(Path::new("share/pkg/talker.xml")));
        assert!(!is_descriptor_path(Path::new(".nodl.xml")));
    }
}
