//! Version 1 extraction.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use super::{ParseError, ParseOptions, bool_attribute, element_ref, required_attribute};
use crate::parser::DuplicatePolicy;
use crate::qos::{QosPreset, QosProfile};
use crate::{
    Action, Interface, InterfaceKind, Node, Parameter, ParseWarning, Service, Topic, WarningKind,
};

type Element<'a, 'input> = roxmltree::Node<'a, 'input>;

pub(super) struct Extractor<'p> {
    path: &'p Path,
    options: ParseOptions,
    warnings: Vec<ParseWarning>,
}

impl<'p> Extractor<'p> {
    pub(super) fn new(path: &'p Path, options: ParseOptions) -> Self {
        Self {
            path,
            options,
            warnings: Vec::new(),
        }
    }

    pub(super) fn run(
        mut self,
        interface: Element<'_, '_>,
    ) -> Result<(Vec<Node>, Vec<ParseWarning>), ParseError> {
        let nodes = interface
            .children()
            .filter(|child| is_tag(*child, "node"))
            .map(|element| self.parse_node(element))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((nodes, self.warnings))
    }

    fn parse_node(&mut self, element: Element<'_, '_>) -> Result<Node, ParseError> {
        let name = required_attribute(element, "name", self.path)?;
        let mut node = Node::new(name);
        node.executable = element.attribute("executable").map(str::to_string);
        let mut ambiguous = BTreeMap::new();

        for child in element.children().filter(|child| child.is_element()) {
            if child.tag_name().namespace().is_some() {
                continue;
            }
            let Some(kind) = InterfaceKind::from_tag(child.tag_name().name()) else {
                continue;
            };

            let entry = match kind {
                InterfaceKind::Action => Interface::Action(self.parse_action(child)?),
                InterfaceKind::Service => Interface::Service(self.parse_service(child)?),
                InterfaceKind::Topic => Interface::Topic(self.parse_topic(child)?),
                InterfaceKind::Parameter => Interface::Parameter(self.parse_parameter(child)?),
            };
            let key = (entry.kind(), entry.name().to_string());
            match self.ambiguity(&entry, child) {
                Some(warning) => ambiguous.insert(key, warning),
                None => ambiguous.remove(&key),
            };
            self.insert(&mut node, entry, child)?;
        }

        // Only entries that survived into the node are reported.
        let mut warnings: Vec<ParseWarning> = ambiguous.into_values().collect();
        warnings.sort_by_key(|warning| warning.element.line);
        for warning in warnings {
            warn!("{warning}");
            self.warnings.push(warning);
        }

        debug!(
            node = %node.name,
            path = %self.path.display(),
            actions = node.actions.len(),
            services = node.services.len(),
            topics = node.topics.len(),
            parameters = node.parameters.len(),
            "Parsed node"
        );
        Ok(node)
    }

    fn parse_action(&self, element: Element<'_, '_>) -> Result<Action, ParseError> {
        let name = required_attribute(element, "name", self.path)?;
        let value_type = required_attribute(element, "type", self.path)?;
        Ok(Action {
            name: name.to_string(),
            value_type: value_type.to_string(),
            server: bool_attribute(element, "server", self.path)?,
            client: bool_attribute(element, "client", self.path)?,
            qos: self.parse_qos(InterfaceKind::Action, element)?,
        })
    }

    fn parse_service(&self, element: Element<'_, '_>) -> Result<Service, ParseError> {
        let name = required_attribute(element, "name", self.path)?;
        let value_type = required_attribute(element, "type", self.path)?;
        Ok(Service {
            name: name.to_string(),
            value_type: value_type.to_string(),
            server: bool_attribute(element, "server", self.path)?,
            client: bool_attribute(element, "client", self.path)?,
            qos: self.parse_qos(InterfaceKind::Service, element)?,
        })
    }

    fn parse_topic(&self, element: Element<'_, '_>) -> Result<Topic, ParseError> {
        let name = required_attribute(element, "name", self.path)?;
        let value_type = required_attribute(element, "type", self.path)?;
        Ok(Topic {
            name: name.to_string(),
            value_type: value_type.to_string(),
            publisher: bool_attribute(element, "publisher", self.path)?,
            subscriber: bool_attribute(element, "subscriber", self.path)?,
            qos: self.parse_qos(InterfaceKind::Topic, element)?,
        })
    }

    fn parse_parameter(&self, element: Element<'_, '_>) -> Result<Parameter, ParseError> {
        let name = required_attribute(element, "name", self.path)?;
        let value_type = required_attribute(element, "type", self.path)?;
        Ok(Parameter::new(name, value_type))
    }

    /// Builds the profile from the `qos` preset attribute (or the kind's
    /// default) and an optional `<qos>` override child.
    fn parse_qos(&self, kind: InterfaceKind, element: Element<'_, '_>) -> Result<QosProfile, ParseError> {
        let mut profile = match element.attribute("qos") {
            Some(key) => key
                .parse::<QosPreset>()
                .map_err(|err| self.invalid(element, "qos", key, &err.to_string()))?
                .profile(),
            None => kind
                .default_qos()
                .map(QosPreset::profile)
                .unwrap_or_default(),
        };

        if let Some(overrides) = element.children().find(|child| is_tag(*child, "qos")) {
            let policies: Vec<(String, String)> = overrides
                .attributes()
                .filter(|attr| attr.namespace().is_none())
                .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                .collect();
            profile
                .apply_policies(policies.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .map_err(|err| ParseError::InvalidAttribute {
                    element: element_ref(overrides, self.path),
                    attribute: "qos".to_string(),
                    value: policies
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(" "),
                    reason: err.to_string(),
                })?;
        }

        Ok(profile)
    }

    fn ambiguity(&self, entry: &Interface, element: Element<'_, '_>) -> Option<ParseWarning> {
        if entry.has_role() {
            return None;
        }
        Some(ParseWarning {
            kind: WarningKind::for_kind(entry.kind())?,
            element: element_ref(element, self.path),
        })
    }

    fn insert(&self, node: &mut Node, entry: Interface, element: Element<'_, '_>) -> Result<(), ParseError> {
        let kind = entry.kind();
        let name = entry.name().to_string();
        if self.options.duplicates == DuplicatePolicy::Reject && node.get(kind, &name).is_some() {
            return Err(ParseError::DuplicateEntry {
                element: element_ref(element, self.path),
                kind,
                name,
            });
        }
        if node.insert(entry).is_some() {
            debug!(node = %node.name, %kind, entry = %name, "Duplicate entry replaced by later declaration");
        }
        Ok(())
    }

    fn invalid(&self, element: Element<'_, '_>, attribute: &str, value: &str, reason: &str) -> ParseError {
        ParseError::InvalidAttribute {
            element: element_ref(element, self.path),
            attribute: attribute.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn is_tag(element: Element<'_, '_>, tag: &str) -> bool {
    element.is_element() && element.tag_name().namespace().is_none() && element.tag_name().name() == tag
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::{QosHistory, QosReliability};

    const PATH: &str = "pkg/talker.nodl.xml";

    fn extract(xml: &str, options: ParseOptions) -> Result<(Vec<Node>, Vec<ParseWarning>), ParseError> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        Extractor::new(Path::new(PATH), options).run(doc.root_element())
    }

    #[test]
    fn test_extracts_attributes_verbatim() {
        let xml = r#"<interface version="1">
            <node name="talker">
                <action name="fib" type="example/action/Fibonacci" server="true"/>
                <service name="add" type="example/srv/AddTwoInts" client="1"/>
                <topic name="chatter" type="std_msgs/msg/String" publisher="True" subscriber="false"/>
                <parameter name="rate" type="double"/>
            </node>
        </interface>"#;
        let (nodes, warnings) = extract(xml, ParseOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(nodes.len(), 1);

        let node = &nodes[0];
        assert_eq!(node.name, "talker");
        let action = &node.actions["fib"];
        assert_eq!(action.value_type, "example/action/Fibonacci");
        assert!(action.server && !action.client);
        assert_eq!(action.qos, QosPreset::ActionStatusDefault.profile());

        let service = &node.services["add"];
        assert!(!service.server && service.client);
        assert_eq!(service.qos, QosPreset::ServicesDefault.profile());

        let topic = &node.topics["chatter"];
        assert!(topic.publisher && !topic.subscriber);
        assert_eq!(topic.qos, QosPreset::SystemDefault.profile());

        assert_eq!(node.parameters["rate"], Parameter::new("rate", "double"));
    }

    #[test]
    fn test_missing_type_on_topic_names_the_topic() {
        let xml = r#"<interface version="1"><node name="n">
            <topic name="scan" publisher="true"/>
        </node></interface>"#;
        match extract(xml, ParseOptions::default()).unwrap_err() {
            ParseError::MissingAttribute { element, attribute } => {
                assert_eq!(attribute, "type");
                assert_eq!(element.tag, "topic");
                assert_eq!(element.name.as_deref(), Some("scan"));
                assert_eq!(element.line, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_node_name_names_the_node() {
        let xml = r#"<interface version="1"><node><parameter name="p" type="int"/></node></interface>"#;
        match extract(xml, ParseOptions::default()).unwrap_err() {
            ParseError::MissingAttribute { element, attribute } => {
                assert_eq!(attribute, "name");
                assert_eq!(element.tag, "node");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_roleless_entries_warn_once_each() {
        let xml = r#"<interface version="1"><node name="n">
            <topic name="quiet" type="T"/>
            <service name="idle" type="S" server="false" client="0"/>
            <parameter name="p" type="int"/>
        </node></interface>"#;
        let (nodes, warnings) = extract(xml, ParseOptions::default()).unwrap();
        assert_eq!(nodes[0].interface_count(), 3);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, WarningKind::AmbiguousTopic);
        assert_eq!(warnings[0].entry_name(), Some("quiet"));
        assert_eq!(warnings[1].kind, WarningKind::AmbiguousService);
    }

    #[test]
    fn test_unknown_children_are_skipped() {
        let xml = r#"<interface version="1">
            <documentation/>
            <node name="n"><executable path="x"/><parameter name="p" type="int"/></node>
        </interface>"#;
        let (nodes, _) = extract(xml, ParseOptions::default()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].interface_count(), 1);
    }

    #[test]
    fn test_duplicate_entries_last_wins_by_default() {
        let xml = r#"<interface version="1"><node name="n">
            <parameter name="p" type="int"/>
            <parameter name="p" type="double"/>
        </node></interface>"#;
        let (nodes, _) = extract(xml, ParseOptions::default()).unwrap();
        assert_eq!(nodes[0].parameters["p"].value_type, "double");
    }

    #[test]
    fn test_replaced_roleless_entry_leaves_no_warning() {
        let xml = r#"<interface version="1"><node name="n">
            <topic name="chatter" type="T"/>
            <topic name="chatter" type="T" publisher="true"/>
            <service name="idle" type="S" server="true"/>
            <service name="idle" type="S"/>
        </node></interface>"#;
        let (nodes, warnings) = extract(xml, ParseOptions::default()).unwrap();
        assert!(nodes[0].topics["chatter"].publisher);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::AmbiguousService);
        assert_eq!(warnings[0].element.line, 5);
    }

    #[test]
    fn test_duplicate_entries_rejected_when_strict() {
        let xml = r#"<interface version="1"><node name="n">
            <parameter name="p" type="int"/>
            <parameter name="p" type="double"/>
        </node></interface>"#;
        match extract(xml, ParseOptions::strict()).unwrap_err() {
            ParseError::DuplicateEntry { kind, name, element } => {
                assert_eq!(kind, InterfaceKind::Parameter);
                assert_eq!(name, "p");
                assert_eq!(element.line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_qos_preset_and_overrides() {
        let xml = r#"<interface version="1"><node name="n">
            <topic name="scan" type="T" subscriber="true" qos="sensor_data">
                <qos depth="1"/>
            </topic>
            <service name="s" type="S" server="true">
                <qos history="keep_all" reliability="best_effort"/>
            </service>
        </node></interface>"#;
        let (nodes, _) = extract(xml, ParseOptions::default()).unwrap();
        let topic = &nodes[0].topics["scan"];
        assert_eq!(topic.qos.reliability, QosReliability::BestEffort);
        assert_eq!(topic.qos.history, QosHistory::KeepLast(1));

        let service = &nodes[0].services["s"];
        assert_eq!(service.qos.history, QosHistory::KeepAll);
        assert_eq!(service.qos.reliability, QosReliability::BestEffort);
    }
}
