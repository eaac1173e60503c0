use std::fs;
use std::path::PathBuf;

use nodl_core::*;

#[test]
fn test_parse_two_node_fixture() {
    let document = parse(&fixture("talker_listener.nodl.xml")).expect("fixture should parse");
    assert_eq!(document.version, 1);
    assert!(document.warnings.is_empty());

    let names: Vec<&str> = document.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["talker", "listener"]);

    let talker = document.find_node("talker").unwrap();
    assert_eq!(talker.executable.as_deref(), Some("talker"));
    assert_eq!(talker.topics["chatter"].value_type, "std_msgs/msg/String");
    assert!(talker.topics["chatter"].publisher);
    assert!(!talker.topics["chatter"].subscriber);
    assert_eq!(talker.topics["chatter"].qos, QosPreset::SensorData.profile());
    assert!(talker.services["reset"].server);
    assert_eq!(talker.parameters["rate"].value_type, "double");

    let listener = document.find_node("listener").unwrap();
    assert_eq!(listener.executable, None);
    let qos = listener.topics["chatter"].qos;
    assert_eq!(qos.history, QosHistory::KeepLast(5));
    assert_eq!(qos.reliability, QosReliability::BestEffort);
    assert!(listener.actions["fibonacci"].client);
    assert_eq!(
        listener.actions["fibonacci"].qos,
        QosPreset::ActionStatusDefault.profile()
    );
}

#[test]
fn test_merging_a_file_with_itself_changes_nothing() {
    let path = fixture("talker_listener.nodl.xml");
    let single = parse(&path).unwrap();
    let merged = parse_multiple(&[path.clone(), path.clone()]).unwrap();

    assert_eq!(merged.nodes(), single.nodes.as_slice());
    assert_eq!(merged.origins("talker"), &[path]);
}

#[test]
fn test_merge_order_does_not_change_merged_nodes() {
    let a = fixture("talker_listener.nodl.xml");
    let b = fixture("talker_extra.nodl.xml");

    let ab = parse_multiple(&[a.clone(), b.clone()]).unwrap();
    let ba = parse_multiple(&[b.clone(), a.clone()]).unwrap();

    let talker = ab.get("talker").unwrap();
    assert_eq!(Some(talker), ba.get("talker"));
    assert!(talker.actions.contains_key("announce"));
    assert!(talker.topics.contains_key("chatter"));
    assert_eq!(talker.executable.as_deref(), Some("talker"));
    assert_eq!(ab.origins("talker"), &[a.clone(), b.clone()]);
    assert_eq!(ba.origins("talker"), &[b, a.clone()]);
    assert_eq!(ab.origins("listener"), &[a]);
}

#[test]
fn test_conflicting_files_report_both_origins() {
    let a = fixture("conflict_a.nodl.xml");
    let b = fixture("conflict_b.nodl.xml");

    let err = parse_multiple(&[a.clone(), b.clone()]).unwrap_err();
    let conflict = err.as_conflict().expect("expected a merge conflict");
    assert_eq!(conflict.node, "x");
    assert_eq!(conflict.kind, InterfaceKind::Action);
    assert_eq!(conflict.entry, "foo");
    assert_eq!(conflict.existing_origins, vec![a]);
    assert_eq!(conflict.incoming_origin, b);
    assert_eq!(conflict.existing.value_type(), "pkg/action/T1");
    assert_eq!(conflict.incoming.value_type(), "pkg/action/T2");
}

#[test]
fn test_conflict_keeps_individual_parses_available() {
    let paths = vec![fixture("conflict_a.nodl.xml"), fixture("conflict_b.nodl.xml")];
    let documents = parse_documents(&paths, ParseOptions::default()).unwrap();
    assert_eq!(documents.len(), 2);
    assert!(merge_documents(&documents).is_err());
    assert!(merge_documents(&documents[..1]).is_ok());
}

#[test]
fn test_future_version_is_unsupported() {
    let err = parse(&fixture("future_version.nodl.xml")).unwrap_err();
    assert!(
        matches!(
            err,
            NodlError::Parse(ParseError::UnsupportedVersion { found: 2, max: 1, .. })
        ),
        "{err:?}"
    );
}

#[test]
fn test_topic_without_type_names_the_topic() {
    let err = parse(&fixture("missing_type.nodl.xml")).unwrap_err();
    match err {
        NodlError::Parse(ParseError::MissingAttribute { element, attribute }) => {
            assert_eq!(attribute, "type");
            assert_eq!(element.tag, "topic");
            assert_eq!(element.name.as_deref(), Some("t"));
            assert_eq!(element.line, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_roleless_topic_is_kept_with_a_warning() {
    let document = parse(&fixture("ambiguous_topic.nodl.xml")).unwrap();
    let topic = &document.find_node("n").unwrap().topics["t"];
    assert!(!topic.publisher && !topic.subscriber);

    assert_eq!(document.warnings.len(), 1);
    assert_eq!(document.warnings[0].kind, WarningKind::AmbiguousTopic);
    assert_eq!(document.warnings[0].entry_name(), Some("t"));
}

#[test]
fn test_wrong_root_element() {
    let err = parse(&fixture("not_a_descriptor.nodl.xml")).unwrap_err();
    assert!(
        matches!(
            err,
            NodlError::Schema(SchemaError::MissingRootElement { ref found, .. }) if found == "package"
        ),
        "{err:?}"
    );
}

#[test]
fn test_first_failing_path_in_input_order_is_reported() {
    let paths = vec![
        fixture("talker_listener.nodl.xml"),
        fixture("missing_type.nodl.xml"),
        fixture("future_version.nodl.xml"),
    ];
    let err = parse_multiple(&paths).unwrap_err();
    assert!(
        matches!(err, NodlError::Parse(ParseError::MissingAttribute { .. })),
        "{err:?}"
    );
}

#[test]
fn test_unreadable_path_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.nodl.xml");
    let err = parse(&missing).unwrap_err();
    match err {
        NodlError::Io { path, .. } => assert_eq!(path, missing),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_malformed_xml_reports_position() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.nodl.xml");
    fs::write(&path, "<interface version=\"1\">\n  <node name=\"n\">\n</interface>\n").unwrap();

    let err = parse(&path).unwrap_err();
    match err {
        NodlError::Schema(SchemaError::DocumentInvalid { line, .. }) => assert!(line >= 2),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_invalid_role_flag_is_a_schema_violation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flags.nodl.xml");
    fs::write(
        &path,
        "<interface version=\"1\"><node name=\"n\"><topic name=\"t\" type=\"T\" publisher=\"yes\"/></node></interface>",
    )
    .unwrap();

    let err = parse(&path).unwrap_err();
    match err {
        NodlError::Schema(SchemaError::DocumentInvalid { message, .. }) => {
            assert!(message.contains("publisher"), "{message}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_strict_policy_rejects_duplicate_entries() {
    let xml = r#"<interface version="1">
  <node name="n">
    <parameter name="p" type="int"/>
    <parameter name="p" type="double"/>
  </node>
</interface>"#;
    let path = PathBuf::from("dup.nodl.xml");

    let lenient = parse_str(xml, &path, ParseOptions::default()).unwrap();
    assert_eq!(lenient.nodes[0].parameters["p"].value_type, "double");

    let err = parse_str(xml, &path, ParseOptions::strict()).unwrap_err();
    assert!(
        matches!(err, NodlError::Parse(ParseError::DuplicateEntry { .. })),
        "{err:?}"
    );
}

#[test]
fn test_repeated_node_in_one_file_is_merged() {
    let xml = r#"<interface version="1">
  <node name="n"><parameter name="p" type="int"/></node>
  <node name="n"><parameter name="q" type="int"/></node>
</interface>"#;
    let path = PathBuf::from("repeat.nodl.xml");
    let document = parse_str(xml, &path, ParseOptions::default()).unwrap();
    assert_eq!(document.nodes.len(), 2);

    let merged = merge_documents(&[document]).unwrap();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged.get("n").unwrap().interface_count(), 2);
    assert_eq!(merged.origins("n"), &[path]);
}

#[test]
fn test_node_executable_is_accepted_and_merged() {
    let first = r#"<interface version="1">
  <node name="talker" executable="talker_exe"><parameter name="rate" type="double"/></node>
</interface>"#;
    let second = r#"<interface version="1">
  <node name="talker" executable="other_exe"/>
</interface>"#;

    let a = parse_str(first, &PathBuf::from("a.nodl.xml"), ParseOptions::default()).unwrap();
    assert_eq!(a.nodes[0].executable.as_deref(), Some("talker_exe"));
    let b = parse_str(second, &PathBuf::from("b.nodl.xml"), ParseOptions::default()).unwrap();

    let err = merge_documents(&[a, b]).unwrap_err();
    let MergeError::Executable(conflict) = &err else {
        panic!("expected an executable conflict, got {err:?}");
    };
    assert_eq!(conflict.node, "talker");
    assert_eq!(conflict.incoming_origin, PathBuf::from("b.nodl.xml"));
    let message = err.to_string();
    assert!(message.contains("talker_exe") && message.contains("other_exe"), "{message}");
}

#[test]
fn test_empty_executable_is_invalid() {
    let xml = r#"<interface version="1"><node name="talker" executable=""/></interface>"#;
    let err = parse_str(xml, &PathBuf::from("e.nodl.xml"), ParseOptions::default()).unwrap_err();
    assert!(matches!(err, NodlError::Schema(_)), "{err:?}");
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}
