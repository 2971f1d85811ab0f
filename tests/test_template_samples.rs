mod fixtures;
use fixtures::*;

use std::sync::Arc;

use erspec::{SpecError, SpecResolver};
use pretty_assertions::assert_eq;

const TEMPLATE_D55TEST: &str = r#"
    <Spec description="Work order header">
      <Template>
        <Item id="1" seq="10" copy="IN" alias="DOCO" field="mnOrderNumber"/>
        <Item id="2" seq="20" copy="OUT" alias="DCTO" field="szOrderType"/>
        <Item id="3" seq="30" copy="INOUT" alias="EV01" field="cErrorCode"/>
      </Template>
    </Spec>"#;

#[test]
fn resolver_shares_one_parse_across_consumers() {
    ensure_env_logger_initialized();

    let source = InMemoryMetadata::default().with_template_xml("D55TEST", TEMPLATE_D55TEST);
    let resolver = SpecResolver::new(source);

    let first = resolver.data_structure_template("D55TEST").unwrap();
    let second = resolver.data_structure_template("D55TEST").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let item = first.try_get_item("2").unwrap();
    assert_eq!(item.display_name(), "szOrderType [DCTO]");
}

#[test]
fn formatted_template_lists_slots_in_sequence_order() {
    ensure_env_logger_initialized();

    let source = InMemoryMetadata::default().with_template_xml("D55TEST", TEMPLATE_D55TEST);
    let resolver = SpecResolver::new(source);

    let formatted = resolver.formatted_template("D55TEST").unwrap();
    assert_eq!(formatted.status_message, "Data structure loaded.");

    let lines: Vec<&str> = formatted.text.lines().collect();
    assert_eq!(lines[0], "Work order header");
    assert!(lines[1].contains("mnOrderNumber [DOCO]"));
    assert!(lines[2].contains("szOrderType [DCTO]"));
    assert!(lines[3].contains("cErrorCode [EV01]"));
}

#[test]
fn unknown_template_name_is_not_found() {
    ensure_env_logger_initialized();

    let resolver = SpecResolver::new(InMemoryMetadata::default());
    assert!(matches!(
        resolver.formatted_template("D404"),
        Err(SpecError::SpecNotFound { key }) if key == "D404"
    ));
}

#[test]
fn concurrent_requests_share_a_single_parse() {
    ensure_env_logger_initialized();

    let source = InMemoryMetadata::default().with_template_xml("D55TEST", TEMPLATE_D55TEST);
    let resolver = Arc::new(SpecResolver::new(source));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || resolver.data_structure_template("D55TEST").unwrap())
        })
        .collect();

    let templates: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for template in &templates[1..] {
        assert!(Arc::ptr_eq(&templates[0], template));
    }
}
