use montage_tools::{
    EditingContext, Error, RiskLevel, ToolCatalog, ToolCategory, ToolDefinition, ToolExecutor,
    ToolRegistry, ToolRunner,
};
use serde_json::json;
use std::sync::Arc;

fn catalog_from_file() -> ToolRegistry {
    let definitions: Vec<ToolDefinition> = serde_json::from_value(json!([
        {
            "name": "add_marker",
            "description": "Add a timeline marker",
            "parameters": {
                "type": "object",
                "properties": {"atSec": {"type": "number", "minimum": 0}},
                "required": ["atSec"]
            },
            "riskLevel": "low",
            "category": "sequence"
        },
        {
            "name": "delete_sequence",
            "description": "Delete a sequence",
            "parameters": {"type": "object"},
            "riskLevel": "critical",
            "category": "sequence"
        }
    ]))
    .unwrap();
    ToolRegistry::from_definitions(definitions)
}

#[test]
fn test_catalog_loaded_from_declarations() {
    let registry = catalog_from_file();

    assert_eq!(registry.list_names(), vec!["add_marker", "delete_sequence"]);
    assert_eq!(registry.list_by_category(ToolCategory::Sequence).len(), 2);
    let definition = registry.get_definition("delete_sequence").unwrap();
    assert_eq!(definition.risk_level, RiskLevel::Critical);
    assert!(definition.enabled);
}

#[test]
fn test_catalog_schema_errors_are_reported() {
    let registry = catalog_from_file();

    assert!(registry.validate_args("add_marker", &json!({"atSec": 2.5})).valid);
    let bad = registry.validate_args("add_marker", &json!({"atSec": -1}));
    assert!(!bad.valid);
    assert_eq!(bad.errors.len(), 1);
    assert!(!registry.validate_args("add_marker", &json!({})).valid);
    assert!(!registry.validate_args("missing", &json!({})).valid);
}

#[test]
fn test_declared_tools_cannot_run() {
    let runner = ToolRunner::with_defaults(Arc::new(catalog_from_file()));

    let result = tokio_test::block_on(runner.execute(
        "add_marker",
        json!({"atSec": 1}),
        &EditingContext::new(),
    ));

    assert!(matches!(result, Err(Error::PermissionDenied(_))));
}

#[test]
fn test_runner_blocks_critical_and_disabled_tools() {
    let mut registry = catalog_from_file();
    assert!(registry.disable("add_marker"));
    let runner = ToolRunner::with_defaults(Arc::new(registry));

    assert!(!runner.can_execute("add_marker").unwrap());
    assert!(!runner.can_execute("delete_sequence").unwrap());
    assert!(matches!(runner.can_execute("nope"), Err(Error::NotFound(_))));

    let result = tokio_test::block_on(runner.execute(
        "delete_sequence",
        json!({}),
        &EditingContext::new(),
    ));
    match result {
        Err(Error::PermissionDenied(message)) => assert!(message.contains("delete_sequence")),
        other => panic!("expected permission denied, got {other:?}"),
    }
}
