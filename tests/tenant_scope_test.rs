//! Tenant role enforcement across all tools, against a recording mock backend.

mod common;

use common::{Behaviour, MockConnector, context, single_value_result};
use mcp_clickhouse::error::DbError;
use mcp_clickhouse::tools::{
    ListTablesInput, QueryToolHandler, RunSelectQueryInput, SchemaToolHandler,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const TIMEOUT: Duration = Duration::from_secs(30);

fn query_handler(connector: &MockConnector) -> QueryToolHandler<MockConnector> {
    QueryToolHandler::new(Arc::new(connector.clone()), TIMEOUT)
}

fn schema_handler(connector: &MockConnector) -> SchemaToolHandler<MockConnector> {
    SchemaToolHandler::new(Arc::new(connector.clone()))
}

fn select(sql: &str) -> RunSelectQueryInput {
    RunSelectQueryInput {
        query: sql.to_string(),
    }
}

fn list_tables_input(database: &str, page_size: u32, page_token: Option<String>) -> ListTablesInput {
    ListTablesInput {
        database: database.to_string(),
        like: None,
        not_like: None,
        page_token,
        page_size,
        include_detailed_columns: false,
    }
}

fn three_tables() -> Behaviour {
    Behaviour {
        tables: vec![
            ("clicks".into(), "MergeTree".into(), 10, 2048),
            ("events".into(), "MergeTree".into(), 1200, 1048576),
            ("users".into(), "ReplacingMergeTree".into(), 3, 512),
        ],
        ..Behaviour::default()
    }
}

// =========================================================================
// run_select_query
// =========================================================================

#[tokio::test]
async fn test_select_sets_role_then_queries() {
    let connector = MockConnector::new(Behaviour {
        result: single_value_result("col1", json!(1)),
        ..Behaviour::default()
    });
    let ctx = context(Some("john_doe"), Some("acme_corp"));

    let output = assert_ok!(
        query_handler(&connector)
            .run_select_query(Some(&ctx), select("SELECT 1"))
            .await
    );

    assert_eq!(
        serde_json::to_value(&output).unwrap(),
        json!({"columns": ["col1"], "rows": [[1]]})
    );
    assert_eq!(
        connector.ops(),
        vec![
            "connect".to_string(),
            "command SET role=acme_corp".to_string(),
            "query SELECT 1 [readonly]".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_select_without_company_id_never_touches_backend() {
    let connector = MockConnector::default();
    let ctx = context(Some("john_doe"), None);

    let err = query_handler(&connector)
        .run_select_query(Some(&ctx), select("SELECT 1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingTenantContext));
    assert!(err.to_string().contains("company_id is required"));
    assert_eq!(connector.connects(), 0);
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn test_select_without_metadata_never_touches_backend() {
    let connector = MockConnector::default();

    let err = query_handler(&connector)
        .run_select_query(None, select("SELECT 1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingTenantContext));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_select_with_empty_company_id_is_rejected() {
    let connector = MockConnector::default();
    let ctx = context(Some("john_doe"), Some(""));

    let err = query_handler(&connector)
        .run_select_query(Some(&ctx), select("SELECT 1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingTenantContext));
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn test_role_failure_stops_before_query() {
    let connector = MockConnector::new(Behaviour {
        role_error: Some("Role invalid_role not found".to_string()),
        ..Behaviour::default()
    });
    let ctx = context(Some("john_doe"), Some("invalid_role"));

    let err = query_handler(&connector)
        .run_select_query(Some(&ctx), select("SELECT 1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::TenantScope { .. }));
    let msg = err.to_string();
    assert!(msg.contains("Failed to set role"));
    assert!(msg.contains("Role invalid_role not found"));
    assert_eq!(
        connector.ops(),
        vec![
            "connect".to_string(),
            "command SET role=invalid_role".to_string()
        ]
    );
}

#[tokio::test]
async fn test_role_is_set_exactly_once() {
    let connector = MockConnector::new(Behaviour {
        result: single_value_result("col1", json!(1)),
        ..Behaviour::default()
    });
    let ctx = context(None, Some("acme_corp"));

    query_handler(&connector)
        .run_select_query(Some(&ctx), select("SELECT 1"))
        .await
        .unwrap();

    let role_commands = connector
        .ops()
        .into_iter()
        .filter(|op| op.starts_with("command SET role"))
        .count();
    assert_eq!(role_commands, 1);
}

#[tokio::test]
async fn test_write_statement_rejected_before_backend() {
    let connector = MockConnector::default();
    let ctx = context(Some("john_doe"), Some("acme_corp"));

    let err = query_handler(&connector)
        .run_select_query(Some(&ctx), select("DROP TABLE events"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Permission { .. }));
    assert!(connector.calls().is_empty());
}

#[tokio::test]
async fn test_missing_company_id_wins_over_write_rejection() {
    let connector = MockConnector::default();
    let ctx = context(Some("john_doe"), None);

    let err = query_handler(&connector)
        .run_select_query(Some(&ctx), select("DROP TABLE events"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingTenantContext));
    assert_eq!(connector.connects(), 0);

    let err = query_handler(&connector)
        .run_select_query(None, select(""))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingTenantContext));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_backend_query_failure_is_wrapped() {
    let connector = MockConnector::new(Behaviour {
        query_error: Some("Table analytics.nope does not exist".to_string()),
        ..Behaviour::default()
    });
    let ctx = context(Some("john_doe"), Some("acme_corp"));

    let err = query_handler(&connector)
        .run_select_query(Some(&ctx), select("SELECT * FROM analytics.nope"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::QueryExecution { .. }));
    let msg = err.to_string();
    assert!(msg.starts_with("Query execution failed"));
    assert!(msg.contains("does not exist"));
}

#[tokio::test]
async fn test_query_timeout() {
    let connector = MockConnector::new(Behaviour {
        query_delay: Some(Duration::from_secs(5)),
        ..Behaviour::default()
    });
    let ctx = context(None, Some("acme_corp"));
    let handler = QueryToolHandler::new(Arc::new(connector.clone()), Duration::from_millis(50));

    let err = handler
        .run_select_query(Some(&ctx), select("SELECT sleep(3)"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Timeout { .. }));
}

#[tokio::test]
async fn test_slow_role_failure_is_not_a_query_timeout() {
    let connector = MockConnector::new(Behaviour {
        role_error: Some("Connection refused".to_string()),
        role_delay: Some(Duration::from_millis(200)),
        ..Behaviour::default()
    });
    let ctx = context(None, Some("acme_corp"));
    let handler = QueryToolHandler::new(Arc::new(connector.clone()), Duration::from_millis(50));

    let err = handler
        .run_select_query(Some(&ctx), select("SELECT 1"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::TenantScope { .. }), "got: {:?}", err);
    assert!(err.to_string().contains("Failed to set role"));
    assert!(connector.ops().iter().all(|op| !op.starts_with("query")));
}

#[tokio::test]
async fn test_concurrent_calls_use_separate_sessions() {
    let connector = MockConnector::new(Behaviour {
        result: single_value_result("col1", json!(1)),
        ..Behaviour::default()
    });
    let handler = Arc::new(query_handler(&connector));

    let mut tasks = Vec::new();
    for tenant in ["tenant_a", "tenant_b", "tenant_c"] {
        let handler = handler.clone();
        tasks.push(tokio::spawn(async move {
            let ctx = context(None, Some(tenant));
            handler
                .run_select_query(Some(&ctx), select("SELECT 1"))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(connector.connects(), 3);
    let calls = connector.calls();
    for session in 1..=3 {
        let ops: Vec<&str> = calls
            .iter()
            .filter(|c| c.session == session)
            .map(|c| c.op.as_str())
            .collect();
        assert_eq!(ops.len(), 2);
        assert!(ops[0].starts_with("command SET role=tenant_"));
        assert_eq!(ops[1], "query SELECT 1 [readonly]");
    }
}

// =========================================================================
// list_databases
// =========================================================================

#[tokio::test]
async fn test_list_databases_sets_role() {
    let connector = MockConnector::new(Behaviour {
        databases: vec!["analytics".into(), "default".into()],
        ..Behaviour::default()
    });
    let ctx = context(Some("john_doe"), Some("acme_corp"));

    let output = assert_ok!(schema_handler(&connector).list_databases(Some(&ctx)).await);

    assert_eq!(output.databases, vec!["analytics", "default"]);
    assert_eq!(
        connector.ops(),
        vec![
            "connect".to_string(),
            "command SET role=acme_corp".to_string(),
            "command SHOW DATABASES".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_list_databases_without_company_id() {
    let connector = MockConnector::default();
    let ctx = context(Some("john_doe"), None);

    let err = assert_err!(schema_handler(&connector).list_databases(Some(&ctx)).await);

    assert!(err.to_string().contains("company_id is required"));
    assert_eq!(connector.connects(), 0);
}

// =========================================================================
// list_tables
// =========================================================================

#[tokio::test]
async fn test_list_tables_sets_role_and_pages() {
    let connector = MockConnector::new(three_tables());
    let ctx = context(Some("john_doe"), Some("acme_corp"));
    let handler = schema_handler(&connector);

    let first = handler
        .list_tables(Some(&ctx), list_tables_input("analytics", 2, None))
        .await
        .unwrap();

    assert_eq!(first.total_tables, 3);
    let names: Vec<&str> = first.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["clicks", "events"]);
    assert_eq!(first.tables[1].total_rows, Some(1200));
    assert_eq!(first.tables[1].total_size.as_deref(), Some("1 MB"));
    assert!(first.tables[0].columns.is_none());

    let ops = connector.ops();
    assert_eq!(ops[0], "connect");
    assert_eq!(ops[1], "command SET role=acme_corp");
    assert!(ops[2..].iter().all(|op| op.starts_with("query ")));

    let token = first.next_page_token.expect("more tables remain");
    let second = handler
        .list_tables(Some(&ctx), list_tables_input("analytics", 2, Some(token)))
        .await
        .unwrap();

    let names: Vec<&str> = second.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["users"]);
    assert!(second.next_page_token.is_none());
    assert!(connector.ops().iter().any(|op| op.contains("OFFSET 2")));
}

#[tokio::test]
async fn test_list_tables_with_columns() {
    let connector = MockConnector::new(three_tables());
    let ctx = context(None, Some("acme_corp"));
    let input = ListTablesInput {
        include_detailed_columns: true,
        ..list_tables_input("analytics", 50, None)
    };

    let output = schema_handler(&connector)
        .list_tables(Some(&ctx), input)
        .await
        .unwrap();

    assert_eq!(output.tables.len(), 3);
    let columns = output.tables[0].columns.as_ref().unwrap();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[0].name, "id");
    assert_eq!(columns[0].comment.as_deref(), Some("primary id"));
    assert_eq!(columns[1].default_expression.as_deref(), Some("now()"));
    assert!(connector.ops().iter().any(|op| op.contains("system.columns")));
}

#[tokio::test]
async fn test_list_tables_without_company_id() {
    let connector = MockConnector::new(three_tables());

    let err = schema_handler(&connector)
        .list_tables(None, list_tables_input("analytics", 50, None))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MissingTenantContext));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_list_tables_missing_company_id_wins_over_bad_arguments() {
    let connector = MockConnector::new(three_tables());

    for input in [
        list_tables_input("", 0, None),
        list_tables_input("analytics", 0, None),
        list_tables_input("analytics", 50, Some("garbage!".to_string())),
    ] {
        let err = schema_handler(&connector)
            .list_tables(None, input)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::MissingTenantContext), "got: {:?}", err);
    }
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_list_tables_role_failure() {
    let connector = MockConnector::new(Behaviour {
        role_error: Some("Role ghost not found".to_string()),
        ..three_tables()
    });
    let ctx = context(None, Some("ghost"));

    let err = schema_handler(&connector)
        .list_tables(Some(&ctx), list_tables_input("analytics", 50, None))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Failed to set role"));
    assert!(connector.ops().iter().all(|op| !op.starts_with("query")));
}

#[tokio::test]
async fn test_list_tables_bad_page_token() {
    let connector = MockConnector::new(three_tables());
    let ctx = context(None, Some("acme_corp"));

    let err = schema_handler(&connector)
        .list_tables(
            Some(&ctx),
            list_tables_input("analytics", 2, Some("garbage!".to_string())),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::InvalidInput { .. }));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_list_tables_escapes_database_name() {
    let connector = MockConnector::new(three_tables());
    let ctx = context(None, Some("acme_corp"));

    schema_handler(&connector)
        .list_tables(Some(&ctx), list_tables_input("it's", 50, None))
        .await
        .unwrap();

    assert!(
        connector
            .ops()
            .iter()
            .any(|op| op.contains("database = 'it\\'s'"))
    );
}

// =========================================================================
// MCP error mapping
// =========================================================================

#[tokio::test]
async fn test_errors_reach_client_as_invalid_params() {
    let connector = MockConnector::default();
    let err = query_handler(&connector)
        .run_select_query(None, select("SELECT 1"))
        .await
        .unwrap_err();

    let mcp_err: rmcp::ErrorData = err.into();
    assert_eq!(mcp_err.code.0, -32602);
    assert!(mcp_err.message.contains("company_id is required"));
}
