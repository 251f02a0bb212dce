//! Scenario 1: the happy path.
//!
//! A session with the full read grant set lists tables, describes one, and
//! runs a parameterized query with a row cap. Everything passes; the audit
//! trail on stderr shows one `validated` + one `success` pair per query.

use serde_json::json;

use palisade_contracts::capability::{Action, Grant};
use palisade_contracts::error::GatewayResult;

use super::{
    build_stack, invoke_grant, open_session, print_outcome, tool_request, StackOptions,
};

pub fn run_scenario() -> GatewayResult<()> {
    println!("-- Scenario: happy path --");

    let stack = build_stack(StackOptions::default())?;
    let session = open_session(
        &stack,
        "caps-happy",
        vec![
            invoke_grant("list_tables"),
            invoke_grant("describe_table"),
            invoke_grant("query_read"),
            Grant {
                action: Action::ToolList,
                target: "tools".to_string(),
            },
        ],
    )?;

    let tools = stack.gateway.list_tools(&session)?;
    println!("  [ok]   tools/list -> {} tools", tools.len());

    let listing = stack.gateway.dispatch(
        &tool_request("list_tables", json!({ "schema": "public" }), true),
        &session,
    );
    print_outcome("list_tables(public)", &listing);

    let description = stack.gateway.dispatch(
        &tool_request(
            "describe_table",
            json!({ "schema": "public", "table": "users" }),
            true,
        ),
        &session,
    );
    print_outcome("describe_table(public.users)", &description);

    let query = stack.gateway.dispatch(
        &tool_request(
            "query_read",
            json!({
                "query": "SELECT id, name FROM public.users WHERE id = $1",
                "params": [1],
                "limit": 10
            }),
            true,
        ),
        &session,
    );
    print_outcome("query_read(users by id)", &query);

    if query["ok"] == json!(true) {
        println!(
            "         rows={} applied_limit={} truncated={}",
            query["value"]["row_count"],
            query["value"]["metadata"]["applied_limit"],
            query["value"]["metadata"]["truncated"],
        );
    }

    Ok(())
}
