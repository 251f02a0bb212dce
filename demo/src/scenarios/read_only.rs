//! Scenario 5: the read-only gate.
//!
//! A mutating `add_customer` extension tool is registered with the gateway.
//! The caller holds a perfectly valid grant for it, but the invocation
//! arrives in read-only mode — the gate rejects it before authorization or
//! quota ever run. Flipping the mode off lets the same call through.

use std::sync::Arc;

use serde_json::json;

use palisade_contracts::error::GatewayResult;
use palisade_core::registry::ToolDescriptor;

use super::{
    build_stack, expect_code, invoke_grant, open_session, print_outcome, tool_request,
    StackOptions,
};

/// The demo's mutation extension: flagged `mutating` so the read-only gate
/// can see it. The handler never touches the database in this demo.
fn add_customer_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "add_customer".to_string(),
        description: "Insert a customer record (demo extension tool)".to_string(),
        input_schema: json!({
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "email": { "type": "string" }
            },
            "additionalProperties": false
        }),
        mutating: true,
        handler: Arc::new(|input, _adapter, _ctx| {
            Ok(json!({ "inserted": true, "name": input["name"] }))
        }),
    }
}

pub fn run_scenario() -> GatewayResult<()> {
    println!("-- Scenario: read-only mode blocks mutation --");

    let mut stack = build_stack(StackOptions::default())?;
    stack.gateway.register_tool(add_customer_tool())?;

    let session = open_session(
        &stack,
        "caps-mutation",
        vec![invoke_grant("add_customer"), invoke_grant("query_read")],
    )?;

    let blocked = stack.gateway.dispatch(
        &tool_request("add_customer", json!({ "name": "Margaret" }), true),
        &session,
    );
    print_outcome("add_customer in read-only mode", &blocked);
    expect_code(&blocked, "READ_ONLY")?;

    let permitted = stack.gateway.dispatch(
        &tool_request("add_customer", json!({ "name": "Margaret" }), false),
        &session,
    );
    print_outcome("add_customer with read-only off", &permitted);

    // Read tools are untouched by the mode either way.
    let read = stack.gateway.dispatch(
        &tool_request(
            "query_read",
            json!({ "query": "SELECT id FROM public.users" }),
            true,
        ),
        &session,
    );
    print_outcome("query_read in read-only mode", &read);

    Ok(())
}
