//! Scenario 3: table allowlisting.
//!
//! The allowlist admits only `public.users`. A well-formed SELECT against
//! `public.secrets` passes the dialect validator but dies at the allowlist
//! with `UNAUTHORIZED_TABLE`, before any backend contact.

use serde_json::json;

use palisade_contracts::error::GatewayResult;

use super::{
    build_stack, expect_code, invoke_grant, open_session, print_outcome, tool_request,
    StackOptions,
};

pub fn run_scenario() -> GatewayResult<()> {
    println!("-- Scenario: unauthorized table --");

    let stack = build_stack(StackOptions {
        allowed_tables: vec!["public.users".to_string()],
        ..StackOptions::default()
    })?;
    let session = open_session(&stack, "caps-tables", vec![invoke_grant("query_read")])?;

    let allowed = stack.gateway.dispatch(
        &tool_request(
            "query_read",
            json!({ "query": "SELECT id FROM public.users" }),
            true,
        ),
        &session,
    );
    print_outcome("query allowlisted table", &allowed);

    let denied = stack.gateway.dispatch(
        &tool_request(
            "query_read",
            json!({ "query": "SELECT * FROM public.secrets" }),
            true,
        ),
        &session,
    );
    print_outcome("query fenced-off table", &denied);
    expect_code(&denied, "UNAUTHORIZED_TABLE")?;

    // A join that smuggles the fenced table in alongside an allowed one is
    // caught the same way.
    let joined = stack.gateway.dispatch(
        &tool_request(
            "query_read",
            json!({
                "query": "SELECT u.id FROM public.users u JOIN public.secrets s ON u.id = s.id"
            }),
            true,
        ),
        &session,
    );
    print_outcome("join smuggling fenced table", &joined);
    expect_code(&joined, "UNAUTHORIZED_TABLE")?;

    Ok(())
}
