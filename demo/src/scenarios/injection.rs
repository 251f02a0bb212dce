//! Scenario 2: stacked-statement injection.
//!
//! A classic `; DROP TABLE` rider is rejected by the dialect validator on
//! the semicolon alone; no connection is ever checked out and the audit
//! trail records a single `rejected` event.

use serde_json::json;

use palisade_contracts::error::GatewayResult;

use super::{
    build_stack, expect_code, invoke_grant, open_session, print_outcome, tool_request,
    StackOptions,
};

pub fn run_scenario() -> GatewayResult<()> {
    println!("-- Scenario: injection attempt --");

    let stack = build_stack(StackOptions::default())?;
    let session = open_session(&stack, "caps-injection", vec![invoke_grant("query_read")])?;

    for (label, query) in [
        (
            "stacked statement",
            "SELECT 1; DROP TABLE public.users",
        ),
        (
            "comment smuggling",
            "SELECT id FROM public.users -- WHERE id = 1",
        ),
        (
            "union exfiltration",
            "SELECT id FROM public.users UNION SELECT value FROM public.secrets",
        ),
        (
            "offset scan",
            "SELECT * FROM public.users LIMIT 10 OFFSET 1000000",
        ),
    ] {
        let envelope = stack.gateway.dispatch(
            &tool_request("query_read", json!({ "query": query }), true),
            &session,
        );
        print_outcome(label, &envelope);
        expect_code(&envelope, "QUERY_REJECTED")?;
    }

    Ok(())
}
