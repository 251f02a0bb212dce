//! Scenario 4: quota scope invariance.
//!
//! One tenant-wide policy caps the rate at three per minute. Five calls
//! arrive through three sessions, each carrying a different capability-set
//! id. Because the quota scope key derives from the policy (tenant-wide),
//! the rotation buys nothing: three pass, two are rate limited.

use std::collections::BTreeMap;

use serde_json::json;

use palisade_contracts::error::GatewayResult;
use palisade_contracts::quota::{QuotaDimension, QuotaPolicy};

use super::{
    build_stack, expect_code, invoke_grant, open_session, print_outcome, tool_request,
    StackOptions, DEMO_TENANT,
};

pub fn run_scenario() -> GatewayResult<()> {
    println!("-- Scenario: quota burst with rotating capability sets --");

    let stack = build_stack(StackOptions {
        policies: vec![QuotaPolicy {
            tenant: DEMO_TENANT.to_string(),
            identity: None,
            cap_set_id: None,
            limits: BTreeMap::from([(QuotaDimension::RatePerMinute, 3)]),
        }],
        ..StackOptions::default()
    })?;

    let sessions = [
        open_session(&stack, "caps-rot-1", vec![invoke_grant("query_read")])?,
        open_session(&stack, "caps-rot-2", vec![invoke_grant("query_read")])?,
        open_session(&stack, "caps-rot-3", vec![invoke_grant("query_read")])?,
    ];

    let mut allowed = 0usize;
    let mut limited = 0usize;
    for attempt in 0..5 {
        let session = &sessions[attempt % sessions.len()];
        let envelope = stack.gateway.dispatch(
            &tool_request(
                "query_read",
                json!({ "query": "SELECT id FROM public.users" }),
                true,
            ),
            session,
        );
        print_outcome(&format!("attempt {}", attempt + 1), &envelope);
        if envelope["ok"] == json!(true) {
            allowed += 1;
        } else {
            expect_code(&envelope, "RATE_LIMITED")?;
            limited += 1;
        }
    }

    println!("  tenant-wide budget held: {allowed} allowed, {limited} rate limited");
    if allowed != 3 || limited != 2 {
        return Err(palisade_contracts::error::GatewayError::Internal {
            reason: format!("expected 3 allowed / 2 limited, got {allowed}/{limited}"),
        });
    }

    Ok(())
}
