#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;

use domain::common::entity::TenantId;
use domain::expression::matcher::{CompiledExpression, matches, validate};
use domain::fact::entity::Event;

// Fuzz the event expression parser and matcher.
//
// Layout:
//   [0]    = selector (even = parse+match, odd = validate consistency)
//   rest   = UTF-8 expression (lossy)
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let selector = data[0] % 2;
    let expr = String::from_utf8_lossy(&data[1..]);

    let event = Event {
        tenant_id: TenantId("my-organization".to_string()),
        id: "IDXYZ-001".to_string(),
        ctime: 1_500,
        text: Some("fuzz".to_string()),
        context: BTreeMap::from([("category".to_string(), "Server".to_string())]),
        tags: BTreeMap::from([("port".to_string(), "80".to_string())]),
        ..Event::default()
    };

    let compiled = CompiledExpression::compile(&expr);
    let matched = compiled.matches(&event);
    assert_eq!(matched, matches(&expr, &event));

    if selector == 1 {
        // an expression rejected by validation never matches
        if validate(&expr).is_err() {
            assert!(!matched);
        }
    }
});
