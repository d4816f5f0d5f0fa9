use regex::Regex;

use super::error::ExpressionError;
use super::parser::{Clause, Constant, Field, Operator, parse};
use crate::common::pattern::compile_full_match;
use crate::fact::entity::Event;

/// Resolved value of a field on one event.
#[derive(Debug, Clone, Copy)]
enum FieldValue<'a> {
    Text(&'a str),
    Number(i64),
}

#[derive(Debug)]
struct CompiledClause {
    clause: Clause,
    /// Present only for `matches` clauses.
    regex: Option<Regex>,
}

/// An event expression parsed once and evaluated many times.
///
/// A malformed expression still compiles: it keeps the first error and never
/// matches any event.
#[derive(Debug)]
pub struct CompiledExpression {
    source: String,
    clauses: Result<Vec<CompiledClause>, ExpressionError>,
}

impl CompiledExpression {
    pub fn compile(expression: &str) -> Self {
        let clauses = parse(expression).and_then(|clauses| {
            clauses
                .into_iter()
                .enumerate()
                .map(|(index, clause)| compile_clause(index, clause))
                .collect()
        });
        Self {
            source: expression.to_string(),
            clauses,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The reason this expression can never match, if any.
    pub fn error(&self) -> Option<&ExpressionError> {
        self.clauses.as_ref().err()
    }

    pub fn is_valid(&self) -> bool {
        self.clauses.is_ok()
    }

    /// All clauses must hold. Malformed expressions yield `false`.
    pub fn matches(&self, event: &Event) -> bool {
        match &self.clauses {
            Ok(clauses) => clauses.iter().all(|c| eval_clause(c, event)),
            Err(_) => false,
        }
    }
}

fn compile_clause(index: usize, clause: Clause) -> Result<CompiledClause, ExpressionError> {
    let regex = match (&clause.operator, &clause.constant) {
        (Operator::Matches, Constant::Text(pattern)) => Some(
            compile_full_match(pattern, false).map_err(|e| ExpressionError::InvalidRegex {
                index,
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?,
        ),
        _ => None,
    };
    Ok(CompiledClause { clause, regex })
}

fn resolve<'a>(field: &Field, event: &'a Event) -> Option<FieldValue<'a>> {
    match field {
        Field::TenantId => Some(FieldValue::Text(&event.tenant_id.0)),
        Field::Id => Some(FieldValue::Text(&event.id)),
        Field::Ctime => Some(FieldValue::Number(event.ctime)),
        Field::EventText => event.text.as_deref().map(FieldValue::Text),
        Field::Context(key) => event.context.get(key).map(|v| FieldValue::Text(v)),
        Field::Tags(key) => event.tags.get(key).map(|v| FieldValue::Text(v)),
    }
}

#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
fn eval_clause(compiled: &CompiledClause, event: &Event) -> bool {
    let clause = &compiled.clause;
    let Some(value) = resolve(&clause.field, event) else {
        return false;
    };

    match (clause.operator, value, &clause.constant) {
        (Operator::Eq, FieldValue::Text(s), Constant::Text(c)) => s == c.as_str(),
        (Operator::Eq, FieldValue::Number(n), Constant::Number(c)) => n as f64 == *c,
        (Operator::Ne, FieldValue::Text(s), Constant::Text(c)) => s != c.as_str(),
        (Operator::Ne, FieldValue::Number(n), Constant::Number(c)) => n as f64 != *c,
        (Operator::Starts, FieldValue::Text(s), Constant::Text(c)) => s.starts_with(c.as_str()),
        (Operator::Ends, FieldValue::Text(s), Constant::Text(c)) => s.ends_with(c.as_str()),
        (Operator::Contains, FieldValue::Text(s), Constant::Text(c)) => s.contains(c.as_str()),
        (Operator::Matches, FieldValue::Text(s), Constant::Text(_)) => {
            compiled.regex.as_ref().is_some_and(|re| re.is_match(s))
        }
        (op, value, Constant::Number(c)) if op.is_numeric_only() => {
            let number = match value {
                FieldValue::Number(n) => n as f64,
                FieldValue::Text(s) => match s.trim().parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => return false,
                },
            };
            match op {
                Operator::Lt => number < *c,
                Operator::Lte => number <= *c,
                Operator::Gt => number > *c,
                _ => number >= *c,
            }
        }
        _ => false,
    }
}

/// Evaluate `expression` against `event`. Never fails: malformed input is `false`.
pub fn matches(expression: &str, event: &Event) -> bool {
    CompiledExpression::compile(expression).matches(event)
}

/// Definition-time check reporting the first reason `expression` can never match.
pub fn validate(expression: &str) -> Result<(), ExpressionError> {
    CompiledExpression::compile(expression)
        .clauses
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::entity::TenantId;
    use std::collections::BTreeMap;

    fn make_event(tenant: &str) -> Event {
        Event {
            tenant_id: TenantId(tenant.to_string()),
            id: "IDXYZ-001".to_string(),
            ctime: 1_500,
            text: Some("disk almost full".to_string()),
            context: BTreeMap::from([
                ("category".to_string(), "Server".to_string()),
                ("load".to_string(), "12.5".to_string()),
            ]),
            tags: BTreeMap::from([("from".to_string(), "ops@example.com".to_string())]),
            ..Event::default()
        }
    }

    // ── String operators ──────────────────────────────────────────

    #[test]
    fn equality_on_tenant() {
        let expr = "tenantId == 'my-organization'";
        assert!(matches(expr, &make_event("my-organization")));
        assert!(!matches(expr, &make_event("my-organization2")));
    }

    #[test]
    fn equality_is_case_sensitive() {
        assert!(!matches(
            "tenantId == 'My-Organization'",
            &make_event("my-organization")
        ));
    }

    #[test]
    fn starts_matches_both() {
        let expr = "tenantId starts 'my-organiz'";
        assert!(matches(expr, &make_event("my-organization")));
        assert!(matches(expr, &make_event("my-organization2")));
    }

    #[test]
    fn ends_matches_suffix_only() {
        let expr = "tenantId ends '2'";
        assert!(!matches(expr, &make_event("my-organization")));
        assert!(matches(expr, &make_event("my-organization2")));
    }

    #[test]
    fn contains_matches_both() {
        let expr = "tenantId contains 'organization'";
        assert!(matches(expr, &make_event("my-organization")));
        assert!(matches(expr, &make_event("my-organization2")));
    }

    #[test]
    fn regex_matches_both() {
        let expr = "tenantId matches 'my-organization.*'";
        assert!(matches(expr, &make_event("my-organization")));
        assert!(matches(expr, &make_event("my-organization2")));
    }

    #[test]
    fn regex_must_match_whole_value() {
        assert!(!matches("tenantId matches 'organization'", &make_event("my-organization")));
    }

    #[test]
    fn not_equal() {
        assert!(matches("id != 'other'", &make_event("t")));
        assert!(!matches("id != 'IDXYZ-001'", &make_event("t")));
    }

    // ── Map fields ────────────────────────────────────────────────

    #[test]
    fn context_and_tags_lookup() {
        let event = make_event("t");
        assert!(matches(
            "id starts 'IDXYZ',context.category == 'Server',tags.from ends '.com'",
            &event
        ));
        assert!(!matches("context.category == 'Database'", &event));
    }

    #[test]
    fn missing_key_is_false() {
        let event = make_event("t");
        assert!(!matches("tags.missing == 'x'", &event));
        assert!(!matches("tags.missing != 'x'", &event));
    }

    #[test]
    fn event_text_missing_is_false() {
        let mut event = make_event("t");
        assert!(matches("eventText contains 'full'", &event));
        event.text = None;
        assert!(!matches("eventText contains 'full'", &event));
    }

    // ── Numeric operators ─────────────────────────────────────────

    #[test]
    fn ctime_comparisons() {
        let event = make_event("t");
        assert!(matches("ctime == 1500", &event));
        assert!(matches("ctime != 1501", &event));
        assert!(matches("ctime > 1000", &event));
        assert!(matches("ctime >= 1500", &event));
        assert!(matches("ctime < 2000", &event));
        assert!(matches("ctime <= 1500", &event));
        assert!(!matches("ctime < 1500", &event));
    }

    #[test]
    fn string_fields_coerced_for_numeric_operators() {
        let event = make_event("t");
        assert!(matches("context.load > 10", &event));
        assert!(!matches("context.load > 20", &event));
    }

    #[test]
    fn failed_coercion_is_false() {
        let event = make_event("t");
        assert!(!matches("context.category > 1", &event));
        assert!(!matches("context.category <= 1", &event));
    }

    #[test]
    fn conjunction_requires_all() {
        let event = make_event("t");
        assert!(matches("ctime > 1000,tenantId == 't'", &event));
        assert!(!matches("ctime > 1000,tenantId == 'u'", &event));
    }

    // ── Malformed input ───────────────────────────────────────────

    #[test]
    fn malformed_expressions_never_match() {
        let event = make_event("my-organization");
        for expr in [
            "",
            "tenantId",
            "tenantId ==",
            "tenantId == 'my-organization",
            "tenantId == my-organization'",
            "tenantId == my-organization",
            "tenantId ~= 'my-organization'",
            "unknown == 'x'",
            "tenantId matches '('",
            "tenantId == 'my-organization',,ctime > 0",
        ] {
            assert!(!matches(expr, &event), "{expr:?} should not match");
        }
    }

    #[test]
    fn type_mismatch_never_matches() {
        let event = make_event("t");
        assert!(!matches("ctime == '1500'", &event));
        assert!(!matches("id starts 1", &event));
    }

    // ── Compiled form / validation ────────────────────────────────

    #[test]
    fn compiled_expression_reusable() {
        let compiled = CompiledExpression::compile("tenantId starts 'my-'");
        assert!(compiled.is_valid());
        assert_eq!(compiled.source(), "tenantId starts 'my-'");
        assert!(compiled.matches(&make_event("my-a")));
        assert!(!compiled.matches(&make_event("your-a")));
    }

    #[test]
    fn compiled_invalid_keeps_error() {
        let compiled = CompiledExpression::compile("tenantId matches '['");
        assert!(!compiled.is_valid());
        assert!(matches!(
            compiled.error(),
            Some(ExpressionError::InvalidRegex { index: 0, .. })
        ));
    }

    #[test]
    fn validate_reports_problems() {
        assert!(validate("tenantId == 'a',ctime > 5").is_ok());
        assert_eq!(validate(""), Err(ExpressionError::Empty));
        assert!(matches!(
            validate("tenantId == 'a"),
            Err(ExpressionError::UnmatchedQuote { .. })
        ));
    }
}
