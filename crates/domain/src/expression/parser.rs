//! Parser for the event expression grammar.
//!
//! ```text
//! expression = clause ( "," clause )*
//! clause     = field SP operator SP constant
//! constant   = "'" text "'" | number
//! ```

use super::error::ExpressionError;

/// Event attribute addressed by a clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    TenantId,
    Id,
    Ctime,
    EventText,
    Context(String),
    Tags(String),
}

impl Field {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "tenantId" => Some(Self::TenantId),
            "id" => Some(Self::Id),
            "ctime" => Some(Self::Ctime),
            "eventText" => Some(Self::EventText),
            _ => {
                if let Some(key) = token.strip_prefix("context.") {
                    Some(Self::Context(key.to_string()))
                } else {
                    token
                        .strip_prefix("tags.")
                        .map(|key| Self::Tags(key.to_string()))
                }
            }
        }
    }

    /// `ctime` is the only natively numeric field.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Ctime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Starts,
    Ends,
    Contains,
    Matches,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Operator {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "starts" => Some(Self::Starts),
            "ends" => Some(Self::Ends),
            "contains" => Some(Self::Contains),
            "matches" => Some(Self::Matches),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Starts => "starts",
            Self::Ends => "ends",
            Self::Contains => "contains",
            Self::Matches => "matches",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    pub fn is_string_only(self) -> bool {
        matches!(
            self,
            Self::Starts | Self::Ends | Self::Contains | Self::Matches
        )
    }

    pub fn is_numeric_only(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: Field,
    pub operator: Operator,
    pub constant: Constant,
}

/// Parse a full expression into its clauses.
///
/// Trailing empty segments (`"a == 'x',"`) are ignored; any other empty
/// segment is a malformed clause.
pub fn parse(expression: &str) -> Result<Vec<Clause>, ExpressionError> {
    if expression.trim().is_empty() {
        return Err(ExpressionError::Empty);
    }

    let mut segments: Vec<&str> = expression.split(',').collect();
    while segments.len() > 1 && segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| parse_clause(index, segment))
        .collect()
}

fn parse_clause(index: usize, segment: &str) -> Result<Clause, ExpressionError> {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    let [field, operator, constant] = tokens[..] else {
        return Err(ExpressionError::TokenCount {
            index,
            clause: segment.trim().to_string(),
            found: tokens.len(),
        });
    };

    let field = Field::parse(field).ok_or_else(|| ExpressionError::UnknownField {
        index,
        field: field.to_string(),
    })?;
    let operator = Operator::parse(operator).ok_or_else(|| ExpressionError::UnknownOperator {
        index,
        operator: operator.to_string(),
    })?;
    let constant = parse_constant(index, constant)?;

    let clause = Clause {
        field,
        operator,
        constant,
    };
    check_types(index, &clause)?;
    Ok(clause)
}

fn parse_constant(index: usize, token: &str) -> Result<Constant, ExpressionError> {
    let opens = token.starts_with('\'');
    let closes = token.ends_with('\'');
    if opens && closes && token.len() >= 2 {
        return Ok(Constant::Text(token[1..token.len() - 1].to_string()));
    }
    if opens || closes {
        return Err(ExpressionError::UnmatchedQuote {
            index,
            constant: token.to_string(),
        });
    }
    token
        .parse::<f64>()
        .map(Constant::Number)
        .map_err(|_| ExpressionError::InvalidNumber {
            index,
            constant: token.to_string(),
        })
}

/// Reject clauses whose operand types make them unsatisfiable.
fn check_types(index: usize, clause: &Clause) -> Result<(), ExpressionError> {
    let mismatch = |reason: &str| {
        Err(ExpressionError::TypeMismatch {
            index,
            reason: reason.to_string(),
        })
    };
    let op = clause.operator.as_str();

    match (&clause.constant, clause.operator) {
        (Constant::Number(_), o) if o.is_string_only() => {
            mismatch(&format!("operator '{op}' requires a quoted string constant"))
        }
        (Constant::Text(_), o) if o.is_numeric_only() => {
            mismatch(&format!("operator '{op}' requires a numeric constant"))
        }
        (_, o) if o.is_string_only() && clause.field.is_numeric() => {
            mismatch(&format!("operator '{op}' cannot be applied to ctime"))
        }
        (Constant::Text(_), Operator::Eq | Operator::Ne) if clause.field.is_numeric() => {
            mismatch("ctime can only be compared with a numeric constant")
        }
        (Constant::Number(_), Operator::Eq | Operator::Ne) if !clause.field.is_numeric() => {
            mismatch("string fields can only be compared with a quoted constant")
        }
        _ => Ok(()),
    }
}
