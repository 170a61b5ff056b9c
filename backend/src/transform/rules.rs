//! Value substitution rules
//!
//! A rule is a list of `FIND=REPLACE` clauses separated by `|`, for example
//! `PO=Purchase Order|SO=Sales Order`. The first clause whose FIND equals the
//! trimmed cell text (ignoring case) replaces the value. Substitution runs
//! before type conversion, so the replacement text is still converted.

use crate::models::Scalar;

/// One `FIND=REPLACE` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleClause {
    pub find: String,
    pub replace: String,
}

/// A parsed substitution rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformRule {
    clauses: Vec<RuleClause>,
}

impl TransformRule {
    /// Parse a rule string. Clauses that do not have exactly one `=` are
    /// dropped; the others are kept in order.
    pub fn parse(rule: &str) -> Self {
        let clauses = rule
            .split('|')
            .filter_map(|clause| {
                let parts: Vec<&str> = clause.trim().split('=').collect();
                match parts.as_slice() {
                    [find, replace] => Some(RuleClause {
                        find: find.trim().to_string(),
                        replace: replace.trim().to_string(),
                    }),
                    _ => None,
                }
            })
            .collect();

        Self { clauses }
    }

    pub fn clauses(&self) -> &[RuleClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Apply the first matching clause. `Null` and unmatched values pass
    /// through unchanged.
    pub fn apply(&self, value: &Scalar) -> Scalar {
        if value.is_null() {
            return Scalar::Null;
        }

        let needle = value.to_text().trim().to_uppercase();
        self.clauses
            .iter()
            .find(|clause| clause.find.to_uppercase() == needle)
            .map(|clause| Scalar::Str(clause.replace.clone()))
            .unwrap_or_else(|| value.clone())
    }
}

/// Parse `rule` and apply it to `value` in one step.
pub fn apply_rule(value: &Scalar, rule: &str) -> Scalar {
    TransformRule::parse(rule).apply(value)
}
