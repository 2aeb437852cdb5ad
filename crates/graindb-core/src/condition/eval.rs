use crate::{
    condition::{CompareCondition, CompareOp, Condition},
    error::{ErrorOrigin, InternalError},
    record::Record,
    value::{Value, canonical_cmp},
};
use std::cmp::Ordering;

impl Condition {
    /// Evaluate this tree against an in-memory record.
    ///
    /// This is the non-SQL operator semantics used by cached/filtered
    /// evaluation. NULL follows SQL comparison behavior: any ordering or
    /// LIKE comparison involving NULL is not satisfied.
    pub fn matches(&self, record: &Record) -> Result<bool, InternalError> {
        match self {
            Self::Compare(compare) => eval_compare(compare, record),
            Self::Combine(lhs, op, rhs) => {
                let left = lhs.matches(record)?;
                let right = rhs.matches(record)?;
                Ok(op.apply([left, right]))
            }
            Self::List(op, children) => {
                let mut results = Vec::with_capacity(children.len());
                for child in children {
                    results.push(child.matches(record)?);
                }
                Ok(op.apply(results))
            }
            Self::Raw(_) => Err(InternalError::unsupported(
                ErrorOrigin::Condition,
                "raw SQL fragments cannot be evaluated in memory",
            )),
        }
    }
}

fn eval_compare(compare: &CompareCondition, record: &Record) -> Result<bool, InternalError> {
    record.model().require_field(&compare.field)?;
    let lhs = record.get(&compare.field).cloned().unwrap_or(Value::Null);
    let (lhs, rhs) = if compare.ignore_case {
        (lhs.upper(), compare.value.upper())
    } else {
        (lhs, compare.value.clone())
    };

    // NULL special cases first: only equality operators see NULL.
    if rhs.is_null() {
        return match compare.op {
            CompareOp::Equals => Ok(lhs.is_null()),
            CompareOp::NotEquals => Ok(!lhs.is_null()),
            op => Err(InternalError::unsupported(
                ErrorOrigin::Condition,
                format!("operator {op} cannot compare against NULL (field '{}')", compare.field),
            )),
        };
    }
    if lhs.is_null() {
        return Ok(false);
    }

    let result = match compare.op {
        CompareOp::Equals => ordering(&lhs, &rhs) == Ordering::Equal,
        CompareOp::NotEquals => ordering(&lhs, &rhs) != Ordering::Equal,
        CompareOp::Less => ordering(&lhs, &rhs) == Ordering::Less,
        CompareOp::LessEq => ordering(&lhs, &rhs) != Ordering::Greater,
        CompareOp::Greater => ordering(&lhs, &rhs) == Ordering::Greater,
        CompareOp::GreaterEq => ordering(&lhs, &rhs) != Ordering::Less,
        CompareOp::In => contains(&rhs, &lhs),
        CompareOp::NotIn => !contains(&rhs, &lhs),
        CompareOp::Like => like_match(&lhs, &rhs)?,
        CompareOp::NotLike => !like_match(&lhs, &rhs)?,
    };

    Ok(result)
}

fn ordering(lhs: &Value, rhs: &Value) -> Ordering {
    canonical_cmp(lhs, rhs)
}

fn contains(collection: &Value, needle: &Value) -> bool {
    match collection {
        Value::List(items) => items
            .iter()
            .any(|item| canonical_cmp(item, needle) == Ordering::Equal),
        single => canonical_cmp(single, needle) == Ordering::Equal,
    }
}

fn like_match(lhs: &Value, pattern: &Value) -> Result<bool, InternalError> {
    let (Value::Text(text), Value::Text(pattern)) = (lhs, pattern) else {
        return Err(InternalError::unsupported(
            ErrorOrigin::Condition,
            "LIKE requires text on both sides",
        ));
    };

    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    Ok(wildcard_match(&text, &pattern))
}

/// SQL LIKE wildcard matching: `%` matches any sequence, `_` any one char.
pub(crate) fn wildcard_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => {
            // Greedy-or-empty: try consuming zero..all text chars.
            (0..=text.len()).any(|skip| wildcard_match(&text[skip..], &pattern[1..]))
        }
        Some('_') => !text.is_empty() && wildcard_match(&text[1..], &pattern[1..]),
        Some(ch) => text.first() == Some(ch) && wildcard_match(&text[1..], &pattern[1..]),
    }
}
