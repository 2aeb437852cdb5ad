mod eval;
mod operator;
mod render;
mod rewrite;

#[cfg(test)]
mod tests;

pub use operator::{CompareOp, JoinOp};

pub(crate) use eval::wildcard_match;

use crate::{
    error::{ErrorOrigin, InternalError},
    model::EntityModel,
    value::Value,
};

///
/// CompareCondition
/// One atomic comparison: field, operator, right-hand value.
///
/// A `Value::List` RHS paired with In/NotIn expands to one placeholder per
/// element. `ignore_case` folds text to upper case on both sides.
///

#[derive(Clone, Debug, PartialEq)]
pub struct CompareCondition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
    pub ignore_case: bool,
}

impl CompareCondition {
    #[must_use]
    pub fn new(field: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.into(),
            ignore_case: false,
        }
    }
}

///
/// Condition
///
/// Composable predicate tree over one entity's fields. Immutable value
/// object: transformations produce new trees, construction is cheap, and
/// a tree is discarded after rendering.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// Atomic comparison.
    Compare(CompareCondition),
    /// Two nested conditions joined by AND/OR.
    Combine(Box<Condition>, JoinOp, Box<Condition>),
    /// A list of conditions joined by one operator.
    List(JoinOp, Vec<Condition>),
    /// Opaque pre-rendered SQL fragment (subquery escape hatch). Binds no
    /// parameters.
    Raw(String),
}

impl Condition {
    //
    // Atom constructors
    //

    #[must_use]
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::Equals, value))
    }

    #[must_use]
    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::NotEquals, value))
    }

    #[must_use]
    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::Less, value))
    }

    #[must_use]
    pub fn le(field: &str, value: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::LessEq, value))
    }

    #[must_use]
    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::Greater, value))
    }

    #[must_use]
    pub fn ge(field: &str, value: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::GreaterEq, value))
    }

    #[must_use]
    pub fn is_in(field: &str, values: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::In, values))
    }

    #[must_use]
    pub fn not_in(field: &str, values: impl Into<Value>) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::NotIn, values))
    }

    #[must_use]
    pub fn like(field: &str, pattern: &str) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::Like, pattern))
    }

    #[must_use]
    pub fn not_like(field: &str, pattern: &str) -> Self {
        Self::Compare(CompareCondition::new(field, CompareOp::NotLike, pattern))
    }

    /// Mark the outermost atom as case-insensitive.
    #[must_use]
    pub fn ignore_case(mut self) -> Self {
        if let Self::Compare(ref mut compare) = self {
            compare.ignore_case = true;
        }
        self
    }

    //
    // Combinators
    //

    #[must_use]
    pub fn and(conditions: Vec<Self>) -> Self {
        Self::List(JoinOp::And, conditions)
    }

    #[must_use]
    pub fn or(conditions: Vec<Self>) -> Self {
        Self::List(JoinOp::Or, conditions)
    }

    /// Join two nested conditions.
    #[must_use]
    pub fn combine(lhs: Self, op: JoinOp, rhs: Self) -> Self {
        Self::Combine(Box::new(lhs), op, Box::new(rhs))
    }

    /// Field-equality map convenience: AND of `field = value` atoms in the
    /// given order.
    #[must_use]
    pub fn field_map(pairs: Vec<(&str, Value)>) -> Self {
        Self::List(
            JoinOp::And,
            pairs
                .into_iter()
                .map(|(field, value)| Self::eq(field, value))
                .collect(),
        )
    }

    //
    // Inspection
    //

    /// Exact number of `?` placeholders rendering would produce, without
    /// rendering. Used to decide dialect rewrites cheaply.
    #[must_use]
    pub fn param_count(&self) -> usize {
        match self {
            Self::Compare(compare) => match (&compare.op, &compare.value) {
                (CompareOp::Equals | CompareOp::NotEquals, Value::Null) => 0,
                (_, value) => value.param_width(),
            },
            Self::Combine(lhs, _, rhs) => lhs.param_count() + rhs.param_count(),
            Self::List(_, children) => children.iter().map(Self::param_count).sum(),
            Self::Raw(_) => 0,
        }
    }

    /// Walk the tree verifying every referenced field resolves against the
    /// model. Must run before execution whenever a raw entity name (not an
    /// already-validated model) was supplied by the caller.
    pub fn validate(&self, model: &EntityModel) -> Result<(), InternalError> {
        match self {
            Self::Compare(compare) => {
                model.require_field(&compare.field)?;
                if compare.value.is_null()
                    && !matches!(compare.op, CompareOp::Equals | CompareOp::NotEquals)
                {
                    return Err(InternalError::unsupported(
                        ErrorOrigin::Condition,
                        format!(
                            "operator {} cannot compare against NULL (field '{}')",
                            compare.op, compare.field
                        ),
                    ));
                }
                if compare.value.is_list() && !compare.op.is_membership() {
                    return Err(InternalError::unsupported(
                        ErrorOrigin::Condition,
                        format!(
                            "operator {} cannot take a collection RHS (field '{}')",
                            compare.op, compare.field
                        ),
                    ));
                }
                Ok(())
            }
            Self::Combine(lhs, _, rhs) => {
                lhs.validate(model)?;
                rhs.validate(model)
            }
            Self::List(_, children) => {
                for child in children {
                    child.validate(model)?;
                }
                Ok(())
            }
            Self::Raw(_) => Ok(()),
        }
    }
}
