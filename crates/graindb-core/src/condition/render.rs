use crate::{
    condition::{CompareCondition, CompareOp, Condition},
    error::{ErrorOrigin, InternalError},
    model::EntityModel,
    value::Value,
};
use std::fmt::Write as _;

impl Condition {
    /// Render this tree to a SQL fragment, appending every bound value to
    /// `params` in the exact left-to-right order the fragment's `?`
    /// placeholders appear. Fragment and params stay index-aligned for
    /// prepared-statement binding.
    pub fn render(
        &self,
        model: &EntityModel,
        params: &mut Vec<Value>,
    ) -> Result<String, InternalError> {
        match self {
            Self::Compare(compare) => render_compare(compare, model, params),
            Self::Combine(lhs, op, rhs) => {
                let left = lhs.render(model, params)?;
                let right = rhs.render(model, params)?;
                Ok(format!("({left}) {op} ({right})"))
            }
            Self::List(op, children) => {
                if children.is_empty() {
                    return Err(InternalError::unsupported(
                        ErrorOrigin::Condition,
                        "cannot render an empty condition list",
                    ));
                }
                let mut out = String::new();
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        let _ = write!(out, " {op} ");
                    }
                    let rendered = child.render(model, params)?;
                    let _ = write!(out, "({rendered})");
                }
                Ok(out)
            }
            Self::Raw(fragment) => Ok(fragment.clone()),
        }
    }
}

fn render_compare(
    compare: &CompareCondition,
    model: &EntityModel,
    params: &mut Vec<Value>,
) -> Result<String, InternalError> {
    let field = model.require_field(&compare.field)?;
    let column = if compare.ignore_case {
        format!("UPPER({})", field.column_name)
    } else {
        field.column_name.clone()
    };

    let bind = |value: &Value| {
        if compare.ignore_case {
            value.upper()
        } else {
            value.clone()
        }
    };

    match (&compare.op, &compare.value) {
        (CompareOp::Equals, Value::Null) => Ok(format!("{column} IS NULL")),
        (CompareOp::NotEquals, Value::Null) => Ok(format!("{column} IS NOT NULL")),
        (op, Value::Null) => Err(InternalError::unsupported(
            ErrorOrigin::Condition,
            format!("operator {op} cannot compare against NULL (field '{}')", compare.field),
        )),
        (op @ (CompareOp::In | CompareOp::NotIn), Value::List(items)) => {
            if items.is_empty() {
                // No dialect accepts `IN ()`; render the operator's
                // empty-set identity instead.
                return Ok(match op {
                    CompareOp::In => "1=0".to_string(),
                    _ => "1=1".to_string(),
                });
            }
            let placeholders = vec!["?"; items.len()].join(", ");
            for item in items {
                params.push(bind(item));
            }
            Ok(format!("{column} {op} ({placeholders})"))
        }
        (op, Value::List(_)) => Err(InternalError::unsupported(
            ErrorOrigin::Condition,
            format!(
                "operator {op} cannot take a collection RHS (field '{}')",
                compare.field
            ),
        )),
        (op, value) if op.is_membership() => {
            // Membership with a non-collection RHS binds a single element.
            params.push(bind(value));
            Ok(format!("{column} {op} (?)"))
        }
        (op, value) => {
            params.push(bind(value));
            Ok(format!("{column} {op} ?"))
        }
    }
}
