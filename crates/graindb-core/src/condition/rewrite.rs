use crate::{
    condition::{CompareCondition, CompareOp, Condition, JoinOp},
    value::Value,
};

impl Condition {
    /// Pure structural visitor over atomic IN/NOT IN conditions.
    ///
    /// `f` is applied to every membership atom with a collection RHS; a
    /// `Some` result replaces the atom in the new tree, `None` keeps it.
    /// The original tree is untouched, so independent dialect workarounds
    /// can run in sequence without interfering.
    #[must_use]
    pub fn map_in_atoms(
        &self,
        f: &mut impl FnMut(&CompareCondition) -> Option<Self>,
    ) -> Self {
        match self {
            Self::Compare(compare) => {
                if compare.op.is_membership() && compare.value.is_list() {
                    if let Some(replacement) = f(compare) {
                        return replacement;
                    }
                }
                self.clone()
            }
            Self::Combine(lhs, op, rhs) => Self::Combine(
                Box::new(lhs.map_in_atoms(f)),
                *op,
                Box::new(rhs.map_in_atoms(f)),
            ),
            Self::List(op, children) => Self::List(
                *op,
                children.iter().map(|child| child.map_in_atoms(f)).collect(),
            ),
            Self::Raw(_) => self.clone(),
        }
    }

    /// Rewrite any IN atom whose collection exceeds `ceiling` into a
    /// combination of IN atoms each within the ceiling, partitioning the
    /// collection in order. Atoms at or under the ceiling are untouched.
    ///
    /// `x IN (..)` partitions join with OR; `x NOT IN (..)` with AND.
    #[must_use]
    pub fn split_oversized_in(&self, ceiling: usize) -> Self {
        self.map_in_atoms(&mut |compare| {
            let Value::List(items) = &compare.value else {
                return None;
            };
            if items.len() <= ceiling {
                return None;
            }

            let join = match compare.op {
                CompareOp::In => JoinOp::Or,
                _ => JoinOp::And,
            };
            let parts = items
                .chunks(ceiling)
                .map(|chunk| {
                    Self::Compare(CompareCondition {
                        field: compare.field.clone(),
                        op: compare.op,
                        value: Value::List(chunk.to_vec()),
                        ignore_case: compare.ignore_case,
                    })
                })
                .collect();

            Some(Self::List(join, parts))
        })
    }
}
