use std::fmt;

///
/// CompareOp
/// Fixed set of comparison operators with their SQL tokens.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Equals,
    Greater,
    GreaterEq,
    In,
    Less,
    LessEq,
    Like,
    NotEquals,
    NotIn,
    NotLike,
}

impl CompareOp {
    /// SQL rendering token.
    #[must_use]
    pub const fn sql_token(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::In => "IN",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Like => "LIKE",
            Self::NotEquals => "<>",
            Self::NotIn => "NOT IN",
            Self::NotLike => "NOT LIKE",
        }
    }

    /// Whether this operator consumes a collection RHS element-wise.
    #[must_use]
    pub const fn is_membership(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_token())
    }
}

///
/// JoinOp
/// Boolean combinator for condition lists and nested pairs.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinOp {
    And,
    Or,
}

impl JoinOp {
    #[must_use]
    pub const fn sql_token(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// In-memory combination semantics.
    #[must_use]
    pub fn apply(self, results: impl IntoIterator<Item = bool>) -> bool {
        match self {
            Self::And => results.into_iter().all(|b| b),
            Self::Or => results.into_iter().any(|b| b),
        }
    }
}

impl fmt::Display for JoinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_token())
    }
}
