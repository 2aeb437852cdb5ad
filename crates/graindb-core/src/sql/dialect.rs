use crate::{
    error::{ErrorOrigin, InternalError},
    sql::paging::LimitStyle,
    value::Value,
};
use std::{fmt, str::FromStr};

///
/// Dialect
///
/// Target SQL dialect. Everything dialect-specific — paging strategy,
/// IN-list and bind-parameter ceilings, locking-read syntax, temporary-table
/// DDL — hangs off this enum so the rest of the crate stays dialect-blind.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dialect {
    Hsql,
    Mysql,
    Oracle,
    Postgres,
    SqlServer,
}

impl Dialect {
    /// Hard ceiling on the element count of one IN list, where the dialect
    /// imposes one.
    #[must_use]
    pub const fn max_in_list(self) -> Option<usize> {
        match self {
            Self::Oracle => Some(1_000),
            _ => None,
        }
    }

    /// Ceiling on the total number of bound parameters per statement,
    /// where the dialect imposes one.
    #[must_use]
    pub const fn max_bind_params(self) -> Option<usize> {
        match self {
            Self::Postgres => Some(30_000),
            Self::SqlServer => Some(2_000),
            _ => None,
        }
    }

    /// How LIMIT/OFFSET-style paging is expressed.
    #[must_use]
    pub const fn limit_style(self) -> LimitStyle {
        match self {
            Self::Hsql | Self::Mysql | Self::Postgres => LimitStyle::LimitOffset,
            Self::Oracle => LimitStyle::RownumWrap,
            Self::SqlServer => LimitStyle::TopWindow,
        }
    }

    /// Suffix for a locking read, if the dialect expresses it as one.
    /// SqlServer locks via a table hint instead (`table_lock_hint`).
    #[must_use]
    pub const fn for_update_suffix(self) -> Option<&'static str> {
        match self {
            Self::SqlServer => None,
            _ => Some(" FOR UPDATE"),
        }
    }

    /// Table hint for a locking read, for dialects that use hints.
    #[must_use]
    pub const fn table_lock_hint(self) -> Option<&'static str> {
        match self {
            Self::SqlServer => Some("WITH (UPDLOCK)"),
            _ => None,
        }
    }

    /// Name for the `i`th temporary table of one statement.
    #[must_use]
    pub fn temp_table_name(self, index: usize) -> String {
        match self {
            Self::SqlServer => format!("#GRAIN_TMP_{index}"),
            _ => format!("GRAIN_TMP_{index}"),
        }
    }

    /// DDL creating a single-column temporary table for IN-overflow values.
    #[must_use]
    pub fn create_temp_table_sql(self, name: &str, sample: &Value) -> String {
        let ty = self.temp_value_type(sample);
        match self {
            Self::Oracle => format!(
                "CREATE GLOBAL TEMPORARY TABLE {name} (TT_VAL {ty}) ON COMMIT PRESERVE ROWS"
            ),
            Self::SqlServer => format!("CREATE TABLE {name} (TT_VAL {ty})"),
            _ => format!("CREATE TEMPORARY TABLE {name} (TT_VAL {ty})"),
        }
    }

    /// DDL dropping a temporary table created by `create_temp_table_sql`.
    #[must_use]
    pub fn drop_temp_table_sql(self, name: &str) -> String {
        format!("DROP TABLE {name}")
    }

    /// Column type for a temporary value table, keyed off a sample element.
    fn temp_value_type(self, sample: &Value) -> &'static str {
        match sample {
            Value::Int(_) | Value::Bool(_) => "BIGINT",
            Value::Float(_) => match self {
                Self::Oracle => "NUMBER",
                _ => "DOUBLE PRECISION",
            },
            Value::Timestamp(_) => "TIMESTAMP",
            _ => "VARCHAR(255)",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Hsql => "hsql",
            Self::Mysql => "mysql",
            Self::Oracle => "oracle",
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Dialect {
    type Err = InternalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hsql" | "hsqldb" => Ok(Self::Hsql),
            "mysql" => Ok(Self::Mysql),
            "oracle" => Ok(Self::Oracle),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            other => Err(InternalError::config(
                ErrorOrigin::Sql,
                format!("unknown SQL dialect: '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_dialects() {
        assert_eq!("postgres".parse::<Dialect>().expect("parse"), Dialect::Postgres);
        assert_eq!("MSSQL".parse::<Dialect>().expect("parse"), Dialect::SqlServer);
        let err = "sybase".parse::<Dialect>().unwrap_err();
        assert_eq!(err.class, crate::error::ErrorClass::Config);
    }

    #[test]
    fn ceilings_match_observed_limits() {
        assert_eq!(Dialect::Oracle.max_in_list(), Some(1_000));
        assert_eq!(Dialect::SqlServer.max_bind_params(), Some(2_000));
        assert_eq!(Dialect::Postgres.max_bind_params(), Some(30_000));
        assert_eq!(Dialect::Mysql.max_in_list(), None);
    }

    #[test]
    fn sqlserver_locks_via_hint() {
        assert!(Dialect::SqlServer.for_update_suffix().is_none());
        assert_eq!(Dialect::SqlServer.table_lock_hint(), Some("WITH (UPDLOCK)"));
        assert_eq!(Dialect::Postgres.for_update_suffix(), Some(" FOR UPDATE"));
    }
}
