use crate::{
    error::{ErrorOrigin, InternalError},
    sql::{
        dialect::Dialect,
        paging::{LimitStyle, PageSpec},
    },
};
use std::fmt::Write as _;

///
/// JoinClause
/// One join in a view-backed FROM clause. `on` is a pre-rendered fragment
/// in alias-qualified column terms.
///

#[derive(Clone, Debug)]
pub struct JoinClause {
    pub table: String,
    pub alias: String,
    pub outer: bool,
    pub on: String,
}

///
/// OrderByItem
///

#[derive(Clone, Debug)]
pub struct OrderByItem {
    pub column: String,
    pub descending: bool,
}

impl OrderByItem {
    #[must_use]
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }

    fn render(&self) -> String {
        if self.descending {
            format!("{} DESC", self.column)
        } else {
            self.column.clone()
        }
    }
}

///
/// SelectBuilder
///
/// Clause-by-clause SELECT assembly. Clauses are held structurally and
/// serialized exactly once in `build`, so dialect paging rewrites relocate
/// whole clauses instead of splicing strings positionally.
///

#[derive(Clone, Debug)]
pub struct SelectBuilder {
    distinct: bool,
    columns: Vec<String>,
    table: String,
    table_alias: Option<String>,
    table_hint: Option<String>,
    joins: Vec<JoinClause>,
    where_sql: Option<String>,
    group_by: Vec<String>,
    having_sql: Option<String>,
    order_by: Vec<OrderByItem>,
    for_update: bool,
}

impl SelectBuilder {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            distinct: false,
            columns: Vec::new(),
            table: table.to_string(),
            table_alias: None,
            table_hint: None,
            joins: Vec::new(),
            where_sql: None,
            group_by: Vec::new(),
            having_sql: None,
            order_by: Vec::new(),
            for_update: false,
        }
    }

    #[must_use]
    pub const fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    #[must_use]
    pub fn column(mut self, column: &str) -> Self {
        self.columns.push(column.to_string());
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.columns.extend(columns);
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.table_alias = Some(alias.to_string());
        self
    }

    #[must_use]
    pub fn join(mut self, join: JoinClause) -> Self {
        self.joins.push(join);
        self
    }

    #[must_use]
    pub fn where_sql(mut self, fragment: Option<String>) -> Self {
        self.where_sql = fragment.filter(|f| !f.is_empty());
        self
    }

    #[must_use]
    pub fn group_by(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.group_by.extend(columns);
        self
    }

    #[must_use]
    pub fn having_sql(mut self, fragment: Option<String>) -> Self {
        self.having_sql = fragment.filter(|f| !f.is_empty());
        self
    }

    #[must_use]
    pub fn order_by(mut self, items: impl IntoIterator<Item = OrderByItem>) -> Self {
        self.order_by.extend(items);
        self
    }

    /// Request a locking read (`FOR UPDATE` or the dialect's hint).
    #[must_use]
    pub const fn for_update(mut self, for_update: bool) -> Self {
        self.for_update = for_update;
        self
    }

    /// Serialize to a complete statement for one dialect, applying the
    /// dialect's paging strategy when a page is requested.
    pub fn build(self, dialect: Dialect, page: Option<PageSpec>) -> Result<String, InternalError> {
        let page = page.filter(|p| p.max_results > 0);

        match page {
            None => Ok(self.render_plain(dialect)),
            Some(page) => self.render_paged(dialect, page),
        }
    }

    fn select_list(&self) -> String {
        if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        }
    }

    fn from_clause(&self, dialect: Dialect) -> String {
        let mut out = self.table.clone();
        if let Some(alias) = &self.table_alias {
            let _ = write!(out, " {alias}");
        }
        if self.for_update
            && let Some(hint) = dialect.table_lock_hint()
        {
            let _ = write!(out, " {hint}");
        }
        for join in &self.joins {
            let kind = if join.outer {
                "LEFT OUTER JOIN"
            } else {
                "INNER JOIN"
            };
            let _ = write!(out, " {kind} {} {} ON {}", join.table, join.alias, join.on);
        }
        out
    }

    /// SELECT..HAVING without ordering or paging.
    fn render_core(&self, dialect: Dialect, top: Option<usize>) -> String {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if let Some(n) = top {
            let _ = write!(sql, "TOP {n} ");
        }
        sql.push_str(&self.select_list());
        let _ = write!(sql, " FROM {}", self.from_clause(dialect));
        if let Some(where_sql) = &self.where_sql {
            let _ = write!(sql, " WHERE {where_sql}");
        }
        if !self.group_by.is_empty() {
            let _ = write!(sql, " GROUP BY {}", self.group_by.join(", "));
        }
        if let Some(having) = &self.having_sql {
            let _ = write!(sql, " HAVING {having}");
        }
        sql
    }

    fn order_clause(&self) -> Option<String> {
        if self.order_by.is_empty() {
            return None;
        }
        let items: Vec<String> = self.order_by.iter().map(OrderByItem::render).collect();
        Some(format!("ORDER BY {}", items.join(", ")))
    }

    /// Core + ORDER BY, without the locking suffix.
    fn render_ordered(&self, dialect: Dialect) -> String {
        let mut sql = self.render_core(dialect, None);
        if let Some(order) = self.order_clause() {
            let _ = write!(sql, " {order}");
        }
        sql
    }

    fn lock_suffix(&self, dialect: Dialect) -> &'static str {
        if self.for_update {
            dialect.for_update_suffix().unwrap_or("")
        } else {
            ""
        }
    }

    fn render_plain(&self, dialect: Dialect) -> String {
        let mut sql = self.render_ordered(dialect);
        sql.push_str(self.lock_suffix(dialect));
        sql
    }

    fn render_paged(&self, dialect: Dialect, page: PageSpec) -> Result<String, InternalError> {
        match dialect.limit_style() {
            LimitStyle::LimitOffset => {
                let mut sql = self.render_ordered(dialect);
                let _ = write!(sql, " LIMIT {}", page.max_results);
                if page.offset > 0 {
                    let _ = write!(sql, " OFFSET {}", page.offset);
                }
                sql.push_str(self.lock_suffix(dialect));
                Ok(sql)
            }
            LimitStyle::TopWindow => {
                if page.offset == 0 {
                    let mut sql = self.render_core(dialect, Some(page.max_results));
                    if let Some(order) = self.order_clause() {
                        let _ = write!(sql, " {order}");
                    }
                    return Ok(sql);
                }
                self.render_window(dialect, page)
            }
            LimitStyle::RownumWrap => self.render_rownum(dialect, page),
        }
    }

    /// ROW_NUMBER windowing for offset paging. The caller's ORDER BY moves
    /// inside the window function; the outer query filters on row number,
    /// preserving the original ordering semantics.
    fn render_window(&self, dialect: Dialect, page: PageSpec) -> Result<String, InternalError> {
        let order = self.order_clause().ok_or_else(|| {
            InternalError::unsupported(
                ErrorOrigin::Sql,
                format!(
                    "offset paging on {dialect} requires ORDER BY for a deterministic window"
                ),
            )
        })?;

        let mut inner = String::from("SELECT ");
        if self.distinct {
            inner.push_str("DISTINCT ");
        }
        inner.push_str(&self.select_list());
        let _ = write!(inner, ", ROW_NUMBER() OVER ({order}) AS GRAIN_ROW_NUM");
        let _ = write!(inner, " FROM {}", self.from_clause(dialect));
        if let Some(where_sql) = &self.where_sql {
            let _ = write!(inner, " WHERE {where_sql}");
        }
        if !self.group_by.is_empty() {
            let _ = write!(inner, " GROUP BY {}", self.group_by.join(", "));
        }
        if let Some(having) = &self.having_sql {
            let _ = write!(inner, " HAVING {having}");
        }

        let outer_list = self.unqualified_list();
        let low = page.offset;
        let high = page.offset + page.max_results;
        Ok(format!(
            "SELECT {outer_list} FROM ({inner}) GRAIN_PAGED WHERE GRAIN_ROW_NUM > {low} AND GRAIN_ROW_NUM <= {high}"
        ))
    }

    /// Nested ROWNUM filtering for Oracle. The complete ordered query stays
    /// innermost so ROWNUM is assigned after ordering.
    fn render_rownum(&self, dialect: Dialect, page: PageSpec) -> Result<String, InternalError> {
        let inner = self.render_ordered(dialect);
        if page.offset == 0 {
            return Ok(format!(
                "SELECT * FROM ({inner}) WHERE ROWNUM <= {}",
                page.max_results
            ));
        }

        if self.order_by.is_empty() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Sql,
                format!(
                    "offset paging on {dialect} requires ORDER BY for a deterministic window"
                ),
            ));
        }

        let outer_list = self.unqualified_list();
        let high = page.offset + page.max_results;
        Ok(format!(
            "SELECT {outer_list} FROM (SELECT GRAIN_INNER.*, ROWNUM AS GRAIN_RNUM FROM ({inner}) GRAIN_INNER WHERE ROWNUM <= {high}) WHERE GRAIN_RNUM > {}",
            page.offset
        ))
    }

    /// Column list with alias qualifiers stripped, for outer paging shells.
    fn unqualified_list(&self) -> String {
        if self.columns.is_empty() {
            return "*".to_string();
        }
        let stripped: Vec<&str> = self
            .columns
            .iter()
            .map(|col| col.rsplit('.').next().unwrap_or(col))
            .collect();
        stripped.join(", ")
    }
}

///
/// InsertBuilder
///

#[derive(Clone, Debug)]
pub struct InsertBuilder {
    table: String,
    columns: Vec<String>,
}

impl InsertBuilder {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn build(self) -> Result<String, InternalError> {
        if self.columns.is_empty() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Sql,
                format!("INSERT into {} with no columns", self.table),
            ));
        }
        let placeholders = vec!["?"; self.columns.len()].join(", ");
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            self.table,
            self.columns.join(", ")
        ))
    }
}

///
/// UpdateBuilder
/// Bound-parameter order is SET columns first, then WHERE params.
///

#[derive(Clone, Debug)]
pub struct UpdateBuilder {
    table: String,
    set_columns: Vec<String>,
    where_sql: Option<String>,
}

impl UpdateBuilder {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            set_columns: Vec::new(),
            where_sql: None,
        }
    }

    #[must_use]
    pub fn set_columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.set_columns.extend(columns);
        self
    }

    #[must_use]
    pub fn where_sql(mut self, fragment: Option<String>) -> Self {
        self.where_sql = fragment.filter(|f| !f.is_empty());
        self
    }

    pub fn build(self) -> Result<String, InternalError> {
        if self.set_columns.is_empty() {
            return Err(InternalError::unsupported(
                ErrorOrigin::Sql,
                format!("UPDATE {} with no SET columns", self.table),
            ));
        }
        let sets: Vec<String> = self
            .set_columns
            .iter()
            .map(|col| format!("{col} = ?"))
            .collect();
        let mut sql = format!("UPDATE {} SET {}", self.table, sets.join(", "));
        if let Some(where_sql) = &self.where_sql {
            let _ = write!(sql, " WHERE {where_sql}");
        }
        Ok(sql)
    }
}

///
/// DeleteBuilder
/// A DELETE without a WHERE clause is refused unless explicitly allowed.
///

#[derive(Clone, Debug)]
pub struct DeleteBuilder {
    table: String,
    where_sql: Option<String>,
    allow_all: bool,
}

impl DeleteBuilder {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            where_sql: None,
            allow_all: false,
        }
    }

    #[must_use]
    pub fn where_sql(mut self, fragment: Option<String>) -> Self {
        self.where_sql = fragment.filter(|f| !f.is_empty());
        self
    }

    #[must_use]
    pub const fn allow_all(mut self, allow: bool) -> Self {
        self.allow_all = allow;
        self
    }

    pub fn build(self) -> Result<String, InternalError> {
        match &self.where_sql {
            Some(where_sql) => Ok(format!("DELETE FROM {} WHERE {where_sql}", self.table)),
            None if self.allow_all => Ok(format!("DELETE FROM {}", self.table)),
            None => Err(InternalError::unsupported(
                ErrorOrigin::Sql,
                format!("DELETE from {} without a condition", self.table),
            )),
        }
    }
}
