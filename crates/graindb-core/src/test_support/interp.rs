//! Interpreter for the statement shapes this crate's builders emit.
//!
//! This is deliberately not a SQL parser: the grammar is exactly what
//! `sql::builder` and `condition::render` produce, nothing more. Anything
//! else is a storage error.

use super::{MemConnection, Table, UndoOp, storage_error};
use crate::{
    condition::wildcard_match,
    error::InternalError,
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, collections::HashMap};

//
// Tokenizer
//

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Num(i64),
    LParen,
    RParen,
    Comma,
    Question,
    Star,
    Plus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(sql: &str) -> Result<Vec<Tok>, InternalError> {
    let mut toks = Vec::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '?' => {
                toks.push(Tok::Question);
                i += 1;
            }
            '*' => {
                toks.push(Tok::Star);
                i += 1;
            }
            '+' => {
                toks.push(Tok::Plus);
                i += 1;
            }
            '=' => {
                toks.push(Tok::Eq);
                i += 1;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'>') {
                    toks.push(Tok::Ne);
                    i += 2;
                } else if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Le);
                    i += 2;
                } else {
                    toks.push(Tok::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    toks.push(Tok::Ge);
                    i += 2;
                } else {
                    toks.push(Tok::Gt);
                    i += 1;
                }
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| storage_error(format!("bad number in SQL: {text}")))?;
                toks.push(Tok::Num(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '#' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric()
                        || chars[i] == '_'
                        || chars[i] == '#'
                        || chars[i] == '.')
                {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(storage_error(format!("unexpected character in SQL: {other}")));
            }
        }
    }

    Ok(toks)
}

//
// Parser
//

struct Parser<'a> {
    toks: &'a [Tok],
    pos: usize,
    params: std::slice::Iter<'a, Value>,
}

impl<'a> Parser<'a> {
    fn new(toks: &'a [Tok], params: &'a [Value]) -> Self {
        Self {
            toks,
            pos: 0,
            params: params.iter(),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<&Tok> {
        let tok = self.toks.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        self.pos >= self.toks.len()
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), InternalError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(storage_error(format!(
                "expected {tok:?} at token {} of {:?}",
                self.pos, self.toks
            )))
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if let Some(Tok::Ident(word)) = self.peek()
            && word == kw
        {
            self.pos += 1;
            return true;
        }
        false
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), InternalError> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(storage_error(format!("expected keyword {kw}")))
        }
    }

    fn expect_ident(&mut self) -> Result<String, InternalError> {
        match self.next() {
            Some(Tok::Ident(word)) => Ok(word.clone()),
            other => Err(storage_error(format!("expected identifier, got {other:?}"))),
        }
    }

    fn expect_num(&mut self) -> Result<i64, InternalError> {
        match self.next() {
            Some(Tok::Num(n)) => Ok(*n),
            other => Err(storage_error(format!("expected number, got {other:?}"))),
        }
    }

    fn take_param(&mut self) -> Result<Value, InternalError> {
        self.params
            .next()
            .cloned()
            .ok_or_else(|| storage_error("statement binds more parameters than supplied"))
    }
}

//
// WHERE expressions
//

#[derive(Clone, Debug)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
}

#[derive(Clone, Debug)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Cmp {
        column: String,
        upper: bool,
        op: CmpOp,
        value: Value,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    InList {
        column: String,
        upper: bool,
        negated: bool,
        values: Vec<Value>,
    },
    InSubquery {
        column: String,
        upper: bool,
        negated: bool,
        table: String,
    },
    Literal(bool),
}

fn parse_expr(p: &mut Parser<'_>) -> Result<Expr, InternalError> {
    let mut lhs = parse_and(p)?;
    while p.eat_kw("OR") {
        let rhs = parse_and(p)?;
        lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_and(p: &mut Parser<'_>) -> Result<Expr, InternalError> {
    let mut lhs = parse_primary(p)?;
    while p.eat_kw("AND") {
        let rhs = parse_primary(p)?;
        lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
}

fn parse_primary(p: &mut Parser<'_>) -> Result<Expr, InternalError> {
    if p.eat(&Tok::LParen) {
        let expr = parse_expr(p)?;
        p.expect(&Tok::RParen)?;
        return Ok(expr);
    }

    // 1=0 / 1=1 identities from empty IN lists.
    if let Some(Tok::Num(_)) = p.peek() {
        let lhs = p.expect_num()?;
        p.expect(&Tok::Eq)?;
        let rhs = p.expect_num()?;
        return Ok(Expr::Literal(lhs == rhs));
    }

    // Column, optionally wrapped in UPPER(..).
    let mut upper = false;
    let mut column = p.expect_ident()?;
    if column == "UPPER" {
        upper = true;
        p.expect(&Tok::LParen)?;
        column = p.expect_ident()?;
        p.expect(&Tok::RParen)?;
    }

    if p.eat_kw("IS") {
        let negated = p.eat_kw("NOT");
        p.expect_kw("NULL")?;
        return Ok(Expr::IsNull { column, negated });
    }

    let negated = p.eat_kw("NOT");
    if p.eat_kw("IN") {
        p.expect(&Tok::LParen)?;
        if p.eat_kw("SELECT") {
            let _value_col = p.expect_ident()?;
            p.expect_kw("FROM")?;
            let table = p.expect_ident()?;
            p.expect(&Tok::RParen)?;
            return Ok(Expr::InSubquery {
                column,
                upper,
                negated,
                table,
            });
        }
        let mut values = Vec::new();
        loop {
            p.expect(&Tok::Question)?;
            values.push(p.take_param()?);
            if !p.eat(&Tok::Comma) {
                break;
            }
        }
        p.expect(&Tok::RParen)?;
        return Ok(Expr::InList {
            column,
            upper,
            negated,
            values,
        });
    }
    if p.eat_kw("LIKE") {
        p.expect(&Tok::Question)?;
        let value = p.take_param()?;
        return Ok(Expr::Cmp {
            column,
            upper,
            op: if negated { CmpOp::NotLike } else { CmpOp::Like },
            value,
        });
    }
    if negated {
        return Err(storage_error("dangling NOT in WHERE clause"));
    }

    let op = match p.next() {
        Some(Tok::Eq) => CmpOp::Eq,
        Some(Tok::Ne) => CmpOp::Ne,
        Some(Tok::Lt) => CmpOp::Lt,
        Some(Tok::Le) => CmpOp::Le,
        Some(Tok::Gt) => CmpOp::Gt,
        Some(Tok::Ge) => CmpOp::Ge,
        other => return Err(storage_error(format!("expected comparison, got {other:?}"))),
    };
    p.expect(&Tok::Question)?;
    let value = p.take_param()?;

    Ok(Expr::Cmp {
        column,
        upper,
        op,
        value,
    })
}

fn column_value(
    table: &Table,
    row: &[Value],
    column: &str,
    upper: bool,
) -> Result<Value, InternalError> {
    let idx = table
        .column_index(column)
        .ok_or_else(|| storage_error(format!("unknown column: {column}")))?;
    let value = row
        .get(idx)
        .cloned()
        .ok_or_else(|| storage_error(format!("short row for column: {column}")))?;
    Ok(if upper { value.upper() } else { value })
}

fn eval(
    expr: &Expr,
    tables: &HashMap<String, Table>,
    table: &Table,
    row: &[Value],
) -> Result<bool, InternalError> {
    match expr {
        Expr::Or(a, b) => Ok(eval(a, tables, table, row)? || eval(b, tables, table, row)?),
        Expr::And(a, b) => Ok(eval(a, tables, table, row)? && eval(b, tables, table, row)?),
        Expr::Literal(b) => Ok(*b),
        Expr::IsNull { column, negated } => {
            let value = column_value(table, row, column, false)?;
            Ok(value.is_null() != *negated)
        }
        Expr::Cmp {
            column,
            upper,
            op,
            value,
        } => {
            let lhs = column_value(table, row, column, *upper)?;
            if lhs.is_null() || value.is_null() {
                return Ok(false);
            }
            let result = match op {
                CmpOp::Eq => canonical_cmp(&lhs, value) == Ordering::Equal,
                CmpOp::Ne => canonical_cmp(&lhs, value) != Ordering::Equal,
                CmpOp::Lt => canonical_cmp(&lhs, value) == Ordering::Less,
                CmpOp::Le => canonical_cmp(&lhs, value) != Ordering::Greater,
                CmpOp::Gt => canonical_cmp(&lhs, value) == Ordering::Greater,
                CmpOp::Ge => canonical_cmp(&lhs, value) != Ordering::Less,
                CmpOp::Like | CmpOp::NotLike => {
                    let (Value::Text(text), Value::Text(pattern)) = (&lhs, value) else {
                        return Err(storage_error("LIKE requires text operands"));
                    };
                    let hit = wildcard_match(
                        &text.chars().collect::<Vec<_>>(),
                        &pattern.chars().collect::<Vec<_>>(),
                    );
                    if matches!(op, CmpOp::Like) { hit } else { !hit }
                }
            };
            Ok(result)
        }
        Expr::InList {
            column,
            upper,
            negated,
            values,
        } => {
            let lhs = column_value(table, row, column, *upper)?;
            if lhs.is_null() {
                return Ok(false);
            }
            let hit = values
                .iter()
                .any(|v| canonical_cmp(&lhs, v) == Ordering::Equal);
            Ok(hit != *negated)
        }
        Expr::InSubquery {
            column,
            upper,
            negated,
            table: sub_table,
        } => {
            let lhs = column_value(table, row, column, *upper)?;
            if lhs.is_null() {
                return Ok(false);
            }
            let sub = tables
                .get(sub_table)
                .ok_or_else(|| storage_error(format!("unknown table: {sub_table}")))?;
            let hit = sub
                .rows
                .iter()
                .filter_map(|r| r.first())
                .any(|v| canonical_cmp(&lhs, v) == Ordering::Equal);
            Ok(hit != *negated)
        }
    }
}

//
// Statements
//

#[derive(Clone, Debug)]
enum SetItem {
    Assign { column: String, value: Value },
    /// `col = col + ?` relative update.
    Add { column: String, delta: i64 },
}

pub(super) fn execute(
    conn: &mut MemConnection,
    sql: &str,
    params: &[Value],
) -> Result<u64, InternalError> {
    let toks = tokenize(sql)?;
    let mut p = Parser::new(&toks, params);

    if p.eat_kw("INSERT") {
        return exec_insert(conn, &mut p);
    }
    if p.eat_kw("UPDATE") {
        return exec_update(conn, &mut p);
    }
    if p.eat_kw("DELETE") {
        return exec_delete(conn, &mut p);
    }
    if p.eat_kw("CREATE") {
        return exec_create(conn, &mut p);
    }
    if p.eat_kw("DROP") {
        return exec_drop(conn, &mut p);
    }

    Err(storage_error(format!("unsupported statement: {sql}")))
}

fn exec_insert(conn: &mut MemConnection, p: &mut Parser<'_>) -> Result<u64, InternalError> {
    p.expect_kw("INTO")?;
    let table_name = p.expect_ident()?;

    p.expect(&Tok::LParen)?;
    let mut columns = Vec::new();
    loop {
        columns.push(p.expect_ident()?);
        if !p.eat(&Tok::Comma) {
            break;
        }
    }
    p.expect(&Tok::RParen)?;
    p.expect_kw("VALUES")?;

    let mut groups: Vec<Vec<Value>> = Vec::new();
    loop {
        p.expect(&Tok::LParen)?;
        let mut group = Vec::new();
        loop {
            p.expect(&Tok::Question)?;
            group.push(p.take_param()?);
            if !p.eat(&Tok::Comma) {
                break;
            }
        }
        p.expect(&Tok::RParen)?;
        groups.push(group);
        if !p.eat(&Tok::Comma) {
            break;
        }
    }

    let db = std::sync::Arc::clone(&conn.db);
    let mut tables = db.lock_tables();
    let table = tables
        .get_mut(&table_name)
        .ok_or_else(|| storage_error(format!("unknown table: {table_name}")))?;

    let mut undo = Vec::new();
    let count = groups.len() as u64;
    for group in groups {
        if group.len() != columns.len() {
            return Err(storage_error("INSERT arity mismatch"));
        }
        let mut row = vec![Value::Null; table.columns.len()];
        for (column, value) in columns.iter().zip(group) {
            let idx = table
                .column_index(column)
                .ok_or_else(|| storage_error(format!("unknown column: {column}")))?;
            row[idx] = value;
        }
        undo.push(UndoOp::RemoveInserted {
            table: table_name.clone(),
            row: row.clone(),
        });
        table.rows.push(row);
    }
    drop(tables);

    for op in undo {
        conn.record_undo(op);
    }

    Ok(count)
}

fn exec_update(conn: &mut MemConnection, p: &mut Parser<'_>) -> Result<u64, InternalError> {
    let table_name = p.expect_ident()?;
    p.expect_kw("SET")?;

    let mut sets = Vec::new();
    loop {
        let column = p.expect_ident()?;
        p.expect(&Tok::Eq)?;
        if let Some(Tok::Ident(word)) = p.peek()
            && *word == column
        {
            // col = col + ?
            let _ = p.next();
            p.expect(&Tok::Plus)?;
            p.expect(&Tok::Question)?;
            let delta = p
                .take_param()?
                .as_int()
                .ok_or_else(|| storage_error("relative update requires an integer delta"))?;
            sets.push(SetItem::Add { column, delta });
        } else {
            p.expect(&Tok::Question)?;
            sets.push(SetItem::Assign {
                column,
                value: p.take_param()?,
            });
        }
        if !p.eat(&Tok::Comma) {
            break;
        }
    }

    let where_expr = if p.eat_kw("WHERE") {
        Some(parse_expr(p)?)
    } else {
        None
    };

    let db = std::sync::Arc::clone(&conn.db);
    let mut tables = db.lock_tables();
    let snapshot_tables = tables.clone();
    let snapshot = snapshot_tables
        .get(&table_name)
        .ok_or_else(|| storage_error(format!("unknown table: {table_name}")))?;
    let table = tables
        .get_mut(&table_name)
        .ok_or_else(|| storage_error(format!("unknown table: {table_name}")))?;

    // Key for safe relative-update rollback: the single equality the
    // sequence protocol filters on. Relative adds undo by subtraction
    // (which commutes with concurrent adds); everything else undoes by
    // whole-row restore.
    let simple_key = match &where_expr {
        Some(Expr::Cmp {
            column,
            upper: false,
            op: CmpOp::Eq,
            value,
        }) => snapshot.column_index(column).map(|idx| (idx, value.clone())),
        _ => None,
    };
    let adds_only = sets.iter().all(|s| matches!(s, SetItem::Add { .. }));

    let mut set_indexes = Vec::with_capacity(sets.len());
    for set in &sets {
        let column = match set {
            SetItem::Assign { column, .. } | SetItem::Add { column, .. } => column,
        };
        set_indexes.push(
            snapshot
                .column_index(column)
                .ok_or_else(|| storage_error(format!("unknown column: {column}")))?,
        );
    }

    let mut affected = 0u64;
    let mut undo = Vec::new();
    for row in &mut table.rows {
        let hit = match &where_expr {
            Some(expr) => eval(expr, &snapshot_tables, snapshot, row)?,
            None => true,
        };
        if !hit {
            continue;
        }

        let before = row.clone();
        for (set, idx) in sets.iter().zip(&set_indexes) {
            match set {
                SetItem::Assign { value, .. } => {
                    row[*idx] = value.clone();
                }
                SetItem::Add { delta, .. } => match &mut row[*idx] {
                    Value::Int(n) => *n += delta,
                    other => {
                        return Err(storage_error(format!(
                            "relative update on non-integer value: {other}"
                        )));
                    }
                },
            }
        }

        if adds_only && let Some((key_idx, key)) = &simple_key {
            for (set, idx) in sets.iter().zip(&set_indexes) {
                if let SetItem::Add { delta, .. } = set {
                    undo.push(UndoOp::ReverseAdd {
                        table: table_name.clone(),
                        col_idx: *idx,
                        key_idx: *key_idx,
                        key: key.clone(),
                        delta: *delta,
                    });
                }
            }
        } else {
            undo.push(UndoOp::RestoreRow {
                table: table_name.clone(),
                before,
                after: row.clone(),
            });
        }
        affected += 1;
    }
    drop(tables);

    for op in undo {
        conn.record_undo(op);
    }

    Ok(affected)
}

fn exec_delete(conn: &mut MemConnection, p: &mut Parser<'_>) -> Result<u64, InternalError> {
    p.expect_kw("FROM")?;
    let table_name = p.expect_ident()?;
    let where_expr = if p.eat_kw("WHERE") {
        Some(parse_expr(p)?)
    } else {
        None
    };

    let db = std::sync::Arc::clone(&conn.db);
    let mut tables = db.lock_tables();
    let all_tables = tables.clone();
    let table = tables
        .get_mut(&table_name)
        .ok_or_else(|| storage_error(format!("unknown table: {table_name}")))?;
    let snapshot = all_tables
        .get(&table_name)
        .ok_or_else(|| storage_error("table vanished"))?;

    let mut kept = Vec::with_capacity(table.rows.len());
    let mut removed = Vec::new();
    for row in table.rows.drain(..) {
        let hit = match &where_expr {
            Some(expr) => eval(expr, &all_tables, snapshot, &row)?,
            None => true,
        };
        if hit {
            removed.push(row);
        } else {
            kept.push(row);
        }
    }
    table.rows = kept;
    let affected = removed.len() as u64;
    drop(tables);

    for row in removed {
        conn.record_undo(UndoOp::ReinsertDeleted {
            table: table_name.clone(),
            row,
        });
    }

    Ok(affected)
}

fn exec_create(conn: &mut MemConnection, p: &mut Parser<'_>) -> Result<u64, InternalError> {
    // CREATE [GLOBAL] [TEMPORARY] TABLE name (col type...) [trailing]
    while !p.eat_kw("TABLE") {
        if p.at_end() {
            return Err(storage_error("malformed CREATE TABLE"));
        }
        let _ = p.next();
    }
    let table_name = p.expect_ident()?;
    p.expect(&Tok::LParen)?;
    let column = p.expect_ident()?;

    let db = std::sync::Arc::clone(&conn.db);
    db.create_table(&table_name, &[column.as_str()]);

    Ok(0)
}

fn exec_drop(conn: &mut MemConnection, p: &mut Parser<'_>) -> Result<u64, InternalError> {
    p.expect_kw("TABLE")?;
    let table_name = p.expect_ident()?;

    let db = std::sync::Arc::clone(&conn.db);
    let mut tables = db.lock_tables();
    if tables.remove(&table_name).is_none() {
        return Err(storage_error(format!("unknown table: {table_name}")));
    }

    Ok(0)
}

//
// Queries
//

pub(super) fn query(
    conn: &mut MemConnection,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Vec<Value>>, InternalError> {
    let toks = tokenize(sql)?;
    let mut p = Parser::new(&toks, params);
    p.expect_kw("SELECT")?;

    let distinct = p.eat_kw("DISTINCT");

    // Select list: COUNT(*), COUNT(DISTINCT col), or a column list.
    let mut count_all = false;
    let mut count_distinct: Option<String> = None;
    let mut columns = Vec::new();
    if p.eat_kw("COUNT") {
        p.expect(&Tok::LParen)?;
        if p.eat(&Tok::Star) {
            count_all = true;
        } else {
            p.expect_kw("DISTINCT")?;
            count_distinct = Some(p.expect_ident()?);
        }
        p.expect(&Tok::RParen)?;
    } else {
        loop {
            columns.push(p.expect_ident()?);
            if !p.eat(&Tok::Comma) {
                break;
            }
        }
    }

    p.expect_kw("FROM")?;
    let table_name = p.expect_ident()?;

    // Optional SqlServer lock hint emitted by for_update on that dialect.
    if p.eat_kw("WITH") {
        p.expect(&Tok::LParen)?;
        let _hint = p.expect_ident()?;
        p.expect(&Tok::RParen)?;
    }

    let where_expr = if p.eat_kw("WHERE") {
        Some(parse_expr(&mut p)?)
    } else {
        None
    };

    let mut order: Vec<(String, bool)> = Vec::new();
    if p.eat_kw("ORDER") {
        p.expect_kw("BY")?;
        loop {
            let column = p.expect_ident()?;
            let descending = p.eat_kw("DESC");
            order.push((column, descending));
            if !p.eat(&Tok::Comma) {
                break;
            }
        }
    }

    let mut limit: Option<usize> = None;
    let mut offset = 0usize;
    if p.eat_kw("LIMIT") {
        limit = Some(usize::try_from(p.expect_num()?).unwrap_or(0));
    }
    if p.eat_kw("OFFSET") {
        offset = usize::try_from(p.expect_num()?).unwrap_or(0);
    }

    // Trailing FOR UPDATE is a no-op here: statement-level locking is
    // subsumed by the store's per-statement mutex.
    if p.eat_kw("FOR") {
        p.expect_kw("UPDATE")?;
    }

    if !p.at_end() {
        return Err(storage_error(format!("unsupported query shape: {sql}")));
    }

    let db = std::sync::Arc::clone(&conn.db);
    let tables = db.lock_tables();
    let table = tables
        .get(&table_name)
        .ok_or_else(|| storage_error(format!("unknown table: {table_name}")))?;

    let mut matched: Vec<&Vec<Value>> = Vec::new();
    for row in &table.rows {
        let hit = match &where_expr {
            Some(expr) => eval(expr, &tables, table, row)?,
            None => true,
        };
        if hit {
            matched.push(row);
        }
    }

    if !order.is_empty() {
        let mut key_indexes = Vec::with_capacity(order.len());
        for (column, descending) in &order {
            let idx = table
                .column_index(column)
                .ok_or_else(|| storage_error(format!("unknown column: {column}")))?;
            key_indexes.push((idx, *descending));
        }
        matched.sort_by(|a, b| {
            for (idx, descending) in &key_indexes {
                let ord = canonical_cmp(&a[*idx], &b[*idx]);
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    if count_all || count_distinct.is_some() {
        let count = if let Some(column) = count_distinct {
            let idx = table
                .column_index(&column)
                .ok_or_else(|| storage_error(format!("unknown column: {column}")))?;
            let mut seen: Vec<&Value> = Vec::new();
            for row in &matched {
                let value = &row[idx];
                if value.is_null() {
                    continue;
                }
                if !seen
                    .iter()
                    .any(|existing| canonical_cmp(existing, value) == Ordering::Equal)
                {
                    seen.push(value);
                }
            }
            seen.len()
        } else {
            matched.len()
        };
        return Ok(vec![vec![Value::Int(count as i64)]]);
    }

    let mut indexes = Vec::with_capacity(columns.len());
    for column in &columns {
        indexes.push(
            table
                .column_index(column)
                .ok_or_else(|| storage_error(format!("unknown column: {column}")))?,
        );
    }

    let mut projected: Vec<Vec<Value>> = matched
        .into_iter()
        .map(|row| indexes.iter().map(|idx| row[*idx].clone()).collect())
        .collect();

    if distinct {
        let mut unique: Vec<Vec<Value>> = Vec::new();
        for row in projected {
            if !unique.iter().any(|u| u == &row) {
                unique.push(row);
            }
        }
        projected = unique;
    }

    let sliced: Vec<Vec<Value>> = projected
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    Ok(sliced)
}
