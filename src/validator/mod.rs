//! SQL Validator
//!
//! Lexical gate for SQL text, whoever produced it. Checks run in a fixed order
//! and stop at the first failure:
//!
//! 1. no forbidden keyword (`insert`, `update`, `delete`, `drop`, `alter`) as a whole word
//! 2. at most one statement (a `;` is only allowed as the final character)
//! 3. the statement tokenizes under PostgreSQL rules and starts with `SELECT`
//! 4. every `FROM`/`JOIN` table exists; builds the alias map
//! 5. every qualified `alias.column` resolves to a known column
//! 6. every `a.x = b.y` predicate matches a stored foreign-key edge, and every
//!    `ON` condition holds at least one such predicate
//!
//! This is a restricted scan over tokens, not a parser. Recognized forms:
//!
//! - table references `name [[AS] alias]` after `FROM`, `JOIN`, `TABLE` and
//!   after each comma of a `FROM` clause
//! - `(SELECT …)`, `(WITH …)`, `(VALUES …)` and `(TABLE …)` subqueries, scanned
//!   with the same rules; `FROM` inside any other parentheses
//!   (`EXTRACT(x FROM y)`) is not a table reference
//! - qualified column references `qualifier.column` and `qualifier.*`
//! - equality joins between two qualified columns
//!
//! A parenthesized join group `FROM (a JOIN b ON …)` is rejected rather than
//! scanned. Unqualified columns are not checked. Comma joins are accepted
//! without edge verification. `NATURAL`, `CROSS` and `USING` joins carry no
//! checkable predicate and are rejected as [`ValidationError::InvalidJoin`].

mod lexer;

use crate::error::ValidationError;
use crate::schema::catalog::Schema;
use lazy_static::lazy_static;
use lexer::{tokenize, Token};
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

lazy_static! {
    // Constant pattern; compiled once.
    static ref FORBIDDEN: Regex = Regex::new(r"(?i)\b(insert|update|delete|drop|alter)\b").unwrap();
}

/// Words that end a table reference instead of naming an alias.
const CLAUSE_WORDS: &[&str] = &[
    "select", "from", "where", "join", "inner", "left", "right", "full", "outer", "cross",
    "natural", "on", "using", "group", "order", "limit", "offset", "having", "union", "except",
    "intersect", "window", "fetch", "for", "lateral",
];

/// Words that close a `FROM` clause at their parenthesis level.
const FROM_END_WORDS: &[&str] = &[
    "where", "group", "having", "order", "limit", "offset", "union", "except", "intersect",
    "window", "fetch", "for",
];

/// Words that close an `ON` condition.
const ON_END_WORDS: &[&str] = &[
    "join", "inner", "left", "right", "full", "cross", "natural", "where", "group", "having",
    "order", "limit", "offset", "union", "except", "intersect", "window", "fetch", "for",
];

pub type Validation = std::result::Result<(), ValidationError>;

/// Validate `sql` against `schema`. Never modifies its input.
pub fn validate(sql: &str, schema: &Schema) -> Validation {
    let outcome = run_checks(sql, schema);
    match &outcome {
        Ok(()) => debug!("SQL accepted"),
        Err(err) => warn!("SQL rejected ({}): {}", err.kind(), err),
    }
    outcome
}

fn run_checks(sql: &str, schema: &Schema) -> Validation {
    check_forbidden(sql)?;
    check_single_statement(sql)?;

    let tokens = tokenize(sql).map_err(ValidationError::NotASelect)?;
    check_select(&tokens)?;
    let aliases = resolve_aliases(&tokens, schema)?;
    check_columns(&tokens, &aliases, schema)?;
    check_joins(&tokens, &aliases, schema)
}

fn check_forbidden(sql: &str) -> Validation {
    match FORBIDDEN.find(sql) {
        Some(found) => Err(ValidationError::ForbiddenOperation(
            found.as_str().to_ascii_uppercase(),
        )),
        None => Ok(()),
    }
}

fn check_single_statement(sql: &str) -> Validation {
    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    match body.find(';') {
        Some(pos) => {
            let rest: String = body[pos + 1..].trim().chars().take(40).collect();
            Err(ValidationError::MultiStatement(format!(";{}", rest)))
        }
        None => Ok(()),
    }
}

fn check_select(tokens: &[Token]) -> Validation {
    match tokens.first() {
        Some(first) if first.is_keyword("select") => Ok(()),
        Some(first) => Err(ValidationError::NotASelect(first.text())),
        None => Err(ValidationError::NotASelect(String::new())),
    }
}

/// Alias (or bare table name) → catalog table name.
type AliasMap = HashMap<String, String>;

/// Scan state for one parenthesis level.
struct Level {
    /// The level holds a query (the statement itself or a subquery), so
    /// `FROM` and `JOIN` introduce tables here.
    query: bool,
    in_from: bool,
    expect_table: bool,
}

impl Level {
    fn new(query: bool) -> Self {
        Self {
            query,
            in_from: false,
            expect_table: false,
        }
    }
}

fn resolve_aliases(tokens: &[Token], schema: &Schema) -> std::result::Result<AliasMap, ValidationError> {
    let mut aliases = AliasMap::new();
    // Never empty: the statement level is not popped.
    let mut levels = vec![Level::new(true)];
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];
        let top = levels.len() - 1;

        if levels[top].expect_table {
            if token.is_keyword("lateral") || token.is_keyword("only") {
                i += 1;
                continue;
            }
            levels[top].expect_table = false;
            if token.is_symbol('(') {
                if !opens_query(tokens, i) {
                    let next = tokens.get(i + 1).map(Token::text).unwrap_or_default();
                    return Err(ValidationError::InvalidJoin(format!("({}", next)));
                }
                levels.push(Level::new(true));
                i += 1;
                continue;
            }
            i = read_table_ref(tokens, i, schema, &mut aliases)?;
            continue;
        }

        if token.is_symbol('(') {
            levels.push(Level::new(opens_query(tokens, i)));
        } else if token.is_symbol(')') {
            if levels.len() > 1 {
                levels.pop();
            }
        } else if levels[top].query {
            let level = &mut levels[top];
            if token.is_keyword("from") && !is_distinct_from(tokens, i) {
                level.in_from = true;
                level.expect_table = true;
            } else if token.is_keyword("join") || token.is_keyword("table") {
                level.expect_table = true;
            } else if level.in_from && token.is_symbol(',') {
                level.expect_table = true;
            } else if is_one_of(token, FROM_END_WORDS) {
                level.in_from = false;
            }
        }
        i += 1;
    }

    Ok(aliases)
}

/// `(` at `i` opens a subquery rather than an expression or a join group.
fn opens_query(tokens: &[Token], i: usize) -> bool {
    tokens.get(i + 1).map_or(false, |t| {
        t.is_keyword("select") || t.is_keyword("with") || t.is_keyword("values") || t.is_keyword("table")
    })
}

/// `IS [NOT] DISTINCT FROM` is a comparison, not a clause.
fn is_distinct_from(tokens: &[Token], i: usize) -> bool {
    i >= 2
        && tokens[i - 1].is_keyword("distinct")
        && (tokens[i - 2].is_keyword("is") || tokens[i - 2].is_keyword("not"))
}

/// Read `name [[AS] alias]` at `start`; returns the index of the next token.
fn read_table_ref(
    tokens: &[Token],
    start: usize,
    schema: &Schema,
    aliases: &mut AliasMap,
) -> std::result::Result<usize, ValidationError> {
    let token = &tokens[start];
    let name = match token.ident() {
        Some(name) if !is_clause_word(token) => name,
        _ => return Err(ValidationError::UnknownTable(token.text())),
    };

    if tokens.get(start + 1).map_or(false, |t| t.is_symbol('.')) {
        let qualified = match tokens.get(start + 2).and_then(Token::ident) {
            Some(part) => format!("{}.{}", name, part),
            None => format!("{}.", name),
        };
        return Err(ValidationError::UnknownTable(qualified));
    }

    let table = schema_table(schema, name)
        .ok_or_else(|| ValidationError::UnknownTable(name.to_string()))?
        .to_string();
    let mut i = start + 1;

    if tokens.get(i).map_or(false, |t| t.is_keyword("as")) {
        i += 1;
    }
    let alias = match tokens.get(i) {
        Some(t) if !is_clause_word(t) => t.ident().map(str::to_string),
        _ => None,
    };
    match alias {
        Some(alias) => {
            aliases.insert(alias, table);
            i += 1;
        }
        None => {
            aliases.insert(name.to_string(), table);
        }
    }
    Ok(i)
}

fn check_columns(tokens: &[Token], aliases: &AliasMap, schema: &Schema) -> Validation {
    for i in 0..tokens.len() {
        let Some((qualifier, column)) = qualified_ref(tokens, i) else {
            continue;
        };
        let table = resolve_alias(aliases, qualifier)?;
        if column != "*" && schema_column(schema, table, column).is_none() {
            return Err(ValidationError::UnknownColumn(format!("{}.{}", table, column)));
        }
    }
    Ok(())
}

fn check_joins(tokens: &[Token], aliases: &AliasMap, schema: &Schema) -> Validation {
    if let Some(keyword) = tokens
        .iter()
        .find(|t| t.is_keyword("natural") || t.is_keyword("cross") || t.is_keyword("using"))
    {
        return Err(ValidationError::InvalidJoin(keyword.text().to_ascii_uppercase()));
    }

    for i in 0..tokens.len() {
        let Some(((left_alias, left_column), (right_alias, right_column))) = column_equality(tokens, i) else {
            continue;
        };

        let left_table = resolve_alias(aliases, left_alias)?;
        let right_table = resolve_alias(aliases, right_alias)?;
        // Normalize column spelling to the catalog's so it lines up with edge text.
        let left = format!(
            "{}.{}",
            left_table,
            schema_column(schema, left_table, left_column).unwrap_or(left_column)
        );
        let right = format!(
            "{}.{}",
            right_table,
            schema_column(schema, right_table, right_column).unwrap_or(right_column)
        );

        let graph = schema.graph();
        let forward = graph
            .edges(left_table, right_table)
            .any(|e| e.join_on.left == left && e.join_on.right == right);
        let reverse = graph
            .edges(right_table, left_table)
            .any(|e| e.join_on.left == right && e.join_on.right == left);
        if !forward && !reverse {
            return Err(ValidationError::InvalidJoin(format!("{} = {}", left, right)));
        }
    }

    check_on_conditions(tokens)
}

/// Every `ON` condition must hold at least one `a.x = b.y` equality.
fn check_on_conditions(tokens: &[Token]) -> Validation {
    for (i, token) in tokens.iter().enumerate() {
        // `DISTINCT ON (…)` is not a join.
        if !token.is_keyword("on") || (i > 0 && tokens[i - 1].is_keyword("distinct")) {
            continue;
        }
        let end = on_condition_end(tokens, i + 1);
        if !(i + 1..end).any(|j| j + 7 <= end && column_equality(tokens, j).is_some()) {
            let condition: Vec<String> = tokens[i..end].iter().map(Token::text).collect();
            return Err(ValidationError::InvalidJoin(condition.join(" ")));
        }
    }
    Ok(())
}

/// Index just past the `ON` condition starting at `start`.
fn on_condition_end(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        if token.is_symbol('(') {
            depth += 1;
        } else if token.is_symbol(')') {
            if depth == 0 {
                return start + offset;
            }
            depth -= 1;
        } else if depth == 0
            && (token.is_symbol(',') || token.is_symbol(';') || is_one_of(token, ON_END_WORDS))
        {
            return start + offset;
        }
    }
    tokens.len()
}

type ColumnRef<'a> = (&'a str, &'a str);

/// `a.x = b.y` starting at `i`, both sides naming a column.
fn column_equality(tokens: &[Token], i: usize) -> Option<(ColumnRef<'_>, ColumnRef<'_>)> {
    let left = qualified_ref(tokens, i)?;
    if !tokens.get(i + 3)?.is_symbol('=') {
        return None;
    }
    let right = qualified_ref(tokens, i + 4)?;
    if left.1 == "*" || right.1 == "*" {
        return None;
    }
    Some((left, right))
}

/// `qualifier . column` (or `qualifier . *`) starting at `i`, not part of a longer dotted chain.
fn qualified_ref(tokens: &[Token], i: usize) -> Option<ColumnRef<'_>> {
    if i > 0 && tokens[i - 1].is_symbol('.') {
        return None;
    }
    let qualifier = tokens.get(i)?.ident()?;
    if !tokens.get(i + 1)?.is_symbol('.') {
        return None;
    }
    let column = match tokens.get(i + 2)? {
        Token::Symbol('*') => "*",
        other => other.ident()?,
    };
    Some((qualifier, column))
}

fn resolve_alias<'a>(aliases: &'a AliasMap, qualifier: &str) -> std::result::Result<&'a str, ValidationError> {
    aliases
        .get(qualifier)
        .or_else(|| {
            aliases
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(qualifier))
                .map(|(_, table)| table)
        })
        .map(String::as_str)
        .ok_or_else(|| ValidationError::UnknownAlias(qualifier.to_string()))
}

fn is_clause_word(token: &Token) -> bool {
    is_one_of(token, CLAUSE_WORDS)
}

fn is_one_of(token: &Token, words: &[&str]) -> bool {
    words.iter().any(|word| token.is_keyword(word))
}

/// Catalog spelling of `name`: exact match first, then case-insensitive.
fn schema_table<'a>(schema: &'a Schema, name: &str) -> Option<&'a str> {
    if let Some((table, _)) = schema.tables().find(|(table, _)| *table == name) {
        return Some(table);
    }
    schema
        .tables()
        .find(|(table, _)| table.eq_ignore_ascii_case(name))
        .map(|(table, _)| table)
}

fn schema_column<'a>(schema: &'a Schema, table: &str, name: &str) -> Option<&'a str> {
    let columns = schema.columns(table)?;
    columns
        .iter()
        .find(|c| *c == name)
        .or_else(|| columns.iter().find(|c| c.eq_ignore_ascii_case(name)))
        .map(String::as_str)
}
