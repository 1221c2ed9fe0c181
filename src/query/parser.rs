//! Recursive-descent parser for the restricted dialect.
//!
//! ```sql
//! SELECT * FROM t1 AS a, t2 AS b [WHERE cond [AND cond]*] [;]
//! ```
//!
//! Conditions are either joins (`a.x <op> b.y [± k]`) or filters
//! (`a.x <op> literal`). Join conditions over the same column pair are
//! intersected into one band constraint at parse time.

use crate::constraint::{Bound, JoinConstraint};
use crate::error::ObliviousJoinError;
use crate::query::filter::{FilterOp, FilterPredicate};
use crate::query::tokenizer::{Token, TokenKind, tokenize};
use tracing::debug;

/// A table reference from the FROM clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    /// Real table name (the CSV stem).
    pub name: String,
    /// Alias every qualified column refers to.
    pub alias: String,
}

/// Structured result of parsing one query.
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    pub select: Vec<String>,
    pub tables: Vec<TableRef>,
    pub joins: Vec<JoinConstraint>,
    pub filters: Vec<FilterPredicate>,
}

impl ParsedQuery {
    pub fn alias(&self, alias: &str) -> Option<&TableRef> {
        self.tables.iter().find(|t| t.alias == alias)
    }
}

pub fn parse(sql: &str) -> Result<ParsedQuery, ObliviousJoinError> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.parse_query()?;
    debug!(
        tables = query.tables.len(),
        joins = query.joins.len(),
        filters = query.filters.len(),
        "query parsed"
    );
    Ok(query)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn matches(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ObliviousJoinError> {
        if self.matches(kind) {
            Ok(self.advance())
        } else {
            Err(ObliviousJoinError::parse(
                self.current().position,
                format!("expected {what}, got '{}'", self.current().text),
            ))
        }
    }

    fn parse_query(&mut self) -> Result<ParsedQuery, ObliviousJoinError> {
        let mut query = ParsedQuery::default();

        self.expect(TokenKind::Select, "SELECT")?;
        self.expect(TokenKind::Star, "'*' (only SELECT * is supported)")?;
        query.select.push("*".to_string());

        self.expect(TokenKind::From, "FROM")?;
        self.parse_from(&mut query)?;

        let mut raw_joins = Vec::new();
        let mut filters = Vec::new();
        if self.matches(TokenKind::Where) {
            self.advance();
            loop {
                self.parse_condition(&query, &mut raw_joins, &mut filters)?;
                if self.matches(TokenKind::And) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        query.filters = filters;

        if self.matches(TokenKind::Semicolon) {
            self.advance();
        }
        if !self.matches(TokenKind::Eof) {
            return Err(ObliviousJoinError::parse(
                self.current().position,
                format!("trailing input: '{}'", self.current().text),
            ));
        }

        query.joins = merge_by_pair(raw_joins)?;
        Ok(query)
    }

    fn parse_from(&mut self, query: &mut ParsedQuery) -> Result<(), ObliviousJoinError> {
        loop {
            let name = self.expect(TokenKind::Identifier, "table name")?;
            self.expect(TokenKind::As, "AS (every table needs an alias)")?;
            let alias = self.expect(TokenKind::Identifier, "alias")?;
            if query.alias(&alias.text).is_some() {
                return Err(ObliviousJoinError::parse(
                    alias.position,
                    format!("duplicate alias '{}'", alias.text),
                ));
            }
            query.tables.push(TableRef {
                name: name.text,
                alias: alias.text,
            });
            if self.matches(TokenKind::Comma) {
                self.advance();
            } else {
                return Ok(());
            }
        }
    }

    /// `alias.column` with alias validation.
    fn parse_qualified(&mut self, query: &ParsedQuery) -> Result<(String, String), ObliviousJoinError> {
        let alias = self.expect(TokenKind::Identifier, "alias")?;
        self.expect(TokenKind::Dot, "'.'")?;
        let column = self.expect(TokenKind::Identifier, "column name")?;
        if query.alias(&alias.text).is_none() {
            return Err(ObliviousJoinError::UnsupportedPredicate(format!(
                "unknown alias '{}' (position {})",
                alias.text, alias.position
            )));
        }
        Ok((alias.text, column.text))
    }

    /// Optionally signed integer literal.
    fn parse_literal(&mut self) -> Result<i64, ObliviousJoinError> {
        let negative = if self.matches(TokenKind::Minus) {
            self.advance();
            true
        } else {
            if self.matches(TokenKind::Plus) {
                self.advance();
            }
            false
        };
        let tok = self.expect(TokenKind::Number, "integer literal")?;
        let value: i64 = tok.text.parse().map_err(|_| {
            ObliviousJoinError::parse(tok.position, format!("integer out of range: '{}'", tok.text))
        })?;
        Ok(if negative { -value } else { value })
    }

    fn parse_condition(
        &mut self,
        query: &ParsedQuery,
        joins: &mut Vec<JoinConstraint>,
        filters: &mut Vec<FilterPredicate>,
    ) -> Result<(), ObliviousJoinError> {
        let (left_alias, left_column) = self.parse_qualified(query)?;

        let op_tok = self.advance();
        let op = match op_tok.kind {
            TokenKind::Eq => TokenKind::Eq,
            TokenKind::Ne => TokenKind::Ne,
            TokenKind::Ge => TokenKind::Ge,
            TokenKind::Gt => TokenKind::Gt,
            TokenKind::Le => TokenKind::Le,
            TokenKind::Lt => TokenKind::Lt,
            _ => {
                return Err(ObliviousJoinError::parse(
                    op_tok.position,
                    format!("expected comparison operator, got '{}'", op_tok.text),
                ));
            }
        };

        if self.matches(TokenKind::Identifier) {
            // Join condition: alias.col <op> alias.col [± k].
            let (right_alias, right_column) = self.parse_qualified(query)?;
            let deviation = if self.matches(TokenKind::Plus) || self.matches(TokenKind::Minus) {
                let negative = self.advance().kind == TokenKind::Minus;
                let value = self.parse_literal()?;
                if negative { -value } else { value }
            } else {
                0
            };

            if left_alias == right_alias {
                return Err(ObliviousJoinError::UnsupportedPredicate(format!(
                    "self-comparison on alias '{left_alias}' is not a join"
                )));
            }
            joins.push(join_constraint(
                left_alias,
                left_column,
                right_alias,
                right_column,
                op,
                deviation,
                op_tok.position,
            )?);
        } else {
            // Filter condition: alias.col <op> literal.
            let value = self.parse_literal()?;
            let op = match op {
                TokenKind::Eq => FilterOp::Eq,
                TokenKind::Ne => FilterOp::Ne,
                TokenKind::Ge => FilterOp::Ge,
                TokenKind::Gt => FilterOp::Gt,
                TokenKind::Le => FilterOp::Le,
                TokenKind::Lt => FilterOp::Lt,
                _ => unreachable!(),
            };
            filters.push(FilterPredicate {
                alias: left_alias,
                column: left_column,
                op,
                value,
            });
        }
        Ok(())
    }
}

/// One-sided constraint from a comparison: `left <op> right + d`.
fn join_constraint(
    left_alias: String,
    left_column: String,
    right_alias: String,
    right_column: String,
    op: TokenKind,
    deviation: i64,
    position: usize,
) -> Result<JoinConstraint, ObliviousJoinError> {
    let (lower, upper) = match op {
        TokenKind::Eq => (Bound::closed(deviation), Bound::closed(deviation)),
        TokenKind::Ge => (Bound::closed(deviation), Bound::pos_inf()),
        TokenKind::Gt => (Bound::open(deviation), Bound::pos_inf()),
        TokenKind::Le => (Bound::neg_inf(), Bound::closed(deviation)),
        TokenKind::Lt => (Bound::neg_inf(), Bound::open(deviation)),
        TokenKind::Ne => {
            return Err(ObliviousJoinError::UnsupportedPredicate(format!(
                "'!=' join between {left_alias}.{left_column} and \
                 {right_alias}.{right_column} (position {position})"
            )));
        }
        _ => unreachable!(),
    };
    Ok(JoinConstraint::new(
        left_alias,
        left_column,
        right_alias,
        right_column,
        lower,
        upper,
    ))
}

/// Normalize orientation and intersect constraints per column pair.
///
/// `a.x >= b.y` and `b.y <= a.x + 5` describe the same pair from opposite
/// sides; canonicalizing by lexicographic (alias, column) order before
/// grouping lets them merge into one edge instead of fabricating a cycle.
fn merge_by_pair(
    raw: Vec<JoinConstraint>,
) -> Result<Vec<JoinConstraint>, ObliviousJoinError> {
    let mut merged: Vec<JoinConstraint> = Vec::new();
    for c in raw {
        let canonical = if (c.source_table.as_str(), c.source_column.as_str())
            <= (c.target_table.as_str(), c.target_column.as_str())
        {
            c
        } else {
            c.reverse()
        };
        match merged.iter_mut().find(|m| m.same_pair(&canonical)) {
            Some(existing) => *existing = existing.intersect(&canonical)?,
            None => merged.push(canonical),
        }
    }
    Ok(merged)
}
