//! Select list parsing.
//!
//! A select specification is a comma-separated list of plain columns and
//! embedded relations:
//!
//! ```text
//! id, title, product_metadata(*), seller!owner_id(id, name, tags(*))
//! ```
//!
//! `name(cols)` embeds rows of table `name`; `name!fk(cols)` additionally names
//! the foreign-key column on the base row. Commas inside parentheses (and
//! inside double quotes) never split.

use crate::error::{OrmError, OrmResult};
use crate::ident::{is_simple_ident, validate_ident};
use regex::Regex;
use std::sync::OnceLock;

/// A parsed select specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectSpec {
    /// Plain columns and raw fragments, in the order given.
    pub columns: Vec<String>,
    /// Embedded relations, in the order given.
    pub relations: Vec<JoinSpec>,
}

/// An embedded relation: `table(cols)` or `table!alias(cols)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    /// Related table name.
    pub table: String,
    /// Explicit foreign-key column on the base row.
    pub alias: Option<String>,
    /// Columns (and nested embeds) to fetch from the related table.
    pub columns: SelectSpec,
}

fn relation_re() -> &'static Regex {
    static RELATION_RE: OnceLock<Regex> = OnceLock::new();
    RELATION_RE.get_or_init(|| {
        Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)(?:!([A-Za-z_][A-Za-z0-9_]*))?\s*\((.*)\)$")
            .expect("invalid built-in relation regex")
    })
}

/// Split `s` on commas at parenthesis depth zero and outside double quotes.
///
/// Parts are trimmed; empty parts are dropped.
pub fn split_top_level(s: &str) -> OrmResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut in_quotes = false;
    let mut start = 0;

    for (i, ch) in s.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| OrmError::parse(format!("unbalanced ')' in {s:?}")))?;
            }
            ',' if !in_quotes && depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(OrmError::parse(format!("unclosed '(' in {s:?}")));
    }
    if in_quotes {
        return Err(OrmError::parse(format!("unclosed '\"' in {s:?}")));
    }
    parts.push(s[start..].trim());
    parts.retain(|p| !p.is_empty());
    Ok(parts)
}

/// Parse a select specification into plain columns and embedded relations.
pub fn parse(spec: &str) -> OrmResult<SelectSpec> {
    let mut out = SelectSpec::default();
    for part in split_top_level(spec)? {
        match relation_re().captures(part) {
            Some(caps) => {
                let table = validate_ident(&caps[1])?.to_string();
                let alias = caps.get(2).map(|m| m.as_str().to_string());
                let columns = parse(&caps[3])?;
                out.relations.push(JoinSpec {
                    table,
                    alias,
                    columns,
                });
            }
            None => out.columns.push(part.to_string()),
        }
    }
    Ok(out)
}

impl SelectSpec {
    /// Render the column list qualified by `table`.
    ///
    /// `*` becomes `"table".*` so columns of the base table never collide with
    /// anything added later; simple identifiers become `"table"."col"`; any
    /// other fragment (`col as alias`, `lower(name)`, dotted paths) is kept
    /// verbatim. No plain columns at all means `"table".*`.
    pub fn render_columns(&self, table: &str) -> OrmResult<String> {
        let table = validate_ident(table)?;
        if self.columns.is_empty() {
            return Ok(format!("\"{table}\".*"));
        }
        let rendered: Vec<String> = self
            .columns
            .iter()
            .map(|col| match col.as_str() {
                "*" => format!("\"{table}\".*"),
                c if is_simple_ident(c) => format!("\"{table}\".\"{c}\""),
                c => c.to_string(),
            })
            .collect();
        Ok(rendered.join(", "))
    }
}
