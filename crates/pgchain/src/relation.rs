//! Best-effort resolution of embedded relations.
//!
//! There is no relation metadata: an embed such as `product_metadata(*)` is
//! resolved by guessing foreign-key column names, in this order:
//!
//! 1. `table!alias(...)`: `alias` is the foreign-key column on the base row;
//!    if it is present and not null, fetch the related row by primary key.
//! 2. Forward guesses on the base row: `<singular>_id`, `<plural>_id`, then
//!    [`RelationConfig::extra_forward_guesses`]. The first non-null one is used
//!    to fetch by primary key.
//! 3. Reverse probes on the related table, matching the base row's primary
//!    key: `<base singular>_id`, `<base plural>_id`, then
//!    [`RelationConfig::reverse_fallbacks`] (`user_id` by default). The first
//!    probe that does not fail is used. Exactly one match embeds an object;
//!    zero or several embed an array.
//! 4. Otherwise the embed is `null`.
//!
//! A forward fetch that finds no row embeds `null`.
//!
//! # Limitations
//!
//! Guessing can pick the wrong column when a table has several candidate
//! foreign keys; use the `!alias` form for anything that matters. Reverse
//! probes rely on a failing statement to rule a column out. Inside a
//! transaction the first failed probe aborts the transaction, so only use
//! embeds that resolve by alias or forward guess there.
//!
//! Every fetched row goes through the same steps for its own nested embeds.

use crate::client::{GenericClient, Row};
use crate::config::RelationConfig;
use crate::error::OrmResult;
use crate::exec::Executor;
use crate::select::JoinSpec;
use crate::sql::Sql;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Singular form of a table name: `categories` to `category`, `products` to
/// `product`. Names ending in `ss` are left alone.
pub fn singularize(name: &str) -> String {
    if let Some(stem) = name.strip_suffix("ies")
        && !stem.is_empty()
    {
        return format!("{stem}y");
    }
    for suffix in ["sses", "xes", "ches", "shes"] {
        if let Some(stem) = name.strip_suffix(suffix) {
            return format!("{stem}{}", &suffix[..suffix.len() - 2]);
        }
    }
    if name.ends_with("ss") {
        return name.to_string();
    }
    match name.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

/// Plural form of a table name, computed from its singular form.
pub fn pluralize(name: &str) -> String {
    let singular = singularize(name);
    if let Some(stem) = singular.strip_suffix('y')
        && stem.chars().last().is_some_and(|c| !"aeiou".contains(c))
    {
        return format!("{stem}ies");
    }
    if ["s", "x", "ch", "sh"].iter().any(|s| singular.ends_with(s)) {
        return format!("{singular}es");
    }
    format!("{singular}s")
}

fn push_unique(out: &mut Vec<String>, candidate: String) {
    if !out.contains(&candidate) {
        out.push(candidate);
    }
}

/// Candidate foreign-key columns on the base row pointing at `related`.
pub fn forward_guesses(related: &str, config: &RelationConfig) -> Vec<String> {
    let mut out = Vec::new();
    push_unique(&mut out, format!("{}{}", singularize(related), config.fk_suffix));
    push_unique(&mut out, format!("{}{}", pluralize(related), config.fk_suffix));
    for extra in &config.extra_forward_guesses {
        push_unique(&mut out, extra.clone());
    }
    out
}

/// Candidate columns on the related table pointing back at `base`.
pub fn reverse_guesses(base: &str, config: &RelationConfig) -> Vec<String> {
    let mut out = Vec::new();
    push_unique(&mut out, format!("{}{}", singularize(base), config.fk_suffix));
    push_unique(&mut out, format!("{}{}", pluralize(base), config.fk_suffix));
    for fallback in &config.reverse_fallbacks {
        push_unique(&mut out, fallback.clone());
    }
    out
}

fn non_null<'r>(row: &'r Row, column: &str) -> Option<&'r Value> {
    row.get(column).filter(|v| !v.is_null())
}

/// Resolve every embed in `joins` on every row, in place.
pub async fn resolve_rows<C: GenericClient>(
    exec: &Executor<'_, C>,
    rows: &mut [Row],
    joins: &[JoinSpec],
    base_table: &str,
) -> OrmResult<()> {
    for row in rows.iter_mut() {
        for join in joins {
            resolve(exec, row, join, base_table).await?;
        }
    }
    Ok(())
}

/// Resolve one embed on `row`, storing the result under `row[join.table]`.
pub fn resolve<'a, C: GenericClient>(
    exec: &'a Executor<'_, C>,
    row: &'a mut Row,
    join: &'a JoinSpec,
    base_table: &'a str,
) -> BoxFuture<'a, OrmResult<()>> {
    Box::pin(async move {
        let value = resolve_value(exec, row, join, base_table).await?;
        row.insert(join.table.clone(), value);
        Ok(())
    })
}

async fn resolve_value<C: GenericClient>(
    exec: &Executor<'_, C>,
    row: &Row,
    join: &JoinSpec,
    base_table: &str,
) -> OrmResult<Value> {
    let config = &exec.config().relations;

    if let Some(alias) = &join.alias {
        if let Some(fk) = non_null(row, alias) {
            return fetch_by_key(exec, join, fk.clone()).await;
        }
        tracing::debug!(
            target: "pgchain.relation",
            relation = join.table.as_str(),
            alias = alias.as_str(),
            "alias column missing or null, falling back to guesses"
        );
    }

    for guess in forward_guesses(&join.table, config) {
        if let Some(fk) = non_null(row, &guess) {
            return fetch_by_key(exec, join, fk.clone()).await;
        }
    }

    let Some(own_id) = non_null(row, &config.primary_key) else {
        return Ok(Value::Null);
    };

    let guesses = reverse_guesses(base_table, config);
    for (attempt, column) in guesses.iter().enumerate() {
        match fetch_where(exec, join, column, own_id.clone()).await {
            Ok(mut related) => {
                if attempt > 0 {
                    tracing::warn!(
                        target: "pgchain.relation",
                        relation = join.table.as_str(),
                        base = base_table,
                        column = column.as_str(),
                        probes = attempt + 1,
                        "relation resolved after failed reverse probes"
                    );
                }
                return Ok(if related.len() == 1 {
                    related.pop().map(Value::Object).unwrap_or(Value::Null)
                } else {
                    Value::Array(related.into_iter().map(Value::Object).collect())
                });
            }
            Err(err) => {
                tracing::debug!(
                    target: "pgchain.relation",
                    relation = join.table.as_str(),
                    column = column.as_str(),
                    error = %err,
                    "reverse probe failed"
                );
            }
        }
    }

    Ok(Value::Null)
}

/// Fetch the related row whose primary key is `key`, or `null`.
async fn fetch_by_key<C: GenericClient>(
    exec: &Executor<'_, C>,
    join: &JoinSpec,
    key: Value,
) -> OrmResult<Value> {
    let pk = exec.config().relations.primary_key.clone();
    let mut sql = select_related(join)?;
    sql.push(" WHERE ");
    sql.push_qualified(&join.table, &pk)?.push(" = ").push_bind(key);
    sql.push(" LIMIT 1");

    let mut rows = exec.fetch(&sql).await?;
    resolve_nested(exec, &mut rows, join).await?;
    Ok(rows.into_iter().next().map(Value::Object).unwrap_or(Value::Null))
}

/// Fetch related rows with `column = value`.
async fn fetch_where<C: GenericClient>(
    exec: &Executor<'_, C>,
    join: &JoinSpec,
    column: &str,
    value: Value,
) -> OrmResult<Vec<Row>> {
    let mut sql = select_related(join)?;
    sql.push(" WHERE ");
    sql.push_qualified(&join.table, column)?.push(" = ").push_bind(value);

    let mut rows = exec.fetch(&sql).await?;
    resolve_nested(exec, &mut rows, join).await?;
    Ok(rows)
}

fn select_related(join: &JoinSpec) -> OrmResult<Sql> {
    let mut sql = Sql::new("SELECT ");
    sql.push(&join.columns.render_columns(&join.table)?);
    sql.push(" FROM ");
    sql.push_ident(&join.table)?;
    Ok(sql)
}

async fn resolve_nested<C: GenericClient>(
    exec: &Executor<'_, C>,
    rows: &mut [Row],
    join: &JoinSpec,
) -> OrmResult<()> {
    for row in rows.iter_mut() {
        for nested in &join.columns.relations {
            resolve(exec, row, nested, &join.table).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_forms() {
        assert_eq!(singularize("products"), "product");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("addresses"), "address");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("branches"), "branch");
        assert_eq!(singularize("class"), "class");
        assert_eq!(singularize("product_metadata"), "product_metadata");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(pluralize("products"), "products");
        assert_eq!(pluralize("product"), "products");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("product_metadata"), "product_metadatas");
    }

    #[test]
    fn forward_guess_order() {
        let config = RelationConfig::default();
        assert_eq!(
            forward_guesses("users", &config),
            vec!["user_id", "users_id"]
        );
        let config = config.forward_guess("owner_id");
        assert_eq!(
            forward_guesses("users", &config),
            vec!["user_id", "users_id", "owner_id"]
        );
    }

    #[test]
    fn reverse_guess_order_ends_with_fallbacks() {
        let config = RelationConfig::default();
        assert_eq!(
            reverse_guesses("products", &config),
            vec!["product_id", "products_id", "user_id"]
        );
        // The fallback is not repeated when a convention guess equals it.
        assert_eq!(
            reverse_guesses("users", &config),
            vec!["user_id", "users_id"]
        );
    }

    #[test]
    fn custom_suffix() {
        let config = RelationConfig::default().fk_suffix("Id").reverse_fallbacks(["ownerId"]);
        assert_eq!(
            reverse_guesses("orders", &config),
            vec!["orderId", "ordersId", "ownerId"]
        );
    }
}
