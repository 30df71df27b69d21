//! The chainable query builder and the immutable plan it compiles to.
//!
//! ```ignore
//! use pgchain::{from, OrderOptions, SelectOptions};
//!
//! // Rows plus a total count, newest first, second page of 20.
//! let resp = from("products")
//!     .select_with("*, product_metadata(*)", SelectOptions::exact_count())
//!     .eq("status", "live")
//!     .or("title.ilike.%widget%,sku.eq.W-1")
//!     .order_with("created_at", OrderOptions::desc())
//!     .range(20, 39)
//!     .execute(&client)
//!     .await;
//!
//! // Insert a single object: `data` is the inserted row, not an array.
//! let resp = from("products")
//!     .insert(json!({"title": "Widget"}))
//!     .execute(&client)
//!     .await;
//! ```
//!
//! Every shaping call consumes and returns the builder. Mistakes that only
//! show up while chaining (invalid payloads, two write operations) are
//! recorded and reported by [`QueryBuilder::build`].

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::exec::Executor;
use crate::filter::{self, CmpOp, FilterOp};
use crate::ident::validate_ident;
use crate::response::Response;
use crate::select::{self, JoinSpec, SelectSpec};
use crate::sql::Sql;
use serde::Serialize;
use serde_json::{Map, Value};

/// Start a chain against `table`.
pub fn from(table: &str) -> QueryBuilder {
    QueryBuilder::new(table)
}

/// The statement kind a chain compiles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Upsert => "upsert",
        }
    }

    pub fn is_write(self) -> bool {
        !matches!(self, Operation::Select)
    }
}

/// How returned rows are shaped into `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowMode {
    /// All rows (or a bare object for a single-object insert).
    #[default]
    Many,
    /// Exactly one row expected; zero rows is a `no-rows` error.
    Single,
    /// Zero or one row; zero rows is `data = None`.
    MaybeSingle,
}

/// Row counting strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    /// `COUNT(*)` over the filtered table, ignoring pagination.
    Exact,
}

/// Options for [`QueryBuilder::select_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectOptions {
    pub count: Option<Count>,
    /// Return no rows, only the count.
    pub head: bool,
}

impl SelectOptions {
    /// Return rows and an exact total count.
    pub fn exact_count() -> Self {
        Self {
            count: Some(Count::Exact),
            head: false,
        }
    }

    /// Return only an exact total count.
    pub fn head_count() -> Self {
        Self {
            count: Some(Count::Exact),
            head: true,
        }
    }
}

/// Options for [`QueryBuilder::order_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderOptions {
    pub ascending: bool,
    /// `Some(true)` for `NULLS FIRST`, `Some(false)` for `NULLS LAST`.
    pub nulls_first: Option<bool>,
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self {
            ascending: true,
            nulls_first: None,
        }
    }
}

impl OrderOptions {
    pub fn asc() -> Self {
        Self::default()
    }

    pub fn desc() -> Self {
        Self {
            ascending: false,
            nulls_first: None,
        }
    }

    pub fn nulls_first(mut self, first: bool) -> Self {
        self.nulls_first = Some(first);
        self
    }
}

/// Shape of a write payload as the caller passed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// A single JSON object.
    Object,
    /// A JSON array of objects.
    Array,
}

#[derive(Debug)]
struct Payload {
    shape: InputShape,
    rows: Vec<Map<String, Value>>,
}

/// Chainable builder for one statement against one table.
#[derive(Debug)]
pub struct QueryBuilder {
    table: String,
    operation: Option<Operation>,
    select: Option<String>,
    options: SelectOptions,
    filters: Vec<FilterOp>,
    order: Vec<(String, OrderOptions)>,
    limit: Option<u64>,
    range: Option<(u64, u64)>,
    mode: RowMode,
    payload: Option<Payload>,
    on_conflict: Option<String>,
    build_error: Option<OrmError>,
}

impl QueryBuilder {
    /// Create a new builder for `table`.
    ///
    /// The name is validated by [`QueryBuilder::build`].
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            operation: None,
            select: None,
            options: SelectOptions::default(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            range: None,
            mode: RowMode::Many,
            payload: None,
            on_conflict: None,
            build_error: None,
        }
    }

    fn fail(&mut self, err: OrmError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }

    // ==================== Operation ====================

    /// Select columns and embedded relations.
    ///
    /// After a write operation this chooses the returned columns instead.
    pub fn select(self, columns: &str) -> Self {
        self.select_with(columns, SelectOptions::default())
    }

    /// Select with count/head options.
    pub fn select_with(mut self, columns: &str, options: SelectOptions) -> Self {
        match self.operation {
            None | Some(Operation::Select) => {
                self.operation = Some(Operation::Select);
                self.options = options;
            }
            Some(_) => {
                if options != SelectOptions::default() {
                    self.fail(OrmError::misuse(
                        "count/head options only apply to select queries",
                    ));
                }
            }
        }
        self.select = Some(columns.to_string());
        self
    }

    /// Insert one object or an array of objects.
    pub fn insert<T: Serialize>(mut self, rows: T) -> Self {
        self.set_write(Operation::Insert, rows);
        self
    }

    /// Update matching rows with the columns of `partial`.
    pub fn update<T: Serialize>(mut self, partial: T) -> Self {
        self.set_write(Operation::Update, partial);
        if let Some(payload) = &self.payload
            && payload.shape == InputShape::Array
        {
            self.fail(OrmError::validation("update() expects a single object"));
        }
        self
    }

    /// Delete matching rows.
    pub fn delete(mut self) -> Self {
        if self.claim_operation(Operation::Delete) {
            self.operation = Some(Operation::Delete);
        }
        self
    }

    /// Insert rows, updating on conflict with the [`on_conflict`](Self::on_conflict)
    /// target (default `id`).
    pub fn upsert<T: Serialize>(mut self, rows: T) -> Self {
        self.set_write(Operation::Upsert, rows);
        self
    }

    /// Conflict target for [`upsert`](Self::upsert): one column or a
    /// comma-separated list.
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    fn claim_operation(&mut self, op: Operation) -> bool {
        match self.operation {
            None => true,
            Some(Operation::Select) => {
                self.fail(OrmError::misuse(format!(
                    "{}() cannot follow select(); call select() after the write to choose returned columns",
                    op.as_str()
                )));
                false
            }
            Some(existing) => {
                self.fail(OrmError::misuse(format!(
                    "{}() cannot follow {}() on the same builder",
                    op.as_str(),
                    existing.as_str()
                )));
                false
            }
        }
    }

    fn set_write<T: Serialize>(&mut self, op: Operation, rows: T) {
        if !self.claim_operation(op) {
            return;
        }
        self.operation = Some(op);
        match to_payload(rows) {
            Ok(payload) => self.payload = Some(payload),
            Err(e) => self.fail(e),
        }
    }

    // ==================== Filters ====================

    fn cmp(mut self, op: CmpOp, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FilterOp::Cmp {
            op,
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Filter: column = value
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Eq, column, value)
    }

    /// Filter: column != value
    pub fn neq(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Neq, column, value)
    }

    /// Filter: column > value
    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Gt, column, value)
    }

    /// Filter: column >= value
    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Gte, column, value)
    }

    /// Filter: column < value
    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Lt, column, value)
    }

    /// Filter: column <= value
    pub fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Lte, column, value)
    }

    /// Filter: column LIKE pattern
    pub fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Like, column, pattern)
    }

    /// Filter: column ILIKE pattern (the caller supplies `%` wildcards)
    pub fn ilike(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.cmp(CmpOp::Ilike, column, pattern)
    }

    /// Filter: column IS NULL / TRUE / FALSE
    pub fn is(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(FilterOp::Is {
            column: column.to_string(),
            value: value.into(),
        });
        self
    }

    /// Filter: column IN (values...). An empty list matches no rows.
    pub fn in_<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.filters.push(FilterOp::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Filter with a compact or-expression: `col.op.value,col.op.value`.
    pub fn or(mut self, expression: &str) -> Self {
        self.filters.push(FilterOp::Or {
            expression: expression.to_string(),
        });
        self
    }

    /// One equality filter per `(column, value)` pair.
    pub fn match_eq<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (column, value) in pairs {
            self = self.eq(column.as_ref(), value);
        }
        self
    }

    // ==================== Ordering and pagination ====================

    /// Append an ascending sort key. The first key is the primary sort.
    pub fn order(self, column: &str) -> Self {
        self.order_with(column, OrderOptions::default())
    }

    /// Append a sort key with explicit direction.
    pub fn order_with(mut self, column: &str, options: OrderOptions) -> Self {
        self.order.push((column.to_string(), options));
        self
    }

    /// Return at most `n` rows.
    pub fn limit(mut self, n: u64) -> Self {
        if n > MAX_ROW_BOUND {
            self.fail(OrmError::validation(format!(
                "limit({n}): must not exceed {MAX_ROW_BOUND}"
            )));
        }
        self.limit = Some(n);
        self
    }

    /// Return rows `from..=to` (zero-based). Takes precedence over `limit`.
    ///
    /// Both bounds must fit a PostgreSQL `bigint`.
    pub fn range(mut self, from: u64, to: u64) -> Self {
        if to < from {
            self.fail(OrmError::validation(format!(
                "range({from}, {to}): `to` must not be less than `from`"
            )));
        } else if to >= MAX_ROW_BOUND {
            self.fail(OrmError::validation(format!(
                "range({from}, {to}): `to` must be less than {MAX_ROW_BOUND}"
            )));
        }
        self.range = Some((from, to));
        self
    }

    // ==================== Row mode ====================

    /// Expect exactly one row.
    pub fn single(mut self) -> Self {
        self.mode = RowMode::Single;
        self
    }

    /// Expect zero or one row.
    pub fn maybe_single(mut self) -> Self {
        self.mode = RowMode::MaybeSingle;
        self
    }

    // ==================== Terminals ====================

    /// Compile the chain into an immutable plan.
    pub fn build(self) -> OrmResult<QueryPlan> {
        if let Some(err) = self.build_error {
            return Err(err);
        }
        let table = validate_ident(&self.table)?.to_string();
        let operation = self.operation.unwrap_or(Operation::Select);
        let select = select::parse(self.select.as_deref().unwrap_or("*"))?;

        let mut where_sql = Sql::empty();
        filter::push_where(&mut where_sql, &table, &self.filters)?;

        let mut plan = QueryPlan {
            table,
            operation,
            select,
            statement: None,
            count_statement: None,
            mode: self.mode,
            input: None,
            has_filters: !self.filters.is_empty(),
        };

        match operation {
            Operation::Select => {
                if self.options.count == Some(Count::Exact) {
                    let mut count = Sql::new("SELECT COUNT(*) AS \"count\" FROM ");
                    count.push_ident(&plan.table)?;
                    count.push_sql(where_sql.clone());
                    plan.count_statement = Some(count);
                }
                if !self.options.head {
                    let mut q = Sql::new("SELECT ");
                    q.push(&plan.select.render_columns(&plan.table)?);
                    q.push(" FROM ");
                    q.push_ident(&plan.table)?;
                    q.push_sql(where_sql);
                    push_order(&mut q, &plan.table, &self.order)?;
                    push_pagination(&mut q, self.limit, self.range);
                    plan.statement = Some(q);
                }
            }
            Operation::Insert | Operation::Upsert => {
                let payload = self
                    .payload
                    .ok_or_else(|| OrmError::validation("insert payload missing"))?;
                plan.input = Some(payload.shape);
                if !payload.rows.is_empty() {
                    let returning = returning_list(&plan, self.select.is_some())?;
                    let conflict = (operation == Operation::Upsert)
                        .then(|| self.on_conflict.as_deref().unwrap_or("id"));
                    plan.statement = Some(insert_sql(
                        &plan.table,
                        &payload.rows,
                        conflict,
                        &returning,
                    )?);
                }
            }
            Operation::Update => {
                let payload = self
                    .payload
                    .ok_or_else(|| OrmError::validation("update payload missing"))?;
                let set = payload.rows.into_iter().next().unwrap_or_default();
                if set.is_empty() {
                    return Err(OrmError::validation(
                        "update() requires at least one column to set",
                    ));
                }
                let mut q = Sql::new("UPDATE ");
                q.push_ident(&plan.table)?;
                q.push(" SET ");
                for (i, (column, value)) in set.into_iter().enumerate() {
                    if i > 0 {
                        q.push(", ");
                    }
                    q.push_ident(&column)?;
                    q.push(" = ").push_bind(value);
                }
                q.push_sql(where_sql);
                q.push(" RETURNING ");
                q.push(&returning_list(&plan, self.select.is_some())?);
                plan.statement = Some(q);
            }
            Operation::Delete => {
                let mut q = Sql::new("DELETE FROM ");
                q.push_ident(&plan.table)?;
                q.push_sql(where_sql);
                q.push(" RETURNING ");
                q.push(&returning_list(&plan, self.select.is_some())?);
                plan.statement = Some(q);
            }
        }

        Ok(plan)
    }

    /// Build and run with the default [`ExecConfig`](crate::ExecConfig).
    ///
    /// Never fails: build errors are returned inside the [`Response`].
    pub async fn execute<C: GenericClient>(self, conn: &C) -> Response {
        match self.build() {
            Ok(plan) => plan.execute(conn).await,
            Err(e) => Response::err(e),
        }
    }
}

fn to_payload<T: Serialize>(rows: T) -> OrmResult<Payload> {
    match serde_json::to_value(rows)? {
        Value::Object(row) => Ok(Payload {
            shape: InputShape::Object,
            rows: vec![row],
        }),
        Value::Array(items) => {
            let rows = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(OrmError::validation(format!(
                        "write payload rows must be objects, got {other}"
                    ))),
                })
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Payload {
                shape: InputShape::Array,
                rows,
            })
        }
        other => Err(OrmError::validation(format!(
            "write payload must be an object or an array of objects, got {other}"
        ))),
    }
}

fn returning_list(plan: &QueryPlan, explicit: bool) -> OrmResult<String> {
    if explicit {
        plan.select.render_columns(&plan.table)
    } else {
        Ok("*".to_string())
    }
}

fn push_order(q: &mut Sql, table: &str, order: &[(String, OrderOptions)]) -> OrmResult<()> {
    for (i, (column, options)) in order.iter().enumerate() {
        q.push(if i == 0 { " ORDER BY " } else { ", " });
        q.push_qualified(table, column)?;
        q.push(if options.ascending { " ASC" } else { " DESC" });
        match options.nulls_first {
            Some(true) => {
                q.push(" NULLS FIRST");
            }
            Some(false) => {
                q.push(" NULLS LAST");
            }
            None => {}
        }
    }
    Ok(())
}

/// Largest LIMIT/OFFSET the server accepts.
const MAX_ROW_BOUND: u64 = i64::MAX as u64;

fn push_pagination(q: &mut Sql, limit: Option<u64>, range: Option<(u64, u64)>) {
    match (range, limit) {
        (Some((from, to)), _) => {
            let count = (to - from).saturating_add(1);
            q.push(&format!(" LIMIT {count} OFFSET {from}"));
        }
        (None, Some(n)) => {
            q.push(&format!(" LIMIT {n}"));
        }
        (None, None) => {}
    }
}

/// Ordered union of keys across all rows.
fn column_union(rows: &[Map<String, Value>]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }
    columns
}

fn insert_sql(
    table: &str,
    rows: &[Map<String, Value>],
    conflict: Option<&str>,
    returning: &str,
) -> OrmResult<Sql> {
    let columns = column_union(rows);

    let mut q = Sql::new("INSERT INTO ");
    q.push_ident(table)?;

    if columns.is_empty() {
        if rows.len() > 1 {
            return Err(OrmError::validation(
                "cannot insert several rows that have no columns",
            ));
        }
        q.push(" DEFAULT VALUES");
    } else {
        q.push(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                q.push(", ");
            }
            q.push_ident(column)?;
        }
        q.push(") VALUES ");
        for (r, row) in rows.iter().enumerate() {
            if r > 0 {
                q.push(", ");
            }
            q.push("(");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    q.push(", ");
                }
                // Rows missing a key bind NULL so every tuple has the same arity.
                q.push_bind(row.get(*column).cloned().unwrap_or(Value::Null));
            }
            q.push(")");
        }
    }

    if let Some(conflict) = conflict {
        let targets: Vec<&str> = conflict
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if targets.is_empty() {
            return Err(OrmError::validation("on_conflict() needs at least one column"));
        }
        q.push(" ON CONFLICT (");
        for (i, target) in targets.iter().enumerate() {
            if i > 0 {
                q.push(", ");
            }
            q.push_ident(target)?;
        }
        q.push(")");

        let updates: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !targets.contains(c))
            .collect();
        if updates.is_empty() {
            q.push(" DO NOTHING");
        } else {
            q.push(" DO UPDATE SET ");
            for (i, column) in updates.iter().enumerate() {
                if i > 0 {
                    q.push(", ");
                }
                q.push_ident(column)?;
                q.push(" = EXCLUDED.");
                q.push_ident(column)?;
            }
        }
    }

    q.push(" RETURNING ");
    q.push(returning);
    Ok(q)
}

/// An immutable, compiled chain.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    table: String,
    operation: Operation,
    select: SelectSpec,
    statement: Option<Sql>,
    count_statement: Option<Sql>,
    mode: RowMode,
    input: Option<InputShape>,
    has_filters: bool,
}

impl QueryPlan {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn mode(&self) -> RowMode {
        self.mode
    }

    /// Shape of the write payload, for insert and upsert.
    pub fn input_shape(&self) -> Option<InputShape> {
        self.input
    }

    /// Embedded relations to resolve on returned rows.
    pub fn relations(&self) -> &[JoinSpec] {
        &self.select.relations
    }

    pub fn has_filters(&self) -> bool {
        self.has_filters
    }

    /// The main statement. `None` for head-only selects and empty inserts.
    pub fn statement(&self) -> Option<&Sql> {
        self.statement.as_ref()
    }

    /// The `COUNT(*)` statement, when an exact count was requested.
    pub fn count_statement(&self) -> Option<&Sql> {
        self.count_statement.as_ref()
    }

    /// Main statement with `$n` placeholders (empty if there is none).
    pub fn to_sql(&self) -> String {
        self.statement.as_ref().map(Sql::to_sql).unwrap_or_default()
    }

    /// Main statement with parameters inlined as literals, for logs only.
    pub fn to_inline_sql(&self) -> String {
        self.statement
            .as_ref()
            .map(Sql::to_inline_sql)
            .unwrap_or_default()
    }

    /// Run the plan with the default [`ExecConfig`](crate::ExecConfig).
    pub async fn execute<C: GenericClient>(&self, conn: &C) -> Response {
        Executor::new(conn).run(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sql(b: QueryBuilder) -> String {
        b.build().unwrap().to_sql()
    }

    #[test]
    fn select_star_is_table_qualified() {
        assert_eq!(sql(from("products")), r#"SELECT "products".* FROM "products""#);
        assert_eq!(
            sql(from("products").select("*")),
            r#"SELECT "products".* FROM "products""#
        );
    }

    #[test]
    fn select_with_filters_order_and_limit() {
        let q = from("products")
            .select("id, title")
            .eq("status", "live")
            .gt("price", 10)
            .order_with("created_at", OrderOptions::desc())
            .order("id")
            .limit(5);
        assert_eq!(
            sql(q),
            r#"SELECT "products"."id", "products"."title" FROM "products" WHERE "products"."status" = $1 AND "products"."price" > $2 ORDER BY "products"."created_at" DESC, "products"."id" ASC LIMIT 5"#
        );
    }

    #[test]
    fn range_wins_over_limit() {
        let q = from("t").limit(3).range(10, 19);
        assert_eq!(sql(q), r#"SELECT "t".* FROM "t" LIMIT 10 OFFSET 10"#);
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(matches!(
            from("t").range(5, 4).build(),
            Err(OrmError::Validation(_))
        ));
    }

    #[test]
    fn out_of_range_bounds_are_rejected() {
        assert!(matches!(
            from("t").range(0, u64::MAX).build(),
            Err(OrmError::Validation(_))
        ));
        assert!(matches!(
            from("t").range(0, i64::MAX as u64).build(),
            Err(OrmError::Validation(_))
        ));
        assert!(matches!(
            from("t").limit(u64::MAX).build(),
            Err(OrmError::Validation(_))
        ));

        let q = from("t").range(0, i64::MAX as u64 - 1);
        assert_eq!(
            sql(q),
            format!(r#"SELECT "t".* FROM "t" LIMIT {} OFFSET 0"#, i64::MAX)
        );
    }

    #[test]
    fn nulls_ordering() {
        let q = from("t").order_with("rank", OrderOptions::desc().nulls_first(false));
        assert_eq!(
            sql(q),
            r#"SELECT "t".* FROM "t" ORDER BY "t"."rank" DESC NULLS LAST"#
        );
    }

    #[test]
    fn embeds_do_not_change_base_columns() {
        let plan = from("products")
            .select("*, product_metadata(*)")
            .build()
            .unwrap();
        assert_eq!(plan.to_sql(), r#"SELECT "products".* FROM "products""#);
        assert_eq!(plan.relations().len(), 1);
        assert_eq!(plan.relations()[0].table, "product_metadata");
    }

    #[test]
    fn head_count_has_only_count_statement() {
        let plan = from("orders")
            .select_with("*", SelectOptions::head_count())
            .eq("user_id", 7)
            .build()
            .unwrap();
        assert!(plan.statement().is_none());
        assert_eq!(
            plan.count_statement().unwrap().to_sql(),
            r#"SELECT COUNT(*) AS "count" FROM "orders" WHERE "orders"."user_id" = $1"#
        );
    }

    #[test]
    fn exact_count_keeps_rows_and_ignores_pagination() {
        let plan = from("orders")
            .select_with("id", SelectOptions::exact_count())
            .range(0, 9)
            .build()
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"SELECT "orders"."id" FROM "orders" LIMIT 10 OFFSET 0"#
        );
        assert_eq!(
            plan.count_statement().unwrap().to_sql(),
            r#"SELECT COUNT(*) AS "count" FROM "orders""#
        );
    }

    #[test]
    fn heterogeneous_insert_fills_nulls() {
        let plan = from("t")
            .insert(json!([{"a": 1}, {"b": 2}]))
            .build()
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"INSERT INTO "t" ("a", "b") VALUES ($1, $2), ($3, $4) RETURNING *"#
        );
        assert_eq!(
            plan.to_inline_sql(),
            r#"INSERT INTO "t" ("a", "b") VALUES (1, NULL), (NULL, 2) RETURNING *"#
        );
        assert_eq!(plan.input_shape(), Some(InputShape::Array));
    }

    #[test]
    fn insert_object_records_shape() {
        let plan = from("t").insert(json!({"a": 1})).build().unwrap();
        assert_eq!(plan.input_shape(), Some(InputShape::Object));
        assert_eq!(
            plan.to_sql(),
            r#"INSERT INTO "t" ("a") VALUES ($1) RETURNING *"#
        );
    }

    #[test]
    fn insert_serializes_structs() {
        #[derive(Serialize)]
        struct NewProduct<'a> {
            title: &'a str,
            price_cents: i64,
        }
        let plan = from("products")
            .insert(NewProduct {
                title: "Widget",
                price_cents: 999,
            })
            .build()
            .unwrap();
        assert_eq!(
            plan.to_inline_sql(),
            r#"INSERT INTO "products" ("title", "price_cents") VALUES ('Widget', 999) RETURNING *"#
        );
    }

    #[test]
    fn empty_object_insert_uses_default_values() {
        let plan = from("t").insert(json!({})).build().unwrap();
        assert_eq!(plan.to_sql(), r#"INSERT INTO "t" DEFAULT VALUES RETURNING *"#);
    }

    #[test]
    fn empty_array_insert_has_no_statement() {
        let plan = from("t").insert(json!([])).build().unwrap();
        assert!(plan.statement().is_none());
    }

    #[test]
    fn insert_rejects_scalars() {
        assert!(matches!(
            from("t").insert(json!(5)).build(),
            Err(OrmError::Validation(_))
        ));
        assert!(matches!(
            from("t").insert(json!([{"a": 1}, 2])).build(),
            Err(OrmError::Validation(_))
        ));
    }

    #[test]
    fn upsert_defaults_to_id_conflict() {
        let plan = from("t")
            .upsert(json!({"id": 1, "title": "x", "price": 2}))
            .build()
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"INSERT INTO "t" ("id", "title", "price") VALUES ($1, $2, $3) ON CONFLICT ("id") DO UPDATE SET "title" = EXCLUDED."title", "price" = EXCLUDED."price" RETURNING *"#
        );
    }

    #[test]
    fn upsert_with_explicit_and_composite_targets() {
        let plan = from("enrollments")
            .upsert(json!([{"user_id": 1, "course_id": 2, "progress": 10}]))
            .on_conflict("user_id, course_id")
            .build()
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"INSERT INTO "enrollments" ("user_id", "course_id", "progress") VALUES ($1, $2, $3) ON CONFLICT ("user_id", "course_id") DO UPDATE SET "progress" = EXCLUDED."progress" RETURNING *"#
        );
    }

    #[test]
    fn upsert_with_only_conflict_column_does_nothing() {
        let plan = from("t").upsert(json!({"id": 1})).build().unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"INSERT INTO "t" ("id") VALUES ($1) ON CONFLICT ("id") DO NOTHING RETURNING *"#
        );
    }

    #[test]
    fn update_binds_set_before_where() {
        let plan = from("products")
            .update(json!({"title": "New", "price": 5}))
            .eq("id", 3)
            .build()
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"UPDATE "products" SET "title" = $1, "price" = $2 WHERE "products"."id" = $3 RETURNING *"#
        );
        assert!(plan.has_filters());
    }

    #[test]
    fn update_requires_columns() {
        assert!(matches!(
            from("t").update(json!({})).eq("id", 1).build(),
            Err(OrmError::Validation(_))
        ));
    }

    #[test]
    fn delete_renders_where_and_returning() {
        let plan = from("carts").delete().eq("user_id", 4).build().unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"DELETE FROM "carts" WHERE "carts"."user_id" = $1 RETURNING *"#
        );
    }

    #[test]
    fn select_after_write_sets_returning() {
        let plan = from("products")
            .insert(json!({"title": "x"}))
            .select("id, title")
            .build()
            .unwrap();
        assert_eq!(
            plan.to_sql(),
            r#"INSERT INTO "products" ("title") VALUES ($1) RETURNING "products"."id", "products"."title""#
        );
        assert_eq!(plan.operation(), Operation::Insert);
    }

    #[test]
    fn conflicting_operations_are_misuse() {
        assert!(matches!(
            from("t").select("*").insert(json!({"a": 1})).build(),
            Err(OrmError::Misuse(_))
        ));
        assert!(matches!(
            from("t").insert(json!({"a": 1})).delete().build(),
            Err(OrmError::Misuse(_))
        ));
        assert!(matches!(
            from("t")
                .update(json!({"a": 1}))
                .select_with("*", SelectOptions::exact_count())
                .build(),
            Err(OrmError::Misuse(_))
        ));
    }

    #[test]
    fn invalid_identifiers_fail_build() {
        assert!(matches!(
            from("products; drop table x").build(),
            Err(OrmError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            from("t").order("a b").build(),
            Err(OrmError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            from("t").insert(json!({"bad col": 1})).build(),
            Err(OrmError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn injection_payload_is_bound_not_inlined() {
        let payload = "x' OR '1'='1'; DROP TABLE products; --";
        let plan = from("products").eq("title", payload).build().unwrap();
        let statement = plan.statement().unwrap();
        assert_eq!(
            statement.to_sql(),
            r#"SELECT "products".* FROM "products" WHERE "products"."title" = $1"#
        );
        assert!(!statement.to_sql().contains("DROP"));
        assert_eq!(statement.params().len(), 1);
        assert_eq!(statement.params()[0].value(), &json!(payload));
    }

    #[test]
    fn match_eq_adds_one_filter_per_pair() {
        let q = from("t").match_eq([("a", json!(1)), ("b", json!("x"))]);
        assert_eq!(
            sql(q),
            r#"SELECT "t".* FROM "t" WHERE "t"."a" = $1 AND "t"."b" = $2"#
        );
    }
}
