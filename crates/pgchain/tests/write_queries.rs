mod common;

use common::{MockClient, to_rows};
use pgchain::{ErrorCode, ExecConfig, Executor, OrmError, from};
use serde_json::{Value, json};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Collects formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_warnings() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

/// Echo inserted rows back the way `RETURNING *` would, adding ids.
fn echo_inserts() -> MockClient {
    MockClient::new(|sql, params| {
        let Some(start) = sql.find('(') else {
            return Ok(Vec::new());
        };
        let end = sql[start..].find(')').map(|i| start + i).unwrap_or(start);
        let columns: Vec<String> = sql[start + 1..end]
            .split(", ")
            .map(|c| c.trim_matches('"').to_string())
            .collect();
        let rows = params
            .chunks(columns.len().max(1))
            .enumerate()
            .map(|(i, chunk)| {
                let mut row = serde_json::Map::new();
                row.insert("id".into(), json!(i + 1));
                for (c, v) in columns.iter().zip(chunk) {
                    row.insert(c.clone(), v.clone());
                }
                Value::Object(row)
            })
            .collect();
        Ok(to_rows(rows))
    })
}

#[tokio::test]
async fn single_object_insert_returns_bare_object() {
    let client = echo_inserts();

    let resp = from("products").insert(json!({"title": "Widget"})).execute(&client).await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!({"id": 1, "title": "Widget"})));
}

#[tokio::test]
async fn one_element_array_insert_returns_array() {
    let client = echo_inserts();

    let resp = from("products").insert(json!([{"title": "Widget"}])).execute(&client).await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!([{"id": 1, "title": "Widget"}])));
}

#[tokio::test]
async fn heterogeneous_insert_is_one_statement_with_null_fills() {
    let client = echo_inserts();

    let resp = from("t").insert(json!([{"a": 1}, {"b": 2}])).execute(&client).await;

    assert!(resp.is_ok());
    let executed = client.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].sql,
        r#"INSERT INTO "t" ("a", "b") VALUES ($1, $2), ($3, $4) RETURNING *"#
    );
    assert_eq!(
        executed[0].params,
        vec![json!(1), Value::Null, Value::Null, json!(2)]
    );
    assert_eq!(
        resp.data,
        Some(json!([
            {"id": 1, "a": 1, "b": null},
            {"id": 2, "a": null, "b": 2}
        ]))
    );
}

#[tokio::test]
async fn empty_batch_insert_sends_nothing() {
    let client = echo_inserts();

    let resp = from("t").insert(Vec::<Value>::new()).execute(&client).await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!([])));
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn empty_batch_insert_honours_single() {
    let client = echo_inserts();

    let resp = from("t")
        .insert(Vec::<Value>::new())
        .single()
        .execute(&client)
        .await;

    assert_eq!(resp.data, None);
    assert_eq!(resp.error.map(|e| e.code), Some(ErrorCode::NoRows));
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn empty_batch_insert_with_maybe_single_is_null() {
    let client = echo_inserts();

    let resp = from("t")
        .upsert(Vec::<Value>::new())
        .maybe_single()
        .execute(&client)
        .await;

    assert!(resp.is_ok(), "{:?}", resp.error);
    assert_eq!(resp.data, None);
    assert!(client.executed().is_empty());
}

#[tokio::test]
async fn insert_with_single_mode_returns_object() {
    let client = echo_inserts();

    let resp = from("orders")
        .insert(json!([{"total": 10}]))
        .select("id, total")
        .single()
        .execute(&client)
        .await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!({"id": 1, "total": 10})));
    assert_eq!(
        client.statements()[0],
        r#"INSERT INTO "orders" ("total") VALUES ($1) RETURNING "orders"."id", "orders"."total""#
    );
}

#[tokio::test]
async fn upsert_updates_every_non_conflict_column() {
    let client = MockClient::returning(vec![json!({"id": 1, "title": "x", "price": 3})]);

    let resp = from("products")
        .upsert(json!({"id": 1, "title": "x", "price": 3}))
        .execute(&client)
        .await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!({"id": 1, "title": "x", "price": 3})));
    assert_eq!(
        client.statements()[0],
        r#"INSERT INTO "products" ("id", "title", "price") VALUES ($1, $2, $3) ON CONFLICT ("id") DO UPDATE SET "title" = EXCLUDED."title", "price" = EXCLUDED."price" RETURNING *"#
    );
}

#[tokio::test]
async fn update_returns_updated_rows() {
    let client = MockClient::returning(vec![json!({"id": 3, "status": "shipped"})]);

    let resp = from("orders")
        .update(json!({"status": "shipped"}))
        .eq("id", 3)
        .execute(&client)
        .await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!([{"id": 3, "status": "shipped"}])));
    let executed = client.executed();
    assert_eq!(
        executed[0].sql,
        r#"UPDATE "orders" SET "status" = $1 WHERE "orders"."id" = $2 RETURNING *"#
    );
    assert_eq!(executed[0].params, vec![json!("shipped"), json!(3)]);
}

#[tokio::test]
async fn unscoped_delete_still_runs() {
    let client = MockClient::returning(vec![json!({"id": 1}), json!({"id": 2})]);

    let resp = from("sessions").delete().execute(&client).await;

    assert!(resp.is_ok());
    assert_eq!(resp.data, Some(json!([{"id": 1}, {"id": 2}])));
    assert_eq!(client.statements(), vec![r#"DELETE FROM "sessions" RETURNING *"#]);
}

#[tokio::test]
async fn unscoped_update_runs_and_warns() {
    let client = MockClient::returning(vec![json!({"id": 1, "archived": true})]);
    let (logs, _guard) = capture_warnings();

    let plan = from("posts").update(json!({"archived": true})).build().unwrap();
    assert!(!plan.has_filters());
    let resp = Executor::new(&client).run(&plan).await;

    assert!(resp.is_ok(), "{:?}", resp.error);
    assert_eq!(
        client.statements(),
        vec![r#"UPDATE "posts" SET "archived" = $1 RETURNING *"#]
    );
    let logged = logs.contents();
    assert!(logged.contains("UPDATE without filters"), "{logged}");
    assert!(logged.contains("pgchain.exec"), "{logged}");
}

#[tokio::test]
async fn unscoped_write_warning_can_be_disabled() {
    let client = MockClient::returning(vec![]);
    let (logs, _guard) = capture_warnings();

    let plan = from("posts").update(json!({"archived": true})).build().unwrap();
    let config = ExecConfig::new().warn_unscoped_writes(false);
    let resp = Executor::with_config(&client, config).run(&plan).await;

    assert!(resp.is_ok(), "{:?}", resp.error);
    assert_eq!(client.statements().len(), 1);
    assert!(logs.contents().is_empty());
}

#[tokio::test]
async fn scoped_update_does_not_warn() {
    let client = MockClient::returning(vec![]);
    let (logs, _guard) = capture_warnings();

    let resp = from("posts")
        .update(json!({"archived": true}))
        .eq("id", 4)
        .execute(&client)
        .await;

    assert!(resp.is_ok(), "{:?}", resp.error);
    assert!(logs.contents().is_empty());
}

#[tokio::test]
async fn unique_violation_maps_to_conflict() {
    let client = MockClient::failing(|| {
        OrmError::UniqueViolation("products_sku_key: duplicate key value".into())
    });

    let resp = from("products").insert(json!({"sku": "W-1"})).execute(&client).await;

    assert_eq!(resp.data, None);
    let err = resp.error.unwrap();
    assert_eq!(err.code, ErrorCode::UniqueViolation);
    assert!(err.is_conflict());
    assert_eq!(err.sqlstate.as_deref(), Some("23505"));
}

#[tokio::test]
async fn conflicting_operations_are_rejected_before_running() {
    let client = echo_inserts();

    let resp = from("products")
        .insert(json!({"title": "a"}))
        .update(json!({"title": "b"}))
        .execute(&client)
        .await;

    assert_eq!(resp.error.map(|e| e.code), Some(ErrorCode::InvalidRequest));
    assert!(client.executed().is_empty());
}
