use strata::{ConnectionExt, ConnectionHandle, Error, Operator, Value};
use strata_tests::fixtures;

const SCHEMA: &[&str] = &[
    "create table widgets (widget_id integer primary key, name text, size text, created_at text, updated_at text)",
    "create table gadgets (gadget_id integer primary key, name text, widget_id integer, created_at text, updated_at text)",
];

#[tokio::test]
async fn memory_scheme_runs_the_suite() {
    let connection = strata::connect("memory://", fixtures::registry())
        .await
        .unwrap();
    strata_tests::suite(&connection).await;
}

#[tokio::test]
async fn sqlite_scheme_runs_the_suite() {
    // Schema setup needs the concrete driver type for its raw surface; the
    // suite itself runs against the plain handle.
    let connection = strata::SqliteConnection::connect("sqlite://", fixtures::registry())
        .await
        .unwrap();
    for statement in SCHEMA {
        connection.execute_raw(statement).await.unwrap();
    }
    let handle: ConnectionHandle = connection;
    strata_tests::suite(&handle).await;
}

#[tokio::test]
async fn facade_dispatches_sqlite_urls() {
    let connection = strata::connect("sqlite://", fixtures::registry())
        .await
        .unwrap();
    assert!(connection.connected());
    assert!(connection.tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_scheme_is_a_connection_failure() {
    let result = strata::connect("carrier-pigeon://coop", fixtures::registry()).await;
    assert!(matches!(result, Err(Error::Connection(..))));
}

#[tokio::test]
async fn memory_round_trip_through_the_facade() {
    let connection = strata::connect("memory://", fixtures::registry())
        .await
        .unwrap();
    let repository = connection.repository("Widget").unwrap();
    let created = repository.create([("name", "same")]).await.unwrap();
    let mut found = connection
        .query("Widget")
        .filter("name", Operator::Eq, "same")
        .get()
        .await
        .unwrap();
    let entity = found.next().await.unwrap().unwrap().into_entity().unwrap();
    assert_eq!(entity.id(), created.id());
    assert_eq!(entity.get("name"), Some(&Value::Text("same".into())));
}
