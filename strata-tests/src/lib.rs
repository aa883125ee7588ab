//! Behavioral suite every Strata backend must pass.
//!
//! Driver crates call [`suite`] (or individual checks) from their own
//! `tests/` directory against a connection they set up; the fixtures module
//! carries the entity definitions the checks run against. Relational
//! backends need the fixture tables created first; see each driver's test
//! for its schema setup.

use std::sync::Once;
use strata_core::{ConnectionExt, ConnectionHandle, Error, Value};

pub mod fixtures {
    use std::sync::Arc;
    use strata_core::{EntityDef, EntityRegistry, RelationDef, RelationKind};

    pub static WIDGET: EntityDef = EntityDef {
        name: "Widget",
        table: "widgets",
        primary_key: "widget_id",
        properties: &["name", "size"],
        relations: &[RelationDef {
            accessor: "gadgets",
            kind: RelationKind::Children,
            target: "Gadget",
        }],
    };

    pub static GADGET: EntityDef = EntityDef {
        name: "Gadget",
        table: "gadgets",
        primary_key: "gadget_id",
        properties: &["name", "widget_id"],
        relations: &[RelationDef {
            accessor: "widget",
            kind: RelationKind::Parent,
            target: "Widget",
        }],
    };

    pub fn registry() -> Arc<EntityRegistry> {
        Arc::new(EntityRegistry::new().register(&WIDGET).register(&GADGET))
    }
}

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Empty both fixture tables.
pub async fn reset(connection: &ConnectionHandle) {
    for table in ["Widget", "Gadget"] {
        connection
            .query(table)
            .truncate()
            .await
            .expect("truncate failed");
    }
}

/// A nulled foreign key: relational backends answer SQL null, the key-value
/// backend stores the empty string.
fn cleared(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Text(text)) => text.is_empty(),
        _ => false,
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.into())
}

pub async fn round_trip(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    let created = repository
        .create([("name", "A"), ("size", "m")])
        .await
        .unwrap();
    assert!(created.id() > 0, "store must assign an identifier");

    let fetched = repository.single(created.id()).await.unwrap();
    assert_eq!(fetched.get("name"), Some(&text("A")));
    assert_eq!(fetched.get("size"), Some(&text("m")));
    assert_eq!(fetched.id(), created.id());
    assert!(fetched.get("created_at").is_some(), "audit field populated");
}

pub async fn filter_conjunction(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a"), ("size", "2")]).await.unwrap();
    repository.create([("name", "a"), ("size", "8")]).await.unwrap();
    repository.create([("name", "b"), ("size", "9")]).await.unwrap();

    let mut matched = connection
        .query("Widget")
        .filter("name", strata_core::Operator::Eq, "a")
        .filter("size", strata_core::Operator::Gt, "5")
        .get()
        .await
        .unwrap();
    let only = matched.next().await.unwrap().unwrap().into_entity().unwrap();
    assert_eq!(only.get("size"), Some(&text("8")));
    assert!(matched.next().await.unwrap().is_none(), "filters are ANDed");
}

pub async fn limit_enforcement(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    for i in 0..5 {
        repository
            .create([("name", format!("w{i}")), ("size", "s".to_owned())])
            .await
            .unwrap();
    }
    let limited = connection.query("Widget").limit(3).get().await.unwrap();
    assert_eq!(limited.count().await.unwrap(), 3);
}

pub async fn truncate_exhaustive(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    repository.create([("name", "b")]).await.unwrap();

    connection.query("Widget").truncate().await.unwrap();
    let count = connection
        .query("Widget")
        .get()
        .await
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(count, 0);
}

pub async fn update_scoping(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    let second = repository.create([("name", "b")]).await.unwrap();
    repository.create([("name", "c")]).await.unwrap();

    let mut entity = repository.single(second.id()).await.unwrap();
    entity.set("name", "renamed");
    entity.persist().await.unwrap();

    let mut all = connection.query("Widget").get().await.unwrap();
    while let Some(item) = all.next().await.unwrap() {
        let widget = item.as_entity().unwrap();
        let expected = if widget.id() == second.id() {
            "renamed"
        } else if widget.id() < second.id() {
            "a"
        } else {
            "c"
        };
        assert_eq!(widget.get("name"), Some(&text(expected)));
    }
}

pub async fn delete_cascade(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    let widget = repository.create([("name", "parent")]).await.unwrap();
    widget
        .create_related("Gadget", [("name", "g1")])
        .await
        .unwrap();
    widget
        .create_related("Gadget", [("name", "g2")])
        .await
        .unwrap();

    widget.delete().await.unwrap();

    let mut gadgets = connection.query("Gadget").get().await.unwrap();
    let mut seen = 0;
    while let Some(item) = gadgets.next().await.unwrap() {
        let gadget = item.as_entity().unwrap();
        assert!(
            cleared(gadget.get("widget_id")),
            "cascade must null the foreign key"
        );
        seen += 1;
    }
    assert_eq!(seen, 2);
}

pub async fn stream_single_pass(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();

    let mut stream = connection.query("Widget").get().await.unwrap();
    assert!(stream.next().await.unwrap().is_some());
    assert!(stream.next().await.unwrap().is_none());
    assert!(stream.next().await.unwrap().is_none(), "drained stays drained");
}

pub async fn single_not_found(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    assert!(matches!(
        repository.single(9999).await,
        Err(Error::NotFound { .. })
    ));
}

pub async fn sequential_identifiers(connection: &ConnectionHandle) {
    reset(connection).await;
    let repository = connection.repository("Widget").unwrap();
    for expected in 1..=3 {
        let widget = repository.create([("name", "w")]).await.unwrap();
        assert_eq!(widget.id(), expected);
    }
}

/// The whole suite, in order.
pub async fn suite(connection: &ConnectionHandle) {
    init_logging();
    round_trip(connection).await;
    filter_conjunction(connection).await;
    limit_enforcement(connection).await;
    truncate_exhaustive(connection).await;
    update_scoping(connection).await;
    delete_cascade(connection).await;
    stream_single_pass(connection).await;
    single_not_found(connection).await;
    sequential_identifiers(connection).await;
}
