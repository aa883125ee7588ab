use futures::StreamExt;
use std::sync::Arc;
use strata_core::{
    ConnectionExt, ConnectionHandle, EntityDef, EntityRegistry, Error, Item, KvStore,
    MemoryConnection, MemoryStore, Operator, RelationDef, RelationKind, Value,
};

static WIDGET: EntityDef = EntityDef {
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

static GADGET: EntityDef = EntityDef {
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

fn registry() -> Arc<EntityRegistry> {
    Arc::new(EntityRegistry::new().register(&WIDGET).register(&GADGET))
}

fn connect() -> (Arc<MemoryStore>, ConnectionHandle) {
    let store = Arc::new(MemoryStore::new());
    let connection: ConnectionHandle =
        Arc::new(MemoryConnection::with_store(Arc::clone(&store), registry()));
    (store, connection)
}

#[tokio::test]
async fn widgets_end_to_end() {
    let (store, connection) = connect();
    let repository = connection.repository("Widget").unwrap();

    let a = repository.create([("name", "A")]).await.unwrap();
    assert_eq!(a.id(), 1);
    assert_eq!(a.get("name"), Some(&Value::Text("A".into())));

    let b = repository.create([("name", "B")]).await.unwrap();
    assert_eq!(b.id(), 2);

    let mut matched = connection
        .query("Widget")
        .filter("name", Operator::Eq, "B")
        .get()
        .await
        .unwrap();
    let found = matched.next().await.unwrap().unwrap().into_entity().unwrap();
    assert_eq!(found.id(), 2);
    assert!(matched.next().await.unwrap().is_none());

    found.delete().await.unwrap();
    assert_eq!(store.set_members("widgets:indices").await.unwrap(), ["1"]);

    let mut remaining = connection.query("Widget").get().await.unwrap();
    let survivor = remaining.next().await.unwrap().unwrap().into_entity().unwrap();
    assert_eq!(survivor.id(), 1);
    assert!(remaining.next().await.unwrap().is_none());
}

#[tokio::test]
async fn identifiers_are_monotonic() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    for expected in 1..=4 {
        let widget = repository.create([("name", "w")]).await.unwrap();
        assert_eq!(widget.id(), expected);
    }
}

#[tokio::test]
async fn identifier_continues_from_seeded_index() {
    let (store, connection) = connect();
    store.set_add("widgets:indices", "5").await.unwrap();
    store.set_add("widgets:indices", "7").await.unwrap();
    let widget = connection
        .repository("Widget")
        .unwrap()
        .create([("name", "w")])
        .await
        .unwrap();
    assert_eq!(widget.id(), 8);
}

#[tokio::test]
async fn filters_are_conjunctive() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a"), ("size", "2")]).await.unwrap();
    repository.create([("name", "a"), ("size", "8")]).await.unwrap();
    repository.create([("name", "b"), ("size", "9")]).await.unwrap();

    let mut matched = connection
        .query("Widget")
        .filter("name", Operator::Eq, "a")
        .filter("size", Operator::Gt, "5")
        .get()
        .await
        .unwrap();
    let only = matched.next().await.unwrap().unwrap().into_entity().unwrap();
    assert_eq!(only.get("size"), Some(&Value::Text("8".into())));
    assert!(matched.next().await.unwrap().is_none());
}

#[tokio::test]
async fn rows_missing_a_filtered_column_never_match() {
    let (store, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    // A row without the size field cannot satisfy a size filter.
    assert!(store.contains("widgets:1"));
    let count = connection
        .query("Widget")
        .filter("size", Operator::Gt, "0")
        .get()
        .await
        .unwrap()
        .count()
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn ordering_is_lexicographic_on_stored_text() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "x"), ("size", "9")]).await.unwrap();
    repository.create([("name", "y"), ("size", "10")]).await.unwrap();

    // "9" > "5" lexicographically, "10" is not: stored-text comparison is
    // pinned behavior, not numeric comparison.
    let mut matched = connection
        .query("Widget")
        .filter("size", Operator::Gt, "5")
        .get()
        .await
        .unwrap();
    let only = matched.next().await.unwrap().unwrap().into_entity().unwrap();
    assert_eq!(only.get("name"), Some(&Value::Text("x".into())));
    assert!(matched.next().await.unwrap().is_none());
}

#[tokio::test]
async fn limit_caps_both_scan_modes() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    for i in 0..5 {
        repository
            .create([("name", "w".to_owned()), ("size", i.to_string())])
            .await
            .unwrap();
    }
    let unfiltered = connection.query("Widget").limit(2).get().await.unwrap();
    assert_eq!(unfiltered.count().await.unwrap(), 2);

    let filtered = connection
        .query("Widget")
        .filter("name", Operator::Eq, "w")
        .limit(3)
        .get()
        .await
        .unwrap();
    assert_eq!(filtered.count().await.unwrap(), 3);
}

#[tokio::test]
async fn truncate_is_exhaustive() {
    let (store, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    repository.create([("name", "b")]).await.unwrap();

    let mut outcome = connection.query("Widget").truncate().await.unwrap();
    let ack = outcome.next().await.unwrap().unwrap();
    assert_eq!(ack.as_scalar(), Some(&Value::Boolean(true)));

    let count = connection.query("Widget").get().await.unwrap().count().await.unwrap();
    assert_eq!(count, 0);
    assert!(!store.contains("widgets:indices"));
    assert!(!store.contains("widgets:1"));
}

#[tokio::test]
async fn update_without_filters_touches_all_rows_and_counts() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    repository.create([("name", "b")]).await.unwrap();

    let mut outcome = connection
        .query("Widget")
        .update([("name", "z")], None)
        .execute()
        .await
        .unwrap();
    let count = outcome.next().await.unwrap().unwrap();
    assert_eq!(count.as_scalar(), Some(&Value::Integer(2)));

    let mut all = connection.query("Widget").get().await.unwrap();
    while let Some(item) = all.next().await.unwrap() {
        let entity = item.as_entity().unwrap();
        assert_eq!(entity.get("name"), Some(&Value::Text("z".into())));
    }
}

#[tokio::test]
async fn save_touches_only_the_saved_entity() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    repository.create([("name", "b")]).await.unwrap();
    repository.create([("name", "c")]).await.unwrap();

    let mut second = repository.single(2).await.unwrap();
    second.set("name", "renamed");
    assert!(second.is_dirty());
    second.persist().await.unwrap();
    assert!(!second.is_dirty());

    assert_eq!(
        repository.single(1).await.unwrap().get("name"),
        Some(&Value::Text("a".into()))
    );
    assert_eq!(
        repository.single(2).await.unwrap().get("name"),
        Some(&Value::Text("renamed".into()))
    );
    assert_eq!(
        repository.single(3).await.unwrap().get("name"),
        Some(&Value::Text("c".into()))
    );
    // Saving stamps the update timestamp.
    assert!(repository.single(2).await.unwrap().get("updated_at").is_some());
}

#[tokio::test]
async fn streams_are_single_pass() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();

    let mut stream = connection.query("Widget").get().await.unwrap();
    assert!(stream.next().await.unwrap().is_some());
    assert!(stream.next().await.unwrap().is_none());
    assert!(stream.next().await.unwrap().is_none());
}

#[tokio::test]
async fn map_transforms_lazily() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    repository.create([("name", "b")]).await.unwrap();

    let mut names = connection
        .query("Widget")
        .get()
        .await
        .unwrap()
        .map(|item| match item {
            Item::Entity(entity) => {
                Item::Scalar(entity.get("name").cloned().unwrap_or(Value::Null))
            }
            other => other,
        });
    let mut seen = Vec::new();
    while let Some(item) = names.next().await.unwrap() {
        seen.push(item.as_scalar().cloned().unwrap());
    }
    assert_eq!(seen, [Value::Text("a".into()), Value::Text("b".into())]);
}

#[tokio::test]
async fn raw_table_targets_yield_rows() {
    let (_, connection) = connect();
    let mut inserted = connection
        .query("things")
        .insert([("label", "loose")])
        .await
        .unwrap();
    let row = inserted.next().await.unwrap().unwrap().into_row().unwrap();
    assert_eq!(row.get("label"), Some(&Value::Text("loose".into())));
    assert_eq!(row.get("id"), Some(&Value::Text("1".into())));

    let mut selected = connection.query("things").get().await.unwrap();
    assert!(matches!(
        selected.next().await.unwrap(),
        Some(Item::Row(..))
    ));
}

#[tokio::test]
async fn executing_without_operation_is_a_shape_error() {
    let (_, connection) = connect();
    let result = connection.query("Widget").execute().await;
    assert!(matches!(result, Err(Error::QueryShape(..))));
}

#[tokio::test]
async fn closed_connection_rejects_queries() {
    let (_, connection) = connect();
    connection.close().await.unwrap();
    let result = connection.query("Widget").get().await;
    assert!(matches!(result, Err(Error::Connection(..))));
}

#[tokio::test]
async fn result_stream_implements_stream() {
    let (_, connection) = connect();
    let repository = connection.repository("Widget").unwrap();
    repository.create([("name", "a")]).await.unwrap();
    let stream = connection.query("Widget").get().await.unwrap();
    let collected: Vec<_> = stream.collect().await;
    assert_eq!(collected.len(), 1);
}

#[tokio::test]
async fn tables_lists_live_index_sets() {
    let (_, connection) = connect();
    connection.repository("Widget").unwrap().create([("name", "a")]).await.unwrap();
    connection
        .query("gadgets")
        .insert([("name", "g")])
        .await
        .unwrap();
    let mut tables = connection.tables().await.unwrap();
    tables.sort();
    assert_eq!(tables, ["gadgets", "widgets"]);
}
