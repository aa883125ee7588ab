use std::sync::Arc;
use strata_core::{
    ConnectionExt, ConnectionHandle, Describe, Entity, EntityDef, EntityRegistry, Error, KvStore,
    MemoryConnection, MemoryStore, RelationDef, RelationKind, RowLabeled, SaveGuard, Value,
};

static ALBUM: EntityDef = EntityDef {
    name: "Album",
    table: "albums",
    primary_key: "album_id",
    properties: &["title"],
    relations: &[RelationDef {
        accessor: "tracks",
        kind: RelationKind::Children,
        target: "Track",
    }],
};

static TRACK: EntityDef = EntityDef {
    name: "Track",
    table: "tracks",
    primary_key: "track_id",
    properties: &["title", "album_id"],
    relations: &[RelationDef {
        accessor: "album",
        kind: RelationKind::Parent,
        target: "Album",
    }],
};

fn registry() -> Arc<EntityRegistry> {
    Arc::new(EntityRegistry::new().register(&ALBUM).register(&TRACK))
}

fn connect() -> ConnectionHandle {
    MemoryConnection::connect(registry())
}

fn connect_cached() -> (Arc<MemoryStore>, ConnectionHandle) {
    let cache = Arc::new(MemoryStore::new());
    let connection: ConnectionHandle = Arc::new(
        MemoryConnection::with_store(Arc::new(MemoryStore::new()), registry())
            .with_cache(Arc::clone(&cache) as Arc<dyn KvStore>),
    );
    (cache, connection)
}

#[tokio::test]
async fn hydration_lowercases_and_drops_unknown_fields() {
    let connection = connect();
    let row = RowLabeled::from_pairs([
        ("Title".to_owned(), Value::Text("Klangfarben".into())),
        ("ALBUM_ID".to_owned(), Value::Integer(3)),
        ("bootleg".to_owned(), Value::Text("dropped".into())),
        ("Created_At".to_owned(), Value::Text("2024-01-01 00:00:00".into())),
    ]);
    let entity = Entity::hydrate(&ALBUM, &connection, row);
    assert_eq!(entity.get("title"), Some(&Value::Text("Klangfarben".into())));
    assert_eq!(entity.id(), 3);
    assert!(entity.get("bootleg").is_none());
    assert!(entity.get("created_at").is_some());
    assert!(!entity.is_dirty());
}

#[tokio::test]
async fn primary_key_is_immutable_and_unknown_sets_are_ignored() {
    let connection = connect();
    let row = RowLabeled::from_pairs([
        ("album_id".to_owned(), Value::Integer(3)),
        ("title".to_owned(), Value::Text("a".into())),
    ]);
    let mut entity = Entity::hydrate(&ALBUM, &connection, row);
    entity.set("album_id", 99);
    entity.set("bootleg", "nope");
    assert_eq!(entity.id(), 3);
    assert!(!entity.is_dirty());
    entity.set("title", "a");
    assert!(!entity.is_dirty(), "setting the same value stays clean");
    entity.set("title", "b");
    assert!(entity.is_dirty());
}

#[tokio::test]
async fn children_parent_and_cascade() {
    let connection = connect();
    let albums = connection.repository("Album").unwrap();
    let album = albums.create([("title", "first")]).await.unwrap();

    let t1 = album
        .create_related("Track", [("title", "one")])
        .await
        .unwrap();
    let t2 = album
        .create_related("Track", [("title", "two")])
        .await
        .unwrap();
    assert_eq!(t1.get("album_id"), Some(&Value::Text("1".into())));
    assert_eq!(t2.id(), 2);

    let tracks = album.children("Track").unwrap().all().await.unwrap();
    assert_eq!(tracks.count().await.unwrap(), 2);

    let parent = t1.parent("Album").unwrap().one().await.unwrap();
    assert_eq!(parent.id(), album.id());

    // Deleting the album nulls the foreign key on every reachable track.
    album.delete().await.unwrap();
    let mut orphans = connection.query("Track").get().await.unwrap();
    let mut seen = 0;
    while let Some(item) = orphans.next().await.unwrap() {
        let track = item.as_entity().unwrap();
        assert_eq!(track.get("album_id"), Some(&Value::Text("".into())));
        seen += 1;
    }
    assert_eq!(seen, 2);
}

#[tokio::test]
async fn relationship_one_reports_not_found() {
    let connection = connect();
    let albums = connection.repository("Album").unwrap();
    let album = albums.create([("title", "empty")]).await.unwrap();
    let result = album.children("Track").unwrap().one().await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn relationships_require_registered_types() {
    let connection = connect();
    let albums = connection.repository("Album").unwrap();
    let album = albums.create([("title", "x")]).await.unwrap();
    assert!(matches!(
        album.children("Poster"),
        Err(Error::InvalidEntityType(..))
    ));
    assert!(matches!(
        connection.repository("Poster"),
        Err(Error::InvalidEntityType(..))
    ));
}

#[tokio::test]
async fn attach_points_at_the_other_entity() {
    let connection = connect();
    let album = connection
        .repository("Album")
        .unwrap()
        .create([("title", "a")])
        .await
        .unwrap();
    let mut track = connection
        .repository("Track")
        .unwrap()
        .create([("title", "loose")])
        .await
        .unwrap();
    assert!(track.get("album_id").is_none());

    track.attach(&album).await.unwrap();
    let reloaded = connection
        .repository("Track")
        .unwrap()
        .single(track.id())
        .await
        .unwrap();
    assert_eq!(reloaded.get("album_id"), Some(&Value::Text("1".into())));
}

#[tokio::test]
async fn save_guard_flushes_on_release() {
    let connection = connect();
    let albums = connection.repository("Album").unwrap();
    let album = albums.create([("title", "draft")]).await.unwrap();

    let mut guard = SaveGuard::new(album);
    guard.set("title", "final");
    let album = guard.release().await;
    assert!(!album.is_dirty());

    let reloaded = albums.single(album.id()).await.unwrap();
    assert_eq!(reloaded.get("title"), Some(&Value::Text("final".into())));
}

#[tokio::test]
async fn save_guard_into_inner_keeps_changes_in_memory() {
    let connection = connect();
    let albums = connection.repository("Album").unwrap();
    let album = albums.create([("title", "draft")]).await.unwrap();

    let mut guard = SaveGuard::new(album);
    guard.set("title", "never stored");
    let album = guard.into_inner();
    assert!(album.is_dirty());

    let reloaded = albums.single(album.id()).await.unwrap();
    assert_eq!(reloaded.get("title"), Some(&Value::Text("draft".into())));
}

#[tokio::test]
async fn save_swallows_failures_after_close() {
    let connection = connect();
    let albums = connection.repository("Album").unwrap();
    let mut album = albums.create([("title", "a")]).await.unwrap();
    connection.close().await.unwrap();

    album.set("title", "b");
    assert!(matches!(album.persist().await, Err(Error::Connection(..))));
    // The logging form must not propagate the failure.
    album.save().await;
    assert!(album.is_dirty());
}

#[tokio::test]
async fn save_invalidates_the_configured_cache_entry() {
    let (cache, connection) = connect_cached();
    let albums = connection.repository("Album").unwrap();
    let mut album = albums.create([("title", "a")]).await.unwrap();

    cache.map_set(&album.cache_key(), "payload", "stale").await.unwrap();
    assert!(cache.contains(&album.cache_key()));

    album.set("title", "b");
    album.persist().await.unwrap();
    assert!(!cache.contains(&album.cache_key()));
}

#[tokio::test]
async fn describe_is_type_tagged_and_nested() {
    let connection = connect();
    let album = connection
        .repository("Album")
        .unwrap()
        .create([("title", "a")])
        .await
        .unwrap();
    let description = album.describe();
    assert_eq!(description["_type"], "Album");
    assert_eq!(description["title"], "a");
    assert_eq!(description["tracks"]["_type"], "Relationship");
    assert_eq!(description["tracks"]["target"], "Track");

    let relationship = album.children("Track").unwrap();
    let description = relationship.describe();
    assert_eq!(description["_type"], "Relationship");
    assert_eq!(description["owner"], "Album");
    assert_eq!(description["query"]["table"], "tracks");
}
