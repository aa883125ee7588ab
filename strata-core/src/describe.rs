use crate::{Condition, Entity, Query, Relationship, RelationKind, ResultStream};
use serde_json::{Map, Value as Json, json};

/// Render as an ordered attribute map tagged with the type name.
///
/// The contract other layers (logging, APIs) rely on to serialize domain
/// objects; nested relationships expand recursively. Not a persistence
/// format.
pub trait Describe {
    fn describe(&self) -> Map<String, Json>;

    fn to_json(&self) -> Json {
        Json::Object(self.describe())
    }
}

impl Describe for Condition {
    fn describe(&self) -> Map<String, Json> {
        let mut map = Map::new();
        map.insert("_type".into(), "Condition".into());
        map.insert("column".into(), self.column().into());
        map.insert("operator".into(), self.operator().to_string().into());
        map.insert("value".into(), self.value().to_json());
        map.insert("role".into(), self.role().label().into());
        map.insert("fingerprint".into(), self.fingerprint().into());
        map
    }
}

impl Describe for Query {
    fn describe(&self) -> Map<String, Json> {
        let mut map = Map::new();
        map.insert("_type".into(), "Query".into());
        map.insert("table".into(), self.target().table().into());
        if let Some(def) = self.target().def() {
            map.insert("entity".into(), def.name.into());
        }
        if let Some(operation) = self.operation() {
            map.insert("operation".into(), operation.label().into());
        }
        map.insert(
            "conditions".into(),
            self.conditions()
                .iter()
                .map(Describe::to_json)
                .collect::<Vec<_>>()
                .into(),
        );
        if let Some(limit) = self.row_limit() {
            map.insert("limit".into(), limit.into());
        }
        map
    }
}

impl Describe for Entity {
    fn describe(&self) -> Map<String, Json> {
        let mut map = Map::new();
        map.insert("_type".into(), self.def().name.into());
        for (key, value) in self.attributes() {
            map.insert(key.clone(), value.to_json());
        }
        for relation in self.def().relations {
            map.insert(
                relation.accessor.into(),
                json!({
                    "_type": "Relationship",
                    "kind": match relation.kind {
                        RelationKind::Children => "children",
                        RelationKind::Parent => "parent",
                    },
                    "target": relation.target,
                }),
            );
        }
        map
    }
}

impl Describe for Relationship {
    fn describe(&self) -> Map<String, Json> {
        let mut map = Map::new();
        map.insert("_type".into(), "Relationship".into());
        map.insert("owner".into(), self.owner_type().into());
        map.insert("query".into(), self.query().to_json());
        map
    }
}

impl Describe for ResultStream {
    fn describe(&self) -> Map<String, Json> {
        let mut map = Map::new();
        map.insert("_type".into(), "ResultStream".into());
        map.insert("query".into(), self.query().to_json());
        map
    }
}
