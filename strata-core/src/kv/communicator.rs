use crate::{
    ConnectionHandle, Entity, EntityDef, Error, Item, KvStore, Operation, Operator, Query, Result,
    ResultStream, Role, RowLabeled, Value, index_key, row_key,
};
use async_stream::try_stream;
use futures::stream;
use std::sync::Arc;

/// One resolved filter clause, ready to test against stored text.
struct Filter {
    column: String,
    operator: Operator,
    target: String,
}

/// Key-value translator/executor.
///
/// The store has no query language, so relational semantics are emulated:
/// unfiltered selects walk the table's identifier set, filtered selects scan
/// every key matching the table pattern and test each field map, inserts
/// assign max-plus-one identifiers out of the index set. Identifier
/// assignment is not atomic and concurrent writers can collide; single-writer
/// semantics are the contract here.
pub struct KvCommunicator {
    store: Arc<dyn KvStore>,
}

impl KvCommunicator {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, query: Query) -> Result<ResultStream> {
        match query.operation() {
            Some(Operation::Select) => Ok(self.select(query)),
            Some(Operation::Insert) => self.insert(query).await,
            Some(Operation::Update) => self.update(query).await,
            Some(Operation::Delete) => self.delete(query).await,
            Some(Operation::Truncate) => self.truncate(query).await,
            None => Err(Error::QueryShape(format!("no operation armed: {query}"))),
        }
    }

    fn select(&self, query: Query) -> ResultStream {
        if query.conditions_by_role(Role::Filter).next().is_none() {
            self.scan_index(query)
        } else {
            self.scan_filtered(query)
        }
    }

    /// Unfiltered select: one identifier-set read, then one field-map fetch
    /// per pulled row.
    fn scan_index(&self, query: Query) -> ResultStream {
        let store = Arc::clone(&self.store);
        let table = query.target().table().to_owned();
        let def = query.target().def();
        let connection = Arc::clone(query.connection());
        let limit = query.row_limit();
        let rows = try_stream! {
            let ids = store.set_members(&index_key(&table)).await?;
            let mut count = 0u32;
            for id in ids {
                if limit.is_some_and(|limit| count >= limit) {
                    break;
                }
                let entries = match store.map_get_all(&row_key(&table, &id)).await? {
                    Some(entries) => entries,
                    None => continue,
                };
                count += 1;
                yield materialize(def, &connection, entries);
            }
        };
        ResultStream::new(query, rows)
    }

    /// Filtered select: a full scan over the table's key pattern; a row
    /// passes only if every named column exists and its stored text
    /// satisfies the comparison.
    fn scan_filtered(&self, query: Query) -> ResultStream {
        let store = Arc::clone(&self.store);
        let table = query.target().table().to_owned();
        let def = query.target().def();
        let connection = Arc::clone(query.connection());
        let limit = query.row_limit();
        let filters = filters_of(&query);
        let rows = try_stream! {
            let keys = store.keys(&format!("{table}:*")).await?;
            let mut count = 0u32;
            for key in keys {
                if limit.is_some_and(|limit| count >= limit) {
                    break;
                }
                let entries = match store.map_get_all(&key).await? {
                    Some(entries) => entries,
                    None => continue,
                };
                if !passes(&entries, &filters) {
                    continue;
                }
                count += 1;
                yield materialize(def, &connection, entries);
            }
        };
        ResultStream::new(query, rows)
    }

    /// New identifier is max of the index set plus one (1 for an empty
    /// table); the fresh entity is yielded directly, no re-fetch.
    async fn insert(&self, query: Query) -> Result<ResultStream> {
        let table = query.target().table().to_owned();
        let index = index_key(&table);
        let members = self.store.set_members(&index).await?;
        let next = members
            .iter()
            .filter_map(|member| atoi::atoi::<i64>(member.as_bytes()))
            .max()
            .unwrap_or(0)
            + 1;
        let id = itoa::Buffer::new().format(next).to_owned();
        let mut entries: Vec<(String, String)> = query
            .conditions_by_role(Role::CreateValue)
            .map(|c| (c.column().to_owned(), c.value().to_stored()))
            .collect();
        entries.push((query.target().primary_key().to_owned(), id.clone()));
        self.store.set_add(&index, &id).await?;
        self.store.map_set_all(&row_key(&table, &id), &entries).await?;
        let item = materialize(query.target().def(), query.connection(), entries);
        Ok(ResultStream::new(query, stream::iter([Ok(item)])))
    }

    /// Set each assignment field by field on every resolved row; yields the
    /// row count, not the rows. No cross-field atomicity.
    async fn update(&self, query: Query) -> Result<ResultStream> {
        let table = query.target().table().to_owned();
        let filters = filters_of(&query);
        let rows = if filters.is_empty() {
            self.collect_index(&table).await?
        } else {
            self.collect_scan(&table, &filters).await?
        };
        let assignments: Vec<(String, String)> = query
            .conditions_by_role(Role::UpdateValue)
            .map(|c| (c.column().to_owned(), c.value().to_stored()))
            .collect();
        let mut count = 0_i64;
        for (key, _) in &rows {
            for (column, value) in &assignments {
                self.store.map_set(key, column, value).await?;
            }
            count += 1;
        }
        let item = Item::Scalar(Value::Integer(count));
        Ok(ResultStream::new(query, stream::iter([Ok(item)])))
    }

    /// Remove each resolved row's field map and its identifier from the
    /// index set; yields the removed rows.
    async fn delete(&self, query: Query) -> Result<ResultStream> {
        let table = query.target().table().to_owned();
        let filters = filters_of(&query);
        let rows = self.collect_scan(&table, &filters).await?;
        let primary_key = query.target().primary_key().to_owned();
        let index = index_key(&table);
        let mut items = Vec::with_capacity(rows.len());
        for (key, entries) in rows {
            self.store.delete(vec![key]).await?;
            if let Some((_, id)) = entries.iter().find(|(field, _)| *field == primary_key) {
                self.store.set_remove(&index, id).await?;
            }
            items.push(Ok(materialize(
                query.target().def(),
                query.connection(),
                entries,
            )));
        }
        Ok(ResultStream::new(query, stream::iter(items)))
    }

    /// Unconditional: every key matching the table pattern goes, and the
    /// index-set key goes with them.
    async fn truncate(&self, query: Query) -> Result<ResultStream> {
        let table = query.target().table().to_owned();
        let mut keys = self.store.keys(&format!("{table}:*")).await?;
        let index = index_key(&table);
        if !keys.contains(&index) {
            keys.push(index);
        }
        self.store.delete(keys).await?;
        let item = Item::Scalar(Value::Boolean(true));
        Ok(ResultStream::new(query, stream::iter([Ok(item)])))
    }

    async fn collect_index(&self, table: &str) -> Result<Vec<(String, Vec<(String, String)>)>> {
        let mut rows = Vec::new();
        for id in self.store.set_members(&index_key(table)).await? {
            let key = row_key(table, &id);
            if let Some(entries) = self.store.map_get_all(&key).await? {
                rows.push((key, entries));
            }
        }
        Ok(rows)
    }

    async fn collect_scan(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> Result<Vec<(String, Vec<(String, String)>)>> {
        let mut rows = Vec::new();
        for key in self.store.keys(&format!("{table}:*")).await? {
            let Some(entries) = self.store.map_get_all(&key).await? else {
                continue;
            };
            if passes(&entries, filters) {
                rows.push((key, entries));
            }
        }
        Ok(rows)
    }
}

fn filters_of(query: &Query) -> Vec<Filter> {
    query
        .conditions_by_role(Role::Filter)
        .map(|c| Filter {
            column: c.column().to_owned(),
            operator: c.operator(),
            target: c.value().to_stored(),
        })
        .collect()
}

fn passes(entries: &[(String, String)], filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        entries
            .iter()
            .find(|(column, _)| *column == filter.column)
            .is_some_and(|(_, stored)| filter.operator.compare_stored(stored, &filter.target))
    })
}

fn materialize(
    def: Option<&'static EntityDef>,
    connection: &ConnectionHandle,
    entries: Vec<(String, String)>,
) -> Item {
    let row = RowLabeled::from_pairs(entries.into_iter().map(|(k, v)| (k, Value::Text(v))));
    match def {
        Some(def) => Item::Entity(Entity::hydrate(def, connection, row)),
        None => Item::Row(row),
    }
}
