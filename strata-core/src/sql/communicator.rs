use crate::{
    Condition, Entity, Error, Item, Operation, Operator, Query, Result, ResultStream, Role,
    RowLabeled, SqlDriver, SqlWriter, Value,
};
use futures::{StreamExt, stream::BoxStream};
use std::sync::Arc;

/// Relational translator/executor: turns a query into one parameterized
/// statement plus an ordered parameter list, runs it through the
/// [`SqlDriver`], and yields a lazy stream of hydrated rows.
pub struct SqlCommunicator {
    driver: Arc<dyn SqlDriver>,
    writer: Arc<dyn SqlWriter>,
}

impl SqlCommunicator {
    pub fn new(driver: Arc<dyn SqlDriver>, writer: Arc<dyn SqlWriter>) -> Self {
        Self { driver, writer }
    }

    pub async fn execute(&self, query: Query) -> Result<ResultStream> {
        match query.operation() {
            Some(Operation::Select) => self.select(query),
            Some(Operation::Insert) => self.insert(query).await,
            Some(Operation::Update) => self.update(query).await,
            Some(Operation::Delete) => self.delete(query).await,
            Some(Operation::Truncate) => self.truncate(query).await,
            None => Err(Error::QueryShape(format!("no operation armed: {query}"))),
        }
    }

    fn select(&self, query: Query) -> Result<ResultStream> {
        let mut sql = String::with_capacity(256);
        let mut params = Vec::new();
        self.writer.write_select(&mut sql, &mut params, &query);
        log::debug!("{sql}");
        let rows = self.driver.fetch(sql, params);
        Ok(hydrating(query, rows))
    }

    /// Insert, then re-fetch the definitive row by the backend's last
    /// inserted identifier. The returned entity reflects the store, not the
    /// supplied values.
    async fn insert(&self, query: Query) -> Result<ResultStream> {
        let mut sql = String::with_capacity(256);
        let mut params = Vec::new();
        self.writer.write_insert(&mut sql, &mut params, &query);
        log::debug!("{sql}");
        let affected = self.driver.execute(sql, params).await?;
        let id = affected.last_affected_id.ok_or_else(|| {
            Error::Execution("backend reported no last inserted identifier".into())
        })?;
        let refetch = Query::new(Arc::clone(query.connection()), query.target().clone()).filter(
            query.target().primary_key().to_owned(),
            Operator::Eq,
            id,
        );
        let mut sql = String::with_capacity(128);
        let mut params = Vec::new();
        self.writer.write_select(&mut sql, &mut params, &refetch);
        let rows = self.driver.fetch(sql, params);
        Ok(hydrating(query, rows))
    }

    /// Update, then re-select the affected rows by the same filters and
    /// stream them back.
    async fn update(&self, query: Query) -> Result<ResultStream> {
        let mut sql = String::with_capacity(256);
        let mut params = Vec::new();
        self.writer.write_update(&mut sql, &mut params, &query);
        log::debug!("{sql}");
        self.driver.execute(sql, params).await?;
        let mut reselect = Query::new(Arc::clone(query.connection()), query.target().clone());
        for condition in query.conditions_by_role(Role::Filter) {
            reselect = reselect.with_condition(Condition::filter(
                condition.column().to_owned(),
                condition.operator(),
                condition.value().clone(),
            ));
        }
        let mut sql = String::with_capacity(128);
        let mut params = Vec::new();
        self.writer.write_select(&mut sql, &mut params, &reselect);
        let rows = self.driver.fetch(sql, params);
        Ok(hydrating(query, rows))
    }

    async fn delete(&self, query: Query) -> Result<ResultStream> {
        let mut sql = String::with_capacity(256);
        let mut params = Vec::new();
        self.writer.write_delete(&mut sql, &mut params, &query);
        log::debug!("{sql}");
        let affected = self.driver.execute(sql, params).await?;
        let count = Item::Scalar(Value::Integer(affected.rows_affected as i64));
        Ok(ResultStream::new(query, futures::stream::iter([Ok(count)])))
    }

    async fn truncate(&self, query: Query) -> Result<ResultStream> {
        let mut sql = String::with_capacity(64);
        self.writer.write_truncate(&mut sql, &query);
        log::debug!("{sql}");
        self.driver.execute(sql, Vec::new()).await?;
        let ok = Item::Scalar(Value::Boolean(true));
        Ok(ResultStream::new(query, futures::stream::iter([Ok(ok)])))
    }
}

/// Wrap a driver row stream, materializing each pulled row into an entity
/// when the target is a registered type.
fn hydrating(query: Query, rows: BoxStream<'static, Result<RowLabeled>>) -> ResultStream {
    let def = query.target().def();
    let connection = Arc::clone(query.connection());
    let stream = rows.map(move |row| {
        row.map(|row| match def {
            Some(def) => Item::Entity(Entity::hydrate(def, &connection, row)),
            None => Item::Row(row),
        })
    });
    ResultStream::new(query, stream)
}
