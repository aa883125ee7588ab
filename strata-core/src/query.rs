use crate::{
    Condition, ConnectionHandle, Entity, EntityDef, Operator, Result, ResultStream, Role, Value,
};
use std::{
    fmt::{self, Display},
    sync::Arc,
};

/// What a query does when executed. Exactly one operation is armed per
/// execution; executing with none armed is a query-shape error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
}

impl Operation {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Truncate => "truncate",
        }
    }
}

/// What a query runs against: a registered entity type (rows hydrate into
/// entities) or a bare table name (rows stay raw).
#[derive(Debug, Clone)]
pub enum Target {
    Entity(&'static EntityDef),
    Table(String),
}

impl Target {
    pub fn table(&self) -> &str {
        match self {
            Target::Entity(def) => def.table,
            Target::Table(name) => name,
        }
    }

    pub fn def(&self) -> Option<&'static EntityDef> {
        match self {
            Target::Entity(def) => Some(def),
            Target::Table(..) => None,
        }
    }

    /// Key column used for generated identifiers and implied filters; raw
    /// tables fall back to `id`.
    pub fn primary_key(&self) -> &str {
        match self {
            Target::Entity(def) => def.primary_key,
            Target::Table(..) => "id",
        }
    }
}

/// An accumulating description of one backend operation: target, role-tagged
/// conditions, operation flag and optional row limit.
///
/// Building a query never touches the backend; translation and execution
/// happen only when a terminal verb hands it to the connection's
/// communicator.
#[derive(Clone)]
pub struct Query {
    connection: ConnectionHandle,
    target: Target,
    conditions: Vec<Condition>,
    operation: Option<Operation>,
    limit: Option<u32>,
}

impl Query {
    pub fn new(connection: ConnectionHandle, target: Target) -> Self {
        Self {
            connection,
            target,
            conditions: Vec::new(),
            operation: None,
            limit: None,
        }
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn operation(&self) -> Option<Operation> {
        self.operation
    }

    pub fn row_limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn conditions_by_role(&self, role: Role) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(move |c| c.role() == role)
    }

    pub(crate) fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add one filter clause; filters are ANDed in insertion order.
    pub fn filter(
        mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions
            .push(Condition::filter(column, operator, value));
        self
    }

    /// Add one column value for an insert.
    pub fn create_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::create_value(column, value));
        self
    }

    /// Add one column assignment for an update.
    pub fn update_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::update_value(column, value));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Arm an update carrying the given column assignments. When an owning
    /// entity is supplied and no filter was accumulated, a primary-key
    /// equality filter is implied so the update touches that record only.
    pub fn update<K, V>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
        scope: Option<&Entity>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (column, value) in fields {
            self.conditions.push(Condition::update_value(column, value));
        }
        if let Some(entity) = scope {
            let unfiltered = !self.conditions.iter().any(|c| c.role() == Role::Filter);
            if unfiltered {
                self.conditions.push(Condition::filter(
                    self.target.primary_key().to_owned(),
                    Operator::Eq,
                    entity.id(),
                ));
            }
        }
        self.operation = Some(Operation::Update);
        self
    }

    /// Arm a delete of the rows matching the accumulated filters.
    pub fn delete(mut self) -> Self {
        self.operation = Some(Operation::Delete);
        self
    }

    /// Select and execute.
    pub async fn get(mut self) -> Result<ResultStream> {
        self.operation = Some(Operation::Select);
        self.execute().await
    }

    /// Insert the given column values, in order, and execute.
    pub async fn insert<K, V>(
        mut self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<ResultStream>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (column, value) in values {
            self.conditions.push(Condition::create_value(column, value));
        }
        self.operation = Some(Operation::Insert);
        self.execute().await
    }

    /// Empty the whole table, ignoring conditions, and execute.
    pub async fn truncate(mut self) -> Result<ResultStream> {
        self.operation = Some(Operation::Truncate);
        self.execute().await
    }

    /// Hand the query to the connection's communicator.
    pub async fn execute(self) -> Result<ResultStream> {
        let connection = Arc::clone(&self.connection);
        connection.run(self).await
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.operation.map(|o| o.label()).unwrap_or("query"),
            self.target.table(),
        )?;
        for condition in &self.conditions {
            write!(f, " [{} {}]", condition.role().label(), condition)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.target.table())
            .field("operation", &self.operation)
            .field("conditions", &self.conditions)
            .field("limit", &self.limit)
            .finish()
    }
}
