use crate::{Result, RowLabeled, RowsAffected, Value};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// The relational backend contract: plain parameterized statement text,
/// positional parameters, quoted identifiers.
///
/// `execute` runs a modify statement and reports the affected count plus the
/// backend's last-inserted identifier; `fetch` returns a lazy row stream.
/// Only the backend's error message is propagated on rejection.
#[async_trait]
pub trait SqlDriver: Send + Sync {
    async fn execute(&self, sql: String, params: Vec<Value>) -> Result<RowsAffected>;

    fn fetch(&self, sql: String, params: Vec<Value>) -> BoxStream<'static, Result<RowLabeled>>;

    async fn tables(&self) -> Result<Vec<String>>;
}
