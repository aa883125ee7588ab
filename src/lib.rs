//! Strata: the layered data access kit.
//!
//! One abstract query model (role-tagged conditions, an operation flag, an
//! optional limit) executed against either a relational store or a
//! key-value store, yielding a lazy, single-pass stream of hydrated,
//! dirty-tracked entities bound to their originating connection.
//!
//! ```no_run
//! use std::sync::Arc;
//! use strata::{ConnectionExt, EntityDef, EntityRegistry, Operator};
//!
//! static WIDGET: EntityDef = EntityDef {
//!     name: "Widget",
//!     table: "widgets",
//!     primary_key: "widget_id",
//!     properties: &["name", "size"],
//!     relations: &[],
//! };
//!
//! # async fn demo() -> strata::Result<()> {
//! let registry = Arc::new(EntityRegistry::new().register(&WIDGET));
//! let connection = strata::connect("memory://", registry).await?;
//!
//! let widgets = connection.repository("Widget")?;
//! let widget = widgets.create([("name", "A")]).await?;
//!
//! let mut found = connection
//!     .query("Widget")
//!     .filter("name", Operator::Eq, "A")
//!     .get()
//!     .await?;
//! while let Some(item) = found.next().await? {
//!     println!("{:?}", item);
//! }
//! # let _ = widget;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use url::Url;

pub use strata_core::*;
pub use strata_redis::{RedisConnection, RedisStore};
pub use strata_sqlite::{SqliteConnection, SqliteDriver, SqliteSqlWriter};

/// Open a connection to the backend named by the URL scheme.
///
/// `sqlite://<path>` (empty path for in-memory), `redis://host[:port][/db]`,
/// or `memory://` for the in-process key-value store.
pub async fn connect(url: &str, registry: Arc<EntityRegistry>) -> Result<ConnectionHandle> {
    let parsed = Url::parse(url)
        .map_err(|e| Error::Connection(format!("invalid connection url `{url}`: {e}")))?;
    match parsed.scheme() {
        "sqlite" => {
            let connection: ConnectionHandle = SqliteConnection::connect(url, registry).await?;
            Ok(connection)
        }
        "redis" | "rediss" => RedisConnection::connect(url, registry).await,
        "memory" => Ok(MemoryConnection::connect(registry)),
        scheme => Err(Error::Connection(format!(
            "unsupported backend scheme `{scheme}`"
        ))),
    }
}
