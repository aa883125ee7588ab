mod condition;
mod connection;
mod describe;
mod entity;
mod error;
mod query;
mod registry;
mod relationship;
mod repository;
mod row;
mod stream;
mod util;
mod value;

pub mod kv;
pub mod sql;

pub use condition::*;
pub use connection::*;
pub use describe::*;
pub use entity::*;
pub use error::*;
pub use kv::{KvCommunicator, KvStore, MemoryConnection, MemoryStore, index_key, key_matches, row_key};
pub use query::*;
pub use registry::*;
pub use relationship::*;
pub use repository::*;
pub use row::*;
pub use sql::{AnsiSqlWriter, SqlCommunicator, SqlDriver, SqlWriter};
pub use stream::*;
pub use util::*;
pub use value::*;
