use async_trait::async_trait;
use futures::stream::BoxStream;
use rusqlite::types::ValueRef;
use std::{sync::mpsc, thread};
use strata_core::{Error, Result, Row, RowLabeled, RowNames, RowsAffected, SqlDriver, Value};
use tokio::sync::{mpsc as async_mpsc, oneshot};

enum Command {
    Execute {
        sql: String,
        params: Vec<Value>,
        reply: oneshot::Sender<Result<RowsAffected>>,
    },
    Fetch {
        sql: String,
        params: Vec<Value>,
        rows: async_mpsc::UnboundedSender<Result<RowLabeled>>,
    },
    Tables {
        reply: oneshot::Sender<Result<Vec<String>>>,
    },
    Close,
}

/// The SQLite end of the relational contract.
///
/// rusqlite is a blocking library, so the handle lives on a dedicated owner
/// thread and commands arrive over a mailbox. Fetched rows are pumped
/// through an unbounded channel: the statement drains on the owner thread
/// (commands stay strictly serialized, writes can interleave with an open
/// result) while the consumer side stays pull-based. Dropping the stream
/// stops the pump at the next row.
pub struct SqliteDriver {
    commands: mpsc::Sender<Command>,
}

impl SqliteDriver {
    /// Open a database file, or an in-memory database for an empty path or
    /// `:memory:`.
    pub fn open(path: &str) -> Result<Self> {
        let connection = if path.is_empty() || path == ":memory:" {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(path)
        }
        .map_err(|e| Error::Connection(e.to_string()))?;
        let (commands, mailbox) = mpsc::channel();
        thread::Builder::new()
            .name("strata-sqlite".into())
            .spawn(move || serve(connection, mailbox))
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self { commands })
    }

    pub(crate) fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::Connection("sqlite worker is gone".into()))
    }
}

#[async_trait]
impl SqlDriver for SqliteDriver {
    async fn execute(&self, sql: String, params: Vec<Value>) -> Result<RowsAffected> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Execute { sql, params, reply })?;
        response
            .await
            .map_err(|_| Error::Connection("sqlite worker dropped the reply".into()))?
    }

    fn fetch(&self, sql: String, params: Vec<Value>) -> BoxStream<'static, Result<RowLabeled>> {
        let (rows, mut received) = async_mpsc::unbounded_channel();
        if let Err(error) = self.send(Command::Fetch { sql, params, rows }) {
            return Box::pin(futures::stream::iter([Err(error)]));
        }
        Box::pin(async_stream::stream! {
            while let Some(row) = received.recv().await {
                yield row;
            }
        })
    }

    async fn tables(&self) -> Result<Vec<String>> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Tables { reply })?;
        response
            .await
            .map_err(|_| Error::Connection("sqlite worker dropped the reply".into()))?
    }
}

fn serve(connection: rusqlite::Connection, mailbox: mpsc::Receiver<Command>) {
    while let Ok(command) = mailbox.recv() {
        match command {
            Command::Execute { sql, params, reply } => {
                let _ = reply.send(execute(&connection, &sql, params));
            }
            Command::Fetch { sql, params, rows } => fetch(&connection, &sql, params, rows),
            Command::Tables { reply } => {
                let _ = reply.send(tables(&connection));
            }
            Command::Close => break,
        }
    }
}

fn execute(connection: &rusqlite::Connection, sql: &str, params: Vec<Value>) -> Result<RowsAffected> {
    let mut statement = connection.prepare(sql).map_err(execution)?;
    let rows_affected = statement
        .execute(rusqlite::params_from_iter(params.iter().map(bind)))
        .map_err(execution)? as u64;
    Ok(RowsAffected {
        rows_affected,
        last_affected_id: Some(connection.last_insert_rowid()),
    })
}

fn fetch(
    connection: &rusqlite::Connection,
    sql: &str,
    params: Vec<Value>,
    out: async_mpsc::UnboundedSender<Result<RowLabeled>>,
) {
    let mut statement = match connection.prepare(sql) {
        Ok(statement) => statement,
        Err(e) => {
            let error = execution(e);
            log::error!("{error}");
            let _ = out.send(Err(error));
            return;
        }
    };
    let labels: RowNames = statement
        .column_names()
        .iter()
        .map(|name| name.to_string())
        .collect::<Vec<_>>()
        .into();
    let mut rows = match statement.query(rusqlite::params_from_iter(params.iter().map(bind))) {
        Ok(rows) => rows,
        Err(e) => {
            let error = execution(e);
            log::error!("{error}");
            let _ = out.send(Err(error));
            return;
        }
    };
    loop {
        match rows.next() {
            Ok(Some(row)) => {
                let values: Row = (0..labels.len())
                    .map(|i| row.get_ref(i).map(decode).unwrap_or(Value::Null))
                    .collect();
                // A closed receiver means the consumer stopped pulling.
                if out.send(Ok(RowLabeled::new(labels.clone(), values))).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let error = execution(e);
                log::error!("{error}");
                let _ = out.send(Err(error));
                return;
            }
        }
    }
}

fn tables(connection: &rusqlite::Connection) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare("select name from sqlite_master where type = 'table' and name not like 'sqlite_%' order by name")
        .map_err(execution)?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(execution)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(execution)?;
    Ok(names)
}

fn bind(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Boolean(v) => Sql::Integer(*v as i64),
        Value::Integer(v) => Sql::Integer(*v),
        Value::Float(v) => Sql::Real(*v),
        Value::Text(v) => Sql::Text(v.clone()),
        Value::Blob(v) => Sql::Blob(v.clone()),
        Value::Timestamp(..) => Sql::Text(value.to_stored()),
    }
}

fn decode(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

fn execution(error: rusqlite::Error) -> Error {
    Error::Execution(error.to_string())
}
